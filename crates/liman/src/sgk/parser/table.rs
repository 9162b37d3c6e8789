//! Header-driven table extraction over layout rows.

use tracing::debug;

use super::layout::LayoutRow;
use super::normalize::{normalize_name, turkish_lowercase};
use super::Extracted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Tc,
    FirstName,
    LastName,
}

#[derive(Debug, Clone)]
struct Column {
    x: f32,
    role: Option<Role>,
}

const TC_TOKENS: [&str; 3] = ["tc", "t.c.", "t.c"];
const TC_PHRASES: [&str; 3] = ["kimlik", "sosyal güvenlik", "s.g."];
const FIRST_NAME_TOKENS: [&str; 4] = ["adı", "adi", "ad", "name"];
const LAST_NAME_TOKENS: [&str; 4] = ["soyadı", "soyadi", "soyad", "surname"];

fn classify(label: &str) -> Option<Role> {
    let lower = turkish_lowercase(label.trim());
    let tokens: Vec<&str> = lower
        .split(|ch: char| ch.is_whitespace() || matches!(ch, '/' | '(' | ')' | ':' | '-'))
        .filter(|token| !token.is_empty())
        .collect();
    let has_token = |vocabulary: &[&str]| tokens.iter().any(|token| vocabulary.contains(token));

    if has_token(&LAST_NAME_TOKENS) || lower.contains("soyad") || lower.contains("surname") {
        return Some(Role::LastName);
    }
    if has_token(&TC_TOKENS) || TC_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Some(Role::Tc);
    }
    if has_token(&FIRST_NAME_TOKENS) {
        return Some(Role::FirstName);
    }
    None
}

fn header_columns(row: &LayoutRow) -> Option<Vec<Column>> {
    let columns: Vec<Column> = row
        .cells
        .iter()
        .map(|cell| Column {
            x: cell.x,
            role: classify(&cell.text),
        })
        .collect();
    let has = |role: Role| columns.iter().any(|column| column.role == Some(role));
    (has(Role::Tc) && (has(Role::FirstName) || has(Role::LastName))).then_some(columns)
}

fn nearest(columns: &[Column], x: f32) -> Option<Role> {
    columns
        .iter()
        .min_by(|left, right| (left.x - x).abs().total_cmp(&(right.x - x).abs()))
        .and_then(|column| column.role)
}

/// Rows under a recognized header. A header found on one page stays in force on the
/// following pages until another header replaces it.
pub fn extract(rows: &[LayoutRow]) -> Vec<Extracted> {
    let mut columns: Option<Vec<Column>> = None;
    let mut extracted = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        if let Some(header) = header_columns(row) {
            debug!(page = row.page, "sgk table header located");
            columns = Some(header);
            continue;
        }
        let Some(columns) = columns.as_deref() else {
            continue;
        };

        let mut tc = String::new();
        let mut first = Vec::new();
        let mut last = Vec::new();
        for cell in &row.cells {
            match nearest(columns, cell.x) {
                Some(Role::Tc) => tc.push_str(cell.text.trim()),
                Some(Role::FirstName) => first.push(cell.text.trim()),
                Some(Role::LastName) => last.push(cell.text.trim()),
                None => {}
            }
        }

        let digits: String = tc.chars().filter(|ch| !ch.is_whitespace()).collect();
        if digits.len() != 11 || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            if !digits.is_empty() {
                debug!(page = row.page, value = %digits, "skipping row without a valid TC number");
            }
            continue;
        }

        let name = format!("{} {}", first.join(" "), last.join(" "));
        extracted.push(Extracted {
            tc: digits,
            name: normalize_name(&name),
            row_index: index,
        });
    }

    extracted
}

#[cfg(test)]
mod tests {
    use super::super::layout::TextRun;
    use super::*;

    fn row(page: u32, y: f32, cells: &[(f32, &str)]) -> LayoutRow {
        LayoutRow {
            page,
            y,
            cells: cells
                .iter()
                .map(|(x, text)| TextRun {
                    x: *x,
                    y,
                    text: (*text).to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn labels_map_to_roles() {
        assert_eq!(classify("Sigortalının T.C. Kimlik No"), Some(Role::Tc));
        assert_eq!(classify("SOYADI"), Some(Role::LastName));
        assert_eq!(classify("Adı"), Some(Role::FirstName));
        assert_eq!(classify("Surname"), Some(Role::LastName));
        assert_eq!(classify("Sıra No"), None);
    }

    #[test]
    fn reads_rows_under_header_and_carries_it_across_pages() {
        let rows = vec![
            row(1, 780.0, &[(40.0, "4/a HİZMET LİSTESİ")]),
            row(1, 740.0, &[(40.0, "Sıra"), (90.0, "T.C. Kimlik No"), (220.0, "Adı"), (330.0, "Soyadı")]),
            row(1, 720.0, &[(40.0, "1"), (90.0, "10000000146"), (220.0, "Ali"), (330.0, "Yılmaz")]),
            row(1, 700.0, &[(40.0, "2"), (90.0, "1000000014"), (220.0, "Eksik"), (330.0, "Numara")]),
            row(2, 760.0, &[(40.0, "3"), (92.0, "20000000292"), (221.0, "Ayşe"), (331.0, "Kaya")]),
        ];
        let extracted = extract(&rows);
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].tc, "10000000146");
        assert_eq!(extracted[0].name, "ALİ YILMAZ");
        assert_eq!(extracted[1].tc, "20000000292");
        assert_eq!(extracted[1].name, "AYŞE KAYA");
    }

    #[test]
    fn nothing_is_read_without_a_header() {
        let rows = vec![row(1, 720.0, &[(40.0, "1"), (90.0, "10000000146"), (220.0, "Ali")])];
        assert!(extract(&rows).is_empty());
    }
}
