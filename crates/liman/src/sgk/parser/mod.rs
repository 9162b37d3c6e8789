//! Identity extraction from monthly SGK service-list PDFs.
//!
//! The table strategy locates the header row by its column labels and reads the TC and
//! name columns under it. When that yields nothing, every text line is scanned for an
//! 11-digit number instead. Unreadable input produces an empty outcome, never an error.

pub mod layout;
pub mod lines;
pub mod normalize;
pub mod table;

use lopdf::Document;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use super::domain::{ParsedRow, PeriodCode, TcKimlik};
use layout::{group_rows, page_runs, LayoutRow};

/// A candidate row before TC validation and de-duplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub tc: String,
    pub name: String,
    pub row_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseStrategy {
    Table,
    Lines,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseOutcome {
    pub rows: Vec<ParsedRow>,
    pub strategy: ParseStrategy,
    pub pages: usize,
    pub pdf_unreadable: bool,
    /// Rows whose name could not be reconstructed.
    pub unnamed_rows: usize,
    pub duplicate_rows: usize,
}

impl ParseOutcome {
    pub(crate) fn unreadable() -> Self {
        Self {
            rows: Vec::new(),
            strategy: ParseStrategy::Nothing,
            pages: 0,
            pdf_unreadable: true,
            unnamed_rows: 0,
            duplicate_rows: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pdf parsing was cancelled")]
pub struct ParseCancelled;

/// Parse identities out of `bytes`. An unreadable document yields no rows.
pub fn parse(bytes: &[u8], period: PeriodCode) -> Vec<ParsedRow> {
    let never = AtomicBool::new(false);
    parse_document(bytes, period, &never)
        .map(|outcome| outcome.rows)
        .unwrap_or_default()
}

/// Parse with a cancellation flag that is checked between pages.
pub fn parse_document(
    bytes: &[u8],
    period: PeriodCode,
    cancel: &AtomicBool,
) -> Result<ParseOutcome, ParseCancelled> {
    let document = match Document::load_mem(bytes) {
        Ok(document) => document,
        Err(err) => {
            warn!(%period, error = %err, "sgk list is not a readable pdf");
            return Ok(ParseOutcome::unreadable());
        }
    };

    let pages = document.get_pages();
    let mut rows: Vec<LayoutRow> = Vec::new();
    for (page_number, page_id) in &pages {
        if cancel.load(Ordering::Relaxed) {
            return Err(ParseCancelled);
        }
        match page_runs(&document, *page_id) {
            Ok(runs) => rows.extend(group_rows(*page_number, runs)),
            Err(err) => debug!(page = page_number, error = %err, "page content not decodable"),
        }
    }

    let mut strategy = ParseStrategy::Table;
    let mut extracted = table::extract(&rows);

    if extracted.is_empty() {
        if cancel.load(Ordering::Relaxed) {
            return Err(ParseCancelled);
        }
        strategy = ParseStrategy::Lines;
        let layout_lines: Vec<String> = rows.iter().map(LayoutRow::text).collect();
        extracted = lines::extract(layout_lines.iter().map(String::as_str));

        if extracted.is_empty() {
            let page_numbers: Vec<u32> = pages.keys().copied().collect();
            if let Ok(text) = document.extract_text(&page_numbers) {
                extracted = lines::extract(text.lines());
            }
        }
    }

    let mut outcome = finish(extracted, strategy);
    outcome.pages = pages.len();
    outcome.pdf_unreadable = pages.is_empty();
    debug!(
        %period,
        pages = outcome.pages,
        rows = outcome.rows.len(),
        strategy = ?outcome.strategy,
        "sgk list parsed"
    );
    Ok(outcome)
}

/// Validate TC numbers and keep the first occurrence of each.
fn finish(extracted: Vec<Extracted>, strategy: ParseStrategy) -> ParseOutcome {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut unnamed_rows = 0;
    let mut duplicate_rows = 0;

    for candidate in extracted {
        let Ok(tc_no) = TcKimlik::parse(&candidate.tc) else {
            continue;
        };
        if !seen.insert(tc_no.clone()) {
            duplicate_rows += 1;
            debug!(tc = %tc_no, "duplicate row skipped");
            continue;
        }
        if candidate.name.is_empty() {
            unnamed_rows += 1;
        }
        rows.push(ParsedRow {
            tc_no,
            passport_no: None,
            full_name_raw: candidate.name,
            source_row_index: candidate.row_index,
        });
    }

    let strategy = if rows.is_empty() {
        ParseStrategy::Nothing
    } else {
        strategy
    };
    ParseOutcome {
        rows,
        strategy,
        pages: 0,
        pdf_unreadable: false,
        unnamed_rows,
        duplicate_rows,
    }
}
