//! Line-based fallback: find an 11-digit run on each line and rebuild the name from the
//! words around it.

use regex::Regex;
use std::sync::OnceLock;

use super::normalize::normalize_name;
use super::Extracted;

fn tc_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b\d{11}\b").ok())
        .as_ref()
}

fn is_alphabetic(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphabetic)
}

fn is_number(token: &str) -> bool {
    let trimmed = token.trim_end_matches(['.', ')']);
    !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit())
}

/// Up to two alphabetic tokens right after the number.
fn following(after: &[&str]) -> Vec<String> {
    after
        .iter()
        .take_while(|token| is_alphabetic(token))
        .take(2)
        .map(|token| token.to_string())
        .collect()
}

/// Up to two alphabetic tokens right before the number, ignoring a leading row index.
fn preceding(before: &[&str]) -> Vec<String> {
    let start = usize::from(before.first().is_some_and(|token| is_number(token)));
    let mut tokens: Vec<String> = before[start..]
        .iter()
        .rev()
        .take_while(|token| is_alphabetic(token))
        .take(2)
        .map(|token| token.to_string())
        .collect();
    tokens.reverse();
    tokens
}

/// Any words on either side that carry letters, at least two characters long.
fn merged(before: &[&str], after: &[&str]) -> Vec<String> {
    before
        .iter()
        .chain(after.iter())
        .filter(|token| token.chars().count() >= 2 && token.chars().any(char::is_alphabetic))
        .take(2)
        .map(|token| token.to_string())
        .collect()
}

pub fn reconstruct_name(line: &str, tc_start: usize, tc_end: usize) -> String {
    let before: Vec<&str> = line[..tc_start].split_whitespace().collect();
    let after: Vec<&str> = line[tc_end..].split_whitespace().collect();

    let mut tokens = following(&after);
    if tokens.is_empty() {
        tokens = preceding(&before);
    }
    if tokens.is_empty() {
        tokens = merged(&before, &after);
    }
    normalize_name(&tokens.join(" "))
}

pub fn extract<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Extracted> {
    let mut extracted = Vec::new();
    let Some(pattern) = tc_pattern() else {
        return extracted;
    };
    for (index, line) in lines.into_iter().enumerate() {
        for found in pattern.find_iter(line) {
            extracted.push(Extracted {
                tc: found.as_str().to_string(),
                name: reconstruct_name(line, found.start(), found.end()),
                row_index: index,
            });
        }
    }
    extracted
}
