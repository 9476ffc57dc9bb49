//! Multi-line description handling for free-text layouts.

use regex::Regex;
use std::sync::LazyLock;

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^page\s*(?:no\.?\s*)?:?\s*\d+|\bpage\s+\d+\s+of\s+\d+").unwrap());

/// Structural noise common to statement PDFs: page furniture, legal
/// boilerplate and section banners. Matched case-insensitively as substrings.
pub const COMMON_NOISE: &[&str] = &[
    "statement of account",
    "statement of transactions",
    "this is a computer generated",
    "computer generated statement",
    "does not require signature",
    "registered office",
    "contents of this statement",
    "please do not share",
    "customer care",
    "call us",
    "www.",
    "gstin",
    "cin:",
    "for any queries",
    "continued on next page",
];

/// Rows that close the transaction section.
pub const SUMMARY_BANNERS: &[&str] = &[
    "statement summary",
    "closing balance",
    "end of statement",
    "**end",
    "total withdrawal",
    "total deposit",
    "total debit",
    "total credit",
];

/// True for lines that must never join a description.
pub fn is_noise(line: &str, extra: &[&str]) -> bool {
    let lower = line.trim().to_lowercase();
    if lower.is_empty() {
        return true;
    }
    COMMON_NOISE
        .iter()
        .chain(extra.iter())
        .any(|needle| lower.contains(needle))
        || PAGE_MARKER.is_match(&lower)
        || is_rule_line(&lower)
}

pub fn is_summary_banner(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    SUMMARY_BANNERS.iter().any(|b| lower.starts_with(b))
}

/// Separator rows such as `-----` or `*****`.
pub fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| matches!(c, '-' | '*' | '=' | '_' | ' '))
}

/// Append a wrapped continuation to a description.
pub fn append_continuation(description: &mut String, line: &str) {
    let piece = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if piece.is_empty() {
        return;
    }
    if !description.is_empty() {
        description.push(' ');
    }
    description.push_str(&piece);
}
