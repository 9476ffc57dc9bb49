use crate::canonical::amount::DrCr;
use crate::model::Direction;

/// Where a direction decision came from, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionSource {
    Explicit,
    Suffix,
    Keyword,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionHint {
    pub direction: Direction,
    pub source: DirectionSource,
}

impl DirectionHint {
    /// Keyword and default decisions have nothing in the row to back them.
    pub fn is_inferred(&self) -> bool {
        matches!(self.source, DirectionSource::Keyword | DirectionSource::Default)
    }
}

/// Phrases that mention credit but describe money leaving the account.
const DEBIT_OVERRIDES: &[&str] = &["credit card payment", "cc payment", "to credit card"];

const CREDIT_KEYWORDS: &[&str] = &[
    "neft cr",
    "neftcr",
    "imps cr",
    "upi cr",
    "credit",
    "received",
    "interest paid",
    "int.pd",
    "int pd",
    "tpt-",
    "refund",
    "reversal",
    "cashback",
    "salary",
    "deposit",
    "by transfer",
    "by clg",
];

const DEBIT_KEYWORDS: &[&str] = &[
    "withdrawal",
    "atm",
    "wdl",
    "debit",
    "purchase",
    "pos ",
    "emi",
    "charges",
    "fee",
    "to transfer",
    "bill pay",
];

/// Best-effort direction for a row. Always subject to balance correction.
pub fn resolve_direction(
    explicit_token: Option<&str>,
    suffix: Option<DrCr>,
    description: &str,
) -> DirectionHint {
    if let Some(direction) = explicit_token.and_then(parse_explicit) {
        return DirectionHint {
            direction,
            source: DirectionSource::Explicit,
        };
    }

    if let Some(marker) = suffix {
        let direction = match marker {
            DrCr::Cr => Direction::Credit,
            DrCr::Dr => Direction::Debit,
        };
        return DirectionHint {
            direction,
            source: DirectionSource::Suffix,
        };
    }

    if let Some(direction) = keyword_direction(description) {
        return DirectionHint {
            direction,
            source: DirectionSource::Keyword,
        };
    }

    DirectionHint {
        direction: Direction::Debit,
        source: DirectionSource::Default,
    }
}

fn parse_explicit(token: &str) -> Option<Direction> {
    match token.trim().to_lowercase().trim_end_matches('.') {
        "cr" | "c" | "credit" | "deposit" | "+" | "in" => Some(Direction::Credit),
        "dr" | "d" | "debit" | "withdrawal" | "-" | "out" => Some(Direction::Debit),
        _ => None,
    }
}

fn keyword_direction(description: &str) -> Option<Direction> {
    let lower = description.to_lowercase();
    if DEBIT_OVERRIDES.iter().any(|k| lower.contains(k)) {
        return Some(Direction::Debit);
    }
    if CREDIT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Direction::Credit);
    }
    if DEBIT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(Direction::Debit);
    }
    None
}
