use crate::error::FieldError;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// Trailing (or leading) CR/DR token, optionally bracketed: `Cr`, `DR.`, `(Dr)`.
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?P<pre>cr|dr)\.?\s+)?(?P<body>.*?)\s*\(?(?P<post>cr|dr)?\.?\)?$")
        .unwrap()
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:\.\d+)?|\.\d+)$").unwrap());

const CURRENCY_PREFIXES: &[&str] = &["rs.", "rs", "inr", "₹", "$", "€", "£"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrCr {
    Dr,
    Cr,
}

/// Result of canonicalizing one amount cell.
///
/// `value` is always non-negative. A CR/DR token and a printed minus sign or
/// accounting parentheses are reported separately so the caller decides
/// what they mean for direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAmount {
    pub value: Decimal,
    pub marker: Option<DrCr>,
    pub negative: bool,
}

impl ParsedAmount {
    pub const ZERO: ParsedAmount = ParsedAmount {
        value: Decimal::ZERO,
        marker: None,
        negative: false,
    };

    /// Zero means "no amount in this cell".
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

pub fn normalize_amount(raw: &str) -> Result<ParsedAmount, FieldError> {
    let mut s = raw.trim().replace(['\u{a0}', '\u{2009}'], " ");
    if is_blank_amount(&s) {
        return Ok(ParsedAmount::ZERO);
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && !is_bracketed_marker(&s) {
        negative = true;
        s = s[1..s.len() - 1].trim().to_string();
    }

    let mut marker = None;
    if let Some(caps) = MARKER.captures(&s) {
        let token = caps.name("post").or_else(|| caps.name("pre"));
        if let Some(token) = token {
            marker = Some(if token.as_str().eq_ignore_ascii_case("cr") {
                DrCr::Cr
            } else {
                DrCr::Dr
            });
            s = caps["body"].trim().to_string();
        }
    }

    let mut body = strip_currency(&s);
    if let Some(rest) = body.strip_prefix('-') {
        negative = true;
        body = strip_currency(rest);
    } else if let Some(rest) = body.strip_prefix('+') {
        body = strip_currency(rest);
    }
    if body.starts_with('(') && body.ends_with(')') {
        negative = true;
        body = body[1..body.len() - 1].to_string();
    }

    let cleaned: String = body
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return if marker.is_some() {
            Err(FieldError::UnparsableAmount(raw.to_string()))
        } else {
            Ok(ParsedAmount::ZERO)
        };
    }

    if !NUMBER.is_match(&cleaned) {
        return Err(FieldError::UnparsableAmount(raw.to_string()));
    }

    let value = Decimal::from_str(&cleaned)
        .map_err(|_| FieldError::UnparsableAmount(raw.to_string()))?;

    Ok(ParsedAmount {
        value,
        marker,
        negative: negative && !value.is_zero(),
    })
}

/// Parse an amount and require it to be printed (non-zero).
pub fn parse_money(raw: &str) -> Option<Decimal> {
    match normalize_amount(raw) {
        Ok(parsed) if !parsed.is_zero() => Some(if parsed.negative {
            -parsed.value
        } else {
            parsed.value
        }),
        _ => None,
    }
}

fn is_blank_amount(s: &str) -> bool {
    matches!(s, "" | "-" | "--" | "—" | "–" | "0" | "nil" | "NIL" | "N/A" | "n/a")
}

fn is_bracketed_marker(s: &str) -> bool {
    let inner = s[1..s.len() - 1].trim();
    inner.eq_ignore_ascii_case("cr") || inner.eq_ignore_ascii_case("dr")
}

fn strip_currency(s: &str) -> String {
    let mut rest = s.trim();
    loop {
        let lower = rest.to_lowercase();
        let found = CURRENCY_PREFIXES
            .iter()
            .find(|p| lower.starts_with(*p))
            .map(|p| p.len());
        match found {
            Some(len) => rest = rest[len..].trim_start(),
            None => break,
        }
    }
    rest.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_plain_and_grouped() {
        assert_eq!(normalize_amount("500.00").unwrap().value, dec!(500.00));
        assert_eq!(normalize_amount("1,23,456.78").unwrap().value, dec!(123456.78));
        assert_eq!(normalize_amount("12,345,678.9").unwrap().value, dec!(12345678.9));
    }

    #[test]
    fn test_currency_glyphs() {
        assert_eq!(normalize_amount("₹ 1,500.00").unwrap().value, dec!(1500.00));
        assert_eq!(normalize_amount("Rs.500").unwrap().value, dec!(500));
        assert_eq!(normalize_amount("INR 2,000").unwrap().value, dec!(2000));
    }

    #[test]
    fn test_marker_captured_not_signed() {
        let a = normalize_amount("1,234.50 Cr").unwrap();
        assert_eq!(a.value, dec!(1234.50));
        assert_eq!(a.marker, Some(DrCr::Cr));
        assert!(!a.negative);

        let b = normalize_amount("500.00(Dr)").unwrap();
        assert_eq!(b.value, dec!(500.00));
        assert_eq!(b.marker, Some(DrCr::Dr));

        let c = normalize_amount("DR 75.10").unwrap();
        assert_eq!(c.marker, Some(DrCr::Dr));
        assert_eq!(c.value, dec!(75.10));
    }

    #[test]
    fn test_negative_forms() {
        assert!(normalize_amount("(250.00)").unwrap().negative);
        assert!(normalize_amount("-250.00").unwrap().negative);
        assert!(normalize_amount("Rs. -250.00").unwrap().negative);
    }

    #[test]
    fn test_empty_means_zero() {
        assert!(normalize_amount("").unwrap().is_zero());
        assert!(normalize_amount("  ").unwrap().is_zero());
        assert!(normalize_amount("-").unwrap().is_zero());
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(matches!(
            normalize_amount("ATM WDL"),
            Err(FieldError::UnparsableAmount(_))
        ));
        assert!(normalize_amount("12.3.4").is_err());
        assert!(normalize_amount("Cr").is_err());
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("(1,000.00)"), Some(dec!(-1000.00)));
        assert_eq!(parse_money(""), None);
    }
}
