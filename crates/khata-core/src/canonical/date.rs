use crate::error::FieldError;
use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static TRAILING_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:T|\s+)\d{1,2}:\d{2}(?::\d{2})?(?:\.\d+)?\s*(?:[AP]M)?(?:Z|[+-]\d{2}:?\d{2})?$")
        .unwrap()
});

static NUMERIC_DMY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})$").unwrap());

static NAMED_MONTH_DMY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?[-\s/.,]*([A-Za-z]{3,9})\.?[-\s/.,]*(\d{4}|\d{2})$")
        .unwrap()
});

static NAMED_MONTH_MDY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4}|\d{2})$").unwrap()
});

static ISO_YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})$").unwrap());

static SERIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,6}(?:\.\d+)?$").unwrap());

/// Largest spreadsheet serial (9999-12-31).
const MAX_SERIAL: u64 = 2_958_465;

/// Parse a statement date into a calendar date.
///
/// Attempts, in order: the caller's format hint, numeric day-month-year,
/// named-month day-month-year (and "Mon DD, YYYY"), ISO year-first, then a
/// spreadsheet serial day count. Two-digit years pivot at 50: `51..=99` map
/// to the 1900s, `00..=50` to the 2000s.
pub fn normalize_date(raw: &str, format_hint: Option<&str>) -> Result<NaiveDate, FieldError> {
    let trimmed = raw.trim();
    let text = TRAILING_TIME.replace(trimmed, "");
    let text = text.trim();
    if text.is_empty() {
        return Err(FieldError::UnparsableDate(raw.to_string()));
    }

    if let Some(hint) = format_hint {
        if let Some(date) = parse_with_hint(text, hint) {
            return Ok(date);
        }
    }

    if let Some(caps) = NUMERIC_DMY.captures(text) {
        let first: u32 = caps[1].parse().unwrap_or(0);
        let second: u32 = caps[2].parse().unwrap_or(0);
        let year = expand_year(&caps[3]);
        // Day-first, unless only the month-first reading is a valid date.
        let date = NaiveDate::from_ymd_opt(year, second, first).or_else(|| {
            if second > 12 {
                NaiveDate::from_ymd_opt(year, first, second)
            } else {
                None
            }
        });
        if let Some(date) = date {
            return Ok(date);
        }
    }

    if let Some(caps) = NAMED_MONTH_DMY.captures(text) {
        if let Some(month) = month_from_name(&caps[2]) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            if let Some(date) = NaiveDate::from_ymd_opt(expand_year(&caps[3]), month, day) {
                return Ok(date);
            }
        }
    }

    if let Some(caps) = NAMED_MONTH_MDY.captures(text) {
        if let Some(month) = month_from_name(&caps[1]) {
            let day: u32 = caps[2].parse().unwrap_or(0);
            if let Some(date) = NaiveDate::from_ymd_opt(expand_year(&caps[3]), month, day) {
                return Ok(date);
            }
        }
    }

    if let Some(caps) = ISO_YMD.captures(text) {
        let year: i32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Ok(date);
        }
    }

    if SERIAL.is_match(text) {
        if let Some(date) = from_serial(text) {
            return Ok(date);
        }
    }

    Err(FieldError::UnparsableDate(raw.to_string()))
}

/// Apply the two-digit year pivot.
pub fn pivot_year(two_digit: u32) -> i32 {
    if two_digit > 50 {
        1900 + two_digit as i32
    } else {
        2000 + two_digit as i32
    }
}

fn expand_year(digits: &str) -> i32 {
    let n: u32 = digits.parse().unwrap_or(0);
    if digits.len() <= 2 {
        pivot_year(n)
    } else {
        n as i32
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let prefix = lower.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Decode a spreadsheet serial day count (epoch 1899-12-30).
fn from_serial(text: &str) -> Option<NaiveDate> {
    let whole: u64 = text.split('.').next()?.parse().ok()?;
    if whole == 0 || whole > MAX_SERIAL {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(whole))
}

/// Translate template tokens (`DD/MM/YYYY`, `DD-MMM-YY`, ...) into a chrono
/// format string. Raw chrono formats (containing `%`) pass through.
fn chrono_format(hint: &str) -> String {
    if hint.contains('%') {
        return hint.to_string();
    }
    let upper = hint.trim().to_uppercase();
    upper
        .replace("YYYY", "%Y")
        .replace("YY", "%y")
        .replace("MMMM", "%B")
        .replace("MMM", "%b")
        .replace("MM", "%m")
        .replace("DD", "%d")
}

fn parse_with_hint(text: &str, hint: &str) -> Option<NaiveDate> {
    let format = chrono_format(hint);
    let date = NaiveDate::parse_from_str(text, &format).ok()?;
    if format.contains("%y") {
        // chrono pivots two-digit years at 69; re-apply ours.
        let yy = (date.year() % 100) as u32;
        return date.with_year(pivot_year(yy));
    }
    Some(date)
}
