//! Labelled statement fields, read independently of the transaction rows.
//!
//! Every field is optional: a label that is missing or unreadable leaves the
//! field empty and never fails the parse.

use crate::canonical::normalize_date;
use crate::model::{CandidateTransaction, DocumentKind, Institution, RewardSummary, StatementMetadata};
use crate::report::ParseWarning;
use crate::strategies::tabular::parse_balance;
use chrono::NaiveDate;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use std::sync::LazyLock;
use tracing::debug;

/// A statement date in any printed form: `01/04/2025`, `07 May 2025`, `05-Mar-24`.
const DATE: &str = r"\d{1,2}[-/. ](?:\d{1,2}|[A-Za-z]{3,9})[-/. ]\d{2,4}";

/// An amount with an optional currency prefix and Cr/Dr suffix.
const MONEY: &str = r"(?:Rs\.?|INR|₹)?\s*(?P<v>-?[\d,]+\.\d{2}(?:\s*(?:Cr|Dr|CR|DR))?)";

fn money_after(label: &str) -> Regex {
    Regex::new(&format!(r"(?i){label}\s*:?\s*{MONEY}")).unwrap()
}

static ACCOUNT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)account\s*(?:no|number)\.?\s*:?\s*(?P<v>\d{9,18})\b").unwrap()
});

static ACCOUNT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)account\s*type\s*:?\s*(?P<v>[A-Za-z][A-Za-z0-9\-/()]*(?: [A-Za-z0-9\-/()]+)*)")
        .unwrap()
});

static ACCOUNT_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)status\s*:?\s*(?P<v>Individual|Joint|Corporate|Proprietary|Partnership|Active|Dormant|Inactive|Regular)\b")
        .unwrap()
});

static CARD_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)card\s*(?:no|number)\.?\s*:?\s*(?P<v>[\dXx*]{4}(?:[ -]?[\dXx*]{2,6}){2,4})").unwrap()
});

static IFSC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)IFSC(?:\s*Code)?\s*:?\s*(?P<v>[A-Z]{4}0[A-Z0-9]{6})").unwrap()
});

static MICR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)MICR(?:\s*Code)?\s*:?\s*(?P<v>\d{9})\b").unwrap());

static CUSTOMER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Cust(?:omer)?\s*ID|CRN)\s*:?\s*(?P<v>\d{4,})").unwrap()
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)E-?mail(?:\s*id)?\s*:?\s*(?P<v>[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})")
        .unwrap()
});

static BRANCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)branch(?:\s*name)?\s*:?[ \t]*(?P<v>[A-Za-z][A-Za-z.\-]*(?: [A-Za-z.\-]+)*)")
        .unwrap()
});

static CITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"City\s*:\s*(?P<v>[A-Z][A-Z ]*?)\s*(?P<pin>\d{6})?\s*(?:\s{2,}|$)").unwrap());

static STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)State\s*:\s*(?P<v>[A-Z][A-Z ]*?)\s*(?:\s{2,}|$)").unwrap());

static PINCODE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-–]\s*\d{6}\s*$").unwrap());

static TITLED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:MR|MRS|MS|MISS|DR|M/S)\.?\s+(?P<v>[A-Z][A-Za-z.]*(?: [A-Z][A-Za-z.]*){0,3})\s*(?:\s{2,}|$)")
        .unwrap()
});

static PLAIN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Account\s+)?(?P<v>[A-Z][a-z]+(?: [A-Z][a-z]+){1,2})\s*$").unwrap()
});

/// Period patterns, tried in order.
static PERIODS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"(?i)From\s*:?\s*(?P<from>{DATE})\s*To\s*:?\s*(?P<to>{DATE})"),
        format!(r"(?i)(?:statement\s+)?period\s*:?\s*(?P<from>{DATE})\s*(?:to|[-–])\s*(?P<to>{DATE})"),
        format!(r"(?P<from>\d{{1,2}}\s+[A-Za-z]{{3,9}}\s+\d{{4}})\s*[-–]\s*(?P<to>\d{{1,2}}\s+[A-Za-z]{{3,9}}\s+\d{{4}})"),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PAYMENT_DUE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)payment\s+due\s+date\s*:?\s*(?P<v>{DATE})")).unwrap()
});

static OPENING_BALANCE: LazyLock<Regex> = LazyLock::new(|| money_after(r"opening\s+balance"));
static CLOSING_BALANCE: LazyLock<Regex> = LazyLock::new(|| money_after(r"closing\s+balance"));
static CREDIT_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| money_after(r"(?:total\s+)?credit\s+limit"));
static AVAILABLE_CREDIT: LazyLock<Regex> =
    LazyLock::new(|| money_after(r"available\s+(?:credit\s+)?limit"));
static MINIMUM_DUE: LazyLock<Regex> =
    LazyLock::new(|| money_after(r"minimum\s+(?:amount\s+)?(?:due|payable)"));
static TOTAL_DUE: LazyLock<Regex> =
    LazyLock::new(|| money_after(r"total\s+(?:amount\s+)?dues?"));

static POINTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());

/// Name fragments that mark an organisation, whose word order is kept.
const COMPANY_WORDS: &[&str] = &[
    "TECHNOLOGIES", "CONSULTANT", "PRIVATE", "LIMITED", "LTD", "PVT", "SOLUTIONS", "SERVICES",
    "ENTERPRISES", "CORPORATION", "CORP", "INDUSTRIES", "TRADING", "EXPORTS", "IMPORTS", "LLC",
    "INC",
];

/// Header lines that sit where a Kotak holder name would.
const NOT_A_NAME: &[&str] = &["Account Statement", "Savings Account", "Current Account"];

/// Address lines never contain these.
const ADDRESS_STOP_WORDS: &[&str] = &[
    "account no", "account type", "crn", "branch", "phone", "nominee", "status", "ifsc", "micr",
    "statement",
];

/// Read labelled fields from the statement text.
pub fn extract_metadata(
    lines: &[String],
    institution: Institution,
    kind: DocumentKind,
) -> StatementMetadata {
    let text = lines.join("\n");
    let value = |re: &Regex| capture(re, &text).map(str::to_string);
    let money = |re: &Regex| capture(re, &text).and_then(parse_balance);

    let mut meta = StatementMetadata {
        institution: (institution != Institution::Generic).then_some(institution),
        account_status: value(&ACCOUNT_STATUS),
        routing_code: value(&IFSC).map(|v| v.to_uppercase()),
        micr: value(&MICR),
        customer_id: value(&CUSTOMER_ID),
        email: value(&EMAIL).map(|v| v.to_lowercase()),
        branch: value(&BRANCH).map(|v| title_case(&v)),
        opening_balance: money(&OPENING_BALANCE),
        closing_balance: money(&CLOSING_BALANCE),
        payment_due_date: capture(&PAYMENT_DUE_DATE, &text).and_then(|d| normalize_date(d, None).ok()),
        address: address(lines, &text),
        ..StatementMetadata::default()
    };

    if kind == DocumentKind::CreditCardStatement {
        meta.card_number = value(&CARD_NUMBER).map(|v| v.replace([' ', '-'], ""));
        meta.credit_limit = money(&CREDIT_LIMIT);
        meta.available_credit = money(&AVAILABLE_CREDIT);
        meta.minimum_due = money(&MINIMUM_DUE);
        meta.total_due = money(&TOTAL_DUE);
        meta.reward_points = reward_summary(lines);
    } else {
        meta.account_number = value(&ACCOUNT_NUMBER);
        meta.account_type = value(&ACCOUNT_TYPE).map(|v| v.trim().to_string());
    }

    if let Some((from, to)) = period(&text) {
        meta.period_start = Some(from);
        meta.period_end = Some(to);
    }

    meta.holder_name = match institution {
        Institution::Kotak => kotak_holder(lines)
            .map(|n| reverse_name_order(&n))
            .or_else(|| value(&TITLED_NAME).map(|n| title_case(&n))),
        _ => value(&TITLED_NAME).map(|n| title_case(&n)),
    };

    if ["INR", "₹", "Rs."].iter().any(|c| text.contains(c)) {
        meta.currency = Some("INR".into());
    }

    debug!(
        account = meta.account_number.as_deref().unwrap_or("-"),
        card = meta.card_number.as_deref().unwrap_or("-"),
        "metadata extracted"
    );
    meta
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|c: Captures<'t>| c.name("v"))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
}

fn period(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    PERIODS.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let from = normalize_date(&caps["from"], None).ok()?;
        let to = normalize_date(&caps["to"], None).ok()?;
        (from <= to).then_some((from, to))
    })
}

/// `City :`/`State :` labels, else the block ending in a `- 560001` line.
fn address(lines: &[String], text: &str) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(caps) = CITY.captures(text) {
        let mut city = title_case(caps["v"].trim());
        if let Some(pin) = caps.name("pin") {
            city = format!("{city} {}", pin.as_str());
        }
        parts.push(city);
    }
    if let Some(state) = capture(&STATE, text) {
        parts.push(title_case(state));
    }
    if !parts.is_empty() {
        return Some(parts.join(", "));
    }

    let pin_at = lines.iter().position(|l| PINCODE_LINE.is_match(l))?;
    let mut block: Vec<&str> = lines[..pin_at]
        .iter()
        .rev()
        .map(|l| l.trim())
        .take_while(|l| !l.is_empty() && !is_address_stop(l))
        .take(3)
        .collect();
    block.reverse();
    block.push(lines[pin_at].trim());
    if let Some(next) = lines.get(pin_at + 1).map(|l| l.trim()) {
        if next.to_lowercase().ends_with("india") {
            block.push(next);
        }
    }
    Some(block.join(", "))
}

fn is_address_stop(line: &str) -> bool {
    let lower = line.to_lowercase();
    ADDRESS_STOP_WORDS.iter().any(|w| lower.contains(w))
}

/// The name line printed under the Kotak statement banner.
fn kotak_holder(lines: &[String]) -> Option<String> {
    let banner = lines
        .iter()
        .position(|l| l.to_lowercase().contains("account statement"))?;
    lines[banner + 1..]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .take(3)
        .filter(|l| !NOT_A_NAME.iter().any(|n| l.eq_ignore_ascii_case(n)))
        .find_map(|l| PLAIN_NAME.captures(l).map(|c| c["v"].to_string()))
}

/// Kotak prints personal names surname first. Two words swap; three reverse.
pub fn reverse_name_order(name: &str) -> String {
    let upper = name.to_uppercase();
    if COMPANY_WORDS.iter().any(|w| upper.contains(w)) {
        return name.to_string();
    }
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.as_slice() {
        [last, first] => format!("{first} {last}"),
        [last, middle, first] => format!("{first} {middle} {last}"),
        _ => name.to_string(),
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Reward summary printed as a header row (`Opening ... Earned ... Redeemed
/// ... Closing`) followed by a row of figures.
fn reward_summary(lines: &[String]) -> RewardSummary {
    let header = lines.iter().position(|l| {
        let lower = l.to_lowercase();
        lower.contains("opening") && lower.contains("earned") && lower.contains("closing")
    });
    let Some(header) = header else {
        return RewardSummary::default();
    };

    let figures = lines[header + 1..]
        .iter()
        .find(|l| !l.trim().is_empty())
        .map(|l| {
            POINTS
                .find_iter(l)
                .filter_map(|m| m.as_str().replace(',', "").parse::<Decimal>().ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    match figures.as_slice() {
        [opening, earned, redeemed, .., closing] => RewardSummary {
            opening: Some(*opening),
            earned: Some(*earned),
            redeemed: Some(*redeemed),
            closing: Some(*closing),
        },
        _ => RewardSummary::default(),
    }
}

/// Fill gaps in the metadata from the transactions and cross-check the rest.
///
/// `transactions` must be in chronological order.
pub fn reconcile_with_transactions(
    meta: &mut StatementMetadata,
    transactions: &[CandidateTransaction],
    tolerance: Decimal,
) -> Vec<ParseWarning> {
    let mut warnings = Vec::new();
    let earliest = transactions.iter().map(|t| t.date).min();
    let latest = transactions.iter().map(|t| t.date).max();

    if meta.period_start.is_none() {
        if let Some(date) = earliest {
            meta.period_start = Some(date);
            warnings.push(ParseWarning::inferred(format!(
                "period start {date} taken from the earliest transaction"
            )));
        }
    }
    if meta.period_end.is_none() {
        if let Some(date) = latest {
            meta.period_end = Some(date);
            warnings.push(ParseWarning::inferred(format!(
                "period end {date} taken from the latest transaction"
            )));
        }
    }

    let first = transactions.iter().find(|t| t.running_balance.is_some());
    let last_balance = transactions.iter().rev().find_map(|t| t.running_balance);

    if meta.opening_balance.is_none() {
        if let Some(txn) = first {
            if let Some(balance) = txn.running_balance {
                let opening = balance - txn.signed_amount();
                meta.opening_balance = Some(opening);
                warnings.push(ParseWarning::inferred(format!(
                    "opening balance {opening} derived from the first transaction"
                )));
            }
        }
    }

    match (meta.closing_balance, last_balance) {
        (None, Some(last)) => {
            meta.closing_balance = Some(last);
            warnings.push(ParseWarning::inferred(format!(
                "closing balance {last} taken from the last running balance"
            )));
        }
        (Some(printed), Some(last)) if (printed - last).abs() > tolerance => {
            warnings.push(ParseWarning::mismatch(format!(
                "printed closing balance {printed} differs from last running balance {last}"
            )));
        }
        _ => {}
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;
    use crate::report::WarningKind;
    use rust_decimal_macros::dec;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_hdfc_account_header() {
        let text = lines(
            "HDFC BANK Limited\n\
             Page No .: 1                                   Statement of account\n\
             AccountBranch : SARJAPUR ROAD\n\
             City : BENGALURU 560102                       AccountNo : 50100123456789\n\
             State : KARNATAKA                             AccountType : SAVINGS - REGULAR\n\
             MR. GAURAV CHANCHAL                           AccountStatus : Regular\n\
             Email : Gaurav@Example.com                    RTGS/NEFT IFSC : HDFC0000354 MICR : 560240015\n\
             CustID : 12345678\n\
             From : 01/04/2025 To : 06/02/2026\n",
        );
        let m = extract_metadata(&text, Institution::Hdfc, DocumentKind::BankStatement);

        assert_eq!(m.institution, Some(Institution::Hdfc));
        assert_eq!(m.account_number.as_deref(), Some("50100123456789"));
        assert_eq!(m.account_type.as_deref(), Some("SAVINGS - REGULAR"));
        assert_eq!(m.account_status.as_deref(), Some("Regular"));
        assert_eq!(m.routing_code.as_deref(), Some("HDFC0000354"));
        assert_eq!(m.micr.as_deref(), Some("560240015"));
        assert_eq!(m.customer_id.as_deref(), Some("12345678"));
        assert_eq!(m.email.as_deref(), Some("gaurav@example.com"));
        assert_eq!(m.branch.as_deref(), Some("Sarjapur Road"));
        assert_eq!(m.holder_name.as_deref(), Some("Gaurav Chanchal"));
        assert_eq!(m.address.as_deref(), Some("Bengaluru 560102, Karnataka"));
        assert_eq!(m.period_start, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(m.period_end, NaiveDate::from_ymd_opt(2026, 2, 6));
    }

    #[test]
    fn test_kotak_account_header() {
        let text = lines(
            "Account Statement\n\
             Chanchal Gaurav\n\
             12, 4th Cross, Koramangala\n\
             Bengaluru - 560034\n\
             Karnataka - India\n\
             Account No 1234567890\n\
             Account Type Savings\n\
             IFSC Code KKBK0000958\n\
             07 May 2025 - 07 Feb 2026\n",
        );
        let m = extract_metadata(&text, Institution::Kotak, DocumentKind::BankStatement);

        assert_eq!(m.holder_name.as_deref(), Some("Gaurav Chanchal"));
        assert_eq!(m.account_number.as_deref(), Some("1234567890"));
        assert_eq!(m.account_type.as_deref(), Some("Savings"));
        assert_eq!(m.routing_code.as_deref(), Some("KKBK0000958"));
        assert_eq!(
            m.address.as_deref(),
            Some("12, 4th Cross, Koramangala, Bengaluru - 560034, Karnataka - India")
        );
        assert_eq!(m.period_start, NaiveDate::from_ymd_opt(2025, 5, 7));
        assert_eq!(m.period_end, NaiveDate::from_ymd_opt(2026, 2, 7));
    }

    #[test]
    fn test_name_reversal() {
        assert_eq!(reverse_name_order("Chanchal Gaurav"), "Gaurav Chanchal");
        assert_eq!(reverse_name_order("Sharma Kumar Rahul"), "Rahul Kumar Sharma");
        assert_eq!(reverse_name_order("Acme Technologies"), "Acme Technologies");
        assert_eq!(reverse_name_order("Single"), "Single");
    }

    #[test]
    fn test_card_summary() {
        let text = lines(
            "Card No: 4386 XXXX XXXX 1234\n\
             Payment Due Date : 15/02/2024\n\
             Total Dues : 12,345.00\n\
             Minimum Amount Due : 620.00\n\
             Credit Limit : Rs. 2,00,000.00\n\
             Available Credit Limit : 1,87,655.00\n\
             Reward Points Summary\n\
             Opening Balance   Earned   Redeemed   Expired   Closing Balance\n\
             1,200             345      0          0         1,545\n",
        );
        let m = extract_metadata(&text, Institution::Hdfc, DocumentKind::CreditCardStatement);
        assert_eq!(m.card_number.as_deref(), Some("4386XXXXXXXX1234"));
        assert_eq!(m.payment_due_date, NaiveDate::from_ymd_opt(2024, 2, 15));
        assert_eq!(m.total_due, Some(dec!(12345.00)));
        assert_eq!(m.minimum_due, Some(dec!(620.00)));
        assert_eq!(m.credit_limit, Some(dec!(200000.00)));
        assert_eq!(m.available_credit, Some(dec!(187655.00)));
        assert_eq!(m.reward_points.opening, Some(dec!(1200)));
        assert_eq!(m.reward_points.earned, Some(dec!(345)));
        assert_eq!(m.reward_points.closing, Some(dec!(1545)));
        assert_eq!(m.account_number, None);
        assert_eq!(m.currency.as_deref(), Some("INR"));
    }

    #[test]
    fn test_absent_labels_stay_empty() {
        let m = extract_metadata(&lines("Disclaimer\nNothing here"), Institution::Generic, DocumentKind::BankStatement);
        assert_eq!(m, StatementMetadata::default());
    }

    #[test]
    fn test_reconcile_fills_and_checks() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        let txns = vec![
            CandidateTransaction::new(d(1), "ATM WDL", dec!(500.00), Direction::Debit)
                .with_balance(dec!(4500.00)),
            CandidateTransaction::new(d(9), "SALARY", dec!(1000.00), Direction::Credit)
                .with_balance(dec!(5500.00)),
        ];

        let mut meta = StatementMetadata::default();
        let warnings = reconcile_with_transactions(&mut meta, &txns, dec!(1));
        assert_eq!(meta.period_start, Some(d(1)));
        assert_eq!(meta.period_end, Some(d(9)));
        assert_eq!(meta.opening_balance, Some(dec!(5000.00)));
        assert_eq!(meta.closing_balance, Some(dec!(5500.00)));
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().all(|w| w.kind == WarningKind::MetadataInferred));

        let mut printed = StatementMetadata {
            closing_balance: Some(dec!(9999.00)),
            ..StatementMetadata::default()
        };
        let warnings = reconcile_with_transactions(&mut printed, &txns, dec!(1));
        assert!(warnings.iter().any(|w| w.kind == WarningKind::MetadataMismatch));
        assert_eq!(printed.closing_balance, Some(dec!(9999.00)));
    }
}
