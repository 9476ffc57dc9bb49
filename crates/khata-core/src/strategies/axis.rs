use crate::canonical::{normalize_date, parse_money, resolve_direction};
use crate::extraction::table::{line_spans, split_by_whitespace_gaps};
use crate::extraction::ExtractedText;
use crate::model::{CandidateTransaction, DocumentKind, Institution};
use crate::report::SkippedRow;
use crate::strategies::derive::tag_card_extras;
use crate::strategies::{ParseContext, StatementStrategy, StrategyOutput};
use regex::Regex;
use std::sync::LazyLock;

/// `DD/MM/YYYY  details  [category]  amount Dr|Cr  [cashback Dr|Cr]`
static CARD_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{2}/\d{2}/\d{4})\s+(?P<body>.+?)\s+(?P<amount>[\d,]+\.\d{2})\s*(?P<dir>Dr|Cr|DR|CR)(?:\s+(?P<cashback>[\d,]+\.\d{2})\s*(?:Dr|Cr|DR|CR))?$",
    )
    .unwrap()
});

/// Merchant categories Axis prints in their own column.
const CATEGORIES: &[&str] = &[
    "ONLINE SHOPPING",
    "ELECTRONICS",
    "DEPT STORES",
    "GROCERY",
    "GROCERIES",
    "FOOD",
    "RESTAURANTS",
    "FUEL",
    "TRAVEL",
    "AIRLINES",
    "HOTELS",
    "ENTERTAINMENT",
    "UTILITIES",
    "TELECOM",
    "MEDICAL",
    "HEALTHCARE",
    "EDUCATION",
    "INSURANCE",
    "JEWELLERY",
    "APPAREL",
    "AUTO SERVICES",
    "MISC",
];

/// Character slack when lining a cell up under its header.
const CATEGORY_SLACK: f32 = 3.0;

/// Axis Bank credit card statements.
pub struct AxisCardStatement;

impl StatementStrategy for AxisCardStatement {
    fn institution(&self) -> Institution {
        Institution::Axis
    }

    fn document_kind(&self) -> DocumentKind {
        DocumentKind::CreditCardStatement
    }

    fn parse(&self, text: &ExtractedText, _ctx: &ParseContext<'_>) -> StrategyOutput {
        let mut out = StrategyOutput::default();
        let mut category_col = None;

        for raw in text.lines() {
            let line = raw.trim();
            let Some(caps) = CARD_ROW.captures(line) else {
                if let Some(col) = category_column(&raw) {
                    category_col = Some(col);
                }
                continue;
            };
            let date = match normalize_date(&caps["date"], Some("DD/MM/YYYY")) {
                Ok(d) => d,
                Err(e) => {
                    out.skipped_rows.push(SkippedRow::new(line, e.to_string()));
                    continue;
                }
            };
            let Some(amount) = parse_money(&caps["amount"]) else {
                out.skipped_rows.push(SkippedRow::new(line, "zero amount"));
                continue;
            };

            let details = strip_category(&raw, &caps["body"], category_col);

            let hint = resolve_direction(Some(&caps["dir"]), None, &details);
            let mut txn = CandidateTransaction::new(date, details, amount, hint.direction);
            txn.extras.reward_points = caps.name("cashback").and_then(|c| parse_money(c.as_str()));
            tag_card_extras(&mut txn);
            out.transactions.push(txn);
        }

        if out.transactions.is_empty() && out.skipped_rows.is_empty() {
            return StrategyOutput::no_anchor("no Axis card transaction rows found");
        }
        out
    }
}

/// Column where a `MERCHANT CATEGORY` header starts, if `line` is one.
fn category_column(line: &str) -> Option<f32> {
    line_spans(line)
        .into_iter()
        .find(|s| s.text.to_uppercase().contains("CATEGORY"))
        .map(|s| s.start)
}

/// Details text without the trailing category cell. The last segment is a
/// category only when it sits under the category header or names a known
/// category.
fn strip_category(raw: &str, body: &str, category_col: Option<f32>) -> String {
    let segments = split_by_whitespace_gaps(body);
    let Some((last, rest)) = segments.split_last() else {
        return body.trim().to_string();
    };
    if rest.is_empty() {
        return body.trim().to_string();
    }

    let aligned = category_col.is_some_and(|col| {
        line_spans(raw)
            .iter()
            .any(|s| s.text == *last && (s.start - col).abs() <= CATEGORY_SLACK)
    });
    if aligned || CATEGORIES.contains(&last.to_uppercase().as_str()) {
        rest.join(" ")
    } else {
        body.trim().to_string()
    }
}
