//! HDFC Bank savings/current statements and credit card statements.

use crate::canonical::{normalize_date, parse_money, resolve_direction};
use crate::extraction::ExtractedText;
use crate::model::{CandidateTransaction, DocumentKind, Institution};
use crate::report::SkippedRow;
use crate::strategies::accumulate::{append_continuation, is_noise, is_summary_banner};
use crate::strategies::derive::{reward_points, tag_card_extras};
use crate::strategies::tabular::{parse_table, TableRules};
use crate::strategies::{ParseContext, StatementStrategy, StrategyOutput};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// `DD/MM/YY  narration  [ref]  DD/MM/YY  amount [amount] balance`
static BANK_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{2}/\d{2}/\d{2})\s+(?P<narration>.+?)(?:\s+(?P<reference>[0-9A-Z]{10,}))?\s+(?P<value_date>\d{2}/\d{2}/\d{2})\s+(?P<amounts>[\d,]+\.\d{2}(?:\s+[\d,]+\.\d{2}){0,2})$",
    )
    .unwrap()
});

static DATE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{2}(?:\d{2})?\b").unwrap());

/// `DD/MM/YYYY [HH:MM:SS]  description  [points]  amount [Cr]`
static CARD_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{2}/\d{2}/\d{4})(?:\s+\d{2}:\d{2}(?::\d{2})?)?\s+(?P<desc>.+?)(?:\s{2,}(?P<points>-?\s?\d[\d,]*))?\s+(?P<amount>[\d,]+\.\d{2})(?:\s*(?P<cr>Cr|CR|cr))?$",
    )
    .unwrap()
});

static HOLDER_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z.]*(?:\s+[A-Z][A-Z.]*){1,3}$").unwrap());

const BANK_NOISE: &[&str] = &[
    "hdfc bank limited",
    "hdfc bank ltd",
    "pageno",
    "page no",
    "closing balance includes",
    "state account branch",
    "*closing balance",
];

const BANK_END_MARKERS: &[&str] = &["statement summary", "opening balance dr count"];

const HEADING_WORDS: &[&str] = &[
    "TRANSACTIONS",
    "TRANSACTION",
    "SUMMARY",
    "STATEMENT",
    "TOTAL",
    "POINTS",
    "DOMESTIC",
    "INTERNATIONAL",
    "PAYMENT",
    "AMOUNT",
    "REWARD",
    "EMI",
];

/// Below this many text-grammar rows the column engine gets a second look.
const MIN_TEXT_ROWS: usize = 5;

pub struct HdfcBankStatement;

impl StatementStrategy for HdfcBankStatement {
    fn institution(&self) -> Institution {
        Institution::Hdfc
    }

    fn document_kind(&self) -> DocumentKind {
        DocumentKind::BankStatement
    }

    fn parse(&self, text: &ExtractedText, ctx: &ParseContext<'_>) -> StrategyOutput {
        let rules = TableRules {
            end_markers: BANK_END_MARKERS,
            date_hint: Some("DD/MM/YY"),
            ..TableRules::new(ctx.settings.tabular.blank_run)
        };

        match text {
            ExtractedText::Cells(_) => parse_table(text, &rules).into_output(false, "HDFC statement"),
            ExtractedText::Lines(_) => {
                let from_text = parse_bank_lines(text);
                if from_text.transactions.len() >= MIN_TEXT_ROWS {
                    return from_text;
                }
                let from_table = parse_table(text, &rules);
                if from_table.transactions.len() > from_text.transactions.len() {
                    debug!(
                        text_rows = from_text.transactions.len(),
                        table_rows = from_table.transactions.len(),
                        "using column layout for HDFC statement"
                    );
                    return from_table.into_output(false, "HDFC statement");
                }
                if from_text.transactions.is_empty() && from_text.skipped_rows.is_empty() {
                    return StrategyOutput::no_anchor("no HDFC transaction rows found");
                }
                from_text
            }
        }
    }
}

fn parse_bank_lines(text: &ExtractedText) -> StrategyOutput {
    let mut out = StrategyOutput::default();
    let ExtractedText::Lines(pages) = text else {
        return out;
    };

    for page in pages {
        // Page furniture repeats at the top of each page; only lines that
        // follow a transaction on the same page can continue it.
        let mut accepting = false;
        for raw in &page.lines {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if is_summary_banner(line) {
                accepting = false;
                continue;
            }

            if let Some(caps) = BANK_ROW.captures(line) {
                match bank_row(&caps) {
                    Ok(txn) => {
                        out.transactions.push(txn);
                        accepting = true;
                    }
                    Err(reason) => {
                        out.skipped_rows.push(SkippedRow::new(line, reason));
                        accepting = false;
                    }
                }
                continue;
            }

            if DATE_START.is_match(line) {
                out.skipped_rows
                    .push(SkippedRow::new(line, "unrecognised row layout"));
                accepting = false;
                continue;
            }

            let lower = line.to_lowercase();
            if lower.contains("narration") && lower.contains("date") {
                accepting = false;
                continue;
            }

            if accepting && !is_noise(line, BANK_NOISE) {
                if let Some(last) = out.transactions.last_mut() {
                    append_continuation(&mut last.description, line);
                }
            }
        }
    }

    out
}

fn bank_row(caps: &regex::Captures<'_>) -> Result<CandidateTransaction, String> {
    let date = normalize_date(&caps["date"], Some("DD/MM/YY")).map_err(|e| e.to_string())?;
    let narration = caps["narration"].trim();
    let amounts: Vec<_> = caps["amounts"]
        .split_whitespace()
        .map(|a| parse_money(a).unwrap_or_default())
        .collect();

    let (amount, explicit, balance) = match amounts.as_slice() {
        [amount, balance] => (*amount, None, *balance),
        [withdrawal, deposit, balance] => {
            if !withdrawal.is_zero() {
                (*withdrawal, Some("dr"), *balance)
            } else {
                (*deposit, Some("cr"), *balance)
            }
        }
        _ => return Err("missing amount or balance".into()),
    };
    if amount.is_zero() {
        return Err("zero amount".into());
    }

    let hint = resolve_direction(explicit, None, narration);
    let mut txn = CandidateTransaction::new(date, narration, amount, hint.direction).with_balance(balance);
    txn.value_date = normalize_date(&caps["value_date"], Some("DD/MM/YY")).ok();
    txn.reference_number = caps
        .name("reference")
        .map(|m| m.as_str())
        .filter(|r| !r.chars().all(|c| c == '0'))
        .map(str::to_string);
    Ok(txn)
}

pub struct HdfcCardStatement;

impl StatementStrategy for HdfcCardStatement {
    fn institution(&self) -> Institution {
        Institution::Hdfc
    }

    fn document_kind(&self) -> DocumentKind {
        DocumentKind::CreditCardStatement
    }

    fn parse(&self, text: &ExtractedText, _ctx: &ParseContext<'_>) -> StrategyOutput {
        let mut out = StrategyOutput::default();
        let mut in_table = false;
        let mut holder: Option<String> = None;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let lower = line.to_lowercase();
            if lower.contains("transaction description") || (lower.starts_with("date") && lower.contains("amount")) {
                in_table = true;
                continue;
            }
            if !in_table {
                continue;
            }

            if let Some(caps) = CARD_ROW.captures(line) {
                match card_row(&caps) {
                    Ok(mut txn) => {
                        txn.extras.card_holder = holder.clone();
                        out.transactions.push(txn);
                    }
                    Err(reason) => out.skipped_rows.push(SkippedRow::new(line, reason)),
                }
                continue;
            }

            if is_holder_heading(line) {
                holder = Some(line.to_string());
            }
        }

        if out.transactions.is_empty() && out.skipped_rows.is_empty() {
            return StrategyOutput::no_anchor("no HDFC card transaction table found");
        }
        out
    }
}

fn card_row(caps: &regex::Captures<'_>) -> Result<CandidateTransaction, String> {
    let date = normalize_date(&caps["date"], Some("DD/MM/YYYY")).map_err(|e| e.to_string())?;
    let amount = parse_money(&caps["amount"]).ok_or("zero amount")?;
    let credit = caps.name("cr").is_some();
    let desc = caps["desc"].trim();

    let hint = resolve_direction(Some(if credit { "cr" } else { "dr" }), None, desc);
    let mut txn = CandidateTransaction::new(date, desc, amount, hint.direction);
    txn.extras.reward_points = caps
        .name("points")
        .and_then(|p| reward_points(&p.as_str().replace(' ', "")));
    tag_card_extras(&mut txn);
    Ok(txn)
}

fn is_holder_heading(line: &str) -> bool {
    HOLDER_HEADING.is_match(line)
        && !line
            .split_whitespace()
            .any(|w| HEADING_WORDS.contains(&w.trim_end_matches('.')))
}
