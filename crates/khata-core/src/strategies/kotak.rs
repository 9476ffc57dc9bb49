//! Kotak Mahindra Bank account statements.
//!
//! The PDF text layer glues the row serial to the transaction date
//! (`108.01.2026` is row 1 on 08.01.2026) and the amount to the running
//! balance (`5000.006160.16`), so rows are split positionally on the
//! two-decimal boundaries rather than on whitespace.

use crate::canonical::{normalize_date, parse_money, resolve_direction, DrCr};
use crate::extraction::ExtractedText;
use crate::model::{CandidateTransaction, Direction, DocumentKind, Institution, StatementMetadata};
use crate::report::SkippedRow;
use crate::strategies::accumulate::{append_continuation, is_noise, is_summary_banner};
use crate::strategies::derive::{apply_sweeps, sweep_direction};
use crate::strategies::tabular::{parse_balance, parse_table, TableRules};
use crate::strategies::{ParseContext, StatementStrategy, StrategyOutput};
use chrono::NaiveDate;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use std::sync::LazyLock;

/// Serial fused to a dotted date, optionally followed by the narration.
static FUSED_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<serial>\d{1,3})(?P<date>\d{2}\.\d{2}\.\d{4})(?:\s+(?P<rest>.*))?$").unwrap()
});

/// Serial and a `DD Mon YYYY` date in separate columns.
static SPACED_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<serial>\d{1,3})\s+(?P<date>\d{1,2}\s+[A-Za-z]{3}\s+\d{4})(?:\s+(?P<rest>.*))?$")
        .unwrap()
});

/// Amount then balance at the end of a line, each with an optional
/// `(Dr)`/`(Cr)` marker, possibly with no gap between them.
static AMOUNTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<desc>.*?)\s*(?P<amount>\d[\d,]*\.\d{2})\s*(?:\((?P<marker>Dr|Cr|DR|CR)\))?\s*(?P<balance>-?\d[\d,]*\.\d{2})\s*(?P<bmarker>\((?:Dr|Cr|DR|CR)\))?$",
    )
    .unwrap()
});

static OPENING_BALANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)opening\s+balance\b.*?(?P<balance>-?\d[\d,]*\.\d{2}\s*(?:\((?:dr|cr)\))?)\s*$")
        .unwrap()
});

const KOTAK_NOISE: &[&str] = &[
    "kotak mahindra bank",
    "cust.reln.no",
    "crn",
    "account no",
    "period",
    "nominee",
    "end of statement",
];

pub struct KotakBankStatement;

impl StatementStrategy for KotakBankStatement {
    fn institution(&self) -> Institution {
        Institution::Kotak
    }

    fn document_kind(&self) -> DocumentKind {
        DocumentKind::BankStatement
    }

    fn parse(&self, text: &ExtractedText, ctx: &ParseContext<'_>) -> StrategyOutput {
        let mut out = match text {
            ExtractedText::Cells(_) => {
                let table = parse_table(text, &TableRules::new(ctx.settings.tabular.blank_run));
                let opening = table.opening_balance;
                let mut out = table.into_output(false, "Kotak statement");
                out.metadata = Some(StatementMetadata {
                    opening_balance: opening,
                    ..StatementMetadata::default()
                });
                out
            }
            ExtractedText::Lines(_) => parse_lines(text),
        };

        let sweep_balance = apply_sweeps(&mut out.transactions);
        if let Some(metadata) = out.metadata.as_mut() {
            metadata.sweep_balance = sweep_balance;
        }
        out
    }
}

struct PendingRow {
    serial: Option<u32>,
    date: NaiveDate,
    description: String,
    source: String,
}

fn parse_lines(text: &ExtractedText) -> StrategyOutput {
    let mut out = StrategyOutput::default();
    let mut metadata = StatementMetadata::default();
    let mut pending: Option<PendingRow> = None;
    let mut anchors_seen = false;

    let ExtractedText::Lines(pages) = text else {
        return out;
    };

    for page in pages {
        let mut accepting = false;
        for raw in &page.lines {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = OPENING_BALANCE.captures(line) {
                metadata.opening_balance = metadata
                    .opening_balance
                    .or_else(|| parse_balance(&caps["balance"]));
                continue;
            }

            if let Some(caps) = FUSED_ANCHOR
                .captures(line)
                .or_else(|| SPACED_ANCHOR.captures(line))
            {
                anchors_seen = true;
                if let Some(stale) = pending.take() {
                    out.skipped_rows
                        .push(SkippedRow::new(stale.source, "no amount before next row"));
                }
                let date = match normalize_date(&caps["date"], None) {
                    Ok(d) => d,
                    Err(e) => {
                        out.skipped_rows.push(SkippedRow::new(line, e.to_string()));
                        accepting = false;
                        continue;
                    }
                };
                let mut row = PendingRow {
                    serial: caps["serial"].parse().ok(),
                    date,
                    description: String::new(),
                    source: line.to_string(),
                };
                let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
                match AMOUNTS.captures(rest) {
                    Some(amounts) => {
                        append_continuation(&mut row.description, &amounts["desc"]);
                        accepting = finish_row(row, &amounts, &mut out);
                    }
                    None => {
                        append_continuation(&mut row.description, rest);
                        pending = Some(row);
                    }
                }
                continue;
            }

            if is_summary_banner(line) {
                if let Some(stale) = pending.take() {
                    out.skipped_rows
                        .push(SkippedRow::new(stale.source, "no amount before summary"));
                }
                accepting = false;
                continue;
            }

            let lower = line.to_lowercase();
            if lower.contains("date") && (lower.contains("narration") || lower.contains("description")) {
                accepting = false;
                continue;
            }
            if is_noise(line, KOTAK_NOISE) {
                continue;
            }

            if let Some(mut row) = pending.take() {
                match AMOUNTS.captures(line) {
                    Some(amounts) => {
                        append_continuation(&mut row.description, &amounts["desc"]);
                        row.source.push('\n');
                        row.source.push_str(line);
                        accepting = finish_row(row, &amounts, &mut out);
                    }
                    None => {
                        append_continuation(&mut row.description, line);
                        row.source.push('\n');
                        row.source.push_str(line);
                        pending = Some(row);
                    }
                }
                continue;
            }

            if accepting {
                if let Some(last) = out.transactions.last_mut() {
                    append_continuation(&mut last.description, line);
                }
            }
        }
    }

    if let Some(stale) = pending.take() {
        out.skipped_rows
            .push(SkippedRow::new(stale.source, "no amount before end of text"));
    }

    if !anchors_seen {
        let mut empty = StrategyOutput::no_anchor("no Kotak serial/date rows found");
        empty.metadata = Some(metadata);
        return empty;
    }
    out.metadata = Some(metadata);
    out
}

/// Complete a pending row. Returns whether following lines may continue it.
fn finish_row(row: PendingRow, amounts: &Captures<'_>, out: &mut StrategyOutput) -> bool {
    let Some(amount) = parse_money(&amounts["amount"]) else {
        out.skipped_rows.push(SkippedRow::new(row.source, "zero amount"));
        return false;
    };
    let Some(balance) = parse_balance(&format!(
        "{}{}",
        &amounts["balance"],
        amounts.name("bmarker").map(|m| m.as_str()).unwrap_or("")
    )) else {
        out.skipped_rows.push(SkippedRow::new(row.source, "missing balance"));
        return false;
    };

    let marker = amounts.name("marker").map(|m| {
        if m.as_str().eq_ignore_ascii_case("cr") {
            DrCr::Cr
        } else {
            DrCr::Dr
        }
    });
    let sweep = sweep_direction(&row.description).map(|d| match d {
        Direction::Credit => "cr",
        Direction::Debit => "dr",
    });
    let hint = resolve_direction(sweep, marker, &row.description);

    let mut txn = CandidateTransaction::new(row.date, row.description, amount, hint.direction)
        .with_balance(balance);
    txn.extras.serial = row.serial;
    out.transactions.push(txn);
    true
}

/// Running balance plus the amount parked in the linked sweep deposit.
pub fn effective_balance(txn: &CandidateTransaction) -> Option<Decimal> {
    let balance = txn.running_balance?;
    Some(balance + txn.extras.sweep_adjustment.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::PageContent;
    use crate::settings::schema::Settings;
    use rust_decimal_macros::dec;

    fn parse(lines: &[&str]) -> StrategyOutput {
        let text = ExtractedText::Lines(vec![PageContent::new(
            1,
            lines.iter().map(|l| l.to_string()).collect(),
        )]);
        let settings = Settings::default();
        let ctx = ParseContext {
            settings: &settings,
            institution: Institution::Kotak,
            kind: DocumentKind::BankStatement,
        };
        KotakBankStatement.parse(&text, &ctx)
    }

    #[test]
    fn test_fused_serial_date_and_amounts() {
        let out = parse(&[
            "#  Date  Description  Chq/Ref No.  Withdrawal (Dr)  Deposit (Cr)  Balance",
            "Opening Balance 1,160.16",
            "108.01.2026",
            "NEFT CR-ACME TECHNOLOGIES",
            "SALARY JAN",
            "5000.006160.16",
        ]);
        assert_eq!(out.transactions.len(), 1);
        let txn = &out.transactions[0];
        assert_eq!(txn.extras.serial, Some(1));
        assert_eq!(txn.date, NaiveDate::from_ymd_opt(2026, 1, 8).unwrap());
        assert_eq!(txn.amount, dec!(5000.00));
        assert_eq!(txn.running_balance, Some(dec!(6160.16)));
        assert_eq!(txn.description, "NEFT CR-ACME TECHNOLOGIES SALARY JAN");
        assert_eq!(txn.direction, Direction::Credit);
        assert_eq!(
            out.metadata.as_ref().unwrap().opening_balance,
            Some(dec!(1160.16))
        );
    }

    #[test]
    fn test_markers_and_single_line_rows() {
        let out = parse(&[
            "1 01 Feb 2026 UPI/SWIGGY/402812345678 250.00(Dr) 5,910.16(Cr)",
            "209.02.2026 IMPS-RAHUL 1,000.00(Cr)6,910.16(Cr)",
            "   REF 998877",
        ]);
        assert_eq!(out.transactions.len(), 2);
        assert_eq!(out.transactions[0].direction, Direction::Debit);
        assert_eq!(out.transactions[0].running_balance, Some(dec!(5910.16)));
        assert_eq!(out.transactions[0].description, "UPI/SWIGGY/402812345678");
        assert_eq!(out.transactions[1].extras.serial, Some(2));
        assert_eq!(out.transactions[1].direction, Direction::Credit);
        assert_eq!(out.transactions[1].description, "IMPS-RAHUL REF 998877");
    }

    #[test]
    fn test_sweeps_tracked_without_touching_balance() {
        let out = parse(&[
            "110.01.2026 SWEEP TRANSFER TO [9988776655] 50,000.0010,000.00",
            "211.01.2026 UPI/RENT 2,000.008,000.00",
            "312.01.2026 SWEEP TRANSFER FROM [9988776655] 5,000.0013,000.00",
        ]);
        assert_eq!(out.transactions.len(), 3);
        assert_eq!(out.transactions[0].direction, Direction::Debit);
        assert_eq!(out.transactions[1].running_balance, Some(dec!(8000.00)));
        assert_eq!(out.transactions[1].extras.sweep_adjustment, Some(dec!(50000.00)));
        assert_eq!(effective_balance(&out.transactions[1]), Some(dec!(58000.00)));
        assert_eq!(out.transactions[2].direction, Direction::Credit);
        assert_eq!(
            out.metadata.as_ref().unwrap().sweep_balance,
            Some(dec!(45000.00))
        );
    }

    #[test]
    fn test_row_without_amount_is_skipped() {
        let out = parse(&[
            "108.01.2026 BROKEN ROW",
            "209.01.2026 ATM WDL 500.005,660.16",
        ]);
        assert_eq!(out.transactions.len(), 1);
        assert_eq!(out.skipped_rows.len(), 1);
        assert_eq!(out.transactions[0].extras.serial, Some(2));
    }

    #[test]
    fn test_no_anchor() {
        let out = parse(&["Kotak Mahindra Bank", "Terms and conditions"]);
        assert!(out.transactions.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }
}
