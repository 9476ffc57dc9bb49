//! Loan amortization schedules and EMI reconciliation.

use crate::canonical::{normalize_amount, normalize_date};
use crate::extraction::ExtractedText;
use crate::model::{
    CandidateTransaction, Direction, DocumentKind, EmiTenure, Institution, LoanInstallment,
    LoanSchedule,
};
use crate::report::SkippedRow;
use crate::settings::schema::EmiMatchSettings;
use crate::strategies::{ParseContext, StatementStrategy, StrategyOutput};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// Installment number, due date, then the numeric columns.
static SCHEDULE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<number>\d{1,3})\s+(?P<date>\d{1,2}[-/.](?:\d{1,2}|[A-Za-z]{3})[-/.]\d{2,4}|\d{1,2}\s+[A-Za-z]{3}\s+\d{4})\s+(?P<numbers>.+)$",
    )
    .unwrap()
});

/// Opening principal, installment, principal, interest, closing principal.
const REQUIRED_COLUMNS: usize = 5;

pub struct LoanScheduleStrategy;

impl StatementStrategy for LoanScheduleStrategy {
    fn institution(&self) -> Institution {
        Institution::Generic
    }

    fn document_kind(&self) -> DocumentKind {
        DocumentKind::LoanSchedule
    }

    fn parse(&self, text: &ExtractedText, _ctx: &ParseContext<'_>) -> StrategyOutput {
        let mut out = StrategyOutput::default();
        let mut installments = Vec::new();

        for raw in text.lines() {
            let line = raw.trim();
            let Some(caps) = SCHEDULE_ROW.captures(line) else {
                continue;
            };
            match schedule_row(&caps) {
                Ok(row) => installments.push(row),
                Err(reason) => out.skipped_rows.push(SkippedRow::new(line, reason)),
            }
        }

        if installments.is_empty() {
            let mut empty = StrategyOutput::no_anchor("no amortization rows found");
            empty.skipped_rows = out.skipped_rows;
            return empty;
        }

        let tenure = installments.iter().map(|i| i.number).max().unwrap_or(0);
        out.transactions = installments
            .iter()
            .map(|i| {
                let mut txn = CandidateTransaction::new(
                    i.due_date,
                    format!("EMI {}/{}", i.number, tenure),
                    i.installment,
                    Direction::Debit,
                );
                txn.extras.is_emi = true;
                txn.extras.emi = Some(EmiTenure {
                    installment: i.number,
                    tenure,
                });
                txn
            })
            .collect();
        debug!(installments = installments.len(), "loan schedule parsed");
        out.schedule = Some(LoanSchedule { installments });
        out
    }
}

fn schedule_row(caps: &regex::Captures<'_>) -> Result<LoanInstallment, String> {
    let number: u32 = caps["number"]
        .parse()
        .map_err(|_| format!("bad installment number '{}'", &caps["number"]))?;
    let due_date = normalize_date(&caps["date"], None).map_err(|e| e.to_string())?;

    let mut numbers = Vec::new();
    for token in caps["numbers"].split_whitespace() {
        let token = token.trim_end_matches('%');
        let parsed = normalize_amount(token).map_err(|e| e.to_string())?;
        numbers.push(parsed.value);
    }
    if numbers.len() < REQUIRED_COLUMNS {
        return Err(format!(
            "expected at least {REQUIRED_COLUMNS} amounts, found {}",
            numbers.len()
        ));
    }

    Ok(LoanInstallment {
        number,
        due_date,
        opening_principal: numbers[0],
        installment: numbers[1],
        principal: numbers[2],
        interest: numbers[3],
        closing_principal: numbers[4],
        rate: numbers.get(5).copied(),
    })
}

/// Where one scheduled installment stands against recorded payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid {
        payment_index: usize,
        paid_on: NaiveDate,
    },
    Overdue,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentStatus {
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    #[serde(flatten)]
    pub status: PaymentStatus,
}

/// Match recorded debits to schedule rows.
///
/// A payment matches an installment when it falls within the date window
/// and its amount is within the larger of the absolute and percentage
/// tolerances. The closest date wins and each payment is used at most once.
/// Unmatched rows due before `as_of` are overdue; the rest are upcoming.
pub fn reconcile(
    schedule: &LoanSchedule,
    payments: &[CandidateTransaction],
    as_of: NaiveDate,
    settings: &EmiMatchSettings,
) -> Vec<InstallmentStatus> {
    let mut used = vec![false; payments.len()];

    schedule
        .installments
        .iter()
        .map(|inst| {
            let tolerance = settings
                .amount_tolerance
                .max(inst.installment * settings.amount_tolerance_pct);

            let best = payments
                .iter()
                .enumerate()
                .filter(|(i, p)| {
                    !used[*i]
                        && p.direction == Direction::Debit
                        && (p.amount - inst.installment).abs() <= tolerance
                })
                .map(|(i, p)| (i, (p.date - inst.due_date).num_days().abs(), p.date))
                .filter(|(_, gap, _)| *gap <= settings.window_days)
                .min_by_key(|(i, gap, _)| (*gap, *i));

            let status = match best {
                Some((index, _, paid_on)) => {
                    used[index] = true;
                    PaymentStatus::Paid {
                        payment_index: index,
                        paid_on,
                    }
                }
                None if inst.due_date < as_of => PaymentStatus::Overdue,
                None => PaymentStatus::Upcoming,
            };

            InstallmentStatus {
                number: inst.number,
                due_date: inst.due_date,
                amount: inst.installment,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::PageContent;
    use crate::settings::schema::Settings;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule_text() -> ExtractedText {
        ExtractedText::Lines(vec![PageContent::new(
            1,
            vec![
                "Inst No  Due Date     Opening Principal  EMI        Principal  Interest  Closing Principal  ROI".into(),
                "1        05/01/2024   500,000.00         10,624.00  6,457.00   4,167.00  493,543.00         10.00%".into(),
                "2        05/02/2024   493,543.00         10,624.00  6,511.00   4,113.00  487,032.00         10.00%".into(),
                "3        05/03/2024   487,032.00         10,624.00  6,565.00   4,059.00  480,467.00         10.00%".into(),
                "Total    31,872.00".into(),
            ],
        )])
    }

    fn parse_schedule() -> StrategyOutput {
        let settings = Settings::default();
        let ctx = ParseContext {
            settings: &settings,
            institution: Institution::Generic,
            kind: DocumentKind::LoanSchedule,
        };
        LoanScheduleStrategy.parse(&schedule_text(), &ctx)
    }

    #[test]
    fn test_parse_schedule() {
        let out = parse_schedule();
        let schedule = out.schedule.unwrap();
        assert_eq!(schedule.installments.len(), 3);
        let first = &schedule.installments[0];
        assert_eq!(first.due_date, date(2024, 1, 5));
        assert_eq!(first.opening_principal, dec!(500000.00));
        assert_eq!(first.installment, dec!(10624.00));
        assert_eq!(first.closing_principal, dec!(493543.00));
        assert_eq!(first.rate, Some(dec!(10.00)));

        assert_eq!(out.transactions.len(), 3);
        assert_eq!(out.transactions[1].description, "EMI 2/3");
        assert!(out.transactions[1].extras.is_emi);
    }

    #[test]
    fn test_reconcile() {
        let schedule = parse_schedule().schedule.unwrap();
        let payments = vec![
            CandidateTransaction::new(date(2024, 1, 7), "NACH LOAN EMI", dec!(10624.00), Direction::Debit),
            CandidateTransaction::new(date(2024, 1, 30), "NACH LOAN EMI", dec!(10624.50), Direction::Debit),
            CandidateTransaction::new(date(2024, 2, 6), "NACH REVERSAL", dec!(10624.00), Direction::Credit),
        ];
        let statuses = reconcile(&schedule, &payments, date(2024, 2, 20), &EmiMatchSettings::default());

        assert_eq!(
            statuses[0].status,
            PaymentStatus::Paid {
                payment_index: 0,
                paid_on: date(2024, 1, 7)
            }
        );
        assert_eq!(
            statuses[1].status,
            PaymentStatus::Paid {
                payment_index: 1,
                paid_on: date(2024, 1, 30)
            }
        );
        assert_eq!(statuses[2].status, PaymentStatus::Upcoming);
    }

    #[test]
    fn test_reconcile_overdue_outside_window() {
        let schedule = parse_schedule().schedule.unwrap();
        let payments = vec![CandidateTransaction::new(
            date(2024, 1, 25),
            "LOAN EMI",
            dec!(10624.00),
            Direction::Debit,
        )];
        let statuses = reconcile(&schedule, &payments, date(2024, 4, 1), &EmiMatchSettings::default());
        assert_eq!(statuses[0].status, PaymentStatus::Overdue);
        assert_eq!(statuses[2].status, PaymentStatus::Overdue);
        assert!(matches!(statuses[1].status, PaymentStatus::Paid { .. }));
    }
}
