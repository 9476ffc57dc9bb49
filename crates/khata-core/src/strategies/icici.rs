//! ICICI Bank: spreadsheet account exports and credit card statements.

use crate::canonical::{normalize_date, parse_money, resolve_direction};
use crate::extraction::{ExtractedText, Layout};
use crate::model::{CandidateTransaction, DocumentKind, Institution};
use crate::report::SkippedRow;
use crate::strategies::derive::{reward_points, tag_card_extras};
use crate::strategies::tabular::{parse_table, TableRules};
use crate::strategies::{ParseContext, StatementStrategy, StrategyOutput};
use regex::Regex;
use std::sync::LazyLock;

/// `DD/MM/YYYY  serial  details  [points]  amount [CR]`
static CARD_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{2}/\d{2}/\d{4})\s+(?P<serial>\d{8,12})\s+(?P<desc>.+?)(?:\s{2,}(?P<points>-?\d[\d,]*))?\s+(?P<amount>[\d,]+\.\d{2})(?:\s*(?P<cr>CR|Cr))?$",
    )
    .unwrap()
});

const BANK_END_MARKERS: &[&str] = &["legends", "total:", "this is a system generated"];

pub struct IciciBankStatement;

impl StatementStrategy for IciciBankStatement {
    fn institution(&self) -> Institution {
        Institution::Icici
    }

    fn document_kind(&self) -> DocumentKind {
        DocumentKind::BankStatement
    }

    fn preferred_layout(&self) -> Layout {
        Layout::Cells
    }

    fn parse(&self, text: &ExtractedText, ctx: &ParseContext<'_>) -> StrategyOutput {
        let rules = TableRules {
            end_markers: BANK_END_MARKERS,
            ..TableRules::new(ctx.settings.tabular.blank_run)
        };
        parse_table(text, &rules).into_output(false, "ICICI account statement")
    }
}

pub struct IciciCardStatement;

impl StatementStrategy for IciciCardStatement {
    fn institution(&self) -> Institution {
        Institution::Icici
    }

    fn document_kind(&self) -> DocumentKind {
        DocumentKind::CreditCardStatement
    }

    fn parse(&self, text: &ExtractedText, _ctx: &ParseContext<'_>) -> StrategyOutput {
        let mut out = StrategyOutput::default();

        for raw in text.lines() {
            let line = raw.trim();
            let Some(caps) = CARD_ROW.captures(line) else {
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

            let desc = caps["desc"].trim();
            let marker = if caps.name("cr").is_some() { "cr" } else { "dr" };
            let hint = resolve_direction(Some(marker), None, desc);

            let mut txn = CandidateTransaction::new(date, desc, amount, hint.direction);
            txn.reference_number = Some(caps["serial"].to_string());
            txn.extras.reward_points = caps.name("points").and_then(|p| reward_points(p.as_str()));
            tag_card_extras(&mut txn);
            out.transactions.push(txn);
        }

        if out.transactions.is_empty() && out.skipped_rows.is_empty() {
            return StrategyOutput::no_anchor("no ICICI card transaction rows found");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{CellGrid, PageContent};
    use crate::model::Direction;
    use crate::settings::schema::Settings;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ctx(settings: &Settings, kind: DocumentKind) -> ParseContext<'_> {
        ParseContext {
            settings,
            institution: Institution::Icici,
            kind,
        }
    }

    #[test]
    fn test_account_export() {
        let rows: Vec<Vec<String>> = [
            vec!["", "DETAILED STATEMENT", "", "", "", "", "", ""],
            vec!["S No.", "Value Date", "Transaction Date", "Cheque Number", "Transaction Remarks", "Withdrawal Amount (INR )", "Deposit Amount (INR )", "Balance (INR )"],
            vec!["1", "01/03/2024", "01/03/2024", "-", "UPI/402812345678/GROCERY", "350.00", "0.00", "9,650.00"],
            vec!["2", "02/03/2024", "02/03/2024", "-", "NEFT-SALARY MARCH", "0.00", "50,000.00", "59,650.00"],
            vec!["", "", "", "", "", "", "", ""],
            vec!["", "", "", "", "", "", "", ""],
            vec!["Legends Used in Account Statement", "", "", "", "", "", "", ""],
        ]
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
        let text = ExtractedText::Cells(vec![CellGrid {
            name: "OpTransactionHistory".into(),
            rows,
        }]);
        let settings = Settings::default();
        let out = IciciBankStatement.parse(&text, &ctx(&settings, DocumentKind::BankStatement));

        assert_eq!(out.transactions.len(), 2);
        let first = &out.transactions[0];
        assert_eq!(first.extras.serial, Some(1));
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(first.direction, Direction::Debit);
        assert_eq!(first.reference_number, None);
        assert_eq!(out.transactions[1].amount, dec!(50000.00));
        assert_eq!(out.transactions[1].direction, Direction::Credit);
    }

    #[test]
    fn test_card_statement() {
        let text = ExtractedText::Lines(vec![PageContent::new(
            1,
            vec![
                "Date        SerNo.       Transaction Details                 Reward Points   Amount (in`)".into(),
                "12/01/2024  7654321098   AMAZON PAY INDIA MUMBAI IN          24              1,200.00".into(),
                "15/01/2024  7654321099   BBPS PAYMENT RECEIVED               0               5,000.00 CR".into(),
            ],
        )]);
        let settings = Settings::default();
        let out = IciciCardStatement.parse(&text, &ctx(&settings, DocumentKind::CreditCardStatement));

        assert_eq!(out.transactions.len(), 2);
        let spend = &out.transactions[0];
        assert_eq!(spend.reference_number.as_deref(), Some("7654321098"));
        assert_eq!(spend.extras.reward_points, Some(dec!(24)));
        assert_eq!(spend.extras.merchant_location.as_ref().unwrap().country, "IN");
        assert_eq!(spend.direction, Direction::Debit);
        assert_eq!(out.transactions[1].direction, Direction::Credit);
        assert_eq!(out.transactions[1].extras.reward_points, None);
    }
}
