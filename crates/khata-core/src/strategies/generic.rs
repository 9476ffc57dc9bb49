//! Fallback for unidentified issuers.
//!
//! Tries the column engine first; without a header row it falls back to a
//! relaxed line heuristic: a leading date, trailing two-decimal amounts and
//! an optional CR/DR suffix. Every direction not backed by a column or
//! suffix is flagged.

use crate::canonical::{normalize_amount, normalize_date, resolve_direction, ParsedAmount};
use crate::extraction::{ExtractedText, PageContent};
use crate::model::{CandidateTransaction, DocumentKind, FlagKind, Institution, ValidationFlag};
use crate::report::SkippedRow;
use crate::strategies::accumulate::{append_continuation, is_noise, is_summary_banner};
use crate::strategies::derive::{reference_token, tag_card_extras};
use crate::strategies::tabular::{parse_table, TableRules};
use crate::strategies::{ParseContext, StatementStrategy, StrategyOutput};
use regex::Regex;
use std::sync::LazyLock;

static DATE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{1,2}[-/.](?:\d{1,2}|[A-Za-z]{3})[-/.]\d{2,4}|\d{1,2}\s+[A-Za-z]{3}\s+\d{2,4}|\d{4}-\d{2}-\d{2})\s+(?P<rest>.+)$",
    )
    .unwrap()
});

static TRAILING_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<amount>-?[\d,]*\d\.\d{2}\s*(?:\(?(?:CR|Cr|cr|DR|Dr|dr)\)?)?)\s*$").unwrap()
});

/// At most withdrawal, deposit and balance are peeled off a line.
const MAX_TRAILING_AMOUNTS: usize = 3;

const INFERRED_REASON: &str = "direction inferred from narration keywords";

pub struct GenericStatement {
    kind: DocumentKind,
}

impl GenericStatement {
    pub const fn new(kind: DocumentKind) -> Self {
        GenericStatement { kind }
    }
}

impl StatementStrategy for GenericStatement {
    fn institution(&self) -> Institution {
        Institution::Generic
    }

    fn document_kind(&self) -> DocumentKind {
        self.kind
    }

    fn parse(&self, text: &ExtractedText, ctx: &ParseContext<'_>) -> StrategyOutput {
        let table = parse_table(text, &TableRules::new(ctx.settings.tabular.blank_run));
        if table.header_found && !table.transactions.is_empty() {
            return table.into_output(true, "statement");
        }

        let owned;
        let pages: &[PageContent] = match text {
            ExtractedText::Lines(pages) => pages,
            ExtractedText::Cells(_) => {
                owned = vec![PageContent::new(1, text.lines())];
                &owned
            }
        };
        let mut out = parse_lines(pages);
        if self.kind == DocumentKind::CreditCardStatement {
            out.transactions.iter_mut().for_each(tag_card_extras);
        }
        if out.transactions.is_empty() && out.skipped_rows.is_empty() {
            return StrategyOutput::no_anchor("no dated rows with amounts found");
        }
        out
    }
}

fn parse_lines(pages: &[PageContent]) -> StrategyOutput {
    let mut out = StrategyOutput::default();

    for page in pages {
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

            let Some(caps) = DATE_ANCHOR.captures(line) else {
                if accepting && !is_noise(line, &[]) {
                    if let Some(last) = out.transactions.last_mut() {
                        append_continuation(&mut last.description, line);
                    }
                }
                continue;
            };

            let (body, amounts) = peel_amounts(&caps["rest"]);
            let (amount, column, balance) = match amounts.as_slice() {
                [amount] => (*amount, None, None),
                [amount, balance] => (*amount, None, Some(*balance)),
                // Withdrawal and deposit columns; the empty side prints as zero.
                [.., withdrawal, deposit, balance] => {
                    if !withdrawal.is_zero() {
                        (*withdrawal, Some("dr"), Some(*balance))
                    } else {
                        (*deposit, Some("cr"), Some(*balance))
                    }
                }
                // A dated line without amounts is a heading or a wrapped row.
                [] => {
                    accepting = false;
                    continue;
                }
            };

            let date = match normalize_date(&caps["date"], None) {
                Ok(d) => d,
                Err(e) => {
                    out.skipped_rows.push(SkippedRow::new(line, e.to_string()));
                    accepting = false;
                    continue;
                }
            };

            if amount.is_zero() {
                out.skipped_rows.push(SkippedRow::new(line, "zero amount"));
                accepting = false;
                continue;
            }

            let explicit = column.or(amount.negative.then_some("dr"));
            let hint = resolve_direction(explicit, amount.marker, body);
            let mut txn = CandidateTransaction::new(date, body, amount.value, hint.direction);
            txn.running_balance = balance.map(|b| if b.negative { -b.value } else { b.value });
            txn.reference_number = reference_token(body);

            if hint.is_inferred() {
                out.flags.push(ValidationFlag {
                    transaction_index: out.transactions.len(),
                    kind: FlagKind::DirectionInferred,
                    reason: INFERRED_REASON.into(),
                });
            }
            out.transactions.push(txn);
            accepting = true;
        }
    }
    out
}

/// Split trailing amounts off a line body. Amounts are returned left to right.
fn peel_amounts(rest: &str) -> (&str, Vec<ParsedAmount>) {
    let mut body = rest.trim_end();
    let mut amounts = Vec::new();
    while amounts.len() < MAX_TRAILING_AMOUNTS {
        let Some(m) = TRAILING_AMOUNT.captures(body).and_then(|c| c.name("amount")) else {
            break;
        };
        // Require a gap so digits inside a narration are not taken.
        let start = m.start();
        if start > 0 && !body[..start].ends_with(char::is_whitespace) {
            break;
        }
        let Ok(parsed) = normalize_amount(m.as_str()) else {
            break;
        };
        amounts.push(parsed);
        body = body[..start].trim_end();
    }
    amounts.reverse();
    (body, amounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::CellGrid;
    use crate::model::Direction;
    use crate::settings::schema::Settings;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn run(kind: DocumentKind, text: &ExtractedText) -> StrategyOutput {
        let settings = Settings::default();
        let ctx = ParseContext {
            settings: &settings,
            institution: Institution::Generic,
            kind,
        };
        GenericStatement::new(kind).parse(text, &ctx)
    }

    #[test]
    fn test_peel_amounts() {
        let (body, amounts) = peel_amounts("SALARY ACME 50,000.00 CR 75,000.00");
        assert_eq!(body, "SALARY ACME");
        assert_eq!(amounts.len(), 2);
        assert_eq!(amounts[0].value, dec!(50000.00));
        assert!(amounts[0].marker.is_some());
        assert_eq!(amounts[1].value, dec!(75000.00));

        let (body, amounts) = peel_amounts("INVOICE NO12.50");
        assert_eq!(body, "INVOICE NO12.50");
        assert!(amounts.is_empty());
    }

    #[test]
    fn test_line_heuristic_flags_inferred_directions() {
        let text = ExtractedText::Lines(vec![PageContent::new(
            1,
            vec![
                "Account statement for the period".into(),
                "03-01-2024  UPI-402812345678-GROCER  250.00  9,750.00".into(),
                "            MG ROAD".into(),
                "04-01-2024  SALARY ACME  50,000.00 CR  59,750.00".into(),
                "05 Jan 2024  REFUND FROM AMAZON  120.00  59,870.00".into(),
            ],
        )]);
        let out = run(DocumentKind::BankStatement, &text);

        assert_eq!(out.transactions.len(), 3);
        let first = &out.transactions[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(first.description, "UPI-402812345678-GROCER MG ROAD");
        assert_eq!(first.reference_number.as_deref(), Some("402812345678"));
        assert_eq!(first.running_balance, Some(dec!(9750.00)));
        assert_eq!(first.direction, Direction::Debit);
        assert_eq!(out.transactions[1].direction, Direction::Credit);
        assert_eq!(out.transactions[2].direction, Direction::Credit);

        let flagged: Vec<usize> = out.flags.iter().map(|f| f.transaction_index).collect();
        assert_eq!(flagged, vec![0, 2]);
        assert!(out.flags.iter().all(|f| f.kind == FlagKind::DirectionInferred));
    }

    #[test]
    fn test_prefers_column_layout() {
        let text = ExtractedText::Cells(vec![CellGrid {
            name: "Sheet1".into(),
            rows: vec![
                vec!["Date".into(), "Narration".into(), "Withdrawal".into(), "Deposit".into(), "Balance".into()],
                vec!["01/02/24".into(), "ATM WDL".into(), "500.00".into(), "".into(), "4500.00".into()],
            ],
        }]);
        let out = run(DocumentKind::BankStatement, &text);
        assert_eq!(out.transactions.len(), 1);
        assert!(out.flags.is_empty());
    }

    #[test]
    fn test_withdrawal_and_deposit_columns() {
        let text = ExtractedText::Lines(vec![PageContent::new(
            1,
            vec![
                "03-01-2024  ATM WDL  500.00  0.00  4,500.00".into(),
                "04-01-2024  NEFT FROM RAVI  0.00  1,200.00  5,700.00".into(),
            ],
        )]);
        let out = run(DocumentKind::BankStatement, &text);

        assert!(out.skipped_rows.is_empty());
        assert_eq!(out.transactions.len(), 2);
        let wdl = &out.transactions[0];
        assert_eq!(wdl.description, "ATM WDL");
        assert_eq!(wdl.amount, dec!(500.00));
        assert_eq!(wdl.direction, Direction::Debit);
        assert_eq!(wdl.running_balance, Some(dec!(4500.00)));
        let neft = &out.transactions[1];
        assert_eq!(neft.amount, dec!(1200.00));
        assert_eq!(neft.direction, Direction::Credit);
        assert!(out.flags.is_empty());
    }

    #[test]
    fn test_card_kind_tags_extras() {
        let text = ExtractedText::Lines(vec![PageContent::new(
            1,
            vec!["12/03/2024  NETFLIX MUMBAI IN  649.00".into()],
        )]);
        let out = run(DocumentKind::CreditCardStatement, &text);
        assert_eq!(out.transactions.len(), 1);
        assert!(out.transactions[0].extras.merchant_location.is_some());
        assert_eq!(out.transactions[0].running_balance, None);
    }

    #[test]
    fn test_nothing_found() {
        let text = ExtractedText::Lines(vec![PageContent::new(1, vec!["Disclaimer".into()])]);
        let out = run(DocumentKind::BankStatement, &text);
        assert!(out.transactions.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }
}
