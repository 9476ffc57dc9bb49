//! Balance-continuity validation over a complete transaction list.

pub mod balance;
pub mod magnitude;

pub use balance::check_continuity;
pub use magnitude::{is_suspicious, suspicious_magnitudes};

use crate::model::{CandidateTransaction, ValidationFlag};
use crate::settings::schema::ValidationSettings;
use rust_decimal::Decimal;
use tracing::debug;

/// Put transactions in date order, oldest first.
///
/// Statements printed newest-first are reversed before the stable sort so
/// same-day rows keep their printed sequence. Returns, for each new
/// position, the index the transaction had before.
pub fn order_chronologically(transactions: &mut Vec<CandidateTransaction>) -> Vec<usize> {
    let mut indexed: Vec<(usize, CandidateTransaction)> =
        std::mem::take(transactions).into_iter().enumerate().collect();

    let newest_first = match (indexed.first(), indexed.last()) {
        (Some((_, first)), Some((_, last))) => first.date > last.date,
        _ => false,
    };
    if newest_first {
        indexed.reverse();
    }
    indexed.sort_by_key(|(_, txn)| txn.date);

    let (order, sorted): (Vec<usize>, Vec<CandidateTransaction>) = indexed.into_iter().unzip();
    *transactions = sorted;
    order
}

/// Correct and flag a chronologically ordered list.
///
/// `opening` seeds the balance chain so the first row is checked too.
/// Transactions are adjusted in place, never removed.
pub fn validate(
    transactions: &mut [CandidateTransaction],
    opening: Option<Decimal>,
    settings: &ValidationSettings,
) -> Vec<ValidationFlag> {
    let mut flags = check_continuity(transactions, opening, settings);
    flags.extend(suspicious_magnitudes(transactions, settings));
    flags.sort_by_key(|f| f.transaction_index);
    debug!(
        transactions = transactions.len(),
        flags = flags.len(),
        "validation complete"
    );
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, FlagKind};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn txn(day: u32, desc: &str, amount: Decimal, direction: Direction) -> CandidateTransaction {
        CandidateTransaction::new(
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            desc,
            amount,
            direction,
        )
    }

    #[test]
    fn test_newest_first_is_reversed() {
        let mut list = vec![
            txn(5, "c", dec!(1), Direction::Debit),
            txn(3, "b2", dec!(1), Direction::Debit),
            txn(3, "b1", dec!(1), Direction::Debit),
            txn(1, "a", dec!(1), Direction::Debit),
        ];
        let order = order_chronologically(&mut list);
        let names: Vec<&str> = list.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(names, vec!["a", "b1", "b2", "c"]);
        assert_eq!(order, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_stable_for_same_day_rows() {
        let mut list = vec![
            txn(1, "a", dec!(1), Direction::Debit),
            txn(2, "b1", dec!(1), Direction::Debit),
            txn(2, "b2", dec!(1), Direction::Debit),
            txn(1, "late entry", dec!(1), Direction::Debit),
            txn(3, "c", dec!(1), Direction::Debit),
        ];
        let order = order_chronologically(&mut list);
        assert_eq!(order, vec![0, 3, 1, 2, 4]);
    }

    #[test]
    fn test_validate_combines_and_sorts_flags() {
        let mut list = vec![
            txn(1, "opening", dec!(100), Direction::Credit).with_balance(dec!(1000)),
            txn(2, "big", dec!(44489), Direction::Credit).with_balance(dec!(45489)),
            txn(3, "refund", dec!(500), Direction::Debit).with_balance(dec!(45989)),
        ];
        let flags = validate(&mut list, None, &ValidationSettings::default());
        let kinds: Vec<(usize, FlagKind)> =
            flags.iter().map(|f| (f.transaction_index, f.kind)).collect();
        assert_eq!(
            kinds,
            vec![(1, FlagKind::SuspiciousMagnitude), (2, FlagKind::TypeCorrected)]
        );
        assert_eq!(list[2].direction, Direction::Credit);
    }
}
