use crate::model::{CandidateTransaction, Direction, FlagKind, ValidationFlag};
use crate::settings::schema::ValidationSettings;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Compare each amount with the delta between consecutive running balances.
///
/// A delta whose sign contradicts the direction flips the direction. An
/// amount off by a configured factor is rescaled to the delta and keeps the
/// printed value in `original_amount`. Anything else that does not add up
/// is flagged as a mismatch and left alone. Rows without a running balance
/// break the chain until the next printed balance.
pub fn check_continuity(
    transactions: &mut [CandidateTransaction],
    opening: Option<Decimal>,
    settings: &ValidationSettings,
) -> Vec<ValidationFlag> {
    let mut flags = Vec::new();
    let mut previous = opening;

    for (index, txn) in transactions.iter_mut().enumerate() {
        let Some(balance) = txn.running_balance else {
            previous = None;
            continue;
        };
        let Some(prev) = previous.replace(balance) else {
            continue;
        };

        // Direction follows the sign of the delta even when the amount alone
        // would fall inside the tolerance.
        let delta = balance - prev;
        if !delta.is_zero() {
            let implied = if delta.is_sign_positive() {
                Direction::Credit
            } else {
                Direction::Debit
            };
            if implied != txn.direction {
                info!(
                    index,
                    from = %txn.direction,
                    to = %implied,
                    "direction corrected from balance delta"
                );
                flags.push(ValidationFlag {
                    transaction_index: index,
                    kind: FlagKind::TypeCorrected,
                    reason: format!(
                        "balance moved {prev} -> {balance}; recorded {} changed to {implied}",
                        txn.direction
                    ),
                });
                txn.direction = implied;
            }
        }

        let expected = delta.abs();
        if (txn.amount - expected).abs() <= settings.balance_tolerance {
            continue;
        }

        let band = (!expected.is_zero())
            .then(|| txn.amount / expected)
            .and_then(|ratio| settings.rescale_bands.iter().find(|b| b.contains(ratio)));

        match band {
            Some(band) => {
                info!(
                    index,
                    printed = %txn.amount,
                    corrected = %expected,
                    factor = %band.factor,
                    "amount rescaled from balance delta"
                );
                flags.push(ValidationFlag {
                    transaction_index: index,
                    kind: FlagKind::AmountRescaled,
                    reason: format!(
                        "printed {} is about {}x the balance change {expected}",
                        txn.amount, band.factor
                    ),
                });
                txn.original_amount = Some(txn.amount);
                txn.amount = expected;
            }
            None => {
                warn!(index, amount = %txn.amount, %delta, "balance mismatch");
                flags.push(ValidationFlag {
                    transaction_index: index,
                    kind: FlagKind::BalanceMismatch,
                    reason: format!(
                        "amount {} does not match balance change {prev} -> {balance}",
                        txn.amount
                    ),
                });
            }
        }
    }

    flags
}
