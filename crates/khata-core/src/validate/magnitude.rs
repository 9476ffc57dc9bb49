use crate::model::{CandidateTransaction, FlagKind, ValidationFlag};
use crate::settings::schema::ValidationSettings;
use rust_decimal::Decimal;

/// Why an amount deserves a second look, if it does.
///
/// Two rules: the rounded whole amount has at least `suspicious_min_digits`
/// digits and its first two digits repeat (a doubled glyph from the
/// converter, e.g. 44,489), or the amount exceeds the large-amount threshold.
pub fn is_suspicious(amount: Decimal, settings: &ValidationSettings) -> Option<String> {
    let digits = amount.abs().round().trunc().to_string();
    let bytes = digits.as_bytes();
    if bytes.len() >= settings.suspicious_min_digits && bytes.len() >= 2 && bytes[0] == bytes[1] {
        return Some(format!(
            "leading digit {} repeats in {amount}; possible doubled character",
            bytes[0] as char
        ));
    }
    if let Some(threshold) = settings.large_amount_threshold {
        if amount > threshold {
            return Some(format!("{amount} exceeds the large-amount threshold {threshold}"));
        }
    }
    None
}

/// One advisory flag per suspicious transaction. Amounts are not changed.
pub fn suspicious_magnitudes(
    transactions: &[CandidateTransaction],
    settings: &ValidationSettings,
) -> Vec<ValidationFlag> {
    transactions
        .iter()
        .enumerate()
        .filter_map(|(index, txn)| {
            is_suspicious(txn.amount, settings).map(|reason| ValidationFlag {
                transaction_index: index,
                kind: FlagKind::SuspiciousMagnitude,
                reason,
            })
        })
        .collect()
}
