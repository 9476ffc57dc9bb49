//! Fields derived from description text rather than dedicated columns.

use crate::canonical::parse_money;
use crate::model::{
    CandidateTransaction, Direction, EmiTenure, MerchantLocation, SweepKind, SweepTransfer,
};
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::LazyLock;

/// `<MERCHANT> <CITY> <COUNTRY>` with an ISO-style country code at the end.
static MERCHANT_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<merchant>.*\S)\s+(?P<city>[A-Za-z][A-Za-z.\-]{2,})\s+(?P<country>[A-Z]{2,3})$")
        .unwrap()
});

static EMI_TENURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\(|\b)(?P<n>\d{1,3})\s*/\s*(?P<of>\d{1,3})(?:\)|\b)").unwrap()
});

static EMI_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:emi|easy\s*emi|smart\s*emi|instal+ment)\b").unwrap());

static SWEEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsweep\s*(?:transfer|trf|txn)?\s*(?P<dir>to|from)\b\s*(?:a/?c\s*)?[\[(]?\s*(?P<acct>[0-9X*]{4,})?")
        .unwrap()
});

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:UPI|NEFT|IMPS|RTGS|NACH|ACH)[-/](?P<reference>[A-Z0-9]{6,})\b").unwrap()
});

const COUNTRY_CODES: &[&str] = &[
    "IN", "IND", "US", "USA", "GB", "GBR", "SG", "SGP", "AE", "ARE", "NL", "NLD", "IE", "IRL",
    "DE", "DEU", "FR", "FRA", "HK", "HKG", "AU", "AUS", "CA", "CAN", "JP", "JPN", "LU", "LUX",
];

/// Trailing `<CITY> <COUNTRY>` suffix of a card description.
pub fn merchant_location(description: &str) -> Option<MerchantLocation> {
    let caps = MERCHANT_LOCATION.captures(description.trim())?;
    let country = &caps["country"];
    if !COUNTRY_CODES.contains(&country) {
        return None;
    }
    Some(MerchantLocation {
        city: caps["city"].to_uppercase(),
        country: country.to_string(),
    })
}

pub fn is_emi(description: &str) -> bool {
    EMI_WORD.is_match(description)
}

/// Installment `n` of `of`, when the description is an EMI row.
pub fn emi_tenure(description: &str) -> Option<EmiTenure> {
    if !is_emi(description) {
        return None;
    }
    let caps = EMI_TENURE.captures(description)?;
    let installment: u32 = caps["n"].parse().ok()?;
    let tenure: u32 = caps["of"].parse().ok()?;
    if installment == 0 || installment > tenure {
        return None;
    }
    Some(EmiTenure {
        installment,
        tenure,
    })
}

pub fn sweep_transfer(description: &str) -> Option<SweepTransfer> {
    let caps = SWEEP.captures(description)?;
    let kind = if caps["dir"].eq_ignore_ascii_case("to") {
        SweepKind::To
    } else {
        SweepKind::From
    };
    Some(SweepTransfer {
        kind,
        linked_account: caps.name("acct").map(|m| m.as_str().to_string()),
    })
}

/// Reward points cell, signed. Blank or non-numeric cells carry no points.
pub fn reward_points(cell: &str) -> Option<Decimal> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_money(trimmed)
}

/// Payment-rail reference embedded in a narration, e.g. `UPI-402812345678`.
pub fn reference_token(description: &str) -> Option<String> {
    REFERENCE
        .captures(description)
        .map(|c| c["reference"].to_string())
}

/// Tag card-style extras: EMI status/tenure and merchant location.
pub fn tag_card_extras(txn: &mut CandidateTransaction) {
    txn.extras.is_emi = is_emi(&txn.description);
    txn.extras.emi = emi_tenure(&txn.description);
    txn.extras.merchant_location = merchant_location(&txn.description);
}

/// Tag sweep rows and carry the running sweep deposit on every row after
/// the first sweep. Returns the final sweep balance, if any sweep occurred.
///
/// Core running balances are left untouched.
pub fn apply_sweeps(transactions: &mut [CandidateTransaction]) -> Option<Decimal> {
    let mut parked: Option<Decimal> = None;
    for txn in transactions.iter_mut() {
        if let Some(sweep) = sweep_transfer(&txn.description) {
            let total = parked.get_or_insert(Decimal::ZERO);
            match sweep.kind {
                SweepKind::To => *total += txn.amount,
                SweepKind::From => *total -= txn.amount,
            }
            txn.extras.sweep = Some(sweep);
        }
        txn.extras.sweep_adjustment = parked;
    }
    parked
}

/// Direction implied by a sweep row, if the row is one.
pub fn sweep_direction(description: &str) -> Option<Direction> {
    sweep_transfer(description).map(|s| match s.kind {
        SweepKind::To => Direction::Debit,
        SweepKind::From => Direction::Credit,
    })
}
