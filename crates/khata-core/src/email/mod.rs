//! Transaction alert e-mails: sender lookup, then the issuer's cascade.

pub mod rules;

use crate::canonical::{normalize_date, parse_money};
use crate::model::{CandidateTransaction, Direction, Institution};
use crate::router::institution_for_sender;
use regex::Captures;
use rules::{cascade, AlertKind, AlertRule};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSkip {
    UnknownSender,
    NoPatternMatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMatch {
    pub institution: Institution,
    pub rule: String,
    pub kind: AlertKind,
    pub transaction: CandidateTransaction,
}

/// Result of reading one alert. A skip is routine, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EmailOutcome {
    Matched(AlertMatch),
    Skipped {
        institution: Option<Institution>,
        reason: AlertSkip,
    },
}

impl EmailOutcome {
    pub fn transaction(&self) -> Option<&CandidateTransaction> {
        match self {
            EmailOutcome::Matched(m) => Some(&m.transaction),
            EmailOutcome::Skipped { .. } => None,
        }
    }
}

/// Parse one decoded alert into at most one transaction.
///
/// The body is tried first, then the subject. The first rule of the
/// sender's cascade that yields a valid amount and date wins.
pub fn parse_email(sender: &str, subject: &str, body: &str) -> EmailOutcome {
    let Some(institution) = institution_for_sender(sender) else {
        debug!(sender, "alert from unknown sender");
        return EmailOutcome::Skipped {
            institution: None,
            reason: AlertSkip::UnknownSender,
        };
    };

    let body = collapse_whitespace(body);
    let subject = collapse_whitespace(subject);

    for text in [&body, &subject] {
        for rule in cascade(institution) {
            let Some(caps) = rule.pattern.captures(text) else {
                continue;
            };
            if let Some(transaction) = build_transaction(rule, &caps) {
                debug!(%institution, rule = rule.name, "alert matched");
                return EmailOutcome::Matched(AlertMatch {
                    institution,
                    rule: rule.name.to_string(),
                    kind: rule.kind,
                    transaction,
                });
            }
        }
    }

    debug!(%institution, "no alert pattern matched");
    EmailOutcome::Skipped {
        institution: Some(institution),
        reason: AlertSkip::NoPatternMatched,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn build_transaction(rule: &AlertRule, caps: &Captures<'_>) -> Option<CandidateTransaction> {
    let group = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str().trim().trim_end_matches('.').trim())
            .filter(|s| !s.is_empty())
    };

    let amount = parse_money(group("amount")?).filter(|a| a.is_sign_positive())?;
    let date = normalize_date(group("date")?, None).ok()?;
    let party = group("name").or_else(|| group("vpa"));

    let description = match rule.kind {
        AlertKind::UpiDebit => format!("UPI to {}", party.unwrap_or("unknown")),
        AlertKind::UpiCredit => format!("UPI from {}", party.unwrap_or("unknown")),
        AlertKind::AccountDebit => group("info").unwrap_or("Account debit").to_string(),
        AlertKind::AccountCredit => group("info").unwrap_or("Account credit").to_string(),
        AlertKind::CardSpend => group("merchant").unwrap_or("Card spend").to_string(),
        AlertKind::CardRefund => format!("Refund from {}", group("merchant").unwrap_or("merchant")),
    };
    let direction = if rule.kind.is_credit() {
        Direction::Credit
    } else {
        Direction::Debit
    };

    let mut txn = CandidateTransaction::new(date, description, amount, direction);
    txn.reference_number = group("reference").map(str::to_string);
    txn.extras.account_last4 = group("account").or_else(|| group("card")).map(last_four);
    txn.extras.counterparty = group("vpa").map(str::to_string);
    txn.extras.alert_rule = Some(rule.name.to_string());
    Some(txn)
}

fn last_four(digits: &str) -> String {
    let start = digits.len().saturating_sub(4);
    digits[start..].to_string()
}
