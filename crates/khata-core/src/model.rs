use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Institution {
    Hdfc,
    Icici,
    Kotak,
    Axis,
    /// Detected from its letterhead; its statements go to the generic strategy.
    Sbi,
    /// No issuer identified; relaxed heuristics apply.
    Generic,
}

impl Institution {
    /// Issuers with dedicated layout knowledge.
    pub const KNOWN: [Institution; 4] = [
        Institution::Hdfc,
        Institution::Icici,
        Institution::Kotak,
        Institution::Axis,
    ];

    pub fn from_str_loose(s: &str) -> Option<Institution> {
        let lower = s.trim().to_lowercase();
        if lower.contains("hdfc") {
            Some(Institution::Hdfc)
        } else if lower.contains("icici") {
            Some(Institution::Icici)
        } else if lower.contains("kotak") {
            Some(Institution::Kotak)
        } else if lower.contains("axis") {
            Some(Institution::Axis)
        } else if lower == "sbi" || lower.contains("state bank") {
            Some(Institution::Sbi)
        } else if lower == "generic" || lower == "other" {
            Some(Institution::Generic)
        } else {
            None
        }
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Institution::Hdfc => write!(f, "HDFC"),
            Institution::Icici => write!(f, "ICICI"),
            Institution::Kotak => write!(f, "Kotak"),
            Institution::Axis => write!(f, "Axis"),
            Institution::Sbi => write!(f, "SBI"),
            Institution::Generic => write!(f, "Generic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    BankStatement,
    CreditCardStatement,
    LoanSchedule,
    TransactionAlertEmail,
}

impl DocumentKind {
    pub fn from_str_loose(s: &str) -> Option<DocumentKind> {
        let lower = s.trim().to_lowercase().replace(['_', ' '], "-");
        match lower.as_str() {
            "bank" | "bank-statement" | "savings" | "current" => Some(DocumentKind::BankStatement),
            "card" | "credit-card" | "credit-card-statement" | "cc" => {
                Some(DocumentKind::CreditCardStatement)
            }
            "loan" | "loan-schedule" | "amortization" | "emi" => Some(DocumentKind::LoanSchedule),
            "email" | "alert" | "transaction-alert-email" => {
                Some(DocumentKind::TransactionAlertEmail)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::BankStatement => write!(f, "bank-statement"),
            DocumentKind::CreditCardStatement => write!(f, "credit-card-statement"),
            DocumentKind::LoanSchedule => write!(f, "loan-schedule"),
            DocumentKind::TransactionAlertEmail => write!(f, "transaction-alert-email"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn flipped(self) -> Direction {
        match self {
            Direction::Credit => Direction::Debit,
            Direction::Debit => Direction::Credit,
        }
    }

    /// Apply this direction's sign to a positive amount.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Direction::Credit => amount,
            Direction::Debit => -amount,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Credit => write!(f, "credit"),
            Direction::Debit => write!(f, "debit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantLocation {
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepKind {
    /// Funds parked into the linked deposit.
    To,
    /// Funds pulled back from the linked deposit.
    From,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepTransfer {
    pub kind: SweepKind,
    pub linked_account: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmiTenure {
    pub installment: u32,
    pub tenure: u32,
}

/// Issuer-specific fields carried alongside the canonical transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_points: Option<Decimal>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_emi: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emi: Option<EmiTenure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_location: Option<MerchantLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepTransfer>,
    /// Cumulative amount held in the linked sweep deposit after this row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_adjustment: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_last4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_rule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTransaction {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_date: Option<NaiveDate>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    /// Always strictly positive; sign lives in `direction`.
    pub amount: Decimal,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_balance: Option<Decimal>,
    /// Amount as printed, kept when the validator rescales `amount`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_amount: Option<Decimal>,
    #[serde(default)]
    pub extras: TransactionExtras,
}

impl CandidateTransaction {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
        direction: Direction,
    ) -> Self {
        CandidateTransaction {
            date,
            value_date: None,
            description: description.into(),
            reference_number: None,
            amount,
            direction,
            running_balance: None,
            original_amount: None,
            extras: TransactionExtras::default(),
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.running_balance = Some(balance);
        self
    }

    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagKind {
    TypeCorrected,
    AmountRescaled,
    SuspiciousMagnitude,
    BalanceMismatch,
    /// Direction came from heuristics with no column or suffix to back it.
    DirectionInferred,
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagKind::TypeCorrected => write!(f, "type-corrected"),
            FlagKind::AmountRescaled => write!(f, "amount-rescaled"),
            FlagKind::SuspiciousMagnitude => write!(f, "suspicious-magnitude"),
            FlagKind::BalanceMismatch => write!(f, "balance-mismatch"),
            FlagKind::DirectionInferred => write!(f, "direction-inferred"),
        }
    }
}

/// Advisory note on one transaction; never blocks persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFlag {
    pub transaction_index: usize,
    pub kind: FlagKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSummary {
    pub opening: Option<Decimal>,
    pub earned: Option<Decimal>,
    pub redeemed: Option<Decimal>,
    pub closing: Option<Decimal>,
}

impl RewardSummary {
    pub fn is_empty(&self) -> bool {
        self.opening.is_none()
            && self.earned.is_none()
            && self.redeemed.is_none()
            && self.closing.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementMetadata {
    pub institution: Option<Institution>,
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    pub account_status: Option<String>,
    pub card_number: Option<String>,
    /// IFSC routing code.
    pub routing_code: Option<String>,
    pub micr: Option<String>,
    pub customer_id: Option<String>,
    pub holder_name: Option<String>,
    pub address: Option<String>,
    pub branch: Option<String>,
    pub email: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub opening_balance: Option<Decimal>,
    pub closing_balance: Option<Decimal>,
    pub credit_limit: Option<Decimal>,
    pub available_credit: Option<Decimal>,
    pub minimum_due: Option<Decimal>,
    pub total_due: Option<Decimal>,
    pub payment_due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "RewardSummary::is_empty")]
    pub reward_points: RewardSummary,
    pub sweep_balance: Option<Decimal>,
    pub currency: Option<String>,
}

impl StatementMetadata {
    /// Fill fields that are absent here from `other`.
    pub fn merge_missing(&mut self, other: StatementMetadata) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if self.$field.is_none() { self.$field = other.$field; })*
            };
        }
        take!(
            institution, account_number, account_type, account_status, card_number,
            routing_code, micr, customer_id, holder_name, address, branch, email,
            period_start, period_end, opening_balance, closing_balance, credit_limit,
            available_credit, minimum_due, total_due, payment_due_date, sweep_balance, currency
        );
        if self.reward_points.is_empty() {
            self.reward_points = other.reward_points;
        }
    }
}

/// One row of a loan amortization table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanInstallment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub opening_principal: Decimal,
    pub installment: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    pub closing_principal: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSchedule {
    pub installments: Vec<LoanInstallment>,
}
