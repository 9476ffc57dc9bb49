use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tunable heuristics for one ingestion run.
///
/// Every section falls back to its default when omitted from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub validation: ValidationSettings,
    pub emi_match: EmiMatchSettings,
    pub extraction: ExtractionSettings,
    pub tabular: TabularSettings,
}

/// A reported/expected ratio window that marks a scaled extraction artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescaleBand {
    pub factor: Decimal,
    pub min_ratio: Decimal,
    pub max_ratio: Decimal,
}

impl RescaleBand {
    pub fn contains(&self, ratio: Decimal) -> bool {
        ratio >= self.min_ratio && ratio <= self.max_ratio
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Absolute slack when comparing an amount to a balance delta.
    pub balance_tolerance: Decimal,
    pub rescale_bands: Vec<RescaleBand>,
    /// Integer part must have at least this many digits for the repeated-leading-digit rule.
    pub suspicious_min_digits: usize,
    pub large_amount_threshold: Option<Decimal>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        ValidationSettings {
            balance_tolerance: Decimal::ONE,
            rescale_bands: vec![
                RescaleBand {
                    factor: Decimal::TEN,
                    min_ratio: Decimal::new(95, 1),
                    max_ratio: Decimal::new(105, 1),
                },
                RescaleBand {
                    factor: Decimal::ONE_HUNDRED,
                    min_ratio: Decimal::from(95),
                    max_ratio: Decimal::from(105),
                },
            ],
            suspicious_min_digits: 4,
            large_amount_threshold: Some(Decimal::from(1_000_000)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmiMatchSettings {
    /// Days either side of the due date a payment may land.
    pub window_days: i64,
    pub amount_tolerance: Decimal,
    /// Fraction of the installment accepted as slack, whichever is larger.
    pub amount_tolerance_pct: Decimal,
}

impl Default for EmiMatchSettings {
    fn default() -> Self {
        EmiMatchSettings {
            window_days: 15,
            amount_tolerance: Decimal::ONE,
            amount_tolerance_pct: Decimal::new(1, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub timeout_secs: u64,
    pub max_document_bytes: usize,
    /// Pages (or spreadsheet rows / 40) scanned for institution signatures.
    pub sniff_pages: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        ExtractionSettings {
            timeout_secs: 30,
            max_document_bytes: 20 * 1024 * 1024,
            sniff_pages: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularSettings {
    /// Consecutive blank rows that end a table.
    pub blank_run: usize,
}

impl Default for TabularSettings {
    fn default() -> Self {
        TabularSettings { blank_run: 2 }
    }
}
