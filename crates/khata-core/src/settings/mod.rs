pub mod builtin;
pub mod schema;

use crate::error::KhataError;
use rust_decimal::Decimal;
use schema::Settings;
use std::path::Path;

/// Load settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<Settings, KhataError> {
    let content = std::fs::read_to_string(path).map_err(|e| KhataError::SettingsLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let settings: Settings =
        serde_json::from_str(&content).map_err(|e| KhataError::SettingsLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Parse settings from a JSON string (no file path context).
pub fn parse_settings_str(json: &str) -> Result<Settings, KhataError> {
    let settings: Settings = serde_json::from_str(json)?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Reject settings that would make the heuristics meaningless.
pub fn validate_settings(settings: &Settings) -> Result<(), KhataError> {
    let v = &settings.validation;
    if v.balance_tolerance < Decimal::ZERO {
        return Err(KhataError::SettingsInvalid(
            "validation.balance_tolerance must not be negative".into(),
        ));
    }

    for band in &v.rescale_bands {
        if band.factor <= Decimal::ONE {
            return Err(KhataError::SettingsInvalid(format!(
                "rescale band factor {} must be greater than 1",
                band.factor
            )));
        }
        if band.min_ratio <= Decimal::ONE || band.min_ratio >= band.max_ratio {
            return Err(KhataError::SettingsInvalid(format!(
                "rescale band for factor {} has an empty or inverted ratio window {}..{}",
                band.factor, band.min_ratio, band.max_ratio
            )));
        }
    }

    if v.suspicious_min_digits < 2 {
        return Err(KhataError::SettingsInvalid(
            "validation.suspicious_min_digits must be at least 2".into(),
        ));
    }

    if let Some(threshold) = v.large_amount_threshold {
        if threshold <= Decimal::ZERO {
            return Err(KhataError::SettingsInvalid(
                "validation.large_amount_threshold must be positive".into(),
            ));
        }
    }

    let emi = &settings.emi_match;
    if emi.window_days < 0 {
        return Err(KhataError::SettingsInvalid(
            "emi_match.window_days must not be negative".into(),
        ));
    }
    if emi.amount_tolerance < Decimal::ZERO || emi.amount_tolerance_pct < Decimal::ZERO {
        return Err(KhataError::SettingsInvalid(
            "emi_match tolerances must not be negative".into(),
        ));
    }

    let ex = &settings.extraction;
    if ex.timeout_secs == 0 {
        return Err(KhataError::SettingsInvalid(
            "extraction.timeout_secs must be at least 1".into(),
        ));
    }
    if ex.max_document_bytes == 0 || ex.sniff_pages == 0 {
        return Err(KhataError::SettingsInvalid(
            "extraction.max_document_bytes and extraction.sniff_pages must be positive".into(),
        ));
    }

    if settings.tabular.blank_run == 0 {
        return Err(KhataError::SettingsInvalid(
            "tabular.blank_run must be at least 1".into(),
        ));
    }

    Ok(())
}
