use crate::error::KhataError;
use crate::settings::schema::Settings;
use crate::settings::validate_settings;

const DEFAULT_JSON: &str = include_str!("../../../../data/settings-default.json");
const STRICT_JSON: &str = include_str!("../../../../data/settings-strict.json");

/// Available predefined settings profiles.
pub const PRESETS: &[&str] = &["default", "strict"];

/// Load a predefined settings profile by name.
pub fn load_preset(name: &str) -> Result<Settings, KhataError> {
    let json = match name {
        "default" => DEFAULT_JSON,
        "strict" => STRICT_JSON,
        _ => {
            return Err(KhataError::SettingsInvalid(format!(
                "unknown preset '{}'. Available: {}",
                name,
                PRESETS.join(", ")
            )))
        }
    };
    let settings: Settings = serde_json::from_str(json)?;
    validate_settings(&settings)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_preset_matches_code_defaults() {
        assert_eq!(load_preset("default").unwrap(), Settings::default());
    }

    #[test]
    fn test_strict_preset_is_tighter() {
        let strict = load_preset("strict").unwrap();
        assert_eq!(strict.validation.balance_tolerance, dec!(0.01));
        assert!(strict.emi_match.window_days < Settings::default().emi_match.window_days);
    }

    #[test]
    fn test_unknown_preset() {
        assert!(load_preset("lenient").is_err());
    }
}
