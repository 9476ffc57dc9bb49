use khata_core::error::KhataError;
use khata_core::settings::builtin;
use std::path::Path;

use crate::output;

pub fn list() -> Result<(), KhataError> {
    println!("Available settings presets:\n");
    for name in builtin::PRESETS {
        let s = builtin::load_preset(name)?;
        let v = &s.validation;
        println!(
            "  {:<8} tolerance {}, EMI window {} days, {} rescale band(s)",
            name,
            v.balance_tolerance,
            s.emi_match.window_days,
            v.rescale_bands.len()
        );
    }
    Ok(())
}

pub fn show(preset: &str) -> Result<(), KhataError> {
    let settings = builtin::load_preset(preset)?;
    output::json::print(&settings)
}

pub fn validate(file: &Path) -> Result<(), KhataError> {
    let s = khata_core::settings::load_settings(file)?;

    println!("Settings in {} are valid.", file.display());
    println!("  Balance tolerance: {}", s.validation.balance_tolerance);
    for band in &s.validation.rescale_bands {
        println!(
            "  Rescale {}x when ratio is within {}..{}",
            band.factor, band.min_ratio, band.max_ratio
        );
    }
    match s.validation.large_amount_threshold {
        Some(t) => println!("  Large-amount threshold: {t}"),
        None => println!("  Large-amount threshold: off"),
    }
    println!(
        "  EMI match: +/-{} days, amount within {} or {} of the installment",
        s.emi_match.window_days, s.emi_match.amount_tolerance, s.emi_match.amount_tolerance_pct
    );

    if s.validation.rescale_bands.is_empty() {
        println!("\nWarnings:");
        println!("  - no rescale bands: scaled amounts will only be flagged as mismatches");
    }
    Ok(())
}
