use khata_core::error::KhataError;
use std::path::Path;

use crate::output;

pub fn run(sender: &str, subject: &str, body_file: &Path, output_format: &str) -> Result<(), KhataError> {
    let body = std::fs::read_to_string(body_file)?;
    let outcome = khata_core::parse_email(sender, subject, &body);

    match output_format {
        "json" => output::json::print(&outcome)?,
        _ => output::table::print_email(&outcome),
    }
    Ok(())
}
