use chrono::{Local, NaiveDate};
use khata_core::error::KhataError;
use khata_core::model::{CandidateTransaction, DocumentKind};
use khata_core::settings::schema::Settings;
use khata_core::strategies::loan::reconcile;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::commands::{extractor, read_document};
use crate::output;

/// Either a bare transaction list or a full `khata parse -o json` document.
#[derive(Deserialize)]
#[serde(untagged)]
enum PaymentsFile {
    List(Vec<CandidateTransaction>),
    Statement { transactions: Vec<CandidateTransaction> },
}

pub fn run(
    schedule_file: PathBuf,
    payments: Option<PathBuf>,
    as_of: Option<NaiveDate>,
    password: Option<String>,
    output_format: &str,
) -> Result<(), KhataError> {
    let settings = Settings::default();
    let mut doc = read_document(&schedule_file, None, password)?;
    doc.kind_hint = Some(DocumentKind::LoanSchedule);

    let parsed = khata_core::parse_document(&doc, &extractor(&settings), &settings, None)?;
    let Some(schedule) = parsed.schedule else {
        return Err(KhataError::Extraction(format!(
            "no repayment schedule found in {}",
            schedule_file.display()
        )));
    };

    let payments = match payments {
        Some(path) => read_payments(&path)?,
        None => Vec::new(),
    };
    let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
    let statuses = reconcile(&schedule, &payments, as_of, &settings.emi_match);

    match output_format {
        "json" => output::json::print(&statuses)?,
        _ => output::table::print_installments(&statuses, as_of),
    }
    Ok(())
}

fn read_payments(path: &Path) -> Result<Vec<CandidateTransaction>, KhataError> {
    let content = std::fs::read_to_string(path)?;
    Ok(match serde_json::from_str(&content)? {
        PaymentsFile::List(list) => list,
        PaymentsFile::Statement { transactions } => transactions,
    })
}
