use khata_core::error::KhataError;
use khata_core::extraction::{extract as extract_text, DocumentFormat, Layout};
use khata_core::settings::schema::Settings;
use khata_core::strategies::draft::{draft_template, TemplateDraft};
use khata_core::strategies::template::load_template;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::commands::{extractor, read_document};
use crate::output;

pub fn validate(file: &Path) -> Result<(), KhataError> {
    let t = load_template(file)?;

    println!("Template '{}' is valid.", t.name);
    if let Some(institution) = t.institution {
        println!("  Institution: {institution}");
    }
    println!("  Document kind: {}", t.document_kind);
    match t.header_row {
        Some(row) => println!("  Header row: {row} (data starts on row {})", row + 1),
        None => println!("  Header row: detected from column names"),
    }
    println!("  Mappings:");
    for (field, mapping) in &t.mappings {
        match &mapping.format {
            Some(format) => println!("    {:<16} {} ({})", field, mapping.source, format),
            None => println!("    {:<16} {}", field, mapping.source),
        }
    }

    let map = t.to_column_map();
    let mut warnings = Vec::new();
    if map.balance.is_none() {
        warnings.push("no balance column: balance continuity cannot be checked");
    }
    if map.amount.is_some() && map.direction.is_none() {
        warnings.push("single amount column without a type column: directions will be inferred");
    }
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {}", w);
        }
    }
    Ok(())
}

pub fn schema() -> Result<(), KhataError> {
    print!(
        r#"Statement Template Schema
=========================

A template maps the columns of a spreadsheet or CSV export onto
transaction fields. Pass it with `khata parse --template FILE`; it
overrides institution detection. `khata template extract SAMPLE --out FILE`
drafts one from a sample statement.

Top-level fields:
  name                 (string, required)  Human-readable template name
  institution          (string, optional)  hdfc, icici, kotak, axis, sbi or generic
  document_kind        (string, optional)  bank-statement (default),
                                           credit-card-statement, loan-schedule
  header_row           (number, optional)  Zero-based header row. When absent
                                           the first row naming two or more
                                           column words is used.
  mappings             (object, required)  Field name -> column mapping
  skip_rows_containing (array, optional)   Rows containing any of these
                                           phrases are skipped

Mapping fields (snake_case or camelCase):
  date                 required            Transaction date
  narration            required            Description (alias: description)
  withdrawal, deposit  one pair or         Separate debit and credit columns
  amount               a single amount     (aliases: debit, credit)
  transaction_type     optional            Dr/Cr column for a single amount
  value_date, reference, serial, balance   optional

Each mapping:
  source               (string, required)  Zero-based column, e.g. "col_0"
  format               (string, optional)  Date format, e.g. "DD-MM-YYYY",
                                           "DD-MMM-YY" or a chrono pattern

Example:
{{
  "name": "Co-op bank export",
  "mappings": {{
    "date": {{ "source": "col_0", "format": "DD-MM-YYYY" }},
    "narration": {{ "source": "col_1" }},
    "withdrawal": {{ "source": "col_2" }},
    "deposit": {{ "source": "col_3" }},
    "balance": {{ "source": "col_4" }}
  }},
  "skip_rows_containing": ["Brought Forward"]
}}
"#
    );
    Ok(())
}

pub fn extract(
    input_file: PathBuf,
    mime: Option<String>,
    password: Option<String>,
    name: Option<String>,
    output_format: &str,
    out: Option<&Path>,
) -> Result<(), KhataError> {
    let settings = Settings::default();
    let doc = read_document(&input_file, mime, password)?;
    let format = DocumentFormat::from_mime(&doc.mime_type)?;
    let name = name.unwrap_or_else(|| {
        input_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "draft".into())
    });

    let read = |layout| {
        extract_text(
            &doc.bytes,
            format,
            doc.passphrase.as_deref(),
            &extractor(&settings),
            layout,
            &settings.extraction,
        )
    };
    // Positioned cells first for PDFs; layout lines when no table comes out.
    let draft = match format {
        DocumentFormat::Pdf => match read(Layout::Cells).and_then(|t| draft_template(&t, &name)) {
            Ok(draft) => draft,
            Err(e) if e.needs_passphrase() => return Err(e),
            Err(e) => {
                debug!(error = %e, "no table from word positions, retrying with layout text");
                draft_template(&read(Layout::Lines)?, &name)?
            }
        },
        _ => draft_template(&read(Layout::Lines)?, &name)?,
    };

    if let Some(path) = out {
        output::json::write(&draft.template, path)?;
        eprintln!("Template '{}' written to {}", draft.template.name, path.display());
    }
    match output_format {
        "json" => output::json::print(&draft)?,
        _ => print_draft(&draft),
    }
    Ok(())
}

fn print_draft(draft: &TemplateDraft) {
    let t = &draft.template;
    println!("Draft template '{}'", t.name);
    if let Some(institution) = t.institution {
        println!("  Institution: {institution}");
    }
    println!("  Document kind: {}", t.document_kind);
    println!(
        "  Header row: {} ({} data rows)",
        draft.header_row, draft.row_count
    );

    println!("\n  {:>4}  {:<24} {:<8} Field", "Col", "Header", "Type");
    for c in &draft.columns {
        let value_type = format!("{:?}", c.value_type).to_lowercase();
        println!(
            "  {:>4}  {:<24} {:<8} {}",
            c.index,
            c.header,
            value_type,
            c.field.as_deref().unwrap_or("-")
        );
    }

    if !draft.sample_rows.is_empty() {
        println!("\n  Sample rows:");
        for row in &draft.sample_rows {
            println!("    {}", row.join(" | "));
        }
    }
    if !draft.text_patterns.is_empty() {
        println!("\n  Text patterns: {}", draft.text_patterns.join(", "));
    }
    if !draft.warnings.is_empty() {
        println!("\nWarnings:");
        for w in &draft.warnings {
            println!("  - {w}");
        }
    }
}
