use khata_core::error::KhataError;
use khata_core::model::{DocumentKind, Institution};
use khata_core::settings::builtin::load_preset;
use khata_core::settings::load_settings;
use khata_core::settings::schema::Settings;
use khata_core::strategies::template::load_template;
use std::path::PathBuf;

use crate::commands::{extractor, read_document};
use crate::output;

pub struct ParseArgs {
    pub input_file: PathBuf,
    pub mime: Option<String>,
    pub institution: Option<Institution>,
    pub kind: Option<DocumentKind>,
    pub password: Option<String>,
    pub template: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub preset: Option<String>,
    pub output_format: String,
    pub out: Option<PathBuf>,
}

pub fn run(args: ParseArgs) -> Result<(), KhataError> {
    let settings = match (&args.settings, &args.preset) {
        (Some(path), _) => load_settings(path)?,
        (None, Some(preset)) => load_preset(preset)?,
        (None, None) => Settings::default(),
    };
    let template = args.template.as_deref().map(load_template).transpose()?;

    let mut doc = read_document(&args.input_file, args.mime, args.password)?;
    doc.institution_hint = args.institution;
    doc.kind_hint = args.kind;

    let parsed =
        khata_core::parse_document(&doc, &extractor(&settings), &settings, template.as_ref())?;

    match args.out {
        Some(path) => {
            // Always write JSON when saving to file
            output::json::write(&parsed, &path)?;
            eprintln!(
                "Parsed {} transaction(s) with {}, written to {}",
                parsed.transactions.len(),
                parsed.strategy,
                path.display()
            );
            for w in &parsed.warnings {
                eprintln!("  warning: {}", w.message);
            }
            if !parsed.flags.is_empty() {
                eprintln!("  {} transaction flag(s) need review", parsed.flags.len());
            }
            if parsed.skipped_count() > 0 {
                eprintln!("  {} row(s) skipped during parsing", parsed.skipped_count());
            }
        }
        None => match args.output_format.as_str() {
            "json" => output::json::print(&parsed)?,
            _ => output::table::print_statement(&parsed),
        },
    }

    Ok(())
}
