use khata_core::error::KhataError;
use khata_core::extraction::{extract, DocumentFormat, Layout};
use khata_core::router;
use khata_core::settings::schema::Settings;
use std::path::PathBuf;

use crate::commands::{extractor, read_document};

pub fn run(
    input_file: PathBuf,
    mime: Option<String>,
    password: Option<String>,
) -> Result<(), KhataError> {
    let settings = Settings::default();
    let doc = read_document(&input_file, mime, password)?;
    let format = DocumentFormat::from_mime(&doc.mime_type)?;

    let text = extract(
        &doc.bytes,
        format,
        doc.passphrase.as_deref(),
        &extractor(&settings),
        Layout::Lines,
        &settings.extraction,
    )?;
    let sniffed = text.sniff_text(settings.extraction.sniff_pages);
    let detection = router::detect(&doc.mime_type, None, None, Some(&sniffed))?;
    let strategy = khata_core::strategies::lookup(detection.institution, detection.kind);

    println!("{}", input_file.display());
    println!("  Format:      {}", format.mime_type());
    println!("  Institution: {}", detection.institution);
    println!("  Kind:        {}", detection.kind);
    println!(
        "  Confidence:  {:?} (score {}, from {:?})",
        detection.confidence, detection.score, detection.source
    );
    println!("  Strategy:    {}", strategy.name());

    let scores = router::signature_scores(&sniffed.to_lowercase());
    if !scores.is_empty() {
        println!("\n  Signature scores:");
        for (institution, score) in scores {
            println!("    {:<8} {}", institution.to_string(), score);
        }
    }

    Ok(())
}
