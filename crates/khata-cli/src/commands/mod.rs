pub mod detect;
pub mod email;
pub mod loan;
pub mod parse;
pub mod settings;
pub mod template;

use khata_core::error::KhataError;
use khata_core::extraction::pdftotext::PdftotextExtractor;
use khata_core::extraction::DocumentFormat;
use khata_core::settings::schema::Settings;
use khata_core::RawDocument;
use std::path::Path;
use std::time::Duration;

/// Read a document from disk. Without `--mime` the type comes from the
/// file extension.
pub fn read_document(
    path: &Path,
    mime: Option<String>,
    password: Option<String>,
) -> Result<RawDocument, KhataError> {
    let mime_type = match mime {
        Some(m) => m,
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension)
            .map(|f| f.mime_type().to_string())
            .ok_or_else(|| {
                KhataError::UnsupportedFormat(format!(
                    "cannot tell the type of {}; pass --mime",
                    path.display()
                ))
            })?,
    };
    let mut doc = RawDocument::new(std::fs::read(path)?, mime_type);
    doc.passphrase = password;
    Ok(doc)
}

pub fn extractor(settings: &Settings) -> PdftotextExtractor {
    PdftotextExtractor::with_timeout(Duration::from_secs(settings.extraction.timeout_secs))
}
