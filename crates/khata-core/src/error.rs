use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum KhataError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("{}", decryption_message(*passphrase_supplied))]
    DecryptionFailed { passphrase_supplied: bool },

    #[error("extraction exceeded the {seconds}s time budget")]
    ExtractionTimeout { seconds: u64 },

    #[error("document is {size} bytes, above the {limit} byte limit")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("converter failed with exit code {code}: {stderr}")]
    ConverterFailed { code: i32, stderr: String },

    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("failed to load settings from {path}: {reason}")]
    SettingsLoad { path: PathBuf, reason: String },

    #[error("invalid settings: {0}")]
    SettingsInvalid(String),

    #[error("failed to load template from {path}: {reason}")]
    TemplateLoad { path: PathBuf, reason: String },

    #[error("invalid template: {0}")]
    TemplateInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn decryption_message(passphrase_supplied: bool) -> &'static str {
    if passphrase_supplied {
        "document is encrypted and the supplied password was rejected"
    } else {
        "document is encrypted; a password is required"
    }
}

impl KhataError {
    /// True when re-prompting for a passphrase may succeed.
    pub fn needs_passphrase(&self) -> bool {
        matches!(self, KhataError::DecryptionFailed { .. })
    }
}

/// Row-level canonicalization failure. Skips the row, never the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("unparsable date '{0}'")]
    UnparsableDate(String),

    #[error("unparsable amount '{0}'")]
    UnparsableAmount(String),
}
