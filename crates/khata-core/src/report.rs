use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Important,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// No header row or anchor pattern was found; zero transactions returned.
    StructuralAnchorNotFound,
    /// A labelled metadata value disagrees with the transaction list.
    MetadataMismatch,
    /// Metadata value derived rather than read from the document.
    MetadataInferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub kind: WarningKind,
    pub severity: WarningSeverity,
    pub message: String,
}

impl ParseWarning {
    pub fn anchor_not_found(message: impl Into<String>) -> Self {
        ParseWarning {
            kind: WarningKind::StructuralAnchorNotFound,
            severity: WarningSeverity::Important,
            message: message.into(),
        }
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        ParseWarning {
            kind: WarningKind::MetadataMismatch,
            severity: WarningSeverity::Important,
            message: message.into(),
        }
    }

    pub fn inferred(message: impl Into<String>) -> Self {
        ParseWarning {
            kind: WarningKind::MetadataInferred,
            severity: WarningSeverity::Info,
            message: message.into(),
        }
    }
}

/// A source row dropped during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub text: String,
    pub reason: String,
}

impl SkippedRow {
    pub fn new(text: impl Into<String>, reason: impl Into<String>) -> Self {
        SkippedRow {
            text: text.into(),
            reason: reason.into(),
        }
    }
}
