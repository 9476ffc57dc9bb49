pub mod canonical;
pub mod email;
pub mod error;
pub mod extraction;
pub mod metadata;
pub mod model;
pub mod report;
pub mod router;
pub mod settings;
pub mod strategies;
pub mod validate;

pub use email::{parse_email, EmailOutcome};

use error::KhataError;
use extraction::{DocumentFormat, ExtractedText, Layout, PdfExtractor};
use model::{
    CandidateTransaction, DocumentKind, Institution, LoanSchedule, StatementMetadata,
    ValidationFlag,
};
use report::{ParseWarning, SkippedRow};
use router::Detection;
use serde::Serialize;
use settings::schema::Settings;
use strategies::template::{StatementTemplate, TemplateStrategy};
use strategies::{ParseContext, StatementStrategy};
use tracing::{info, warn};

/// A document handed in for one parse call.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub institution_hint: Option<Institution>,
    pub kind_hint: Option<DocumentKind>,
    pub passphrase: Option<String>,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        RawDocument {
            bytes,
            mime_type: mime_type.into(),
            ..RawDocument::default()
        }
    }
}

/// Canonical output of one document: the only thing callers should persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedStatement {
    pub detection: Detection,
    pub strategy: String,
    /// Oldest first.
    pub transactions: Vec<CandidateTransaction>,
    pub flags: Vec<ValidationFlag>,
    pub metadata: StatementMetadata,
    pub skipped_rows: Vec<SkippedRow>,
    pub warnings: Vec<ParseWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<LoanSchedule>,
}

impl ParsedStatement {
    pub fn skipped_count(&self) -> usize {
        self.skipped_rows.len()
    }

    /// Transactions that carry at least one flag, for manual review.
    pub fn flagged(&self) -> impl Iterator<Item = (&CandidateTransaction, &ValidationFlag)> {
        self.flags
            .iter()
            .filter_map(|f| self.transactions.get(f.transaction_index).map(|t| (t, f)))
    }
}

/// Main API entry point: route, extract, parse and validate one document.
///
/// The first extraction doubles as the sniff for institution detection. A
/// PDF is converted a second time only when the chosen strategy reads
/// cells; if the backend cannot produce cells the line text is used. A
/// supplied template overrides routing.
pub fn parse_document(
    doc: &RawDocument,
    extractor: &dyn PdfExtractor,
    settings: &Settings,
    template: Option<&StatementTemplate>,
) -> Result<ParsedStatement, KhataError> {
    let format = DocumentFormat::from_mime(&doc.mime_type)?;
    let passphrase = doc.passphrase.as_deref();

    let first = extraction::extract(
        &doc.bytes,
        format,
        passphrase,
        extractor,
        Layout::Lines,
        &settings.extraction,
    )?;
    let sniffed = first.sniff_text(settings.extraction.sniff_pages);

    let institution_hint = doc
        .institution_hint
        .or_else(|| template.and_then(|t| t.institution));
    let kind_hint = doc.kind_hint.or_else(|| template.map(|t| t.document_kind));
    let detection = router::detect(&doc.mime_type, institution_hint, kind_hint, Some(&sniffed))?;

    let template_strategy = template.map(TemplateStrategy::new);
    let strategy: &dyn StatementStrategy = match &template_strategy {
        Some(t) => t as &dyn StatementStrategy,
        None => strategies::lookup(detection.institution, detection.kind),
    };

    let text = if format == DocumentFormat::Pdf && strategy.preferred_layout() != first.layout() {
        match extraction::extract(
            &doc.bytes,
            format,
            passphrase,
            extractor,
            strategy.preferred_layout(),
            &settings.extraction,
        ) {
            Ok(cells) if !cells.is_empty() => cells,
            Ok(_) => first,
            Err(KhataError::Extraction(reason)) => {
                warn!(%reason, "table extraction unavailable, using line text");
                first
            }
            Err(e) => return Err(e),
        }
    } else {
        first
    };

    Ok(parse_extracted(&text, detection, strategy, settings))
}

/// Run one strategy over already-extracted text, then order, enrich and
/// validate its output.
pub fn parse_extracted(
    text: &ExtractedText,
    detection: Detection,
    strategy: &dyn StatementStrategy,
    settings: &Settings,
) -> ParsedStatement {
    let ctx = ParseContext {
        settings,
        institution: detection.institution,
        kind: detection.kind,
    };
    let output = strategy.parse(text, &ctx);

    let mut transactions = output.transactions;
    let order = validate::order_chronologically(&mut transactions);
    let mut new_position = vec![0; order.len()];
    for (new, old) in order.iter().enumerate() {
        new_position[*old] = new;
    }
    let mut flags: Vec<ValidationFlag> = output
        .flags
        .into_iter()
        .filter_map(|mut f| {
            f.transaction_index = *new_position.get(f.transaction_index)?;
            Some(f)
        })
        .collect();

    // Values the strategy read from its own anchors win over label matches.
    let labelled = metadata::extract_metadata(&text.lines(), detection.institution, detection.kind);
    let mut metadata = output.metadata.unwrap_or_default();
    metadata.merge_missing(labelled);

    flags.extend(validate::validate(
        &mut transactions,
        metadata.opening_balance,
        &settings.validation,
    ));
    flags.sort_by_key(|f| f.transaction_index);

    let mut warnings = output.warnings;
    if !transactions.is_empty() || output.schedule.is_some() {
        warnings.retain(|w| w.kind != report::WarningKind::StructuralAnchorNotFound);
    }
    warnings.extend(metadata::reconcile_with_transactions(
        &mut metadata,
        &transactions,
        settings.validation.balance_tolerance,
    ));

    info!(
        strategy = %strategy.name(),
        transactions = transactions.len(),
        flags = flags.len(),
        skipped = output.skipped_rows.len(),
        "statement parsed"
    );

    ParsedStatement {
        detection,
        strategy: strategy.name(),
        transactions,
        flags,
        metadata,
        skipped_rows: output.skipped_rows,
        warnings,
        schedule: output.schedule,
    }
}
