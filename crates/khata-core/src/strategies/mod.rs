pub mod accumulate;
pub mod axis;
pub mod derive;
pub mod draft;
pub mod generic;
pub mod hdfc;
pub mod icici;
pub mod kotak;
pub mod loan;
pub mod tabular;
pub mod template;

use crate::extraction::{ExtractedText, Layout};
use crate::model::{
    CandidateTransaction, DocumentKind, Institution, LoanSchedule, StatementMetadata,
    ValidationFlag,
};
use crate::report::{ParseWarning, SkippedRow};
use crate::settings::schema::Settings;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// What a strategy knows about the document it is parsing.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub settings: &'a Settings,
    pub institution: Institution,
    pub kind: DocumentKind,
}

/// Everything one strategy pass produces.
///
/// Flag indices refer to positions in `transactions` as returned.
#[derive(Debug, Clone, Default)]
pub struct StrategyOutput {
    pub transactions: Vec<CandidateTransaction>,
    pub metadata: Option<StatementMetadata>,
    pub flags: Vec<ValidationFlag>,
    pub skipped_rows: Vec<SkippedRow>,
    pub warnings: Vec<ParseWarning>,
    pub schedule: Option<LoanSchedule>,
}

impl StrategyOutput {
    /// The empty result for a document with no recognisable structure.
    pub fn no_anchor(message: impl Into<String>) -> Self {
        StrategyOutput {
            warnings: vec![ParseWarning::anchor_not_found(message)],
            ..StrategyOutput::default()
        }
    }
}

/// Layout knowledge for one (institution, document kind) pair.
///
/// Implementations are stateless. A document without the expected anchors
/// yields an empty transaction list, never an error.
pub trait StatementStrategy: Send + Sync {
    fn institution(&self) -> Institution;

    fn document_kind(&self) -> DocumentKind;

    /// Input shape this strategy reads best when the source is a PDF.
    fn preferred_layout(&self) -> Layout {
        Layout::Lines
    }

    fn parse(&self, text: &ExtractedText, ctx: &ParseContext<'_>) -> StrategyOutput;

    fn name(&self) -> String {
        format!("{}/{}", self.institution(), self.document_kind())
    }
}

type Registry = BTreeMap<(Institution, DocumentKind), Box<dyn StatementStrategy>>;

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let strategies: Vec<Box<dyn StatementStrategy>> = vec![
        Box::new(hdfc::HdfcBankStatement),
        Box::new(hdfc::HdfcCardStatement),
        Box::new(icici::IciciBankStatement),
        Box::new(icici::IciciCardStatement),
        Box::new(kotak::KotakBankStatement),
        Box::new(axis::AxisCardStatement),
        Box::new(generic::GenericStatement::new(DocumentKind::BankStatement)),
        Box::new(generic::GenericStatement::new(DocumentKind::CreditCardStatement)),
        Box::new(loan::LoanScheduleStrategy),
    ];
    strategies
        .into_iter()
        .map(|s| ((s.institution(), s.document_kind()), s))
        .collect()
});

/// Resolve a strategy: exact pair, then the generic strategy for the kind,
/// then the generic bank-statement strategy.
pub fn lookup(institution: Institution, kind: DocumentKind) -> &'static dyn StatementStrategy {
    let candidates = [
        (institution, kind),
        (Institution::Generic, kind),
        (Institution::Generic, DocumentKind::BankStatement),
    ];
    candidates
        .iter()
        .find_map(|key| REGISTRY.get(key))
        .map(|s| s.as_ref())
        .unwrap_or_else(fallback)
}

fn fallback() -> &'static dyn StatementStrategy {
    static GENERIC: generic::GenericStatement =
        generic::GenericStatement::new(DocumentKind::BankStatement);
    &GENERIC
}

/// Registered (institution, kind) pairs, sorted by institution then kind.
pub fn registered() -> Vec<(Institution, DocumentKind)> {
    REGISTRY.keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        let s = lookup(Institution::Kotak, DocumentKind::BankStatement);
        assert_eq!(s.institution(), Institution::Kotak);
    }

    #[test]
    fn test_falls_back_to_generic_for_kind() {
        let s = lookup(Institution::Axis, DocumentKind::BankStatement);
        assert_eq!(s.institution(), Institution::Generic);
        assert_eq!(s.document_kind(), DocumentKind::BankStatement);

        let s = lookup(Institution::Hdfc, DocumentKind::LoanSchedule);
        assert_eq!(s.document_kind(), DocumentKind::LoanSchedule);
    }

    #[test]
    fn test_alert_kind_falls_back_to_bank() {
        let s = lookup(Institution::Hdfc, DocumentKind::TransactionAlertEmail);
        assert_eq!(s.institution(), Institution::Generic);
        assert_eq!(s.document_kind(), DocumentKind::BankStatement);
    }

    #[test]
    fn test_registry_contents() {
        let pairs = registered();
        assert!(pairs.contains(&(Institution::Hdfc, DocumentKind::CreditCardStatement)));
        assert!(pairs.contains(&(Institution::Generic, DocumentKind::LoanSchedule)));
        assert_eq!(pairs.len(), 9);
    }
}
