//! Decides which strategy reads a document, and which issuer sent an alert.

use crate::error::KhataError;
use crate::extraction::DocumentFormat;
use crate::model::{DocumentKind, Institution};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

const SIGNATURES_JSON: &str = include_str!("../../../data/signatures.json");
const SENDERS_JSON: &str = include_str!("../../../data/senders.json");

#[derive(Debug, Clone, Deserialize)]
struct WeightedPhrase {
    phrase: String,
    weight: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct InstitutionSignature {
    institution: Institution,
    /// Scored anywhere in the sniffed text.
    phrases: Vec<WeightedPhrase>,
    /// Scored only within the leading characters (letterhead).
    leading: Vec<WeightedPhrase>,
    /// Scored only when nothing else matched.
    weak: Option<WeightedPhrase>,
}

#[derive(Debug, Clone, Deserialize)]
struct SignatureTable {
    leading_chars: usize,
    institutions: Vec<InstitutionSignature>,
}

#[derive(Debug, Clone, Deserialize)]
struct SenderSignature {
    institution: Institution,
    addresses: Vec<String>,
    domains: Vec<String>,
}

static SIGNATURES: LazyLock<SignatureTable> = LazyLock::new(|| {
    serde_json::from_str(SIGNATURES_JSON).expect("embedded signatures.json is valid")
});

static SENDERS: LazyLock<Vec<SenderSignature>> = LazyLock::new(|| {
    serde_json::from_str(SENDERS_JSON).expect("embedded senders.json is valid")
});

const CARD_NETWORKS: &[&str] = &[
    "visa",
    "mastercard",
    "rupay",
    "amex",
    "american express",
    "diners",
];

const CARD_PHRASES: &[&str] = &["minimum amount due", "minimum amount payable", "total amount due"];

const LOAN_PHRASES: &[&str] = &[
    "amortization schedule",
    "amortisation schedule",
    "repayment schedule",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    fn from_score(score: u32) -> Confidence {
        if score >= 8 {
            Confidence::High
        } else if score >= 4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    Hint,
    Signature,
    Fallback,
}

/// A routing decision, made once per document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    #[serde(skip)]
    pub format: DocumentFormat,
    pub institution: Institution,
    pub kind: DocumentKind,
    pub confidence: Confidence,
    pub score: u32,
    pub source: DetectionSource,
}

/// Route a document by declared type, caller hints, then signature phrases.
///
/// Fails only for an unsupported mime type. Unidentified documents route to
/// the generic strategy with low confidence.
pub fn detect(
    mime_type: &str,
    institution_hint: Option<Institution>,
    kind_hint: Option<DocumentKind>,
    sniffed: Option<&str>,
) -> Result<Detection, KhataError> {
    let format = DocumentFormat::from_mime(mime_type)?;
    let text = sniffed.map(str::to_lowercase).unwrap_or_default();
    let kind = kind_hint.unwrap_or_else(|| detect_kind(&text));

    let detection = match institution_hint {
        Some(institution) => Detection {
            format,
            institution,
            kind,
            confidence: Confidence::High,
            score: 0,
            source: DetectionSource::Hint,
        },
        None => match best_signature(&text) {
            Some((institution, score)) => Detection {
                format,
                institution,
                kind,
                confidence: Confidence::from_score(score),
                score,
                source: DetectionSource::Signature,
            },
            None => Detection {
                format,
                institution: Institution::Generic,
                kind,
                confidence: Confidence::Low,
                score: 0,
                source: DetectionSource::Fallback,
            },
        },
    };

    debug!(
        institution = %detection.institution,
        kind = %detection.kind,
        score = detection.score,
        source = ?detection.source,
        "document routed"
    );
    Ok(detection)
}

/// Score every institution against lowercased text. Ties go to the
/// institution listed first in the signature table.
pub fn signature_scores(text: &str) -> Vec<(Institution, u32)> {
    let table = &*SIGNATURES;
    let leading = leading_slice(text, table.leading_chars);

    table
        .institutions
        .iter()
        .filter_map(|sig| {
            let mut score: u32 = sig
                .phrases
                .iter()
                .filter(|p| text.contains(&p.phrase))
                .map(|p| p.weight)
                .sum();
            score += sig
                .leading
                .iter()
                .filter(|p| leading.contains(&p.phrase))
                .map(|p| p.weight)
                .sum::<u32>();
            if score == 0 {
                if let Some(weak) = sig.weak.as_ref().filter(|w| text.contains(&w.phrase)) {
                    score = weak.weight;
                }
            }
            (score > 0).then_some((sig.institution, score))
        })
        .collect()
}

fn best_signature(text: &str) -> Option<(Institution, u32)> {
    signature_scores(text)
        .into_iter()
        .fold(None, |best, (inst, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((inst, score)),
        })
}

fn leading_slice(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Document kind from phrases in lowercased text.
pub(crate) fn detect_kind(text: &str) -> DocumentKind {
    let is_card = (text.contains("credit card") && CARD_NETWORKS.iter().any(|n| text.contains(n)))
        || CARD_PHRASES.iter().any(|p| text.contains(p));
    if is_card {
        DocumentKind::CreditCardStatement
    } else if LOAN_PHRASES.iter().any(|p| text.contains(p)) {
        DocumentKind::LoanSchedule
    } else {
        DocumentKind::BankStatement
    }
}

/// Issuer of an alert e-mail, by exact address then domain suffix.
pub fn institution_for_sender(sender: &str) -> Option<Institution> {
    let address = bare_address(sender);
    if let Some(sig) = SENDERS
        .iter()
        .find(|s| s.addresses.iter().any(|a| a.eq_ignore_ascii_case(&address)))
    {
        return Some(sig.institution);
    }
    let domain = address.rsplit_once('@').map(|(_, d)| d)?;
    SENDERS
        .iter()
        .find(|s| {
            s.domains
                .iter()
                .any(|d| domain == d || domain.ends_with(&format!(".{d}")))
        })
        .map(|s| s.institution)
}

/// `"HDFC Bank" <alerts@hdfcbank.net>` to `alerts@hdfcbank.net`.
fn bare_address(sender: &str) -> String {
    let trimmed = sender.trim();
    let inner = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(open), Some(close)) if open < close => &trimmed[open + 1..close],
        _ => trimmed,
    };
    inner.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_tables_parse() {
        let signed: Vec<Institution> = SIGNATURES.institutions.iter().map(|s| s.institution).collect();
        for inst in Institution::KNOWN {
            assert!(signed.contains(&inst), "{inst} has no signature");
        }
        assert!(signed.contains(&Institution::Sbi));
        assert_eq!(SENDERS.len(), Institution::KNOWN.len());
    }

    #[test]
    fn test_sbi_routes_to_generic_strategy() {
        let text = "STATE BANK OF INDIA\nAccount Statement\nVisit www.onlinesbi.sbi.co.in";
        assert_eq!(signature_scores(text), vec![(Institution::Sbi, 23)]);
        let d = detect("application/pdf", None, None, Some(text)).unwrap();
        assert_eq!(d.institution, Institution::Sbi);
        assert_eq!(d.confidence, Confidence::High);
        assert_eq!(d.kind, DocumentKind::BankStatement);

        let strategy = crate::strategies::lookup(d.institution, d.kind);
        assert_eq!(strategy.institution(), Institution::Generic);
    }

    #[test]
    fn test_hint_wins() {
        let d = detect(
            "application/pdf",
            Some(Institution::Axis),
            None,
            Some("Kotak Mahindra Bank Limited"),
        )
        .unwrap();
        assert_eq!(d.institution, Institution::Axis);
        assert_eq!(d.source, DetectionSource::Hint);
    }

    #[test]
    fn test_signature_scoring() {
        let text = "KOTAK MAHINDRA BANK LIMITED\nIFSC Code KKBK0000958\nStatement of account";
        let d = detect("application/pdf", None, None, Some(text)).unwrap();
        assert_eq!(d.institution, Institution::Kotak);
        assert_eq!(d.score, 23);
        assert_eq!(d.confidence, Confidence::High);
        assert_eq!(d.kind, DocumentKind::BankStatement);
    }

    #[test]
    fn test_leading_bonus_only_in_letterhead() {
        let filler = "x".repeat(600);
        let late = format!("{filler} axis bank");
        assert!(signature_scores(&late).is_empty());

        let early = "axis bank statement";
        assert_eq!(signature_scores(early), vec![(Institution::Axis, 5)]);
        let d = detect("text/plain", None, None, Some(early)).unwrap();
        assert_eq!(d.confidence, Confidence::Medium);
    }

    #[test]
    fn test_weak_phrase_only_without_other_evidence() {
        let filler = "x".repeat(600);
        let text = format!("{filler} icici bank");
        assert_eq!(signature_scores(&text), vec![(Institution::Icici, 2)]);
        let text = format!("{filler} icici bank icicibank.com");
        assert_eq!(signature_scores(&text), vec![(Institution::Icici, 5)]);
    }

    #[test]
    fn test_kind_detection() {
        let card = "HDFC Bank Limited\nRegalia Credit Card\nVisa\nMinimum Amount Due";
        let d = detect("application/pdf", None, None, Some(card)).unwrap();
        assert_eq!(d.institution, Institution::Hdfc);
        assert_eq!(d.kind, DocumentKind::CreditCardStatement);

        let loan = "Home Loan Repayment Schedule";
        let d = detect("application/pdf", None, None, Some(loan)).unwrap();
        assert_eq!(d.kind, DocumentKind::LoanSchedule);
        assert_eq!(d.institution, Institution::Generic);
        assert_eq!(d.source, DetectionSource::Fallback);
    }

    #[test]
    fn test_unsupported_mime() {
        let err = detect("image/png", None, None, None).unwrap_err();
        assert!(matches!(err, KhataError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_sender_lookup() {
        assert_eq!(
            institution_for_sender("HDFC Bank InstaAlerts <alerts@hdfcbank.net>"),
            Some(Institution::Hdfc)
        );
        assert_eq!(
            institution_for_sender("no-reply@mailer.axisbank.com"),
            Some(Institution::Axis)
        );
        assert_eq!(institution_for_sender("someone@notkotak.com"), None);
        assert_eq!(institution_for_sender("not an address"), None);
    }
}
