//! Integration tests for the parse_document() pipeline.
//!
//! Uses a MockExtractor that returns pre-built PageContent without
//! invoking pdftotext, so these tests run without poppler-utils.

use chrono::NaiveDate;
use khata_core::email::{AlertSkip, EmailOutcome};
use khata_core::error::KhataError;
use khata_core::extraction::{PageContent, PdfExtractor};
use khata_core::model::{Direction, DocumentKind, FlagKind, Institution};
use khata_core::report::WarningKind;
use khata_core::settings::builtin::load_preset;
use khata_core::settings::schema::Settings;
use khata_core::strategies::loan::{reconcile, PaymentStatus};
use khata_core::strategies::template::parse_template_str;
use khata_core::{parse_document, parse_email, RawDocument};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

struct MockExtractor {
    pages: Vec<PageContent>,
    password: Option<&'static str>,
}

impl MockExtractor {
    fn new(pages: Vec<PageContent>) -> Self {
        MockExtractor {
            pages,
            password: None,
        }
    }
}

impl PdfExtractor for MockExtractor {
    fn extract_pages(
        &self,
        _pdf_bytes: &[u8],
        passphrase: Option<&str>,
    ) -> Result<Vec<PageContent>, KhataError> {
        match self.password {
            Some(expected) if passphrase != Some(expected) => Err(KhataError::DecryptionFailed {
                passphrase_supplied: passphrase.is_some(),
            }),
            _ => Ok(self.pages.clone()),
        }
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

fn page(number: usize, lines: &[&str]) -> PageContent {
    PageContent::new(number, lines.iter().map(|s| s.to_string()).collect())
}

fn pdf() -> RawDocument {
    RawDocument::new(b"%PDF-1.7".to_vec(), "application/pdf")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn no_pdf() -> MockExtractor {
    MockExtractor::new(vec![])
}

// ---------------------------------------------------------------------------
// Spreadsheet export with a plain column header
// ---------------------------------------------------------------------------
#[test]
fn csv_export_with_withdrawal_column() {
    let doc = RawDocument::new(
        b"Date,Narration,Withdrawal,Deposit,Balance\n01/02/24,ATM WDL,500.00,,4500.00\n".to_vec(),
        "text/csv",
    );
    let parsed = parse_document(&doc, &no_pdf(), &Settings::default(), None).unwrap();

    assert_eq!(parsed.detection.institution, Institution::Generic);
    assert_eq!(parsed.transactions.len(), 1);
    let txn = &parsed.transactions[0];
    assert_eq!(txn.date, date(2024, 2, 1));
    assert_eq!(txn.description, "ATM WDL");
    assert_eq!(txn.amount, dec!(500.00));
    assert_eq!(txn.direction, Direction::Debit);
    assert_eq!(txn.running_balance, Some(dec!(4500.00)));
    assert!(parsed.flags.is_empty());
    assert_eq!(parsed.metadata.opening_balance, Some(dec!(5000.00)));
}

// ---------------------------------------------------------------------------
// Kotak PDF with fused serial/date and amount/balance cells
// ---------------------------------------------------------------------------
#[test]
fn kotak_fused_cells() {
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "Kotak Mahindra Bank Limited",
            "Account Statement",
            "#  Date  Description  Chq/Ref No.  Withdrawal (Dr)  Deposit (Cr)  Balance",
            "Opening Balance 1,160.16",
            "108.01.2026",
            "NEFT CR-ACME TECHNOLOGIES",
            "SALARY JAN",
            "5000.006160.16",
        ],
    )]);
    let parsed = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap();

    assert_eq!(parsed.detection.institution, Institution::Kotak);
    assert_eq!(parsed.strategy, "Kotak/bank-statement");
    assert_eq!(parsed.transactions.len(), 1);
    let txn = &parsed.transactions[0];
    assert_eq!(txn.extras.serial, Some(1));
    assert_eq!(txn.date, date(2026, 1, 8));
    assert_eq!(txn.amount, dec!(5000.00));
    assert_eq!(txn.running_balance, Some(dec!(6160.16)));
    assert_eq!(txn.direction, Direction::Credit);
    assert!(parsed.flags.is_empty());

    assert_eq!(parsed.metadata.opening_balance, Some(dec!(1160.16)));
    assert_eq!(parsed.metadata.closing_balance, Some(dec!(6160.16)));
    assert_eq!(parsed.metadata.period_start, Some(date(2026, 1, 8)));
    assert!(parsed
        .warnings
        .iter()
        .all(|w| w.kind == WarningKind::MetadataInferred));
}

// ---------------------------------------------------------------------------
// Alert e-mail
// ---------------------------------------------------------------------------
#[test]
fn upi_alert_email() {
    let outcome = parse_email(
        "alerts@hdfcbank.net",
        "You have done a UPI txn",
        "Rs.500 has been debited from account 1234 to VPA x@y NAME on 01-02-24",
    );
    let txn = outcome.transaction().unwrap();
    assert_eq!(txn.description, "UPI to NAME");
    assert_eq!(txn.date, date(2024, 2, 1));
    assert_eq!(txn.direction, Direction::Debit);
    assert_eq!(txn.extras.account_last4.as_deref(), Some("1234"));
}

#[test]
fn alert_cascade_prefers_specific_rule() {
    let body = "Rs.1,250.00 has been debited from account **4321 to VPA shop@okaxis CORNER STORE on 15-03-24.";
    let EmailOutcome::Matched(m) = parse_email("alerts@hdfcbank.net", "", body) else {
        panic!("expected a match");
    };
    assert_eq!(m.rule, "hdfc-upi-debit");
    assert_eq!(m.transaction.description, "UPI to CORNER STORE");
}

#[test]
fn unknown_alert_sender_is_skipped() {
    let outcome = parse_email("news@example.org", "Weekly digest", "Rs.500 has been debited");
    assert_eq!(
        outcome,
        EmailOutcome::Skipped {
            institution: None,
            reason: AlertSkip::UnknownSender
        }
    );
}

// ---------------------------------------------------------------------------
// Balance validator through the full pipeline
// ---------------------------------------------------------------------------
#[test]
fn contradicting_direction_is_corrected() {
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "Opening Balance 1,000.00",
            "03-01-2024  ATM WDL  500.00 DR  1,500.00",
        ],
    )]);
    let parsed = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap();

    assert_eq!(parsed.transactions.len(), 1);
    assert_eq!(parsed.transactions[0].direction, Direction::Credit);
    assert_eq!(parsed.transactions[0].amount, dec!(500.00));
    let kinds: Vec<FlagKind> = parsed.flags.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![FlagKind::TypeCorrected]);
}

#[test]
fn scaled_amounts_are_rescaled() {
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "Opening Balance 10,000.00",
            "03-01-2024  ATM WDL  2,500.00 DR  9,750.00",
            "04-01-2024  POS GROCER  1,200.00 DR  9,738.00",
        ],
    )]);
    let parsed = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap();

    assert_eq!(parsed.transactions[0].amount, dec!(250.00));
    assert_eq!(parsed.transactions[0].original_amount, Some(dec!(2500.00)));
    assert_eq!(parsed.transactions[1].amount, dec!(12.00));
    assert_eq!(parsed.transactions[1].original_amount, Some(dec!(1200.00)));
    let rescaled: Vec<usize> = parsed
        .flags
        .iter()
        .filter(|f| f.kind == FlagKind::AmountRescaled)
        .map(|f| f.transaction_index)
        .collect();
    assert_eq!(rescaled, vec![0, 1]);
}

#[test]
fn balance_invariant_holds_or_is_flagged() {
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "Opening Balance 5,000.00",
            "01-03-2024  SALARY ACME  20,000.00 CR  25,000.00",
            "02-03-2024  RENT TO LANDLORD  12,000.00 DR  13,000.00",
            "03-03-2024  UPI GROCER  437.00 DR  12,500.00",
            "04-03-2024  INTEREST  45.00 DR  12,545.00",
        ],
    )]);
    let parsed = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap();
    let txns = &parsed.transactions;
    assert_eq!(txns.len(), 4);

    let tolerance = Settings::default().validation.balance_tolerance;
    for i in 1..txns.len() {
        let (Some(prev), Some(curr)) = (txns[i - 1].running_balance, txns[i].running_balance) else {
            continue;
        };
        let consistent = (curr - prev - txns[i].signed_amount()).abs() <= tolerance;
        let flagged = parsed
            .flags
            .iter()
            .any(|f| f.transaction_index == i && f.kind == FlagKind::BalanceMismatch);
        assert!(consistent || flagged, "row {i} neither consistent nor flagged");
    }
    assert!(parsed
        .flags
        .iter()
        .any(|f| f.transaction_index == 2 && f.kind == FlagKind::BalanceMismatch));
    assert_eq!(txns[3].direction, Direction::Credit);
}

#[test]
fn newest_first_statement_is_reordered() {
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "05-01-2024  UPI GROCER  100.00 DR  800.00",
            "04-01-2024  ATM WDL  100.00 DR  900.00",
        ],
    )]);
    let parsed = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap();
    assert_eq!(parsed.transactions[0].date, date(2024, 1, 4));
    assert_eq!(parsed.transactions[1].date, date(2024, 1, 5));
    assert!(parsed
        .flags
        .iter()
        .all(|f| f.kind != FlagKind::BalanceMismatch));
}

// ---------------------------------------------------------------------------
// Robustness
// ---------------------------------------------------------------------------
#[test]
fn bad_rows_skipped_without_aborting() {
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "32-13-2024  BROKEN DATE  100.00 DR  900.00",
            "05-01-2024  ZERO ROW  0.00  900.00",
            "06-01-2024  ATM WDL  100.00 DR  800.00",
        ],
    )]);
    let parsed = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap();
    assert_eq!(parsed.transactions.len(), 1);
    assert_eq!(parsed.transactions[0].description, "ATM WDL");
    assert_eq!(parsed.skipped_count(), 2);
}

#[test]
fn parsing_is_idempotent() {
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "HDFC BANK LIMITED",
            "Date      Narration                        Chq./Ref.No.       Value Dt   Withdrawal Amt.  Deposit Amt.  Closing Balance",
            "01/02/24  UPI-RAHUL SHARMA-RAHUL@OKAXIS    0000401234567890   01/02/24   500.00           4,500.00",
            "02/02/24  NEFT CR-ACME LTD                 N123456789012      02/02/24   9,000.00         13,500.00",
        ],
    )]);
    let settings = Settings::default();
    let first = parse_document(&pdf(), &extractor, &settings, None).unwrap();
    let second = parse_document(&pdf(), &extractor, &settings, None).unwrap();
    assert_eq!(first.detection.institution, Institution::Hdfc);
    assert_eq!(first.transactions.len(), 2);
    assert_eq!(first, second);
}

#[test]
fn cover_page_gives_anchor_warning() {
    let extractor = MockExtractor::new(vec![page(1, &["Important information", "Terms apply"])]);
    let parsed = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap();
    assert!(parsed.transactions.is_empty());
    assert!(parsed
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::StructuralAnchorNotFound));
}

#[test]
fn encrypted_document_needs_passphrase() {
    let extractor = MockExtractor {
        pages: vec![page(1, &["HDFC BANK LIMITED"])],
        password: Some("secret"),
    };
    let err = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap_err();
    assert!(err.needs_passphrase());
    assert!(matches!(
        err,
        KhataError::DecryptionFailed {
            passphrase_supplied: false
        }
    ));

    let mut doc = pdf();
    doc.passphrase = Some("wrong".into());
    let err = parse_document(&doc, &extractor, &Settings::default(), None).unwrap_err();
    assert!(matches!(
        err,
        KhataError::DecryptionFailed {
            passphrase_supplied: true
        }
    ));

    doc.passphrase = Some("secret".into());
    assert!(parse_document(&doc, &extractor, &Settings::default(), None).is_ok());
}

#[test]
fn unsupported_mime_is_rejected() {
    let doc = RawDocument::new(vec![0x89, b'P', b'N', b'G'], "image/png");
    let err = parse_document(&doc, &no_pdf(), &Settings::default(), None).unwrap_err();
    assert!(matches!(err, KhataError::UnsupportedFormat(_)));
}

#[test]
fn oversized_document_is_refused() {
    let mut settings = Settings::default();
    settings.extraction.max_document_bytes = 4;
    let err = parse_document(&pdf(), &no_pdf(), &settings, None).unwrap_err();
    assert!(matches!(err, KhataError::DocumentTooLarge { .. }));
}

// ---------------------------------------------------------------------------
// Hints, templates, presets
// ---------------------------------------------------------------------------
#[test]
fn institution_hint_overrides_signatures() {
    let extractor = MockExtractor::new(vec![page(1, &["HDFC BANK LIMITED"])]);
    let mut doc = pdf();
    doc.institution_hint = Some(Institution::Axis);
    doc.kind_hint = Some(DocumentKind::CreditCardStatement);
    let parsed = parse_document(&doc, &extractor, &Settings::default(), None).unwrap();
    assert_eq!(parsed.detection.institution, Institution::Axis);
    assert_eq!(parsed.strategy, "Axis/credit-card-statement");
}

#[test]
fn template_overrides_routing() {
    let template = parse_template_str(
        r#"{
            "name": "co-op",
            "mappings": {
                "date": { "source": "col_0", "format": "DD-MM-YYYY" },
                "narration": { "source": "col_1" },
                "withdrawal": { "source": "col_2" },
                "deposit": { "source": "col_3" },
                "balance": { "source": "col_4" }
            },
            "skip_rows_containing": ["Brought Forward"]
        }"#,
    )
    .unwrap();
    let doc = RawDocument::new(
        b"Co-operative Bank Ltd,,,,\n\
          Txn Dt,Particulars,Debit,Credit,Balance\n\
          ,Brought Forward,,,\"1,000.00\"\n\
          02-01-2024,ATM CASH,200.00,,800.00\n\
          03-01-2024,SALARY,,\"5,000.00\",\"5,800.00\"\n"
            .to_vec(),
        "text/csv",
    );
    let parsed = parse_document(&doc, &no_pdf(), &Settings::default(), Some(&template)).unwrap();

    assert_eq!(parsed.strategy, "template/co-op");
    assert_eq!(parsed.transactions.len(), 2);
    assert_eq!(parsed.transactions[1].amount, dec!(5000.00));
    assert_eq!(parsed.transactions[1].direction, Direction::Credit);
    assert_eq!(parsed.skipped_count(), 1);
    assert!(parsed.flags.is_empty());
}

#[test]
fn loan_schedule_reconciles_payments() {
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "Loan Repayment Schedule",
            "Inst No  Due Date     Opening Principal  EMI        Principal  Interest  Closing Principal  ROI",
            "1        05/01/2024   500,000.00         10,624.00  6,457.00   4,167.00  493,543.00         10.00%",
            "2        05/02/2024   493,543.00         10,624.00  6,511.00   4,113.00  487,032.00         10.00%",
            "3        05/03/2024   487,032.00         10,624.00  6,565.00   4,059.00  480,467.00         10.00%",
        ],
    )]);
    let settings = Settings::default();
    let parsed = parse_document(&pdf(), &extractor, &settings, None).unwrap();
    assert_eq!(parsed.detection.kind, DocumentKind::LoanSchedule);
    let schedule = parsed.schedule.as_ref().unwrap();
    assert_eq!(schedule.installments.len(), 3);

    let payments = vec![khata_core::model::CandidateTransaction::new(
        date(2024, 1, 6),
        "NACH LOAN EMI",
        dec!(10624.00),
        Direction::Debit,
    )];
    let statuses = reconcile(schedule, &payments, date(2024, 2, 25), &settings.emi_match);
    assert_eq!(
        statuses[0].status,
        PaymentStatus::Paid {
            payment_index: 0,
            paid_on: date(2024, 1, 6)
        }
    );
    assert_eq!(statuses[1].status, PaymentStatus::Overdue);
    assert_eq!(statuses[2].status, PaymentStatus::Upcoming);
}

#[test]
fn strict_preset_tightens_tolerance() {
    let strict = load_preset("strict").unwrap();
    let extractor = MockExtractor::new(vec![page(
        1,
        &[
            "Opening Balance 1,000.00",
            "03-01-2024  ATM WDL  100.40 DR  900.00",
        ],
    )]);
    let relaxed = parse_document(&pdf(), &extractor, &Settings::default(), None).unwrap();
    assert!(relaxed.flags.is_empty());

    let parsed = parse_document(&pdf(), &extractor, &strict, None).unwrap();
    assert!(parsed
        .flags
        .iter()
        .any(|f| f.kind == FlagKind::BalanceMismatch));
}
