pub mod pdftotext;
pub mod spreadsheet;
pub mod table;

use crate::error::KhataError;
use crate::settings::schema::ExtractionSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Content extracted from a single page of a PDF or text document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub page_number: usize,
    pub lines: Vec<String>,
}

impl PageContent {
    pub fn new(page_number: usize, lines: Vec<String>) -> Self {
        PageContent { page_number, lines }
    }
}

/// One sheet (or one PDF table) of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellGrid {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Converter output, consumed by exactly one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractedText {
    Lines(Vec<PageContent>),
    Cells(Vec<CellGrid>),
}

impl ExtractedText {
    /// Text lines in reading order. Cell rows are joined with a wide gap so
    /// layout-based splitting still finds the cell boundaries.
    pub fn lines(&self) -> Vec<String> {
        match self {
            ExtractedText::Lines(pages) => pages
                .iter()
                .flat_map(|p| p.lines.iter().cloned())
                .collect(),
            ExtractedText::Cells(grids) => grids
                .iter()
                .flat_map(|g| g.rows.iter())
                .map(|row| {
                    row.iter()
                        .map(|c| c.trim())
                        .collect::<Vec<_>>()
                        .join("   ")
                        .trim()
                        .to_string()
                })
                .collect(),
        }
    }

    /// Leading text used for institution detection.
    pub fn sniff_text(&self, pages: usize) -> String {
        match self {
            ExtractedText::Lines(pages_content) => pages_content
                .iter()
                .take(pages)
                .flat_map(|p| p.lines.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            ExtractedText::Cells(_) => self
                .lines()
                .into_iter()
                .take(pages * ROWS_PER_SNIFF_PAGE)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ExtractedText::Lines(pages) => pages.iter().all(|p| p.lines.iter().all(|l| l.trim().is_empty())),
            ExtractedText::Cells(grids) => grids.iter().all(|g| g.rows.is_empty()),
        }
    }

    pub fn layout(&self) -> Layout {
        match self {
            ExtractedText::Lines(_) => Layout::Lines,
            ExtractedText::Cells(_) => Layout::Cells,
        }
    }
}

/// Spreadsheet rows treated as one page when sniffing.
const ROWS_PER_SNIFF_PAGE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Lines,
    Cells,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Xlsx,
    Xls,
    Ods,
    Csv,
    PlainText,
}

impl DocumentFormat {
    pub fn from_mime(mime_type: &str) -> Result<DocumentFormat, KhataError> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        match essence.as_str() {
            "application/pdf" | "application/x-pdf" => Ok(DocumentFormat::Pdf),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Ok(DocumentFormat::Xlsx)
            }
            "application/vnd.ms-excel" => Ok(DocumentFormat::Xls),
            "application/vnd.oasis.opendocument.spreadsheet" => Ok(DocumentFormat::Ods),
            "text/csv" | "application/csv" => Ok(DocumentFormat::Csv),
            "text/plain" => Ok(DocumentFormat::PlainText),
            _ => Err(KhataError::UnsupportedFormat(mime_type.to_string())),
        }
    }

    pub fn from_extension(ext: &str) -> Option<DocumentFormat> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "xlsx" | "xlsm" => Some(DocumentFormat::Xlsx),
            "xls" => Some(DocumentFormat::Xls),
            "ods" => Some(DocumentFormat::Ods),
            "csv" => Some(DocumentFormat::Csv),
            "txt" => Some(DocumentFormat::PlainText),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DocumentFormat::Xls => "application/vnd.ms-excel",
            DocumentFormat::Ods => "application/vnd.oasis.opendocument.spreadsheet",
            DocumentFormat::Csv => "text/csv",
            DocumentFormat::PlainText => "text/plain",
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        matches!(
            self,
            DocumentFormat::Xlsx | DocumentFormat::Xls | DocumentFormat::Ods | DocumentFormat::Csv
        )
    }
}

/// Trait for PDF conversion backends.
pub trait PdfExtractor: Send + Sync {
    /// Extract layout-preserving text, one PageContent per page.
    fn extract_pages(
        &self,
        pdf_bytes: &[u8],
        passphrase: Option<&str>,
    ) -> Result<Vec<PageContent>, KhataError>;

    /// Extract positioned table cells. Backends without word positions
    /// report an extraction error.
    fn extract_grid(
        &self,
        _pdf_bytes: &[u8],
        _passphrase: Option<&str>,
    ) -> Result<Vec<CellGrid>, KhataError> {
        Err(KhataError::Extraction(format!(
            "{} does not support table extraction",
            self.backend_name()
        )))
    }

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Convert a document into lines or cells.
///
/// PDFs go through `extractor` in the requested layout; spreadsheets always
/// yield cells; plain text yields lines split on form feeds.
pub fn extract(
    bytes: &[u8],
    format: DocumentFormat,
    passphrase: Option<&str>,
    extractor: &dyn PdfExtractor,
    layout: Layout,
    settings: &ExtractionSettings,
) -> Result<ExtractedText, KhataError> {
    if bytes.len() > settings.max_document_bytes {
        return Err(KhataError::DocumentTooLarge {
            size: bytes.len(),
            limit: settings.max_document_bytes,
        });
    }

    debug!(?format, ?layout, backend = extractor.backend_name(), "extracting document");

    match format {
        DocumentFormat::Pdf => match layout {
            Layout::Lines => Ok(ExtractedText::Lines(
                extractor.extract_pages(bytes, passphrase)?,
            )),
            Layout::Cells => Ok(ExtractedText::Cells(
                extractor.extract_grid(bytes, passphrase)?,
            )),
        },
        DocumentFormat::Csv => Ok(ExtractedText::Cells(vec![spreadsheet::read_csv(bytes)?])),
        DocumentFormat::Xlsx | DocumentFormat::Xls | DocumentFormat::Ods => {
            Ok(ExtractedText::Cells(spreadsheet::read_workbook(bytes, passphrase)?))
        }
        DocumentFormat::PlainText => Ok(ExtractedText::Lines(split_pages(
            &String::from_utf8_lossy(bytes),
        ))),
    }
}

/// Split converter text on form feeds into numbered pages.
pub fn split_pages(text: &str) -> Vec<PageContent> {
    text.split('\x0c')
        .enumerate()
        .map(|(i, page_text)| PageContent {
            page_number: i + 1,
            lines: page_text.lines().map(|l| l.to_string()).collect(),
        })
        .filter(|p| !p.lines.is_empty() || p.page_number == 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPdf;

    impl PdfExtractor for NoPdf {
        fn extract_pages(
            &self,
            _pdf_bytes: &[u8],
            _passphrase: Option<&str>,
        ) -> Result<Vec<PageContent>, KhataError> {
            Ok(vec![PageContent::new(1, vec!["pdf page".into()])])
        }

        fn backend_name(&self) -> &str {
            "none"
        }
    }

    #[test]
    fn test_from_mime() {
        assert_eq!(
            DocumentFormat::from_mime("application/pdf").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_mime("text/csv; charset=utf-8").unwrap(),
            DocumentFormat::Csv
        );
        assert!(matches!(
            DocumentFormat::from_mime("image/png"),
            Err(KhataError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_size_cap() {
        let settings = ExtractionSettings {
            max_document_bytes: 4,
            ..ExtractionSettings::default()
        };
        let err = extract(b"12345", DocumentFormat::PlainText, None, &NoPdf, Layout::Lines, &settings)
            .unwrap_err();
        assert!(matches!(err, KhataError::DocumentTooLarge { size: 5, limit: 4 }));
    }

    #[test]
    fn test_plain_text_split_on_form_feed() {
        let text = extract(
            b"page one\nline two\x0cpage two",
            DocumentFormat::PlainText,
            None,
            &NoPdf,
            Layout::Lines,
            &ExtractionSettings::default(),
        )
        .unwrap();
        match text {
            ExtractedText::Lines(pages) => {
                assert_eq!(pages.len(), 2);
                assert_eq!(pages[1].lines, vec!["page two"]);
            }
            other => panic!("expected lines, got {other:?}"),
        }
    }

    #[test]
    fn test_grid_unsupported_by_default() {
        let err = extract(
            b"%PDF",
            DocumentFormat::Pdf,
            None,
            &NoPdf,
            Layout::Cells,
            &ExtractionSettings::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("none does not support"));
    }

    #[test]
    fn test_cells_lines_join() {
        let text = ExtractedText::Cells(vec![CellGrid {
            name: "Sheet1".into(),
            rows: vec![vec!["Date".into(), "".into(), "Balance".into()]],
        }]);
        assert_eq!(text.lines(), vec!["Date      Balance"]);
    }
}
