//! Draft a [`StatementTemplate`] from a sample document.
//!
//! The largest table wins. Its header row is the first one naming two
//! header keywords; each column is typed from its leading data cells and
//! mapped to a field by header text, falling back to the inferred types.

use crate::error::KhataError;
use crate::extraction::table::{align_to_header, line_spans};
use crate::extraction::ExtractedText;
use crate::router::{detect_kind, signature_scores};
use crate::strategies::tabular::ColumnMap;
use crate::strategies::template::{
    is_header_like, validate_template, FieldMapping, StatementTemplate, HEADER_SEARCH_ROWS,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

/// Data rows inspected per column when inferring its type.
const TYPE_SAMPLE_ROWS: usize = 20;
const SAMPLE_ROWS: usize = 5;
const MAX_TEXT_PATTERNS: usize = 10;

/// Issuer names worth recording for detection, including banks without a
/// dedicated strategy.
const BANK_PATTERNS: &[&str] = &[
    "hdfc bank",
    "icici bank",
    "state bank of india",
    "sbi",
    "axis bank",
    "kotak mahindra",
    "yes bank",
    "idfc first",
    "federal bank",
    "karnataka bank",
    "canara bank",
    "punjab national bank",
    "bank of baroda",
    "union bank",
    "indian bank",
];

static DATE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}|\d{4}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[-\s][A-Za-z]{3}[-\s]\d{2,4}|[A-Za-z]{3}\s+\d{1,2},?\s+\d{4})$",
    )
    .unwrap()
});

static AMOUNT_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\(?(?:₹|rs\.?|inr|\$|€|£)?\s*-?(?:\d{1,3}(?:,\d{2,3})+|\d+)(?:\.\d{1,2})?\)?\s*(?:cr|dr)?$",
    )
    .unwrap()
});

static NUMBER_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").unwrap());

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}(?P<sep>[-/.])\d{1,2}[-/.](?P<year>\d{4}|\d{2})$").unwrap()
});

static NAMED_MONTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}(?P<sep>[-\s])[A-Za-z]{3}[-\s](?P<year>\d{4}|\d{2})$").unwrap()
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Date,
    Amount,
    Number,
    Text,
    Unknown,
}

/// One column of the sampled table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub index: usize,
    pub header: String,
    pub value_type: ValueType,
    /// Template field this column was mapped to.
    pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub template: StatementTemplate,
    /// Header row within the sampled table.
    pub header_row: usize,
    pub columns: Vec<ColumnProfile>,
    pub sample_rows: Vec<Vec<String>>,
    pub row_count: usize,
    /// Issuer phrases found anywhere in the document.
    pub text_patterns: Vec<String>,
    /// Reasons the draft needs editing before it validates.
    pub warnings: Vec<String>,
}

/// Classify one cell.
pub fn detect_value_type(value: &str) -> ValueType {
    let s = value.trim();
    if s.is_empty() {
        ValueType::Unknown
    } else if DATE_VALUE.is_match(s) {
        ValueType::Date
    } else if NUMBER_VALUE.is_match(s) {
        ValueType::Number
    } else if AMOUNT_VALUE.is_match(s) {
        ValueType::Amount
    } else {
        ValueType::Text
    }
}

/// Draft a template named `name` from extracted text.
pub fn draft_template(text: &ExtractedText, name: &str) -> Result<TemplateDraft, KhataError> {
    let tables = candidate_tables(text);
    let table = tables
        .iter()
        .max_by_key(|t| t.len())
        .ok_or_else(|| KhataError::Extraction("no table found in document".into()))?;

    let keyword_header = table
        .iter()
        .take(HEADER_SEARCH_ROWS)
        .position(|row| is_header_like(&row.join(" ")));
    let header_row = keyword_header.unwrap_or(0);
    let width = table.iter().map(Vec::len).max().unwrap_or(0);
    let headers: Vec<String> = (0..width)
        .map(|i| {
            let cell = table[header_row].get(i).map(|c| c.trim()).unwrap_or("");
            if cell.is_empty() {
                format!("Column_{i}")
            } else {
                cell.to_string()
            }
        })
        .collect();

    let data: Vec<&Vec<String>> = table[header_row + 1..]
        .iter()
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .collect();
    if data.is_empty() {
        return Err(KhataError::Extraction("no data rows found below the header".into()));
    }

    let types: Vec<ValueType> = (0..width).map(|i| column_type(&data, i)).collect();
    let map = infer_columns(&headers, &types);
    let date_format = map
        .date
        .and_then(|col| data.iter().find_map(|row| row.get(col).and_then(|c| date_format_of(c))));

    let all_text = text.lines().join("\n").to_lowercase();
    let institution = signature_scores(&all_text)
        .into_iter()
        .fold(None, |best: Option<(_, u32)>, (inst, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((inst, score)),
        })
        .map(|(inst, _)| inst);

    let mappings = mappings_for(&map, date_format);
    let columns = headers
        .iter()
        .enumerate()
        .map(|(index, header)| ColumnProfile {
            index,
            header: header.clone(),
            value_type: types[index],
            field: mappings
                .iter()
                .find(|(_, m)| m.source == format!("col_{index}"))
                .map(|(field, _)| field.clone()),
        })
        .collect();

    let template = StatementTemplate {
        name: name.to_string(),
        institution,
        document_kind: detect_kind(&all_text),
        header_row: keyword_header.is_none().then_some(header_row),
        mappings,
        skip_rows_containing: Vec::new(),
    };
    let warnings = match validate_template(&template) {
        Ok(()) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };
    debug!(
        rows = data.len(),
        columns = width,
        header_row,
        valid = warnings.is_empty(),
        "template drafted"
    );

    Ok(TemplateDraft {
        template,
        header_row,
        columns,
        sample_rows: data
            .iter()
            .take(SAMPLE_ROWS)
            .map(|row| row.iter().map(|c| c.trim().to_string()).collect())
            .collect(),
        row_count: data.len(),
        text_patterns: text_patterns(&all_text),
        warnings,
    })
}

/// Tables with at least two rows. Layout text becomes one table per page,
/// starting at its header line.
fn candidate_tables(text: &ExtractedText) -> Vec<Vec<Vec<String>>> {
    match text {
        ExtractedText::Cells(grids) => grids
            .iter()
            .filter(|g| g.rows.len() > 1)
            .map(|g| g.rows.clone())
            .collect(),
        ExtractedText::Lines(pages) => pages
            .iter()
            .filter_map(|page| {
                let start = page.lines.iter().position(|l| is_header_like(l))?;
                let header = line_spans(&page.lines[start]);
                let mut rows = vec![header.iter().map(|s| s.text.clone()).collect()];
                rows.extend(
                    page.lines[start + 1..]
                        .iter()
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| align_to_header(&header, &line_spans(l))),
                );
                (rows.len() > 1).then_some(rows)
            })
            .collect(),
    }
}

/// Most frequent type among the leading non-empty cells; ties go to the
/// type seen first.
fn column_type(data: &[&Vec<String>], col: usize) -> ValueType {
    let mut counts: Vec<(ValueType, usize)> = Vec::new();
    for cell in data
        .iter()
        .take(TYPE_SAMPLE_ROWS)
        .filter_map(|row| row.get(col))
        .filter(|c| !c.trim().is_empty())
    {
        let t = detect_value_type(cell);
        match counts.iter_mut().find(|(seen, _)| *seen == t) {
            Some((_, n)) => *n += 1,
            None => counts.push((t, 1)),
        }
    }
    counts
        .iter()
        .fold(None, |best: Option<(ValueType, usize)>, &(t, n)| match best {
            Some((_, top)) if top >= n => best,
            _ => Some((t, n)),
        })
        .map(|(t, _)| t)
        .unwrap_or(ValueType::Unknown)
}

/// Header classification first, then value types for what is still missing.
fn infer_columns(headers: &[String], types: &[ValueType]) -> ColumnMap {
    let mut map = ColumnMap::from_header(headers);
    let claimed = |map: &ColumnMap, i: usize| {
        [
            map.serial,
            map.date,
            map.value_date,
            map.narration,
            map.reference,
            map.withdrawal,
            map.deposit,
            map.amount,
            map.direction,
            map.balance,
        ]
        .contains(&Some(i))
    };
    let free_of = |map: &ColumnMap, wanted: ValueType| -> Vec<usize> {
        types
            .iter()
            .enumerate()
            .filter(|(i, t)| **t == wanted && !claimed(map, *i))
            .map(|(i, _)| i)
            .collect()
    };

    if map.date.is_none() {
        map.date = free_of(&map, ValueType::Date).first().copied();
    }
    if map.narration.is_none() {
        map.narration = free_of(&map, ValueType::Text).first().copied();
    }
    if !map.is_usable() {
        match free_of(&map, ValueType::Amount).as_slice() {
            [amount] => map.amount = Some(*amount),
            [amount, balance] => {
                map.amount = Some(*amount);
                map.balance = map.balance.or(Some(*balance));
            }
            [.., withdrawal, deposit, balance] => {
                map.withdrawal = Some(*withdrawal);
                map.deposit = Some(*deposit);
                map.balance = map.balance.or(Some(*balance));
            }
            [] => {}
        }
    }
    map
}

fn mappings_for(map: &ColumnMap, date_format: Option<String>) -> BTreeMap<String, FieldMapping> {
    let fields = [
        ("serial", map.serial),
        ("date", map.date),
        ("value_date", map.value_date),
        ("narration", map.narration),
        ("reference", map.reference),
        ("withdrawal", map.withdrawal),
        ("deposit", map.deposit),
        ("amount", map.amount),
        ("transaction_type", map.direction),
        ("balance", map.balance),
    ];
    fields
        .into_iter()
        .filter_map(|(field, col)| {
            let col = col?;
            let format = if field == "date" { date_format.clone() } else { None };
            Some((
                field.to_string(),
                FieldMapping {
                    source: format!("col_{col}"),
                    format,
                },
            ))
        })
        .collect()
}

/// Template date format for a sample cell, e.g. `DD/MM/YY`.
fn date_format_of(cell: &str) -> Option<String> {
    let s = cell.trim();
    let year = |y: &str| if y.len() == 4 { "YYYY" } else { "YY" };
    if let Some(caps) = NUMERIC_DATE.captures(s) {
        let sep = &caps["sep"];
        return Some(format!("DD{sep}MM{sep}{}", year(&caps["year"])));
    }
    if let Some(caps) = NAMED_MONTH_DATE.captures(s) {
        let sep = &caps["sep"];
        return Some(format!("DD{sep}MMM{sep}{}", year(&caps["year"])));
    }
    ISO_DATE.is_match(s).then(|| "YYYY-MM-DD".to_string())
}

fn text_patterns(lower: &str) -> Vec<String> {
    let mut found: Vec<String> = BANK_PATTERNS
        .iter()
        .filter(|p| lower.contains(*p))
        .map(|p| p.to_string())
        .collect();
    for phrase in ["credit card", "statement"] {
        if lower.contains(phrase) {
            found.push(phrase.to_string());
        }
    }
    found.truncate(MAX_TEXT_PATTERNS);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{CellGrid, PageContent};
    use crate::model::{DocumentKind, Institution};
    use crate::strategies::template::TemplateStrategy;
    use crate::strategies::{ParseContext, StatementStrategy};
    use crate::settings::schema::Settings;
    use rust_decimal_macros::dec;

    fn grid(name: &str, rows: &[&[&str]]) -> CellGrid {
        CellGrid {
            name: name.into(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_value_types() {
        assert_eq!(detect_value_type("01/02/24"), ValueType::Date);
        assert_eq!(detect_value_type("05-Jan-2024"), ValueType::Date);
        assert_eq!(detect_value_type("Mar 5, 2024"), ValueType::Date);
        assert_eq!(detect_value_type("1,00,000.00"), ValueType::Amount);
        assert_eq!(detect_value_type("4500.00"), ValueType::Amount);
        assert_eq!(detect_value_type("₹ 250.50 Cr"), ValueType::Amount);
        assert_eq!(detect_value_type("(1,200.00)"), ValueType::Amount);
        assert_eq!(detect_value_type("000123"), ValueType::Number);
        assert_eq!(detect_value_type("UPI-GROCER"), ValueType::Text);
        assert_eq!(detect_value_type("  "), ValueType::Unknown);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(date_format_of("01/02/24").as_deref(), Some("DD/MM/YY"));
        assert_eq!(date_format_of("02-01-2024").as_deref(), Some("DD-MM-YYYY"));
        assert_eq!(date_format_of("05-Jan-2024").as_deref(), Some("DD-MMM-YYYY"));
        assert_eq!(date_format_of("2024-01-02").as_deref(), Some("YYYY-MM-DD"));
        assert_eq!(date_format_of("yesterday"), None);
    }

    #[test]
    fn test_draft_from_largest_sheet() {
        let text = ExtractedText::Cells(vec![
            grid("Summary", &[&["Opening", "1,000.00"], &["Closing", "5,800.00"]]),
            grid(
                "Transactions",
                &[
                    &["Co-operative Bank Ltd", "", "", "", ""],
                    &["Txn Dt", "Particulars", "Debit", "Credit", "Balance"],
                    &["02-01-2024", "ATM CASH", "200.00", "", "800.00"],
                    &["03-01-2024", "SALARY", "", "5,000.00", "5,800.00"],
                    &["", "", "", "", ""],
                ],
            ),
        ]);
        let draft = draft_template(&text, "co-op").unwrap();

        assert_eq!(draft.header_row, 1);
        assert_eq!(draft.row_count, 2);
        assert!(draft.warnings.is_empty(), "{:?}", draft.warnings);
        assert_eq!(draft.template.header_row, None);
        assert_eq!(draft.template.document_kind, DocumentKind::BankStatement);

        let map = draft.template.to_column_map();
        assert_eq!(map.date, Some(0));
        assert_eq!(map.narration, Some(1));
        assert_eq!(map.withdrawal, Some(2));
        assert_eq!(map.deposit, Some(3));
        assert_eq!(map.balance, Some(4));
        assert_eq!(
            draft.template.mappings["date"].format.as_deref(),
            Some("DD-MM-YYYY")
        );
        assert_eq!(draft.columns[2].value_type, ValueType::Amount);
        assert_eq!(draft.columns[2].field.as_deref(), Some("withdrawal"));
        assert_eq!(draft.sample_rows[0][1], "ATM CASH");
    }

    #[test]
    fn test_drafted_template_parses_its_source() {
        let text = ExtractedText::Cells(vec![grid(
            "Sheet1",
            &[
                &["Date", "Narration", "Amount", "Balance"],
                &["01/02/24", "ATM WDL", "500.00", "4,500.00"],
                &["02/02/24", "NEFT CR RAVI", "1,000.00", "5,500.00"],
            ],
        )]);
        let draft = draft_template(&text, "sample").unwrap();
        assert!(draft.warnings.is_empty());

        let settings = Settings::default();
        let ctx = ParseContext {
            settings: &settings,
            institution: Institution::Generic,
            kind: DocumentKind::BankStatement,
        };
        let out = TemplateStrategy::new(&draft.template).parse(&text, &ctx);
        assert_eq!(out.transactions.len(), 2);
        assert_eq!(out.transactions[1].amount, dec!(1000.00));
    }

    #[test]
    fn test_types_fill_unnamed_columns() {
        let text = ExtractedText::Cells(vec![grid(
            "Sheet1",
            &[
                &["", "", "", ""],
                &["01/02/24", "ATM WDL", "500.00", "4,500.00"],
                &["02/02/24", "GROCER", "120.00", "4,380.00"],
            ],
        )]);
        let draft = draft_template(&text, "bare").unwrap();
        assert_eq!(draft.header_row, 0);
        assert_eq!(draft.template.header_row, Some(0));
        let map = draft.template.to_column_map();
        assert_eq!(map.date, Some(0));
        assert_eq!(map.narration, Some(1));
        assert_eq!(map.amount, Some(2));
        assert_eq!(map.balance, Some(3));
        assert_eq!(draft.columns[0].header, "Column_0");
    }

    #[test]
    fn test_draft_from_layout_text() {
        let text = ExtractedText::Lines(vec![PageContent::new(
            1,
            vec![
                "STATE BANK OF INDIA".into(),
                "Account Statement".into(),
                "Txn Date     Description          Debit       Credit      Balance".into(),
                "01-02-2024   ATM WDL              500.00                  4,500.00".into(),
                "02-02-2024   NEFT FROM RAVI                   1,000.00    5,500.00".into(),
            ],
        )]);
        let draft = draft_template(&text, "sbi").unwrap();
        assert_eq!(draft.template.institution, Some(Institution::Sbi));
        assert_eq!(draft.row_count, 2);
        let map = draft.template.to_column_map();
        assert_eq!(map.withdrawal, Some(2));
        assert_eq!(map.deposit, Some(3));
        assert_eq!(draft.sample_rows[1][3], "1,000.00");
        assert!(draft.text_patterns.contains(&"state bank of india".to_string()));
        assert!(draft.text_patterns.contains(&"statement".to_string()));
    }

    #[test]
    fn test_document_without_table() {
        let text = ExtractedText::Lines(vec![PageContent::new(1, vec!["Dear customer".into()])]);
        assert!(matches!(
            draft_template(&text, "x"),
            Err(KhataError::Extraction(_))
        ));
    }
}
