//! User-supplied column-mapping templates.
//!
//! A template names, for each canonical field, the zero-based column it is
//! read from (`col_N`) and optionally a date format. Parsing runs through the
//! shared column engine with the header search switched off.

use crate::error::KhataError;
use crate::extraction::{ExtractedText, Layout};
use crate::model::{DocumentKind, Institution};
use crate::strategies::tabular::{parse_table, ColumnMap, TableRules};
use crate::strategies::{ParseContext, StatementStrategy, StrategyOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Words that mark a header row when `header_row` is not given.
const HEADER_KEYWORDS: &[&str] = &[
    "date",
    "amount",
    "balance",
    "narration",
    "description",
    "debit",
    "credit",
    "reference",
    "particulars",
    "withdrawal",
    "deposit",
];

/// Rows searched for a header when `header_row` is not given.
pub(crate) const HEADER_SEARCH_ROWS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// `col_N`, zero-based.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementTemplate {
    pub name: String,
    #[serde(default)]
    pub institution: Option<Institution>,
    #[serde(default = "default_kind")]
    pub document_kind: DocumentKind,
    /// Zero-based header row; data starts on the next row.
    #[serde(default)]
    pub header_row: Option<usize>,
    pub mappings: BTreeMap<String, FieldMapping>,
    /// Rows containing any of these (case-insensitive) are skipped.
    #[serde(default)]
    pub skip_rows_containing: Vec<String>,
}

fn default_kind() -> DocumentKind {
    DocumentKind::BankStatement
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateField {
    Serial,
    Date,
    ValueDate,
    Narration,
    Reference,
    Withdrawal,
    Deposit,
    Amount,
    TransactionType,
    Balance,
}

/// Accepts both `value_date` and `valueDate` spellings.
fn template_field(name: &str) -> Option<TemplateField> {
    let key: String = name
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_lowercase();
    let field = match key.as_str() {
        "serial" => TemplateField::Serial,
        "date" => TemplateField::Date,
        "valuedate" => TemplateField::ValueDate,
        "narration" | "description" => TemplateField::Narration,
        "reference" => TemplateField::Reference,
        "withdrawal" | "debit" => TemplateField::Withdrawal,
        "deposit" | "credit" => TemplateField::Deposit,
        "amount" => TemplateField::Amount,
        "transactiontype" | "direction" => TemplateField::TransactionType,
        "balance" => TemplateField::Balance,
        _ => return None,
    };
    Some(field)
}

fn column_index(source: &str) -> Option<usize> {
    source.trim().strip_prefix("col_")?.parse().ok()
}

impl StatementTemplate {
    /// Column positions for the engine. Call after validation.
    pub fn to_column_map(&self) -> ColumnMap {
        let mut map = ColumnMap::default();
        for (name, mapping) in &self.mappings {
            let (Some(field), Some(index)) = (template_field(name), column_index(&mapping.source))
            else {
                continue;
            };
            let slot = match field {
                TemplateField::Serial => &mut map.serial,
                TemplateField::Date => &mut map.date,
                TemplateField::ValueDate => &mut map.value_date,
                TemplateField::Narration => &mut map.narration,
                TemplateField::Reference => &mut map.reference,
                TemplateField::Withdrawal => &mut map.withdrawal,
                TemplateField::Deposit => &mut map.deposit,
                TemplateField::Amount => &mut map.amount,
                TemplateField::TransactionType => &mut map.direction,
                TemplateField::Balance => &mut map.balance,
            };
            *slot = Some(index);
        }
        map
    }

    fn date_format(&self) -> Option<&str> {
        self.mappings
            .iter()
            .find(|(name, _)| template_field(name) == Some(TemplateField::Date))
            .and_then(|(_, m)| m.format.as_deref())
    }
}

/// Load a template from a JSON file.
pub fn load_template(path: &Path) -> Result<StatementTemplate, KhataError> {
    let content = std::fs::read_to_string(path).map_err(|e| KhataError::TemplateLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let template: StatementTemplate =
        serde_json::from_str(&content).map_err(|e| KhataError::TemplateLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_template(&template)?;
    Ok(template)
}

/// Parse a template from a JSON string (no file path context).
pub fn parse_template_str(json: &str) -> Result<StatementTemplate, KhataError> {
    let template: StatementTemplate = serde_json::from_str(json)?;
    validate_template(&template)?;
    Ok(template)
}

/// Validate that a template is well-formed.
pub fn validate_template(template: &StatementTemplate) -> Result<(), KhataError> {
    if template.name.trim().is_empty() {
        return Err(KhataError::TemplateInvalid("name must not be empty".into()));
    }

    for (name, mapping) in &template.mappings {
        if template_field(name).is_none() {
            return Err(KhataError::TemplateInvalid(format!(
                "unknown field '{name}'"
            )));
        }
        if column_index(&mapping.source).is_none() {
            return Err(KhataError::TemplateInvalid(format!(
                "field '{}' has source '{}' (expected col_N)",
                name, mapping.source
            )));
        }
    }

    let map = template.to_column_map();
    if map.date.is_none() {
        return Err(KhataError::TemplateInvalid(
            "a date mapping is required".into(),
        ));
    }
    if !map.is_usable() {
        return Err(KhataError::TemplateInvalid(
            "at least one of amount, withdrawal or deposit must be mapped".into(),
        ));
    }
    if map.narration.is_none() {
        return Err(KhataError::TemplateInvalid(
            "a narration mapping is required".into(),
        ));
    }
    Ok(())
}

/// Parses any document with a [`StatementTemplate`], bypassing routing.
pub struct TemplateStrategy<'t> {
    template: &'t StatementTemplate,
}

impl<'t> TemplateStrategy<'t> {
    pub fn new(template: &'t StatementTemplate) -> Self {
        TemplateStrategy { template }
    }
}

impl StatementStrategy for TemplateStrategy<'_> {
    fn institution(&self) -> Institution {
        self.template.institution.unwrap_or(Institution::Generic)
    }

    fn document_kind(&self) -> DocumentKind {
        self.template.document_kind
    }

    fn preferred_layout(&self) -> Layout {
        Layout::Cells
    }

    fn name(&self) -> String {
        format!("template/{}", self.template.name)
    }

    fn parse(&self, text: &ExtractedText, ctx: &ParseContext<'_>) -> StrategyOutput {
        let skip_phrases: Vec<String> = self
            .template
            .skip_rows_containing
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        let data_start = match self.template.header_row {
            Some(row) => row + 1,
            None => find_header_row(text).map(|row| row + 1).unwrap_or(0),
        };
        debug!(template = %self.template.name, data_start, "parsing with template");

        let rules = TableRules {
            date_hint: self.template.date_format(),
            fixed_columns: Some(self.template.to_column_map()),
            data_start,
            skip_phrases: &skip_phrases,
            ..TableRules::new(ctx.settings.tabular.blank_run)
        };
        let out = parse_table(text, &rules)
            .into_output(false, &format!("template '{}'", self.template.name));
        if out.transactions.is_empty() && out.skipped_rows.is_empty() {
            return StrategyOutput::no_anchor(format!(
                "template '{}' matched no rows",
                self.template.name
            ));
        }
        out
    }
}

/// First row among the leading rows naming at least two header keywords.
fn find_header_row(text: &ExtractedText) -> Option<usize> {
    let rows: Vec<String> = match text {
        ExtractedText::Cells(grids) => grids
            .first()
            .map(|g| g.rows.iter().map(|r| r.join(" ")).collect())
            .unwrap_or_default(),
        ExtractedText::Lines(_) => text.lines(),
    };
    rows.iter()
        .take(HEADER_SEARCH_ROWS)
        .position(|row| is_header_like(row))
}

/// Names at least two header keywords.
pub(crate) fn is_header_like(row: &str) -> bool {
    let lower = row.to_lowercase();
    HEADER_KEYWORDS.iter().filter(|k| lower.contains(*k)).count() >= 2
}
