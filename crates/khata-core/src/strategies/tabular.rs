//! Shared engine for column-oriented statements.
//!
//! Locates the header row by token pairs, classifies its columns, then
//! streams rows until an end-of-table marker. Works on spreadsheet cells
//! directly and on layout text by aligning each line under the header.

use crate::canonical::{normalize_amount, normalize_date, resolve_direction, DrCr, ParsedAmount};
use crate::extraction::table::{align_to_header, line_spans};
use crate::extraction::ExtractedText;
use crate::model::{CandidateTransaction, FlagKind, ValidationFlag};
use crate::report::SkippedRow;
use crate::strategies::accumulate::{append_continuation, is_rule_line, is_summary_banner};
use crate::strategies::StrategyOutput;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Header token pairs: a row containing both tokens starts a table.
pub const DEFAULT_HEADER_PAIRS: &[(&str, &str)] = &[
    ("date", "narration"),
    ("date", "description"),
    ("date", "particulars"),
    ("date", "remarks"),
    ("date", "details"),
    ("date", "type"),
];

/// Column positions within a row. Indices are zero-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub serial: Option<usize>,
    pub date: Option<usize>,
    pub value_date: Option<usize>,
    pub narration: Option<usize>,
    pub reference: Option<usize>,
    pub withdrawal: Option<usize>,
    pub deposit: Option<usize>,
    pub amount: Option<usize>,
    /// Dr/Cr or transaction-type column.
    pub direction: Option<usize>,
    pub balance: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Serial,
    Date,
    ValueDate,
    Narration,
    Reference,
    Withdrawal,
    Deposit,
    Amount,
    Direction,
    Balance,
}

impl ColumnMap {
    /// Classify header cells. The first cell claiming a column wins.
    pub fn from_header(cells: &[String]) -> ColumnMap {
        let mut map = ColumnMap::default();
        for (i, cell) in cells.iter().enumerate() {
            let slot = match classify_header(cell) {
                Some(Column::Serial) => &mut map.serial,
                Some(Column::Date) => &mut map.date,
                Some(Column::ValueDate) => &mut map.value_date,
                Some(Column::Narration) => &mut map.narration,
                Some(Column::Reference) => &mut map.reference,
                Some(Column::Withdrawal) => &mut map.withdrawal,
                Some(Column::Deposit) => &mut map.deposit,
                Some(Column::Amount) => &mut map.amount,
                Some(Column::Direction) => &mut map.direction,
                Some(Column::Balance) => &mut map.balance,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(i);
            }
        }
        map
    }

    /// A date column and at least one amount column.
    pub fn is_usable(&self) -> bool {
        self.date.is_some()
            && (self.withdrawal.is_some() || self.deposit.is_some() || self.amount.is_some())
    }

    fn has_split_amounts(&self) -> bool {
        self.withdrawal.is_some() || self.deposit.is_some()
    }
}

fn classify_header(cell: &str) -> Option<Column> {
    let h = cell.trim().to_lowercase().replace('.', "");
    let compact: String = h.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    if h.contains("value") && (h.contains("date") || h.contains("dt")) {
        return Some(Column::ValueDate);
    }
    if h.contains("balance") || compact == "bal" {
        return Some(Column::Balance);
    }
    if matches!(
        compact.as_str(),
        "dr/cr" | "cr/dr" | "drcr" | "crdr" | "debit/credit" | "credit/debit" | "type"
            | "txntype" | "transactiontype"
    ) {
        return Some(Column::Direction);
    }
    if h.contains("withdrawal") || h.contains("debit") || compact == "dr" || h.contains("paid out") {
        return Some(Column::Withdrawal);
    }
    if h.contains("deposit") || h.contains("credit") || compact == "cr" || h.contains("paid in") {
        return Some(Column::Deposit);
    }
    if h.contains("date") || compact == "dt" || compact == "txndt" {
        return Some(Column::Date);
    }
    if ["narration", "description", "particulars", "remarks", "details"]
        .iter()
        .any(|k| h.contains(k))
    {
        return Some(Column::Narration);
    }
    if h.contains("chq") || h.contains("cheque") || h.contains("ref") {
        return Some(Column::Reference);
    }
    if h.contains("amount") || h.contains("amt") {
        return Some(Column::Amount);
    }
    if matches!(compact.as_str(), "#" | "sno" | "slno" | "srno" | "serial" | "serialno" | "no") {
        return Some(Column::Serial);
    }
    None
}

/// Layout knowledge handed to the engine by a strategy.
#[derive(Debug, Clone)]
pub struct TableRules<'a> {
    pub header_pairs: &'a [(&'a str, &'a str)],
    /// Row prefixes (lowercase) that end the table, beyond the shared banners.
    pub end_markers: &'a [&'a str],
    pub date_hint: Option<&'a str>,
    pub blank_run: usize,
    /// Skip header search and read every row with these columns.
    pub fixed_columns: Option<ColumnMap>,
    /// Rows to skip before data when `fixed_columns` is set.
    pub data_start: usize,
    /// Rows containing any of these (lowercase) are dropped as noise.
    pub skip_phrases: &'a [String],
}

impl<'a> TableRules<'a> {
    pub fn new(blank_run: usize) -> Self {
        TableRules {
            header_pairs: DEFAULT_HEADER_PAIRS,
            end_markers: &[],
            date_hint: None,
            blank_run,
            fixed_columns: None,
            data_start: 0,
            skip_phrases: &[],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableParse {
    pub transactions: Vec<CandidateTransaction>,
    pub skipped: Vec<SkippedRow>,
    /// Indices whose direction came from keywords or the default.
    pub inferred: Vec<usize>,
    pub header_found: bool,
    /// Balance printed on an "Opening Balance" row, if present.
    pub opening_balance: Option<Decimal>,
}

impl TableParse {
    /// Convert into strategy output, optionally flagging inferred directions.
    pub fn into_output(self, flag_inferred: bool, anchor_description: &str) -> StrategyOutput {
        if !self.header_found {
            return StrategyOutput::no_anchor(format!(
                "no {anchor_description} header row found"
            ));
        }
        let flags = if flag_inferred {
            self.inferred
                .iter()
                .map(|&i| ValidationFlag {
                    transaction_index: i,
                    kind: FlagKind::DirectionInferred,
                    reason: "no debit/credit column or marker; direction taken from narration"
                        .into(),
                })
                .collect()
        } else {
            Vec::new()
        };
        StrategyOutput {
            transactions: self.transactions,
            flags,
            skipped_rows: self.skipped,
            ..StrategyOutput::default()
        }
    }
}

/// Parse every table found in `text`.
pub fn parse_table(text: &ExtractedText, rules: &TableRules<'_>) -> TableParse {
    let mut state = TableState::new(rules);

    match text {
        ExtractedText::Cells(grids) => {
            for grid in grids {
                state.start_grid();
                for (i, row) in grid.rows.iter().enumerate() {
                    if rules.fixed_columns.is_some() && i < rules.data_start {
                        continue;
                    }
                    state.feed(row);
                }
            }
        }
        ExtractedText::Lines(pages) => {
            let mut header = None;
            let lines = pages.iter().flat_map(|p| p.lines.iter());
            for (i, line) in lines.enumerate() {
                if rules.fixed_columns.is_some() && i < rules.data_start {
                    continue;
                }
                let spans = line_spans(line);
                let cells: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
                if state.is_header_row(&cells) {
                    state.set_header(&cells);
                    header = Some(spans);
                    continue;
                }
                match &header {
                    Some(h) => state.feed(&align_to_header(h, &spans)),
                    None if rules.fixed_columns.is_some() => state.feed(&cells),
                    None => {}
                }
            }
        }
    }

    debug!(
        rows = state.out.transactions.len(),
        skipped = state.out.skipped.len(),
        header_found = state.out.header_found,
        "table parsed"
    );
    state.out
}

struct TableState<'r> {
    rules: &'r TableRules<'r>,
    columns: Option<ColumnMap>,
    ended: bool,
    blank_run: usize,
    seen_data: bool,
    out: TableParse,
}

impl<'r> TableState<'r> {
    fn new(rules: &'r TableRules<'r>) -> Self {
        let mut out = TableParse::default();
        if rules.fixed_columns.is_some() {
            out.header_found = true;
        }
        TableState {
            rules,
            columns: rules.fixed_columns,
            ended: false,
            blank_run: 0,
            seen_data: false,
            out,
        }
    }

    fn start_grid(&mut self) {
        if self.rules.fixed_columns.is_none() {
            self.columns = None;
        }
        self.ended = false;
        self.blank_run = 0;
        self.seen_data = false;
    }

    fn is_header_row(&self, cells: &[String]) -> bool {
        if self.rules.fixed_columns.is_some() {
            return false;
        }
        let lowered: Vec<String> = cells.iter().map(|c| c.trim().to_lowercase()).collect();
        let has = |token: &str| lowered.iter().any(|c| c.contains(token));
        let pair_found = self
            .rules
            .header_pairs
            .iter()
            .any(|(a, b)| has(a) && has(b));
        pair_found && ColumnMap::from_header(cells).is_usable()
    }

    fn set_header(&mut self, cells: &[String]) {
        let columns = ColumnMap::from_header(cells);
        debug!(?columns, "table header found");
        self.columns = Some(columns);
        self.out.header_found = true;
        self.ended = false;
        self.blank_run = 0;
    }

    fn feed(&mut self, row: &[String]) {
        if self.is_header_row(row) {
            self.set_header(row);
            return;
        }
        let Some(columns) = self.columns else {
            return;
        };
        if self.ended {
            return;
        }

        let filled: Vec<&str> = row
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if filled.is_empty() {
            self.blank_run += 1;
            if self.seen_data && self.blank_run >= self.rules.blank_run {
                self.ended = true;
            }
            return;
        }
        self.blank_run = 0;

        if filled.iter().all(|c| is_rule_line(c)) {
            if self.seen_data {
                self.ended = true;
            }
            return;
        }

        let joined = filled.join(" ");
        let lower = joined.to_lowercase();
        if is_summary_banner(&joined) || self.rules.end_markers.iter().any(|m| lower.starts_with(m)) {
            if self.seen_data {
                self.ended = true;
            }
            return;
        }
        if self.rules.skip_phrases.iter().any(|p| lower.contains(p.as_str())) {
            self.skip(&joined, "matched skip phrase");
            return;
        }

        self.parse_row(row, &columns, &joined);
    }

    fn parse_row(&mut self, row: &[String], cols: &ColumnMap, joined: &str) {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(|s| s.trim()).unwrap_or("");

        let date_raw = cell(cols.date);
        let narration = cell(cols.narration);

        if date_raw.is_empty() {
            if !narration.is_empty() && amounts_blank(row, cols) {
                if let Some(last) = self.out.transactions.last_mut() {
                    append_continuation(&mut last.description, narration);
                    return;
                }
            }
            self.skip(joined, "no date");
            return;
        }

        let date = match normalize_date(date_raw, self.rules.date_hint) {
            Ok(d) => d,
            Err(e) => {
                self.skip(joined, e.to_string());
                return;
            }
        };

        let balance = parse_balance(cell(cols.balance));

        let (amount, column_token) = match row_amount(row, cols) {
            Ok(Some(found)) => found,
            Ok(None) => {
                if narration.to_lowercase().contains("opening balance") {
                    self.out.opening_balance = self.out.opening_balance.or(balance);
                }
                self.skip(joined, "zero amount");
                return;
            }
            Err(reason) => {
                self.skip(joined, reason);
                return;
            }
        };

        let direction_cell = cell(cols.direction);
        let explicit = column_token
            .or_else(|| (!direction_cell.is_empty()).then_some(direction_cell))
            .or_else(|| amount.negative.then_some("dr"));
        let hint = resolve_direction(explicit, amount.marker, narration);

        let mut txn = CandidateTransaction::new(date, narration, amount.value, hint.direction);
        txn.running_balance = balance;
        txn.value_date = normalize_date(cell(cols.value_date), self.rules.date_hint).ok();
        let reference = cell(cols.reference);
        if !reference.chars().all(|c| c == '0' || c == '-') {
            txn.reference_number = Some(reference.to_string());
        }
        txn.extras.serial = cell(cols.serial).trim_end_matches('.').parse().ok();

        if hint.is_inferred() {
            self.out.inferred.push(self.out.transactions.len());
        }
        self.out.transactions.push(txn);
        self.seen_data = true;
    }

    fn skip(&mut self, text: &str, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(row = text, %reason, "row skipped");
        self.out.skipped.push(SkippedRow::new(text, reason));
    }
}

type RowAmount = (ParsedAmount, Option<&'static str>);

/// The row's amount and the direction its column implies, `None` when the
/// row carries no amount.
fn row_amount(row: &[String], cols: &ColumnMap) -> Result<Option<RowAmount>, String> {
    let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(|s| s.as_str()).unwrap_or("");

    if cols.has_split_amounts() {
        let withdrawal = normalize_amount(cell(cols.withdrawal)).map_err(|e| e.to_string())?;
        let deposit = normalize_amount(cell(cols.deposit)).map_err(|e| e.to_string())?;
        match (withdrawal.is_zero(), deposit.is_zero()) {
            (false, true) => return Ok(Some((withdrawal, Some("dr")))),
            (true, false) => return Ok(Some((deposit, Some("cr")))),
            (false, false) => {
                return Err(format!(
                    "both withdrawal {} and deposit {} present",
                    withdrawal.value, deposit.value
                ))
            }
            (true, true) => {}
        }
    }

    if cols.amount.is_some() {
        let amount = normalize_amount(cell(cols.amount)).map_err(|e| e.to_string())?;
        if !amount.is_zero() {
            return Ok(Some((amount, None)));
        }
    }

    Ok(None)
}

fn amounts_blank(row: &[String], cols: &ColumnMap) -> bool {
    [cols.withdrawal, cols.deposit, cols.amount, cols.balance]
        .iter()
        .flatten()
        .all(|&i| row.get(i).map(|c| c.trim().is_empty()).unwrap_or(true))
}

/// Running balance; a Dr marker or minus sign means overdrawn.
pub fn parse_balance(raw: &str) -> Option<Decimal> {
    if !raw.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let parsed = normalize_amount(raw).ok()?;
    if parsed.negative || parsed.marker == Some(DrCr::Dr) {
        Some(-parsed.value)
    } else {
        Some(parsed.value)
    }
}
