use std::io::Cursor;

use calamine::{Data, Reader, Sheets, Xls, XlsError};

use crate::error::KhataError;
use crate::extraction::CellGrid;
use tracing::warn;

/// Compound File Binary header shared by legacy xls and encrypted OOXML.
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Read every sheet of an xlsx/xls/ods workbook into cell grids.
///
/// Date cells are rendered as spreadsheet serial numbers; the date
/// canonicalizer decodes them. Password-protected workbooks cannot be
/// opened and report `DecryptionFailed`.
pub fn read_workbook(bytes: &[u8], passphrase: Option<&str>) -> Result<Vec<CellGrid>, KhataError> {
    let encrypted = KhataError::DecryptionFailed {
        passphrase_supplied: passphrase.is_some(),
    };
    if is_encrypted_package(bytes) {
        warn!("workbook is an encrypted OOXML package");
        return Err(encrypted);
    }

    let cursor = Cursor::new(bytes);
    let opened = if bytes.starts_with(CFB_MAGIC) {
        // Auto-detection hides the xls password error, so open legacy files directly.
        match calamine::open_workbook_from_rs::<Xls<_>, _>(cursor) {
            Ok(xls) => Ok(Sheets::Xls(xls)),
            Err(XlsError::Password) => return Err(encrypted),
            Err(e) => Err(e.to_string()),
        }
    } else {
        calamine::open_workbook_auto_from_rs(cursor).map_err(|e| e.to_string())
    };
    let mut workbook =
        opened.map_err(|e| KhataError::Spreadsheet(format!("failed to open workbook: {e}")))?;

    let mut grids = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| KhataError::Spreadsheet(format!("sheet '{name}': {e}")))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_as_string).collect())
            .collect();
        grids.push(CellGrid { name, rows });
    }
    Ok(grids)
}

/// Read a CSV export. Rows may have differing widths.
pub fn read_csv(bytes: &[u8]) -> Result<CellGrid, KhataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| KhataError::Spreadsheet(format!("csv: {e}")))?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(CellGrid {
        name: "csv".into(),
        rows,
    })
}

/// Encrypted xlsx files are CFB containers holding an `EncryptedPackage`
/// stream; directory entry names are UTF-16LE.
fn is_encrypted_package(bytes: &[u8]) -> bool {
    if !bytes.starts_with(CFB_MAGIC) {
        return false;
    }
    let needle: Vec<u8> = "EncryptedPackage"
        .encode_utf16()
        .flat_map(|u| u.to_le_bytes())
        .collect();
    bytes.windows(needle.len()).any(|w| w == needle.as_slice())
}

fn cell_as_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => format_float(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format_float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}
