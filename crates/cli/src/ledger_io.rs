//! Ledger file reading: delimited text or the first worksheet of a
//! spreadsheet. Both produce a header row plus header-keyed raw rows for the
//! normalizer.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use ordercheck_recon::{raw_row, read_ledger_delimited, LedgerSheet};

use crate::exit_codes::{EXIT_IO, EXIT_USAGE};
use crate::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerFormat {
    Csv,
    Tsv,
    Spreadsheet,
}

impl LedgerFormat {
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Spreadsheet),
            other => Err(CliError {
                code: EXIT_USAGE,
                message: format!("unsupported ledger format '.{other}' ({})", path.display()),
                hint: Some("use a .csv, .tsv, .xlsx, .xls or .ods file".into()),
            }),
        }
    }
}

fn io_err(path: &Path, e: impl std::fmt::Display) -> CliError {
    CliError {
        code: EXIT_IO,
        message: format!("cannot read ledger {}: {e}", path.display()),
        hint: None,
    }
}

/// Read a ledger file (first row = headers).
pub fn read_ledger(path: &Path) -> Result<LedgerSheet, CliError> {
    match LedgerFormat::from_path(path)? {
        LedgerFormat::Csv => read_delimited(path, b','),
        LedgerFormat::Tsv => read_delimited(path, b'\t'),
        LedgerFormat::Spreadsheet => read_spreadsheet(path),
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<LedgerSheet, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    read_ledger_delimited(&text, delimiter).map_err(|e| io_err(path, e))
}

fn read_spreadsheet(path: &Path) -> Result<LedgerSheet, CliError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| io_err(path, e))?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Err(io_err(path, "workbook has no worksheets"));
    };
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| io_err(path, e))?;

    let mut rows = range.rows();
    let Some(header_cells) = rows.next() else {
        return Ok(LedgerSheet::default());
    };
    let headers: Vec<String> = header_cells
        .iter()
        .map(|c| cell_text(c).trim().to_string())
        .collect();

    let rows = rows
        .map(|cells| {
            let texts: Vec<String> = cells.iter().map(cell_text).collect();
            raw_row(&headers, &texts)
        })
        .filter(|row| row.values().any(|v| !v.trim().is_empty()))
        .collect();
    Ok(LedgerSheet { headers, rows })
}

/// Cell value as the text a CSV export of the sheet would contain.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
    }
}
