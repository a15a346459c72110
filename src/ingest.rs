//! Tabular input for the index builder.
//!
//! Reads the guideline spreadsheet into a [`Table`]. The first row is the header; every
//! following row is one record.

use crate::error::{Result, RoadSafeError};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, instrument};

/// Separator placed between cells when a record is flattened to text.
pub const CELL_SEPARATOR: &str = " | ";

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableFormat {
    /// Excel or OpenDocument workbook (first worksheet).
    Workbook,
    Csv,
    Tsv,
}

impl TableFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(TableFormat::Workbook),
            "csv" => Ok(TableFormat::Csv),
            "tsv" | "tab" => Ok(TableFormat::Tsv),
            _ => Err(RoadSafeError::InvalidInput(format!(
                "Unsupported table format for {}. Use xlsx, xls, ods, csv or tsv.",
                path.display()
            ))),
        }
    }
}

/// A header row plus records, all cells stringified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// One text per record: the record's cells joined with [`CELL_SEPARATOR`].
    pub fn document_texts(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.join(CELL_SEPARATOR)).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a table from disk. A table without records is an error.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(RoadSafeError::Ingest(format!(
            "Input file not found: {}",
            path.display()
        )));
    }

    let table = match TableFormat::from_path(path)? {
        TableFormat::Workbook => read_workbook(path)?,
        TableFormat::Csv => read_delimited(path, b',')?,
        TableFormat::Tsv => read_delimited(path, b'\t')?,
    };

    if table.is_empty() {
        return Err(RoadSafeError::Ingest(format!(
            "{} contains no records below the header row",
            path.display()
        )));
    }

    debug!("Read {} records with {} columns", table.len(), table.headers.len());
    Ok(table)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RoadSafeError::Ingest(format!("{} has no worksheets", path.display())))??;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>());

    let headers = rows.next().unwrap_or_default();
    let rows = rows
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(Table { headers, rows })
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.iter().any(|cell| !cell.is_empty()) {
            rows.push(row);
        }
    }

    Ok(Table { headers, rows })
}
