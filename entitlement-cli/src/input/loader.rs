//! Read CSV and Excel input files into records
//!
//! The first row is the header. Required columns are checked against the
//! header before any row is handed to a job, so a missing column aborts the
//! run before the first remote call.

use calamine::{Data, Reader, open_workbook_auto};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::record::{Cell, FromRecord, Record};

/// Failures that abort a run before any record is processed
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Input file {} is missing required column(s): {}", .path.display(), .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("Failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
}

/// Header plus data rows of an input file
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        let mut rows = rows.into_iter();
        let headers: Vec<String> = rows
            .next()
            .unwrap_or_default()
            .iter()
            .map(|c| c.as_text().trim_start_matches('\u{feff}').to_string())
            .collect();

        let records = rows
            .enumerate()
            .map(|(idx, row)| {
                let cells: HashMap<String, Cell> = headers
                    .iter()
                    .zip(row)
                    .filter(|(header, _)| !header.is_empty())
                    .map(|(header, cell)| (header.clone(), cell))
                    .collect();
                // +2: 1-based, and the header occupies row 1
                Record::new(idx + 2, cells)
            })
            .filter(|record| !record.is_empty())
            .collect();

        Self { headers, records }
    }

    /// Required columns absent from the header, in declaration order
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|column| !self.headers.iter().any(|h| h == *column))
            .map(|column| column.to_string())
            .collect()
    }
}

/// A data row after typed parsing; parse failures stay per-row
#[derive(Debug)]
pub struct Row<T> {
    pub number: usize,
    pub parsed: anyhow::Result<T>,
}

/// Read a CSV or spreadsheet file by extension (first sheet for workbooks)
pub fn read_table(path: &Path) -> Result<Table, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_rows(path),
        _ => read_csv_rows(path),
    }
    .map_err(|message| LoadError::Read {
        path: path.to_path_buf(),
        message,
    })?;

    Ok(Table::from_rows(rows))
}

/// Read and validate an input file, then parse every row into `T`
pub fn load<T: FromRecord>(path: &Path) -> Result<Vec<Row<T>>, LoadError> {
    let table = read_table(path)?;

    let missing = table.missing_columns(T::REQUIRED_COLUMNS);
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    log::info!(
        "Loaded {} record(s) from {}",
        table.records.len(),
        path.display()
    );

    Ok(table
        .records
        .iter()
        .map(|record| Row {
            number: record.row,
            parsed: T::from_record(record),
        })
        .collect())
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<Cell>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        rows.push(
            record
                .iter()
                .map(|value| {
                    if value.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(value.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<Cell>>, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| e.to_string())?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "workbook has no sheets".to_string())?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("sheet '{}': {}", sheet_name, e))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect())
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Text(format!("{}", dt)),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}
