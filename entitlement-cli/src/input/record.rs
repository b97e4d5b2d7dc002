//! Spreadsheet rows and their typed per-job schemas

use anyhow::{Result, bail};
use std::collections::HashMap;

/// A loosely typed spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Bool(bool),
    Number(f64),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Cell rendered as trimmed text; whole numbers lose their fraction
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                (*n as i64).to_string()
            }
            Cell::Number(n) => n.to_string(),
        }
    }

    /// Spreadsheet boolean: blank is false
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Cell::Empty => Ok(false),
            Cell::Bool(b) => Ok(*b),
            Cell::Number(n) if *n == 0.0 => Ok(false),
            Cell::Number(n) if *n == 1.0 => Ok(true),
            Cell::Number(n) => bail!("'{}' is not a boolean", n),
            Cell::Text(s) => match s.trim().to_lowercase().as_str() {
                "" | "false" | "no" | "n" | "0" => Ok(false),
                "true" | "yes" | "y" | "1" => Ok(true),
                other => bail!("'{}' is not a boolean", other),
            },
        }
    }
}

/// One data row, keyed by header name
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based spreadsheet row number (the header is row 1)
    pub row: usize,
    cells: HashMap<String, Cell>,
}

impl Record {
    pub fn new(row: usize, cells: HashMap<String, Cell>) -> Self {
        Self { row, cells }
    }

    pub fn cell(&self, column: &str) -> &Cell {
        self.cells.get(column).unwrap_or(&Cell::Empty)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(Cell::is_blank)
    }

    /// Trimmed text, empty when missing
    pub fn text(&self, column: &str) -> String {
        self.cell(column).as_text()
    }

    /// Trimmed text, `None` when blank
    pub fn optional_text(&self, column: &str) -> Option<String> {
        Some(self.text(column)).filter(|s| !s.is_empty())
    }

    /// Non-blank text, an error otherwise
    pub fn required_text(&self, column: &str) -> Result<String> {
        match self.optional_text(column) {
            Some(value) => Ok(value),
            None => bail!("{} is empty", column),
        }
    }

    pub fn flag(&self, column: &str) -> Result<bool> {
        self.cell(column)
            .as_bool()
            .map_err(|e| anyhow::anyhow!("{}: {}", column, e))
    }

    /// Optional non-negative whole number
    pub fn optional_count(&self, column: &str) -> Result<Option<u32>> {
        match self.optional_text(column) {
            None => Ok(None),
            Some(value) => match value.parse::<u32>() {
                Ok(n) => Ok(Some(n)),
                Err(_) => bail!("{}: '{}' is not a whole number of days", column, value),
            },
        }
    }
}

/// A per-job typed row built from a spreadsheet record
pub trait FromRecord: Sized {
    /// Columns that must be present in the header
    const REQUIRED_COLUMNS: &'static [&'static str];

    fn from_record(record: &Record) -> Result<Self>;

    /// Short human label used in progress output
    fn label(&self) -> String;
}
