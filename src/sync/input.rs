//! Spreadsheet input: turns the first (or a named) sheet into records

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use log::{debug, info, warn};
use serde_json::{Number, Value};
use std::path::{Path, PathBuf};

use super::record::InputRecord;

/// Anything that can produce the ordered list of records to sync
pub trait RecordSource {
    fn read_records(&self) -> Result<Vec<InputRecord>>;
}

/// `.csv` files via the csv reader, workbooks via calamine
#[derive(Debug, Clone)]
pub struct SpreadsheetSource {
    path: PathBuf,
    sheet: Option<String>,
}

impl SpreadsheetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
        }
    }

    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }

    fn is_csv(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
    }

    fn read_csv(&self) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open CSV file: {:?}", self.path))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV headers: {:?}", self.path))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.with_context(|| format!("Failed to read CSV row {}", line + 2))?;
            rows.push(row.iter().map(scalar_from_text).collect());
        }

        Ok((headers, rows))
    }

    fn read_workbook(&self) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        let mut workbook = open_workbook_auto(&self.path)
            .map_err(|e| anyhow!("Failed to open workbook {:?}: {}", self.path, e))?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("Excel file contains no sheets"))?,
        };
        debug!("Reading sheet '{}' from {:?}", sheet_name, self.path);

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| anyhow!("Error reading sheet '{}': {}", sheet_name, e))?;

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(header_row) => header_row.iter().map(|cell| cell.to_string()).collect(),
            None => return Ok((Vec::new(), Vec::new())),
        };
        let rows = rows
            .map(|row| row.iter().map(scalar_from_cell).collect())
            .collect();

        Ok((headers, rows))
    }
}

impl RecordSource for SpreadsheetSource {
    fn read_records(&self) -> Result<Vec<InputRecord>> {
        info!("Reading records from {:?}", self.path);

        let (headers, rows) = if self.is_csv() {
            self.read_csv()?
        } else {
            self.read_workbook()?
        };

        if headers.is_empty() && rows.is_empty() {
            warn!("{:?} is empty", self.path);
            return Ok(Vec::new());
        }

        let columns = ColumnMap::from_headers(&headers)?;
        let records: Vec<InputRecord> = rows
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.is_null()))
            .map(|row| columns.record(row))
            .collect();

        for record in records.iter().filter(|r| r.email.is_empty()) {
            warn!("Row without email will be sent as-is: {:?}", record);
        }

        info!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }
}

/// Column positions of the fields we read
#[derive(Debug, Clone, PartialEq)]
struct ColumnMap {
    email: usize,
    year: Option<usize>,
    quarter: Option<usize>,
    persona: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let email = find("email").ok_or_else(|| anyhow!("Input has no 'email' column"))?;
        let columns = Self {
            email,
            year: find("year"),
            quarter: find("quarter"),
            persona: find("persona"),
        };

        for (name, index) in [
            ("year", columns.year),
            ("quarter", columns.quarter),
            ("persona", columns.persona),
        ] {
            if index.is_none() {
                warn!("Input has no '{}' column; the value will be null", name);
            }
        }

        Ok(columns)
    }

    fn record(&self, row: &[Value]) -> InputRecord {
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .cloned()
                .unwrap_or(Value::Null)
        };

        let email = match cell(Some(self.email)) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };

        InputRecord {
            email,
            year: cell(self.year),
            quarter: cell(self.quarter),
            persona: cell(self.persona),
        }
    }
}

/// Interpret a text cell the way a spreadsheet would: numbers become numbers
fn scalar_from_text(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    match text.parse::<f64>() {
        Ok(float) if float.is_finite() => float_value(float),
        _ => Value::String(text.to_string()),
    }
}

fn scalar_from_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Value::Null
            } else {
                Value::String(s.to_string())
            }
        }
        other => scalar_from_text(&other.to_string()),
    }
}

/// Whole floats (how workbooks store integers) become integers
fn float_value(float: f64) -> Value {
    if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Value::from(float as i64)
    } else {
        Number::from_f64(float)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Convenience for callers holding only a path
pub fn read_records(path: &Path, sheet: Option<String>) -> Result<Vec<InputRecord>> {
    SpreadsheetSource::new(path).with_sheet(sheet).read_records()
}
