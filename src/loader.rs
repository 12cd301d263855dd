// 📥 Data Loader - spreadsheet → typed rows
// One reader per file format, one column schema for all of them

use crate::dataset::Observation;
use crate::error::{DataFormatError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

// ============================================================================
// COLUMN NAMES
// ============================================================================

pub const COL_COMPANY: &str = "Company Name";
pub const COL_SCORE: &str = "GovernancePillarScore";
pub const COL_CLOSE: &str = "Close Price (USD)";
pub const COL_DATE: &str = "Date";
pub const COL_YEAR: &str = "Year";
pub const COL_RETURN: &str = "AnnualReturnPct";
pub const COL_SECTOR: &str = "Sector";
pub const COL_SECTOR_DE: &str = "Sektor";

/// Sector assigned when the sheet carries no sector column or an empty cell
pub const UNCLASSIFIED_SECTOR: &str = "Unclassified";

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceFormat - which reader handles a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Excel,
    Csv,
}

impl SourceFormat {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Excel => "Excel workbook",
            SourceFormat::Csv => "CSV",
        }
    }
}

/// A single cell, independent of the file format it came from
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

/// Header row plus data rows of the first worksheet
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// One monthly price row, input to the return calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub company: String,
    pub sector: String,
    pub date: NaiveDate,
    pub governance_score: f64,
    pub close_price: f64,
}

/// Where annual returns come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnSource {
    /// Derived from monthly close prices
    ClosePrice,
    /// Read from a precomputed column
    AnnualReturnPct,
}

/// Typed rows, depending on the return source
#[derive(Debug, Clone)]
pub enum SheetRecords {
    Prices(Vec<PriceRow>),
    Returns(Vec<Observation>),
}

impl SheetRecords {
    pub fn len(&self) -> usize {
        match self {
            SheetRecords::Prices(rows) => rows.len(),
            SheetRecords::Returns(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of loading a sheet
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub source_file: PathBuf,
    pub format: SourceFormat,
    pub schema: ColumnSchema,
    pub records: SheetRecords,
    pub rows_read: usize,
    pub rows_dropped: usize,
    /// Rows repeating a (company, year) already seen; price sheets carry one
    /// row per month and report repeats as duplicate months instead
    pub duplicate_years: usize,
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Column positions resolved from the header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub company: usize,
    pub score: usize,
    pub date: Option<usize>,
    pub year: Option<usize>,
    pub close_price: Option<usize>,
    pub annual_return: Option<usize>,
    pub sector: Option<usize>,
}

/// Strip surrounding whitespace and byte-order marks from a header
pub fn normalize_header(header: &str) -> String {
    header.replace('\u{feff}', "").trim().to_string()
}

impl ColumnSchema {
    /// Resolve required and optional columns, failing on the first missing one
    pub fn resolve(headers: &[String]) -> std::result::Result<Self, DataFormatError> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (normalize_header(h), i))
            .collect();
        let find = |name: &str| index.get(name).copied();
        let require = |name: &str| {
            find(name).ok_or_else(|| DataFormatError::MissingColumn(name.to_string()))
        };

        let company = require(COL_COMPANY)?;
        let score = require(COL_SCORE)?;

        let date = find(COL_DATE);
        let year = find(COL_YEAR);
        let close_price = find(COL_CLOSE);
        let annual_return = find(COL_RETURN);

        if date.is_none() && year.is_none() {
            return Err(DataFormatError::MissingColumn(COL_DATE.to_string()));
        }
        if close_price.is_none() && annual_return.is_none() {
            return Err(DataFormatError::MissingColumn(COL_CLOSE.to_string()));
        }
        // Monthly returns need real dates
        if annual_return.is_none() && date.is_none() {
            return Err(DataFormatError::MissingColumn(COL_DATE.to_string()));
        }

        let sector = find(COL_SECTOR).or_else(|| find(COL_SECTOR_DE));

        Ok(ColumnSchema {
            company,
            score,
            date,
            year,
            close_price,
            annual_return,
            sector,
        })
    }

    /// Prices win over a precomputed return column when both are present
    pub fn return_source(&self) -> ReturnSource {
        if self.close_price.is_some() && self.date.is_some() {
            ReturnSource::ClosePrice
        } else {
            ReturnSource::AnnualReturnPct
        }
    }
}

// ============================================================================
// READERS
// ============================================================================

/// SheetReader - one implementation per file format
pub trait SheetReader: Send + Sync {
    /// Read the first worksheet of a file into raw cells
    fn read(&self, path: &Path) -> Result<RawSheet>;

    /// Format this reader handles
    fn format(&self) -> SourceFormat;
}

/// Detect format from the file extension
pub fn detect_format(path: &Path) -> std::result::Result<SourceFormat, DataFormatError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Excel),
        "csv" => Ok(SourceFormat::Csv),
        _ => Err(DataFormatError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Factory: reader for a format
pub fn get_reader(format: SourceFormat) -> Box<dyn SheetReader> {
    match format {
        SourceFormat::Excel => Box::new(ExcelReader),
        SourceFormat::Csv => Box::new(CsvReader),
    }
}

fn unreadable(path: &Path, reason: impl ToString) -> DataFormatError {
    DataFormatError::Unreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Excel / OpenDocument reader backed by calamine
pub struct ExcelReader;

impl SheetReader for ExcelReader {
    fn read(&self, path: &Path) -> Result<RawSheet> {
        use calamine::{open_workbook_auto, Data, Reader};

        let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(path, e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| DataFormatError::NoWorksheet(path.to_path_buf()))?
            .map_err(|e| unreadable(path, e))?;

        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| DataFormatError::EmptySheet(path.to_path_buf()))?;

        let headers = header_row
            .iter()
            .map(|cell| match cell {
                Data::String(s) => s.clone(),
                Data::Empty => String::new(),
                other => other.to_string(),
            })
            .collect();

        let rows = rows
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::Empty | Data::Error(_) => Cell::Empty,
                        Data::Int(i) => Cell::Number(*i as f64),
                        Data::Float(f) => Cell::Number(*f),
                        Data::String(s) => Cell::Text(s.clone()),
                        Data::Bool(b) => Cell::Text(b.to_string()),
                        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
                            .map(Cell::Date)
                            .unwrap_or(Cell::Empty),
                        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
                    })
                    .collect()
            })
            .collect();

        Ok(RawSheet { headers, rows })
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Excel
    }
}

/// CSV reader
pub struct CsvReader;

impl SheetReader for CsvReader {
    fn read(&self, path: &Path) -> Result<RawSheet> {
        use csv::ReaderBuilder;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| unreadable(path, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| unreadable(path, e))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        if headers.iter().all(|h| normalize_header(h).is_empty()) {
            return Err(DataFormatError::EmptySheet(path.to_path_buf()).into());
        }

        let mut rows = Vec::new();
        for (line_num, result) in reader.records().enumerate() {
            // +2 because: 1-indexed + header row
            let record = result.map_err(|e| unreadable(path, format!("line {}: {}", line_num + 2, e)))?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(RawSheet { headers, rows })
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }
}

// ============================================================================
// COERCION
// ============================================================================

/// Excel serial day number → date (1900 date system)
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    None
}

pub fn parse_number_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .or_else(|| text.replace(',', ".").parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => parse_number_text(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Number(n) => excel_serial_to_date(*n),
            Cell::Text(s) => parse_date_text(s),
            Cell::Empty => None,
        }
    }

    pub fn as_year(&self) -> Option<i32> {
        match self {
            Cell::Date(d) => Some(d.year()),
            Cell::Number(n) if n.fract() == 0.0 => Some(*n as i32),
            Cell::Text(s) => s
                .trim()
                .parse::<i32>()
                .ok()
                .or_else(|| parse_date_text(s).map(|d| d.year())),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Cell::Empty => return None,
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Date(d) => d.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn cell(row: &[Cell], index: usize) -> &Cell {
    row.get(index).unwrap_or(&Cell::Empty)
}

// ============================================================================
// LOADING
// ============================================================================

/// Convert a raw sheet into typed rows, dropping rows that cannot be coerced
pub fn records_from_sheet(sheet: &RawSheet) -> Result<(ColumnSchema, SheetRecords, usize)> {
    let schema = ColumnSchema::resolve(&sheet.headers)?;
    let mut dropped = 0usize;

    let sector_of = |row: &[Cell]| {
        schema
            .sector
            .and_then(|i| cell(row, i).as_text())
            .unwrap_or_else(|| UNCLASSIFIED_SECTOR.to_string())
    };

    let records = match schema.return_source() {
        ReturnSource::ClosePrice => {
            let (date_idx, close_idx) = match (schema.date, schema.close_price) {
                (Some(d), Some(c)) => (d, c),
                _ => return Err(DataFormatError::MissingColumn(COL_CLOSE.to_string()).into()),
            };
            let mut rows = Vec::with_capacity(sheet.rows.len());
            for row in &sheet.rows {
                let parsed = (|| {
                    let company = cell(row, schema.company).as_text()?;
                    let governance_score = cell(row, schema.score).as_f64()?;
                    let date = cell(row, date_idx).as_date()?;
                    let close_price = cell(row, close_idx).as_f64().filter(|p| *p > 0.0)?;
                    Some(PriceRow {
                        company,
                        sector: sector_of(row),
                        date,
                        governance_score,
                        close_price,
                    })
                })();
                match parsed {
                    Some(r) => rows.push(r),
                    None => dropped += 1,
                }
            }
            SheetRecords::Prices(rows)
        }
        ReturnSource::AnnualReturnPct => {
            let return_idx = schema
                .annual_return
                .ok_or_else(|| DataFormatError::MissingColumn(COL_RETURN.to_string()))?;
            let mut rows = Vec::with_capacity(sheet.rows.len());
            for row in &sheet.rows {
                let parsed = (|| {
                    let company = cell(row, schema.company).as_text()?;
                    let governance_score = cell(row, schema.score).as_f64()?;
                    let year = match schema.date {
                        Some(i) => cell(row, i).as_date().map(|d| d.year()),
                        None => None,
                    }
                    .or_else(|| schema.year.and_then(|i| cell(row, i).as_year()))?;
                    let annual_return_pct = cell(row, return_idx).as_f64()?;
                    Some(Observation {
                        company,
                        sector: sector_of(row),
                        year,
                        governance_score,
                        annual_return_pct,
                    })
                })();
                match parsed {
                    Some(r) => rows.push(r),
                    None => dropped += 1,
                }
            }
            SheetRecords::Returns(rows)
        }
    };

    Ok((schema, records, dropped))
}

/// Load a spreadsheet from disk
pub fn load_sheet(path: &Path) -> Result<LoadReport> {
    if !path.exists() {
        return Err(unreadable(path, "file not found").into());
    }

    let format = detect_format(path)?;
    let reader = get_reader(format);
    let sheet = reader.read(path)?;
    let rows_read = sheet.rows.len();
    let (schema, records, rows_dropped) = records_from_sheet(&sheet)?;
    let duplicate_years = match &records {
        SheetRecords::Returns(rows) => count_duplicate_years(rows),
        SheetRecords::Prices(_) => 0,
    };

    tracing::info!(
        file = %path.display(),
        format = format.name(),
        rows_read,
        rows_dropped,
        duplicate_years,
        "Loaded spreadsheet"
    );

    Ok(LoadReport {
        source_file: path.to_path_buf(),
        format,
        schema,
        records,
        rows_read,
        rows_dropped,
        duplicate_years,
    })
}

/// Number of rows whose (company, year) appeared earlier in the sheet
pub fn count_duplicate_years(rows: &[Observation]) -> usize {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|o| !seen.insert((o.company.as_str(), o.year)))
        .count()
}

// ============================================================================
// TESTS
// ============================================================================
