// ⚠️ Error types for the dashboard library

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the input spreadsheet itself
#[derive(Error, Debug)]
pub enum DataFormatError {
    #[error("Required column missing: {0}")]
    MissingColumn(String),

    #[error("Unsupported spreadsheet format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Failed to read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Spreadsheet {} contains no worksheet", .0.display())]
    NoWorksheet(PathBuf),

    #[error("Spreadsheet {} has no header row", .0.display())]
    EmptySheet(PathBuf),
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Data format error: {0}")]
    DataFormat(#[from] DataFormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
