// ESG Governance Dashboard - Core Library
// Exposes all modules for use in the web server and tests

pub mod error;
pub mod loader;     // Spreadsheet readers (calamine / csv)
pub mod returns;    // Monthly prices → annual returns
pub mod dataset;    // Immutable company-year table
pub mod filter;     // Year / sector / company selection
pub mod stats;      // Pearson, regression, quantiles
pub mod narrative;  // Plain-language interpretations
pub mod analysis;   // Impact, quintiles, correlations, benchmark, time series
pub mod charts;     // SVG rendering with plotters

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use error::{DashboardError, DataFormatError, Result};
pub use loader::{
    SheetReader, SourceFormat, ReturnSource, LoadReport, PriceRow,
    detect_format, get_reader, load_sheet,
    ExcelReader, CsvReader,
};
pub use returns::{annual_returns, ReturnOptions, ReturnOutcome, ReturnPolicy};
pub use dataset::{Dataset, LoadSummary, Observation};
pub use filter::{clip_returns, parse_list, ClipMode, FilterState};
pub use stats::{linear_regression, pearson, Correlation, Regression, Summary};
pub use narrative::{describe, Narrative};
pub use analysis::{
    benchmark::{benchmark_view, BenchmarkQuery, BenchmarkView},
    correlation::{company_correlation, correlation_table, CorrelationQuery, CorrelationTable},
    impact::{impact_view, DisplayMode, ImpactOptions, ImpactView},
    quintiles::{quintile_buckets, QuintileBucket},
    timeseries::{company_series, sector_trends, SectorTrend, TimeSeriesView},
};
pub use charts::ChartSize;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
