// 🔎 Filter Layer - narrow the table to the analyst's selection
// Everything here is a pure function of (rows, state)

use crate::dataset::Observation;
use crate::error::DashboardError;
use crate::stats::quantile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Separator for multi-valued query parameters (company names contain commas)
pub const LIST_SEPARATOR: char = '|';

// ============================================================================
// FILTER STATE
// ============================================================================

/// Year range plus sector and company selections
///
/// Empty selections do not restrict anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub sectors: BTreeSet<String>,
    pub companies: BTreeSet<String>,
}

impl FilterState {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_years(mut self, from: i32, to: i32) -> Self {
        self.year_from = Some(from.min(to));
        self.year_to = Some(from.max(to));
        self
    }

    pub fn with_sectors<I, S>(mut self, sectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sectors = sectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_companies<I, S>(mut self, companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.companies = companies.into_iter().map(Into::into).collect();
        self
    }

    /// Does a single observation pass every predicate?
    pub fn matches(&self, row: &Observation) -> bool {
        if let Some(from) = self.year_from {
            if row.year < from {
                return false;
            }
        }
        if let Some(to) = self.year_to {
            if row.year > to {
                return false;
            }
        }
        if !self.sectors.is_empty() && !self.sectors.contains(&row.sector) {
            return false;
        }
        if !self.companies.is_empty() && !self.companies.contains(&row.company) {
            return false;
        }
        true
    }

    /// Subset of `rows` matching the state, original order preserved
    pub fn apply(&self, rows: &[Observation]) -> Vec<Observation> {
        rows.iter().filter(|row| self.matches(row)).cloned().collect()
    }
}

/// Split a `|`-separated query value into trimmed, non-empty items
pub fn parse_list(value: Option<&str>) -> BTreeSet<String> {
    value
        .map(|v| {
            v.split(LIST_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// RETURN CLIPPING
// ============================================================================

/// Outlier handling for returns before plotting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipMode {
    None,
    /// Keep returns within [-100 %, 100 %]
    Hard,
    /// Keep returns within the 1 % and 99 % quantiles
    #[default]
    Quantile,
}

impl FromStr for ClipMode {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(ClipMode::None),
            "hard" => Ok(ClipMode::Hard),
            "quantile" => Ok(ClipMode::Quantile),
            other => Err(DashboardError::InvalidParameter(format!(
                "unknown clip mode '{other}' (expected none, hard or quantile)"
            ))),
        }
    }
}

pub fn clip_returns(rows: &[Observation], mode: ClipMode) -> Vec<Observation> {
    let (lo, hi) = match mode {
        ClipMode::None => return rows.to_vec(),
        ClipMode::Hard => (-100.0, 100.0),
        ClipMode::Quantile => {
            let returns: Vec<f64> = rows.iter().map(|r| r.annual_return_pct).collect();
            match (quantile(&returns, 0.01), quantile(&returns, 0.99)) {
                (Some(lo), Some(hi)) => (lo, hi),
                _ => return Vec::new(),
            }
        }
    };
    rows.iter()
        .filter(|r| r.annual_return_pct >= lo && r.annual_return_pct <= hi)
        .cloned()
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
