// 📈 Return Calculator - monthly close prices → annual returns

use crate::dataset::Observation;
use crate::error::DashboardError;
use crate::loader::{PriceRow, UNCLASSIFIED_SECTOR};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// POLICY
// ============================================================================

/// How years without a full set of months are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReturnPolicy {
    /// Only complete years get a return
    #[default]
    Strict,
    /// Partial years report their compounded year-to-date return
    YtdPartial,
    /// Partial years are annualised over the month span they cover
    AnnualizeBySpan,
}

impl ReturnPolicy {
    pub fn code(&self) -> &str {
        match self {
            ReturnPolicy::Strict => "strict",
            ReturnPolicy::YtdPartial => "ytd-partial",
            ReturnPolicy::AnnualizeBySpan => "annualize-by-span",
        }
    }
}

impl fmt::Display for ReturnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ReturnPolicy {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "strict" => Ok(ReturnPolicy::Strict),
            "ytd-partial" => Ok(ReturnPolicy::YtdPartial),
            "annualize-by-span" => Ok(ReturnPolicy::AnnualizeBySpan),
            other => Err(DashboardError::InvalidParameter(format!(
                "unknown return policy '{other}' (expected strict, ytd-partial or annualize-by-span)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnOptions {
    pub policy: ReturnPolicy,
    pub min_months_per_year: usize,
    pub min_months_for_partial: usize,
}

impl Default for ReturnOptions {
    fn default() -> Self {
        ReturnOptions {
            policy: ReturnPolicy::Strict,
            min_months_per_year: 12,
            min_months_for_partial: 6,
        }
    }
}

// ============================================================================
// CALCULATION
// ============================================================================

/// Annual observations plus the number of same-month rows that were skipped
#[derive(Debug, Clone, Default)]
pub struct ReturnOutcome {
    pub observations: Vec<Observation>,
    pub duplicate_months: usize,
    pub years_without_return: usize,
}

/// Compounded return of one (company, year) group, as a fraction
fn annual_from_group(group: &[PriceRow], options: &ReturnOptions) -> Option<f64> {
    let n_months = group.len();
    let monthly: Vec<f64> = group
        .windows(2)
        .map(|w| w[1].close_price / w[0].close_price - 1.0)
        .collect();
    let n_returns = monthly.len();

    let full_year = n_months >= options.min_months_per_year
        && n_returns >= options.min_months_per_year.saturating_sub(1).max(1);
    let total_factor: f64 = monthly.iter().map(|r| 1.0 + r).product();

    if full_year {
        return Some(total_factor - 1.0);
    }

    let partial_ok = n_months >= options.min_months_for_partial.max(2) && n_returns >= 1;
    match options.policy {
        ReturnPolicy::Strict => None,
        ReturnPolicy::YtdPartial if partial_ok => Some(total_factor - 1.0),
        ReturnPolicy::AnnualizeBySpan if partial_ok => {
            let first = group.first()?.date;
            let last = group.last()?.date;
            let span = (last.year() - first.year()) * 12 + last.month() as i32 - first.month() as i32;
            if span <= 0 {
                return None;
            }
            Some(total_factor.powf(12.0 / span as f64) - 1.0)
        }
        _ => None,
    }
}

/// Annual returns per (company, calendar year) from monthly price rows
///
/// Rows are ordered by (company, date); only the first row of each month
/// is used. The governance score of a year is the mean of its rows.
pub fn annual_returns(rows: &[PriceRow], options: &ReturnOptions) -> ReturnOutcome {
    let mut sorted: Vec<PriceRow> = rows.to_vec();
    sorted.sort_by(|a, b| a.company.cmp(&b.company).then(a.date.cmp(&b.date)));

    let mut seen = HashSet::new();
    let before = sorted.len();
    sorted.retain(|row| seen.insert((row.company.clone(), row.date.year(), row.date.month())));
    let duplicate_months = before - sorted.len();

    let mut outcome = ReturnOutcome {
        duplicate_months,
        ..ReturnOutcome::default()
    };

    for group in sorted.chunk_by(|a, b| a.company == b.company && a.date.year() == b.date.year()) {
        let Some(first) = group.first() else { continue };

        match annual_from_group(group, options) {
            Some(fraction) => {
                let governance_score =
                    group.iter().map(|r| r.governance_score).sum::<f64>() / group.len() as f64;
                let sector = group
                    .iter()
                    .map(|r| r.sector.as_str())
                    .find(|s| !s.is_empty() && *s != UNCLASSIFIED_SECTOR)
                    .unwrap_or(UNCLASSIFIED_SECTOR)
                    .to_string();

                outcome.observations.push(Observation {
                    company: first.company.clone(),
                    sector,
                    year: first.date.year(),
                    governance_score,
                    annual_return_pct: fraction * 100.0,
                });
            }
            None => outcome.years_without_return += 1,
        }
    }

    tracing::debug!(
        observations = outcome.observations.len(),
        duplicate_months = outcome.duplicate_months,
        years_without_return = outcome.years_without_return,
        policy = %options.policy,
        "Computed annual returns"
    );

    outcome
}

// ============================================================================
// TESTS
// ============================================================================
