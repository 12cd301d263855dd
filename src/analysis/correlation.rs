// Per-company correlation between governance score and annual return

use crate::dataset::Observation;
use crate::narrative::{
    aggregate_summary, describe, insufficient_data, scatter_interpretation, CorrelationCounts,
    Narrative,
};
use crate::stats::{linear_regression, pearson, Correlation, Regression, MIN_CORRELATION_N};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TOP_N: usize = 5;
pub const MAX_TOP_N: usize = 20;

/// Computed correlation of one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub company: String,
    pub r: f64,
    pub p: f64,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCorrelation {
    pub rank: usize,
    #[serde(flatten)]
    pub result: CorrelationResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationQuery {
    pub r_min: f64,
    pub r_max: f64,
    pub top_n: usize,
    pub min_n: usize,
}

impl Default for CorrelationQuery {
    fn default() -> Self {
        CorrelationQuery {
            r_min: -1.0,
            r_max: 1.0,
            top_n: DEFAULT_TOP_N,
            min_n: MIN_CORRELATION_N,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsufficientCompany {
    pub company: String,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationTable {
    /// Results inside the r range, highest r first
    pub ranked: Vec<RankedCorrelation>,
    pub top: Vec<RankedCorrelation>,
    pub flop: Vec<RankedCorrelation>,
    pub counts: CorrelationCounts,
    pub summary: String,
    pub insufficient: Vec<InsufficientCompany>,
}

/// (score, return) pairs per company, keyed by company name
fn pairs_by_company(rows: &[Observation]) -> BTreeMap<&str, (Vec<f64>, Vec<f64>)> {
    let mut groups: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(row.company.as_str()).or_default();
        entry.0.push(row.governance_score);
        entry.1.push(row.annual_return_pct);
    }
    groups
}

/// Correlation outcome for every company, sorted by name
pub fn company_correlations(rows: &[Observation], min_n: usize) -> Vec<(String, Correlation)> {
    pairs_by_company(rows)
        .into_iter()
        .map(|(company, (xs, ys))| (company.to_string(), pearson(&xs, &ys, min_n)))
        .collect()
}

fn ranked(results: impl IntoIterator<Item = CorrelationResult>) -> Vec<RankedCorrelation> {
    results
        .into_iter()
        .enumerate()
        .map(|(i, result)| RankedCorrelation { rank: i + 1, result })
        .collect()
}

pub fn correlation_table(rows: &[Observation], query: &CorrelationQuery) -> CorrelationTable {
    let mut computed = Vec::new();
    let mut insufficient = Vec::new();

    for (company, correlation) in company_correlations(rows, query.min_n) {
        match correlation {
            Correlation::Computed { r, p, n } => computed.push(CorrelationResult { company, r, p, n }),
            Correlation::Insufficient { n } => insufficient.push(InsufficientCompany { company, n }),
        }
    }

    // Stable sort: equal r keeps alphabetical order
    computed.sort_by(|a, b| b.r.total_cmp(&a.r));

    let counts = CorrelationCounts::from_coefficients(computed.iter().map(|c| c.r));
    let top_n = query.top_n.clamp(1, MAX_TOP_N);
    let (r_min, r_max) = (query.r_min.min(query.r_max), query.r_min.max(query.r_max));

    let in_range = computed
        .iter()
        .filter(|c| c.r >= r_min && c.r <= r_max)
        .cloned();
    let top = computed.iter().take(top_n).cloned();
    let flop = computed.iter().rev().take(top_n).cloned();

    let summary = if computed.is_empty() {
        "Not enough data to compute correlations.".to_string()
    } else {
        aggregate_summary(&counts).to_string()
    };

    tracing::debug!(
        computed = computed.len(),
        insufficient = insufficient.len(),
        "Built correlation table"
    );

    CorrelationTable {
        ranked: ranked(in_range),
        top: ranked(top),
        flop: ranked(flop),
        counts,
        summary,
        insufficient,
    }
}

/// Everything the detail panel shows for one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyCorrelation {
    pub company: String,
    pub correlation: Correlation,
    pub narrative: Option<Narrative>,
    pub interpretation: String,
    pub regression: Option<Regression>,
}

/// Correlation detail for one company; `None` if it has no rows
pub fn company_correlation(rows: &[Observation], company: &str, min_n: usize) -> Option<CompanyCorrelation> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter(|o| o.company == company)
        .map(|o| (o.governance_score, o.annual_return_pct))
        .unzip();
    if xs.is_empty() {
        return None;
    }

    let correlation = pearson(&xs, &ys, min_n);
    let (narrative, interpretation) = match correlation {
        Correlation::Computed { r, p, .. } => {
            (Some(describe(r, p)), scatter_interpretation(r, p).to_string())
        }
        Correlation::Insufficient { n } => (None, insufficient_data(n)),
    };

    Some(CompanyCorrelation {
        company: company.to_string(),
        correlation,
        narrative,
        interpretation,
        regression: linear_regression(&xs, &ys),
    })
}
