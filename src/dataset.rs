// 🗂️ Dataset - the in-memory observation table

use crate::error::Result;
use crate::loader::{load_sheet, LoadReport, ReturnSource, SheetRecords};
use crate::returns::{annual_returns, ReturnOptions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// One company in one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub company: String,
    pub sector: String,
    pub year: i32,
    pub governance_score: f64,
    pub annual_return_pct: f64,
}

/// What happened while the table was built
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadSummary {
    pub source_file: String,
    pub format: String,
    pub return_source: Option<ReturnSource>,
    pub rows_read: usize,
    pub rows_dropped: usize,
    /// Repeated (company, month) rows in a price sheet
    pub duplicate_months: usize,
    /// Repeated (company, year) rows in a sheet of precomputed returns
    pub duplicate_years: usize,
    pub years_without_return: usize,
    pub observations: usize,
}

/// Immutable table shared by every request
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    observations: Vec<Observation>,
    summary: LoadSummary,
}

impl Dataset {
    pub fn new(observations: Vec<Observation>) -> Self {
        let summary = LoadSummary {
            observations: observations.len(),
            ..LoadSummary::default()
        };
        Dataset {
            observations,
            summary,
        }
    }

    /// Load a spreadsheet and derive annual observations from it
    pub fn load(path: &Path, options: &ReturnOptions) -> Result<Self> {
        let report = load_sheet(path)?;
        Ok(Self::from_report(report, options))
    }

    pub fn from_report(report: LoadReport, options: &ReturnOptions) -> Self {
        let return_source = report.schema.return_source();
        let duplicate_years = report.duplicate_years;
        let (observations, duplicate_months, years_without_return) = match report.records {
            SheetRecords::Prices(rows) => {
                let outcome = annual_returns(&rows, options);
                (
                    outcome.observations,
                    outcome.duplicate_months,
                    outcome.years_without_return,
                )
            }
            SheetRecords::Returns(rows) => (merge_duplicate_years(rows), 0, 0),
        };

        if duplicate_months > 0 || duplicate_years > 0 {
            tracing::warn!(duplicate_months, duplicate_years, "Input contains duplicate company periods");
        }

        let summary = LoadSummary {
            source_file: report.source_file.display().to_string(),
            format: report.format.name().to_string(),
            return_source: Some(return_source),
            rows_read: report.rows_read,
            rows_dropped: report.rows_dropped,
            duplicate_months,
            duplicate_years,
            years_without_return,
            observations: observations.len(),
        };

        tracing::info!(
            observations = summary.observations,
            companies = count_distinct(&observations, |o| &o.company),
            "Dataset ready"
        );

        Dataset {
            observations,
            summary,
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        years(&self.observations)
    }

    pub fn sectors(&self) -> Vec<String> {
        sectors(&self.observations)
    }

    pub fn companies(&self) -> Vec<String> {
        companies(&self.observations)
    }
}

fn count_distinct<'a>(rows: &'a [Observation], key: impl Fn(&'a Observation) -> &'a String) -> usize {
    rows.iter().map(key).collect::<BTreeSet<_>>().len()
}

/// Sorted distinct years
pub fn years(rows: &[Observation]) -> Vec<i32> {
    rows.iter()
        .map(|o| o.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct sectors
pub fn sectors(rows: &[Observation]) -> Vec<String> {
    rows.iter()
        .map(|o| o.sector.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct companies
pub fn companies(rows: &[Observation]) -> Vec<String> {
    rows.iter()
        .map(|o| o.company.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Average rows that share a (company, year), keeping first-seen order
fn merge_duplicate_years(rows: Vec<Observation>) -> Vec<Observation> {
    let mut index: HashMap<(String, i32), usize> = HashMap::new();
    let mut merged: Vec<(Observation, usize)> = Vec::new();

    for row in rows {
        let key = (row.company.clone(), row.year);
        match index.get(&key) {
            Some(&i) => {
                let (acc, count) = &mut merged[i];
                acc.governance_score += row.governance_score;
                acc.annual_return_pct += row.annual_return_pct;
                *count += 1;
            }
            None => {
                index.insert(key, merged.len());
                merged.push((row, 1));
            }
        }
    }

    merged
        .into_iter()
        .map(|(mut o, count)| {
            o.governance_score /= count as f64;
            o.annual_return_pct /= count as f64;
            o
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(company: &str, sector: &str, year: i32, score: f64, ret: f64) -> Observation {
        Observation {
            company: company.to_string(),
            sector: sector.to_string(),
            year,
            governance_score: score,
            annual_return_pct: ret,
        }
    }

    #[test]
    fn test_distinct_lookups_are_sorted() {
        let ds = Dataset::new(vec![
            obs("Zeta", "Utilities", 2021, 10.0, 1.0),
            obs("Acme", "Tech", 2019, 20.0, 2.0),
            obs("Acme", "Tech", 2021, 30.0, 3.0),
        ]);
        assert_eq!(ds.years(), vec![2019, 2021]);
        assert_eq!(ds.sectors(), vec!["Tech", "Utilities"]);
        assert_eq!(ds.companies(), vec!["Acme", "Zeta"]);
        assert_eq!(ds.summary().observations, 3);
    }

    #[test]
    fn test_merge_duplicate_years() {
        let rows = vec![
            obs("Acme", "Tech", 2020, 40.0, 10.0),
            obs("Beta", "Tech", 2020, 70.0, 1.0),
            obs("Acme", "Tech", 2020, 60.0, 20.0),
        ];
        assert_eq!(crate::loader::count_duplicate_years(&rows), 1);
        let merged = merge_duplicate_years(rows);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].company, "Acme");
        assert_eq!(merged[0].governance_score, 50.0);
        assert_eq!(merged[0].annual_return_pct, 15.0);
    }
}
