// Sector benchmarking: how far each company sits from its sector median

use crate::dataset::{years, Observation};
use crate::stats::{median, quantile, summarize, Summary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkQuery {
    /// Analysis year; the latest available when unset
    pub year: Option<i32>,
    /// Collapse to one row per company (mean of its entries)
    pub per_company: bool,
    /// Case-insensitive substring on company or sector
    pub search: Option<String>,
}

impl Default for BenchmarkQuery {
    fn default() -> Self {
        BenchmarkQuery {
            year: None,
            per_company: true,
            search: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRow {
    pub company: String,
    pub sector: String,
    pub governance_score: f64,
    pub delta_to_median: f64,
    pub entries: usize,
}

/// Score distribution of one sector, for the box plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDistribution {
    pub sector: String,
    pub median: f64,
    pub summary: Summary,
    pub q1: f64,
    pub q3: f64,
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkView {
    pub year: Option<i32>,
    pub available_years: Vec<i32>,
    pub sectors: Vec<SectorDistribution>,
    pub rows: Vec<BenchmarkRow>,
}

fn matches_search(row: &BenchmarkRow, needle: &str) -> bool {
    row.company.to_lowercase().contains(needle) || row.sector.to_lowercase().contains(needle)
}

/// Mean score and delta per (company, sector), in first-seen order
fn collapse_per_company(rows: Vec<BenchmarkRow>) -> Vec<BenchmarkRow> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut out: Vec<BenchmarkRow> = Vec::new();
    for row in rows {
        let key = (row.company.clone(), row.sector.clone());
        match index.get(&key) {
            Some(&i) => {
                out[i].governance_score += row.governance_score;
                out[i].delta_to_median += row.delta_to_median;
                out[i].entries += 1;
            }
            None => {
                index.insert(key, out.len());
                out.push(row);
            }
        }
    }
    for row in &mut out {
        row.governance_score /= row.entries as f64;
        row.delta_to_median /= row.entries as f64;
    }
    out
}

pub fn benchmark_view(rows: &[Observation], query: &BenchmarkQuery) -> BenchmarkView {
    let available_years = years(rows);
    let year = query.year.or_else(|| available_years.last().copied());

    let in_year: Vec<&Observation> = rows.iter().filter(|o| Some(o.year) == year).collect();

    let mut by_sector: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for o in &in_year {
        by_sector.entry(o.sector.as_str()).or_default().push(o.governance_score);
    }

    let medians: HashMap<&str, f64> = by_sector
        .iter()
        .filter_map(|(sector, scores)| median(scores).map(|m| (*sector, m)))
        .collect();

    let sectors = by_sector
        .iter()
        .filter_map(|(sector, scores)| {
            let summary = summarize(scores)?;
            Some(SectorDistribution {
                sector: sector.to_string(),
                median: summary.median,
                q1: quantile(scores, 0.25)?,
                q3: quantile(scores, 0.75)?,
                summary,
                scores: scores.clone(),
            })
        })
        .collect();

    let mut table: Vec<BenchmarkRow> = in_year
        .iter()
        .map(|o| BenchmarkRow {
            company: o.company.clone(),
            sector: o.sector.clone(),
            governance_score: o.governance_score,
            delta_to_median: o.governance_score - medians.get(o.sector.as_str()).copied().unwrap_or(f64::NAN),
            entries: 1,
        })
        .collect();

    if query.per_company {
        table = collapse_per_company(table);
    }

    if let Some(needle) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = needle.to_lowercase();
        table.retain(|row| matches_search(row, &needle));
    }

    table.sort_by(|a, b| b.delta_to_median.total_cmp(&a.delta_to_median));

    BenchmarkView {
        year,
        available_years,
        sectors,
        rows: table,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(company: &str, sector: &str, year: i32, score: f64) -> Observation {
        Observation {
            company: company.to_string(),
            sector: sector.to_string(),
            year,
            governance_score: score,
            annual_return_pct: 0.0,
        }
    }

    fn rows() -> Vec<Observation> {
        vec![
            obs("Acme", "Tech", 2021, 40.0),
            obs("Bolt", "Tech", 2021, 60.0),
            obs("Core", "Tech", 2021, 80.0),
            obs("Drill", "Energy", 2021, 30.0),
            obs("Acme", "Tech", 2020, 10.0),
        ]
    }

    #[test]
    fn test_defaults_to_latest_year() {
        let view = benchmark_view(&rows(), &BenchmarkQuery::default());
        assert_eq!(view.year, Some(2021));
        assert_eq!(view.available_years, vec![2020, 2021]);
        assert_eq!(view.rows.len(), 4);
    }

    #[test]
    fn test_deltas_to_sector_median() {
        let view = benchmark_view(&rows(), &BenchmarkQuery::default());
        let delta = |name: &str| {
            view.rows
                .iter()
                .find(|r| r.company == name)
                .map(|r| r.delta_to_median)
                .unwrap()
        };
        assert_eq!(delta("Bolt"), 0.0);
        assert_eq!(delta("Core"), 20.0);
        assert_eq!(delta("Acme"), -20.0);
        assert_eq!(delta("Drill"), 0.0);
        // Sorted by delta, highest first
        assert_eq!(view.rows[0].company, "Core");
        assert_eq!(view.rows[3].company, "Acme");

        let tech = view.sectors.iter().find(|s| s.sector == "Tech").unwrap();
        assert_eq!(tech.median, 60.0);
        assert_eq!(tech.q1, 50.0);
        assert_eq!(tech.q3, 70.0);
    }

    #[test]
    fn test_search_and_explicit_year() {
        let query = BenchmarkQuery {
            year: Some(2021),
            per_company: true,
            search: Some("ENER".to_string()),
        };
        let view = benchmark_view(&rows(), &query);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].company, "Drill");

        let old = benchmark_view(
            &rows(),
            &BenchmarkQuery {
                year: Some(2020),
                ..BenchmarkQuery::default()
            },
        );
        assert_eq!(old.rows.len(), 1);
    }

    #[test]
    fn test_per_company_collapses_duplicates() {
        let mut data = rows();
        data.push(obs("Acme", "Tech", 2021, 60.0));
        let collapsed = benchmark_view(&data, &BenchmarkQuery::default());
        let acme = collapsed.rows.iter().find(|r| r.company == "Acme").unwrap();
        assert_eq!(acme.entries, 2);
        assert_eq!(acme.governance_score, 50.0);

        let raw = benchmark_view(
            &data,
            &BenchmarkQuery {
                per_company: false,
                ..BenchmarkQuery::default()
            },
        );
        assert_eq!(raw.rows.len(), 5);
    }
}
