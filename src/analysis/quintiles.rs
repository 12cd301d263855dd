// Governance quintiles: companies ranked by mean score, returns per group

use crate::dataset::Observation;
use crate::stats::{mean, median, quintile_groups, sample_std, QUINTILE_LABELS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-company averages over the filtered years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyMetric {
    pub company: String,
    pub sector: String,
    pub mean_score: f64,
    pub mean_return: f64,
    pub years: usize,
}

/// Company averages in order of first appearance
pub fn company_means(rows: &[Observation]) -> Vec<CompanyMetric> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut acc: Vec<CompanyMetric> = Vec::new();

    for row in rows {
        match index.get(row.company.as_str()) {
            Some(&i) => {
                let metric = &mut acc[i];
                metric.mean_score += row.governance_score;
                metric.mean_return += row.annual_return_pct;
                metric.years += 1;
            }
            None => {
                index.insert(row.company.as_str(), acc.len());
                acc.push(CompanyMetric {
                    company: row.company.clone(),
                    sector: row.sector.clone(),
                    mean_score: row.governance_score,
                    mean_return: row.annual_return_pct,
                    years: 1,
                });
            }
        }
    }

    for metric in &mut acc {
        metric.mean_score /= metric.years as f64;
        metric.mean_return /= metric.years as f64;
    }
    acc
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuintileBucket {
    /// 1 = lowest governance scores
    pub quintile: usize,
    pub label: String,
    pub companies: Vec<String>,
    pub count: usize,
    pub score_min: Option<f64>,
    pub score_max: Option<f64>,
    pub mean_return: Option<f64>,
    pub median_return: Option<f64>,
    pub std_return: Option<f64>,
}

/// Partition companies into five governance groups
///
/// Always returns five buckets; with fewer than five companies some are
/// empty and carry no statistics.
pub fn quintile_buckets(rows: &[Observation]) -> Vec<QuintileBucket> {
    let metrics = company_means(rows);
    let scores: Vec<f64> = metrics.iter().map(|m| m.mean_score).collect();

    quintile_groups(&scores)
        .into_iter()
        .enumerate()
        .map(|(i, members)| {
            let returns: Vec<f64> = members.iter().map(|&m| metrics[m].mean_return).collect();
            let member_scores: Vec<f64> = members.iter().map(|&m| metrics[m].mean_score).collect();
            QuintileBucket {
                quintile: i + 1,
                label: QUINTILE_LABELS[i].to_string(),
                companies: members.iter().map(|&m| metrics[m].company.clone()).collect(),
                count: members.len(),
                score_min: member_scores.iter().copied().reduce(f64::min),
                score_max: member_scores.iter().copied().reduce(f64::max),
                mean_return: mean(&returns),
                median_return: median(&returns),
                std_return: sample_std(&returns),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(company: &str, year: i32, score: f64, ret: f64) -> Observation {
        Observation {
            company: company.to_string(),
            sector: "Tech".to_string(),
            year,
            governance_score: score,
            annual_return_pct: ret,
        }
    }

    #[test]
    fn test_company_means() {
        let rows = vec![obs("B", 2020, 10.0, 1.0), obs("A", 2020, 50.0, 5.0), obs("B", 2021, 30.0, 3.0)];
        let means = company_means(&rows);
        assert_eq!(means[0].company, "B");
        assert_eq!(means[0].mean_score, 20.0);
        assert_eq!(means[0].mean_return, 2.0);
        assert_eq!(means[0].years, 2);
    }

    #[test]
    fn test_buckets_sum_to_company_count() {
        for n in [0usize, 3, 5, 12, 23] {
            let rows: Vec<Observation> = (0..n)
                .map(|i| obs(&format!("C{i}"), 2020, (i * 7 % 11) as f64, i as f64))
                .collect();
            let buckets = quintile_buckets(&rows);
            assert_eq!(buckets.len(), 5);
            assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), n);
            let max = buckets.iter().map(|b| b.count).max().unwrap();
            let min = buckets.iter().map(|b| b.count).min().unwrap();
            assert!(max - min <= 1);
        }
    }

    #[test]
    fn test_buckets_are_ordered_by_score() {
        let rows: Vec<Observation> = (0..10)
            .map(|i| obs(&format!("C{i}"), 2020, 100.0 - i as f64 * 10.0, i as f64))
            .collect();
        let buckets = quintile_buckets(&rows);
        assert_eq!(buckets[0].label, "Very low");
        assert_eq!(buckets[0].companies, vec!["C9", "C8"]);
        assert_eq!(buckets[4].companies, vec!["C1", "C0"]);
        assert_eq!(buckets[0].mean_return, Some(8.5));
        assert_eq!(buckets[4].median_return, Some(0.5));
        for pair in buckets.windows(2) {
            assert!(pair[0].score_max.unwrap() <= pair[1].score_min.unwrap());
        }
    }

    #[test]
    fn test_empty_bucket_has_no_stats() {
        let buckets = quintile_buckets(&[obs("Only", 2020, 50.0, 1.0)]);
        assert_eq!(buckets[4].count, 1);
        assert!(buckets[0].mean_return.is_none());
        assert!(buckets[4].std_return.is_none());
    }
}
