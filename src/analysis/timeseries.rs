// Governance score and return over time, per company and per sector

use super::{sector_year_means, snap_outwards};
use crate::dataset::{companies, Observation};
use crate::narrative::company_interpretation;
use crate::stats::{pearson, quantile, Correlation, MIN_CORRELATION_N};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub governance_score: f64,
    pub annual_return_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySeries {
    pub company: String,
    pub points: Vec<SeriesPoint>,
    pub correlation: Correlation,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesView {
    pub series: Vec<CompanySeries>,
    /// Range of the secondary (return) axis
    pub return_axis: (f64, f64),
    pub years: Option<(i32, i32)>,
}

/// Secondary-axis range: the 5-95 % band padded by max(5, 10 % of its width),
/// always including zero and every actual value, snapped to multiples of 5
pub fn return_axis_range(returns: &[f64]) -> (f64, f64) {
    const STEP: f64 = 5.0;

    let (lo, hi) = match (quantile(returns, 0.05), quantile(returns, 0.95)) {
        (Some(q_low), Some(q_high)) => {
            let pad = (0.1 * (q_high - q_low)).max(5.0);
            let real_min = returns.iter().copied().fold(f64::INFINITY, f64::min);
            let real_max = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (
                (q_low - pad).min(0.0).min(real_min),
                (q_high + pad).max(0.0).max(real_max),
            )
        }
        _ => (-10.0, 10.0),
    };

    let (mut lo, mut hi) = snap_outwards(lo, hi, STEP);
    if hi - lo < STEP {
        lo -= STEP;
        hi += STEP;
    }
    (lo, hi)
}

/// Yearly series for the selected companies
///
/// With no selection the alphabetically first company is shown.
pub fn company_series(rows: &[Observation], selected: &[String]) -> TimeSeriesView {
    let selected: Vec<String> = if selected.is_empty() {
        companies(rows).into_iter().take(1).collect()
    } else {
        selected.to_vec()
    };

    let mut series = Vec::with_capacity(selected.len());
    for company in &selected {
        let mut points: Vec<SeriesPoint> = rows
            .iter()
            .filter(|o| &o.company == company)
            .map(|o| SeriesPoint {
                year: o.year,
                governance_score: o.governance_score,
                annual_return_pct: o.annual_return_pct,
            })
            .collect();
        if points.is_empty() {
            continue;
        }
        points.sort_by_key(|p| p.year);

        let xs: Vec<f64> = points.iter().map(|p| p.governance_score).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.annual_return_pct).collect();
        let correlation = pearson(&xs, &ys, MIN_CORRELATION_N);

        series.push(CompanySeries {
            company: company.clone(),
            interpretation: company_interpretation(company, &correlation),
            correlation,
            points,
        });
    }

    let all_returns: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.annual_return_pct))
        .collect();
    let years = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.year))
        .fold(None, |acc: Option<(i32, i32)>, y| match acc {
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
            None => Some((y, y)),
        });

    TimeSeriesView {
        return_axis: return_axis_range(&all_returns),
        years,
        series,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorTrend {
    pub sector: String,
    /// (year, mean score, mean return), ordered by year
    pub points: Vec<SeriesPoint>,
}

/// Mean score and return per sector and year
pub fn sector_trends(rows: &[Observation]) -> Vec<SectorTrend> {
    let mut trends: BTreeMap<String, Vec<SeriesPoint>> = BTreeMap::new();
    for mean in sector_year_means(rows) {
        trends.entry(mean.sector).or_default().push(SeriesPoint {
            year: mean.year,
            governance_score: mean.governance_score,
            annual_return_pct: mean.annual_return_pct,
        });
    }
    trends
        .into_iter()
        .map(|(sector, points)| SectorTrend { sector, points })
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
    fn test_return_axis_includes_zero_and_extremes() {
        let (lo, hi) = return_axis_range(&[12.0, 18.0, 25.0, 31.0]);
        assert_eq!(lo, 0.0);
        assert!(hi >= 31.0);
        assert_eq!(hi % 5.0, 0.0);

        assert_eq!(return_axis_range(&[]), (-10.0, 10.0));
        let (lo, hi) = return_axis_range(&[-80.0, 1.0, 2.0, 3.0]);
        assert!(lo <= -80.0);
        assert!(hi >= 3.0);
    }

    #[test]
    fn test_company_series_sorted_with_interpretation() {
        let rows = vec![
            obs("Acme", "Tech", 2022, 70.0, 10.0),
            obs("Acme", "Tech", 2020, 50.0, 2.0),
            obs("Acme", "Tech", 2021, 60.0, 6.0),
            obs("Beta", "Tech", 2020, 40.0, 1.0),
        ];
        let view = company_series(&rows, &["Acme".to_string(), "Beta".to_string()]);
        assert_eq!(view.series.len(), 2);
        let years: Vec<i32> = view.series[0].points.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2020, 2021, 2022]);
        assert!(view.series[0].interpretation.contains("significant positive relationship"));
        assert_eq!(view.series[1].correlation, Correlation::Insufficient { n: 1 });
        assert_eq!(view.years, Some((2020, 2022)));
    }

    #[test]
    fn test_default_selection_is_first_company() {
        let rows = vec![obs("Zed", "Tech", 2020, 1.0, 1.0), obs("Alpha", "Tech", 2020, 1.0, 1.0)];
        let view = company_series(&rows, &[]);
        assert_eq!(view.series.len(), 1);
        assert_eq!(view.series[0].company, "Alpha");
    }

    #[test]
    fn test_sector_trends() {
        let rows = vec![
            obs("A", "Tech", 2021, 40.0, 4.0),
            obs("B", "Tech", 2021, 60.0, 8.0),
            obs("A", "Tech", 2020, 30.0, 1.0),
            obs("C", "Energy", 2020, 70.0, -3.0),
        ];
        let trends = sector_trends(&rows);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].sector, "Energy");
        let tech = &trends[1];
        assert_eq!(tech.points.len(), 2);
        assert_eq!(tech.points[0].year, 2020);
        assert_eq!(tech.points[1].governance_score, 50.0);
        assert_eq!(tech.points[1].annual_return_pct, 6.0);
    }
}
