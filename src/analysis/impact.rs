// Governance score vs. annual return: scatter data, regressions, axis scaling

use super::{sector_year_means, snap_outwards};
use crate::dataset::Observation;
use crate::error::DashboardError;
use crate::filter::{clip_returns, ClipMode};
use crate::narrative::regression_verdict;
use crate::stats::{linear_regression, quantile, summarize, Regression, Summary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Which points the scatter plot shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Every observation, one regression line
    #[default]
    AllCompanies,
    /// Mean per (year, sector), one line per sector
    SectorAverages,
    /// Every observation, one line per company
    Companies,
}

impl FromStr for DisplayMode {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "all" | "all_companies" => Ok(DisplayMode::AllCompanies),
            "sectors" | "sector_averages" => Ok(DisplayMode::SectorAverages),
            "companies" => Ok(DisplayMode::Companies),
            other => Err(DashboardError::InvalidParameter(format!(
                "unknown display mode '{other}' (expected all, sectors or companies)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactOptions {
    pub clip: ClipMode,
    pub mode: DisplayMode,
    /// Scale the return axis to the full data range instead of the 5-95 % band
    pub scale_all: bool,
}

/// One plotted point; `group` drives colour and per-group regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub group: Option<String>,
    pub label: String,
    pub year: i32,
    pub governance_score: f64,
    pub annual_return_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRegression {
    pub group: String,
    pub regression: Regression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactView {
    pub mode: DisplayMode,
    pub points: Vec<ScatterPoint>,
    pub regression: Option<Regression>,
    pub verdict: Option<String>,
    pub groups: Vec<GroupRegression>,
    pub returns: Option<Summary>,
    pub y_range: (f64, f64),
}

/// Return-axis range for the scatter plot
///
/// Default is symmetric around zero and covers the 5-95 % band with 15 %
/// headroom; `scale_all` covers every value. Both snap to multiples of 5.
pub fn y_axis_range(returns: &[f64], scale_all: bool) -> (f64, f64) {
    if returns.is_empty() {
        return (-20.0, 20.0);
    }

    if scale_all {
        let min = returns.iter().copied().fold(f64::INFINITY, f64::min);
        let max = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (mut lo, mut hi) = snap_outwards(min, max, 5.0);
        if hi - lo < 10.0 {
            lo -= 5.0;
            hi += 5.0;
        }
        return (lo, hi);
    }

    let q05 = quantile(returns, 0.05).unwrap_or(0.0);
    let q95 = quantile(returns, 0.95).unwrap_or(0.0);
    let r = (1.15 * q05.abs().max(q95.abs())).max(10.0);
    let r = (r / 5.0).ceil() * 5.0;
    (-r, r)
}

fn points_for(rows: &[Observation], mode: DisplayMode) -> Vec<ScatterPoint> {
    match mode {
        DisplayMode::SectorAverages => sector_year_means(rows)
            .into_iter()
            .map(|m| ScatterPoint {
                label: format!("{} {}", m.sector, m.year),
                group: Some(m.sector),
                year: m.year,
                governance_score: m.governance_score,
                annual_return_pct: m.annual_return_pct,
            })
            .collect(),
        DisplayMode::AllCompanies | DisplayMode::Companies => rows
            .iter()
            .map(|o| ScatterPoint {
                group: (mode == DisplayMode::Companies).then(|| o.company.clone()),
                label: format!("{} {}", o.company, o.year),
                year: o.year,
                governance_score: o.governance_score,
                annual_return_pct: o.annual_return_pct,
            })
            .collect(),
    }
}

/// Per-group OLS fits, sorted by group name; groups under two points are skipped
pub fn group_regressions(points: &[ScatterPoint]) -> Vec<GroupRegression> {
    let mut groups: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for p in points {
        if let Some(group) = &p.group {
            let entry = groups.entry(group.as_str()).or_default();
            entry.0.push(p.governance_score);
            entry.1.push(p.annual_return_pct);
        }
    }

    groups
        .into_iter()
        .filter_map(|(group, (xs, ys))| {
            linear_regression(&xs, &ys).map(|regression| GroupRegression {
                group: group.to_string(),
                regression,
            })
        })
        .collect()
}

pub fn impact_view(rows: &[Observation], options: &ImpactOptions) -> ImpactView {
    let clipped = clip_returns(rows, options.clip);
    let points = points_for(&clipped, options.mode);

    let xs: Vec<f64> = points.iter().map(|p| p.governance_score).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.annual_return_pct).collect();

    let regression = linear_regression(&xs, &ys);
    let verdict = regression.as_ref().map(|r| regression_verdict(r).to_string());
    let groups = group_regressions(&points);

    tracing::debug!(
        points = points.len(),
        clipped = rows.len() - clipped.len(),
        mode = ?options.mode,
        "Built impact view"
    );

    ImpactView {
        mode: options.mode,
        returns: summarize(&ys),
        y_range: y_axis_range(&ys, options.scale_all),
        points,
        regression,
        verdict,
        groups,
    }
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
    fn test_symmetric_range() {
        // q05/q95 of 0..=100 are 5 and 95: 1.15 * 95 = 109.25 → 110
        let returns: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        assert_eq!(y_axis_range(&returns, false), (-110.0, 110.0));
        // Small returns keep the ±10 floor
        assert_eq!(y_axis_range(&[1.0, -2.0, 3.0], false), (-10.0, 10.0));
        assert_eq!(y_axis_range(&[], false), (-20.0, 20.0));
    }

    #[test]
    fn test_full_range() {
        assert_eq!(y_axis_range(&[-12.0, 33.0], true), (-15.0, 35.0));
        assert_eq!(y_axis_range(&[1.0, 2.0], true), (-5.0, 10.0));
    }

    #[test]
    fn test_impact_view_all_companies() {
        let rows: Vec<Observation> = (0..10)
            .map(|i| obs("Acme", "Tech", 2010 + i, 40.0 + i as f64, 2.0 * i as f64))
            .collect();
        let view = impact_view(
            &rows,
            &ImpactOptions {
                clip: ClipMode::None,
                ..ImpactOptions::default()
            },
        );
        assert_eq!(view.points.len(), 10);
        let reg = view.regression.unwrap();
        assert!((reg.slope - 2.0).abs() < 1e-9);
        assert!(view.groups.is_empty());
        assert_eq!(view.verdict.as_deref(), Some("Significant positive relationship (global)."));
    }

    #[test]
    fn test_impact_view_grouped() {
        let mut rows = Vec::new();
        for i in 0..4 {
            rows.push(obs("Acme", "Tech", 2018 + i, 50.0 + i as f64, i as f64));
            rows.push(obs("Beta", "Energy", 2018 + i, 30.0 + i as f64, -(i as f64)));
        }
        rows.push(obs("Solo", "Retail", 2018, 10.0, 1.0));

        let by_company = impact_view(
            &rows,
            &ImpactOptions {
                clip: ClipMode::None,
                mode: DisplayMode::Companies,
                scale_all: false,
            },
        );
        let names: Vec<&str> = by_company.groups.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Beta"]);
        assert!(by_company.groups[1].regression.slope < 0.0);

        let by_sector = impact_view(
            &rows,
            &ImpactOptions {
                clip: ClipMode::None,
                mode: DisplayMode::SectorAverages,
                scale_all: false,
            },
        );
        // 4 years x 2 sectors + one Retail point
        assert_eq!(by_sector.points.len(), 9);
    }

    #[test]
    fn test_display_mode_from_str() {
        assert_eq!("sectors".parse::<DisplayMode>().unwrap(), DisplayMode::SectorAverages);
        assert_eq!("all-companies".parse::<DisplayMode>().unwrap(), DisplayMode::AllCompanies);
        assert!("bubbles".parse::<DisplayMode>().is_err());
    }
}
