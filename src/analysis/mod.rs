// 🧮 Analyses - one module per dashboard view

pub mod benchmark;
pub mod correlation;
pub mod impact;
pub mod quintiles;
pub mod timeseries;

use crate::dataset::Observation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean score and return of one sector in one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorYearMean {
    pub year: i32,
    pub sector: String,
    pub governance_score: f64,
    pub annual_return_pct: f64,
    pub companies: usize,
}

/// Average observations per (year, sector), sorted by year then sector
pub fn sector_year_means(rows: &[Observation]) -> Vec<SectorYearMean> {
    let mut groups: BTreeMap<(i32, &str), (f64, f64, usize)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry((row.year, row.sector.as_str())).or_insert((0.0, 0.0, 0));
        entry.0 += row.governance_score;
        entry.1 += row.annual_return_pct;
        entry.2 += 1;
    }

    groups
        .into_iter()
        .map(|((year, sector), (score, ret, count))| SectorYearMean {
            year,
            sector: sector.to_string(),
            governance_score: score / count as f64,
            annual_return_pct: ret / count as f64,
            companies: count,
        })
        .collect()
}

/// Round outwards to the enclosing multiples of `step`
pub(crate) fn snap_outwards(lo: f64, hi: f64, step: f64) -> (f64, f64) {
    ((lo / step).floor() * step, (hi / step).ceil() * step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_year_means() {
        let rows = vec![
            Observation {
                company: "A".into(),
                sector: "Tech".into(),
                year: 2021,
                governance_score: 40.0,
                annual_return_pct: 10.0,
            },
            Observation {
                company: "B".into(),
                sector: "Tech".into(),
                year: 2021,
                governance_score: 60.0,
                annual_return_pct: -2.0,
            },
            Observation {
                company: "C".into(),
                sector: "Energy".into(),
                year: 2021,
                governance_score: 70.0,
                annual_return_pct: 5.0,
            },
        ];
        let means = sector_year_means(&rows);
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].sector, "Energy");
        assert_eq!(means[1].governance_score, 50.0);
        assert_eq!(means[1].annual_return_pct, 4.0);
        assert_eq!(means[1].companies, 2);
    }

    #[test]
    fn test_snap_outwards() {
        assert_eq!(snap_outwards(-12.3, 7.1, 5.0), (-15.0, 10.0));
        assert_eq!(snap_outwards(-10.0, 10.0, 5.0), (-10.0, 10.0));
    }
}
