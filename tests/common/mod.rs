// Shared fixtures: small monthly-price spreadsheets written to a temp dir

use std::fmt::Write as _;
use std::path::PathBuf;
use tempfile::TempDir;

pub const COMPANIES: &[(&str, &str)] = &[
    ("\"Acme, Inc.\"", "Tech"),
    ("Bolt", "Tech"),
    ("Core", "Energy"),
    ("Drill", "Energy"),
    ("Echo", "Tech"),
    ("Flux", "Energy"),
];

pub const YEARS: std::ops::RangeInclusive<i32> = 2019..=2021;

/// Twelve month-end prices per company and year, with drifting growth and score
pub fn price_csv() -> String {
    let mut csv = String::from("Company Name,Sector,Date,GovernancePillarScore,Close Price (USD)\n");
    for (c, (company, sector)) in COMPANIES.iter().enumerate() {
        let mut price = 100.0;
        for year in YEARS {
            let growth = 0.004 * (c as f64 + 1.0) + 0.002 * ((year - 2019) as f64) * if c % 2 == 0 { 1.0 } else { -1.0 };
            let score = 40.0 + 6.0 * c as f64 + (year - 2019) as f64 * (c % 3) as f64;
            for month in 1..=12 {
                writeln!(csv, "{company},{sector},{year}-{month:02}-28,{score:.2},{price:.4}").unwrap();
                price *= 1.0 + growth;
            }
        }
    }
    csv
}

pub fn write_fixture(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}
