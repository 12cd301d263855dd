// End-to-end loading: spreadsheet on disk → annual observations

mod common;

use common::{price_csv, write_fixture, COMPANIES, YEARS};
use esg_dashboard::{
    quintile_buckets, DashboardError, DataFormatError, Dataset, ReturnOptions, ReturnPolicy, ReturnSource,
};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

#[test]
fn test_load_price_csv() {
    let (_dir, path) = write_fixture("esg.csv", &price_csv());
    let dataset = Dataset::load(&path, &ReturnOptions::default()).unwrap();

    assert_eq!(dataset.len(), COMPANIES.len() * YEARS.count());
    assert_eq!(dataset.years(), vec![2019, 2020, 2021]);
    assert_eq!(dataset.sectors(), vec!["Energy".to_string(), "Tech".to_string()]);
    assert!(dataset.companies().contains(&"Acme, Inc.".to_string()));

    let summary = dataset.summary();
    assert_eq!(summary.format, "CSV");
    assert_eq!(summary.return_source, Some(ReturnSource::ClosePrice));
    assert_eq!(summary.rows_read, COMPANIES.len() * YEARS.count() * 12);
    assert_eq!(summary.rows_dropped, 0);
    assert_eq!(summary.years_without_return, 0);

    // Bolt: 0.8 % monthly growth in 2019, eleven month-over-month steps
    let bolt_2019 = dataset
        .observations()
        .iter()
        .find(|o| o.company == "Bolt" && o.year == 2019)
        .unwrap();
    let expected = (1.008f64.powi(11) - 1.0) * 100.0;
    assert!((bolt_2019.annual_return_pct - expected).abs() < 1e-3);
    assert_eq!(bolt_2019.governance_score, 46.0);
}

#[test]
fn test_partial_year_depends_on_policy() {
    // Drop the last three months of 2021 for every company
    let csv: String = price_csv()
        .lines()
        .filter(|line| !(line.contains("2021-10-") || line.contains("2021-11-") || line.contains("2021-12-")))
        .map(|line| format!("{line}\n"))
        .collect();
    let (_dir, path) = write_fixture("partial.csv", &csv);

    let strict = Dataset::load(&path, &ReturnOptions::default()).unwrap();
    assert_eq!(strict.years(), vec![2019, 2020]);
    assert_eq!(strict.summary().years_without_return, COMPANIES.len());

    let ytd = ReturnOptions {
        policy: ReturnPolicy::YtdPartial,
        ..ReturnOptions::default()
    };
    let lenient = Dataset::load(&path, &ytd).unwrap();
    assert_eq!(lenient.years(), vec![2019, 2020, 2021]);
}

#[test]
fn test_missing_column_is_data_format_error() {
    let csv = "Company Name,Date,Close Price (USD)\nAcme,2020-01-31,10\n";
    let (_dir, path) = write_fixture("broken.csv", csv);

    match Dataset::load(&path, &ReturnOptions::default()) {
        Err(DashboardError::DataFormat(DataFormatError::MissingColumn(column))) => {
            assert_eq!(column, "GovernancePillarScore");
        }
        other => panic!("expected a missing-column error, got {other:?}"),
    }
}

#[test]
fn test_missing_file_and_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.xlsx");
    assert!(matches!(
        Dataset::load(&missing, &ReturnOptions::default()),
        Err(DashboardError::DataFormat(DataFormatError::Unreadable { .. }))
    ));

    let (_dir, path) = write_fixture("data.json", "{}");
    assert!(matches!(
        Dataset::load(&path, &ReturnOptions::default()),
        Err(DashboardError::DataFormat(DataFormatError::UnsupportedFormat(_)))
    ));
}

#[test]
fn test_quintiles_over_loaded_dataset() {
    let (_dir, path) = write_fixture("esg.csv", &price_csv());
    let dataset = Dataset::load(&path, &ReturnOptions::default()).unwrap();
    let buckets = quintile_buckets(dataset.observations());
    assert_eq!(buckets.len(), 5);
    assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), COMPANIES.len());
}

#[test]
fn test_load_excel_workbook() {
    // First worksheet holds monthly prices with date-formatted cells and a
    // German "Sektor" header; the second worksheet is notes only
    let dataset = Dataset::load(&fixture("esg_sample.xlsx"), &ReturnOptions::default()).unwrap();

    let summary = dataset.summary();
    assert_eq!(summary.format, "Excel workbook");
    assert_eq!(summary.return_source, Some(ReturnSource::ClosePrice));
    assert_eq!(summary.rows_read, 3 * 3 * 12 + 1);
    assert_eq!(summary.rows_dropped, 1);

    assert_eq!(dataset.len(), 9);
    assert_eq!(dataset.years(), vec![2019, 2020, 2021]);
    assert_eq!(
        dataset.sectors(),
        vec!["Energy".to_string(), "Tech".to_string(), "Unclassified".to_string()]
    );
    assert_eq!(
        dataset.companies(),
        vec!["Alpha AG".to_string(), "Beta SE".to_string(), "Gamma GmbH".to_string()]
    );

    let alpha_2020 = dataset
        .observations()
        .iter()
        .find(|o| o.company == "Alpha AG" && o.year == 2020)
        .unwrap();
    assert_eq!(alpha_2020.sector, "Tech");
    assert_eq!(alpha_2020.governance_score, 62.0);
    let expected = (1.01f64.powi(11) - 1.0) * 100.0;
    assert!((alpha_2020.annual_return_pct - expected).abs() < 1e-3);

    let beta = dataset.observations().iter().filter(|o| o.company == "Beta SE");
    assert!(beta.into_iter().all(|o| o.annual_return_pct < 0.0));
}

#[test]
fn test_duplicate_months_are_counted() {
    let mut csv = price_csv();
    let first_row = csv.lines().nth(1).unwrap().to_string();
    csv.push_str(&first_row);
    csv.push('\n');
    let (_dir, path) = write_fixture("dup.csv", &csv);

    let dataset = Dataset::load(&path, &ReturnOptions::default()).unwrap();
    assert_eq!(dataset.len(), COMPANIES.len() * YEARS.count());
    assert_eq!(dataset.summary().duplicate_months, 1);
    assert_eq!(dataset.summary().duplicate_years, 0);
}

#[test]
fn test_duplicate_company_years_are_counted_and_merged() {
    let csv = "Company Name,Year,GovernancePillarScore,AnnualReturnPct\n\
               Acme,2020,40,10\n\
               Beta,2020,70,1\n\
               Acme,2020,60,20\n";
    let (_dir, path) = write_fixture("returns.csv", csv);

    let dataset = Dataset::load(&path, &ReturnOptions::default()).unwrap();
    let summary = dataset.summary();
    assert_eq!(summary.return_source, Some(ReturnSource::AnnualReturnPct));
    assert_eq!(summary.duplicate_years, 1);
    assert_eq!(summary.duplicate_months, 0);
    assert_eq!(dataset.len(), 2);
}
