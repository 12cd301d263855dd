// ESG Governance Dashboard - Web Server
// Loads the spreadsheet once, then serves the dashboard page and its API

use anyhow::{Context, Result};
use clap::Parser;
use esg_dashboard::{server, Dataset, ReturnOptions, ReturnPolicy};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "ESG governance vs. stock return dashboard", long_about = None)]
struct Args {
    /// Spreadsheet with company, date, governance score and close price columns (.xlsx, .xls, .ods or .csv)
    #[arg(long, env = "ESG_DATA_PATH", default_value = "data/esg_dataset.xlsx")]
    data: PathBuf,

    /// Address the web server listens on
    #[arg(long, env = "ESG_BIND", default_value = "127.0.0.1:8501")]
    bind: SocketAddr,

    /// How years without twelve monthly prices are treated
    #[arg(long, default_value = "strict")]
    return_policy: ReturnPolicy,

    /// Log filter used when RUST_LOG is not set (e.g. "info", "esg_dashboard=debug")
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    tracing::info!("🌐 ESG Governance Dashboard v{}", esg_dashboard::VERSION);

    let options = ReturnOptions {
        policy: args.return_policy,
        ..ReturnOptions::default()
    };

    let dataset = match Dataset::load(&args.data, &options) {
        Ok(dataset) => dataset,
        Err(e) => {
            tracing::error!(path = %args.data.display(), error = %e, "❌ Could not load dataset");
            return Err(e).with_context(|| format!("loading {}", args.data.display()));
        }
    };

    let summary = dataset.summary();
    tracing::info!(
        observations = summary.observations,
        rows_read = summary.rows_read,
        rows_dropped = summary.rows_dropped,
        policy = %options.policy,
        "✓ Dataset ready"
    );
    if dataset.is_empty() {
        tracing::warn!("Dataset has no usable company-years; every chart will be empty");
    }

    server::run_server(args.bind, dataset)
        .await
        .context("web server stopped")?;

    Ok(())
}
