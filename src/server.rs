// 🌐 Dashboard Web Server - REST API and SVG charts with Axum
// Every request recomputes its view from the shared, read-only dataset

use crate::analysis::benchmark::{benchmark_view, BenchmarkQuery, BenchmarkView};
use crate::analysis::correlation::{
    company_correlation, correlation_table, CompanyCorrelation, CorrelationQuery, CorrelationTable,
    DEFAULT_TOP_N,
};
use crate::analysis::impact::{impact_view, DisplayMode, ImpactOptions, ImpactView};
use crate::analysis::quintiles::{quintile_buckets, QuintileBucket};
use crate::analysis::timeseries::{company_series, sector_trends, SectorTrend, TimeSeriesView};
use crate::charts::{self, ChartSize};
use crate::dataset::{Dataset, LoadSummary, Observation};
use crate::error::DashboardError;
use crate::filter::{parse_list, ClipMode, FilterState};
use crate::stats::MIN_CORRELATION_N;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<Dataset>,
}

impl AppState {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Handler error: bad query parameters are the caller's fault, the rest is ours
pub struct AppError(DashboardError);

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DashboardError::InvalidParameter(_) => {
                tracing::warn!(error = %self.0, "Rejected request");
                StatusCode::BAD_REQUEST
            }
            _ => {
                tracing::error!(error = ?self.0, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ApiResponse::<()>::err(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Everything a page request may carry in its query string
///
/// Values stay strings until parsed, so a bad value becomes a 400 with the
/// error envelope instead of a bare extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub year_from: Option<String>,
    pub year_to: Option<String>,
    pub sectors: Option<String>,
    pub companies: Option<String>,
    pub clip: Option<String>,
    pub mode: Option<String>,
    pub scale_all: Option<String>,
    pub r_min: Option<String>,
    pub r_max: Option<String>,
    pub top_n: Option<String>,
    pub min_n: Option<String>,
    pub year: Option<String>,
    pub search: Option<String>,
    pub per_company: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

fn parse_value<T: FromStr>(name: &str, value: Option<&str>) -> Result<Option<T>, DashboardError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| DashboardError::InvalidParameter(format!("{name}: cannot parse '{raw}'"))),
    }
}

fn parse_flag(name: &str, value: Option<&str>) -> Result<Option<bool>, DashboardError> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") => Ok(None),
        Some("1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some("0" | "false" | "no" | "off") => Ok(Some(false)),
        Some(other) => Err(DashboardError::InvalidParameter(format!(
            "{name}: expected a boolean, got '{other}'"
        ))),
    }
}

impl DashboardParams {
    pub fn filter_state(&self) -> Result<FilterState, DashboardError> {
        let mut state = FilterState::all()
            .with_sectors(parse_list(self.sectors.as_deref()))
            .with_companies(parse_list(self.companies.as_deref()));
        let from: Option<i32> = parse_value("year_from", self.year_from.as_deref())?;
        let to: Option<i32> = parse_value("year_to", self.year_to.as_deref())?;
        match (from, to) {
            (Some(from), Some(to)) => state = state.with_years(from, to),
            (from, to) => {
                state.year_from = from;
                state.year_to = to;
            }
        }
        Ok(state)
    }

    pub fn impact_options(&self) -> Result<ImpactOptions, DashboardError> {
        Ok(ImpactOptions {
            clip: parse_value::<ClipMode>("clip", self.clip.as_deref())?.unwrap_or_default(),
            mode: parse_value::<DisplayMode>("mode", self.mode.as_deref())?.unwrap_or_default(),
            scale_all: parse_flag("scale_all", self.scale_all.as_deref())?.unwrap_or(false),
        })
    }

    pub fn correlation_query(&self) -> Result<CorrelationQuery, DashboardError> {
        let r_min = parse_value::<f64>("r_min", self.r_min.as_deref())?.unwrap_or(-1.0);
        let r_max = parse_value::<f64>("r_max", self.r_max.as_deref())?.unwrap_or(1.0);
        for (name, r) in [("r_min", r_min), ("r_max", r_max)] {
            if !(-1.0..=1.0).contains(&r) {
                return Err(DashboardError::InvalidParameter(format!(
                    "{name}: {r} is outside [-1, 1]"
                )));
            }
        }
        Ok(CorrelationQuery {
            r_min,
            r_max,
            top_n: parse_value("top_n", self.top_n.as_deref())?.unwrap_or(DEFAULT_TOP_N),
            min_n: parse_value::<usize>("min_n", self.min_n.as_deref())?
                .unwrap_or(MIN_CORRELATION_N)
                .max(MIN_CORRELATION_N),
        })
    }

    pub fn benchmark_query(&self) -> Result<BenchmarkQuery, DashboardError> {
        Ok(BenchmarkQuery {
            year: parse_value("year", self.year.as_deref())?,
            per_company: parse_flag("per_company", self.per_company.as_deref())?.unwrap_or(true),
            search: self.search.clone(),
        })
    }

    pub fn chart_size(&self) -> Result<ChartSize, DashboardError> {
        let default = ChartSize::default();
        let clamp = |v: u32| v.clamp(200, 2400);
        Ok(ChartSize {
            width: parse_value("width", self.width.as_deref())?.map_or(default.width, clamp),
            height: parse_value("height", self.height.as_deref())?.map_or(default.height, clamp),
        })
    }
}

fn filtered(state: &AppState, params: &DashboardParams) -> Result<Vec<Observation>, DashboardError> {
    let filter = params.filter_state()?;
    let rows = filter.apply(state.dataset.observations());
    tracing::debug!(
        rows = rows.len(),
        total = state.dataset.len(),
        "Applied filter"
    );
    Ok(rows)
}

// ============================================================================
// API Handlers
// ============================================================================

/// Choices for the filter widgets
#[derive(Debug, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub years: Vec<i32>,
    pub sectors: Vec<String>,
    pub companies: Vec<String>,
    pub summary: LoadSummary,
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/options - Years, sectors, companies and load summary
async fn get_options(State(state): State<AppState>) -> Json<ApiResponse<OptionsResponse>> {
    let dataset = &state.dataset;
    Json(ApiResponse::ok(OptionsResponse {
        years: dataset.years(),
        sectors: dataset.sectors(),
        companies: dataset.companies(),
        summary: dataset.summary().clone(),
    }))
}

/// GET /api/observations - The filtered table
async fn get_observations(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Vec<Observation>> {
    Ok(Json(ApiResponse::ok(filtered(&state, &params)?)))
}

fn build_impact(state: &AppState, params: &DashboardParams) -> Result<ImpactView, DashboardError> {
    let options = params.impact_options()?;
    Ok(impact_view(&filtered(state, params)?, &options))
}

/// GET /api/impact - Scatter data, regressions and verdict
async fn get_impact(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<ImpactView> {
    Ok(Json(ApiResponse::ok(build_impact(&state, &params)?)))
}

/// GET /api/quintiles - Returns per governance quintile
async fn get_quintiles(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Vec<QuintileBucket>> {
    Ok(Json(ApiResponse::ok(quintile_buckets(&filtered(&state, &params)?))))
}

/// GET /api/correlations - Ranked per-company correlations
async fn get_correlations(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<CorrelationTable> {
    let query = params.correlation_query()?;
    Ok(Json(ApiResponse::ok(correlation_table(&filtered(&state, &params)?, &query))))
}

/// GET /api/correlations/:company - One company's correlation and narrative
async fn get_company_correlation(
    State(state): State<AppState>,
    Path(company): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, AppError> {
    let query = params.correlation_query()?;
    let rows = filtered(&state, &params)?;
    match company_correlation(&rows, &company, query.min_n) {
        Some(detail) => Ok(Json(ApiResponse::<CompanyCorrelation>::ok(detail)).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::err(format!("No data for company '{company}'"))),
        )
            .into_response()),
    }
}

/// GET /api/benchmark - Sector medians and deltas
async fn get_benchmark(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<BenchmarkView> {
    let query = params.benchmark_query()?;
    Ok(Json(ApiResponse::ok(benchmark_view(&filtered(&state, &params)?, &query))))
}

fn build_timeseries(state: &AppState, params: &DashboardParams) -> Result<TimeSeriesView, DashboardError> {
    // Company selection picks the series; it must not empty the table first
    let mut filter = params.filter_state()?;
    let selected: Vec<String> = std::mem::take(&mut filter.companies).into_iter().collect();
    let rows = filter.apply(state.dataset.observations());
    Ok(company_series(&rows, &selected))
}

/// GET /api/timeseries - Yearly series per selected company
async fn get_timeseries(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<TimeSeriesView> {
    Ok(Json(ApiResponse::ok(build_timeseries(&state, &params)?)))
}

/// GET /api/sector-trends - Mean score and return per sector and year
async fn get_sector_trends(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Vec<SectorTrend>> {
    Ok(Json(ApiResponse::ok(sector_trends(&filtered(&state, &params)?))))
}

// ============================================================================
// Chart Handlers
// ============================================================================

fn svg(document: String) -> Response {
    ([(header::CONTENT_TYPE, "image/svg+xml")], document).into_response()
}

/// GET /charts/scatter.svg
async fn chart_scatter(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, AppError> {
    let view = build_impact(&state, &params)?;
    Ok(svg(charts::scatter_svg(&view, params.chart_size()?)?))
}

/// GET /charts/quintiles.svg
async fn chart_quintiles(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, AppError> {
    let buckets = quintile_buckets(&filtered(&state, &params)?);
    let title = "Mean annual return by governance quintile";
    Ok(svg(charts::quintile_svg(&buckets, title, params.chart_size()?)?))
}

/// GET /charts/benchmark.svg
async fn chart_benchmark(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, AppError> {
    let view = benchmark_view(&filtered(&state, &params)?, &params.benchmark_query()?);
    Ok(svg(charts::benchmark_svg(&view, params.chart_size()?)?))
}

/// GET /charts/timeseries.svg
async fn chart_timeseries(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, AppError> {
    let view = build_timeseries(&state, &params)?;
    Ok(svg(charts::timeseries_svg(&view, params.chart_size()?)?))
}

/// GET /charts/sector-trends.svg
async fn chart_sector_trends(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, AppError> {
    let trends = sector_trends(&filtered(&state, &params)?);
    Ok(svg(charts::sector_trends_svg(&trends, params.chart_size()?)?))
}

/// GET /charts/histogram/:metric.svg - metric is `returns` or `scores`
async fn chart_histogram(
    State(state): State<AppState>,
    Path(metric): Path<String>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, AppError> {
    let rows = filtered(&state, &params)?;
    let size = params.chart_size()?;
    let document = match metric.trim_end_matches(".svg") {
        "returns" => {
            let values: Vec<f64> = rows.iter().map(|o| o.annual_return_pct).collect();
            charts::histogram_svg(&values, "Distribution of annual returns", "Annual return (%)", size)?
        }
        "scores" => {
            let values: Vec<f64> = rows.iter().map(|o| o.governance_score).collect();
            charts::histogram_svg(&values, "Distribution of governance scores", "Governance score", size)?
        }
        other => {
            return Err(DashboardError::InvalidParameter(format!(
                "unknown histogram metric '{other}' (expected returns or scores)"
            ))
            .into())
        }
    };
    Ok(svg(document))
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/options", get(get_options))
        .route("/observations", get(get_observations))
        .route("/impact", get(get_impact))
        .route("/quintiles", get(get_quintiles))
        .route("/correlations", get(get_correlations))
        .route("/correlations/:company", get(get_company_correlation))
        .route("/benchmark", get(get_benchmark))
        .route("/timeseries", get(get_timeseries))
        .route("/sector-trends", get(get_sector_trends))
        .with_state(state.clone());

    // A path parameter spans its whole segment: the metric arrives as `returns.svg`
    let chart_routes = Router::new()
        .route("/scatter.svg", get(chart_scatter))
        .route("/quintiles.svg", get(chart_quintiles))
        .route("/benchmark.svg", get(chart_benchmark))
        .route("/timeseries.svg", get(chart_timeseries))
        .route("/sector-trends.svg", get(chart_sector_trends))
        .route("/histogram/:metric", get(chart_histogram))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .nest("/charts", chart_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process is stopped
pub async fn run_server(addr: SocketAddr, dataset: Dataset) -> std::io::Result<()> {
    let app = router(AppState::new(dataset));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "🚀 Dashboard running on http://{}", addr);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> DashboardParams {
        let query: String = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let uri: axum::http::Uri = format!("/?{query}").parse().unwrap();
        Query::<DashboardParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_filter_state_from_params() {
        let p = params(&[("year_from", "2021"), ("year_to", "2019"), ("sectors", "Tech|Energy")]);
        let state = p.filter_state().unwrap();
        assert_eq!(state.year_from, Some(2019));
        assert_eq!(state.year_to, Some(2021));
        assert_eq!(state.sectors.len(), 2);
        assert!(state.companies.is_empty());
    }

    #[test]
    fn test_bad_values_are_invalid_parameters() {
        assert!(matches!(
            params(&[("clip", "sometimes")]).impact_options(),
            Err(DashboardError::InvalidParameter(_))
        ));
        assert!(matches!(
            params(&[("year_from", "twenty")]).filter_state(),
            Err(DashboardError::InvalidParameter(_))
        ));
        assert!(matches!(
            params(&[("r_min", "-2")]).correlation_query(),
            Err(DashboardError::InvalidParameter(_))
        ));
        assert!(matches!(
            params(&[("per_company", "maybe")]).benchmark_query(),
            Err(DashboardError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let p = DashboardParams::default();
        assert_eq!(p.impact_options().unwrap(), ImpactOptions::default());
        assert_eq!(p.correlation_query().unwrap(), CorrelationQuery::default());
        assert_eq!(p.benchmark_query().unwrap(), BenchmarkQuery::default());
        let size = params(&[("width", "50")]).chart_size().unwrap();
        assert_eq!(size.width, 200);
    }
}
