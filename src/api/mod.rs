mod insights;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::{ServerConfig, SimulationArgs, SimulationDefaults};
use crate::core::{
    CancelToken, ExecutionMode, ForecastError, SimulationParameters, SimulationResult,
    run_seeded, validate,
};

pub use insights::{
    Baseline, BaselineComparison, Insights, RiskLevel, build_insights, compare_to_baseline,
};

const DEFAULT_SIMULATION_NAME: &str = "MRR forecast";
const DEFAULT_SIMULATION_TYPE: &str = "revenue_forecast";
const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ParametersPayload {
    avg_growth_rate: Option<f64>,
    growth_volatility: Option<f64>,
    avg_churn_rate: Option<f64>,
    churn_volatility: Option<f64>,
    avg_expansion_rate: Option<f64>,
    expansion_volatility: Option<f64>,
    seasonality_factor: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BaselinePayload {
    #[serde(alias = "percentile50")]
    median: f64,
    mean: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulatePayload {
    simulation_name: Option<String>,
    simulation_type: Option<String>,
    #[serde(alias = "iterations")]
    num_iterations: Option<i64>,
    #[serde(alias = "horizonMonths")]
    time_horizon_months: Option<i64>,
    #[serde(rename = "baseMRR", alias = "baseMrr")]
    base_mrr: Option<f64>,
    #[serde(rename = "baseARR", alias = "baseArr")]
    base_arr: Option<f64>,
    target_value: Option<f64>,
    seed: Option<u64>,
    parameters: ParametersPayload,
    baseline: Option<BaselinePayload>,
}

/// One simulation run from the command line.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, default_value = DEFAULT_SIMULATION_NAME)]
    pub name: String,
    #[arg(long = "type", default_value = DEFAULT_SIMULATION_TYPE)]
    pub simulation_type: String,
    #[arg(long, help = "Starting monthly recurring revenue")]
    pub base_mrr: Option<f64>,
    #[arg(long, help = "Starting annual recurring revenue, used when --base-mrr is absent")]
    pub base_arr: Option<f64>,
    #[arg(long, help = "Number of trajectories, defaults to --default-iterations")]
    pub iterations: Option<i64>,
    #[arg(long, help = "Months per trajectory, defaults to --default-horizon-months")]
    pub horizon_months: Option<i64>,
    #[arg(long, default_value_t = 0.0, help = "Mean monthly growth, e.g. 0.05")]
    pub growth_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    pub growth_volatility: f64,
    #[arg(long, default_value_t = 0.0, help = "Mean monthly churn, e.g. 0.03")]
    pub churn_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    pub churn_volatility: f64,
    #[arg(long, default_value_t = 0.0, help = "Mean monthly expansion, e.g. 0.02")]
    pub expansion_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    pub expansion_volatility: f64,
    #[arg(long, default_value_t = 0.0, help = "Amplitude of the 12-month seasonal cycle")]
    pub seasonality: f64,
    #[arg(long, help = "MRR threshold for the hit probability")]
    pub target: Option<f64>,
    #[arg(long, help = "Seed for this run, defaults to --default-seed")]
    pub seed: Option<u64>,
    #[command(flatten)]
    pub simulation: SimulationArgs,
}

impl From<SimulateArgs> for SimulatePayload {
    fn from(args: SimulateArgs) -> Self {
        SimulatePayload {
            simulation_name: Some(args.name),
            simulation_type: Some(args.simulation_type),
            num_iterations: args.iterations,
            time_horizon_months: args.horizon_months,
            base_mrr: args.base_mrr,
            base_arr: args.base_arr,
            target_value: args.target,
            seed: args.seed,
            parameters: ParametersPayload {
                avg_growth_rate: Some(args.growth_rate),
                growth_volatility: Some(args.growth_volatility),
                avg_churn_rate: Some(args.churn_rate),
                churn_volatility: Some(args.churn_volatility),
                avg_expansion_rate: Some(args.expansion_rate),
                expansion_volatility: Some(args.expansion_volatility),
                seasonality_factor: Some(args.seasonality),
            },
            baseline: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    simulation_name: String,
    simulation_type: String,
    base_arr: f64,
    seed: u64,
    baseline: Option<Baseline>,
    params: SimulationParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    simulation_name: String,
    simulation_type: String,
    num_iterations: usize,
    time_horizon_months: u32,
    #[serde(rename = "baseMRR")]
    base_mrr: f64,
    #[serde(rename = "baseARR")]
    base_arr: f64,
    target_value: Option<f64>,
    seed: u64,
    results: SimulationResult,
    insights: Insights,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline_comparison: Option<BaselineComparison>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Clone)]
struct AppState {
    defaults: Arc<SimulationDefaults>,
}

pub fn api_request_from_payload(
    payload: SimulatePayload,
    defaults: &SimulationDefaults,
) -> Result<ApiRequest, ForecastError> {
    let iterations = match payload.num_iterations {
        None => defaults.default_iterations,
        Some(v) if v <= 0 => {
            return Err(ForecastError::InvalidParameters(
                "numIterations must be > 0".to_string(),
            ));
        }
        Some(v) => usize::try_from(v).map_err(|_| {
            ForecastError::InvalidParameters("numIterations is too large".to_string())
        })?,
    };
    if iterations > defaults.max_iterations {
        return Err(ForecastError::InvalidParameters(format!(
            "numIterations must be <= {}",
            defaults.max_iterations
        )));
    }

    let horizon_months = match payload.time_horizon_months {
        None => defaults.default_horizon_months,
        Some(v) if v <= 0 => {
            return Err(ForecastError::InvalidParameters(
                "timeHorizonMonths must be > 0".to_string(),
            ));
        }
        Some(v) => u32::try_from(v).map_err(|_| {
            ForecastError::InvalidParameters("timeHorizonMonths is too large".to_string())
        })?,
    };
    if horizon_months > defaults.max_horizon_months {
        return Err(ForecastError::InvalidParameters(format!(
            "timeHorizonMonths must be <= {}",
            defaults.max_horizon_months
        )));
    }

    let (base_mrr, base_arr) = match (payload.base_mrr, payload.base_arr) {
        (Some(mrr), Some(arr)) => (mrr, arr),
        (Some(mrr), None) => (mrr, mrr * MONTHS_PER_YEAR),
        (None, Some(arr)) => (arr / MONTHS_PER_YEAR, arr),
        (None, None) => {
            return Err(ForecastError::InvalidParameters(
                "baseMRR or baseARR is required".to_string(),
            ));
        }
    };

    let p = payload.parameters;
    let params = SimulationParameters {
        base_mrr,
        iterations,
        horizon_months,
        avg_growth_rate: p.avg_growth_rate.unwrap_or(0.0),
        growth_volatility: p.growth_volatility.unwrap_or(0.0),
        avg_churn_rate: p.avg_churn_rate.unwrap_or(0.0),
        churn_volatility: p.churn_volatility.unwrap_or(0.0),
        avg_expansion_rate: p.avg_expansion_rate.unwrap_or(0.0),
        expansion_volatility: p.expansion_volatility.unwrap_or(0.0),
        seasonality_factor: p.seasonality_factor.unwrap_or(0.0),
        target_value: payload.target_value,
    };
    validate(&params)?;

    Ok(ApiRequest {
        simulation_name: payload
            .simulation_name
            .unwrap_or_else(|| DEFAULT_SIMULATION_NAME.to_string()),
        simulation_type: payload
            .simulation_type
            .unwrap_or_else(|| DEFAULT_SIMULATION_TYPE.to_string()),
        base_arr,
        seed: payload.seed.unwrap_or(defaults.seed),
        baseline: payload.baseline.map(|b| Baseline {
            median: b.median,
            mean: b.mean,
        }),
        params,
    })
}

/// Runs the simulation for a validated request and shapes the response body.
pub fn simulate(
    request: ApiRequest,
    mode: ExecutionMode,
    cancel: &CancelToken,
) -> Result<SimulateResponse, ForecastError> {
    let results = run_seeded(&request.params, request.seed, mode, cancel)?;
    let insights = build_insights(&results, request.params.horizon_months);
    let baseline_comparison = request
        .baseline
        .map(|baseline| compare_to_baseline(&results, baseline));

    Ok(SimulateResponse {
        simulation_name: request.simulation_name,
        simulation_type: request.simulation_type,
        num_iterations: request.params.iterations,
        time_horizon_months: request.params.horizon_months,
        base_mrr: request.params.base_mrr,
        base_arr: request.base_arr,
        target_value: request.params.target_value,
        seed: request.seed,
        results,
        insights,
        baseline_comparison,
    })
}

/// Runs one simulation from CLI flags and returns the response as JSON text.
pub fn run_cli_simulation(args: SimulateArgs) -> Result<String, Box<dyn std::error::Error>> {
    let defaults = SimulationDefaults::try_from(args.simulation.clone())?;
    let request = api_request_from_payload(args.into(), &defaults)?;
    let cancel = CancelToken::with_deadline(defaults.request_timeout);
    let response = simulate(request, defaults.execution, &cancel)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

fn router(defaults: SimulationDefaults) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/simulate", post(simulate_handler))
        .fallback(not_found_handler)
        .with_state(AppState {
            defaults: Arc::new(defaults),
        })
}

pub async fn run_http_server(config: ServerConfig) -> std::io::Result<()> {
    let addr = config.socket_addr();
    let app = router(config.simulation);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "MRR forecast HTTP API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(
    State(state): State<AppState>,
    payload: Result<Json<SimulatePayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(
                status = %rejection.status(),
                error = %rejection,
                "malformed simulation request"
            );
            return error_response(rejection.status(), &rejection.body_text());
        }
    };
    let request = match api_request_from_payload(payload, &state.defaults) {
        Ok(request) => request,
        Err(e) => return forecast_error_response(&e),
    };

    let mode = state.defaults.execution;
    let cancel = CancelToken::with_deadline(state.defaults.request_timeout);
    let outcome = tokio::task::spawn_blocking(move || simulate(request, mode, &cancel)).await;

    match outcome {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(e)) => forecast_error_response(&e),
        Err(e) => {
            error!(error = %e, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation task failed")
        }
    }
}

fn status_for(err: &ForecastError) -> StatusCode {
    match err {
        ForecastError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        ForecastError::Overflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ForecastError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn forecast_error_response(err: &ForecastError) -> Response {
    let status = status_for(err);
    warn!(%status, error = %err, "simulation request rejected");
    error_response(status, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
