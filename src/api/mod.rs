use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::core::{
    AllocationMap, ContributionTiming, DEFAULT_TRIAL_COUNT, EngineError, EngineResult,
    GoalAnalysis, MonthlyBand, PortfolioSegment, ProjectionPoint, RateMap, SimulationConfig,
    SimulationResult, analyze_goal, blended_return, future_value_with_lump_sum, goal_progress,
    monthly_sip_plan, months_to_goal_with_savings, project_portfolio_breakdown,
    projection_schedule, simulate_goal, simulate_monthly_bands,
};

mod cli;

pub use cli::{Cli, CliError, Command, run_cli};

const DEFAULT_EXPECTED_RETURN: f64 = 0.12;
const DEFAULT_VOLATILITY: f64 = 0.15;
const DEFAULT_COMPOUNDING_FREQUENCY: u32 = 12;
const DEFAULT_MAX_TRIALS: u32 = 100_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on trials a single request may ask for.
    pub max_trials: u32,
    /// Trials used when a request does not say.
    pub default_trials: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_trials: DEFAULT_MAX_TRIALS,
            default_trials: DEFAULT_TRIAL_COUNT,
        }
    }
}

/// Monthly SIP projection. `annualRate` is in percent.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SipProjectPayload {
    pub monthly_investment: Option<f64>,
    pub annual_rate: Option<f64>,
    pub tenure_years: Option<u32>,
    pub compounding_frequency: Option<u32>,
    pub initial_amount: Option<f64>,
    pub timing: Option<ContributionTiming>,
    pub include_schedule: Option<bool>,
}

/// `annualRate` is in percent.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalMonthsPayload {
    pub target_amount: Option<f64>,
    pub monthly_investment: Option<f64>,
    pub annual_rate: Option<f64>,
    pub current_amount: Option<f64>,
}

/// `expectedReturnPA` is a decimal (0.12 for 12%).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAnalyzePayload {
    pub goal_amount: Option<f64>,
    pub years: Option<f64>,
    #[serde(rename = "monthlySIP", alias = "monthlySip")]
    pub monthly_sip: Option<f64>,
    #[serde(rename = "expectedReturnPA", alias = "expectedReturnPa")]
    pub expected_return_pa: Option<f64>,
}

/// Weights and rates are both in percent.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPayload {
    pub initial_investment: Option<f64>,
    #[serde(default)]
    pub allocation: AllocationMap,
    #[serde(default, alias = "rates")]
    pub expected_returns: RateMap,
    pub years: Option<f64>,
}

/// Monte Carlo request. `expectedReturn` and `volatility` are decimals;
/// `timeHorizon` is in months.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatePayload {
    #[serde(rename = "monthlySIP", alias = "monthlySip")]
    pub monthly_sip: Option<f64>,
    pub target_amount: Option<f64>,
    pub time_horizon: Option<u32>,
    pub expected_return: Option<f64>,
    pub volatility: Option<f64>,
    pub trials: Option<u32>,
    pub seed: Option<u64>,
    pub initial_amount: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SipProjectionResponse {
    pub future_value: f64,
    pub total_contributed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<ProjectionPoint>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalMonthsResponse {
    pub months_needed: u32,
    pub years_needed: f64,
    /// Share of the target already saved, in percent.
    pub progress_percent: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub total_value: f64,
    pub blended_rate: f64,
    pub segments: Vec<PortfolioSegment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandsResponse {
    pub seed: u64,
    pub trial_count: u32,
    pub bands: Vec<MonthlyBand>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reachable: Option<bool>,
}

fn required<T>(value: Option<T>, field: &str) -> EngineResult<T> {
    value.ok_or_else(|| EngineError::validation(format!("{field} is required")))
}

pub fn sip_projection(payload: SipProjectPayload) -> EngineResult<SipProjectionResponse> {
    let monthly = required(payload.monthly_investment, "monthlyInvestment")?;
    let rate = required(payload.annual_rate, "annualRate")?;
    let years = required(payload.tenure_years, "tenureYears")?;
    let frequency = payload
        .compounding_frequency
        .unwrap_or(DEFAULT_COMPOUNDING_FREQUENCY);
    let initial = payload.initial_amount.unwrap_or(0.0);
    if !initial.is_finite() || initial < 0.0 {
        return Err(EngineError::validation("initialAmount must be >= 0"));
    }

    let plan = monthly_sip_plan(
        monthly,
        rate,
        years,
        frequency,
        payload.timing.unwrap_or_default(),
    )?;
    let schedule = payload
        .include_schedule
        .unwrap_or(false)
        .then(|| projection_schedule(initial, &plan));

    Ok(SipProjectionResponse {
        future_value: future_value_with_lump_sum(initial, &plan),
        total_contributed: initial + plan.total_contributed(),
        schedule,
    })
}

pub fn goal_months(payload: GoalMonthsPayload) -> EngineResult<GoalMonthsResponse> {
    let current = payload.current_amount.unwrap_or(0.0);
    let target = required(payload.target_amount, "targetAmount")?;
    let months = months_to_goal_with_savings(
        current,
        target,
        required(payload.monthly_investment, "monthlyInvestment")?,
        required(payload.annual_rate, "annualRate")?,
    )?;
    Ok(GoalMonthsResponse {
        months_needed: months,
        years_needed: months as f64 / 12.0,
        progress_percent: goal_progress(current, target)?,
    })
}

pub fn goal_analysis(payload: GoalAnalyzePayload) -> EngineResult<GoalAnalysis> {
    let expected = payload
        .expected_return_pa
        .unwrap_or(DEFAULT_EXPECTED_RETURN);
    analyze_goal(
        required(payload.goal_amount, "goalAmount")?,
        required(payload.years, "years")?,
        required(payload.monthly_sip, "monthlySIP")?,
        expected * 100.0,
    )
}

pub fn portfolio_projection(payload: PortfolioPayload) -> EngineResult<PortfolioResponse> {
    let projection = project_portfolio_breakdown(
        required(payload.initial_investment, "initialInvestment")?,
        &payload.allocation,
        &payload.expected_returns,
        required(payload.years, "years")?,
    )?;
    Ok(PortfolioResponse {
        total_value: projection.total_value,
        blended_rate: blended_return(&payload.allocation, &payload.expected_returns)?,
        segments: projection.segments,
    })
}

fn simulation_config_from_payload(
    payload: &SimulatePayload,
    config: &ServerConfig,
) -> EngineResult<SimulationConfig> {
    let trials = payload.trials.unwrap_or(config.default_trials);
    if trials > config.max_trials {
        return Err(EngineError::validation(format!(
            "trials must be <= {}, got {trials}",
            config.max_trials
        )));
    }

    let mut sim = SimulationConfig::new(
        required(payload.monthly_sip, "monthlySIP")?,
        required(payload.target_amount, "targetAmount")?,
        required(payload.time_horizon, "timeHorizon")?,
        payload.expected_return.unwrap_or(DEFAULT_EXPECTED_RETURN),
        payload.volatility.unwrap_or(DEFAULT_VOLATILITY),
    )
    .with_trials(trials)
    .with_initial_amount(payload.initial_amount.unwrap_or(0.0));
    if let Some(seed) = payload.seed {
        sim = sim.with_seed(seed);
    }
    Ok(sim)
}

pub fn goal_simulation(
    payload: SimulatePayload,
    config: &ServerConfig,
) -> EngineResult<SimulationResult> {
    simulate_goal(&simulation_config_from_payload(&payload, config)?)
}

pub fn monthly_bands(payload: SimulatePayload, config: &ServerConfig) -> EngineResult<BandsResponse> {
    let sim = simulation_config_from_payload(&payload, config)?;
    // Fix the seed here so the response can echo it.
    let seed = sim.seed.unwrap_or_else(rand::random::<u64>);
    let bands = simulate_monthly_bands(&sim.with_seed(seed))?;
    Ok(BandsResponse {
        seed,
        trial_count: sim.trial_count,
        bands,
    })
}

pub fn router(config: ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/sip/project", post(sip_project_handler))
        .route("/api/goal/months", post(goal_months_handler))
        .route("/api/goal/analyze", post(goal_analyze_handler))
        .route("/api/portfolio/project", post(portfolio_handler))
        .route(
            "/api/simulate/goal",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/simulate/bands", post(bands_handler))
        .fallback(not_found_handler)
        .with_state(config)
}

pub async fn run_http_server(config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    info!(
        "SIP projection API listening on http://{addr} (max trials {}, default trials {})",
        config.max_trials, config.default_trials
    );
    info!("Local access: http://127.0.0.1:{}/health", addr.port());

    axum::serve(listener, router(config)).await
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", None)
}

async fn sip_project_handler(Json(payload): Json<SipProjectPayload>) -> Response {
    info!("POST /api/sip/project");
    engine_response(sip_projection(payload))
}

async fn goal_months_handler(Json(payload): Json<GoalMonthsPayload>) -> Response {
    info!("POST /api/goal/months");
    engine_response(goal_months(payload))
}

async fn goal_analyze_handler(Json(payload): Json<GoalAnalyzePayload>) -> Response {
    info!("POST /api/goal/analyze");
    engine_response(goal_analysis(payload))
}

async fn portfolio_handler(Json(payload): Json<PortfolioPayload>) -> Response {
    info!("POST /api/portfolio/project");
    engine_response(portfolio_projection(payload))
}

async fn simulate_get_handler(
    State(config): State<ServerConfig>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    info!("GET /api/simulate/goal");
    simulate_handler_impl(config, payload).await
}

async fn simulate_post_handler(
    State(config): State<ServerConfig>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    info!("POST /api/simulate/goal");
    simulate_handler_impl(config, payload).await
}

async fn simulate_handler_impl(config: ServerConfig, payload: SimulatePayload) -> Response {
    blocking_engine_response(move || goal_simulation(payload, &config)).await
}

async fn bands_handler(
    State(config): State<ServerConfig>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    info!("POST /api/simulate/bands");
    blocking_engine_response(move || monthly_bands(payload, &config)).await
}

/// Runs a simulation off the async workers; trials fan out on the rayon pool.
async fn blocking_engine_response<T, F>(job: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> EngineResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(result) => engine_response(result),
        Err(err) => {
            error!("simulation task failed: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "simulation task failed",
                None,
            )
        }
    }
}

fn engine_response<T: Serialize>(result: EngineResult<T>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            warn!("request rejected: {err}");
            let (status, reachable) = match &err {
                EngineError::Validation(_) => (StatusCode::BAD_REQUEST, None),
                EngineError::Domain(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
                EngineError::UnreachableGoal(_) => (StatusCode::UNPROCESSABLE_ENTITY, Some(false)),
            };
            error_response(status, &err.to_string(), reachable)
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str, reachable: Option<bool>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            reachable,
        },
    )
}
