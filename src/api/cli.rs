use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;

use super::{
    GoalAnalyzePayload, GoalMonthsPayload, PortfolioPayload, ServerConfig, SimulatePayload,
    SipProjectPayload, goal_analysis, goal_months, goal_simulation, monthly_bands,
    portfolio_projection, run_http_server, sip_projection,
};
use crate::core::{
    ContributionTiming, DEFAULT_TRIAL_COUNT, EngineError, WhatIfAdjustments, cagr,
    inflation_adjusted, monthly_sip_plan, what_if,
};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode result: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Parser)]
#[command(
    name = "sipcast",
    version,
    about = "SIP projections, goal solving and Monte Carlo goal simulation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Future value of a monthly SIP.
    Project(ProjectArgs),
    /// Months of contributions needed to reach a target.
    Months(MonthsArgs),
    /// Fixed-horizon shortfall analysis with a suggested SIP increase.
    Analyze(AnalyzeArgs),
    /// Lump-sum projection across an asset allocation.
    Portfolio(PortfolioArgs),
    /// Monte Carlo goal simulation.
    Simulate(SimulateArgs),
    /// Compare a monthly SIP against a higher rate or extra contribution.
    WhatIf(WhatIfArgs),
    /// Compound annual growth rate between two values.
    Cagr(CagrArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "SIPCAST_HOST", default_value = "0.0.0.0")]
    host: String,
    #[arg(long, env = "SIPCAST_PORT", default_value_t = 8080)]
    port: u16,
    #[arg(
        long,
        env = "SIPCAST_MAX_TRIALS",
        default_value_t = 100_000,
        help = "Largest trial count a single request may ask for"
    )]
    max_trials: u32,
    #[arg(
        long,
        env = "SIPCAST_DEFAULT_TRIALS",
        default_value_t = DEFAULT_TRIAL_COUNT,
        help = "Trials used when a request does not give a count"
    )]
    default_trials: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliTiming {
    End,
    Beginning,
}

impl From<CliTiming> for ContributionTiming {
    fn from(value: CliTiming) -> Self {
        match value {
            CliTiming::End => ContributionTiming::End,
            CliTiming::Beginning => ContributionTiming::Beginning,
        }
    }
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    #[arg(long, help = "Monthly investment")]
    monthly: f64,
    #[arg(long, help = "Expected annual return in percent")]
    rate: f64,
    #[arg(long)]
    years: u32,
    #[arg(long, default_value_t = 12, help = "Compounding periods per year (1-12)")]
    frequency: u32,
    #[arg(long, default_value_t = 0.0)]
    initial: f64,
    #[arg(long, value_enum, default_value_t = CliTiming::End)]
    timing: CliTiming,
    #[arg(long, help = "Include the per-period balance schedule")]
    schedule: bool,
}

#[derive(Debug, Args)]
pub struct MonthsArgs {
    #[arg(long)]
    target: f64,
    #[arg(long, help = "Monthly investment")]
    monthly: f64,
    #[arg(long, help = "Expected annual return in percent")]
    rate: f64,
    #[arg(long, default_value_t = 0.0, help = "Savings already invested")]
    current: f64,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[arg(long)]
    goal: f64,
    #[arg(long)]
    years: f64,
    #[arg(long, help = "Monthly SIP")]
    monthly: f64,
    #[arg(
        long,
        default_value_t = 0.12,
        help = "Expected annual return as a decimal (0.12 = 12%)"
    )]
    expected_return: f64,
}

#[derive(Debug, Args)]
pub struct PortfolioArgs {
    #[arg(long)]
    initial: f64,
    #[arg(
        long = "allocation",
        value_parser = parse_labelled_percent,
        help = "Asset class weight as LABEL=PERCENT; repeat per class"
    )]
    allocation: Vec<(String, f64)>,
    #[arg(
        long = "rate",
        value_parser = parse_labelled_percent,
        help = "Asset class annual return as LABEL=PERCENT; repeat per class"
    )]
    rates: Vec<(String, f64)>,
    #[arg(long)]
    years: f64,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[arg(long, help = "Monthly SIP")]
    monthly: f64,
    #[arg(long)]
    target: f64,
    #[arg(long, help = "Horizon in months")]
    months: u32,
    #[arg(
        long,
        default_value_t = 0.12,
        help = "Expected annual return as a decimal"
    )]
    expected_return: f64,
    #[arg(long, default_value_t = 0.15, help = "Annual volatility as a decimal")]
    volatility: f64,
    #[arg(long, default_value_t = DEFAULT_TRIAL_COUNT)]
    trials: u32,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 0.0)]
    initial: f64,
    #[arg(long, help = "Print monthly p10/median/p90 bands instead of terminal statistics")]
    bands: bool,
}

#[derive(Debug, Args)]
pub struct WhatIfArgs {
    #[arg(long, help = "Monthly investment")]
    monthly: f64,
    #[arg(long, help = "Expected annual return in percent")]
    rate: f64,
    #[arg(long)]
    years: u32,
    #[arg(long, default_value_t = 12, help = "Compounding periods per year (1-12)")]
    frequency: u32,
    #[arg(long, value_enum, default_value_t = CliTiming::End)]
    timing: CliTiming,
    #[arg(long, default_value_t = 0.0, help = "Percentage points added to the annual rate")]
    rate_increase: f64,
    #[arg(long, default_value_t = 0.0, help = "Amount added to every monthly investment")]
    extra: f64,
}

#[derive(Debug, Args)]
pub struct CagrArgs {
    #[arg(long)]
    begin: f64,
    #[arg(long)]
    end: f64,
    #[arg(long)]
    years: f64,
    #[arg(long, help = "Annual inflation in percent; adds the ending value in today's money")]
    inflation: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CagrReport {
    cagr_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    real_ending_value: Option<f64>,
}

fn parse_labelled_percent(raw: &str) -> Result<(String, f64), String> {
    let (label, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=PERCENT, got {raw:?}"))?;
    let label = label.trim();
    if label.is_empty() {
        return Err(format!("missing label in {raw:?}"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid percentage in {raw:?}: {e}"))?;
    Ok((label.to_string(), value))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_cli(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Serve(args) => {
            let config = ServerConfig {
                host: args.host,
                port: args.port,
                max_trials: args.max_trials,
                default_trials: args.default_trials,
            };
            run_http_server(config).await?;
        }
        Command::Project(args) => print_json(&sip_projection(project_payload(args))?)?,
        Command::Months(args) => print_json(&goal_months(GoalMonthsPayload {
            target_amount: Some(args.target),
            monthly_investment: Some(args.monthly),
            annual_rate: Some(args.rate),
            current_amount: Some(args.current),
        })?)?,
        Command::Analyze(args) => print_json(&goal_analysis(GoalAnalyzePayload {
            goal_amount: Some(args.goal),
            years: Some(args.years),
            monthly_sip: Some(args.monthly),
            expected_return_pa: Some(args.expected_return),
        })?)?,
        Command::Portfolio(args) => print_json(&portfolio_projection(PortfolioPayload {
            initial_investment: Some(args.initial),
            allocation: args.allocation.into_iter().collect(),
            expected_returns: args.rates.into_iter().collect(),
            years: Some(args.years),
        })?)?,
        Command::Simulate(args) => {
            let bands = args.bands;
            let payload = simulate_payload(args);
            // Local runs are bounded only by the requested trial count.
            let config = ServerConfig {
                max_trials: payload.trials.unwrap_or(DEFAULT_TRIAL_COUNT),
                ..ServerConfig::default()
            };
            if bands {
                print_json(&monthly_bands(payload, &config)?)?;
            } else {
                print_json(&goal_simulation(payload, &config)?)?;
            }
        }
        Command::WhatIf(args) => {
            let plan = monthly_sip_plan(
                args.monthly,
                args.rate,
                args.years,
                args.frequency,
                args.timing.into(),
            )?;
            // Plan amounts are per period; the extra is given per month.
            let adjustments = WhatIfAdjustments {
                rate_increase: args.rate_increase,
                extra_contribution: args.extra * 12.0 / args.frequency as f64,
            };
            print_json(&what_if(&plan, adjustments)?)?;
        }
        Command::Cagr(args) => print_json(&cagr_report(&args)?)?,
    }
    Ok(())
}

fn cagr_report(args: &CagrArgs) -> Result<CagrReport, EngineError> {
    let real_ending_value = args
        .inflation
        .map(|inflation| inflation_adjusted(args.end, inflation, args.years))
        .transpose()?;
    Ok(CagrReport {
        cagr_percent: cagr(args.begin, args.end, args.years)?,
        real_ending_value,
    })
}

fn project_payload(args: ProjectArgs) -> SipProjectPayload {
    SipProjectPayload {
        monthly_investment: Some(args.monthly),
        annual_rate: Some(args.rate),
        tenure_years: Some(args.years),
        compounding_frequency: Some(args.frequency),
        initial_amount: Some(args.initial),
        timing: Some(args.timing.into()),
        include_schedule: Some(args.schedule),
    }
}

fn simulate_payload(args: SimulateArgs) -> SimulatePayload {
    SimulatePayload {
        monthly_sip: Some(args.monthly),
        target_amount: Some(args.target),
        time_horizon: Some(args.months),
        expected_return: Some(args.expected_return),
        volatility: Some(args.volatility),
        trials: Some(args.trials),
        seed: args.seed,
        initial_amount: Some(args.initial),
    }
}
