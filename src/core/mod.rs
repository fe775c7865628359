mod engine;
mod error;
mod growth;
mod portfolio;
mod sip;
mod solver;
mod types;

pub use engine::{
    percentile, simulate_goal, simulate_monthly_bands, success_probability, validate_config,
};
pub use error::{EngineError, EngineResult};
pub use growth::{cagr, compound_future_value, inflation_adjusted};
pub use portfolio::{
    ALLOCATION_TOLERANCE, DEFAULT_RISK_FREE_RATE, blended_return, portfolio_volatility,
    project_portfolio, project_portfolio_breakdown, risk_adjusted_score, validate_allocation,
};
pub use sip::{
    future_value_of_series, future_value_with_lump_sum, monthly_sip_plan, project_sip,
    projection_schedule, projection_step, required_contribution, what_if,
};
pub use solver::{analyze_goal, goal_progress, months_to_goal, months_to_goal_with_savings};
pub use types::{
    AllocationMap, ContributionPlan, ContributionTiming, DEFAULT_TRIAL_COUNT, GoalAnalysis,
    GoalTarget, MAX_HORIZON_MONTHS, MonthlyBand, PortfolioProjection, PortfolioSegment,
    ProjectionPoint, RateMap, RecommendedAction, SCENARIO_SAMPLE_SIZE, SimulationConfig,
    SimulationResult, WhatIfAdjustments, WhatIfComparison,
};
