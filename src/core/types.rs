use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult, require_percent, require_positive};

/// Default number of Monte Carlo trials per simulation.
pub const DEFAULT_TRIAL_COUNT: u32 = 1_000;

/// Number of trial outcomes returned for charting.
pub const SCENARIO_SAMPLE_SIZE: usize = 100;

/// Longest horizon, in periods, that any projection, solve or simulation
/// will run (100 years of months).
pub const MAX_HORIZON_MONTHS: u32 = 1_200;

/// Asset-class label to allocation weight in percent.
pub type AllocationMap = BTreeMap<String, f64>;

/// Asset-class label to expected annual rate in percent.
pub type RateMap = BTreeMap<String, f64>;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContributionTiming {
    /// Contribution lands after the period's growth (ordinary annuity).
    #[default]
    #[serde(alias = "end-of-period", alias = "endOfPeriod")]
    End,
    /// Contribution lands before the period's growth (annuity due).
    #[serde(alias = "beginning-of-period", alias = "beginningOfPeriod")]
    Beginning,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionPlan {
    pub periodic_amount: f64,
    /// Annual rate in percent, 0 to 100.
    pub annual_rate: f64,
    pub periods_per_year: u32,
    pub duration_periods: u32,
    pub timing: ContributionTiming,
}

impl ContributionPlan {
    pub fn new(
        periodic_amount: f64,
        annual_rate: f64,
        periods_per_year: u32,
        years: u32,
    ) -> EngineResult<Self> {
        Self::from_periods(
            periodic_amount,
            annual_rate,
            periods_per_year,
            years.saturating_mul(periods_per_year),
        )
    }

    pub fn from_periods(
        periodic_amount: f64,
        annual_rate: f64,
        periods_per_year: u32,
        duration_periods: u32,
    ) -> EngineResult<Self> {
        require_positive("periodic_amount", periodic_amount)?;
        require_percent("annual_rate", annual_rate)?;
        if !(1..=12).contains(&periods_per_year) {
            return Err(EngineError::validation(
                "periods_per_year must be between 1 and 12",
            ));
        }
        if duration_periods == 0 {
            return Err(EngineError::validation("duration_periods must be > 0"));
        }
        if duration_periods > MAX_HORIZON_MONTHS {
            return Err(EngineError::validation(format!(
                "duration_periods must be <= {MAX_HORIZON_MONTHS}, got {duration_periods}"
            )));
        }

        Ok(Self {
            periodic_amount,
            annual_rate,
            periods_per_year,
            duration_periods,
            timing: ContributionTiming::End,
        })
    }

    pub fn with_timing(self, timing: ContributionTiming) -> Self {
        Self { timing, ..self }
    }

    pub fn periodic_rate(&self) -> f64 {
        self.annual_rate / 100.0 / self.periods_per_year as f64
    }

    pub fn total_contributed(&self) -> f64 {
        self.periodic_amount * self.duration_periods as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalTarget {
    pub target_amount: f64,
}

impl GoalTarget {
    pub fn new(target_amount: f64) -> EngineResult<Self> {
        require_positive("target_amount", target_amount)?;
        Ok(Self { target_amount })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub monthly_contribution: f64,
    pub target_amount: f64,
    pub horizon_months: u32,
    /// Decimal, e.g. 0.12.
    pub expected_annual_return: f64,
    /// Decimal, e.g. 0.15.
    pub annual_volatility: f64,
    pub trial_count: u32,
    pub initial_amount: f64,
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn new(
        monthly_contribution: f64,
        target_amount: f64,
        horizon_months: u32,
        expected_annual_return: f64,
        annual_volatility: f64,
    ) -> Self {
        Self {
            monthly_contribution,
            target_amount,
            horizon_months,
            expected_annual_return,
            annual_volatility,
            trial_count: DEFAULT_TRIAL_COUNT,
            initial_amount: 0.0,
            seed: None,
        }
    }

    pub fn with_trials(self, trial_count: u32) -> Self {
        Self {
            trial_count,
            ..self
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    pub fn with_initial_amount(self, initial_amount: f64) -> Self {
        Self {
            initial_amount,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub mean: f64,
    pub median: f64,
    pub p10: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
    #[serde(rename = "success_probability")]
    pub success_probability: f64,
    pub trial_count: u32,
    pub seed: u64,
    pub scenarios: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBand {
    pub month: u32,
    pub p10: f64,
    pub median: f64,
    pub p90: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    IncreaseSip,
    MaintainSip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAnalysis {
    #[serde(rename = "projectedCorpus")]
    pub projected_value: f64,
    #[serde(rename = "gapToGoal")]
    pub gap: f64,
    pub success_probability: f64,
    pub recommended_increment: f64,
    pub exact_increment: f64,
    pub recommended_action: RecommendedAction,
    pub suggestion_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub period: u32,
    pub contributed: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WhatIfAdjustments {
    /// Added to the annual rate, in percentage points.
    pub rate_increase: f64,
    /// Added to every periodic contribution.
    pub extra_contribution: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfComparison {
    pub baseline_value: f64,
    pub adjusted_value: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSegment {
    pub asset_class: String,
    pub weight: f64,
    pub annual_rate: f64,
    pub initial_value: f64,
    pub projected_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioProjection {
    pub total_value: f64,
    pub segments: Vec<PortfolioSegment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_derives_duration_and_periodic_rate() {
        let plan = ContributionPlan::new(1_000.0, 12.0, 12, 5).expect("valid plan");
        assert_eq!(plan.duration_periods, 60);
        assert_eq!(plan.timing, ContributionTiming::End);
        assert!((plan.periodic_rate() - 0.01).abs() < 1e-15);
        assert!((plan.total_contributed() - 60_000.0).abs() < 1e-9);
    }

    #[test]
    fn plan_rejects_out_of_range_inputs() {
        assert!(ContributionPlan::new(0.0, 12.0, 12, 5).is_err());
        assert!(ContributionPlan::new(100.0, -1.0, 12, 5).is_err());
        assert!(ContributionPlan::new(100.0, 101.0, 12, 5).is_err());
        assert!(ContributionPlan::new(100.0, 12.0, 0, 5).is_err());
        assert!(ContributionPlan::new(100.0, 12.0, 13, 5).is_err());
        assert!(ContributionPlan::new(100.0, 12.0, 12, 0).is_err());
    }

    #[test]
    fn plan_rejects_horizons_beyond_cap() {
        assert!(ContributionPlan::new(100.0, 12.0, 12, 100).is_ok());
        assert!(matches!(
            ContributionPlan::new(100.0, 12.0, 12, 101),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            ContributionPlan::new(100.0, 12.0, 12, u32::MAX),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            ContributionPlan::from_periods(100.0, 12.0, 12, MAX_HORIZON_MONTHS + 1),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn goal_target_must_be_positive() {
        assert!(GoalTarget::new(0.0).is_err());
        assert!(GoalTarget::new(5_000_000.0).is_ok());
    }

    #[test]
    fn simulation_config_defaults_to_thousand_unseeded_trials() {
        let config = SimulationConfig::new(12_000.0, 5_000_000.0, 60, 0.12, 0.15);
        assert_eq!(config.trial_count, DEFAULT_TRIAL_COUNT);
        assert_eq!(config.seed, None);
        assert_eq!(config.initial_amount, 0.0);

        let seeded = config.with_seed(9).with_trials(50);
        assert_eq!(seeded.seed, Some(9));
        assert_eq!(seeded.trial_count, 50);
    }

    #[test]
    fn goal_analysis_serializes_original_field_names() {
        let analysis = GoalAnalysis {
            projected_value: 1.0,
            gap: 2.0,
            success_probability: 0.5,
            recommended_increment: 0.1,
            exact_increment: 0.09,
            recommended_action: RecommendedAction::IncreaseSip,
            suggestion_text: "x".to_string(),
        };
        let json = serde_json::to_string(&analysis).expect("serializes");
        assert!(json.contains("\"projectedCorpus\""));
        assert!(json.contains("\"gapToGoal\""));
        assert!(json.contains("\"recommendedAction\":\"increase_sip\""));
    }
}
