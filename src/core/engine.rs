use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use rayon::prelude::*;

use super::error::{
    EngineError, EngineResult, require_finite, require_non_negative, require_positive,
};
use super::sip::projection_step;
use super::types::{
    ContributionTiming, MAX_HORIZON_MONTHS, MonthlyBand, SCENARIO_SAMPLE_SIZE, SimulationConfig,
    SimulationResult,
};

pub fn validate_config(config: &SimulationConfig) -> EngineResult<()> {
    if config.horizon_months == 0 {
        return Err(EngineError::validation("horizon_months must be > 0"));
    }
    if config.horizon_months > MAX_HORIZON_MONTHS {
        return Err(EngineError::validation(format!(
            "horizon_months must be <= {MAX_HORIZON_MONTHS}, got {}",
            config.horizon_months
        )));
    }
    if config.trial_count == 0 {
        return Err(EngineError::validation("trial_count must be > 0"));
    }
    require_non_negative("monthly_contribution", config.monthly_contribution)?;
    require_positive("target_amount", config.target_amount)?;
    require_finite("expected_annual_return", config.expected_annual_return)?;
    require_non_negative("annual_volatility", config.annual_volatility)?;
    require_non_negative("initial_amount", config.initial_amount)?;
    Ok(())
}

/// Runs `trial_count` independent random walks and summarizes the terminal values.
pub fn simulate_goal(config: &SimulationConfig) -> EngineResult<SimulationResult> {
    validate_config(config)?;
    let monthly = monthly_distribution(config)?;
    let base_seed = config.seed.unwrap_or_else(rand::random::<u64>);
    debug!(
        "simulating {} trials over {} months (seed {base_seed})",
        config.trial_count, config.horizon_months
    );

    let terminal: Vec<f64> = (0..config.trial_count)
        .into_par_iter()
        .map(|trial| {
            let mut rng = StdRng::seed_from_u64(derive_seed(base_seed, trial));
            run_trial(config, &monthly, &mut rng, |_, _| {})
        })
        .collect();

    let result = summarize(terminal, config.target_amount, base_seed);
    debug!(
        "simulation finished: median {:.2}, success probability {:.3}",
        result.median, result.success_probability
    );
    Ok(result)
}

/// p10/p50/p90 of the portfolio value at the end of every month.
pub fn simulate_monthly_bands(config: &SimulationConfig) -> EngineResult<Vec<MonthlyBand>> {
    validate_config(config)?;
    let monthly = monthly_distribution(config)?;
    let base_seed = config.seed.unwrap_or_else(rand::random::<u64>);
    let months = config.horizon_months as usize;
    debug!(
        "building monthly bands for {} trials over {months} months (seed {base_seed})",
        config.trial_count
    );

    let paths: Vec<Vec<f64>> = (0..config.trial_count)
        .into_par_iter()
        .map(|trial| {
            let mut rng = StdRng::seed_from_u64(derive_seed(base_seed, trial));
            let mut path = Vec::with_capacity(months);
            run_trial(config, &monthly, &mut rng, |_, value| path.push(value));
            path
        })
        .collect();

    let mut accumulator = MonthlyAccumulator::new(config.horizon_months, paths.len());
    for path in paths {
        for (idx, value) in path.into_iter().enumerate() {
            accumulator.push(idx, value);
        }
    }
    Ok(accumulator.into_bands())
}

fn monthly_distribution(config: &SimulationConfig) -> EngineResult<Normal<f64>> {
    Normal::new(
        config.expected_annual_return / 12.0,
        config.annual_volatility / 12.0_f64.sqrt(),
    )
    .map_err(|err| EngineError::validation(format!("invalid return distribution: {err}")))
}

fn run_trial<F>(
    config: &SimulationConfig,
    monthly: &Normal<f64>,
    rng: &mut StdRng,
    mut on_month: F,
) -> f64
where
    F: FnMut(u32, f64),
{
    let mut value = config.initial_amount;
    for month in 1..=config.horizon_months {
        let r = rng.sample(monthly);
        value = projection_step(
            value,
            config.monthly_contribution,
            r,
            ContributionTiming::Beginning,
        )
        .max(0.0);
        on_month(month, value);
    }
    value
}

/// Fraction of outcomes at or above `target`.
pub fn success_probability(values: &[f64], target: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let hits = values.iter().filter(|&&v| v >= target).count();
    hits as f64 / values.len() as f64
}

fn summarize(terminal: Vec<f64>, target: f64, seed: u64) -> SimulationResult {
    let trial_count = terminal.len() as u32;
    let scenarios = terminal.iter().take(SCENARIO_SAMPLE_SIZE).copied().collect();
    let success_probability = success_probability(&terminal, target);
    let mean = if terminal.is_empty() {
        0.0
    } else {
        terminal.iter().sum::<f64>() / terminal.len() as f64
    };

    let mut sorted = terminal;
    let median = percentile(&mut sorted, 50.0);
    let p10 = percentile(&mut sorted, 10.0);
    let p90 = percentile(&mut sorted, 90.0);
    let min = sorted.first().copied().unwrap_or(0.0);
    let max = sorted.last().copied().unwrap_or(0.0);

    SimulationResult {
        mean,
        median,
        p10,
        p90,
        min,
        max,
        success_probability,
        trial_count,
        seed,
        scenarios,
    }
}

struct MonthlyAccumulator {
    months: Vec<u32>,
    values: Vec<Vec<f64>>,
}

impl MonthlyAccumulator {
    fn new(horizon_months: u32, expected_samples: usize) -> Self {
        Self {
            months: (1..=horizon_months).collect(),
            values: (0..horizon_months)
                .map(|_| Vec::with_capacity(expected_samples))
                .collect(),
        }
    }

    fn push(&mut self, index: usize, value: f64) {
        self.values[index].push(value);
    }

    fn into_bands(mut self) -> Vec<MonthlyBand> {
        let mut bands = Vec::with_capacity(self.months.len());
        for idx in 0..self.months.len() {
            bands.push(MonthlyBand {
                month: self.months[idx],
                p10: percentile(&mut self.values[idx], 10.0),
                median: percentile(&mut self.values[idx], 50.0),
                p90: percentile(&mut self.values[idx], 90.0),
            });
        }
        bands
    }
}

fn derive_seed(base_seed: u64, trial: u32) -> u64 {
    splitmix64(base_seed ^ trial as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Linear interpolation between closest ranks. Sorts `values` in place.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sip::future_value_with_lump_sum;
    use crate::core::types::ContributionPlan;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_config() -> SimulationConfig {
        SimulationConfig::new(12_000.0, 1_000_000.0, 60, 0.12, 0.15)
            .with_trials(400)
            .with_seed(7)
    }

    #[test]
    fn percentile_interpolates_between_points() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_close(percentile(&mut values, 25.0), 1.75, 1e-12);
        assert_close(percentile(&mut values, 50.0), 2.5, 1e-12);
        assert_eq!(percentile(&mut values, 0.0), 1.0);
        assert_eq!(percentile(&mut values, 100.0), 4.0);
        assert_eq!(percentile(&mut [], 50.0), 0.0);
    }

    #[test]
    fn derive_seed_changes_per_trial() {
        let a = derive_seed(42, 0);
        let b = derive_seed(42, 1);
        let c = derive_seed(43, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn success_probability_counts_hits_at_or_above_target() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(success_probability(&values, 25.0), 0.5);
        assert_eq!(success_probability(&values, 10.0), 1.0);
        assert_eq!(success_probability(&values, 41.0), 0.0);
        assert_eq!(success_probability(&[], 1.0), 0.0);
    }

    #[test]
    fn zero_volatility_matches_deterministic_annuity_due() {
        let config = SimulationConfig::new(5_000.0, 500_000.0, 120, 0.12, 0.0)
            .with_trials(16)
            .with_initial_amount(20_000.0)
            .with_seed(1);
        let result = simulate_goal(&config).expect("valid config");

        let plan = ContributionPlan::from_periods(5_000.0, 12.0, 12, 120)
            .expect("valid plan")
            .with_timing(ContributionTiming::Beginning);
        let expected = future_value_with_lump_sum(20_000.0, &plan);

        let tol = expected * 1e-9;
        assert_close(result.mean, expected, tol);
        assert_close(result.median, expected, tol);
        assert_close(result.p10, expected, tol);
        assert_close(result.p90, expected, tol);
        assert_eq!(result.min, result.max);
        assert_eq!(result.success_probability, 1.0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let config = sample_config();
        let first = simulate_goal(&config).expect("valid");
        let second = simulate_goal(&config).expect("valid");
        assert_eq!(first, second);
        assert_eq!(first.seed, 7);

        let other = simulate_goal(&config.with_seed(8)).expect("valid");
        assert_ne!(first.scenarios, other.scenarios);
    }

    #[test]
    fn unseeded_run_echoes_replayable_seed() {
        let config = SimulationConfig::new(1_000.0, 50_000.0, 24, 0.08, 0.2).with_trials(50);
        let first = simulate_goal(&config).expect("valid");
        let replay = simulate_goal(&config.with_seed(first.seed)).expect("valid");
        assert_eq!(first, replay);
    }

    #[test]
    fn parallel_run_matches_serial_walk() {
        let config = sample_config().with_trials(32);
        let result = simulate_goal(&config).expect("valid");
        let monthly = monthly_distribution(&config).expect("valid");
        let serial: Vec<f64> = (0..config.trial_count)
            .map(|trial| {
                let mut rng = StdRng::seed_from_u64(derive_seed(7, trial));
                run_trial(&config, &monthly, &mut rng, |_, _| {})
            })
            .collect();
        assert_eq!(result.scenarios, serial);
    }

    #[test]
    fn result_statistics_are_ordered_and_sample_is_capped() {
        let result = simulate_goal(&sample_config()).expect("valid");
        assert_eq!(result.trial_count, 400);
        assert_eq!(result.scenarios.len(), SCENARIO_SAMPLE_SIZE);
        assert!(result.min >= 0.0);
        assert!(result.min <= result.p10);
        assert!(result.p10 <= result.median);
        assert!(result.median <= result.p90);
        assert!(result.p90 <= result.max);
        assert!((0.0..=1.0).contains(&result.success_probability));
    }

    #[test]
    fn small_runs_return_every_scenario() {
        let result = simulate_goal(&sample_config().with_trials(5)).expect("valid");
        assert_eq!(result.scenarios.len(), 5);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let base = sample_config();
        let cases = [
            SimulationConfig {
                horizon_months: 0,
                ..base
            },
            SimulationConfig {
                trial_count: 0,
                ..base
            },
            SimulationConfig {
                monthly_contribution: -1.0,
                ..base
            },
            SimulationConfig {
                target_amount: 0.0,
                ..base
            },
            SimulationConfig {
                annual_volatility: -0.1,
                ..base
            },
            SimulationConfig {
                expected_annual_return: f64::NAN,
                ..base
            },
            SimulationConfig {
                initial_amount: f64::INFINITY,
                ..base
            },
        ];
        for config in cases {
            assert!(matches!(
                simulate_goal(&config),
                Err(EngineError::Validation(_))
            ));
            assert!(matches!(
                simulate_monthly_bands(&config),
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[test]
    fn horizon_is_capped_at_one_hundred_years() {
        let at_cap = SimulationConfig {
            horizon_months: MAX_HORIZON_MONTHS,
            ..sample_config().with_trials(2)
        };
        assert!(validate_config(&at_cap).is_ok());

        for horizon in [MAX_HORIZON_MONTHS + 1, 1_000_000_000, u32::MAX] {
            let config = SimulationConfig {
                horizon_months: horizon,
                ..at_cap
            };
            assert!(matches!(
                simulate_goal(&config),
                Err(EngineError::Validation(_))
            ));
            assert!(matches!(
                simulate_monthly_bands(&config),
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[test]
    fn heavy_losses_are_floored_at_zero() {
        let config = SimulationConfig::new(0.0, 1.0, 36, -3.0, 2.0)
            .with_trials(64)
            .with_initial_amount(1_000.0)
            .with_seed(3);
        let result = simulate_goal(&config).expect("valid");
        assert!(result.min >= 0.0);
        assert!(result.scenarios.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn monthly_bands_cover_horizon_and_end_at_terminal_stats() {
        let config = sample_config().with_trials(200);
        let bands = simulate_monthly_bands(&config).expect("valid");
        assert_eq!(bands.len(), 60);
        assert_eq!(bands[0].month, 1);
        assert_eq!(bands[59].month, 60);
        for band in &bands {
            assert!(band.p10 <= band.median && band.median <= band.p90);
        }

        let terminal = simulate_goal(&config).expect("valid");
        let last = bands.last().expect("non-empty");
        assert_eq!(last.median, terminal.median);
        assert_eq!(last.p10, terminal.p10);
        assert_eq!(last.p90, terminal.p90);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(24))]

        #[test]
        fn prop_success_probability_falls_as_target_rises(
            seed in 0u64..1_000,
            target in 100_000.0f64..2_000_000.0,
        ) {
            let config = SimulationConfig::new(10_000.0, target, 48, 0.1, 0.2)
                .with_trials(100)
                .with_seed(seed);
            let low = simulate_goal(&config).expect("valid");
            let high = simulate_goal(&SimulationConfig {
                target_amount: target * 1.5,
                ..config
            })
            .expect("valid");
            prop_assert!(high.success_probability <= low.success_probability);
            prop_assert!(low.p10 <= low.p90);
        }
    }
}
