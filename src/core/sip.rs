use super::error::{
    EngineError, EngineResult, require_non_negative, require_percent, require_positive,
};
use super::types::{
    ContributionPlan, ContributionTiming, GoalTarget, ProjectionPoint, WhatIfAdjustments,
    WhatIfComparison,
};

/// Advances a balance by one period: one contribution and one period of growth.
pub fn projection_step(
    value: f64,
    contribution: f64,
    period_return: f64,
    timing: ContributionTiming,
) -> f64 {
    match timing {
        ContributionTiming::Beginning => (value + contribution) * (1.0 + period_return),
        ContributionTiming::End => value * (1.0 + period_return) + contribution,
    }
}

/// Future value of one unit contributed every period for `periods` periods.
pub(crate) fn series_factor(periodic_rate: f64, periods: u32, timing: ContributionTiming) -> f64 {
    let n = periods as f64;
    if periodic_rate == 0.0 {
        return n;
    }

    // (1+i)^n - 1 without cancellation for small i.
    let ordinary = (n * periodic_rate.ln_1p()).exp_m1() / periodic_rate;
    match timing {
        ContributionTiming::End => ordinary,
        ContributionTiming::Beginning => ordinary * (1.0 + periodic_rate),
    }
}

pub fn future_value_of_series(plan: &ContributionPlan) -> f64 {
    plan.periodic_amount * series_factor(plan.periodic_rate(), plan.duration_periods, plan.timing)
}

/// Level contribution whose series reaches `target` after `duration_periods`.
pub fn required_contribution(
    target: &GoalTarget,
    annual_rate: f64,
    periods_per_year: u32,
    duration_periods: u32,
    timing: ContributionTiming,
) -> EngineResult<f64> {
    require_percent("annual_rate", annual_rate)?;
    if !(1..=12).contains(&periods_per_year) {
        return Err(EngineError::validation(
            "periods_per_year must be between 1 and 12",
        ));
    }
    if duration_periods == 0 {
        return Err(EngineError::validation("duration_periods must be > 0"));
    }

    let periodic_rate = annual_rate / 100.0 / periods_per_year as f64;
    Ok(target.target_amount / series_factor(periodic_rate, duration_periods, timing))
}

pub fn future_value_with_lump_sum(initial_amount: f64, plan: &ContributionPlan) -> f64 {
    let i = plan.periodic_rate();
    let n = plan.duration_periods as f64;
    initial_amount * (n * i.ln_1p()).exp() + future_value_of_series(plan)
}

/// Balance after every period, starting from `initial_amount`.
pub fn projection_schedule(initial_amount: f64, plan: &ContributionPlan) -> Vec<ProjectionPoint> {
    let i = plan.periodic_rate();
    let mut value = initial_amount;
    let mut contributed = initial_amount;
    let mut points = Vec::with_capacity(plan.duration_periods as usize);

    for period in 1..=plan.duration_periods {
        value = projection_step(value, plan.periodic_amount, i, plan.timing);
        contributed += plan.periodic_amount;
        points.push(ProjectionPoint {
            period,
            contributed,
            value,
        });
    }
    points
}

/// Plan for a monthly SIP amount spread evenly over the compounding periods
/// of each year.
pub fn monthly_sip_plan(
    monthly_amount: f64,
    annual_rate_percent: f64,
    years: u32,
    periods_per_year: u32,
    timing: ContributionTiming,
) -> EngineResult<ContributionPlan> {
    if !(1..=12).contains(&periods_per_year) {
        return Err(EngineError::validation(
            "periods_per_year must be between 1 and 12",
        ));
    }
    require_positive("monthly_amount", monthly_amount)?;
    let periodic_amount = monthly_amount * 12.0 / periods_per_year as f64;
    Ok(
        ContributionPlan::new(periodic_amount, annual_rate_percent, periods_per_year, years)?
            .with_timing(timing),
    )
}

/// Future value of a monthly SIP contributed at the end of each period.
pub fn project_sip(
    monthly_amount: f64,
    annual_rate_percent: f64,
    years: u32,
    periods_per_year: u32,
) -> EngineResult<f64> {
    let plan = monthly_sip_plan(
        monthly_amount,
        annual_rate_percent,
        years,
        periods_per_year,
        ContributionTiming::End,
    )?;
    Ok(future_value_of_series(&plan))
}

pub fn what_if(
    plan: &ContributionPlan,
    adjustments: WhatIfAdjustments,
) -> EngineResult<WhatIfComparison> {
    require_non_negative("extra_contribution", adjustments.extra_contribution)?;
    let adjusted = ContributionPlan::from_periods(
        plan.periodic_amount + adjustments.extra_contribution,
        plan.annual_rate + adjustments.rate_increase,
        plan.periods_per_year,
        plan.duration_periods,
    )?
    .with_timing(plan.timing);

    let baseline_value = future_value_of_series(plan);
    let adjusted_value = future_value_of_series(&adjusted);
    Ok(WhatIfComparison {
        baseline_value,
        adjusted_value,
        difference: adjusted_value - baseline_value,
    })
}
