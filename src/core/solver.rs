use log::debug;

use super::error::{
    EngineError, EngineResult, require_finite, require_non_negative, require_percent,
    require_positive,
};
use super::sip::{future_value_of_series, projection_step, required_contribution, series_factor};
use super::types::{
    ContributionPlan, ContributionTiming, GoalAnalysis, GoalTarget, MAX_HORIZON_MONTHS,
    RecommendedAction,
};

/// Smallest number of monthly contributions whose value meets `target_amount`.
pub fn months_to_goal(
    target_amount: f64,
    monthly_contribution: f64,
    annual_rate_percent: f64,
) -> EngineResult<u32> {
    months_to_goal_with_savings(0.0, target_amount, monthly_contribution, annual_rate_percent)
}

/// Like [`months_to_goal`], with existing savings compounding at the same rate.
pub fn months_to_goal_with_savings(
    current_amount: f64,
    target_amount: f64,
    monthly_contribution: f64,
    annual_rate_percent: f64,
) -> EngineResult<u32> {
    require_non_negative("current_amount", current_amount)?;
    require_positive("target_amount", target_amount)?;
    require_finite("monthly_contribution", monthly_contribution)?;
    require_percent("annual_rate_percent", annual_rate_percent)?;

    if current_amount >= target_amount {
        return Ok(0);
    }

    let i = annual_rate_percent / 100.0 / 12.0;
    if monthly_contribution < 0.0 {
        return Err(EngineError::unreachable(
            "monthly contribution is negative",
        ));
    }
    if monthly_contribution == 0.0 && (i == 0.0 || current_amount == 0.0) {
        return Err(EngineError::unreachable(
            "nothing is invested and nothing grows; the target is never reached",
        ));
    }

    let estimate = if i == 0.0 {
        (target_amount - current_amount) / monthly_contribution
    } else {
        // Solve current*(1+i)^n + c*((1+i)^n - 1)/i = target for n.
        let annuity_floor = monthly_contribution / i;
        ((target_amount + annuity_floor) / (current_amount + annuity_floor)).ln() / i.ln_1p()
    };

    let solved = settle_periods(estimate, current_amount, monthly_contribution, i, target_amount)?;
    debug!(
        "months_to_goal: target={target_amount} contribution={monthly_contribution} rate={annual_rate_percent}% -> {solved}"
    );
    Ok(solved)
}

fn balance_after(initial: f64, contribution: f64, periodic_rate: f64, periods: u32) -> f64 {
    let growth = (periods as f64 * periodic_rate.ln_1p()).exp();
    initial * growth + contribution * series_factor(periodic_rate, periods, ContributionTiming::End)
}

/// Rounds a closed-form period estimate to the exact smallest integer horizon.
fn settle_periods(
    estimate: f64,
    initial: f64,
    contribution: f64,
    periodic_rate: f64,
    target: f64,
) -> EngineResult<u32> {
    if !estimate.is_finite() || estimate < 0.0 {
        debug!("closed-form horizon {estimate} is unusable; falling back to bounded search");
        return search_periods(initial, contribution, periodic_rate, target);
    }

    let ceiling = estimate.ceil();
    if ceiling > (MAX_HORIZON_MONTHS + 1) as f64 {
        return Err(unreachable_within_cap());
    }

    let reaches = |n: u32| balance_after(initial, contribution, periodic_rate, n) >= target;
    let mut n = (ceiling as u32).max(1);
    while n > 1 && reaches(n - 1) {
        n -= 1;
    }
    while !reaches(n) {
        n += 1;
        if n > MAX_HORIZON_MONTHS {
            return Err(unreachable_within_cap());
        }
    }

    if n > MAX_HORIZON_MONTHS {
        return Err(unreachable_within_cap());
    }
    Ok(n)
}

fn search_periods(
    initial: f64,
    contribution: f64,
    periodic_rate: f64,
    target: f64,
) -> EngineResult<u32> {
    let mut value = initial;
    for month in 1..=MAX_HORIZON_MONTHS {
        value = projection_step(value, contribution, periodic_rate, ContributionTiming::End);
        if value >= target {
            return Ok(month);
        }
    }
    Err(unreachable_within_cap())
}

fn unreachable_within_cap() -> EngineError {
    EngineError::unreachable(format!(
        "target is not reached within {} months ({} years)",
        MAX_HORIZON_MONTHS,
        MAX_HORIZON_MONTHS / 12
    ))
}

/// Fixed-horizon shortfall analysis for a monthly SIP.
pub fn analyze_goal(
    goal_amount: f64,
    years: f64,
    monthly_sip: f64,
    annual_rate_percent: f64,
) -> EngineResult<GoalAnalysis> {
    let target = GoalTarget::new(goal_amount)?;
    require_positive("years", years)?;
    let months = (years * 12.0).round();
    if months < 1.0 || months > u32::MAX as f64 {
        return Err(EngineError::validation(
            "years must cover at least one month",
        ));
    }
    let months = months as u32;

    let plan = ContributionPlan::from_periods(monthly_sip, annual_rate_percent, 12, months)?;
    let projected_value = future_value_of_series(&plan);
    let gap = (target.target_amount - projected_value).max(0.0);
    let success_probability = (projected_value / target.target_amount).min(1.0);

    let (recommended_increment, exact_increment, recommended_action) = if gap > 0.0 {
        let exact = required_contribution(
            &GoalTarget::new(gap)?,
            annual_rate_percent,
            12,
            months,
            ContributionTiming::End,
        )?;
        (gap / months as f64, exact, RecommendedAction::IncreaseSip)
    } else {
        (0.0, 0.0, RecommendedAction::MaintainSip)
    };

    let suggestion_text = match recommended_action {
        RecommendedAction::IncreaseSip => format!(
            "At {}/month and {:.1}% annual return you will reach {} in {}. Increase your SIP by {}/month to hit the {} target.",
            format_amount(monthly_sip),
            annual_rate_percent,
            format_amount(projected_value),
            describe_horizon(years),
            format_amount(recommended_increment),
            format_amount(target.target_amount),
        ),
        RecommendedAction::MaintainSip => format!(
            "At {}/month you will reach {}, exceeding your {} goal.",
            format_amount(monthly_sip),
            format_amount(projected_value),
            format_amount(target.target_amount),
        ),
    };

    Ok(GoalAnalysis {
        projected_value,
        gap,
        success_probability,
        recommended_increment,
        exact_increment,
        recommended_action,
        suggestion_text,
    })
}

/// Share of the target already saved, in percent, capped at 100.
pub fn goal_progress(current_amount: f64, target_amount: f64) -> EngineResult<f64> {
    require_non_negative("current_amount", current_amount)?;
    let target = GoalTarget::new(target_amount)?;
    Ok((current_amount / target.target_amount * 100.0).min(100.0))
}

fn describe_horizon(years: f64) -> String {
    if (years - years.round()).abs() < 1e-9 {
        let whole = years.round() as u64;
        if whole == 1 {
            "1 year".to_string()
        } else {
            format!("{whole} years")
        }
    } else {
        format!("{years:.1} years")
    }
}

/// Whole-unit amount with thousands separators, e.g. `1,234,567`.
fn format_amount(value: f64) -> String {
    let rounded = value.round().abs() as u64;
    let digits = rounded.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value.round() < 0.0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
