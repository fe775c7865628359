use super::error::{
    EngineError, EngineResult, require_finite, require_non_negative, require_positive,
};
use super::growth::compound_future_value;
use super::types::{AllocationMap, PortfolioProjection, PortfolioSegment, RateMap};

/// Allowed distance of the allocation total from 100%.
pub const ALLOCATION_TOLERANCE: f64 = 0.1;

/// Risk-free rate (decimal) used by [`risk_adjusted_score`] when none is given.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.04;

pub fn validate_allocation(allocation: &AllocationMap) -> EngineResult<()> {
    if allocation.is_empty() {
        return Err(EngineError::validation("allocation must not be empty"));
    }

    let mut total = 0.0;
    for (label, weight) in allocation {
        if label.trim().is_empty() {
            return Err(EngineError::validation(
                "asset class labels must be non-empty",
            ));
        }
        if !weight.is_finite() || !(0.0..=100.0).contains(weight) {
            return Err(EngineError::validation(format!(
                "allocation for {label} must be between 0 and 100, got {weight}"
            )));
        }
        total += weight;
    }

    if (total - 100.0).abs() > ALLOCATION_TOLERANCE {
        return Err(EngineError::validation(format!(
            "allocation percentages must add up to 100, got {total}"
        )));
    }
    Ok(())
}

fn rate_for<'a>(rates: &'a RateMap, label: &str) -> EngineResult<&'a f64> {
    let rate = rates
        .get(label)
        .ok_or_else(|| EngineError::validation(format!("no annual rate given for {label}")))?;
    if !rate.is_finite() || !(0.0..=100.0).contains(rate) {
        return Err(EngineError::validation(format!(
            "annual rate for {label} must be between 0 and 100, got {rate}"
        )));
    }
    Ok(rate)
}

pub fn project_portfolio_breakdown(
    initial_investment: f64,
    allocation: &AllocationMap,
    rates: &RateMap,
    years: f64,
) -> EngineResult<PortfolioProjection> {
    require_positive("initial_investment", initial_investment)?;
    require_positive("years", years)?;
    validate_allocation(allocation)?;

    let mut segments = Vec::with_capacity(allocation.len());
    let mut total_value = 0.0;
    for (label, weight) in allocation {
        let annual_rate = *rate_for(rates, label)?;
        let initial_value = initial_investment * weight / 100.0;
        let projected_value = compound_future_value(initial_value, annual_rate, years, 1)?;
        total_value += projected_value;
        segments.push(PortfolioSegment {
            asset_class: label.clone(),
            weight: *weight,
            annual_rate,
            initial_value,
            projected_value,
        });
    }

    Ok(PortfolioProjection {
        total_value,
        segments,
    })
}

/// Lump sum split across asset classes, each compounding annually at its own rate.
pub fn project_portfolio(
    initial_investment: f64,
    allocation: &AllocationMap,
    rates: &RateMap,
    years: f64,
) -> EngineResult<f64> {
    project_portfolio_breakdown(initial_investment, allocation, rates, years)
        .map(|projection| projection.total_value)
}

/// Allocation-weighted annual rate, in percent.
pub fn blended_return(allocation: &AllocationMap, rates: &RateMap) -> EngineResult<f64> {
    validate_allocation(allocation)?;
    let mut blended = 0.0;
    for (label, weight) in allocation {
        blended += weight / 100.0 * rate_for(rates, label)?;
    }
    Ok(blended)
}

/// `sqrt(sum_ij w_i w_j s_i s_j rho_ij)`; the diagonal of `correlations` is
/// treated as 1.
pub fn portfolio_volatility(
    weights: &[f64],
    volatilities: &[f64],
    correlations: &[Vec<f64>],
) -> EngineResult<f64> {
    let n = weights.len();
    if n == 0 {
        return Err(EngineError::validation("weights must not be empty"));
    }
    if volatilities.len() != n || correlations.len() != n {
        return Err(EngineError::validation(
            "weights, volatilities and correlations must have matching sizes",
        ));
    }
    for (idx, row) in correlations.iter().enumerate() {
        if row.len() != n {
            return Err(EngineError::validation(format!(
                "correlation row {idx} has {} entries, expected {n}",
                row.len()
            )));
        }
        for &rho in row {
            if !rho.is_finite() || !(-1.0..=1.0).contains(&rho) {
                return Err(EngineError::validation(
                    "correlations must be between -1 and 1",
                ));
            }
        }
    }
    for &w in weights {
        require_finite("weight", w)?;
    }
    for &s in volatilities {
        require_non_negative("volatility", s)?;
    }

    let mut variance = 0.0;
    for i in 0..n {
        for j in 0..n {
            let rho = if i == j { 1.0 } else { correlations[i][j] };
            variance += weights[i] * weights[j] * volatilities[i] * volatilities[j] * rho;
        }
    }
    if variance < 0.0 {
        return Err(EngineError::domain(
            "correlation matrix yields negative variance",
        ));
    }
    Ok(variance.sqrt())
}

/// Excess return per unit of volatility; all inputs are decimals.
pub fn risk_adjusted_score(
    expected_return: f64,
    volatility: f64,
    risk_free_rate: Option<f64>,
) -> EngineResult<f64> {
    require_finite("expected_return", expected_return)?;
    require_positive("volatility", volatility)
        .map_err(|_| EngineError::domain("volatility must be > 0 to score risk"))?;
    let risk_free = require_finite(
        "risk_free_rate",
        risk_free_rate.unwrap_or(DEFAULT_RISK_FREE_RATE),
    )?;
    Ok((expected_return - risk_free) / volatility)
}
