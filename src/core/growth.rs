use super::error::{EngineError, EngineResult, require_finite};

/// `principal * (1 + r/n)^(n*t)` with `r` given in percent.
pub fn compound_future_value(
    principal: f64,
    annual_rate_percent: f64,
    years: f64,
    periods_per_year: u32,
) -> EngineResult<f64> {
    require_finite("principal", principal)?;
    require_finite("annual_rate_percent", annual_rate_percent)?;
    require_finite("years", years)?;
    if periods_per_year == 0 {
        return Err(EngineError::domain("periods_per_year must be > 0"));
    }

    let n = periods_per_year as f64;
    let base = 1.0 + annual_rate_percent / 100.0 / n;
    if base < 0.0 {
        return Err(EngineError::domain(format!(
            "periodic growth factor {base} is negative; rate is below -100% per period"
        )));
    }

    Ok(principal * base.powf(n * years))
}

/// Compound annual growth rate, in percent.
pub fn cagr(beginning_value: f64, ending_value: f64, years: f64) -> EngineResult<f64> {
    require_finite("beginning_value", beginning_value)?;
    require_finite("ending_value", ending_value)?;
    require_finite("years", years)?;
    if beginning_value <= 0.0 {
        return Err(EngineError::domain("CAGR needs a beginning value > 0"));
    }
    if years <= 0.0 {
        return Err(EngineError::domain("CAGR needs a period > 0 years"));
    }
    if ending_value < 0.0 {
        return Err(EngineError::domain(
            "CAGR is undefined for a negative ending value",
        ));
    }

    Ok(((ending_value / beginning_value).powf(1.0 / years) - 1.0) * 100.0)
}

/// Deflates `amount` received after `years` to today's money.
pub fn inflation_adjusted(
    amount: f64,
    annual_inflation_percent: f64,
    years: f64,
) -> EngineResult<f64> {
    require_finite("amount", amount)?;
    require_finite("annual_inflation_percent", annual_inflation_percent)?;
    require_finite("years", years)?;
    let base = 1.0 + annual_inflation_percent / 100.0;
    if base <= 0.0 {
        return Err(EngineError::domain("inflation must be above -100%"));
    }
    Ok(amount / base.powf(years))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn compound_interest_matches_hand_calculation() {
        // 10,000 at 8% compounded quarterly for 5 years.
        let fv = compound_future_value(10_000.0, 8.0, 5.0, 4).expect("defined");
        assert_close(fv, 10_000.0 * 1.02_f64.powi(20), 1e-9);

        let annual = compound_future_value(1_000.0, 10.0, 2.0, 1).expect("defined");
        assert_close(annual, 1_210.0, 1e-9);
    }

    #[test]
    fn compound_interest_with_zero_rate_returns_principal() {
        let fv = compound_future_value(2_500.0, 0.0, 30.0, 12).expect("defined");
        assert_eq!(fv, 2_500.0);
    }

    #[test]
    fn compound_interest_rejects_zero_frequency_and_negative_base() {
        assert!(matches!(
            compound_future_value(1.0, 5.0, 1.0, 0),
            Err(EngineError::Domain(_))
        ));
        assert!(matches!(
            compound_future_value(1.0, -250.0, 1.5, 1),
            Err(EngineError::Domain(_))
        ));
    }

    #[test]
    fn cagr_of_doubling_over_one_year_is_one_hundred_percent() {
        assert_close(cagr(100.0, 200.0, 1.0).expect("defined"), 100.0, 1e-9);
        assert_close(
            cagr(1_000.0, 1_210.0, 2.0).expect("defined"),
            10.0,
            1e-9,
        );
    }

    #[test]
    fn cagr_rejects_non_positive_base_and_period() {
        assert!(matches!(cagr(0.0, 100.0, 1.0), Err(EngineError::Domain(_))));
        assert!(matches!(cagr(-5.0, 100.0, 1.0), Err(EngineError::Domain(_))));
        assert!(matches!(cagr(100.0, 200.0, 0.0), Err(EngineError::Domain(_))));
        assert!(matches!(cagr(100.0, -1.0, 2.0), Err(EngineError::Domain(_))));
    }

    #[test]
    fn inflation_adjustment_deflates_future_money() {
        let real = inflation_adjusted(1_102.5, 5.0, 2.0).expect("defined");
        assert_close(real, 1_000.0, 1e-9);
        assert!(inflation_adjusted(1.0, -100.0, 1.0).is_err());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_cagr_inverts_annual_compounding(
            principal in 1.0f64..1_000_000.0,
            rate in 0.0f64..100.0,
            years in 1u32..40,
        ) {
            let fv = compound_future_value(principal, rate, years as f64, 1).expect("defined");
            let recovered = cagr(principal, fv, years as f64).expect("defined");
            prop_assert!((recovered - rate).abs() <= 1e-6, "rate {rate}, recovered {recovered}");
        }
    }
}
