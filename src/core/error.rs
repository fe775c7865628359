use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Malformed or out-of-range input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Operation is mathematically undefined for the given inputs.
    #[error("undefined calculation: {0}")]
    Domain(String),

    /// Goal cannot be met within the bounded search horizon.
    #[error("goal unreachable: {0}")]
    UnreachableGoal(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        EngineError::Domain(msg.into())
    }

    pub fn unreachable(msg: impl Into<String>) -> Self {
        EngineError::UnreachableGoal(msg.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

pub(crate) fn require_finite(name: &str, value: f64) -> EngineResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::validation(format!("{name} must be a finite number")))
    }
}

pub(crate) fn require_positive(name: &str, value: f64) -> EngineResult<f64> {
    require_finite(name, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::validation(format!("{name} must be > 0")))
    }
}

pub(crate) fn require_non_negative(name: &str, value: f64) -> EngineResult<f64> {
    require_finite(name, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::validation(format!("{name} must be >= 0")))
    }
}

pub(crate) fn require_percent(name: &str, value: f64) -> EngineResult<f64> {
    require_finite(name, value)?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(EngineError::validation(format!(
            "{name} must be between 0 and 100"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = EngineError::validation("trial_count must be > 0");
        assert_eq!(err.to_string(), "invalid input: trial_count must be > 0");

        let err = EngineError::unreachable("contribution is zero");
        assert!(err.to_string().starts_with("goal unreachable"));
    }

    #[test]
    fn guards_reject_non_finite_and_out_of_range() {
        assert!(require_positive("x", 0.0).is_err());
        assert!(require_positive("x", f64::NAN).is_err());
        assert!(require_non_negative("x", -1e-9).is_err());
        assert_eq!(require_non_negative("x", 0.0), Ok(0.0));
        assert!(require_percent("rate", 100.5).is_err());
        assert_eq!(require_percent("rate", 100.0), Ok(100.0));
    }
}
