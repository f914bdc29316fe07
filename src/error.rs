use thiserror::Error;

/// Errors raised by the bankroll math and bet lifecycle functions.
///
/// Every variant is produced synchronously at the point of computation.
/// Nothing here is transient, so callers should surface these rather than retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BankrollError {
    /// Odds outside their convention (|American| < 100, decimal < 1.0).
    #[error("invalid odds: {0}")]
    InvalidOdds(String),

    /// Probability outside [0, 1].
    #[error("invalid probability: {0} (must be between 0 and 1)")]
    InvalidProbability(f64),

    /// Degenerate payout, e.g. decimal odds of exactly 1.0.
    #[error("division by zero: {0}")]
    DivideByZero(String),

    /// NaN, infinite or negative where a finite non-negative value is required.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Attempt to settle a bet that has already been settled.
    #[error("bet {0} has already been graded")]
    AlreadyGraded(String),

    #[error("bet {0} not found in history")]
    BetNotFound(String),
}

pub type Result<T> = std::result::Result<T, BankrollError>;

/// Reject NaN and infinities, naming the offending field.
pub fn ensure_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BankrollError::InvalidInput(format!(
            "{} must be a finite number, got {}",
            name, value
        )))
    }
}

/// Finite and >= 0.
pub fn ensure_non_negative(name: &str, value: f64) -> Result<f64> {
    let value = ensure_finite(name, value)?;
    if value < 0.0 {
        return Err(BankrollError::InvalidInput(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(value)
}

/// A probability must be finite and lie in [0, 1].
pub fn ensure_probability(value: f64) -> Result<f64> {
    if value.is_nan() {
        return Err(BankrollError::InvalidInput(
            "probability must not be NaN".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(BankrollError::InvalidProbability(value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_finite_rejects_nan_and_infinity() {
        assert!(matches!(
            ensure_finite("stake", f64::NAN),
            Err(BankrollError::InvalidInput(_))
        ));
        assert!(matches!(
            ensure_finite("stake", f64::INFINITY),
            Err(BankrollError::InvalidInput(_))
        ));
        assert_eq!(ensure_finite("stake", 1.5), Ok(1.5));
    }

    #[test]
    fn test_ensure_non_negative() {
        assert_eq!(ensure_non_negative("bankroll", 0.0), Ok(0.0));
        assert!(matches!(
            ensure_non_negative("bankroll", -0.01),
            Err(BankrollError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ensure_probability_bounds() {
        assert_eq!(ensure_probability(0.0), Ok(0.0));
        assert_eq!(ensure_probability(1.0), Ok(1.0));
        assert_eq!(
            ensure_probability(1.1),
            Err(BankrollError::InvalidProbability(1.1))
        );
        assert_eq!(
            ensure_probability(-0.1),
            Err(BankrollError::InvalidProbability(-0.1))
        );
        assert!(matches!(
            ensure_probability(f64::NAN),
            Err(BankrollError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_error_display() {
        let err = BankrollError::AlreadyGraded("bet_1".into());
        assert_eq!(err.to_string(), "bet bet_1 has already been graded");
    }
}
