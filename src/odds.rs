//! Odds conversion between the American and Decimal conventions.
//!
//!   American +150  → Decimal 2.50  → implied 40.0%
//!   American -110  → Decimal 1.909 → implied 52.4%
//!
//! American odds must have magnitude >= 100: a positive price is the profit on a
//! 100-unit stake, a negative price is the stake needed to profit 100 units.
//! Decimal odds are the total return per unit staked (stake included).

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ensure_probability, BankrollError, Result};

/// A betting price in either convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "lowercase")]
pub enum Odds {
    American(i32),
    Decimal(f64),
}

impl Odds {
    /// Decimal representation of this price.
    pub fn to_decimal(self) -> Result<f64> {
        match self {
            Odds::American(american) => american_to_decimal(american),
            Odds::Decimal(decimal) => validate_decimal(decimal),
        }
    }

    /// American representation (rounded to the nearest whole price for decimals).
    pub fn to_american(self) -> Result<i32> {
        match self {
            Odds::American(american) => {
                american_to_decimal(american)?;
                Ok(american)
            }
            Odds::Decimal(decimal) => decimal_to_american(decimal),
        }
    }

    pub fn implied_probability(self) -> Result<f64> {
        decimal_to_implied_probability(self.to_decimal()?)
    }
}

impl std::fmt::Display for Odds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Odds::American(a) if *a > 0 => write!(f, "+{}", a),
            Odds::American(a) => write!(f, "{}", a),
            Odds::Decimal(d) => write!(f, "{:.3}", d),
        }
    }
}

/// Convert American odds to decimal odds.
///
/// `+150 → 2.5`, `-200 → 1.5`, `±100 → 2.0`. Prices strictly between -100 and
/// +100 (including 0) do not exist in the American convention.
pub fn american_to_decimal(american: i32) -> Result<f64> {
    if american >= 100 {
        Ok(1.0 + american as f64 / 100.0)
    } else if american <= -100 {
        Ok(1.0 + 100.0 / (american as f64).abs())
    } else {
        Err(BankrollError::InvalidOdds(format!(
            "American odds must have magnitude >= 100, got {}",
            american
        )))
    }
}

/// Convert decimal odds to American odds, rounded to the nearest whole price.
pub fn decimal_to_american(decimal: f64) -> Result<i32> {
    let decimal = ensure_finite("decimal odds", decimal)?;
    if decimal <= 1.0 {
        return Err(BankrollError::InvalidOdds(format!(
            "decimal odds must exceed 1.0 to express as American, got {}",
            decimal
        )));
    }
    let net = decimal - 1.0;
    let american = if decimal >= 2.0 {
        (net * 100.0).round()
    } else {
        (-100.0 / net).round()
    };
    if american.abs() > i32::MAX as f64 {
        return Err(BankrollError::InvalidOdds(format!(
            "decimal odds {} are out of the representable American range",
            decimal
        )));
    }
    Ok(american as i32)
}

/// Implied probability of a decimal price: `1 / decimal`.
///
/// Fails for prices at or below 1.0, which carry no positive payoff.
pub fn decimal_to_implied_probability(decimal: f64) -> Result<f64> {
    let decimal = ensure_finite("decimal odds", decimal)?;
    if decimal <= 1.0 {
        return Err(BankrollError::InvalidOdds(format!(
            "decimal odds must exceed 1.0, got {}",
            decimal
        )));
    }
    Ok(1.0 / decimal)
}

/// Implied probability of an American price.
pub fn american_to_implied_probability(american: i32) -> Result<f64> {
    decimal_to_implied_probability(american_to_decimal(american)?)
}

/// Win rate needed to break even at this price. Includes the bookmaker's vig.
pub fn break_even_probability(american: i32) -> Result<f64> {
    american_to_implied_probability(american)
}

/// Edge = estimated win probability − implied probability of the price.
pub fn edge(win_probability: f64, decimal: f64) -> Result<f64> {
    let p = ensure_probability(win_probability)?;
    Ok(p - decimal_to_implied_probability(decimal)?)
}

/// Expected profit per unit staked: `p·b − q`.
pub fn expected_value(win_probability: f64, decimal: f64) -> Result<f64> {
    let p = ensure_probability(win_probability)?;
    let decimal = validate_decimal(decimal)?;
    let b = decimal - 1.0;
    Ok(p * b - (1.0 - p))
}

/// Decimal odds must be finite and at least 1.0 (1.0 = stake returned, no profit).
pub(crate) fn validate_decimal(decimal: f64) -> Result<f64> {
    let decimal = ensure_finite("decimal odds", decimal)?;
    if decimal < 1.0 {
        return Err(BankrollError::InvalidOdds(format!(
            "decimal odds must be >= 1.0, got {}",
            decimal
        )));
    }
    Ok(decimal)
}
