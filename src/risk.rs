//! Risk metrics for fixed-fraction betting.
//!
//! Growth law for a bet of fraction `f` at net odds `b`:
//!   win  → bankroll × (1 + f·b)
//!   loss → bankroll × (1 − f)
//!
//! Risk of ruin is estimated by seeded Monte Carlo. With `n` trials the
//! estimate carries a standard error of √(p(1−p)/n), reported alongside the
//! probability so callers can assert with a matching tolerance. A closed-form
//! approximation is kept for quick what-if numbers.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ensure_probability, BankrollError, Result};
use crate::odds::{decimal_to_implied_probability, validate_decimal};

/// Paths ending below this share of the starting bankroll count as busted.
pub const BUST_THRESHOLD: f64 = 0.01;

fn step(bankroll: f64, won: bool, fraction: f64, net_odds: f64) -> f64 {
    if won {
        bankroll * (1.0 + fraction * net_odds)
    } else {
        bankroll * (1.0 - fraction)
    }
}

fn ensure_fraction(fraction: f64) -> Result<f64> {
    let fraction = ensure_non_negative("fraction", fraction)?;
    if fraction > 1.0 {
        return Err(BankrollError::InvalidInput(format!(
            "bet fraction must not exceed 1.0, got {}",
            fraction
        )));
    }
    Ok(fraction)
}

// ── Monte Carlo risk of ruin ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuinParams {
    pub win_probability: f64,
    pub decimal_odds: f64,
    /// Fraction of current bankroll staked on every bet (e.g. a Kelly fraction).
    pub fraction: f64,
    /// Drawdown from the running peak that counts as ruin (0.5 = halved).
    pub target_drawdown: f64,
    /// Bets per trial.
    pub horizon: usize,
    pub trials: usize,
    pub seed: u64,
}

impl Default for RuinParams {
    fn default() -> Self {
        Self {
            win_probability: 0.55,
            decimal_odds: 1.909,
            fraction: 0.05,
            target_drawdown: 0.5,
            horizon: 1_000,
            trials: 10_000,
            seed: 42,
        }
    }
}

impl RuinParams {
    pub fn validate(&self) -> Result<()> {
        ensure_probability(self.win_probability)?;
        validate_decimal(self.decimal_odds)?;
        ensure_fraction(self.fraction)?;
        let dd = ensure_non_negative("target_drawdown", self.target_drawdown)?;
        if dd == 0.0 || dd > 1.0 {
            return Err(BankrollError::InvalidInput(format!(
                "target_drawdown must be in (0, 1], got {}",
                dd
            )));
        }
        if self.trials == 0 {
            return Err(BankrollError::InvalidInput(
                "at least one trial is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuinEstimate {
    pub probability_of_ruin: f64,
    pub ruined_trials: usize,
    pub trials: usize,
    /// Binomial standard error of `probability_of_ruin`
    pub standard_error: f64,
}

/// Estimate the probability that a fixed-fraction bettor suffers a drawdown of
/// `target_drawdown` from their running peak within `horizon` bets.
///
/// Deterministic for a given seed.
pub fn calculate_risk_of_ruin(params: &RuinParams) -> Result<RuinEstimate> {
    params.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let net_odds = params.decimal_odds - 1.0;
    let floor_ratio = 1.0 - params.target_drawdown;
    let mut ruined = 0usize;

    for _ in 0..params.trials {
        let mut bankroll = 1.0f64;
        let mut peak = 1.0f64;
        for _ in 0..params.horizon {
            let won = rng.gen_bool(params.win_probability);
            bankroll = step(bankroll, won, params.fraction, net_odds);
            if bankroll > peak {
                peak = bankroll;
            } else if bankroll <= peak * floor_ratio {
                ruined += 1;
                break;
            }
        }
    }

    let n = params.trials as f64;
    let p = ruined as f64 / n;
    Ok(RuinEstimate {
        probability_of_ruin: p,
        ruined_trials: ruined,
        trials: params.trials,
        standard_error: (p * (1.0 - p) / n).sqrt(),
    })
}

// ── Closed-form approximation ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_probability(ror: f64) -> Self {
        if ror < 0.01 {
            RiskLevel::VeryLow
        } else if ror < 0.05 {
            RiskLevel::Low
        } else if ror < 0.10 {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_of_ruin: f64,
    pub edge: f64,
    pub level: RiskLevel,
}

/// Approximate risk of ruin for flat betting with `bankroll_units` units:
/// `((1 − e) / (1 + e)) ^ units` for edge `e = p − 1/decimal`.
///
/// Assumes an unbounded number of bets, so any non-positive edge is certain ruin.
pub fn closed_form_risk_of_ruin(
    win_probability: f64,
    decimal_odds: f64,
    bankroll_units: f64,
) -> Result<RiskAssessment> {
    let p = ensure_probability(win_probability)?;
    let implied = decimal_to_implied_probability(decimal_odds)?;
    let units = ensure_non_negative("bankroll_units", bankroll_units)?;
    if units == 0.0 {
        return Err(BankrollError::InvalidInput(
            "bankroll_units must be positive".to_string(),
        ));
    }

    let edge = p - implied;
    let ror = if edge <= 0.0 {
        1.0
    } else {
        ((1.0 - edge) / (1.0 + edge)).powf(units)
    };
    Ok(RiskAssessment {
        risk_of_ruin: ror,
        edge,
        level: RiskLevel::from_probability(ror),
    })
}

// ── Bankroll simulation ──────────────────────────────────────────────────────

/// A finite, restartable simulated bankroll trajectory.
///
/// Each call to [`BankrollSimulation::iter`] replays the same sequence from
/// the start; nothing is computed until the iterator is driven.
///
/// Fields are only set through [`simulate_bankroll`] (or deserialization,
/// which runs the same checks), so a simulation never holds an invalid
/// probability or fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SimulationInput")]
pub struct BankrollSimulation {
    starting_bankroll: f64,
    win_probability: f64,
    decimal_odds: f64,
    fraction: f64,
    number_of_bets: usize,
    seed: u64,
}

#[derive(Deserialize)]
struct SimulationInput {
    starting_bankroll: f64,
    win_probability: f64,
    decimal_odds: f64,
    fraction: f64,
    number_of_bets: usize,
    seed: u64,
}

impl TryFrom<SimulationInput> for BankrollSimulation {
    type Error = BankrollError;

    fn try_from(input: SimulationInput) -> Result<Self> {
        simulate_bankroll(
            input.starting_bankroll,
            input.win_probability,
            input.decimal_odds,
            input.fraction,
            input.number_of_bets,
            input.seed,
        )
    }
}

impl BankrollSimulation {
    pub fn starting_bankroll(&self) -> f64 {
        self.starting_bankroll
    }

    pub fn win_probability(&self) -> f64 {
        self.win_probability
    }

    pub fn decimal_odds(&self) -> f64 {
        self.decimal_odds
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn number_of_bets(&self) -> usize {
        self.number_of_bets
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn iter(&self) -> BankrollPath {
        BankrollPath {
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            bankroll: self.starting_bankroll,
            remaining: self.number_of_bets,
            win_probability: self.win_probability,
            net_odds: self.decimal_odds - 1.0,
            fraction: self.fraction,
        }
    }

    /// Same parameters, different random stream.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }

    /// Bankroll after the last bet (the start value when there are no bets).
    pub fn final_bankroll(&self) -> f64 {
        self.iter().last().unwrap_or(self.starting_bankroll)
    }
}

impl<'a> IntoIterator for &'a BankrollSimulation {
    type Item = f64;
    type IntoIter = BankrollPath;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over bankroll levels after each simulated bet.
#[derive(Debug, Clone)]
pub struct BankrollPath {
    rng: ChaCha8Rng,
    bankroll: f64,
    remaining: usize,
    win_probability: f64,
    net_odds: f64,
    fraction: f64,
}

impl Iterator for BankrollPath {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let won = self.rng.gen_bool(self.win_probability);
        self.bankroll = step(self.bankroll, won, self.fraction, self.net_odds);
        Some(self.bankroll)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for BankrollPath {}

/// Build a seeded simulation of `number_of_bets` fixed-fraction bets.
pub fn simulate_bankroll(
    starting_bankroll: f64,
    win_probability: f64,
    decimal_odds: f64,
    fraction: f64,
    number_of_bets: usize,
    seed: u64,
) -> Result<BankrollSimulation> {
    let starting_bankroll = ensure_non_negative("starting bankroll", starting_bankroll)?;
    let win_probability = ensure_probability(win_probability)?;
    let decimal_odds = validate_decimal(decimal_odds)?;
    let fraction = ensure_fraction(fraction)?;
    Ok(BankrollSimulation {
        starting_bankroll,
        win_probability,
        decimal_odds,
        fraction,
        number_of_bets,
        seed,
    })
}

/// Distribution of final bankrolls over many simulated paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDistribution {
    pub paths: usize,
    pub worst: f64,
    pub p5: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub best: f64,
    /// Share of paths finishing below [`BUST_THRESHOLD`] of the start
    pub bust_rate: f64,
}

/// Run `paths` independent copies of `simulation` (seeds `seed, seed+1, …`)
/// and summarise where they finish.
pub fn summarize_outcomes(
    simulation: &BankrollSimulation,
    paths: usize,
) -> Result<OutcomeDistribution> {
    if paths == 0 {
        return Err(BankrollError::InvalidInput(
            "at least one path is required".to_string(),
        ));
    }

    let mut finals: Vec<f64> = (0..paths as u64)
        .map(|i| simulation.with_seed(simulation.seed.wrapping_add(i)).final_bankroll())
        .collect();
    finals.sort_by(|a, b| a.total_cmp(b));

    let percentile = |q: f64| {
        let idx = ((paths as f64 * q).floor() as usize).min(paths - 1);
        finals[idx]
    };
    let bust_line = simulation.starting_bankroll * BUST_THRESHOLD;
    let busted = finals.iter().filter(|b| **b < bust_line).count();

    Ok(OutcomeDistribution {
        paths,
        worst: finals[0],
        p5: percentile(0.05),
        p25: percentile(0.25),
        median: percentile(0.50),
        p75: percentile(0.75),
        p95: percentile(0.95),
        best: finals[paths - 1],
        bust_rate: busted as f64 / paths as f64,
    })
}
