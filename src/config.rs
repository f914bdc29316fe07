use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::bet::BetOutcome;
use crate::kelly::{ConfidenceScale, RiskSettings, QUARTER_KELLY};

/// Persisted bankroll configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankrollSettings {
    pub starting_bankroll: f64,
    pub current_bankroll: f64,
    pub risk: RiskSettings,
    pub confidence_scale: ConfidenceScale,
    /// One betting unit in currency
    pub unit_size: f64,
    /// Drawdown (percent of starting bankroll) at which betting should stop
    pub stop_loss_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for BankrollSettings {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            starting_bankroll: 1000.0,
            current_bankroll: 1000.0,
            risk: RiskSettings {
                kelly_multiplier: QUARTER_KELLY,
                max_stake_fraction: 0.05,
                min_stake: 5.0,
                max_stake: None,
            },
            confidence_scale: ConfidenceScale::default(),
            unit_size: 50.0,
            stop_loss_percent: 25.0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl BankrollSettings {
    /// Fresh settings for a new bankroll of `amount`.
    pub fn with_bankroll(amount: f64) -> Self {
        Self {
            starting_bankroll: amount,
            current_bankroll: amount,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.starting_bankroll.is_finite() || self.starting_bankroll < 0.0 {
            anyhow::bail!("starting_bankroll must be a non-negative number");
        }
        if !self.current_bankroll.is_finite() || self.current_bankroll < 0.0 {
            anyhow::bail!("current_bankroll must be a non-negative number");
        }
        if !self.unit_size.is_finite() || self.unit_size <= 0.0 {
            anyhow::bail!("unit_size must be positive");
        }
        if !(0.0..=100.0).contains(&self.stop_loss_percent) {
            anyhow::bail!("stop_loss_percent must be between 0 and 100");
        }
        self.risk.validate()?;
        self.confidence_scale.validate()?;
        Ok(())
    }
}

/// Sports betting bankroll calculator
#[derive(Parser, Debug, Clone)]
#[command(name = "bankroll", version, about)]
pub struct Config {
    /// SQLite database holding bankroll settings and bet history
    #[arg(long, env = "BANKROLL_DATABASE_PATH", default_value = "bankroll.db")]
    pub database_path: String,

    /// Seed for simulations (fixed seeds give reproducible numbers)
    #[arg(long, env = "BANKROLL_SEED", default_value = "42")]
    pub seed: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert American odds to decimal odds and implied probability
    Convert {
        #[arg(allow_negative_numbers = true)]
        american: i32,
    },
    /// Kelly analysis for a single bet
    Kelly {
        /// Estimated win probability (0.0–1.0)
        probability: f64,
        /// American odds, e.g. -110 or 150
        #[arg(allow_negative_numbers = true)]
        american: i32,
        /// Kelly multiplier (1.0 full, 0.5 half, 0.25 quarter)
        #[arg(long, default_value = "1.0")]
        multiplier: f64,
    },
    /// Recommended stake from a 0–100 confidence score using saved settings
    Size {
        confidence: f64,
        #[arg(allow_negative_numbers = true)]
        american: i32,
    },
    /// Monte Carlo risk of ruin for fixed-fraction betting
    Ruin {
        probability: f64,
        #[arg(allow_negative_numbers = true)]
        american: i32,
        /// Fraction of bankroll staked per bet
        #[arg(long, default_value = "0.05")]
        fraction: f64,
        /// Drawdown from peak that counts as ruin
        #[arg(long, default_value = "0.5")]
        drawdown: f64,
        #[arg(long, default_value = "1000")]
        horizon: usize,
        #[arg(long, default_value = "10000")]
        trials: usize,
    },
    /// Simulate bankroll paths and summarise final outcomes
    Simulate {
        probability: f64,
        #[arg(allow_negative_numbers = true)]
        american: i32,
        #[arg(long, default_value = "0.02")]
        fraction: f64,
        #[arg(long, default_value = "1000")]
        bankroll: f64,
        #[arg(long, default_value = "500")]
        bets: usize,
        #[arg(long, default_value = "1000")]
        paths: usize,
    },
    /// Record a new pending bet
    Record {
        stake: f64,
        #[arg(allow_negative_numbers = true)]
        american: i32,
        #[arg(long)]
        selection: Option<String>,
        #[arg(long)]
        sport: Option<String>,
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Settle a pending bet
    Grade {
        id: String,
        /// win | loss | push
        outcome: BetOutcome,
    },
    /// Import bets from a JSON file (array of bets; missing fields use defaults)
    Import { path: String },
    /// Show the most recent bets
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Bankroll statistics
    Stats,
    /// Reset the bankroll to a new starting amount
    Reset { bankroll: f64 },
}
