//! Bankroll math for sports betting.
//!
//! Odds conversion, Kelly-criterion stake sizing, risk of ruin and bankroll
//! simulation, plus an immutable bet-record lifecycle persisted through a
//! narrow key-value store.

pub mod bet;
pub mod config;
pub mod error;
pub mod kelly;
pub mod odds;
pub mod risk;
pub mod store;

pub use bet::{grade_bet, record_bet, BetOutcome, BetRecord, BetStatus, NewBet};
pub use config::BankrollSettings;
pub use error::{BankrollError, Result};
pub use kelly::{
    calculate_bet_size, calculate_kelly, confidence_to_win_probability, ConfidenceScale,
    RiskSettings,
};
pub use odds::{
    american_to_decimal, american_to_implied_probability, decimal_to_implied_probability, Odds,
};
pub use risk::{calculate_risk_of_ruin, simulate_bankroll, BankrollSimulation, RuinParams};
pub use store::{BankrollLedger, KeyValueStore, MemoryStore, SqliteStore};
