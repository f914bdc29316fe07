//! Bet records, their settlement lifecycle, and pure history transforms.
//!
//! A record is created `Pending` and settled exactly once into `Won`, `Lost`
//! or `Pushed`. Grading a settled record always fails with `AlreadyGraded`.
//! Records are values: every transition returns a new record and history
//! helpers return new collections.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::config::BankrollSettings;
use crate::error::{ensure_finite, ensure_non_negative, BankrollError, Result};
use crate::odds::Odds;

/// Most recent bets kept in the rolling history.
pub const HISTORY_LIMIT: usize = 500;
/// History cap after an import.
pub const IMPORT_HISTORY_LIMIT: usize = 1000;
/// Price assumed for imported bets without odds.
pub const DEFAULT_IMPORT_ODDS: Odds = Odds::American(-110);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Pushed,
}

/// Result used to settle a pending bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    Win,
    Loss,
    Push,
}

impl BetOutcome {
    pub fn status(self) -> BetStatus {
        match self {
            BetOutcome::Win => BetStatus::Won,
            BetOutcome::Loss => BetStatus::Lost,
            BetOutcome::Push => BetStatus::Pushed,
        }
    }
}

impl FromStr for BetOutcome {
    type Err = BankrollError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" | "won" | "w" => Ok(BetOutcome::Win),
            "loss" | "lost" | "l" => Ok(BetOutcome::Loss),
            "push" | "pushed" | "p" => Ok(BetOutcome::Push),
            other => Err(BankrollError::InvalidInput(format!(
                "unknown bet outcome '{}' (expected win, loss or push)",
                other
            ))),
        }
    }
}

/// Input for [`record_bet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBet {
    pub stake: f64,
    pub odds: Odds,
    pub sport: Option<String>,
    pub selection: Option<String>,
    /// Signal confidence (0–100) behind the pick, if any
    pub confidence: Option<f64>,
}

impl NewBet {
    pub fn new(stake: f64, odds: Odds) -> Self {
        Self {
            stake,
            odds,
            sport: None,
            selection: None,
            confidence: None,
        }
    }
}

/// A single bet. Profit is derived from stake, odds and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: String,
    pub placed_at: DateTime<Utc>,
    pub stake: f64,
    pub odds: Odds,
    pub sport: Option<String>,
    pub selection: Option<String>,
    pub confidence: Option<f64>,
    pub status: BetStatus,
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub imported: bool,
}

impl BetRecord {
    pub fn is_settled(&self) -> bool {
        self.status != BetStatus::Pending
    }

    /// Profit or loss of a settled bet, rounded to cents. `None` while pending.
    pub fn profit(&self) -> Result<Option<f64>> {
        let pnl = match self.status {
            BetStatus::Pending => return Ok(None),
            BetStatus::Won => self.stake * (self.odds.to_decimal()? - 1.0),
            BetStatus::Lost => -self.stake,
            BetStatus::Pushed => 0.0,
        };
        Ok(Some(round_cents(pnl)))
    }

    /// Total amount returned to the bettor (stake included). `None` while pending.
    pub fn payout(&self) -> Result<Option<f64>> {
        Ok(self.profit()?.map(|pnl| round_cents(self.stake + pnl)))
    }
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn generate_bet_id(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase();
    format!("{}_{}_{}", prefix, at.timestamp_millis(), suffix)
}

fn validate_stake(stake: f64) -> Result<f64> {
    let stake = ensure_finite("stake", stake)?;
    if stake <= 0.0 {
        return Err(BankrollError::InvalidInput(format!(
            "stake must be positive, got {}",
            stake
        )));
    }
    Ok(stake)
}

fn validate_confidence(confidence: Option<f64>) -> Result<()> {
    if let Some(c) = confidence {
        let c = ensure_finite("confidence", c)?;
        if !(0.0..=100.0).contains(&c) {
            return Err(BankrollError::InvalidInput(format!(
                "confidence must be between 0 and 100, got {}",
                c
            )));
        }
    }
    Ok(())
}

// ── Lifecycle ────────────────────────────────────────────────────────────────

/// Create a new pending record.
pub fn record_bet(bet: NewBet) -> Result<BetRecord> {
    let stake = validate_stake(bet.stake)?;
    bet.odds.to_decimal()?;
    validate_confidence(bet.confidence)?;

    let now = Utc::now();
    Ok(BetRecord {
        id: generate_bet_id("bet", now),
        placed_at: now,
        stake,
        odds: bet.odds,
        sport: bet.sport,
        selection: bet.selection,
        confidence: bet.confidence,
        status: BetStatus::Pending,
        graded_at: None,
        imported: false,
    })
}

/// Settle a pending record, returning the settled copy.
pub fn grade_bet(record: &BetRecord, outcome: BetOutcome) -> Result<BetRecord> {
    if record.is_settled() {
        return Err(BankrollError::AlreadyGraded(record.id.clone()));
    }
    Ok(BetRecord {
        status: outcome.status(),
        graded_at: Some(Utc::now()),
        ..record.clone()
    })
}

/// New bankroll after realising `pnl`, rounded to cents and floored at zero.
pub fn apply_profit(bankroll: f64, pnl: f64) -> Result<f64> {
    let bankroll = ensure_non_negative("bankroll", bankroll)?;
    let pnl = ensure_finite("pnl", pnl)?;
    Ok(round_cents(bankroll + pnl).max(0.0))
}

// ── History transforms ───────────────────────────────────────────────────────

/// Append `bet`, keeping only the newest [`HISTORY_LIMIT`] records.
pub fn append_bet(history: &[BetRecord], bet: BetRecord) -> Vec<BetRecord> {
    let keep_from = (history.len() + 1).saturating_sub(HISTORY_LIMIT);
    let mut next: Vec<BetRecord> = history.iter().skip(keep_from).cloned().collect();
    next.push(bet);
    next
}

pub fn find_bet<'a>(history: &'a [BetRecord], id: &str) -> Result<&'a BetRecord> {
    history
        .iter()
        .find(|b| b.id == id)
        .ok_or_else(|| BankrollError::BetNotFound(id.to_string()))
}

/// Replace the record with the same id as `updated`.
pub fn replace_bet(history: &[BetRecord], updated: BetRecord) -> Result<Vec<BetRecord>> {
    let idx = history
        .iter()
        .position(|b| b.id == updated.id)
        .ok_or_else(|| BankrollError::BetNotFound(updated.id.clone()))?;
    let mut next = history.to_vec();
    next[idx] = updated;
    Ok(next)
}

/// Newest first, at most `limit` records.
pub fn recent_bets(history: &[BetRecord], limit: usize) -> Vec<&BetRecord> {
    history.iter().rev().take(limit).collect()
}

/// A bet from an external source (CSV export, another tracker). Missing fields
/// fall back to sensible defaults during import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportedBet {
    pub id: Option<String>,
    pub placed_at: Option<DateTime<Utc>>,
    pub stake: Option<f64>,
    pub odds: Option<Odds>,
    pub sport: Option<String>,
    pub selection: Option<String>,
    pub confidence: Option<f64>,
    pub result: Option<BetOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub history: Vec<BetRecord>,
    pub imported: usize,
    /// Bets whose id is already in the history (or repeated in the batch)
    pub skipped: usize,
    /// Sum of P/L over imported settled bets, to be applied to the bankroll
    pub pnl_adjustment: f64,
}

/// Merge imported bets into `history`: normalise, sort by placement time and
/// keep the newest [`IMPORT_HISTORY_LIMIT`]. Bets whose id is already known
/// are skipped, so re-importing an export is harmless. Nothing is merged if
/// any imported bet is invalid.
pub fn import_bets(
    history: &[BetRecord],
    imported: Vec<ImportedBet>,
    default_stake: f64,
) -> Result<ImportOutcome> {
    let default_stake = validate_stake(default_stake)?;
    let now = Utc::now();

    let mut seen: HashSet<String> = history.iter().map(|b| b.id.clone()).collect();
    let mut normalized = Vec::with_capacity(imported.len());
    let mut skipped = 0;
    let mut pnl_adjustment = 0.0;
    for bet in imported {
        if bet.id.as_ref().is_some_and(|id| seen.contains(id)) {
            skipped += 1;
            continue;
        }
        let stake = validate_stake(bet.stake.unwrap_or(default_stake))?;
        let odds = bet.odds.unwrap_or(DEFAULT_IMPORT_ODDS);
        odds.to_decimal()?;
        validate_confidence(bet.confidence)?;

        let record = BetRecord {
            id: bet.id.unwrap_or_else(|| generate_bet_id("import", now)),
            placed_at: bet.placed_at.unwrap_or(now),
            stake,
            odds,
            sport: bet.sport,
            selection: bet.selection,
            confidence: bet.confidence,
            status: bet.result.map(BetOutcome::status).unwrap_or(BetStatus::Pending),
            graded_at: bet.result.map(|_| now),
            imported: true,
        };
        if let Some(pnl) = record.profit()? {
            pnl_adjustment += pnl;
        }
        seen.insert(record.id.clone());
        normalized.push(record);
    }

    let imported_count = normalized.len();
    let mut merged: Vec<BetRecord> = history.to_vec();
    merged.extend(normalized);
    merged.sort_by_key(|b| b.placed_at);
    let keep_from = merged.len().saturating_sub(IMPORT_HISTORY_LIMIT);
    let merged = merged.split_off(keep_from);

    Ok(ImportOutcome {
        history: merged,
        imported: imported_count,
        skipped,
        pnl_adjustment: round_cents(pnl_adjustment),
    })
}

// ── Statistics ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankrollStats {
    pub starting_bankroll: f64,
    pub current_bankroll: f64,
    pub total_pnl: f64,
    /// Percent of total amount wagered
    pub roi: f64,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    /// Percent of decided (non-push) bets won
    pub win_rate: f64,
    pub total_bets: usize,
    pub pending_bets: usize,
    pub avg_stake: f64,
    /// Largest peak-to-trough drop in percent, replaying settled bets from the start
    pub max_drawdown: f64,
    /// Percent below the starting bankroll
    pub current_drawdown: f64,
    pub stop_loss_triggered: bool,
}

/// Summarise settled bets in `history` (ordered oldest first).
pub fn bankroll_stats(settings: &BankrollSettings, history: &[BetRecord]) -> Result<BankrollStats> {
    let mut wins = 0;
    let mut losses = 0;
    let mut pushes = 0;
    let mut pending = 0;
    let mut total_pnl = 0.0;
    let mut wagered = 0.0;

    let mut running = settings.starting_bankroll;
    let mut peak = settings.starting_bankroll;
    let mut max_drawdown: f64 = 0.0;

    for bet in history {
        let Some(pnl) = bet.profit()? else {
            pending += 1;
            continue;
        };
        match bet.status {
            BetStatus::Won => wins += 1,
            BetStatus::Lost => losses += 1,
            BetStatus::Pushed => pushes += 1,
            BetStatus::Pending => {}
        }
        total_pnl += pnl;
        wagered += bet.stake;

        running += pnl;
        peak = peak.max(running);
        if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - running) / peak * 100.0);
        }
    }

    let graded = wins + losses + pushes;
    let decided = wins + losses;
    let current_drawdown = if settings.starting_bankroll > 0.0 {
        (1.0 - settings.current_bankroll / settings.starting_bankroll) * 100.0
    } else {
        0.0
    };

    Ok(BankrollStats {
        starting_bankroll: settings.starting_bankroll,
        current_bankroll: settings.current_bankroll,
        total_pnl: round_cents(total_pnl),
        roi: if wagered > 0.0 {
            round_cents(total_pnl / wagered * 100.0)
        } else {
            0.0
        },
        wins,
        losses,
        pushes,
        win_rate: if decided > 0 {
            (wins as f64 / decided as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        },
        total_bets: graded,
        pending_bets: pending,
        avg_stake: if graded > 0 {
            round_cents(wagered / graded as f64)
        } else {
            0.0
        },
        max_drawdown: round_cents(max_drawdown),
        current_drawdown: round_cents(current_drawdown),
        stop_loss_triggered: current_drawdown >= settings.stop_loss_percent,
    })
}
