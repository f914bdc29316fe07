use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::bet::{
    append_bet, apply_profit, find_bet, grade_bet, import_bets, record_bet, replace_bet, BetOutcome,
    BetRecord, ImportedBet, NewBet,
};
use crate::config::BankrollSettings;

/// Storage keys for the persisted bankroll state
pub const SETTINGS_KEY: &str = "bankroll_settings";
pub const HISTORY_KEY: &str = "bet_history";

/// Minimal key-value persistence used for bankroll settings and bet history.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("store lock poisoned"))
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// Process-local store, handy for tests and one-off calculations.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ── SQLite ───────────────────────────────────────────────────────────────────

/// Thread-safe SQLite-backed store (single connection with mutex)
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = lock(&self.conn)?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value=excluded.value,
                updated_at=excluded.updated_at",
            params![key, value, Utc::now()],
        )?;
        Ok(())
    }
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key         TEXT    PRIMARY KEY,
    value       TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);
"#;

// ── Ledger ───────────────────────────────────────────────────────────────────

/// Bankroll settings and bet history persisted in a [`KeyValueStore`].
///
/// Every mutation is computed with the pure functions in [`crate::bet`] and
/// then written back in one `set` per key.
pub struct BankrollLedger<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> BankrollLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Saved settings, or defaults when nothing has been saved yet.
    pub fn settings(&self) -> Result<BankrollSettings> {
        match self.store.get(SETTINGS_KEY)? {
            Some(json) => {
                let settings: BankrollSettings =
                    serde_json::from_str(&json).context("decoding bankroll settings")?;
                Ok(settings)
            }
            None => Ok(BankrollSettings::default()),
        }
    }

    pub fn save_settings(&self, settings: &BankrollSettings) -> Result<BankrollSettings> {
        settings.validate()?;
        let saved = BankrollSettings {
            updated_at: Utc::now(),
            ..settings.clone()
        };
        self.store.set(SETTINGS_KEY, &serde_json::to_string(&saved)?)?;
        debug!("Saved bankroll settings (bankroll ${:.2})", saved.current_bankroll);
        Ok(saved)
    }

    /// Full history, oldest first.
    pub fn history(&self) -> Result<Vec<BetRecord>> {
        match self.store.get(HISTORY_KEY)? {
            Some(json) => serde_json::from_str(&json).context("decoding bet history"),
            None => Ok(Vec::new()),
        }
    }

    fn save_history(&self, history: &[BetRecord]) -> Result<()> {
        self.store.set(HISTORY_KEY, &serde_json::to_string(history)?)
    }

    /// Record a new pending bet and persist it.
    pub fn place_bet(&self, bet: NewBet) -> Result<BetRecord> {
        let record = record_bet(bet)?;
        let history = append_bet(&self.history()?, record.clone());
        self.save_history(&history)?;
        info!(
            "Recorded bet {} – ${:.2} at {}",
            record.id, record.stake, record.odds
        );
        Ok(record)
    }

    /// Grade a pending bet and move its profit into the bankroll.
    pub fn settle_bet(&self, id: &str, outcome: BetOutcome) -> Result<BetRecord> {
        let history = self.history()?;
        let graded = grade_bet(find_bet(&history, id)?, outcome)?;
        let pnl = graded.profit()?.unwrap_or(0.0);

        let mut settings = self.settings()?;
        settings.current_bankroll = apply_profit(settings.current_bankroll, pnl)?;
        // History and bankroll are two writes; nothing is written unless both can be
        settings.validate()?;

        self.save_history(&replace_bet(&history, graded.clone())?)?;
        self.save_settings(&settings)?;
        info!(
            "Graded bet {} as {:?} (P/L ${:.2}, bankroll ${:.2})",
            graded.id, graded.status, pnl, settings.current_bankroll
        );
        Ok(graded)
    }

    /// Import bets from an external source, adjusting the bankroll by their P/L.
    pub fn import(&self, bets: Vec<ImportedBet>) -> Result<usize> {
        let mut settings = self.settings()?;
        let outcome = import_bets(&self.history()?, bets, settings.unit_size)?;
        settings.current_bankroll =
            apply_profit(settings.current_bankroll, outcome.pnl_adjustment)?;
        settings.validate()?;

        self.save_history(&outcome.history)?;
        if outcome.pnl_adjustment != 0.0 {
            self.save_settings(&settings)?;
        }
        info!(
            "Imported {} bets, skipped {} known (P/L adjustment ${:.2})",
            outcome.imported, outcome.skipped, outcome.pnl_adjustment
        );
        Ok(outcome.imported)
    }

    /// Start over with a new bankroll. Bet history is kept.
    pub fn reset(&self, bankroll: f64) -> Result<BankrollSettings> {
        let previous = self.settings()?;
        let fresh = BankrollSettings {
            risk: previous.risk,
            confidence_scale: previous.confidence_scale,
            unit_size: previous.unit_size,
            stop_loss_percent: previous.stop_loss_percent,
            ..BankrollSettings::with_bankroll(bankroll)
        };
        self.save_settings(&fresh)
    }
}
