use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use bankroll_math::bet::{bankroll_stats, recent_bets, ImportedBet};
use bankroll_math::config::{Command, Config};
use bankroll_math::kelly::{analyze_bet, confidence_to_win_probability, size_bet};
use bankroll_math::odds::{american_to_decimal, american_to_implied_probability, Odds};
use bankroll_math::risk::{
    calculate_risk_of_ruin, closed_form_risk_of_ruin, simulate_bankroll, summarize_outcomes,
    RuinParams,
};
use bankroll_math::{BankrollLedger, NewBet, SqliteStore};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_ledger(config: &Config) -> Result<BankrollLedger<SqliteStore>> {
    let store = SqliteStore::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);
    Ok(BankrollLedger::new(store))
}

fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    match config.command.clone() {
        Command::Convert { american } => {
            print_json(&json!({
                "american": american,
                "decimal": american_to_decimal(american)?,
                "implied_probability": american_to_implied_probability(american)?,
            }))?;
        }

        Command::Kelly {
            probability,
            american,
            multiplier,
        } => {
            let decimal = american_to_decimal(american)?;
            print_json(&analyze_bet(probability, decimal, multiplier)?)?;
        }

        Command::Size { confidence, american } => {
            let ledger = open_ledger(&config)?;
            let settings = ledger.settings()?;
            let stats = bankroll_stats(&settings, &ledger.history()?)?;
            if stats.stop_loss_triggered {
                warn!(
                    "Stop loss reached: bankroll is {:.1}% below its start",
                    stats.current_drawdown
                );
            }
            let win_probability =
                confidence_to_win_probability(confidence, &settings.confidence_scale)?;
            let sizing = size_bet(
                settings.current_bankroll,
                win_probability,
                american_to_decimal(american)?,
                &settings.risk,
                settings.unit_size,
            )?;
            print_json(&sizing)?;
        }

        Command::Ruin {
            probability,
            american,
            fraction,
            drawdown,
            horizon,
            trials,
        } => {
            let decimal = american_to_decimal(american)?;
            let params = RuinParams {
                win_probability: probability,
                decimal_odds: decimal,
                fraction,
                target_drawdown: drawdown,
                horizon,
                trials,
                seed: config.seed,
            };
            let estimate = calculate_risk_of_ruin(&params)?;
            // Flat-bet approximation with one unit = the per-bet fraction
            let closed_form = if fraction > 0.0 {
                Some(closed_form_risk_of_ruin(probability, decimal, 1.0 / fraction)?)
            } else {
                None
            };
            print_json(&json!({
                "params": params,
                "monte_carlo": estimate,
                "closed_form": closed_form,
            }))?;
        }

        Command::Simulate {
            probability,
            american,
            fraction,
            bankroll,
            bets,
            paths,
        } => {
            let simulation = simulate_bankroll(
                bankroll,
                probability,
                american_to_decimal(american)?,
                fraction,
                bets,
                config.seed,
            )?;
            print_json(&summarize_outcomes(&simulation, paths)?)?;
        }

        Command::Record {
            stake,
            american,
            selection,
            sport,
            confidence,
        } => {
            let ledger = open_ledger(&config)?;
            let bet = NewBet {
                stake,
                odds: Odds::American(american),
                sport,
                selection,
                confidence,
            };
            print_json(&ledger.place_bet(bet)?)?;
        }

        Command::Grade { id, outcome } => {
            let ledger = open_ledger(&config)?;
            let graded = ledger.settle_bet(&id, outcome)?;
            print_json(&json!({
                "bet": graded,
                "profit": graded.profit()?,
                "bankroll": ledger.settings()?.current_bankroll,
            }))?;
        }

        Command::Import { path } => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
            let bets: Vec<ImportedBet> =
                serde_json::from_str(&raw).with_context(|| format!("parsing bets in {}", path))?;
            let ledger = open_ledger(&config)?;
            let imported = ledger.import(bets)?;
            print_json(&json!({ "imported": imported }))?;
        }

        Command::History { limit } => {
            let ledger = open_ledger(&config)?;
            let history = ledger.history()?;
            print_json(&recent_bets(&history, limit))?;
        }

        Command::Stats => {
            let ledger = open_ledger(&config)?;
            print_json(&bankroll_stats(&ledger.settings()?, &ledger.history()?)?)?;
        }

        Command::Reset { bankroll } => {
            let ledger = open_ledger(&config)?;
            let settings = ledger.reset(bankroll)?;
            info!("Bankroll reset to ${:.2}", settings.current_bankroll);
            print_json(&settings)?;
        }
    }

    Ok(())
}
