//! Tiermine CLI
//!
//! Operator interface for a tiermine staking ledger kept in a local state file.

mod config;
mod state;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiermine_core::{
    AccountId, Amount, Bps, Clock, ManualClock, MineError, SystemClock, TierNonce, Timestamp,
};
use tiermine_staking::{InMemoryBank, MineUpdate, Party, TierMine, TierParams, TierUpdate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LedgerConfig, LoggingConfig};

#[derive(Parser)]
#[command(name = "tiermine")]
#[command(version)]
#[command(about = "Tiered staking ledger operator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "tiermine.toml")]
    config: PathBuf,

    /// State file, overriding `storage.snapshot_path`
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Signer for admin commands (hex), defaults to `mine.admin`
    #[arg(long, global = true)]
    signer: Option<AccountId>,

    /// Run at this unix timestamp instead of the wall clock
    #[arg(long, global = true)]
    at: Option<Timestamp>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the mine and seed the configured tiers
    Init,

    /// Credit a test balance ("vault" or a hex identity)
    Fund { party: String, amount: Amount },

    /// Append a tier
    AddTier {
        #[arg(long)]
        apy_bps: Bps,
        #[arg(long, default_value = "0")]
        minimum: Amount,
        #[arg(long)]
        lock_secs: u64,
    },

    /// Change a tier; omitted flags are left untouched
    UpdateTier {
        nonce: TierNonce,
        #[arg(long)]
        apy_bps: Option<Bps>,
        #[arg(long)]
        minimum: Option<Amount>,
        #[arg(long)]
        lock_secs: Option<u64>,
        #[arg(long)]
        active: Option<bool>,
    },

    /// Change mine settings; omitted flags are left untouched
    UpdateMine {
        #[arg(long)]
        fee_collector: Option<AccountId>,
        #[arg(long)]
        penalty_collector: Option<AccountId>,
        #[arg(long)]
        dev_fee_bps: Option<Bps>,
        #[arg(long)]
        early_fee_bps: Option<Bps>,
        #[arg(long)]
        referral_bps: Option<Bps>,
        #[arg(long)]
        active: Option<bool>,
    },

    /// Grant an account entry to a tier below its minimum until `expiry`
    Whitelist {
        beneficiary: AccountId,
        tier: TierNonce,
        expiry: Timestamp,
    },

    /// Open a position
    Stake {
        owner: AccountId,
        tier: TierNonce,
        amount: Amount,
        #[arg(long, conflicts_with = "whitelist")]
        referrer: Option<AccountId>,
        /// Use the owner's whitelist grant
        #[arg(long)]
        whitelist: bool,
    },

    /// Add to an open position
    Increase { owner: AccountId, amount: Amount },

    /// Fold matured interest into principal
    Compound { owner: AccountId },

    /// Pay out accrued interest
    Claim { owner: AccountId },

    /// Close a position (admin)
    Terminate { owner: AccountId },

    /// Pay out referral earnings
    WithdrawReferral { referrer: AccountId },

    /// Print ledger state as JSON
    Show {
        #[command(subcommand)]
        what: ShowCommands,
    },
}

#[derive(Subcommand)]
enum ShowCommands {
    Mine,
    Tiers,
    Position { owner: AccountId },
    /// Position plus what a claim would pay now
    Pending { owner: AccountId },
    Referral { owner: AccountId },
    Grant { beneficiary: AccountId },
    Balances,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = logging.format == "json";

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_writer(std::io::stderr)
        }))
        .init();
}

fn expand_path(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    path.to_path_buf()
}

fn parse_party(s: &str) -> anyhow::Result<Party> {
    if s.eq_ignore_ascii_case("vault") {
        return Ok(Party::Vault);
    }
    let id = s
        .parse::<AccountId>()
        .with_context(|| format!("{:?} is neither \"vault\" nor a hex identity", s))?;
    Ok(Party::Account(id))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// How a rejected request should be treated by whoever submitted it
#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    Retry,
    Fatal,
    Rejected,
}

fn disposition(err: &anyhow::Error) -> Option<Disposition> {
    let err = err.downcast_ref::<MineError>()?;
    Some(if err.is_fatal() {
        Disposition::Fatal
    } else if err.is_recoverable() {
        Disposition::Retry
    } else {
        Disposition::Rejected
    })
}

fn report_failure(err: &anyhow::Error) {
    let Some(mine_err) = err.downcast_ref::<MineError>() else {
        return;
    };
    match disposition(err) {
        Some(Disposition::Fatal) => {
            tracing::error!(code = mine_err.code(), "ledger accounting is inconsistent: {}", mine_err)
        }
        Some(Disposition::Retry) => {
            tracing::warn!(code = mine_err.code(), "request may succeed later: {}", mine_err)
        }
        _ => tracing::warn!(code = mine_err.code(), "request rejected: {}", mine_err),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = expand_path(&cli.config);
    let (config, defaulted) = LedgerConfig::load_or_default(&config_path)?;
    init_logging(cli.verbose, &config.logging);
    if defaulted {
        tracing::info!("Config {:?} not found, using defaults", config_path);
    }
    config.validate()?;

    let state_path = expand_path(
        cli.state
            .as_deref()
            .unwrap_or_else(|| Path::new(&config.storage.snapshot_path)),
    );
    let (store, bank) = state::load(&state_path)?;
    let store = Arc::new(store);
    let bank = Arc::new(bank);

    let clock: Arc<dyn Clock> = match cli.at {
        Some(ts) => Arc::new(ManualClock::new(ts)),
        None => Arc::new(SystemClock),
    };
    let engine = TierMine::new(store.clone(), bank.clone(), clock);
    let signer = match cli.signer {
        Some(signer) => signer,
        None => config.mine.admin()?,
    };

    let mutated = match run(cli.command, &engine, &bank, &config, signer) {
        Ok(mutated) => mutated,
        Err(err) => {
            report_failure(&err);
            return Err(err);
        }
    };

    for record in engine.drain_events() {
        tracing::info!(kind = record.event.kind(), at = record.timestamp, "{:?}", record.event);
    }
    if mutated {
        state::save(&state_path, &store, &bank)?;
    }
    Ok(())
}

/// Execute one command; returns whether state changed
fn run(
    command: Commands,
    engine: &TierMine,
    bank: &InMemoryBank,
    config: &LedgerConfig,
    signer: AccountId,
) -> anyhow::Result<bool> {
    match command {
        Commands::Init => {
            let (admin, params) = config.mine.params()?;
            let mine = engine.initialize(admin, params)?;
            for tier in &config.tiers {
                engine.add_tier(admin, TierParams::from(tier))?;
            }
            print_json(&mine)?;
            print_json(&engine.tiers()?)?;
        }

        Commands::Fund { party, amount } => {
            let party = parse_party(&party)?;
            let balance = bank.credit(party, amount)?;
            tracing::info!(%party, amount, balance, "test balance credited");
        }

        Commands::AddTier {
            apy_bps,
            minimum,
            lock_secs,
        } => {
            let nonce = engine.add_tier(
                signer,
                TierParams {
                    apy_bps,
                    minimum_token_amount: minimum,
                    lock_duration_secs: lock_secs,
                },
            )?;
            print_json(&engine.tier(nonce)?)?;
        }

        Commands::UpdateTier {
            nonce,
            apy_bps,
            minimum,
            lock_secs,
            active,
        } => {
            let tier = engine.update_tier(
                signer,
                nonce,
                TierUpdate {
                    minimum_token_amount: minimum,
                    apy_bps,
                    lock_duration_secs: lock_secs,
                    is_active: active,
                },
            )?;
            print_json(&tier)?;
        }

        Commands::UpdateMine {
            fee_collector,
            penalty_collector,
            dev_fee_bps,
            early_fee_bps,
            referral_bps,
            active,
        } => {
            let mine = engine.update_mine(
                signer,
                MineUpdate {
                    fee_collector,
                    penalty_collector,
                    dev_fee_bps,
                    early_withdrawal_fee_bps: early_fee_bps,
                    referral_reward_bps: referral_bps,
                    is_active: active,
                },
            )?;
            print_json(&mine)?;
        }

        Commands::Whitelist {
            beneficiary,
            tier,
            expiry,
        } => {
            print_json(&engine.whitelist_account(signer, beneficiary, tier, expiry)?)?;
        }

        Commands::Stake {
            owner,
            tier,
            amount,
            referrer,
            whitelist,
        } => {
            let receipt = match (referrer, whitelist) {
                (Some(referrer), _) => {
                    engine.initialize_staking_with_referrer(owner, tier, amount, referrer)?
                }
                (None, true) => engine.initialize_whitelist(owner, tier, amount)?,
                (None, false) => engine.initialize_staking(owner, tier, amount)?,
            };
            print_json(&receipt)?;
        }

        Commands::Increase { owner, amount } => {
            print_json(&engine.increase_stake(owner, amount)?)?;
        }

        Commands::Compound { owner } => {
            print_json(&engine.compound(owner)?)?;
        }

        Commands::Claim { owner } => {
            print_json(&engine.claim_interest(owner)?)?;
        }

        Commands::Terminate { owner } => {
            print_json(&engine.terminate_staking(signer, owner)?)?;
        }

        Commands::WithdrawReferral { referrer } => {
            print_json(&engine.withdraw_referral_rewards(referrer)?)?;
        }

        Commands::Show { what } => {
            show(what, engine, bank)?;
            return Ok(false);
        }
    }
    Ok(true)
}

fn show(what: ShowCommands, engine: &TierMine, bank: &InMemoryBank) -> anyhow::Result<()> {
    match what {
        ShowCommands::Mine => print_json(&engine.mine()?),
        ShowCommands::Tiers => print_json(&engine.tiers()?),
        ShowCommands::Position { owner } => print_json(&engine.position(&owner)?),
        ShowCommands::Pending { owner } => print_json(&serde_json::json!({
            "position": engine.position(&owner)?,
            "matured": engine.is_matured(&owner)?,
            "claim": engine.pending_claim(&owner)?,
        })),
        ShowCommands::Referral { owner } => print_json(&engine.referral(&owner)?),
        ShowCommands::Grant { beneficiary } => print_json(&engine.whitelist_grant(&beneficiary)?),
        ShowCommands::Balances => {
            let balances: BTreeMap<String, Amount> = bank
                .balances()
                .into_iter()
                .map(|(party, amount)| (party.to_string(), amount))
                .collect();
            print_json(&balances)
        }
    }
}
