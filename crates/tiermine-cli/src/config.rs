//! Ledger configuration types

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tiermine_core::constants::MAX_FEE_BPS;
use tiermine_core::{AccountId, Amount, Bps};
use tiermine_staking::{MineParams, TierParams};

/// Complete ledger configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Mine singleton settings applied by `init`
    #[serde(default)]
    pub mine: MineSection,

    /// Tiers seeded by `init`, in nonce order
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierSection>,

    /// State file settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mine: MineSection::default(),
            tiers: default_tiers(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Read `path`, or fall back to defaults when it does not exist
    ///
    /// Returns whether the defaults were used.
    pub fn load_or_default(path: &Path) -> anyhow::Result<(Self, bool)> {
        if !path.exists() {
            return Ok((Self::default(), true));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok((config, false))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.mine.params()?;
        for (i, tier) in self.tiers.iter().enumerate() {
            if tier.lock_duration_secs == 0 {
                bail!("tier {} has a zero lock duration", i);
            }
        }
        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => bail!("unknown log format {:?}, expected text or json", other),
        }
        Ok(())
    }
}

/// `[mine]` section
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MineSection {
    /// Administrator identity (hex)
    #[serde(default = "default_admin")]
    pub admin: String,

    /// Mint of the staked value unit (hex)
    #[serde(default = "default_token_mint")]
    pub token_mint: String,

    #[serde(default = "default_fee_collector")]
    pub fee_collector: String,

    #[serde(default = "default_penalty_collector")]
    pub penalty_collector: String,

    #[serde(default = "default_dev_fee_bps")]
    pub dev_fee_bps: Bps,

    #[serde(default = "default_early_withdrawal_fee_bps")]
    pub early_withdrawal_fee_bps: Bps,

    #[serde(default = "default_referral_reward_bps")]
    pub referral_reward_bps: Bps,
}

impl MineSection {
    pub fn admin(&self) -> anyhow::Result<AccountId> {
        parse_identity("mine.admin", &self.admin)
    }

    /// Parse identities and check rates
    pub fn params(&self) -> anyhow::Result<(AccountId, MineParams)> {
        for (name, bps) in [
            ("dev_fee_bps", self.dev_fee_bps),
            ("early_withdrawal_fee_bps", self.early_withdrawal_fee_bps),
            ("referral_reward_bps", self.referral_reward_bps),
        ] {
            if bps > MAX_FEE_BPS {
                bail!("mine.{} = {} exceeds {}", name, bps, MAX_FEE_BPS);
            }
        }

        Ok((
            self.admin()?,
            MineParams {
                token_mint: parse_identity("mine.token_mint", &self.token_mint)?,
                fee_collector: parse_identity("mine.fee_collector", &self.fee_collector)?,
                penalty_collector: parse_identity(
                    "mine.penalty_collector",
                    &self.penalty_collector,
                )?,
                dev_fee_bps: self.dev_fee_bps,
                early_withdrawal_fee_bps: self.early_withdrawal_fee_bps,
                referral_reward_bps: self.referral_reward_bps,
            },
        ))
    }
}

fn parse_identity(field: &str, value: &str) -> anyhow::Result<AccountId> {
    value
        .parse::<AccountId>()
        .with_context(|| format!("{} is not a 32-byte hex identity: {:?}", field, value))
}

fn default_identity(seed: &str) -> String {
    AccountId::from_public_key(seed.as_bytes()).to_hex()
}

fn default_admin() -> String {
    default_identity("tiermine-admin")
}

fn default_token_mint() -> String {
    default_identity("tiermine-token-mint")
}

fn default_fee_collector() -> String {
    default_identity("tiermine-fee-collector")
}

fn default_penalty_collector() -> String {
    default_identity("tiermine-penalty-collector")
}

fn default_dev_fee_bps() -> Bps {
    500
}

fn default_early_withdrawal_fee_bps() -> Bps {
    4_000
}

fn default_referral_reward_bps() -> Bps {
    1_000
}

impl Default for MineSection {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            token_mint: default_token_mint(),
            fee_collector: default_fee_collector(),
            penalty_collector: default_penalty_collector(),
            dev_fee_bps: default_dev_fee_bps(),
            early_withdrawal_fee_bps: default_early_withdrawal_fee_bps(),
            referral_reward_bps: default_referral_reward_bps(),
        }
    }
}

/// `[[tiers]]` entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSection {
    pub apy_bps: Bps,

    #[serde(default)]
    pub minimum_token_amount: Amount,

    pub lock_duration_secs: u64,
}

impl From<&TierSection> for TierParams {
    fn from(tier: &TierSection) -> Self {
        TierParams {
            apy_bps: tier.apy_bps,
            minimum_token_amount: tier.minimum_token_amount,
            lock_duration_secs: tier.lock_duration_secs,
        }
    }
}

/// One day, two days and one week at accelerated rates
fn default_tiers() -> Vec<TierSection> {
    vec![
        TierSection {
            apy_bps: 400_000,
            minimum_token_amount: 1_000_000_000,
            lock_duration_secs: 86_400,
        },
        TierSection {
            apy_bps: 800_000,
            minimum_token_amount: 5_000_000_000,
            lock_duration_secs: 172_800,
        },
        TierSection {
            apy_bps: 1_600_000,
            minimum_token_amount: 10_000_000_000,
            lock_duration_secs: 604_800,
        },
    ]
}

/// `[storage]` section
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// State file holding ledger records and bank balances
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

fn default_snapshot_path() -> String {
    "~/.tiermine/state.bin".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
