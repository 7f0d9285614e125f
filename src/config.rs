use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use solana_sdk::commitment_config::CommitmentConfig;
use std::{fs, path::Path, time::Duration};

use crate::domain::quote::FetcherConfig;
use crate::domain::staleness::StalenessPolicy;
use crate::infrastructure::blockchain::SPL_TOKEN_PROGRAM;
use crate::shared::errors::ConfigError;
use crate::shared::types::Chain;

const MAX_SLIPPAGE_BPS: u32 = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorCfg {
    pub base_url: String,
    pub chain: Chain,
    #[serde(default = "default_client_source")]
    pub client_source: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for AggregatorCfg {
    fn default() -> Self {
        Self {
            base_url: "https://aggregator-api.kyberswap.com".to_string(),
            chain: Chain::Ethereum,
            client_source: default_client_source(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeCfg {
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,
    pub referral: Option<String>,
}

impl Default for TradeCfg {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            deadline_secs: default_deadline_secs(),
            min_latency_ms: default_min_latency_ms(),
            referral: None,
        }
    }
}

/// Output-drop thresholds in percent
#[derive(Debug, Clone, Deserialize)]
pub struct StalenessCfg {
    #[serde(default = "default_low_below_pct")]
    pub low_below_pct: Decimal,
    #[serde(default = "default_medium_below_pct")]
    pub medium_below_pct: Decimal,
}

impl Default for StalenessCfg {
    fn default() -> Self {
        Self {
            low_below_pct: default_low_below_pct(),
            medium_below_pct: default_medium_below_pct(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolanaCfg {
    pub rpc_url: String,
    #[serde(default = "default_token_program")]
    pub token_program: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchCfg {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

impl Default for WatchCfg {
    fn default() -> Self {
        Self { refresh_interval_ms: default_refresh_interval_ms() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aggregator: AggregatorCfg,
    #[serde(default)]
    pub trade: TradeCfg,
    #[serde(default)]
    pub staleness: StalenessCfg,
    pub solana: Option<SolanaCfg>,
    #[serde(default)]
    pub watch: WatchCfg,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read {}", path.as_ref().display()))?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parse Config.toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregator.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("aggregator.base_url"));
        }
        if self.aggregator.client_source.trim().is_empty() {
            return Err(ConfigError::Missing("aggregator.client_source"));
        }
        if self.trade.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(ConfigError::Invalid {
                field: "trade.slippage_bps",
                reason: format!("{} exceeds {}", self.trade.slippage_bps, MAX_SLIPPAGE_BPS),
            });
        }
        if self.watch.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "watch.refresh_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.watch.refresh_interval_ms < self.trade.min_latency_ms {
            return Err(ConfigError::Invalid {
                field: "watch.refresh_interval_ms",
                reason: format!(
                    "{} is shorter than trade.min_latency_ms ({})",
                    self.watch.refresh_interval_ms, self.trade.min_latency_ms
                ),
            });
        }
        if let Some(solana) = &self.solana {
            if solana.rpc_url.trim().is_empty() {
                return Err(ConfigError::Missing("solana.rpc_url"));
            }
            parse_commitment(&solana.commitment)?;
        }
        self.staleness_policy()?;
        Ok(())
    }

    pub fn staleness_policy(&self) -> Result<StalenessPolicy, ConfigError> {
        StalenessPolicy::new(self.staleness.low_below_pct, self.staleness.medium_below_pct)
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            min_latency: Duration::from_millis(self.trade.min_latency_ms),
            source: self.aggregator.client_source.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.aggregator.request_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.watch.refresh_interval_ms)
    }
}

pub fn parse_commitment(value: &str) -> Result<CommitmentConfig, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(ConfigError::Invalid {
            field: "solana.commitment",
            reason: format!("unknown commitment {:?}", other),
        }),
    }
}

fn default_client_source() -> String {
    "routeguard".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_slippage_bps() -> u32 {
    50
}

fn default_deadline_secs() -> u64 {
    1_200
}

fn default_min_latency_ms() -> u64 {
    1_000
}

fn default_low_below_pct() -> Decimal {
    Decimal::new(1, 1)
}

fn default_medium_below_pct() -> Decimal {
    Decimal::ONE
}

fn default_token_program() -> String {
    SPL_TOKEN_PROGRAM.to_string()
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_refresh_interval_ms() -> u64 {
    10_000
}
