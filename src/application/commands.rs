//! CLI commands and handlers
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::application::services::ConfirmationService;
use crate::config::Config;
use crate::domain::account::AccountContext;
use crate::domain::quote::TradeIntent;
use crate::shared::types::Chain;

#[derive(Parser, Debug)]
#[command(name = "routeguard", version)]
#[command(about = "Builds aggregator routes and guards trade confirmation against stale quotes")]
pub struct Cli {
    /// Path to config file (optional)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Look up a route summary
    Route(TradeArgs),

    /// Look up a route, build it and show the staleness verdict
    Quote(TradeArgs),

    /// Build, gate on output changes and submit (simulated)
    Confirm {
        #[command(flatten)]
        trade: TradeArgs,

        /// Accept an adverse output change without asking
        #[arg(long)]
        accept_changes: bool,
    },

    /// Re-quote periodically and report output changes
    Watch {
        #[command(flatten)]
        trade: TradeArgs,

        /// Refresh interval in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many refreshes
        #[arg(long)]
        rounds: Option<u64>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TradeArgs {
    /// Input token address
    #[arg(long)]
    pub token_in: String,

    /// Output token address
    #[arg(long)]
    pub token_out: String,

    /// Amount of the input token in its smallest unit
    #[arg(long)]
    pub amount: u128,

    /// Wallet address; omitted means no wallet is connected
    #[arg(long)]
    pub sender: Option<String>,

    /// Receiving address (defaults to the sender)
    #[arg(long)]
    pub recipient: Option<String>,

    /// Slippage tolerance in basis points (overrides config)
    #[arg(long)]
    pub slippage_bps: Option<u32>,

    /// Chain name (overrides config)
    #[arg(long)]
    pub chain: Option<Chain>,

    /// Referral tag (overrides config)
    #[arg(long)]
    pub referral: Option<String>,

    /// Aggregator base URL (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,
}

impl TradeArgs {
    /// CLI values win over whatever the file set.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(chain) = self.chain {
            config.aggregator.chain = chain;
        }
        if let Some(base_url) = &self.base_url {
            config.aggregator.base_url = base_url.clone();
        }
        if let Some(slippage_bps) = self.slippage_bps {
            config.trade.slippage_bps = slippage_bps;
        }
        if let Some(referral) = &self.referral {
            config.trade.referral = Some(referral.clone());
        }
    }

    pub fn intent(&self, config: &Config) -> TradeIntent {
        let mut intent = TradeIntent::new(
            &self.token_in,
            &self.token_out,
            self.amount,
            self.sender.clone().unwrap_or_default(),
        )
        .with_slippage_bps(config.trade.slippage_bps)
        .with_deadline_secs(config.trade.deadline_secs);

        if let Some(recipient) = &self.recipient {
            intent = intent.with_recipient(recipient);
        }
        if let Some(referral) = &config.trade.referral {
            intent = intent.with_referral(referral);
        }
        intent
    }

    pub fn account(&self, chain: Chain) -> AccountContext {
        match self.sender.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(sender) => AccountContext::new(sender, chain),
            None => AccountContext::disconnected(chain),
        }
    }
}

impl Commands {
    fn trade(&self) -> &TradeArgs {
        match self {
            Commands::Route(trade) | Commands::Quote(trade) => trade,
            Commands::Confirm { trade, .. } | Commands::Watch { trade, .. } => trade,
        }
    }
}

/// Loads the file config, if any, and layers CLI flags on top.
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    cli.command.trade().apply_overrides(&mut config);
    if let Commands::Watch { interval_ms: Some(interval_ms), .. } = &cli.command {
        config.watch.refresh_interval_ms = *interval_ms;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(cli: Cli) -> Result<()> {
        let config = resolve_config(&cli)?;
        info!("🌐 Aggregator {} on {}", config.aggregator.base_url, config.aggregator.chain);

        let trade = cli.command.trade();
        let intent = trade.intent(&config);
        let account = trade.account(config.aggregator.chain);
        let service = ConfirmationService::new(config)?;

        match &cli.command {
            Commands::Route(_) => {
                service.route(&intent).await?;
            }
            Commands::Quote(_) => {
                service.quote(intent, account).await?;
            }
            Commands::Confirm { accept_changes, .. } => {
                service.confirm(intent, account, *accept_changes).await?;
            }
            Commands::Watch { rounds, .. } => {
                service.watch(intent, account, *rounds).await?;
            }
        }
        Ok(())
    }
}
