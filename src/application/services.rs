//! Application services and use cases

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{parse_commitment, Config};
use crate::domain::account::{AccountContext, AccountPreparer};
use crate::domain::confirmation::{ConfirmOutcome, ConfirmationController, ConfirmationState, Phase};
use crate::domain::quote::{
    BuildData, ChangeSeverity, QuoteFetcher, RouteQuery, RouteSummary, RouteSummaryService, TradeIntent,
};
use crate::domain::staleness::StalenessGuard;
use crate::infrastructure::{AggregatorApiClient, AssociatedTokenAccountPreparer, ScopedTicker, SimulatedSubmitter};
use crate::shared::utils::format_amount;

/// Wires the aggregator, staleness guard and submitter into confirmation sessions.
pub struct ConfirmationService {
    config: Config,
    aggregator: Arc<AggregatorApiClient>,
}

impl ConfirmationService {
    pub fn new(config: Config) -> Result<Self> {
        let aggregator = AggregatorApiClient::new(
            config.aggregator.base_url.clone(),
            config.aggregator.chain,
            config.aggregator.client_source.clone(),
            config.request_timeout(),
        )
        .context("create aggregator client")?;

        Ok(Self { config, aggregator: Arc::new(aggregator) })
    }

    /// New controller for one session. Solana sessions get an ATA preparer when `[solana]` is set.
    pub fn controller(&self, account: AccountContext) -> Result<ConfirmationController> {
        let fetcher = QuoteFetcher::new(self.aggregator.clone(), self.config.fetcher_config());
        let guard = StalenessGuard::new(self.config.staleness_policy()?);
        let requires_preparation = account.requires_account_preparation();
        let controller = ConfirmationController::new(fetcher, guard, account, Arc::new(SimulatedSubmitter::new()));

        match (&self.config.solana, requires_preparation) {
            (Some(solana), true) => {
                let preparer = AssociatedTokenAccountPreparer::new(
                    solana.rpc_url.clone(),
                    &solana.token_program,
                    parse_commitment(&solana.commitment)?,
                )?;
                let preparer: Arc<dyn AccountPreparer> = Arc::new(preparer);
                Ok(controller.with_preparer(preparer))
            }
            (None, true) => {
                warn!("⚠️ No [solana] section configured, token accounts will not be checked");
                Ok(controller)
            }
            _ => Ok(controller),
        }
    }

    /// Looks up the route summary the user would be shown.
    pub async fn route(&self, intent: &TradeIntent) -> Result<RouteSummary> {
        let summary = self
            .aggregator
            .get_route(&RouteQuery::from(intent))
            .await
            .context("route lookup failed")?;

        info!(
            "📊 Route {} -> {}: {} in, {} out, gas {}, slippage tolerance {}%",
            summary.token_in,
            summary.token_out,
            summary.amount_in,
            summary.amount_out,
            summary.gas.as_deref().unwrap_or("n/a"),
            format_amount(intent.slippage_bps as u128, 2)
        );
        Ok(summary)
    }

    /// Route lookup followed by one build through the controller.
    pub async fn quote(&self, intent: TradeIntent, account: AccountContext) -> Result<ConfirmationState> {
        let summary = self.route(&intent).await?;
        let mut controller = self.controller(account)?;
        controller.request_build(intent, Some(summary));
        let state = controller.wait_for_quote().await.clone();
        report(&state);
        Ok(state)
    }

    /// Full confirmation: build, acceptance gate, chain precondition, submission.
    pub async fn confirm(&self, intent: TradeIntent, account: AccountContext, accept_changes: bool) -> Result<ConfirmOutcome> {
        let summary = self.route(&intent).await?;
        let mut controller = self.controller(account)?;
        controller.request_build(intent, Some(summary));
        report(controller.wait_for_quote().await);

        match controller.phase() {
            Phase::Error => {
                let message = controller.state().error_message().unwrap_or_default().to_string();
                bail!("build failed: {}", message);
            }
            Phase::NeedsAcceptance if accept_changes => controller.accept_change()?,
            Phase::NeedsAcceptance => {
                bail!("output changed since the route was shown; re-run with --accept-changes to proceed")
            }
            _ => {}
        }

        if !controller.can_confirm() {
            bail!("cannot confirm while {}", controller.phase());
        }

        let outcome = controller.confirm().await?;
        match &outcome {
            ConfirmOutcome::Submitted(handle) => {
                info!("🎉 Submitted {} on {} at {}", handle.id, handle.chain, handle.submitted_at);
            }
            ConfirmOutcome::PreparationRequired(ticket) => {
                info!("📝 {}", ticket.description);
                info!("Instruction to sign and send first: 0x{}", hex::encode(&ticket.payload));
            }
        }
        Ok(outcome)
    }

    /// Re-quotes on every tick against the first route summary and reports severity changes.
    pub async fn watch(&self, intent: TradeIntent, account: AccountContext, rounds: Option<u64>) -> Result<()> {
        let summary = self.route(&intent).await?;
        let mut controller = self.controller(account)?;
        let mut ticker = ScopedTicker::new(self.config.refresh_interval());
        let mut last_level: Option<ChangeSeverity> = None;
        let mut completed = 0u64;

        info!("👀 Watching {} -> {} every {:?}", intent.token_in, intent.token_out, ticker.period());
        controller.request_build(intent.clone(), Some(summary.clone()));
        ticker.start();

        loop {
            let loading = controller.phase() == Phase::Loading;
            tokio::select! {
                tick = ticker.tick() => match tick {
                    // A pending build always lands before the next refresh starts.
                    Some(n) if loading => debug!("Refresh {} skipped, build still pending", n),
                    Some(_) => {
                        controller.request_build(intent.clone(), Some(summary.clone()));
                    }
                    None => break,
                },
                state = async { controller.wait_for_quote().await.clone() }, if loading => {
                    report(&state);
                    let level = severity_of(&state);
                    if last_level.is_some() && last_level != level {
                        warn!("🔔 Output change severity moved from {:?} to {:?}", last_level, level);
                    }
                    last_level = level;

                    completed += 1;
                    if rounds.map(|r| completed >= r).unwrap_or(false) {
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("🛑 Interrupted");
                    break;
                }
            }
        }

        ticker.stop();
        controller.dismiss();
        info!("Watch finished after {} quotes", completed);
        Ok(())
    }
}

fn severity_of(state: &ConfirmationState) -> Option<ChangeSeverity> {
    state.build().map(|build| build.output_change.as_ref().map(|c| c.level).unwrap_or(ChangeSeverity::None))
}

fn describe(build: &BuildData) -> String {
    let change = match &build.output_change {
        Some(change) if change.is_adverse() => {
            format!(", output {}% ({})", change.percent.round_dp(4), change.level)
        }
        _ => String::new(),
    };
    format!(
        "{} in -> {} out, gas {} via {}{}",
        build.amount_in,
        build.amount_out,
        build.gas,
        build.router_address,
        change
    )
}

fn report(state: &ConfirmationState) {
    match state {
        ConfirmationState::Ready { generation, build } => info!("✅ Build {} ready: {}", generation, describe(build)),
        ConfirmationState::NeedsAcceptance { generation, build } => {
            warn!("⚠️ Build {} needs acceptance: {}", generation, describe(build))
        }
        ConfirmationState::Error { generation, message } => warn!("❌ Build {} failed: {}", generation, message),
        other => info!("Session is {}", other.phase()),
    }
}
