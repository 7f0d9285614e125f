//! Confirmation state machine

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ConfirmOutcome, ConfirmationState, Phase};
use crate::domain::account::{AccountContext, AccountPreparer};
use crate::domain::execution::{SubmissionClient, SubmissionRequest};
use crate::domain::quote::{Generation, QuoteFetcher, QuoteResult, RouteSummary, TradeIntent};
use crate::domain::staleness::StalenessGuard;
use crate::shared::errors::ControllerError;

/// Drives one confirmation session from build request to submission.
pub struct ConfirmationController {
    fetcher: QuoteFetcher,
    guard: StalenessGuard,
    account: AccountContext,
    preparer: Option<Arc<dyn AccountPreparer>>,
    submitter: Arc<dyn SubmissionClient>,
    state: ConfirmationState,
    /// Generation whose output change the user accepted.
    accepted: Option<Generation>,
    /// Output token whose account is known to exist for the recipient.
    prepared_for: Option<String>,
    intent: Option<TradeIntent>,
    summary: Option<RouteSummary>,
}

impl ConfirmationController {
    pub fn new(
        fetcher: QuoteFetcher,
        guard: StalenessGuard,
        account: AccountContext,
        submitter: Arc<dyn SubmissionClient>,
    ) -> Self {
        Self {
            fetcher,
            guard,
            account,
            preparer: None,
            submitter,
            state: ConfirmationState::Idle,
            accepted: None,
            prepared_for: None,
            intent: None,
            summary: None,
        }
    }

    pub fn with_preparer(mut self, preparer: Arc<dyn AccountPreparer>) -> Self {
        self.preparer = Some(preparer);
        self
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn account(&self) -> &AccountContext {
        &self.account
    }

    pub fn intent(&self) -> Option<&TradeIntent> {
        self.intent.as_ref()
    }

    pub fn current_generation(&self) -> Generation {
        self.fetcher.current_generation()
    }

    /// True only when the user accepted the change of the current generation.
    pub fn has_accepted_latest_change(&self) -> bool {
        self.accepted == Some(self.fetcher.current_generation())
    }

    /// Starts a new generation for `intent`. Valid from any state.
    ///
    /// The connected account is the sender; with no wallet connected the
    /// build fails locally.
    pub fn request_build(&mut self, mut intent: TradeIntent, summary: Option<RouteSummary>) -> Generation {
        let sender = self.account.sender_or_empty();
        if intent.sender != sender {
            warn!("Intent sender {:?} replaced by connected account {:?}", intent.sender, sender);
            intent.sender = sender.to_string();
        }

        let token_changed = self.intent.as_ref().map(|i| i.token_out != intent.token_out).unwrap_or(true);
        if token_changed {
            self.prepared_for = None;
        }

        let generation = self.fetcher.fetch(&intent, summary.as_ref());
        self.accepted = None;
        self.intent = Some(intent);
        self.summary = summary;
        self.transition(ConfirmationState::Loading { generation });
        generation
    }

    /// Applies a fetch result. Returns false when it belongs to a superseded
    /// generation and was dropped.
    pub fn deliver(&mut self, generation: Generation, result: QuoteResult) -> bool {
        let current = self.fetcher.current_generation();
        let awaiting = matches!(self.state, ConfirmationState::Loading { generation: g } if g == generation);
        if generation != current || !awaiting {
            debug!("Discarding result of build {} (current {}, {})", generation, current, self.state.phase());
            return false;
        }

        let next = match result {
            QuoteResult::Failure(message) => ConfirmationState::Error { generation, message },
            QuoteResult::Success(build) => {
                let baseline = self.summary.as_ref().map(RouteSummary::estimate);
                let build = self.guard.reconcile(baseline.as_ref(), build);
                if build.has_adverse_change() && self.accepted != Some(generation) {
                    if let Some(change) = &build.output_change {
                        warn!("⚠️ Output changed by {}% ({} severity) in build {}", change.percent.round_dp(4), change.level, generation);
                    }
                    ConfirmationState::NeedsAcceptance { generation, build }
                } else {
                    ConfirmationState::Ready { generation, build }
                }
            }
        };
        self.transition(next);
        true
    }

    /// Waits for the pending build, if any, and applies it.
    pub async fn wait_for_quote(&mut self) -> &ConfirmationState {
        while let ConfirmationState::Loading { .. } = self.state {
            match self.fetcher.next_delivery().await {
                Some(delivery) => {
                    self.deliver(delivery.generation, delivery.result);
                }
                None => break,
            }
        }
        &self.state
    }

    /// Acknowledges the output change of the current build.
    pub fn accept_change(&mut self) -> Result<(), ControllerError> {
        match &self.state {
            ConfirmationState::NeedsAcceptance { generation, build } => {
                let (generation, build) = (*generation, build.clone());
                info!("✅ Output change accepted for build {}", generation);
                self.accepted = Some(generation);
                self.transition(ConfirmationState::Ready { generation, build });
                Ok(())
            }
            ConfirmationState::Ready { .. } => Ok(()),
            other => Err(ControllerError::InvalidTransition { from: other.phase(), action: "accept change" }),
        }
    }

    /// Re-issues the last intent as a new generation after an error.
    pub fn retry(&mut self) -> Result<Generation, ControllerError> {
        if self.phase() != Phase::Error {
            return Err(ControllerError::InvalidTransition { from: self.phase(), action: "retry" });
        }
        let intent = self.intent.clone().ok_or(ControllerError::NothingToRetry)?;
        let summary = self.summary.clone();
        info!("🔁 Retrying build for {} -> {}", intent.token_in, intent.token_out);
        Ok(self.request_build(intent, summary))
    }

    pub fn can_confirm(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// Submits the ready build, or moves to the precondition state when the
    /// chain needs the recipient's account prepared first.
    pub async fn confirm(&mut self) -> Result<ConfirmOutcome, ControllerError> {
        let (generation, build) = match &self.state {
            ConfirmationState::Ready { generation, build } => (*generation, build.clone()),
            other => return Err(ControllerError::InvalidTransition { from: other.phase(), action: "confirm" }),
        };
        let intent = self.intent.clone().ok_or(ControllerError::NoActiveIntent("confirm"))?;

        if self.account.requires_account_preparation() && self.prepared_for.as_deref() != Some(intent.token_out.as_str()) {
            match self.preparer.clone() {
                Some(preparer) => {
                    let owner = intent.effective_recipient();
                    info!("🔍 Checking {} account of {} for {}", self.account.chain, owner, intent.token_out);
                    let prepared = preparer
                        .is_prepared(owner, &intent.token_out)
                        .await
                        .map_err(|e| ControllerError::Precondition(e.to_string()))?;

                    if !prepared {
                        let ticket = preparer
                            .prepare(&intent.sender, owner, &intent.token_out)
                            .await
                            .map_err(|e| ControllerError::Precondition(e.to_string()))?;
                        self.transition(ConfirmationState::ChainPreconditionPending {
                            generation,
                            build,
                            ticket: ticket.clone(),
                        });
                        return Ok(ConfirmOutcome::PreparationRequired(ticket));
                    }
                    self.prepared_for = Some(intent.token_out.clone());
                }
                None => warn!("No account preparer configured for {}, submitting anyway", self.account.chain),
            }
        }

        let request = SubmissionRequest {
            chain: self.account.chain,
            sender: intent.sender.clone(),
            router_address: build.router_address.clone(),
            payload: build.data.clone(),
            generation,
        };
        let handle = self
            .submitter
            .submit(&request)
            .await
            .map_err(|e| ControllerError::Submission(e.to_string()))?;

        info!("🚀 Build {} submitted as {}", generation, handle.id);
        self.end_session();
        Ok(ConfirmOutcome::Submitted(handle))
    }

    /// Re-checks a pending account preparation; back to READY once it clears.
    pub async fn refresh_precondition(&mut self) -> Result<&ConfirmationState, ControllerError> {
        let (generation, build, account) = match &self.state {
            ConfirmationState::ChainPreconditionPending { generation, build, ticket } => {
                (*generation, build.clone(), ticket.account.clone())
            }
            other => {
                return Err(ControllerError::InvalidTransition { from: other.phase(), action: "refresh precondition" })
            }
        };
        let intent = self.intent.clone().ok_or(ControllerError::NoActiveIntent("refresh precondition"))?;

        let prepared = match self.preparer.clone() {
            Some(preparer) => preparer
                .is_prepared(intent.effective_recipient(), &intent.token_out)
                .await
                .map_err(|e| ControllerError::Precondition(e.to_string()))?,
            None => true,
        };

        if prepared {
            info!("✅ Account {} is ready", account);
            self.prepared_for = Some(intent.token_out);
            self.transition(ConfirmationState::Ready { generation, build });
        } else {
            debug!("Account {} still missing", account);
        }
        Ok(&self.state)
    }

    /// Abandons the session: cancels in-flight work and forgets everything.
    pub fn dismiss(&mut self) {
        self.fetcher.cancel();
        self.end_session();
    }

    fn end_session(&mut self) {
        self.accepted = None;
        self.intent = None;
        self.summary = None;
        self.transition(ConfirmationState::Idle);
    }

    fn transition(&mut self, next: ConfirmationState) {
        let from = self.state.phase();
        let to = next.phase();
        if from != to {
            debug!("Confirmation {} -> {}", from, to);
        }
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::PreparationTicket;
    use crate::domain::execution::SubmissionHandle;
    use crate::domain::quote::testing::{build_data, route_summary, MockBuildRouteService, MockOutcome};
    use crate::domain::quote::{ChangeSeverity, FetcherConfig, GENERIC_FAILURE_MESSAGE, WALLET_NOT_CONNECTED};
    use crate::shared::errors::{PreconditionError, SubmissionError};
    use crate::shared::types::Chain;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSubmitter {
        submitted: AtomicUsize,
    }

    #[async_trait]
    impl SubmissionClient for RecordingSubmitter {
        async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionHandle, SubmissionError> {
            self.submitted.fetch_add(1, Ordering::SeqCst);
            Ok(SubmissionHandle {
                id: format!("sub-{}", request.generation.value()),
                chain: request.chain,
                submitted_at: Utc::now(),
            })
        }
    }

    #[derive(Default)]
    struct ToggleAccountPreparer {
        exists: AtomicBool,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl AccountPreparer for ToggleAccountPreparer {
        async fn is_prepared(&self, _owner: &str, _token_out: &str) -> Result<bool, PreconditionError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.exists.load(Ordering::SeqCst))
        }

        async fn prepare(&self, _payer: &str, owner: &str, token_out: &str) -> Result<PreparationTicket, PreconditionError> {
            Ok(PreparationTicket {
                account: format!("{}:{}", owner, token_out),
                payload: vec![1, 2, 3],
                description: "create token account".to_string(),
            })
        }
    }

    struct Harness {
        service: Arc<MockBuildRouteService>,
        submitter: Arc<RecordingSubmitter>,
        controller: ConfirmationController,
    }

    fn harness(chain: Chain) -> Harness {
        harness_for(AccountContext::new("0xsender", chain))
    }

    fn harness_for(account: AccountContext) -> Harness {
        let service = Arc::new(MockBuildRouteService::new());
        let submitter = Arc::new(RecordingSubmitter::default());
        let fetcher = QuoteFetcher::new(service.clone(), FetcherConfig::default());
        let controller = ConfirmationController::new(fetcher, StalenessGuard::default(), account, submitter.clone());
        Harness { service, submitter, controller }
    }

    fn intent(amount_in: u128) -> TradeIntent {
        TradeIntent::new("0xeeee", "0xa0b8", amount_in, "0xsender")
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_output_goes_straight_to_ready() {
        let mut h = harness(Chain::Ethereum);
        assert_eq!(h.controller.phase(), Phase::Idle);
        assert!(!h.controller.can_confirm());

        h.controller.request_build(intent(1_000), Some(route_summary(2_500)));
        assert_eq!(h.controller.phase(), Phase::Loading);
        assert!(!h.controller.can_confirm());

        h.controller.wait_for_quote().await;
        assert_eq!(h.controller.phase(), Phase::Ready);
        assert!(h.controller.can_confirm());
        assert!(h.controller.state().build().unwrap().output_change.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_change_in_flight_then_accept_drop() {
        let mut h = harness(Chain::Ethereum);
        h.service.on_amount(100_000, Duration::from_millis(5000), MockOutcome::Ok(build_data(100_000)));
        h.service.on_amount(200_000, Duration::from_millis(300), MockOutcome::Ok(build_data(196_000)));

        let stale = h.controller.request_build(intent(1_000), Some(route_summary(100_000)));
        tokio::task::yield_now().await;
        let fresh = h.controller.request_build(intent(2_000), Some(route_summary(200_000)));
        assert!(fresh > stale);

        let state = h.controller.wait_for_quote().await.clone();
        match state {
            ConfirmationState::NeedsAcceptance { generation, build } => {
                assert_eq!(generation, fresh);
                let change = build.output_change.unwrap();
                assert_eq!(change.level, ChangeSeverity::High);
                assert_eq!(change.amount, -4_000);
            }
            other => panic!("expected NeedsAcceptance, got {:?}", other),
        }
        assert!(!h.controller.can_confirm());
        assert!(!h.controller.has_accepted_latest_change());

        h.controller.accept_change().unwrap();
        assert!(h.controller.can_confirm());
        assert!(h.controller.has_accepted_latest_change());

        // The slow first build never lands.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.controller.phase(), Phase::Ready);
        assert_eq!(h.service.completed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_delivery_is_ignored() {
        let mut h = harness(Chain::Ethereum);
        let old = h.controller.request_build(intent(1_000), Some(route_summary(2_500)));
        let new = h.controller.request_build(intent(1_500), Some(route_summary(2_500)));

        assert!(!h.controller.deliver(old, QuoteResult::Success(build_data(2_500))));
        assert_eq!(h.controller.phase(), Phase::Loading);

        assert!(h.controller.deliver(new, QuoteResult::Success(build_data(2_500))));
        assert_eq!(h.controller.phase(), Phase::Ready);

        // A duplicate of the applied generation changes nothing either.
        assert!(!h.controller.deliver(new, QuoteResult::Failure("late".to_string())));
        assert_eq!(h.controller.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_change_is_idempotent() {
        let mut h = harness(Chain::Ethereum);
        let generation = h.controller.request_build(intent(1_000), Some(route_summary(10_000)));
        h.controller.deliver(generation, QuoteResult::Success(build_data(9_999)));
        assert_eq!(h.controller.phase(), Phase::NeedsAcceptance);

        h.controller.accept_change().unwrap();
        let after_once = h.controller.state().clone();
        h.controller.accept_change().unwrap();
        assert_eq!(h.controller.state(), &after_once);
        assert_eq!(h.controller.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acceptance_does_not_carry_over_to_new_generation() {
        let mut h = harness(Chain::Ethereum);
        let first = h.controller.request_build(intent(1_000), Some(route_summary(10_000)));
        h.controller.deliver(first, QuoteResult::Success(build_data(9_000)));
        h.controller.accept_change().unwrap();
        assert!(h.controller.has_accepted_latest_change());

        let second = h.controller.request_build(intent(1_000), Some(route_summary(10_000)));
        assert!(!h.controller.has_accepted_latest_change());
        h.controller.deliver(second, QuoteResult::Success(build_data(9_000)));
        assert_eq!(h.controller.phase(), Phase::NeedsAcceptance);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_is_terminal_until_retry() {
        let mut h = harness(Chain::Ethereum);
        h.service.push(Duration::from_millis(100), MockOutcome::Unknown);

        h.controller.request_build(intent(1_000), Some(route_summary(2_500)));
        h.controller.wait_for_quote().await;
        assert_eq!(h.controller.phase(), Phase::Error);
        assert_eq!(h.controller.state().error_message(), Some(GENERIC_FAILURE_MESSAGE));
        assert!(!h.controller.can_confirm());

        assert!(h.controller.accept_change().is_err());
        assert!(h.controller.confirm().await.is_err());
        assert_eq!(h.controller.phase(), Phase::Error);

        let retried = h.controller.retry().unwrap();
        assert_eq!(h.controller.phase(), Phase::Loading);
        assert_eq!(h.controller.current_generation(), retried);

        h.controller.wait_for_quote().await;
        assert_eq!(h.controller.phase(), Phase::Ready);
        assert_eq!(h.service.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_only_from_error() {
        let mut h = harness(Chain::Ethereum);
        assert!(matches!(
            h.controller.retry(),
            Err(ControllerError::InvalidTransition { from: Phase::Idle, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_wallet_surfaces_as_error() {
        let mut h = harness_for(AccountContext::disconnected(Chain::Ethereum));
        h.controller.request_build(intent(1_000), Some(route_summary(2_500)));
        h.controller.wait_for_quote().await;

        assert_eq!(h.controller.state().error_message(), Some(WALLET_NOT_CONNECTED));
        assert_eq!(h.service.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_account_is_the_sender() {
        let mut h = harness(Chain::Ethereum);
        h.controller.request_build(TradeIntent::new("0xeeee", "0xa0b8", 1_000, "0xother"), Some(route_summary(2_500)));
        assert_eq!(h.controller.intent().unwrap().sender, "0xsender");

        h.controller.wait_for_quote().await;
        assert_eq!(h.service.last_request().unwrap().sender, "0xsender");
        assert_eq!(h.controller.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_without_intent_reports_no_active_intent() {
        let mut h = harness(Chain::Solana);
        h.controller.state = ConfirmationState::Ready {
            generation: Generation::default().next(),
            build: build_data(2_500),
        };
        assert!(matches!(h.controller.confirm().await, Err(ControllerError::NoActiveIntent("confirm"))));

        h.controller.state = ConfirmationState::ChainPreconditionPending {
            generation: Generation::default().next(),
            build: build_data(2_500),
            ticket: PreparationTicket {
                account: "ata".to_string(),
                payload: Vec::new(),
                description: String::new(),
            },
        };
        assert!(matches!(
            h.controller.refresh_precondition().await,
            Err(ControllerError::NoActiveIntent("refresh precondition"))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_submits_and_ends_session() {
        let mut h = harness(Chain::Ethereum);
        h.controller.request_build(intent(1_000), Some(route_summary(2_500)));
        h.controller.wait_for_quote().await;

        match h.controller.confirm().await.unwrap() {
            ConfirmOutcome::Submitted(handle) => assert_eq!(handle.chain, Chain::Ethereum),
            other => panic!("expected submission, got {:?}", other),
        }
        assert_eq!(h.submitter.submitted.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.phase(), Phase::Idle);
        assert!(h.controller.intent().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_precondition_round_trip() {
        let mut h = harness(Chain::Solana);
        let preparer = Arc::new(ToggleAccountPreparer::default());
        h.controller = h.controller.with_preparer(preparer.clone());

        h.controller.request_build(intent(1_000), Some(route_summary(2_500)));
        h.controller.wait_for_quote().await;
        assert!(h.controller.can_confirm());

        match h.controller.confirm().await.unwrap() {
            ConfirmOutcome::PreparationRequired(ticket) => assert_eq!(ticket.account, "0xsender:0xa0b8"),
            other => panic!("expected preparation, got {:?}", other),
        }
        assert_eq!(h.controller.phase(), Phase::ChainPreconditionPending);
        assert!(!h.controller.can_confirm());
        assert!(h.controller.confirm().await.is_err());

        h.controller.refresh_precondition().await.unwrap();
        assert_eq!(h.controller.phase(), Phase::ChainPreconditionPending);

        preparer.exists.store(true, Ordering::SeqCst);
        h.controller.refresh_precondition().await.unwrap();
        assert_eq!(h.controller.phase(), Phase::Ready);

        let outcome = h.controller.confirm().await.unwrap();
        assert!(matches!(outcome, ConfirmOutcome::Submitted(_)));
        assert_eq!(h.submitter.submitted.load(Ordering::SeqCst), 1);
        // Known-prepared accounts are not checked again before submitting.
        assert_eq!(preparer.checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_cancels_in_flight_build() {
        let mut h = harness(Chain::Ethereum);
        h.service.on_amount(2_500, Duration::from_millis(5000), MockOutcome::Ok(build_data(2_500)));

        h.controller.request_build(intent(1_000), Some(route_summary(2_500)));
        tokio::task::yield_now().await;
        h.controller.dismiss();
        assert_eq!(h.controller.phase(), Phase::Idle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.controller.wait_for_quote().await, &ConfirmationState::Idle);
        assert_eq!(h.service.completed(), 0);
    }
}
