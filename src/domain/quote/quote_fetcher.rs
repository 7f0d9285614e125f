//! Generation-tracked route building with a minimum latency floor

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    BuildRouteRequest, BuildRouteService, Generation, QuoteResult, RouteSummary, TradeIntent,
    ROUTE_SUMMARY_MISSING,
};

/// Fetcher settings
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Results never arrive sooner than this after the call.
    pub min_latency: Duration,
    /// Static tag sent as `source` on every build.
    pub source: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(1000),
            source: "routeguard".to_string(),
        }
    }
}

/// A result tagged with the generation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub generation: Generation,
    pub result: QuoteResult,
}

enum InFlight {
    /// Settled locally, no request was made.
    Ready(QuoteResult),
    Running(JoinHandle<QuoteResult>),
}

/// Issues build requests, one generation at a time.
pub struct QuoteFetcher {
    service: Arc<dyn BuildRouteService>,
    config: FetcherConfig,
    generation: Generation,
    in_flight: Option<(Generation, InFlight)>,
}

impl QuoteFetcher {
    pub fn new(service: Arc<dyn BuildRouteService>, config: FetcherConfig) -> Self {
        Self {
            service,
            config,
            generation: Generation::default(),
            in_flight: None,
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Generation of the most recent `fetch`.
    pub fn current_generation(&self) -> Generation {
        self.generation
    }

    pub fn has_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// One build without generation tracking: validate, call, hold until the floor.
    pub async fn build(&self, intent: &TradeIntent, summary: Option<&RouteSummary>) -> QuoteResult {
        match prepare(intent, summary, &self.config.source) {
            Ok(request) => build_with_floor(self.service.as_ref(), request, self.config.min_latency).await,
            Err(failure) => failure,
        }
    }

    /// Starts a new generation, superseding whatever was in flight.
    pub fn fetch(&mut self, intent: &TradeIntent, summary: Option<&RouteSummary>) -> Generation {
        self.cancel();
        self.generation = self.generation.next();
        let generation = self.generation;

        let pending = match prepare(intent, summary, &self.config.source) {
            Ok(request) => {
                info!("🔨 Building route {} for {} -> {}", generation, intent.token_in, intent.token_out);
                let service = Arc::clone(&self.service);
                let floor = self.config.min_latency;
                InFlight::Running(tokio::spawn(async move {
                    build_with_floor(service.as_ref(), request, floor).await
                }))
            }
            Err(failure) => {
                debug!("Build {} rejected locally: {:?}", generation, failure.failure_message());
                InFlight::Ready(failure)
            }
        };

        self.in_flight = Some((generation, pending));
        generation
    }

    /// Aborts the in-flight request, if any. Its result is never delivered.
    pub fn cancel(&mut self) {
        if let Some((generation, InFlight::Running(handle))) = self.in_flight.take() {
            if !handle.is_finished() {
                debug!("Cancelling superseded build {}", generation);
            }
            handle.abort();
        }
    }

    /// Waits for the current generation. `None` when nothing is pending.
    ///
    /// Cancel-safe: dropping this future leaves the request pending.
    pub async fn next_delivery(&mut self) -> Option<Delivery> {
        let (generation, pending) = self.in_flight.as_mut()?;
        let generation = *generation;

        let result = match pending {
            InFlight::Ready(result) => result.clone(),
            InFlight::Running(handle) => match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => {
                    self.in_flight = None;
                    return None;
                }
                Err(e) => {
                    warn!("Build {} task failed: {}", generation, e);
                    QuoteResult::failure(None)
                }
            },
        };

        self.in_flight = None;
        Some(Delivery { generation, result })
    }
}

impl Drop for QuoteFetcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn prepare(intent: &TradeIntent, summary: Option<&RouteSummary>, source: &str) -> Result<BuildRouteRequest, QuoteResult> {
    intent.validate().map_err(|reason| QuoteResult::Failure(reason.to_string()))?;
    let summary = summary.ok_or_else(|| QuoteResult::Failure(ROUTE_SUMMARY_MISSING.to_string()))?;
    Ok(BuildRouteRequest::new(intent, summary, source, Utc::now()))
}

async fn build_with_floor(service: &dyn BuildRouteService, request: BuildRouteRequest, floor: Duration) -> QuoteResult {
    let (outcome, _) = tokio::join!(service.build_route(&request), tokio::time::sleep(floor));
    match outcome {
        Ok(data) => QuoteResult::Success(data),
        Err(e) => {
            warn!("❌ Route build failed: {}", e);
            QuoteResult::failure(e.user_message())
        }
    }
}
