//! Scripted build-route service for tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{BuildData, BuildRouteRequest, BuildRouteService, RouteSummary};
use crate::shared::errors::BuildRouteError;

#[derive(Debug, Clone)]
pub enum MockOutcome {
    Ok(BuildData),
    Api(i64, String),
    Unknown,
}

/// Answers by route summary `amount_out` first, then from a FIFO queue,
/// else echoes the summary's amount back with no delay.
#[derive(Default)]
pub struct MockBuildRouteService {
    by_amount: Mutex<HashMap<u128, (Duration, MockOutcome)>>,
    queue: Mutex<VecDeque<(Duration, MockOutcome)>>,
    requests: Mutex<Vec<BuildRouteRequest>>,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl MockBuildRouteService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, delay: Duration, outcome: MockOutcome) {
        self.queue.lock().unwrap().push_back((delay, outcome));
    }

    pub fn on_amount(&self, amount_out: u128, delay: Duration, outcome: MockOutcome) {
        self.by_amount.lock().unwrap().insert(amount_out, (delay, outcome));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to the end of their delay.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<BuildRouteRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl BuildRouteService for MockBuildRouteService {
    async fn build_route(&self, request: &BuildRouteRequest) -> Result<BuildData, BuildRouteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let amount = request.route_summary.amount_out;
        let scripted = self.by_amount.lock().unwrap().get(&amount).cloned();
        let scripted = scripted.or_else(|| self.queue.lock().unwrap().pop_front());
        let (delay, outcome) = scripted.unwrap_or((Duration::ZERO, MockOutcome::Ok(build_data(amount))));

        tokio::time::sleep(delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);

        match outcome {
            MockOutcome::Ok(data) => Ok(data),
            MockOutcome::Api(code, message) => Err(BuildRouteError::Api { code, message }),
            MockOutcome::Unknown => Err(BuildRouteError::Unknown),
        }
    }
}

pub fn route_summary(amount_out: u128) -> RouteSummary {
    serde_json::from_value(serde_json::json!({
        "tokenIn": "0xeeee",
        "amountIn": "1000",
        "tokenOut": "0xa0b8",
        "amountOut": amount_out.to_string(),
        "gas": "180000"
    }))
    .unwrap()
}

pub fn build_data(amount_out: u128) -> BuildData {
    BuildData {
        data: "0xe21fd0e9".to_string(),
        amount_in: 1_000,
        amount_in_usd: None,
        amount_out,
        amount_out_usd: None,
        gas: 180_000,
        gas_usd: None,
        router_address: "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5".to_string(),
        output_change: None,
    }
}
