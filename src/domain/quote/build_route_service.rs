//! Aggregator service interfaces

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{BuildData, RouteSummary, TradeIntent};
use crate::shared::errors::BuildRouteError;

const MAX_DEADLINE_SECS: u64 = 365 * 24 * 60 * 60;

/// Body of a build-route call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRouteRequest {
    pub route_summary: RouteSummary,
    /// Unix seconds.
    pub deadline: i64,
    pub slippage_tolerance: u32,
    pub sender: String,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<String>,
    pub source: String,
}

impl BuildRouteRequest {
    pub fn new(intent: &TradeIntent, summary: &RouteSummary, source: &str, now: DateTime<Utc>) -> Self {
        let window = Duration::seconds(intent.deadline_secs.min(MAX_DEADLINE_SECS) as i64);
        Self {
            route_summary: summary.clone(),
            deadline: (now + window).timestamp(),
            slippage_tolerance: intent.slippage_bps,
            sender: intent.sender.clone(),
            recipient: intent.effective_recipient().to_string(),
            referral: intent.referral.clone(),
            source: source.to_string(),
        }
    }
}

/// Parameters of a route lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuery {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: u128,
}

impl From<&TradeIntent> for RouteQuery {
    fn from(intent: &TradeIntent) -> Self {
        Self {
            token_in: intent.token_in.clone(),
            token_out: intent.token_out.clone(),
            amount_in: intent.amount_in,
        }
    }
}

/// Turns a route summary into an executable transaction.
#[async_trait]
pub trait BuildRouteService: Send + Sync {
    async fn build_route(&self, request: &BuildRouteRequest) -> Result<BuildData, BuildRouteError>;
}

/// Finds the best route for a trade; its output is what the user sees first.
#[async_trait]
pub trait RouteSummaryService: Send + Sync {
    async fn get_route(&self, query: &RouteQuery) -> Result<RouteSummary, BuildRouteError>;
}
