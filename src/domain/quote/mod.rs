//! Quote domain - trade intents, built routes and the fetcher that produces them

mod build_route_service;
mod quote_fetcher;
#[cfg(test)]
pub(crate) mod testing;

pub use build_route_service::{BuildRouteRequest, BuildRouteService, RouteQuery, RouteSummaryService};
pub use quote_fetcher::{Delivery, FetcherConfig, QuoteFetcher};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::types::{amount_string, signed_amount_string};

pub const WALLET_NOT_CONNECTED: &str = "wallet not connected";
pub const ROUTE_SUMMARY_MISSING: &str = "route summary missing";
pub const AMOUNT_NOT_POSITIVE: &str = "amount must be positive";
/// Shown when a failed build carries no message of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// What the user asked to trade. Rebuilt on every edit of amount, token or slippage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    pub token_in: String,
    pub token_out: String,
    /// Smallest unit of `token_in`.
    pub amount_in: u128,
    pub slippage_bps: u32,
    pub recipient: Option<String>,
    pub sender: String,
    pub referral: Option<String>,
    /// Seconds from now until the built transaction expires.
    pub deadline_secs: u64,
}

impl TradeIntent {
    pub fn new(token_in: impl Into<String>, token_out: impl Into<String>, amount_in: u128, sender: impl Into<String>) -> Self {
        Self {
            token_in: token_in.into(),
            token_out: token_out.into(),
            amount_in,
            slippage_bps: 50,
            recipient: None,
            sender: sender.into(),
            referral: None,
            deadline_secs: 1200,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u32) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_referral(mut self, referral: impl Into<String>) -> Self {
        self.referral = Some(referral.into());
        self
    }

    pub fn with_deadline_secs(mut self, deadline_secs: u64) -> Self {
        self.deadline_secs = deadline_secs;
        self
    }

    /// Recipient of the output, falling back to the sender.
    pub fn effective_recipient(&self) -> &str {
        match self.recipient.as_deref() {
            Some(r) if !r.trim().is_empty() => r,
            _ => &self.sender,
        }
    }

    /// Local checks that never need the network.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.sender.trim().is_empty() {
            return Err(WALLET_NOT_CONNECTED);
        }
        if self.amount_in == 0 {
            return Err(AMOUNT_NOT_POSITIVE);
        }
        Ok(())
    }
}

/// Route returned by the aggregator's route lookup, forwarded verbatim on build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub token_in: String,
    #[serde(with = "amount_string")]
    pub amount_in: u128,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_in_usd: Option<Decimal>,
    pub token_out: String,
    #[serde(with = "amount_string")]
    pub amount_out: u128,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_out_usd: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_usd: Option<Decimal>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub route: serde_json::Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RouteSummary {
    /// Estimate the user is looking at when they open the confirmation.
    pub fn estimate(&self) -> TradeEstimate {
        TradeEstimate { amount_out: self.amount_out }
    }
}

/// Previously displayed output amount, the baseline for staleness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeEstimate {
    pub amount_out: u128,
}

/// How bad a change in output is. Ordered from harmless to severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChangeSeverity {
    None,
    Low,
    Medium,
    High,
}

impl TryFrom<u8> for ChangeSeverity {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(ChangeSeverity::None),
            1 => Ok(ChangeSeverity::Low),
            2 => Ok(ChangeSeverity::Medium),
            3 => Ok(ChangeSeverity::High),
            other => Err(format!("unknown output change level {}", other)),
        }
    }
}

impl From<ChangeSeverity> for u8 {
    fn from(severity: ChangeSeverity) -> u8 {
        severity as u8
    }
}

impl fmt::Display for ChangeSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeSeverity::None => "none",
            ChangeSeverity::Low => "low",
            ChangeSeverity::Medium => "medium",
            ChangeSeverity::High => "high",
        };
        f.write_str(s)
    }
}

/// Deviation of the built output from the displayed estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputChange {
    /// Built minus displayed, in the output token's smallest unit.
    #[serde(with = "signed_amount_string")]
    pub amount: i128,
    #[serde(default)]
    pub percent: Decimal,
    pub level: ChangeSeverity,
}

impl OutputChange {
    pub fn is_adverse(&self) -> bool {
        self.level != ChangeSeverity::None
    }
}

/// Executable route returned by the build service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildData {
    /// Encoded transaction payload, hex.
    pub data: String,
    #[serde(with = "amount_string")]
    pub amount_in: u128,
    #[serde(default)]
    pub amount_in_usd: Option<Decimal>,
    #[serde(with = "amount_string")]
    pub amount_out: u128,
    #[serde(default)]
    pub amount_out_usd: Option<Decimal>,
    #[serde(with = "amount_string")]
    pub gas: u128,
    #[serde(default)]
    pub gas_usd: Option<Decimal>,
    pub router_address: String,
    #[serde(default)]
    pub output_change: Option<OutputChange>,
}

impl BuildData {
    pub fn has_adverse_change(&self) -> bool {
        self.output_change.as_ref().map(OutputChange::is_adverse).unwrap_or(false)
    }
}

/// Outcome of one build attempt. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteResult {
    Success(BuildData),
    Failure(String),
}

impl QuoteResult {
    /// Failure with the generic fallback when `message` is blank.
    pub fn failure(message: Option<String>) -> Self {
        match message {
            Some(m) if !m.trim().is_empty() => QuoteResult::Failure(m),
            _ => QuoteResult::Failure(GENERIC_FAILURE_MESSAGE.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QuoteResult::Success(_))
    }

    pub fn build_data(&self) -> Option<&BuildData> {
        match self {
            QuoteResult::Success(data) => Some(data),
            QuoteResult::Failure(_) => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            QuoteResult::Success(_) => None,
            QuoteResult::Failure(message) => Some(message),
        }
    }
}

/// Monotonic identity of one build attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
