//! Simulation-only submission

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::domain::execution::{SubmissionClient, SubmissionHandle, SubmissionRequest};
use crate::shared::errors::SubmissionError;
use crate::shared::utils::generate_id;

/// Checks the payload decodes and logs it instead of broadcasting.
#[derive(Debug, Default)]
pub struct SimulatedSubmitter;

impl SimulatedSubmitter {
    pub fn new() -> Self {
        Self
    }
}

/// Decodes a `0x`-prefixed (or bare) hex payload.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, SubmissionError> {
    let raw = payload.strip_prefix("0x").unwrap_or(payload);
    if raw.is_empty() {
        return Err(SubmissionError::InvalidPayload("empty payload".to_string()));
    }
    hex::decode(raw).map_err(|e| SubmissionError::InvalidPayload(e.to_string()))
}

#[async_trait]
impl SubmissionClient for SimulatedSubmitter {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionHandle, SubmissionError> {
        let bytes = decode_payload(&request.payload)?;
        if request.router_address.trim().is_empty() {
            return Err(SubmissionError::Rejected("missing router address".to_string()));
        }

        let handle = SubmissionHandle {
            id: generate_id(),
            chain: request.chain,
            submitted_at: Utc::now(),
        };
        info!(
            "🧪 Simulation mode - not broadcasting {} bytes from {} to router {} on {} ({})",
            bytes.len(),
            request.sender,
            request.router_address,
            request.chain,
            handle.id
        );
        Ok(handle)
    }
}
