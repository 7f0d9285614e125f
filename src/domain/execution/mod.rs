//! Execution domain - handing a confirmed route to whoever broadcasts it

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::quote::Generation;
use crate::shared::errors::SubmissionError;
use crate::shared::types::Chain;

/// A confirmed route ready to be signed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub chain: Chain,
    pub sender: String,
    pub router_address: String,
    /// Encoded transaction payload from the build, hex.
    pub payload: String,
    pub generation: Generation,
}

/// Receipt for a submitted route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub id: String,
    pub chain: Chain,
    pub submitted_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionHandle, SubmissionError>;
}
