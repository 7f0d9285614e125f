//! Account domain - who is trading and what their chain needs before a swap

use async_trait::async_trait;

use crate::shared::errors::PreconditionError;
use crate::shared::types::Chain;

/// Wallet/account context supplied by the connected wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub sender: Option<String>,
    pub chain: Chain,
}

impl AccountContext {
    pub fn new(sender: impl Into<String>, chain: Chain) -> Self {
        Self { sender: Some(sender.into()), chain }
    }

    pub fn disconnected(chain: Chain) -> Self {
        Self { sender: None, chain }
    }

    /// Sender address, empty when no wallet is connected.
    pub fn sender_or_empty(&self) -> &str {
        self.sender.as_deref().unwrap_or("")
    }

    pub fn requires_account_preparation(&self) -> bool {
        self.chain.requires_account_preparation()
    }
}

/// Out-of-band step the user must complete before the swap can be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparationTicket {
    /// Account that has to exist.
    pub account: String,
    /// Serialized instruction creating it.
    pub payload: Vec<u8>,
    pub description: String,
}

/// Chain-specific account preparation.
#[async_trait]
pub trait AccountPreparer: Send + Sync {
    /// Whether `owner` can receive `token_out` right now.
    async fn is_prepared(&self, owner: &str, token_out: &str) -> Result<bool, PreconditionError>;

    /// Describes the step that makes [`is_prepared`](Self::is_prepared) true.
    async fn prepare(&self, payer: &str, owner: &str, token_out: &str) -> Result<PreparationTicket, PreconditionError>;
}
