//! Error handling for the application

use thiserror::Error;

use crate::domain::confirmation::Phase;

/// Build-route service errors
#[derive(Error, Debug)]
pub enum BuildRouteError {
    #[error("{message}")]
    Api { code: i64, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Transport failed without any usable message.
    #[error("")]
    Unknown,
}

impl BuildRouteError {
    /// Message suitable for the user, if the error carries one.
    pub fn user_message(&self) -> Option<String> {
        let message = match self {
            BuildRouteError::Api { message, .. } => message.trim().to_string(),
            BuildRouteError::Unknown => String::new(),
            other => other.to_string(),
        };
        if message.is_empty() {
            None
        } else {
            Some(message)
        }
    }
}

/// Confirmation state machine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: Phase, action: &'static str },

    #[error("No trade intent to retry")]
    NothingToRetry,

    #[error("No active trade intent to {0}")]
    NoActiveIntent(&'static str),

    #[error("Account preparation failed: {0}")]
    Precondition(String),

    #[error("Submission failed: {0}")]
    Submission(String),
}

/// Chain precondition errors
#[derive(Error, Debug)]
pub enum PreconditionError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Failed to encode preparation instruction: {0}")]
    Encode(String),
}

/// Submission errors
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Invalid transaction payload: {0}")]
    InvalidPayload(String),

    #[error("Submission rejected: {0}")]
    Rejected(String),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing value: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
