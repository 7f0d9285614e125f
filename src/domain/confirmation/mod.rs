//! Confirmation domain - gating the confirm action on a freshly built route

mod confirmation_controller;

pub use confirmation_controller::ConfirmationController;

use std::fmt;

use crate::domain::account::PreparationTicket;
use crate::domain::execution::SubmissionHandle;
use crate::domain::quote::{BuildData, Generation};

/// Coarse state of a confirmation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Loading,
    Error,
    NeedsAcceptance,
    Ready,
    ChainPreconditionPending,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Error => "error",
            Phase::NeedsAcceptance => "needs acceptance",
            Phase::Ready => "ready",
            Phase::ChainPreconditionPending => "chain precondition pending",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationState {
    Idle,
    Loading {
        generation: Generation,
    },
    Error {
        generation: Generation,
        message: String,
    },
    NeedsAcceptance {
        generation: Generation,
        build: BuildData,
    },
    Ready {
        generation: Generation,
        build: BuildData,
    },
    ChainPreconditionPending {
        generation: Generation,
        build: BuildData,
        ticket: PreparationTicket,
    },
}

impl ConfirmationState {
    pub fn phase(&self) -> Phase {
        match self {
            ConfirmationState::Idle => Phase::Idle,
            ConfirmationState::Loading { .. } => Phase::Loading,
            ConfirmationState::Error { .. } => Phase::Error,
            ConfirmationState::NeedsAcceptance { .. } => Phase::NeedsAcceptance,
            ConfirmationState::Ready { .. } => Phase::Ready,
            ConfirmationState::ChainPreconditionPending { .. } => Phase::ChainPreconditionPending,
        }
    }

    pub fn generation(&self) -> Option<Generation> {
        match self {
            ConfirmationState::Idle => None,
            ConfirmationState::Loading { generation }
            | ConfirmationState::Error { generation, .. }
            | ConfirmationState::NeedsAcceptance { generation, .. }
            | ConfirmationState::Ready { generation, .. }
            | ConfirmationState::ChainPreconditionPending { generation, .. } => Some(*generation),
        }
    }

    pub fn build(&self) -> Option<&BuildData> {
        match self {
            ConfirmationState::NeedsAcceptance { build, .. }
            | ConfirmationState::Ready { build, .. }
            | ConfirmationState::ChainPreconditionPending { build, .. } => Some(build),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConfirmationState::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// What `confirm` did.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// The account must be prepared first; the session moved to
    /// [`Phase::ChainPreconditionPending`].
    PreparationRequired(PreparationTicket),
    Submitted(SubmissionHandle),
}
