//! Application layer - use cases and services

pub mod commands;
pub mod services;

pub use commands::{Cli, CommandExecutor, Commands};
pub use services::ConfirmationService;
