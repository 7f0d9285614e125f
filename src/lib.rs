//! Routeguard - aggregator route building with staleness-guarded confirmation
//! Built with Domain-Driven Design principles

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use domain::confirmation::ConfirmationController;
pub use domain::quote::QuoteFetcher;
pub use domain::staleness::StalenessGuard;
