//! Domain layer - core business logic and entities

pub mod account;
pub mod confirmation;
pub mod execution;
pub mod quote;
pub mod staleness;
