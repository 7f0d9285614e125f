//! Solana account checks

pub mod ata_preparer;

pub use ata_preparer::{AssociatedTokenAccountPreparer, SPL_TOKEN_PROGRAM};
