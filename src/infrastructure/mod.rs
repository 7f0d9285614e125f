//! Infrastructure layer - HTTP, RPC and runtime adapters behind the domain traits

pub mod aggregator;
pub mod blockchain;
pub mod submission;
pub mod timer;

pub use aggregator::AggregatorApiClient;
pub use blockchain::AssociatedTokenAccountPreparer;
pub use submission::SimulatedSubmitter;
pub use timer::ScopedTicker;
