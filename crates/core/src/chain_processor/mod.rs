//! Chain Processor Module
//! This module implements the per-chain processing pipeline: incoming
//! [`ChainEvent`](crate::event::ChainEvent)s are applied to the chain database, forwarded to
//! the managed node, or handed to the [`ChainIndexer`](crate::indexing::ChainIndexer) for
//! receipt backfilling.
mod error;
pub use error::ChainProcessorError;

mod chain;
pub use chain::ChainProcessor;

mod metrics;
pub(crate) use metrics::Metrics;

mod state;
pub use state::ProcessorState;
