//! Events emitted by supervisor components and dispatched per chain.

mod chain;
pub use chain::ChainEvent;
