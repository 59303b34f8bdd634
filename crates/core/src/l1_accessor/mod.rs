//! L1 Accessor Module
//! Tracks the L1 chain tip and finalized block by polling, guards reads behind a confirmation
//! depth, and raises rewind signals on parent-hash mismatches.

mod accessor;
pub use accessor::{L1Accessor, L1AccessorError, L1BlockRefSource, RewindHandler};
