//! Consistent read handles for multi-entry validation.
//!
//! An access-list check reads several blocks and logs in sequence; a rewind landing in the
//! middle of that sequence must invalidate the whole check rather than let it observe a
//! mixed state. A [`StorageReadHandle`] records what the check depended on and reports, at
//! the end, whether any of it was mutated underneath.

use crate::StorageError;
use alloy_primitives::ChainId;
use std::fmt::Debug;

/// A read handle spanning one multi-entry validation.
///
/// The handle is released by dropping it.
pub trait StorageReadHandle: Debug + Send {
    /// Records that the validation depends on the derived block at the given timestamp.
    fn depend_on_derived_time(&self, chain_id: ChainId, timestamp: u64);

    /// Records that the validation depends on the source block at the given height.
    fn depend_on_source_block(&self, chain_id: ChainId, source_number: u64);

    /// Returns `true` if none of the recorded dependencies were invalidated by a concurrent
    /// mutation since the handle was acquired.
    fn is_valid(&self) -> bool;
}

/// Issues [`StorageReadHandle`]s over the live database.
pub trait ReadHandleProvider: Debug + Send + Sync {
    /// The handle type issued by this provider.
    type Handle: StorageReadHandle;

    /// Acquires a handle pinned to the current database state.
    fn acquire_handle(&self) -> Result<Self::Handle, StorageError>;
}
