//! Capability traits consumed by the supervisor core.
//!
//! The concrete database engine lives behind these traits. Implementations are expected to
//! provide persistent, thread-safe access; all append paths are append-only and validate
//! parent linkage before writing.

use crate::StorageError;
use alloy_eips::eip1898::BlockNumHash;
use sentinel_types::{BlockInfo, DerivedRefPair, Log, SafetyLevel, SuperHead};
use std::fmt::Debug;

/// Read access to the derivation index, which maps derived (L2) blocks to the L1 source
/// blocks they were derived from.
pub trait DerivationStorageReader: Debug {
    /// Returns the L1 source [`BlockInfo`] the given derived block was derived from.
    ///
    /// Local-unsafe blocks have no derivation record yet, so looking them up yields
    /// [`StorageError::FutureData`].
    fn derived_to_source(&self, derived_block_id: BlockNumHash) -> Result<BlockInfo, StorageError>;

    /// Returns the latest derived [`BlockInfo`] recorded for the given L1 source block.
    fn latest_derived_block_at_source(
        &self,
        source_block_id: BlockNumHash,
    ) -> Result<BlockInfo, StorageError>;

    /// Returns the latest recorded derivation state: the newest source block together with the
    /// newest block derived from it.
    fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError>;

    /// Returns the recorded L1 source block at the given height.
    fn get_source_block(&self, source_block_number: u64) -> Result<BlockInfo, StorageError>;

    /// Returns the interop activation block of the chain, the lower bound of every
    /// bisection-based reset.
    fn get_activation_block(&self) -> Result<BlockInfo, StorageError>;
}

/// Write access to the derivation index.
pub trait DerivationStorageWriter: Debug {
    /// Writes the anchor derivation pair. Called once when the chain's interop activation
    /// block is observed.
    fn initialise_derivation_storage(
        &self,
        incoming_pair: DerivedRefPair,
    ) -> Result<(), StorageError>;

    /// Appends a derivation pair.
    ///
    /// Re-writing an identical pair at an existing height is a no-op; a differing pair at an
    /// existing height fails with [`StorageError::ConflictError`]. The incoming derived block
    /// must extend the latest stored derived block, else [`StorageError::BlockOutOfOrder`] or
    /// [`StorageError::FutureData`] is returned.
    fn save_derived_block(&self, incoming_pair: DerivedRefPair) -> Result<(), StorageError>;

    /// Appends an L1 source block traversed by derivation without a new derived block.
    /// Idempotent for identical re-writes, conflict otherwise.
    fn save_source_block(&self, source: BlockInfo) -> Result<(), StorageError>;
}

/// Combined read/write access to the derivation index.
pub trait DerivationStorage: DerivationStorageReader + DerivationStorageWriter {}

impl<T: DerivationStorageReader + DerivationStorageWriter> DerivationStorage for T {}

/// Read access to the per-block log index.
pub trait LogStorageReader: Debug {
    /// Returns the latest indexed [`BlockInfo`].
    fn get_latest_block(&self) -> Result<BlockInfo, StorageError>;

    /// Returns the indexed [`BlockInfo`] at the given height.
    ///
    /// Heights ahead of the latest indexed block yield [`StorageError::FutureData`]; a stored
    /// block that disagrees with the chain yields lookups elsewhere, never here.
    fn get_block(&self, block_number: u64) -> Result<BlockInfo, StorageError>;

    /// Returns the [`Log`] at the given block height and log index.
    fn get_log(&self, block_number: u64, log_index: u32) -> Result<Log, StorageError>;

    /// Returns all [`Log`]s of the block at the given height.
    fn get_logs(&self, block_number: u64) -> Result<Vec<Log>, StorageError>;
}

/// Write access to the per-block log index.
pub trait LogStorageWriter: Send + Sync + Debug {
    /// Writes the anchor block of the log index. Called once per chain.
    fn initialise_log_storage(&self, block: BlockInfo) -> Result<(), StorageError>;

    /// Appends a block and its logs. The incoming block must be the child of the latest
    /// stored block; [`StorageError::ReorgRequired`] signals a parent-hash mismatch at the
    /// same height and [`StorageError::FutureData`] a gap.
    fn store_block_logs(&self, block: &BlockInfo, logs: Vec<Log>) -> Result<(), StorageError>;
}

/// Combined read/write access to the log index.
pub trait LogStorage: LogStorageReader + LogStorageWriter {}

impl<T: LogStorageReader + LogStorageWriter> LogStorage for T {}

/// Read access to the per-safety-level head references.
pub trait HeadRefStorageReader: Debug {
    /// Returns the current head [`BlockInfo`] recorded for the given [`SafetyLevel`].
    fn get_safety_head_ref(&self, safety_level: SafetyLevel) -> Result<BlockInfo, StorageError>;

    /// Returns the heads of the chain across all safety levels.
    fn get_super_head(&self) -> Result<SuperHead, StorageError>;
}

/// Write access to the per-safety-level head references.
pub trait HeadRefStorageWriter: Debug {
    /// Advances the finalized head to the newest derived block whose source is at or below
    /// the given finalized L1 block, returning the new finalized head.
    fn update_finalized_using_source(
        &self,
        finalized_source_block: BlockInfo,
    ) -> Result<BlockInfo, StorageError>;

    /// Sets the cross-unsafe head. Fails if the block is no longer present in the log index
    /// (removed by a rewind) or disagrees with the stored block at that height.
    fn update_current_cross_unsafe(&self, block: &BlockInfo) -> Result<(), StorageError>;

    /// Sets the cross-safe head, returning the derivation pair of the new head. Fails if the
    /// block is no longer present in the derivation index.
    fn update_current_cross_safe(&self, block: &BlockInfo) -> Result<DerivedRefPair, StorageError>;
}

/// Combined read/write access to the head references.
pub trait HeadRefStorage: HeadRefStorageReader + HeadRefStorageWriter {}

impl<T: HeadRefStorageReader + HeadRefStorageWriter> HeadRefStorage for T {}

/// Access to the supervisor-wide finalized L1 block reference.
pub trait FinalizedL1Storage {
    /// Records a new finalized L1 block.
    fn update_finalized_l1(&self, block: BlockInfo) -> Result<(), StorageError>;

    /// Returns the recorded finalized L1 block.
    fn get_finalized_l1(&self) -> Result<BlockInfo, StorageError>;
}

/// Rewind access to supervisor state.
///
/// Used during chain reorganizations and when invalid blocks must be rolled back.
pub trait StorageRewinder {
    /// Registers a fetched block with the rewinder before its logs are committed, so a reorg
    /// walk-back has a reference even if log processing never completes.
    fn accept_block(&self, block: &BlockInfo) -> Result<(), StorageError>;

    /// Rewinds the log index from the latest block down to the given block (inclusive).
    ///
    /// Refuses to cross the local-safe head; use [`StorageRewinder::rewind`] for that.
    fn rewind_log_storage(&self, to: &BlockNumHash) -> Result<(), StorageError>;

    /// Rewinds all supervisor state (log index, derivation index, head references) from the
    /// latest block down to the given block (inclusive).
    fn rewind(&self, to: &BlockNumHash) -> Result<(), StorageError>;

    /// Rewinds to the given L1 source block (inclusive), unwinding every derived block and
    /// log recorded under it. Returns the derived block rewound to, if any.
    fn rewind_to_source(&self, to: &BlockNumHash) -> Result<Option<BlockInfo>, StorageError>;
}

/// Combined read access across all storage components.
pub trait DbReader: DerivationStorageReader + HeadRefStorageReader + LogStorageReader {}

impl<T: DerivationStorageReader + HeadRefStorageReader + LogStorageReader> DbReader for T {}
