//! Error types for supervisor storage operations.

use alloy_eips::eip1898::BlockNumHash;
use thiserror::Error;

/// Error type for all storage operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// A shared lock was poisoned by a panicking writer.
    #[error("lock poisoned")]
    LockPoisoned,

    /// The requested entry does not exist.
    #[error(transparent)]
    EntryNotFound(#[from] EntryNotFoundError),

    /// The requested block is ahead of anything stored; the data may arrive later.
    #[error("data not yet available")]
    FutureData,

    /// The storage was queried before its anchor was written.
    #[error("database not initialised")]
    DatabaseNotInitialised,

    /// Stored data exists at the queried position but disagrees with the query.
    #[error("data conflict encountered")]
    ConflictError,

    /// An append did not extend the latest stored block.
    #[error("block is out of order")]
    BlockOutOfOrder,

    /// The incoming block does not attach to stored state; earlier blocks must be unwound
    /// first.
    #[error("reorg required")]
    ReorgRequired,

    /// A log-storage rewind was requested past the local-safe head.
    #[error("cannot rewind log storage to {to:?}, beyond local safe head {local_safe:?}")]
    RewindBeyondLocalSafeHead {
        /// The requested rewind target.
        to: BlockNumHash,
        /// The current local-safe head.
        local_safe: BlockNumHash,
    },
}

/// The entry kinds a lookup can fail to find.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryNotFoundError {
    /// No derived blocks are recorded for the given source block.
    #[error("no derived blocks found for source block {0:?}")]
    MissingDerivedBlocks(BlockNumHash),

    /// The source block at the given height is not recorded.
    #[error("source block {0} not found")]
    SourceBlockNotFound(u64),

    /// The derived block at the given height is not recorded.
    #[error("derived block {0} not found")]
    DerivedBlockNotFound(u64),

    /// The log at the given position is not recorded.
    #[error("log not found at block {block_number}, index {log_index}")]
    LogNotFound {
        /// The block number queried.
        block_number: u64,
        /// The log index queried.
        log_index: u32,
    },
}
