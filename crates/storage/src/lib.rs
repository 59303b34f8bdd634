//! Storage trait surface for the sentinel interop supervisor.
//!
//! The supervisor core consumes its authoritative per-chain database exclusively through the
//! capability traits defined here; the concrete engine is supplied by the embedding binary.

mod error;
pub use error::{EntryNotFoundError, StorageError};

mod traits;
pub use traits::{
    DbReader, DerivationStorage, DerivationStorageReader, DerivationStorageWriter,
    FinalizedL1Storage, HeadRefStorage, HeadRefStorageReader, HeadRefStorageWriter, LogStorage,
    LogStorageReader, LogStorageWriter, StorageRewinder,
};

mod handle;
pub use handle::{ReadHandleProvider, StorageReadHandle};
