use crate::indexing::ChainIndexerError;
use sentinel_storage::StorageError;
use thiserror::Error;

/// Errors that may occur while processing chains in the supervisor core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainProcessorError {
    /// Represents an error that occurred while interacting with the storage layer.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// Represents an error that occurred while indexing block logs.
    #[error(transparent)]
    Indexer(#[from] ChainIndexerError),

    /// Represents an error that occurred while sending an event to the channel.
    #[error("failed to send event to channel: {0}")]
    ChannelSendFailed(String),
}
