//! Log indexing pipeline.
//!
//! This module turns L2 block receipts into stored [`Log`](sentinel_types::Log) entries and
//! backfills the per-chain log storage from redundant block sources. Hashing follows the
//! interop messaging convention: the payload hash commits to topics and data, the log hash
//! additionally commits to the emitting address.

mod extract;
pub use extract::{
    log_to_log_hash, log_to_message_payload, logs_from_receipts, payload_hash_to_log_hash,
};

mod indexer;
pub use indexer::{ChainIndexer, ChainIndexerError};
