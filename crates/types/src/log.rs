//! Indexed log types stored per block.

use alloy_primitives::B256;
use derive_more::Constructor;

/// A cross-chain message execution reference recovered from an indexed log.
///
/// The `hash` field commits to the initiating log: it is the log hash recomputed from the
/// executing message's payload hash and the initiating contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Constructor)]
pub struct ExecutingMessage {
    /// The chain ID of the chain the initiating message was emitted on.
    pub chain_id: u64,
    /// The block number containing the initiating message.
    pub block_number: u64,
    /// The index of the initiating log within its block.
    pub log_index: u32,
    /// The timestamp of the block containing the initiating message.
    pub timestamp: u64,
    /// The log hash of the initiating message.
    pub hash: B256,
}

/// A single log entry as stored by the log index.
#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Log {
    /// The index of the log within its block.
    pub index: u32,
    /// The log hash, committing to emitting address and payload.
    pub hash: B256,
    /// The executing message carried by this log, if it is a `CrossL2Inbox` execution.
    pub executing_message: Option<ExecutingMessage>,
}
