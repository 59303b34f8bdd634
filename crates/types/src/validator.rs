//! Link-timing validation for cross-chain messages.

use crate::BlockInfo;
use alloy_primitives::ChainId;
use thiserror::Error;

/// Validates the timing rules that link an initiating message to its executing message.
///
/// Implemented by the rollup-config-backed supervisor configuration.
pub trait InteropValidator: Send + Sync {
    /// Validates that the initiating and executing timestamps satisfy the interop invariants,
    /// including message expiry with an optional execution timeout.
    fn validate_interop_timestamps(
        &self,
        initiating_chain_id: ChainId,
        initiating_timestamp: u64,
        executing_chain_id: ChainId,
        executing_timestamp: u64,
        timeout: Option<u64>,
    ) -> Result<(), InteropValidationError>;

    /// Returns `true` if interop is active on the given chain at the given timestamp.
    fn is_post_interop(&self, chain_id: ChainId, timestamp: u64) -> bool;

    /// Returns `true` if the given block is the interop activation block of the chain.
    fn is_interop_activation_block(&self, chain_id: ChainId, block: BlockInfo) -> bool;
}

/// Violations of the interop timestamp invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteropValidationError {
    /// Interop is not enabled on one of the chains at the relevant timestamp.
    #[error("interop is not enabled for the given timestamps")]
    InteropNotEnabled,

    /// The executing timestamp precedes the initiating timestamp.
    #[error("invalid timestamp invariant, initiating: {initiating}, executing: {executing}")]
    InvalidTimestampInvariant {
        /// Timestamp of the initiating message.
        initiating: u64,
        /// Timestamp of the executing message.
        executing: u64,
    },

    /// The message has expired by the time of execution.
    #[error("invalid interop timestamp: {0}")]
    InvalidInteropTimestamp(u64),
}
