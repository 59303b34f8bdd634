//! Supervisor-wide and per-chain sync status snapshots.

use crate::BlockInfo;
use alloy_primitives::ChainId;
use std::collections::HashMap;

/// The last known heads of a single chain, as reported by its node and the cross-safety
/// workers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSyncStatus {
    /// The L1 block the chain's derivation currently reads from.
    pub current_l1: BlockInfo,
    /// The local-unsafe head.
    pub local_unsafe: BlockInfo,
    /// The local-safe head.
    pub local_safe: BlockInfo,
    /// The cross-unsafe head.
    pub cross_unsafe: BlockInfo,
    /// The cross-safe head.
    ///
    /// Serialized as `safe`; fault-proof releases depend on that field name.
    #[serde(rename = "safe")]
    pub cross_safe: BlockInfo,
    /// The finalized head.
    pub finalized: BlockInfo,
}

/// An aggregate snapshot across every supervised chain.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// The lowest `current_l1` across all chains.
    pub min_synced_l1: BlockInfo,
    /// The lowest cross-safe timestamp across all chains.
    ///
    /// Serialized as `safeTimestamp`; fault-proof releases depend on that field name.
    #[serde(rename = "safeTimestamp")]
    pub cross_safe_timestamp: u64,
    /// The lowest finalized timestamp across all chains.
    pub finalized_timestamp: u64,
    /// The individual status of every tracked chain.
    pub chains: HashMap<ChainId, ChainSyncStatus>,
}
