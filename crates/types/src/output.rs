//! Output roots and the aggregate super root.

use crate::constants::SUPER_ROOT_VERSION;
use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, Bytes, ChainId, U256, keccak256};
use serde::{Deserialize, Serialize};

/// Version 0 output root preimage of a single L2 block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OutputV0 {
    /// The state root hash.
    pub state_root: B256,
    /// Storage root of the message passer contract.
    pub message_passer_storage_root: B256,
    /// The block hash.
    pub block_hash: B256,
}

impl OutputV0 {
    /// Creates a new [`OutputV0`] instance.
    pub const fn new(
        state_root: B256,
        message_passer_storage_root: B256,
        block_hash: B256,
    ) -> Self {
        Self { state_root, message_passer_storage_root, block_hash }
    }
}

/// One chain's canonical output root, as committed to by a super root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRootWithChain {
    /// The chain ID.
    pub chain_id: ChainId,
    /// The canonical output root at the super root's timestamp.
    pub output_root: B256,
}

/// The preimage of a super root: a timestamp and the output roots of every chain in the
/// dependency set, sorted by chain ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperRoot {
    /// The timestamp the super root commits to.
    pub timestamp: u64,
    /// Per-chain canonical output roots, sorted ascending by chain ID.
    pub output_roots: Vec<OutputRootWithChain>,
}

impl SuperRoot {
    /// Hashes the super root preimage.
    ///
    /// Encoding: `version ++ be64(timestamp) ++ for each chain: be256(chain_id) ++ output_root`.
    pub fn hash(&self) -> B256 {
        let mut preimage = Vec::with_capacity(1 + 8 + self.output_roots.len() * 64);
        preimage.push(SUPER_ROOT_VERSION);
        preimage.extend_from_slice(&self.timestamp.to_be_bytes());
        for root in &self.output_roots {
            preimage.extend_from_slice(&U256::from(root.chain_id).to_be_bytes::<32>());
            preimage.extend_from_slice(root.output_root.as_slice());
        }
        keccak256(&preimage)
    }
}

/// One chain's contribution to a super root response.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRootInfo {
    /// The chain ID.
    #[serde(rename = "chainID", with = "alloy_serde::quantity")]
    pub chain_id: ChainId,
    /// The canonical output root of the latest canonical block at the queried timestamp.
    pub canonical: B256,
    /// The pending output root preimage: the output of the latest block at the queried
    /// timestamp prior to validation of executing messages.
    pub pending: Bytes,
}

/// The response of a super root query at a given timestamp.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperRootOutput {
    /// The highest L1 block needed to justify every chain's cross-safe state at the queried
    /// timestamp.
    pub cross_safe_derived_from: BlockNumHash,
    /// The queried timestamp.
    pub timestamp: u64,
    /// The super root hash.
    pub super_root: B256,
    /// Per-chain root information, sorted ascending by chain ID.
    pub chains: Vec<ChainRootInfo>,
    /// The super root version byte.
    pub version: u8,
}
