//! Block reference types shared across the supervisor.

use alloy_eips::BlockNumHash;
use alloy_primitives::B256;
use derive_more::Constructor;

/// Block header information for an L1 or L2 block.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    /// The block hash.
    pub hash: B256,
    /// The block number.
    #[serde(with = "alloy_serde::quantity")]
    pub number: u64,
    /// The parent block hash.
    pub parent_hash: B256,
    /// The block timestamp.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
}

impl BlockInfo {
    /// Instantiates a new [`BlockInfo`].
    pub const fn new(hash: B256, number: u64, parent_hash: B256, timestamp: u64) -> Self {
        Self { hash, number, parent_hash, timestamp }
    }

    /// Returns the block ID, a [`BlockNumHash`] of number and hash.
    pub const fn id(&self) -> BlockNumHash {
        BlockNumHash { number: self.number, hash: self.hash }
    }

}

impl core::fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "BlockInfo {{ hash: {}, number: {}, parent_hash: {}, timestamp: {} }}",
            self.hash, self.number, self.parent_hash, self.timestamp
        )
    }
}

/// An L2 block reference, extending [`BlockInfo`] with its L1 origin and position within the
/// epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct L2BlockInfo {
    /// The base block info.
    #[serde(flatten)]
    pub block_info: BlockInfo,
    /// The L1 origin of the L2 block.
    #[serde(rename = "l1origin", alias = "l1Origin")]
    pub l1_origin: BlockNumHash,
    /// The sequence number of the L2 block within the epoch.
    #[serde(rename = "sequenceNumber", alias = "seqNum", with = "alloy_serde::quantity")]
    pub seq_num: u64,
}

impl L2BlockInfo {
    /// Instantiates a new [`L2BlockInfo`].
    pub const fn new(block_info: BlockInfo, l1_origin: BlockNumHash, seq_num: u64) -> Self {
        Self { block_info, l1_origin, seq_num }
    }

    /// Returns the block ID of the L2 block.
    pub const fn id(&self) -> BlockNumHash {
        self.block_info.id()
    }
}

/// A sealed block reference, binding hash, number and timestamp of a fully committed block.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Constructor,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct BlockSeal {
    /// The block hash.
    pub hash: B256,
    /// The block number.
    #[serde(with = "alloy_serde::quantity")]
    pub number: u64,
    /// The block timestamp.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
}

impl core::fmt::Display for BlockSeal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "BlockSeal {{ hash: {}, number: {}, timestamp: {} }}",
            self.hash, self.number, self.timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_block_info_serde_roundtrip() {
        let block = BlockInfo::new(
            b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
            42,
            b256!("0x2222222222222222222222222222222222222222222222222222222222222222"),
            1717000000,
        );
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"number\":\"0x2a\""));
        let decoded: BlockInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_l2_block_info_deserializes_aliases() {
        let json = r#"{
            "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "number": "0x10",
            "parentHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "timestamp": "0x64",
            "l1Origin": {
                "hash": "0x3333333333333333333333333333333333333333333333333333333333333333",
                "number": 9
            },
            "seqNum": "0x2"
        }"#;
        let decoded: L2BlockInfo = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.block_info.number, 16);
        assert_eq!(decoded.l1_origin.number, 9);
        assert_eq!(decoded.seq_num, 2);
    }
}
