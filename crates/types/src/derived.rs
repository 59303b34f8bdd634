//! Source/derived block pair types.

use crate::BlockInfo;
use alloy_eips::BlockNumHash;

/// A pair of block IDs linking an L2 block to the L1 block it was derived from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct DerivedIdPair {
    /// The ID of the L1 source block.
    pub source: BlockNumHash,
    /// The ID of the derived L2 block.
    pub derived: BlockNumHash,
}

/// A pair of block refs linking an L2 block to the L1 block it was derived from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRefPair {
    /// The L1 source block.
    pub source: BlockInfo,
    /// The derived L2 block.
    pub derived: BlockInfo,
}

impl DerivedRefPair {
    /// Returns this pair as a [`DerivedIdPair`].
    pub const fn to_id_pair(&self) -> DerivedIdPair {
        DerivedIdPair { source: self.source.id(), derived: self.derived.id() }
    }
}

impl core::fmt::Display for DerivedRefPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "source: {}, derived: {}", self.source, self.derived)
    }
}
