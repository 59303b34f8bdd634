//! Per-chain head snapshot across all safety levels.

use crate::BlockInfo;

/// The heads of one chain at every tracked safety level.
///
/// Local-unsafe is the only head guaranteed to exist once a chain is indexed at all; the others
/// appear as derivation and cross-chain verification catch up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuperHead {
    /// The L1 source block the local-safe head was derived from.
    pub l1_source: Option<BlockInfo>,
    /// The local-unsafe head.
    pub local_unsafe: BlockInfo,
    /// The cross-unsafe head.
    pub cross_unsafe: Option<BlockInfo>,
    /// The local-safe head.
    pub local_safe: Option<BlockInfo>,
    /// The cross-safe head.
    pub cross_safe: Option<BlockInfo>,
    /// The finalized head.
    pub finalized: Option<BlockInfo>,
}
