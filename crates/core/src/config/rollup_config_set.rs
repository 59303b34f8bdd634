use alloy_primitives::ChainId;
use sentinel_types::{BlockInfo, DerivedRefPair};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Genesis provides the genesis information relevant for the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// The L1 block that the rollup starts after.
    pub l1: BlockInfo,
    /// The L2 block that the rollup starts from.
    pub l2: BlockInfo,
}

impl Genesis {
    /// Creates a new [`Genesis`] instance.
    pub const fn new(l1: BlockInfo, l2: BlockInfo) -> Self {
        Self { l1, l2 }
    }

    /// Returns the anchor [`DerivedRefPair`] of the chain.
    pub const fn get_derived_pair(&self) -> DerivedRefPair {
        DerivedRefPair { source: self.l1, derived: self.l2 }
    }
}

/// RollupConfig contains the configuration for the rollup chain, as needed by the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// The genesis information of the rollup chain.
    pub genesis: Genesis,
    /// The block time of the rollup chain, in seconds.
    pub block_time: u64,
    /// The timestamp at which interop activates, if scheduled.
    pub interop_time: Option<u64>,
}

impl RollupConfig {
    /// Creates a new [`RollupConfig`] instance.
    pub const fn new(genesis: Genesis, block_time: u64, interop_time: Option<u64>) -> Self {
        Self { genesis, block_time, interop_time }
    }

    /// Returns `true` if interop is active at the given timestamp.
    pub fn is_interop(&self, timestamp: u64) -> bool {
        self.interop_time.is_some_and(|t| timestamp >= t)
    }

    /// Returns `true` if the block at the given timestamp is strictly after the interop
    /// activation block.
    pub fn is_post_interop(&self, timestamp: u64) -> bool {
        self.is_interop(timestamp.saturating_sub(self.block_time))
    }

    /// Returns `true` if the given block is the interop activation block.
    pub fn is_interop_activation_block(&self, block: BlockInfo) -> bool {
        self.is_interop(block.timestamp) &&
            !self.is_interop(block.timestamp.saturating_sub(self.block_time))
    }
}

/// RollupConfigSet contains the rollup configurations of all supervised chains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfigSet {
    /// Per-chain rollup configuration, keyed by chain id.
    pub rollups: HashMap<ChainId, RollupConfig>,
}

impl RollupConfigSet {
    /// Creates a new [`RollupConfigSet`] instance.
    pub const fn new(rollups: HashMap<ChainId, RollupConfig>) -> Self {
        Self { rollups }
    }

    /// Returns the [`RollupConfig`] of the given chain, if present.
    pub fn get(&self, chain_id: ChainId) -> Option<&RollupConfig> {
        self.rollups.get(&chain_id)
    }

    /// Returns `true` if the given timestamp is strictly after interop activation on the chain.
    pub fn is_post_interop(&self, chain_id: ChainId, timestamp: u64) -> bool {
        self.get(chain_id).is_some_and(|config| config.is_post_interop(timestamp))
    }

    /// Returns `true` if the given block is the interop activation block of the chain.
    pub fn is_interop_activation_block(&self, chain_id: ChainId, block: BlockInfo) -> bool {
        self.get(chain_id).is_some_and(|config| config.is_interop_activation_block(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn mock_config() -> RollupConfig {
        RollupConfig { genesis: Genesis::default(), block_time: 10, interop_time: Some(100) }
    }

    fn block_at(timestamp: u64) -> BlockInfo {
        BlockInfo::new(B256::ZERO, 1, B256::ZERO, timestamp)
    }

    #[test]
    fn test_is_interop() {
        let config = mock_config();
        assert!(!config.is_interop(99));
        assert!(config.is_interop(100));
        assert!(config.is_interop(150));

        let no_interop = RollupConfig { interop_time: None, ..mock_config() };
        assert!(!no_interop.is_interop(150));
    }

    #[test]
    fn test_is_post_interop() {
        let config = mock_config();
        // 110 is the first timestamp whose parent block is already post-activation
        assert!(!config.is_post_interop(100));
        assert!(!config.is_post_interop(109));
        assert!(config.is_post_interop(110));
    }

    #[test]
    fn test_is_interop_activation_block() {
        let config = mock_config();
        assert!(!config.is_interop_activation_block(block_at(90)));
        assert!(config.is_interop_activation_block(block_at(100)));
        assert!(config.is_interop_activation_block(block_at(105)));
        assert!(!config.is_interop_activation_block(block_at(110)));
    }

    #[test]
    fn test_config_set_lookups() {
        let mut rollups = HashMap::new();
        rollups.insert(1, mock_config());
        let set = RollupConfigSet::new(rollups);

        assert!(set.is_post_interop(1, 110));
        assert!(!set.is_post_interop(2, 110));
        assert!(set.is_interop_activation_block(1, block_at(100)));
        assert!(!set.is_interop_activation_block(2, block_at(100)));
    }
}
