//! Dependency set configuration.

use crate::constants::MESSAGE_EXPIRY_WINDOW;
use alloy_primitives::ChainId;
use std::collections::HashMap;

/// Configuration of one chain's dependency entry.
///
/// Currently carries no per-chain settings; membership in the set is what matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDependency {}

/// The set of chains supervised together, with their interdependency settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySet {
    /// Dependency information per chain.
    pub dependencies: HashMap<ChainId, ChainDependency>,

    /// Overrides the message expiry window for this dependency set, when non-zero.
    pub override_message_expiry_window: Option<u64>,
}

impl DependencySet {
    /// Returns `true` if the given chain is part of this dependency set.
    pub fn has_chain(&self, chain_id: ChainId) -> bool {
        self.dependencies.contains_key(&chain_id)
    }

    /// Returns the chains in this dependency set, sorted ascending.
    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self.dependencies.keys().copied().collect();
        chains.sort_unstable();
        chains
    }

    /// Returns the message expiry window in effect for this dependency set.
    pub const fn get_message_expiry_window(&self) -> u64 {
        match self.override_message_expiry_window {
            Some(window) if window > 0 => window,
            _ => MESSAGE_EXPIRY_WINDOW,
        }
    }
}
