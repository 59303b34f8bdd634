//! Events published by a managed node over its event subscription.
//!
//! See: <https://specs.optimism.io/interop/managed-mode.html#node---supervisor>

use crate::{BlockInfo, DerivedRefPair};
use alloy_primitives::B256;
use derive_more::{Constructor, Display};

/// A block replacement, where a deposit-only block replaces an invalidated one.
#[derive(
    Debug, Clone, Copy, Display, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
#[display("replacement: {replacement}, invalidated: {invalidated}")]
pub struct BlockReplacement {
    /// The block that replaces the invalidated block.
    pub replacement: BlockInfo,
    /// Hash of the block being invalidated.
    pub invalidated: B256,
}

impl BlockReplacement {
    /// Creates a new [`BlockReplacement`].
    pub const fn new(replacement: BlockInfo, invalidated: B256) -> Self {
        Self { replacement, invalidated }
    }
}

/// An update pushed by the node to the supervisor.
///
/// At least one field is expected to be `Some`; multiple fields may be populated when the node
/// batches related updates into one notification.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Constructor, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEvent {
    /// The node requests a reset, with a reason. The supervisor is expected to respond with a
    /// reset call carrying the target heads.
    pub reset: Option<String>,

    /// A new unsafe L2 block advanced the node's local-unsafe head.
    pub unsafe_block: Option<BlockInfo>,

    /// An L2 block became local-safe, derived from the given L1 source.
    pub derivation_update: Option<DerivedRefPair>,

    /// The node ran out of L1 data at the given derivation point and is ready to receive the
    /// next L1 block from the supervisor.
    pub exhaust_l1: Option<DerivedRefPair>,

    /// A block was replaced by a deposit-only block.
    pub replace_block: Option<BlockReplacement>,

    /// The node's derivation moved to a new L1 origin.
    pub derivation_origin_update: Option<BlockInfo>,
}

impl core::fmt::Display for ManagedEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref reason) = self.reset {
            parts.push(format!("reset: {reason}"));
        }
        if let Some(ref block) = self.unsafe_block {
            parts.push(format!("unsafe_block: {block}"));
        }
        if let Some(ref pair) = self.derivation_update {
            parts.push(format!("derivation_update: {pair}"));
        }
        if let Some(ref pair) = self.exhaust_l1 {
            parts.push(format!("exhaust_l1: {pair}"));
        }
        if let Some(ref replacement) = self.replace_block {
            parts.push(format!("replace_block: {replacement}"));
        }
        if let Some(ref origin) = self.derivation_origin_update {
            parts.push(format!("derivation_origin_update: {origin}"));
        }

        if parts.is_empty() { write!(f, "none") } else { write!(f, "{}", parts.join(", ")) }
    }
}

/// A single notification received on the node's event subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEvent {
    /// The event payload, absent for keep-alive notifications.
    pub data: Option<ManagedEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn test_managed_event_display() {
        let event = ManagedEvent {
            reset: Some("reorg detected".to_string()),
            unsafe_block: Some(BlockInfo::new(B256::ZERO, 7, B256::ZERO, 700)),
            ..Default::default()
        };
        let rendered = event.to_string();
        assert!(rendered.starts_with("reset: reorg detected, unsafe_block:"));

        assert_eq!(ManagedEvent::default().to_string(), "none");
    }

    #[test]
    fn test_subscription_event_deserialize() {
        let json = r#"{"data":{"reset":"out of sync","unsafeBlock":null,"derivationUpdate":null,"exhaustL1":null,"replaceBlock":null,"derivationOriginUpdate":null}}"#;
        let event: SubscriptionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.data.unwrap().reset.unwrap(), "out of sync");
    }
}
