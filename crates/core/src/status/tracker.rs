use crate::{SupervisorError, event::ChainEvent};
use alloy_primitives::ChainId;
use sentinel_types::{BlockInfo, ChainSyncStatus, SyncStatus};
use std::{
    collections::HashMap,
    sync::RwLock,
};
use tracing::trace;

/// Tracks the latest safety heads reported by every chain and derives the aggregate
/// [`SyncStatus`].
///
/// Each per-chain event loop feeds its [`ChainEvent`]s into [`StatusTracker::on_event`] before
/// handing them to the chain processor, so the snapshot here always reflects what the processors
/// have observed.
#[derive(Debug, Default)]
pub struct StatusTracker {
    /// The last known heads per chain.
    status: RwLock<HashMap<ChainId, ChainSyncStatus>>,
}

impl StatusTracker {
    /// Creates an empty [`StatusTracker`].
    pub fn new() -> Self {
        Self { status: RwLock::new(HashMap::new()) }
    }

    /// Applies a [`ChainEvent`] to the tracked status of the given chain.
    ///
    /// Returns `true` if the event updated a head, `false` for event kinds the tracker does not
    /// observe.
    pub fn on_event(&self, chain_id: ChainId, event: &ChainEvent) -> bool {
        let mut status = self.status.write().unwrap_or_else(|err| err.into_inner());

        // only head-moving events create or mutate a chain entry
        match event {
            ChainEvent::DerivationOriginUpdate { origin } => {
                status.entry(chain_id).or_default().current_l1 = *origin;
            }
            ChainEvent::UnsafeBlock { block } => {
                status.entry(chain_id).or_default().local_unsafe = *block;
            }
            ChainEvent::DerivedBlock { derived_ref_pair } => {
                status.entry(chain_id).or_default().local_safe = derived_ref_pair.derived;
            }
            ChainEvent::CrossUnsafeUpdate { block } => {
                status.entry(chain_id).or_default().cross_unsafe = *block;
            }
            ChainEvent::CrossSafeUpdate { derived_ref_pair } => {
                status.entry(chain_id).or_default().cross_safe = derived_ref_pair.derived;
            }
            ChainEvent::FinalizedUpdate { block } => {
                status.entry(chain_id).or_default().finalized = *block;
            }
            _ => {
                trace!(
                    target: "supervisor::status",
                    chain_id = %chain_id,
                    ?event,
                    "Event not observed by status tracker"
                );
                return false;
            }
        }
        true
    }

    /// Returns the aggregate [`SyncStatus`] across all tracked chains.
    ///
    /// Errors with [`SupervisorError::SyncStatusNotReady`] until at least one chain has received
    /// an update, and with [`SupervisorError::L1HashMismatch`] when two chains report the same
    /// lowest L1 height with different hashes.
    pub fn sync_status(&self) -> Result<SyncStatus, SupervisorError> {
        let status = self.status.read().unwrap_or_else(|err| err.into_inner());
        if status.is_empty() {
            return Err(SupervisorError::SyncStatusNotReady);
        }

        let mut min_synced_l1: Option<BlockInfo> = None;
        let mut cross_safe_timestamp = u64::MAX;
        let mut finalized_timestamp = u64::MAX;

        for chain_status in status.values() {
            match min_synced_l1 {
                None => min_synced_l1 = Some(chain_status.current_l1),
                Some(current_min) => {
                    if chain_status.current_l1.number < current_min.number {
                        min_synced_l1 = Some(chain_status.current_l1);
                    } else if chain_status.current_l1.number == current_min.number &&
                        chain_status.current_l1.hash != current_min.hash
                    {
                        return Err(SupervisorError::L1HashMismatch {
                            expected: current_min.hash,
                            got: chain_status.current_l1.hash,
                        });
                    }
                }
            }

            cross_safe_timestamp = cross_safe_timestamp.min(chain_status.cross_safe.timestamp);
            finalized_timestamp = finalized_timestamp.min(chain_status.finalized.timestamp);
        }

        Ok(SyncStatus {
            // status is non-empty here, so the minimum is always set
            min_synced_l1: min_synced_l1.unwrap_or_default(),
            cross_safe_timestamp,
            finalized_timestamp,
            chains: status.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use sentinel_types::DerivedRefPair;

    fn block(number: u64, timestamp: u64) -> BlockInfo {
        BlockInfo::new(B256::with_last_byte(number as u8), number, B256::ZERO, timestamp)
    }

    #[test]
    fn test_sync_status_not_ready_without_updates() {
        let tracker = StatusTracker::new();
        assert!(matches!(tracker.sync_status(), Err(SupervisorError::SyncStatusNotReady)));
    }

    #[test]
    fn test_on_event_updates_heads() {
        let tracker = StatusTracker::new();
        let pair = DerivedRefPair { source: block(100, 1000), derived: block(5, 50) };

        assert!(tracker.on_event(1, &ChainEvent::DerivationOriginUpdate { origin: block(100, 1000) }));
        assert!(tracker.on_event(1, &ChainEvent::UnsafeBlock { block: block(8, 80) }));
        assert!(tracker.on_event(1, &ChainEvent::DerivedBlock { derived_ref_pair: pair }));
        assert!(tracker.on_event(1, &ChainEvent::CrossUnsafeUpdate { block: block(6, 60) }));
        assert!(tracker.on_event(1, &ChainEvent::CrossSafeUpdate { derived_ref_pair: pair }));
        assert!(tracker.on_event(1, &ChainEvent::FinalizedUpdate { block: block(3, 30) }));

        let status = tracker.sync_status().unwrap();
        let chain = &status.chains[&1];
        assert_eq!(chain.current_l1, block(100, 1000));
        assert_eq!(chain.local_unsafe, block(8, 80));
        assert_eq!(chain.local_safe, block(5, 50));
        assert_eq!(chain.cross_unsafe, block(6, 60));
        assert_eq!(chain.cross_safe, block(5, 50));
        assert_eq!(chain.finalized, block(3, 30));
    }

    #[test]
    fn test_on_event_ignores_other_events() {
        let tracker = StatusTracker::new();
        assert!(!tracker.on_event(
            1,
            &ChainEvent::FinalizedSourceUpdate { finalized_source_block: block(100, 1000) }
        ));
        assert!(!tracker.on_event(1, &ChainEvent::InvalidateBlock { block: block(5, 50) }));
        // unhandled events still do not make the status ready
        assert!(matches!(tracker.sync_status(), Err(SupervisorError::SyncStatusNotReady)));
    }

    #[test]
    fn test_sync_status_takes_minimums_across_chains() {
        let tracker = StatusTracker::new();

        tracker.on_event(1, &ChainEvent::DerivationOriginUpdate { origin: block(100, 1000) });
        tracker.on_event(1, &ChainEvent::CrossSafeUpdate {
            derived_ref_pair: DerivedRefPair { source: block(100, 1000), derived: block(20, 200) },
        });
        tracker.on_event(1, &ChainEvent::FinalizedUpdate { block: block(10, 100) });

        tracker.on_event(2, &ChainEvent::DerivationOriginUpdate { origin: block(90, 900) });
        tracker.on_event(2, &ChainEvent::CrossSafeUpdate {
            derived_ref_pair: DerivedRefPair { source: block(90, 900), derived: block(123, 1234) },
        });
        tracker.on_event(2, &ChainEvent::FinalizedUpdate { block: block(50, 500) });

        let status = tracker.sync_status().unwrap();
        assert_eq!(status.min_synced_l1, block(90, 900));
        assert_eq!(status.cross_safe_timestamp, 200);
        assert_eq!(status.finalized_timestamp, 100);
        assert_eq!(status.chains.len(), 2);
    }

    #[test]
    fn test_sync_status_detects_l1_hash_mismatch() {
        let tracker = StatusTracker::new();
        let fork = BlockInfo::new(B256::with_last_byte(0xff), 100, B256::ZERO, 1000);

        tracker.on_event(1, &ChainEvent::DerivationOriginUpdate { origin: block(100, 1000) });
        tracker.on_event(2, &ChainEvent::DerivationOriginUpdate { origin: fork });

        assert!(matches!(
            tracker.sync_status(),
            Err(SupervisorError::L1HashMismatch { .. })
        ));
    }
}
