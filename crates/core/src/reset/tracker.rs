use crate::{
    l1_accessor::{L1AccessorError, L1BlockRefSource},
    syncnode::{ManagedNodeClient, ManagedNodeError},
};
use alloy_eips::BlockNumHash;
use alloy_primitives::B256;
use sentinel_storage::{DerivationStorageReader, StorageError};
use std::sync::Arc;
use tracing::{debug, warn};

/// The outcome of a reset target search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    /// The newest block on which the node and the local database agree.
    Target(BlockNumHash),
    /// The node has diverged below the interop activation block, so the entire interop-era
    /// state must be dropped.
    PreInterop,
}

/// Locates consistent reset targets between a managed node and the local database.
///
/// The local-safe target is found by bisection over the node's canonical chain; the
/// local-unsafe target is found by binary search over the node's unsafe blocks, validating each
/// candidate's L1 origin against the canonical L1 chain.
#[derive(Debug)]
pub struct ResetTracker<DB, C, L> {
    /// The managed node client.
    client: Arc<C>,
    /// The local derivation database.
    db: Arc<DB>,
    /// Read access to confirmed canonical L1 blocks.
    l1: Arc<L>,
}

impl<DB, C, L> ResetTracker<DB, C, L>
where
    DB: DerivationStorageReader + Send + Sync,
    C: ManagedNodeClient,
    L: L1BlockRefSource,
{
    /// Creates a new [`ResetTracker`].
    pub const fn new(client: Arc<C>, db: Arc<DB>, l1: Arc<L>) -> Self {
        Self { client, db, l1 }
    }

    /// Finds the newest block within `[a, z]` on which the node and the local derivation
    /// database agree.
    ///
    /// `a` is the consistency lower bound (normally the activation block) and `z` the upper
    /// bound (normally the local-safe head). Invariant during bisection: the node and the
    /// database agree on `a` and disagree on `z`.
    pub async fn find_reset_target(
        &self,
        mut a: BlockNumHash,
        mut z: BlockNumHash,
    ) -> Result<ResetTarget, ManagedNodeError> {
        // Fast path: the node and the database both agree on the upper bound.
        if let Ok(node_block) = self.client.block_ref_by_number(z.number).await &&
            node_block.id() == z &&
            self.db.derived_to_source(z).is_ok()
        {
            return Ok(ResetTarget::Target(z));
        }

        // The node must agree on the lower bound, otherwise it diverged before the interop
        // activation block.
        match self.client.block_ref_by_number(a.number).await {
            Ok(node_block) if node_block.id() == a => {}
            _ => {
                warn!(
                    target: "supervisor::reset_tracker",
                    block_number = a.number,
                    "Node disagrees with the consistency lower bound"
                );
                return Ok(ResetTarget::PreInterop);
            }
        }

        while z.number > a.number + 1 {
            let i = (a.number + z.number) / 2;

            let node_block = match self.client.block_ref_by_number(i).await {
                Ok(block) => block,
                Err(err) => {
                    debug!(
                        target: "supervisor::reset_tracker",
                        block_number = i,
                        %err,
                        "Node has no block at bisection midpoint"
                    );
                    z = BlockNumHash { number: i, hash: B256::ZERO };
                    continue;
                }
            };

            match self.db.derived_to_source(node_block.id()) {
                Ok(_) => a = node_block.id(),
                Err(StorageError::FutureData | StorageError::ConflictError) => {
                    z = node_block.id()
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(ResetTarget::Target(a))
    }

    /// Finds the furthest node block in `(local_safe, latest_unsafe]` whose L1 origin is
    /// canonical, falling back to a linear walk below the local-safe head when the whole window
    /// is inconsistent.
    pub async fn find_reset_unsafe_head_target(
        &self,
        local_safe: BlockNumHash,
        latest_unsafe: BlockNumHash,
    ) -> Result<BlockNumHash, ManagedNodeError> {
        let mut lo = local_safe.number;
        let mut hi = latest_unsafe.number;

        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.block_with_canonical_origin(mid).await?.is_some() {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        if lo > local_safe.number &&
            let Some(id) = self.block_with_canonical_origin(lo).await?
        {
            return Ok(id);
        }

        // Nothing above the local-safe head verified, walk backward from it.
        let mut number = local_safe.number;
        loop {
            if let Some(id) = self.block_with_canonical_origin(number).await? {
                return Ok(id);
            }
            if number == 0 {
                warn!(
                    target: "supervisor::reset_tracker",
                    "No block with a canonical L1 origin found down to genesis"
                );
                return Err(ManagedNodeError::ResetFailed);
            }
            number -= 1;
        }
    }

    /// Returns the id of the node block at the given height if its reported L1 origin matches
    /// the canonical L1 chain, `None` when the block or its origin cannot be verified.
    async fn block_with_canonical_origin(
        &self,
        number: u64,
    ) -> Result<Option<BlockNumHash>, ManagedNodeError> {
        let node_block = match self.client.block_ref_by_number(number).await {
            Ok(block) => block,
            Err(err) => {
                debug!(
                    target: "supervisor::reset_tracker",
                    block_number = number,
                    %err,
                    "Node has no block at candidate height"
                );
                return Ok(None);
            }
        };

        let origin = match self.l1.block_ref_by_number(node_block.l1_origin.number).await {
            Ok(block) => block,
            Err(L1AccessorError::BlockNotFound(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok((origin.hash == node_block.l1_origin.hash).then(|| node_block.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncnode::ClientError;
    use async_trait::async_trait;
    use jsonrpsee::core::client::Subscription;
    use mockall::mock;
    use sentinel_types::{
        BlockInfo, BlockSeal, DerivedRefPair, L2BlockInfo, Log, OutputV0, Receipts, SafetyLevel,
        SubscriptionEvent, SuperHead,
    };

    mock!(
        #[derive(Debug)]
        pub Client {}

        #[async_trait]
        impl ManagedNodeClient for Client {
            async fn chain_id(&self) -> Result<alloy_primitives::ChainId, ClientError>;
            async fn subscribe_events(&self) -> Result<Subscription<SubscriptionEvent>, ClientError>;
            async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ClientError>;
            async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError>;
            async fn pending_output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError>;
            async fn l2_block_ref_by_timestamp(&self, timestamp: u64) -> Result<L2BlockInfo, ClientError>;
            async fn block_ref_by_number(&self, block_number: u64) -> Result<L2BlockInfo, ClientError>;
            async fn reset_pre_interop(&self) -> Result<(), ClientError>;
            async fn reset(
                &self,
                unsafe_id: BlockNumHash,
                cross_unsafe_id: BlockNumHash,
                local_safe_id: BlockNumHash,
                cross_safe_id: BlockNumHash,
                finalised_id: BlockNumHash,
            ) -> Result<(), ClientError>;
            async fn invalidate_block(&self, seal: BlockSeal) -> Result<(), ClientError>;
            async fn provide_l1(&self, block_info: BlockInfo) -> Result<(), ClientError>;
            async fn update_finalized(&self, finalized_block_id: BlockNumHash) -> Result<(), ClientError>;
            async fn update_cross_unsafe(&self, cross_unsafe_block_id: BlockNumHash) -> Result<(), ClientError>;
            async fn update_cross_safe(
                &self,
                source_block_id: BlockNumHash,
                derived_block_id: BlockNumHash,
            ) -> Result<(), ClientError>;
            async fn reset_ws_client(&self);
        }
    );

    mock!(
        #[derive(Debug)]
        pub Db {}

        impl DerivationStorageReader for Db {
            fn derived_to_source(&self, derived_block_id: BlockNumHash) -> Result<BlockInfo, StorageError>;
            fn latest_derived_block_at_source(&self, source_block_id: BlockNumHash) -> Result<BlockInfo, StorageError>;
            fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError>;
            fn get_source_block(&self, source_block_number: u64) -> Result<BlockInfo, StorageError>;
            fn get_activation_block(&self) -> Result<BlockInfo, StorageError>;
        }

        impl sentinel_storage::HeadRefStorageReader for Db {
            fn get_safety_head_ref(&self, safety_level: SafetyLevel) -> Result<BlockInfo, StorageError>;
            fn get_super_head(&self) -> Result<SuperHead, StorageError>;
        }

        impl sentinel_storage::LogStorageReader for Db {
            fn get_latest_block(&self) -> Result<BlockInfo, StorageError>;
            fn get_block(&self, block_number: u64) -> Result<BlockInfo, StorageError>;
            fn get_log(&self, block_number: u64, log_index: u32) -> Result<Log, StorageError>;
            fn get_logs(&self, block_number: u64) -> Result<Vec<Log>, StorageError>;
        }
    );

    mock!(
        #[derive(Debug)]
        pub L1 {}

        #[async_trait]
        impl L1BlockRefSource for L1 {
            async fn block_ref_by_number(&self, number: u64) -> Result<BlockInfo, L1AccessorError>;
        }
    );

    fn node_hash(number: u64) -> B256 {
        B256::with_last_byte(number as u8)
    }

    fn origin_hash(number: u64) -> B256 {
        B256::with_last_byte(0x80 + number as u8)
    }

    fn node_block(number: u64) -> L2BlockInfo {
        L2BlockInfo::new(
            BlockInfo::new(node_hash(number), number, node_hash(number.saturating_sub(1)), number * 2),
            BlockNumHash { number: 100 + number, hash: origin_hash(number) },
            0,
        )
    }

    fn missing() -> ClientError {
        ClientError::Client(jsonrpsee::core::ClientError::RequestTimeout)
    }

    fn tracker(
        client: MockClient,
        db: MockDb,
        l1: MockL1,
    ) -> ResetTracker<MockDb, MockClient, MockL1> {
        ResetTracker::new(Arc::new(client), Arc::new(db), Arc::new(l1))
    }

    #[tokio::test]
    async fn test_find_reset_target_fast_path() {
        let mut client = MockClient::new();
        client.expect_block_ref_by_number().times(1).returning(|n| Ok(node_block(n)));

        let mut db = MockDb::new();
        db.expect_derived_to_source().returning(|id| {
            Ok(BlockInfo::new(origin_hash(id.number), 100 + id.number, B256::ZERO, 0))
        });

        let tracker = tracker(client, db, MockL1::new());
        let target = tracker
            .find_reset_target(node_block(1).id(), node_block(10).id())
            .await
            .unwrap();
        assert_eq!(target, ResetTarget::Target(node_block(10).id()));
    }

    #[tokio::test]
    async fn test_find_reset_target_pre_interop_on_lower_bound_mismatch() {
        let mut client = MockClient::new();
        // upper bound diverged, lower bound unknown to the node
        client.expect_block_ref_by_number().returning(|n| {
            if n == 10 {
                let mut block = node_block(10);
                block.block_info.hash = B256::with_last_byte(0xee);
                Ok(block)
            } else {
                Err(missing())
            }
        });

        let tracker = tracker(client, MockDb::new(), MockL1::new());
        let target = tracker
            .find_reset_target(node_block(1).id(), node_block(10).id())
            .await
            .unwrap();
        assert_eq!(target, ResetTarget::PreInterop);
    }

    #[tokio::test]
    async fn test_find_reset_target_converges_below_divergence() {
        // The node and the database agree on blocks 1..=4 and disagree from 5 on.
        let mut client = MockClient::new();
        client.expect_block_ref_by_number().returning(|n| {
            if n == 10 {
                let mut block = node_block(10);
                block.block_info.hash = B256::with_last_byte(0xee);
                Ok(block)
            } else {
                Ok(node_block(n))
            }
        });

        let mut db = MockDb::new();
        db.expect_derived_to_source().returning(|id| {
            if id.number <= 4 {
                Ok(BlockInfo::new(origin_hash(id.number), 100 + id.number, B256::ZERO, 0))
            } else {
                Err(StorageError::ConflictError)
            }
        });

        let tracker = tracker(client, db, MockL1::new());
        let target = tracker
            .find_reset_target(node_block(1).id(), node_block(10).id())
            .await
            .unwrap();
        assert_eq!(target, ResetTarget::Target(node_block(4).id()));
    }

    #[tokio::test]
    async fn test_find_reset_target_treats_node_gaps_as_divergence() {
        // The node has no blocks at heights 5 and above.
        let mut client = MockClient::new();
        client
            .expect_block_ref_by_number()
            .returning(|n| if n >= 5 { Err(missing()) } else { Ok(node_block(n)) });

        let mut db = MockDb::new();
        db.expect_derived_to_source().returning(|id| {
            Ok(BlockInfo::new(origin_hash(id.number), 100 + id.number, B256::ZERO, 0))
        });

        let tracker = tracker(client, db, MockL1::new());
        let target = tracker
            .find_reset_target(node_block(1).id(), node_block(10).id())
            .await
            .unwrap();
        assert_eq!(target, ResetTarget::Target(node_block(4).id()));
    }

    #[tokio::test]
    async fn test_find_unsafe_head_target_binary_search() {
        // Origins are canonical up to block 8 and reorged above it.
        let mut client = MockClient::new();
        client.expect_block_ref_by_number().returning(|n| Ok(node_block(n)));

        let mut l1 = MockL1::new();
        l1.expect_block_ref_by_number().returning(|n| {
            let l2_number = n - 100;
            let hash = if l2_number <= 8 {
                origin_hash(l2_number)
            } else {
                B256::with_last_byte(0xdd)
            };
            Ok(BlockInfo::new(hash, n, B256::ZERO, 0))
        });

        let tracker = tracker(client, MockDb::new(), l1);
        let head = tracker
            .find_reset_unsafe_head_target(node_block(5).id(), node_block(10).id())
            .await
            .unwrap();
        assert_eq!(head, node_block(8).id());
    }

    #[tokio::test]
    async fn test_find_unsafe_head_target_linear_fallback() {
        // The whole window above and including the local-safe head is non-canonical; only
        // block 3 still has a canonical origin.
        let mut client = MockClient::new();
        client.expect_block_ref_by_number().returning(|n| Ok(node_block(n)));

        let mut l1 = MockL1::new();
        l1.expect_block_ref_by_number().returning(|n| {
            let l2_number = n - 100;
            if l2_number <= 3 {
                Ok(BlockInfo::new(origin_hash(l2_number), n, B256::ZERO, 0))
            } else {
                Err(L1AccessorError::BlockNotFound(n))
            }
        });

        let tracker = tracker(client, MockDb::new(), l1);
        let head = tracker
            .find_reset_unsafe_head_target(node_block(5).id(), node_block(10).id())
            .await
            .unwrap();
        assert_eq!(head, node_block(3).id());
    }
}
