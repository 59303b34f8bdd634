use crate::event::ChainEvent;
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::ChainId;
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{Block, Header};
use async_trait::async_trait;
use futures::StreamExt;
use sentinel_storage::FinalizedL1Storage;
use sentinel_types::BlockInfo;
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

/// Errors returned by the [`L1Accessor`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum L1AccessorError {
    /// The requested block is unknown, still unconfirmed, or the tip has not been observed yet.
    #[error("l1 block {0} not found")]
    BlockNotFound(u64),

    /// The RPC fetch for the block failed.
    #[error("failed to fetch l1 block {0}")]
    BlockFetchFailed(u64),
}

/// Receives the rewind signal raised when the incoming L1 tip does not extend the current one.
#[async_trait]
pub trait RewindHandler: Send + Sync + Debug {
    /// Handles a possible L1 reorg, carrying the incoming block that broke parent linkage.
    async fn handle_l1_rewind(&self, block: BlockInfo);
}

/// Read access to confirmed L1 blocks.
#[async_trait]
pub trait L1BlockRefSource: Send + Sync + Debug {
    /// Returns the [`BlockInfo`] of the L1 block at the given height, if it is confirmed.
    async fn block_ref_by_number(&self, number: u64) -> Result<BlockInfo, L1AccessorError>;
}

/// Polls the L1 chain for latest and finalized blocks, maintains the accepted tip, and exposes
/// confirmation-depth-guarded block reads.
///
/// The `handle_*` methods are public so tests and subscription-less deployments can drive the
/// accessor by manual pull instead of the polling loop.
pub struct L1Accessor<F, R> {
    /// The Alloy RPC client for L1.
    rpc_client: RpcClient,
    /// Number of blocks below the tip considered unconfirmed.
    conf_depth: u64,
    /// The last accepted L1 tip.
    tip: RwLock<Option<BlockInfo>>,
    /// The number of the last broadcast finalized block.
    finalized_number: AtomicU64,
    /// The finalized L1 block storage.
    finalized_l1_storage: Arc<F>,
    /// The event senders for each chain.
    event_txs: HashMap<ChainId, mpsc::Sender<ChainEvent>>,
    /// The rewind handler invoked on parent-hash mismatches.
    rewind_handler: R,
    /// The cancellation token, shared between all tasks.
    cancellation: CancellationToken,
}

// The storage backend carries no Debug bound, so the derive is not available here.
impl<F, R: Debug> Debug for L1Accessor<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("L1Accessor")
            .field("conf_depth", &self.conf_depth)
            .field("finalized_number", &self.finalized_number)
            .field("rewind_handler", &self.rewind_handler)
            .finish_non_exhaustive()
    }
}

impl<F, R> L1Accessor<F, R>
where
    F: FinalizedL1Storage + Send + Sync + 'static,
    R: RewindHandler + 'static,
{
    /// Creates a new [`L1Accessor`] instance.
    pub fn new(
        rpc_client: RpcClient,
        conf_depth: u64,
        finalized_l1_storage: Arc<F>,
        event_txs: HashMap<ChainId, mpsc::Sender<ChainEvent>>,
        rewind_handler: R,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            rpc_client,
            conf_depth,
            tip: RwLock::new(None),
            finalized_number: AtomicU64::new(0),
            finalized_l1_storage,
            event_txs,
            rewind_handler,
            cancellation,
        }
    }

    /// Starts polling for finalized and latest blocks and processes them.
    pub async fn run(&self) {
        let finalized_head_poller = self
            .rpc_client
            .prepare_static_poller::<_, Block>(
                "eth_getBlockByNumber",
                (BlockNumberOrTag::Finalized, false),
            )
            .with_poll_interval(Duration::from_secs(47));

        let mut finalized_head_stream = finalized_head_poller.into_stream();

        let latest_head_poller = self
            .rpc_client
            .prepare_static_poller::<_, Block>(
                "eth_getBlockByNumber",
                (BlockNumberOrTag::Latest, false),
            )
            .with_poll_interval(Duration::from_secs(2));

        let mut latest_head_stream = latest_head_poller.into_stream();

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!(target: "supervisor::l1_accessor", "Cancellation requested, stopping polling");
                    break;
                }
                latest_block = latest_head_stream.next() => {
                    if let Some(latest_block) = latest_block {
                        self.handle_new_latest_block(block_info_from_rpc(latest_block)).await;
                    }
                }
                finalized_block = finalized_head_stream.next() => {
                    if let Some(finalized_block) = finalized_block {
                        self.handle_new_finalized_block(block_info_from_rpc(finalized_block));
                    }
                }
            }
        }
    }

    /// Handles a new latest L1 block, checking whether it extends, repeats, or contradicts the
    /// current tip.
    pub async fn handle_new_latest_block(&self, incoming_block: BlockInfo) {
        let mut tip = self.tip.write().await;

        let prev = match *tip {
            Some(prev) => prev,
            None => {
                *tip = Some(incoming_block);
                return;
            }
        };

        if incoming_block.hash == prev.hash {
            return;
        }

        // An equal-height block with a different hash is a fork, not a stale answer, and must
        // fall through to the parent-hash check below.
        if incoming_block.number < prev.number {
            trace!(
                target: "supervisor::l1_accessor",
                incoming_block_number = incoming_block.number,
                tip_number = prev.number,
                "Stale latest L1 block received"
            );
            return;
        }

        if incoming_block.parent_hash != prev.hash {
            warn!(
                target: "supervisor::l1_accessor",
                block_number = incoming_block.number,
                tip_number = prev.number,
                "Parent hash mismatch on new latest L1 block, possible reorg"
            );
            self.rewind_handler.handle_l1_rewind(incoming_block).await;
        }

        *tip = Some(incoming_block);
    }

    /// Handles a new finalized L1 block, updating the storage and broadcasting the event.
    pub fn handle_new_finalized_block(&self, finalized_source_block: BlockInfo) {
        let last_finalized_number = self.finalized_number.load(Ordering::Acquire);
        if finalized_source_block.number == last_finalized_number {
            return;
        }

        trace!(
            target: "supervisor::l1_accessor",
            incoming_block_number = finalized_source_block.number,
            previous_block_number = last_finalized_number,
            "Finalized L1 block received"
        );

        if let Err(err) = self.finalized_l1_storage.update_finalized_l1(finalized_source_block) {
            error!(target: "supervisor::l1_accessor", %err, "Failed to update finalized L1 block");
            return;
        }

        self.finalized_number.store(finalized_source_block.number, Ordering::Release);

        for (chain_id, sender) in &self.event_txs {
            if let Err(err) =
                sender.try_send(ChainEvent::FinalizedSourceUpdate { finalized_source_block })
            {
                error!(
                    target: "supervisor::l1_accessor",
                    chain_id = %chain_id,
                    %err, "Failed to send finalized L1 update event",
                );
            }
        }
    }
}

#[async_trait]
impl<F, R> L1BlockRefSource for L1Accessor<F, R>
where
    F: FinalizedL1Storage + Send + Sync + 'static,
    R: RewindHandler + 'static,
{
    async fn block_ref_by_number(&self, number: u64) -> Result<BlockInfo, L1AccessorError> {
        let tip = self.tip.read().await;
        let tip = tip.as_ref().ok_or(L1AccessorError::BlockNotFound(number))?;

        // Blocks closer to the tip than the confirmation depth are treated as inaccessible.
        if number > tip.number.saturating_sub(self.conf_depth) {
            return Err(L1AccessorError::BlockNotFound(number));
        }

        let block: Option<Block> = self
            .rpc_client
            .request("eth_getBlockByNumber", (BlockNumberOrTag::Number(number), false))
            .await
            .map_err(|err| {
                error!(target: "supervisor::l1_accessor", %err, block_number = number, "Failed to fetch L1 block");
                L1AccessorError::BlockFetchFailed(number)
            })?;

        block.map(block_info_from_rpc).ok_or(L1AccessorError::BlockNotFound(number))
    }
}

fn block_info_from_rpc(block: Block) -> BlockInfo {
    let Header { hash, inner: alloy_consensus::Header { number, parent_hash, timestamp, .. }, .. } =
        block.header;
    BlockInfo::new(hash, number, parent_hash, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use alloy_transport::mock::*;
    use mockall::mock;
    use sentinel_storage::StorageError;
    use std::sync::Mutex;

    mock!(
        pub FinalizedStorage {}
        impl FinalizedL1Storage for FinalizedStorage {
            fn update_finalized_l1(&self, block: BlockInfo) -> Result<(), StorageError>;
            fn get_finalized_l1(&self) -> Result<BlockInfo, StorageError>;
        }
    );

    #[derive(Debug, Default)]
    struct RecordingRewindHandler {
        rewinds: Mutex<Vec<BlockInfo>>,
    }

    #[async_trait]
    impl RewindHandler for Arc<RecordingRewindHandler> {
        async fn handle_l1_rewind(&self, block: BlockInfo) {
            self.rewinds.lock().unwrap().push(block);
        }
    }

    fn block(number: u64, hash: u8, parent: u8, timestamp: u64) -> BlockInfo {
        BlockInfo::new(
            B256::with_last_byte(hash),
            number,
            B256::with_last_byte(parent),
            timestamp,
        )
    }

    fn accessor(
        conf_depth: u64,
        asserter: &Asserter,
        event_txs: HashMap<ChainId, mpsc::Sender<ChainEvent>>,
    ) -> (L1Accessor<MockFinalizedStorage, Arc<RecordingRewindHandler>>, Arc<RecordingRewindHandler>)
    {
        let transport = MockTransport::new(asserter.clone());
        let rpc_client = RpcClient::new(transport, false);
        let mut storage = MockFinalizedStorage::new();
        storage.expect_update_finalized_l1().returning(|_| Ok(()));
        let handler = Arc::new(RecordingRewindHandler::default());
        let accessor = L1Accessor::new(
            rpc_client,
            conf_depth,
            Arc::new(storage),
            event_txs,
            handler.clone(),
            CancellationToken::new(),
        );
        (accessor, handler)
    }

    #[tokio::test]
    async fn test_latest_block_adoption_and_stale_rejection() {
        let asserter = Asserter::new();
        let (accessor, handler) = accessor(0, &asserter, HashMap::new());

        let first = block(10, 1, 0, 100);
        accessor.handle_new_latest_block(first).await;
        assert_eq!(*accessor.tip.read().await, Some(first));

        // same hash is a no-op
        accessor.handle_new_latest_block(first).await;
        assert_eq!(*accessor.tip.read().await, Some(first));

        // stale block is ignored
        let stale = block(9, 7, 0, 90);
        accessor.handle_new_latest_block(stale).await;
        assert_eq!(*accessor.tip.read().await, Some(first));

        // sequential block adopted without rewind
        let next = block(11, 2, 1, 112);
        accessor.handle_new_latest_block(next).await;
        assert_eq!(*accessor.tip.read().await, Some(next));
        assert!(handler.rewinds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_block_parent_mismatch_raises_rewind() {
        let asserter = Asserter::new();
        let (accessor, handler) = accessor(0, &asserter, HashMap::new());

        accessor.handle_new_latest_block(block(10, 1, 0, 100)).await;

        // incoming block does not link to the tip
        let fork = block(12, 5, 9, 124);
        accessor.handle_new_latest_block(fork).await;

        assert_eq!(*accessor.tip.read().await, Some(fork));
        assert_eq!(handler.rewinds.lock().unwrap().as_slice(), &[fork]);
    }

    #[tokio::test]
    async fn test_latest_block_equal_height_fork_adopted() {
        let asserter = Asserter::new();
        let (accessor, handler) = accessor(0, &asserter, HashMap::new());

        accessor.handle_new_latest_block(block(10, 1, 0, 100)).await;

        // a competing block at the same height replaces the tip and raises a rewind
        let fork = block(10, 5, 9, 101);
        accessor.handle_new_latest_block(fork).await;

        assert_eq!(*accessor.tip.read().await, Some(fork));
        assert_eq!(handler.rewinds.lock().unwrap().as_slice(), &[fork]);
    }

    #[tokio::test]
    async fn test_finalized_block_broadcast_and_dedup() {
        let asserter = Asserter::new();
        let (tx, mut rx) = mpsc::channel(4);
        let mut event_txs = HashMap::new();
        event_txs.insert(1u64, tx);
        let (accessor, _) = accessor(0, &asserter, event_txs);

        let finalized = block(8, 3, 2, 80);
        accessor.handle_new_finalized_block(finalized);
        match rx.try_recv().unwrap() {
            ChainEvent::FinalizedSourceUpdate { finalized_source_block } => {
                assert_eq!(finalized_source_block, finalized);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // same number is not re-broadcast
        accessor.handle_new_finalized_block(finalized);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_block_ref_by_number_confirmation_guard() {
        let asserter = Asserter::new();
        let (accessor, _) = accessor(5, &asserter, HashMap::new());

        // no tip yet
        assert_eq!(
            accessor.block_ref_by_number(1).await,
            Err(L1AccessorError::BlockNotFound(1))
        );

        accessor.handle_new_latest_block(block(20, 1, 0, 200)).await;

        // 16 > 20 - 5, still unconfirmed
        assert_eq!(
            accessor.block_ref_by_number(16).await,
            Err(L1AccessorError::BlockNotFound(16))
        );
    }

    #[tokio::test]
    async fn test_block_ref_by_number_fetches_confirmed_block() {
        let asserter = Asserter::new();
        let (accessor, _) = accessor(5, &asserter, HashMap::new());
        accessor.handle_new_latest_block(block(20, 1, 0, 200)).await;

        let fixture = r#"{
            "number": "0xf",
            "hash": "0xd5f1812548be429cbdc6376b29611fc49e06f1359758c4ceaaa3b393e2239f9c",
            "mixHash": "0x24900fb3da77674a861c428429dce0762707ecb6052325bbd9b3c64e74b5af9d",
            "parentHash": "0x1f68ac259155e2f38211ddad0f0a15394d55417b185a93923e2abe71bb7a4d6d",
            "nonce": "0x378da40ff335b070",
            "sha3Uncles": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
            "logsBloom": "0x00000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000",
            "transactionsRoot": "0x4d0c8e91e16bdff538c03211c5c73632ed054d00a7e210c0eb25146c20048126",
            "stateRoot": "0x91309efa7e42c1f137f31fe9edbe88ae087e6620d0d59031324da3e2f4f93233",
            "receiptsRoot": "0x68461ab700003503a305083630a8fb8d14927238f0bc8b6b3d246c0c64f21f4a",
            "miner": "0xb42b6c4a95406c78ff892d270ad20b22642e102d",
            "difficulty": "0x66e619a",
            "extraData": "0xd583010502846765746885676f312e37856c696e7578",
            "size": "0x334",
            "gasLimit": "0x47e7c4",
            "gasUsed": "0x37993",
            "timestamp": "0x5835c54d",
            "uncles": [],
            "transactions": []
        }"#;
        asserter.push(MockResponse::Success(serde_json::from_str(fixture).unwrap()));

        let block_ref = accessor.block_ref_by_number(15).await.unwrap();
        assert_eq!(block_ref.number, 15);
        assert_eq!(block_ref.timestamp, 0x5835c54d);
    }
}
