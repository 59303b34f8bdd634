//! [`ManagedNode`] implementation for subscribing to the events from managed node.

use super::{
    BlockProvider, ManagedNodeClient, ManagedNodeCommand, ManagedNodeController,
    ManagedNodeDataProvider, ManagedNodeError, SubscriptionHandler,
};
use crate::{
    event::ChainEvent,
    l1_accessor::{L1AccessorError, L1BlockRefSource},
    reset::{ResetTarget, ResetTracker},
};
use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, ChainId};
use async_trait::async_trait;
use sentinel_storage::{
    DerivationStorageReader, HeadRefStorageReader, LogStorageReader, StorageError,
};
use sentinel_types::{
    BlockInfo, BlockReplacement, BlockSeal, DerivedRefPair, ManagedEvent, OutputV0, Receipts,
    SubscriptionEvent, SuperHead,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Releases the reset-in-progress flag when the reset finishes, however it finishes.
#[derive(Debug)]
struct ResetGuard(Arc<AtomicBool>);

impl ResetGuard {
    /// Sets the flag, returning `None` when another reset already holds it.
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        (!flag.swap(true, Ordering::AcqRel)).then(|| Self(flag.clone()))
    }
}

impl Drop for ResetGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// [`ManagedNode`] handles the subscription to managed node events.
///
/// It owns the per-node consistency state machine: incoming node events are forwarded as
/// [`ChainEvent`]s, every local-safe advance is cross-checked against the database, and any
/// divergence triggers a bisection-based reset through the [`ResetTracker`]. While a reset is
/// in flight both node events and supervisor commands are dropped, so the node replays its
/// state from the reset point afterwards.
#[derive(Debug)]
pub struct ManagedNode<DB, C, L> {
    /// The attached web socket client
    client: Arc<C>,
    /// The local database of the chain.
    db_provider: Arc<DB>,
    /// Read access to confirmed canonical L1 blocks.
    l1: Arc<L>,
    /// Locates reset targets on divergence.
    reset_tracker: ResetTracker<DB, C, L>,
    /// Channel for sending events to the chain processor
    chain_event_sender: mpsc::Sender<ChainEvent>,

    /// Cached chain ID
    chain_id: Mutex<Option<ChainId>>,
    /// Set while a reset is being computed and pushed to the node.
    reset_in_progress: Arc<AtomicBool>,
    /// The last local-unsafe block the node reported.
    last_local_unsafe: Mutex<Option<BlockNumHash>>,
    /// The last local-safe block the node reported.
    last_local_safe: Mutex<Option<BlockNumHash>>,
    /// The cancellation token, shared between all tasks.
    cancellation: CancellationToken,
}

impl<DB, C, L> ManagedNode<DB, C, L>
where
    DB: LogStorageReader + DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + 'static,
    L: L1BlockRefSource + 'static,
{
    /// Creates a new [`ManagedNode`] with the specified client.
    pub fn new(
        client: Arc<C>,
        db_provider: Arc<DB>,
        l1: Arc<L>,
        chain_event_sender: mpsc::Sender<ChainEvent>,
        cancellation: CancellationToken,
    ) -> Self {
        let reset_tracker =
            ResetTracker::new(client.clone(), db_provider.clone(), l1.clone());

        Self {
            client,
            db_provider,
            l1,
            reset_tracker,
            chain_event_sender,
            chain_id: Mutex::new(None),
            reset_in_progress: Arc::new(AtomicBool::new(false)),
            last_local_unsafe: Mutex::new(None),
            last_local_safe: Mutex::new(None),
            cancellation,
        }
    }

    /// Returns the [`ChainId`] of the [`ManagedNode`].
    /// If the chain ID is already cached, it returns that.
    /// If not, it fetches the chain ID from the managed node.
    pub async fn chain_id(&self) -> Result<ChainId, ManagedNodeError> {
        // we are caching the chain ID here to avoid multiple calls to the client
        // there is a possibility that chain ID might be being cached in the client already
        // but we are caching it here to make sure it caches in the `ManagedNode` context
        let mut cache = self.chain_id.lock().await;
        if let Some(chain_id) = *cache {
            Ok(chain_id)
        } else {
            let chain_id = self.client.chain_id().await?;
            *cache = Some(chain_id);
            Ok(chain_id)
        }
    }

    /// Subscribes to the node's event stream and spawns the event/command loop.
    pub async fn start(
        self: Arc<Self>,
        mut command_rx: mpsc::Receiver<ManagedNodeCommand>,
    ) -> Result<(), ManagedNodeError> {
        let mut subscription = self.client.subscribe_events().await.inspect_err(|err| {
            error!(target: "supervisor::managed_node", %err, "Failed to subscribe to node events");
        })?;

        let node = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = node.cancellation.cancelled() => {
                        info!(target: "supervisor::managed_node", "Cancellation requested, stopping node event loop");
                        break;
                    }
                    incoming_event = subscription.next() => {
                        match incoming_event {
                            Some(Ok(subscription_event)) => {
                                node.process_incoming_event(subscription_event).await;
                            }
                            Some(Err(err)) => {
                                error!(
                                    target: "supervisor::managed_node",
                                    %err,
                                    "Error in event deserialization"
                                );
                            }
                            None => {
                                warn!(target: "supervisor::managed_node", "Subscription closed by server");
                                node.client.reset_ws_client().await;
                                break;
                            }
                        }
                    }
                    maybe_cmd = command_rx.recv() => {
                        match maybe_cmd {
                            Some(cmd) => node.process_command(cmd).await,
                            None => {
                                info!(target: "supervisor::managed_node", "Command channel closed, stopping node event loop");
                                break;
                            }
                        }
                    }
                }
            }
        });
        Ok(())
    }

    /// Dispatches a subscription notification, dropping it while a reset is in progress.
    ///
    /// Events produced before the reset describe a chain the reset abandons; the node replays
    /// everything from the reset point once it accepts the new heads.
    async fn process_incoming_event(&self, subscription_event: SubscriptionEvent) {
        if self.reset_in_progress.load(Ordering::Acquire) {
            debug!(
                target: "supervisor::managed_node",
                event = %subscription_event.data.unwrap_or_default(),
                "Reset in progress, dropping node event"
            );
            return;
        }

        if let Some(event) = subscription_event.data {
            self.dispatch_managed_event(&event).await;
        }
    }

    /// Handles each populated field of a [`ManagedEvent`] exactly once.
    async fn dispatch_managed_event(&self, event: &ManagedEvent) {
        if let Some(reset_id) = &event.reset &&
            let Err(err) = self.handle_reset(reset_id).await
        {
            warn!(target: "supervisor::managed_node", %err, %reset_id, "Failed to handle reset event");
        }

        if let Some(unsafe_block) = &event.unsafe_block &&
            let Err(err) = self.handle_unsafe_block(unsafe_block).await
        {
            warn!(target: "supervisor::managed_node", %err, %unsafe_block, "Failed to handle unsafe block event");
        }

        if let Some(derivation_update) = &event.derivation_update &&
            let Err(err) = self.handle_derivation_update(derivation_update).await
        {
            warn!(target: "supervisor::managed_node", %err, %derivation_update, "Failed to handle derivation update event");
        }

        if let Some(exhaust_l1) = &event.exhaust_l1 &&
            let Err(err) = self.handle_exhaust_l1(exhaust_l1).await
        {
            warn!(target: "supervisor::managed_node", %err, %exhaust_l1, "Failed to handle exhaust L1 event");
        }

        if let Some(replacement) = &event.replace_block &&
            let Err(err) = self.handle_replace_block(replacement).await
        {
            warn!(target: "supervisor::managed_node", %err, %replacement, "Failed to handle block replacement event");
        }

        if let Some(origin) = &event.derivation_origin_update &&
            let Err(err) = self.handle_derivation_origin_update(origin).await
        {
            warn!(target: "supervisor::managed_node", %err, %origin, "Failed to handle derivation origin update event");
        }
    }

    /// Executes a supervisor command, dropping it while a reset is in progress.
    async fn process_command(&self, command: ManagedNodeCommand) {
        if self.reset_in_progress.load(Ordering::Acquire) {
            debug!(
                target: "supervisor::managed_node",
                ?command,
                "Reset in progress, dropping command"
            );
            return;
        }

        let result = match command {
            ManagedNodeCommand::UpdateFinalized { block_id } => {
                self.update_finalized(block_id).await
            }
            ManagedNodeCommand::UpdateCrossUnsafe { block_id } => {
                self.update_cross_unsafe(block_id).await
            }
            ManagedNodeCommand::UpdateCrossSafe { source_block_id, derived_block_id } => {
                self.update_cross_safe(source_block_id, derived_block_id).await
            }
            ManagedNodeCommand::Reset {} => self.reset().await,
            ManagedNodeCommand::ResetPreInterop {} => {
                match self.chain_id().await {
                    Ok(chain_id) => self.reset_node_pre_interop(chain_id).await,
                    Err(err) => Err(err),
                }
            }
            ManagedNodeCommand::InvalidateBlock { seal } => self.invalidate_block(seal).await,
        };

        if let Err(err) = result {
            warn!(target: "supervisor::managed_node", %err, "Failed to execute managed node command");
        }
    }

    /// Verifies the node's last reported local-safe block against the database, triggering a
    /// reset when they disagree or the node ran ahead.
    async fn check_consistency(&self) -> Result<(), ManagedNodeError> {
        if self.reset_if_inconsistent().await? {
            return Ok(());
        }
        self.reset_if_ahead().await
    }

    /// Resets the node when the database holds a conflicting block at the node's local-safe
    /// height, returning whether a reset was triggered. A [`StorageError::FutureData`] answer
    /// means the database simply has not caught up yet and is not a divergence.
    async fn reset_if_inconsistent(&self) -> Result<bool, ManagedNodeError> {
        let Some(node_local_safe) = *self.last_local_safe.lock().await else { return Ok(false) };

        match self.db_provider.derived_to_source(node_local_safe) {
            Ok(_) | Err(StorageError::FutureData) => Ok(false),
            Err(StorageError::ConflictError) => {
                warn!(
                    target: "supervisor::managed_node",
                    block_number = node_local_safe.number,
                    "Node local-safe block conflicts with the database, resetting"
                );
                self.initiate_reset(node_local_safe).await?;
                Ok(true)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resets the node when its local-safe head is ahead of the database's.
    async fn reset_if_ahead(&self) -> Result<(), ManagedNodeError> {
        let Some(node_local_safe) = *self.last_local_safe.lock().await else { return Ok(()) };

        let db_local_safe = self.db_provider.latest_derivation_state()?.derived;
        if node_local_safe.number > db_local_safe.number {
            warn!(
                target: "supervisor::managed_node",
                node_block_number = node_local_safe.number,
                db_block_number = db_local_safe.number,
                "Node local-safe head is ahead of the database, resetting"
            );
            self.initiate_reset(db_local_safe.id()).await?;
        }
        Ok(())
    }

    /// Computes consistent reset heads with `z` as the search upper bound and pushes one reset
    /// call to the node.
    async fn initiate_reset(&self, z: BlockNumHash) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;

        let Some(_guard) = ResetGuard::acquire(&self.reset_in_progress) else {
            debug!(target: "supervisor::managed_node", %chain_id, "Reset already in progress");
            return Ok(());
        };

        let activation = match self.db_provider.get_activation_block() {
            Ok(block) => block,
            Err(StorageError::DatabaseNotInitialised | StorageError::EntryNotFound(_)) => {
                return self.reset_node_pre_interop(chain_id).await;
            }
            Err(err) => return Err(err.into()),
        };

        let local_safe = match self.reset_tracker.find_reset_target(activation.id(), z).await? {
            ResetTarget::PreInterop => return self.reset_node_pre_interop(chain_id).await,
            ResetTarget::Target(id) => id,
        };

        let latest_unsafe = match *self.last_local_unsafe.lock().await {
            Some(id) => id,
            None => self.db_provider.get_latest_block()?.id(),
        };
        let local_unsafe =
            self.reset_tracker.find_reset_unsafe_head_target(local_safe, latest_unsafe).await?;

        let SuperHead { cross_unsafe, cross_safe, finalized, .. } =
            self.db_provider.get_super_head().inspect_err(
                |err| error!(target: "supervisor::managed_node", %chain_id, %err, "Failed to get super head"),
            )?;

        // cross heads never lead the reset target
        let clamp = |head: Option<BlockInfo>| match head {
            Some(block) if block.number <= local_safe.number => block.id(),
            _ => local_safe,
        };
        let cross_unsafe = clamp(cross_unsafe);
        let cross_safe = clamp(cross_safe);
        // fall back to activation block if finalized is None
        let finalized = clamp(Some(finalized.unwrap_or(activation)));

        info!(target: "supervisor::managed_node",
            %chain_id,
            local_unsafe_number = local_unsafe.number,
            cross_unsafe_number = cross_unsafe.number,
            local_safe_number = local_safe.number,
            cross_safe_number = cross_safe.number,
            finalized_number = finalized.number,
            "Resetting managed node with latest consistent heads",
        );

        self.client
            .reset(local_unsafe, cross_unsafe, local_safe, cross_safe, finalized)
            .await
            .inspect_err(|err| {
                error!(target: "supervisor::managed_node", %chain_id, %err, "Failed to reset managed node");
            })?;
        Ok(())
    }

    /// Resets the node to its pre-interop state.
    async fn reset_node_pre_interop(&self, chain_id: ChainId) -> Result<(), ManagedNodeError> {
        info!(target: "supervisor::managed_node", %chain_id, "Resetting the node to pre-interop state");

        self.client.reset_pre_interop().await.inspect_err(|err| {
            error!(target: "supervisor::managed_node", %chain_id, %err, "Failed to reset managed node to pre-interop state");
        })?;
        Ok(())
    }

    /// Returns the database's local-safe head, the default upper bound of a full-range reset.
    fn db_local_safe(&self) -> Result<BlockNumHash, ManagedNodeError> {
        Ok(self.db_provider.latest_derivation_state()?.derived.id())
    }
}

#[async_trait]
impl<DB, C, L> SubscriptionHandler for ManagedNode<DB, C, L>
where
    DB: LogStorageReader + DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + 'static,
    L: L1BlockRefSource + 'static,
{
    async fn handle_exhaust_l1(
        &self,
        derived_ref_pair: &DerivedRefPair,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(
            target: "supervisor::managed_node",
            %chain_id,
            %derived_ref_pair,
            "Handling L1 exhaust event"
        );

        let next_block_number = derived_ref_pair.source.number + 1;
        let new_source = match self.l1.block_ref_by_number(next_block_number).await {
            Ok(block) => block,
            Err(L1AccessorError::BlockNotFound(_)) => {
                // the next L1 block is not confirmed yet, the node waits
                trace!(
                    target: "supervisor::managed_node",
                    %chain_id,
                    next_block_number,
                    "Next L1 block not yet available"
                );
                return Ok(());
            }
            Err(err) => {
                error!(target: "supervisor::managed_node", %chain_id, %err, "Failed to fetch next L1 block");
                return Err(ManagedNodeError::GetBlockByNumberFailed(next_block_number));
            }
        };

        if new_source.parent_hash != derived_ref_pair.source.hash {
            // this could happen due to a reorg.
            // this case should be handled by the L1 rewind path
            debug!(
                target: "supervisor::managed_node",
                %chain_id,
                %new_source,
                current_source = %derived_ref_pair.source,
                "Parent hash mismatch. Possible reorg detected"
            );
        }

        self.client.provide_l1(new_source).await.inspect_err(|err| {
            error!(
                target: "supervisor::managed_node",
                %chain_id,
                %new_source,
                %err,
                "Failed to provide L1 block"
            );
        })?;
        Ok(())
    }

    async fn handle_reset(&self, reset_id: &str) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, reset_id, "Handling reset event");

        let local_safe = self.db_local_safe()?;
        self.initiate_reset(local_safe).await
    }

    async fn handle_unsafe_block(&self, unsafe_block: &BlockInfo) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %unsafe_block, "Unsafe block event received");

        self.chain_event_sender.send(ChainEvent::UnsafeBlock { block: *unsafe_block }).await.map_err(|err| {
            warn!(target: "supervisor::managed_node", %chain_id, %err, "Failed to send unsafe block event");
            ManagedNodeError::ChannelSendFailed(err.to_string())
        })?;

        *self.last_local_unsafe.lock().await = Some(unsafe_block.id());
        self.check_consistency().await
    }

    async fn handle_derivation_update(
        &self,
        derived_ref_pair: &DerivedRefPair,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, "Derivation update event received");

        self.chain_event_sender.send(ChainEvent::DerivedBlock { derived_ref_pair: *derived_ref_pair }).await.map_err(|err| {
            warn!(target: "supervisor::managed_node", %chain_id, %err, "Failed to send derivation update event");
            ManagedNodeError::ChannelSendFailed(err.to_string())
        })?;

        *self.last_local_safe.lock().await = Some(derived_ref_pair.derived.id());
        self.check_consistency().await
    }

    async fn handle_replace_block(
        &self,
        replacement: &BlockReplacement,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %replacement, "Block replacement received");

        self.chain_event_sender.send(ChainEvent::BlockReplaced { replacement: *replacement }).await.map_err(|err| {
            warn!(target: "supervisor::managed_node", %chain_id, %err, "Failed to send block replacement event");
            ManagedNodeError::ChannelSendFailed(err.to_string())
        })?;

        // the replacement supersedes both heads the node reported before
        let id = replacement.replacement.id();
        *self.last_local_unsafe.lock().await = Some(id);
        *self.last_local_safe.lock().await = Some(id);
        self.check_consistency().await
    }

    async fn handle_derivation_origin_update(
        &self,
        origin: &BlockInfo,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %origin, "Derivation origin update received");

        self.chain_event_sender.send(ChainEvent::DerivationOriginUpdate { origin: *origin }).await.map_err(|err| {
            warn!(target: "supervisor::managed_node", %chain_id, %err, "Failed to send derivation origin update event");
            ManagedNodeError::ChannelSendFailed(err.to_string())
        })?;
        Ok(())
    }
}

/// Implements [`BlockProvider`] for [`ManagedNode`] by delegating to the underlying WebSocket
/// client.
#[async_trait]
impl<DB, C, L> BlockProvider for ManagedNode<DB, C, L>
where
    DB: LogStorageReader + DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + 'static,
    L: L1BlockRefSource + 'static,
{
    async fn block_by_number(&self, block_number: u64) -> Result<BlockInfo, ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, block_number, "Fetching block by number");

        let block = self.client.block_ref_by_number(block_number).await?;
        Ok(block.block_info)
    }

    async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %block_hash, "Fetching receipts for block");

        let receipts = self.client.fetch_receipts(block_hash).await?;
        Ok(receipts)
    }
}

#[async_trait]
impl<DB, C, L> ManagedNodeDataProvider for ManagedNode<DB, C, L>
where
    DB: LogStorageReader + DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + 'static,
    L: L1BlockRefSource + 'static,
{
    async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, timestamp, "Fetching output v0 at timestamp");

        let outputv0 = self.client.output_v0_at_timestamp(timestamp).await?;
        Ok(outputv0)
    }

    async fn pending_output_v0_at_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<OutputV0, ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, timestamp, "Fetching pending output v0 at timestamp");

        let outputv0 = self.client.pending_output_v0_at_timestamp(timestamp).await?;
        Ok(outputv0)
    }

    async fn l2_block_ref_by_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<BlockInfo, ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, timestamp, "Fetching L2 block ref by timestamp");

        let block = self.client.l2_block_ref_by_timestamp(timestamp).await?;
        Ok(block.block_info)
    }
}

#[async_trait]
impl<DB, C, L> ManagedNodeController for ManagedNode<DB, C, L>
where
    DB: LogStorageReader + DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + 'static,
    L: L1BlockRefSource + 'static,
{
    async fn update_finalized(
        &self,
        finalized_block_id: BlockNumHash,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(
            target: "supervisor::managed_node",
            %chain_id,
            finalized_block_number = finalized_block_id.number,
            "Updating finalized block"
        );

        self.client.update_finalized(finalized_block_id).await?;
        Ok(())
    }

    async fn update_cross_unsafe(
        &self,
        cross_unsafe_block_id: BlockNumHash,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(
            target: "supervisor::managed_node",
            %chain_id,
            cross_unsafe_block_number = cross_unsafe_block_id.number,
            "Updating cross unsafe block",
        );

        self.client.update_cross_unsafe(cross_unsafe_block_id).await?;
        Ok(())
    }

    async fn update_cross_safe(
        &self,
        source_block_id: BlockNumHash,
        derived_block_id: BlockNumHash,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(
            target: "supervisor::managed_node",
            %chain_id,
            source_block_number = source_block_id.number,
            derived_block_number = derived_block_id.number,
            "Updating cross safe block"
        );
        self.client.update_cross_safe(source_block_id, derived_block_id).await?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, "Resetting managed node state");

        let local_safe = self.db_local_safe()?;
        self.initiate_reset(local_safe).await
    }

    async fn reset_pre_interop(&self) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        self.reset_node_pre_interop(chain_id).await
    }

    async fn invalidate_block(&self, block_seal: BlockSeal) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(
            target: "supervisor::managed_node",
            %chain_id,
            block_number = block_seal.number,
            "Invalidating block"
        );

        self.client.invalidate_block(block_seal).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncnode::ClientError;
    use jsonrpsee::core::client::Subscription;
    use mockall::mock;
    use sentinel_types::{L2BlockInfo, Log, SafetyLevel};

    mock! {
        #[derive(Debug)]
        pub Client {}

        #[async_trait]
        impl ManagedNodeClient for Client {
            async fn chain_id(&self) -> Result<ChainId, ClientError>;
            async fn subscribe_events(&self) -> Result<Subscription<SubscriptionEvent>, ClientError>;
            async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ClientError>;
            async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError>;
            async fn pending_output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError>;
            async fn l2_block_ref_by_timestamp(&self, timestamp: u64) -> Result<L2BlockInfo, ClientError>;
            async fn block_ref_by_number(&self, block_number: u64) -> Result<L2BlockInfo, ClientError>;
            async fn reset_pre_interop(&self) -> Result<(), ClientError>;
            async fn reset(&self, unsafe_id: BlockNumHash, cross_unsafe_id: BlockNumHash, local_safe_id: BlockNumHash, cross_safe_id: BlockNumHash, finalised_id: BlockNumHash) -> Result<(), ClientError>;
            async fn invalidate_block(&self, seal: BlockSeal) -> Result<(), ClientError>;
            async fn provide_l1(&self, block_info: BlockInfo) -> Result<(), ClientError>;
            async fn update_finalized(&self, finalized_block_id: BlockNumHash) -> Result<(), ClientError>;
            async fn update_cross_unsafe(&self, cross_unsafe_block_id: BlockNumHash) -> Result<(), ClientError>;
            async fn update_cross_safe(&self, source_block_id: BlockNumHash, derived_block_id: BlockNumHash) -> Result<(), ClientError>;
            async fn reset_ws_client(&self);
        }
    }

    mock! {
        #[derive(Debug)]
        pub Db {}

        impl LogStorageReader for Db {
            fn get_block(&self, block_number: u64) -> Result<BlockInfo, StorageError>;
            fn get_latest_block(&self) -> Result<BlockInfo, StorageError>;
            fn get_log(&self, block_number: u64, log_index: u32) -> Result<Log, StorageError>;
            fn get_logs(&self, block_number: u64) -> Result<Vec<Log>, StorageError>;
        }

        impl DerivationStorageReader for Db {
            fn derived_to_source(&self, derived_block_id: BlockNumHash) -> Result<BlockInfo, StorageError>;
            fn latest_derived_block_at_source(&self, source_block_id: BlockNumHash) -> Result<BlockInfo, StorageError>;
            fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError>;
            fn get_source_block(&self, source_block_number: u64) -> Result<BlockInfo, StorageError>;
            fn get_activation_block(&self) -> Result<BlockInfo, StorageError>;
        }

        impl HeadRefStorageReader for Db {
            fn get_safety_head_ref(&self, level: SafetyLevel) -> Result<BlockInfo, StorageError>;
            fn get_super_head(&self) -> Result<SuperHead, StorageError>;
        }
    }

    mock! {
        #[derive(Debug)]
        pub L1 {}

        #[async_trait]
        impl L1BlockRefSource for L1 {
            async fn block_ref_by_number(&self, number: u64) -> Result<BlockInfo, L1AccessorError>;
        }
    }

    fn block(number: u64) -> BlockInfo {
        BlockInfo::new(
            B256::with_last_byte(number as u8),
            number,
            B256::with_last_byte(number.saturating_sub(1) as u8),
            number * 10,
        )
    }

    fn l2_block(number: u64) -> L2BlockInfo {
        L2BlockInfo::new(
            block(number),
            BlockNumHash { number: 100 + number, hash: B256::with_last_byte(0x80 + number as u8) },
            0,
        )
    }

    fn node(
        client: MockClient,
        db: MockDb,
        l1: MockL1,
    ) -> (Arc<ManagedNode<MockDb, MockClient, MockL1>>, mpsc::Receiver<ChainEvent>) {
        let (tx, rx) = mpsc::channel(10);
        let node = Arc::new(ManagedNode::new(
            Arc::new(client),
            Arc::new(db),
            Arc::new(l1),
            tx,
            CancellationToken::new(),
        ));
        (node, rx)
    }

    /// A database where the node's reported heads match stored state, so consistency checks
    /// pass without a reset.
    fn consistent_db() -> MockDb {
        let mut db = MockDb::new();
        db.expect_derived_to_source().returning(|id| {
            Ok(BlockInfo::new(B256::with_last_byte(0x80 + id.number as u8), 100 + id.number, B256::ZERO, 0))
        });
        db.expect_latest_derivation_state().returning(|| {
            Ok(DerivedRefPair { source: block(105), derived: block(9) })
        });
        db
    }

    #[tokio::test]
    async fn test_chain_id_caching() {
        let mut client = MockClient::new();
        client.expect_chain_id().times(1).returning(|| Ok(ChainId::from(42u64)));

        let (node, _rx) = node(client, MockDb::new(), MockL1::new());

        // First call fetches from client
        let id1 = node.chain_id().await.unwrap();
        assert_eq!(id1, ChainId::from(42u64));
        // Second call uses cache
        let id2 = node.chain_id().await.unwrap();
        assert_eq!(id2, ChainId::from(42u64));
    }

    #[tokio::test]
    async fn test_handle_unsafe_block_sends_event() {
        let mut client = MockClient::new();
        client.expect_chain_id().times(1).returning(|| Ok(ChainId::from(42u64)));

        let (node, mut rx) = node(client, consistent_db(), MockL1::new());

        let unsafe_block = block(5);
        node.handle_unsafe_block(&unsafe_block).await.unwrap();

        match rx.recv().await.unwrap() {
            ChainEvent::UnsafeBlock { block } => assert_eq!(block.number, 5),
            event => panic!("wrong event: {event:?}"),
        }
        assert_eq!(*node.last_local_unsafe.lock().await, Some(unsafe_block.id()));
    }

    #[tokio::test]
    async fn test_handle_derivation_update_sends_event_and_records_head() {
        let mut client = MockClient::new();
        client.expect_chain_id().times(1).returning(|| Ok(ChainId::from(42u64)));

        let (node, mut rx) = node(client, consistent_db(), MockL1::new());

        let derived_ref_pair = DerivedRefPair { source: block(105), derived: block(9) };
        node.handle_derivation_update(&derived_ref_pair).await.unwrap();

        match rx.recv().await.unwrap() {
            ChainEvent::DerivedBlock { derived_ref_pair: pair } => {
                assert_eq!(pair, derived_ref_pair)
            }
            event => panic!("wrong event: {event:?}"),
        }
        assert_eq!(*node.last_local_safe.lock().await, Some(derived_ref_pair.derived.id()));
    }

    #[tokio::test]
    async fn test_handle_replace_block_sends_event() {
        let mut client = MockClient::new();
        client.expect_chain_id().times(1).returning(|| Ok(ChainId::from(42u64)));

        let (node, mut rx) = node(client, consistent_db(), MockL1::new());

        let replacement =
            BlockReplacement { replacement: block(7), invalidated: B256::with_last_byte(0xaa) };
        node.handle_replace_block(&replacement).await.unwrap();

        match rx.recv().await.unwrap() {
            ChainEvent::BlockReplaced { replacement: rep } => assert_eq!(rep, replacement),
            event => panic!("wrong event: {event:?}"),
        }
        // the replacement becomes both last reported heads
        assert_eq!(*node.last_local_unsafe.lock().await, Some(replacement.replacement.id()));
        assert_eq!(*node.last_local_safe.lock().await, Some(replacement.replacement.id()));
    }

    #[tokio::test]
    async fn test_handle_derivation_origin_update_sends_event() {
        let mut client = MockClient::new();
        client.expect_chain_id().times(1).returning(|| Ok(ChainId::from(42u64)));

        let (node, mut rx) = node(client, MockDb::new(), MockL1::new());

        let origin = block(10);
        node.handle_derivation_origin_update(&origin).await.unwrap();

        match rx.recv().await.unwrap() {
            ChainEvent::DerivationOriginUpdate { origin: block } => assert_eq!(block.number, 10),
            event => panic!("wrong event: {event:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_exhaust_l1_provides_next_block() {
        let source = block(5);
        let pair = DerivedRefPair { source, derived: block(40) };

        let mut client = MockClient::new();
        client.expect_chain_id().times(1).returning(|| Ok(ChainId::from(42u64)));
        client
            .expect_provide_l1()
            .times(1)
            .withf(move |b| b.number == 6 && b.parent_hash == source.hash)
            .returning(|_| Ok(()));

        let mut l1 = MockL1::new();
        l1.expect_block_ref_by_number().returning(move |n| {
            Ok(BlockInfo::new(B256::with_last_byte(n as u8), n, source.hash, n * 10))
        });

        let (node, _rx) = node(client, MockDb::new(), l1);
        node.handle_exhaust_l1(&pair).await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_exhaust_l1_waits_when_next_block_unconfirmed() {
        let pair = DerivedRefPair { source: block(5), derived: block(40) };

        let mut client = MockClient::new();
        client.expect_chain_id().times(1).returning(|| Ok(ChainId::from(42u64)));
        // provide_l1 must not be called

        let mut l1 = MockL1::new();
        l1.expect_block_ref_by_number()
            .returning(|n| Err(L1AccessorError::BlockNotFound(n)));

        let (node, _rx) = node(client, MockDb::new(), l1);
        node.handle_exhaust_l1(&pair).await.unwrap();
    }

    #[tokio::test]
    async fn test_conflicting_derivation_update_triggers_reset() {
        // The database conflicts with the node's local-safe block 5 and agrees below it, so
        // bisection lands on block 4 as the local-safe target. Block 5 still has a canonical
        // L1 origin, so it survives as the local-unsafe head.
        let mut client = MockClient::new();
        client.expect_chain_id().returning(|| Ok(ChainId::from(42u64)));
        client.expect_block_ref_by_number().returning(|n| Ok(l2_block(n)));
        client
            .expect_reset()
            .times(1)
            .withf(|unsafe_id, cross_unsafe_id, local_safe_id, cross_safe_id, finalised_id| {
                unsafe_id.number == 5 &&
                    cross_unsafe_id.number == 3 &&
                    local_safe_id.number == 4 &&
                    cross_safe_id.number == 2 &&
                    finalised_id.number == 1
            })
            .returning(|_, _, _, _, _| Ok(()));

        let mut db = MockDb::new();
        db.expect_derived_to_source().returning(|id| {
            if id.number >= 5 {
                Err(StorageError::ConflictError)
            } else {
                Ok(BlockInfo::new(
                    B256::with_last_byte(0x80 + id.number as u8),
                    100 + id.number,
                    B256::ZERO,
                    0,
                ))
            }
        });
        db.expect_get_activation_block().returning(|| Ok(block(1)));
        db.expect_get_latest_block().returning(|| Ok(block(5)));
        db.expect_get_super_head().returning(|| {
            Ok(SuperHead {
                local_unsafe: block(5),
                cross_unsafe: Some(block(3)),
                local_safe: Some(block(5)),
                cross_safe: Some(block(2)),
                finalized: Some(block(1)),
                l1_source: Some(block(105)),
            })
        });

        let mut l1 = MockL1::new();
        l1.expect_block_ref_by_number().returning(|n| {
            let l2_number = n - 100;
            Ok(BlockInfo::new(B256::with_last_byte(0x80 + l2_number as u8), n, B256::ZERO, 0))
        });

        let (node, mut rx) = node(client, db, l1);
        let pair = DerivedRefPair { source: block(105), derived: block(5) };
        node.handle_derivation_update(&pair).await.unwrap();

        // the derivation update itself was still forwarded before the consistency check
        assert!(matches!(rx.recv().await.unwrap(), ChainEvent::DerivedBlock { .. }));
        // guard released after the reset completed
        assert!(!node.reset_in_progress.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_reset_falls_back_to_pre_interop_without_activation_block() {
        let mut client = MockClient::new();
        client.expect_chain_id().returning(|| Ok(ChainId::from(42u64)));
        client.expect_reset_pre_interop().times(1).returning(|| Ok(()));

        let mut db = MockDb::new();
        db.expect_latest_derivation_state()
            .returning(|| Ok(DerivedRefPair { source: block(105), derived: block(9) }));
        db.expect_get_activation_block()
            .returning(|| Err(StorageError::DatabaseNotInitialised));

        let (node, _rx) = node(client, db, MockL1::new());
        node.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_events_and_commands_dropped_during_reset() {
        let mut client = MockClient::new();
        client.expect_chain_id().returning(|| Ok(ChainId::from(42u64)));
        // no update_finalized expectation: the command must be dropped

        let (node, mut rx) = node(client, MockDb::new(), MockL1::new());
        node.reset_in_progress.store(true, Ordering::Release);

        let event = SubscriptionEvent {
            data: Some(ManagedEvent { unsafe_block: Some(block(5)), ..Default::default() }),
        };
        node.process_incoming_event(event.clone()).await;
        assert!(rx.try_recv().is_err());

        node.process_command(ManagedNodeCommand::UpdateFinalized { block_id: block(3).id() })
            .await;

        // once the guard clears, the same event goes through again
        node.reset_in_progress.store(false, Ordering::Release);
        node.process_incoming_event(event).await;
        assert!(matches!(rx.try_recv().unwrap(), ChainEvent::UnsafeBlock { .. }));
    }
}
