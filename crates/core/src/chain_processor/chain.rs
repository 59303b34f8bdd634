use crate::{
    ChainProcessorError, ProcessorState,
    event::ChainEvent,
    indexing::ChainIndexer,
    status::StatusTracker,
    syncnode::{BlockProvider, ManagedNodeCommand},
};
use alloy_primitives::ChainId;
use sentinel_storage::{
    DerivationStorage, HeadRefStorageWriter, LogStorage, StorageError, StorageRewinder,
};
use sentinel_types::{BlockInfo, BlockReplacement, BlockSeal, DerivedRefPair, InteropValidator};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Applies the event stream of one supervised chain to its database and managed node.
///
/// Local head advances land in storage, cross and finalized promotions are forwarded to the
/// node, and unsafe head advances raise the [`ChainIndexer`] target so receipts catch up in
/// the background. Between an `InvalidateBlock` and its matching `BlockReplaced` event the
/// processor holds the invalidated pair and drops every other block event.
#[derive(Debug)]
pub struct ChainProcessor<P, W, V> {
    chain_id: ChainId,
    validator: Arc<V>,
    indexer: Arc<ChainIndexer<P, W>>,
    db_provider: Arc<W>,
    managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
    chain_event_sender: mpsc::Sender<ChainEvent>,
    failsafe: Option<Arc<AtomicBool>>,
    metrics_enabled: bool,

    state: ProcessorState,
}

impl<P, W, V> ChainProcessor<P, W, V>
where
    P: BlockProvider + 'static,
    V: InteropValidator + 'static,
    W: LogStorage + DerivationStorage + HeadRefStorageWriter + StorageRewinder + 'static,
{
    /// Creates a new [`ChainProcessor`].
    pub fn new(
        validator: Arc<V>,
        chain_id: ChainId,
        indexer: Arc<ChainIndexer<P, W>>,
        db_provider: Arc<W>,
        managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
        chain_event_sender: mpsc::Sender<ChainEvent>,
    ) -> Self {
        Self {
            chain_id,
            validator,
            indexer,
            db_provider,
            managed_node_sender,
            chain_event_sender,
            failsafe: None,
            metrics_enabled: false,
            state: ProcessorState::new(),
        }
    }

    /// Enables metrics for this processor.
    pub fn with_metrics(mut self) -> Self {
        self.metrics_enabled = true;
        super::Metrics::init(self.chain_id);
        self
    }

    /// Attaches a failsafe flag that gets engaged whenever a block is invalidated.
    pub fn with_failsafe(mut self, failsafe: Arc<AtomicBool>) -> Self {
        self.failsafe = Some(failsafe);
        self
    }

    /// Consumes incoming chain events until the channel closes or the token is cancelled.
    /// Every event is applied to the shared [`StatusTracker`] before it is handled.
    pub async fn run(
        mut self,
        mut event_rx: mpsc::Receiver<ChainEvent>,
        status: Arc<StatusTracker>,
        cancellation: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!(
                        target: "supervisor::chain_processor",
                        chain_id = self.chain_id,
                        "Chain processor stopped"
                    );
                    break;
                }
                maybe_event = event_rx.recv() => match maybe_event {
                    Some(event) => {
                        status.on_event(self.chain_id, &event);
                        self.handle_event(event).await;
                    }
                    None => {
                        info!(
                            target: "supervisor::chain_processor",
                            chain_id = self.chain_id,
                            "Event channel closed, stopping chain processor"
                        );
                        break;
                    }
                }
            }
        }
    }

    /// Handles a single chain event.
    pub async fn handle_event(&mut self, event: ChainEvent) {
        let result = match event {
            ChainEvent::UnsafeBlock { block } => self.handle_unsafe_block(block),
            ChainEvent::DerivedBlock { derived_ref_pair } => {
                self.handle_derived_block(derived_ref_pair).await
            }
            ChainEvent::DerivationOriginUpdate { origin } => {
                self.handle_origin_update(origin).await
            }
            ChainEvent::InvalidateBlock { block } => self.handle_invalidation(block).await,
            ChainEvent::BlockReplaced { replacement } => {
                self.handle_replacement(replacement).await
            }
            ChainEvent::FinalizedSourceUpdate { finalized_source_block } => {
                self.handle_finalized_source(finalized_source_block).await
            }
            ChainEvent::FinalizedUpdate { block } => {
                // Emitted by the finalized-source path itself, the status tracker already
                // consumed it.
                trace!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    block_number = block.number,
                    "Finalized head updated"
                );
                Ok(block)
            }
            ChainEvent::CrossUnsafeUpdate { block } => self.handle_cross_unsafe(block).await,
            ChainEvent::CrossSafeUpdate { derived_ref_pair } => {
                self.handle_cross_safe(derived_ref_pair).await
            }
        };

        if let Err(err) = result {
            debug!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %err,
                ?event,
                "Failed to process event"
            );
        }
    }

    /// Forwards a command to the managed node task.
    async fn command_node(&self, command: ManagedNodeCommand) -> Result<(), ChainProcessorError> {
        self.managed_node_sender.send(command).await.map_err(|err| {
            warn!(
                target: "supervisor::chain_processor::managed_node",
                chain_id = self.chain_id,
                %err,
                "Failed to send command to managed node"
            );
            ChainProcessorError::ChannelSendFailed(err.to_string())
        })
    }

    fn record_block(&self, block_type: &'static str, result: &Result<BlockInfo, ChainProcessorError>) {
        if self.metrics_enabled {
            super::Metrics::record_block_processing(self.chain_id, block_type, result);
        }
    }

    fn record_operation(
        &self,
        names: (&'static str, &'static str, &'static str),
        elapsed: std::time::Duration,
        success: bool,
    ) {
        if self.metrics_enabled {
            super::Metrics::record_operation(
                self.chain_id,
                names.0,
                names.1,
                names.2,
                elapsed,
                success,
            );
        }
    }

    /// Logs and skips an event while an invalidated block awaits replacement.
    fn skip_while_invalidated(&self, block_number: u64) -> bool {
        if self.state.is_invalidated() {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number,
                "Invalidated block already set, skipping event"
            );
            return true;
        }
        false
    }

    /// Handles a local-unsafe head advance.
    ///
    /// Post interop the new head becomes the indexing target, so the receipts of every block
    /// up to it get fetched and stored in the background. The interop activation block seeds
    /// the log storage instead.
    fn handle_unsafe_block(
        &self,
        block: BlockInfo,
    ) -> Result<BlockInfo, ChainProcessorError> {
        if self.skip_while_invalidated(block.number) {
            return Ok(block);
        }

        let result = (|| {
            if self.validator.is_post_interop(self.chain_id, block.timestamp) {
                self.indexer.process_chain(block.number);
                return Ok(block);
            }

            if self.validator.is_interop_activation_block(self.chain_id, block) {
                trace!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    block_number = block.number,
                    "Initialising log storage for interop activation block"
                );
                self.db_provider.initialise_log_storage(block).inspect_err(|err| {
                    error!(
                        target: "supervisor::chain_processor::db",
                        chain_id = self.chain_id,
                        %block,
                        %err,
                        "Failed to initialise log storage for interop activation block"
                    );
                })?;
            }
            Ok(block)
        })();

        self.record_block(super::Metrics::BLOCK_TYPE_LOCAL_UNSAFE, &result);
        result
    }

    /// Handles a local-safe derivation advance.
    async fn handle_derived_block(
        &self,
        derived_ref_pair: DerivedRefPair,
    ) -> Result<BlockInfo, ChainProcessorError> {
        if self.skip_while_invalidated(derived_ref_pair.derived.number) {
            return Ok(derived_ref_pair.derived);
        }

        let derived = derived_ref_pair.derived;
        let result = async {
            if self.validator.is_post_interop(self.chain_id, derived.timestamp) {
                self.save_derived_block(derived_ref_pair).await?;
                return Ok(derived);
            }

            if self.validator.is_interop_activation_block(self.chain_id, derived) {
                trace!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    block_number = derived.number,
                    "Initialising derivation storage for interop activation block"
                );
                self.db_provider.initialise_derivation_storage(derived_ref_pair).inspect_err(
                    |err| {
                        error!(
                            target: "supervisor::chain_processor::db",
                            chain_id = self.chain_id,
                            %err,
                            "Failed to initialise derivation storage for interop activation block"
                        );
                    },
                )?;
            }
            Ok(derived)
        }
        .await;

        self.record_block(super::Metrics::BLOCK_TYPE_LOCAL_SAFE, &result);
        result
    }

    /// Persists a derived block pair, recovering from the recoverable storage answers.
    async fn save_derived_block(
        &self,
        derived_ref_pair: DerivedRefPair,
    ) -> Result<(), ChainProcessorError> {
        match self.db_provider.save_derived_block(derived_ref_pair) {
            Ok(()) => Ok(()),
            Err(StorageError::BlockOutOfOrder) => {
                debug!(
                    target: "supervisor::chain_processor::db",
                    chain_id = self.chain_id,
                    block_number = derived_ref_pair.derived.number,
                    "Block out of order detected, resetting managed node"
                );
                self.command_node(ManagedNodeCommand::Reset {}).await
            }
            Err(StorageError::ReorgRequired) => {
                info!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    derived_block = %derived_ref_pair.derived,
                    "Local derivation conflict detected, rewinding"
                );
                self.rewind_logs_to(derived_ref_pair.derived.number)?;
                self.resync_and_save(derived_ref_pair).await
            }
            Err(StorageError::FutureData) => {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    derived_block = %derived_ref_pair.derived,
                    "Log storage behind derivation, resyncing block"
                );
                self.resync_and_save(derived_ref_pair).await
            }
            Err(err) => {
                error!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    block_number = derived_ref_pair.derived.number,
                    %err,
                    "Failed to save derived block pair"
                );
                Err(err.into())
            }
        }
    }

    /// Rewinds the log storage to the stored block at the given height.
    fn rewind_logs_to(&self, block_number: u64) -> Result<(), ChainProcessorError> {
        let log_block = self.db_provider.get_block(block_number).inspect_err(|err| {
            warn!(
                target: "supervisor::chain_processor::db",
                chain_id = self.chain_id,
                block_number,
                %err,
                "Failed to get block for rewinding log storage"
            );
        })?;

        self.db_provider.rewind_log_storage(&log_block.id()).inspect_err(|err| {
            warn!(
                target: "supervisor::chain_processor::db",
                chain_id = self.chain_id,
                block_number,
                %err,
                "Failed to rewind log storage"
            );
        })?;
        Ok(())
    }

    /// Re-indexes the derived block in place and retries the save.
    async fn resync_and_save(
        &self,
        derived_ref_pair: DerivedRefPair,
    ) -> Result<(), ChainProcessorError> {
        self.indexer.index_block(derived_ref_pair.derived).await.inspect_err(|err| {
            error!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = derived_ref_pair.derived.number,
                %err,
                "Failed to re-index derived block"
            );
        })?;

        self.db_provider.save_derived_block(derived_ref_pair).inspect_err(|err| {
            error!(
                target: "supervisor::chain_processor::db",
                chain_id = self.chain_id,
                block_number = derived_ref_pair.derived.number,
                %err,
                "Failed to save derived block after resync"
            );
        })?;
        Ok(())
    }

    /// Handles a derivation origin advance.
    async fn handle_origin_update(
        &self,
        origin: BlockInfo,
    ) -> Result<BlockInfo, ChainProcessorError> {
        if self.skip_while_invalidated(origin.number) {
            return Ok(origin);
        }

        match self.db_provider.save_source_block(origin) {
            Ok(()) => Ok(origin),
            Err(StorageError::BlockOutOfOrder) => {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %origin,
                    "Source block out of order detected, resetting managed node"
                );
                self.command_node(ManagedNodeCommand::Reset {}).await?;
                Ok(origin)
            }
            Err(err) => {
                error!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %origin,
                    %err,
                    "Failed to save source block during derivation origin update"
                );
                Err(err.into())
            }
        }
    }

    /// Handles a block invalidation: rewinds local state, tells the node, remembers the pair
    /// until the replacement arrives and engages the failsafe when one is attached.
    async fn handle_invalidation(
        &mut self,
        block: BlockInfo,
    ) -> Result<BlockInfo, ChainProcessorError> {
        let started = Instant::now();
        let result = self.invalidate_block(block).await;
        self.record_operation(
            (
                super::Metrics::BLOCK_INVALIDATION_SUCCESS_TOTAL,
                super::Metrics::BLOCK_INVALIDATION_ERROR_TOTAL,
                super::Metrics::BLOCK_INVALIDATION_LATENCY_SECONDS,
            ),
            started.elapsed(),
            result.is_ok(),
        );
        result
    }

    async fn invalidate_block(
        &mut self,
        block: BlockInfo,
    ) -> Result<BlockInfo, ChainProcessorError> {
        if self.skip_while_invalidated(block.number) {
            return Ok(block);
        }

        let source_block = self.db_provider.derived_to_source(block.id()).inspect_err(|err| {
            warn!(
                target: "supervisor::chain_processor::db",
                chain_id = self.chain_id,
                %block,
                %err,
                "Failed to get source block for invalidation"
            );
        })?;

        self.db_provider.rewind(&block.id()).inspect_err(|err| {
            warn!(
                target: "supervisor::chain_processor::db",
                chain_id = self.chain_id,
                %block,
                %err,
                "Failed to rewind state for invalidation"
            );
        })?;

        let seal = BlockSeal::new(block.hash, block.number, block.timestamp);
        self.command_node(ManagedNodeCommand::InvalidateBlock { seal }).await?;

        self.state.set_invalidated(DerivedRefPair { source: source_block, derived: block });

        if let Some(failsafe) = &self.failsafe {
            failsafe.store(true, Ordering::Release);
            warn!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %block,
                "Failsafe engaged after block invalidation"
            );
        }
        Ok(block)
    }

    /// Handles the replacement of a previously invalidated block.
    async fn handle_replacement(
        &mut self,
        replacement: BlockReplacement,
    ) -> Result<BlockInfo, ChainProcessorError> {
        let started = Instant::now();
        let result = self.replace_block(replacement).await;
        self.record_operation(
            (
                super::Metrics::BLOCK_REPLACEMENT_SUCCESS_TOTAL,
                super::Metrics::BLOCK_REPLACEMENT_ERROR_TOTAL,
                super::Metrics::BLOCK_REPLACEMENT_LATENCY_SECONDS,
            ),
            started.elapsed(),
            result.is_ok(),
        );
        result
    }

    async fn replace_block(
        &mut self,
        replacement: BlockReplacement,
    ) -> Result<BlockInfo, ChainProcessorError> {
        let Some(invalidated_pair) = self.state.get_invalidated() else {
            debug!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %replacement,
                "No invalidated block set, skipping replacement"
            );
            return Ok(replacement.replacement);
        };

        if invalidated_pair.derived.hash != replacement.invalidated {
            debug!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                invalidated_block = %invalidated_pair.derived,
                replacement_block = %replacement.replacement,
                "Invalidated block hash does not match replacement, skipping"
            );
            return Ok(replacement.replacement);
        }

        self.resync_and_save(DerivedRefPair {
            source: invalidated_pair.source,
            derived: replacement.replacement,
        })
        .await?;

        self.state.clear_invalidated();
        Ok(replacement.replacement)
    }

    /// Handles a finalized L1 advance: promotes the corresponding derived block in storage,
    /// tells the node and re-emits the new finalized head.
    async fn handle_finalized_source(
        &self,
        finalized_source_block: BlockInfo,
    ) -> Result<BlockInfo, ChainProcessorError> {
        let result = async {
            let finalized_derived_block = self
                .db_provider
                .update_finalized_using_source(finalized_source_block)
                .inspect_err(|err| {
                    warn!(
                        target: "supervisor::chain_processor::db",
                        chain_id = self.chain_id,
                        %finalized_source_block,
                        %err,
                        "Failed to update finalized block using source"
                    );
                })?;

            self.command_node(ManagedNodeCommand::UpdateFinalized {
                block_id: finalized_derived_block.id(),
            })
            .await?;

            self.chain_event_sender
                .send(ChainEvent::FinalizedUpdate { block: finalized_derived_block })
                .await
                .map_err(|err| {
                    warn!(
                        target: "supervisor::chain_processor",
                        chain_id = self.chain_id,
                        %finalized_derived_block,
                        %err,
                        "Failed to emit finalized head update"
                    );
                    ChainProcessorError::ChannelSendFailed(err.to_string())
                })?;
            Ok(finalized_derived_block)
        }
        .await;

        self.record_block(super::Metrics::BLOCK_TYPE_FINALIZED, &result);
        result
    }

    /// Forwards a cross-unsafe promotion to the managed node.
    async fn handle_cross_unsafe(
        &self,
        block: BlockInfo,
    ) -> Result<BlockInfo, ChainProcessorError> {
        let result = self
            .command_node(ManagedNodeCommand::UpdateCrossUnsafe { block_id: block.id() })
            .await
            .map(|()| block);

        self.record_block(super::Metrics::BLOCK_TYPE_CROSS_UNSAFE, &result);
        result
    }

    /// Forwards a cross-safe promotion to the managed node.
    async fn handle_cross_safe(
        &self,
        derived_ref_pair: DerivedRefPair,
    ) -> Result<BlockInfo, ChainProcessorError> {
        let result = self
            .command_node(ManagedNodeCommand::UpdateCrossSafe {
                source_block_id: derived_ref_pair.source.id(),
                derived_block_id: derived_ref_pair.derived.id(),
            })
            .await
            .map(|()| derived_ref_pair.derived);

        self.record_block(super::Metrics::BLOCK_TYPE_CROSS_SAFE, &result);
        result
    }
}
