use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, Bytes, ChainId, keccak256};
use async_trait::async_trait;
use core::fmt::Debug;
use op_alloy_rpc_types::SuperchainDAError;
use sentinel_storage::{
    DbReader, FinalizedL1Storage, ReadHandleProvider, StorageError, StorageReadHandle,
};
use sentinel_types::{
    Access, BlockInfo, ChainRootInfo, DependencySet, ExecutingDescriptor, InteropValidator,
    OutputRootWithChain, SUPER_ROOT_VERSION, SafetyLevel, SuperHead, SuperRoot, SuperRootOutput,
    SyncStatus, parse_access_list,
};
use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, error, info, warn};

use crate::{
    SpecError, SupervisorError,
    config::Config,
    logs_from_receipts,
    status::StatusTracker,
    syncnode::{BlockProvider, ManagedNodeDataProvider},
};

/// Defines the service for the Supervisor core logic.
#[async_trait]
#[auto_impl::auto_impl(&, &mut, Arc, Box)]
pub trait SupervisorService: Debug + Send + Sync {
    /// Returns list of supervised [`ChainId`]s.
    fn chain_ids(&self) -> impl Iterator<Item = ChainId>;

    /// Returns mapping of supervised [`ChainId`]s to their [`ChainDependency`] config.
    ///
    /// [`ChainDependency`]: sentinel_types::ChainDependency
    fn dependency_set(&self) -> &DependencySet;

    /// Returns [`SuperHead`] of given supervised chain.
    fn super_head(&self, chain: ChainId) -> Result<SuperHead, SupervisorError>;

    /// Returns latest block derived from given L1 block, for given chain.
    fn latest_block_from(
        &self,
        l1_block: BlockNumHash,
        chain: ChainId,
    ) -> Result<BlockInfo, SupervisorError>;

    /// Returns the L1 source block that the given L2 derived block was based on, for the specified
    /// chain.
    fn derived_to_source_block(
        &self,
        chain: ChainId,
        derived: BlockNumHash,
    ) -> Result<BlockInfo, SupervisorError>;

    /// Returns [`LocalUnsafe`] block for the given chain.
    ///
    /// [`LocalUnsafe`]: SafetyLevel::LocalUnsafe
    fn local_unsafe(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError>;

    /// Returns [`CrossUnsafe`] block for the given chain.
    ///
    /// [`CrossUnsafe`]: SafetyLevel::CrossUnsafe
    fn cross_unsafe(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError>;

    /// Returns [`LocalSafe`] block for the given chain.
    ///
    /// [`LocalSafe`]: SafetyLevel::LocalSafe
    fn local_safe(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError>;

    /// Returns [`CrossSafe`] block for the given chain.
    ///
    /// [`CrossSafe`]: SafetyLevel::CrossSafe
    fn cross_safe(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError>;

    /// Returns [`Finalized`] block for the given chain.
    ///
    /// [`Finalized`]: SafetyLevel::Finalized
    fn finalized(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError>;

    /// Returns the finalized L1 block that the supervisor is synced to.
    fn finalized_l1(&self) -> Result<BlockInfo, SupervisorError>;

    /// Returns the combined sync status of all supervised chains.
    fn sync_status(&self) -> Result<SyncStatus, SupervisorError>;

    /// Returns the [`SuperRootOutput`] at a specified timestamp, which represents the global
    /// state across all monitored chains.
    async fn super_root_at_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<SuperRootOutput, SupervisorError>;

    /// Verifies if an access-list references only valid messages
    fn check_access_list(
        &self,
        inbox_entries: Vec<B256>,
        min_safety: SafetyLevel,
        executing_descriptor: ExecutingDescriptor,
    ) -> Result<(), SupervisorError>;

    /// Returns `true` if the failsafe flag is set.
    fn failsafe_enabled(&self) -> bool;

    /// Sets or clears the failsafe flag. While set, all access-list checks are rejected.
    fn set_failsafe_enabled(&self, enabled: bool);
}

/// The core Supervisor component responsible for monitoring and coordinating chain states.
#[derive(Debug)]
pub struct Supervisor<M, DB, F> {
    config: Arc<Config>,
    db_provider: Arc<F>,
    status: Arc<StatusTracker>,

    databases: RwLock<HashMap<ChainId, Arc<DB>>>,

    // As of now supervisor only supports a single managed node per chain.
    // This is a limitation of the current implementation, but it will be extended in the future.
    managed_nodes: RwLock<HashMap<ChainId, Arc<M>>>,

    failsafe: Arc<AtomicBool>,
}

impl<M, DB, F> Supervisor<M, DB, F>
where
    M: ManagedNodeDataProvider + BlockProvider + 'static,
    DB: DbReader + Send + Sync,
    F: ReadHandleProvider + FinalizedL1Storage,
{
    /// Creates a new [`Supervisor`] instance.
    ///
    /// The failsafe flag is shared with the per-chain processors so that a local-safe block
    /// invalidation can trip it.
    pub fn new(
        config: Arc<Config>,
        db_provider: Arc<F>,
        status: Arc<StatusTracker>,
        failsafe: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            db_provider,
            status,
            databases: RwLock::new(HashMap::new()),
            managed_nodes: RwLock::new(HashMap::new()),
            failsafe,
        }
    }

    /// Registers the database for a supervised chain.
    pub fn add_chain_db(&self, chain_id: ChainId, db: Arc<DB>) -> Result<(), SupervisorError> {
        if !self.config.dependency_set.has_chain(chain_id) {
            warn!(target: "supervisor::service", %chain_id, "Unsupported chain ID");
            return Err(SupervisorError::UnsupportedChainId);
        }

        let mut databases = self.databases.write().map_err(|_| StorageError::LockPoisoned)?;
        if databases.contains_key(&chain_id) {
            warn!(target: "supervisor::service", %chain_id, "Database already exists for chain");
            return Ok(());
        }

        databases.insert(chain_id, db);
        Ok(())
    }

    /// Adds a new managed node to the [`Supervisor`].
    pub fn add_managed_node(
        &self,
        chain_id: ChainId,
        managed_node: Arc<M>,
    ) -> Result<(), SupervisorError> {
        if !self.config.dependency_set.has_chain(chain_id) {
            warn!(target: "supervisor::service", %chain_id, "Unsupported chain ID");
            return Err(SupervisorError::UnsupportedChainId);
        }

        let mut managed_nodes =
            self.managed_nodes.write().map_err(|_| StorageError::LockPoisoned)?;
        if managed_nodes.contains_key(&chain_id) {
            warn!(target: "supervisor::service", %chain_id, "Managed node already exists for chain");
            return Ok(());
        }

        managed_nodes.insert(chain_id, managed_node);
        Ok(())
    }

    fn get_db(&self, chain: ChainId) -> Result<Arc<DB>, SupervisorError> {
        let databases = self.databases.read().map_err(|_| StorageError::LockPoisoned)?;
        databases.get(&chain).cloned().ok_or_else(|| {
            warn!(target: "supervisor::service", %chain, "No database registered for chain");
            SupervisorError::UnsupportedChainId
        })
    }

    fn get_managed_node(&self, chain: ChainId) -> Result<Arc<M>, SupervisorError> {
        let managed_nodes = self.managed_nodes.read().map_err(|_| StorageError::LockPoisoned)?;
        managed_nodes.get(&chain).cloned().ok_or_else(|| {
            error!(target: "supervisor::service", %chain, "Managed node not found for chain");
            SupervisorError::ManagedNodeMissing(chain)
        })
    }

    fn verify_safety_level(
        &self,
        chain_id: ChainId,
        block: &BlockInfo,
        safety: SafetyLevel,
    ) -> Result<(), SupervisorError> {
        let head_ref = self.get_db(chain_id)?.get_safety_head_ref(safety).map_err(|err| {
            warn!(target: "supervisor::service", %chain_id, %err, "Failed to get safety head ref for chain");
            SpecError::SuperchainDAError(SuperchainDAError::ConflictingData)
        })?;

        if head_ref.number < block.number {
            return Err(SpecError::SuperchainDAError(SuperchainDAError::ConflictingData).into());
        }

        Ok(())
    }

    /// Re-verifies an access-list claim against the initiating chain's node, off the request
    /// path. The outcome is only logged, a divergence here indicates local index corruption.
    fn spawn_rpc_verification(&self, chain_id: ChainId, block: BlockInfo, access: &Access) {
        let Ok(managed_node) = self.get_managed_node(chain_id) else {
            return;
        };

        let access = access.clone();
        tokio::spawn(async move {
            let receipts = match managed_node.fetch_receipts(block.hash).await {
                Ok(receipts) => receipts,
                Err(err) => {
                    debug!(
                        target: "supervisor::service",
                        %chain_id,
                        block_number = block.number,
                        %err,
                        "Node re-verification could not fetch receipts"
                    );
                    return;
                }
            };

            let logs = logs_from_receipts(&receipts);
            match logs.get(access.log_index as usize) {
                Some(log) if access.verify_checksum(&log.hash).is_ok() => {
                    debug!(
                        target: "supervisor::service",
                        %chain_id,
                        block_number = block.number,
                        log_index = access.log_index,
                        "Node re-verification confirmed access-list claim"
                    );
                }
                Some(log) => {
                    warn!(
                        target: "supervisor::service",
                        %chain_id,
                        block_number = block.number,
                        log_index = access.log_index,
                        log_hash = %log.hash,
                        checksum = %access.checksum,
                        "Node re-verification found a conflicting log hash"
                    );
                }
                None => {
                    warn!(
                        target: "supervisor::service",
                        %chain_id,
                        block_number = block.number,
                        log_index = access.log_index,
                        "Node re-verification could not find the log"
                    );
                }
            }
        });
    }
}

#[async_trait]
impl<M, DB, F> SupervisorService for Supervisor<M, DB, F>
where
    M: ManagedNodeDataProvider + BlockProvider + 'static,
    DB: DbReader + Send + Sync,
    F: ReadHandleProvider + FinalizedL1Storage,
{
    fn chain_ids(&self) -> impl Iterator<Item = ChainId> {
        self.config.dependency_set.dependencies.keys().copied()
    }

    fn dependency_set(&self) -> &DependencySet {
        &self.config.dependency_set
    }

    fn super_head(&self, chain: ChainId) -> Result<SuperHead, SupervisorError> {
        Ok(self.get_db(chain)?.get_super_head().map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get super head for chain");
            SpecError::from(err)
        })?)
    }

    fn latest_block_from(
        &self,
        l1_block: BlockNumHash,
        chain: ChainId,
    ) -> Result<BlockInfo, SupervisorError> {
        Ok(self
            .get_db(chain)?
            .latest_derived_block_at_source(l1_block)
            .map_err(|err| {
                error!(target: "supervisor::service", %chain, %err, "Failed to get latest derived block at source for chain");
                SpecError::from(err)
            })?
        )
    }

    fn derived_to_source_block(
        &self,
        chain: ChainId,
        derived: BlockNumHash,
    ) -> Result<BlockInfo, SupervisorError> {
        Ok(self.get_db(chain)?.derived_to_source(derived).map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get derived to source block for chain");
            SpecError::from(err)
        })?)
    }

    fn local_unsafe(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError> {
        Ok(self.get_db(chain)?.get_safety_head_ref(SafetyLevel::LocalUnsafe).map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get local unsafe head ref for chain");
            SpecError::from(err)
        })?)
    }

    fn cross_unsafe(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError> {
        Ok(self.get_db(chain)?.get_safety_head_ref(SafetyLevel::CrossUnsafe).map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get cross unsafe head ref for chain");
            SpecError::from(err)
        })?)
    }

    fn local_safe(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError> {
        Ok(self.get_db(chain)?.get_safety_head_ref(SafetyLevel::LocalSafe).map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get local safe head ref for chain");
            SpecError::from(err)
        })?)
    }

    fn cross_safe(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError> {
        Ok(self.get_db(chain)?.get_safety_head_ref(SafetyLevel::CrossSafe).map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get cross safe head ref for chain");
            SpecError::from(err)
        })?)
    }

    fn finalized(&self, chain: ChainId) -> Result<BlockInfo, SupervisorError> {
        Ok(self.get_db(chain)?.get_safety_head_ref(SafetyLevel::Finalized).map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get finalized head ref for chain");
            SpecError::from(err)
        })?)
    }

    fn finalized_l1(&self) -> Result<BlockInfo, SupervisorError> {
        Ok(self.db_provider.get_finalized_l1().map_err(|err| {
            error!(target: "supervisor::service", %err, "Failed to get finalized L1");
            SpecError::from(err)
        })?)
    }

    fn sync_status(&self) -> Result<SyncStatus, SupervisorError> {
        self.status.sync_status()
    }

    async fn super_root_at_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<SuperRootOutput, SupervisorError> {
        // Sorted chain ids for deterministic super root hash
        let chain_ids = self.config.dependency_set.chains();

        let mut chain_infos = Vec::<ChainRootInfo>::with_capacity(chain_ids.len());
        let mut super_root_chains = Vec::<OutputRootWithChain>::with_capacity(chain_ids.len());
        let mut cross_safe_source = BlockNumHash::default();

        for id in chain_ids {
            let managed_node = self.get_managed_node(id)?;

            let output_v0 = managed_node.output_v0_at_timestamp(timestamp).await?;
            let output_v0_string = serde_json::to_string(&output_v0)
                .inspect_err(|err| {
                    error!(target: "supervisor::service", chain_id = %id, %err, "Failed to serialize output_v0 for chain");
                })?;
            let canonical_root = keccak256(output_v0_string.as_bytes());

            let pending_output_v0 = managed_node.pending_output_v0_at_timestamp(timestamp).await?;
            let pending_output_v0_string = serde_json::to_string(&pending_output_v0)
                .inspect_err(|err| {
                    error!(target: "supervisor::service", chain_id = %id, %err, "Failed to serialize pending_output_v0 for chain");
                })?;
            let pending_output_v0_bytes =
                Bytes::copy_from_slice(pending_output_v0_string.as_bytes());

            chain_infos.push(ChainRootInfo {
                chain_id: id,
                canonical: canonical_root,
                pending: pending_output_v0_bytes,
            });

            super_root_chains
                .push(OutputRootWithChain { chain_id: id, output_root: canonical_root });

            let l2_block = managed_node.l2_block_ref_by_timestamp(timestamp).await?;
            let source = self
                .derived_to_source_block(id, l2_block.id())
                .inspect_err(|err| {
                    error!(target: "supervisor::service", %id, %err, "Failed to get derived to source block for chain");
                })?;

            if cross_safe_source.number == 0 || cross_safe_source.number < source.number {
                cross_safe_source = source.id();
            }
        }

        let super_root = SuperRoot { timestamp, output_roots: super_root_chains };
        let super_root_hash = super_root.hash();

        Ok(SuperRootOutput {
            cross_safe_derived_from: cross_safe_source,
            timestamp,
            super_root: super_root_hash,
            chains: chain_infos,
            version: SUPER_ROOT_VERSION,
        })
    }

    fn check_access_list(
        &self,
        inbox_entries: Vec<B256>,
        min_safety: SafetyLevel,
        executing_descriptor: ExecutingDescriptor,
    ) -> Result<(), SupervisorError> {
        if self.failsafe_enabled() {
            warn!(target: "supervisor::service", "Rejecting access-list check, failsafe is enabled");
            return Err(SupervisorError::FailsafeEnabled);
        }

        if min_safety == SafetyLevel::Invalid {
            warn!(target: "supervisor::service", "Rejecting access-list check with invalid safety level");
            return Err(SpecError::ErrorNotInSpec.into());
        }

        let access_list = parse_access_list(inbox_entries)?;

        // A single handle spans the whole check, so a rewind between entries is caught at the
        // end rather than validating against a mixed view of storage.
        let handle = self.db_provider.acquire_handle()?;

        for access in &access_list {
            // Check all the invariants for each message
            // Ref: https://github.com/ethereum-optimism/specs/blob/main/specs/interop/derivation.md#invariants

            if access.chain_id[0..24].iter().any(|byte| *byte != 0) {
                error!(target: "supervisor::service", "Initiating chain id does not fit in 64 bits");
                return Err(SupervisorError::ChainIdParseError());
            }

            let initiating_chain_id = access.chain_id[24..32]
                .try_into()
                .map(u64::from_be_bytes)
                .map_err(|err| {
                    error!(target: "supervisor::service", %err, "Failed to parse initiating chain id from access list");
                    SupervisorError::ChainIdParseError()
                })?;

            let executing_chain_id = executing_descriptor.chain_id.unwrap_or(initiating_chain_id);

            // Message must be valid at the time of execution.
            self.config.validate_interop_timestamps(
                initiating_chain_id,
                access.timestamp,
                executing_chain_id,
                executing_descriptor.timestamp,
                executing_descriptor.timeout,
            ).map_err(|err| {
                warn!(target: "supervisor::service", %err, "Failed to validate interop timestamps");
                SpecError::SuperchainDAError(SuperchainDAError::ConflictingData)
            })?;

            // Verify the initiating message exists and valid for corresponding executing message.
            let db = self.get_db(initiating_chain_id)?;

            let block = db.get_block(access.block_number).map_err(|err| {
                warn!(target: "supervisor::service", %initiating_chain_id, %err, "Failed to get block for chain");
                SpecError::from(err)
            })?;
            if block.timestamp != access.timestamp {
                return Err(SupervisorError::from(SpecError::SuperchainDAError(
                    SuperchainDAError::ConflictingData,
                )))
            }

            let log = db.get_log(access.block_number, access.log_index).map_err(|err| {
                warn!(target: "supervisor::service", %initiating_chain_id, %err, "Failed to get log for chain");
                SpecError::from(err)
            })?;
            access.verify_checksum(&log.hash).map_err(|err| {
                warn!(target: "supervisor::service", %initiating_chain_id, %err, "Failed to verify checksum for access list");
                SpecError::SuperchainDAError(SuperchainDAError::ConflictingData)
            })?;

            handle.depend_on_derived_time(initiating_chain_id, access.timestamp);

            if self.config.rpc_verification_enabled {
                self.spawn_rpc_verification(initiating_chain_id, block, access);
            }

            // The message must be included in a block that is at least as safe as required
            // by the `min_safety` level
            if min_safety != SafetyLevel::LocalUnsafe {
                // The block is already unsafe as it is found in log db
                self.verify_safety_level(initiating_chain_id, &block, min_safety)?;
            }
        }

        if !handle.is_valid() {
            warn!(target: "supervisor::service", "Storage was rewound underneath the access-list check");
            return Err(SpecError::SuperchainDAError(SuperchainDAError::ConflictingData).into());
        }

        Ok(())
    }

    fn failsafe_enabled(&self) -> bool {
        self.failsafe.load(Ordering::Acquire)
    }

    fn set_failsafe_enabled(&self, enabled: bool) {
        info!(target: "supervisor::service", enabled, "Updating failsafe flag");
        self.failsafe.store(enabled, Ordering::Release);
    }
}
