use super::RollupConfigSet;
use crate::syncnode::ClientConfig;
use alloy_primitives::ChainId;
use derive_more::Constructor;
use sentinel_types::{BlockInfo, DependencySet, InteropValidationError, InteropValidator};
use std::net::SocketAddr;

/// Configuration for the supervisor service.
#[derive(Debug, Clone, Constructor)]
pub struct Config {
    /// The URL of the L1 RPC endpoint.
    pub l1_rpc: String,

    /// L2 consensus nodes configuration.
    pub l2_consensus_nodes_config: Vec<ClientConfig>,

    /// The socket address for the RPC server to listen on.
    pub rpc_addr: SocketAddr,

    /// The loaded dependency set configuration.
    pub dependency_set: DependencySet,

    /// The rollup configuration set.
    pub rollup_config_set: RollupConfigSet,

    /// Number of L1 blocks treated as unconfirmed below the tip.
    pub l1_confirmation_depth: u64,

    /// Whether to enable the failsafe automatically when a local-safe block is invalidated.
    pub failsafe_on_invalidation: bool,

    /// Whether access-list checks additionally re-verify claims against the initiating chain's
    /// node over RPC, asynchronously and best-effort.
    pub rpc_verification_enabled: bool,
}

impl InteropValidator for Config {
    fn validate_interop_timestamps(
        &self,
        initiating_chain_id: ChainId,
        initiating_timestamp: u64,
        executing_chain_id: ChainId,
        executing_timestamp: u64,
        timeout: Option<u64>,
    ) -> Result<(), InteropValidationError> {
        // Interop must be active on both chains at the relevant times
        if !self.rollup_config_set.is_post_interop(initiating_chain_id, initiating_timestamp) ||
            !self.rollup_config_set.is_post_interop(executing_chain_id, executing_timestamp)
        {
            return Err(InteropValidationError::InteropNotEnabled);
        }

        // Executing timestamp must not be earlier than the initiating timestamp
        if initiating_timestamp > executing_timestamp {
            return Err(InteropValidationError::InvalidTimestampInvariant {
                initiating: initiating_timestamp,
                executing: executing_timestamp,
            });
        }

        // Ensure the message has not expired by the time of execution
        let expiry_window = self.dependency_set.get_message_expiry_window();
        let expires_at = initiating_timestamp.saturating_add(expiry_window);
        let execution_deadline = executing_timestamp.saturating_add(timeout.unwrap_or(0));

        if expires_at < execution_deadline {
            return Err(InteropValidationError::InvalidInteropTimestamp(executing_timestamp));
        }

        Ok(())
    }

    fn is_post_interop(&self, chain_id: ChainId, timestamp: u64) -> bool {
        self.rollup_config_set.is_post_interop(chain_id, timestamp)
    }

    fn is_interop_activation_block(&self, chain_id: ChainId, block: BlockInfo) -> bool {
        self.rollup_config_set.is_interop_activation_block(chain_id, block)
    }
}
