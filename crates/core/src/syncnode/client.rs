use super::{AuthenticationError, ClientError, metrics::Metrics};
use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, ChainId};
use alloy_rpc_types_engine::{Claims, JwtSecret};
use async_trait::async_trait;
use jsonrpsee::{
    core::{
        client::{ClientT, Subscription, SubscriptionClientT},
        params::ArrayParams,
    },
    rpc_params,
    ws_client::{HeaderMap, HeaderValue, WsClient, WsClientBuilder},
};
use sentinel_types::{BlockInfo, BlockSeal, L2BlockInfo, OutputV0, Receipts, SubscriptionEvent};
use serde::de::DeserializeOwned;
use std::{
    fmt::Debug,
    sync::{Arc, OnceLock},
    time::Instant,
};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Trait for a managed node client that provides various methods to interact with the node.
#[async_trait]
pub trait ManagedNodeClient: Send + Sync + Debug {
    /// Returns the [`ChainId`] of the managed node.
    async fn chain_id(&self) -> Result<ChainId, ClientError>;

    /// Subscribes to [`SubscriptionEvent`] from the managed node.
    async fn subscribe_events(&self) -> Result<Subscription<SubscriptionEvent>, ClientError>;

    /// Fetches [`Receipts`] for a given block hash.
    async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ClientError>;

    /// Fetches the [`OutputV0`] at a specific timestamp.
    async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError>;

    /// Fetches the pending [`OutputV0`] at a specific timestamp.
    async fn pending_output_v0_at_timestamp(&self, timestamp: u64)
    -> Result<OutputV0, ClientError>;

    /// Fetches the [`L2BlockInfo`] by timestamp.
    async fn l2_block_ref_by_timestamp(&self, timestamp: u64) -> Result<L2BlockInfo, ClientError>;

    /// Fetches the [`L2BlockInfo`] by block number.
    async fn block_ref_by_number(&self, block_number: u64) -> Result<L2BlockInfo, ClientError>;

    /// Resets the managed node to the pre-interop state.
    async fn reset_pre_interop(&self) -> Result<(), ClientError>;

    /// Resets the node state with the provided block IDs.
    async fn reset(
        &self,
        unsafe_id: BlockNumHash,
        cross_unsafe_id: BlockNumHash,
        local_safe_id: BlockNumHash,
        cross_safe_id: BlockNumHash,
        finalised_id: BlockNumHash,
    ) -> Result<(), ClientError>;

    /// Invalidates a block in the managed node.
    async fn invalidate_block(&self, seal: BlockSeal) -> Result<(), ClientError>;

    /// Provides L1 [`BlockInfo`] to the managed node.
    async fn provide_l1(&self, block_info: BlockInfo) -> Result<(), ClientError>;

    /// Updates the finalized block ID in the managed node.
    async fn update_finalized(&self, finalized_block_id: BlockNumHash) -> Result<(), ClientError>;

    /// Updates the cross-unsafe block ID in the managed node.
    async fn update_cross_unsafe(
        &self,
        cross_unsafe_block_id: BlockNumHash,
    ) -> Result<(), ClientError>;

    /// Updates the cross-safe block ID in the managed node.
    async fn update_cross_safe(
        &self,
        source_block_id: BlockNumHash,
        derived_block_id: BlockNumHash,
    ) -> Result<(), ClientError>;

    /// Resets the ws-client to None when server disconnects.
    async fn reset_ws_client(&self);
}

/// The subscription topic accepted by the node's `interop_subscribe` method.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
enum SubscriptionTopic {
    /// The topic for events from the managed node.
    Events,
}

/// [`ClientConfig`] sets the configuration for the managed node client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The URL + port of the managed node
    pub url: String,
    /// jwt secret for the managed node interop rpc
    pub jwt_secret: JwtSecret,
}

/// Client for interacting with a managed node.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    /// Chain ID of the managed node
    chain_id: OnceLock<ChainId>,
    /// The attached web socket client
    ws_client: Mutex<Option<Arc<WsClient>>>,
}

impl Client {
    /// Creates a new [`Client`] with the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Metrics::init(config.url.as_ref());
        Self { config, chain_id: OnceLock::new(), ws_client: Mutex::new(None) }
    }

    /// Creates authentication headers using JWT secret.
    fn create_auth_headers(&self) -> Result<HeaderMap, ClientError> {
        // Create JWT claims with current time
        let claims = Claims::with_current_timestamp();
        let token = self.config.jwt_secret.encode(&claims).map_err(|err| {
            error!(target: "supervisor::managed_node", %err, "Failed to encode JWT claims");
            AuthenticationError::InvalidJwt
        })?;

        let mut headers = HeaderMap::new();
        let auth_header = format!("Bearer {token}");

        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_header).map_err(|err| {
                error!(target: "supervisor::managed_node", %err, "Invalid authorization header");
                AuthenticationError::InvalidHeader
            })?,
        );

        Ok(headers)
    }

    /// Returns a reference to the WebSocket client, creating it if it doesn't exist.
    // todo: support http client as well
    pub async fn get_ws_client(&self) -> Result<Arc<WsClient>, ClientError> {
        let mut ws_client_guard = self.ws_client.lock().await;
        if ws_client_guard.is_none() {
            let headers = self.create_auth_headers().inspect_err(|err| {
                error!(target: "supervisor::managed_node", %err, "Failed to create auth headers");
            })?;

            info!(target: "supervisor::managed_node", ws_url = self.config.url, "Creating a new web socket client");
            let client =
                WsClientBuilder::default().set_headers(headers).build(&self.config.url).await?;

            *ws_client_guard = Some(Arc::new(client));
        }
        Ok(ws_client_guard.clone().unwrap())
    }

    /// Issues a single RPC request and records its per-method metrics.
    async fn call<R: DeserializeOwned>(
        &self,
        method: &'static str,
        rpc_method: &'static str,
        params: ArrayParams,
    ) -> Result<R, ClientError> {
        let client = self.get_ws_client().await?;

        let started = Instant::now();
        let result = client.request::<R, _>(rpc_method, params).await;
        Metrics::record(&self.config.url, method, started.elapsed(), result.is_ok());

        Ok(result?)
    }
}

#[async_trait]
impl ManagedNodeClient for Client {
    async fn reset_ws_client(&self) {
        let mut ws_client_guard = self.ws_client.lock().await;
        if ws_client_guard.is_some() {
            *ws_client_guard = None;
        };
    }

    async fn chain_id(&self) -> Result<ChainId, ClientError> {
        if let Some(chain_id) = self.chain_id.get() {
            return Ok(*chain_id);
        }

        let chain_id_str: String = self
            .call(Metrics::RPC_METHOD_CHAIN_ID, "interop_chainID", rpc_params![])
            .await
            .inspect_err(|err| {
                error!(target: "supervisor::managed_node", %err, "Failed to get chain ID");
            })?;

        let chain_id = chain_id_str.parse::<u64>().inspect_err(|err| {
            error!(target: "supervisor::managed_node", %err, "Failed to parse chain ID");
        })?;

        let _ = self.chain_id.set(chain_id);
        Ok(chain_id)
    }

    async fn subscribe_events(&self) -> Result<Subscription<SubscriptionEvent>, ClientError> {
        let client = self.get_ws_client().await?;

        let started = Instant::now();
        let result = client
            .subscribe::<SubscriptionEvent, _>(
                "interop_subscribe",
                rpc_params![SubscriptionTopic::Events],
                "interop_unsubscribe",
            )
            .await;
        Metrics::record(
            &self.config.url,
            Metrics::RPC_METHOD_SUBSCRIBE_EVENTS,
            started.elapsed(),
            result.is_ok(),
        );

        Ok(result?)
    }

    async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ClientError> {
        self.call(
            Metrics::RPC_METHOD_FETCH_RECEIPTS,
            "interop_fetchReceipts",
            rpc_params![block_hash],
        )
        .await
    }

    async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError> {
        self.call(
            Metrics::RPC_METHOD_OUTPUT_V0_AT_TIMESTAMP,
            "interop_outputV0AtTimestamp",
            rpc_params![timestamp],
        )
        .await
    }

    async fn pending_output_v0_at_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<OutputV0, ClientError> {
        self.call(
            Metrics::RPC_METHOD_PENDING_OUTPUT_V0_AT_TIMESTAMP,
            "interop_pendingOutputV0AtTimestamp",
            rpc_params![timestamp],
        )
        .await
    }

    async fn l2_block_ref_by_timestamp(&self, timestamp: u64) -> Result<L2BlockInfo, ClientError> {
        self.call(
            Metrics::RPC_METHOD_L2_BLOCK_REF_BY_TIMESTAMP,
            "interop_l2BlockRefByTimestamp",
            rpc_params![timestamp],
        )
        .await
    }

    async fn block_ref_by_number(&self, block_number: u64) -> Result<L2BlockInfo, ClientError> {
        self.call(
            Metrics::RPC_METHOD_BLOCK_REF_BY_NUMBER,
            "interop_l2BlockRefByNumber",
            rpc_params![block_number],
        )
        .await
    }

    async fn reset_pre_interop(&self) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_RESET_PRE_INTEROP, "interop_resetPreInterop", rpc_params![])
            .await
    }

    async fn reset(
        &self,
        unsafe_id: BlockNumHash,
        cross_unsafe_id: BlockNumHash,
        local_safe_id: BlockNumHash,
        cross_safe_id: BlockNumHash,
        finalised_id: BlockNumHash,
    ) -> Result<(), ClientError> {
        self.call(
            Metrics::RPC_METHOD_RESET,
            "interop_reset",
            rpc_params![unsafe_id, cross_unsafe_id, local_safe_id, cross_safe_id, finalised_id],
        )
        .await
    }

    async fn invalidate_block(&self, seal: BlockSeal) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_INVALIDATE_BLOCK, "interop_invalidateBlock", rpc_params![seal])
            .await
    }

    async fn provide_l1(&self, block_info: BlockInfo) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_PROVIDE_L1, "interop_provideL1", rpc_params![block_info])
            .await
    }

    async fn update_finalized(&self, finalized_block_id: BlockNumHash) -> Result<(), ClientError> {
        self.call(
            Metrics::RPC_METHOD_UPDATE_FINALIZED,
            "interop_updateFinalized",
            rpc_params![finalized_block_id],
        )
        .await
    }

    async fn update_cross_unsafe(
        &self,
        cross_unsafe_block_id: BlockNumHash,
    ) -> Result<(), ClientError> {
        self.call(
            Metrics::RPC_METHOD_UPDATE_CROSS_UNSAFE,
            "interop_updateCrossUnsafe",
            rpc_params![cross_unsafe_block_id],
        )
        .await
    }

    async fn update_cross_safe(
        &self,
        source_block_id: BlockNumHash,
        derived_block_id: BlockNumHash,
    ) -> Result<(), ClientError> {
        // the node expects the derived block first
        self.call(
            Metrics::RPC_METHOD_UPDATE_CROSS_SAFE,
            "interop_updateCrossSafe",
            rpc_params![derived_block_id, source_block_id],
        )
        .await
    }
}
