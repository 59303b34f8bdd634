//! Metrics for the managed node RPC client.

use std::time::Duration;

/// Container for metrics.
#[derive(Debug, Clone)]
pub(super) struct Metrics;

impl Metrics {
    /// Identifier for the counter of successful RPC requests. Labels: `method`, `node`.
    pub(crate) const RPC_REQUESTS_SUCCESS_TOTAL: &'static str =
        "managed_node_rpc_requests_success_total";
    /// Identifier for the counter of failed RPC requests. Labels: `method`, `node`.
    pub(crate) const RPC_REQUESTS_ERROR_TOTAL: &'static str =
        "managed_node_rpc_requests_error_total";
    /// Identifier for the histogram of RPC request durations. Labels: `method`, `node`.
    pub(crate) const RPC_REQUEST_DURATION_SECONDS: &'static str =
        "managed_node_rpc_request_duration_seconds";

    /// The `method` label values, one per client call.
    const METHODS: [&'static str; 14] = [
        "chain_id",
        "subscribe_events",
        "fetch_receipts",
        "output_v0_at_timestamp",
        "pending_output_v0_at_timestamp",
        "l2_block_ref_by_timestamp",
        "block_ref_by_number",
        "reset_pre_interop",
        "reset",
        "invalidate_block",
        "provide_l1",
        "update_finalized",
        "update_cross_unsafe",
        "update_cross_safe",
    ];

    pub(crate) const RPC_METHOD_CHAIN_ID: &'static str = Self::METHODS[0];
    pub(crate) const RPC_METHOD_SUBSCRIBE_EVENTS: &'static str = Self::METHODS[1];
    pub(crate) const RPC_METHOD_FETCH_RECEIPTS: &'static str = Self::METHODS[2];
    pub(crate) const RPC_METHOD_OUTPUT_V0_AT_TIMESTAMP: &'static str = Self::METHODS[3];
    pub(crate) const RPC_METHOD_PENDING_OUTPUT_V0_AT_TIMESTAMP: &'static str = Self::METHODS[4];
    pub(crate) const RPC_METHOD_L2_BLOCK_REF_BY_TIMESTAMP: &'static str = Self::METHODS[5];
    pub(crate) const RPC_METHOD_BLOCK_REF_BY_NUMBER: &'static str = Self::METHODS[6];
    pub(crate) const RPC_METHOD_RESET_PRE_INTEROP: &'static str = Self::METHODS[7];
    pub(crate) const RPC_METHOD_RESET: &'static str = Self::METHODS[8];
    pub(crate) const RPC_METHOD_INVALIDATE_BLOCK: &'static str = Self::METHODS[9];
    pub(crate) const RPC_METHOD_PROVIDE_L1: &'static str = Self::METHODS[10];
    pub(crate) const RPC_METHOD_UPDATE_FINALIZED: &'static str = Self::METHODS[11];
    pub(crate) const RPC_METHOD_UPDATE_CROSS_UNSAFE: &'static str = Self::METHODS[12];
    pub(crate) const RPC_METHOD_UPDATE_CROSS_SAFE: &'static str = Self::METHODS[13];

    /// Initializes metrics for the managed node RPC client.
    ///
    /// This does two things:
    /// * Describes various metrics.
    /// * Initializes metrics with their labels to 0 so they can be queried immediately.
    pub(crate) fn init(node: &str) {
        Self::describe();
        Self::zero(node);
    }

    /// Describes metrics used in the managed node RPC client.
    fn describe() {
        metrics::describe_counter!(
            Self::RPC_REQUESTS_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successful RPC requests processed by the managed mode client"
        );
        metrics::describe_counter!(
            Self::RPC_REQUESTS_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of failed RPC requests processed by the managed mode client"
        );
        metrics::describe_histogram!(
            Self::RPC_REQUEST_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Duration of RPC requests processed by the managed mode client"
        );
    }

    /// Initializes metrics with their labels to `0` so they appear in Prometheus from the start.
    fn zero(node: &str) {
        for method in Self::METHODS {
            metrics::counter!(
                Self::RPC_REQUESTS_SUCCESS_TOTAL,
                "method" => method,
                "node" => node.to_string()
            )
            .increment(0);
            metrics::counter!(
                Self::RPC_REQUESTS_ERROR_TOTAL,
                "method" => method,
                "node" => node.to_string()
            )
            .increment(0);
            metrics::histogram!(
                Self::RPC_REQUEST_DURATION_SECONDS,
                "method" => method,
                "node" => node.to_string()
            )
            .record(0.0);
        }
    }

    /// Records the outcome and duration of a single RPC call.
    pub(super) fn record(node: &str, method: &'static str, elapsed: Duration, success: bool) {
        metrics::histogram!(
            Self::RPC_REQUEST_DURATION_SECONDS,
            "method" => method,
            "node" => node.to_string()
        )
        .record(elapsed.as_secs_f64());

        let name = if success {
            Self::RPC_REQUESTS_SUCCESS_TOTAL
        } else {
            Self::RPC_REQUESTS_ERROR_TOTAL
        };
        metrics::counter!(name, "method" => method, "node" => node.to_string()).increment(1);
    }
}
