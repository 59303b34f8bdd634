use crate::ChainProcessorError;
use alloy_primitives::ChainId;
use sentinel_types::BlockInfo;
use std::time::{Duration, SystemTime};
use tracing::error;

/// Per-chain block processing metrics.
///
/// Every counter and histogram carries a `chain_id` label; the block processing family
/// additionally carries a `type` label naming the safety level the block moved to.
#[derive(Debug)]
pub(crate) struct Metrics;

/// A success counter, error counter and latency histogram sharing the same labels.
type OperationNames = (&'static str, &'static str, &'static str);

impl Metrics {
    pub(crate) const BLOCK_PROCESSING_SUCCESS_TOTAL: &'static str =
        "supervisor_block_processing_success_total";
    pub(crate) const BLOCK_PROCESSING_ERROR_TOTAL: &'static str =
        "supervisor_block_processing_error_total";
    pub(crate) const BLOCK_PROCESSING_LATENCY_SECONDS: &'static str =
        "supervisor_block_processing_latency_seconds";

    pub(crate) const BLOCK_TYPE_LOCAL_UNSAFE: &'static str = "local_unsafe";
    pub(crate) const BLOCK_TYPE_CROSS_UNSAFE: &'static str = "cross_unsafe";
    pub(crate) const BLOCK_TYPE_LOCAL_SAFE: &'static str = "local_safe";
    pub(crate) const BLOCK_TYPE_CROSS_SAFE: &'static str = "cross_safe";
    pub(crate) const BLOCK_TYPE_FINALIZED: &'static str = "finalized";

    const BLOCK_TYPES: [&'static str; 5] = [
        Self::BLOCK_TYPE_LOCAL_UNSAFE,
        Self::BLOCK_TYPE_CROSS_UNSAFE,
        Self::BLOCK_TYPE_LOCAL_SAFE,
        Self::BLOCK_TYPE_CROSS_SAFE,
        Self::BLOCK_TYPE_FINALIZED,
    ];

    pub(crate) const BLOCK_INVALIDATION_SUCCESS_TOTAL: &'static str =
        "supervisor_block_invalidation_success_total";
    pub(crate) const BLOCK_INVALIDATION_ERROR_TOTAL: &'static str =
        "supervisor_block_invalidation_error_total";
    pub(crate) const BLOCK_INVALIDATION_LATENCY_SECONDS: &'static str =
        "supervisor_block_invalidation_latency_seconds";

    pub(crate) const BLOCK_REPLACEMENT_SUCCESS_TOTAL: &'static str =
        "supervisor_block_replacement_success_total";
    pub(crate) const BLOCK_REPLACEMENT_ERROR_TOTAL: &'static str =
        "supervisor_block_replacement_error_total";
    pub(crate) const BLOCK_REPLACEMENT_LATENCY_SECONDS: &'static str =
        "supervisor_block_replacement_latency_seconds";

    const OPERATIONS: [OperationNames; 2] = [
        (
            Self::BLOCK_INVALIDATION_SUCCESS_TOTAL,
            Self::BLOCK_INVALIDATION_ERROR_TOTAL,
            Self::BLOCK_INVALIDATION_LATENCY_SECONDS,
        ),
        (
            Self::BLOCK_REPLACEMENT_SUCCESS_TOTAL,
            Self::BLOCK_REPLACEMENT_ERROR_TOTAL,
            Self::BLOCK_REPLACEMENT_LATENCY_SECONDS,
        ),
    ];

    /// Gauge tracking the latest block number per safety level.
    /// Labels: `chain_id`, `type`
    pub(crate) const SAFETY_HEAD_REF_LABELS: &'static str = "supervisor_safety_head_ref_labels";

    pub(crate) fn init(chain_id: ChainId) {
        Self::describe();
        Self::zero(chain_id);
    }

    fn describe() {
        metrics::describe_counter!(
            Self::BLOCK_PROCESSING_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successfully processed blocks in the supervisor",
        );
        metrics::describe_counter!(
            Self::BLOCK_PROCESSING_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of errors encountered while processing blocks in the supervisor",
        );
        metrics::describe_histogram!(
            Self::BLOCK_PROCESSING_LATENCY_SECONDS,
            metrics::Unit::Seconds,
            "Latency for processing in the supervisor",
        );

        metrics::describe_counter!(
            Self::BLOCK_INVALIDATION_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successfully invalidated blocks in the supervisor",
        );
        metrics::describe_counter!(
            Self::BLOCK_INVALIDATION_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of errors encountered while invalidating blocks in the supervisor",
        );
        metrics::describe_histogram!(
            Self::BLOCK_INVALIDATION_LATENCY_SECONDS,
            metrics::Unit::Seconds,
            "Latency for invalidating blocks in the supervisor",
        );

        metrics::describe_counter!(
            Self::BLOCK_REPLACEMENT_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successfully replaced blocks in the supervisor",
        );
        metrics::describe_counter!(
            Self::BLOCK_REPLACEMENT_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of errors encountered while replacing blocks in the supervisor",
        );
        metrics::describe_histogram!(
            Self::BLOCK_REPLACEMENT_LATENCY_SECONDS,
            metrics::Unit::Seconds,
            "Latency for replacing blocks in the supervisor",
        );

        metrics::describe_gauge!(Self::SAFETY_HEAD_REF_LABELS, "Supervisor safety head ref",);
    }

    fn zero(chain_id: ChainId) {
        let chain = chain_id.to_string();

        for block_type in Self::BLOCK_TYPES {
            metrics::counter!(
                Self::BLOCK_PROCESSING_SUCCESS_TOTAL,
                "type" => block_type,
                "chain_id" => chain.clone()
            )
            .increment(0);
            metrics::counter!(
                Self::BLOCK_PROCESSING_ERROR_TOTAL,
                "type" => block_type,
                "chain_id" => chain.clone()
            )
            .increment(0);
            metrics::histogram!(
                Self::BLOCK_PROCESSING_LATENCY_SECONDS,
                "type" => block_type,
                "chain_id" => chain.clone()
            )
            .record(0.0);
            metrics::gauge!(
                Self::SAFETY_HEAD_REF_LABELS,
                "type" => block_type,
                "chain_id" => chain.clone()
            )
            .set(0.0);
        }

        for (success_name, error_name, latency_name) in Self::OPERATIONS {
            metrics::counter!(success_name, "chain_id" => chain.clone()).increment(0);
            metrics::counter!(error_name, "chain_id" => chain.clone()).increment(0);
            metrics::histogram!(latency_name, "chain_id" => chain.clone()).record(0.0);
        }
    }

    /// Records the outcome of a block processing step.
    ///
    /// On success the safety head gauge moves to the block number and the latency histogram
    /// records the wall-clock lag behind the block timestamp.
    pub(crate) fn record_block_processing(
        chain_id: ChainId,
        block_type: &'static str,
        result: &Result<BlockInfo, ChainProcessorError>,
    ) {
        let chain = chain_id.to_string();

        let block = match result {
            Ok(block) => block,
            Err(_) => {
                metrics::counter!(
                    Self::BLOCK_PROCESSING_ERROR_TOTAL,
                    "type" => block_type,
                    "chain_id" => chain
                )
                .increment(1);
                return;
            }
        };

        metrics::counter!(
            Self::BLOCK_PROCESSING_SUCCESS_TOTAL,
            "type" => block_type,
            "chain_id" => chain.clone()
        )
        .increment(1);

        metrics::gauge!(
            Self::SAFETY_HEAD_REF_LABELS,
            "type" => block_type,
            "chain_id" => chain.clone()
        )
        .set(block.number as f64);

        match SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(since_epoch) => {
                let lag = since_epoch.as_secs_f64() - block.timestamp as f64;
                metrics::histogram!(
                    Self::BLOCK_PROCESSING_LATENCY_SECONDS,
                    "type" => block_type,
                    "chain_id" => chain
                )
                .record(lag);
            }
            Err(err) => {
                error!(
                    target: "supervisor::chain_processor",
                    chain_id = chain_id,
                    %err,
                    "SystemTime error when recording block processing latency"
                );
            }
        }
    }

    /// Records the outcome and latency of a block invalidation or replacement operation.
    pub(crate) fn record_operation(
        chain_id: ChainId,
        success_name: &'static str,
        error_name: &'static str,
        latency_name: &'static str,
        elapsed: Duration,
        success: bool,
    ) {
        let chain = chain_id.to_string();
        let name = if success { success_name } else { error_name };
        metrics::counter!(name, "chain_id" => chain.clone()).increment(1);
        metrics::histogram!(latency_name, "chain_id" => chain).record(elapsed.as_secs_f64());
    }
}
