//! Receipt collections fetched from managed nodes.

use op_alloy_consensus::OpReceiptEnvelope;

/// The receipts of all transactions in a single block.
pub type Receipts = Vec<OpReceiptEnvelope>;
