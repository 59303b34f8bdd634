//! Cross-chain message primitives and the `CrossL2Inbox` event ABI.
//!
//! <https://specs.optimism.io/interop/messaging.html#messaging>

use alloy_primitives::{Address, ChainId, Log, address};
use alloy_sol_types::{SolEvent, sol};

/// Address of the `CrossL2Inbox` predeploy, the only emitter of executing message events.
pub const CROSS_L2_INBOX: Address = address!("0x4200000000000000000000000000000000000022");

sol! {
    /// A pointer to a message payload on a remote (or local) chain.
    #[derive(Default, Debug, PartialEq, Eq)]
    struct MessageIdentifier {
        address origin;
        uint256 blockNumber;
        uint256 logIndex;
        uint256 timestamp;
        uint256 chainId;
    }

    /// Emitted by the `CrossL2Inbox` predeploy when a cross chain message is executed.
    ///
    /// `payloadHash` is the hash of the executed message payload, `identifier` points at the
    /// initiating message.
    #[derive(Default, Debug, PartialEq, Eq)]
    event ExecutingMessage(bytes32 indexed payloadHash, MessageIdentifier identifier);
}

/// Parses a [`Log`] to an [`ExecutingMessage`], if it is one.
///
/// At most one executing message event can exist per log. Returns `None` for logs that are not
/// `CrossL2Inbox` executing message events.
pub fn parse_log_to_executing_message(log: &Log) -> Option<ExecutingMessage> {
    (log.address == CROSS_L2_INBOX && log.topics().len() == 2)
        .then(|| ExecutingMessage::decode_log_data(&log.data).ok())
        .flatten()
}

/// The execution context a `checkAccessList` request is validated against.
#[derive(Default, Debug, PartialEq, Eq, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutingDescriptor {
    /// The timestamp the messages are executed at.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// Requests that the validation still holds at `timestamp + timeout` (message expiry may
    /// drop previously valid messages).
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    pub timeout: Option<u64>,
    /// Chain ID of the chain the messages are executed on.
    #[serde(
        default,
        rename = "chainID",
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub chain_id: Option<ChainId>,
}

impl ExecutingDescriptor {
    /// Instantiates a new [`ExecutingDescriptor`].
    pub const fn new(timestamp: u64, timeout: Option<u64>, chain_id: Option<ChainId>) -> Self {
        Self { timestamp, timeout, chain_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, LogData, U256};
    use alloy_sol_types::SolValue;

    #[test]
    fn test_serialize_executing_descriptor() {
        let descriptor = ExecutingDescriptor {
            timestamp: 1234567890,
            timeout: Some(3600),
            chain_id: Some(1000),
        };
        let serialized = serde_json::to_string(&descriptor).unwrap();
        let expected = r#"{"timestamp":"0x499602d2","timeout":"0xe10","chainID":"0x3e8"}"#;
        assert_eq!(serialized, expected);

        let deserialized: ExecutingDescriptor = serde_json::from_str(&serialized).unwrap();
        assert_eq!(descriptor, deserialized);
    }

    #[test]
    fn test_parse_log_to_executing_message() {
        let payload_hash = B256::from([0x42u8; 32]);
        let identifier = MessageIdentifier {
            origin: Address::from([0x11u8; 20]),
            blockNumber: U256::from(12u64),
            logIndex: U256::from(3u64),
            timestamp: U256::from(1700000000u64),
            chainId: U256::from(10u64),
        };
        let data = LogData::new(
            vec![ExecutingMessage::SIGNATURE_HASH, payload_hash],
            identifier.abi_encode().into(),
        )
        .unwrap();

        let log = Log { address: CROSS_L2_INBOX, data };
        let message = parse_log_to_executing_message(&log).unwrap();
        assert_eq!(message.payloadHash, payload_hash);
        assert_eq!(message.identifier, identifier);

        // Same event emitted from a different address is not an executing message.
        let other = Log { address: Address::from([0x22u8; 20]), data: log.data.clone() };
        assert!(parse_log_to_executing_message(&other).is_none());
    }
}
