use alloy_primitives::{Address, B256, Bytes, keccak256};
use sentinel_types::{ExecutingMessage, Receipts, message::parse_log_to_executing_message};
use tracing::warn;

/// Computes the stored log hash from a payload hash and the emitting address.
///
/// The preimage is the raw 20-byte address followed by the 32-byte payload hash. The result
/// is what the log storage keeps per log and what executing messages are resolved against.
pub fn payload_hash_to_log_hash(payload_hash: B256, addr: Address) -> B256 {
    let mut preimage = [0u8; 52];
    preimage[..20].copy_from_slice(addr.as_slice());
    preimage[20..].copy_from_slice(payload_hash.as_slice());
    keccak256(preimage)
}

/// Returns the raw message payload of a log: every topic in order, then the data.
pub fn log_to_message_payload(log: &alloy_primitives::Log) -> Bytes {
    let topics = log.topics();
    let mut payload = Vec::with_capacity(32 * topics.len() + log.data.data.len());
    for topic in topics {
        payload.extend_from_slice(topic.as_slice());
    }
    payload.extend_from_slice(&log.data.data);
    payload.into()
}

/// Computes the full log hash of a log.
pub fn log_to_log_hash(log: &alloy_primitives::Log) -> B256 {
    payload_hash_to_log_hash(keccak256(log_to_message_payload(log)), log.address)
}

/// Flattens block receipts into storable [`Log`](sentinel_types::Log) entries.
///
/// Log indices run across all receipts of the block. Logs emitted by the cross-L2 inbox are
/// additionally resolved into an [`ExecutingMessage`].
pub fn logs_from_receipts(receipts: &Receipts) -> Vec<sentinel_types::Log> {
    receipts
        .iter()
        .flat_map(|receipt| receipt.logs())
        .enumerate()
        .map(|(index, log)| {
            let executing_message =
                parse_log_to_executing_message(log).and_then(|event| stored_message(&event));
            sentinel_types::Log::new(index as u32, log_to_log_hash(log), executing_message)
        })
        .collect()
}

/// Narrows a decoded inbox event into the stored message form.
///
/// The event identifier fields are 256-bit on the wire but the index only spans realistic
/// block and chain ranges. Receipts are untrusted input, so an identifier outside that range
/// marks the log as plain instead of being truncated.
fn stored_message(
    event: &sentinel_types::message::ExecutingMessage,
) -> Option<ExecutingMessage> {
    let id = &event.identifier;
    let (Ok(chain_id), Ok(block_number), Ok(log_index), Ok(timestamp)) = (
        u64::try_from(id.chainId),
        u64::try_from(id.blockNumber),
        u32::try_from(id.logIndex),
        u64::try_from(id.timestamp),
    ) else {
        warn!(
            target: "supervisor::chain_indexer",
            origin = %id.origin,
            "Executing message identifier out of range, storing as plain log"
        );
        return None;
    };

    Some(ExecutingMessage::new(
        chain_id,
        block_number,
        log_index,
        timestamp,
        payload_hash_to_log_hash(event.payloadHash, id.origin),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::{Receipt, ReceiptWithBloom};
    use alloy_primitives::{Bloom, Bytes, Log, LogData, U256, address, b256};
    use alloy_sol_types::{SolEvent, SolValue};
    use op_alloy_consensus::OpReceiptEnvelope;
    use sentinel_types::message::{
        CROSS_L2_INBOX, ExecutingMessage as ExecutingMessageEvent, MessageIdentifier,
    };

    fn sample_log() -> Log {
        Log::new_unchecked(
            address!("0xe0e1e2e3e4e5e6e7e8e9f0f1f2f3f4f5f6f7f8f9"),
            vec![
                b256!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
                b256!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
            ],
            Bytes::from_static(b"example payload"),
        )
    }

    fn inbox_log(identifier: MessageIdentifier) -> Log {
        let payload_hash = b256!("4242424242424242424242424242424242424242424242424242424242424242");
        let data = LogData::new(
            vec![ExecutingMessageEvent::SIGNATURE_HASH, payload_hash],
            identifier.abi_encode().into(),
        )
        .unwrap();
        Log { address: CROSS_L2_INBOX, data }
    }

    fn receipt(logs: Vec<Log>) -> OpReceiptEnvelope {
        OpReceiptEnvelope::Eip1559(ReceiptWithBloom {
            receipt: Receipt { status: true.into(), cumulative_gas_used: 0, logs },
            logs_bloom: Bloom::ZERO,
        })
    }

    #[test]
    fn test_log_to_message_payload_is_topics_then_data() {
        let log = sample_log();
        let payload = log_to_message_payload(&log);

        let mut expected = Vec::new();
        expected.extend_from_slice(&log.topics()[0].0);
        expected.extend_from_slice(&log.topics()[1].0);
        expected.extend_from_slice(&log.data.data);

        assert_eq!(payload.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_payload_hash_to_log_hash_with_known_value() {
        let address = address!("0xe0e1e2e3e4e5e6e7e8e9f0f1f2f3f4f5f6f7f8f9");
        let payload_hash = keccak256(Bytes::from_static(b"example payload"));

        let expected =
            b256!("f9ed05990c887d3f86718aabd7e940faaa75d6a5cd44602e89642586ce85f2aa");
        assert_eq!(payload_hash_to_log_hash(payload_hash, address), expected);
    }

    #[test]
    fn test_log_to_log_hash_with_known_value() {
        let expected =
            b256!("20b21f284fb0286571fbf1cbfc20cdb1d50ea5c74c914478aee4a47b0a82a170");
        assert_eq!(log_to_log_hash(&sample_log()), expected);
    }

    #[test]
    fn test_logs_from_receipts_indexes_across_receipts() {
        let receipts = vec![
            receipt(vec![sample_log(), sample_log()]),
            receipt(vec![sample_log()]),
        ];

        let logs = logs_from_receipts(&receipts);
        assert_eq!(logs.len(), 3);
        assert_eq!(logs.iter().map(|l| l.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(logs.iter().all(|l| l.hash == log_to_log_hash(&sample_log())));
        assert!(logs.iter().all(|l| l.executing_message.is_none()));
    }

    #[test]
    fn test_inbox_log_resolves_to_executing_message() {
        let identifier = MessageIdentifier {
            origin: address!("0x1111111111111111111111111111111111111111"),
            blockNumber: U256::from(12u64),
            logIndex: U256::from(3u64),
            timestamp: U256::from(1_700_000_000u64),
            chainId: U256::from(10u64),
        };
        let logs = logs_from_receipts(&vec![receipt(vec![inbox_log(identifier)])]);

        let message = logs[0].executing_message.unwrap();
        assert_eq!(message.chain_id, 10);
        assert_eq!(message.block_number, 12);
        assert_eq!(message.log_index, 3);
        assert_eq!(message.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_out_of_range_identifier_stored_as_plain_log() {
        // Identifier fields wider than the index range must not panic or truncate.
        let identifier = MessageIdentifier {
            origin: address!("0x1111111111111111111111111111111111111111"),
            blockNumber: U256::MAX,
            logIndex: U256::from(u64::from(u32::MAX) + 1),
            timestamp: U256::from(1_700_000_000u64),
            chainId: U256::MAX,
        };
        let log = inbox_log(identifier);
        let logs = logs_from_receipts(&vec![receipt(vec![log.clone()])]);

        assert_eq!(logs.len(), 1);
        assert!(logs[0].executing_message.is_none());
        assert_eq!(logs[0].hash, log_to_log_hash(&log));
    }
}
