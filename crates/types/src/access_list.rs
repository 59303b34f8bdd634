//! Parsing and checksum verification for `CrossL2Inbox` access-list entries.
//!
//! An access list is a flat sequence of 32-byte words. Each message claim is encoded as a
//! lookup entry (type `0x01`), an optional chain-id extension entry (type `0x02`) and a
//! mandatory checksum entry (type `0x03`), in that order.
//!
//! Reference: <https://github.com/ethereum-optimism/specs/blob/main/specs/interop/predeploys.md#access-list>

use alloy_primitives::{B256, keccak256};
use thiserror::Error;

const TYPE_LOOKUP: u8 = 0x01;
const TYPE_CHAIN_ID_EXTENSION: u8 = 0x02;
const TYPE_CHECKSUM: u8 = 0x03;

/// One fully decoded access-list message claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    /// The full 256-bit initiating chain ID, assembled from the lookup entry and the optional
    /// extension entry.
    pub chain_id: [u8; 32],
    /// The initiating block number.
    pub block_number: u64,
    /// The timestamp of the initiating block.
    pub timestamp: u64,
    /// The index of the initiating log within its block.
    pub log_index: u32,
    /// The checksum word supplied with the claim (type byte `0x03`).
    pub checksum: B256,
}

impl Access {
    fn assemble(lookup: Lookup, extension: Option<[u8; 24]>, checksum: B256) -> Self {
        let mut chain_id = [0u8; 32];
        if let Some(upper) = extension {
            chain_id[0..24].copy_from_slice(&upper);
        }
        chain_id[24..32].copy_from_slice(&lookup.chain_id_low);

        Self {
            chain_id,
            block_number: lookup.block_number,
            timestamp: lookup.timestamp,
            log_index: lookup.log_index,
            checksum,
        }
    }

    /// Recomputes the checksum of this claim against the given initiating log hash.
    ///
    /// Layout, per the predeploy spec:
    /// `idPacked = 12 zero bytes ++ be64(block_number) ++ be64(timestamp) ++ be32(log_index)`,
    /// `idLogHash = keccak256(log_hash ++ idPacked)`,
    /// `checksum = keccak256(idLogHash ++ chain_id)` with the first byte forced to `0x03`.
    pub fn recompute_checksum(&self, log_hash: &B256) -> B256 {
        let mut id_packed = [0u8; 32];
        id_packed[12..20].copy_from_slice(&self.block_number.to_be_bytes());
        id_packed[20..28].copy_from_slice(&self.timestamp.to_be_bytes());
        id_packed[28..32].copy_from_slice(&self.log_index.to_be_bytes());

        let id_log_hash = keccak256([log_hash.as_slice(), &id_packed].concat());
        let mut checksum = keccak256([id_log_hash.as_slice(), &self.chain_id].concat());
        checksum.0[0] = TYPE_CHECKSUM;
        checksum
    }

    /// Verifies the supplied checksum against a recomputation from the given log hash.
    pub fn verify_checksum(&self, log_hash: &B256) -> Result<(), AccessListError> {
        if self.recompute_checksum(log_hash) != self.checksum {
            return Err(AccessListError::MalformedEntry);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Lookup {
    chain_id_low: [u8; 8],
    block_number: u64,
    timestamp: u64,
    log_index: u32,
}

#[derive(Debug, Clone)]
enum Entry {
    Lookup(Lookup),
    ChainIdExtension([u8; 24]),
    Checksum(B256),
}

/// Error returned when access-list parsing or checksum verification fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessListError {
    /// The input ended before the current claim was completed by a checksum entry.
    #[error("unexpected end of access list")]
    UnexpectedEnd,

    /// An entry carried an unknown or out-of-place type byte.
    #[error("expected entry type {expected:#x}, got {found:#x}")]
    UnexpectedType {
        /// The expected type byte.
        expected: u8,
        /// The type byte found.
        found: u8,
    },

    /// The entry sequence or an entry's padding bytes were invalid.
    #[error("malformed access list entry")]
    MalformedEntry,
}

/// Parses raw 32-byte access-list words into [`Access`] claims.
///
/// Every claim must consist of a lookup entry, at most one chain-id extension, and a closing
/// checksum entry. Entries are consumed strictly in order; any deviation fails the whole list.
pub fn parse_access_list(entries: Vec<B256>) -> Result<Vec<Access>, AccessListError> {
    let mut accesses = Vec::with_capacity(entries.len() / 2);
    let mut pending_lookup: Option<Lookup> = None;
    let mut pending_extension: Option<[u8; 24]> = None;

    for raw in entries {
        match parse_entry(&raw)? {
            Entry::Lookup(lookup) => {
                if pending_lookup.is_some() {
                    return Err(AccessListError::MalformedEntry);
                }
                pending_lookup = Some(lookup);
            }
            Entry::ChainIdExtension(upper) => {
                if pending_lookup.is_none() || pending_extension.is_some() {
                    return Err(AccessListError::MalformedEntry);
                }
                pending_extension = Some(upper);
            }
            Entry::Checksum(checksum) => {
                let lookup = pending_lookup.take().ok_or(AccessListError::MalformedEntry)?;
                accesses.push(Access::assemble(lookup, pending_extension.take(), checksum));
            }
        }
    }

    if pending_lookup.is_some() {
        return Err(AccessListError::UnexpectedEnd);
    }

    Ok(accesses)
}

fn parse_entry(raw: &B256) -> Result<Entry, AccessListError> {
    match raw[0] {
        TYPE_LOOKUP => {
            if raw[1..4] != [0; 3] {
                return Err(AccessListError::MalformedEntry);
            }
            Ok(Entry::Lookup(Lookup {
                chain_id_low: raw[4..12].try_into().expect("8 byte slice"),
                block_number: u64::from_be_bytes(raw[12..20].try_into().expect("8 byte slice")),
                timestamp: u64::from_be_bytes(raw[20..28].try_into().expect("8 byte slice")),
                log_index: u32::from_be_bytes(raw[28..32].try_into().expect("4 byte slice")),
            }))
        }
        TYPE_CHAIN_ID_EXTENSION => {
            if raw[1..8] != [0; 7] {
                return Err(AccessListError::MalformedEntry);
            }
            Ok(Entry::ChainIdExtension(raw[8..32].try_into().expect("24 byte slice")))
        }
        TYPE_CHECKSUM => Ok(Entry::Checksum(*raw)),
        other => Err(AccessListError::UnexpectedType { expected: TYPE_LOOKUP, found: other }),
    }
}
