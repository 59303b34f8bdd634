//! Defines error types for the supervisor core.

use crate::syncnode::ManagedNodeError;
use alloy_primitives::B256;
use jsonrpsee::types::{ErrorCode, ErrorObjectOwned};
use op_alloy_rpc_types::SuperchainDAError;
use sentinel_storage::StorageError;
use sentinel_types::AccessListError;
use thiserror::Error;

/// Top-level error type for the supervisor service.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The dependency set is empty, no chains to supervise.
    #[error("empty dependency set")]
    EmptyDependencySet,

    /// The chain is not part of the dependency set.
    #[error("unsupported chain id")]
    UnsupportedChainId,

    /// No managed node is registered for the chain.
    #[error("no managed node found for chain {0}")]
    ManagedNodeMissing(u64),

    /// The administrative failsafe flag is set, all access-list checks are rejected.
    #[error("failsafe is enabled")]
    FailsafeEnabled,

    /// No chain has reported a sync status update yet.
    #[error("sync status is not ready")]
    SyncStatusNotReady,

    /// Two chains disagree about the L1 block at the same height.
    #[error("l1 block hash mismatch at same height, expected: {expected}, got: {got}")]
    L1HashMismatch {
        /// Hash reported by the first chain.
        expected: B256,
        /// Conflicting hash reported by another chain.
        got: B256,
    },

    /// An error defined in the interop specification.
    #[error(transparent)]
    SpecError(#[from] SpecError),

    /// An error from the storage layer.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// An error from a managed node.
    #[error(transparent)]
    ManagedNodeError(#[from] ManagedNodeError),

    /// An error while parsing the access list.
    #[error(transparent)]
    AccessListError(#[from] AccessListError),

    /// A serialization failure.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// The initiating chain id in an access-list entry does not fit a 64-bit chain id.
    #[error("failed to parse chain id")]
    ChainIdParseError(),
}

impl PartialEq for SupervisorError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::EmptyDependencySet, Self::EmptyDependencySet) |
            (Self::UnsupportedChainId, Self::UnsupportedChainId) |
            (Self::FailsafeEnabled, Self::FailsafeEnabled) |
            (Self::SyncStatusNotReady, Self::SyncStatusNotReady) |
            (Self::ChainIdParseError(), Self::ChainIdParseError()) => true,
            (Self::ManagedNodeMissing(a), Self::ManagedNodeMissing(b)) => a == b,
            (
                Self::L1HashMismatch { expected: e1, got: g1 },
                Self::L1HashMismatch { expected: e2, got: g2 },
            ) => e1 == e2 && g1 == g2,
            (Self::SpecError(a), Self::SpecError(b)) => a == b,
            (Self::StorageError(a), Self::StorageError(b)) => a == b,
            (Self::ManagedNodeError(a), Self::ManagedNodeError(b)) => a == b,
            (Self::AccessListError(a), Self::AccessListError(b)) => a == b,
            (Self::SerdeJson(a), Self::SerdeJson(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl Eq for SupervisorError {}

/// Errors that map onto the error codes defined by the interop specification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    /// A data-availability error with a spec-defined code.
    #[error(transparent)]
    SuperchainDAError(#[from] SuperchainDAError),

    /// An internal error with no spec-defined code.
    #[error("error not defined in the spec")]
    ErrorNotInSpec,
}

impl SpecError {
    /// Returns the spec-defined error code.
    pub const fn code(&self) -> i32 {
        match self {
            Self::SuperchainDAError(err) => *err as i32,
            Self::ErrorNotInSpec => -321300,
        }
    }
}

impl From<StorageError> for SpecError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FutureData => Self::SuperchainDAError(SuperchainDAError::FutureData),
            StorageError::EntryNotFound(_) => {
                Self::SuperchainDAError(SuperchainDAError::MissedData)
            }
            StorageError::ConflictError => {
                Self::SuperchainDAError(SuperchainDAError::ConflictingData)
            }
            StorageError::BlockOutOfOrder => Self::SuperchainDAError(SuperchainDAError::OutOfOrder),
            _ => Self::ErrorNotInSpec,
        }
    }
}

impl From<SpecError> for ErrorObjectOwned {
    fn from(err: SpecError) -> Self {
        match &err {
            SpecError::SuperchainDAError(_) => {
                Self::owned(err.code(), err.to_string(), None::<()>)
            }
            SpecError::ErrorNotInSpec => Self::from(ErrorCode::InternalError),
        }
    }
}

impl From<SupervisorError> for ErrorObjectOwned {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::SpecError(spec_err) => spec_err.into(),
            _ => Self::from(ErrorCode::InternalError),
        }
    }
}
