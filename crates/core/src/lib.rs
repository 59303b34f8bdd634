//! Core logic of the sentinel interop supervisor.

pub mod chain_processor;
pub use chain_processor::{ChainProcessor, ChainProcessorError, ProcessorState};

pub mod error;
pub use error::{SpecError, SupervisorError};

/// Contains the main Supervisor struct and its implementation.
mod supervisor;
pub use supervisor::{Supervisor, SupervisorService};

pub mod indexing;
pub use indexing::{
    ChainIndexer, ChainIndexerError, log_to_log_hash, log_to_message_payload, logs_from_receipts,
    payload_hash_to_log_hash,
};

pub mod config;
pub mod event;
pub mod l1_accessor;
pub mod reset;
pub mod status;
pub mod syncnode;
