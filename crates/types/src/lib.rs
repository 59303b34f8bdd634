//! Protocol types shared by the sentinel interop supervisor.
//!
//! This crate defines the data model of the supervisor: block references, derivation pairs,
//! indexed logs and executing messages, access-list claims, node subscription events, output
//! roots and the dependency set. The canonical safety-level enum is re-exported from
//! [`op_alloy_consensus`].

mod block;
pub use block::{BlockInfo, BlockSeal, L2BlockInfo};

mod derived;
pub use derived::{DerivedIdPair, DerivedRefPair};

mod log;
pub use log::{ExecutingMessage, Log};

pub mod message;
pub use message::{CROSS_L2_INBOX, ExecutingDescriptor};

mod receipt;
pub use receipt::Receipts;

mod access_list;
pub use access_list::{Access, AccessListError, parse_access_list};

mod event;
pub use event::{BlockReplacement, ManagedEvent, SubscriptionEvent};

mod head;
pub use head::SuperHead;

mod output;
pub use output::{ChainRootInfo, OutputRootWithChain, OutputV0, SuperRoot, SuperRootOutput};

mod sync_status;
pub use sync_status::{ChainSyncStatus, SyncStatus};

mod depset;
pub use depset::{ChainDependency, DependencySet};

mod constants;
pub use constants::{MESSAGE_EXPIRY_WINDOW, SUPER_ROOT_VERSION};

mod validator;
pub use validator::{InteropValidationError, InteropValidator};

pub use op_alloy_consensus::interop::SafetyLevel;
