//! Sync Status Module
//! Aggregates per-chain safety heads into a supervisor-wide [`SyncStatus`] snapshot.
//!
//! [`SyncStatus`]: sentinel_types::SyncStatus

mod tracker;
pub use tracker::StatusTracker;
