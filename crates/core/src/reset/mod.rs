//! Reset Module
//! Bisection search for the newest block a managed node and the local database agree on, and
//! the forward search for the furthest local-unsafe block with a canonical L1 origin.

mod tracker;
pub use tracker::{ResetTarget, ResetTracker};
