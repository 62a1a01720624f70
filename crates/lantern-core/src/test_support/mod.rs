//! Test support utilities
//!
//! In-memory store implementations for exercising the indexer and query
//! engine without a real backend. Enabled for this crate's tests and, for
//! downstream crates, through the `test-utils` feature.

pub mod mocks;

pub use mocks::{IndexOp, MockEntityStore, MockIndexStore};
