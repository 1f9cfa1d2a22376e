//! Test support for the roundlog workspace.
//!
//! Keeping fixtures, the in-memory store and the strategies in one microcrate
//! avoids copy-paste across segment/sync/analytics tests.

pub mod fixtures;
pub mod memory;
pub mod proptest;

pub use memory::MemoryStore;
