//! Test utilities for hostmetrics tests
//!
//! Two stand-ins for the measurement store: [`memory_store::MemoryStore`]
//! implements the store trait directly, [`fake_gnocchi::FakeGnocchi`] serves
//! the Gnocchi REST API over HTTP so the real client can be exercised.

pub mod fake_gnocchi;
pub mod memory_store;

pub use fake_gnocchi::{FAKE_TOKEN, FakeGnocchi};
pub use memory_store::MemoryStore;
