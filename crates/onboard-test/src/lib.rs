//! Test infrastructure for the declarative onboarding apply engine
//!
//! Provides:
//! - An in-memory recording `ObjectStore` with canned responses and failures
//! - Fixtures for declarations, current state and common object bodies
//! - Operation-sequence verification helpers

pub mod fixtures;
mod recording_store;
mod verification;

pub use fixtures::*;
pub use recording_store::{RecordingStore, StoreCall};
pub use verification::*;
