//! Shared helpers used by lattice's integration tests.
//!
//! This crate hosts deterministic fixtures and a configurable mock module that records every hook
//! invocation, so that ordering and aggregation can be asserted across test harnesses.

pub mod fixtures;
pub mod mock_module;
pub mod recorder;

pub use fixtures::{CHAIN_ID, block_info, context, genesis_doc, pub_key, validator_update};
pub use mock_module::{EchoHandler, MockModule};
pub use recorder::CallLog;
