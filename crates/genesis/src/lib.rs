//! Streaming genesis input and output for lattice modules.
//!
//! Modules never see the genesis document directly. During chain initialisation each module gets a
//! [`GenesisSource`] scoped to its own fragment, and during export a [`GenesisTarget`] to write it
//! back. Two backings are provided:
//!
//! - in memory ([`JsonGenesisSource`], [`JsonGenesisTarget`]) when the document is already loaded;
//! - a directory ([`FileGenesisSource`], [`FileGenesisTarget`]) for state too large to hold in a
//!   single `genesis.json`.

pub mod document;
pub mod error;
pub mod file;
mod fs;
pub mod json;
pub mod source;
pub mod target;

pub use document::{AppGenesis, GenesisDocument};
pub use error::GenesisError;
pub use file::{FileGenesisSource, FileGenesisTarget};
pub use json::{JsonGenesisSource, JsonGenesisTarget};
pub use source::{GenesisSource, GenesisSourceExt};
pub use target::{GenesisTarget, GenesisTargetExt, GenesisWriter};
