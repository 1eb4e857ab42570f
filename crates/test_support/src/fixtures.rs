//! Deterministic block contexts, keys and genesis documents.

use chrono::{DateTime, Utc};
use lattice_genesis::GenesisDocument;
use lattice_types::{BlockInfo, Context, Height, PublicKey, ValidatorUpdate};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const CHAIN_ID: &str = "lattice-test";

/// Block info at `height`, timestamped `height` seconds after the epoch.
pub fn block_info(height: u64) -> BlockInfo {
    let time = DateTime::<Utc>::from_timestamp(height as i64, 0).unwrap_or(DateTime::UNIX_EPOCH);
    BlockInfo::new(Height::new(height), time, CHAIN_ID)
}

pub fn context(height: u64) -> Context {
    Context::new(block_info(height), CancellationToken::new())
}

/// 32-byte ed25519 key filled with `seed`.
pub fn pub_key(seed: u8) -> PublicKey {
    PublicKey::ed25519(vec![seed; 32])
}

pub fn validator_update(seed: u8, power: i64) -> ValidatorUpdate {
    ValidatorUpdate::new(pub_key(seed), power)
}

/// Builds a genesis document from `(module, fragment)` pairs.
pub fn genesis_doc<'a>(fragments: impl IntoIterator<Item = (&'a str, Value)>) -> GenesisDocument {
    let mut doc = GenesisDocument::new();
    for (module, fragment) in fragments {
        doc.insert_json(module, &fragment).unwrap_or_else(|e| panic!("{module}: {e}"));
    }
    doc
}
