//! Constants shared across lattice crates.

/// Name of the envelope genesis file inside a genesis directory.
pub const GENESIS_FILE_NAME: &str = "genesis.json";

/// Key of the per-module object inside the envelope genesis file.
pub const APP_STATE_KEY: &str = "app_state";

/// Extension used by module and per-field genesis files.
pub const JSON_EXTENSION: &str = "json";

/// Permission bits for genesis files written by a target.
pub const GENESIS_FILE_MODE: u32 = 0o600;

/// Permission bits for directories created by a target.
pub const GENESIS_DIR_MODE: u32 = 0o700;

/// Consensus version reported by modules that do not override it.
pub const DEFAULT_CONSENSUS_VERSION: u64 = 1;
