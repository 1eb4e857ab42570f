//! Error types for module wiring and the block lifecycle
use std::fmt;

use lattice_genesis::GenesisError;
use lattice_types::{ConsensusVersion, Phase};
use thiserror::Error;

/// Error returned by a module hook, kept as-is when surfaced to the consensus engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ManagerError {
    /// Module names must be non-empty and usable as a file stem.
    #[error("Invalid module name `{0}`")]
    InvalidName(String),

    #[error("Module `{0}` is already registered")]
    DuplicateName(String),

    #[error("Unknown module `{0}`")]
    UnknownModule(String),

    #[error("Module `{name}` appears more than once in the {phase} order")]
    DuplicateInOrder { phase: Phase, name: String },

    #[error("Migration for module `{module}` from version {from_version} is already registered")]
    DuplicateMigration { module: String, from_version: ConsensusVersion },

    #[error("No migration registered for module `{module}` from version {from_version}")]
    MissingMigration { module: String, from_version: ConsensusVersion },

    #[error("No migration order set and the init genesis order is empty")]
    NoOrder,

    #[error(
        "Validator updates in {phase} returned by both `{first}` and `{second}`; \
         only one module may update the validator set"
    )]
    MultipleValidatorUpdaters { phase: Phase, first: String, second: String },

    /// A module added during a migration pass tried to change the validator set.
    #[error("Module `{module}` returned validator updates while being added by a migration")]
    UnexpectedValidatorUpdates { module: String },

    #[error("Module `{module}` cannot be migrated down from version {from} to {to}")]
    VersionDowngrade { module: String, from: ConsensusVersion, to: ConsensusVersion },

    #[error("Invalid genesis for module `{module}`: {source}")]
    InvalidGenesis {
        module: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Genesis(#[from] GenesisError),

    /// A module hook failed while running a lifecycle phase.
    #[error("Module `{module}` failed in {phase}: {source}")]
    Fatal {
        phase: Phase,
        module: String,
        #[source]
        source: BoxError,
    },

    #[error("Context cancelled during {phase} before module `{module}` ran")]
    Cancelled { phase: Phase, module: String },

    #[error("Service registration failed: {0}")]
    ServiceRegistration(ServiceErrors),

    #[error("Modules are already wired")]
    AlreadyWired,

    /// Registry and ordering lists cannot change once the chain has been initialised.
    #[error("Module set is sealed and can no longer be modified")]
    Sealed,
}

impl ManagerError {
    pub(crate) fn fatal(phase: Phase, module: &str, source: impl Into<BoxError>) -> Self {
        Self::Fatal { phase, module: module.to_string(), source: source.into() }
    }

    pub(crate) fn invalid_genesis(module: &str, source: impl Into<BoxError>) -> Self {
        Self::InvalidGenesis { module: module.to_string(), source: source.into() }
    }
}

/// Reasons a service descriptor is rejected by the configurator.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service name must not be empty")]
    EmptyName,

    #[error("service name `{0}` must not contain `/`")]
    InvalidName(String),

    #[error("service `{0}` declares no methods")]
    NoMethods(String),

    #[error("service `{service}` has an invalid method name `{method}`")]
    InvalidMethod { service: String, method: String },

    #[error("service `{0}` is already registered")]
    Duplicate(String),
}

/// All service registration failures collected during wiring.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceErrors(pub Vec<ServiceError>);

impl fmt::Display for ServiceErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}
