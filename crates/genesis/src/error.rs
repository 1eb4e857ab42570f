//! Error types for genesis sources and targets
use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenesisError {
    /// A field was addressed without the module that owns it.
    #[error("Invalid genesis path: field `{field}` requires a module name")]
    InvalidGenesisPath { field: String },

    /// Every resolution candidate for the field was missing.
    #[error("Genesis field `{field}` not found for module `{module}`")]
    FieldNotFound { module: String, field: String },

    #[error("Genesis for module `{module}` not found")]
    ModuleNotFound { module: String },

    #[error("Genesis for module `{module}` is not a JSON object")]
    NotAnObject { module: String },

    #[error("{target} does not support {operation}")]
    Unsupported { target: &'static str, operation: &'static str },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Both the write and the subsequent close failed.
    #[error("Writing {} failed: {write}; closing it also failed: {close}", .path.display())]
    WriteAndClose {
        path: PathBuf,
        write: io::Error,
        #[source]
        close: io::Error,
    },

    #[error("Invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid genesis envelope: {0}")]
    InvalidEnvelope(String),
}

impl GenesisError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json { context: context.into(), source }
    }

    /// True for the "nothing to read here" kinds.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FieldNotFound { .. } | Self::ModuleNotFound { .. })
    }
}
