//! Write side of the streaming genesis abstraction.

use std::io::Write;

use serde::Serialize;
use serde_json::{Value, value::RawValue};

use crate::error::GenesisError;

/// A field stream handed out by [`GenesisTarget::open_writer`].
///
/// Only [`GenesisWriter::finish`] commits the stream and reports flush and close failures. A
/// writer dropped unfinished may discard what was written to it.
pub trait GenesisWriter: Write {
    fn finish(self: Box<Self>) -> Result<(), GenesisError>;
}

/// Per-module writer producing a genesis fragment.
pub trait GenesisTarget {
    fn module(&self) -> &str;

    /// Opens a stream for a field of the module. An empty field addresses the module fragment
    /// itself.
    fn open_writer(&mut self, field: &str) -> Result<Box<dyn GenesisWriter + '_>, GenesisError>;

    /// Writes the whole module fragment as opaque JSON.
    fn write_raw_json(&mut self, json: &RawValue) -> Result<(), GenesisError>;

    /// Writes a decoded message as the whole module fragment.
    fn write_message_value(&mut self, _value: Value) -> Result<(), GenesisError> {
        Err(GenesisError::Unsupported { target: "genesis target", operation: "write_message" })
    }
}

/// Typed helpers available on every [`GenesisTarget`].
pub trait GenesisTargetExt: GenesisTarget {
    fn write_message<T: Serialize>(&mut self, msg: &T) -> Result<(), GenesisError> {
        let value = serde_json::to_value(msg)
            .map_err(|e| GenesisError::json(self.module().to_string(), e))?;
        self.write_message_value(value)
    }

    /// Serializes `value` into the named field and closes the stream.
    fn write_field<T: Serialize>(&mut self, field: &str, value: &T) -> Result<(), GenesisError> {
        let context = format!("{}.{}", self.module(), field);
        let mut writer = self.open_writer(field)?;
        serde_json::to_writer(&mut writer, value).map_err(|e| GenesisError::json(context, e))?;
        writer.finish()
    }
}

impl<T: GenesisTarget + ?Sized> GenesisTargetExt for T {}
