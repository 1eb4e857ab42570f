//! Read side of the streaming genesis abstraction.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::error::GenesisError;

/// Per-module reader over a genesis fragment.
///
/// A source is bound to a single module. Fields are the top-level keys of the module's fragment
/// and can be streamed one at a time, which lets modules with large state avoid materialising
/// the whole fragment in memory.
pub trait GenesisSource {
    /// Name of the module this source reads for.
    fn module(&self) -> &str;

    /// Opens a lazy, finite stream over the named field.
    ///
    /// Whether an absent field is `Ok(None)` or an error is up to the backing: the in-memory
    /// source reports absence as `None`, the file-backed one as [`GenesisError::FieldNotFound`].
    /// The stream is released when dropped.
    fn open_reader(&mut self, field: &str) -> Result<Option<Box<dyn Read + '_>>, GenesisError>;

    /// Returns the whole module fragment as opaque JSON.
    fn read_raw_json(&mut self) -> Result<Box<RawValue>, GenesisError>;
}

/// Typed helpers available on every [`GenesisSource`].
pub trait GenesisSourceExt: GenesisSource {
    /// Decodes the entire module fragment.
    fn read_message<T: DeserializeOwned>(&mut self) -> Result<T, GenesisError> {
        let module = self.module().to_string();
        let raw = self.read_raw_json()?;
        serde_json::from_str(raw.get()).map_err(|e| GenesisError::json(module, e))
    }

    /// Decodes a single field, `None` if the backing reports it absent.
    fn read_field<T: DeserializeOwned>(&mut self, field: &str) -> Result<Option<T>, GenesisError> {
        let context = format!("{}.{}", self.module(), field);
        match self.open_reader(field)? {
            Some(reader) => serde_json::from_reader(reader)
                .map(Some)
                .map_err(|e| GenesisError::json(context, e)),
            None => Ok(None),
        }
    }
}

impl<S: GenesisSource + ?Sized> GenesisSourceExt for S {}
