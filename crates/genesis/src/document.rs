//! The genesis document and its on-disk envelope.

use std::{collections::BTreeMap, fs, path::Path};

use chrono::{DateTime, Utc};
use lattice_types::constants::GENESIS_FILE_NAME;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::info;

use crate::{
    error::GenesisError,
    file::FileGenesisTarget,
    fs::{create_private_dir, write_file_with},
    target::GenesisTarget,
};

/// Mapping from module name to its opaque genesis fragment.
///
/// Fragments are kept as raw JSON and are ordered by module name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenesisDocument(BTreeMap<String, Box<RawValue>>);

impl GenesisDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object keyed by module name.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GenesisError> {
        serde_json::from_slice(bytes).map_err(|e| GenesisError::json("genesis document", e))
    }

    pub fn get(&self, module: &str) -> Option<&RawValue> {
        self.0.get(module).map(|raw| &**raw)
    }

    /// Decodes a fragment into a JSON value, `None` when the module is absent.
    pub fn value(&self, module: &str) -> Result<Option<serde_json::Value>, GenesisError> {
        self.get(module)
            .map(|raw| serde_json::from_str(raw.get()).map_err(|e| GenesisError::json(module, e)))
            .transpose()
    }

    pub fn insert(&mut self, module: impl Into<String>, fragment: Box<RawValue>) {
        self.0.insert(module.into(), fragment);
    }

    pub fn insert_json<T: Serialize>(
        &mut self,
        module: impl Into<String>,
        fragment: &T,
    ) -> Result<(), GenesisError> {
        let module = module.into();
        let raw = serde_json::value::to_raw_value(fragment)
            .map_err(|e| GenesisError::json(module.clone(), e))?;
        self.0.insert(module, raw);
        Ok(())
    }

    pub fn remove(&mut self, module: &str) -> Option<Box<RawValue>> {
        self.0.remove(module)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.0.contains_key(module)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.0.iter().map(|(name, raw)| (name.as_str(), &**raw))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Writes every fragment to `<dir>/<module>.json`.
    pub fn write_to_dir(&self, dir: &Path, indent: bool) -> Result<(), GenesisError> {
        for (module, raw) in &self.0 {
            FileGenesisTarget::new(dir, module.as_str()).with_indent(indent).write_raw_json(raw)?;
        }
        Ok(())
    }
}

fn default_initial_height() -> u64 {
    1
}

/// The `genesis.json` envelope: chain metadata plus the application state per module.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppGenesis {
    pub genesis_time: DateTime<Utc>,
    pub chain_id: String,
    #[serde(default = "default_initial_height")]
    pub initial_height: u64,
    #[serde(default)]
    pub app_state: GenesisDocument,
    /// Consensus-engine parameters, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<Box<RawValue>>,
}

impl AppGenesis {
    pub fn new(chain_id: impl Into<String>, app_state: GenesisDocument) -> Self {
        Self {
            genesis_time: Utc::now(),
            chain_id: chain_id.into(),
            initial_height: default_initial_height(),
            app_state,
            consensus: None,
        }
    }

    pub fn validate_basic(&self) -> Result<(), GenesisError> {
        if self.chain_id.trim().is_empty() {
            return Err(GenesisError::InvalidEnvelope("chain_id must not be empty".to_string()));
        }
        if self.initial_height == 0 {
            return Err(GenesisError::InvalidEnvelope(
                "initial_height must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, GenesisError> {
        let bytes = fs::read(path).map_err(|e| GenesisError::io(path, e))?;
        let genesis: Self = serde_json::from_slice(&bytes)
            .map_err(|e| GenesisError::json(path.display().to_string(), e))?;
        genesis.validate_basic()?;
        Ok(genesis)
    }

    /// Loads `<dir>/genesis.json`.
    pub fn load_from_dir(dir: &Path) -> Result<Self, GenesisError> {
        Self::load(&dir.join(GENESIS_FILE_NAME))
    }

    /// Writes the envelope pretty-printed with a two-space indent.
    pub fn save(&self, path: &Path) -> Result<(), GenesisError> {
        self.validate_basic()?;
        if let Some(parent) = path.parent() &&
            !parent.as_os_str().is_empty()
        {
            create_private_dir(parent)?;
        }

        write_file_with(path, |w| {
            serde_json::to_writer_pretty(&mut *w, self)?;
            std::io::Write::write_all(w, b"\n")
        })?;

        info!(
            path = %path.display(),
            chain_id = %self.chain_id,
            modules = self.app_state.len(),
            "Wrote genesis file"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn sample_document() -> GenesisDocument {
        let mut doc = GenesisDocument::new();
        doc.insert_json("staking", &json!({ "validators": [] })).unwrap();
        doc.insert_json("bank", &json!({ "supply": 100 })).unwrap();
        doc
    }

    #[test]
    fn modules_are_ordered_by_name() {
        let doc = sample_document();
        let names: Vec<_> = doc.module_names().collect();
        assert_eq!(names, ["bank", "staking"]);
    }

    #[test]
    fn document_rejects_non_objects() {
        assert!(GenesisDocument::from_slice(b"[1]").is_err());
        assert!(GenesisDocument::from_slice(b"{\"bank\": {}}").unwrap().contains("bank"));
    }

    #[test]
    fn envelope_save_and_load() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config/genesis.json");

        let genesis = AppGenesis::new("lattice-1", sample_document());
        genesis.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"genesis_time\""), "{text}");

        let loaded = AppGenesis::load(&path).unwrap();
        assert_eq!(loaded.chain_id, "lattice-1");
        assert_eq!(loaded.initial_height, 1);
        assert_eq!(loaded.app_state.value("bank").unwrap(), Some(json!({ "supply": 100 })));
    }

    #[test]
    fn envelope_requires_chain_id() {
        let genesis = AppGenesis::new(" ", GenesisDocument::new());
        assert!(matches!(genesis.validate_basic(), Err(GenesisError::InvalidEnvelope(_))));
    }

    #[test]
    fn write_to_dir_produces_module_files() {
        let tmp = tempdir().unwrap();
        sample_document().write_to_dir(tmp.path(), false).unwrap();

        let bank = fs::read_to_string(tmp.path().join("bank.json")).unwrap();
        assert_eq!(bank, r#"{"supply":100}"#);
        assert!(tmp.path().join("staking.json").is_file());
    }
}
