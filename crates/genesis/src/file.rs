//! File-backed genesis source and target.
//!
//! A genesis directory may hold a module's state in three shapes, checked in this order:
//!
//! 1. `<dir>/<module>/<field>.json`: one file per field, streamed directly;
//! 2. `<dir>/<module>.json`: the whole module fragment;
//! 3. `<dir>/genesis.json`: the envelope, module fragment under `app_state.<module>`.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::{self, BufReader, Cursor, Read, Write},
    path::{Path, PathBuf},
};

use lattice_types::constants::{APP_STATE_KEY, GENESIS_FILE_NAME, JSON_EXTENSION};
use serde::Deserialize;
use serde_json::{Value, value::RawValue};
use tracing::debug;

use crate::{
    error::GenesisError,
    fs::{FileWriter, create_private_dir, write_file_with},
    source::GenesisSource,
    target::{GenesisTarget, GenesisWriter},
};

type Fields = BTreeMap<String, Box<RawValue>>;

/// Lazily loaded, cached view of one layer of the genesis directory.
#[derive(Debug, Default)]
enum Layer<T> {
    #[default]
    Unloaded,
    Missing,
    Loaded(T),
}

impl<T> Layer<T> {
    fn get(&self) -> Option<&T> {
        match self {
            Layer::Loaded(value) => Some(value),
            _ => None,
        }
    }

    fn is_unloaded(&self) -> bool {
        matches!(self, Layer::Unloaded)
    }
}

impl<T> From<Option<T>> for Layer<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Layer::Missing, Layer::Loaded)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    app_state: BTreeMap<String, Box<RawValue>>,
}

/// Reads a module's genesis from a directory.
///
/// The per-field directory is listed once and the module's root JSON is parsed once; later reads
/// for other fields of the same module are served from these caches.
#[derive(Debug)]
pub struct FileGenesisSource {
    dir: PathBuf,
    module: String,
    field_files: Layer<BTreeSet<String>>,
    module_file: Layer<Fields>,
    envelope: Layer<Fields>,
}

impl FileGenesisSource {
    pub fn new(dir: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            module: module.into(),
            field_files: Layer::Unloaded,
            module_file: Layer::Unloaded,
            envelope: Layer::Unloaded,
        }
    }

    fn field_dir(&self) -> PathBuf {
        self.dir.join(&self.module)
    }

    fn field_path(&self, field: &str) -> PathBuf {
        self.field_dir().join(json_file_name(field))
    }

    fn module_path(&self) -> PathBuf {
        self.dir.join(json_file_name(&self.module))
    }

    fn load_field_files(&mut self) -> Result<(), GenesisError> {
        if !self.field_files.is_unloaded() {
            return Ok(());
        }

        let dir = self.field_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.field_files = Layer::Missing;
                return Ok(());
            }
            Err(e) => return Err(GenesisError::io(dir, e)),
        };

        let mut fields = BTreeSet::new();
        for entry in entries {
            let path = entry.map_err(|e| GenesisError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(JSON_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                fields.insert(stem.to_string());
            }
        }

        debug!(module = %self.module, count = fields.len(), "Listed per-field genesis files");
        self.field_files = Layer::Loaded(fields);
        Ok(())
    }

    fn load_module_file(&mut self) -> Result<(), GenesisError> {
        if !self.module_file.is_unloaded() {
            return Ok(());
        }

        let path = self.module_path();
        let loaded = match read_optional(&path)? {
            Some(bytes) => Some(parse_fields(&self.module, &bytes)?),
            None => None,
        };
        self.module_file = loaded.into();
        Ok(())
    }

    fn load_envelope(&mut self) -> Result<(), GenesisError> {
        if !self.envelope.is_unloaded() {
            return Ok(());
        }

        let path = self.dir.join(GENESIS_FILE_NAME);
        let loaded = match read_optional(&path)? {
            Some(bytes) => {
                let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|e| {
                    GenesisError::json(format!("{} ({APP_STATE_KEY})", path.display()), e)
                })?;
                match envelope.app_state.get(&self.module) {
                    Some(raw) => Some(parse_fields(&self.module, raw.get().as_bytes())?),
                    None => None,
                }
            }
            None => None,
        };
        self.envelope = loaded.into();
        Ok(())
    }

    /// True if any layer of the directory holds state for the module: a non-empty per-field
    /// directory, a module file, or an `app_state` entry in the envelope.
    ///
    /// Layers looked at here stay cached for the reads that follow.
    pub fn has_fragment(&mut self) -> Result<bool, GenesisError> {
        self.load_field_files()?;
        if self.field_files.get().is_some_and(|fields| !fields.is_empty()) {
            return Ok(true);
        }

        self.load_module_file()?;
        if self.module_file.get().is_some() {
            return Ok(true);
        }

        self.load_envelope()?;
        Ok(self.envelope.get().is_some())
    }

    fn has_field_file(&self, field: &str) -> bool {
        self.field_files.get().is_some_and(|fields| fields.contains(field))
    }
}

fn json_file_name(stem: &str) -> String {
    format!("{stem}.{JSON_EXTENSION}")
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, GenesisError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GenesisError::io(path, e)),
    }
}

fn parse_fields(module: &str, bytes: &[u8]) -> Result<Fields, GenesisError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| GenesisError::json(module, e))?;
    if !value.is_object() {
        return Err(GenesisError::NotAnObject { module: module.to_string() });
    }
    serde_json::from_slice(bytes).map_err(|e| GenesisError::json(module, e))
}

impl GenesisSource for FileGenesisSource {
    fn module(&self) -> &str {
        &self.module
    }

    fn open_reader(&mut self, field: &str) -> Result<Option<Box<dyn Read + '_>>, GenesisError> {
        self.load_field_files()?;
        if self.has_field_file(field) {
            let path = self.field_path(field);
            debug!(
                module = %self.module, field, path = %path.display(),
                "Reading genesis field file"
            );
            let file = File::open(&path).map_err(|e| GenesisError::io(&path, e))?;
            return Ok(Some(Box::new(BufReader::new(file))));
        }

        self.load_module_file()?;
        if self.module_file.get().is_some_and(|fields| fields.contains_key(field)) {
            let raw = self.module_file.get().and_then(|fields| fields.get(field));
            return Ok(raw.map(|raw| reader(raw)));
        }

        self.load_envelope()?;
        if let Some(raw) = self.envelope.get().and_then(|fields| fields.get(field)) {
            return Ok(Some(reader(raw)));
        }

        Err(GenesisError::FieldNotFound { module: self.module.clone(), field: field.to_string() })
    }

    /// Assembles the module fragment: root JSON (module file, else envelope) overlaid with any
    /// per-field files.
    fn read_raw_json(&mut self) -> Result<Box<RawValue>, GenesisError> {
        self.load_field_files()?;
        self.load_module_file()?;
        if self.module_file.get().is_none() {
            self.load_envelope()?;
        }

        let base = self.module_file.get().or_else(|| self.envelope.get());
        let field_files = self.field_files.get();
        if base.is_none() && field_files.is_none_or(|fields| fields.is_empty()) {
            return Err(GenesisError::ModuleNotFound { module: self.module.clone() });
        }

        let mut merged = base.cloned().unwrap_or_default();
        for field in field_files.into_iter().flatten() {
            let path = self.field_path(field);
            let text = fs::read_to_string(&path).map_err(|e| GenesisError::io(&path, e))?;
            let raw = RawValue::from_string(text)
                .map_err(|e| GenesisError::json(path.display().to_string(), e))?;
            merged.insert(field.clone(), raw);
        }

        let json =
            serde_json::to_string(&merged).map_err(|e| GenesisError::json(&*self.module, e))?;
        RawValue::from_string(json).map_err(|e| GenesisError::json(&*self.module, e))
    }
}

fn reader(raw: &RawValue) -> Box<dyn Read + '_> {
    Box::new(Cursor::new(raw.get().as_bytes()))
}

/// Writes a module's genesis into a directory.
///
/// Files are created with mode 0o600 and directories with mode 0o700.
#[derive(Clone, Debug)]
pub struct FileGenesisTarget {
    dir: PathBuf,
    module: String,
    indent: bool,
}

impl FileGenesisTarget {
    pub fn new(dir: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self { dir: dir.into(), module: module.into(), indent: false }
    }

    /// Pretty-print whole-fragment writes with a two-space indent.
    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Resolves the file a write for `field` goes to, creating directories as needed.
    pub fn resolve(&self, field: &str) -> Result<PathBuf, GenesisError> {
        match (self.module.is_empty(), field.is_empty()) {
            (false, false) => {
                let module_dir = self.dir.join(&self.module);
                create_private_dir(&module_dir)?;
                Ok(module_dir.join(json_file_name(field)))
            }
            (false, true) => {
                create_private_dir(&self.dir)?;
                Ok(self.dir.join(json_file_name(&self.module)))
            }
            (true, true) => {
                create_private_dir(&self.dir)?;
                Ok(self.dir.join(GENESIS_FILE_NAME))
            }
            (true, false) => Err(GenesisError::InvalidGenesisPath { field: field.to_string() }),
        }
    }
}

impl GenesisTarget for FileGenesisTarget {
    fn module(&self) -> &str {
        &self.module
    }

    fn open_writer(&mut self, field: &str) -> Result<Box<dyn GenesisWriter + '_>, GenesisError> {
        let path = self.resolve(field)?;
        debug!(module = %self.module, field, path = %path.display(), "Opening genesis writer");
        Ok(Box::new(FileWriter::create(path)?))
    }

    fn write_raw_json(&mut self, json: &RawValue) -> Result<(), GenesisError> {
        let path = self.resolve("")?;
        if self.indent {
            let value: Value = serde_json::from_str(json.get())
                .map_err(|e| GenesisError::json(&*self.module, e))?;
            write_file_with(&path, |w| {
                serde_json::to_writer_pretty(&mut *w, &value)?;
                w.write_all(b"\n")
            })
        } else {
            write_file_with(&path, |w| w.write_all(json.get().as_bytes()))
        }
    }

    fn write_message_value(&mut self, _value: Value) -> Result<(), GenesisError> {
        Err(GenesisError::Unsupported { target: "file genesis target", operation: "write_message" })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::{
        source::GenesisSourceExt,
        target::GenesisTargetExt,
    };

    fn read_all(mut reader: Box<dyn Read + '_>) -> String {
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn per_field_file_wins_over_module_file() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("mod")).unwrap();
        fs::write(tmp.path().join("mod/field.json"), "42").unwrap();
        fs::write(tmp.path().join("mod.json"), r#"{"field": 99, "other": "x"}"#).unwrap();

        let mut source = FileGenesisSource::new(tmp.path(), "mod");
        assert_eq!(read_all(source.open_reader("field").unwrap().unwrap()), "42");

        // Appears after the directory was listed: the cached listing is authoritative.
        fs::write(tmp.path().join("mod/other.json"), "\"from-field-file\"").unwrap();
        assert_eq!(read_all(source.open_reader("other").unwrap().unwrap()), "\"x\"");
    }

    #[test]
    fn module_file_is_cached_after_first_read() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("mod.json"), r#"{"a": 1, "b": 2}"#).unwrap();

        let mut source = FileGenesisSource::new(tmp.path(), "mod");
        assert_eq!(read_all(source.open_reader("a").unwrap().unwrap()), "1");

        fs::remove_file(tmp.path().join("mod.json")).unwrap();
        assert_eq!(read_all(source.open_reader("b").unwrap().unwrap()), "2");
    }

    #[test]
    fn envelope_is_the_last_resort() {
        let tmp = tempdir().unwrap();
        fs::write(
            tmp.path().join("genesis.json"),
            r#"{"chain_id": "c", "app_state": {"mod": {"params": {"max": 3}}}}"#,
        )
        .unwrap();

        let mut source = FileGenesisSource::new(tmp.path(), "mod");
        let params: Value = source.read_field("params").unwrap().unwrap();
        assert_eq!(params, serde_json::json!({ "max": 3 }));
    }

    #[test]
    fn missing_everywhere_is_field_not_found() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("mod.json"), r#"{"a": 1}"#).unwrap();

        let mut source = FileGenesisSource::new(tmp.path(), "mod");
        let err = source.open_reader("zzz").err().unwrap();
        let GenesisError::FieldNotFound { module, field } = &err else {
            panic!("expected FieldNotFound, got {err:?}");
        };
        assert_eq!((module.as_str(), field.as_str()), ("mod", "zzz"));
    }

    #[test]
    fn raw_json_merges_field_files_over_root() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("mod")).unwrap();
        fs::write(tmp.path().join("mod/b.json"), "[1, 2]").unwrap();
        fs::write(tmp.path().join("mod.json"), r#"{"a": true, "b": null}"#).unwrap();

        let mut source = FileGenesisSource::new(tmp.path(), "mod");
        let whole: Value = source.read_message().unwrap();
        assert_eq!(whole, serde_json::json!({ "a": true, "b": [1, 2] }));
    }

    #[test]
    fn raw_json_for_unknown_module_is_module_not_found() {
        let tmp = tempdir().unwrap();
        let mut source = FileGenesisSource::new(tmp.path(), "ghost");
        assert!(matches!(source.read_raw_json().unwrap_err(), GenesisError::ModuleNotFound { .. }));
    }

    #[test]
    fn fragment_presence_checks_every_layer() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("fields")).unwrap();
        fs::write(tmp.path().join("fields/a.json"), "1").unwrap();
        fs::create_dir_all(tmp.path().join("hollow")).unwrap();
        fs::write(tmp.path().join("whole.json"), r#"{"a": 1}"#).unwrap();
        fs::write(tmp.path().join("genesis.json"), r#"{"app_state": {"wrapped": {}}}"#).unwrap();

        let present = |module: &str| FileGenesisSource::new(tmp.path(), module).has_fragment();
        assert!(present("fields").unwrap());
        assert!(present("whole").unwrap());
        assert!(present("wrapped").unwrap());
        assert!(!present("hollow").unwrap());
        assert!(!present("ghost").unwrap());
    }

    #[test]
    fn fragment_presence_surfaces_malformed_files() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("mod.json"), "[1, 2]").unwrap();

        let err = FileGenesisSource::new(tmp.path(), "mod").has_fragment().unwrap_err();
        assert!(matches!(err, GenesisError::NotAnObject { .. }));
    }

    #[test]
    fn unfinished_field_writer_leaves_nothing_behind() {
        let tmp = tempdir().unwrap();
        let mut target = FileGenesisTarget::new(tmp.path(), "bank");

        let mut writer = target.open_writer("supply").unwrap();
        writer.write_all(b"[1, 2").unwrap();
        drop(writer);

        assert!(!tmp.path().join("bank/supply.json").exists());
        assert_eq!(fs::read_dir(tmp.path().join("bank")).unwrap().count(), 0);
    }

    #[test]
    fn failed_rewrite_keeps_previous_fragment() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("mod.json");
        fs::write(&path, r#"{"kept": true}"#).unwrap();

        let err = write_file_with(&path, |w| {
            w.write_all(b"{\"half\":")?;
            Err(io::Error::other("disk full"))
        })
        .unwrap_err();

        assert!(err.to_string().contains("disk full"), "{err}");
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"kept": true}"#);
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn target_resolution_follows_module_and_field() {
        let tmp = tempdir().unwrap();

        let field = FileGenesisTarget::new(tmp.path(), "mod").resolve("accounts").unwrap();
        assert_eq!(field, tmp.path().join("mod/accounts.json"));
        assert!(tmp.path().join("mod").is_dir());

        let module = FileGenesisTarget::new(tmp.path(), "mod").resolve("").unwrap();
        assert_eq!(module, tmp.path().join("mod.json"));

        let envelope = FileGenesisTarget::new(tmp.path(), "").resolve("").unwrap();
        assert_eq!(envelope, tmp.path().join("genesis.json"));

        let err = FileGenesisTarget::new(tmp.path(), "").resolve("accounts").unwrap_err();
        assert!(matches!(err, GenesisError::InvalidGenesisPath { .. }));
    }

    #[test]
    fn target_then_source_roundtrip_through_field_files() {
        let tmp = tempdir().unwrap();

        let mut target = FileGenesisTarget::new(tmp.path(), "bank");
        target.write_field("supply", &vec![10u64, 20]).unwrap();
        let mut writer = target.open_writer("denom").unwrap();
        writer.write_all(b"\"stake\"").unwrap();
        writer.finish().unwrap();

        let mut source = FileGenesisSource::new(tmp.path(), "bank");
        let supply: Vec<u64> = source.read_field("supply").unwrap().unwrap();
        let denom: String = source.read_field("denom").unwrap().unwrap();
        assert_eq!(supply, [10, 20]);
        assert_eq!(denom, "stake");
    }

    #[test]
    fn indented_raw_json_uses_two_spaces() {
        let tmp = tempdir().unwrap();
        let mut target = FileGenesisTarget::new(tmp.path(), "mod").with_indent(true);
        let raw = RawValue::from_string(r#"{"b":1,"a":[true]}"#.to_string()).unwrap();
        target.write_raw_json(&raw).unwrap();

        let written = fs::read_to_string(tmp.path().join("mod.json")).unwrap();
        assert_eq!(written, "{\n  \"b\": 1,\n  \"a\": [\n    true\n  ]\n}\n");
    }

    #[test]
    fn write_message_is_unsupported_on_files() {
        let tmp = tempdir().unwrap();
        let mut target = FileGenesisTarget::new(tmp.path(), "mod");
        let err = target.write_message(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, GenesisError::Unsupported { .. }));
    }
}
