//! In-memory genesis backings used when the genesis document is already loaded.

use std::{
    collections::BTreeMap,
    io::{self, Cursor, Read, Write},
};

use serde_json::{Map, Value, value::RawValue};

use crate::{
    error::GenesisError,
    source::GenesisSource,
    target::{GenesisTarget, GenesisWriter},
};

/// Source over a module fragment held in memory.
///
/// The fragment is parsed into fields at most once, on the first [`GenesisSource::open_reader`].
/// Absent fields are reported as `Ok(None)`.
#[derive(Debug)]
pub struct JsonGenesisSource {
    module: String,
    raw: Box<RawValue>,
    fields: Option<BTreeMap<String, Box<RawValue>>>,
}

impl JsonGenesisSource {
    pub fn new(module: impl Into<String>, raw: Box<RawValue>) -> Self {
        Self { module: module.into(), raw, fields: None }
    }

    pub fn from_slice(module: impl Into<String>, bytes: &[u8]) -> Result<Self, GenesisError> {
        let module = module.into();
        let raw: Box<RawValue> =
            serde_json::from_slice(bytes).map_err(|e| GenesisError::json(module.clone(), e))?;
        Ok(Self::new(module, raw))
    }

    fn fields(&mut self) -> Result<&BTreeMap<String, Box<RawValue>>, GenesisError> {
        if self.fields.is_none() {
            let parsed: BTreeMap<String, Box<RawValue>> = serde_json::from_str(self.raw.get())
                .map_err(|_| GenesisError::NotAnObject { module: self.module.clone() })?;
            self.fields = Some(parsed);
        }
        Ok(self.fields.get_or_insert_default())
    }
}

impl GenesisSource for JsonGenesisSource {
    fn module(&self) -> &str {
        &self.module
    }

    fn open_reader(&mut self, field: &str) -> Result<Option<Box<dyn Read + '_>>, GenesisError> {
        let fields = self.fields()?;
        Ok(fields
            .get(field)
            .map(|raw| Box::new(Cursor::new(raw.get().as_bytes())) as Box<dyn Read + '_>))
    }

    fn read_raw_json(&mut self) -> Result<Box<RawValue>, GenesisError> {
        Ok(self.raw.clone())
    }
}

/// Target accumulating a module fragment in memory.
///
/// Field streams write into per-field buffers; [`JsonGenesisTarget::flush`] assembles them into a
/// single JSON object indented with two spaces.
#[derive(Debug, Default)]
pub struct JsonGenesisTarget {
    module: String,
    whole: Option<Value>,
    fields: BTreeMap<String, Vec<u8>>,
}

impl JsonGenesisTarget {
    pub fn new(module: impl Into<String>) -> Self {
        Self { module: module.into(), whole: None, fields: BTreeMap::new() }
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.whole.is_none() && self.fields.is_empty()
    }

    /// Produces the module fragment.
    ///
    /// Fields written through streams override same-named keys of a fragment written whole.
    pub fn flush(&self) -> Result<Box<RawValue>, GenesisError> {
        let mut object = match &self.whole {
            Some(Value::Object(map)) => map.clone(),
            Some(other) if self.fields.is_empty() => {
                return to_pretty_raw(&self.module, other);
            }
            Some(_) => return Err(GenesisError::NotAnObject { module: self.module.clone() }),
            None => Map::new(),
        };

        for (field, bytes) in &self.fields {
            let value: Value = serde_json::from_slice(bytes)
                .map_err(|e| GenesisError::json(format!("{}.{}", self.module, field), e))?;
            object.insert(field.clone(), value);
        }

        to_pretty_raw(&self.module, &Value::Object(object))
    }
}

fn to_pretty_raw(module: &str, value: &Value) -> Result<Box<RawValue>, GenesisError> {
    let pretty = serde_json::to_string_pretty(value).map_err(|e| GenesisError::json(module, e))?;
    RawValue::from_string(pretty).map_err(|e| GenesisError::json(module, e))
}

impl GenesisTarget for JsonGenesisTarget {
    fn module(&self) -> &str {
        &self.module
    }

    fn open_writer(&mut self, field: &str) -> Result<Box<dyn GenesisWriter + '_>, GenesisError> {
        if field.is_empty() {
            return Ok(Box::new(WholeWriter { target: self, buf: Vec::new() }));
        }
        let buf = self.fields.entry(field.to_string()).or_default();
        buf.clear();
        Ok(Box::new(BufferWriter { buf }))
    }

    fn write_raw_json(&mut self, json: &RawValue) -> Result<(), GenesisError> {
        let value: Value =
            serde_json::from_str(json.get()).map_err(|e| GenesisError::json(&*self.module, e))?;
        self.whole = Some(value);
        Ok(())
    }

    fn write_message_value(&mut self, value: Value) -> Result<(), GenesisError> {
        self.whole = Some(value);
        Ok(())
    }
}

struct BufferWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl Write for BufferWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl GenesisWriter for BufferWriter<'_> {
    fn finish(self: Box<Self>) -> Result<(), GenesisError> {
        Ok(())
    }
}

/// Stream addressing the whole fragment; parsed once finished.
struct WholeWriter<'a> {
    target: &'a mut JsonGenesisTarget,
    buf: Vec<u8>,
}

impl Write for WholeWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl GenesisWriter for WholeWriter<'_> {
    fn finish(self: Box<Self>) -> Result<(), GenesisError> {
        let WholeWriter { target, buf } = *self;
        let value: Value =
            serde_json::from_slice(&buf).map_err(|e| GenesisError::json(&*target.module, e))?;
        target.whole = Some(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{source::GenesisSourceExt, target::GenesisTargetExt};

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    #[test]
    fn present_field_streams_its_bytes() {
        let mut source = JsonGenesisSource::new("bank", raw(r#"{"supply":[1,2],"params":{}}"#));

        let mut out = String::new();
        source.open_reader("supply").unwrap().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "[1,2]");
    }

    #[test]
    fn absent_field_is_none_not_error() {
        let mut source = JsonGenesisSource::new("bank", raw(r#"{"supply":[]}"#));
        assert!(source.open_reader("missing").unwrap().is_none());
        assert_eq!(source.read_field::<u64>("missing").unwrap(), None);
    }

    #[test]
    fn non_object_fragment_cannot_be_split_into_fields() {
        let mut source = JsonGenesisSource::new("bank", raw("[1,2,3]"));
        let err = source.open_reader("x").err().unwrap();
        assert!(matches!(err, GenesisError::NotAnObject { .. }));

        let whole: Vec<u32> = source.read_message().unwrap();
        assert_eq!(whole, [1, 2, 3]);
    }

    #[test]
    fn target_assembles_fields_with_indent() {
        let mut target = JsonGenesisTarget::new("bank");
        target.write_field("supply", &vec![1, 2]).unwrap();
        target.write_field("denom", &"stake").unwrap();

        let out = target.flush().unwrap();
        assert_eq!(out.get(), "{\n  \"denom\": \"stake\",\n  \"supply\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn rewriting_a_field_replaces_previous_bytes() {
        let mut target = JsonGenesisTarget::new("bank");
        target.write_field("count", &1).unwrap();
        target.write_field("count", &2).unwrap();

        let value: Value = serde_json::from_str(target.flush().unwrap().get()).unwrap();
        assert_eq!(value, serde_json::json!({ "count": 2 }));
    }

    #[test]
    fn streamed_fields_override_whole_message() {
        let mut target = JsonGenesisTarget::new("bank");
        target.write_message(&serde_json::json!({ "a": 1, "b": 2 })).unwrap();
        target.write_field("b", &3).unwrap();

        let value: Value = serde_json::from_str(target.flush().unwrap().get()).unwrap();
        assert_eq!(value, serde_json::json!({ "a": 1, "b": 3 }));
    }

    #[test]
    fn invalid_field_bytes_fail_on_flush() {
        let mut target = JsonGenesisTarget::new("bank");
        let mut writer = target.open_writer("broken").unwrap();
        writer.write_all(b"{not json").unwrap();
        writer.finish().unwrap();

        assert!(matches!(target.flush().unwrap_err(), GenesisError::Json { .. }));
    }

    #[test]
    fn empty_target_flushes_to_empty_object() {
        let target = JsonGenesisTarget::new("bank");
        assert!(target.is_empty());
        assert_eq!(target.flush().unwrap().get(), "{}");
    }
}
