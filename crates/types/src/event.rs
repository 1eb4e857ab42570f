//! Events emitted by modules while a phase runs.
//!
//! Every phase gets a fresh [`EventManager`]. Events keep the order in which modules emitted them,
//! so the aggregated list follows the ordering list of the phase.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Typed event `{0}` must serialize to a JSON object")]
    NotAnObject(String),

    #[error("Failed to serialize typed event: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single key/value pair attached to an [`Event`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub index: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), attributes: Vec::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(EventAttribute { key: key.into(), value: value.into(), index: false });
        self
    }

    pub fn with_indexed_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.push(EventAttribute { key: key.into(), value: value.into(), index: true });
        self
    }

    /// Returns the value of the first attribute named `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|a| a.key == key).map(|a| a.value.as_str())
    }

    /// Flattens a serializable struct into an event.
    ///
    /// Top-level string fields are stored verbatim, every other field as its JSON encoding.
    pub fn from_typed<T: Serialize>(kind: impl Into<String>, msg: &T) -> Result<Self, EventError> {
        let kind = kind.into();
        let Value::Object(fields) = serde_json::to_value(msg)? else {
            return Err(EventError::NotAnObject(kind));
        };

        let mut event = Event::new(kind);
        for (key, value) in fields {
            let value = match value {
                Value::String(s) => s,
                other => serde_json::to_string(&other)?,
            };
            event = event.with_attribute(key, value);
        }
        Ok(event)
    }
}

/// Append-only collector of events for a single phase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventManager {
    events: Vec<Event>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn emit_all(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn emit_typed<T: Serialize>(
        &mut self,
        kind: impl Into<String>,
        msg: &T,
    ) -> Result<(), EventError> {
        let event = Event::from_typed(kind, msg)?;
        self.emit(event);
        Ok(())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl Serialize for EventManager {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.events.serialize(serializer)
    }
}
