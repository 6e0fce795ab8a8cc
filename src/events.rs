//! Structured events and the downstream sink interface.
//!
//! Events are flat-ish JSON field bags stamped with a timestamp and a kind.
//! The sink is an external collaborator: delivery is best-effort and never
//! back-pressures the correlator.

use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::EventKind;

/// One record handed to the event sink.
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub fields: Map<String, Value>,
}

impl Event {
    /// Create an event of the given kind, stamped now, with the kind
    /// recorded in the field bag as `eventType`.
    pub fn new(kind: EventKind) -> Self {
        let mut fields = Map::new();
        fields.insert("eventType".into(), Value::String(kind.as_str().into()));

        Self {
            timestamp: Utc::now(),
            kind,
            fields,
        }
    }

    /// Set a top-level field.
    pub fn put(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Read a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Render as a single JSON object with the timestamp under `@timestamp`.
    pub fn to_json(&self) -> Value {
        let mut out = Map::with_capacity(self.fields.len() + 1);
        out.insert(
            "@timestamp".into(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        for (k, v) in &self.fields {
            out.insert(k.clone(), v.clone());
        }
        Value::Object(out)
    }
}

/// Downstream event pipeline.
pub trait EventSink: Send + Sync {
    /// Publish a batch of events. Best-effort; errors are the sink's
    /// problem, not the caller's.
    fn publish_all(&self, events: Vec<Event>);
}

/// Sink that writes one JSON object per line to stdout.
#[derive(Debug, Default)]
pub struct JsonLinesSink;

impl JsonLinesSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for JsonLinesSink {
    fn publish_all(&self, events: Vec<Event>) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        for event in events {
            if let Ok(line) = serde_json::to_string(&event.to_json()) {
                let _ = writeln!(out, "{line}");
            }
        }
    }
}

/// Sink that captures events in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything captured so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    /// Snapshot of everything captured so far.
    pub fn captured(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for MemorySink {
    fn publish_all(&self, events: Vec<Event>) {
        self.events.lock().unwrap().extend(events);
    }
}
