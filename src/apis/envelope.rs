//! Response envelope unwrapping.
//!
//! Backends return the event list either bare or wrapped under one of a few
//! well-known keys. Strategies are tried in a fixed order and the first one
//! that finds an array wins.

use crate::error::{EventsError, Result};
use crate::types::EventRecord;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStrategy {
    /// The body itself is the array
    BareArray,
    /// The array sits under this top-level key
    Field(&'static str),
}

/// Order matters: earlier strategies shadow later ones.
pub const ENVELOPE_STRATEGIES: [EnvelopeStrategy; 5] = [
    EnvelopeStrategy::BareArray,
    EnvelopeStrategy::Field("events"),
    EnvelopeStrategy::Field("results"),
    EnvelopeStrategy::Field("events_list"),
    EnvelopeStrategy::Field("data"),
];

impl EnvelopeStrategy {
    pub fn extract<'a>(&self, body: &'a Value) -> Option<&'a Vec<Value>> {
        match self {
            EnvelopeStrategy::BareArray => body.as_array(),
            EnvelopeStrategy::Field(key) => body.get(*key).and_then(Value::as_array),
        }
    }
}

/// Events pulled out of a response body
#[derive(Debug, Clone)]
pub struct UnwrappedEvents {
    pub strategy: EnvelopeStrategy,
    pub events: Vec<EventRecord>,
    /// Items in the array that could not be read as events
    pub skipped: usize,
}

/// Locate the event array in `body` and deserialize its items.
///
/// Items that fail to deserialize are skipped rather than failing the batch.
pub fn unwrap_events(body: &Value) -> Result<UnwrappedEvents> {
    let (strategy, items) = ENVELOPE_STRATEGIES
        .iter()
        .find_map(|s| s.extract(body).map(|items| (*s, items)))
        .ok_or_else(|| EventsError::Envelope(describe(body)))?;

    let mut events = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value::<EventRecord>(item.clone()) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!("Skipping unreadable event at index {}: {}", index, e);
                skipped += 1;
            }
        }
    }

    Ok(UnwrappedEvents {
        strategy,
        events,
        skipped,
    })
}

fn describe(body: &Value) -> String {
    match body {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
    }
}
