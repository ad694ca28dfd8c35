use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::events::EventType;

/// Why an inbound broker message could not become an [`Envelope`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body is not valid JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Neither the body nor the routing key names an event type.
    #[error("message has no event type")]
    MissingType,

    /// The named type is not part of the event catalog.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
}

/// One domain notification on its way from the broker to viewers.
///
/// Wire: `{ "type": "product.created", "data": {...} }`. The relay never
/// looks inside `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: Value,
}

impl Envelope {
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self { event_type, data }
    }

    /// Build an envelope from a raw broker message.
    ///
    /// Body shapes, first match wins:
    ///   1. `{ "pattern": "<type>", "data": ... }` (framework-style producers,
    ///      optionally with a request `id`)
    ///   2. `{ "type": "<type>", "data": ... }` with no other keys
    ///   3. anything else: `routing_key` is the type, the whole body is `data`
    ///
    /// A payload that merely carries its own `type` field is shape 3.
    pub fn decode(routing_key: &str, body: &[u8]) -> Result<Self, DecodeError> {
        let mut value: Value = serde_json::from_slice(body)?;

        if let Value::Object(ref mut map) = value {
            if let Some(name) = wrapper_type(map, "pattern", &["pattern", "data", "id"], false)
                .or_else(|| wrapper_type(map, "type", &["type", "data"], true))
            {
                let event_type = EventType::parse(&name)?;
                let data = map.remove("data").unwrap_or(Value::Null);
                return Ok(Self::new(event_type, data));
            }
        }

        let event_type = EventType::parse(routing_key)?;
        Ok(Self::new(event_type, value))
    }
}

/// The type named by `field` when `map` is a wrapper: `field` is a string,
/// every key is in `allowed`, and `data` is present if `needs_data`.
fn wrapper_type(
    map: &Map<String, Value>,
    field: &str,
    allowed: &[&str],
    needs_data: bool,
) -> Option<String> {
    let name = map.get(field)?.as_str()?;
    if needs_data && !map.contains_key("data") {
        return None;
    }
    if !map.keys().all(|k| allowed.contains(&k.as_str())) {
        return None;
    }
    Some(name.to_string())
}
