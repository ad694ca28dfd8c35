use serde::Serialize;
use serde_json::Value;

use crate::envelope::Envelope;

/// Body of one SSE event sent to a viewer.
/// Wire: `{ "type": "order.cancelled", "data": {...} }`
///
/// Borrows from the shared envelope so fan-out never clones payloads.
#[derive(Debug, Clone, Serialize)]
pub struct StreamFrame<'a> {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub data: &'a Value,
}

impl<'a> StreamFrame<'a> {
    pub fn from_envelope(envelope: &'a Envelope) -> Self {
        Self {
            event_type: envelope.event_type.as_str(),
            data: &envelope.data,
        }
    }

    /// Serialize to the JSON text placed in the SSE `data:` field.
    pub fn to_json(&self) -> String {
        // Serializing borrowed strings and a `Value` cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl<'a> From<&'a Envelope> for StreamFrame<'a> {
    fn from(envelope: &'a Envelope) -> Self {
        Self::from_envelope(envelope)
    }
}
