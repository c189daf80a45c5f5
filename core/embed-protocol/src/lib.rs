//! Cross-frame message contract for embed attribution.
//!
//! This crate is shared by the embedding page and any embedded-frame client to
//! prevent schema drift. The page remains the authority on what it accepts,
//! but frame clients can reuse the same types to construct valid messages.
//!
//! # Wire Contract
//!
//! ```text
//! child  → parent   "childReady"
//! parent → child    "parentReady"
//! parent → child    { "event": "attribution", "data": { ...record... } }
//! parent → child    { "event": "clientId", "clientId": "..." }
//! child  → parent   { "event": "<name>", ...anything... }   (forwarded verbatim)
//! ```

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Readiness token sent by the embedded frame once its listener is up.
pub const CHILD_READY: &str = "childReady";
/// Acknowledgement token the page sends back on a verified readiness signal.
pub const PARENT_READY: &str = "parentReady";

pub const ATTRIBUTION_EVENT: &str = "attribution";
pub const CLIENT_ID_EVENT: &str = "clientId";

/// A message posted from the embedding page to the embedded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ParentMessage {
    /// The literal `"parentReady"` acknowledgement.
    Ready,
    /// `{ event: "attribution", data }`.
    Attribution(Value),
    /// `{ event: "clientId", clientId }`.
    ClientId(String),
}

impl ParentMessage {
    pub fn to_value(&self) -> Value {
        match self {
            ParentMessage::Ready => Value::String(PARENT_READY.to_string()),
            ParentMessage::Attribution(data) => json!({
                "event": ATTRIBUTION_EVENT,
                "data": data,
            }),
            ParentMessage::ClientId(client_id) => json!({
                "event": CLIENT_ID_EVENT,
                "clientId": client_id,
            }),
        }
    }

    /// Decodes a payload received on the frame side.
    ///
    /// Returns `None` for anything that is not one of the three parent shapes.
    pub fn decode(data: &Value) -> Option<Self> {
        match data {
            Value::String(token) if token == PARENT_READY => Some(ParentMessage::Ready),
            Value::Object(map) => match map.get("event").and_then(Value::as_str) {
                Some(ATTRIBUTION_EVENT) => map
                    .get("data")
                    .map(|data| ParentMessage::Attribution(data.clone())),
                Some(CLIENT_ID_EVENT) => map
                    .get("clientId")
                    .and_then(Value::as_str)
                    .map(|id| ParentMessage::ClientId(id.to_string())),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Serialize for ParentMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// A message received by the page from an embedded frame, decoded at the
/// channel boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildMessage {
    /// The literal `"childReady"` token.
    Ready,
    /// An object carrying a truthy `event` field. Kept whole for forwarding.
    Event(Map<String, Value>),
    /// Anything else. Never acted upon.
    Unrecognized,
}

impl ChildMessage {
    pub fn decode(data: &Value) -> Self {
        match data {
            Value::String(token) if token == CHILD_READY => ChildMessage::Ready,
            Value::Object(map) if map.get("event").is_some_and(is_truthy) => {
                ChildMessage::Event(map.clone())
            }
            _ => ChildMessage::Unrecognized,
        }
    }

    /// Builds an event payload the way a frame client would send it.
    pub fn event(name: &str, fields: Map<String, Value>) -> Value {
        let mut payload = fields;
        payload.insert("event".to_string(), Value::String(name.to_string()));
        Value::Object(payload)
    }
}

/// Script-style truthiness of a decoded payload value.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy; objects and arrays are
/// always truthy, even when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
