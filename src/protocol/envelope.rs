//! Envelope types exchanged over the WebSocket channel.
//!
//! # Format
//!
//! Browser to host:
//!
//! ```json
//! { "type": "webview-message", "payload": { ... } }
//! { "type": "toolbar-action", "action": "settings" }
//! ```
//!
//! Host to browser:
//!
//! ```json
//! { "type": "extension-message", "payload": { ... } }
//! ```
//!
//! Payloads are opaque to the bridge and pass through untouched.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// InboundEnvelope
// ============================================================================

/// A message sent by a browser client.
///
/// Decoding is strict: a frame whose `type` is unknown, or which lacks the
/// field its type requires, does not decode and is dropped by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEnvelope {
    /// A message from the UI application, forwarded to the message handler.
    WebviewMessage {
        /// Opaque UI message. `null` counts as present.
        payload: Value,
    },

    /// A toolbar button press, forwarded to the toolbar handler.
    ToolbarAction {
        /// Name of the button's action.
        action: String,
    },
}

/// Outcome of decoding one text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The frame is a known envelope.
    Envelope(InboundEnvelope),
    /// Valid JSON, but not an envelope the bridge understands.
    Unrecognized,
    /// Not JSON at all.
    Malformed(String),
}

impl InboundEnvelope {
    /// Decodes a text frame.
    ///
    /// Never fails: the caller decides how loudly to log each outcome.
    #[must_use]
    pub fn decode(text: &str) -> Decoded {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return Decoded::Malformed(e.to_string()),
        };

        match serde_json::from_value(value) {
            Ok(envelope) => Decoded::Envelope(envelope),
            Err(_) => Decoded::Unrecognized,
        }
    }
}

// ============================================================================
// OutboundEnvelope
// ============================================================================

/// Tag value for host-to-browser envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundKind {
    /// The only outbound kind.
    #[serde(rename = "extension-message")]
    ExtensionMessage,
}

/// A host message wrapped for delivery to browser clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope<T> {
    /// Always [`OutboundKind::ExtensionMessage`].
    #[serde(rename = "type")]
    pub kind: OutboundKind,

    /// The host message, serialized as-is.
    pub payload: T,
}

impl<T> OutboundEnvelope<T> {
    /// Wraps a host message.
    #[inline]
    #[must_use]
    pub const fn new(payload: T) -> Self {
        Self {
            kind: OutboundKind::ExtensionMessage,
            payload,
        }
    }
}

impl<T: Serialize> OutboundEnvelope<T> {
    /// Serializes the envelope to the exact text sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the payload refuses to serialize.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_webview_message() {
        let decoded = InboundEnvelope::decode(r#"{"type":"webview-message","payload":{"x":1}}"#);
        assert_eq!(
            decoded,
            Decoded::Envelope(InboundEnvelope::WebviewMessage {
                payload: json!({"x": 1})
            })
        );
    }

    #[test]
    fn test_decode_null_payload_counts_as_present() {
        let decoded = InboundEnvelope::decode(r#"{"type":"webview-message","payload":null}"#);
        assert_eq!(
            decoded,
            Decoded::Envelope(InboundEnvelope::WebviewMessage {
                payload: Value::Null
            })
        );
    }

    #[test]
    fn test_decode_missing_payload_is_unrecognized() {
        let decoded = InboundEnvelope::decode(r#"{"type":"webview-message"}"#);
        assert_eq!(decoded, Decoded::Unrecognized);
    }

    #[test]
    fn test_decode_toolbar_action() {
        let decoded = InboundEnvelope::decode(r#"{"type":"toolbar-action","action":"settings"}"#);
        assert_eq!(
            decoded,
            Decoded::Envelope(InboundEnvelope::ToolbarAction {
                action: "settings".into()
            })
        );
    }

    #[test]
    fn test_decode_non_string_action_is_unrecognized() {
        let decoded = InboundEnvelope::decode(r#"{"type":"toolbar-action","action":7}"#);
        assert_eq!(decoded, Decoded::Unrecognized);
    }

    #[test]
    fn test_decode_unknown_and_untagged() {
        assert_eq!(
            InboundEnvelope::decode(r#"{"type":"unknown"}"#),
            Decoded::Unrecognized
        );
        assert_eq!(
            InboundEnvelope::decode(r#"{"payload":1}"#),
            Decoded::Unrecognized
        );
        assert_eq!(InboundEnvelope::decode("[1,2,3]"), Decoded::Unrecognized);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            InboundEnvelope::decode("{not json"),
            Decoded::Malformed(_)
        ));
    }

    #[test]
    fn test_outbound_encode_shape() {
        let text = OutboundEnvelope::new(&json!({"foo": 1}))
            .encode()
            .expect("encode");
        let parsed: Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(parsed, json!({"type": "extension-message", "payload": {"foo": 1}}));
    }

    #[test]
    fn test_outbound_round_trip_preserves_payload() {
        let payload = json!({
            "type": "state",
            "nested": {"list": [1, "two", null, 3.5], "flag": true},
            "unicode": "héllo ✓"
        });
        let text = OutboundEnvelope::new(&payload).encode().expect("encode");

        let received: OutboundEnvelope<Value> = serde_json::from_str(&text).expect("decode");
        assert_eq!(received.kind, OutboundKind::ExtensionMessage);
        assert_eq!(received.payload, payload);
        assert_eq!(
            serde_json::to_string(&received.payload).expect("re-encode"),
            serde_json::to_string(&payload).expect("encode payload")
        );
    }

    #[test]
    fn test_outbound_rejects_wrong_tag() {
        let result = serde_json::from_str::<OutboundEnvelope<Value>>(
            r#"{"type":"webview-message","payload":1}"#,
        );
        assert!(result.is_err());
    }
}
