//! Raw vendor events as they arrive from a fetcher.
//!
//! A [`RawEvent`] keeps the full vendor payload untouched and lifts out the
//! three fields the grouper needs: signature, message and timestamp. Which
//! JSON fields those are depends on the vendor and is described by
//! [`EventFields`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Identity of an event group: `(signature, message)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub signature: String,
    pub message: String,
}

impl EventKey {
    pub fn new(signature: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            message: message.into(),
        }
    }
}

/// Names of the vendor fields holding signature, message and timestamp.
///
/// A name starting with `/` is resolved as a JSON pointer
/// (e.g. `/alert/signature`), anything else as a top-level key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFields {
    pub signature: String,
    pub message: String,
    pub timestamp: String,
}

impl Default for EventFields {
    fn default() -> Self {
        Self {
            signature: "signature".into(),
            message: "message".into(),
            timestamp: "ts".into(),
        }
    }
}

impl EventFields {
    fn lookup<'a>(payload: &'a Value, field: &str) -> Option<&'a Value> {
        if field.starts_with('/') {
            payload.pointer(field)
        } else {
            payload.get(field)
        }
    }
}

/// One vendor-reported occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Classifier of the event type. Empty if the vendor omitted it.
    pub signature: String,
    /// Human-readable description. Empty if the vendor omitted it.
    pub message: String,
    /// Parsed occurrence time. `None` when missing or unparseable; such an
    /// event never takes part in time-bounded grouping.
    pub timestamp: Option<OffsetDateTime>,
    /// The timestamp exactly as the vendor sent it.
    pub timestamp_text: Option<String>,
    /// Full vendor object.
    pub payload: Value,
}

impl RawEvent {
    /// Builds an event from a vendor object using `fields` to locate the
    /// interesting parts. Never fails: absent fields fall back to empty
    /// strings and `None`.
    #[must_use]
    pub fn from_payload(payload: Value, fields: &EventFields) -> Self {
        let text = |field: &str| {
            EventFields::lookup(&payload, field)
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        let signature = text(&fields.signature).unwrap_or_default();
        let message = text(&fields.message).unwrap_or_default();
        let timestamp_text = text(&fields.timestamp);
        let timestamp = timestamp_text.as_deref().and_then(parse_timestamp);

        Self {
            signature,
            message,
            timestamp,
            timestamp_text,
            payload,
        }
    }

    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey::new(self.signature.clone(), self.message.clone())
    }
}

/// Parses an RFC 3339 timestamp such as `2024-03-01T10:00:00.123456Z`.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}
