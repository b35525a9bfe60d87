//! Local-file event source.
//!
//! The file is re-read on every fetch, so an external poller can keep
//! overwriting it with the latest vendor page.

use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use siemfold_core::{EventFields, EventSource, RawEvent};
use std::path::PathBuf;

/// Where a tenant's events come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub path: PathBuf,
    /// Key holding the event array when the file is a response envelope,
    /// e.g. `data`.
    #[serde(default)]
    pub records_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileSource {
    spec: SourceSpec,
    fields: EventFields,
}

impl FileSource {
    #[must_use]
    pub fn new(spec: SourceSpec, fields: EventFields) -> Self {
        Self { spec, fields }
    }

    fn payloads(&self, raw: &str) -> Result<Vec<Value>, SourceError> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(Value::Object(mut obj)) => match &self.spec.records_key {
                Some(key) => match obj.remove(key) {
                    Some(Value::Array(items)) => Ok(items),
                    _ => Err(SourceError::MissingRecords(key.clone())),
                },
                None => Ok(vec![Value::Object(obj)]),
            },
            Ok(_) => Err(SourceError::UnexpectedShape),
            Err(_) => parse_lines(raw),
        }
    }
}

fn parse_lines(raw: &str) -> Result<Vec<Value>, SourceError> {
    let mut items = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(line).map_err(|source| SourceError::Json {
            line: idx + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

impl EventSource for FileSource {
    type Error = SourceError;

    fn fetch(&mut self) -> Result<Vec<RawEvent>, SourceError> {
        let raw = std::fs::read_to_string(&self.spec.path).map_err(|source| SourceError::Io {
            path: self.spec.path.clone(),
            source,
        })?;

        let mut events = Vec::new();
        for payload in self.payloads(&raw)? {
            if !payload.is_object() {
                tracing::warn!(path = ?self.spec.path, "skipping non-object entry");
                continue;
            }
            events.push(RawEvent::from_payload(payload, &self.fields));
        }
        Ok(events)
    }
}
