//! Core types and seams shared by the siemfold crates.

pub mod event;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use event::{EventFields, EventKey, RawEvent};

/// Labels attached to every forwarded record. Supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    pub tenant: String,
    pub tool: String,
}

impl Labels {
    pub fn new(tenant: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            tool: tool.into(),
        }
    }
}

/// Flat record handed to a log sink, one per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardRecord {
    /// Vendor timestamp of the representative event, as received.
    pub timestamp: Option<String>,
    pub organization: String,
    pub tool: String,
    pub signature: String,
    pub message: String,
    /// Aggregate count of the group the run belongs to.
    pub count: u64,
    /// Full payload of the representative event.
    pub event: Value,
}

impl ForwardRecord {
    #[must_use]
    pub fn new(event: &RawEvent, count: u64, labels: &Labels) -> Self {
        Self {
            timestamp: event.timestamp_text.clone(),
            organization: labels.tenant.clone(),
            tool: labels.tool.clone(),
            signature: event.signature.clone(),
            message: event.message.clone(),
            count,
            event: event.payload.clone(),
        }
    }
}

/// Producer of raw events for one tenant and one time window.
pub trait EventSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch(&mut self) -> Result<Vec<RawEvent>, Self::Error>;
}

/// Consumer of forward records, e.g. a log sink.
pub trait Forwarder {
    type Error: std::error::Error + Send + Sync + 'static;

    fn forward(&mut self, record: &ForwardRecord) -> Result<(), Self::Error>;

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
