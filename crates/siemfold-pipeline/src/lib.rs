#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Polling cycles for siemfold.
//!
//! A [`TenantPipeline`] owns one tenant's source, forwarder and grouping
//! settings. Each cycle fetches the tenant's recent events (with a fixed
//! retry loop), groups them with fresh state and forwards one record per run.
//! [`run_tenants`] runs a cycle for every tenant on its own thread and
//! collects a [`CycleReport`].

pub mod config;
pub mod error;
pub mod forward;
pub mod pipeline;
pub mod report;
pub mod source;

pub use config::{SiemfoldConfig, TenantConfig};
pub use error::{ConfigError, ForwardError, PipelineError, SourceError};
pub use forward::{CollectingForwarder, JsonLinesForwarder};
pub use pipeline::{run_tenants, RetryPolicy, TenantPipeline};
pub use report::{CycleReport, TenantOutcome};
pub use source::{FileSource, SourceSpec};
