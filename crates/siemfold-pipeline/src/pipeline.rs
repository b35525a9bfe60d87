//! Fetch, group and forward for one tenant, and the per-tenant fan-out.

use crate::error::PipelineError;
use crate::report::{CycleReport, TenantOutcome};
use serde::{Deserialize, Serialize};
use siemfold_core::{EventSource, Forwarder, Labels, RawEvent};
use siemfold_grouper::{EventGrouper, GroupingConfig};
use std::time::Duration;
use time::OffsetDateTime;

/// Fixed retry loop around a tenant's fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Everything one tenant needs for a cycle. Owned by that tenant's worker;
/// nothing is shared between tenants.
#[derive(Debug)]
pub struct TenantPipeline<S, F> {
    labels: Labels,
    source: S,
    forwarder: F,
    grouper: EventGrouper,
    retry: RetryPolicy,
}

impl<S: EventSource, F: Forwarder> TenantPipeline<S, F> {
    pub fn new(
        labels: Labels,
        source: S,
        forwarder: F,
        grouping: GroupingConfig,
        retry: RetryPolicy,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            labels,
            source,
            forwarder,
            grouper: EventGrouper::new(grouping)?,
            retry,
        })
    }

    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    #[must_use]
    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    fn fetch_with_retry(&mut self) -> Result<Vec<RawEvent>, PipelineError> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.fetch() {
                Ok(events) => return Ok(events),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        tenant = %self.labels.tenant,
                        attempt,
                        attempts,
                        error = %e,
                        "fetch failed, retrying"
                    );
                    std::thread::sleep(self.retry.delay());
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PipelineError::FetchExhausted {
                        attempts,
                        source: Box::new(e),
                    })
                }
            }
        }
    }

    /// Runs one fetch cycle. Grouping state is created here and dropped at
    /// the end of the call.
    pub fn run_cycle(&mut self) -> TenantOutcome {
        let tenant = self.labels.tenant.clone();
        tracing::info!(tenant = %tenant, "fetching events");

        let events = match self.fetch_with_retry() {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(tenant = %tenant, error = %e, "skipping tenant this cycle");
                return TenantOutcome::failed(&tenant, e.to_string());
            }
        };

        let mut outcome = TenantOutcome::empty(&tenant);
        outcome.fetched = events.len();

        let grouping = self.grouper.group(events);
        outcome.groups = grouping.len();
        outcome.ungrouped = grouping.ungrouped_len();

        let records = grouping.records(&self.labels);
        tracing::info!(
            tenant = %tenant,
            fetched = outcome.fetched,
            groups = outcome.groups,
            records = records.len(),
            "forwarding records"
        );

        for record in &records {
            if let Err(e) = self.forwarder.forward(record) {
                let err = PipelineError::Forward {
                    sent: outcome.sent,
                    source: Box::new(e),
                };
                tracing::error!(tenant = %tenant, error = %err, "forwarding aborted");
                outcome.error = Some(err.to_string());
                return outcome;
            }
            outcome.sent += 1;
        }

        if let Err(e) = self.forwarder.flush() {
            let err = PipelineError::Forward {
                sent: outcome.sent,
                source: Box::new(e),
            };
            tracing::error!(tenant = %tenant, error = %err, "flush failed");
            outcome.error = Some(err.to_string());
        }

        outcome
    }
}

/// Runs one cycle for every tenant, each on its own thread, and waits for
/// all of them.
pub fn run_tenants<S, F>(pipelines: &mut [TenantPipeline<S, F>]) -> CycleReport
where
    S: EventSource + Send,
    F: Forwarder + Send,
{
    let started_at = OffsetDateTime::now_utc();
    let tenants: Vec<String> = pipelines
        .iter()
        .map(|p| p.labels.tenant.clone())
        .collect();

    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = pipelines
            .iter_mut()
            .map(|pipeline| scope.spawn(move || pipeline.run_cycle()))
            .collect();

        handles
            .into_iter()
            .zip(&tenants)
            .map(|(handle, tenant)| {
                handle.join().unwrap_or_else(|_| {
                    tracing::error!(tenant = %tenant, "tenant worker panicked");
                    TenantOutcome::failed(tenant, "worker panicked")
                })
            })
            .collect()
    });

    CycleReport {
        started_at,
        finished_at: OffsetDateTime::now_utc(),
        outcomes,
    }
}
