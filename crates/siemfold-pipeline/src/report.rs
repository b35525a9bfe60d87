use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What one tenant's cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantOutcome {
    pub tenant: String,
    /// Raw events returned by the source.
    pub fetched: usize,
    /// Keyed groups built from them.
    pub groups: usize,
    /// Events forwarded without grouping (no timestamp).
    pub ungrouped: usize,
    /// Records accepted by the forwarder.
    pub sent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TenantOutcome {
    pub(crate) fn empty(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            fetched: 0,
            groups: 0,
            ungrouped: 0,
            sent: 0,
            error: None,
        }
    }

    pub(crate) fn failed(tenant: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(tenant)
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of every tenant for one polling cycle, in tenant order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    #[serde(with = "time::serde::iso8601")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::iso8601")]
    pub finished_at: OffsetDateTime,
    pub outcomes: Vec<TenantOutcome>,
}

impl CycleReport {
    #[must_use]
    pub fn total_fetched(&self) -> usize {
        self.outcomes.iter().map(|o| o.fetched).sum()
    }

    #[must_use]
    pub fn total_sent(&self) -> usize {
        self.outcomes.iter().map(|o| o.sent).sum()
    }

    #[must_use]
    pub fn total_groups(&self) -> usize {
        self.outcomes.iter().map(|o| o.groups).sum()
    }

    #[must_use]
    pub fn total_ungrouped(&self) -> usize {
        self.outcomes.iter().map(|o| o.ungrouped).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TenantOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn outcome(tenant: &str, fetched: usize, sent: usize) -> TenantOutcome {
        TenantOutcome {
            fetched,
            groups: 1,
            sent,
            ..TenantOutcome::empty(tenant)
        }
    }

    #[test]
    fn totals_sum_over_tenants() {
        let now = OffsetDateTime::now_utc();
        let report = CycleReport {
            started_at: now,
            finished_at: now,
            outcomes: vec![
                outcome("a", 10, 4),
                outcome("b", 5, 5),
                TenantOutcome::failed("c", "boom"),
            ],
        };

        assert_eq!(report.total_fetched(), 15);
        assert_eq!(report.total_sent(), 9);
        assert_eq!(report.total_groups(), 2);
        assert_eq!(report.total_ungrouped(), 0);
        let failed: Vec<_> = report.failed().map(|o| o.tenant.as_str()).collect();
        assert_eq!(failed, vec!["c"]);
    }

    #[test]
    fn report_serializes_without_empty_errors() {
        let now = OffsetDateTime::now_utc();
        let report = CycleReport {
            started_at: now,
            finished_at: now,
            outcomes: vec![outcome("a", 1, 1)],
        };

        let json = serde_json::to_string(&report).expect("should serialize");
        assert!(json.contains("\"tenant\":\"a\""));
        assert!(!json.contains("error"));

        let _roundtrip: CycleReport = serde_json::from_str(&json).expect("should deserialize");
    }
}
