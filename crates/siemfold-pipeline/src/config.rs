//! JSON configuration for a multi-tenant polling run.
//!
//! The config is loaded once and split into one [`TenantConfig`] per tenant;
//! every pipeline gets its own copy at construction time.

use crate::error::ConfigError;
use crate::pipeline::RetryPolicy;
use crate::source::SourceSpec;
use serde::{Deserialize, Serialize};
use siemfold_core::{EventFields, Labels};
use siemfold_grouper::{EventGrouper, GroupingConfig};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const DEFAULT_INTERVAL_SECS: u64 = 300;

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub name: String,
    /// Tool label stamped on every record (e.g. `MER`, `EDR`).
    pub tool: String,
    pub source: SourceSpec,
    #[serde(default)]
    pub fields: EventFields,
    /// Overrides the global grouping settings for this tenant.
    #[serde(default)]
    pub grouping: Option<GroupingConfig>,
}

impl TenantConfig {
    #[must_use]
    pub fn labels(&self) -> Labels {
        Labels::new(self.name.clone(), self.tool.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiemfoldConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub grouping: GroupingConfig,
    pub tenants: Vec<TenantConfig>,
}

impl SiemfoldConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        raw.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.tenants.is_empty() {
            return Err(ConfigError::NoTenants);
        }

        let mut seen = HashSet::new();
        for tenant in &self.tenants {
            if tenant.name.trim().is_empty() {
                return Err(ConfigError::EmptyTenantName);
            }
            if !seen.insert(tenant.name.as_str()) {
                return Err(ConfigError::DuplicateTenant(tenant.name.clone()));
            }
            EventGrouper::new(self.grouping_for(tenant)).map_err(|source| {
                ConfigError::Grouping {
                    tenant: tenant.name.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn grouping_for(&self, tenant: &TenantConfig) -> GroupingConfig {
        tenant.grouping.unwrap_or(self.grouping)
    }
}

impl std::str::FromStr for SiemfoldConfig {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}
