#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Sliding-window grouping of near-identical security events.
//!
//! Events sharing a `(signature, message)` key are folded into one
//! [`EventGroup`]. An event closer than the configured gap to the group's
//! last timestamp extends the open run silently; anything farther opens a new
//! run and becomes a new member of the group. Events without a usable
//! timestamp are never grouped and pass through as singletons.
//!
//! A [`Grouping`] lives for one fetch cycle of one tenant and is dropped once
//! its records have been forwarded.

pub mod error;

use serde::{Deserialize, Serialize};
use siemfold_core::{EventKey, ForwardRecord, Labels, RawEvent};
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};

pub use error::{GrouperError, Result};

/// Default gap below which two same-key events belong to the same run.
pub const DEFAULT_GAP_SECS: u64 = 60;

/// How `count` and `first_timestamp` behave when a new run opens under an
/// existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountPolicy {
    /// `count` keeps growing across runs and `first_timestamp` stays at the
    /// very first event of the key.
    #[default]
    Cumulative,
    /// `count` and `first_timestamp` restart with every new run.
    PerRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    pub gap_secs: u64,
    pub count_policy: CountPolicy,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            gap_secs: DEFAULT_GAP_SECS,
            count_policy: CountPolicy::Cumulative,
        }
    }
}

/// Aggregation of all timed events sharing one key.
#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup {
    pub key: EventKey,
    pub count: u64,
    pub first_timestamp: OffsetDateTime,
    pub last_timestamp: OffsetDateTime,
    /// Representative event of every run, in the order the runs opened.
    pub members: Vec<RawEvent>,
}

impl EventGroup {
    fn open(key: EventKey, ts: OffsetDateTime, event: RawEvent) -> Self {
        Self {
            key,
            count: 1,
            first_timestamp: ts,
            last_timestamp: ts,
            members: vec![event],
        }
    }
}

/// One slot of a [`Grouping`], in first-appearance order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entry<'a> {
    Group(&'a EventGroup),
    /// Event without a usable timestamp.
    Ungrouped(&'a RawEvent),
}

#[derive(Debug, Clone)]
enum Slot {
    Group(usize),
    Ungrouped(RawEvent),
}

/// Result of one grouping pass.
#[derive(Debug, Default, Clone)]
pub struct Grouping {
    groups: Vec<EventGroup>,
    index: HashMap<EventKey, usize>,
    slots: Vec<Slot>,
}

impl Grouping {
    #[must_use]
    pub fn get(&self, key: &EventKey) -> Option<&EventGroup> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    /// Keyed groups in first-appearance order.
    pub fn groups(&self) -> impl Iterator<Item = &EventGroup> {
        self.groups.iter()
    }

    pub fn ungrouped(&self) -> impl Iterator<Item = &RawEvent> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Ungrouped(event) => Some(event),
            Slot::Group(_) => None,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        self.slots.iter().map(|slot| match slot {
            Slot::Group(i) => Entry::Group(&self.groups[*i]),
            Slot::Ungrouped(event) => Entry::Ungrouped(event),
        })
    }

    /// Number of keyed groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn ungrouped_len(&self) -> usize {
        self.slots.len() - self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// One record per run of every group and one per ungrouped event, in
    /// entry order. Each run record carries the group's aggregate count.
    #[must_use]
    pub fn records(&self, labels: &Labels) -> Vec<ForwardRecord> {
        let mut records = Vec::new();
        for entry in self.entries() {
            match entry {
                Entry::Group(group) => records.extend(
                    group
                        .members
                        .iter()
                        .map(|member| ForwardRecord::new(member, group.count, labels)),
                ),
                Entry::Ungrouped(event) => records.push(ForwardRecord::new(event, 1, labels)),
            }
        }
        records
    }
}

/// Folds event sequences into [`Grouping`]s.
#[derive(Debug, Clone)]
pub struct EventGrouper {
    gap: Duration,
    count_policy: CountPolicy,
}

impl Default for EventGrouper {
    fn default() -> Self {
        Self {
            gap: Duration::seconds(DEFAULT_GAP_SECS as i64),
            count_policy: CountPolicy::Cumulative,
        }
    }
}

impl EventGrouper {
    pub fn new(config: GroupingConfig) -> Result<Self> {
        if config.gap_secs == 0 {
            return Err(GrouperError::ZeroGap(config.gap_secs));
        }
        let secs = i64::try_from(config.gap_secs)
            .map_err(|_| GrouperError::GapOutOfRange(config.gap_secs))?;
        Ok(Self {
            gap: Duration::seconds(secs),
            count_policy: config.count_policy,
        })
    }

    /// Groups `events` in the order given. No sorting is applied.
    pub fn group(&self, events: impl IntoIterator<Item = RawEvent>) -> Grouping {
        let mut grouping = Grouping::default();
        for event in events {
            self.fold(&mut grouping, event);
        }
        grouping
    }

    fn fold(&self, grouping: &mut Grouping, event: RawEvent) {
        let Some(ts) = event.timestamp else {
            #[cfg(feature = "telemetry")]
            tracing::debug!(signature = %event.signature, "event without timestamp left ungrouped");
            grouping.slots.push(Slot::Ungrouped(event));
            return;
        };

        let key = event.key();
        let Some(i) = grouping.index.get(&key).copied() else {
            let i = grouping.groups.len();
            grouping.index.insert(key.clone(), i);
            grouping.groups.push(EventGroup::open(key, ts, event));
            grouping.slots.push(Slot::Group(i));
            return;
        };
        let group = &mut grouping.groups[i];

        // Input may be newest-first, hence the absolute gap.
        if (ts - group.last_timestamp).abs() < self.gap {
            group.count += 1;
            group.last_timestamp = ts;
            return;
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!(
            signature = %group.key.signature,
            runs = group.members.len() + 1,
            "gap exceeded, opening new run"
        );
        group.members.push(event);
        group.last_timestamp = ts;
        match self.count_policy {
            CountPolicy::Cumulative => group.count += 1,
            CountPolicy::PerRun => {
                group.count = 1;
                group.first_timestamp = ts;
            }
        }
    }
}

/// Groups `events` with the default 60 s gap and cumulative counting.
pub fn group(events: impl IntoIterator<Item = RawEvent>) -> Grouping {
    EventGrouper::default().group(events)
}
