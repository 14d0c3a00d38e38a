use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked work item as observed in the upstream tracker.
///
/// Incidents are a read-only mirror: the engine never writes them back.
/// `key` is the join key for every persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub key: String,
    pub title: String,
    pub description: String,
    /// Resolution / conclusion text, empty when the incident has none yet.
    pub conclusion: String,
    pub status: String,
    pub issue_type: String,
    /// Display name of the owner. Empty when unassigned.
    pub assignee: String,
    pub created_at: DateTime<Utc>,
    /// Upstream content version; drives change detection.
    pub updated_at: DateTime<Utc>,
    /// When this process observed the incident.
    pub synced_at: DateTime<Utc>,
}

impl Incident {
    pub fn has_conclusion(&self) -> bool {
        !self.conclusion.trim().is_empty()
    }

    /// Composite key of the notification record owned for this incident.
    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(&self.key, &self.assignee)
    }
}

/// `(incident key, assignee)` pair. At most one live notification exists
/// per pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub incident_key: String,
    pub assignee: String,
}

impl RecordKey {
    pub fn new(incident_key: impl Into<String>, assignee: impl Into<String>) -> Self {
        Self {
            incident_key: incident_key.into(),
            assignee: assignee.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.incident_key, self.assignee)
    }
}

/// Compare two timestamps at one-second resolution.
///
/// The store keeps sub-second precision on some backends and not on others,
/// so equality of upstream versions is always judged on whole seconds.
pub fn same_second(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp() == b.timestamp()
}
