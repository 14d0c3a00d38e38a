use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluation::Evaluation;
use crate::incident::{same_second, RecordKey};

/// The currently-live delivered message for an `(incident, assignee)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub incident_key: String,
    pub assignee: String,
    /// Route (chat channel id) the message was delivered to.
    pub channel_id: String,
    pub message_id: String,
    pub created_at: DateTime<Utc>,
    pub last_notification: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.incident_key, &self.assignee)
    }
}

/// A successful delivery, written back as an upsert of the
/// [`NotificationRecord`] for the same pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub incident_key: String,
    pub assignee: String,
    pub channel_id: String,
    pub message_id: String,
    pub delivered_at: DateTime<Utc>,
}

impl Delivery {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.incident_key, &self.assignee)
    }
}

/// Cached evaluation, keyed by the upstream content version it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub incident_key: String,
    /// The incident's `updated_at` at evaluation time.
    pub source_updated_at: DateTime<Utc>,
    pub evaluation: Evaluation,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    /// Fresh iff the stored upstream version matches `updated_at` to the second.
    pub fn is_fresh_for(&self, updated_at: DateTime<Utc>) -> bool {
        same_second(self.source_updated_at, updated_at)
    }
}
