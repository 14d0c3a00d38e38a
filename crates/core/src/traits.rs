//! Collaborator traits the reconciliation engine depends on.
//!
//! Each adapter crate implements one of these against a real backend
//! (Jira, Discord, Gemini, PostgreSQL, local files). The engine only sees
//! the traits, so tests can swap in in-memory doubles.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::evaluation::Evaluation;
use crate::incident::{Incident, RecordKey};
use crate::record::{Delivery, EvaluationRecord, NotificationRecord};

/// Returns the current full set of tracked incidents.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch every incident matching the adapter's filter.
    ///
    /// Must return a consistent full set; pagination is handled inside.
    async fn fetch_all(&self) -> Result<Vec<Incident>, SyncError>;
}

/// Ability to retract a previously delivered message.
#[async_trait]
pub trait MessageRetractor: Send + Sync {
    /// Delete `message_id` from `route`. Deleting an already-gone message
    /// must succeed.
    async fn delete(&self, route: &str, message_id: &str) -> Result<(), SyncError>;
}

/// Content handed to a [`NotificationSink`] for rendering.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub incident: Incident,
    pub evaluation: Option<Evaluation>,
}

/// Chat channel that incident notifications are delivered to.
#[async_trait]
pub trait NotificationSink: MessageRetractor {
    /// Resolve the delivery route for an assignee.
    fn route_for(&self, assignee: &str) -> Option<String>;

    /// Deliver a notification and return the delivered message id.
    async fn send(&self, route: &str, payload: &NotificationPayload) -> Result<String, SyncError>;
}

/// Computes a quality assessment for an incident.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, incident: &Incident) -> Result<Evaluation, SyncError>;
}

/// Persistence of [`NotificationRecord`]s.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Batched lookup of every record whose incident key is in `keys`.
    async fn load_notifications(
        &self,
        keys: &[String],
    ) -> Result<HashMap<RecordKey, NotificationRecord>, SyncError>;

    /// Insert or update the record for the delivery's pair.
    async fn upsert_notification(&self, delivery: &Delivery) -> Result<(), SyncError>;

    /// Delete the record for `key`. Returns whether a row was removed.
    async fn delete_notification(&self, key: &RecordKey) -> Result<bool, SyncError>;

    /// Every persisted record, including ones for incidents no longer tracked.
    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>, SyncError>;
}

/// Persistence of [`EvaluationRecord`]s.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Batched lookup keyed by incident key.
    async fn load_evaluations(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, EvaluationRecord>, SyncError>;

    async fn upsert_evaluation(&self, record: &EvaluationRecord) -> Result<(), SyncError>;
}

/// Local snapshot of first-seen incidents.
#[async_trait]
pub trait SnapshotWriter: Send + Sync {
    /// Whether a snapshot already exists for the incident's key and assignee.
    async fn exists(&self, incident: &Incident) -> bool;

    /// Persist the incident. Existing snapshots are left untouched.
    async fn save(&self, incident: &Incident) -> Result<(), SyncError>;
}
