//! In-memory collaborators recording every call.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use relay_core::traits::{
    EvaluationStore, Evaluator, MessageRetractor, NotificationPayload, NotificationSink,
    NotificationStore, SnapshotSource, SnapshotWriter,
};
use relay_core::{
    DescriptionAssessment, Delivery, Evaluation, EvaluationRecord, Incident, NotificationRecord,
    RecordKey, SyncError,
};
use relay_engine::{Assessment, Reconciler};

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn incident(key: &str, assignee: &str, updated_at: DateTime<Utc>) -> Incident {
    Incident {
        key: key.to_string(),
        title: format!("{key} outage"),
        description: "checkout API returning 500s".to_string(),
        conclusion: String::new(),
        status: "Open".to_string(),
        issue_type: "Incident".to_string(),
        assignee: assignee.to_string(),
        created_at: ts(1_700_000_000),
        updated_at,
        synced_at: Utc::now(),
    }
}

/// Shared ordered log of chat-side calls.
pub type EventLog = Arc<Mutex<Vec<String>>>;

// ── Source ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FixedSource {
    incidents: Mutex<Vec<Incident>>,
    pub fail: AtomicBool,
    pub fetches: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
}

impl FixedSource {
    pub fn set(&self, incidents: Vec<Incident>) {
        *self.incidents.lock().unwrap() = incidents;
    }
}

#[async_trait]
impl SnapshotSource for FixedSource {
    async fn fetch_all(&self) -> Result<Vec<Incident>, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::Tracker("tracker unreachable".into()));
        }
        Ok(self.incidents.lock().unwrap().clone())
    }
}

// ── Sink ────────────────────────────────────────────────────────────

pub struct RecordingSink {
    routes: BTreeMap<String, String>,
    next_id: AtomicUsize,
    /// Message ids currently visible in the channel.
    pub live: Mutex<HashSet<String>>,
    pub sent: Mutex<Vec<NotificationPayload>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_delete: AtomicBool,
    pub fail_send: Mutex<HashSet<String>>,
    pub events: EventLog,
}

impl RecordingSink {
    pub fn new(routes: &[(&str, &str)], events: EventLog) -> Self {
        Self {
            routes: routes
                .iter()
                .map(|(a, c)| (a.to_string(), c.to_string()))
                .collect(),
            next_id: AtomicUsize::new(1),
            live: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_delete: AtomicBool::new(false),
            fail_send: Mutex::new(HashSet::new()),
            events,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageRetractor for RecordingSink {
    async fn delete(&self, route: &str, message_id: &str) -> Result<(), SyncError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("delete {route}/{message_id}"));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(SyncError::Notify("discord unavailable".into()));
        }
        self.live.lock().unwrap().remove(message_id);
        self.deleted.lock().unwrap().push(message_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn route_for(&self, assignee: &str) -> Option<String> {
        self.routes.get(assignee).cloned()
    }

    async fn send(&self, route: &str, payload: &NotificationPayload) -> Result<String, SyncError> {
        let key = &payload.incident.key;
        self.events.lock().unwrap().push(format!("send {route}/{key}"));
        if self.fail_send.lock().unwrap().contains(key) {
            return Err(SyncError::Notify(format!("rejected {key}")));
        }
        let id = format!("msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live.lock().unwrap().insert(id.clone());
        self.sent.lock().unwrap().push(payload.clone());
        Ok(id)
    }
}

// ── Stores ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    pub notifications: Mutex<HashMap<RecordKey, NotificationRecord>>,
    pub evaluations: Mutex<HashMap<String, EvaluationRecord>>,
    pub fail_loads: AtomicBool,
    pub fail_list: AtomicBool,
    pub notification_upserts: AtomicUsize,
    pub evaluation_upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn insert_notification(&self, record: NotificationRecord) {
        self.notifications
            .lock()
            .unwrap()
            .insert(record.key(), record);
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn notification(&self, key: &str, assignee: &str) -> Option<NotificationRecord> {
        self.notifications
            .lock()
            .unwrap()
            .get(&RecordKey::new(key, assignee))
            .cloned()
    }

    pub fn writes(&self) -> usize {
        self.notification_upserts.load(Ordering::SeqCst)
            + self.evaluation_upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn load_notifications(
        &self,
        keys: &[String],
    ) -> Result<HashMap<RecordKey, NotificationRecord>, SyncError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(SyncError::Store("connection refused".into()));
        }
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| keys.contains(&k.incident_key))
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect())
    }

    async fn upsert_notification(&self, delivery: &Delivery) -> Result<(), SyncError> {
        self.notification_upserts.fetch_add(1, Ordering::SeqCst);
        let mut map = self.notifications.lock().unwrap();
        let created_at = map
            .get(&delivery.key())
            .map(|r| r.created_at)
            .unwrap_or(delivery.delivered_at);
        map.insert(
            delivery.key(),
            NotificationRecord {
                incident_key: delivery.incident_key.clone(),
                assignee: delivery.assignee.clone(),
                channel_id: delivery.channel_id.clone(),
                message_id: delivery.message_id.clone(),
                created_at,
                last_notification: delivery.delivered_at,
            },
        );
        Ok(())
    }

    async fn delete_notification(&self, key: &RecordKey) -> Result<bool, SyncError> {
        Ok(self.notifications.lock().unwrap().remove(key).is_some())
    }

    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>, SyncError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(SyncError::Store("connection refused".into()));
        }
        Ok(self.notifications.lock().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn load_evaluations(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, EvaluationRecord>, SyncError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(SyncError::Store("connection refused".into()));
        }
        Ok(self
            .evaluations
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| keys.contains(k))
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect())
    }

    async fn upsert_evaluation(&self, record: &EvaluationRecord) -> Result<(), SyncError> {
        self.evaluation_upserts.fetch_add(1, Ordering::SeqCst);
        self.evaluations
            .lock()
            .unwrap()
            .insert(record.incident_key.clone(), record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySnapshots {
    pub saved: Mutex<HashSet<RecordKey>>,
}

impl MemorySnapshots {
    pub fn preload(&self, incident: &Incident) {
        self.saved.lock().unwrap().insert(incident.record_key());
    }
}

#[async_trait]
impl SnapshotWriter for MemorySnapshots {
    async fn exists(&self, incident: &Incident) -> bool {
        self.saved.lock().unwrap().contains(&incident.record_key())
    }

    async fn save(&self, incident: &Incident) -> Result<(), SyncError> {
        self.saved.lock().unwrap().insert(incident.record_key());
        Ok(())
    }
}

// ── Evaluator ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct StubEvaluator {
    pub calls: AtomicUsize,
    pub fail_for: Mutex<HashSet<String>>,
}

#[async_trait]
impl Evaluator for StubEvaluator {
    async fn evaluate(&self, incident: &Incident) -> Result<Evaluation, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.lock().unwrap().contains(&incident.key) {
            return Err(SyncError::Evaluation("model overloaded".into()));
        }
        Ok(Evaluation {
            description: DescriptionAssessment {
                clarity: "High".into(),
                root_cause: "Identified".into(),
                impact_defined: true,
                score: 82,
                observations: String::new(),
            },
            conclusion: None,
        })
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub source: Arc<FixedSource>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<MemoryStore>,
    pub snapshots: Arc<MemorySnapshots>,
    pub evaluator: Arc<StubEvaluator>,
    pub events: EventLog,
}

pub const ROUTES: &[(&str, &str)] = &[("alice", "chan-alice"), ("bob", "chan-bob")];

impl Harness {
    pub fn new() -> Self {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        Self {
            source: Arc::new(FixedSource::default()),
            sink: Arc::new(RecordingSink::new(ROUTES, Arc::clone(&events))),
            store: Arc::new(MemoryStore::default()),
            snapshots: Arc::new(MemorySnapshots::default()),
            evaluator: Arc::new(StubEvaluator::default()),
            events,
        }
    }

    /// Reconciler using the re-notify interval policy.
    pub fn interval_reconciler(&self, interval: Duration, workers: usize) -> Reconciler {
        self.reconciler(
            Assessment::Disabled {
                renotify_interval: interval,
            },
            workers,
        )
    }

    /// Reconciler with evaluation enabled.
    pub fn evaluating_reconciler(&self, workers: usize) -> Reconciler {
        self.reconciler(
            Assessment::Enabled {
                evaluator: self.evaluator.clone(),
                store: self.store.clone(),
            },
            workers,
        )
    }

    fn reconciler(&self, assessment: Assessment, workers: usize) -> Reconciler {
        Reconciler::new(
            self.source.clone(),
            Arc::clone(&self.sink),
            self.store.clone(),
            self.snapshots.clone(),
            assessment,
            workers,
        )
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}
