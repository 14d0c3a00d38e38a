//! Per-cycle state cache.
//!
//! Two batched queries (one per record kind) replace a lookup per incident.
//! The cache is built once before dispatch and only read afterwards, so it
//! is shared with the workers behind an `Arc` without locking.

use std::collections::HashMap;

use relay_core::traits::{EvaluationStore, NotificationStore};
use relay_core::{EvaluationRecord, NotificationRecord, RecordKey};
use tracing::{debug, warn};

/// Immutable lookup tables for one cycle.
#[derive(Debug, Default, Clone)]
pub struct StateCache {
    notifications: HashMap<RecordKey, NotificationRecord>,
    evaluations: HashMap<String, EvaluationRecord>,
    degraded: bool,
}

impl StateCache {
    /// Batch-load every record relevant to `keys`.
    ///
    /// An empty key set issues no query. A failed query is logged and
    /// leaves its table empty, so every incident is treated as due instead
    /// of failing the cycle. `evaluations` is `None` when the evaluation
    /// subsystem is disabled.
    pub async fn load(
        keys: &[String],
        notifications: &dyn NotificationStore,
        evaluations: Option<&dyn EvaluationStore>,
    ) -> Self {
        let mut cache = Self::default();
        if keys.is_empty() {
            return cache;
        }

        match notifications.load_notifications(keys).await {
            Ok(rows) => cache.notifications = rows,
            Err(e) => {
                warn!(error = %e, "failed to load notification cache, treating every incident as due");
                cache.degraded = true;
            }
        }

        if let Some(store) = evaluations {
            match store.load_evaluations(keys).await {
                Ok(rows) => cache.evaluations = rows,
                Err(e) => {
                    warn!(error = %e, "failed to load evaluation cache, re-evaluating every incident");
                    cache.degraded = true;
                }
            }
        }

        debug!(
            keys = keys.len(),
            notifications = cache.notifications.len(),
            evaluations = cache.evaluations.len(),
            "state cache loaded"
        );
        cache
    }

    /// Build a cache from already-known records.
    pub fn from_records(
        notifications: impl IntoIterator<Item = NotificationRecord>,
        evaluations: impl IntoIterator<Item = EvaluationRecord>,
    ) -> Self {
        Self {
            notifications: notifications.into_iter().map(|r| (r.key(), r)).collect(),
            evaluations: evaluations
                .into_iter()
                .map(|r| (r.incident_key.clone(), r))
                .collect(),
            degraded: false,
        }
    }

    pub fn notification(&self, key: &RecordKey) -> Option<&NotificationRecord> {
        self.notifications.get(key)
    }

    pub fn evaluation(&self, incident_key: &str) -> Option<&EvaluationRecord> {
        self.evaluations.get(incident_key)
    }

    /// Whether at least one batch query failed while loading.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.len()
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluations.len()
    }
}
