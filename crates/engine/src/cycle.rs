//! [`Reconciler`]: one fetch → decide → act → cleanup cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use relay_core::traits::{
    EvaluationStore, Evaluator, NotificationSink, NotificationStore, SnapshotSource, SnapshotWriter,
};
use relay_core::{Incident, RecordKey, SyncError};
use tracing::{error, info, warn};

use crate::cache::StateCache;
use crate::cleanup::{retire_missing, Retraction};
use crate::decision::DecisionPolicy;
use crate::dispatcher::{dispatch, DispatchSummary, Outcome, WorkerContext};

// ── Assessment ──────────────────────────────────────────────────────

/// Whether incidents are evaluated before delivery.
///
/// The choice also fixes the decision policy: evaluation staleness when
/// enabled, the re-notify interval otherwise.
#[derive(Clone)]
pub enum Assessment {
    Enabled {
        evaluator: Arc<dyn Evaluator>,
        store: Arc<dyn EvaluationStore>,
    },
    Disabled {
        renotify_interval: Duration,
    },
}

impl Assessment {
    pub fn policy(&self) -> DecisionPolicy {
        match self {
            Assessment::Enabled { .. } => DecisionPolicy::Evaluation,
            Assessment::Disabled { renotify_interval } => {
                DecisionPolicy::RenotifyInterval(*renotify_interval)
            }
        }
    }

    pub fn evaluation_store(&self) -> Option<&dyn EvaluationStore> {
        match self {
            Assessment::Enabled { store, .. } => Some(store.as_ref()),
            Assessment::Disabled { .. } => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Assessment::Enabled { .. })
    }
}

impl std::fmt::Debug for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Assessment::Enabled { .. } => f.write_str("Assessment::Enabled"),
            Assessment::Disabled { renotify_interval } => f
                .debug_struct("Assessment::Disabled")
                .field("renotify_interval", renotify_interval)
                .finish(),
        }
    }
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Ok,
    Degraded,
}

/// Aggregate counts for one finished cycle. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Incidents seen for the first time (snapshot created).
    pub new: usize,
    /// Incidents whose action completed (delivered, evaluated when enabled).
    pub acted: usize,
    pub skipped: usize,
    /// Failed incident actions plus cleanup failures.
    pub errored: usize,
    /// Notification records removed by the cleanup pass.
    pub retired: usize,
    /// A batched cache query failed and every incident was treated as due.
    pub cache_degraded: bool,
    pub duration: Duration,
}

impl CycleReport {
    pub fn status(&self) -> CycleStatus {
        if self.errored == 0 {
            CycleStatus::Ok
        } else {
            CycleStatus::Degraded
        }
    }

    fn tally(summary: &DispatchSummary) -> Self {
        let mut report = Self {
            errored: summary.lost,
            ..Self::default()
        };
        for outcome in &summary.outcomes {
            if outcome.is_new() {
                report.new += 1;
            }
            match outcome.outcome {
                Outcome::Skipped => report.skipped += 1,
                Outcome::Acted => report.acted += 1,
                Outcome::Failed => report.errored += 1,
            }
        }
        report
    }

    /// Emit the single end-of-cycle summary line.
    pub fn log(&self) {
        let duration_ms = self.duration.as_millis() as u64;
        match self.status() {
            CycleStatus::Ok => info!(
                new = self.new,
                acted = self.acted,
                skipped = self.skipped,
                errored = self.errored,
                retired = self.retired,
                cache_degraded = self.cache_degraded,
                duration_ms,
                "sync OK"
            ),
            CycleStatus::Degraded => warn!(
                new = self.new,
                acted = self.acted,
                skipped = self.skipped,
                errored = self.errored,
                retired = self.retired,
                cache_degraded = self.cache_degraded,
                duration_ms,
                "sync DEGRADED"
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// No partial snapshot is trusted, so nothing else runs.
    #[error("failed to fetch incidents: {0}")]
    SourceFetch(#[source] SyncError),
}

// ── Reconciler ──────────────────────────────────────────────────────

/// Owns the collaborators and runs reconciliation cycles.
pub struct Reconciler {
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn NotificationSink>,
    notifications: Arc<dyn NotificationStore>,
    snapshots: Arc<dyn SnapshotWriter>,
    assessment: Assessment,
    retraction: Retraction,
    workers: usize,
}

impl Reconciler {
    /// Build a reconciler whose cleanup pass retracts messages through `sink`.
    pub fn new<S: NotificationSink + 'static>(
        source: Arc<dyn SnapshotSource>,
        sink: Arc<S>,
        notifications: Arc<dyn NotificationStore>,
        snapshots: Arc<dyn SnapshotWriter>,
        assessment: Assessment,
        workers: usize,
    ) -> Self {
        let retraction = Retraction::channel(Arc::clone(&sink));
        Self {
            source,
            sink,
            notifications,
            snapshots,
            assessment,
            retraction,
            workers: workers.max(1),
        }
    }

    /// Override how the cleanup pass retracts messages.
    pub fn with_retraction(mut self, retraction: Retraction) -> Self {
        self.retraction = retraction;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run one full cycle.
    ///
    /// Only a source fetch failure is returned as an error; everything
    /// after the fetch is isolated and counted in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        let now = Utc::now();

        let incidents = self
            .source
            .fetch_all()
            .await
            .map_err(CycleError::SourceFetch)?;

        let active: HashSet<RecordKey> = incidents.iter().map(Incident::record_key).collect();
        let mut keys: Vec<String> = incidents.iter().map(|i| i.key.clone()).collect();
        keys.sort();
        keys.dedup();
        info!(incidents = incidents.len(), "fetched incident snapshot");

        let cache = StateCache::load(
            &keys,
            self.notifications.as_ref(),
            self.assessment.evaluation_store(),
        )
        .await;
        let cache_degraded = cache.is_degraded();

        let ctx = Arc::new(WorkerContext {
            cache: Arc::new(cache),
            sink: Arc::clone(&self.sink),
            notifications: Arc::clone(&self.notifications),
            snapshots: Arc::clone(&self.snapshots),
            assessment: self.assessment.clone(),
            now,
        });
        let summary = dispatch(incidents, ctx, self.workers).await;

        let mut report = CycleReport::tally(&summary);
        report.cache_degraded = cache_degraded;

        match retire_missing(&active, self.notifications.as_ref(), &self.retraction).await {
            Ok(cleanup) => {
                report.retired = cleanup.retired;
                report.errored += cleanup.store_failures;
            }
            Err(e) => {
                error!(error = %e, "cleanup pass failed");
                report.errored += 1;
            }
        }

        report.duration = started.elapsed();
        Ok(report)
    }

    /// Run one cycle and log its outcome. Returns the report when the fetch
    /// succeeded.
    pub async fn run_and_log(&self) -> Option<CycleReport> {
        match self.run_cycle().await {
            Ok(report) => {
                report.log();
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "sync cycle aborted");
                None
            }
        }
    }
}
