//! Bounded worker pool applying one [`Action`] per incident.
//!
//! The whole snapshot is enqueued up front on a queue sized to the
//! snapshot, then `W` workers pull until it is drained. Each worker reports
//! an [`IncidentOutcome`] on a results channel that closes once every
//! worker has dropped its sender.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_core::traits::{NotificationPayload, NotificationSink, NotificationStore, SnapshotWriter};
use relay_core::{Delivery, EvaluationRecord, Incident, NotificationRecord, SyncError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::StateCache;
use crate::cycle::Assessment;
use crate::decision::{decide, Action, DecisionContext};

/// Everything a worker reads while processing incidents.
///
/// Built once per cycle; nothing in here is mutated after dispatch starts.
pub struct WorkerContext {
    pub cache: Arc<StateCache>,
    pub sink: Arc<dyn NotificationSink>,
    pub notifications: Arc<dyn NotificationStore>,
    pub snapshots: Arc<dyn SnapshotWriter>,
    pub assessment: Assessment,
    /// Cycle start time, used for every decision in the cycle.
    pub now: DateTime<Utc>,
}

/// How one incident ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Acted,
    Failed,
}

#[derive(Debug, Clone)]
pub struct IncidentOutcome {
    pub incident_key: String,
    pub action: Action,
    pub outcome: Outcome,
}

impl IncidentOutcome {
    /// First sighting of the incident (snapshot persisted this cycle).
    pub fn is_new(&self) -> bool {
        self.action == Action::CreateAndNotify
    }
}

/// Aggregated pool output.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub outcomes: Vec<IncidentOutcome>,
    /// Incidents whose worker died before reporting an outcome.
    pub lost: usize,
}

/// Why an incident's action was aborted.
#[derive(Debug, thiserror::Error)]
enum ActionError {
    #[error("evaluation failed: {0}")]
    Evaluate(SyncError),
    #[error("{0}")]
    NoRoute(SyncError),
    #[error("delivery failed: {0}")]
    Send(SyncError),
}

/// Run every incident through the worker pool and collect the outcomes.
///
/// `workers` is clamped to at least one. Returns only after all workers
/// have finished.
pub async fn dispatch(
    incidents: Vec<Incident>,
    ctx: Arc<WorkerContext>,
    workers: usize,
) -> DispatchSummary {
    let total = incidents.len();
    if total == 0 {
        return DispatchSummary::default();
    }

    let (job_tx, job_rx) = mpsc::channel::<Incident>(total);
    for incident in incidents {
        // Capacity equals the snapshot length, so this never reports Full.
        if let Err(e) = job_tx.try_send(incident) {
            error!(error = %e, "failed to enqueue incident");
        }
    }
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<IncidentOutcome>(total);

    let mut pool = JoinSet::new();
    for worker_id in 0..workers.max(1) {
        let jobs = Arc::clone(&job_rx);
        let results = result_tx.clone();
        let ctx = Arc::clone(&ctx);
        pool.spawn(async move {
            loop {
                let next = jobs.lock().await.recv().await;
                let Some(incident) = next else { break };
                let outcome = process_incident(&ctx, incident).await;
                if results.send(outcome).await.is_err() {
                    break;
                }
            }
            debug!(worker_id, "worker finished");
        });
    }
    drop(result_tx);

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "worker task aborted");
        }
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = result_rx.recv().await {
        outcomes.push(outcome);
    }

    let lost = total.saturating_sub(outcomes.len());
    if lost > 0 {
        error!(lost, "incidents lost to aborted workers");
    }
    DispatchSummary { outcomes, lost }
}

async fn process_incident(ctx: &WorkerContext, incident: Incident) -> IncidentOutcome {
    let existing = ctx.cache.notification(&incident.record_key());
    let cached_eval = ctx.cache.evaluation(&incident.key);
    let has_snapshot = ctx.snapshots.exists(&incident).await;

    let action = decide(
        &incident,
        existing,
        cached_eval,
        &DecisionContext {
            now: ctx.now,
            has_snapshot,
            policy: ctx.assessment.policy(),
        },
    );

    let report = |outcome| IncidentOutcome {
        incident_key: incident.key.clone(),
        action,
        outcome,
    };

    if action.is_skip() {
        debug!(incident = %incident.key, "unchanged, skipping");
        return report(Outcome::Skipped);
    }

    if action == Action::CreateAndNotify {
        if let Err(e) = ctx.snapshots.save(&incident).await {
            error!(incident = %incident.key, error = %e, "failed to save incident snapshot");
        }
        info!(incident = %incident.key, assignee = %incident.assignee, "new incident");
    } else {
        info!(
            incident = %incident.key,
            assignee = %incident.assignee,
            action = action.label(),
            "incident due"
        );
    }

    match apply(ctx, &incident, existing).await {
        Ok(()) => report(Outcome::Acted),
        Err(e) => {
            error!(incident = %incident.key, error = %e, "incident action failed");
            report(Outcome::Failed)
        }
    }
}

/// Evaluate, retract the previous message, deliver, then record.
///
/// The old message is deleted before the replacement is sent so at most one
/// message per incident is ever live. Only evaluation, routing and delivery
/// abort the action; retraction and persistence failures are warnings.
async fn apply(
    ctx: &WorkerContext,
    incident: &Incident,
    existing: Option<&NotificationRecord>,
) -> Result<(), ActionError> {
    let evaluation = match &ctx.assessment {
        Assessment::Enabled { evaluator, .. } => Some(
            evaluator
                .evaluate(incident)
                .await
                .map_err(ActionError::Evaluate)?,
        ),
        Assessment::Disabled { .. } => None,
    };

    let route = ctx
        .sink
        .route_for(&incident.assignee)
        .ok_or_else(|| ActionError::NoRoute(SyncError::NoRoute(incident.assignee.clone())))?;

    if let Some(previous) = existing {
        if let Err(e) = ctx.sink.delete(&previous.channel_id, &previous.message_id).await {
            warn!(
                incident = %incident.key,
                message_id = %previous.message_id,
                error = %e,
                "failed to delete previous message"
            );
        }
    }

    let payload = NotificationPayload {
        incident: incident.clone(),
        evaluation,
    };
    let message_id = ctx
        .sink
        .send(&route, &payload)
        .await
        .map_err(ActionError::Send)?;

    let delivery = Delivery {
        incident_key: incident.key.clone(),
        assignee: incident.assignee.clone(),
        channel_id: route,
        message_id,
        delivered_at: Utc::now(),
    };
    if let Err(e) = ctx.notifications.upsert_notification(&delivery).await {
        warn!(incident = %incident.key, error = %e, "failed to record delivered message");
    }

    if let (Assessment::Enabled { store, .. }, Some(evaluation)) = (&ctx.assessment, &payload.evaluation) {
        let record = EvaluationRecord {
            incident_key: incident.key.clone(),
            source_updated_at: incident.updated_at,
            evaluation: evaluation.clone(),
            evaluated_at: delivery.delivered_at,
        };
        if let Err(e) = store.upsert_evaluation(&record).await {
            warn!(incident = %incident.key, error = %e, "failed to cache evaluation");
        }
        info!(incident = %incident.key, score = %evaluation.score_label(), "evaluation delivered");
    } else {
        info!(incident = %incident.key, "notification delivered");
    }

    Ok(())
}
