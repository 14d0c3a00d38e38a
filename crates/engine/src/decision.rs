//! Pure per-incident decision function.
//!
//! [`decide`] has no hidden inputs: the current time, snapshot existence
//! and policy all arrive through [`DecisionContext`], so identical inputs
//! always produce the same [`Action`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use relay_core::{EvaluationRecord, Incident, NotificationRecord};

/// What a worker should do for one incident this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Nothing changed since the last processed state.
    Skip,
    /// First sighting: persist the local snapshot, then notify.
    CreateAndNotify,
    /// Snapshot exists but no notification was ever recorded for the pair.
    FirstNotify,
    /// Upstream content changed (or the re-notify interval elapsed):
    /// re-evaluate and replace the live message.
    ReEvaluateAndRenotify,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Skip => "skip",
            Action::CreateAndNotify => "create_and_notify",
            Action::FirstNotify => "first_notify",
            Action::ReEvaluateAndRenotify => "re_evaluate_and_renotify",
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Action::Skip)
    }
}

/// Which signal decides that an incident is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPolicy {
    /// Evaluation subsystem enabled: due iff the cached evaluation is stale
    /// or no message is live for the pair. The re-notify interval is never
    /// consulted.
    Evaluation,
    /// No evaluation subsystem: due once the interval has elapsed since the
    /// last notification (inclusive).
    RenotifyInterval(Duration),
}

/// Explicit inputs to [`decide`] besides the incident and cached records.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext {
    pub now: DateTime<Utc>,
    /// Whether a local snapshot already exists for the incident.
    pub has_snapshot: bool,
    pub policy: DecisionPolicy,
}

/// Decide the action for one incident given its cached state.
pub fn decide(
    incident: &Incident,
    notification: Option<&NotificationRecord>,
    evaluation: Option<&EvaluationRecord>,
    ctx: &DecisionContext,
) -> Action {
    match ctx.policy {
        DecisionPolicy::Evaluation => {
            let fresh = evaluation.is_some_and(|cached| cached.is_fresh_for(incident.updated_at));
            match notification {
                // A fresh evaluation only skips while its message is live.
                Some(_) if fresh => Action::Skip,
                _ if !ctx.has_snapshot => Action::CreateAndNotify,
                None => Action::FirstNotify,
                Some(_) => Action::ReEvaluateAndRenotify,
            }
        }
        DecisionPolicy::RenotifyInterval(interval) => {
            if !ctx.has_snapshot {
                return Action::CreateAndNotify;
            }
            match notification {
                None => Action::FirstNotify,
                Some(record) if renotify_due(record.last_notification, ctx.now, interval) => {
                    Action::ReEvaluateAndRenotify
                }
                Some(_) => Action::Skip,
            }
        }
    }
}

/// `now - last >= interval`, inclusive at equality.
pub fn renotify_due(last: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> bool {
    let interval = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());
    now.signed_duration_since(last) >= interval
}
