//! Convergence pass: retire notifications for incidents that left the
//! tracked set or moved to another assignee.

use std::collections::HashSet;
use std::sync::Arc;

use relay_core::traits::{MessageRetractor, NotificationStore};
use relay_core::{RecordKey, SyncError};
use tracing::{debug, info, warn};

/// How stale messages get removed from the chat side.
#[derive(Clone)]
pub enum Retraction {
    /// Delete the live message, then the record.
    Channel(Arc<dyn MessageRetractor>),
    /// No retraction capability: only the record is removed.
    StoreOnly,
}

impl Retraction {
    pub fn channel<R: MessageRetractor + 'static>(retractor: Arc<R>) -> Self {
        Retraction::Channel(retractor)
    }
}

impl std::fmt::Debug for Retraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Retraction::Channel(_) => f.write_str("Retraction::Channel"),
            Retraction::StoreOnly => f.write_str("Retraction::StoreOnly"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Records deleted from the store.
    pub retired: usize,
    /// Chat deletions that failed; the record was removed anyway.
    pub retract_failures: usize,
    /// Records that could not be deleted and will be retried next cycle.
    pub store_failures: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("failed to list notification records: {0}")]
    ListFailed(#[source] SyncError),
}

/// Remove every record whose `(incident, assignee)` pair is not in `active`.
///
/// A reassigned incident keeps its key but changes pair, so the previous
/// owner's record and message are retired as superseded.
///
/// A failed chat deletion is logged and the record is still removed, so a
/// vanished incident never keeps a record alive. A failed record deletion
/// leaves the record for the next cycle.
pub async fn retire_missing(
    active: &HashSet<RecordKey>,
    store: &dyn NotificationStore,
    retraction: &Retraction,
) -> Result<CleanupReport, CleanupError> {
    let records = store
        .list_notifications()
        .await
        .map_err(CleanupError::ListFailed)?;

    let mut report = CleanupReport::default();
    for record in records.iter().filter(|r| !active.contains(&r.key())) {
        if let Retraction::Channel(retractor) = retraction {
            if let Err(e) = retractor.delete(&record.channel_id, &record.message_id).await {
                warn!(
                    incident = %record.incident_key,
                    message_id = %record.message_id,
                    error = %e,
                    "failed to delete message for retired notification"
                );
                report.retract_failures += 1;
            }
        }

        match store.delete_notification(&record.key()).await {
            Ok(removed) => {
                if removed {
                    report.retired += 1;
                }
                debug!(incident = %record.incident_key, assignee = %record.assignee, "record retired");
            }
            Err(e) => {
                warn!(incident = %record.incident_key, error = %e, "failed to delete notification record");
                report.store_failures += 1;
            }
        }
    }

    if report.retired > 0 || report.store_failures > 0 {
        info!(
            retired = report.retired,
            retract_failures = report.retract_failures,
            store_failures = report.store_failures,
            "cleanup finished"
        );
    }
    Ok(report)
}
