use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use relay_core::NotificationRecord;
use relay_engine::{CycleError, CycleStatus};

use crate::mocks::{incident, ts, Harness};

const HOUR: Duration = Duration::from_secs(3600);

fn stale_record(key: &str, assignee: &str, message_id: &str) -> NotificationRecord {
    let then = Utc::now() - chrono::Duration::hours(3);
    NotificationRecord {
        incident_key: key.into(),
        assignee: assignee.into(),
        channel_id: format!("chan-{assignee}"),
        message_id: message_id.into(),
        created_at: then,
        last_notification: then,
    }
}

#[tokio::test]
async fn source_failure_aborts_before_cleanup() {
    let h = Harness::new();
    h.store.insert_notification(stale_record("INC-1", "alice", "msg-1"));
    h.source.fail.store(true, Ordering::SeqCst);

    let err = h.interval_reconciler(HOUR, 2).run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::SourceFetch(_)));
    assert_eq!(h.store.notification_count(), 1);
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn failed_cache_load_treats_every_incident_as_due() {
    let h = Harness::new();
    let incidents = vec![
        incident("INC-1", "alice", ts(1_700_000_100)),
        incident("INC-2", "bob", ts(1_700_000_200)),
    ];
    for inc in &incidents {
        h.snapshots.preload(inc);
    }
    let recent = Utc::now();
    h.store.insert_notification(NotificationRecord {
        last_notification: recent,
        ..stale_record("INC-1", "alice", "msg-1")
    });
    h.store.fail_loads.store(true, Ordering::SeqCst);
    h.source.set(incidents);

    let report = h.interval_reconciler(HOUR, 2).run_cycle().await.unwrap();

    assert!(report.cache_degraded);
    assert_eq!(report.acted, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.status(), CycleStatus::Ok);
}

#[tokio::test]
async fn delete_failure_does_not_block_replacement() {
    let h = Harness::new();
    let inc = incident("INC-1", "alice", ts(1_700_000_100));
    h.snapshots.preload(&inc);
    h.store.insert_notification(stale_record("INC-1", "alice", "msg-old"));
    h.sink.fail_delete.store(true, Ordering::SeqCst);
    h.source.set(vec![inc]);

    let report = h.interval_reconciler(HOUR, 1).run_cycle().await.unwrap();

    assert_eq!(report.acted, 1);
    assert_eq!(report.errored, 0);
    assert_eq!(
        h.events(),
        vec!["delete chan-alice/msg-old".to_string(), "send chan-alice/INC-1".to_string()]
    );
    assert_eq!(h.store.notification("INC-1", "alice").unwrap().message_id, "msg-1");
}

#[tokio::test]
async fn send_failure_keeps_the_previous_record() {
    let h = Harness::new();
    let inc = incident("INC-1", "alice", ts(1_700_000_100));
    h.snapshots.preload(&inc);
    h.store.insert_notification(stale_record("INC-1", "alice", "msg-old"));
    h.sink.fail_send.lock().unwrap().insert("INC-1".into());
    h.source.set(vec![inc, incident("INC-2", "bob", ts(1_700_000_200))]);

    let report = h.interval_reconciler(HOUR, 2).run_cycle().await.unwrap();

    assert_eq!(report.errored, 1);
    assert_eq!(report.acted, 1);
    assert_eq!(report.status(), CycleStatus::Degraded);
    assert_eq!(h.store.notification("INC-1", "alice").unwrap().message_id, "msg-old");
    assert!(h.store.notification("INC-2", "bob").is_some());
}

#[tokio::test]
async fn missing_route_is_an_isolated_error() {
    let h = Harness::new();
    h.source.set(vec![
        incident("INC-1", "carol", ts(1_700_000_100)),
        incident("INC-2", "alice", ts(1_700_000_200)),
    ]);

    let report = h.interval_reconciler(HOUR, 2).run_cycle().await.unwrap();

    assert_eq!(report.new, 2);
    assert_eq!(report.errored, 1);
    assert_eq!(report.acted, 1);
    assert!(h.store.notification("INC-1", "carol").is_none());
    // The snapshot is still written for the unroutable incident.
    assert_eq!(h.snapshots.saved.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn evaluation_failure_leaves_previous_message_live() {
    let h = Harness::new();
    let inc = incident("INC-1", "alice", ts(1_700_000_100));
    h.snapshots.preload(&inc);
    h.store.insert_notification(stale_record("INC-1", "alice", "msg-old"));
    h.sink.live.lock().unwrap().insert("msg-old".into());
    h.evaluator.fail_for.lock().unwrap().insert("INC-1".into());
    h.source.set(vec![inc]);

    let report = h.evaluating_reconciler(1).run_cycle().await.unwrap();

    assert_eq!(report.errored, 1);
    assert!(h.events().is_empty());
    assert!(h.sink.live.lock().unwrap().contains("msg-old"));
    assert!(h.store.evaluations.lock().unwrap().is_empty());
}
