use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use relay_core::{DescriptionAssessment, Evaluation, EvaluationRecord, NotificationRecord};
use relay_engine::CycleStatus;

use crate::mocks::{incident, ts, Harness};

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn never_seen_incident_is_created_and_notified() {
    let h = Harness::new();
    h.source.set(vec![incident("INC-1", "alice", ts(1_700_000_100))]);

    let report = h.interval_reconciler(HOUR, 3).run_cycle().await.unwrap();

    assert_eq!(report.new, 1);
    assert_eq!(report.acted, 1);
    assert_eq!(report.errored, 0);
    assert_eq!(report.status(), CycleStatus::Ok);
    assert_eq!(h.sink.sent_count(), 1);
    assert_eq!(h.store.notification_count(), 1);
    assert_eq!(h.snapshots.saved.lock().unwrap().len(), 1);

    let record = h.store.notification("INC-1", "alice").unwrap();
    assert_eq!(record.channel_id, "chan-alice");
    assert_eq!(record.message_id, "msg-1");
}

#[tokio::test]
async fn recently_notified_incident_is_skipped_without_writes() {
    let h = Harness::new();
    let inc = incident("INC-1", "alice", ts(1_700_000_100));
    h.snapshots.preload(&inc);
    let five_min_ago = Utc::now() - chrono::Duration::minutes(5);
    h.store.insert_notification(NotificationRecord {
        incident_key: "INC-1".into(),
        assignee: "alice".into(),
        channel_id: "chan-alice".into(),
        message_id: "msg-old".into(),
        created_at: five_min_ago,
        last_notification: five_min_ago,
    });
    h.source.set(vec![inc]);

    let report = h.interval_reconciler(HOUR, 3).run_cycle().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.acted, 0);
    assert_eq!(h.sink.sent_count(), 0);
    assert_eq!(h.store.writes(), 0);
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn elapsed_interval_replaces_the_live_message() {
    let h = Harness::new();
    let inc = incident("INC-1", "alice", ts(1_700_000_100));
    h.snapshots.preload(&inc);
    let two_hours_ago = Utc::now() - chrono::Duration::hours(2);
    h.store.insert_notification(NotificationRecord {
        incident_key: "INC-1".into(),
        assignee: "alice".into(),
        channel_id: "chan-alice".into(),
        message_id: "msg-old".into(),
        created_at: two_hours_ago,
        last_notification: two_hours_ago,
    });
    h.source.set(vec![inc]);

    let report = h.interval_reconciler(HOUR, 1).run_cycle().await.unwrap();

    assert_eq!(report.acted, 1);
    assert_eq!(
        h.events(),
        vec!["delete chan-alice/msg-old".to_string(), "send chan-alice/INC-1".to_string()]
    );
    let record = h.store.notification("INC-1", "alice").unwrap();
    assert_eq!(record.message_id, "msg-1");
    assert_eq!(record.created_at, two_hours_ago);
    assert!(record.last_notification > two_hours_ago);
}

#[tokio::test]
async fn repeated_cycles_keep_one_record_and_one_live_message() {
    let h = Harness::new();
    h.source.set(vec![
        incident("INC-1", "alice", ts(1_700_000_100)),
        incident("INC-2", "bob", ts(1_700_000_200)),
    ]);
    let reconciler = h.evaluating_reconciler(3);

    for _ in 0..3 {
        reconciler.run_cycle().await.unwrap();
    }
    assert_eq!(h.store.notification_count(), 2);
    assert_eq!(h.sink.live_count(), 2);
    assert_eq!(h.sink.sent_count(), 2);
    assert_eq!(h.evaluator.calls.load(Ordering::SeqCst), 2);

    // Upstream edit of INC-1 only.
    h.source.set(vec![
        incident("INC-1", "alice", ts(1_700_000_900)),
        incident("INC-2", "bob", ts(1_700_000_200)),
    ]);
    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.acted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.store.notification_count(), 2);
    assert_eq!(h.sink.live_count(), 2);
    assert_eq!(h.evaluator.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn subsecond_upstream_change_is_not_stale() {
    let h = Harness::new();
    let reconciler = h.evaluating_reconciler(2);
    h.source.set(vec![incident("INC-1", "alice", ts(1_700_000_100))]);
    reconciler.run_cycle().await.unwrap();

    let nudged = ts(1_700_000_100) + chrono::Duration::milliseconds(400);
    h.source.set(vec![incident("INC-1", "alice", nudged)]);
    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(h.sink.sent_count(), 1);
}

#[tokio::test]
async fn evaluation_is_recorded_against_upstream_version() {
    let h = Harness::new();
    h.source.set(vec![incident("INC-7", "bob", ts(1_700_000_700))]);

    h.evaluating_reconciler(1).run_cycle().await.unwrap();

    let evaluations = h.store.evaluations.lock().unwrap();
    let record = evaluations.get("INC-7").unwrap();
    assert_eq!(record.source_updated_at, ts(1_700_000_700));
    assert_eq!(record.evaluation.description.score, 82);

    let sent = h.sink.sent.lock().unwrap();
    assert!(sent[0].evaluation.is_some());
}

#[tokio::test]
async fn snapshot_without_evaluation_or_record_is_first_notify() {
    let h = Harness::new();
    let inc = incident("INC-3", "alice", ts(1_700_000_300));
    h.snapshots.preload(&inc);
    h.source.set(vec![inc]);

    let report = h.evaluating_reconciler(1).run_cycle().await.unwrap();

    assert_eq!(report.new, 0);
    assert_eq!(report.acted, 1);
    // No prior record, nothing to retract.
    assert_eq!(h.events(), vec!["send chan-alice/INC-3".to_string()]);
}

#[tokio::test]
async fn fresh_cached_evaluation_without_record_is_delivered() {
    let h = Harness::new();
    let inc = incident("INC-4", "alice", ts(1_700_000_400));
    h.snapshots.preload(&inc);
    h.store.evaluations.lock().unwrap().insert(
        "INC-4".into(),
        EvaluationRecord {
            incident_key: "INC-4".into(),
            source_updated_at: ts(1_700_000_400),
            evaluation: Evaluation {
                description: DescriptionAssessment {
                    clarity: "Low".into(),
                    root_cause: "Missing".into(),
                    impact_defined: false,
                    score: 20,
                    observations: String::new(),
                },
                conclusion: None,
            },
            evaluated_at: ts(1_700_000_500),
        },
    );
    h.source.set(vec![inc]);

    let report = h.evaluating_reconciler(1).run_cycle().await.unwrap();

    assert_eq!(report.skipped, 0);
    assert_eq!(report.acted, 1);
    assert_eq!(h.evaluator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.events(), vec!["send chan-alice/INC-4".to_string()]);
    assert!(h.store.notification("INC-4", "alice").is_some());
}

#[tokio::test]
async fn returning_unchanged_incident_is_delivered_again() {
    let h = Harness::new();
    let reconciler = h.evaluating_reconciler(2);
    let inc = incident("INC-1", "alice", ts(1_700_000_100));

    h.source.set(vec![inc.clone()]);
    reconciler.run_cycle().await.unwrap();

    h.source.set(Vec::new());
    let report = reconciler.run_cycle().await.unwrap();
    assert_eq!(report.retired, 1);
    assert_eq!(h.sink.live_count(), 0);

    h.source.set(vec![inc]);
    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.acted, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(h.store.notification_count(), 1);
    assert_eq!(h.sink.live_count(), 1);
}

#[tokio::test]
async fn every_incident_is_processed_exactly_once() {
    let h = Harness::new();
    let incidents: Vec<_> = (0..40)
        .map(|i| {
            let assignee = if i % 2 == 0 { "alice" } else { "bob" };
            incident(&format!("INC-{i}"), assignee, ts(1_700_000_000 + i))
        })
        .collect();
    h.source.set(incidents);

    let report = h.interval_reconciler(HOUR, 5).run_cycle().await.unwrap();

    assert_eq!(report.new, 40);
    assert_eq!(report.acted, 40);
    assert_eq!(h.sink.sent_count(), 40);
    assert_eq!(h.store.notification_count(), 40);
}

#[tokio::test]
async fn empty_snapshot_is_a_clean_cycle() {
    let h = Harness::new();
    let report = h.interval_reconciler(HOUR, 3).run_cycle().await.unwrap();
    assert_eq!(report, relay_engine::CycleReport {
        duration: report.duration,
        ..Default::default()
    });
}
