mod support;

use collect_core::db::SnapshotStore;
use collect_core::domain::{DiffKind, PendingDiff, Severity};
use support::InMemoryStore;

fn pending_diff(current_snapshot_id: i64) -> PendingDiff {
    PendingDiff {
        tenant_id: "tenant-a".to_string(),
        previous_snapshot_id: 1,
        current_snapshot_id,
        kind: DiffKind::Modified,
        field_path: "os.release".to_string(),
        previous_value: Some(serde_json::json!("8.0")),
        current_value: Some(serde_json::json!("8.1")),
        severity: Severity::High,
        category: "os".to_string(),
    }
}

/// Replaying a processing job (the path `diff_worker::run_job` takes after a
/// crash or failure between `insert_diffs` and `mark_processed`) must
/// converge on one set of diff rows rather than appending a second one.
#[tokio::test]
async fn replaying_a_diff_job_does_not_duplicate_rows() {
    let store = InMemoryStore::new();

    // First attempt.
    store.delete_diffs_for_snapshot(2).await.unwrap();
    store.insert_diffs(&[pending_diff(2)]).await.unwrap();
    assert_eq!(store.diff_count(), 1);

    // Simulated replay after a crash before `mark_processed` landed.
    store.delete_diffs_for_snapshot(2).await.unwrap();
    store.insert_diffs(&[pending_diff(2)]).await.unwrap();
    assert_eq!(store.diff_count(), 1);
}

#[tokio::test]
async fn delete_diffs_for_snapshot_only_touches_that_snapshot() {
    let store = InMemoryStore::new();

    store.insert_diffs(&[pending_diff(2), pending_diff(3)]).await.unwrap();
    assert_eq!(store.diff_count(), 2);

    store.delete_diffs_for_snapshot(2).await.unwrap();
    assert_eq!(store.diff_count(), 1);
}
