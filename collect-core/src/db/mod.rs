pub mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DiffRecord, HeartbeatRow, PendingDiff, PendingSnapshot, Severity, Snapshot, SystemRecord};
use crate::error::Result;

/// Persistence boundary consumed by the Batch Persister, the Diff Engine,
/// the Cleanup Worker, and the Heartbeat Store. Owns `Snapshot`s,
/// `DiffRecord`s, and `HeartbeatRow`s for the lifetime of the process.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Upsert a batch of submissions in a single transaction, keyed on
    /// `(tenant_id, payload_hash)`. On conflict, `captured_at` is advanced
    /// and `payload_size` is preserved from the original row. Returns the
    /// canonical row id and whether the row was newly inserted, one entry
    /// per input, in input order.
    async fn upsert_batch(&self, batch: &[PendingSnapshot]) -> Result<Vec<UpsertOutcome>>;

    /// The most-recently-captured snapshot for a tenant with id less than
    /// `before_id`, if any.
    async fn previous_snapshot(
        &self,
        tenant_id: &str,
        before_id: i64,
    ) -> Result<Option<Snapshot>>;

    async fn get_snapshot(&self, id: i64) -> Result<Option<Snapshot>>;

    /// Stamp `processed_at`, `has_changes`, and `change_count` after a
    /// successful diff computation. Idempotent: calling twice with the same
    /// values is harmless; `processed_at` being `NULL` is what marks a
    /// processing job repeatable after a failure.
    async fn mark_processed(
        &self,
        snapshot_id: i64,
        has_changes: bool,
        change_count: i32,
    ) -> Result<()>;

    /// Insert diffs in sub-batches of at most 100, inside a transaction.
    async fn insert_diffs(&self, diffs: &[PendingDiff]) -> Result<Vec<DiffRecord>>;

    /// Delete any diff rows already recorded against `current_snapshot_id`.
    ///
    /// Called at the start of a (re)diff so a replay after a crash or
    /// failure between `insert_diffs` and `mark_processed` converges on one
    /// set of diff rows instead of appending a duplicate set each attempt.
    async fn delete_diffs_for_snapshot(&self, current_snapshot_id: i64) -> Result<()>;

    /// Delete snapshots older than `before` that are not among the
    /// `keep_most_recent` newest rows for their tenant. Returns the number
    /// of rows deleted.
    async fn delete_aged_snapshots(
        &self,
        before: DateTime<Utc>,
        keep_most_recent: usize,
    ) -> Result<u64>;

    /// Delete diffs older than `before` with the given severities.
    async fn delete_aged_diffs(
        &self,
        before: DateTime<Utc>,
        severities: &[Severity],
    ) -> Result<u64>;

    async fn upsert_heartbeat(&self, tenant_system_id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn get_heartbeat(&self, tenant_system_id: &str) -> Result<Option<HeartbeatRow>>;

    /// Best-effort maintenance hint (e.g. `ANALYZE`); failures are logged
    /// and ignored by the caller.
    async fn run_maintenance_hint(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct UpsertOutcome {
    pub snapshot_id: i64,
    pub newly_inserted: bool,
}

/// System registry consulted by the Auth Gate on every request.
#[async_trait]
pub trait SystemStore: Send + Sync {
    async fn get_system(&self, system_id: &str) -> Result<Option<SystemRecord>>;

    /// Register a new system. Errors if `system_id` is already taken.
    async fn create_system(
        &self,
        system_id: &str,
        tenant_id: &str,
        system_secret_hash: &str,
    ) -> Result<SystemRecord>;
}
