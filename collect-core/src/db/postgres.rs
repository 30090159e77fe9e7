use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use super::{SnapshotStore, SystemStore, UpsertOutcome};
use crate::domain::{DiffRecord, HeartbeatRow, PendingDiff, PendingSnapshot, Severity, Snapshot, SystemRecord};
use crate::error::{CollectError, Result};

/// Postgres-backed persistence for snapshots, diffs, and heartbeats.
///
/// Every acquisition is tied to the pool's own acquire timeout; connections
/// are released on all exit paths by virtue of RAII `PoolConnection` guards,
/// matching the bounded-pool policy in the concurrency model.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(2);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await
            .map_err(|err| {
                CollectError::PersistenceFailure(format!("database connection failed: {err}"))
            })?;

        info!(max_connections, min_connections, "postgres pool initialized");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| CollectError::PersistenceFailure(format!("migration failed: {err}")))?;
        Ok(())
    }

    fn row_to_snapshot(row: &PgRow) -> sqlx::Result<Snapshot> {
        Ok(Snapshot {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            captured_at: row.try_get("captured_at")?,
            payload: row.try_get("payload")?,
            payload_hash: row.try_get("payload_hash")?,
            payload_size: row.try_get("payload_size")?,
            processed_at: row.try_get("processed_at")?,
            has_changes: row.try_get("has_changes")?,
            change_count: row.try_get("change_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_diff(row: &PgRow) -> sqlx::Result<DiffRecord> {
        Ok(DiffRecord {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            previous_snapshot_id: row.try_get("previous_id")?,
            current_snapshot_id: row.try_get("current_id")?,
            kind: row.try_get("kind")?,
            field_path: row.try_get("field_path")?,
            previous_value: row.try_get("previous_value")?,
            current_value: row.try_get("current_value")?,
            severity: row.try_get("severity")?,
            category: row.try_get("category")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl SnapshotStore for PostgresStore {
    async fn upsert_batch(&self, batch: &[PendingSnapshot]) -> Result<Vec<UpsertOutcome>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(batch.len());

        for item in batch {
            let row = sqlx::query(
                r#"
                INSERT INTO snapshots
                    (tenant_id, captured_at, payload, payload_hash, payload_size, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, now(), now())
                ON CONFLICT (tenant_id, payload_hash) DO UPDATE
                    SET captured_at = EXCLUDED.captured_at,
                        updated_at = now()
                RETURNING id, (xmax = 0) AS newly_inserted
                "#,
            )
            .bind(&item.tenant_id)
            .bind(item.captured_at)
            .bind(&item.payload)
            .bind(&item.payload_hash)
            .bind(item.payload_size)
            .fetch_one(&mut *tx)
            .await?;

            outcomes.push(UpsertOutcome {
                snapshot_id: row.try_get("id")?,
                newly_inserted: row.try_get("newly_inserted")?,
            });
        }

        tx.commit().await?;
        Ok(outcomes)
    }

    async fn previous_snapshot(&self, tenant_id: &str, before_id: i64) -> Result<Option<Snapshot>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM snapshots
            WHERE tenant_id = $1 AND id < $2
            ORDER BY captured_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(before_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_snapshot).transpose().map_err(Into::into)
    }

    async fn get_snapshot(&self, id: i64) -> Result<Option<Snapshot>> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_snapshot).transpose().map_err(Into::into)
    }

    async fn mark_processed(
        &self,
        snapshot_id: i64,
        has_changes: bool,
        change_count: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE snapshots
            SET processed_at = now(), has_changes = $2, change_count = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(snapshot_id)
        .bind(has_changes)
        .bind(change_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_diffs(&self, diffs: &[PendingDiff]) -> Result<Vec<DiffRecord>> {
        if diffs.is_empty() {
            return Ok(Vec::new());
        }

        let mut inserted = Vec::with_capacity(diffs.len());
        let mut tx = self.pool.begin().await?;

        for chunk in diffs.chunks(100) {
            for diff in chunk {
                let row = sqlx::query(
                    r#"
                    INSERT INTO diffs
                        (tenant_id, previous_id, current_id, kind, field_path,
                         previous_value, current_value, severity, category, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
                    RETURNING *
                    "#,
                )
                .bind(&diff.tenant_id)
                .bind(diff.previous_snapshot_id)
                .bind(diff.current_snapshot_id)
                .bind(diff.kind)
                .bind(&diff.field_path)
                .bind(&diff.previous_value)
                .bind(&diff.current_value)
                .bind(diff.severity)
                .bind(&diff.category)
                .fetch_one(&mut *tx)
                .await?;

                inserted.push(Self::row_to_diff(&row)?);
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn delete_diffs_for_snapshot(&self, current_snapshot_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM diffs WHERE current_id = $1")
            .bind(current_snapshot_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_aged_snapshots(
        &self,
        before: DateTime<Utc>,
        keep_most_recent: usize,
    ) -> Result<u64> {
        let keep = keep_most_recent as i64;
        let result = sqlx::query(
            r#"
            WITH ranked AS (
                SELECT id, tenant_id, captured_at,
                       row_number() OVER (
                           PARTITION BY tenant_id ORDER BY captured_at DESC, id DESC
                       ) AS rn
                FROM snapshots
            )
            DELETE FROM snapshots s
            USING ranked r
            WHERE s.id = r.id AND s.captured_at < $1 AND r.rn > $2
            "#,
        )
        .bind(before)
        .bind(keep)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_aged_diffs(&self, before: DateTime<Utc>, severities: &[Severity]) -> Result<u64> {
        if severities.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM diffs WHERE created_at < $1 AND severity = ANY($2)")
            .bind(before)
            .bind(severities)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_heartbeat(&self, tenant_system_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO heartbeats (tenant_system_id, last_heartbeat)
            VALUES ($1, $2)
            ON CONFLICT (tenant_system_id) DO UPDATE SET last_heartbeat = EXCLUDED.last_heartbeat
            "#,
        )
        .bind(tenant_system_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_heartbeat(&self, tenant_system_id: &str) -> Result<Option<HeartbeatRow>> {
        let row = sqlx::query_as::<_, HeartbeatRow>(
            "SELECT tenant_system_id, last_heartbeat FROM heartbeats WHERE tenant_system_id = $1",
        )
        .bind(tenant_system_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn run_maintenance_hint(&self) -> Result<()> {
        if let Err(err) = sqlx::query("ANALYZE snapshots, diffs").execute(&self.pool).await {
            warn!(error = %err, "maintenance hint failed, ignoring (best-effort)");
        }
        Ok(())
    }
}

#[async_trait]
impl SystemStore for PostgresStore {
    async fn get_system(&self, system_id: &str) -> Result<Option<SystemRecord>> {
        let system = sqlx::query_as::<_, SystemRecord>(
            "SELECT system_id, tenant_id, system_secret_hash, created_at, disabled_at
             FROM systems WHERE system_id = $1",
        )
        .bind(system_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(system)
    }

    async fn create_system(
        &self,
        system_id: &str,
        tenant_id: &str,
        system_secret_hash: &str,
    ) -> Result<SystemRecord> {
        let system = sqlx::query_as::<_, SystemRecord>(
            r#"
            INSERT INTO systems (system_id, tenant_id, system_secret_hash, created_at)
            VALUES ($1, $2, $3, now())
            RETURNING system_id, tenant_id, system_secret_hash, created_at, disabled_at
            "#,
        )
        .bind(system_id)
        .bind(tenant_id)
        .bind(system_secret_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(system)
    }
}
