//! In-memory stand-ins for the Postgres store and Redis queue substrate, so
//! `collect-service`'s HTTP surface can be exercised end-to-end without a
//! live database. Mirrors the shape of `AppState::build`, minus the
//! connection setup.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use collect_core::db::{SnapshotStore, SystemStore, UpsertOutcome};
use collect_core::domain::{
    CircuitBreaker, DiffRecord, HeartbeatRow, PendingDiff, PendingSnapshot, QueueFamily,
    QueueMessage, Severity, Snapshot, SystemRecord,
};
use collect_core::queue::{QueueStats, QueueSubstrate};
use collect_core::{CollectError, Result};
use collect_service::app_state::AppState;
use collect_service::sinks::LoggingSink;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Single-process fake of the snapshot/diff/heartbeat persistence boundary.
/// Good enough to drive the intake, diffing, and cleanup tests without
/// Postgres; it does not attempt transactional semantics beyond a mutex.
#[derive(Default)]
pub struct InMemoryStore {
    snapshots: Mutex<Vec<Snapshot>>,
    diffs: Mutex<Vec<DiffRecord>>,
    heartbeats: Mutex<HashMap<String, DateTime<Utc>>>,
    systems: Mutex<HashMap<String, SystemRecord>>,
    next_id: Mutex<i64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(self, record: SystemRecord) -> Self {
        self.systems.lock().unwrap().insert(record.system_id.clone(), record);
        self
    }

    fn alloc_id(&self) -> i64 {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        *guard
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn diff_count(&self) -> usize {
        self.diffs.lock().unwrap().len()
    }

    /// Marks a registered system disabled, for auth-gate rejection tests.
    pub fn disable_system(&self, system_id: &str) {
        if let Some(record) = self.systems.lock().unwrap().get_mut(system_id) {
            record.disabled_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn upsert_batch(&self, batch: &[PendingSnapshot]) -> Result<Vec<UpsertOutcome>> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let mut outcomes = Vec::with_capacity(batch.len());

        for pending in batch {
            let existing = snapshots
                .iter_mut()
                .find(|s| s.tenant_id == pending.tenant_id && s.payload_hash == pending.payload_hash);

            if let Some(row) = existing {
                row.captured_at = pending.captured_at;
                row.updated_at = Utc::now();
                outcomes.push(UpsertOutcome { snapshot_id: row.id, newly_inserted: false });
                continue;
            }

            let id = self.alloc_id();
            let now = Utc::now();
            snapshots.push(Snapshot {
                id,
                tenant_id: pending.tenant_id.clone(),
                captured_at: pending.captured_at,
                payload: pending.payload.clone(),
                payload_hash: pending.payload_hash.clone(),
                payload_size: pending.payload_size,
                processed_at: None,
                has_changes: false,
                change_count: 0,
                created_at: now,
                updated_at: now,
            });
            outcomes.push(UpsertOutcome { snapshot_id: id, newly_inserted: true });
        }

        Ok(outcomes)
    }

    async fn previous_snapshot(&self, tenant_id: &str, before_id: i64) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.lock().unwrap();
        let previous = snapshots
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.id < before_id)
            .max_by_key(|s| (s.captured_at, s.id));
        Ok(previous.cloned())
    }

    async fn get_snapshot(&self, id: i64) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn mark_processed(&self, snapshot_id: i64, has_changes: bool, change_count: i32) -> Result<()> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let row = snapshots
            .iter_mut()
            .find(|s| s.id == snapshot_id)
            .ok_or_else(|| CollectError::NotFound(format!("snapshot {snapshot_id}")))?;
        row.processed_at = Some(Utc::now());
        row.has_changes = has_changes;
        row.change_count = change_count;
        Ok(())
    }

    async fn insert_diffs(&self, diffs: &[PendingDiff]) -> Result<Vec<DiffRecord>> {
        let mut stored = self.diffs.lock().unwrap();
        let mut inserted = Vec::with_capacity(diffs.len());

        for pending in diffs {
            let id = self.alloc_id();
            let record = DiffRecord {
                id,
                tenant_id: pending.tenant_id.clone(),
                previous_snapshot_id: pending.previous_snapshot_id,
                current_snapshot_id: pending.current_snapshot_id,
                kind: pending.kind,
                field_path: pending.field_path.clone(),
                previous_value: pending.previous_value.clone(),
                current_value: pending.current_value.clone(),
                severity: pending.severity,
                category: pending.category.clone(),
                created_at: Utc::now(),
            };
            stored.push(record.clone());
            inserted.push(record);
        }

        Ok(inserted)
    }

    async fn delete_diffs_for_snapshot(&self, current_snapshot_id: i64) -> Result<()> {
        self.diffs.lock().unwrap().retain(|d| d.current_snapshot_id != current_snapshot_id);
        Ok(())
    }

    async fn delete_aged_snapshots(&self, before: DateTime<Utc>, keep_most_recent: usize) -> Result<u64> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let mut by_tenant: HashMap<String, Vec<i64>> = HashMap::new();
        for s in snapshots.iter() {
            by_tenant.entry(s.tenant_id.clone()).or_default().push(s.id);
        }

        let mut keep_ids = std::collections::HashSet::new();
        for (tenant, mut ids) in by_tenant {
            ids.sort_unstable();
            ids.reverse();
            for id in ids.into_iter().take(keep_most_recent) {
                keep_ids.insert(id);
            }
            let _ = tenant;
        }

        let before_len = snapshots.len();
        snapshots.retain(|s| keep_ids.contains(&s.id) || s.captured_at >= before);
        Ok((before_len - snapshots.len()) as u64)
    }

    async fn delete_aged_diffs(&self, before: DateTime<Utc>, severities: &[Severity]) -> Result<u64> {
        let mut diffs = self.diffs.lock().unwrap();
        let before_len = diffs.len();
        diffs.retain(|d| !(d.created_at < before && severities.contains(&d.severity)));
        Ok((before_len - diffs.len()) as u64)
    }

    async fn upsert_heartbeat(&self, tenant_system_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.heartbeats.lock().unwrap().insert(tenant_system_id.to_string(), at);
        Ok(())
    }

    async fn get_heartbeat(&self, tenant_system_id: &str) -> Result<Option<HeartbeatRow>> {
        Ok(self
            .heartbeats
            .lock()
            .unwrap()
            .get(tenant_system_id)
            .map(|at| HeartbeatRow { tenant_system_id: tenant_system_id.to_string(), last_heartbeat: *at }))
    }

    async fn run_maintenance_hint(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SystemStore for InMemoryStore {
    async fn get_system(&self, system_id: &str) -> Result<Option<SystemRecord>> {
        Ok(self.systems.lock().unwrap().get(system_id).cloned())
    }

    async fn create_system(&self, system_id: &str, tenant_id: &str, system_secret_hash: &str) -> Result<SystemRecord> {
        let mut systems = self.systems.lock().unwrap();
        if systems.contains_key(system_id) {
            return Err(CollectError::BadPayload(format!("system {system_id} already registered")));
        }
        let record = SystemRecord {
            system_id: system_id.to_string(),
            tenant_id: tenant_id.to_string(),
            system_secret_hash: system_secret_hash.to_string(),
            created_at: Utc::now(),
            disabled_at: None,
        };
        systems.insert(system_id.to_string(), record.clone());
        Ok(record)
    }
}

/// Single-process fake of the Redis-backed queue substrate: one `VecDeque`
/// per queue family, an in-flight map keyed by message id, and a dead
/// list. No delayed-set scheduling beyond bookkeeping the release count.
#[derive(Default)]
pub struct InMemoryQueue {
    ready: Mutex<HashMap<QueueFamily, VecDeque<QueueMessage<serde_json::Value>>>>,
    inflight: Mutex<HashMap<(QueueFamily, String), QueueMessage<serde_json::Value>>>,
    dead: Mutex<HashMap<QueueFamily, Vec<QueueMessage<serde_json::Value>>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueSubstrate for InMemoryQueue {
    async fn enqueue(&self, queue: QueueFamily, payload: serde_json::Value) -> Result<String> {
        let message_id = Uuid::new_v4().to_string();
        let message = QueueMessage::new(message_id.clone(), payload);
        self.ready.lock().unwrap().entry(queue).or_default().push_back(message);
        Ok(message_id)
    }

    async fn dequeue(
        &self,
        queue: QueueFamily,
        _wait: Duration,
    ) -> Result<Option<QueueMessage<serde_json::Value>>> {
        let mut ready = self.ready.lock().unwrap();
        let Some(message) = ready.entry(queue).or_default().pop_front() else {
            return Ok(None);
        };
        self.inflight
            .lock()
            .unwrap()
            .insert((queue, message.message_id.clone()), message.clone());
        Ok(Some(message))
    }

    async fn ack(&self, queue: QueueFamily, message_id: &str) -> Result<()> {
        self.inflight.lock().unwrap().remove(&(queue, message_id.to_string()));
        Ok(())
    }

    async fn requeue(
        &self,
        queue: QueueFamily,
        mut message: QueueMessage<serde_json::Value>,
        error: String,
        max_attempts: u32,
        _backoff_base: Duration,
        _backoff_max: Duration,
        _jitter: f64,
    ) -> Result<()> {
        self.inflight.lock().unwrap().remove(&(queue, message.message_id.clone()));
        message.attempt_count += 1;
        message.last_error = Some(error);

        if message.attempt_count >= max_attempts {
            self.dead.lock().unwrap().entry(queue).or_default().push(message);
        } else {
            self.ready.lock().unwrap().entry(queue).or_default().push_back(message);
        }
        Ok(())
    }

    async fn stats(&self, queue: QueueFamily) -> Result<QueueStats> {
        let depth = self.ready.lock().unwrap().get(&queue).map(|q| q.len()).unwrap_or(0);
        let in_flight = self
            .inflight
            .lock()
            .unwrap()
            .keys()
            .filter(|(q, _)| *q == queue)
            .count();
        let dead = self.dead.lock().unwrap().get(&queue).map(|q| q.len()).unwrap_or(0);
        Ok(QueueStats { depth, in_flight, dead })
    }

    async fn release_due_delayed(&self, _now: DateTime<Utc>) -> Result<u64> {
        Ok(0)
    }
}

/// Builds an `AppState` wired to the in-memory fakes above, bypassing
/// `AppState::build`'s Postgres/Redis connection setup entirely.
pub fn build_test_state(store: Arc<InMemoryStore>, queue: Arc<InMemoryQueue>) -> AppState {
    let systems: Arc<dyn SystemStore> = store.clone();
    let snapshot_store: Arc<dyn SnapshotStore> = store;
    let queue_substrate: Arc<dyn QueueSubstrate> = queue;

    let admin_secret_hash = collect_core::auth::hash_secret("integration-test-admin-secret").unwrap();
    let admin = collect_core::auth::AdminCredential {
        admin_id: "integration-test-admin".to_string(),
        admin_secret_hash,
    };
    let auth = Arc::new(collect_core::auth::AuthGate::new(systems.clone(), admin));

    let config = Arc::new(collect_core::RetentionConfig::default());
    let circuit = CircuitBreaker::new(config.circuit_max_failures, config.circuit_reset);

    AppState {
        store: snapshot_store,
        systems,
        queue: queue_substrate,
        auth,
        classifier: Arc::new(collect_core::diff::SeverityClassifier::default()),
        circuit,
        local_buffer: Arc::new(Semaphore::new(config.local_buffer_capacity)),
        http_client: reqwest::Client::new(),
        alertmanager_base_url: "http://localhost:9093".into(),
        sinks: Arc::new(vec![Arc::new(LoggingSink) as Arc<dyn collect_service::sinks::NotificationSink>]),
        config,
    }
}

/// A registered system with a known plaintext secret, for tests to
/// authenticate as.
pub struct TestSystem {
    pub system_id: String,
    pub secret: String,
    pub tenant_id: String,
}

pub fn register_system(store: &InMemoryStore, system_id: &str, tenant_id: &str, secret: &str) -> TestSystem {
    let hash = collect_core::auth::hash_secret(secret).unwrap();
    store.systems.lock().unwrap().insert(
        system_id.to_string(),
        SystemRecord {
            system_id: system_id.to_string(),
            tenant_id: tenant_id.to_string(),
            system_secret_hash: hash,
            created_at: Utc::now(),
            disabled_at: None,
        },
    );
    TestSystem { system_id: system_id.to_string(), secret: secret.to_string(), tenant_id: tenant_id.to_string() }
}

pub fn basic_auth_header(id: &str, secret: &str) -> String {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    format!("Basic {}", BASE64.encode(format!("{id}:{secret}")))
}

pub fn router(state: AppState) -> Router {
    collect_service::routes::build(state)
}
