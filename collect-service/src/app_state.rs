use std::fmt;
use std::sync::Arc;

use collect_core::auth::{AdminCredential, AuthGate};
use collect_core::db::{PostgresStore, SnapshotStore, SystemStore};
use collect_core::diff::SeverityClassifier;
use collect_core::domain::CircuitBreaker;
use collect_core::queue::{QueueSubstrate, RedisQueueSubstrate};
use collect_core::RetentionConfig;
use tokio::sync::Semaphore;

use crate::config::ServiceConfig;
use crate::sinks::NotificationSink;

/// Shared application state handed to every Axum handler and worker loop.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SnapshotStore>,
    pub systems: Arc<dyn SystemStore>,
    pub queue: Arc<dyn QueueSubstrate>,
    pub auth: Arc<AuthGate>,
    pub classifier: Arc<SeverityClassifier>,
    pub circuit: CircuitBreaker,
    pub config: Arc<RetentionConfig>,
    pub http_client: reqwest::Client,
    pub alertmanager_base_url: Arc<str>,
    pub sinks: Arc<Vec<Arc<dyn NotificationSink>>>,
    /// Bounds how many in-flight local tasks (submissions accepted but not
    /// yet enqueued) the process will hold before Intake starts dropping
    /// under `drop-threshold`, per the backpressure design.
    pub local_buffer: Arc<Semaphore>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub async fn build(service_config: &ServiceConfig) -> anyhow::Result<Self> {
        let postgres = Arc::new(PostgresStore::connect(&service_config.database_url).await?);
        postgres.run_migrations().await?;

        let queue = Arc::new(RedisQueueSubstrate::connect(&service_config.redis_url).await?);

        let admin_secret_hash = collect_core::auth::hash_secret(&service_config.admin_secret)?;
        let admin = AdminCredential {
            admin_id: service_config.admin_id.clone(),
            admin_secret_hash,
        };

        let store: Arc<dyn SnapshotStore> = postgres.clone();
        let systems: Arc<dyn SystemStore> = postgres.clone();
        let auth = Arc::new(AuthGate::new(systems.clone(), admin));

        let retention = Arc::new(service_config.retention.clone());
        let circuit = CircuitBreaker::new(retention.circuit_max_failures, retention.circuit_reset);

        let http_client = reqwest::Client::builder()
            .timeout(retention.upstream_http_timeout)
            .build()?;

        let sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(crate::sinks::LoggingSink)];

        Ok(Self {
            store,
            systems,
            queue,
            auth,
            classifier: Arc::new(SeverityClassifier::default()),
            circuit,
            local_buffer: Arc::new(Semaphore::new(retention.local_buffer_capacity)),
            http_client,
            alertmanager_base_url: service_config.alertmanager_base_url.as_str().into(),
            sinks: Arc::new(sinks),
            config: retention,
        })
    }
}
