pub mod batch_persister;
pub mod cleanup_worker;
pub mod delayed_worker;
pub mod diff_worker;
pub mod notification_worker;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app_state::AppState;

/// Fixed pool size for the Batch Persister. Unlike the Diff Engine and
/// Notification Dispatcher, the retention config names no dedicated tunable
/// for this pool, so it is sized as a small constant rather than invented
/// as an unused config field.
const BATCH_PERSISTER_WORKERS: usize = 2;

/// Shared last-activity clock a worker touches on every loop iteration.
/// Backed by epoch milliseconds in an atomic so it can be read from the
/// Worker Manager's health check without locking.
#[derive(Clone)]
pub struct Heartbeat(Arc<AtomicU64>);

impl Heartbeat {
    fn new() -> Self {
        Self(Arc::new(AtomicU64::new(now_millis())))
    }

    pub fn touch(&self) {
        self.0.store(now_millis(), Ordering::Relaxed);
    }

    fn elapsed(&self) -> Duration {
        let last = self.0.load(Ordering::Relaxed);
        let delta = now_millis().saturating_sub(last);
        Duration::from_millis(delta)
    }
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

struct ManagedWorker {
    name: String,
    handle: JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
    heartbeat: Heartbeat,
}

/// Lifecycle owner for every pipeline worker: Batch Persister, Diff Engine,
/// Notification Dispatcher, Cleanup, Delayed-Message, and the metrics
/// collection task. Each worker gets its own shutdown channel and join
/// handle rather than sharing one homogeneous pool.
pub struct WorkerManager {
    workers: Vec<ManagedWorker>,
    state: AppState,
    started_at: Instant,
}

impl WorkerManager {
    /// Spawns every worker. Each task owns a clone of `AppState`, a
    /// dedicated shutdown channel, and its own heartbeat handle; none of
    /// them own each other.
    pub fn start(state: AppState) -> Self {
        let mut workers = Vec::new();

        for id in 0..BATCH_PERSISTER_WORKERS {
            spawn(&mut workers, format!("batch-persister-{id}"), state.clone(), move |s, rx, hb| {
                Box::pin(batch_persister::run(id, s, rx, hb))
            });
        }

        let processing_workers = state.config.processing_workers.max(1);
        for id in 0..processing_workers {
            spawn(&mut workers, format!("diff-{id}"), state.clone(), move |s, rx, hb| {
                Box::pin(diff_worker::run(id, s, rx, hb))
            });
        }

        let notification_workers = state.config.notification_workers.max(1);
        for id in 0..notification_workers {
            spawn(&mut workers, format!("notification-{id}"), state.clone(), move |s, rx, hb| {
                Box::pin(notification_worker::run(id, notification_workers, s, rx, hb))
            });
        }

        spawn(&mut workers, "cleanup".to_string(), state.clone(), |s, rx, hb| {
            Box::pin(cleanup_worker::run(s, rx, hb))
        });

        spawn(&mut workers, "delayed-message".to_string(), state.clone(), |s, rx, hb| {
            Box::pin(delayed_worker::run(s, rx, hb))
        });

        spawn(&mut workers, "metrics".to_string(), state.clone(), |s, rx, hb| {
            Box::pin(metrics_loop(s, rx, hb))
        });

        info!(workers = workers.len(), "worker manager started");

        Self { workers, state, started_at: Instant::now() }
    }

    /// Signals every worker to stop, then waits up to `shutdown_timeout`
    /// for them to finish. Workers still running past the deadline are
    /// abandoned with a warning rather than blocking shutdown forever.
    pub async fn stop(self) {
        for worker in &self.workers {
            let _ = worker.shutdown_tx.send(()).await;
        }

        let deadline = self.state.config.shutdown_timeout;
        let names: Vec<String> = self.workers.iter().map(|w| w.name.clone()).collect();
        let joins = self.workers.into_iter().map(|w| w.handle);

        match tokio::time::timeout(deadline, futures::future::join_all(joins)).await {
            Ok(_) => info!("worker manager stopped cleanly"),
            Err(_) => warn!(workers = ?names, "shutdown timeout elapsed, abandoning remaining workers"),
        }
    }

    /// Aggregate health per the Worker Manager design: started AND every
    /// worker's last activity within `5 * heartbeat_interval` AND the
    /// circuit is not open.
    pub async fn healthy(&self) -> bool {
        if self.state.circuit.is_open().await {
            return false;
        }

        let staleness_limit = self.state.config.heartbeat_interval * 5;
        self.workers.iter().all(|w| w.heartbeat.elapsed() < staleness_limit)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl WorkerManager {
    /// A cheap, cloneable snapshot of what [`Self::healthy`] needs, so the
    /// HTTP `/health` handler can hold one without sharing ownership of the
    /// [`WorkerManager`] itself (which [`Self::stop`] consumes on shutdown).
    pub fn health_handle(&self) -> HealthHandle {
        HealthHandle {
            circuit: self.state.circuit.clone(),
            staleness_limit: self.state.config.heartbeat_interval * 5,
            heartbeats: self.workers.iter().map(|w| w.heartbeat.clone()).collect(),
            started_at: self.started_at,
        }
    }
}

/// Cloneable handle to the subset of Worker Manager state the `/health`
/// endpoint needs, so the manager itself can still be consumed by
/// [`WorkerManager::stop`] on shutdown.
#[derive(Clone)]
pub struct HealthHandle {
    circuit: collect_core::domain::CircuitBreaker,
    staleness_limit: Duration,
    heartbeats: Vec<Heartbeat>,
    started_at: Instant,
}

impl HealthHandle {
    pub async fn healthy(&self) -> bool {
        if self.circuit.is_open().await {
            return false;
        }
        self.heartbeats.iter().all(|h| h.elapsed() < self.staleness_limit)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

type WorkerFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

fn spawn<F>(workers: &mut Vec<ManagedWorker>, name: String, state: AppState, task: F)
where
    F: FnOnce(AppState, mpsc::Receiver<()>, Heartbeat) -> WorkerFuture,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let heartbeat = Heartbeat::new();
    let handle = tokio::spawn(task(state, shutdown_rx, heartbeat.clone()));

    workers.push(ManagedWorker { name, handle, shutdown_tx, heartbeat });
}

/// Samples queue depths and circuit state on a fixed interval, per the
/// Worker Manager's metrics-collection responsibility. There is no
/// external metrics sink in scope, so each tick is logged at `info` —
/// the in-process snapshot a future `/metrics` endpoint would read.
async fn metrics_loop(state: AppState, mut shutdown_rx: mpsc::Receiver<()>, heartbeat: Heartbeat) {
    let mut interval = tokio::time::interval(state.config.metrics_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                heartbeat.touch();
                let circuit_state = state.circuit.state().await;
                for family in [
                    collect_core::domain::QueueFamily::Inventory,
                    collect_core::domain::QueueFamily::Processing,
                    collect_core::domain::QueueFamily::Notification,
                    collect_core::domain::QueueFamily::Delayed,
                ] {
                    match state.queue.stats(family).await {
                        Ok(stats) => info!(
                            queue = family.as_origin_name(),
                            depth = stats.depth,
                            in_flight = stats.in_flight,
                            dead = stats.dead,
                            circuit = ?circuit_state,
                            "queue metrics"
                        ),
                        Err(err) => warn!(queue = family.as_origin_name(), error = %err, "failed to sample queue stats"),
                    }
                }
            }
        }
    }
}
