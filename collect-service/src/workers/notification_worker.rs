use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use collect_core::domain::{NotificationJob, QueueFamily, QueueMessage};
use collect_core::queue::QueueSubstrate;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::workers::Heartbeat;

const DEQUEUE_POLL: Duration = Duration::from_millis(500);

/// One worker in the Notification Dispatcher pool. The Notification queue is
/// a single shared list, so strict per-tenant ordering isn't guaranteed; a
/// worker that dequeues a job belonging to a different partition than its
/// own re-enqueues it immediately (without counting as an attempt) so the
/// owning worker picks it up, approximating the "SHOULD preserve order
/// within a tenant" hash-partitioning the dispatcher design calls for.
pub async fn run(
    id: usize,
    pool_size: usize,
    state: AppState,
    mut shutdown_rx: mpsc::Receiver<()>,
    heartbeat: Heartbeat,
) {
    info!(worker = id, "notification worker started");

    loop {
        heartbeat.touch();
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!(worker = id, "notification worker shutting down");
                break;
            }
            dequeued = state.queue.dequeue(QueueFamily::Notification, DEQUEUE_POLL) => {
                match dequeued {
                    Ok(Some(message)) => process(id, pool_size, &state, message).await,
                    Ok(None) => {}
                    Err(err) => {
                        warn!(worker = id, error = %err, "notification dequeue failed");
                        tokio::time::sleep(DEQUEUE_POLL).await;
                    }
                }
            }
        }
    }
}

async fn process(
    id: usize,
    pool_size: usize,
    state: &AppState,
    message: QueueMessage<serde_json::Value>,
) {
    let job: NotificationJob = match serde_json::from_value(message.payload.clone()) {
        Ok(job) => job,
        Err(err) => {
            error!(error = %err, message_id = %message.message_id, "dropping malformed notification job");
            let _ = state.queue.ack(QueueFamily::Notification, &message.message_id).await;
            return;
        }
    };

    if pool_size > 1 && partition_of(&job.tenant_id, pool_size) != id {
        if let Err(err) = state.queue.enqueue(QueueFamily::Notification, message.payload.clone()).await {
            error!(error = %err, "failed to repartition notification job, delivering locally instead");
        } else {
            let _ = state.queue.ack(QueueFamily::Notification, &message.message_id).await;
            return;
        }
    }

    match deliver(state, &job).await {
        Ok(()) => {
            let _ = state.queue.ack(QueueFamily::Notification, &message.message_id).await;
        }
        Err(err) => {
            error!(
                tenant_id = %job.tenant_id,
                error = %err,
                "notification delivery failed, requeuing"
            );
            if let Err(err) = state
                .queue
                .requeue(
                    QueueFamily::Notification,
                    message,
                    err.to_string(),
                    state.config.max_attempts,
                    state.config.backoff_base,
                    state.config.backoff_max,
                    state.config.jitter,
                )
                .await
            {
                error!(error = %err, "failed to requeue notification job");
            }
        }
    }
}

async fn deliver(state: &AppState, job: &NotificationJob) -> collect_core::Result<()> {
    for sink in state.sinks.iter() {
        sink.deliver(job).await?;
    }
    Ok(())
}

fn partition_of(tenant_id: &str, pool_size: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    tenant_id.hash(&mut hasher);
    (hasher.finish() % pool_size as u64) as usize
}
