use std::time::Duration;

use collect_core::domain::snapshot::payload_hash;
use collect_core::domain::{InventorySubmission, PendingSnapshot, ProcessingJob, QueueFamily, QueueMessage, Snapshot};
use collect_core::queue::QueueSubstrate;
use collect_core::CollectError;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::workers::Heartbeat;

const DEQUEUE_POLL: Duration = Duration::from_millis(500);

/// One worker in the Batch Persister pool: claims Inventory messages,
/// accumulates them locally, and flushes on size, interval, or shutdown.
pub async fn run(id: usize, state: AppState, mut shutdown_rx: mpsc::Receiver<()>, heartbeat: Heartbeat) {
    info!(worker = id, "batch persister started");

    let mut buffer: Vec<QueueMessage<serde_json::Value>> = Vec::with_capacity(state.config.batch_size);
    let mut flush_interval = tokio::time::interval(state.config.flush_interval);
    flush_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        heartbeat.touch();
        tokio::select! {
            _ = shutdown_rx.recv() => {
                if !buffer.is_empty() {
                    flush(&state, &mut buffer).await;
                }
                info!(worker = id, "batch persister shutting down");
                break;
            }
            _ = flush_interval.tick() => {
                if !buffer.is_empty() {
                    flush(&state, &mut buffer).await;
                }
            }
            dequeued = state.queue.dequeue(QueueFamily::Inventory, DEQUEUE_POLL), if !state.circuit.is_open().await => {
                match dequeued {
                    Ok(Some(message)) => {
                        let usage = buffer.len() as f64 / state.config.local_buffer_capacity.max(1) as f64;
                        if usage >= state.config.drop_threshold {
                            warn!(
                                worker = id,
                                usage,
                                message_id = %message.message_id,
                                "local buffer over drop-threshold, dropping inventory message"
                            );
                            let _ = state.queue.ack(QueueFamily::Inventory, &message.message_id).await;
                        } else {
                            buffer.push(message);
                            if buffer.len() >= state.config.batch_size {
                                flush(&state, &mut buffer).await;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(worker = id, error = %err, "inventory dequeue failed");
                        state.circuit.record_failure().await;
                        tokio::time::sleep(DEQUEUE_POLL).await;
                    }
                }
            }
        }
    }
}

/// Drains `buffer`, parsing each message's payload and handing the parsed
/// batch to the store in one upsert. Malformed messages are acked (dropped)
/// rather than retried; everything else is acked on success or requeued
/// as a whole batch on failure, preserving each message's real attempt
/// count for the backoff/dead-letter accounting in `requeue`.
async fn flush(state: &AppState, buffer: &mut Vec<QueueMessage<serde_json::Value>>) {
    let mut pending = Vec::with_capacity(buffer.len());
    let mut kept = Vec::with_capacity(buffer.len());

    for message in buffer.drain(..) {
        match serde_json::from_value::<InventorySubmission>(message.payload.clone()) {
            Ok(submission) => {
                let hash = payload_hash(&submission.payload);
                let size = serde_json::to_vec(&submission.payload).map(|b| b.len() as i64).unwrap_or(0);
                pending.push(PendingSnapshot {
                    tenant_id: submission.tenant_id,
                    captured_at: submission.captured_at,
                    payload: submission.payload,
                    payload_hash: hash,
                    payload_size: size,
                });
                kept.push(message);
            }
            Err(err) => {
                error!(error = %err, message_id = %message.message_id, "dropping malformed inventory submission");
                let _ = state.queue.ack(QueueFamily::Inventory, &message.message_id).await;
            }
        }
    }

    if pending.is_empty() {
        return;
    }

    match state.store.upsert_batch(&pending).await {
        Ok(outcomes) => {
            state.circuit.record_success().await;

            for (outcome, item) in outcomes.iter().zip(pending.iter()) {
                if let Err(err) = handle_post_commit(state, outcome.snapshot_id, &item.tenant_id).await {
                    error!(
                        snapshot_id = outcome.snapshot_id,
                        error = %err,
                        "post-commit processing-job enqueue failed, snapshot left unprocessed"
                    );
                }
            }

            for message in kept {
                let _ = state.queue.ack(QueueFamily::Inventory, &message.message_id).await;
            }
        }
        Err(err) => {
            error!(error = %err, batch_size = kept.len(), "batch flush failed, requeuing batch");
            state.circuit.record_failure().await;
            requeue_batch(state, kept).await;
        }
    }
}

/// Synthesizes the Processing job that routes a freshly-persisted snapshot
/// to the Diff Engine, unless this is the tenant's very first snapshot, in
/// which case there is nothing to diff against and the snapshot is marked
/// processed directly with no change.
async fn handle_post_commit(
    state: &AppState,
    snapshot_id: i64,
    tenant_id: &str,
) -> collect_core::Result<()> {
    let previous: Option<Snapshot> = state.store.previous_snapshot(tenant_id, snapshot_id).await?;

    match previous {
        Some(_) => {
            let job = ProcessingJob { snapshot_id, tenant_id: tenant_id.to_string() };
            let payload = serde_json::to_value(&job).map_err(CollectError::from)?;
            state.queue.enqueue(QueueFamily::Processing, payload).await?;
        }
        None => {
            state.store.mark_processed(snapshot_id, false, 0).await?;
        }
    }

    Ok(())
}

async fn requeue_batch(state: &AppState, buffer: Vec<QueueMessage<serde_json::Value>>) {
    for message in buffer {
        let message_id = message.message_id.clone();
        if let Err(err) = state
            .queue
            .requeue(
                QueueFamily::Inventory,
                message,
                "batch flush failed".to_string(),
                state.config.max_attempts,
                state.config.backoff_base,
                state.config.backoff_max,
                state.config.jitter,
            )
            .await
        {
            error!(error = %err, message_id = %message_id, "failed to requeue inventory message");
        }
    }
}
