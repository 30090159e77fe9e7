use std::time::Duration;

use collect_core::diff::diff_snapshots;
use collect_core::domain::{NotificationJob, ProcessingJob, QueueFamily, QueueMessage};
use collect_core::queue::QueueSubstrate;
use collect_core::CollectError;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::workers::Heartbeat;

const DEQUEUE_POLL: Duration = Duration::from_millis(500);

/// One worker in the Diff Engine pool: consumes Processing jobs, loads the
/// current and previous snapshot fresh, computes and persists significant
/// diffs, and enqueues a notification when anything changed.
pub async fn run(id: usize, state: AppState, mut shutdown_rx: mpsc::Receiver<()>, heartbeat: Heartbeat) {
    info!(worker = id, "diff worker started");

    loop {
        heartbeat.touch();
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!(worker = id, "diff worker shutting down");
                break;
            }
            dequeued = state.queue.dequeue(QueueFamily::Processing, DEQUEUE_POLL) => {
                match dequeued {
                    Ok(Some(message)) => process(&state, message).await,
                    Ok(None) => {}
                    Err(err) => {
                        warn!(worker = id, error = %err, "processing dequeue failed");
                        tokio::time::sleep(DEQUEUE_POLL).await;
                    }
                }
            }
        }
    }
}

async fn process(state: &AppState, message: QueueMessage<serde_json::Value>) {
    let job: ProcessingJob = match serde_json::from_value(message.payload.clone()) {
        Ok(job) => job,
        Err(err) => {
            error!(error = %err, message_id = %message.message_id, "dropping malformed processing job");
            let _ = state.queue.ack(QueueFamily::Processing, &message.message_id).await;
            return;
        }
    };

    match run_job(state, &job).await {
        Ok(()) => {
            let _ = state.queue.ack(QueueFamily::Processing, &message.message_id).await;
        }
        Err(err) => {
            error!(
                snapshot_id = job.snapshot_id,
                tenant_id = %job.tenant_id,
                error = %err,
                "diff computation failed, requeuing"
            );
            if let Err(err) = state
                .queue
                .requeue(
                    QueueFamily::Processing,
                    message,
                    err.to_string(),
                    state.config.max_attempts,
                    state.config.backoff_base,
                    state.config.backoff_max,
                    state.config.jitter,
                )
                .await
            {
                error!(error = %err, "failed to requeue processing job");
            }
        }
    }
}

async fn run_job(state: &AppState, job: &ProcessingJob) -> collect_core::Result<()> {
    let current = state
        .store
        .get_snapshot(job.snapshot_id)
        .await?
        .ok_or_else(|| CollectError::NotFound(format!("snapshot {} not found", job.snapshot_id)))?;

    let previous = state.store.previous_snapshot(&job.tenant_id, job.snapshot_id).await?;

    let Some(previous) = previous else {
        // No predecessor: nothing to diff against. This path is a safety net —
        // the Batch Persister already short-circuits the first-ever-snapshot
        // case before a processing job is ever enqueued.
        state.store.mark_processed(job.snapshot_id, false, 0).await?;
        return Ok(());
    };

    let outcome = diff_snapshots(
        &state.classifier,
        &job.tenant_id,
        previous.id,
        current.id,
        &previous.payload_tree(),
        &current.payload_tree(),
    );

    // A replay of this job (after a crash or failure between here and
    // `mark_processed`) must converge on one set of diff rows rather than
    // appending a second one, since `processed_at` staying NULL is what
    // makes the job repeatable.
    state.store.delete_diffs_for_snapshot(current.id).await?;

    if outcome.has_changes() {
        for chunk in outcome.diffs.chunks(100) {
            state.store.insert_diffs(chunk).await?;
        }
    }

    state
        .store
        .mark_processed(current.id, outcome.has_changes(), outcome.change_count())
        .await?;

    if outcome.has_changes() {
        let severity = outcome.aggregate_severity.unwrap_or(collect_core::domain::Severity::Low);
        // Processing jobs only ever carry (snapshot-id, tenant-id) — the
        // submitting system's identity isn't retained past Intake — so
        // system_id is reported as the tenant-id here too.
        let notification = NotificationJob {
            tenant_id: job.tenant_id.clone(),
            system_id: job.tenant_id.clone(),
            snapshot_id: current.id,
            diff_count: outcome.diffs.len(),
            aggregate_severity: severity,
            message: format!(
                "{} field(s) changed for tenant {} (max severity {:?})",
                outcome.diffs.len(),
                job.tenant_id,
                severity
            ),
        };
        let payload = serde_json::to_value(&notification).map_err(CollectError::from)?;
        state.queue.enqueue(QueueFamily::Notification, payload).await?;
    }

    Ok(())
}
