use chrono::Utc;
use collect_core::domain::Severity;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::workers::Heartbeat;

const INITIAL_DELAY: std::time::Duration = std::time::Duration::from_secs(30);

/// Single periodic worker enforcing retention across snapshots and diffs.
/// Each step is independently best-effort: a failure is logged and the
/// cycle continues, except the final maintenance hint which is strictly
/// best-effort by contract.
pub async fn run(state: AppState, mut shutdown_rx: mpsc::Receiver<()>, heartbeat: Heartbeat) {
    info!("cleanup worker started");

    tokio::select! {
        _ = shutdown_rx.recv() => {
            info!("cleanup worker shutting down before first run");
            return;
        }
        _ = tokio::time::sleep(INITIAL_DELAY) => {}
    }

    heartbeat.touch();
    run_cycle(&state).await;

    let mut interval = tokio::time::interval(state.config.cleanup_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // first tick fires immediately; already ran above

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("cleanup worker shutting down");
                break;
            }
            _ = interval.tick() => {
                heartbeat.touch();
                run_cycle(&state).await;
            }
        }
    }
}

async fn run_cycle(state: &AppState) {
    let now = Utc::now();
    let base_cutoff = now - chrono::Duration::from_std(state.config.base_retention).unwrap_or_default();
    let escalated_cutoff = now
        - chrono::Duration::from_std(state.config.base_retention * 2).unwrap_or_default();

    match state
        .store
        .delete_aged_snapshots(base_cutoff, state.config.min_retained_per_tenant)
        .await
    {
        Ok(deleted) => debug!(deleted, "aged snapshots cleaned up"),
        Err(err) => warn!(error = %err, "snapshot cleanup step failed"),
    }

    match state
        .store
        .delete_aged_diffs(base_cutoff, &[Severity::Low, Severity::Medium])
        .await
    {
        Ok(deleted) => debug!(deleted, "low/medium diffs cleaned up"),
        Err(err) => warn!(error = %err, "low/medium diff cleanup step failed"),
    }

    match state
        .store
        .delete_aged_diffs(escalated_cutoff, &[Severity::High, Severity::Critical])
        .await
    {
        Ok(deleted) => debug!(deleted, "high/critical diffs cleaned up"),
        Err(err) => warn!(error = %err, "high/critical diff cleanup step failed"),
    }

    // Resolved-alert retention has no local store: the Metrics Pass-Through
    // is a stateless forwarder, and alert lifecycle is owned by the
    // upstream Alertmanager this service proxies to.
    debug!("resolved-alert retention delegated to upstream, nothing to delete locally");

    if let Err(err) = state.store.run_maintenance_hint().await {
        debug!(error = %err, "maintenance hint failed, ignored");
    }

    info!("cleanup cycle complete");
}
