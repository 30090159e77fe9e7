use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::workers::Heartbeat;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The single authoritative re-delivery scheduler: moves messages whose
/// due-at has elapsed back onto their origin queue. Runs continuously so
/// retry-with-delay never busy-waits inside the producing workers.
pub async fn run(state: AppState, mut shutdown_rx: mpsc::Receiver<()>, heartbeat: Heartbeat) {
    info!("delayed-message worker started");

    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("delayed-message worker shutting down");
                break;
            }
            _ = interval.tick() => {
                heartbeat.touch();
                match state.queue.release_due_delayed(Utc::now()).await {
                    Ok(0) => {}
                    Ok(released) => debug!(released, "delayed messages released to origin queues"),
                    Err(err) => warn!(error = %err, "delayed-queue release failed"),
                }
            }
        }
    }
}
