use async_trait::async_trait;
use collect_core::domain::NotificationJob;
use collect_core::Result;
use tracing::{info, warn};

use super::NotificationSink;

/// Delivers notifications by writing a structured log line. This is the
/// minimum sink the Notification Dispatcher requires and the default when
/// no other sink is configured.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn deliver(&self, job: &NotificationJob) -> Result<()> {
        match job.aggregate_severity {
            collect_core::domain::Severity::Critical | collect_core::domain::Severity::High => {
                warn!(
                    tenant_id = %job.tenant_id,
                    system_id = %job.system_id,
                    snapshot_id = job.snapshot_id,
                    diff_count = job.diff_count,
                    severity = ?job.aggregate_severity,
                    "{}",
                    job.message
                );
            }
            _ => {
                info!(
                    tenant_id = %job.tenant_id,
                    system_id = %job.system_id,
                    snapshot_id = job.snapshot_id,
                    diff_count = job.diff_count,
                    severity = ?job.aggregate_severity,
                    "{}",
                    job.message
                );
            }
        }
        Ok(())
    }
}
