pub mod logging_sink;

pub use logging_sink::LoggingSink;

use async_trait::async_trait;
use collect_core::domain::NotificationJob;
use collect_core::Result;

/// Delivery target for significant-change notifications.
///
/// Implementations are pluggable; the logging sink is the only one required.
/// A delivery failure is surfaced to the caller, which requeues the job with
/// backoff rather than retrying inside the sink itself.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, job: &NotificationJob) -> Result<()>;
}
