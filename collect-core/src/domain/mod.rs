pub mod circuit_breaker;
pub mod diff_record;
pub mod heartbeat;
pub mod queue_message;
pub mod snapshot;
pub mod system;
pub mod tenant;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use diff_record::{DiffKind, DiffRecord, PendingDiff, Severity};
pub use heartbeat::HeartbeatRow;
pub use queue_message::{InventorySubmission, NotificationJob, ProcessingJob, QueueFamily, QueueMessage};
pub use snapshot::{PendingSnapshot, Snapshot};
pub use system::SystemRecord;
pub use tenant::TenantBinding;
