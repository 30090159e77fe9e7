pub mod backoff;
pub mod redis_substrate;

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{QueueFamily, QueueMessage};
use crate::error::Result;

pub use redis_substrate::RedisQueueSubstrate;

/// Uniform interface over a keyed in-memory data store backing the four
/// logical queues. Implementations provide at-least-once delivery: a popped
/// message is mirrored into a per-queue in-flight set until acknowledged.
///
/// Payloads are kept opaque (`serde_json::Value`) at this layer — the queue
/// substrate has no business decoding job bodies, only ferrying them. Callers
/// serialize their typed job structs to/from `serde_json::Value` at the
/// edges (see `domain::queue_message` for the job shapes).
#[async_trait]
pub trait QueueSubstrate: Send + Sync {
    /// Append to a FIFO list; returns an opaque message id.
    async fn enqueue(&self, queue: QueueFamily, payload: serde_json::Value) -> Result<String>;

    /// Blocking pop with timeout. Returns `None` on timeout.
    async fn dequeue(
        &self,
        queue: QueueFamily,
        wait: Duration,
    ) -> Result<Option<QueueMessage<serde_json::Value>>>;

    /// Remove a message from the in-flight set, completing the claim.
    async fn ack(&self, queue: QueueFamily, message_id: &str) -> Result<()>;

    /// Increment attempt-count, record the error, and either move the
    /// message to the dead set (attempt_count >= max_attempts) or schedule
    /// it into the Delayed queue with exponential backoff + jitter.
    async fn requeue(
        &self,
        queue: QueueFamily,
        message: QueueMessage<serde_json::Value>,
        error: String,
        max_attempts: u32,
        backoff_base: Duration,
        backoff_max: Duration,
        jitter: f64,
    ) -> Result<()>;

    async fn stats(&self, queue: QueueFamily) -> Result<QueueStats>;

    /// Move delayed messages whose due-at has elapsed back onto their
    /// origin queue. Returns the number of messages moved. Driven by the
    /// Delayed-Message Worker, the single authoritative re-delivery
    /// scheduler.
    async fn release_due_delayed(&self, now: chrono::DateTime<chrono::Utc>) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub depth: usize,
    pub in_flight: usize,
    pub dead: usize,
}
