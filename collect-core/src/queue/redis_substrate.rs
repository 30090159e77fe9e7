use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::backoff::compute_backoff;
use super::{QueueStats, QueueSubstrate};
use crate::domain::{QueueFamily, QueueMessage};
use crate::error::Result;

const DELAYED_SCHEDULED_KEY: &str = "collect:queue:delayed:scheduled";
const DELAYED_MESSAGES_KEY: &str = "collect:queue:delayed:messages";

/// Envelope stored alongside a message while it waits in the delayed queue,
/// so `release_due_delayed` knows which origin queue to re-emit onto.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DelayedEnvelope {
    origin: String,
    message: QueueMessage<serde_json::Value>,
}

/// Redis-backed implementation of the queue substrate.
///
/// Each logical queue is three Redis keys: a `ready` list (FIFO order via
/// `RPUSH`/`BLMOVE`), an `inflight` list mirroring claimed-but-unacknowledged
/// messages, and a `dead` list for attempts-exhausted messages. Message
/// bodies live in a per-queue hash keyed by message id so the list entries
/// stay small. The delayed queue additionally uses a sorted set keyed by
/// due-at so `release_due_delayed` can select due work in one round trip.
#[derive(Clone)]
pub struct RedisQueueSubstrate {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisQueueSubstrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisQueueSubstrate").finish_non_exhaustive()
    }
}

impl RedisQueueSubstrate {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn ready_key(queue: QueueFamily) -> String {
        format!("{}:ready", queue.key_prefix())
    }

    fn inflight_key(queue: QueueFamily) -> String {
        format!("{}:inflight", queue.key_prefix())
    }

    fn dead_key(queue: QueueFamily) -> String {
        format!("{}:dead", queue.key_prefix())
    }

    fn messages_key(queue: QueueFamily) -> String {
        format!("{}:messages", queue.key_prefix())
    }
}

#[async_trait::async_trait]
impl QueueSubstrate for RedisQueueSubstrate {
    async fn enqueue(&self, queue: QueueFamily, payload: serde_json::Value) -> Result<String> {
        let message_id = Uuid::new_v4().to_string();
        let message = QueueMessage::new(message_id.clone(), payload);
        let body = serde_json::to_string(&message)?;

        let mut conn = self.conn.clone();
        let () = conn.hset(Self::messages_key(queue), &message_id, &body).await?;
        let () = conn.rpush(Self::ready_key(queue), &message_id).await?;

        debug!(%message_id, queue = queue.as_origin_name(), "enqueued message");
        Ok(message_id)
    }

    async fn dequeue(
        &self,
        queue: QueueFamily,
        wait: Duration,
    ) -> Result<Option<QueueMessage<serde_json::Value>>> {
        let mut conn = self.conn.clone();
        let message_id: Option<String> = conn
            .blmove(
                Self::ready_key(queue),
                Self::inflight_key(queue),
                Direction::Left,
                Direction::Right,
                wait.as_secs_f64(),
            )
            .await?;

        let Some(message_id) = message_id else {
            return Ok(None);
        };

        let body: Option<String> = conn.hget(Self::messages_key(queue), &message_id).await?;
        let Some(body) = body else {
            warn!(%message_id, "in-flight message missing its body, dropping claim");
            let () = conn.lrem(Self::inflight_key(queue), 1, &message_id).await?;
            return Ok(None);
        };

        let message: QueueMessage<serde_json::Value> = serde_json::from_str(&body)?;
        Ok(Some(message))
    }

    async fn ack(&self, queue: QueueFamily, message_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = conn.lrem(Self::inflight_key(queue), 1, message_id).await?;
        let () = conn.hdel(Self::messages_key(queue), message_id).await?;
        debug!(%message_id, queue = queue.as_origin_name(), "acked message");
        Ok(())
    }

    async fn requeue(
        &self,
        queue: QueueFamily,
        mut message: QueueMessage<serde_json::Value>,
        error: String,
        max_attempts: u32,
        backoff_base: Duration,
        backoff_max: Duration,
        jitter: f64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = conn
            .lrem(Self::inflight_key(queue), 1, &message.message_id)
            .await?;

        message.attempt_count += 1;
        message.last_error = Some(error);

        if message.attempt_count >= max_attempts {
            let body = serde_json::to_string(&message)?;
            let () = conn.hset(Self::messages_key(queue), &message.message_id, &body).await?;
            let () = conn.rpush(Self::dead_key(queue), &message.message_id).await?;
            warn!(
                message_id = %message.message_id,
                queue = queue.as_origin_name(),
                attempts = message.attempt_count,
                "message exhausted retries, moved to dead set"
            );
            return Ok(());
        }

        let delay = compute_backoff(message.attempt_count, backoff_base, backoff_max, jitter);
        let due_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();

        let envelope = DelayedEnvelope {
            origin: queue.as_origin_name().to_string(),
            message: message.clone(),
        };
        let envelope_body = serde_json::to_string(&envelope)?;

        let () = conn
            .hset(DELAYED_MESSAGES_KEY, &message.message_id, &envelope_body)
            .await?;
        let () = conn
            .zadd(DELAYED_SCHEDULED_KEY, &message.message_id, due_at.timestamp_millis())
            .await?;
        let () = conn.hdel(Self::messages_key(queue), &message.message_id).await?;

        debug!(
            message_id = %message.message_id,
            queue = queue.as_origin_name(),
            attempt = message.attempt_count,
            delay_ms = delay.as_millis(),
            "message scheduled for delayed redelivery"
        );
        Ok(())
    }

    async fn stats(&self, queue: QueueFamily) -> Result<QueueStats> {
        let mut conn = self.conn.clone();
        if matches!(queue, QueueFamily::Delayed) {
            let depth: usize = conn.zcard(DELAYED_SCHEDULED_KEY).await?;
            return Ok(QueueStats { depth, in_flight: 0, dead: 0 });
        }

        let depth: usize = conn.llen(Self::ready_key(queue)).await?;
        let in_flight: usize = conn.llen(Self::inflight_key(queue)).await?;
        let dead: usize = conn.llen(Self::dead_key(queue)).await?;
        Ok(QueueStats { depth, in_flight, dead })
    }

    async fn release_due_delayed(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.conn.clone();
        let due_ids: Vec<String> = conn
            .zrangebyscore(DELAYED_SCHEDULED_KEY, 0, now.timestamp_millis())
            .await?;

        let mut moved = 0u64;
        for message_id in due_ids {
            let envelope_body: Option<String> =
                conn.hget(DELAYED_MESSAGES_KEY, &message_id).await?;
            let Some(envelope_body) = envelope_body else {
                let _: () = conn.zrem(DELAYED_SCHEDULED_KEY, &message_id).await?;
                continue;
            };

            let envelope: DelayedEnvelope = match serde_json::from_str(&envelope_body) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(%message_id, error = %err, "dropping malformed delayed envelope");
                    let _: () = conn.zrem(DELAYED_SCHEDULED_KEY, &message_id).await?;
                    let _: () = conn.hdel(DELAYED_MESSAGES_KEY, &message_id).await?;
                    continue;
                }
            };

            let Some(origin) = QueueFamily::origin_for_delayed(&envelope.origin) else {
                warn!(%message_id, origin = %envelope.origin, "unknown origin queue for delayed message");
                let _: () = conn.zrem(DELAYED_SCHEDULED_KEY, &message_id).await?;
                let _: () = conn.hdel(DELAYED_MESSAGES_KEY, &message_id).await?;
                continue;
            };

            let body = serde_json::to_string(&envelope.message)?;
            let _: () = conn.hset(Self::messages_key(origin), &message_id, &body).await?;
            let _: () = conn.rpush(Self::ready_key(origin), &message_id).await?;
            let _: () = conn.zrem(DELAYED_SCHEDULED_KEY, &message_id).await?;
            let _: () = conn.hdel(DELAYED_MESSAGES_KEY, &message_id).await?;
            moved += 1;
        }

        if moved > 0 {
            debug!(moved, "released due delayed messages to origin queues");
        }
        Ok(moved)
    }
}
