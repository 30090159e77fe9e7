use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four logical queues multiplexed on the queue substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueFamily {
    Inventory,
    Processing,
    Notification,
    Delayed,
}

impl QueueFamily {
    /// Key prefix used to multiplex all four families on a single Redis
    /// keyspace, per the queue substrate's "MAY multiplex" allowance.
    pub fn key_prefix(self) -> &'static str {
        match self {
            QueueFamily::Inventory => "collect:queue:inventory",
            QueueFamily::Processing => "collect:queue:processing",
            QueueFamily::Notification => "collect:queue:notification",
            QueueFamily::Delayed => "collect:queue:delayed",
        }
    }

    /// The queue a delayed message is re-emitted onto when it comes due.
    pub fn origin_for_delayed(name: &str) -> Option<QueueFamily> {
        match name {
            "inventory" => Some(QueueFamily::Inventory),
            "processing" => Some(QueueFamily::Processing),
            "notification" => Some(QueueFamily::Notification),
            _ => None,
        }
    }

    pub fn as_origin_name(self) -> &'static str {
        match self {
            QueueFamily::Inventory => "inventory",
            QueueFamily::Processing => "processing",
            QueueFamily::Notification => "notification",
            QueueFamily::Delayed => "delayed",
        }
    }
}

/// Generic envelope carrying a queue-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage<T> {
    pub message_id: String,
    pub enqueued_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub payload: T,
}

impl<T> QueueMessage<T> {
    pub fn new(message_id: String, payload: T) -> Self {
        Self {
            message_id,
            enqueued_at: Utc::now(),
            attempt_count: 0,
            last_error: None,
            payload,
        }
    }
}

/// Job carried on the Processing queue. Only the snapshot identity is
/// carried — never the payload — so the canonical row is re-read fresh
/// before diffing, and queue messages stay small.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub snapshot_id: i64,
    pub tenant_id: String,
}

/// Job carried on the Notification queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub tenant_id: String,
    pub system_id: String,
    pub snapshot_id: i64,
    pub diff_count: usize,
    pub aggregate_severity: super::Severity,
    pub message: String,
}

/// Raw submission carried on the Inventory queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySubmission {
    pub tenant_id: String,
    pub captured_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}
