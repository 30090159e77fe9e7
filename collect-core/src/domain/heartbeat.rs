use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row per system, upsert-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HeartbeatRow {
    pub tenant_system_id: String,
    pub last_heartbeat: DateTime<Utc>,
}
