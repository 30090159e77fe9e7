use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered edge system: the Auth Gate's credential record.
///
/// One row per system, not per tenant — a tenant may own many systems.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SystemRecord {
    pub system_id: String,
    pub tenant_id: String,
    pub system_secret_hash: String,
    pub created_at: DateTime<Utc>,
    pub disabled_at: Option<DateTime<Utc>>,
}

impl SystemRecord {
    pub fn is_active(&self) -> bool {
        self.disabled_at.is_none()
    }
}
