use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One atomic field-level change between two snapshots of the same tenant.
///
/// Invariant: exactly one of `previous_value`/`current_value` is `None` for
/// `Added`/`Removed`; both are `Some` and unequal for `Modified`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiffRecord {
    pub id: i64,
    pub tenant_id: String,
    pub previous_snapshot_id: i64,
    pub current_snapshot_id: i64,
    pub kind: DiffKind,
    pub field_path: String,
    #[sqlx(json)]
    pub previous_value: Option<serde_json::Value>,
    #[sqlx(json)]
    pub current_value: Option<serde_json::Value>,
    pub severity: Severity,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// A diff before it has been assigned a row id, produced by the diff engine
/// walk and the significance filter.
#[derive(Debug, Clone)]
pub struct PendingDiff {
    pub tenant_id: String,
    pub previous_snapshot_id: i64,
    pub current_snapshot_id: i64,
    pub kind: DiffKind,
    pub field_path: String,
    pub previous_value: Option<serde_json::Value>,
    pub current_value: Option<serde_json::Value>,
    pub severity: Severity,
    pub category: String,
}

impl PendingDiff {
    pub fn invariant_holds(&self) -> bool {
        match self.kind {
            DiffKind::Added => self.previous_value.is_none() && self.current_value.is_some(),
            DiffKind::Removed => self.previous_value.is_some() && self.current_value.is_none(),
            DiffKind::Modified => {
                self.previous_value.is_some()
                    && self.current_value.is_some()
                    && self.previous_value != self.current_value
            }
        }
    }
}
