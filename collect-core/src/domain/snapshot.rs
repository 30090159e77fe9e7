use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::value::Value;

/// One captured device inventory payload.
///
/// `(tenant_id, payload_hash)` is unique: identical repeated uploads collapse
/// onto the same row, with `captured_at` advanced to the later submission.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Snapshot {
    pub id: i64,
    pub tenant_id: String,
    pub captured_at: DateTime<Utc>,
    #[sqlx(json)]
    pub payload: serde_json::Value,
    pub payload_hash: String,
    pub payload_size: i64,
    pub processed_at: Option<DateTime<Utc>>,
    pub has_changes: bool,
    pub change_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    /// Parse the persisted JSON payload into the dynamic value tree used by
    /// the diff engine.
    pub fn payload_tree(&self) -> Value {
        Value::from(self.payload.clone())
    }
}

/// A snapshot submission before it has been assigned a row id — the shape
/// the Batch Persister accumulates and flushes.
#[derive(Debug, Clone)]
pub struct PendingSnapshot {
    pub tenant_id: String,
    pub captured_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub payload_hash: String,
    pub payload_size: i64,
}

/// Fixed-width content digest of a submission payload (SHA-256, hex-encoded).
///
/// The hash is computed over the canonical JSON bytes of the payload so that
/// logically-identical uploads collapse even if the edge system re-serializes
/// keys in a different order.
pub fn payload_hash(payload: &serde_json::Value) -> String {
    use sha2::{Digest, Sha256};

    let canonical = canonicalize(payload);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), canonicalize(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        serde_json::Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"os":"rhel","v":1}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"v":1,"os":"rhel"}"#).unwrap();
        assert_eq!(payload_hash(&a), payload_hash(&b));
    }

    #[test]
    fn hash_differs_on_content_change() {
        let a: serde_json::Value = serde_json::from_str(r#"{"v":1}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"v":2}"#).unwrap();
        assert_ne!(payload_hash(&a), payload_hash(&b));
    }
}
