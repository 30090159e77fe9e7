pub mod severity;
pub mod walk;

pub use severity::SeverityClassifier;
pub use walk::{walk, RawDiff};

use crate::domain::{PendingDiff, Severity};
use crate::value::Value;

/// Outcome of comparing a snapshot against its predecessor: the diffs that
/// passed the significance filter, plus the aggregate severity notification
/// jobs need.
#[derive(Debug, Clone, Default)]
pub struct DiffOutcome {
    pub diffs: Vec<PendingDiff>,
    pub aggregate_severity: Option<Severity>,
}

impl DiffOutcome {
    pub fn change_count(&self) -> i32 {
        self.diffs.len() as i32
    }

    pub fn has_changes(&self) -> bool {
        !self.diffs.is_empty()
    }
}

/// Run the full diff pipeline: walk, classify, and filter.
///
/// `previous` is `None` when the current snapshot is the tenant's first —
/// callers MUST short-circuit that case themselves (mark processed with no
/// changes, emit no notification) rather than calling this with `None`,
/// since an absent predecessor is not "everything was added".
pub fn diff_snapshots(
    classifier: &SeverityClassifier,
    tenant_id: &str,
    previous_snapshot_id: i64,
    current_snapshot_id: i64,
    previous: &Value,
    current: &Value,
) -> DiffOutcome {
    let raw = walk(Some(previous), Some(current));

    let mut diffs = Vec::new();
    let mut aggregate_severity: Option<Severity> = None;

    for item in raw {
        let severity = classifier.classify(&item.field_path, item.kind);
        if !classifier.is_significant(&item.field_path, severity) {
            continue;
        }

        aggregate_severity = Some(match aggregate_severity {
            Some(current_max) if current_max >= severity => current_max,
            _ => severity,
        });

        diffs.push(PendingDiff {
            tenant_id: tenant_id.to_string(),
            previous_snapshot_id,
            current_snapshot_id,
            kind: item.kind,
            field_path: item.field_path.clone(),
            previous_value: item.previous_value.map(serde_json::Value::from),
            current_value: item.current_value.map(serde_json::Value::from),
            severity,
            category: SeverityClassifier::category_of(&item.field_path).to_string(),
        });
    }

    DiffOutcome { diffs, aggregate_severity }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(json: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap())
    }

    #[test]
    fn os_upgrade_produces_one_significant_diff() {
        let classifier = SeverityClassifier::default();
        let prev = val(r#"{"os":{"release":"8.0"}}"#);
        let curr = val(r#"{"os":{"release":"8.1"}}"#);
        let outcome = diff_snapshots(&classifier, "t1", 1, 2, &prev, &curr);

        assert_eq!(outcome.diffs.len(), 1);
        assert_eq!(outcome.diffs[0].field_path, "os.release");
        assert!(outcome.aggregate_severity.is_some());
    }

    #[test]
    fn noise_path_change_alone_yields_no_diffs() {
        let classifier = SeverityClassifier::default();
        let prev = val(r#"{"os":{"release":"8.1"},"uptime":1}"#);
        let curr = val(r#"{"os":{"release":"8.1"},"uptime":2}"#);
        let outcome = diff_snapshots(&classifier, "t1", 1, 2, &prev, &curr);

        assert!(outcome.diffs.is_empty());
        assert!(outcome.aggregate_severity.is_none());
    }

    #[test]
    fn aggregate_severity_is_the_maximum() {
        let classifier = SeverityClassifier::default();
        let prev = val(r#"{"os":{"release":"8.0"},"custom_field":1}"#);
        let curr = val(r#"{"os":{"release":"8.1"},"custom_field":2}"#);
        let outcome = diff_snapshots(&classifier, "t1", 1, 2, &prev, &curr);

        assert_eq!(outcome.diffs.len(), 2);
        assert_eq!(outcome.aggregate_severity, Some(Severity::High));
    }
}
