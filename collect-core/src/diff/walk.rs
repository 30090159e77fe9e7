use std::collections::BTreeSet;

use crate::domain::DiffKind;
use crate::value::Value;

/// One field-level change surfaced by [`walk`], before severity
/// classification or the significance filter run.
#[derive(Debug, Clone)]
pub struct RawDiff {
    pub field_path: String,
    pub kind: DiffKind,
    pub previous_value: Option<Value>,
    pub current_value: Option<Value>,
}

/// Recursively compare `previous` and `current` as nested mappings, emitting
/// one [`RawDiff`] per field-path that differs.
///
/// Mappings are walked by key union; ordered sequences are compared
/// position-wise rather than by key (diffs inside a list are reported as a
/// single `modified` at the list's own path, not per element — element
/// reordering inside a list therefore always reads as one `modified`
/// rather than a pointwise added/removed pair).
pub fn walk(previous: Option<&Value>, current: Option<&Value>) -> Vec<RawDiff> {
    let mut diffs = Vec::new();
    walk_at(String::new(), previous, current, &mut diffs);
    diffs
}

fn walk_at(
    path: String,
    previous: Option<&Value>,
    current: Option<&Value>,
    diffs: &mut Vec<RawDiff>,
) {
    match (previous, current) {
        (None, None) => {}
        (None, Some(curr)) => diffs.push(RawDiff {
            field_path: path,
            kind: DiffKind::Added,
            previous_value: None,
            current_value: Some(curr.clone()),
        }),
        (Some(prev), None) => diffs.push(RawDiff {
            field_path: path,
            kind: DiffKind::Removed,
            previous_value: Some(prev.clone()),
            current_value: None,
        }),
        (Some(prev), Some(curr)) => match (prev.as_map(), curr.as_map()) {
            (Some(prev_map), Some(curr_map)) => {
                let keys: BTreeSet<&String> = prev_map.keys().chain(curr_map.keys()).collect();
                for key in keys {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    walk_at(child_path, prev_map.get(key), curr_map.get(key), diffs);
                }
            }
            _ => {
                if !Value::values_equal(prev, curr) {
                    diffs.push(RawDiff {
                        field_path: path,
                        kind: DiffKind::Modified,
                        previous_value: Some(prev.clone()),
                        current_value: Some(curr.clone()),
                    });
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(json: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap())
    }

    #[test]
    fn emits_added_for_new_field() {
        let prev = val(r#"{"os":{"release":"8.0"}}"#);
        let curr = val(r#"{"os":{"release":"8.0"},"new_field":1}"#);
        let diffs = walk(Some(&prev), Some(&curr));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field_path, "new_field");
        assert_eq!(diffs[0].kind, DiffKind::Added);
    }

    #[test]
    fn emits_removed_for_dropped_field() {
        let prev = val(r#"{"os":{"release":"8.0"},"old_field":1}"#);
        let curr = val(r#"{"os":{"release":"8.0"}}"#);
        let diffs = walk(Some(&prev), Some(&curr));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field_path, "old_field");
        assert_eq!(diffs[0].kind, DiffKind::Removed);
    }

    #[test]
    fn emits_modified_for_nested_field_change() {
        let prev = val(r#"{"os":{"release":"8.0"}}"#);
        let curr = val(r#"{"os":{"release":"8.1"}}"#);
        let diffs = walk(Some(&prev), Some(&curr));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field_path, "os.release");
        assert_eq!(diffs[0].kind, DiffKind::Modified);
    }

    #[test]
    fn identical_payloads_emit_nothing() {
        let a = val(r#"{"os":{"release":"8.0"},"tags":["a","b"]}"#);
        let b = val(r#"{"tags":["a","b"],"os":{"release":"8.0"}}"#);
        assert!(walk(Some(&a), Some(&b)).is_empty());
    }

    #[test]
    fn numeric_cross_representation_is_not_a_diff() {
        let prev = val(r#"{"memory_total":8}"#);
        let curr = val(r#"{"memory_total":8.0}"#);
        assert!(walk(Some(&prev), Some(&curr)).is_empty());
    }

    #[test]
    fn list_reorder_is_a_single_modified() {
        let prev = val(r#"{"tags":["a","b"]}"#);
        let curr = val(r#"{"tags":["b","a"]}"#);
        let diffs = walk(Some(&prev), Some(&curr));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field_path, "tags");
        assert_eq!(diffs[0].kind, DiffKind::Modified);
    }

    #[test]
    fn no_previous_snapshot_emits_added_for_every_top_level_field() {
        let curr = val(r#"{"os":{"release":"8.0"}}"#);
        let diffs = walk(None, Some(&curr));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::Added);
    }
}
