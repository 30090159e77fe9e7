use std::collections::HashSet;

use crate::domain::{DiffKind, Severity};

/// Maps a diff's category and kind to a severity, and filters out
/// insignificant diffs before they reach persistence.
///
/// Category is the first segment of the diff's field-path (`"os.release"`
/// categorizes as `"os"`). Unknown categories default to `low`; a
/// configured set of critical paths escalates regardless of the built-in
/// table, matching fields an operator considers load-bearing (OS release,
/// FQDN, total memory) even when their category would otherwise be `low`.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    critical_paths: HashSet<String>,
    significance_threshold: Severity,
    noise_paths: HashSet<String>,
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self {
            critical_paths: [
                "os.release",
                "os.fqdn",
                "network.fqdn",
                "memory.total",
                "memory.total_bytes",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            significance_threshold: Severity::Low,
            noise_paths: ["uptime", "system.uptime", "metrics.poll_count"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl SeverityClassifier {
    pub fn new(
        critical_paths: HashSet<String>,
        significance_threshold: Severity,
        noise_paths: HashSet<String>,
    ) -> Self {
        Self { critical_paths, significance_threshold, noise_paths }
    }

    /// First field-path segment, e.g. `"os.release"` -> `"os"`.
    pub fn category_of(field_path: &str) -> &str {
        field_path.split('.').next().unwrap_or(field_path)
    }

    pub fn classify(&self, field_path: &str, kind: DiffKind) -> Severity {
        if self.critical_paths.contains(field_path) {
            return match kind {
                DiffKind::Removed => Severity::Critical,
                DiffKind::Added | DiffKind::Modified => Severity::High,
            };
        }

        match Self::category_of(field_path) {
            "os" => Severity::Medium,
            "networking" | "network" => Severity::Medium,
            "memory" | "cpu" | "disk" | "storage" => Severity::Medium,
            "security" | "firmware" => Severity::High,
            _ => Severity::Low,
        }
    }

    /// `true` if this diff should be persisted: not on the noise allow-list,
    /// and at or above the significance threshold.
    pub fn is_significant(&self, field_path: &str, severity: Severity) -> bool {
        if self.noise_paths.contains(field_path) {
            return false;
        }
        severity >= self.significance_threshold
    }
}
