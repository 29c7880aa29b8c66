use std::path::PathBuf;

use crate::issue::Issue;

/// Per-paper consistency outcome (spec §4.4).
#[derive(Debug)]
pub struct PaperConsistency {
    pub citation_key: String,
    pub path: PathBuf,
    pub issues: Vec<Issue>,
    pub auto_corrections_applied: u32,
}

impl PaperConsistency {
    pub fn consistency_status(&self) -> &'static str {
        if self.issues.is_empty() {
            "validated"
        } else {
            "issues_detected"
        }
    }
}

/// Whole-workspace consistency report.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub missing_in_clippings: Vec<String>,
    pub orphaned_in_clippings: Vec<(PathBuf, String)>,
    pub papers: Vec<PaperConsistency>,
}
