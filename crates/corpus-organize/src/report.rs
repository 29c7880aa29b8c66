use std::path::PathBuf;

use corpus_errors::PathFailure;

/// The three drift reports organize emits (spec §4.3 step 4).
#[derive(Debug, Default)]
pub struct DriftReport {
    /// Bibliography DOIs (with citation key) that have no matching file.
    pub missing_in_clippings: Vec<(String, String)>,
    /// Files whose DOI is not present in the bibliography.
    pub orphaned_in_clippings: Vec<(PathBuf, String)>,
    /// Files without a parseable DOI.
    pub no_doi_in_markdown: Vec<PathBuf>,
}

/// Result of one `organize_workspace` run.
#[derive(Default)]
pub struct OrganizeSummary {
    pub processed_papers: u32,
    pub processing_failed: Vec<PathFailure>,
    pub drift: DriftReport,
}
