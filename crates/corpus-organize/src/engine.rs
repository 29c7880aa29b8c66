use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use corpus_errors::{CorpusError, PathFailure};
use corpus_frontmatter::header::{self, Header};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::policy::OrganizePolicy;
use crate::report::{DriftReport, OrganizeSummary};

fn is_markdown_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file() && entry.path().extension().and_then(|e| e.to_str()) == Some("md")
}

struct WalkedFile {
    path: PathBuf,
    doi: Option<String>,
}

fn walk_clippings(clippings_root: &Path) -> Vec<WalkedFile> {
    let mut out = Vec::new();
    for entry in WalkDir::new(clippings_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(is_markdown_file)
    {
        let path = entry.path().to_path_buf();
        let doi = match corpus_frontmatter::parse(&path) {
            Ok((header, _body)) => header::get_str(&header, "doi")
                .and_then(corpus_frontmatter::doi::normalize),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read paper during organize walk");
                None
            }
        };
        out.push(WalkedFile { path, doi });
    }
    out
}

fn collision_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Move `source` onto `target`'s canonical location, honoring the
/// collision policy (spec §4.3 step 3): an identical existing target is
/// treated as already-organized (no churn); a differing one is evicted to
/// a timestamped sibling name after a backup.
fn resolve_target(
    source: &Path,
    target: &Path,
    policy: &OrganizePolicy,
    backup_dir: &Path,
) -> Result<bool, CorpusError> {
    if !target.exists() {
        return Ok(true);
    }

    let existing = fs::read(target).map_err(|e| CorpusError::from(e).with_path(target))?;
    let incoming = fs::read(source).map_err(|e| CorpusError::from(e).with_path(source))?;
    if existing == incoming {
        // Already organized, byte-identical: no backup churn (spec §8).
        return Ok(false);
    }

    if policy.create_backup {
        corpus_frontmatter::backup_file(target, backup_dir)?;
    }

    let stem = target.file_stem().and_then(|s| s.to_str()).unwrap_or("paper");
    let suffix = target.extension().and_then(|s| s.to_str()).unwrap_or("md");
    let evicted_name = format!("{stem}_{}.{suffix}", collision_timestamp());
    let evicted_path = target.parent().unwrap_or(Path::new(".")).join(evicted_name);
    fs::rename(target, &evicted_path).map_err(|e| CorpusError::from(e).with_path(target))?;
    warn!(
        target = %target.display(),
        evicted_to = %evicted_path.display(),
        "organize collision: evicted existing target"
    );
    Ok(true)
}

fn organize_one(
    source: &Path,
    citation_key: &str,
    clippings_root: &Path,
    policy: &OrganizePolicy,
    backup_dir: &Path,
) -> Result<(), CorpusError> {
    let target_dir = clippings_root.join(citation_key);
    fs::create_dir_all(&target_dir).map_err(|e| CorpusError::from(e).with_path(&target_dir))?;
    let target = target_dir.join(format!("{citation_key}.md"));

    let should_write = resolve_target(source, &target, policy, backup_dir)?;
    if !should_write {
        return Ok(());
    }

    let (mut header, body) = corpus_frontmatter::parse(source)?;
    if policy.update_yaml_header {
        header::set_str(&mut header, "citation_key", citation_key);
        header::set_status(&mut header, "organize", "completed");
        header::set_str(&mut header, "last_updated", header::now_iso8601());
        if header::get_str(&header, "workflow_version").is_none() {
            header::set_str(&mut header, "workflow_version", corpus_frontmatter::migration::CURRENT_VERSION);
        }
    }

    corpus_frontmatter::write(&target, &header, &body, None)?;

    if source != target {
        fs::remove_file(source).map_err(|e| CorpusError::from(e).with_path(source))?;
        info!(from = %source.display(), to = %target.display(), "organized paper");
    }
    Ok(())
}

fn detect_drift(
    bib_dois: &std::collections::HashMap<String, String>,
    walked: &[WalkedFile],
) -> DriftReport {
    let markdown_dois: std::collections::HashSet<&str> =
        walked.iter().filter_map(|w| w.doi.as_deref()).collect();

    let mut report = DriftReport::default();
    for (doi, citation_key) in bib_dois {
        if !markdown_dois.contains(doi.as_str()) {
            report
                .missing_in_clippings
                .push((citation_key.clone(), doi.clone()));
        }
    }
    for walked_file in walked {
        match &walked_file.doi {
            Some(doi) if !bib_dois.contains_key(doi) => {
                report
                    .orphaned_in_clippings
                    .push((walked_file.path.clone(), doi.clone()));
            }
            None => report.no_doi_in_markdown.push(walked_file.path.clone()),
            _ => {}
        }
    }
    report
}

/// `organize_workspace` (spec §4.3): reconcile the Clippings tree against
/// the bibliography by DOI, moving matched files into their canonical
/// location and reporting drift. Bibliography parse failure is fatal;
/// per-file failures are caught and tallied.
pub fn organize_workspace(
    clippings_root: &Path,
    bibliography_path: &Path,
    policy: &OrganizePolicy,
) -> Result<OrganizeSummary, CorpusError> {
    let entries = corpus_bibliography::parse_keyed(bibliography_path)?;
    let doi_to_key = corpus_bibliography::doi_map(&entries);

    let walked = walk_clippings(clippings_root);
    let backup_dir = clippings_root.join(".organize_backups");

    let mut summary = OrganizeSummary::default();
    for walked_file in &walked {
        let Some(doi) = &walked_file.doi else { continue };
        let Some(citation_key) = doi_to_key.get(doi) else { continue };

        match organize_one(&walked_file.path, citation_key, clippings_root, policy, &backup_dir) {
            Ok(()) => summary.processed_papers += 1,
            Err(error) => summary.processing_failed.push(PathFailure {
                path: walked_file.path.clone(),
                error,
            }),
        }
    }

    // Re-walk after moves so drift reflects post-organize reality rather
    // than stale pre-move paths.
    let post_walk = walk_clippings(clippings_root);
    summary.drift = detect_drift(&doi_to_key, &post_walk);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_frontmatter::header::set_str;
    use serde_yaml::{Mapping, Value};
    use tempfile::tempdir;

    fn write_bib(path: &Path) {
        fs::write(
            path,
            "@article{smith2023test,\n  title = {A Test Paper},\n  author = {Smith, John},\n  journal = {J},\n  year = {2023},\n  doi = {10.1038/EXAMPLE},\n}\n",
        )
        .unwrap();
    }

    fn write_staged(clippings_root: &Path, file_name: &str, doi: &str) -> PathBuf {
        let mut header = Header::new();
        set_str(&mut header, "doi", doi);
        header::set(&mut header, "processing_status", Value::Mapping(Mapping::new()));
        let path = clippings_root.join(file_name);
        corpus_frontmatter::write(&path, &header, "Body.\n", None).unwrap();
        path
    }

    #[test]
    fn happy_path_moves_and_sets_citation_key() {
        let dir = tempdir().unwrap();
        let clippings = dir.path().join("Clippings");
        fs::create_dir_all(&clippings).unwrap();
        let bib_path = dir.path().join("CurrentManuscript.bib");
        write_bib(&bib_path);
        write_staged(&clippings, "foo.md", "10.1038/EXAMPLE");

        let policy = OrganizePolicy::default();
        let summary = organize_workspace(&clippings, &bib_path, &policy).unwrap();
        assert_eq!(summary.processed_papers, 1);

        let target = clippings.join("smith2023test").join("smith2023test.md");
        assert!(target.exists());
        let (header, _) = corpus_frontmatter::parse(&target).unwrap();
        assert_eq!(header::get_str(&header, "citation_key"), Some("smith2023test"));
        assert_eq!(header::status_of(&header, "organize"), "completed");
        assert!(!clippings.join("foo.md").exists());
    }

    #[test]
    fn drift_reports_missing_and_orphaned() {
        let dir = tempdir().unwrap();
        let clippings = dir.path().join("Clippings");
        fs::create_dir_all(&clippings).unwrap();
        let bib_path = dir.path().join("CurrentManuscript.bib");
        write_bib(&bib_path);
        write_staged(&clippings, "orphan.md", "10.9999/orphan");

        let policy = OrganizePolicy::default();
        let summary = organize_workspace(&clippings, &bib_path, &policy).unwrap();
        assert_eq!(summary.drift.missing_in_clippings.len(), 1);
        assert_eq!(summary.drift.missing_in_clippings[0].0, "smith2023test");
        assert_eq!(summary.drift.orphaned_in_clippings.len(), 1);
    }

    #[test]
    fn byte_identical_collision_is_a_noop() {
        let dir = tempdir().unwrap();
        let clippings = dir.path().join("Clippings");
        fs::create_dir_all(&clippings).unwrap();
        let bib_path = dir.path().join("CurrentManuscript.bib");
        write_bib(&bib_path);

        let target_dir = clippings.join("smith2023test");
        fs::create_dir_all(&target_dir).unwrap();
        let mut header = Header::new();
        set_str(&mut header, "doi", "10.1038/EXAMPLE");
        set_str(&mut header, "citation_key", "smith2023test");
        header::set(&mut header, "processing_status", Value::Mapping(Mapping::new()));
        corpus_frontmatter::write(&target_dir.join("smith2023test.md"), &header, "Body.\n", None).unwrap();

        write_staged(&clippings, "foo.md", "10.1038/EXAMPLE");
        // Make the staged file byte-identical to the existing target.
        fs::copy(
            target_dir.join("smith2023test.md"),
            clippings.join("foo.md"),
        )
        .unwrap();

        let policy = OrganizePolicy::default();
        organize_workspace(&clippings, &bib_path, &policy).unwrap();
        let backup_dir = clippings.join(".organize_backups");
        assert!(!backup_dir.exists());
    }
}
