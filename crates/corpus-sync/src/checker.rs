use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use corpus_errors::CorpusError;
use corpus_frontmatter::header::{self, Header};
use serde_yaml::{Mapping, Value};
use walkdir::WalkDir;

use crate::issue::{Issue, Severity};
use crate::policy::SyncPolicy;
use crate::report::{PaperConsistency, SyncSummary};

const BACKUP_DIR_NAME: &str = ".sync_backups";

fn is_markdown_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.path().extension().and_then(|e| e.to_str()) == Some("md")
        && !entry.path().components().any(|c| c.as_os_str() == BACKUP_DIR_NAME)
}

struct WalkedPaper {
    path: PathBuf,
    citation_key: Option<String>,
}

fn walk_clippings(clippings_root: &Path) -> Vec<WalkedPaper> {
    WalkDir::new(clippings_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(is_markdown_file)
        .map(|entry| {
            let path = entry.path().to_path_buf();
            let citation_key = corpus_frontmatter::parse(&path)
                .ok()
                .and_then(|(header, _)| header::get_str(&header, "citation_key").map(str::to_string));
            WalkedPaper { path, citation_key }
        })
        .collect()
}

fn normalize_title(title: &str) -> String {
    title.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

fn check_paper(
    header: &Header,
    path: &Path,
    citation_key: &str,
    bib_entry: &corpus_bibliography::BibEntry,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    let header_doi = header::get_str(header, "doi").and_then(corpus_frontmatter::doi::normalize);
    if let Some(bib_doi) = &bib_entry.doi {
        match &header_doi {
            Some(file_doi) if file_doi == bib_doi => {}
            Some(file_doi) => issues.push(Issue::doi_mismatch(bib_doi, file_doi)),
            None => issues.push(Issue::doi_mismatch(bib_doi, "")),
        }
    }

    if let Some(bib_title) = &bib_entry.title {
        if let Some(file_title) = header::get_str(header, "title") {
            if file_title.to_lowercase() != bib_title.to_lowercase() {
                let severity = if normalize_title(file_title) == normalize_title(bib_title) {
                    Severity::Minor
                } else {
                    Severity::Major
                };
                issues.push(Issue::title_mismatch(severity, bib_title, file_title));
            }
        }
    }

    let expected_name = format!("{citation_key}.md");
    let actual_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if actual_name != expected_name {
        issues.push(Issue::filename_mismatch(&expected_name, actual_name));
    }

    issues
}

/// Rename `path` to `<citation_key>.md` in the same directory (the only
/// auto-fix the spec defines, spec §4.4).
fn apply_filename_fix(path: &Path, citation_key: &str, policy: &SyncPolicy) -> Result<PathBuf, CorpusError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let target = parent.join(format!("{citation_key}.md"));
    if policy.backup_before_auto_fix {
        corpus_frontmatter::backup_file(path, &parent.join(BACKUP_DIR_NAME))?;
    }
    fs::rename(path, &target).map_err(|e| CorpusError::from(e).with_path(path))?;
    Ok(target)
}

fn write_sync_metadata(
    path: &Path,
    consistency_status: &str,
    issues_detected: usize,
    auto_corrections_applied: u32,
) -> Result<(), CorpusError> {
    let (mut header, body) = corpus_frontmatter::parse(path)?;

    let mut metadata = Mapping::new();
    metadata.insert(Value::String("checked_at".into()), Value::String(header::now_iso8601()));
    metadata.insert(
        Value::String("consistency_status".into()),
        Value::String(consistency_status.to_string()),
    );
    metadata.insert(
        Value::String("issues_detected".into()),
        Value::Number((issues_detected as u64).into()),
    );
    metadata.insert(
        Value::String("auto_corrections_applied".into()),
        Value::Number((auto_corrections_applied as u64).into()),
    );
    header::set(&mut header, "sync_metadata", Value::Mapping(metadata));

    // Spec §9 Open Question 4: `completed` iff the post-fix issue count is
    // zero, never unconditionally.
    let step_status = if issues_detected == 0 { "completed" } else { "failed" };
    header::set_status(&mut header, "sync", step_status);
    header::set_str(&mut header, "last_updated", header::now_iso8601());

    corpus_frontmatter::write(path, &header, &body, None)
}

/// `check_workspace_consistency` (spec §4.4): run post-organize, compare
/// the bibliography against the Clippings tree, optionally auto-fix minor
/// issues, and write `sync_metadata` + `processing_status.sync` to every
/// paper encountered.
pub fn check_workspace(
    clippings_root: &Path,
    bibliography_path: &Path,
    policy: &SyncPolicy,
) -> Result<SyncSummary, CorpusError> {
    let entries = corpus_bibliography::parse_keyed(bibliography_path)?;
    let walked = walk_clippings(clippings_root);

    let matched_keys: HashSet<&str> = walked
        .iter()
        .filter_map(|w| w.citation_key.as_deref())
        .collect();

    let mut summary = SyncSummary::default();

    for citation_key in entries.keys() {
        if !matched_keys.contains(citation_key.as_str()) {
            summary.missing_in_clippings.push(citation_key.clone());
        }
    }

    for walked_paper in &walked {
        let Some(citation_key) = &walked_paper.citation_key else { continue };
        let Some(bib_entry) = entries.get(citation_key) else {
            let doi = corpus_frontmatter::parse(&walked_paper.path)
                .ok()
                .and_then(|(h, _)| header::get_str(&h, "doi").and_then(corpus_frontmatter::doi::normalize))
                .unwrap_or_default();
            summary.orphaned_in_clippings.push((walked_paper.path.clone(), doi));
            continue;
        };

        let (header, _body) = corpus_frontmatter::parse(&walked_paper.path)?;
        let mut issues = check_paper(&header, &walked_paper.path, citation_key, bib_entry);

        let mut current_path = walked_paper.path.clone();
        let mut auto_corrections = 0u32;
        if policy.auto_fix_minor_issues {
            let minor_filename_issue = issues
                .iter()
                .position(|i| matches!(i.kind, crate::issue::IssueKind::FilenameMismatch) && i.severity == Severity::Minor);
            if let Some(pos) = minor_filename_issue {
                current_path = apply_filename_fix(&current_path, citation_key, policy)?;
                issues.remove(pos);
                auto_corrections += 1;
            }
        }

        write_sync_metadata(
            &current_path,
            if issues.is_empty() { "validated" } else { "issues_detected" },
            issues.len(),
            auto_corrections,
        )?;

        summary.papers.push(PaperConsistency {
            citation_key: citation_key.clone(),
            path: current_path,
            issues,
            auto_corrections_applied: auto_corrections,
        });
    }

    Ok(summary)
}
