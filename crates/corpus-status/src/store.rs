use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use corpus_errors::CorpusError;
use corpus_frontmatter::header::{self, Header, STEP_NAMES};
use indexmap::IndexMap;
use serde_yaml::Value;
use tracing::warn;
use walkdir::WalkDir;

use crate::policy::StatusPolicy;

const BACKUP_DIR_NAME: &str = ".status_backups";

fn backup_dir(clippings_root: &Path) -> PathBuf {
    clippings_root.join(BACKUP_DIR_NAME)
}

fn is_markdown_entry(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.path().extension().and_then(|e| e.to_str()) == Some("md")
        && !entry
            .path()
            .components()
            .any(|c| c.as_os_str() == BACKUP_DIR_NAME)
}

fn citation_key_of(header: &Header, path: &Path) -> String {
    header::get_str(header, "citation_key")
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// All `*.md` files under `clippings_root`, parsed, as `(citation_key, path, header)`.
/// Per-file parse failures are logged and skipped rather than aborting the walk —
/// the status store's job is to report what it can read, not to validate the corpus.
fn walk_papers(clippings_root: &Path) -> Vec<(String, PathBuf, Header)> {
    let mut papers = Vec::new();
    for entry in WalkDir::new(clippings_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(is_markdown_entry)
    {
        let path = entry.path().to_path_buf();
        match corpus_frontmatter::parse(&path) {
            Ok((header, _body)) => {
                let citation_key = citation_key_of(&header, &path);
                papers.push((citation_key, path, header));
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unparseable paper during status walk");
            }
        }
    }
    papers
}

/// `load_all` (spec §4.2): `citation_key -> (step -> status)` for the whole corpus.
pub fn load_all(clippings_root: &Path) -> IndexMap<String, IndexMap<String, String>> {
    let mut result = IndexMap::new();
    for (citation_key, _path, header) in walk_papers(clippings_root) {
        let mut steps = IndexMap::new();
        for step in STEP_NAMES {
            steps.insert(step.to_string(), header::status_of(&header, step).to_string());
        }
        result.insert(citation_key, steps);
    }
    result
}

/// `get_papers_needing` (spec §4.2): papers whose recorded status for `step`
/// is `pending` or `failed` (absent counts as `pending`), optionally
/// restricted to `target_keys`.
pub fn get_papers_needing(
    clippings_root: &Path,
    step: &str,
    target_keys: Option<&[String]>,
) -> Vec<PathBuf> {
    let wanted: Option<HashSet<&str>> =
        target_keys.map(|keys| keys.iter().map(String::as_str).collect());

    walk_papers(clippings_root)
        .into_iter()
        .filter(|(citation_key, _path, _header)| {
            wanted
                .as_ref()
                .map(|keys| keys.contains(citation_key.as_str()))
                .unwrap_or(true)
        })
        .filter(|(_citation_key, _path, header)| {
            matches!(header::status_of(header, step), "pending" | "failed")
        })
        .map(|(_citation_key, path, _header)| path)
        .collect()
}

fn append_timestamp_record(header: &mut Header, step: &str, status: &str) {
    let mut timestamps = match header::get(header, "processing_timestamps") {
        Some(Value::Mapping(m)) => m.clone(),
        _ => serde_yaml::Mapping::new(),
    };
    let mut history = match timestamps.get(&header::key(step)) {
        Some(Value::Sequence(seq)) => seq.clone(),
        _ => Vec::new(),
    };
    let mut record = serde_yaml::Mapping::new();
    record.insert(header::key("status"), Value::String(status.to_string()));
    record.insert(
        header::key("recorded_at"),
        Value::String(header::now_iso8601()),
    );
    history.push(Value::Mapping(record));
    timestamps.insert(header::key(step), Value::Sequence(history));
    header::set(header, "processing_timestamps", Value::Mapping(timestamps));
}

fn paper_path(clippings_root: &Path, citation_key: &str) -> PathBuf {
    clippings_root
        .join(citation_key)
        .join(format!("{citation_key}.md"))
}

fn restore_from_latest_backup(path: &Path, backup_dir: &Path) -> Option<()> {
    let file_name = path.file_name()?.to_str()?;
    let mut candidates: Vec<PathBuf> = fs::read_dir(backup_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(file_name))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    let latest = candidates.last()?;
    fs::copy(latest, path).ok()?;
    Some(())
}

/// `update` (spec §4.2): the only mutator of `processing_status`.
///
/// Backs up the target (policy-gated), re-parses through the front-matter
/// codec, validates (policy-gated), sets `processing_status[step]`,
/// refreshes `last_updated`, appends a `processing_timestamps[step]`
/// record, and writes atomically. A YAML parse failure triggers repair and
/// one retry; a write failure triggers backup restoration and one retry.
/// Failure surviving both recoveries surfaces to the caller.
pub fn update(
    clippings_root: &Path,
    citation_key: &str,
    step: &str,
    new_status: &str,
    policy: &StatusPolicy,
) -> Result<(), CorpusError> {
    let path = paper_path(clippings_root, citation_key);
    let backups = backup_dir(clippings_root);

    if policy.auto_backup && policy.backup_before_status_update && path.exists() {
        corpus_frontmatter::backup_file(&path, &backups)?;
    }

    let mut attempted_repair = false;
    let header = loop {
        match corpus_frontmatter::parse(&path) {
            Ok((header, _body)) => break header,
            Err(err @ corpus_errors::CorpusError::Yaml { .. }) if !attempted_repair => {
                if policy.create_backup_on_yaml_error && policy.auto_repair_corrupted_headers {
                    attempted_repair = true;
                    corpus_frontmatter::repair(&path, &backups)?;
                    continue;
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        }
    };

    if policy.validate_yaml_before_update && policy.yaml_validation {
        header::validate_structure(&header)?;
    }

    let mut header = header;
    header::set_status(&mut header, step, new_status);
    header::set_str(&mut header, "last_updated", header::now_iso8601());
    if policy.detailed_timestamp_tracking {
        append_timestamp_record(&mut header, step, new_status);
    }

    let (_existing_header, body) = corpus_frontmatter::parse(&path)?;
    write_with_retry(&path, &header, &body, policy, &backups, true)
}

fn write_with_retry(
    path: &Path,
    header: &Header,
    body: &str,
    policy: &StatusPolicy,
    backups: &Path,
    allow_retry: bool,
) -> Result<(), CorpusError> {
    match corpus_frontmatter::codec::write(path, header, body, None) {
        Ok(()) => Ok(()),
        Err(err) => {
            if allow_retry
                && policy.fallback_to_backup_on_failure
                && restore_from_latest_backup(path, backups).is_some()
            {
                return write_with_retry(path, header, body, policy, backups, false);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_frontmatter::header::set_str;
    use serde_yaml::Mapping;
    use tempfile::tempdir;

    fn write_paper(root: &Path, citation_key: &str) {
        let mut header = Header::new();
        set_str(&mut header, "citation_key", citation_key);
        set_str(&mut header, "workflow_version", "3.2");
        header::set(&mut header, "processing_status", Value::Mapping(Mapping::new()));
        let path = paper_path(root, citation_key);
        corpus_frontmatter::codec::write(&path, &header, "body\n", None).unwrap();
    }

    #[test]
    fn load_all_defaults_missing_steps_to_pending() {
        let dir = tempdir().unwrap();
        write_paper(dir.path(), "smith2023test");
        let all = load_all(dir.path());
        let steps = all.get("smith2023test").unwrap();
        assert_eq!(steps.get("organize").map(String::as_str), Some("pending"));
    }

    #[test]
    fn update_sets_status_and_timestamp_record() {
        let dir = tempdir().unwrap();
        write_paper(dir.path(), "smith2023test");
        let policy = StatusPolicy::default();
        update(dir.path(), "smith2023test", "organize", "completed", &policy).unwrap();

        let (header, _) = corpus_frontmatter::parse(&paper_path(dir.path(), "smith2023test")).unwrap();
        assert_eq!(header::status_of(&header, "organize"), "completed");
        match header::get(&header, "processing_timestamps") {
            Some(Value::Mapping(m)) => assert!(m.contains_key(&header::key("organize"))),
            other => panic!("expected timestamps mapping, got {other:?}"),
        }
    }

    #[test]
    fn get_papers_needing_treats_absent_as_pending() {
        let dir = tempdir().unwrap();
        write_paper(dir.path(), "a2023one");
        write_paper(dir.path(), "b2023two");
        let policy = StatusPolicy::default();
        update(dir.path(), "a2023one", "organize", "completed", &policy).unwrap();

        let needing = get_papers_needing(dir.path(), "organize", None);
        assert_eq!(needing.len(), 1);
        assert!(needing[0].ends_with("b2023two.md"));
    }

    #[test]
    fn get_papers_needing_respects_target_keys() {
        let dir = tempdir().unwrap();
        write_paper(dir.path(), "a2023one");
        write_paper(dir.path(), "b2023two");
        let needing = get_papers_needing(
            dir.path(),
            "organize",
            Some(&["a2023one".to_string()]),
        );
        assert_eq!(needing.len(), 1);
        assert!(needing[0].ends_with("a2023one.md"));
    }

    #[test]
    fn failed_and_pending_are_both_in_needing_set() {
        let dir = tempdir().unwrap();
        write_paper(dir.path(), "a2023one");
        let policy = StatusPolicy::default();
        update(dir.path(), "a2023one", "fetch", "failed", &policy).unwrap();
        let needing = get_papers_needing(dir.path(), "fetch", None);
        assert_eq!(needing.len(), 1);
    }
}
