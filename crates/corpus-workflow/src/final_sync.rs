use std::path::Path;

use corpus_errors::CorpusError;
use corpus_frontmatter::header;
use corpus_sync::{check_workspace, PaperConsistency, SyncPolicy, SyncSummary};

/// `final_sync` (spec §4.7 last stage): a second consistency pass once
/// every earlier stage has run, so drift introduced by the LM stages
/// (citation counts, renamed files under `ai_content`) is caught before
/// the pipeline calls a paper done. Reuses C8's checker outright rather
/// than re-deriving its drift rules; only the `processing_status.final_sync`
/// write is new, since `check_workspace` itself only ever advances `sync`.
pub fn run(
    clippings_root: &Path,
    bibliography_path: &Path,
    policy: &SyncPolicy,
) -> Result<SyncSummary, CorpusError> {
    let summary = check_workspace(clippings_root, bibliography_path, policy)?;

    for paper in &summary.papers {
        advance_final_sync_status(paper)?;
    }

    Ok(summary)
}

fn advance_final_sync_status(paper: &PaperConsistency) -> Result<(), CorpusError> {
    let (mut header, body) = corpus_frontmatter::parse(&paper.path)?;
    let status = if paper.issues.is_empty() { "completed" } else { "failed" };
    header::set_status(&mut header, "final_sync", status);
    header::set_str(&mut header, "last_updated", header::now_iso8601());
    corpus_frontmatter::write(&paper.path, &header, &body, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::{Mapping, Value};
    use std::fs;
    use tempfile::tempdir;

    fn write_bib(path: &Path) {
        fs::write(
            path,
            "@article{a2023,\n  title = {Paper A},\n  author = {A, B},\n  journal = {J},\n  year = {2023},\n  doi = {10.1/a},\n}\n",
        )
        .unwrap();
    }

    fn write_paper(dir: &Path, citation_key: &str, doi: &str, title: &str) -> std::path::PathBuf {
        let mut header = corpus_frontmatter::header::Header::new();
        header::set_str(&mut header, "citation_key", citation_key);
        header::set_str(&mut header, "doi", doi);
        header::set_str(&mut header, "title", title);
        header::set(&mut header, "processing_status", Value::Mapping(Mapping::new()));
        let dir_path = dir.join(citation_key);
        fs::create_dir_all(&dir_path).unwrap();
        let path = dir_path.join(format!("{citation_key}.md"));
        corpus_frontmatter::write(&path, &header, "Body.\n", None).unwrap();
        path
    }

    #[test]
    fn clean_paper_completes_final_sync() {
        let dir = tempdir().unwrap();
        let clippings = dir.path().join("Clippings");
        fs::create_dir_all(&clippings).unwrap();
        let bib_path = dir.path().join("CurrentManuscript.bib");
        write_bib(&bib_path);
        let paper_path = write_paper(&clippings, "a2023", "10.1/a", "Paper A");

        run(&clippings, &bib_path, &SyncPolicy::default()).unwrap();

        let (header, _) = corpus_frontmatter::parse(&paper_path).unwrap();
        assert_eq!(header::status_of(&header, "final_sync"), "completed");
    }

    #[test]
    fn drifted_paper_fails_final_sync() {
        let dir = tempdir().unwrap();
        let clippings = dir.path().join("Clippings");
        fs::create_dir_all(&clippings).unwrap();
        let bib_path = dir.path().join("CurrentManuscript.bib");
        write_bib(&bib_path);
        let paper_path = write_paper(&clippings, "a2023", "10.1/different", "Paper A");

        run(&clippings, &bib_path, &SyncPolicy::default()).unwrap();

        let (header, _) = corpus_frontmatter::parse(&paper_path).unwrap();
        assert_eq!(header::status_of(&header, "final_sync"), "failed");
    }
}
