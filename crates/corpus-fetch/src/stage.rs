use std::path::Path;

use corpus_errors::CorpusError;
use corpus_frontmatter::header::{self, Header};
use corpus_providers::{CitationProvider, CrossRefClient, OpenCitationsClient, RateLimiter, SemanticScholarClient};
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::emission::to_output_entries;
use crate::orchestrator::fetch_with_fallback;
use crate::statistics::Statistics;

/// Providers in their fixed fallback order (spec §4.5 table: P1, P2, P3).
pub fn default_providers(client: reqwest::Client) -> Vec<Box<dyn CitationProvider>> {
    vec![
        Box::new(CrossRefClient::new(client.clone())),
        Box::new(SemanticScholarClient::new(client.clone())),
        Box::new(OpenCitationsClient::new(client)),
    ]
}

/// Extract and normalize the DOI from a paper's header (spec §4.5). `None`
/// means the fetch step should be skipped for this paper, leaving its
/// status `pending`.
pub fn extract_doi(header: &Header) -> Option<String> {
    header::get_str(header, "doi").and_then(corpus_frontmatter::doi::normalize)
}

/// Full outcome of processing one paper's fetch step, used by the
/// workflow driver to decide the next `processing_status` value.
pub enum StageOutcome {
    Skipped,
    Completed,
    Failed,
}

/// Run the fetch stage for a single paper (spec §4.5): extract the DOI,
/// fetch with fallback, emit `references.bib`, and update front-matter.
/// The caller (C10) owns advancing `processing_status` elsewhere; this
/// function performs the front-matter writes the spec assigns to the
/// fetch step itself (`citation_metadata`, `citations`, `references.bib`).
pub async fn run(
    paper_path: &Path,
    providers: &[Box<dyn CitationProvider>],
    limiter: &RateLimiter,
) -> Result<StageOutcome, CorpusError> {
    let (mut header, body) = corpus_frontmatter::parse(paper_path)?;

    let doi = match extract_doi(&header) {
        Some(doi) => doi,
        None => {
            warn!(path = %paper_path.display(), "no valid DOI, skipping fetch");
            return Ok(StageOutcome::Skipped);
        }
    };

    let mut stats = Statistics::new();
    let outcome = fetch_with_fallback(&doi, providers, limiter, &mut stats).await;

    let Some(outcome) = outcome else {
        return Ok(StageOutcome::Failed);
    };

    let paper_dir = paper_path.parent().unwrap_or_else(|| Path::new("."));
    let references_bib_path = paper_dir.join("references.bib");
    let output_entries = to_output_entries(&outcome.references);
    corpus_bibliography::write_bibtex(&references_bib_path, &output_entries)?;

    write_citations(&mut header, &output_entries);
    write_citation_metadata(&mut header, &outcome, &stats, output_entries.len());
    header::set_str(&mut header, "last_updated", header::now_iso8601());

    corpus_frontmatter::write(paper_path, &header, &body, None)?;
    Ok(StageOutcome::Completed)
}

fn write_citations(header: &mut Header, entries: &[corpus_bibliography::OutputEntry]) {
    let mut citations = Mapping::new();
    for (i, entry) in entries.iter().enumerate() {
        let ordinal = i as u32 + 1;
        let mut record = Mapping::new();
        record.insert(Value::String("citation_key".into()), Value::String(entry.citation_key.clone()));
        for (field, out_key) in [
            ("title", "title"),
            ("author", "authors"),
            ("year", "year"),
            ("journal", "journal"),
            ("doi", "doi"),
        ] {
            if let Some(value) = entry.fields.get(field) {
                record.insert(Value::String(out_key.into()), Value::String(value.clone()));
            }
        }
        citations.insert(Value::Number(ordinal.into()), Value::Mapping(record));
    }
    header::set(header, "citations", Value::Mapping(citations));
}

fn write_citation_metadata(
    header: &mut Header,
    outcome: &crate::orchestrator::FetchOutcome,
    stats: &Statistics,
    total_references: usize,
) {
    let mut metadata = Mapping::new();
    let now = header::now_iso8601();
    metadata.insert(Value::String("last_updated".into()), Value::String(now.clone()));
    metadata.insert(Value::String("fetch_completed_at".into()), Value::String(now));
    metadata.insert(
        Value::String("primary_api_used".into()),
        Value::String(outcome.api_used.to_string()),
    );
    metadata.insert(
        Value::String("total_references_found".into()),
        Value::Number((total_references as u64).into()),
    );
    metadata.insert(
        Value::String("total_citations".into()),
        Value::Number((total_references as u64).into()),
    );
    metadata.insert(
        Value::String("quality_score".into()),
        Value::Number(serde_yaml::Number::from(outcome.quality_score)),
    );
    metadata.insert(
        Value::String("references_bib_path".into()),
        Value::String("references.bib".to_string()),
    );
    metadata.insert(Value::String("api_statistics".into()), stats.to_yaml());

    header::set(header, "citation_metadata", Value::Mapping(metadata));
    header::set_status(header, "fetch", "completed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_frontmatter::header::set_str;
    use tempfile::tempdir;

    fn write_paper(dir: &Path, doi: Option<&str>) -> std::path::PathBuf {
        let mut header = Header::new();
        set_str(&mut header, "citation_key", "smith2023test");
        set_str(&mut header, "workflow_version", "3.2");
        if let Some(doi) = doi {
            set_str(&mut header, "doi", doi);
        }
        header::set(&mut header, "processing_status", Value::Mapping(Mapping::new()));
        let path = dir.join("smith2023test.md");
        corpus_frontmatter::write(&path, &header, "Body.\n", None).unwrap();
        path
    }

    #[tokio::test]
    async fn skips_when_no_doi() {
        let dir = tempdir().unwrap();
        let path = write_paper(dir.path(), None);
        let providers: Vec<Box<dyn CitationProvider>> = vec![];
        let limiter = RateLimiter::new();
        let outcome = run(&path, &providers, &limiter).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Skipped));
    }

    #[tokio::test]
    async fn fails_when_all_providers_exhausted() {
        let dir = tempdir().unwrap();
        let path = write_paper(dir.path(), Some("10.1038/example"));
        let providers: Vec<Box<dyn CitationProvider>> = vec![];
        let limiter = RateLimiter::new();
        let outcome = run(&path, &providers, &limiter).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Failed));
        assert!(!dir.path().join("references.bib").exists());
    }
}
