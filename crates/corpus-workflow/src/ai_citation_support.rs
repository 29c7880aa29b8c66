use std::path::Path;

use serde_yaml::{Mapping, Value};

use corpus_bibliography::{parse_ordered, BibEntry};
use corpus_errors::CorpusError;
use corpus_frontmatter::header::{self, Header};

/// Outcome of one paper's `ai_citation_support` pass. `references.bib` is
/// written by the fetch stage; a paper that never got one isn't a failure,
/// it just hasn't reached this step's precondition yet (mirrors the
/// original's `ProcessingStatus.SKIPPED` without adding a fourth status
/// value outside `VALID_STATUSES` — the step is simply left `pending`).
pub enum Outcome {
    Completed { total_citations: usize },
    NoReferencesBib,
}

fn entry_to_citation(entry: &BibEntry) -> Value {
    let mut m = Mapping::new();
    m.insert(Value::String("citation_key".into()), Value::String(entry.citation_key.clone()));
    m.insert(
        Value::String("title".into()),
        entry.title.clone().map(Value::String).unwrap_or(Value::Null),
    );
    m.insert(
        Value::String("authors".into()),
        entry.author.clone().map(Value::String).unwrap_or(Value::Null),
    );
    m.insert(
        Value::String("year".into()),
        entry.year.map(|y| Value::Number(y.into())).unwrap_or(Value::Null),
    );
    m.insert(
        Value::String("journal".into()),
        entry.journal.clone().map(Value::String).unwrap_or(Value::Null),
    );
    m.insert(
        Value::String("doi".into()),
        entry.doi.clone().map(Value::String).unwrap_or(Value::Null),
    );
    Value::Mapping(m)
}

/// Build the ordinal-keyed `citations` mapping plus its `citation_metadata`
/// sibling (mirrors `create_citation_mapping`).
fn build_citations(entries: &[(u32, BibEntry)], references_bib_path: &str, now: &str) -> (Mapping, Mapping) {
    let mut citations = Mapping::new();
    for (ordinal, entry) in entries {
        citations.insert(Value::Number((*ordinal).into()), entry_to_citation(entry));
    }

    let mut metadata = Mapping::new();
    metadata.insert(Value::String("last_updated".into()), Value::String(now.to_string()));
    metadata.insert(Value::String("mapping_version".into()), Value::String("2.0".to_string()));
    metadata.insert(Value::String("source_bibtex".into()), Value::String("references.bib".to_string()));
    metadata.insert(
        Value::String("references_bib_path".into()),
        Value::String(references_bib_path.to_string()),
    );
    metadata.insert(Value::String("total_citations".into()), Value::Number((entries.len() as u64).into()));

    (citations, metadata)
}

/// Merge freshly-built citations into any pre-existing `citations` mapping.
/// `preserve_existing_citations` (default true, spec §6) keeps manually
/// curated entries that survive a re-run; set false to let the fresh
/// bibliography win outright.
fn merge_citations(existing: Option<Mapping>, fresh: Mapping, preserve_existing: bool) -> Mapping {
    let mut merged = if preserve_existing {
        existing.unwrap_or_default()
    } else {
        Mapping::new()
    };
    for (k, v) in fresh {
        merged.insert(k, v);
    }
    merged
}

/// Run the `ai_citation_support` step for one paper directory. Looks for
/// `references.bib` next to the paper (written by the fetch stage);
/// if absent, returns `Outcome::NoReferencesBib` and leaves the header
/// untouched so the driver's re-entrancy picks it up once fetch succeeds.
pub fn run(
    paper_dir: &Path,
    header: &mut Header,
    now: &str,
    preserve_existing_citations: bool,
) -> Result<Outcome, CorpusError> {
    let references_path = paper_dir.join("references.bib");
    if !references_path.is_file() {
        return Ok(Outcome::NoReferencesBib);
    }

    let entries = parse_ordered(&references_path)?;
    let references_bib_path = references_path.to_string_lossy().to_string();
    let (fresh_citations, metadata) = build_citations(&entries, &references_bib_path, now);

    let existing_citations = match header::get(header, "citations") {
        Some(Value::Mapping(m)) => Some(m.clone()),
        _ => None,
    };
    let merged = merge_citations(existing_citations, fresh_citations, preserve_existing_citations);

    header::set(header, "citations", Value::Mapping(merged));
    header::set(header, "citation_metadata", Value::Mapping(metadata));
    header::set_status(header, "ai_citation_support", "completed");
    header::set_str(header, "last_updated", now.to_string());

    Ok(Outcome::Completed { total_citations: entries.len() })
}
