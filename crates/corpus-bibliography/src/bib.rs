use std::collections::HashMap;
use std::fs;
use std::path::Path;

use corpus_errors::CorpusError;
use indexmap::IndexMap;
use tracing::warn;

use crate::entry::{parse_bibliography, BibEntry};

/// Keyed view (duplicates collapsed, first occurrence wins) — used by the
/// organize engine (C7) to match files by DOI (spec §4.3 step 1).
pub fn parse_keyed(path: &Path) -> Result<IndexMap<String, BibEntry>, CorpusError> {
    let content = fs::read_to_string(path).map_err(|e| CorpusError::from(e).with_path(path))?;
    let bibliography = parse_bibliography(&content)?;

    let mut by_key: IndexMap<String, BibEntry> = IndexMap::new();
    for raw in bibliography.iter() {
        let entry = BibEntry::from_biblatex(raw);
        if let Some(existing) = by_key.get(&entry.citation_key) {
            if existing.doi != entry.doi {
                warn!(
                    citation_key = %entry.citation_key,
                    existing_doi = ?existing.doi,
                    new_doi = ?entry.doi,
                    "conflicting duplicate bibliography entry, keeping first occurrence"
                );
            }
            continue;
        }
        by_key.insert(entry.citation_key.clone(), entry);
    }
    Ok(by_key)
}

/// Ordered view, duplicates preserved, each element carrying its 1-based
/// `number` (used by reference integration).
pub fn parse_ordered(path: &Path) -> Result<Vec<(u32, BibEntry)>, CorpusError> {
    let content = fs::read_to_string(path).map_err(|e| CorpusError::from(e).with_path(path))?;
    let bibliography = parse_bibliography(&content)?;

    Ok(bibliography
        .iter()
        .enumerate()
        .map(|(i, raw)| (i as u32 + 1, BibEntry::from_biblatex(raw)))
        .collect())
}

/// `doi (normalized) -> citation_key` map built from the keyed view (spec
/// §4.3 step 1).
pub fn doi_map(entries: &IndexMap<String, BibEntry>) -> HashMap<String, String> {
    entries
        .values()
        .filter_map(|entry| entry.doi.clone().map(|doi| (doi, entry.citation_key.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_bib(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const SAMPLE: &str = r#"
@article{smith2023test,
  title = {A Test Paper},
  author = {Smith, John},
  journal = {Journal of Testing},
  year = {2023},
  doi = {10.1038/EXAMPLE},
}

@article{jones2022other,
  title = {Another Paper},
  author = {Jones, Amy},
  journal = {Journal of Other Things},
  year = {2022},
  doi = {10.1038/other},
}
"#;

    #[test]
    fn parse_keyed_collapses_and_normalizes_doi() {
        let file = write_bib(SAMPLE);
        let entries = parse_keyed(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        let smith = entries.get("smith2023test").unwrap();
        assert_eq!(smith.doi.as_deref(), Some("10.1038/example"));
    }

    #[test]
    fn parse_ordered_preserves_position() {
        let file = write_bib(SAMPLE);
        let ordered = parse_ordered(file.path()).unwrap();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].0, 1);
        assert_eq!(ordered[0].1.citation_key, "smith2023test");
        assert_eq!(ordered[1].0, 2);
        assert_eq!(ordered[1].1.citation_key, "jones2022other");
    }

    #[test]
    fn doi_map_is_keyed_by_normalized_doi() {
        let file = write_bib(SAMPLE);
        let entries = parse_keyed(file.path()).unwrap();
        let map = doi_map(&entries);
        assert_eq!(
            map.get("10.1038/example").map(String::as_str),
            Some("smith2023test")
        );
    }

    #[test]
    fn required_fields_validate_for_article() {
        let file = write_bib(SAMPLE);
        let entries = parse_keyed(file.path()).unwrap();
        for entry in entries.values() {
            assert!(entry.validate_required_fields().is_ok());
        }
    }
}
