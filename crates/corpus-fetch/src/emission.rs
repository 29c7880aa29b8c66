use corpus_bibliography::OutputEntry;
use corpus_providers::Reference;
use indexmap::IndexMap;

use crate::key_synthesis::synthesize_key;

/// Convert an accepted reference list into `references.bib` entries (spec
/// §4.5 Emission): sorted alphabetically by title (stable), ordinal
/// assigned from 1, synthetic key per entry, `article` if `journal` is
/// present else `misc`, `number` field equal to the ordinal.
pub fn to_output_entries(references: &[Reference]) -> Vec<OutputEntry> {
    let mut ordered: Vec<&Reference> = references.iter().collect();
    ordered.sort_by(|a, b| {
        let title_a = a.title.as_deref().unwrap_or("");
        let title_b = b.title.as_deref().unwrap_or("");
        title_a.cmp(title_b)
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, reference)| {
            let ordinal = i as u32 + 1;
            let citation_key = synthesize_key(reference, ordinal);
            let entry_type = if reference.journal.is_some() { "article" } else { "misc" };

            let mut fields = IndexMap::new();
            if let Some(title) = &reference.title {
                fields.insert("title".to_string(), title.clone());
            }
            if let Some(authors) = &reference.authors {
                fields.insert("author".to_string(), authors.clone());
            }
            if let Some(journal) = &reference.journal {
                fields.insert("journal".to_string(), journal.clone());
            }
            if let Some(year) = reference.year {
                fields.insert("year".to_string(), year.to_string());
            }
            if let Some(volume) = &reference.volume {
                fields.insert("volume".to_string(), volume.clone());
            }
            if let Some(pages) = &reference.pages {
                fields.insert("pages".to_string(), pages.clone());
            }
            if let Some(doi) = &reference.doi {
                fields.insert("doi".to_string(), doi.clone());
            }
            if let Some(url) = &reference.url {
                fields.insert("url".to_string(), url.clone());
            }
            fields.insert("number".to_string(), ordinal.to_string());

            OutputEntry {
                citation_key,
                entry_type: entry_type.to_string(),
                fields,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_alphabetically_by_title_and_numbers_from_one() {
        let references = vec![
            Reference {
                title: Some("Zebra Study".to_string()),
                journal: Some("J".to_string()),
                ..Default::default()
            },
            Reference {
                title: Some("Alpha Study".to_string()),
                ..Default::default()
            },
        ];
        let entries = to_output_entries(&references);
        assert_eq!(entries[0].fields.get("title").unwrap(), "Alpha Study");
        assert_eq!(entries[0].fields.get("number").unwrap(), "1");
        assert_eq!(entries[1].fields.get("title").unwrap(), "Zebra Study");
        assert_eq!(entries[1].entry_type, "article");
        assert_eq!(entries[0].entry_type, "misc");
    }

    #[test]
    fn article_type_when_journal_present() {
        let references = vec![Reference {
            title: Some("A Paper".to_string()),
            journal: Some("Journal of X".to_string()),
            ..Default::default()
        }];
        let entries = to_output_entries(&references);
        assert_eq!(entries[0].entry_type, "article");
    }
}
