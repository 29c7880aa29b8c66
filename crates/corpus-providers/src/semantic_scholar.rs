use async_trait::async_trait;
use corpus_errors::CorpusError;

use crate::provider::{get_json, CitationProvider, ProviderSettings};
use crate::reference::Reference;

pub struct SemanticScholarClient {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl SemanticScholarClient {
    pub fn new(client: reqwest::Client) -> Self {
        SemanticScholarClient {
            client,
            settings: ProviderSettings::semantic_scholar(),
        }
    }
}

fn map_reference(entry: &serde_json::Value) -> Reference {
    let cited = entry.get("citedPaper").cloned().unwrap_or_default();

    let authors = cited.get("authors").and_then(|v| v.as_array()).map(|arr| {
        arr.iter()
            .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    });

    Reference {
        title: cited.get("title").and_then(|v| v.as_str()).map(str::to_string),
        authors,
        journal: cited.get("venue").and_then(|v| v.as_str()).map(str::to_string),
        year: cited.get("year").and_then(|v| v.as_i64()).map(|y| y as i32),
        volume: None,
        number: None,
        pages: None,
        doi: cited
            .get("externalIds")
            .and_then(|ids| ids.get("DOI"))
            .and_then(|v| v.as_str())
            .and_then(corpus_frontmatter::doi::normalize),
        url: cited.get("url").and_then(|v| v.as_str()).map(str::to_string),
        abstract_text: cited.get("abstract").and_then(|v| v.as_str()).map(str::to_string),
        keywords: None,
        citation_count: cited
            .get("citationCount")
            .and_then(|v| v.as_u64())
            .map(|c| c as u32),
        extra: Default::default(),
    }
}

#[async_trait]
impl CitationProvider for SemanticScholarClient {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn fetch_references(&self, doi: &str) -> Result<Vec<Reference>, CorpusError> {
        let url = format!("{}/graph/v1/paper/{doi}/references", self.settings.base_url);
        let body = match get_json(&self.client, &self.settings, &url).await? {
            Some(body) => body,
            None => return Ok(Vec::new()),
        };

        let references = body
            .get("data")
            .and_then(|d| d.as_array())
            .map(|arr| arr.iter().map(map_reference).collect())
            .unwrap_or_default();
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_author_names_and_extracts_doi() {
        let entry = serde_json::json!({
            "citedPaper": {
                "title": "A Test Paper",
                "authors": [{"name": "Smith, J."}, {"name": "Doe, A."}],
                "venue": "Journal of Testing",
                "year": 2023,
                "externalIds": {"DOI": "10.1038/EXAMPLE"},
                "citationCount": 42,
            }
        });
        let r = map_reference(&entry);
        assert_eq!(r.authors.as_deref(), Some("Smith, J., Doe, A."));
        assert_eq!(r.doi.as_deref(), Some("10.1038/example"));
        assert_eq!(r.citation_count, Some(42));
    }
}
