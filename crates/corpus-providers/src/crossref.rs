use async_trait::async_trait;
use corpus_errors::CorpusError;

use crate::provider::{get_json, CitationProvider, ProviderSettings};
use crate::reference::Reference;

pub struct CrossRefClient {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl CrossRefClient {
    pub fn new(client: reqwest::Client) -> Self {
        CrossRefClient {
            client,
            settings: ProviderSettings::crossref(),
        }
    }
}

fn map_reference(entry: &serde_json::Value) -> Reference {
    let year = entry
        .get("year")
        .and_then(|v| v.as_str().and_then(|s| s.parse::<i32>().ok()).or_else(|| v.as_i64().map(|y| y as i32)));

    Reference {
        title: entry
            .get("article-title")
            .and_then(|v| v.as_str())
            .or_else(|| entry.get("unstructured").and_then(|v| v.as_str()))
            .map(str::to_string),
        authors: entry.get("author").and_then(|v| v.as_str()).map(str::to_string),
        journal: entry
            .get("journal-title")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        year,
        volume: entry.get("volume").and_then(|v| v.as_str()).map(str::to_string),
        number: None,
        pages: entry.get("page").and_then(|v| v.as_str()).map(str::to_string),
        doi: entry
            .get("DOI")
            .and_then(|v| v.as_str())
            .and_then(corpus_frontmatter::doi::normalize),
        url: None,
        abstract_text: None,
        keywords: None,
        citation_count: None,
        extra: Default::default(),
    }
}

#[async_trait]
impl CitationProvider for CrossRefClient {
    fn name(&self) -> &'static str {
        "crossref"
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn fetch_references(&self, doi: &str) -> Result<Vec<Reference>, CorpusError> {
        let url = format!("{}/works/{doi}", self.settings.base_url);
        let body = match get_json(&self.client, &self.settings, &url).await? {
            Some(body) => body,
            None => return Ok(Vec::new()),
        };

        let references = body
            .get("message")
            .and_then(|m| m.get("reference"))
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().map(map_reference).collect())
            .unwrap_or_default();
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_crossref_reference_shape() {
        let entry = serde_json::json!({
            "article-title": "A Test Paper",
            "journal-title": "Journal of Testing",
            "author": "Smith",
            "year": "2023",
            "volume": "12",
            "page": "1-10",
            "DOI": "10.1038/EXAMPLE",
        });
        let r = map_reference(&entry);
        assert_eq!(r.title.as_deref(), Some("A Test Paper"));
        assert_eq!(r.year, Some(2023));
        assert_eq!(r.doi.as_deref(), Some("10.1038/example"));
    }
}
