use async_trait::async_trait;
use corpus_errors::CorpusError;

use crate::provider::{get_json, CitationProvider, ProviderSettings};
use crate::reference::Reference;

pub struct OpenCitationsClient {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl OpenCitationsClient {
    pub fn new(client: reqwest::Client) -> Self {
        OpenCitationsClient {
            client,
            settings: ProviderSettings::opencitations(),
        }
    }
}

fn extract_year(creation: &str) -> Option<i32> {
    creation.get(0..4).and_then(|y| y.parse().ok())
}

/// OpenCitations edges carry only linkage metadata — `cited` (the DOI),
/// `oci`, `creation`, `timespan` — not the bibliographic fields the other
/// two providers return, so most of the common shape stays `None` here.
fn map_edge(entry: &serde_json::Value) -> Reference {
    let mut extra = std::collections::HashMap::new();
    for field in ["oci", "creation", "timespan"] {
        if let Some(value) = entry.get(field).and_then(|v| v.as_str()) {
            extra.insert(field.to_string(), value.to_string());
        }
    }

    Reference {
        doi: entry
            .get("cited")
            .and_then(|v| v.as_str())
            .and_then(corpus_frontmatter::doi::normalize),
        year: entry
            .get("creation")
            .and_then(|v| v.as_str())
            .and_then(extract_year),
        extra,
        ..Default::default()
    }
}

#[async_trait]
impl CitationProvider for OpenCitationsClient {
    fn name(&self) -> &'static str {
        "opencitations"
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn fetch_references(&self, doi: &str) -> Result<Vec<Reference>, CorpusError> {
        let url = format!("{}/references/{doi}", self.settings.base_url);
        let body = match get_json(&self.client, &self.settings, &url).await? {
            Some(body) => body,
            None => return Ok(Vec::new()),
        };

        let references = body
            .as_array()
            .map(|arr| arr.iter().map(map_edge).collect())
            .unwrap_or_default();
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_citation_edge_to_doi_and_year() {
        let entry = serde_json::json!({
            "cited": "10.1038/EXAMPLE",
            "oci": "0200101-02000202",
            "creation": "2023-05-01",
            "timespan": "P2Y",
        });
        let r = map_edge(&entry);
        assert_eq!(r.doi.as_deref(), Some("10.1038/example"));
        assert_eq!(r.year, Some(2023));
        assert_eq!(r.extra.get("oci").map(String::as_str), Some("0200101-02000202"));
    }
}
