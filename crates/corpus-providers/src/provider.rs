use async_trait::async_trait;
use corpus_errors::{ApiError, CorpusError};

use crate::reference::Reference;

/// Wiring read once at startup from `citation_fetcher.apis.<provider>.*`
/// (spec §6).
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub name: &'static str,
    pub base_url: String,
    pub rate_per_second: f64,
    pub quality_gate: f64,
    pub timeout_secs: u64,
    pub api_key_env: Option<String>,
}

impl ProviderSettings {
    pub fn crossref() -> Self {
        ProviderSettings {
            name: "crossref",
            base_url: "https://api.crossref.org".to_string(),
            rate_per_second: 10.0,
            quality_gate: 0.80,
            timeout_secs: 30,
            api_key_env: None,
        }
    }

    pub fn semantic_scholar() -> Self {
        ProviderSettings {
            name: "semantic_scholar",
            base_url: "https://api.semanticscholar.org".to_string(),
            rate_per_second: 1.0,
            quality_gate: 0.70,
            timeout_secs: 30,
            api_key_env: Some("SEMANTIC_SCHOLAR_API_KEY".to_string()),
        }
    }

    pub fn opencitations() -> Self {
        ProviderSettings {
            name: "opencitations",
            base_url: "https://opencitations.net/index/api/v1".to_string(),
            rate_per_second: 5.0,
            quality_gate: 0.50,
            timeout_secs: 30,
            api_key_env: None,
        }
    }
}

/// Common interface every citation provider implements (spec §4.5).
#[async_trait]
pub trait CitationProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn settings(&self) -> &ProviderSettings;
    async fn fetch_references(&self, doi: &str) -> Result<Vec<Reference>, CorpusError>;
}

const USER_AGENT: &str = "ObsClippingsManager/3.2.0 (Academic Research Tool)";

/// Shared request plumbing: build the client, apply headers, and classify
/// the raw `reqwest::Result` into the provider error taxonomy (spec §4.5,
/// §6 "common request headers").
pub(crate) async fn get_json(
    client: &reqwest::Client,
    settings: &ProviderSettings,
    url: &str,
) -> Result<Option<serde_json::Value>, CorpusError> {
    let mut request = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .header("Accept", "application/json")
        .timeout(std::time::Duration::from_secs(settings.timeout_secs));

    if let Some(env_key) = &settings.api_key_env {
        if let Ok(value) = std::env::var(env_key) {
            request = request.header("x-api-key", value);
        }
    }

    let response = request.send().await.map_err(|e| classify_transport_error(settings, e))?;

    let status = response.status();
    if status.as_u16() == 404 {
        return Ok(None);
    }
    if status.as_u16() == 429 {
        return Err(CorpusError::api(
            format!("{} rate limited the request", settings.name),
            "API_RATE_LIMITED",
            ApiError::RateLimited,
        ));
    }
    if !status.is_success() {
        return Err(CorpusError::api(
            format!("{} returned HTTP {status}", settings.name),
            "API_HTTP_STATUS",
            ApiError::Http { status: status.as_u16() },
        ));
    }

    let body = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| {
            CorpusError::api(
                format!("{} response is not valid JSON: {e}", settings.name),
                "API_INVALID_JSON",
                ApiError::InvalidJson(e.to_string()),
            )
        })?;
    Ok(Some(body))
}

fn classify_transport_error(settings: &ProviderSettings, err: reqwest::Error) -> CorpusError {
    if err.is_timeout() {
        CorpusError::api(
            format!("{} request timed out", settings.name),
            "API_TIMEOUT",
            ApiError::Timeout,
        )
    } else {
        CorpusError::api(
            format!("{} connection failed: {err}", settings.name),
            "API_CONNECT",
            ApiError::Connect(err.to_string()),
        )
    }
}
