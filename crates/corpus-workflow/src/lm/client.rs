use std::time::Duration;

use async_trait::async_trait;
use corpus_errors::{ApiError, CorpusError};
use serde_json::json;
use tokio::time::sleep;

/// `lm_stage.*` config surface (spec §6 supplement, `SPEC_FULL.md` §1.3):
/// the LM round-trip contract, never the prompt content itself.
#[derive(Debug, Clone)]
pub struct LmStageConfig {
    pub enabled: bool,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub request_delay_secs: f64,
}

impl Default for LmStageConfig {
    fn default() -> Self {
        LmStageConfig {
            enabled: true,
            model: "claude-3-5-haiku-20241022".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            request_delay_secs: 0.5,
        }
    }
}

/// Generic "send a prompt, get text back" capability so the tagger,
/// translator, and Ochiai-format stages never talk to `reqwest` directly
/// (spec §9's closed-capability posture, mirrored from `Logger`).
#[async_trait]
pub trait LmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CorpusError>;
}

/// Claude client (spec §4.7/`SPEC_FULL.md` §2 "LM round-trip contract"),
/// grounded on `claude_api_client.py`'s request/response and retry shape:
/// lazy-validated API key, exponential backoff (`2^attempt` seconds)
/// across `max_retries` attempts, inter-request rate limiting.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    config: LmStageConfig,
}

impl AnthropicClient {
    pub fn new(config: LmStageConfig) -> Result<Self, CorpusError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CorpusError::configuration(
                format!("API key not found in environment variable: {}", config.api_key_env),
                "LM_MISSING_API_KEY",
            )
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CorpusError::configuration(e.to_string(), "LM_CLIENT_BUILD"))?;

        Ok(AnthropicClient { http, api_key, config })
    }

    async fn send_once(&self, prompt: &str) -> Result<String, CorpusError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": 4096,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CorpusError::api(
                format!("Claude API returned HTTP {status}"),
                "LM_HTTP_STATUS",
                ApiError::Http { status: status.as_u16() },
            ));
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| {
            CorpusError::api(
                format!("Claude API response is not valid JSON: {e}"),
                "LM_INVALID_JSON",
                ApiError::InvalidJson(e.to_string()),
            )
        })?;

        parsed
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                CorpusError::api(
                    "Claude API response missing content[0].text",
                    "LM_INVALID_JSON",
                    ApiError::InvalidJson("missing content[0].text".to_string()),
                )
            })
    }
}

fn classify_transport_error(err: reqwest::Error) -> CorpusError {
    if err.is_timeout() {
        CorpusError::api("Claude API request timed out", "LM_TIMEOUT", ApiError::Timeout)
    } else {
        CorpusError::api(
            format!("Claude API connection failed: {err}"),
            "LM_CONNECT",
            ApiError::Connect(err.to_string()),
        )
    }
}

#[async_trait]
impl LmClient for AnthropicClient {
    /// Retries `max_retries` times with exponential backoff (`2^attempt`
    /// seconds) before surfacing the last failure, exactly as
    /// `ClaudeAPIClient.send_request` does.
    async fn complete(&self, prompt: &str) -> Result<String, CorpusError> {
        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            match self.send_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "Claude API request failed");
                    last_err = Some(err);
                    if attempt < self.config.max_retries {
                        sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            CorpusError::processing("Claude API request failed with no recorded error", "LM_UNKNOWN")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        // SAFETY: test runs single-threaded w.r.t. this env var and restores it.
        let saved = std::env::var("CORPUS_WORKFLOW_TEST_MISSING_KEY").ok();
        std::env::remove_var("CORPUS_WORKFLOW_TEST_MISSING_KEY");

        let mut config = LmStageConfig::default();
        config.api_key_env = "CORPUS_WORKFLOW_TEST_MISSING_KEY".to_string();
        let err = AnthropicClient::new(config).unwrap_err();
        assert_eq!(err.error_code(), "LM_MISSING_API_KEY");

        if let Some(value) = saved {
            std::env::set_var("CORPUS_WORKFLOW_TEST_MISSING_KEY", value);
        }
    }
}
