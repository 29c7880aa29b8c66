//! Shared error hierarchy and logging capability interface.
//!
//! Every stage crate returns `Result<T, CorpusError>`; the binary converts
//! to `anyhow::Result` at the top, the way the teacher keeps typed errors
//! inside library crates and only reaches for `anyhow` in `ox-bin`.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use thiserror::Error;

/// Ordered key-value context attached to a surfaced error, e.g. the
/// offending path, DOI, or citation key.
pub type ErrorContext = IndexMap<String, String>;

fn fmt_context(context: &ErrorContext) -> String {
    if context.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = context.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(" [{}]", pairs.join(", "))
}

/// Transport-level failure talking to a citation provider (§7 `APIError`).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limited")]
    RateLimited,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("http status {status}")]
    Http { status: u16 },
    #[error("invalid json response: {0}")]
    InvalidJson(String),
}

/// Top-level error hierarchy (spec §7). Each variant carries a message, a
/// stable `error_code`, and an ordered context map.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("configuration error ({error_code}): {message}{}", fmt_context(.context))]
    Configuration {
        message: String,
        error_code: &'static str,
        context: ErrorContext,
    },
    #[error("validation error ({error_code}): {message}{}", fmt_context(.context))]
    Validation {
        message: String,
        error_code: &'static str,
        context: ErrorContext,
    },
    #[error("filesystem error ({error_code}): {message}{}", fmt_context(.context))]
    FileSystem {
        message: String,
        error_code: &'static str,
        context: ErrorContext,
    },
    #[error("yaml error ({error_code}): {message}{}", fmt_context(.context))]
    Yaml {
        message: String,
        error_code: &'static str,
        context: ErrorContext,
    },
    #[error("bibtex error ({error_code}): {message}{}", fmt_context(.context))]
    BibTex {
        message: String,
        error_code: &'static str,
        context: ErrorContext,
    },
    #[error("api error ({error_code}): {message}{}", fmt_context(.context))]
    Api {
        message: String,
        error_code: &'static str,
        #[source]
        source: ApiError,
        context: ErrorContext,
    },
    #[error("processing error ({error_code}): {message}{}", fmt_context(.context))]
    Processing {
        message: String,
        error_code: &'static str,
        context: ErrorContext,
    },
}

impl CorpusError {
    pub fn error_code(&self) -> &'static str {
        match self {
            CorpusError::Configuration { error_code, .. }
            | CorpusError::Validation { error_code, .. }
            | CorpusError::FileSystem { error_code, .. }
            | CorpusError::Yaml { error_code, .. }
            | CorpusError::BibTex { error_code, .. }
            | CorpusError::Api { error_code, .. }
            | CorpusError::Processing { error_code, .. } => error_code,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            CorpusError::Configuration { context, .. }
            | CorpusError::Validation { context, .. }
            | CorpusError::FileSystem { context, .. }
            | CorpusError::Yaml { context, .. }
            | CorpusError::BibTex { context, .. }
            | CorpusError::Api { context, .. }
            | CorpusError::Processing { context, .. } => context,
        }
    }

    pub fn configuration(message: impl Into<String>, error_code: &'static str) -> Self {
        CorpusError::Configuration {
            message: message.into(),
            error_code,
            context: ErrorContext::new(),
        }
    }

    pub fn validation(message: impl Into<String>, error_code: &'static str) -> Self {
        CorpusError::Validation {
            message: message.into(),
            error_code,
            context: ErrorContext::new(),
        }
    }

    pub fn filesystem(message: impl Into<String>, error_code: &'static str) -> Self {
        CorpusError::FileSystem {
            message: message.into(),
            error_code,
            context: ErrorContext::new(),
        }
    }

    pub fn yaml(message: impl Into<String>, error_code: &'static str) -> Self {
        CorpusError::Yaml {
            message: message.into(),
            error_code,
            context: ErrorContext::new(),
        }
    }

    pub fn bibtex(message: impl Into<String>, error_code: &'static str) -> Self {
        CorpusError::BibTex {
            message: message.into(),
            error_code,
            context: ErrorContext::new(),
        }
    }

    pub fn api(message: impl Into<String>, error_code: &'static str, source: ApiError) -> Self {
        CorpusError::Api {
            message: message.into(),
            error_code,
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn processing(message: impl Into<String>, error_code: &'static str) -> Self {
        CorpusError::Processing {
            message: message.into(),
            error_code,
            context: ErrorContext::new(),
        }
    }

    /// Attach context in a builder style; used at call sites to add the
    /// offending path without threading it through constructors.
    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let ctx = match &mut self {
            CorpusError::Configuration { context, .. }
            | CorpusError::Validation { context, .. }
            | CorpusError::FileSystem { context, .. }
            | CorpusError::Yaml { context, .. }
            | CorpusError::BibTex { context, .. }
            | CorpusError::Api { context, .. }
            | CorpusError::Processing { context, .. } => context,
        };
        ctx.insert(key.into(), value.to_string());
        self
    }

    pub fn with_path(self, path: &std::path::Path) -> Self {
        self.with_context("path", path.display())
    }
}

impl From<std::io::Error> for CorpusError {
    fn from(err: std::io::Error) -> Self {
        CorpusError::filesystem(err.to_string(), "FS_IO")
    }
}

/// Thin capability interface so components never reach for `tracing`
/// macros directly (spec §9: model the duck-typed logger probing as a
/// closed trait, pass by value, no probing).
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str, fields: &[(&str, &str)]);
    fn info(&self, message: &str, fields: &[(&str, &str)]);
    fn warning(&self, message: &str, fields: &[(&str, &str)]);
    fn error(&self, message: &str, fields: &[(&str, &str)]);
    fn get_logger(&self, name: &str) -> Box<dyn Logger>;
}

#[derive(Clone)]
pub struct TracingLogger {
    name: &'static str,
}

impl TracingLogger {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }

    fn render(&self, fields: &[(&str, &str)]) -> String {
        if fields.is_empty() {
            return String::new();
        }
        let joined: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!(" {}", joined.join(" "))
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::debug!(target: "corpus", component = self.name, "{message}{}", self.render(fields));
    }

    fn info(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::info!(target: "corpus", component = self.name, "{message}{}", self.render(fields));
    }

    fn warning(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::warn!(target: "corpus", component = self.name, "{message}{}", self.render(fields));
    }

    fn error(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::error!(target: "corpus", component = self.name, "{message}{}", self.render(fields));
    }

    fn get_logger(&self, _name: &str) -> Box<dyn Logger> {
        Box::new(self.clone())
    }
}

/// Generic wrapper for a per-path failure tallied by an engine that keeps
/// processing the rest of the corpus (C7/C10 failure containment).
#[derive(Debug)]
pub struct PathFailure {
    pub path: PathBuf,
    pub error: CorpusError,
}

impl fmt::Display for PathFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_and_context_roundtrip() {
        let err = CorpusError::validation("bad header", "FM_VALIDATE")
            .with_path(std::path::Path::new("Clippings/foo.md"));
        assert_eq!(err.error_code(), "FM_VALIDATE");
        assert_eq!(
            err.context().get("path").map(String::as_str),
            Some("Clippings/foo.md")
        );
        assert!(err.to_string().contains("FM_VALIDATE"));
    }

    #[test]
    fn api_error_wraps_source() {
        let err = CorpusError::api("crossref failed", "API_CROSSREF", ApiError::Timeout);
        assert_eq!(err.error_code(), "API_CROSSREF");
        assert!(err.to_string().contains("timed out"));
    }
}
