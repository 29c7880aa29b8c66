//! The LM stage adapter (C11): a closed `LmClient` capability plus the
//! three stages built on it (tagger, translate_abstract, ochiai_format).
//! Each stage module owns its own prompt, response parsing, and
//! front-matter write; `client` owns only the HTTP/retry contract.

pub mod client;
pub mod ochiai;
pub mod tagger;
pub mod translate;

pub use client::{AnthropicClient, LmClient, LmStageConfig};
