use chrono::{DateTime, Local};
use corpus_errors::CorpusError;
use serde_yaml::{Mapping, Value};

/// The structured header block. `serde_yaml::Mapping` is backed by an
/// insertion-order-preserving map, which is exactly the "ordered mapping"
/// the bibliographic-YAML subset (spec §4.1) calls for — no hand-rolled
/// map type needed.
pub type Header = Mapping;

pub const REQUIRED_KEYS: &[&str] = &["citation_key", "workflow_version", "processing_status"];

pub const VALID_STATUSES: &[&str] = &["pending", "completed", "failed"];

pub const STEP_NAMES: &[&str] = &[
    "organize",
    "sync",
    "fetch",
    "section_parsing",
    "ai_citation_support",
    "citation_pattern_normalizer",
    "tagger",
    "translate_abstract",
    "ochiai_format",
    "final_sync",
];

pub fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

pub fn get<'a>(header: &'a Header, name: &str) -> Option<&'a Value> {
    header.get(&key(name))
}

pub fn get_str<'a>(header: &'a Header, name: &str) -> Option<&'a str> {
    get(header, name).and_then(Value::as_str)
}

pub fn set(header: &mut Header, name: &str, value: Value) {
    header.insert(key(name), value);
}

pub fn set_str(header: &mut Header, name: &str, value: impl Into<String>) {
    set(header, name, Value::String(value.into()));
}

/// Process-local clock, ISO-8601 with fractional seconds (spec §3).
pub fn now_iso8601() -> String {
    Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, false)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Local))
}

pub fn processing_status_mapping(header: &Header) -> Mapping {
    match get(header, "processing_status") {
        Some(Value::Mapping(m)) => m.clone(),
        _ => Mapping::new(),
    }
}

pub fn status_of(header: &Header, step: &str) -> &'static str {
    let statuses = processing_status_mapping(header);
    match statuses.get(&key(step)).and_then(Value::as_str) {
        Some("completed") => "completed",
        Some("failed") => "failed",
        _ => "pending",
    }
}

pub fn set_status(header: &mut Header, step: &str, status: &str) {
    let mut statuses = processing_status_mapping(header);
    statuses.insert(key(step), Value::String(status.to_string()));
    set(header, "processing_status", Value::Mapping(statuses));
}

/// `validate_structure` (spec §4.1): required keys present, every
/// `processing_status` value in the permitted set, timestamps parseable.
pub fn validate_structure(header: &Header) -> Result<(), CorpusError> {
    for required in REQUIRED_KEYS {
        if get(header, required).is_none() {
            return Err(CorpusError::validation(
                format!("missing required key `{required}`"),
                "FM_MISSING_KEY",
            )
            .with_context("key", required));
        }
    }

    if let Some(Value::Mapping(statuses)) = get(header, "processing_status") {
        for (step_key, status_value) in statuses {
            let step_name = step_key.as_str().unwrap_or("?");
            let status = status_value.as_str().unwrap_or("");
            if !VALID_STATUSES.contains(&status) {
                return Err(CorpusError::validation(
                    format!("invalid processing_status value `{status}` for step `{step_name}`"),
                    "FM_BAD_STATUS",
                )
                .with_context("step", step_name));
            }
        }
    } else if get(header, "processing_status").is_some() {
        return Err(CorpusError::validation(
            "processing_status must be a mapping",
            "FM_BAD_STATUS_SHAPE",
        ));
    }

    for ts_key in ["created_at", "last_updated"] {
        if let Some(raw) = get_str(header, ts_key) {
            if parse_timestamp(raw).is_none() {
                return Err(CorpusError::validation(
                    format!("unparseable timestamp in `{ts_key}`: {raw}"),
                    "FM_BAD_TIMESTAMP",
                )
                .with_context("key", ts_key));
            }
        }
    }

    Ok(())
}
