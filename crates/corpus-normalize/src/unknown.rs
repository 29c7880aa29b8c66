use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{LazyLock, Mutex};

use corpus_errors::CorpusError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Heuristic "looks-like-a-citation" shapes that a publisher parser
/// failed to normalize (spec §4.6 "Unknown-pattern surveillance").
static HEURISTIC_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("author_year", Regex::new(r"\([A-Za-z]+\s+(?:et\s+al\.?,?\s*)?\d{4}\)").unwrap()),
        ("keyed_bracket", Regex::new(r"\[[A-Za-z]+\d{4}\]").unwrap()),
        ("range_bracket", Regex::new(r"\[\d+[-–]\d+\]").unwrap()),
        ("leftover_superscript", Regex::new(r"[⁰¹²³⁴⁵⁶⁷⁸⁹]+").unwrap()),
        ("html_superscript", Regex::new(r"<sup>\d+</sup>").unwrap()),
        ("ref_paren", Regex::new(r"ref\s*\(\s*\d+\s*\)").unwrap()),
        ("reference_bracket", Regex::new(r"reference\s*\[\s*\d+\s*\]").unwrap()),
    ]
});

const CONTEXT_RADIUS: usize = 30;

/// A surfaced suggestion for a new parser pattern (spec §4.6: "record a
/// suggestion block ... and append it to the unknown-pattern log").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub publisher: String,
    pub regex_used_for_heuristic: String,
    pub examples: Vec<String>,
    pub occurrences: u32,
    pub discovered_at: String,
}

fn context_around(text: &str, start: usize, end: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    // `start`/`end` here are char indices already (callers pass char
    // offsets, not byte offsets) so this stays correct for non-ASCII text.
    let ctx_start = start.saturating_sub(CONTEXT_RADIUS);
    let ctx_end = (end + CONTEXT_RADIUS).min(chars.len());
    chars[ctx_start..ctx_end].iter().collect()
}

/// Scan `content` for unsupported citation shapes. Only shapes occurring
/// at least twice are reported (spec §4.6: "For each shape that occurs
/// at least twice in the file").
pub fn detect_unsupported_patterns(content: &str, publisher: &str, now: &str) -> Vec<Suggestion> {
    let mut grouped: HashMap<&str, Vec<String>> = HashMap::new();

    for (name, pattern) in HEURISTIC_PATTERNS.iter() {
        let char_indices: Vec<(usize, usize)> = pattern
            .find_iter(content)
            .map(|m| {
                let start = content[..m.start()].chars().count();
                let end = content[..m.end()].chars().count();
                (start, end)
            })
            .collect();
        for (start, end) in &char_indices {
            let example = context_around(content, *start, *end);
            grouped.entry(name).or_default().push(example);
        }
    }

    grouped
        .into_iter()
        .filter(|(_, examples)| examples.len() >= 2)
        .map(|(name, examples)| {
            let occurrences = examples.len() as u32;
            Suggestion {
                publisher: publisher.to_string(),
                regex_used_for_heuristic: name.to_string(),
                examples: examples.into_iter().take(3).collect(),
                occurrences,
                discovered_at: now.to_string(),
            }
        })
        .collect()
}

const UNSUPPORTED_LOG_KEY: &str = "unsupported_citation_patterns";

#[derive(Default, Serialize, Deserialize)]
struct UnsupportedLog {
    #[serde(rename = "unsupported_citation_patterns", default)]
    entries: Vec<Suggestion>,
}

static LOG_LOCK: Mutex<()> = Mutex::new(());

/// Append `suggestions` to the shared unknown-pattern log, serializing
/// concurrent writers with a process-wide mutex around the whole-file
/// read-modify-write (spec §9 Open Question: the log has exactly one
/// writer path, so a `std::sync::Mutex` is sufficient — no file locking
/// needed across processes in this pipeline's execution model).
pub fn append_to_log(log_path: &Path, suggestions: &[Suggestion]) -> Result<(), CorpusError> {
    if suggestions.is_empty() {
        return Ok(());
    }

    let _guard = LOG_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());

    let mut log: UnsupportedLog = if log_path.exists() {
        let content = fs::read_to_string(log_path).map_err(|e| CorpusError::from(e).with_path(log_path))?;
        serde_yaml::from_str(&content).unwrap_or_default()
    } else {
        UnsupportedLog::default()
    };

    log.entries.extend(suggestions.iter().cloned());

    let mut root = serde_yaml::Mapping::new();
    root.insert(
        Value::String(UNSUPPORTED_LOG_KEY.to_string()),
        serde_yaml::to_value(&log.entries).map_err(|e| {
            CorpusError::yaml(format!("failed to serialize unsupported pattern log: {e}"), "NORM_LOG_WRITE")
        })?,
    );
    let rendered = serde_yaml::to_string(&Value::Mapping(root)).map_err(|e| {
        CorpusError::yaml(format!("failed to serialize unsupported pattern log: {e}"), "NORM_LOG_WRITE")
    })?;

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(|e| CorpusError::from(e).with_path(parent))?;
    }
    fs::write(log_path, rendered).map_err(|e| CorpusError::from(e).with_path(log_path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn requires_at_least_two_occurrences() {
        let content = "(Smith 2020) talks about this, unrelated to (Jones 2019).";
        let suggestions = detect_unsupported_patterns(content, "generic", "2024-01-01T00:00:00Z");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].occurrences, 2);
    }

    #[test]
    fn single_occurrence_is_not_reported() {
        let content = "(Smith 2020) is the only one here.";
        let suggestions = detect_unsupported_patterns(content, "generic", "2024-01-01T00:00:00Z");
        assert!(suggestions.is_empty());
    }

    #[test]
    fn appends_to_log_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("unsupported_citation_patterns.yaml");
        let suggestions = vec![Suggestion {
            publisher: "generic".to_string(),
            regex_used_for_heuristic: "author_year".to_string(),
            examples: vec!["(Smith 2020)".to_string()],
            occurrences: 2,
            discovered_at: "2024-01-01T00:00:00Z".to_string(),
        }];
        append_to_log(&log_path, &suggestions).unwrap();
        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("author_year"));
    }
}
