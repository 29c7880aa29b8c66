use std::collections::HashMap;
use std::fs;
use std::path::Path;

use corpus_errors::CorpusError;
use regex::Regex;
use serde::Deserialize;

/// Publisher-detection rules for one parser entry (spec §4.6 "Publisher
/// parser registry").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub doi_prefixes: Vec<String>,
    #[serde(default)]
    pub journal_keywords: Vec<String>,
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    pub regex: String,
    pub replacement: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub detection: Detection,
    pub patterns: Vec<PatternConfig>,
}

/// A compiled replacement rule, one per `patterns` entry.
pub struct PatternRule {
    pub regex: Regex,
    pub replacement: String,
    pub description: String,
}

pub struct Parser {
    pub detection: Detection,
    pub patterns: Vec<PatternRule>,
}

#[derive(Deserialize)]
struct RawRegistry {
    #[serde(default)]
    parsers: HashMap<String, ParserConfig>,
}

/// Registry of publisher parsers, always carrying a built-in `generic`
/// fallback (spec §4.6: "a built-in `generic` parser is always present").
pub struct Registry {
    parsers: HashMap<String, Parser>,
}

fn compile(name: &str, config: ParserConfig) -> Result<Parser, CorpusError> {
    let mut patterns = Vec::with_capacity(config.patterns.len());
    for pattern in config.patterns {
        let regex = Regex::new(&pattern.regex).map_err(|e| {
            CorpusError::configuration(
                format!("invalid regex in parser `{name}`: {e}"),
                "NORM_BAD_REGEX",
            )
        })?;
        patterns.push(PatternRule {
            regex,
            replacement: pattern.replacement,
            description: pattern.description,
        });
    }
    if patterns.is_empty() {
        return Err(CorpusError::configuration(
            format!("parser `{name}` has no patterns"),
            "NORM_EMPTY_PARSER",
        ));
    }
    Ok(Parser {
        detection: config.detection,
        patterns,
    })
}

fn generic_parser() -> Parser {
    // The always-present fallback: canonicalize the shapes already seen
    // in the wild without needing any publisher-specific detection.
    let raw_patterns = [
        (r"\[(\d+(?:\s*,\s*\d+)+)\]", "[{numbers}]", "bracketed multiple digits"),
        (r"\[(\d+)\]", "[{number}]", "bracketed single digit"),
        (r"\((\d+(?:\s*,\s*\d+)+)\)", "[{numbers}]", "parenthesized digit list"),
        (r"[⁰¹²³⁴⁵⁶⁷⁸⁹]+", "[{numbers}]", "superscript run"),
    ];
    Parser {
        detection: Detection {
            fallback: true,
            ..Detection::default()
        },
        patterns: raw_patterns
            .into_iter()
            .map(|(regex, replacement, description)| PatternRule {
                regex: Regex::new(regex).expect("built-in generic pattern must compile"),
                replacement: replacement.to_string(),
                description: description.to_string(),
            })
            .collect(),
    }
}

impl Registry {
    /// Registry with only the built-in `generic` parser (spec §4.6: "a
    /// built-in generic parser is always present as fallback").
    pub fn with_builtin() -> Self {
        let mut parsers = HashMap::new();
        parsers.insert("generic".to_string(), generic_parser());
        Registry { parsers }
    }

    /// Load a `publisher_patterns.yaml`-shaped config, merging in the
    /// built-in `generic` parser if the file doesn't define its own.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let content = fs::read_to_string(path).map_err(|e| CorpusError::from(e).with_path(path))?;
        let raw: RawRegistry = serde_yaml::from_str(&content).map_err(|e| {
            CorpusError::yaml(format!("invalid publisher patterns file: {e}"), "NORM_BAD_CONFIG")
                .with_path(path)
        })?;

        let mut registry = Registry::with_builtin();
        for (name, config) in raw.parsers {
            registry.parsers.insert(name.clone(), compile(&name, config)?);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Parser> {
        self.parsers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parser)> {
        self.parsers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Register a new parser at runtime (spec §4.6 "A runtime API allows
    /// registering new parsers"). Validates structure before acceptance.
    pub fn register(&mut self, name: &str, config: ParserConfig) -> Result<(), CorpusError> {
        validate_parser_config(&config)?;
        let parser = compile(name, config)?;
        self.parsers.insert(name.to_string(), parser);
        Ok(())
    }
}

/// Validate a parser config's shape before compiling it (spec §4.6:
/// "Parser config is validated before acceptance").
pub fn validate_parser_config(config: &ParserConfig) -> Result<(), CorpusError> {
    if config.patterns.is_empty() {
        return Err(CorpusError::configuration(
            "patterns must be a non-empty list",
            "NORM_EMPTY_PATTERNS",
        ));
    }
    for pattern in &config.patterns {
        Regex::new(&pattern.regex).map_err(|e| {
            CorpusError::configuration(format!("invalid regex `{}`: {e}", pattern.regex), "NORM_BAD_REGEX")
        })?;
        if pattern.replacement.is_empty() || pattern.description.is_empty() {
            return Err(CorpusError::configuration(
                "pattern missing replacement or description",
                "NORM_INCOMPLETE_PATTERN",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_generic_parser() {
        let registry = Registry::with_builtin();
        assert!(registry.contains("generic"));
    }

    #[test]
    fn load_merges_builtin_generic_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("publisher_patterns.yaml");
        fs::write(
            &path,
            "parsers:\n  nature:\n    detection:\n      doi_prefixes: [\"10.1038\"]\n      journal_keywords: [\"nature\"]\n    patterns:\n      - regex: '\\[(\\d+)\\]'\n        replacement: '[{number}]'\n        description: bracketed\n",
        )
        .unwrap();

        let registry = Registry::load(&path).unwrap();
        assert!(registry.contains("generic"));
        assert!(registry.contains("nature"));
    }

    #[test]
    fn register_rejects_empty_patterns() {
        let mut registry = Registry::with_builtin();
        let config = ParserConfig {
            detection: Detection::default(),
            patterns: vec![],
        };
        assert!(registry.register("broken", config).is_err());
    }
}
