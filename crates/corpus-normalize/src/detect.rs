use corpus_frontmatter::header::{self, Header};

use crate::registry::Registry;

/// `detect_publisher` (spec §4.6 "Publisher detection"): manual override
/// by substring match, then DOI prefix, then journal keyword, then the
/// configured fallback.
pub fn detect_publisher(header: &Header, registry: &Registry, fallback_parser: &str) -> String {
    if let Some(manual) = header::get_str(header, "publisher") {
        let manual_lower = manual.to_lowercase();
        for name in registry.names() {
            let name_lower = name.to_lowercase();
            if name_lower.contains(&manual_lower) || manual_lower.contains(&name_lower) {
                return name.to_string();
            }
        }
    }

    let doi = header::get_str(header, "doi").unwrap_or("");
    if !doi.is_empty() {
        for (name, parser) in registry.iter() {
            if parser.detection.doi_prefixes.iter().any(|prefix| doi.starts_with(prefix.as_str())) {
                return name.to_string();
            }
        }
    }

    let title = header::get_str(header, "title").unwrap_or("").to_lowercase();
    let journal = header::get_str(header, "journal").unwrap_or("").to_lowercase();
    for (name, parser) in registry.iter() {
        for keyword in &parser.detection.journal_keywords {
            let keyword = keyword.to_lowercase();
            if title.contains(&keyword) || journal.contains(&keyword) {
                return name.to_string();
            }
        }
    }

    if registry.contains(fallback_parser) {
        fallback_parser.to_string()
    } else {
        "generic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Detection, ParserConfig, PatternConfig};

    fn registry_with_nature() -> Registry {
        let mut registry = Registry::with_builtin();
        registry
            .register(
                "nature",
                ParserConfig {
                    detection: Detection {
                        doi_prefixes: vec!["10.1038".to_string()],
                        journal_keywords: vec!["nature".to_string()],
                        fallback: false,
                    },
                    patterns: vec![PatternConfig {
                        regex: r"\[(\d+)\]".to_string(),
                        replacement: "[{number}]".to_string(),
                        description: "bracketed".to_string(),
                    }],
                },
            )
            .unwrap();
        registry
    }

    #[test]
    fn detects_by_doi_prefix() {
        let registry = registry_with_nature();
        let mut h = Header::new();
        header::set_str(&mut h, "doi", "10.1038/s41586-example");
        assert_eq!(detect_publisher(&h, &registry, "generic"), "nature");
    }

    #[test]
    fn detects_by_journal_keyword() {
        let registry = registry_with_nature();
        let mut h = Header::new();
        header::set_str(&mut h, "journal", "Nature Communications");
        assert_eq!(detect_publisher(&h, &registry, "generic"), "nature");
    }

    #[test]
    fn falls_back_to_generic() {
        let registry = registry_with_nature();
        let h = Header::new();
        assert_eq!(detect_publisher(&h, &registry, "generic"), "generic");
    }

    #[test]
    fn manual_publisher_override_wins() {
        let registry = registry_with_nature();
        let mut h = Header::new();
        header::set_str(&mut h, "publisher", "nature publishing group");
        header::set_str(&mut h, "doi", "10.9999/other");
        assert_eq!(detect_publisher(&h, &registry, "generic"), "nature");
    }
}
