use std::path::Path;

use corpus_errors::CorpusError;
use corpus_frontmatter::header;

use crate::detect::detect_publisher;
use crate::frontmatter::update_header;
use crate::policy::NormalizerPolicy;
use crate::preclean::remove_citation_links;
use crate::registry::Registry;
use crate::rewrite::{expand_ranges, group_adjacent_citations, normalize_citations};
use crate::unknown::{append_to_log, detect_unsupported_patterns};

/// Per-paper entry point for the citation-pattern normalizer (C9):
/// pre-clean, publisher detection, rewrite, unknown-pattern
/// surveillance, front-matter update, atomic write.
pub fn run(
    path: &Path,
    registry: &Registry,
    policy: &NormalizerPolicy,
    unsupported_log_path: &Path,
) -> Result<(), CorpusError> {
    let (mut fm_header, body) = corpus_frontmatter::parse(path)?;

    let publisher = if policy.auto_detect {
        detect_publisher(&fm_header, registry, &policy.fallback_parser)
    } else {
        policy.fallback_parser.clone()
    };

    let cleaned = remove_citation_links(&body);

    let (mut normalized_body, replacements) = match registry.get(&publisher) {
        Some(parser) => normalize_citations(&cleaned, parser),
        None => (cleaned, Vec::new()),
    };

    normalized_body = expand_ranges(&normalized_body);
    if policy.grouped_citations {
        normalized_body = group_adjacent_citations(&normalized_body);
    }

    let now = header::now_iso8601();

    if policy.unsupported_pattern_alert {
        let suggestions = detect_unsupported_patterns(&normalized_body, &publisher, &now);
        if policy.new_parser_suggestion && !suggestions.is_empty() {
            append_to_log(unsupported_log_path, &suggestions)?;
        }
    }

    update_header(&mut fm_header, &publisher, &replacements, &now);
    corpus_frontmatter::write(path, &fm_header, &normalized_body, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_frontmatter::header::set_str;
    use tempfile::tempdir;

    #[test]
    fn normalizes_body_and_updates_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.md");
        let mut header = corpus_frontmatter::Header::new();
        set_str(&mut header, "citation_key", "smith2023test");
        corpus_frontmatter::write(&path, &header, "Evidence shows this ²³ effect.\n", None).unwrap();

        let registry = Registry::with_builtin();
        let policy = NormalizerPolicy::default();
        let log_path = dir.path().join("unsupported.yaml");
        run(&path, &registry, &policy, &log_path).unwrap();

        let (written_header, body) = corpus_frontmatter::parse(&path).unwrap();
        assert!(body.contains("[2,3]"));
        assert_eq!(header::status_of(&written_header, "citation_pattern_normalizer"), "completed");
    }

    #[test]
    fn running_twice_is_a_no_op_on_the_body() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.md");
        let mut header = corpus_frontmatter::Header::new();
        set_str(&mut header, "citation_key", "smith2023test");
        corpus_frontmatter::write(&path, &header, "See [1,2] and [7].\n", None).unwrap();

        let registry = Registry::with_builtin();
        let policy = NormalizerPolicy::default();
        let log_path = dir.path().join("unsupported.yaml");
        run(&path, &registry, &policy, &log_path).unwrap();
        let (_, body_after_first) = corpus_frontmatter::parse(&path).unwrap();

        run(&path, &registry, &policy, &log_path).unwrap();
        let (_, body_after_second) = corpus_frontmatter::parse(&path).unwrap();

        assert_eq!(body_after_first, body_after_second);
    }
}
