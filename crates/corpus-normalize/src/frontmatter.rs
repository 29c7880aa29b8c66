use corpus_frontmatter::header::{self, Header};
use serde_yaml::{Mapping, Value};

use crate::rewrite::Replacement;

/// Write the `citation_normalization` section and advance
/// `processing_status.citation_pattern_normalizer` (spec §4.6
/// "Front-matter update").
pub fn update_header(
    header: &mut Header,
    publisher: &str,
    replacements: &[Replacement],
    now: &str,
) {
    let mut section = Mapping::new();
    section.insert(Value::String("generated_at".into()), Value::String(now.to_string()));
    section.insert(Value::String("publisher_detected".into()), Value::String(publisher.to_string()));
    section.insert(
        Value::String("parser_used".into()),
        Value::String(format!("{publisher}_parser")),
    );

    let patterns: Vec<Value> = replacements
        .iter()
        .map(|r| {
            let mut entry = Mapping::new();
            entry.insert(Value::String("original".into()), Value::String(r.original.clone()));
            entry.insert(Value::String("normalized".into()), Value::String(r.normalized.clone()));
            entry.insert(
                Value::String("position".into()),
                Value::Number((r.position as u64).into()),
            );
            entry.insert(
                Value::String("pattern_description".into()),
                Value::String(r.description.clone()),
            );
            Value::Mapping(entry)
        })
        .collect();
    section.insert(Value::String("patterns_normalized".into()), Value::Sequence(patterns));
    section.insert(
        Value::String("total_citations_normalized".into()),
        Value::Number((replacements.len() as u64).into()),
    );

    header::set(header, "citation_normalization", Value::Mapping(section));
    header::set_status(header, "citation_pattern_normalizer", "completed");
    header::set_str(header, "last_updated", now.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_section_and_advances_status() {
        let mut h = Header::new();
        let replacements = vec![Replacement {
            original: "²³".to_string(),
            normalized: "[2,3]".to_string(),
            position: 4,
            description: "superscript run".to_string(),
        }];
        update_header(&mut h, "generic", &replacements, "2024-01-01T00:00:00Z");

        assert_eq!(header::status_of(&h, "citation_pattern_normalizer"), "completed");
        let section = header::get(&h, "citation_normalization").unwrap();
        assert_eq!(section.get("publisher_detected").and_then(|v| v.as_str()), Some("generic"));
        assert_eq!(section.get("total_citations_normalized").and_then(|v| v.as_u64()), Some(1));
    }
}
