use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use corpus_errors::CorpusError;
use corpus_frontmatter::header::{self, Header};

use super::client::LmClient;

#[derive(Deserialize)]
struct TaggerResponse {
    tags: Vec<String>,
}

fn build_prompt(title: &str, abstract_text: &str) -> String {
    format!(
        "Read the following paper title and abstract, then respond with a JSON \
object of the shape {{\"tags\": [\"...\"]}} listing 5-10 short topical keywords.\n\n\
Title: {title}\n\nAbstract: {abstract_text}\n"
    )
}

/// Best-effort extraction of a JSON object from a response that may be
/// wrapped in a ```json fenced block (mirrors `_parse_ochiai_response`'s
/// fenced-block-then-braces fallback).
fn extract_json_object(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end >= start {
            return &trimmed[start..=end];
        }
    }
    trimmed
}

fn parse_response(response: &str) -> Vec<String> {
    match serde_json::from_str::<TaggerResponse>(extract_json_object(response)) {
        Ok(parsed) => parsed.tags,
        Err(_) => Vec::new(),
    }
}

/// Write the `ai_content.tags` section and advance
/// `processing_status.tagger`. Keyword generation itself (`TaggerWorkflow`
/// in the original) is LM-driven; this adapter only owns the
/// request/response/front-matter contract, not prompt tuning.
pub fn update_header(header: &mut Header, tags: &[String], now: &str) {
    let mut ai_content = match header::get(header, "ai_content") {
        Some(Value::Mapping(m)) => m.clone(),
        _ => Mapping::new(),
    };

    let mut section = Mapping::new();
    section.insert(Value::String("generated_at".into()), Value::String(now.to_string()));
    section.insert(
        Value::String("tags".into()),
        Value::Sequence(tags.iter().cloned().map(Value::String).collect()),
    );
    ai_content.insert(Value::String("tags".into()), Value::Mapping(section));

    header::set(header, "ai_content", Value::Mapping(ai_content));
    header::set_status(header, "tagger", "completed");
    header::set_str(header, "last_updated", now.to_string());
}

pub async fn run(
    client: &dyn LmClient,
    title: &str,
    abstract_text: &str,
) -> Result<Vec<String>, CorpusError> {
    let response = client.complete(&build_prompt(title, abstract_text)).await?;
    Ok(parse_response(&response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_response() {
        let response = "```json\n{\"tags\": [\"nlp\", \"transformers\"]}\n```";
        assert_eq!(parse_response(response), vec!["nlp", "transformers"]);
    }

    #[test]
    fn parses_bare_json_response() {
        let response = "Sure, here you go: {\"tags\": [\"graphs\"]} thanks";
        assert_eq!(parse_response(response), vec!["graphs"]);
    }

    #[test]
    fn unparseable_response_yields_no_tags() {
        assert!(parse_response("not json at all").is_empty());
    }

    #[test]
    fn update_header_writes_tags_and_advances_status() {
        let mut h = Header::new();
        update_header(&mut h, &["nlp".to_string()], "2024-01-01T00:00:00.000Z");
        assert_eq!(header::status_of(&h, "tagger"), "completed");
        let ai_content = header::get(&h, "ai_content").unwrap();
        let tags_section = ai_content.get("tags").unwrap();
        assert_eq!(
            tags_section.get("tags").and_then(|v| v.as_sequence()).map(|s| s.len()),
            Some(1)
        );
    }
}
