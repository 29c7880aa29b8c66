use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use corpus_errors::CorpusError;
use corpus_frontmatter::header::{self, Header};

use super::client::LmClient;

/// The six questions of Ochiai's paper-reading format, in the fixed order
/// they are written back in (mirrors `_build_ochiai_prompt`/
/// `update_yaml_with_ochiai`).
const QUESTIONS: &[&str] = &[
    "what_is_this",
    "what_is_superior",
    "technical_key",
    "validation_method",
    "discussion_points",
    "next_papers",
];

#[derive(Deserialize, Default)]
struct OchiaiResponse {
    what_is_this: Option<String>,
    what_is_superior: Option<String>,
    technical_key: Option<String>,
    validation_method: Option<String>,
    discussion_points: Option<String>,
    next_papers: Option<String>,
}

impl OchiaiResponse {
    fn field(&self, question: &str) -> Option<&str> {
        match question {
            "what_is_this" => self.what_is_this.as_deref(),
            "what_is_superior" => self.what_is_superior.as_deref(),
            "technical_key" => self.technical_key.as_deref(),
            "validation_method" => self.validation_method.as_deref(),
            "discussion_points" => self.discussion_points.as_deref(),
            "next_papers" => self.next_papers.as_deref(),
            _ => None,
        }
    }
}

fn build_prompt(title: &str, abstract_text: &str) -> String {
    format!(
        "以下の論文のタイトルと要旨を読み、落合陽一式フォーマットの6つの質問に\
日本語でJSON形式で回答してください。キーは what_is_this, what_is_superior, \
technical_key, validation_method, discussion_points, next_papers です。\n\n\
タイトル: {title}\n\n要旨: {abstract_text}\n"
    )
}

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

/// A field that failed to parse gets a Japanese "could not be generated"
/// placeholder rather than a blank string (`_create_fallback_ochiai_data`),
/// so a reader sees *why* the cell is empty instead of a silent gap.
fn placeholder_for(question: &str) -> String {
    format!("{question}: 回答を生成できませんでした")
}

/// Parse the LM response into the six questions, falling back per-field
/// (not the whole record) when JSON parsing fails or a key is absent.
fn parse_response(response: &str) -> Mapping {
    let parsed: OchiaiResponse =
        serde_json::from_str(extract_json_object(response)).unwrap_or_default();

    let mut questions = Mapping::new();
    for question in QUESTIONS {
        let value = parsed
            .field(question)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_for(question));
        questions.insert(Value::String((*question).to_string()), Value::String(value));
    }
    questions
}

/// Write `ai_content.ochiai_format` and advance
/// `processing_status.ochiai_format` (mirrors `update_yaml_with_ochiai`).
pub fn update_header(header: &mut Header, questions: Mapping, now: &str) {
    let mut ai_content = match header::get(header, "ai_content") {
        Some(Value::Mapping(m)) => m.clone(),
        _ => Mapping::new(),
    };

    let mut section = Mapping::new();
    section.insert(Value::String("generated_at".into()), Value::String(now.to_string()));
    section.insert(Value::String("questions".into()), Value::Mapping(questions));
    ai_content.insert(Value::String("ochiai_format".into()), Value::Mapping(section));

    header::set(header, "ai_content", Value::Mapping(ai_content));
    header::set_status(header, "ochiai_format", "completed");
    header::set_str(header, "last_updated", now.to_string());
}

pub async fn run(
    client: &dyn LmClient,
    title: &str,
    abstract_text: &str,
) -> Result<Mapping, CorpusError> {
    let response = client.complete(&build_prompt(title, abstract_text)).await?;
    Ok(parse_response(&response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_fenced_response() {
        let response = "```json\n{\"what_is_this\": \"a\", \"what_is_superior\": \"b\", \
\"technical_key\": \"c\", \"validation_method\": \"d\", \"discussion_points\": \"e\", \
\"next_papers\": \"f\"}\n```";
        let questions = parse_response(response);
        assert_eq!(
            questions.get(Value::String("what_is_this".into())).and_then(Value::as_str),
            Some("a")
        );
        assert_eq!(questions.len(), 6);
    }

    #[test]
    fn missing_fields_get_japanese_placeholders() {
        let response = "{\"what_is_this\": \"a\"}";
        let questions = parse_response(response);
        let superior = questions
            .get(Value::String("what_is_superior".into()))
            .and_then(Value::as_str)
            .unwrap();
        assert!(superior.contains("生成できませんでした"));
    }

    #[test]
    fn unparseable_response_falls_back_on_every_field() {
        let questions = parse_response("not json");
        assert_eq!(questions.len(), 6);
        for question in QUESTIONS {
            let value = questions.get(Value::String((*question).to_string())).and_then(Value::as_str);
            assert!(value.unwrap().contains("生成できませんでした"));
        }
    }

    #[test]
    fn update_header_writes_questions_and_advances_status() {
        let mut h = Header::new();
        let questions = parse_response("{\"what_is_this\": \"a\"}");
        update_header(&mut h, questions, "2024-01-01T00:00:00.000Z");

        assert_eq!(header::status_of(&h, "ochiai_format"), "completed");
        let ai_content = header::get(&h, "ai_content").unwrap();
        assert!(ai_content.get("ochiai_format").unwrap().get("questions").is_some());
    }
}
