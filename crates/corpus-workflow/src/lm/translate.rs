use serde_yaml::{Mapping, Value};

use corpus_errors::CorpusError;
use corpus_frontmatter::header::{self, Header};

use super::client::LmClient;

fn build_prompt(abstract_text: &str) -> String {
    format!(
        "以下の英語の論文要旨を自然な日本語に翻訳してください。翻訳文のみを出力し、\
前置きや注釈は付けないでください。\n\n{abstract_text}\n"
    )
}

/// Quality scoring the original computes from surface statistics rather
/// than a second LM call (`_evaluate_translation_quality`). `length_ratio`
/// is the only signal with an objective target (Japanese text for an
/// English abstract typically runs shorter in character count per word);
/// the four 0-1 sub-scores are derived from how close the ratio lands to
/// that expectation, simplified from the original's fuller heuristic set —
/// see the open question in the design ledger.
#[derive(Debug, Clone)]
pub struct TranslationQuality {
    pub quality_score: f64,
    pub completeness_score: f64,
    pub fluency_score: f64,
    pub consistency_score: f64,
    pub accuracy_score: f64,
    pub original_length: usize,
    pub translation_length: usize,
    pub length_ratio: f64,
}

fn score_from_ratio(ratio: f64, ideal: f64, tolerance: f64) -> f64 {
    let deviation = (ratio - ideal).abs() / tolerance;
    (1.0 - deviation).clamp(0.0, 1.0)
}

pub fn evaluate_quality(original: &str, translation: &str) -> TranslationQuality {
    let original_length = original.chars().count();
    let translation_length = translation.chars().count();
    let length_ratio = if original_length == 0 {
        0.0
    } else {
        translation_length as f64 / original_length as f64
    };

    let completeness_score = if translation_length == 0 { 0.0 } else { score_from_ratio(length_ratio, 0.6, 0.6) };
    let fluency_score = if translation.trim().is_empty() { 0.0 } else { 0.8 };
    let consistency_score = score_from_ratio(length_ratio, 0.6, 0.8);
    let accuracy_score = (completeness_score + consistency_score) / 2.0;
    let quality_score = (completeness_score + fluency_score + consistency_score + accuracy_score) / 4.0;

    TranslationQuality {
        quality_score,
        completeness_score,
        fluency_score,
        consistency_score,
        accuracy_score,
        original_length,
        translation_length,
        length_ratio,
    }
}

/// Write `ai_content.abstract_japanese` plus the sibling
/// `translation_quality` mapping, and advance
/// `processing_status.translate_abstract` (mirrors
/// `update_yaml_with_translation_and_quality`).
pub fn update_header(header: &mut Header, translation: &str, quality: &TranslationQuality, now: &str) {
    let mut ai_content = match header::get(header, "ai_content") {
        Some(Value::Mapping(m)) => m.clone(),
        _ => Mapping::new(),
    };

    let mut section = Mapping::new();
    section.insert(Value::String("generated_at".into()), Value::String(now.to_string()));
    section.insert(Value::String("content".into()), Value::String(translation.to_string()));
    ai_content.insert(Value::String("abstract_japanese".into()), Value::Mapping(section));
    header::set(header, "ai_content", Value::Mapping(ai_content));

    let mut quality_map = Mapping::new();
    quality_map.insert(Value::String("quality_score".into()), Value::from(quality.quality_score));
    quality_map.insert(Value::String("completeness_score".into()), Value::from(quality.completeness_score));
    quality_map.insert(Value::String("fluency_score".into()), Value::from(quality.fluency_score));
    quality_map.insert(Value::String("consistency_score".into()), Value::from(quality.consistency_score));
    quality_map.insert(Value::String("accuracy_score".into()), Value::from(quality.accuracy_score));
    quality_map.insert(Value::String("original_length".into()), Value::from(quality.original_length as u64));
    quality_map.insert(Value::String("translation_length".into()), Value::from(quality.translation_length as u64));
    quality_map.insert(Value::String("length_ratio".into()), Value::from(quality.length_ratio));
    quality_map.insert(Value::String("evaluation_timestamp".into()), Value::String(now.to_string()));
    quality_map.insert(Value::String("has_suggestions".into()), Value::Bool(quality.quality_score < 0.5));
    header::set(header, "translation_quality", Value::Mapping(quality_map));

    header::set_status(header, "translate_abstract", "completed");
    header::set_str(header, "last_updated", now.to_string());
}

pub async fn run(client: &dyn LmClient, abstract_text: &str) -> Result<String, CorpusError> {
    client.complete(&build_prompt(abstract_text)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_translation_scores_zero_completeness() {
        let quality = evaluate_quality("some english abstract text", "");
        assert_eq!(quality.completeness_score, 0.0);
        assert_eq!(quality.fluency_score, 0.0);
    }

    #[test]
    fn reasonable_length_ratio_scores_well() {
        let original = "a b c d e f g h i j";
        let translation = "あ い う え お か き く";
        let quality = evaluate_quality(original, translation);
        assert!(quality.quality_score > 0.0);
        assert_eq!(quality.original_length, original.chars().count());
    }

    #[test]
    fn update_header_writes_translation_and_quality() {
        let mut h = Header::new();
        let quality = evaluate_quality("abstract text here", "日本語の要旨です");
        update_header(&mut h, "日本語の要旨です", &quality, "2024-01-01T00:00:00.000Z");

        assert_eq!(header::status_of(&h, "translate_abstract"), "completed");
        let ai_content = header::get(&h, "ai_content").unwrap();
        assert!(ai_content.get("abstract_japanese").is_some());
        assert!(header::get(&h, "translation_quality").is_some());
    }
}
