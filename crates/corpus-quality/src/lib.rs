//! C5: quality scorer. A scalar in `[0,1]` over a fetched reference list,
//! weighted the way the original `data_quality_evaluator` module does
//! (spec §4.5).

use std::sync::LazyLock;

use corpus_frontmatter::doi;
use corpus_providers::Reference;
use regex::Regex;

const REQUIRED_WEIGHT: f64 = 0.40;
const PREFERRED_WEIGHT: f64 = 0.20;
const VALIDITY_WEIGHT: f64 = 0.30;
const RICHNESS_WEIGHT: f64 = 0.10;

static AUTHOR_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\s]").unwrap());

fn present(value: &Option<impl AsRef<str>>) -> bool {
    value
        .as_ref()
        .map(|v| !v.as_ref().trim().is_empty())
        .unwrap_or(false)
}

fn required_fields_score(reference: &Reference) -> f64 {
    let checks = [
        present(&reference.title),
        present(&reference.authors),
        reference.year.is_some(),
    ];
    checks.iter().filter(|c| **c).count() as f64 / checks.len() as f64
}

fn preferred_fields_score(reference: &Reference) -> f64 {
    let checks = [
        present(&reference.doi),
        present(&reference.journal),
        present(&reference.volume),
        present(&reference.pages),
        // publisher isn't a first-class `Reference` field; providers that
        // surface one stash it in `extra`.
        reference.extra.contains_key("publisher"),
    ];
    checks.iter().filter(|c| **c).count() as f64 / checks.len() as f64
}

fn data_validity_score(reference: &Reference) -> f64 {
    let mut checks = 0u32;
    let mut passed = 0u32;

    if let Some(year) = reference.year {
        checks += 1;
        if (1800..=2030).contains(&year) {
            passed += 1;
        }
    }
    if let Some(raw_doi) = &reference.doi {
        checks += 1;
        if doi::is_valid(raw_doi) {
            passed += 1;
        }
    }
    if let Some(title) = &reference.title {
        checks += 1;
        let len = title.trim().chars().count();
        if (10..=500).contains(&len) {
            passed += 1;
        }
    }
    if let Some(authors) = &reference.authors {
        checks += 1;
        let trimmed = authors.trim();
        if trimmed.chars().count() >= 3 && AUTHOR_SEPARATOR.is_match(trimmed) {
            passed += 1;
        }
    }

    if checks == 0 {
        0.0
    } else {
        passed as f64 / checks as f64
    }
}

fn metadata_richness_score(reference: &Reference) -> f64 {
    let all_present = [
        present(&reference.title),
        present(&reference.authors),
        reference.year.is_some(),
        present(&reference.doi),
        present(&reference.journal),
        present(&reference.volume),
        present(&reference.pages),
        reference.extra.contains_key("publisher"),
    ];
    let base = all_present.iter().filter(|c| **c).count() as f64 / all_present.len() as f64;

    let mut bonus = 0.0;
    if present(&reference.url) || reference.extra.contains_key("link") || reference.extra.contains_key("pdf_url") {
        bonus += 0.10;
    }
    if present(&reference.abstract_text) {
        bonus += 0.10;
    }
    if reference.keywords.as_ref().map(|k| !k.is_empty()).unwrap_or(false) {
        bonus += 0.05;
    }

    (base + bonus).min(1.0)
}

/// Per-reference quality score (spec §4.5 weighted sum).
pub fn score_reference(reference: &Reference) -> f64 {
    let total = required_fields_score(reference) * REQUIRED_WEIGHT
        + preferred_fields_score(reference) * PREFERRED_WEIGHT
        + data_validity_score(reference) * VALIDITY_WEIGHT
        + metadata_richness_score(reference) * RICHNESS_WEIGHT;
    total.clamp(0.0, 1.0)
}

/// List score: mean of per-reference scores, `0.0` for an empty list.
pub fn score_list(references: &[Reference]) -> f64 {
    if references.is_empty() {
        return 0.0;
    }
    let sum: f64 = references.iter().map(score_reference).sum();
    sum / references.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_reference() -> Reference {
        Reference {
            title: Some("A Sufficiently Long and Descriptive Title".to_string()),
            authors: Some("Smith, John".to_string()),
            journal: Some("Journal of Testing".to_string()),
            year: Some(2023),
            volume: Some("12".to_string()),
            pages: Some("1-10".to_string()),
            doi: Some("10.1038/example".to_string()),
            url: Some("https://doi.org/10.1038/example".to_string()),
            abstract_text: Some("An abstract.".to_string()),
            keywords: Some(vec!["testing".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn empty_list_scores_zero() {
        assert_eq!(score_list(&[]), 0.0);
    }

    #[test]
    fn rich_reference_scores_near_one() {
        let score = score_reference(&full_reference());
        assert!(score > 0.9, "expected high score, got {score}");
    }

    #[test]
    fn sparse_reference_scores_low() {
        let reference = Reference {
            title: Some("x".to_string()),
            ..Default::default()
        };
        let score = score_reference(&reference);
        assert!(score < 0.2, "expected low score, got {score}");
    }

    #[test]
    fn list_score_is_mean_of_members() {
        let rich = full_reference();
        let sparse = Reference::default();
        let mean = score_list(&[rich.clone(), sparse]);
        let expected = (score_reference(&rich) + score_reference(&Reference::default())) / 2.0;
        assert!((mean - expected).abs() < 1e-9);
    }

    #[test]
    fn invalid_year_fails_validity_check() {
        let reference = Reference {
            year: Some(1500),
            ..Default::default()
        };
        assert_eq!(data_validity_score(&reference), 0.0);
    }
}
