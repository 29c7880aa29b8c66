use unicode_normalization::UnicodeNormalization;

use corpus_providers::Reference;

/// Synthesize a `references.bib` citation key from the first author's
/// surname and year (spec §9 Open Question 3): missing year -> `n.d.`,
/// non-ASCII surnames transliterated via NFKD + diacritic strip, empty
/// result after stripping falls back to `ref{n:03d}`.
pub fn synthesize_key(reference: &Reference, ordinal: u32) -> String {
    let year = reference
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "n.d.".to_string());

    let surname = reference
        .authors
        .as_deref()
        .and_then(first_author_surname)
        .map(|s| transliterate(&s))
        .filter(|s| !s.is_empty());

    match surname {
        Some(surname) => format!("{surname}{year}"),
        None => format!("ref{ordinal:03}"),
    }
}

/// Best-effort "first author's surname" extraction: authors are joined
/// with `, ` by the providers (spec §4.5), and within one author the
/// surname conventionally comes first (`Surname, Given` or just
/// `Surname`).
fn first_author_surname(authors: &str) -> Option<String> {
    let first = authors.split(',').next()?.trim();
    let surname = first.split_whitespace().last().unwrap_or(first);
    if surname.is_empty() {
        None
    } else {
        Some(surname.to_string())
    }
}

fn transliterate(raw: &str) -> String {
    raw.nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}
