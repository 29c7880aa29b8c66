use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Character set allowed inside a citation bracket before it has been
/// normalized to plain digits (spec §4.6: digits, commas, whitespace,
/// footnote carets, en-dash/hyphen ranges).
const CITATION_CHARS: &str = r"[0-9,\s\^–-]+";

static MD_LINK_CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\\?\[({CITATION_CHARS})\]\\?\(([^)]+)\)")).unwrap());
static MD_REF_CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\\?\[({CITATION_CHARS})\]\\?\[([^\]]+)\]")).unwrap());
static HTML_LINK_CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"<a[^>]*>({CITATION_CHARS})</a>")).unwrap());
static STRIP_LEADING_BACKSLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\\(\[{CITATION_CHARS}\])")).unwrap());
static STRIP_TRAILING_BACKSLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(\[{CITATION_CHARS}\])\\")).unwrap());

static FOOTNOTE_CLUSTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[*(?:\[\^\d+\][,\s]*)+\]*").unwrap());
static FOOTNOTE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\^(\d+)").unwrap());

static DOUBLE_BRACKET_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(\d+(?:[–-]\d+)?)\]\]").unwrap());
static DOUBLE_BRACKET_CLUSTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:\[\d+(?:[–-]\d+)?\](?:,\s*)?){2,}\]").unwrap());
static BRACKET_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+(?:[–-]\d+)?)\]").unwrap());

/// Strip hyperlink and footnote wrappers from in-text citations while
/// preserving the citation number(s) inside (spec §4.6 "Rewrite
/// algorithm", pre-clean pass). Pure text transformation; safe to run
/// before publisher-specific pattern rewriting.
pub fn remove_citation_links(content: &str) -> String {
    let mut text = MD_LINK_CITATION.replace_all(content, "[$1]").into_owned();
    text = MD_REF_CITATION.replace_all(&text, "[$1]").into_owned();
    text = HTML_LINK_CITATION.replace_all(&text, "[$1]").into_owned();
    text = STRIP_LEADING_BACKSLASH.replace_all(&text, "$1").into_owned();
    text = STRIP_TRAILING_BACKSLASH.replace_all(&text, "$1").into_owned();
    text = collapse_footnote_markers(&text);
    text = flatten_double_brackets(&text);
    text
}

fn collapse_footnote_markers(input: &str) -> String {
    FOOTNOTE_CLUSTER
        .replace_all(input, |caps: &Captures| {
            let whole = &caps[0];
            let numbers: Vec<&str> = FOOTNOTE_NUMBER
                .captures_iter(whole)
                .map(|c| c.get(1).unwrap().as_str())
                .collect();
            if numbers.is_empty() {
                whole.to_string()
            } else {
                format!("[{}]", numbers.join(","))
            }
        })
        .into_owned()
}

fn flatten_double_brackets(input: &str) -> String {
    let mut text = DOUBLE_BRACKET_SINGLE.replace_all(input, "[$1]").into_owned();
    text = DOUBLE_BRACKET_CLUSTER
        .replace_all(&text, |caps: &Captures| {
            let whole = &caps[0];
            let numbers: Vec<&str> = BRACKET_GROUP
                .captures_iter(whole)
                .map(|c| c.get(1).unwrap().as_str())
                .collect();
            format!("[{}]", numbers.join(","))
        })
        .into_owned();
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_link_wrapper() {
        let out = remove_citation_links("see [1,2](https://example.com/ref)");
        assert_eq!(out, "see [1,2]");
    }

    #[test]
    fn strips_escaped_markdown_link_wrapper() {
        let out = remove_citation_links(r"see \[4–8](https://example.com/ref)");
        assert_eq!(out, "see [4–8]");
    }

    #[test]
    fn strips_html_wrapper() {
        let out = remove_citation_links(r#"see <a href="x">3</a>"#);
        assert_eq!(out, "see [3]");
    }

    #[test]
    fn collapses_footnote_cluster() {
        let out = remove_citation_links("see [[^1],[^2],[^3]]");
        assert_eq!(out, "see [1,2,3]");
    }

    #[test]
    fn collapses_single_footnote() {
        let out = remove_citation_links("see [^1]");
        assert_eq!(out, "see [1]");
    }

    #[test]
    fn flattens_double_bracket_pair() {
        let out = remove_citation_links("see [[1], [2]]");
        assert_eq!(out, "see [1,2]");
    }

    #[test]
    fn flattens_double_bracket_single() {
        let out = remove_citation_links("see [[1]]");
        assert_eq!(out, "see [1]");
    }
}
