use std::sync::LazyLock;

use regex::Regex;

use crate::registry::Parser;

/// One performed replacement, destined for the `citation_normalization`
/// front-matter section (spec §4.6 "Front-matter update").
#[derive(Debug, Clone)]
pub struct Replacement {
    pub original: String,
    pub normalized: String,
    pub position: usize,
    pub description: String,
}

fn superscript_digit(c: char) -> Option<char> {
    match c {
        '⁰' => Some('0'),
        '¹' => Some('1'),
        '²' => Some('2'),
        '³' => Some('3'),
        '⁴' => Some('4'),
        '⁵' => Some('5'),
        '⁶' => Some('6'),
        '⁷' => Some('7'),
        '⁸' => Some('8'),
        '⁹' => Some('9'),
        _ => None,
    }
}

/// Build the normalized digit/comma string from a captured citation
/// fragment (spec §4.6: superscripts map to ASCII digits; adjacent
/// digits without a separator in a superscript run are treated as
/// separate numbers joined by commas).
fn build_number_string(captured: &str) -> String {
    let has_superscript = captured.chars().any(|c| superscript_digit(c).is_some());

    let raw = if has_superscript {
        let mut out = String::new();
        let mut prev_was_digit = false;
        for c in captured.chars() {
            if let Some(digit) = superscript_digit(c) {
                if prev_was_digit {
                    out.push(',');
                }
                out.push(digit);
                prev_was_digit = true;
            } else if c == ',' || c.is_whitespace() {
                if prev_was_digit {
                    out.push(',');
                    prev_was_digit = false;
                }
            } else if c.is_ascii_digit() {
                if prev_was_digit {
                    out.push(',');
                }
                out.push(c);
                prev_was_digit = true;
            }
        }
        out
    } else {
        captured.to_string()
    };

    static MULTI_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",+").unwrap());
    let collapsed = MULTI_COMMA.replace_all(&raw, ",");
    collapsed.trim_matches(',').to_string()
}

/// Render one pattern's replacement template for a single match (spec
/// §4.6 "Template variables").
fn render_replacement(whole_match: &str, captured: Option<&str>, template: &str) -> String {
    let matched_text = captured.unwrap_or(whole_match);
    let number_string = build_number_string(matched_text);

    if template.contains("{number}") {
        let clean = number_string.replace(',', "");
        return template.replace("{number}", &clean);
    }
    if template.contains("{numbers}") {
        return template.replace("{numbers}", &number_string);
    }
    if matched_text.starts_with('[') && matched_text.ends_with(']') {
        return matched_text.to_string();
    }
    format!("[{number_string}]")
}

/// `normalize_citations` (spec §4.6 "Rewrite algorithm" second half):
/// apply every pattern of `parser` in turn, right-to-left within each
/// pattern so earlier replacements don't shift later match offsets.
pub fn normalize_citations(content: &str, parser: &Parser) -> (String, Vec<Replacement>) {
    let mut text = content.to_string();
    let mut replacements = Vec::new();

    for rule in &parser.patterns {
        let matches: Vec<_> = rule.regex.find_iter(&text).map(|m| (m.start(), m.end())).collect();
        for (start, end) in matches.into_iter().rev() {
            let whole = text[start..end].to_string();
            let captured = rule
                .regex
                .captures(&whole)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());
            let normalized = render_replacement(&whole, captured.as_deref(), &rule.replacement);

            // Skip no-op rewrites (text already canonical) so a second
            // pass over already-normalized content records nothing.
            if normalized == whole {
                continue;
            }

            text.replace_range(start..end, &normalized);
            replacements.push(Replacement {
                original: whole,
                normalized,
                position: start,
                description: rule.description.clone(),
            });
        }
    }

    // Keep replacement records in document order for the front-matter
    // log even though each pattern above was applied right-to-left.
    replacements.sort_by_key(|r| r.position);
    (text, replacements)
}

static RANGE_BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)[–-](\d+)\]").unwrap());

/// Expand a bracketed numeric range to its member list (spec §4.6
/// "Limits"): only when `start <= end` and `end - start <= 100`,
/// otherwise the bracket is left untouched for log-and-review.
pub fn expand_ranges(text: &str) -> String {
    RANGE_BRACKET
        .replace_all(text, |caps: &regex::Captures| {
            let whole = &caps[0];
            let start: u32 = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => return whole.to_string(),
            };
            let end: u32 = match caps[2].parse() {
                Ok(n) => n,
                Err(_) => return whole.to_string(),
            };
            if start <= end && end - start <= 100 {
                let numbers: Vec<String> = (start..=end).map(|n| n.to_string()).collect();
                format!("[{}]", numbers.join(","))
            } else {
                whole.to_string()
            }
        })
        .into_owned()
}

static ADJACENT_BRACKET_CLUSTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\[\d+(?:,\d+)*\](?:,\s*)?){2,}").unwrap());
static BRACKET_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+(?:,\d+)*)\]").unwrap());

/// Merge consecutive individual citation brackets (`[1], [2], [3]`) into
/// one grouped bracket (`[1,2,3]`). Off by default (spec §9 Open
/// Question 2: individual rendering is the default; this is the
/// opt-in `grouped_citations` flag's effect).
pub fn group_adjacent_citations(text: &str) -> String {
    ADJACENT_BRACKET_CLUSTER
        .replace_all(text, |caps: &regex::Captures| {
            let whole = &caps[0];
            let mut numbers = Vec::new();
            for bracket in BRACKET_DIGITS.captures_iter(whole) {
                numbers.extend(bracket[1].split(',').map(str::to_string));
            }
            format!("[{}]", numbers.join(","))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn superscript_run_becomes_comma_joined_digits() {
        let registry = Registry::with_builtin();
        let parser = registry.get("generic").unwrap();
        let (out, replacements) = normalize_citations("see ²³ here", parser);
        assert_eq!(out, "see [2,3] here");
        assert_eq!(replacements.len(), 1);
    }

    #[test]
    fn bracketed_single_digit_is_canonical_already() {
        let registry = Registry::with_builtin();
        let parser = registry.get("generic").unwrap();
        let (out, _) = normalize_citations("see [7] here", parser);
        assert_eq!(out, "see [7] here");
    }

    #[test]
    fn parenthesized_list_becomes_bracketed() {
        let registry = Registry::with_builtin();
        let parser = registry.get("generic").unwrap();
        let (out, _) = normalize_citations("see (1,2) here", parser);
        assert_eq!(out, "see [1,2] here");
    }

    #[test]
    fn applying_twice_is_a_no_op() {
        let registry = Registry::with_builtin();
        let parser = registry.get("generic").unwrap();
        let (first, _) = normalize_citations("see ²³ here", parser);
        let (second, replacements) = normalize_citations(&first, parser);
        assert_eq!(first, second);
        assert!(replacements.is_empty());
    }

    #[test]
    fn expands_small_range() {
        assert_eq!(expand_ranges("see [4-8] here"), "see [4,5,6,7,8] here");
    }

    #[test]
    fn leaves_oversized_range_untouched() {
        let text = "see [1-500] here";
        assert_eq!(expand_ranges(text), text);
    }

    #[test]
    fn groups_adjacent_individual_citations() {
        assert_eq!(group_adjacent_citations("see [1], [2], [3] here"), "see [1,2,3] here");
    }

    #[test]
    fn does_not_group_isolated_citation() {
        let text = "see [1] alone here";
        assert_eq!(group_adjacent_citations(text), text);
    }
}
