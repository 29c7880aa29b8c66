use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use corpus_errors::CorpusError;
use indexmap::IndexMap;

/// A single entry destined for a `.bib` sidecar file. Built by the fetch
/// orchestrator (C6) from provider responses, not parsed from an existing
/// bibliography — so it carries a plain field map rather than a
/// `biblatex::Entry`.
#[derive(Debug, Clone)]
pub struct OutputEntry {
    pub citation_key: String,
    pub entry_type: String,
    /// Insertion order is preserved in the rendered output, matching the
    /// order fields are usually hand-written in a `.bib` file.
    pub fields: IndexMap<String, String>,
}

fn escape_field(value: &str) -> String {
    value.replace('{', "\\{").replace('}', "\\}")
}

fn render_entry(entry: &OutputEntry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "@{}{{{},", entry.entry_type, entry.citation_key);
    let field_count = entry.fields.len();
    for (i, (key, value)) in entry.fields.iter().enumerate() {
        let sep = if i + 1 == field_count { "" } else { "," };
        let _ = writeln!(out, "  {key} = {{{}}}{sep}", escape_field(value));
    }
    out.push_str("}\n");
    out
}

/// Render a full bibliography in citation-key order, with one blank line
/// between entries.
pub fn render(entries: &[OutputEntry]) -> String {
    entries
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write(path: &Path, entries: &[OutputEntry]) -> Result<(), CorpusError> {
    let rendered = render(entries);
    fs::write(path, rendered).map_err(|e| CorpusError::from(e).with_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fields_in_insertion_order() {
        let mut fields = IndexMap::new();
        fields.insert("title".to_string(), "A Test Paper".to_string());
        fields.insert("year".to_string(), "2023".to_string());
        let entry = OutputEntry {
            citation_key: "smith2023".to_string(),
            entry_type: "article".to_string(),
            fields,
        };
        let rendered = render_entry(&entry);
        let title_pos = rendered.find("title").unwrap();
        let year_pos = rendered.find("year").unwrap();
        assert!(title_pos < year_pos);
        assert!(rendered.starts_with("@article{smith2023,"));
        assert!(rendered.trim_end().ends_with('}'));
    }

    #[test]
    fn escapes_braces_in_values() {
        let mut fields = IndexMap::new();
        fields.insert("title".to_string(), "A {Weird} Title".to_string());
        let entry = OutputEntry {
            citation_key: "x".to_string(),
            entry_type: "misc".to_string(),
            fields,
        };
        let rendered = render_entry(&entry);
        assert!(rendered.contains("A \\{Weird\\} Title"));
    }

    #[test]
    fn multi_entry_render_separates_with_blank_line() {
        let entries = vec![
            OutputEntry {
                citation_key: "a".to_string(),
                entry_type: "misc".to_string(),
                fields: IndexMap::new(),
            },
            OutputEntry {
                citation_key: "b".to_string(),
                entry_type: "misc".to_string(),
                fields: IndexMap::new(),
            },
        ];
        let rendered = render(&entries);
        assert!(rendered.contains("@misc{a,"));
        assert!(rendered.contains("@misc{b,"));
    }
}
