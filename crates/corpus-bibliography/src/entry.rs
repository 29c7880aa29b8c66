use std::collections::HashMap;

use biblatex::{Bibliography, Chunk, Chunks};
use corpus_errors::CorpusError;

use corpus_frontmatter::doi;

/// A normalized view over one BibTeX entry. `fields` keeps every
/// lower-cased field verbatim (LaTeX brace-wrappers already stripped by
/// `biblatex`'s chunk parser) so required-field enforcement and the
/// reference emitter (C6) can consult fields this struct doesn't promote
/// to a typed accessor.
#[derive(Debug, Clone)]
pub struct BibEntry {
    pub citation_key: String,
    pub entry_type: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub pages: Option<String>,
    pub publisher: Option<String>,
    pub booktitle: Option<String>,
    pub url: Option<String>,
    pub fields: HashMap<String, String>,
}

fn chunks_to_plain(chunks: &Chunks) -> String {
    chunks
        .iter()
        .map(|spanned| match &spanned.v {
            Chunk::Normal(s) => s.clone(),
            Chunk::Verbatim(s) => s.clone(),
            Chunk::Math(s) => s.clone(),
        })
        .collect::<String>()
}

fn extract_year(raw: &str) -> Option<i32> {
    // Dates in BibTeX commonly appear as `2023`, `2023-05`, or a range; the
    // leading four-digit run is the year in every case we need to consume.
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        digits[..4].parse().ok()
    } else {
        None
    }
}

impl BibEntry {
    pub(crate) fn from_biblatex(entry: &biblatex::Entry) -> Self {
        let mut fields = HashMap::new();
        for (name, chunks) in entry.fields.iter() {
            fields.insert(name.to_lowercase(), chunks_to_plain(chunks));
        }

        let doi = fields.get("doi").and_then(|v| doi::normalize(v));
        let year = fields
            .get("year")
            .and_then(|v| extract_year(v))
            .or_else(|| fields.get("date").and_then(|v| extract_year(v)));

        BibEntry {
            citation_key: entry.key.clone(),
            entry_type: format!("{:?}", entry.entry_type).to_lowercase(),
            doi,
            title: fields.get("title").cloned(),
            author: fields.get("author").cloned(),
            year,
            journal: fields.get("journal").cloned(),
            volume: fields.get("volume").cloned(),
            number: fields.get("number").cloned(),
            pages: fields.get("pages").cloned(),
            publisher: fields.get("publisher").cloned(),
            booktitle: fields.get("booktitle").cloned(),
            url: fields.get("url").cloned(),
            fields,
        }
    }

    /// Required-field enforcement per the conventional BibTeX type set
    /// (spec §6).
    pub fn validate_required_fields(&self) -> Result<(), CorpusError> {
        let required: &[&str] = match self.entry_type.as_str() {
            "article" => &["title", "author", "journal", "year"],
            "book" => &["title", "author", "publisher", "year"],
            "inproceedings" => &["title", "author", "booktitle", "year"],
            "incollection" => &["title", "author", "booktitle", "year"],
            "phdthesis" | "mastersthesis" => &["title", "author", "school", "year"],
            _ => &[],
        };
        for field in required {
            if !self.fields.contains_key(*field) {
                return Err(CorpusError::bibtex(
                    format!(
                        "entry `{}` ({}) is missing required field `{field}`",
                        self.citation_key, self.entry_type
                    ),
                    "BIB_MISSING_FIELD",
                )
                .with_context("citation_key", &self.citation_key));
            }
        }
        Ok(())
    }
}

pub fn parse_bibliography(content: &str) -> Result<Bibliography, CorpusError> {
    Bibliography::parse(content)
        .map_err(|e| CorpusError::bibtex(format!("failed to parse bibliography: {e}"), "BIB_PARSE"))
}
