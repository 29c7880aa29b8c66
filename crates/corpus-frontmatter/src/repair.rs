use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use corpus_errors::CorpusError;
use regex::Regex;
use serde_yaml::Value;

use crate::codec::{self, backup_file};
use crate::header::{self, Header};

/// Ordered citation-key inference patterns (spec §4.3). First match wins.
static CITATION_KEY_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"^([A-Za-z]{1,20}\d{4}[a-zA-Z]?)(?:_.*)?\.md$").unwrap(),
        Regex::new(r"^([A-Za-z]{1,15}[A-Z][A-Za-z]{1,15}\d{4}[a-zA-Z]?)(?:_.*)?\.md$").unwrap(),
        Regex::new(r"^(\w{1,20}_\d{4}[a-zA-Z]?)(?:_.*)?\.md$").unwrap(),
    ]
});

/// Infer a citation key from a file name when the front-matter doesn't
/// carry one yet (fallback used by both C1's repair and C7's organize).
pub fn infer_citation_key_from_filename(file_name: &str) -> Option<String> {
    for pattern in CITATION_KEY_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(file_name) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }
    }
    None
}

/// Try truncating the header body at progressively earlier newlines until
/// it parses as YAML; this is the "first syntactically consistent prefix"
/// recovery strategy (spec §4.1).
fn salvage_header(header_str: &str) -> Option<Header> {
    let lines: Vec<&str> = header_str.split('\n').collect();
    for end in (0..=lines.len()).rev() {
        let candidate = lines[..end].join("\n");
        if candidate.trim().is_empty() {
            continue;
        }
        if let Ok(value) = serde_yaml::from_str::<Value>(&candidate) {
            if let Value::Mapping(m) = value {
                return Some(m);
            }
        }
    }
    None
}

/// Repair a paper file that failed to parse (spec §4.1 `repair`).
///
/// The original file is always backed up first. On success the file at
/// `path` is rewritten with a recovered or synthesized header and is
/// re-parseable afterward.
pub fn repair(path: &Path, backup_dir: &Path) -> Result<(), CorpusError> {
    let content = fs::read_to_string(path).map_err(|e| CorpusError::from(e).with_path(path))?;
    backup_file(path, backup_dir)?;

    let opening_fence_at = content
        .lines()
        .next()
        .map(|l| l.trim_end_matches('\r') == "---")
        .unwrap_or(false);

    let recovered = if opening_fence_at {
        let after_open = content.find('\n').map(|i| &content[i + 1..]).unwrap_or("");
        let header_region = after_open
            .split("\n---\n")
            .next()
            .unwrap_or(after_open);
        salvage_header(header_region).map(|header| {
            let remainder_start = header_region.len();
            let body = after_open
                .get(remainder_start..)
                .unwrap_or("")
                .trim_start_matches("\n---\n")
                .to_string();
            (header, body)
        })
    } else {
        None
    };

    let (header, body) = recovered.unwrap_or_else(|| synthesize_minimal(path, &content));

    codec::write(path, &header, &body, None)
}

fn synthesize_minimal(path: &Path, original_content: &str) -> (Header, String) {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let citation_key =
        infer_citation_key_from_filename(file_name).unwrap_or_else(|| "unknown".to_string());

    let mut header = Header::new();
    header::set_str(&mut header, "citation_key", citation_key);
    header::set_str(&mut header, "workflow_version", "3.2");
    header::set(
        &mut header,
        "processing_status",
        Value::Mapping(Default::default()),
    );
    header::set_str(&mut header, "created_at", header::now_iso8601());
    header::set_str(&mut header, "last_updated", header::now_iso8601());

    (header, original_content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn infers_simple_author_year_key() {
        assert_eq!(
            infer_citation_key_from_filename("smith2023.md").as_deref(),
            Some("smith2023")
        );
    }

    #[test]
    fn infers_camelcase_author_year_key() {
        assert_eq!(
            infer_citation_key_from_filename("VanDerBergSmith2023.md").as_deref(),
            Some("VanDerBergSmith2023")
        );
    }

    #[test]
    fn infers_underscored_key() {
        assert_eq!(
            infer_citation_key_from_filename("some_paper_2023_draft.md").as_deref(),
            Some("some_paper")
        );
    }

    #[test]
    fn repair_synthesizes_header_for_headerless_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smith2023.md");
        fs::write(&path, "# Just a paper\nNo front matter at all.\n").unwrap();
        let backup_dir = dir.path().join("backups");
        repair(&path, &backup_dir).unwrap();

        let (header, body) = codec::parse(&path).unwrap();
        assert_eq!(
            header::get_str(&header, "citation_key"),
            Some("smith2023")
        );
        assert!(body.contains("Just a paper"));
        assert_eq!(fs::read_dir(&backup_dir).unwrap().count(), 1);
    }

    #[test]
    fn repair_salvages_truncatable_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.md");
        // Second line is unparseable garbage; the first line alone is
        // still valid YAML once truncated there.
        fs::write(
            &path,
            "---\ncitation_key: smith2023test\n: : not yaml : :\n---\nBody.\n",
        )
        .unwrap();
        let backup_dir = dir.path().join("backups");
        repair(&path, &backup_dir).unwrap();

        let (header, _) = codec::parse(&path).unwrap();
        assert_eq!(
            header::get_str(&header, "citation_key"),
            Some("smith2023test")
        );
    }
}
