use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use corpus_errors::CorpusError;

use crate::header::Header;

const FENCE: &str = "---";

/// Parse a paper file into its header mapping and body text (spec §4.1).
///
/// The opening fence must be the file's first line; the header body runs
/// until the next line that is exactly `---`; everything after that line
/// (minus the single boundary newline) is the body.
pub fn parse(path: &Path) -> Result<(Header, String), CorpusError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CorpusError::from(e).with_path(path))?;
    parse_str(&content).map_err(|e| e.with_path(path))
}

pub fn parse_str(content: &str) -> Result<(Header, String), CorpusError> {
    let mut lines = content.split('\n');
    match lines.next() {
        Some(first) if first.trim_end_matches('\r') == FENCE => {}
        _ => {
            return Err(CorpusError::yaml(
                "file is missing a front-matter header",
                "FM_NO_HEADER",
            ));
        }
    }

    // Re-walk byte offsets so we can slice precisely rather than rejoin
    // a `Vec<&str>` (keeps embedded blank lines exact).
    let after_open = content
        .find('\n')
        .map(|i| &content[i + 1..])
        .unwrap_or("");

    let mut offset = 0usize;
    let mut closing_at = None;
    for line in after_open.split('\n') {
        if line.trim_end_matches('\r') == FENCE {
            closing_at = Some(offset);
            break;
        }
        offset += line.len() + 1; // +1 for the '\n' consumed by split
    }

    let closing_at = closing_at.ok_or_else(|| {
        CorpusError::yaml("front-matter header is never closed", "FM_UNCLOSED_HEADER")
    })?;

    let header_str = &after_open[..closing_at];
    let rest_start = closing_at + FENCE.len() + 1; // skip the "---" line and its newline
    let body_raw = if rest_start <= after_open.len() {
        &after_open[rest_start.min(after_open.len())..]
    } else {
        ""
    };
    let body = body_raw.strip_prefix('\n').unwrap_or(body_raw).to_string();

    let header: Header = if header_str.trim().is_empty() {
        Header::new()
    } else {
        serde_yaml::from_str(header_str).map_err(|e| {
            CorpusError::yaml(format!("header is not valid YAML: {e}"), "FM_YAML_PARSE")
        })?
    };

    Ok((header, body))
}

/// Serialize `header`/`body` back into paper-file form, matching the
/// canonical fence/body boundary (§4.1: exactly one newline).
pub fn render(header: &Header, body: &str) -> Result<String, CorpusError> {
    let header_yaml = if header.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(header)
            .map_err(|e| CorpusError::yaml(format!("failed to serialize header: {e}"), "FM_YAML_WRITE"))?
    };
    let trimmed_body = body.trim_start_matches('\n');
    Ok(format!("{FENCE}\n{header_yaml}{FENCE}\n{trimmed_body}"))
}

/// Atomic write-through: serialize to a sibling temp file, fsync, rename
/// over the target. If `backup_dir` is set and the target already exists,
/// the pre-existing target is copied there first.
pub fn write(
    path: &Path,
    header: &Header,
    body: &str,
    backup_dir: Option<&Path>,
) -> Result<(), CorpusError> {
    let rendered = render(header, body)?;

    if let Some(backup_dir) = backup_dir {
        if path.exists() {
            backup_file(path, backup_dir)?;
        }
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| CorpusError::from(e).with_path(parent))?;

    let tmp_path = sibling_temp_path(path);
    {
        let mut tmp = fs::File::create(&tmp_path)
            .map_err(|e| CorpusError::from(e).with_path(&tmp_path))?;
        tmp.write_all(rendered.as_bytes())
            .map_err(|e| CorpusError::from(e).with_path(&tmp_path))?;
        tmp.sync_all().map_err(|e| CorpusError::from(e).with_path(&tmp_path))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| CorpusError::from(e).with_path(path))?;

    Ok(())
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("paper.md");
    parent.join(format!(".{file_name}.tmp"))
}

/// Copy `path` into `backup_dir`, preserving the original file name and
/// prefixing it with a local timestamp so repeated backups don't collide.
pub fn backup_file(path: &Path, backup_dir: &Path) -> Result<PathBuf, CorpusError> {
    fs::create_dir_all(backup_dir).map_err(|e| CorpusError::from(e).with_path(backup_dir))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("backup.md");
    let stamp = crate::header::now_iso8601().replace([':', '.'], "-");
    let dest = backup_dir.join(format!("{stamp}_{file_name}"));
    fs::copy(path, &dest).map_err(|e| CorpusError::from(e).with_path(path))?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{get_str, set_str};
    use tempfile::tempdir;

    fn sample() -> (Header, String) {
        let mut h = Header::new();
        set_str(&mut h, "citation_key", "smith2023test");
        set_str(&mut h, "workflow_version", "3.2");
        (h, "Body text.\n".to_string())
    }

    #[test]
    fn roundtrip_parse_render() {
        let (header, body) = sample();
        let rendered = render(&header, &body).unwrap();
        let (parsed_header, parsed_body) = parse_str(&rendered).unwrap();
        assert_eq!(get_str(&parsed_header, "citation_key"), Some("smith2023test"));
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn missing_header_is_an_error() {
        assert!(parse_str("no header here").is_err());
    }

    #[test]
    fn unclosed_header_is_an_error() {
        assert!(parse_str("---\ncitation_key: x\n").is_err());
    }

    #[test]
    fn atomic_write_then_parse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.md");
        let (header, body) = sample();
        write(&path, &header, &body, None).unwrap();
        let (parsed_header, parsed_body) = parse(&path).unwrap();
        assert_eq!(get_str(&parsed_header, "citation_key"), Some("smith2023test"));
        assert_eq!(parsed_body, body);
        // no leftover temp file
        assert!(!dir.path().join(".paper.md.tmp").exists());
    }

    #[test]
    fn write_backs_up_existing_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.md");
        let (header, body) = sample();
        write(&path, &header, &body, None).unwrap();

        let backup_dir = dir.path().join("backups");
        let mut header2 = header.clone();
        set_str(&mut header2, "workflow_version", "3.2-updated");
        write(&path, &header2, &body, Some(&backup_dir)).unwrap();

        let entries: Vec<_> = fs::read_dir(&backup_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
