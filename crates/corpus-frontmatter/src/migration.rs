use corpus_errors::CorpusError;
use serde_yaml::{Mapping, Value};

use crate::header::{self, Header};

pub const CURRENT_VERSION: &str = "3.2";

type MigrationStep = fn(&mut Header);

/// Table-driven migration registry (spec §4.1). Each `(from, to)` pair is
/// applied in sequence; migrations only add missing sections, never drop
/// unknown keys, and always append a `migration_history` record.
fn registered_steps(from_version: &str) -> &'static [(&'static str, MigrationStep)] {
    match from_version {
        "3.0" => &[("3.0", step_add_defaults)],
        "3.1" => &[("3.1", step_add_defaults)],
        _ => &[("unknown", step_add_defaults)],
    }
}

fn step_add_defaults(header: &mut Header) {
    for section in [
        "citation_metadata",
        "citations",
        "paper_structure",
        "ai_content",
        "tags",
        "citation_normalization",
        "sync_metadata",
        "processing_timestamps",
    ] {
        if header::get(header, section).is_none() {
            let default = match section {
                "citations" | "processing_timestamps" => Value::Mapping(Mapping::new()),
                "tags" => Value::Sequence(Vec::new()),
                _ => Value::Null,
            };
            header::set(header, section, default);
        }
    }
    if header::get(header, "processing_status").is_none() {
        header::set(header, "processing_status", Value::Mapping(Mapping::new()));
    }
}

fn append_migration_history(header: &mut Header, from_version: &str, to_version: &str) {
    let mut history = match header::get(header, "migration_history") {
        Some(Value::Sequence(seq)) => seq.clone(),
        _ => Vec::new(),
    };
    let mut record = Mapping::new();
    record.insert(header::key("from"), Value::String(from_version.to_string()));
    record.insert(header::key("to"), Value::String(to_version.to_string()));
    record.insert(
        header::key("migrated_at"),
        Value::String(header::now_iso8601()),
    );
    history.push(Value::Mapping(record));
    header::set(header, "migration_history", Value::Sequence(history));
}

/// Migrate `header` from `from_version` to `to_version`.
pub fn migrate(
    header: &mut Header,
    from_version: &str,
    to_version: &str,
) -> Result<(), CorpusError> {
    if from_version == to_version {
        return Ok(());
    }
    if to_version != CURRENT_VERSION {
        return Err(CorpusError::validation(
            format!("no migration path to unsupported version `{to_version}`"),
            "FM_MIGRATION_TARGET",
        ));
    }

    let steps = registered_steps(from_version);
    for (step_from, step) in steps {
        step(header);
        append_migration_history(header, step_from, to_version);
    }
    header::set_str(header, "workflow_version", to_version);
    Ok(())
}

/// Migrate in place if the header's recorded version is behind current.
pub fn migrate_if_needed(header: &mut Header) -> Result<bool, CorpusError> {
    let recorded = header::get_str(header, "workflow_version")
        .unwrap_or("unknown")
        .to_string();
    if recorded == CURRENT_VERSION {
        return Ok(false);
    }
    migrate(header, &recorded, CURRENT_VERSION)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_from_unknown_adds_defaults_and_history() {
        let mut header = Header::new();
        header::set_str(&mut header, "citation_key", "smith2023test");
        let changed = migrate_if_needed(&mut header).unwrap();
        assert!(changed);
        assert_eq!(
            header::get_str(&header, "workflow_version"),
            Some(CURRENT_VERSION)
        );
        assert!(header::get(&header, "citation_metadata").is_some());
        match header::get(&header, "migration_history") {
            Some(Value::Sequence(seq)) => assert_eq!(seq.len(), 1),
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn migrate_preserves_unknown_keys() {
        let mut header = Header::new();
        header::set_str(&mut header, "some_future_field", "kept");
        migrate_if_needed(&mut header).unwrap();
        assert_eq!(header::get_str(&header, "some_future_field"), Some("kept"));
    }

    #[test]
    fn migrate_is_noop_at_current_version() {
        let mut header = Header::new();
        header::set_str(&mut header, "workflow_version", CURRENT_VERSION);
        assert!(!migrate_if_needed(&mut header).unwrap());
    }
}
