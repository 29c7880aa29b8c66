//! Configuration loading (spec §6 configuration surface), grounded on the
//! teacher's `core-config`: a plain-old-data TOML file deserialized with
//! `serde`, defaults filled in for anything absent. The one deliberate
//! departure from the teacher is on parse failure — `core-config` falls
//! back to `ConfigFile::default()` silently; this crate treats a malformed
//! file that was actually found as a fatal `CorpusError::Configuration`
//! (spec §6 "Exit conditions": non-zero exit on "config invalid"), since a
//! batch pipeline running unattended should not silently process a corpus
//! under policy settings nobody asked for.

mod file;

use std::path::{Path, PathBuf};

use corpus_errors::CorpusError;
use corpus_workflow::WorkflowConfig;

pub use file::{
    CitationFetcherConfig, NormalizerConfig, OrganizeConfig, PipelineFile, ProviderWiring,
    RetryConfig, StatusManagementConfig, SyncCheckerConfig,
};

/// Candidate file name under both the workspace-local and XDG search paths.
const FILE_NAME: &str = "pipeline.toml";

/// Discovery order (spec §6, `SPEC_FULL.md` §1.3): an explicit `--config`
/// override wins; otherwise `<workspace>/config/pipeline.toml`; otherwise
/// the platform config directory. Returns `None` when nothing is found,
/// which is not an error — the caller runs on defaults.
pub fn discover(workspace_root: &Path, override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    let local = workspace_root.join("config").join(FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    let xdg = dirs::config_dir()?.join("corpus-pipeline").join(FILE_NAME);
    if xdg.exists() {
        return Some(xdg);
    }

    None
}

/// Load and merge the pipeline configuration into a `WorkflowConfig`.
/// Absent file: defaults throughout. Present-but-malformed file: fatal.
pub fn load(workspace_root: &Path, override_path: Option<&Path>) -> Result<WorkflowConfig, CorpusError> {
    let path = match discover(workspace_root, override_path) {
        Some(path) => path,
        None => {
            tracing::info!("no pipeline.toml found, using built-in defaults");
            return Ok(WorkflowConfig::default());
        }
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| CorpusError::configuration(e.to_string(), "CONFIG_UNREADABLE").with_path(&path))?;

    let parsed: PipelineFile = toml::from_str(&content)
        .map_err(|e| CorpusError::configuration(e.to_string(), "CONFIG_PARSE").with_path(&path))?;

    tracing::info!(path = %path.display(), "loaded pipeline configuration");
    Ok(parsed.into_workflow_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let workspace = tempdir().unwrap();
        let config = load(workspace.path(), None).unwrap();
        assert!(config.organize.create_backup);
        assert!(config.flags.organize);
    }

    #[test]
    fn explicit_override_path_is_used_even_without_workspace_config_dir() {
        let workspace = tempdir().unwrap();
        let config_file = workspace.path().join("custom.toml");
        std::fs::write(
            &config_file,
            "[workflows.organize]\ncreate_backup = false\n",
        )
        .unwrap();

        let config = load(workspace.path(), Some(&config_file)).unwrap();
        assert!(!config.organize.create_backup);
    }

    #[test]
    fn malformed_config_is_a_fatal_error() {
        let workspace = tempdir().unwrap();
        std::fs::create_dir_all(workspace.path().join("config")).unwrap();
        std::fs::write(workspace.path().join("config").join(FILE_NAME), "not = [valid toml").unwrap();

        let err = load(workspace.path(), None).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_PARSE");
    }

    #[test]
    fn workspace_local_config_overrides_defaults() {
        let workspace = tempdir().unwrap();
        std::fs::create_dir_all(workspace.path().join("config")).unwrap();
        std::fs::write(
            workspace.path().join("config").join(FILE_NAME),
            "[sync_checker]\nenabled = false\n\n[lm_stage]\nenabled = false\n",
        )
        .unwrap();

        let config = load(workspace.path(), None).unwrap();
        assert!(!config.sync.enabled);
        assert!(!config.lm_stage.enabled);
        // flags were derived from the loaded policies, not the struct defaults
        assert!(!config.flags.sync);
        assert!(!config.flags.tagger);
    }
}
