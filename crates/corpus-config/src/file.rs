//! TOML-facing shapes for `pipeline.toml` (spec §6 configuration table).
//! Every field carries a `#[serde(default = ...)]` so a file that sets only
//! the one knob an operator cares about still produces a fully-populated
//! policy; unknown keys are ignored by `toml`'s normal deserialization
//! tolerance, matching the teacher's "forward evolution without immediate
//! warnings" posture in `core-config`.

use std::collections::HashMap;

use serde::Deserialize;

use corpus_normalize::NormalizerPolicy;
use corpus_organize::OrganizePolicy;
use corpus_status::StatusPolicy;
use corpus_sync::SyncPolicy;
use corpus_workflow::{LmStageConfig, StageFlags, WorkflowConfig};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OrganizeConfig {
    pub create_backup: bool,
    pub handle_duplicates: bool,
    pub update_yaml_header: bool,
}

impl Default for OrganizeConfig {
    fn default() -> Self {
        let d = OrganizePolicy::default();
        OrganizeConfig {
            create_backup: d.create_backup,
            handle_duplicates: d.handle_duplicates,
            update_yaml_header: d.update_yaml_header,
        }
    }
}

impl From<OrganizeConfig> for OrganizePolicy {
    fn from(c: OrganizeConfig) -> Self {
        OrganizePolicy {
            create_backup: c.create_backup,
            handle_duplicates: c.handle_duplicates,
            update_yaml_header: c.update_yaml_header,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncCheckerConfig {
    pub enabled: bool,
    pub auto_fix_minor_issues: bool,
    pub backup_before_auto_fix: bool,
    pub display_doi_links: bool,
    pub doi_link_format: String,
}

impl Default for SyncCheckerConfig {
    fn default() -> Self {
        let d = SyncPolicy::default();
        SyncCheckerConfig {
            enabled: d.enabled,
            auto_fix_minor_issues: d.auto_fix_minor_issues,
            backup_before_auto_fix: d.backup_before_auto_fix,
            display_doi_links: d.display_doi_links,
            doi_link_format: d.doi_link_format,
        }
    }
}

impl From<SyncCheckerConfig> for SyncPolicy {
    fn from(c: SyncCheckerConfig) -> Self {
        SyncPolicy {
            enabled: c.enabled,
            auto_fix_minor_issues: c.auto_fix_minor_issues,
            backup_before_auto_fix: c.backup_before_auto_fix,
            display_doi_links: c.display_doi_links,
            doi_link_format: c.doi_link_format,
        }
    }
}

/// `citation_fetcher.apis.<provider>.*` wiring (spec §6). Parsed in full for
/// operator documentation and forward compatibility, but only `enabled`
/// currently has an effect: `corpus-providers`' three clients construct
/// their own `ProviderSettings` internally (deliberately closed, spec
/// §4.5) and take no override, so `base_url`/`rate_limit`/`timeout`/
/// `quality_threshold`/`api_key_env` here are recognized-but-inert until
/// that crate grows an injection point.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProviderWiring {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub rate_limit: Option<f64>,
    pub timeout: Option<u64>,
    pub quality_threshold: Option<f64>,
    pub api_key_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CitationFetcherConfig {
    pub apis: HashMap<String, ProviderWiring>,
}

impl CitationFetcherConfig {
    /// Whole-stage enable: off only when every configured provider is
    /// explicitly disabled and at least one entry exists.
    fn stage_enabled(&self) -> bool {
        if self.apis.is_empty() {
            return true;
        }
        self.apis.values().any(|p| p.enabled.unwrap_or(true))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NormalizerConfig {
    pub enabled: bool,
    pub batch_size: u32,
    pub retry_attempts: u32,
    pub publisher_detection: PublisherDetectionConfig,
    pub notification: NotificationConfig,
    pub grouped_citations: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PublisherDetectionConfig {
    pub auto_detect: bool,
    pub fallback_parser: String,
}

impl Default for PublisherDetectionConfig {
    fn default() -> Self {
        let d = NormalizerPolicy::default();
        PublisherDetectionConfig {
            auto_detect: d.auto_detect,
            fallback_parser: d.fallback_parser,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    pub unsupported_pattern_alert: bool,
    pub new_parser_suggestion: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        let d = NormalizerPolicy::default();
        NotificationConfig {
            unsupported_pattern_alert: d.unsupported_pattern_alert,
            new_parser_suggestion: d.new_parser_suggestion,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let d = NormalizerPolicy::default();
        NormalizerConfig {
            enabled: d.enabled,
            batch_size: d.batch_size,
            retry_attempts: d.retry_attempts,
            publisher_detection: PublisherDetectionConfig::default(),
            notification: NotificationConfig::default(),
            grouped_citations: d.grouped_citations,
        }
    }
}

impl From<NormalizerConfig> for NormalizerPolicy {
    fn from(c: NormalizerConfig) -> Self {
        NormalizerPolicy {
            enabled: c.enabled,
            batch_size: c.batch_size,
            retry_attempts: c.retry_attempts,
            auto_detect: c.publisher_detection.auto_detect,
            fallback_parser: c.publisher_detection.fallback_parser,
            unsupported_pattern_alert: c.notification.unsupported_pattern_alert,
            new_parser_suggestion: c.notification.new_parser_suggestion,
            grouped_citations: c.grouped_citations,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StatusManagementConfig {
    pub yaml_validation: bool,
    pub auto_backup: bool,
    pub timestamp_retention_days: u32,
    pub detailed_timestamp_tracking: bool,
    pub backup_strategy: BackupStrategyConfig,
    pub error_handling: ErrorHandlingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackupStrategyConfig {
    pub backup_before_status_update: bool,
}

impl Default for BackupStrategyConfig {
    fn default() -> Self {
        let d = StatusPolicy::default();
        BackupStrategyConfig { backup_before_status_update: d.backup_before_status_update }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ErrorHandlingConfig {
    pub validate_yaml_before_update: bool,
    pub create_backup_on_yaml_error: bool,
    pub auto_repair_corrupted_headers: bool,
    pub fallback_to_backup_on_failure: bool,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        let d = StatusPolicy::default();
        ErrorHandlingConfig {
            validate_yaml_before_update: d.validate_yaml_before_update,
            create_backup_on_yaml_error: d.create_backup_on_yaml_error,
            auto_repair_corrupted_headers: d.auto_repair_corrupted_headers,
            fallback_to_backup_on_failure: d.fallback_to_backup_on_failure,
        }
    }
}

impl Default for StatusManagementConfig {
    fn default() -> Self {
        let d = StatusPolicy::default();
        StatusManagementConfig {
            yaml_validation: d.yaml_validation,
            auto_backup: d.auto_backup,
            timestamp_retention_days: d.timestamp_retention_days,
            detailed_timestamp_tracking: d.detailed_timestamp_tracking,
            backup_strategy: BackupStrategyConfig::default(),
            error_handling: ErrorHandlingConfig::default(),
        }
    }
}

impl From<StatusManagementConfig> for StatusPolicy {
    fn from(c: StatusManagementConfig) -> Self {
        StatusPolicy {
            yaml_validation: c.yaml_validation,
            auto_backup: c.auto_backup,
            timestamp_retention_days: c.timestamp_retention_days,
            detailed_timestamp_tracking: c.detailed_timestamp_tracking,
            backup_before_status_update: c.backup_strategy.backup_before_status_update,
            validate_yaml_before_update: c.error_handling.validate_yaml_before_update,
            create_backup_on_yaml_error: c.error_handling.create_backup_on_yaml_error,
            auto_repair_corrupted_headers: c.error_handling.auto_repair_corrupted_headers,
            fallback_to_backup_on_failure: c.error_handling.fallback_to_backup_on_failure,
        }
    }
}

/// `retry.*` (spec §6): "default retry policy for transient failures".
/// Recognized and round-tripped but, as of this build, only the LM stage
/// has a retry loop (its own `lm_stage.max_retries`/`request_delay_secs`);
/// no other component currently consumes a generic retry policy, so this
/// struct is parsed for forward compatibility rather than wired anywhere.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: f64,
    pub backoff_factor: f64,
    pub jitter: bool,
    pub retry_exceptions: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            delay: 1.0,
            backoff_factor: 2.0,
            jitter: false,
            retry_exceptions: vec!["APIError".to_string()],
        }
    }
}

/// `lm_stage.*` (`SPEC_FULL.md` §1.3 supplement, not in the original §6
/// table): the Claude round-trip contract shared by `tagger`,
/// `translate_abstract`, and `ochiai_format`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LmStageFileConfig {
    pub enabled: bool,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub request_delay_secs: f64,
}

impl Default for LmStageFileConfig {
    fn default() -> Self {
        let d = LmStageConfig::default();
        LmStageFileConfig {
            enabled: d.enabled,
            model: d.model,
            api_key_env: d.api_key_env,
            timeout_secs: d.timeout_secs,
            max_retries: d.max_retries,
            request_delay_secs: d.request_delay_secs,
        }
    }
}

impl From<LmStageFileConfig> for LmStageConfig {
    fn from(c: LmStageFileConfig) -> Self {
        LmStageConfig {
            enabled: c.enabled,
            model: c.model,
            api_key_env: c.api_key_env,
            timeout_secs: c.timeout_secs,
            max_retries: c.max_retries,
            request_delay_secs: c.request_delay_secs,
        }
    }
}

/// Top-level shape of `pipeline.toml`, one field per table in spec §6.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineFile {
    pub workflows: WorkflowsTable,
    pub sync_checker: SyncCheckerConfig,
    pub citation_fetcher: CitationFetcherConfig,
    pub citation_pattern_normalizer: NormalizerConfig,
    pub status_management: StatusManagementConfig,
    pub retry: RetryConfig,
    pub lm_stage: LmStageFileConfig,
    pub preserve_existing_citations: bool,
}

impl Default for PipelineFile {
    fn default() -> Self {
        PipelineFile {
            workflows: WorkflowsTable::default(),
            sync_checker: SyncCheckerConfig::default(),
            citation_fetcher: CitationFetcherConfig::default(),
            citation_pattern_normalizer: NormalizerConfig::default(),
            status_management: StatusManagementConfig::default(),
            retry: RetryConfig::default(),
            lm_stage: LmStageFileConfig::default(),
            preserve_existing_citations: true,
        }
    }
}

impl PipelineFile {
    pub fn into_workflow_config(self) -> WorkflowConfig {
        let organize: OrganizePolicy = self.workflows.organize.into();
        let sync: SyncPolicy = self.sync_checker.into();
        let normalizer: NormalizerPolicy = self.citation_pattern_normalizer.into();
        let status: StatusPolicy = self.status_management.into();
        let lm_stage: LmStageConfig = self.lm_stage.into();
        let fetch_enabled = self.citation_fetcher.stage_enabled();

        let flags = StageFlags {
            organize: true,
            sync: sync.enabled,
            fetch: fetch_enabled,
            section_parsing: true,
            ai_citation_support: true,
            citation_pattern_normalizer: normalizer.enabled,
            tagger: lm_stage.enabled,
            translate_abstract: lm_stage.enabled,
            ochiai_format: lm_stage.enabled,
            final_sync: sync.enabled,
        };

        WorkflowConfig {
            organize,
            sync,
            normalizer,
            status,
            lm_stage,
            preserve_existing_citations: self.preserve_existing_citations,
            flags,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WorkflowsTable {
    pub organize: OrganizeConfig,
}
