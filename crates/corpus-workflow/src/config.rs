use corpus_frontmatter::header::STEP_NAMES;
use corpus_normalize::NormalizerPolicy;
use corpus_organize::OrganizePolicy;
use corpus_status::StatusPolicy;
use corpus_sync::SyncPolicy;

use crate::lm::LmStageConfig;

/// Per-stage on/off surface the driver consults before even building a
/// stage's candidate set (spec §4.7 "stages whose feature flag is off are
/// skipped entirely"). Each field is seeded from the one config knob that
/// actually governs it; stages with no dedicated `enabled` flag in §6
/// default on and are only ever skipped via `--only`.
#[derive(Debug, Clone)]
pub struct StageFlags {
    pub organize: bool,
    pub sync: bool,
    pub fetch: bool,
    pub section_parsing: bool,
    pub ai_citation_support: bool,
    pub citation_pattern_normalizer: bool,
    pub tagger: bool,
    pub translate_abstract: bool,
    pub ochiai_format: bool,
    pub final_sync: bool,
}

impl StageFlags {
    pub fn is_enabled(&self, step: &str) -> bool {
        match step {
            "organize" => self.organize,
            "sync" => self.sync,
            "fetch" => self.fetch,
            "section_parsing" => self.section_parsing,
            "ai_citation_support" => self.ai_citation_support,
            "citation_pattern_normalizer" => self.citation_pattern_normalizer,
            "tagger" => self.tagger,
            "translate_abstract" => self.translate_abstract,
            "ochiai_format" => self.ochiai_format,
            "final_sync" => self.final_sync,
            _ => false,
        }
    }
}

/// The driver-level bundle of every per-stage policy plus the LM round-trip
/// contract, read once at startup by `corpus-config` and threaded through
/// `Driver::run` (spec §6, `SPEC_FULL.md` §1.3).
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub organize: OrganizePolicy,
    pub sync: SyncPolicy,
    pub normalizer: NormalizerPolicy,
    pub status: StatusPolicy,
    pub lm_stage: LmStageConfig,
    pub preserve_existing_citations: bool,
    pub flags: StageFlags,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let sync = SyncPolicy::default();
        let normalizer = NormalizerPolicy::default();
        let lm_stage = LmStageConfig::default();

        let flags = StageFlags {
            organize: true,
            sync: sync.enabled,
            fetch: true,
            section_parsing: true,
            ai_citation_support: true,
            citation_pattern_normalizer: normalizer.enabled,
            tagger: lm_stage.enabled,
            translate_abstract: lm_stage.enabled,
            ochiai_format: lm_stage.enabled,
            final_sync: sync.enabled,
        };

        WorkflowConfig {
            organize: OrganizePolicy::default(),
            sync,
            normalizer,
            status: StatusPolicy::default(),
            lm_stage,
            preserve_existing_citations: true,
            flags,
        }
    }
}

/// Every step name in fixed pipeline order (spec §4.7), re-exported here so
/// callers building an `--only` filter don't need to import
/// `corpus_frontmatter` directly.
pub fn stage_order() -> &'static [&'static str] {
    STEP_NAMES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_follow_their_source_policies() {
        let config = WorkflowConfig::default();
        assert!(config.flags.organize);
        assert_eq!(config.flags.sync, config.sync.enabled);
        assert_eq!(config.flags.citation_pattern_normalizer, config.normalizer.enabled);
        assert_eq!(config.flags.tagger, config.lm_stage.enabled);
    }

    #[test]
    fn stage_order_matches_step_names() {
        assert_eq!(stage_order(), STEP_NAMES);
    }
}
