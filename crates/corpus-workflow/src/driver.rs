use std::path::{Path, PathBuf};

use corpus_errors::{CorpusError, PathFailure};
use corpus_frontmatter::header::{self, STEP_NAMES};
use corpus_normalize::Registry;
use corpus_providers::RateLimiter;
use tracing::{info, warn};

use crate::config::WorkflowConfig;
use crate::lm::LmClient;
use crate::{ai_citation_support, final_sync, lm, sections};

/// Per-stage outcome tally the driver reports back to the caller (`corpus-cli`).
#[derive(Debug, Default)]
pub struct StageReport {
    pub stage: String,
    pub candidates: usize,
    pub completed: usize,
    pub failed: Vec<PathFailure>,
}

#[derive(Debug, Default)]
pub struct DriverSummary {
    pub stages: Vec<StageReport>,
}

fn paper_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn citation_key_of(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown").to_string()
}

/// Extract the text to hand the LM stages: the `abstract` section from
/// `paper_structure` if section parsing has already run, otherwise the
/// first paragraph of the body.
fn extract_abstract(header: &corpus_frontmatter::Header, body: &str) -> String {
    if let Some(structure) = header::get(header, "paper_structure") {
        if let Some(serde_yaml::Value::Sequence(sections)) = structure.get("sections") {
            for section in sections {
                if section.get("section_type").and_then(|v| v.as_str()) == Some("abstract") {
                    if let (Some(start), Some(end)) = (
                        section.get("start_line").and_then(|v| v.as_u64()),
                        section.get("end_line").and_then(|v| v.as_u64()),
                    ) {
                        let lines: Vec<&str> = body.lines().collect();
                        let start = start as usize;
                        let end = (end as usize).min(lines.len());
                        return lines.get(start..end).map(|s| s.join("\n")).unwrap_or_default();
                    }
                }
            }
        }
    }
    body.split("\n\n").next().unwrap_or(body).to_string()
}

/// Mark one paper's step `failed` via the status store (C3 owns the sole
/// mutation path so backups and repair happen consistently).
fn mark_failed(clippings_root: &Path, path: &Path, step: &str, config: &WorkflowConfig) {
    let citation_key = citation_key_of(path);
    if let Err(err) = corpus_status::update(clippings_root, &citation_key, step, "failed", &config.status) {
        warn!(citation_key, step, error = %err, "failed to record step failure in status store");
    }
}

/// C10 workflow driver: runs the fixed stage sequence of spec §4.7 over a
/// workspace, asking C3 for each stage's candidate set, invoking the
/// stage per candidate, and letting the stage manage its own status write.
/// Single-paper failures are caught and tallied; the stage continues.
/// Pre-flight failures (bibliography unreadable, LM API key missing) abort
/// only that stage. Re-entrancy is inherited from `get_papers_needing`
/// only ever returning `pending`/`failed` papers.
pub struct Driver {
    pub clippings_root: PathBuf,
    pub bibliography_path: PathBuf,
    pub config: WorkflowConfig,
}

impl Driver {
    pub fn new(workspace_root: &Path, config: WorkflowConfig) -> Self {
        Driver {
            clippings_root: workspace_root.join("Clippings"),
            bibliography_path: workspace_root.join("CurrentManuscript.bib"),
            config,
        }
    }

    fn candidates(&self, step: &str, target_keys: Option<&[String]>) -> Vec<PathBuf> {
        corpus_status::get_papers_needing(&self.clippings_root, step, target_keys)
    }

    /// Run the whole sequence, restricted to `only` if non-empty.
    pub async fn run(&self, only: Option<&[String]>) -> Result<DriverSummary, CorpusError> {
        let mut summary = DriverSummary::default();
        let lm_client: Option<Box<dyn LmClient>> = if self.config.lm_stage.enabled {
            match lm::AnthropicClient::new(self.config.lm_stage.clone()) {
                Ok(client) => Some(Box::new(client)),
                Err(err) => {
                    warn!(error = %err, "LM stage pre-flight failed, LM-backed stages will be skipped");
                    None
                }
            }
        } else {
            None
        };

        for step in STEP_NAMES {
            if let Some(wanted) = only {
                if !wanted.iter().any(|s| s == step) {
                    continue;
                }
            }
            if !self.config.flags.is_enabled(step) {
                info!(step, "stage disabled by feature flag, skipping");
                continue;
            }

            let report = self.run_stage(step, lm_client.as_deref()).await;
            summary.stages.push(report);
        }

        Ok(summary)
    }

    async fn run_stage(&self, step: &str, lm_client: Option<&dyn LmClient>) -> StageReport {
        let mut report = StageReport { stage: step.to_string(), ..Default::default() };

        match step {
            "organize" => self.run_organize(&mut report),
            "sync" => self.run_sync(&mut report),
            "fetch" => self.run_fetch(&mut report).await,
            "section_parsing" => self.run_section_parsing(&mut report),
            "ai_citation_support" => self.run_ai_citation_support(&mut report),
            "citation_pattern_normalizer" => self.run_normalizer(&mut report),
            "tagger" => self.run_tagger(&mut report, lm_client).await,
            "translate_abstract" => self.run_translate(&mut report, lm_client).await,
            "ochiai_format" => self.run_ochiai(&mut report, lm_client).await,
            "final_sync" => self.run_final_sync(&mut report),
            _ => {}
        }

        report
    }

    /// Whole-workspace stages (organize, sync, final_sync) own their file
    /// discovery; the driver invokes them directly rather than building a
    /// per-paper candidate set, and a pre-flight bibliography failure aborts
    /// only that stage.
    fn run_organize(&self, report: &mut StageReport) {
        match corpus_organize::organize_workspace(&self.clippings_root, &self.bibliography_path, &self.config.organize)
        {
            Ok(outcome) => {
                report.completed = outcome.processed_papers as usize;
                report.failed = outcome.processing_failed;
            }
            Err(err) => warn!(stage = "organize", error = %err, "organize pre-flight failed"),
        }
    }

    fn run_sync(&self, report: &mut StageReport) {
        match corpus_sync::check_workspace(&self.clippings_root, &self.bibliography_path, &self.config.sync) {
            Ok(outcome) => {
                report.candidates = outcome.papers.len();
                report.completed = outcome.papers.iter().filter(|p| p.issues.is_empty()).count();
            }
            Err(err) => warn!(stage = "sync", error = %err, "sync pre-flight failed"),
        }
    }

    fn run_final_sync(&self, report: &mut StageReport) {
        match final_sync::run(&self.clippings_root, &self.bibliography_path, &self.config.sync) {
            Ok(outcome) => {
                report.candidates = outcome.papers.len();
                report.completed = outcome.papers.iter().filter(|p| p.issues.is_empty()).count();
            }
            Err(err) => warn!(stage = "final_sync", error = %err, "final_sync pre-flight failed"),
        }
    }

    async fn run_fetch(&self, report: &mut StageReport) {
        let paths = self.candidates("fetch", None);
        report.candidates = paths.len();

        let http = match reqwest::Client::builder().build() {
            Ok(client) => client,
            Err(err) => {
                warn!(stage = "fetch", error = %err, "failed to build HTTP client, aborting stage");
                return;
            }
        };
        let providers = corpus_fetch::default_providers(http);
        let limiter = RateLimiter::new();

        for path in paths {
            match corpus_fetch::run(&path, &providers, &limiter).await {
                Ok(corpus_fetch::StageOutcome::Completed) => report.completed += 1,
                Ok(corpus_fetch::StageOutcome::Skipped) => {}
                Ok(corpus_fetch::StageOutcome::Failed) => {
                    mark_failed(&self.clippings_root, &path, "fetch", &self.config);
                    report.failed.push(PathFailure {
                        path: path.clone(),
                        error: CorpusError::processing("all providers exhausted", "FETCH_EXHAUSTED"),
                    });
                }
                Err(error) => {
                    mark_failed(&self.clippings_root, &path, "fetch", &self.config);
                    report.failed.push(PathFailure { path, error });
                }
            }
        }
    }

    fn run_section_parsing(&self, report: &mut StageReport) {
        let paths = self.candidates("section_parsing", None);
        report.candidates = paths.len();

        for path in paths {
            match self.parse_sections_one(&path) {
                Ok(()) => report.completed += 1,
                Err(error) => {
                    mark_failed(&self.clippings_root, &path, "section_parsing", &self.config);
                    report.failed.push(PathFailure { path, error });
                }
            }
        }
    }

    fn parse_sections_one(&self, path: &Path) -> Result<(), CorpusError> {
        let (mut header, body) = corpus_frontmatter::parse(path)?;
        let parsed = sections::parse_sections(&body);
        let now = header::now_iso8601();
        sections::update_header(&mut header, &parsed, &now);
        corpus_frontmatter::write(path, &header, &body, None)
    }

    fn run_ai_citation_support(&self, report: &mut StageReport) {
        let paths = self.candidates("ai_citation_support", None);
        report.candidates = paths.len();

        for path in paths {
            match self.ai_citation_support_one(&path) {
                Ok(true) => report.completed += 1,
                Ok(false) => {}
                Err(error) => {
                    mark_failed(&self.clippings_root, &path, "ai_citation_support", &self.config);
                    report.failed.push(PathFailure { path, error });
                }
            }
        }
    }

    fn ai_citation_support_one(&self, path: &Path) -> Result<bool, CorpusError> {
        let (mut header, body) = corpus_frontmatter::parse(path)?;
        let now = header::now_iso8601();
        let outcome = ai_citation_support::run(
            paper_dir(path),
            &mut header,
            &now,
            self.config.preserve_existing_citations,
        )?;
        match outcome {
            ai_citation_support::Outcome::Completed { .. } => {
                corpus_frontmatter::write(path, &header, &body, None)?;
                Ok(true)
            }
            ai_citation_support::Outcome::NoReferencesBib => Ok(false),
        }
    }

    fn run_normalizer(&self, report: &mut StageReport) {
        let paths = self.candidates("citation_pattern_normalizer", None);
        report.candidates = paths.len();

        let registry_path = self.clippings_root.join("../config/publisher_patterns.yaml");
        let registry = Registry::load(&registry_path).unwrap_or_else(|_| Registry::with_builtin());
        let unsupported_log = self.clippings_root.join("../config/unsupported_citation_patterns.yaml");

        for path in paths {
            match corpus_normalize::run(&path, &registry, &self.config.normalizer, &unsupported_log) {
                Ok(()) => report.completed += 1,
                Err(error) => {
                    mark_failed(&self.clippings_root, &path, "citation_pattern_normalizer", &self.config);
                    report.failed.push(PathFailure { path, error });
                }
            }
        }
    }

    async fn run_tagger(&self, report: &mut StageReport, lm_client: Option<&dyn LmClient>) {
        let Some(client) = lm_client else {
            warn!(stage = "tagger", "LM client unavailable, skipping stage");
            return;
        };
        let paths = self.candidates("tagger", None);
        report.candidates = paths.len();

        for path in paths {
            match self.tagger_one(&path, client).await {
                Ok(()) => report.completed += 1,
                Err(error) => {
                    mark_failed(&self.clippings_root, &path, "tagger", &self.config);
                    report.failed.push(PathFailure { path, error });
                }
            }
        }
    }

    async fn tagger_one(&self, path: &Path, client: &dyn LmClient) -> Result<(), CorpusError> {
        let (mut header, body) = corpus_frontmatter::parse(path)?;
        let title = header::get_str(&header, "title").unwrap_or("").to_string();
        let abstract_text = extract_abstract(&header, &body);
        let tags = lm::tagger::run(client, &title, &abstract_text).await?;
        let now = header::now_iso8601();
        lm::tagger::update_header(&mut header, &tags, &now);
        corpus_frontmatter::write(path, &header, &body, None)
    }

    async fn run_translate(&self, report: &mut StageReport, lm_client: Option<&dyn LmClient>) {
        let Some(client) = lm_client else {
            warn!(stage = "translate_abstract", "LM client unavailable, skipping stage");
            return;
        };
        let paths = self.candidates("translate_abstract", None);
        report.candidates = paths.len();

        for path in paths {
            match self.translate_one(&path, client).await {
                Ok(()) => report.completed += 1,
                Err(error) => {
                    mark_failed(&self.clippings_root, &path, "translate_abstract", &self.config);
                    report.failed.push(PathFailure { path, error });
                }
            }
        }
    }

    async fn translate_one(&self, path: &Path, client: &dyn LmClient) -> Result<(), CorpusError> {
        let (mut header, body) = corpus_frontmatter::parse(path)?;
        let abstract_text = extract_abstract(&header, &body);
        let translation = lm::translate::run(client, &abstract_text).await?;
        let quality = lm::translate::evaluate_quality(&abstract_text, &translation);
        let now = header::now_iso8601();
        lm::translate::update_header(&mut header, &translation, &quality, &now);
        corpus_frontmatter::write(path, &header, &body, None)
    }

    async fn run_ochiai(&self, report: &mut StageReport, lm_client: Option<&dyn LmClient>) {
        let Some(client) = lm_client else {
            warn!(stage = "ochiai_format", "LM client unavailable, skipping stage");
            return;
        };
        let paths = self.candidates("ochiai_format", None);
        report.candidates = paths.len();

        for path in paths {
            match self.ochiai_one(&path, client).await {
                Ok(()) => report.completed += 1,
                Err(error) => {
                    mark_failed(&self.clippings_root, &path, "ochiai_format", &self.config);
                    report.failed.push(PathFailure { path, error });
                }
            }
        }
    }

    async fn ochiai_one(&self, path: &Path, client: &dyn LmClient) -> Result<(), CorpusError> {
        let (mut header, body) = corpus_frontmatter::parse(path)?;
        let title = header::get_str(&header, "title").unwrap_or("").to_string();
        let abstract_text = extract_abstract(&header, &body);
        let questions = lm::ochiai::run(client, &title, &abstract_text).await?;
        let now = header::now_iso8601();
        lm::ochiai::update_header(&mut header, questions, &now);
        corpus_frontmatter::write(path, &header, &body, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_frontmatter::header::set_str;
    use serde_yaml::{Mapping, Value};
    use tempfile::tempdir;

    fn write_bib(path: &Path) {
        std::fs::write(
            path,
            "@article{smith2023test,\n  title = {A Test Paper},\n  author = {Smith, John},\n  journal = {J},\n  year = {2023},\n  doi = {10.1038/EXAMPLE},\n}\n",
        )
        .unwrap();
    }

    fn write_staged(clippings_root: &Path, doi: &str) -> PathBuf {
        let mut header = corpus_frontmatter::Header::new();
        set_str(&mut header, "doi", doi);
        header::set(&mut header, "processing_status", Value::Mapping(Mapping::new()));
        let path = clippings_root.join("foo.md");
        corpus_frontmatter::write(&path, &header, "Body.\n", None).unwrap();
        path
    }

    #[tokio::test]
    async fn organize_then_sync_advance_status_across_stage_boundary() {
        let workspace = tempdir().unwrap();
        let clippings = workspace.path().join("Clippings");
        std::fs::create_dir_all(&clippings).unwrap();
        write_bib(&workspace.path().join("CurrentManuscript.bib"));
        write_staged(&clippings, "10.1038/EXAMPLE");

        let mut config = WorkflowConfig::default();
        config.lm_stage.enabled = false;
        let driver = Driver::new(workspace.path(), config);

        let only = vec!["organize".to_string(), "sync".to_string()];
        let summary = driver.run(Some(&only)).await.unwrap();

        assert_eq!(summary.stages.len(), 2);
        assert_eq!(summary.stages[0].stage, "organize");
        assert_eq!(summary.stages[0].completed, 1);

        let target = clippings.join("smith2023test").join("smith2023test.md");
        let (header, _) = corpus_frontmatter::parse(&target).unwrap();
        assert_eq!(header::status_of(&header, "organize"), "completed");
        assert_eq!(header::status_of(&header, "sync"), "completed");
    }

    #[tokio::test]
    async fn disabled_lm_stages_are_skipped_without_a_pre_flight_error() {
        let workspace = tempdir().unwrap();
        std::fs::create_dir_all(workspace.path().join("Clippings")).unwrap();
        write_bib(&workspace.path().join("CurrentManuscript.bib"));

        let mut config = WorkflowConfig::default();
        config.lm_stage.enabled = false;
        config.flags.tagger = false;
        let driver = Driver::new(workspace.path(), config);

        let only = vec!["tagger".to_string()];
        let summary = driver.run(Some(&only)).await.unwrap();
        assert!(summary.stages.is_empty());
    }
}
