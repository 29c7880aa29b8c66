//! `corpus-pipeline` entrypoint: CLI argument parsing, logging bring-up,
//! and dispatch into the C10 workflow driver. Mirrors the teacher's
//! `ox-bin::main` shape (panic hook, non-blocking file-appender logging,
//! `clap::Parser`) rather than the teacher's editor bootstrap itself.
//!
//! Argument parsing, flag semantics, and exit-code plumbing are themselves
//! outside the core (spec §1 Out-of-scope) and kept deliberately thin.

use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::Result;
use clap::{Parser, Subcommand};
use corpus_errors::CorpusError;
use corpus_frontmatter::header;
use corpus_workflow::{Driver, WorkflowConfig};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

const EXIT_WORKSPACE_NOT_FOUND: i32 = 2;
const EXIT_BIBLIOGRAPHY_UNREADABLE: i32 = 3;
const EXIT_CONFIG_INVALID: i32 = 4;

/// Bibliographic enrichment pipeline over a local paper-clippings corpus.
#[derive(Parser, Debug)]
#[command(name = "corpus-pipeline", version, about = "Bibliographic enrichment pipeline")]
struct Args {
    /// Workspace root containing `CurrentManuscript.bib` and `Clippings/`.
    #[arg(default_value = ".")]
    workspace: PathBuf,

    /// Explicit path to `pipeline.toml`, overriding discovery.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full stage sequence (spec §4.7), or a subset via `--only`.
    Run {
        /// Restrict to these stage names, in any order; the driver still
        /// applies them in fixed pipeline order.
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Print each stage's candidate count without invoking it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run only the organize stage and print its drift report.
    Organize,
    /// Run only the sync checker and print its consistency report.
    Sync,
    /// Print per-paper, per-step status for the whole corpus.
    Status,
}

struct Logging {
    _guard: Option<WorkerGuard>,
}

fn configure_logging(workspace: &Path) -> Logging {
    let log_path = workspace.join("corpus-pipeline.log");
    let file_appender = tracing_appender::rolling::never(
        log_path.parent().unwrap_or_else(|| Path::new(".")),
        log_path.file_name().unwrap_or_else(|| "corpus-pipeline.log".as_ref()),
    );
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    let result = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init();

    match result {
        Ok(()) => Logging { _guard: Some(guard) },
        Err(_) => Logging { _guard: None },
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn print_stage_report(report: &corpus_workflow::StageReport) {
    println!(
        "{:<28} candidates={:<5} completed={:<5} failed={}",
        report.stage,
        report.candidates,
        report.completed,
        report.failed.len()
    );
    for failure in &report.failed {
        println!("    FAILED {}: {}", failure.path.display(), failure.error);
    }
}

/// Loads config, surfacing §6 "invalid config" as exit code 4 regardless
/// of whether the error originated in `corpus-config` or is wrapped by it.
fn load_config(args: &Args) -> Result<WorkflowConfig, ExitError> {
    corpus_config::load(&args.workspace, args.config.as_deref())
        .map_err(|e| ExitError::new(EXIT_CONFIG_INVALID, anyhow::Error::new(e)))
}

fn dry_run_report(args: &Args, only: &[String]) {
    let clippings_root = args.workspace.join("Clippings");
    let stages = corpus_workflow::config::stage_order();
    for &step in stages {
        if !only.is_empty() && !only.iter().any(|s| s == step) {
            continue;
        }
        let candidates = corpus_status::get_papers_needing(&clippings_root, step, None);
        println!("{:<28} would process {} candidate(s)", step, candidates.len());
    }
}

async fn run_pipeline(args: &Args, only: &[String], dry_run: bool) -> Result<(), ExitError> {
    if dry_run {
        dry_run_report(args, only);
        return Ok(());
    }

    let config = load_config(args)?;
    let driver = Driver::new(&args.workspace, config);
    let filter = if only.is_empty() { None } else { Some(only) };
    let summary = driver
        .run(filter)
        .await
        .map_err(|e| ExitError::from_anyhow(anyhow::Error::new(e).context("workflow driver run failed")))?;

    for stage in &summary.stages {
        print_stage_report(stage);
    }
    Ok(())
}

fn run_organize(args: &Args) -> Result<(), ExitError> {
    let config = load_config(args)?;
    let clippings_root = args.workspace.join("Clippings");
    let bib_path = args.workspace.join("CurrentManuscript.bib");
    let outcome = corpus_organize::organize_workspace(&clippings_root, &bib_path, &config.organize)
        .map_err(bibliography_exit_error)?;

    println!("organized {} paper(s)", outcome.processed_papers);
    if !outcome.drift.missing_in_clippings.is_empty() {
        println!("missing in Clippings:");
        for (citation_key, doi) in &outcome.drift.missing_in_clippings {
            println!("  - {citation_key} ({doi})");
        }
    }
    if !outcome.drift.orphaned_in_clippings.is_empty() {
        println!("orphaned in Clippings:");
        for (path, doi) in &outcome.drift.orphaned_in_clippings {
            println!("  - {} ({doi})", path.display());
        }
    }
    if !outcome.drift.no_doi_in_markdown.is_empty() {
        println!("no DOI found:");
        for path in &outcome.drift.no_doi_in_markdown {
            println!("  - {}", path.display());
        }
    }
    for failure in &outcome.processing_failed {
        println!("FAILED {}: {}", failure.path.display(), failure.error);
    }
    Ok(())
}

fn run_sync(args: &Args) -> Result<(), ExitError> {
    let config = load_config(args)?;
    let clippings_root = args.workspace.join("Clippings");
    let bib_path = args.workspace.join("CurrentManuscript.bib");
    let summary = corpus_sync::check_workspace(&clippings_root, &bib_path, &config.sync)
        .map_err(bibliography_exit_error)?;

    print!("{}", corpus_sync::report_text::render(&summary, &config.sync));
    let issues: usize = summary.papers.iter().map(|p| p.issues.len()).sum();
    println!("checked {} paper(s), {} issue(s) remaining", summary.papers.len(), issues);
    Ok(())
}

fn run_status(args: &Args) -> Result<(), ExitError> {
    let clippings_root = args.workspace.join("Clippings");
    let all = corpus_status::load_all(&clippings_root);
    for (citation_key, steps) in &all {
        let mut line = format!("{citation_key:<30}");
        for step in header::STEP_NAMES {
            let status = steps.get(*step).map(String::as_str).unwrap_or("pending");
            line.push_str(&format!(" {step}={status}"));
        }
        println!("{line}");
    }
    Ok(())
}

/// A `BibTex` parse failure surfaces as exit code 3 ("bibliography
/// unreadable", spec §6); anything else from organize/sync is a plain
/// run failure (exit 1).
fn bibliography_exit_error(err: CorpusError) -> ExitError {
    let code = if matches!(err, CorpusError::BibTex { .. }) {
        EXIT_BIBLIOGRAPHY_UNREADABLE
    } else {
        1
    };
    ExitError::new(code, anyhow::Error::new(err))
}

/// Carries the process exit code alongside the error chain, so `main` can
/// report the right status without re-deriving it from error text.
struct ExitError {
    code: i32,
    source: anyhow::Error,
}

impl ExitError {
    fn new(code: i32, source: anyhow::Error) -> Self {
        ExitError { code, source }
    }

    fn from_anyhow(source: anyhow::Error) -> Self {
        ExitError { code: 1, source }
    }
}

fn workspace_exit_check(workspace: &Path) -> Result<(), ExitError> {
    if !workspace.exists() {
        return Err(ExitError::new(
            EXIT_WORKSPACE_NOT_FOUND,
            anyhow::anyhow!("workspace not found: {}", workspace.display()),
        ));
    }
    Ok(())
}

async fn dispatch(args: &Args) -> Result<(), ExitError> {
    workspace_exit_check(&args.workspace)?;

    match &args.command {
        Command::Run { only, dry_run } => run_pipeline(args, only, *dry_run).await,
        Command::Organize => run_organize(args),
        Command::Sync => run_sync(args),
        Command::Status => run_status(args),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    install_panic_hook();
    let _logging = configure_logging(&args.workspace);

    info!(workspace = %args.workspace.display(), "corpus-pipeline starting");

    match dispatch(&args).await {
        Ok(()) => Ok(()),
        Err(exit_err) => {
            error!(error = %exit_err.source, code = exit_err.code, "run failed");
            eprintln!("error: {}", exit_err.source);
            std::process::exit(exit_err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn run_subcommand_parses_comma_separated_only_list() {
        let args = Args::parse_from(["corpus-pipeline", "run", "--only", "organize,sync"]);
        match args.command {
            Command::Run { only, dry_run } => {
                assert_eq!(only, vec!["organize".to_string(), "sync".to_string()]);
                assert!(!dry_run);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn default_workspace_is_current_directory() {
        let args = Args::parse_from(["corpus-pipeline", "status"]);
        assert_eq!(args.workspace, PathBuf::from("."));
    }

    #[test]
    fn positional_workspace_overrides_default() {
        let args = Args::parse_from(["corpus-pipeline", "/tmp/corpus", "status"]);
        assert_eq!(args.workspace, PathBuf::from("/tmp/corpus"));
    }

    #[tokio::test]
    async fn dispatch_reports_workspace_not_found() {
        let args = Args::parse_from(["corpus-pipeline", "/no/such/workspace", "status"]);
        let err = dispatch(&args).await.unwrap_err();
        assert_eq!(err.code, EXIT_WORKSPACE_NOT_FOUND);
    }

    #[tokio::test]
    async fn status_on_empty_workspace_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from(["corpus-pipeline", dir.path().to_str().unwrap(), "status"]);
        dispatch(&args).await.unwrap();
    }
}
