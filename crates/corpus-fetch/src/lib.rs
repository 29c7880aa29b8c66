//! C6: fetch orchestrator. DOI -> references via C4 with fallback, quality
//! gate, statistics, and `references.bib` emission.

pub mod emission;
pub mod key_synthesis;
pub mod orchestrator;
pub mod statistics;
pub mod stage;

pub use orchestrator::{fetch_with_fallback, FetchOutcome};
pub use statistics::Statistics;
pub use stage::{default_providers, extract_doi, run, StageOutcome};
