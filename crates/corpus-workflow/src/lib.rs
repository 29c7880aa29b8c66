//! C10: workflow driver. C11: LM stage adapter. Plus the `paper_structure`
//! section parser these stages lean on. Everything else in the pipeline
//! (front-matter, bibliography, status, providers, fetch, organize, sync,
//! normalize) is a dependency this crate sequences but never reimplements.

pub mod ai_citation_support;
pub mod config;
pub mod driver;
pub mod final_sync;
pub mod lm;
pub mod sections;

pub use config::{StageFlags, WorkflowConfig};
pub use driver::{Driver, DriverSummary, StageReport};
pub use lm::{AnthropicClient, LmClient, LmStageConfig};
pub use sections::{parse_sections, Section};
