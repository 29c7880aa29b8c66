//! C8: sync checker. Runs after organize and fetch to confirm the
//! bibliography and the Clippings tree agree, auto-fixing the one kind of
//! drift that is safe to fix unattended (filename/citation_key mismatch).

pub mod checker;
pub mod issue;
pub mod policy;
pub mod report;
pub mod report_text;

pub use checker::check_workspace;
pub use issue::{Issue, IssueKind, Severity};
pub use policy::SyncPolicy;
pub use report::{PaperConsistency, SyncSummary};
