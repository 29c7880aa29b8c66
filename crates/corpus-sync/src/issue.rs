/// Severity of a detected consistency issue (spec §4.4): only `minor`
/// issues are ever candidates for auto-fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Minor,
    Major,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    DoiMismatch,
    TitleMismatch,
    FilenameMismatch,
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub description: String,
}

impl Issue {
    pub fn doi_mismatch(expected: &str, found: &str) -> Self {
        Issue {
            kind: IssueKind::DoiMismatch,
            severity: Severity::Major,
            description: format!("doi mismatch: bibliography has `{expected}`, file has `{found}`"),
        }
    }

    pub fn title_mismatch(severity: Severity, expected: &str, found: &str) -> Self {
        Issue {
            kind: IssueKind::TitleMismatch,
            severity,
            description: format!("title mismatch: bibliography has `{expected}`, file has `{found}`"),
        }
    }

    pub fn filename_mismatch(expected: &str, found: &str) -> Self {
        Issue {
            kind: IssueKind::FilenameMismatch,
            severity: Severity::Minor,
            description: format!("filename should be `{expected}`, found `{found}`"),
        }
    }
}
