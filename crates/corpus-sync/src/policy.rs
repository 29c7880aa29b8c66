/// `sync_checker.*` config surface (spec §6).
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    pub enabled: bool,
    pub auto_fix_minor_issues: bool,
    pub backup_before_auto_fix: bool,
    pub display_doi_links: bool,
    pub doi_link_format: String,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            enabled: true,
            auto_fix_minor_issues: true,
            backup_before_auto_fix: true,
            display_doi_links: true,
            doi_link_format: "https://doi.org/{doi}".to_string(),
        }
    }
}
