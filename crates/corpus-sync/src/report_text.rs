use crate::policy::SyncPolicy;
use crate::report::SyncSummary;

/// Human-readable drift block with DOI resolver links (spec §4.4
/// "Reporting aid"). Presentational only; never feeds back into state.
pub fn render(summary: &SyncSummary, policy: &SyncPolicy) -> String {
    let mut out = String::new();

    if !summary.missing_in_clippings.is_empty() {
        out.push_str("Missing in Clippings:\n");
        for citation_key in &summary.missing_in_clippings {
            out.push_str(&format!("  - {citation_key}\n"));
        }
    }

    if !summary.orphaned_in_clippings.is_empty() {
        out.push_str("Orphaned in Clippings:\n");
        for (path, doi) in &summary.orphaned_in_clippings {
            out.push_str(&format!("  - {} ({})\n", path.display(), doi_link(doi, policy)));
        }
    }

    out
}

fn doi_link(doi: &str, policy: &SyncPolicy) -> String {
    if policy.display_doi_links {
        policy.doi_link_format.replace("{doi}", doi)
    } else {
        doi.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_doi_resolver_links() {
        let mut summary = SyncSummary::default();
        summary
            .orphaned_in_clippings
            .push((std::path::PathBuf::from("b2023/b2023.md"), "10.1/orphan".to_string()));
        let text = render(&summary, &SyncPolicy::default());
        assert!(text.contains("https://doi.org/10.1/orphan"));
    }
}
