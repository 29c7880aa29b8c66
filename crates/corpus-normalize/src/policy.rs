/// `citation_pattern_normalizer.*` config surface (spec §6).
#[derive(Debug, Clone)]
pub struct NormalizerPolicy {
    pub enabled: bool,
    pub batch_size: u32,
    pub retry_attempts: u32,
    pub auto_detect: bool,
    pub fallback_parser: String,
    pub unsupported_pattern_alert: bool,
    pub new_parser_suggestion: bool,
    /// Merge consecutive individual citations (`[1], [2]`) into grouped
    /// form (`[1,2]`). Default off; individual rendering is the default
    /// per the governing Open Question decision.
    pub grouped_citations: bool,
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        NormalizerPolicy {
            enabled: true,
            batch_size: 20,
            retry_attempts: 3,
            auto_detect: true,
            fallback_parser: "generic".to_string(),
            unsupported_pattern_alert: true,
            new_parser_suggestion: true,
            grouped_citations: false,
        }
    }
}
