use corpus_errors::CorpusError;
use corpus_providers::{CitationProvider, RateLimiter, Reference};
use tracing::{debug, info, warn};

use crate::statistics::Statistics;

/// Result-sum-type for the fetch inner loop (spec §9): success clears the
/// quality gate, soft failure is a low-quality response worth logging but
/// not worth surfacing as an error, hard failure is a transport/decode
/// exception. Exceptions remain appropriate at stage boundaries; this is
/// the boundary one level in.
enum Attempt {
    Success { references: Vec<Reference>, quality_score: f64 },
    SoftFailure { quality_score: f64 },
    HardFailure,
}

/// The accepted outcome of `fetch_with_fallback` (spec §4.5).
pub struct FetchOutcome {
    pub references: Vec<Reference>,
    pub api_used: &'static str,
    pub quality_score: f64,
}

async fn try_provider(provider: &dyn CitationProvider, doi: &str, limiter: &RateLimiter) -> Attempt {
    limiter
        .wait_if_needed(provider.name(), provider.settings().rate_per_second)
        .await;

    match provider.fetch_references(doi).await {
        Ok(references) => {
            let quality_score = corpus_quality::score_list(&references);
            if quality_score >= provider.settings().quality_gate {
                Attempt::Success { references, quality_score }
            } else {
                Attempt::SoftFailure { quality_score }
            }
        }
        Err(err) => {
            warn!(provider = provider.name(), error = %err, "provider fetch failed");
            Attempt::HardFailure
        }
    }
}

/// Fallback strategy (spec §4.5): iterate providers in the fixed order
/// they were registered, returning the first response that clears its
/// quality gate. `None` if every provider is exhausted.
pub async fn fetch_with_fallback(
    doi: &str,
    providers: &[Box<dyn CitationProvider>],
    limiter: &RateLimiter,
    stats: &mut Statistics,
) -> Option<FetchOutcome> {
    for provider in providers {
        debug!(provider = provider.name(), doi, "trying provider");
        match try_provider(provider.as_ref(), doi, limiter).await {
            Attempt::Success { references, quality_score } => {
                stats.record_success(provider.name(), quality_score);
                info!(
                    provider = provider.name(),
                    quality_score, "accepted citation data"
                );
                return Some(FetchOutcome {
                    references,
                    api_used: leak_name(provider.name()),
                    quality_score,
                });
            }
            Attempt::SoftFailure { quality_score } => {
                stats.record_failure(provider.name());
                warn!(
                    provider = provider.name(),
                    quality_score, "below quality gate, trying fallback"
                );
            }
            Attempt::HardFailure => {
                stats.record_failure(provider.name());
            }
        }
    }
    None
}

/// Providers only ever return one of the three fixed static names, so
/// round-tripping through `&'static str` without an allocation is safe.
fn leak_name(name: &str) -> &'static str {
    match name {
        "crossref" => "crossref",
        "semantic_scholar" => "semantic_scholar",
        "opencitations" => "opencitations",
        _ => "unknown",
    }
}
