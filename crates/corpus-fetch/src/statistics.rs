use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

/// Per-run statistics aggregating provider success/failure/quality (spec
/// §4.5, §9: passed explicitly into the orchestrator rather than a
/// module-level global).
#[derive(Debug, Default)]
pub struct Statistics {
    requests: IndexMap<String, u32>,
    successes: IndexMap<String, u32>,
    failures: IndexMap<String, u32>,
    quality_scores: IndexMap<String, Vec<f64>>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, provider: &str, quality_score: f64) {
        *self.requests.entry(provider.to_string()).or_insert(0) += 1;
        *self.successes.entry(provider.to_string()).or_insert(0) += 1;
        self.quality_scores
            .entry(provider.to_string())
            .or_default()
            .push(quality_score);
    }

    pub fn record_failure(&mut self, provider: &str) {
        *self.requests.entry(provider.to_string()).or_insert(0) += 1;
        *self.failures.entry(provider.to_string()).or_insert(0) += 1;
    }

    /// Render into the `api_statistics` front-matter shape (spec §4.5):
    /// per-provider request/success/failure counts and min/max/avg quality.
    pub fn to_yaml(&self) -> Value {
        let mut root = Mapping::new();
        let mut total_requests = 0u32;
        let mut total_successes = 0u32;
        let mut total_failures = 0u32;

        for provider in self.requests.keys() {
            let requests = self.requests.get(provider).copied().unwrap_or(0);
            let successes = self.successes.get(provider).copied().unwrap_or(0);
            let failures = self.failures.get(provider).copied().unwrap_or(0);
            total_requests += requests;
            total_successes += successes;
            total_failures += failures;

            let mut entry = Mapping::new();
            entry.insert(
                Value::String("requests".into()),
                Value::Number(requests.into()),
            );
            entry.insert(
                Value::String("successes".into()),
                Value::Number(successes.into()),
            );
            entry.insert(
                Value::String("failures".into()),
                Value::Number(failures.into()),
            );
            let success_rate = if requests > 0 {
                successes as f64 / requests as f64
            } else {
                0.0
            };
            entry.insert(
                Value::String("success_rate".into()),
                Value::Number(serde_yaml::Number::from(success_rate)),
            );

            if let Some(scores) = self.quality_scores.get(provider) {
                if !scores.is_empty() {
                    let sum: f64 = scores.iter().sum();
                    let avg = sum / scores.len() as f64;
                    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
                    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    entry.insert(
                        Value::String("avg_quality".into()),
                        Value::Number(serde_yaml::Number::from(avg)),
                    );
                    entry.insert(
                        Value::String("min_quality".into()),
                        Value::Number(serde_yaml::Number::from(min)),
                    );
                    entry.insert(
                        Value::String("max_quality".into()),
                        Value::Number(serde_yaml::Number::from(max)),
                    );
                }
            }

            root.insert(Value::String(provider.clone()), Value::Mapping(entry));
        }

        root.insert(
            Value::String("total_requests".into()),
            Value::Number(total_requests.into()),
        );
        root.insert(
            Value::String("total_successes".into()),
            Value::Number(total_successes.into()),
        );
        root.insert(
            Value::String("total_failures".into()),
            Value::Number(total_failures.into()),
        );
        let overall_rate = if total_requests > 0 {
            total_successes as f64 / total_requests as f64
        } else {
            0.0
        };
        root.insert(
            Value::String("overall_success_rate".into()),
            Value::Number(serde_yaml::Number::from(overall_rate)),
        );

        Value::Mapping(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tracks_requests_and_quality() {
        let mut stats = Statistics::new();
        stats.record_failure("crossref");
        stats.record_success("crossref", 0.9);
        let yaml = stats.to_yaml();
        let root = yaml.as_mapping().unwrap();
        assert_eq!(
            root.get(Value::String("total_requests".into())),
            Some(&Value::Number(2.into()))
        );
        let crossref = root
            .get(Value::String("crossref".into()))
            .unwrap()
            .as_mapping()
            .unwrap();
        assert_eq!(
            crossref.get(Value::String("successes".into())),
            Some(&Value::Number(1.into()))
        );
    }
}
