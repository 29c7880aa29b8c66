use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Common reference record shape every provider normalizes into (spec §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub abstract_text: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub citation_count: Option<u32>,
    /// Provider-specific fields that don't fit the common shape (e.g.
    /// OpenCitations' `oci`/`creation`/`timespan`), kept for API statistics
    /// and debugging but not consumed by the quality scorer.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}
