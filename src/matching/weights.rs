//! Tunable scoring constants for the matcher.
//!
//! Every number and keyword list the scorer and the catalog matcher consult
//! lives here, so tuning is a data change. `MatchWeights::from_json_file`
//! lets an operator override any subset of fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    /// Score returned when one normalized string contains the other.
    pub containment_score: f64,
    /// Word-overlap ratio below which the detailed partial scan runs.
    pub detailed_scan_below: f64,
    /// Partial-word credit when the shorter word is longer than
    /// `partial_min_len` characters.
    pub partial_long: f64,
    /// Partial-word credit for short words.
    pub partial_short: f64,
    pub partial_min_len: usize,

    /// Flat bonus when an item field and the query contain one another.
    pub containment_bonus: f64,
    /// Bonus per query token that is a brand or grade and occurs in the item.
    pub keyword_bonus: f64,
    /// Bonus per special keyword (quick-order matching only).
    pub special_keyword_bonus: f64,
    /// Query tokens must be longer than this to earn keyword bonuses.
    pub keyword_min_len: usize,
    pub brand_keywords: Vec<String>,
    pub special_keywords: Vec<String>,

    /// Fixed threshold for the free search path.
    pub search_threshold: f64,
    /// Adaptive threshold for raw queries of at most `short_query_len` chars.
    pub short_query_threshold: f64,
    /// Adaptive threshold for longer raw queries.
    pub long_query_threshold: f64,
    pub short_query_len: usize,
    /// Maximum number of candidates returned by a ranking.
    pub max_candidates: usize,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            containment_score: 0.9,
            detailed_scan_below: 0.3,
            partial_long: 0.8,
            partial_short: 0.5,
            partial_min_len: 2,
            containment_bonus: 0.2,
            keyword_bonus: 0.2,
            special_keyword_bonus: 0.3,
            keyword_min_len: 2,
            brand_keywords: ["mobil", "shell", "delo", "rotella", "chevron", "valvoline"]
                .map(String::from)
                .to_vec(),
            special_keywords: ["synthetic", "hdmo", "bulk"].map(String::from).to_vec(),
            search_threshold: 0.1,
            short_query_threshold: 0.3,
            long_query_threshold: 0.05,
            short_query_len: 3,
            max_candidates: 10,
        }
    }
}

impl MatchWeights {
    /// Load overrides from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            ConfigError::ParseError(format!("weights file {}: {e}", path.display()))
        })
    }

    /// Threshold that depends on how long the raw (unnormalized) query is.
    pub fn adaptive_threshold(&self, raw_query: &str) -> f64 {
        if raw_query.trim().chars().count() <= self.short_query_len {
            self.short_query_threshold
        } else {
            self.long_query_threshold
        }
    }

    pub fn is_brand(&self, token: &str) -> bool {
        self.brand_keywords.iter().any(|k| k == token)
    }

    pub fn is_special(&self, token: &str) -> bool {
        self.special_keywords.iter().any(|k| k == token)
    }
}
