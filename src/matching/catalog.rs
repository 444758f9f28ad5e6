//! Catalog ranking: scores every catalog item against a free-text query.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::normalize::normalize;
use super::similarity::{is_grade_token, score};
use super::weights::MatchWeights;

/// One product in the reference catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Product/service code; may be empty.
    #[serde(default, alias = "Product/Service")]
    pub code: String,
    /// Primary description shown to users.
    #[serde(default, alias = "Memo/Description")]
    pub memo: String,
    #[serde(default, alias = "otra descripcion")]
    pub alt_description: String,
    #[serde(default, alias = "Product/Service full name")]
    pub full_name: String,
}

impl CatalogItem {
    pub fn new(
        code: impl Into<String>,
        memo: impl Into<String>,
        alt_description: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            memo: memo.into(),
            alt_description: alt_description.into(),
            full_name: full_name.into(),
        }
    }
}

/// A reference entry paired with its score for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<T> {
    pub item: T,
    pub score: f64,
}

/// Which scoring path a ranking runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchProfile {
    /// Free product search: also scores the code field, fixed threshold.
    Search,
    /// Adding a product to an existing order: adaptive threshold.
    Guided,
    /// Quick-order item lines: adaptive threshold plus special keywords.
    Quick,
}

impl MatchProfile {
    fn scores_code(self) -> bool {
        matches!(self, Self::Search)
    }

    fn uses_special_keywords(self) -> bool {
        matches!(self, Self::Quick)
    }
}

/// Ranks catalog items against queries using a shared weight table.
#[derive(Debug, Clone, Default)]
pub struct CatalogMatcher {
    weights: MatchWeights,
}

impl CatalogMatcher {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    /// Rank `catalog` against `query`: sorted by descending score (catalog
    /// order on ties), above the profile's threshold, capped.
    pub fn rank(
        &self,
        query: &str,
        catalog: &[CatalogItem],
        profile: MatchProfile,
    ) -> Vec<MatchCandidate<CatalogItem>> {
        let w = &self.weights;
        let nq = normalize(query);
        if nq.is_empty() {
            return Vec::new();
        }

        let threshold = match profile {
            MatchProfile::Search => w.search_threshold,
            MatchProfile::Guided | MatchProfile::Quick => w.adaptive_threshold(query),
        };

        let tokens: Vec<&str> = nq
            .split(' ')
            .filter(|t| t.chars().count() > w.keyword_min_len)
            .collect();

        let mut ranked: Vec<MatchCandidate<CatalogItem>> = catalog
            .iter()
            .filter_map(|item| {
                let total = self.score_item(query, &nq, &tokens, item, profile);
                (total > threshold).then(|| MatchCandidate {
                    item: item.clone(),
                    score: total,
                })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(w.max_candidates);

        debug!(
            query = %query,
            profile = ?profile,
            threshold,
            count = ranked.len(),
            top = ranked.first().map(|c| c.score),
            "Catalog ranked"
        );
        ranked
    }

    fn score_item(
        &self,
        query: &str,
        normalized_query: &str,
        tokens: &[&str],
        item: &CatalogItem,
        profile: MatchProfile,
    ) -> f64 {
        let w = &self.weights;

        let mut fields = vec![
            item.memo.as_str(),
            item.alt_description.as_str(),
            item.full_name.as_str(),
        ];
        if profile.scores_code() {
            fields.push(item.code.as_str());
        }

        let base = fields
            .iter()
            .map(|f| score(query, f, w))
            .fold(0.0_f64, f64::max);

        let normalized: Vec<String> = fields.iter().map(|f| normalize(f)).collect();

        let mut total = base;
        if normalized.iter().filter(|f| !f.is_empty()).any(|f| {
            f.contains(normalized_query) || normalized_query.contains(f.as_str())
        }) {
            total += w.containment_bonus;
        }

        // Keyword bonuses only look at the three descriptive fields.
        let descriptive = &normalized[..3];
        for token in tokens {
            let present = || descriptive.iter().any(|f| f.contains(token));
            if (w.is_brand(token) || is_grade_token(token) || *token == "sae") && present() {
                total += w.keyword_bonus;
            }
            if profile.uses_special_keywords() && w.is_special(token) && present() {
                total += w.special_keyword_bonus;
            }
        }

        total
    }
}
