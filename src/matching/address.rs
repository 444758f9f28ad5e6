//! Customer-name to delivery-address resolution.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::catalog::MatchCandidate;
use super::normalize::words;
use super::similarity::score;
use super::weights::MatchWeights;

/// One row of the address directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressEntry {
    #[serde(default, alias = "Customer full name")]
    pub name: String,
    #[serde(default, alias = "Bill address")]
    pub address: String,
}

impl AddressEntry {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Picks the directory entry whose name best matches a customer name.
#[derive(Debug, Clone, Default)]
pub struct AddressResolver {
    weights: MatchWeights,
}

impl AddressResolver {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    /// Every entry scoring above zero, best first.
    pub fn rank<'a>(
        &self,
        customer: &str,
        directory: &'a [AddressEntry],
    ) -> Vec<MatchCandidate<&'a AddressEntry>> {
        if customer.trim().is_empty() {
            return Vec::new();
        }

        let min_len = self.weights.keyword_min_len;
        let customer_words: Vec<String> = words(customer)
            .into_iter()
            .filter(|w| w.chars().count() > min_len)
            .collect();

        let mut ranked: Vec<MatchCandidate<&AddressEntry>> = directory
            .iter()
            .filter_map(|entry| {
                let by_similarity = score(customer, &entry.name, &self.weights);

                let entry_words: Vec<String> = words(&entry.name)
                    .into_iter()
                    .filter(|w| w.chars().count() > min_len)
                    .collect();
                let shared = customer_words
                    .iter()
                    .filter(|w| entry_words.contains(w))
                    .count();
                let by_words = shared as f64 / customer_words.len().max(1) as f64;

                let best = by_similarity.max(by_words);
                (best > 0.0).then_some(MatchCandidate { item: entry, score: best })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked
    }

    /// Address of the best match, or an empty string when nothing matches.
    pub fn resolve(&self, customer: &str, directory: &[AddressEntry]) -> String {
        self.rank(customer, directory)
            .first()
            .map(|c| c.item.address.clone())
            .unwrap_or_default()
    }
}
