//! Pairwise text similarity.
//!
//! Argument order is always `(query, candidate)`: the overlap ratio is
//! divided by the query's word count, so swapping the arguments changes the
//! result whenever the word counts differ.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::normalize::normalize;
use super::weights::MatchWeights;

static GRADE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+w\d+$").expect("grade regex is valid"));

/// Whether `word` is a viscosity-grade token such as `15w40`.
pub fn is_grade_token(word: &str) -> bool {
    GRADE_TOKEN.is_match(word)
}

/// Similarity of `candidate` to `query`, in `[0, containment_score]` for
/// containment hits and `[0, 1]` otherwise.
pub fn score(query: &str, candidate: &str, weights: &MatchWeights) -> f64 {
    let q = normalize(query);
    let c = normalize(candidate);
    if q.is_empty() || c.is_empty() {
        return 0.0;
    }

    if q.contains(&c) || c.contains(&q) {
        return weights.containment_score;
    }

    let q_words: Vec<&str> = q.split(' ').filter(|w| !w.is_empty()).collect();
    let c_words: Vec<&str> = c.split(' ').filter(|w| !w.is_empty()).collect();
    let c_set: HashSet<&str> = c_words.iter().copied().collect();
    let denom = q_words.len().max(1) as f64;

    let exact = q_words.iter().filter(|w| c_set.contains(*w)).count();
    let ratio = exact as f64 / denom;
    if ratio >= weights.detailed_scan_below {
        return ratio;
    }

    let mut matches = 0.0;
    for qw in &q_words {
        if c_set.contains(qw) {
            matches += 1.0;
            continue;
        }
        for cw in &c_words {
            if (*qw == "sae" && is_grade_token(cw))
                || (*cw == "sae" && is_grade_token(qw))
                || (is_grade_token(qw) && qw == cw)
            {
                matches += 1.0;
                break;
            }
            if cw.contains(qw) || qw.contains(cw) {
                let shorter = qw.chars().count().min(cw.chars().count());
                matches += if shorter > weights.partial_min_len {
                    weights.partial_long
                } else {
                    weights.partial_short
                };
                break;
            }
        }
    }

    ratio.max(matches / denom)
}
