//! Fuzzy matching of free text against reference catalogs.
//!
//! Every comparison runs on normalized text (`normalize`). The pairwise
//! `score` feeds two rankers: `CatalogMatcher` for products and
//! `AddressResolver` for customer addresses. All tunable numbers live in
//! `MatchWeights`.

pub mod address;
pub mod catalog;
pub mod normalize;
pub mod similarity;
pub mod weights;

pub use address::{AddressEntry, AddressResolver};
pub use catalog::{CatalogItem, CatalogMatcher, MatchCandidate, MatchProfile};
pub use normalize::normalize;
pub use similarity::score;
pub use weights::MatchWeights;
