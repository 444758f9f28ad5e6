//! Text canonicalization shared by every comparison in the matcher.
//!
//! Performs:
//! - Lowercase conversion
//! - Unicode NFD decomposition with combining marks dropped
//! - Anything other than `[A-Za-z0-9_]`, whitespace or `-` becomes a space
//! - Whitespace collapsing and trimming
//! - Viscosity-grade rewrites (`15-40` → `15w40`, `5w-30` → `5w30`, ...)

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Literal rewrites applied in order after cleanup.
const GRADE_REWRITES: &[(&str, &str)] = &[
    ("15-40", "15w40"),
    ("15w-40", "15w40"),
    ("5w-30", "5w30"),
    ("10w-30", "10w30"),
    ("10w-40", "10w40"),
    ("20w-50", "20w50"),
    ("5w-20", "5w20"),
    ("80-90", "80w90"),
    ("85-140", "85w140"),
];

/// Canonical form of `text` for comparison. Total and idempotent; blank
/// input yields an empty string.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut out = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    for (from, to) in GRADE_REWRITES {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    out
}

/// Normalized words of `text`, empty tokens dropped.
pub fn words(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
