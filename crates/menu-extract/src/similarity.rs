//! Name similarity ratio used by cross-item fuzzy duplicate detection
//! (`spec.md` §4.11.1), grounded on `original_source/storage/cross_item.py`'s
//! use of Python's `difflib.SequenceMatcher.ratio()` and satisfied here by
//! `strsim`'s normalized Levenshtein ratio (`spec.md` §9: "a comparable
//! gestalt-matching or edit-distance-based ratio").

/// Similarity ratio in `[0.0, 1.0]`. Identical strings (including two empty
/// strings) score `1.0`; strings with no characters in common score near
/// `0.0`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}
