//! Canonical size vocabulary: word map, tracks, and ordinals (`spec.md`
//! §4.10). The word map is grounded on
//! `original_source/storage/parsers/size_vocab.py`'s `_SIZE_WORD_MAP`; the
//! track/ordinal system (not present in the retrieved Python source — see
//! `DESIGN.md`) is built directly from `spec.md`.

use std::sync::LazyLock;

use ahash::AHashMap;
use regex::Regex;

use crate::types::Track;

/// Base ordinal offset per track so that no two tracks' ordinals can ever
/// collide when compared (comparisons are only ever made within one track,
/// but keeping them disjoint makes bugs visible rather than silently wrong).
const WORD_BASE: i64 = 0;
const PORTION_BASE: i64 = 1_000;
const MULTIPLICITY_BASE: i64 = 2_000;
const INCH_BASE: i64 = 3_000;
const PIECE_BASE: i64 = 4_000;

/// Word-track ordinal chain: `XS < Mini < S < Personal < Regular < M < L <
/// Deluxe < XL < XXL`.
pub const WORD_CHAIN: &[&str] = &["XS", "Mini", "S", "Personal", "Regular", "M", "L", "Deluxe", "XL", "XXL"];

/// Portion-track ordinal chain: `Slice < Half < Whole < Family < Party`.
pub const PORTION_CHAIN: &[&str] = &["Slice", "Half", "Whole", "Family", "Party"];

/// Raw OCR spellings collapsed onto a canonical word-track label.
static SIZE_WORD_MAP: LazyLock<AHashMap<&'static str, &'static str>> = LazyLock::new(|| {
    AHashMap::from_iter([
        ("xs", "XS"),
        ("x-small", "XS"),
        ("extra small", "XS"),
        ("mini", "Mini"),
        ("small", "S"),
        ("sm", "S"),
        ("sml", "S"),
        ("personal", "Personal"),
        ("regular", "Regular"),
        ("reg", "Regular"),
        ("medium", "M"),
        ("med", "M"),
        ("md", "M"),
        ("large", "L"),
        ("lg", "L"),
        ("deluxe", "Deluxe"),
        ("xlarge", "XL"),
        ("x-large", "XL"),
        ("extra large", "XL"),
        ("xl", "XL"),
        ("xxl", "XXL"),
    ])
});

static PORTION_WORD_MAP: LazyLock<AHashMap<&'static str, &'static str>> = LazyLock::new(|| {
    AHashMap::from_iter([
        ("slice", "Slice"),
        ("half", "Half"),
        ("1/2", "Half"),
        ("whole", "Whole"),
        ("family", "Family"),
        ("family size", "Family"),
        ("party", "Party"),
        ("party size", "Party"),
    ])
});

static INCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(\d{1,2})\s*(?:["]|in(?:ch(?:es)?)?)\b"#).unwrap());
static PIECE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d{1,2})\s*(?:pc|pcs|piece|pieces|ct)\b").unwrap());
static MULTIPLICITY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2})\s*x$").unwrap());
static BARE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})\b").unwrap());

/// A recognised, canonicalised size token.
#[derive(Clone, Debug, PartialEq)]
pub struct SizeToken {
    pub normalized: String,
    pub track: Track,
    pub ordinal: i64,
}

fn word_ordinal(label: &str) -> Option<i64> {
    WORD_CHAIN.iter().position(|w| *w == label).map(|i| WORD_BASE + i as i64)
}

fn portion_ordinal(label: &str) -> Option<i64> {
    PORTION_CHAIN.iter().position(|w| *w == label).map(|i| PORTION_BASE + i as i64)
}

/// Normalises a raw size token (as it would appear in OCR text, e.g. `"Sml"`,
/// `10 inch`, `6 pcs`, `Party Size`) to a canonical label with track and
/// ordinal. Returns `None` if the token doesn't look like a size at all.
///
/// Idempotent: `normalize_size_token(normalize_size_token(x).normalized) ==
/// normalize_size_token(x)` for every recognised `x` (`spec.md` §8).
pub fn normalize_size_token(raw: &str) -> Option<SizeToken> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let low = trimmed.to_lowercase();

    if let Some(caps) = INCH_RE.captures(&low) {
        let inches: i64 = caps[1].parse().ok()?;
        return Some(SizeToken { normalized: format!("{inches}\""), track: Track::Inch, ordinal: INCH_BASE + inches });
    }
    if let Some(caps) = PIECE_RE.captures(&low) {
        let count: i64 = caps[1].parse().ok()?;
        return Some(SizeToken { normalized: format!("{count}pc"), track: Track::Piece, ordinal: PIECE_BASE + count });
    }
    if let Some(caps) = MULTIPLICITY_RE.captures(&low) {
        let count: i64 = caps[1].parse().ok()?;
        return Some(SizeToken {
            normalized: format!("{count}x"),
            track: Track::Multiplicity,
            ordinal: MULTIPLICITY_BASE + count,
        });
    }
    if let Some(label) = PORTION_WORD_MAP.get(low.as_str()) {
        let ordinal = portion_ordinal(label)?;
        return Some(SizeToken { normalized: (*label).to_string(), track: Track::Portion, ordinal });
    }
    if let Some(label) = SIZE_WORD_MAP.get(low.as_str()) {
        let ordinal = word_ordinal(label)?;
        return Some(SizeToken { normalized: (*label).to_string(), track: Track::Word, ordinal });
    }
    // Already-normalised input (idempotence): a bare chain label or an
    // inch/piece/multiplicity string fed back in.
    if let Some(ordinal) = word_ordinal(trimmed) {
        return Some(SizeToken { normalized: trimmed.to_string(), track: Track::Word, ordinal });
    }
    if let Some(ordinal) = portion_ordinal(trimmed) {
        return Some(SizeToken { normalized: trimmed.to_string(), track: Track::Portion, ordinal });
    }
    if let Some(rest) = trimmed.strip_suffix('"') {
        if let Ok(n) = rest.parse::<i64>() {
            return Some(SizeToken { normalized: trimmed.to_string(), track: Track::Inch, ordinal: INCH_BASE + n });
        }
    }
    if let Some(rest) = trimmed.strip_suffix("pc") {
        if let Ok(n) = rest.parse::<i64>() {
            return Some(SizeToken { normalized: trimmed.to_string(), track: Track::Piece, ordinal: PIECE_BASE + n });
        }
    }

    // Bare numbers: treat 6-30 as inches (pizza-diameter context), per
    // `spec.md` §4.6 size-mention extraction.
    if let Some(caps) = BARE_NUMBER_RE.captures(&low) {
        if let Ok(n) = caps[1].parse::<i64>() {
            if (6..=30).contains(&n) {
                return Some(SizeToken { normalized: format!("{n}\""), track: Track::Inch, ordinal: INCH_BASE + n });
            }
        }
    }

    None
}

/// Whether `token` is recognised as any kind of size mention at all
/// (used by the grammar's size-header / size-mention detection, §4.6).
pub fn looks_like_size(token: &str) -> bool {
    normalize_size_token(token).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_word_sizes() {
        assert_eq!(normalize_size_token("Sml").unwrap().normalized, "S");
        assert_eq!(normalize_size_token("small").unwrap().track, Track::Word);
        assert_eq!(normalize_size_token("MED").unwrap().normalized, "M");
    }

    #[test]
    fn normalizes_inch_and_piece() {
        let inch = normalize_size_token("10 inch").unwrap();
        assert_eq!(inch.normalized, "10\"");
        assert_eq!(inch.track, Track::Inch);

        let pc = normalize_size_token("6 pcs").unwrap();
        assert_eq!(pc.normalized, "6pc");
        assert_eq!(pc.track, Track::Piece);
    }

    #[test]
    fn normalizes_portion_sizes() {
        let party = normalize_size_token("party size").unwrap();
        assert_eq!(party.normalized, "Party");
        assert_eq!(party.track, Track::Portion);
    }

    #[test]
    fn word_chain_is_monotonic() {
        let s = normalize_size_token("S").unwrap();
        let m = normalize_size_token("M").unwrap();
        let l = normalize_size_token("L").unwrap();
        assert!(s.ordinal < m.ordinal);
        assert!(m.ordinal < l.ordinal);
    }

    #[test]
    fn idempotent_on_normalized_output() {
        for raw in ["Sml", "10 inch", "6 pcs", "party size", "XXL"] {
            let once = normalize_size_token(raw).unwrap();
            let twice = normalize_size_token(&once.normalized).unwrap();
            assert_eq!(once.normalized, twice.normalized);
            assert_eq!(once.track, twice.track);
            assert_eq!(once.ordinal, twice.ordinal);
        }
    }

    #[test]
    fn tracks_never_collide_in_ordinal_space() {
        let inch = normalize_size_token("10in").unwrap();
        let piece = normalize_size_token("10pc").unwrap();
        assert_ne!(inch.ordinal, piece.ordinal);
    }

    #[test]
    fn rejects_non_size_tokens() {
        assert!(normalize_size_token("pepperoni").is_none());
        assert!(normalize_size_token("").is_none());
    }
}
