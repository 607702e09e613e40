//! OCR primitive: wraps an external engine's raw token table, applies the
//! confidence floor, character cleaning, typo map, and garbage filter
//! (`spec.md` §4.1), grounded on `ocr/tesseract_backend.rs`'s token-table
//! shape and `original_source/storage/ocr_utils.py`.

use std::sync::LazyLock;

use regex::Regex;

use crate::grammar::normalize_typos;
use crate::types::{BBox, Word};

/// Raw token as returned by an [`crate::traits::OcrEngine`] before any
/// cleaning — mirrors Tesseract's `TSV` output columns.
#[derive(Clone, Debug, PartialEq)]
pub struct RawToken {
    pub text: String,
    pub conf: f64,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

static ALLOWED_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^A-Za-z0-9$.,\-/&'"°():;#+ ]"#).unwrap());
static REPEAT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(.)\1{2,}").unwrap());
static CONSONANT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[bcdfghjklmnpqrstvwxyz]{5,}$").unwrap());
static SYMBOL_RATIO_THRESHOLD: f64 = 0.5;

/// Strips disallowed characters, collapses 3+ repeats to 2, folds whitespace,
/// and applies the OCR-typo map.
fn clean_token_text(text: &str) -> String {
    let stripped = ALLOWED_CHARS_RE.replace_all(text, "").into_owned();
    let collapsed = REPEAT_RUN_RE.replace_all(&stripped, "$1$1").into_owned();
    let typo_fixed = normalize_typos(&collapsed);
    typo_fixed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Per-token garbage filter (`spec.md` §3 Word invariant): low alphabetic
/// ratio without digits, long consonant-only run, excessive symbol ratio, or
/// length ≤ 2 with no alphanumerics.
fn is_garbage_token(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let len = text.chars().count() as f64;
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count() as f64;
    let digit = text.chars().filter(|c| c.is_ascii_digit()).count() as f64;
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count() as f64;
    let symbol = len - alnum;

    if text.chars().count() <= 2 && alnum == 0.0 {
        return true;
    }
    if alpha / len < 0.3 && digit == 0.0 {
        return true;
    }
    if CONSONANT_RUN_RE.is_match(text) {
        return true;
    }
    if symbol / len > SYMBOL_RATIO_THRESHOLD {
        return true;
    }
    false
}

/// Converts a raw token table into accepted [`Word`]s: applies the
/// confidence floor, cleans text, and drops garbage tokens
/// (`spec.md` §4.1, §3).
pub fn clean_and_filter_tokens(raw: &[RawToken], conf_floor: f64) -> Vec<Word> {
    raw.iter()
        .filter(|t| t.conf >= conf_floor)
        .filter_map(|t| {
            let cleaned = clean_token_text(&t.text);
            if cleaned.is_empty() || is_garbage_token(&cleaned) {
                return None;
            }
            Some(Word { text: cleaned, bbox: BBox::new(t.left, t.top, t.width, t.height), conf: t.conf })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(text: &str, conf: f64) -> RawToken {
        RawToken { text: text.to_string(), conf, left: 0, top: 0, width: 10, height: 10 }
    }

    #[test]
    fn drops_tokens_below_conf_floor() {
        let words = clean_and_filter_tokens(&[tok("Pizza", 40.0)], 55.0);
        assert!(words.is_empty());
    }

    #[test]
    fn keeps_clean_high_confidence_tokens() {
        let words = clean_and_filter_tokens(&[tok("Pizza", 90.0)], 55.0);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "Pizza");
    }

    #[test]
    fn drops_short_symbol_only_tokens() {
        let words = clean_and_filter_tokens(&[tok("--", 90.0)], 55.0);
        assert!(words.is_empty());
    }

    #[test]
    fn drops_consonant_only_runs() {
        let words = clean_and_filter_tokens(&[tok("xqzjkv", 90.0)], 55.0);
        assert!(words.is_empty());
    }

    #[test]
    fn applies_typo_map() {
        let words = clean_and_filter_tokens(&[tok("88Q", 90.0)], 55.0);
        assert_eq!(words[0].text, "BBQ");
    }

    #[test]
    fn collapses_repeat_runs() {
        let words = clean_and_filter_tokens(&[tok("Sooo Good", 90.0)], 55.0);
        assert_eq!(words[0].text, "Soo Good");
    }
}
