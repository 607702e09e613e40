//! Side-food lexicon for combo-modifier detection (`spec.md` §4.10
//! "backward-token-walk" combo variants), grounded on
//! `original_source/storage/parsers/combo_vocab.py`.

use std::sync::LazyLock;

use ahash::AHashSet;
use regex::Regex;

/// Foods commonly offered as a combo add-on (fries, drink, salad, ...).
pub static COMBO_FOODS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    AHashSet::from_iter([
        "fries",
        "fry",
        "salad",
        "soda",
        "drink",
        "chips",
        "slaw",
        "coleslaw",
        "soup",
        "breadstick",
        "breadsticks",
        "garlic bread",
        "onion rings",
        "side salad",
        "dessert",
        "cookie",
        "2 liter",
        "2-liter",
        "bottle",
        "can",
    ])
});

static WITH_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*(w/|with)\s*(.+)$").unwrap());

/// Detects a `w/<FOOD>` / `with <FOOD>` pattern and returns the matched food
/// phrase, normalised to lowercase, if the trailing phrase is in the combo
/// lexicon (possibly as a prefix match, e.g. `"fries & a drink"`).
pub fn match_combo_phrase(text: &str) -> Option<String> {
    let caps = WITH_PATTERN.captures(text)?;
    let rest = caps.get(2)?.as_str().trim().to_lowercase();
    if COMBO_FOODS.iter().any(|food| rest.contains(*food)) {
        Some(rest)
    } else {
        None
    }
}

/// Whether a bare (non-`w/`-prefixed) phrase names a combo side food.
pub fn is_combo_food(phrase: &str) -> bool {
    let low = phrase.trim().to_lowercase();
    COMBO_FOODS.contains(low.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_w_slash_pattern() {
        assert_eq!(match_combo_phrase("W/Fries").unwrap(), "fries");
        assert_eq!(match_combo_phrase("with a drink").unwrap(), "a drink");
    }

    #[test]
    fn rejects_non_combo_phrases() {
        assert!(match_combo_phrase("w/pepperoni").is_none());
        assert!(match_combo_phrase("no with here").is_none());
    }

    #[test]
    fn bare_food_lookup() {
        assert!(is_combo_food("Fries"));
        assert!(!is_combo_food("pepperoni"));
    }
}
