//! Component extraction from an item's description: toppings, sauces,
//! preparation notes, flavor options (`spec.md` §4.6 step 15).

use std::sync::LazyLock;

use ahash::AHashSet;
use regex::Regex;

use crate::types::Components;

static SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i),| & | and |;| or | w/ ").unwrap());
static WITH_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*(w/|with)\s*").unwrap());

static SAUCE_WORDS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    AHashSet::from_iter([
        "marinara",
        "alfredo",
        "bbq",
        "barbecue",
        "buffalo",
        "ranch",
        "garlic sauce",
        "pesto",
        "red sauce",
        "white sauce",
        "honey mustard",
        "teriyaki",
    ])
});

static PREPARATION_WORDS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    AHashSet::from_iter([
        "grilled",
        "fried",
        "baked",
        "roasted",
        "blackened",
        "crispy",
        "sauteed",
        "smoked",
        "breaded",
        "toasted",
        "thin crust",
        "deep dish",
        "stuffed crust",
        "bone-in",
        "boneless",
    ])
});

static FLAVOR_WORDS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    AHashSet::from_iter([
        "hot", "mild", "honey", "garlic parm", "parmesan", "teriyaki", "spicy", "sweet", "sour", "honey mustard",
        "lemon pepper", "cajun",
    ])
});

/// Longest-prefix classification of a single description token into one of
/// the four component buckets. Returns `None` for tokens that match nothing
/// (plain ingredient names default to `topping`).
fn classify_token(token: &str) -> &'static str {
    let low = token.trim().to_lowercase();
    if low.is_empty() {
        return "topping";
    }
    if SAUCE_WORDS.iter().any(|w| low.starts_with(w)) {
        return "sauce";
    }
    if PREPARATION_WORDS.iter().any(|w| low.starts_with(w)) {
        return "preparation";
    }
    if FLAVOR_WORDS.iter().any(|w| low.starts_with(w)) {
        return "flavor";
    }
    "topping"
}

/// Splits a description into tokens and buckets each into a [`Components`]
/// field. If every token classifies as `flavor`, they are populated only in
/// `flavor_options` (not duplicated into `topping`).
pub fn extract_components(description: &str) -> Option<Components> {
    let cleaned = WITH_PREFIX_RE.replace(description, "");
    let tokens: Vec<String> = SPLIT_RE
        .split(&cleaned)
        .map(|t| t.trim().trim_start_matches("w/").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }

    let mut components = Components::default();
    let mut all_flavor = true;
    for token in &tokens {
        match classify_token(token) {
            "sauce" => {
                components.sauce.push(token.clone());
                all_flavor = false;
            }
            "preparation" => {
                components.preparation.push(token.clone());
                all_flavor = false;
            }
            "flavor" => {
                components.flavor_options.push(token.clone());
            }
            _ => {
                components.topping.push(token.clone());
                all_flavor = false;
            }
        }
    }

    if all_flavor && !components.flavor_options.is_empty() {
        components.topping.clear();
    }

    Some(components)
}
