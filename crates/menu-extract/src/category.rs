//! Category inference: keyword + price-band + neighbour scoring
//! (`spec.md` §4.9), grounded exactly on
//! `original_source/storage/category_infer.py::infer_category_for_text`.

use crate::vocab::category::{CATEGORY_KEYWORDS, CATEGORY_PRICE_BANDS, DEFAULT_FALLBACK_CATEGORY};

/// Result of scoring one candidate text+price against the closed category set.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryGuess {
    pub category: String,
    /// 0-100.
    pub confidence: i64,
    pub reason: String,
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn keyword_score(text: &str, category: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    CATEGORY_KEYWORDS.get(category).map(|kws| kws.iter().filter(|kw| text.contains(*kw)).count() as i64).unwrap_or(0)
}

fn price_band_score(price_cents: i64, category: &str) -> i64 {
    if price_cents <= 0 {
        return 0;
    }
    let Some(&(lo, hi)) = CATEGORY_PRICE_BANDS.get(category) else {
        return 0;
    };
    if price_cents >= lo && price_cents <= hi {
        2
    } else if price_cents < lo / 2 || price_cents > hi * 2 {
        -1
    } else {
        0
    }
}

fn neighbor_score(category: &str, neighbor_categories: &[String]) -> i64 {
    let normalized: Vec<&str> = neighbor_categories.iter().map(String::as_str).filter(|c| !c.is_empty()).collect();
    if normalized.is_empty() {
        return 0;
    }
    let same = normalized.iter().filter(|c| **c == category).count();
    let total = normalized.len();
    if same >= 2 {
        2
    } else if same == 0 && total >= 2 {
        -1
    } else {
        0
    }
}

/// Infers a category from name/description text, a price, and optional
/// neighbouring-item categories. Mirrors
/// `category_infer.py::infer_category_for_text` exactly.
pub fn infer_category_for_text(
    name: Option<&str>,
    description: Option<&str>,
    price_cents: i64,
    neighbor_categories: &[String],
    fallback: &str,
) -> CategoryGuess {
    let name_norm = name.map(normalize).unwrap_or_default();
    let desc_norm = description.map(normalize).unwrap_or_default();

    if name_norm.is_empty() && desc_norm.is_empty() && price_cents <= 0 {
        return CategoryGuess {
            category: fallback.to_string(),
            confidence: 5,
            reason: "no name/description/price; using fallback".into(),
        };
    }

    let mut best_category: Option<&str> = None;
    let mut best_raw_score = i64::MIN;

    for category in CATEGORY_KEYWORDS.keys() {
        let mut score = 0;
        score += keyword_score(&name_norm, category) * 4;
        score += keyword_score(&desc_norm, category) * 2;
        score += price_band_score(price_cents, category);
        score += neighbor_score(category, neighbor_categories);

        if score > best_raw_score {
            best_raw_score = score;
            best_category = Some(category);
        }
    }

    if best_raw_score <= 0 {
        if price_cents > 0 && price_cents <= 799 {
            return CategoryGuess {
                category: "Beverages".into(),
                confidence: 35,
                reason: "weak text match but price looks like a drink".into(),
            };
        }
        return CategoryGuess {
            category: fallback.to_string(),
            confidence: 15,
            reason: "no strong keyword or price signal; using fallback".into(),
        };
    }

    let raw = best_raw_score as f64;
    let confidence = 40 + (raw * 6.0).min(55.0) as i64;

    let mut reason_bits = Vec::new();
    if !name_norm.is_empty() {
        reason_bits.push("matched name keywords");
    }
    if !desc_norm.is_empty() {
        reason_bits.push("matched description keywords");
    }
    if price_cents > 0 {
        reason_bits.push("price fell in expected band");
    }
    if !neighbor_categories.is_empty() {
        reason_bits.push("neighbors support this category");
    }
    let reason = if reason_bits.is_empty() { "heuristic match".to_string() } else { reason_bits.join(", ") };

    CategoryGuess { category: best_category.unwrap_or(fallback).to_string(), confidence, reason }
}

/// Applies inference across a sequence of items in document order, using
/// each item's immediate left/right neighbour's *existing* category (if any,
/// and not the fallback) as a soft signal — mirrors
/// `category_infer.py::apply_inference_to_items`.
pub struct CategoryInput<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub price_cents: i64,
    pub existing_category: Option<&'a str>,
}

pub struct CategoryOutput {
    pub category: String,
    pub confidence: i64,
    pub source: crate::types::CategorySource,
}

pub fn apply_inference_to_items(items: &[CategoryInput], fallback: &str) -> Vec<CategoryOutput> {
    let existing: Vec<Option<&str>> =
        items.iter().map(|it| it.existing_category.filter(|c| !c.is_empty() && *c != fallback)).collect();

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let mut neighbors = Vec::new();
            if idx > 0 {
                if let Some(c) = existing[idx - 1] {
                    neighbors.push(c.to_string());
                }
            }
            if idx + 1 < existing.len() {
                if let Some(c) = existing[idx + 1] {
                    neighbors.push(c.to_string());
                }
            }

            let guess =
                infer_category_for_text(item.name, item.description, item.price_cents, &neighbors, fallback);

            let current = item.existing_category.unwrap_or("").trim();
            if current.is_empty() || current == fallback {
                CategoryOutput { category: guess.category, confidence: guess.confidence, source: crate::types::CategorySource::Inferred }
            } else {
                CategoryOutput {
                    category: current.to_string(),
                    confidence: guess.confidence,
                    source: crate::types::CategorySource::Existing,
                }
            }
        })
        .collect()
}
