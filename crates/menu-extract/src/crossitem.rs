//! Cross-item consistency checks: compares items across the whole menu to
//! catch anomalies no per-item check can see (`spec.md` §4.11), grounded on
//! `original_source/storage/cross_item.py` (exact constants, formulas, and
//! check ordering carried over).

use ahash::AHashMap;
use serde_json::json;

use crate::config::CrossItemConfig;
use crate::similarity::similarity_ratio;
use crate::types::{FlagReason, PriceFlag, Severity, TextBlock, VariantKind};
use crate::vocab::category::{CATEGORY_KEYWORDS, CATEGORY_PRICE_BANDS, CROSS_CATEGORY_PRICE_RULES};
use crate::vocab::size::normalize_size_token;

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n % 2 == 1 { sorted[n / 2] } else { (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0 }
}

fn mode_i64(values: &[i64]) -> i64 {
    let mut counts: AHashMap<i64, usize> = AHashMap::new();
    for v in values {
        *counts.entry(*v).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(_, c)| *c).map(|(v, _)| v).unwrap_or_default()
}

fn normalize_name(name: &str) -> String {
    let mut n = name.trim().to_lowercase();
    loop {
        let before = n.clone();
        for prefix in ["our ", "the ", "homemade ", "fresh ", "classic "] {
            if let Some(rest) = n.strip_prefix(prefix) {
                n = rest.to_string();
            }
        }
        if n == before {
            break;
        }
    }
    let n = n.split_whitespace().collect::<Vec<_>>().join(" ");
    n.trim_end_matches(['.', ':', '-', ' ']).to_string()
}

fn push_flag(block: &mut TextBlock, severity: Severity, reason: FlagReason, details: serde_json::Value) {
    block.price_flags.push(PriceFlag { severity, reason, details, corrected_price_cents: None });
}

/// Check 1: exact + fuzzy duplicate name detection (`spec.md` §4.11.1).
fn check_duplicate_names(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    let items: Vec<(usize, String, i64)> = blocks
        .iter()
        .enumerate()
        .filter_map(|(idx, b)| {
            let raw = b.display_name();
            if raw.chars().count() < 3 {
                return None;
            }
            let norm = normalize_name(&raw);
            if norm.is_empty() {
                return None;
            }
            Some((idx, norm, b.primary_price_cents().unwrap_or(0)))
        })
        .collect();

    let mut groups: AHashMap<String, Vec<(usize, i64)>> = AHashMap::new();
    for (idx, norm, price) in &items {
        groups.entry(norm.clone()).or_default().push((*idx, *price));
    }

    for (norm_name, members) in groups.iter() {
        if members.len() < 2 {
            continue;
        }
        let all_same_price = members.iter().map(|(_, p)| *p).collect::<std::collections::HashSet<_>>().len() == 1;
        let (reason, severity) = if all_same_price {
            (FlagReason::CrossItemExactDuplicate, Severity::Info)
        } else {
            (FlagReason::CrossItemDuplicateName, Severity::Warn)
        };
        for (idx, price) in members {
            let others: Vec<i64> = members.iter().filter(|(i, _)| i != idx).map(|(_, p)| *p).collect();
            let other_indices: Vec<usize> = members.iter().filter(|(i, _)| i != idx).map(|(i, _)| *i).collect();
            push_flag(
                &mut blocks[*idx],
                severity,
                reason,
                json!({
                    "normalized_name": norm_name,
                    "this_price_cents": price,
                    "other_prices_cents": others,
                    "other_indices": other_indices,
                    "group_size": members.len(),
                }),
            );
        }
    }

    let candidates: Vec<&(usize, String, i64)> = items.iter().filter(|(_, n, _)| n.chars().count() >= cfg.fuzzy_name_min_len).collect();
    let mut flagged_pairs: std::collections::HashSet<(usize, usize)> = std::collections::HashSet::new();

    for a in 0..candidates.len() {
        let (a_idx, a_norm, a_price) = candidates[a];
        for b in (a + 1)..candidates.len() {
            let (b_idx, b_norm, b_price) = candidates[b];
            if a_norm == b_norm {
                continue;
            }
            let sim = similarity_ratio(a_norm, b_norm);
            if sim < cfg.fuzzy_name_ratio_threshold {
                continue;
            }
            let key = (a_idx.min(*b_idx), a_idx.max(*b_idx));
            if !flagged_pairs.insert(key) {
                continue;
            }
            let (reason, severity) = if a_price == b_price {
                (FlagReason::CrossItemFuzzyExactDuplicate, Severity::Info)
            } else {
                (FlagReason::CrossItemFuzzyDuplicate, Severity::Warn)
            };
            push_flag(
                &mut blocks[*a_idx],
                severity,
                reason,
                json!({"this_name": a_norm, "matched_name": b_norm, "similarity": sim, "this_price_cents": a_price, "matched_price_cents": b_price, "matched_index": b_idx}),
            );
            push_flag(
                &mut blocks[*b_idx],
                severity,
                reason,
                json!({"this_name": b_norm, "matched_name": a_norm, "similarity": sim, "this_price_cents": b_price, "matched_price_cents": a_price, "matched_index": a_idx}),
            );
        }
    }
}

/// Check 2: MAD-based category price outliers (`spec.md` §4.11.2).
fn check_category_price_outliers(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    let mut groups: AHashMap<String, Vec<(usize, i64)>> = AHashMap::new();
    for (idx, b) in blocks.iter().enumerate() {
        let Some(cat) = b.category.clone() else { continue };
        let Some(price) = b.primary_price_cents().filter(|p| *p > 0) else { continue };
        groups.entry(cat).or_default().push((idx, price));
    }

    for members in groups.values() {
        if members.len() < 3 {
            continue;
        }
        let prices: Vec<f64> = members.iter().map(|(_, p)| *p as f64).collect();
        let median_price = median(&prices);
        if median_price <= 0.0 {
            continue;
        }
        let deviations: Vec<f64> = prices.iter().map(|p| (p - median_price).abs()).collect();
        let mad = median(&deviations);
        let mad_effective = mad.max(median_price * cfg.category_outlier_mad_floor_ratio);
        let threshold = cfg.category_outlier_mad_multiplier * mad_effective;

        for (idx, price) in members {
            let deviation = (*price as f64 - median_price).abs();
            if deviation > threshold {
                let direction = if *price as f64 > median_price { "above" } else { "below" };
                push_flag(
                    &mut blocks[*idx],
                    Severity::Warn,
                    FlagReason::CrossItemCategoryPriceOutlier,
                    json!({
                        "item_price_cents": price,
                        "category_median_cents": median_price as i64,
                        "category_mad_cents": mad as i64,
                        "deviation_cents": deviation as i64,
                        "threshold_cents": threshold as i64,
                        "direction": direction,
                        "category_item_count": members.len(),
                    }),
                );
            }
        }
    }
}

/// Check 3: category isolation (`spec.md` §4.11.3).
fn check_category_isolation(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    let n = blocks.len() as i64;
    let categories: Vec<Option<String>> = blocks.iter().map(|b| b.category.clone()).collect();
    let window = cfg.isolation_neighbor_window;

    for idx in 0..blocks.len() {
        let Some(cat) = categories[idx].clone() else { continue };
        let mut neighbor_cats = Vec::new();
        for offset in [-window, -1, 1, window] {
            let ni = idx as i64 + offset;
            if ni >= 0 && ni < n {
                if let Some(nc) = &categories[ni as usize] {
                    neighbor_cats.push(nc.clone());
                }
            }
        }
        if neighbor_cats.len() < cfg.isolation_min_neighbors {
            continue;
        }
        if neighbor_cats.iter().all(|nc| *nc != cat) {
            let dominant = mode_string(&neighbor_cats);
            push_flag(
                &mut blocks[idx],
                Severity::Info,
                FlagReason::CrossItemCategoryIsolated,
                json!({"item_category": cat, "neighbor_categories": neighbor_cats, "dominant_neighbor_category": dominant, "position_index": idx}),
            );
        }
    }
}

fn mode_string(values: &[String]) -> String {
    let mut counts: AHashMap<&str, usize> = AHashMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(_, c)| *c).map(|(v, _)| v.to_string()).unwrap_or_default()
}

fn keyword_match_count(norm_name: &str, category: &str) -> usize {
    CATEGORY_KEYWORDS.get(category).map(|kws| kws.iter().filter(|kw| norm_name.contains(*kw)).count()).unwrap_or(0)
}

fn in_price_band(price_cents: i64, category: &str) -> bool {
    if price_cents <= 0 {
        return false;
    }
    CATEGORY_PRICE_BANDS.get(category).is_some_and(|band| price_cents >= band.0 && price_cents <= band.1)
}

/// Check 4: category reassignment suggestions (`spec.md` §4.11.4).
fn check_category_suggestions(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    let n = blocks.len() as i64;
    let categories: Vec<Option<String>> = blocks.iter().map(|b| b.category.clone()).collect();
    let window = cfg.suggestion_neighbor_window;

    for idx in 0..blocks.len() {
        let Some(current_cat) = categories[idx].clone() else { continue };

        let mut neighbor_cats = Vec::new();
        for offset in -window..=window {
            if offset == 0 {
                continue;
            }
            let ni = idx as i64 + offset;
            if ni >= 0 && ni < n {
                if let Some(nc) = &categories[ni as usize] {
                    neighbor_cats.push(nc.clone());
                }
            }
        }
        if neighbor_cats.len() < cfg.suggestion_min_neighbors {
            continue;
        }

        let mut counts: AHashMap<&str, usize> = AHashMap::new();
        for nc in &neighbor_cats {
            *counts.entry(nc.as_str()).or_insert(0) += 1;
        }
        let (dominant_cat, dominant_count) = counts.into_iter().max_by_key(|(_, c)| *c).unwrap();
        if dominant_cat == current_cat {
            continue;
        }

        let neighbor_agreement = dominant_count as f64 / neighbor_cats.len() as f64;
        if neighbor_agreement < cfg.suggestion_agreement_threshold {
            continue;
        }

        let raw_name = blocks[idx].display_name();
        let norm_name = normalize_name(&raw_name);
        let current_kw = keyword_match_count(&norm_name, &current_cat);
        if current_kw >= cfg.suggestion_keyword_guard_hits {
            continue;
        }
        let suggested_kw = keyword_match_count(&norm_name, dominant_cat);

        let keyword_delta = match suggested_kw.cmp(&current_kw) {
            std::cmp::Ordering::Greater => 0.20,
            std::cmp::Ordering::Less => -0.20,
            std::cmp::Ordering::Equal => 0.0,
        };

        let price_cents = blocks[idx].primary_price_cents().unwrap_or(0);
        let mut price_band_delta = 0.0;
        if price_cents > 0 {
            let fits_current = in_price_band(price_cents, &current_cat);
            let fits_suggested = in_price_band(price_cents, dominant_cat);
            if fits_suggested && !fits_current {
                price_band_delta = 0.15;
            } else if fits_current && !fits_suggested {
                price_band_delta = -0.15;
            }
        }

        let orig_conf = blocks[idx].category_confidence.unwrap_or(50);
        let confidence_delta = if orig_conf < 50 {
            0.10
        } else if orig_conf >= 80 {
            -0.15
        } else {
            0.0
        };

        let mut suggestion_confidence = neighbor_agreement * 0.40 + keyword_delta + price_band_delta + confidence_delta;
        suggestion_confidence = suggestion_confidence.clamp(0.0, 1.0);
        if suggestion_confidence < cfg.suggestion_confidence_threshold {
            continue;
        }

        let mut signals = vec![format!("{}/{} neighbors are {}", dominant_count, neighbor_cats.len(), dominant_cat)];
        if keyword_delta > 0.0 {
            signals.push(format!("keywords favor {dominant_cat} ({suggested_kw} vs {current_kw})"));
        } else if keyword_delta < 0.0 {
            signals.push(format!("keywords favor {current_cat} ({current_kw} vs {suggested_kw})"));
        }
        if price_band_delta > 0.0 {
            signals.push(format!("price fits {dominant_cat} band, not {current_cat}"));
        } else if price_band_delta < 0.0 {
            signals.push(format!("price fits {current_cat} band, not {dominant_cat}"));
        }
        if confidence_delta > 0.0 {
            signals.push(format!("low original confidence ({orig_conf})"));
        } else if confidence_delta < 0.0 {
            signals.push(format!("high original confidence ({orig_conf})"));
        }

        push_flag(
            &mut blocks[idx],
            Severity::Info,
            FlagReason::CrossItemCategorySuggestion,
            json!({
                "current_category": current_cat,
                "suggested_category": dominant_cat,
                "suggestion_confidence": suggestion_confidence,
                "neighbor_agreement": neighbor_agreement,
                "neighbor_count": neighbor_cats.len(),
                "signals": signals,
            }),
        );
    }
}

/// Check 5: cross-category price coherence (`spec.md` §4.11.5).
fn check_cross_category_coherence(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    let mut cat_items: AHashMap<String, Vec<(usize, i64)>> = AHashMap::new();
    for (idx, b) in blocks.iter().enumerate() {
        let Some(cat) = b.category.clone() else { continue };
        let Some(price) = b.primary_price_cents().filter(|p| *p > 0) else { continue };
        cat_items.entry(cat).or_default().push((idx, price));
    }

    let mut cat_medians: AHashMap<String, f64> = AHashMap::new();
    for (cat, members) in &cat_items {
        if members.len() >= 2 {
            let prices: Vec<f64> = members.iter().map(|(_, p)| *p as f64).collect();
            cat_medians.insert(cat.clone(), median(&prices));
        }
    }

    let mut best_above: AHashMap<usize, (serde_json::Value, i64)> = AHashMap::new();
    let mut best_below: AHashMap<usize, (serde_json::Value, i64)> = AHashMap::new();

    for rule in CROSS_CATEGORY_PRICE_RULES.iter() {
        let (Some(cheap_med), Some(exp_med)) = (cat_medians.get(rule.cheap), cat_medians.get(rule.expensive)) else {
            continue;
        };
        if *exp_med < cheap_med * cfg.cross_category_median_ratio {
            continue;
        }
        if let Some(members) = cat_items.get(rule.cheap) {
            for (idx, price) in members {
                if *price as f64 > *exp_med {
                    let gap = *price - *exp_med as i64;
                    let better = best_above.get(idx).is_none_or(|(_, prev_gap)| gap > *prev_gap);
                    if better {
                        best_above.insert(
                            *idx,
                            (
                                json!({"item_category": rule.cheap, "item_price_cents": price, "compared_category": rule.expensive, "compared_median_cents": *exp_med as i64, "own_median_cents": *cheap_med as i64}),
                                gap,
                            ),
                        );
                    }
                }
            }
        }
        if let Some(members) = cat_items.get(rule.expensive) {
            for (idx, price) in members {
                if (*price as f64) < *cheap_med {
                    let gap = *cheap_med as i64 - *price;
                    let better = best_below.get(idx).is_none_or(|(_, prev_gap)| gap > *prev_gap);
                    if better {
                        best_below.insert(
                            *idx,
                            (
                                json!({"item_category": rule.expensive, "item_price_cents": price, "compared_category": rule.cheap, "compared_median_cents": *cheap_med as i64, "own_median_cents": *exp_med as i64}),
                                gap,
                            ),
                        );
                    }
                }
            }
        }
    }

    for (idx, (details, _)) in best_above {
        push_flag(&mut blocks[idx], Severity::Warn, FlagReason::CrossCategoryPriceAbove, details);
    }
    for (idx, (details, _)) in best_below {
        push_flag(&mut blocks[idx], Severity::Warn, FlagReason::CrossCategoryPriceBelow, details);
    }
}

/// Check 6: variant count consistency (`spec.md` §4.11.6).
fn check_variant_count_consistency(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    let mut groups: AHashMap<String, Vec<(usize, i64)>> = AHashMap::new();
    for (idx, b) in blocks.iter().enumerate() {
        let Some(cat) = b.category.clone() else { continue };
        if b.variants.len() < 2 {
            continue;
        }
        groups.entry(cat).or_default().push((idx, b.variants.len() as i64));
    }

    for members in groups.values() {
        if members.len() < cfg.variant_count_min_items {
            continue;
        }
        let counts: Vec<i64> = members.iter().map(|(_, c)| *c).collect();
        let mode_count = mode_i64(&counts);
        for (idx, var_count) in members {
            let gap = mode_count - var_count;
            if gap >= 2 {
                push_flag(
                    &mut blocks[*idx],
                    Severity::Info,
                    FlagReason::CrossItemVariantCountOutlier,
                    json!({"item_variant_count": var_count, "category_mode_count": mode_count, "category_multi_variant_items": members.len()}),
                );
            }
        }
    }
}

/// Check 7: variant label-set consistency (`spec.md` §4.11.7).
fn check_variant_label_consistency(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    let mut groups: AHashMap<String, Vec<(usize, std::collections::BTreeSet<String>)>> = AHashMap::new();
    for (idx, b) in blocks.iter().enumerate() {
        let Some(cat) = b.category.clone() else { continue };
        let labels: std::collections::BTreeSet<String> = b
            .variants
            .iter()
            .filter(|v| v.kind == VariantKind::Size)
            .filter_map(|v| v.normalized_size.clone())
            .collect();
        if labels.len() < 2 {
            continue;
        }
        groups.entry(cat).or_default().push((idx, labels));
    }

    for members in groups.values() {
        if members.len() < cfg.variant_label_min_items {
            continue;
        }
        let mut set_counts: AHashMap<Vec<String>, usize> = AHashMap::new();
        for (_, labels) in members {
            *set_counts.entry(labels.iter().cloned().collect()).or_insert(0) += 1;
        }
        let (dominant_set, dominant_count) = set_counts.into_iter().max_by_key(|(_, c)| *c).unwrap();
        if dominant_count as f64 / members.len() as f64 < cfg.variant_label_agreement_threshold {
            continue;
        }
        let dominant: std::collections::BTreeSet<String> = dominant_set.into_iter().collect();

        for (idx, labels) in members {
            if *labels == dominant || labels.is_subset(&dominant) || dominant.is_subset(labels) {
                continue;
            }
            push_flag(
                &mut blocks[*idx],
                Severity::Info,
                FlagReason::CrossItemVariantLabelMismatch,
                json!({"item_labels": labels, "dominant_labels": dominant, "dominant_count": dominant_count, "category_size_items": members.len()}),
            );
        }
    }
}

/// Check 8: price step consistency (`spec.md` §4.11.8).
fn check_variant_price_steps(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    let mut cat_steps: AHashMap<String, Vec<(usize, f64)>> = AHashMap::new();

    for (idx, b) in blocks.iter().enumerate() {
        let Some(cat) = b.category.clone() else { continue };

        let mut by_track: AHashMap<crate::types::Track, Vec<(i64, i64)>> = AHashMap::new();
        for v in &b.variants {
            if v.kind != VariantKind::Size {
                continue;
            }
            let Some(ns) = &v.normalized_size else { continue };
            if v.price_cents <= 0 {
                continue;
            }
            let Some(token) = normalize_size_token(ns) else { continue };
            by_track.entry(token.track).or_default().push((token.ordinal, v.price_cents));
        }

        let mut item_steps = Vec::new();
        for entries in by_track.values_mut() {
            if entries.len() < 2 {
                continue;
            }
            entries.sort_by_key(|(ord, _)| *ord);
            for w in entries.windows(2) {
                let step = w[1].1 - w[0].1;
                if step > 0 {
                    item_steps.push(step as f64);
                }
            }
        }
        if item_steps.is_empty() {
            continue;
        }
        let avg_step = item_steps.iter().sum::<f64>() / item_steps.len() as f64;
        cat_steps.entry(cat).or_default().push((idx, avg_step));
    }

    for members in cat_steps.values() {
        if members.len() < cfg.price_step_min_items {
            continue;
        }
        let all_steps: Vec<f64> = members.iter().map(|(_, s)| *s).collect();
        let median_step = median(&all_steps);
        if median_step <= 0.0 {
            continue;
        }
        let deviations: Vec<f64> = all_steps.iter().map(|s| (s - median_step).abs()).collect();
        let mad = median(&deviations);
        let mad_effective = mad.max(median_step * cfg.price_step_mad_floor_ratio);
        let threshold = 3.0 * mad_effective;

        for (idx, avg_step) in members {
            let deviation = (avg_step - median_step).abs();
            if deviation > threshold {
                let direction = if *avg_step > median_step { "above" } else { "below" };
                push_flag(
                    &mut blocks[*idx],
                    Severity::Info,
                    FlagReason::CrossItemPriceStepOutlier,
                    json!({
                        "item_avg_step_cents": avg_step.round() as i64,
                        "category_median_step_cents": median_step.round() as i64,
                        "category_mad_step_cents": mad.round() as i64,
                        "deviation_cents": deviation.round() as i64,
                        "threshold_cents": threshold.round() as i64,
                        "direction": direction,
                    }),
                );
            }
        }
    }
}

/// Runs all 8 cross-item consistency checks in `spec.md` §4.11 order.
/// A no-op for fewer than two items.
pub fn check_cross_item_consistency(blocks: &mut [TextBlock], cfg: &CrossItemConfig) {
    if blocks.len() < 2 {
        return;
    }
    check_duplicate_names(blocks, cfg);
    check_category_price_outliers(blocks, cfg);
    check_category_isolation(blocks, cfg);
    check_category_suggestions(blocks, cfg);
    check_cross_category_coherence(blocks, cfg);
    check_variant_count_consistency(blocks, cfg);
    check_variant_label_consistency(blocks, cfg);
    check_variant_price_steps(blocks, cfg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BBox, Line, OcrVariant, TextBlock, Track};

    fn block(id: u64, name: &str, category: &str, price_cents: i64) -> TextBlock {
        let mut b = TextBlock::new(id, 0, 0, BBox::default(), vec![Line { text: name.into(), bbox: BBox::default(), words: vec![] }], name.into());
        b.category = Some(category.to_string());
        b.price_candidates.push(crate::types::PriceCandidate { text: String::new(), confidence: 1.0, price_cents: Some(price_cents) });
        b
    }

    #[test]
    fn fewer_than_two_items_is_noop() {
        let mut blocks = vec![block(0, "Pizza", "Pizza", 1000)];
        check_cross_item_consistency(&mut blocks, &CrossItemConfig::default());
        assert!(blocks[0].price_flags.is_empty());
    }

    #[test]
    fn exact_duplicate_names_flagged() {
        let mut blocks = vec![block(0, "Margherita Pizza", "Pizza", 1200), block(1, "Margherita Pizza", "Pizza", 1200), block(2, "Cola", "Beverages", 250)];
        check_cross_item_consistency(&mut blocks, &CrossItemConfig::default());
        assert!(blocks[0].price_flags.iter().any(|f| f.reason == FlagReason::CrossItemExactDuplicate));
        assert!(blocks[1].price_flags.iter().any(|f| f.reason == FlagReason::CrossItemExactDuplicate));
    }

    #[test]
    fn fuzzy_typo_duplicate_flagged() {
        let mut blocks = vec![
            block(0, "Buffalo Wings", "Wings", 899),
            block(1, "Bufalo Wings", "Wings", 999),
            block(2, "House Salad", "Salads", 650),
        ];
        check_cross_item_consistency(&mut blocks, &CrossItemConfig::default());
        assert!(blocks[0].price_flags.iter().any(|f| f.reason == FlagReason::CrossItemFuzzyDuplicate));
    }

    #[test]
    fn category_price_outlier_flagged() {
        let mut blocks = vec![block(0, "A", "Pizza", 1000), block(1, "B", "Pizza", 1050), block(2, "C", "Pizza", 1100), block(3, "D", "Pizza", 9000)];
        check_cross_item_consistency(&mut blocks, &CrossItemConfig::default());
        assert!(blocks[3].price_flags.iter().any(|f| f.reason == FlagReason::CrossItemCategoryPriceOutlier));
    }

    #[test]
    fn variant_count_outlier_flagged() {
        let cfg = CrossItemConfig::default();
        let mut blocks = vec![
            {
                let mut b = block(0, "A", "Pizza", 1000);
                b.variants = vec![
                    OcrVariant { label: "S".into(), price_cents: 900, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("S".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                    OcrVariant { label: "M".into(), price_cents: 1100, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("M".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                    OcrVariant { label: "L".into(), price_cents: 1300, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("L".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                ];
                b
            },
            {
                let mut b = block(1, "B", "Pizza", 1000);
                b.variants = vec![
                    OcrVariant { label: "S".into(), price_cents: 900, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("S".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                    OcrVariant { label: "M".into(), price_cents: 1100, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("M".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                    OcrVariant { label: "L".into(), price_cents: 1300, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("L".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                ];
                b
            },
            {
                let mut b = block(2, "C", "Pizza", 1000);
                b.variants = vec![
                    OcrVariant { label: "S".into(), price_cents: 900, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("S".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                    OcrVariant { label: "M".into(), price_cents: 1100, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("M".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                    OcrVariant { label: "L".into(), price_cents: 1300, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("L".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] },
                ];
                b
            },
            {
                let mut b = block(3, "D", "Pizza", 1000);
                b.variants = vec![OcrVariant { label: "S".into(), price_cents: 900, confidence: 0.8, kind: VariantKind::Size, normalized_size: Some("S".into()), track: None, ordinal: None, group_key: None, kind_hint: None, confidence_details: vec![] }];
                b
            },
        ];
        check_variant_count_consistency(&mut blocks, &cfg);
        assert!(blocks[3].price_flags.iter().any(|f| f.reason == FlagReason::CrossItemVariantCountOutlier));
    }

    fn size_variant(label: &str, price_cents: i64, normalized_size: &str, track: Track, ordinal: i64) -> OcrVariant {
        OcrVariant {
            label: label.into(),
            price_cents,
            confidence: 0.8,
            kind: VariantKind::Size,
            normalized_size: Some(normalized_size.into()),
            track: Some(track),
            ordinal: Some(ordinal),
            group_key: None,
            kind_hint: None,
            confidence_details: vec![],
        }
    }

    #[test]
    fn category_isolation_flags_lone_item_among_different_category_neighbors() {
        let cfg = CrossItemConfig::default();
        let mut blocks = vec![
            block(0, "Cheese Pizza", "Pizza", 1000),
            block(1, "Pepperoni Pizza", "Pizza", 1100),
            block(2, "House Salad", "Salads", 700),
            block(3, "Veggie Pizza", "Pizza", 1200),
            block(4, "Meat Lovers Pizza", "Pizza", 1300),
        ];
        check_category_isolation(&mut blocks, &cfg);
        assert!(blocks[2].price_flags.iter().any(|f| f.reason == FlagReason::CrossItemCategoryIsolated));
        let flag = blocks[2].price_flags.iter().find(|f| f.reason == FlagReason::CrossItemCategoryIsolated).unwrap();
        assert_eq!(flag.details["dominant_neighbor_category"], "Pizza");
    }

    #[test]
    fn category_isolation_is_noop_with_too_few_neighbors() {
        let cfg = CrossItemConfig::default();
        let mut blocks = vec![block(0, "House Salad", "Salads", 700), block(1, "Cheese Pizza", "Pizza", 1000)];
        check_category_isolation(&mut blocks, &cfg);
        assert!(blocks[0].price_flags.is_empty());
    }

    #[test]
    fn category_suggestion_flagged_when_neighbors_strongly_disagree() {
        let cfg = CrossItemConfig::default();
        let mut blocks = vec![
            block(0, "Cheese Pizza", "Pizza", 0),
            block(1, "Pepperoni Pizza", "Pizza", 0),
            block(2, "Veggie Pizza", "Beverages", 0),
            block(3, "Margherita Pizza", "Wings", 0),
            block(4, "Supreme Pizza", "Pizza", 0),
            block(5, "Meat Lovers Pizza", "Pizza", 0),
            block(6, "White Pizza", "Pizza", 0),
        ];
        check_category_suggestions(&mut blocks, &cfg);
        let flag = blocks[3].price_flags.iter().find(|f| f.reason == FlagReason::CrossItemCategorySuggestion);
        assert!(flag.is_some(), "expected a category suggestion flag on index 3");
        let flag = flag.unwrap();
        assert_eq!(flag.details["suggested_category"], "Pizza");
        assert_eq!(flag.details["current_category"], "Wings");
    }

    #[test]
    fn category_suggestion_is_noop_when_current_category_already_dominant() {
        let cfg = CrossItemConfig::default();
        let mut blocks = vec![
            block(0, "Cheese Pizza", "Pizza", 0),
            block(1, "Pepperoni Pizza", "Pizza", 0),
            block(2, "Veggie Pizza", "Pizza", 0),
            block(3, "Margherita Pizza", "Pizza", 0),
        ];
        check_category_suggestions(&mut blocks, &cfg);
        assert!(blocks[3].price_flags.is_empty());
    }

    #[test]
    fn cross_category_coherence_flags_expensive_side_item() {
        let cfg = CrossItemConfig::default();
        let mut blocks = vec![
            block(0, "Side A", "Sides / Appetizers", 499),
            block(1, "Side B", "Sides / Appetizers", 599),
            block(2, "Side C", "Sides / Appetizers", 699),
            block(3, "Truffle Fries", "Sides / Appetizers", 1999),
            block(4, "Pizza A", "Pizza", 1299),
            block(5, "Pizza B", "Pizza", 1399),
            block(6, "Pizza C", "Pizza", 1499),
        ];
        check_cross_category_coherence(&mut blocks, &cfg);
        let flag = blocks[3].price_flags.iter().find(|f| f.reason == FlagReason::CrossCategoryPriceAbove);
        assert!(flag.is_some(), "expected truffle fries to be flagged above the Pizza median");
        let flag = flag.unwrap();
        assert_eq!(flag.details["compared_category"], "Pizza");
        assert_eq!(flag.details["compared_median_cents"], 1399);
        for idx in [0, 1, 2] {
            assert!(blocks[idx].price_flags.iter().all(|f| f.reason != FlagReason::CrossCategoryPriceAbove));
        }
    }

    #[test]
    fn variant_label_mismatch_flagged_against_dominant_label_set() {
        let cfg = CrossItemConfig::default();
        let mut blocks = vec![
            {
                let mut b = block(0, "A", "Pizza", 0);
                b.variants = vec![
                    size_variant("S", 900, "S", Track::Word, 2),
                    size_variant("M", 1200, "M", Track::Word, 5),
                    size_variant("L", 1500, "L", Track::Word, 6),
                ];
                b
            },
            {
                let mut b = block(1, "B", "Pizza", 0);
                b.variants = vec![
                    size_variant("S", 900, "S", Track::Word, 2),
                    size_variant("M", 1200, "M", Track::Word, 5),
                    size_variant("L", 1500, "L", Track::Word, 6),
                ];
                b
            },
            {
                let mut b = block(2, "C", "Pizza", 0);
                b.variants = vec![
                    size_variant("S", 900, "S", Track::Word, 2),
                    size_variant("M", 1200, "M", Track::Word, 5),
                    size_variant("L", 1500, "L", Track::Word, 6),
                ];
                b
            },
            {
                let mut b = block(3, "D", "Pizza", 0);
                b.variants = vec![size_variant("S", 900, "S", Track::Word, 2), size_variant("XL", 1800, "XL", Track::Word, 8)];
                b
            },
        ];
        check_variant_label_consistency(&mut blocks, &cfg);
        assert!(blocks[3].price_flags.iter().any(|f| f.reason == FlagReason::CrossItemVariantLabelMismatch));
        for idx in [0, 1, 2] {
            assert!(blocks[idx].price_flags.iter().all(|f| f.reason != FlagReason::CrossItemVariantLabelMismatch));
        }
    }

    #[test]
    fn variant_price_step_outlier_flagged() {
        let cfg = CrossItemConfig::default();
        let mut blocks = vec![
            {
                let mut b = block(0, "A", "Pizza", 0);
                b.variants = vec![size_variant("S", 800, "S", Track::Word, 2), size_variant("M", 1000, "M", Track::Word, 5)];
                b
            },
            {
                let mut b = block(1, "B", "Pizza", 0);
                b.variants = vec![size_variant("S", 800, "S", Track::Word, 2), size_variant("M", 1000, "M", Track::Word, 5)];
                b
            },
            {
                let mut b = block(2, "C", "Pizza", 0);
                b.variants = vec![size_variant("S", 800, "S", Track::Word, 2), size_variant("M", 1000, "M", Track::Word, 5)];
                b
            },
            {
                let mut b = block(3, "D", "Pizza", 0);
                b.variants = vec![size_variant("S", 800, "S", Track::Word, 2), size_variant("M", 2000, "M", Track::Word, 5)];
                b
            },
        ];
        check_variant_price_steps(&mut blocks, &cfg);
        let flag = blocks[3].price_flags.iter().find(|f| f.reason == FlagReason::CrossItemPriceStepOutlier);
        assert!(flag.is_some(), "expected item D's 1200-cent step to be flagged against the 200-cent median");
        assert_eq!(flag.unwrap().details["direction"], "above");
        for idx in [0, 1, 2] {
            assert!(blocks[idx].price_flags.iter().all(|f| f.reason != FlagReason::CrossItemPriceStepOutlier));
        }
    }
}
