//! Cross-item price-integrity pass (SPEC_FULL §2): groups items sharing a
//! category and size/variant family, computes group price statistics from
//! primary-role items, and flags zero prices, side/coupon lines, and
//! statistical outliers (with a decimal-shift auto-fix where one fits).
//!
//! Grounded on `original_source/storage/price_integrity.py`.

use std::collections::HashMap;

use serde_json::json;

use crate::config::PriceIntegrityConfig;
use crate::types::{FlagReason, PriceFlag, PriceRole, Severity, TextBlock, VariantKind};

fn extract_family_key(block: &TextBlock) -> String {
    if let Some(key) = block.variants.iter().find(|v| v.kind == VariantKind::Size).and_then(|v| v.group_key.clone()) {
        return key;
    }
    if let Some(key) = block.variants.iter().find_map(|v| v.group_key.clone()) {
        return key;
    }
    "none".to_string()
}

/// Classifies an item's price role from its text length and category
/// membership (`price_integrity.py::_is_side_price_item` /
/// `_is_coupon_or_deal_item`). Side lines are short and mention a topping or
/// side-adjacent category; coupon/deal lines are long and mention a deal
/// phrase.
fn classify_role(block: &TextBlock, cfg: &PriceIntegrityConfig) -> PriceRole {
    let text = block.merged_text.to_lowercase();
    let len = block.merged_text.chars().count();
    let category = block.category.as_deref().unwrap_or("").to_lowercase();

    if len <= 64 && (cfg.side_categories.iter().any(|c| c == &category) || cfg.side_hints.iter().any(|h| text.contains(h.as_str()))) {
        return PriceRole::Side;
    }
    if len > 80 && cfg.coupon_hints.iter().any(|h| text.contains(h.as_str())) {
        return PriceRole::Coupon;
    }
    PriceRole::Primary
}

fn median_of(sorted: &[i64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    }
}

/// Tukey's hinges: median of the lower and upper halves (excluding the
/// middle element on an odd-length input), matching
/// `price_integrity.py::_analyze_group`'s use of `statistics.median`.
fn quartiles(sorted: &[i64]) -> (f64, f64) {
    let n = sorted.len();
    let mid = n / 2;
    let (lower, upper) = if n % 2 == 0 { (&sorted[..mid], &sorted[mid..]) } else { (&sorted[..mid], &sorted[mid + 1..]) };
    (median_of(lower), median_of(upper))
}

fn deviation_ratio(price_cents: i64, median_cents: i64) -> f64 {
    (price_cents - median_cents).abs() as f64 / median_cents.max(1) as f64
}

/// Looks for a divisor (10/100/1000) that brings `price_cents` into a
/// plausible range and substantially closer to `median_cents` than the raw
/// price is, suggesting an OCR decimal-shift error
/// (`price_integrity.py::_suggest_decimal_correction`).
fn suggest_decimal_correction(price_cents: i64, median_cents: i64, cfg: &PriceIntegrityConfig) -> Option<i64> {
    let original_ratio = deviation_ratio(price_cents, median_cents);
    let mut best: Option<(i64, f64)> = None;
    for &divisor in &cfg.decimal_divisors {
        if divisor <= 0 {
            continue;
        }
        let candidate = price_cents / divisor;
        if candidate <= cfg.min_valid_price_cents || candidate >= cfg.max_valid_price_cents {
            continue;
        }
        let ratio = deviation_ratio(candidate, median_cents);
        if best.map(|(_, best_ratio)| ratio < best_ratio).unwrap_or(true) {
            best = Some((candidate, ratio));
        }
    }
    let (candidate, best_ratio) = best?;
    (original_ratio > cfg.substantially_closer_ratio * best_ratio).then_some(candidate)
}

/// Runs the full price-integrity pass over every item on a page: role
/// classification, group median/IQR, and zero-price/side/coupon/outlier
/// flagging (`spec.md` SPEC_FULL §2).
pub fn apply_price_integrity(blocks: &mut [TextBlock], cfg: &PriceIntegrityConfig) {
    let snapshots: Vec<(usize, String, String, i64, PriceRole)> = blocks
        .iter()
        .enumerate()
        .filter_map(|(i, b)| {
            let price_cents = b.primary_price_cents()?;
            let category = b.category.clone().unwrap_or_else(|| "uncategorized".to_string());
            let family_key = extract_family_key(b);
            let role = classify_role(b, cfg);
            Some((i, category, family_key, price_cents, role))
        })
        .collect();

    let by_idx: HashMap<usize, (i64, PriceRole)> = snapshots.iter().map(|(i, _, _, p, r)| (*i, (*p, *r))).collect();

    let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (i, category, family_key, _, _) in &snapshots {
        groups.entry((category.clone(), family_key.clone())).or_default().push(*i);
    }

    for (_, idxs) in groups {
        let primaries: Vec<i64> = idxs
            .iter()
            .filter_map(|i| {
                let (price, role) = by_idx[i];
                (role == PriceRole::Primary && price > 0).then_some(price)
            })
            .collect();
        let basis: Vec<i64> = if !primaries.is_empty() {
            primaries
        } else {
            idxs.iter().filter_map(|i| { let (price, _) = by_idx[i]; (price > 0).then_some(price) }).collect()
        };

        let stats = if basis.len() >= cfg.min_group_size {
            let mut sorted = basis.clone();
            sorted.sort_unstable();
            let median_cents = median_of(&sorted).round() as i64;
            let (q1, q3) = quartiles(&sorted);
            let iqr_cents = (q3 - q1).max(1.0).round() as i64;
            Some((median_cents, iqr_cents))
        } else {
            None
        };

        for &i in &idxs {
            let (price_cents, role) = by_idx[&i];
            let block = &mut blocks[i];
            block.price_role = Some(role);

            if let Some((median_cents, iqr_cents)) = stats {
                block.price_meta.group_median_cents = Some(median_cents);
                block.price_meta.group_iqr_cents = Some(iqr_cents);
            }

            if price_cents <= 0 {
                block.price_flags.push(PriceFlag {
                    severity: Severity::Warn,
                    reason: FlagReason::ZeroPriceInGroup,
                    details: json!({"category": block.category.clone()}),
                    corrected_price_cents: None,
                });
            }

            match role {
                PriceRole::Side => block.price_flags.push(PriceFlag {
                    severity: Severity::Info,
                    reason: FlagReason::SidePriceCandidate,
                    details: json!({"price_cents": price_cents}),
                    corrected_price_cents: None,
                }),
                PriceRole::Coupon => block.price_flags.push(PriceFlag {
                    severity: Severity::Info,
                    reason: FlagReason::CouponOrDealLine,
                    details: json!({"price_cents": price_cents}),
                    corrected_price_cents: None,
                }),
                PriceRole::Primary => {}
            }

            if let Some((median_cents, iqr_cents)) = stats {
                if role == PriceRole::Primary && price_cents > 0 {
                    let z_iqr = (price_cents - median_cents).abs() as f64 / iqr_cents.max(1) as f64;
                    if z_iqr > cfg.z_iqr_threshold {
                        if let Some(corrected) = suggest_decimal_correction(price_cents, median_cents, cfg) {
                            block.price_flags.push(PriceFlag {
                                severity: Severity::AutoFix,
                                reason: FlagReason::DecimalShiftCorrected,
                                details: json!({
                                    "original_price_cents": price_cents,
                                    "group_median_cents": median_cents,
                                }),
                                corrected_price_cents: Some(corrected),
                            });
                        } else {
                            block.price_flags.push(PriceFlag {
                                severity: Severity::Warn,
                                reason: FlagReason::PriceOutlier,
                                details: json!({
                                    "price_cents": price_cents,
                                    "group_median_cents": median_cents,
                                    "group_iqr_cents": iqr_cents,
                                    "z_iqr": z_iqr,
                                }),
                                corrected_price_cents: None,
                            });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BBox, PriceCandidate};

    fn priced_block(id: u64, category: &str, text: &str, price_cents: i64) -> TextBlock {
        let mut tb = TextBlock::new(id, 0, 0, BBox::default(), vec![], text.to_string());
        tb.category = Some(category.to_string());
        tb.price_candidates.push(PriceCandidate { text: String::new(), confidence: 0.9, price_cents: Some(price_cents) });
        tb
    }

    #[test]
    fn zero_price_flagged() {
        let cfg = PriceIntegrityConfig::default();
        let mut blocks = vec![priced_block(1, "pizza", "Cheese Pizza", 0)];
        apply_price_integrity(&mut blocks, &cfg);
        assert!(blocks[0].price_flags.iter().any(|f| f.reason == FlagReason::ZeroPriceInGroup));
    }

    #[test]
    fn short_topping_line_classified_as_side() {
        let cfg = PriceIntegrityConfig::default();
        let mut blocks = vec![priced_block(1, "toppings", "Extra cheese", 150)];
        apply_price_integrity(&mut blocks, &cfg);
        assert_eq!(blocks[0].price_role, Some(PriceRole::Side));
        assert!(blocks[0].price_flags.iter().any(|f| f.reason == FlagReason::SidePriceCandidate));
    }

    #[test]
    fn long_deal_line_classified_as_coupon() {
        let cfg = PriceIntegrityConfig::default();
        let text = "Buy one large pizza and get a second one of equal or lesser value for only half price, dine in or carry out";
        let mut blocks = vec![priced_block(1, "specials", text, 999)];
        apply_price_integrity(&mut blocks, &cfg);
        assert_eq!(blocks[0].price_role, Some(PriceRole::Coupon));
        assert!(blocks[0].price_flags.iter().any(|f| f.reason == FlagReason::CouponOrDealLine));
    }

    /// Six reasonably-priced pizzas plus one outlier, so the quartile split
    /// doesn't fold the outlier itself into its own IQR bracket (a group of
    /// 3-4 lets a single extreme value dominate the quartile it falls in and
    /// mask itself as "normal").
    fn six_normal_pizzas() -> Vec<TextBlock> {
        vec![
            priced_block(1, "pizza", "Cheese Pizza", 899),
            priced_block(2, "pizza", "Pepperoni Pizza", 999),
            priced_block(3, "pizza", "Sausage Pizza", 1099),
            priced_block(4, "pizza", "Mushroom Pizza", 1199),
            priced_block(5, "pizza", "Supreme Pizza", 1299),
            priced_block(6, "pizza", "Meat Lovers Pizza", 1399),
        ]
    }

    #[test]
    fn decimal_shift_outlier_is_corrected() {
        let cfg = PriceIntegrityConfig::default();
        let mut blocks = six_normal_pizzas();
        blocks.push(priced_block(7, "pizza", "Veggie Pizza", 109_900));
        apply_price_integrity(&mut blocks, &cfg);
        let fixed = blocks[6].price_flags.iter().find(|f| f.reason == FlagReason::DecimalShiftCorrected);
        assert!(fixed.is_some(), "expected a decimal-shift correction, got {:?}", blocks[6].price_flags);
        assert_eq!(fixed.unwrap().corrected_price_cents, Some(1099));
    }

    #[test]
    fn uncorrectable_outlier_falls_back_to_price_outlier_flag() {
        let cfg = PriceIntegrityConfig::default();
        let mut blocks = six_normal_pizzas();
        blocks.push(priced_block(7, "pizza", "Garbled Pizza", 987_654_321));
        apply_price_integrity(&mut blocks, &cfg);
        assert!(blocks[6].price_flags.iter().any(|f| f.reason == FlagReason::PriceOutlier));
    }
}
