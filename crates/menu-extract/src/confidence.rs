//! Semantic confidence aggregation (`spec.md` §4.12): folds name clarity,
//! category confidence, variant confidence, and price sanity into a single
//! 0-100 score per item, penalised by every active price flag.
//!
//! Grounded on `original_source/storage/scoring/confidence.py`'s blended
//! entry point; weights per `spec.md` §4.12 are not individually numbered in
//! the source, so the split is carried over as a config record (see
//! `DESIGN.md`).

use crate::config::ConfidenceStageConfig;
use crate::types::{LineType, Severity, TextBlock};
use crate::vocab::category::CATEGORY_PRICE_BANDS;

/// Clarity of the item's name from its grammar line-type and token count.
fn name_clarity(block: &TextBlock, cfg: &ConfidenceStageConfig) -> (f64, String) {
    let line_type = block.grammar.as_ref().and_then(|g| g.line_type);
    let base = match line_type {
        Some(LineType::MenuItem) => 1.0,
        Some(LineType::Heading) => 0.5,
        Some(LineType::ToppingList) | Some(LineType::InfoLine) => 0.7,
        Some(LineType::ModifierLine) | Some(LineType::DescriptionOnly) => 0.6,
        Some(LineType::SizeHeader) | Some(LineType::PriceOnly) | Some(LineType::MultiColumn) => 0.4,
        Some(LineType::Unknown) | None => 0.3,
    };

    let name = block.display_name();
    let token_count = name.split_whitespace().count();
    let length_factor = if token_count == 0 {
        0.0
    } else if token_count >= cfg.name_clarity_ideal_min_tokens && token_count <= cfg.name_clarity_ideal_max_tokens {
        1.0
    } else if token_count < cfg.name_clarity_ideal_min_tokens {
        0.5
    } else {
        // Long names still carry signal, just less of it; decays gently past
        // the ideal window rather than dropping to zero.
        (cfg.name_clarity_ideal_max_tokens as f64 / token_count as f64).max(0.4)
    };

    let score = (base * length_factor).clamp(0.0, 1.0);
    (score, format!("name_clarity={score:.2} (line_type={line_type:?}, tokens={token_count})"))
}

fn category_component(block: &TextBlock) -> (f64, String) {
    let conf = block.category_confidence.unwrap_or(0).clamp(0, 100) as f64 / 100.0;
    (conf, format!("category_confidence={conf:.2} ({:?})", block.category))
}

fn variant_component(block: &TextBlock) -> Option<(f64, String)> {
    if block.variants.is_empty() {
        return None;
    }
    let mean = block.variants.iter().map(|v| v.confidence).sum::<f64>() / block.variants.len() as f64;
    Some((mean.clamp(0.0, 1.0), format!("variant_confidence={mean:.2} (n={})", block.variants.len())))
}

/// How centred a price is within its category's expected band, `0` if the
/// price is missing or the category has no band on file.
fn price_sanity(block: &TextBlock) -> (f64, String) {
    let Some(price_cents) = block.primary_price_cents() else {
        return (0.0, "price_sanity=0.00 (no price)".to_string());
    };
    let Some(category) = block.category.as_deref() else {
        return (0.0, "price_sanity=0.00 (no category)".to_string());
    };
    let Some(&(lo, hi)) = CATEGORY_PRICE_BANDS.get(category) else {
        return (0.0, format!("price_sanity=0.00 (no band for {category})"));
    };

    let center = (lo + hi) as f64 / 2.0;
    let half_width = ((hi - lo) as f64 / 2.0).max(1.0);
    let distance = (price_cents as f64 - center).abs();
    let score = (1.0 - distance / half_width).clamp(0.0, 1.0);
    (score, format!("price_sanity={score:.2} (price={price_cents}, band=[{lo},{hi}])"))
}

fn flag_penalty(block: &TextBlock, cfg: &ConfidenceStageConfig) -> (f64, Vec<String>) {
    let mut total = 0.0;
    let mut details = Vec::new();
    for flag in &block.price_flags {
        let weight = match flag.severity {
            Severity::Info => cfg.penalty_info,
            Severity::Warn => cfg.penalty_warn,
            Severity::AutoFix => cfg.penalty_auto_fix,
        };
        total += weight;
        details.push(format!("-{weight:.1} for {:?} ({:?})", flag.reason, flag.severity));
    }
    (total, details)
}

/// Scores every block's `semantic_confidence` from its already-populated
/// grammar, category, variant, and price-flag fields (`spec.md` §4.12). Must
/// run after category inference, the variant engine, and price integrity.
pub fn score_confidence(blocks: &mut [TextBlock], cfg: &ConfidenceStageConfig) {
    for block in blocks.iter_mut() {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut details = Vec::new();

        let (name_score, name_detail) = name_clarity(block, cfg);
        weighted_sum += cfg.weight_name_clarity * name_score;
        weight_total += cfg.weight_name_clarity;
        details.push(name_detail);

        let (category_score, category_detail) = category_component(block);
        weighted_sum += cfg.weight_category * category_score;
        weight_total += cfg.weight_category;
        details.push(category_detail);

        if let Some((variant_score, variant_detail)) = variant_component(block) {
            weighted_sum += cfg.weight_variant * variant_score;
            weight_total += cfg.weight_variant;
            details.push(variant_detail);
        }

        let (price_score, price_detail) = price_sanity(block);
        weighted_sum += cfg.weight_price_sanity * price_score;
        weight_total += cfg.weight_price_sanity;
        details.push(price_detail);

        let base_score = if weight_total > 0.0 { (weighted_sum / weight_total) * 100.0 } else { 0.0 };

        let (penalty, penalty_details) = flag_penalty(block, cfg);
        details.extend(penalty_details);

        let final_score = (base_score - penalty).clamp(0.0, 100.0).round() as i64;
        details.push(format!("final={final_score} (base={base_score:.1}, penalty={penalty:.1})"));

        block.semantic_confidence = Some(final_score);
        block.semantic_confidence_details = details;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BBox, FlagReason, OcrVariant, ParsedMenuItem, PriceCandidate, PriceFlag, Track, VariantKind};

    fn clean_item(name: &str, category: &str, category_confidence: i64, price_cents: i64) -> TextBlock {
        let mut tb = TextBlock::new(1, 0, 0, BBox::default(), vec![], name.to_string());
        tb.grammar = Some(ParsedMenuItem {
            item_name: Some(name.to_string()),
            line_type: Some(LineType::MenuItem),
            confidence: 0.9,
            ..Default::default()
        });
        tb.category = Some(category.to_string());
        tb.category_confidence = Some(category_confidence);
        tb.price_candidates.push(PriceCandidate { text: String::new(), confidence: 0.9, price_cents: Some(price_cents) });
        tb
    }

    #[test]
    fn clean_well_centred_item_scores_high() {
        let cfg = ConfidenceStageConfig::default();
        let mut blocks = vec![clean_item("Cheese Pizza", "Pizza", 95, 2399)];
        score_confidence(&mut blocks, &cfg);
        let score = blocks[0].semantic_confidence.unwrap();
        assert!(score >= 70, "expected a high score, got {score}");
    }

    #[test]
    fn missing_price_scores_lower_than_priced_twin() {
        let cfg = ConfidenceStageConfig::default();
        let mut with_price = vec![clean_item("Cheese Pizza", "Pizza", 95, 2399)];
        let mut without_price = vec![clean_item("Cheese Pizza", "Pizza", 95, 2399)];
        without_price[0].price_candidates.clear();
        score_confidence(&mut with_price, &cfg);
        score_confidence(&mut without_price, &cfg);
        assert!(without_price[0].semantic_confidence.unwrap() < with_price[0].semantic_confidence.unwrap());
    }

    #[test]
    fn price_flags_reduce_score() {
        let cfg = ConfidenceStageConfig::default();
        let mut flagged = vec![clean_item("Cheese Pizza", "Pizza", 95, 2399)];
        flagged[0].price_flags.push(PriceFlag {
            severity: Severity::Warn,
            reason: FlagReason::PriceOutlier,
            details: serde_json::json!({}),
            corrected_price_cents: None,
        });
        let mut clean = vec![clean_item("Cheese Pizza", "Pizza", 95, 2399)];
        score_confidence(&mut flagged, &cfg);
        score_confidence(&mut clean, &cfg);
        assert!(flagged[0].semantic_confidence.unwrap() < clean[0].semantic_confidence.unwrap());
    }

    #[test]
    fn variant_confidence_folds_into_score() {
        let cfg = ConfidenceStageConfig::default();
        let mut blocks = vec![clean_item("Cheese Pizza", "Pizza", 95, 2399)];
        blocks[0].variants.push(OcrVariant {
            label: "S".into(),
            price_cents: 2399,
            confidence: 0.9,
            kind: VariantKind::Size,
            normalized_size: Some("S".into()),
            track: Some(Track::Word),
            ordinal: Some(2),
            group_key: Some("size:S".into()),
            kind_hint: None,
            confidence_details: vec![],
        });
        score_confidence(&mut blocks, &cfg);
        assert!(blocks[0].semantic_confidence.unwrap() > 0);
        assert!(blocks[0].semantic_confidence_details.iter().any(|d| d.starts_with("variant_confidence")));
    }

    #[test]
    fn unknown_line_type_and_no_name_scores_near_zero_name_clarity() {
        let cfg = ConfidenceStageConfig::default();
        let mut tb = TextBlock::new(1, 0, 0, BBox::default(), vec![], "".to_string());
        tb.category = Some("Uncategorized".to_string());
        let mut blocks = vec![tb];
        score_confidence(&mut blocks, &cfg);
        assert!(blocks[0].semantic_confidence.unwrap() < 30);
    }
}
