//! Variant & size intelligence (`spec.md` §4.10): size-grid parsing and
//! mapping, backward-token-walk labelling, variant enrichment, price
//! monotonicity validation, and per-item variant consistency checks.
//!
//! Grounded on `original_source/storage/variant_engine.py` for the
//! enrichment rules (kind inference, `normalized_size`, `group_key`); the
//! size-grid mapping and backward-token-walk are not present in the
//! retrieved Python source and are built directly from `spec.md` §4.10.

pub mod price_integrity;

use std::sync::LazyLock;

use ahash::AHashSet;
use regex::Regex;
use serde_json::json;

use crate::config::VariantStageConfig;
use crate::grammar::normalize_typos;
use crate::types::{FlagReason, LineType, OcrVariant, PriceFlag, Severity, SizeGridColumn, SizeGridContext, Track, TextBlock, VariantKind};
use crate::vocab::combo::match_combo_phrase;
use crate::vocab::size::normalize_size_token;

// ---------------------------------------------------------------------
// Size-grid header parsing
// ---------------------------------------------------------------------

static BARE_NUMERIC_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)^\d{1,2}(?:"|in|pc|pcs)?$"#).unwrap());

/// Whether `next` should be greedily coalesced onto `tok` as a single column
/// label (`spec.md` §4.10 "greedy coalescing").
fn should_merge_with_next(tok: &str, next: &str) -> bool {
    if next.eq_ignore_ascii_case("size") {
        return true;
    }
    BARE_NUMERIC_UNIT_RE.is_match(tok)
}

/// Parses a `size_header` line's text into column labels, greedily coalescing
/// a bare numeric/unit token (`12"`) with its following qualifier (`Sml`),
/// and a bare size noun (`Family`) with a trailing `Size` (`spec.md` §4.10).
pub fn parse_header_columns(text: &str) -> Vec<SizeGridColumn> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut columns = Vec::new();
    let mut i = 0;
    let mut position = 0;
    while i < tokens.len() {
        let label = if i + 1 < tokens.len() && should_merge_with_next(tokens[i], tokens[i + 1]) {
            let combined = format!("{} {}", tokens[i], tokens[i + 1]);
            i += 2;
            combined
        } else {
            let tok = tokens[i].to_string();
            i += 1;
            tok
        };
        let normalized = normalize_size_token(&label).map(|t| t.normalized).unwrap_or_else(|| label.clone());
        columns.push(SizeGridColumn { raw_label: label, normalized, position });
        position += 1;
    }
    columns
}

pub fn parse_size_grid(text: &str, source_line_index: usize) -> SizeGridContext {
    SizeGridContext { columns: parse_header_columns(text), source_line_index }
}

// ---------------------------------------------------------------------
// Grid-to-variant mapping
// ---------------------------------------------------------------------

/// Maps `n` grid columns onto `m` item prices (`spec.md` §4.10
/// "Grid-to-variant mapping"). Returns `None` when `m > n` (grid does not
/// apply; caller should fall back to the backward-token-walk).
fn map_grid_to_prices(grid: &SizeGridContext, prices: &[i64], cfg: &VariantStageConfig) -> Option<Vec<OcrVariant>> {
    let n = grid.columns.len();
    let m = prices.len();
    if m == 0 || m > n {
        return None;
    }
    let (columns, confidence) = if m == n {
        (&grid.columns[..], cfg.grid_full_match_confidence)
    } else {
        (&grid.columns[n - m..], cfg.grid_right_align_confidence)
    };

    Some(
        columns
            .iter()
            .zip(prices.iter())
            .map(|(col, &price_cents)| {
                let (kind, normalized_size) = classify_kind_and_size(&col.raw_label);
                let group_key = build_group_key(kind, &col.raw_label, normalized_size.as_deref());
                let size = normalize_size_token(&col.raw_label);
                OcrVariant {
                    label: col.raw_label.clone(),
                    price_cents,
                    confidence,
                    kind,
                    normalized_size,
                    track: size.as_ref().map(|s| s.track),
                    ordinal: size.as_ref().map(|s| s.ordinal),
                    group_key,
                    kind_hint: None,
                    confidence_details: vec![format!("grid origin, base confidence {confidence:.2}")],
                }
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------
// Backward-token-walk (no active grid, or grid overflow)
// ---------------------------------------------------------------------

static CONNECTORS: &[&str] = &["and", "or", "&", "+", "w/", "with", "for"];

fn is_connector(token: &str) -> bool {
    CONNECTORS.contains(&token.to_lowercase().as_str())
}

/// Looks backward from a price's position for up to 2 non-connector tokens
/// to form a label (`spec.md` §4.10 "Backward-token-walk").
fn backward_label(prefix: &str) -> Option<String> {
    let tokens: Vec<&str> = prefix.split_whitespace().collect();
    let mut collected: Vec<&str> = Vec::new();
    let mut i = tokens.len();
    while i > 0 && collected.len() < 2 {
        i -= 1;
        if is_connector(tokens[i]) {
            continue;
        }
        collected.push(tokens[i]);
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    Some(collected.join(" "))
}

fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds one variant for a price mention via the backward-token-walk,
/// detecting `w/<FOOD>` / `with <FOOD>` combo phrases first.
fn backward_walk_variant(prefix: &str, price_cents: i64) -> OcrVariant {
    let tail_tokens: Vec<&str> = prefix.split_whitespace().collect();
    let window_start = tail_tokens.len().saturating_sub(4);
    let window = normalize_typos(&tail_tokens[window_start..].join(" "));

    if let Some(food) = match_combo_phrase(&window) {
        let label = format!("W/{}", title_case(&food));
        return OcrVariant {
            label,
            price_cents,
            confidence: 0.0, // filled in by caller via score_variant
            kind: VariantKind::Combo,
            normalized_size: None,
            track: None,
            ordinal: None,
            group_key: Some(format!("combo:{}", food)),
            kind_hint: Some("combo".to_string()),
            confidence_details: vec!["backward-token-walk combo match".to_string()],
        };
    }

    let label = backward_label(prefix).unwrap_or_default();
    let (kind, normalized_size) = classify_kind_and_size(&label);
    let group_key = build_group_key(kind, &label, normalized_size.as_deref());
    let size = normalize_size_token(&label);
    OcrVariant {
        label,
        price_cents,
        confidence: 0.0,
        kind,
        normalized_size,
        track: size.as_ref().map(|s| s.track),
        ordinal: size.as_ref().map(|s| s.ordinal),
        group_key,
        kind_hint: None,
        confidence_details: vec!["backward-token-walk".to_string()],
    }
}

// ---------------------------------------------------------------------
// Variant enrichment: kind, normalized_size, group_key
// ---------------------------------------------------------------------

static STYLE_TOKENS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    AHashSet::from_iter([
        "bone-in", "bone in", "boneless", "thin", "thin crust", "thick", "deep dish", "stuffed crust", "white",
        "red", "red sauce", "alfredo", "pesto",
    ])
});

static FLAVOR_TOKENS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    AHashSet::from_iter([
        "hot", "mild", "medium", "honey", "bbq", "barbecue", "honey bbq", "garlic", "parm", "parmesan",
        "garlic parm", "teriyaki", "buffalo", "spicy", "sweet", "sour", "honey mustard", "lemon", "pepper",
        "lemon pepper",
    ])
});

/// Classifies a variant label's kind and, for sizes, its canonical size
/// string (`spec.md` §4.10 "Variant enrichment"), grounded on
/// `variant_engine.py::_infer_variant_kind_and_normalized_size` (style wins
/// over flavor on overlap).
pub fn classify_kind_and_size(label: &str) -> (VariantKind, Option<String>) {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return (VariantKind::Other, None);
    }
    if let Some(size) = normalize_size_token(trimmed) {
        return (VariantKind::Size, Some(size.normalized));
    }
    let low = trimmed.to_lowercase();
    if STYLE_TOKENS.iter().any(|t| low.contains(t)) {
        return (VariantKind::Style, None);
    }
    if FLAVOR_TOKENS.iter().any(|t| low.contains(t)) {
        return (VariantKind::Flavor, None);
    }
    (VariantKind::Other, None)
}

/// Builds a stable clustering key for a variant (`spec.md` §4.10), grounded
/// on `variant_engine.py::_build_group_key`.
pub fn build_group_key(kind: VariantKind, label: &str, normalized_size: Option<&str>) -> Option<String> {
    match kind {
        VariantKind::Size => normalized_size.map(|s| format!("size:{s}")),
        VariantKind::Flavor => Some(format!("flavor:{}", label.trim().to_lowercase())),
        VariantKind::Style => Some(format!("style:{}", label.trim().to_lowercase())),
        VariantKind::Combo | VariantKind::Other => None,
    }
}

// ---------------------------------------------------------------------
// Per-variant confidence scoring
// ---------------------------------------------------------------------

fn kind_base_confidence(kind: VariantKind, label_empty: bool) -> f64 {
    if label_empty {
        return 0.50;
    }
    match kind {
        VariantKind::Size => 0.90,
        VariantKind::Combo => 0.85,
        VariantKind::Flavor | VariantKind::Style => 0.80,
        VariantKind::Other => 0.60,
    }
}

/// Scores a single variant from its kind, grammar context, and grid origin,
/// recording the audit trail (`spec.md` §4.10 "Per-variant confidence").
/// Flag-participation penalties are applied afterwards by
/// [`apply_flag_penalties`] once the flags for the whole item are known.
fn score_variant(variant: &mut OcrVariant, grammar_confidence: Option<f64>, grid_applied: bool, cfg: &VariantStageConfig) {
    let mut score = kind_base_confidence(variant.kind, variant.label.trim().is_empty());
    let mut details = vec![format!("base({:?}) = {:.2}", variant.kind, score)];

    if let Some(gc) = grammar_confidence {
        if gc >= cfg.grammar_high_confidence_floor {
            score += cfg.grammar_context_bonus;
            details.push(format!("+{:.2} high grammar confidence", cfg.grammar_context_bonus));
        } else if gc < cfg.grammar_low_confidence_ceiling {
            score -= cfg.grammar_context_penalty;
            details.push(format!("-{:.2} low grammar confidence", cfg.grammar_context_penalty));
        }
    }
    if grid_applied {
        score += cfg.grid_origin_bonus;
        details.push(format!("+{:.2} grid origin", cfg.grid_origin_bonus));
    }

    variant.confidence = score.clamp(0.0, 1.0);
    variant.confidence_details = details;
}

/// Applies the per-flag confidence penalties to the variants that
/// participated in each flag (`spec.md` §4.10).
fn apply_flag_penalties(variants: &mut [OcrVariant], flags: &[PriceFlag], cfg: &VariantStageConfig) {
    for flag in flags {
        let penalty = match flag.reason {
            FlagReason::VariantPriceInversion => cfg.penalty_inversion,
            FlagReason::DuplicateGroupKey => cfg.penalty_duplicate_group,
            FlagReason::ZeroPriceVariant => cfg.penalty_zero_price,
            FlagReason::MixedKindVariants => cfg.penalty_mixed_kind,
            FlagReason::SizeGap => cfg.penalty_size_gap,
            _ => continue,
        };
        let involved_labels = flag_involved_labels(flag);
        for v in variants.iter_mut() {
            let applies = match flag.reason {
                FlagReason::MixedKindVariants => true,
                FlagReason::ZeroPriceVariant => v.price_cents <= 0,
                FlagReason::SizeGap => v.kind == VariantKind::Size,
                _ => involved_labels.contains(&v.label),
            };
            if applies {
                v.confidence = (v.confidence - penalty).clamp(0.0, 1.0);
                v.confidence_details.push(format!("-{penalty:.2} {:?}", flag.reason));
            }
        }
    }
}

fn flag_involved_labels(flag: &PriceFlag) -> Vec<String> {
    flag.details
        .get("labels")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|x| x.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------
// Price monotonicity validation
// ---------------------------------------------------------------------

/// Validates strictly-ordinal pairs within each size track
/// (`spec.md` §4.10 "Price validation"). Returns the inversion flag if any
/// pair violates monotonicity.
fn check_price_inversions(variants: &[OcrVariant]) -> Option<PriceFlag> {
    let mut by_track: std::collections::HashMap<Track, Vec<&OcrVariant>> = std::collections::HashMap::new();
    for v in variants {
        if v.kind == VariantKind::Size {
            if let Some(track) = v.track {
                by_track.entry(track).or_default().push(v);
            }
        }
    }

    let mut tracks: Vec<Track> = by_track.keys().copied().collect();
    tracks.sort_by_key(|t| format!("{t:?}"));

    let mut inversions = Vec::new();
    let mut sequence = Vec::new();
    for track in tracks {
        let mut members = by_track.remove(&track).unwrap();
        members.sort_by_key(|v| v.ordinal.unwrap_or(0));
        sequence.extend(members.iter().map(|v| json!({"label": v.label, "price_cents": v.price_cents})));
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let a = members[i];
                let b = members[j];
                if a.ordinal < b.ordinal && a.price_cents > b.price_cents {
                    inversions.push(json!({"a": a.label, "b": b.label, "a_price_cents": a.price_cents, "b_price_cents": b.price_cents}));
                }
            }
        }
    }

    if inversions.is_empty() {
        return None;
    }
    Some(PriceFlag {
        severity: Severity::Warn,
        reason: FlagReason::VariantPriceInversion,
        details: json!({"inversions": inversions, "sequence": sequence}),
        corrected_price_cents: None,
    })
}

// ---------------------------------------------------------------------
// Consistency checks (duplicate group_key, zero-price, mixed-kind, size_gap)
// ---------------------------------------------------------------------

fn check_duplicate_group_keys(variants: &[OcrVariant]) -> Option<PriceFlag> {
    let mut seen: std::collections::HashMap<&str, Vec<&str>> = std::collections::HashMap::new();
    for v in variants {
        if let Some(key) = v.group_key.as_deref() {
            seen.entry(key).or_default().push(&v.label);
        }
    }
    let duplicated: Vec<(&str, &Vec<&str>)> = seen.iter().filter(|(_, labels)| labels.len() > 1).map(|(k, v)| (*k, v)).collect();
    if duplicated.is_empty() {
        return None;
    }
    let labels: Vec<&str> = duplicated.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    Some(PriceFlag {
        severity: Severity::Warn,
        reason: FlagReason::DuplicateGroupKey,
        details: json!({"keys": duplicated.iter().map(|(k, _)| *k).collect::<Vec<_>>(), "labels": labels}),
        corrected_price_cents: None,
    })
}

fn check_zero_price_variants(variants: &[OcrVariant]) -> Option<PriceFlag> {
    let labels: Vec<&str> = variants.iter().filter(|v| v.price_cents <= 0).map(|v| v.label.as_str()).collect();
    if labels.is_empty() {
        return None;
    }
    Some(PriceFlag {
        severity: Severity::Warn,
        reason: FlagReason::ZeroPriceVariant,
        details: json!({"labels": labels}),
        corrected_price_cents: None,
    })
}

fn check_mixed_kind(variants: &[OcrVariant]) -> Option<PriceFlag> {
    if variants.len() < 2 {
        return None;
    }
    let kinds: AHashSet<VariantKind> = variants.iter().map(|v| v.kind).collect();
    if kinds.len() <= 1 {
        return None;
    }
    Some(PriceFlag {
        severity: Severity::Warn,
        reason: FlagReason::MixedKindVariants,
        details: json!({"kinds": kinds.iter().map(|k| format!("{k:?}")).collect::<Vec<_>>()}),
        corrected_price_cents: None,
    })
}

fn chain_for_track(track: Track) -> Option<&'static [&'static str]> {
    match track {
        Track::Word => Some(crate::vocab::size::WORD_CHAIN),
        Track::Portion => Some(crate::vocab::size::PORTION_CHAIN),
        _ => None,
    }
}

/// Detects gaps in a linear size chain (`spec.md` §4.10 "Consistency checks"
/// / "missing intermediate sizes"). Only word- and portion-track sizes have
/// an explicit canonical chain to check against; inch/piece/multiplicity
/// sizes are free-form numeric and have no defined "missing" slot.
fn check_size_gap(variants: &[OcrVariant]) -> Option<PriceFlag> {
    let mut by_track: std::collections::HashMap<Track, Vec<i64>> = std::collections::HashMap::new();
    for v in variants {
        if v.kind == VariantKind::Size {
            if let (Some(track), Some(ordinal)) = (v.track, v.ordinal) {
                if chain_for_track(track).is_some() {
                    by_track.entry(track).or_default().push(ordinal);
                }
            }
        }
    }

    let mut tracks: Vec<Track> = by_track.keys().copied().collect();
    tracks.sort_by_key(|t| format!("{t:?}"));

    let mut gaps = Vec::new();
    for track in tracks {
        let ordinals = by_track.remove(&track).unwrap();
        let chain = chain_for_track(track).unwrap();
        let base = match track {
            Track::Word => 0,
            Track::Portion => 1_000,
            _ => continue,
        };
        let min_idx = *ordinals.iter().min().unwrap() - base;
        let max_idx = *ordinals.iter().max().unwrap() - base;
        let present: AHashSet<i64> = ordinals.iter().map(|o| o - base).collect();
        let missing: Vec<&str> = ((min_idx + 1)..max_idx)
            .filter(|idx| !present.contains(idx))
            .filter_map(|idx| chain.get(idx as usize).copied())
            .collect();
        if !missing.is_empty() {
            gaps.push(json!({"track": format!("{track:?}"), "missing": missing}));
        }
    }

    if gaps.is_empty() {
        return None;
    }
    Some(PriceFlag { severity: Severity::Warn, reason: FlagReason::SizeGap, details: json!({"gaps": gaps}), corrected_price_cents: None })
}

// ---------------------------------------------------------------------
// Per-page driver
// ---------------------------------------------------------------------

/// Walks the blocks of a page in order, maintaining the active size-grid
/// context, and builds each qualifying block's `variants` (`spec.md` §4.10).
pub fn apply_variants(blocks: &mut [TextBlock], cfg: &VariantStageConfig) {
    let mut active_grid: Option<SizeGridContext> = None;
    let mut current_page = blocks.first().map(|b| b.page);

    for (idx, block) in blocks.iter_mut().enumerate() {
        if current_page != Some(block.page) {
            active_grid = None;
            current_page = Some(block.page);
        }

        let Some(grammar) = block.grammar.clone() else { continue };
        match grammar.line_type {
            Some(LineType::SizeHeader) => {
                active_grid = Some(parse_size_grid(&block.merged_text, idx));
                continue;
            }
            Some(LineType::Heading) => {
                active_grid = None;
                continue;
            }
            _ => {}
        }

        let prices: Vec<i64> = grammar.price_mentions.iter().filter_map(|p| p.price_cents).collect();
        if prices.is_empty() {
            continue;
        }

        let grammar_confidence = Some(grammar.confidence);
        let mut grid_applied = false;
        let mut variants = if prices.len() >= 2 {
            active_grid.as_ref().and_then(|g| map_grid_to_prices(g, &prices, cfg)).map(|v| {
                grid_applied = true;
                v
            })
        } else {
            None
        };

        if variants.is_none() {
            variants = Some(backward_walk_variants(&block.merged_text, &prices));
        }
        let mut variants = variants.unwrap_or_default();

        for v in variants.iter_mut() {
            score_variant(v, grammar_confidence, grid_applied, cfg);
        }

        let mut flags = Vec::new();
        flags.extend(check_price_inversions(&variants));
        flags.extend(check_duplicate_group_keys(&variants));
        flags.extend(check_zero_price_variants(&variants));
        flags.extend(check_mixed_kind(&variants));
        flags.extend(check_size_gap(&variants));
        apply_flag_penalties(&mut variants, &flags, cfg);

        block.variants = variants;
        block.size_grid_applied = grid_applied;
        block.meta.size_grid_applied = grid_applied;
        block.meta.has_size_variants = block.variants.iter().any(|v| v.kind == VariantKind::Size);
        block.price_flags.extend(flags);
    }
}

/// Builds one variant per price mention via the backward-token-walk, using
/// each price's textual position within `merged_text` to find its preceding
/// label tokens.
fn backward_walk_variants(merged_text: &str, prices: &[i64]) -> Vec<OcrVariant> {
    let mut search_from = 0usize;
    let mut out = Vec::with_capacity(prices.len());
    for &price_cents in prices {
        let dollars = price_cents as f64 / 100.0;
        let needle_candidates = [format!("{dollars:.2}"), format!("${dollars:.2}")];
        let found = needle_candidates.iter().find_map(|needle| merged_text[search_from..].find(needle.as_str()).map(|pos| (pos, needle.len())));
        let Some((pos, len)) = found else {
            out.push(backward_walk_variant("", price_cents));
            continue;
        };
        let abs_pos = search_from + pos;
        let prefix = &merged_text[..abs_pos];
        out.push(backward_walk_variant(prefix, price_cents));
        search_from = abs_pos + len;
    }
    out
}
