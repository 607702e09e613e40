//! Pipeline configuration: every hand-tuned constant `spec.md` names, exposed
//! as a parameter rather than buried in stage logic (SPEC_FULL §1.1).
//!
//! Mirrors the teacher's `core::config` discovery pattern: explicit path, or
//! `menu-extract.{toml,yaml,json}` walked up from the working directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Side channel for opt-in debug artefacts (`spec.md` §6).
pub trait DebugSink: Send + Sync {
    fn preprocessed_page(&self, page: usize, image: &image::RgbImage);
    fn rotation_scores(&self, page: usize, column: usize, scores: &serde_json::Value);
    fn grammar_trace(&self, block_id: u64, trace: &str);
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrStageConfig {
    pub conf_floor: f64,
    pub rotations: Vec<u16>,
    pub psm_modes: Vec<u8>,
    pub iou_cluster_threshold: f64,
    pub overlap_cluster_threshold: f64,
    pub single_pass_conf_floor: f64,
    pub rotation_outlier_ratio: f64,
    pub rotation_tie_epsilon: f64,
}

impl Default for OcrStageConfig {
    fn default() -> Self {
        Self {
            conf_floor: 55.0,
            rotations: vec![0, 90, 180, 270],
            psm_modes: vec![6, 4, 11],
            iou_cluster_threshold: 0.35,
            overlap_cluster_threshold: 0.60,
            single_pass_conf_floor: 70.0,
            rotation_outlier_ratio: 2.5,
            rotation_tie_epsilon: 0.01,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutStageConfig {
    pub line_span_ratio: f64,
    pub line_height_ratio_cap: f64,
    pub line_width_floor_px: f64,
    pub line_width_median_mult: f64,
    pub line_gap_floor_px: f64,
    pub line_gap_median_mult: f64,
    pub block_gap_ratio: f64,
    pub block_overlap_ratio: f64,
    pub two_col_vertical_ratio: f64,
    pub two_col_horizontal_floor_px: f64,
    pub two_col_horizontal_cap_px: f64,
    pub two_col_horizontal_page_frac: f64,
}

impl Default for LayoutStageConfig {
    fn default() -> Self {
        Self {
            line_span_ratio: 1.8,
            line_height_ratio_cap: 2.0,
            line_width_floor_px: 800.0,
            line_width_median_mult: 20.0,
            line_gap_floor_px: 40.0,
            line_gap_median_mult: 3.0,
            block_gap_ratio: 1.25,
            block_overlap_ratio: 0.25,
            two_col_vertical_ratio: 1.2,
            two_col_horizontal_floor_px: 60.0,
            two_col_horizontal_cap_px: 150.0,
            two_col_horizontal_page_frac: 0.08,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSplitConfig {
    pub min_gutter_floor_px: f64,
    pub min_gutter_cap_px: f64,
    pub min_gutter_width_frac: f64,
}

impl Default for ColumnSplitConfig {
    fn default() -> Self {
        Self { min_gutter_floor_px: 12.0, min_gutter_cap_px: 64.0, min_gutter_width_frac: 0.0075 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRoleConfig {
    /// Open question in `spec.md` §9: domain-specific, kept as specified.
    pub uppercase_ratio_threshold: f64,
    pub meta_hint_substrings: Vec<String>,
}

impl Default for BlockRoleConfig {
    fn default() -> Self {
        Self {
            uppercase_ratio_threshold: 0.65,
            meta_hint_substrings: vec![
                "hours".into(),
                "monday".into(),
                "tuesday".into(),
                "wednesday".into(),
                "thursday".into(),
                "friday".into(),
                "saturday".into(),
                "sunday".into(),
                "phone".into(),
                "tel:".into(),
                "www.".into(),
                ".com".into(),
                "street".into(),
                "ave".into(),
                "blvd".into(),
                "suite".into(),
                "order online".into(),
                "follow us".into(),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryStageConfig {
    pub fallback: String,
}

impl Default for CategoryStageConfig {
    fn default() -> Self {
        Self { fallback: "Uncategorized".into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantStageConfig {
    pub grid_full_match_confidence: f64,
    pub grid_right_align_confidence: f64,
    pub grid_origin_bonus: f64,
    pub grammar_high_confidence_floor: f64,
    pub grammar_low_confidence_ceiling: f64,
    pub grammar_context_bonus: f64,
    pub grammar_context_penalty: f64,
    pub penalty_inversion: f64,
    pub penalty_duplicate_group: f64,
    pub penalty_zero_price: f64,
    pub penalty_mixed_kind: f64,
    pub penalty_size_gap: f64,
}

impl Default for VariantStageConfig {
    fn default() -> Self {
        Self {
            grid_full_match_confidence: 0.85,
            grid_right_align_confidence: 0.75,
            grid_origin_bonus: 0.05,
            grammar_high_confidence_floor: 0.80,
            grammar_low_confidence_ceiling: 0.50,
            grammar_context_bonus: 0.05,
            grammar_context_penalty: 0.10,
            penalty_inversion: 0.15,
            penalty_duplicate_group: 0.10,
            penalty_zero_price: 0.20,
            penalty_mixed_kind: 0.05,
            penalty_size_gap: 0.05,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceIntegrityConfig {
    pub min_group_size: usize,
    pub z_iqr_threshold: f64,
    pub decimal_divisors: Vec<i64>,
    pub min_valid_price_cents: i64,
    pub max_valid_price_cents: i64,
    pub substantially_closer_ratio: f64,
    pub side_hints: Vec<String>,
    pub coupon_hints: Vec<String>,
    pub side_categories: Vec<String>,
}

impl Default for PriceIntegrityConfig {
    fn default() -> Self {
        Self {
            min_group_size: 3,
            z_iqr_threshold: 4.0,
            decimal_divisors: vec![10, 100, 1000],
            min_valid_price_cents: 25,
            max_valid_price_cents: 50_000,
            substantially_closer_ratio: 5.0,
            side_hints: [
                "add ", "extra ", "side of", "side:", "topping", "toppings", "each topping", "per topping",
                "extra cheese", "add cheese", "add bacon", "add pepperoni", "extra sauce", "cup of sauce", "ranch",
                "blue cheese", "bleu cheese", "dressing", "jalapenos", "peppers", "mushrooms", "onions", "olive",
                "olives", "garlic knots", "breadsticks", "fries", "chips",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            coupon_hints: [
                "coupon", "special", "specials", "deal", "family deal", "family special", "combo", "combos",
                "meal deal", "value meal", "2 for", "two for", "3 for", "three for", "buy 1", "buy one", "get 1",
                "get one", "bogo", "any 2", "any two", "pick any", "choose any", "only", "for only", "just",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            side_categories: ["toppings", "extras", "sides", "dressings"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceStageConfig {
    pub weight_name_clarity: f64,
    pub weight_category: f64,
    pub weight_variant: f64,
    pub weight_price_sanity: f64,
    pub name_clarity_ideal_min_tokens: usize,
    pub name_clarity_ideal_max_tokens: usize,
    pub penalty_info: f64,
    pub penalty_warn: f64,
    pub penalty_auto_fix: f64,
}

impl Default for ConfidenceStageConfig {
    fn default() -> Self {
        Self {
            weight_name_clarity: 0.30,
            weight_category: 0.25,
            weight_variant: 0.20,
            weight_price_sanity: 0.25,
            name_clarity_ideal_min_tokens: 1,
            name_clarity_ideal_max_tokens: 6,
            penalty_info: 2.0,
            penalty_warn: 8.0,
            penalty_auto_fix: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossItemConfig {
    pub fuzzy_name_ratio_threshold: f64,
    pub fuzzy_name_min_len: usize,
    pub category_outlier_mad_multiplier: f64,
    pub category_outlier_mad_floor_ratio: f64,
    pub isolation_neighbor_window: i64,
    pub isolation_min_neighbors: usize,
    pub suggestion_neighbor_window: i64,
    pub suggestion_min_neighbors: usize,
    pub suggestion_agreement_threshold: f64,
    pub suggestion_confidence_threshold: f64,
    pub suggestion_keyword_guard_hits: usize,
    pub cross_category_median_ratio: f64,
    pub variant_count_min_items: usize,
    pub variant_label_min_items: usize,
    pub variant_label_agreement_threshold: f64,
    pub price_step_min_items: usize,
    pub price_step_mad_floor_ratio: f64,
}

impl Default for CrossItemConfig {
    fn default() -> Self {
        Self {
            fuzzy_name_ratio_threshold: 0.82,
            fuzzy_name_min_len: 4,
            category_outlier_mad_multiplier: 3.0,
            category_outlier_mad_floor_ratio: 0.10,
            isolation_neighbor_window: 2,
            isolation_min_neighbors: 2,
            suggestion_neighbor_window: 3,
            suggestion_min_neighbors: 3,
            suggestion_agreement_threshold: 0.60,
            suggestion_confidence_threshold: 0.30,
            suggestion_keyword_guard_hits: 2,
            cross_category_median_ratio: 1.3,
            variant_count_min_items: 3,
            variant_label_min_items: 3,
            variant_label_agreement_threshold: 0.60,
            price_step_min_items: 3,
            price_step_mad_floor_ratio: 0.15,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub emit_preprocessed_pages: bool,
    pub emit_rotation_scores: bool,
    pub emit_grammar_trace: bool,
    #[serde(skip)]
    pub sink: Option<Arc<dyn DebugSink>>,
}

impl std::fmt::Debug for DebugConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugConfig")
            .field("emit_preprocessed_pages", &self.emit_preprocessed_pages)
            .field("emit_rotation_scores", &self.emit_rotation_scores)
            .field("emit_grammar_trace", &self.emit_grammar_trace)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl PartialEq for DebugConfig {
    fn eq(&self, other: &Self) -> bool {
        self.emit_preprocessed_pages == other.emit_preprocessed_pages
            && self.emit_rotation_scores == other.emit_rotation_scores
            && self.emit_grammar_trace == other.emit_grammar_trace
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ocr: OcrStageConfig,
    pub layout: LayoutStageConfig,
    pub column_split: ColumnSplitConfig,
    pub block_role: BlockRoleConfig,
    pub category: CategoryStageConfig,
    pub variants: VariantStageConfig,
    pub price_integrity: PriceIntegrityConfig,
    pub cross_item: CrossItemConfig,
    pub confidence: ConfidenceStageConfig,
    pub debug: DebugConfig,
}

impl PipelineConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("failed to read config {}: {e}", path.as_ref().display())))?;
        toml::from_str(&text).map_err(|e| Error::config(format!("invalid TOML config: {e}")))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("failed to read config {}: {e}", path.as_ref().display())))?;
        serde_yaml_ng::from_str(&text).map_err(|e| Error::config(format!("invalid YAML config: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("failed to read config {}: {e}", path.as_ref().display())))?;
        serde_json::from_str(&text).map_err(|e| Error::config(format!("invalid JSON config: {e}")))
    }

    /// Walks up from the current directory looking for
    /// `menu-extract.{toml,yaml,yml,json}`. Returns `None` if nothing is found.
    pub fn discover() -> Result<Option<Self>> {
        let mut dir = std::env::current_dir()
            .map_err(|e| Error::config(format!("failed to get current directory: {e}")))?;
        loop {
            for (name, loader) in [
                ("menu-extract.toml", Self::from_toml_file as fn(&PathBuf) -> Result<Self>),
                ("menu-extract.yaml", Self::from_yaml_file as fn(&PathBuf) -> Result<Self>),
                ("menu-extract.yml", Self::from_yaml_file as fn(&PathBuf) -> Result<Self>),
                ("menu-extract.json", Self::from_json_file as fn(&PathBuf) -> Result<Self>),
            ] {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return loader(&candidate).map(Some);
                }
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_constants() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.ocr.conf_floor, 55.0);
        assert_eq!(cfg.ocr.rotations, vec![0, 90, 180, 270]);
        assert_eq!(cfg.ocr.psm_modes, vec![6, 4, 11]);
        assert_eq!(cfg.ocr.rotation_outlier_ratio, 2.5);
        assert_eq!(cfg.layout.line_span_ratio, 1.8);
        assert_eq!(cfg.column_split.min_gutter_floor_px, 12.0);
        assert_eq!(cfg.column_split.min_gutter_cap_px, 64.0);
        assert_eq!(cfg.category.fallback, "Uncategorized");
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = PipelineConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(cfg, parsed);
    }
}
