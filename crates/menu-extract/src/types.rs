//! Shared data model for the extraction pipeline.
//!
//! Every record here is a value type; the pipeline context that creates a
//! [`TextBlock`] owns it until it is folded into the final
//! [`StructuredMenuPayload`]. See `spec.md` §3 for the authoritative shapes.

use serde::{Deserialize, Serialize};

/// Integer pixel-space bounding box in the coordinate system of the page the
/// box was captured on. `w` and `h` are always non-negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl BBox {
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        debug_assert!(w >= 0 && h >= 0, "BBox width/height must be non-negative");
        Self { x, y, w, h }
    }

    pub fn x2(&self) -> i64 {
        self.x + self.w
    }

    pub fn y2(&self) -> i64 {
        self.y + self.h
    }

    pub fn area(&self) -> i64 {
        self.w.max(0) * self.h.max(0)
    }

    /// Area of overlap between two boxes, 0 if disjoint.
    pub fn intersection_area(&self, other: &BBox) -> i64 {
        let ix = self.x.max(other.x);
        let iy = self.y.max(other.y);
        let ix2 = self.x2().min(other.x2());
        let iy2 = self.y2().min(other.y2());
        (ix2 - ix).max(0) * (iy2 - iy).max(0)
    }

    /// Intersection-over-union.
    pub fn iou(&self, other: &BBox) -> f64 {
        let inter = self.intersection_area(other) as f64;
        if inter == 0.0 {
            return 0.0;
        }
        let union = (self.area() + other.area()) as f64 - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Overlap ratio against the smaller of the two boxes' areas.
    pub fn overlap_ratio_vs_smaller(&self, other: &BBox) -> f64 {
        let inter = self.intersection_area(other) as f64;
        if inter == 0.0 {
            return 0.0;
        }
        let smaller = self.area().min(other.area()) as f64;
        if smaller <= 0.0 { 0.0 } else { inter / smaller }
    }

    /// Smallest box enclosing both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let x2 = self.x2().max(other.x2());
        let y2 = self.y2().max(other.y2());
        BBox::new(x, y, x2 - x, y2 - y)
    }

    /// Smallest box enclosing a non-empty slice of boxes.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BBox>) -> Option<BBox> {
        boxes.into_iter().copied().reduce(|a, b| a.union(&b))
    }

    /// Vertical gap between two boxes sorted top-to-bottom; negative if they overlap.
    pub fn vertical_gap(&self, below: &BBox) -> i64 {
        below.y - self.y2()
    }

    /// Fraction of horizontal overlap relative to the narrower box's width.
    pub fn horizontal_overlap_ratio(&self, other: &BBox) -> f64 {
        let ix = self.x.max(other.x);
        let ix2 = self.x2().min(other.x2());
        let overlap = (ix2 - ix).max(0) as f64;
        let narrower = self.w.min(other.w) as f64;
        if narrower <= 0.0 { 0.0 } else { overlap / narrower }
    }
}

/// A single accepted OCR token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bbox: BBox,
    /// OCR engine confidence in `[0, 100]`.
    pub conf: f64,
}

/// A horizontal cluster of [`Word`]s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub bbox: BBox,
    pub words: Vec<Word>,
}

/// A vertical cluster of [`Line`]s, not yet enriched by the grammar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: u64,
    pub page: usize,
    pub bbox: BBox,
    pub lines: Vec<Line>,
    pub meta: BlockMeta,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub size_grid_applied: bool,
    pub two_column_merged: bool,
    pub has_size_variants: bool,
    pub errors: Vec<String>,
}

/// Semantic role of a [`TextBlock`] within the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Heading,
    ItemName,
    Description,
    Price,
    Meta,
    Noise,
    Item,
}

/// Line-level grammatical classification (`spec.md` §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    MenuItem,
    Heading,
    SizeHeader,
    ToppingList,
    InfoLine,
    PriceOnly,
    ModifierLine,
    DescriptionOnly,
    MultiColumn,
    Unknown,
}

/// A price mention found in a line, prior to role assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceCandidate {
    pub text: String,
    pub confidence: f64,
    pub price_cents: Option<i64>,
}

/// Result of parsing a single merged-text line with the menu grammar.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMenuItem {
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub modifiers: Vec<String>,
    pub size_mentions: Vec<String>,
    pub price_mentions: Vec<PriceCandidate>,
    pub line_type: Option<LineType>,
    pub confidence: f64,
    pub components: Option<Components>,
    pub column_segments: Option<Vec<String>>,
}

/// Ingredient-style components split out of an item's description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub topping: Vec<String>,
    pub sauce: Vec<String>,
    pub preparation: Vec<String>,
    pub flavor_options: Vec<String>,
}

/// Equivalence class of size tokens comparable by numeric ordinal
/// (`spec.md` GLOSSARY "Track").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Word,
    Portion,
    Multiplicity,
    Inch,
    Piece,
}

/// Kind of a size/flavor/style/combo variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Size,
    Flavor,
    Style,
    Combo,
    Other,
}

/// A single priced variant of an item (`spec.md` §3 "OCRVariant").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcrVariant {
    pub label: String,
    pub price_cents: i64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub kind: VariantKind,
    pub normalized_size: Option<String>,
    pub track: Option<Track>,
    pub ordinal: Option<i64>,
    pub group_key: Option<String>,
    pub kind_hint: Option<String>,
    pub confidence_details: Vec<String>,
}

/// Column labels parsed from a `size_header` line, applied to subsequent
/// item lines until the grid expires (`spec.md` §4.10).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeGridContext {
    pub columns: Vec<SizeGridColumn>,
    pub source_line_index: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeGridColumn {
    pub raw_label: String,
    pub normalized: String,
    pub position: usize,
}

/// Severity of a [`PriceFlag`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    AutoFix,
}

/// Closed reason enumeration for price/consistency flags (`spec.md` §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    VariantPriceInversion,
    DuplicateGroupKey,
    ZeroPriceVariant,
    MixedKindVariants,
    SizeGap,
    DecimalShiftCorrected,
    PriceOutlier,
    ZeroPriceInGroup,
    SidePriceCandidate,
    CouponOrDealLine,
    CrossItemExactDuplicate,
    CrossItemDuplicateName,
    CrossItemFuzzyExactDuplicate,
    CrossItemFuzzyDuplicate,
    CrossItemCategoryPriceOutlier,
    CrossItemCategoryIsolated,
    CrossItemCategorySuggestion,
    CrossCategoryPriceAbove,
    CrossCategoryPriceBelow,
    CrossItemVariantCountOutlier,
    CrossItemVariantLabelMismatch,
    CrossItemPriceStepOutlier,
}

/// A flagged price or consistency anomaly attached to an item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceFlag {
    pub severity: Severity,
    pub reason: FlagReason,
    pub details: serde_json::Value,
    /// Present iff `severity == AutoFix`.
    pub corrected_price_cents: Option<i64>,
}

/// How an item's price was classified for cross-item statistics
/// (SPEC_FULL §2, grounded on `price_integrity.py`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceRole {
    Primary,
    Side,
    Coupon,
}

/// Provenance of a category assignment (SPEC_FULL §2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    Existing,
    Inferred,
}

/// Group statistics a price was judged against, kept for audit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceGroupMeta {
    pub group_median_cents: Option<i64>,
    pub group_iqr_cents: Option<i64>,
}

/// The enriched block: the central pipeline entity. Progressively acquires
/// fields as it moves through stages §4.5–§4.12.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextBlock {
    pub id: u64,
    pub page: usize,
    pub column: usize,
    pub bbox: BBox,
    pub lines: Vec<Line>,
    pub merged_text: String,

    pub role: Option<Role>,
    pub is_heading: bool,
    pub is_noise: bool,

    pub grammar: Option<ParsedMenuItem>,

    pub category: Option<String>,
    pub category_confidence: Option<i64>,
    pub category_source: Option<CategorySource>,
    pub rule_trace: Vec<String>,
    pub subcategory: Option<String>,
    pub section_path: Option<String>,

    pub price_candidates: Vec<PriceCandidate>,
    pub price_cents: Option<i64>,
    pub price_role: Option<PriceRole>,
    pub price_meta: PriceGroupMeta,

    pub variants: Vec<OcrVariant>,
    pub size_grid_applied: bool,

    pub price_flags: Vec<PriceFlag>,

    pub semantic_confidence: Option<i64>,
    pub semantic_confidence_details: Vec<String>,

    pub meta: BlockMeta,
}

impl TextBlock {
    pub fn new(id: u64, page: usize, column: usize, bbox: BBox, lines: Vec<Line>, merged_text: String) -> Self {
        Self {
            id,
            page,
            column,
            bbox,
            lines,
            merged_text,
            role: None,
            is_heading: false,
            is_noise: false,
            grammar: None,
            category: None,
            category_confidence: None,
            category_source: None,
            rule_trace: Vec::new(),
            subcategory: None,
            section_path: None,
            price_candidates: Vec::new(),
            price_cents: None,
            price_role: None,
            price_meta: PriceGroupMeta::default(),
            variants: Vec::new(),
            size_grid_applied: false,
            price_flags: Vec::new(),
            semantic_confidence: None,
            semantic_confidence_details: Vec::new(),
            meta: BlockMeta::default(),
        }
    }

    /// The canonical price of the item: lowest positive variant price if
    /// variants exist, else the first positive price candidate
    /// (`spec.md` GLOSSARY "Primary price").
    pub fn primary_price_cents(&self) -> Option<i64> {
        if !self.variants.is_empty() {
            return self.variants.iter().map(|v| v.price_cents).filter(|c| *c > 0).min();
        }
        self.price_candidates.iter().filter_map(|c| c.price_cents).find(|c| *c > 0)
    }

    /// Best available name for this item: grammar's parsed name, else the
    /// merged text with trailing prices stripped.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.grammar.as_ref().and_then(|g| g.item_name.clone()) {
            return name;
        }
        self.merged_text.clone()
    }
}

/// Confidence tier bucketing (`spec.md` §8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
    Unknown,
}

pub fn confidence_tier(score: f64) -> ConfidenceTier {
    if score >= 0.80 {
        ConfidenceTier::High
    } else if score >= 0.60 {
        ConfidenceTier::Medium
    } else if score >= 0.40 {
        ConfidenceTier::Low
    } else {
        ConfidenceTier::Unknown
    }
}

/// Final per-item record handed to the draft store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructuredItem {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub section_path: Option<String>,
    pub price_cents: i64,
    pub variants: Vec<OcrVariant>,
    pub confidence: i64,
    pub price_candidates: Vec<PriceCandidate>,
    pub confidence_map: Option<serde_json::Value>,
    pub provenance: Option<serde_json::Value>,
    pub cleanup_flags: Vec<PriceFlag>,
    pub warnings: Vec<String>,
    pub section_slug: Option<String>,
    pub section_position: Option<usize>,
    pub item_position: Option<usize>,
    pub auto_group_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Section {
    pub path: String,
    pub slug: String,
    pub position: usize,
    pub items: Vec<StructuredItem>,
    pub auto_group_id: Option<String>,
    pub meta: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PayloadMeta {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub rotation_scores: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructuredMenuPayload {
    pub sections: Vec<Section>,
    pub meta: Option<PayloadMeta>,
    pub draft_id: Option<String>,
    pub restaurant_id: Option<String>,
    pub title: Option<String>,
    pub source_job_id: Option<String>,
}

impl StructuredMenuPayload {
    pub fn empty() -> Self {
        Self {
            sections: Vec::new(),
            meta: Some(PayloadMeta::default()),
            draft_id: None,
            restaurant_id: None,
            title: None,
            source_job_id: None,
        }
    }
}
