//! Layout segmenter: words → lines → blocks, two-column price-row merge,
//! block role classification, and multi-line description reconstruction
//! (`spec.md` §4.5, §4.7, §4.8), grounded on
//! `original_source/storage/layout/layout_segmenter.py` (orphan-price
//! attachment idea, generalised here to full geometry) and
//! `pdf/hierarchy.rs`'s bbox-geometry idiom.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{BlockRoleConfig, LayoutStageConfig};
use crate::types::{BBox, Block, BlockMeta, Line, Role, Word};

fn median_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n % 2 == 1 { sorted[n / 2] } else { (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0 }
}

/// Discards degenerate lines: fewer than 3 characters, or exactly two
/// letters with no digit (`spec.md` §4.5).
fn is_degenerate_line(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 3 {
        return true;
    }
    let alpha_count = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    let has_digit = trimmed.chars().any(|c| c.is_ascii_digit());
    alpha_count == 2 && trimmed.chars().count() == 2 && !has_digit
}

fn line_from_words(mut words: Vec<Word>) -> Option<Line> {
    words.sort_by_key(|w| w.bbox.x);
    let bbox = BBox::union_all(words.iter().map(|w| &w.bbox))?;
    let text = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
    if is_degenerate_line(&text) {
        return None;
    }
    Some(Line { text, bbox, words })
}

/// Groups words into lines by running vertical-span and horizontal-gap
/// tolerances (`spec.md` §4.5 "Words → Lines").
pub fn words_to_lines(words: &[Word], cfg: &LayoutStageConfig) -> Vec<Line> {
    let mut sorted: Vec<Word> = words.to_vec();
    sorted.sort_by(|a, b| a.bbox.y.cmp(&b.bbox.y).then(a.bbox.x.cmp(&b.bbox.x)));

    let heights: Vec<f64> = sorted.iter().map(|w| w.bbox.h as f64).collect();
    let widths: Vec<f64> = sorted.iter().map(|w| w.bbox.w as f64).collect();
    let median_height = median_f64(&heights).max(1.0);
    let median_width = median_f64(&widths).max(1.0);

    let max_line_width = (cfg.line_width_floor_px).max(cfg.line_width_median_mult * median_width);
    let max_gap = (cfg.line_gap_floor_px).max(cfg.line_gap_median_mult * median_width);

    let mut lines = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut current_y_min = 0i64;
    let mut current_y_max = 0i64;

    for word in sorted {
        if current.is_empty() {
            current_y_min = word.bbox.y;
            current_y_max = word.bbox.y2();
            current.push(word);
            continue;
        }

        let span_y_min = current_y_min.min(word.bbox.y);
        let span_y_max = current_y_max.max(word.bbox.y2());
        let potential_span = (span_y_max - span_y_min) as f64;

        let line_avg_height =
            current.iter().map(|w| w.bbox.h as f64).sum::<f64>() / current.len() as f64;
        let height_ratio = (word.bbox.h as f64 / line_avg_height.max(1.0)).max(line_avg_height.max(1.0) / word.bbox.h as f64);

        let current_min_x = current.iter().map(|w| w.bbox.x).min().unwrap();
        let current_max_x2 = current.iter().map(|w| w.bbox.x2()).max().unwrap();
        let total_width = (current_max_x2.max(word.bbox.x2()) - current_min_x.min(word.bbox.x)) as f64;

        let min_gap = current
            .iter()
            .map(|w| {
                if word.bbox.x >= w.bbox.x2() {
                    (word.bbox.x - w.bbox.x2()) as f64
                } else if w.bbox.x >= word.bbox.x2() {
                    (w.bbox.x - word.bbox.x2()) as f64
                } else {
                    0.0
                }
            })
            .fold(f64::MAX, f64::min);

        let fits = potential_span <= cfg.line_span_ratio * median_height
            && height_ratio <= cfg.line_height_ratio_cap
            && total_width <= max_line_width
            && min_gap <= max_gap;

        if fits {
            current_y_min = span_y_min;
            current_y_max = span_y_max;
            current.push(word);
        } else {
            if let Some(line) = line_from_words(std::mem::take(&mut current)) {
                lines.push(line);
            }
            current_y_min = word.bbox.y;
            current_y_max = word.bbox.y2();
            current.push(word);
        }
    }
    if let Some(line) = line_from_words(current) {
        lines.push(line);
    }
    lines
}

/// Clusters consecutive lines into blocks by vertical gap or horizontal
/// overlap rescue (`spec.md` §4.5 "Lines → Blocks").
pub fn lines_to_blocks(lines: Vec<Line>, page: usize, column: usize, cfg: &LayoutStageConfig, next_id: &mut u64) -> Vec<Block> {
    if lines.is_empty() {
        return Vec::new();
    }
    let heights: Vec<f64> = lines.iter().map(|l| l.bbox.h as f64).collect();
    let median_line_height = median_f64(&heights).max(1.0);

    let mut blocks = Vec::new();
    let mut current: Vec<Line> = vec![lines[0].clone()];

    for pair in lines.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let gap = prev.bbox.vertical_gap(&next.bbox) as f64;
        let joins = gap <= cfg.block_gap_ratio * median_line_height
            || prev.bbox.horizontal_overlap_ratio(&next.bbox) >= cfg.block_overlap_ratio;
        if joins {
            current.push(next.clone());
        } else {
            blocks.push(finish_block(std::mem::take(&mut current), page, column, next_id));
            current.push(next.clone());
        }
    }
    if !current.is_empty() {
        blocks.push(finish_block(current, page, column, next_id));
    }
    blocks
}

fn finish_block(lines: Vec<Line>, page: usize, column: usize, next_id: &mut u64) -> Block {
    let bbox = BBox::union_all(lines.iter().map(|l| &l.bbox)).unwrap_or_default();
    let id = *next_id;
    *next_id += 1;
    Block { id, page, bbox, lines, meta: BlockMeta::default() }
}

static PRICE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[[:punct:]]*\$?\d{1,3}[.,]\d{2}\s*$").unwrap());

fn is_price_only_block(block: &Block) -> bool {
    block.lines.len() == 1 && PRICE_LINE_RE.is_match(block.lines[0].text.trim())
}

/// Merges orphan price-only blocks into the nearest text block to their
/// left (`spec.md` §4.5 "Two-column row merge").
pub fn merge_two_column_prices(mut blocks: Vec<Block>, page_width: i64, cfg: &LayoutStageConfig) -> Vec<Block> {
    let heights: Vec<f64> = blocks.iter().map(|b| b.bbox.h as f64).collect();
    let median_block_height = median_f64(&heights).max(1.0);
    let max_vertical = cfg.two_col_vertical_ratio * median_block_height;
    let max_horizontal = (cfg.two_col_horizontal_page_frac * page_width as f64)
        .max(cfg.two_col_horizontal_floor_px)
        .min(cfg.two_col_horizontal_cap_px);

    let price_indices: Vec<usize> =
        blocks.iter().enumerate().filter(|(_, b)| is_price_only_block(b)).map(|(i, _)| i).collect();
    let mut dropped = vec![false; blocks.len()];

    for &pi in &price_indices {
        let price_bbox = blocks[pi].bbox;
        let mut best: Option<(usize, i64)> = None;
        for (ti, target) in blocks.iter().enumerate() {
            if ti == pi || dropped[ti] || is_price_only_block(target) {
                continue;
            }
            if target.bbox.x2() > price_bbox.x {
                continue;
            }
            let vertical_gap = (target.bbox.y - price_bbox.y).unsigned_abs() as f64;
            if vertical_gap > max_vertical {
                continue;
            }
            let horizontal_gap = price_bbox.x - target.bbox.x2();
            if horizontal_gap as f64 > max_horizontal {
                continue;
            }
            let distance = horizontal_gap.abs();
            if best.is_none_or(|(_, best_dist)| distance < best_dist) {
                best = Some((ti, distance));
            }
        }
        if let Some((ti, _)) = best {
            let price_line = blocks[pi].lines[0].clone();
            let target = &mut blocks[ti];
            target.bbox = target.bbox.union(&price_line.bbox);
            target.lines.push(price_line);
            target.meta.two_column_merged = true;
            dropped[pi] = true;
        }
    }

    blocks.into_iter().zip(dropped).filter(|(_, drop)| !drop).map(|(b, _)| b).collect()
}

static META_HINT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{3}[-.\s]\d{3,4}").unwrap());

fn uppercase_ratio(text: &str) -> f64 {
    let alpha: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alpha.is_empty() {
        return 0.0;
    }
    alpha.iter().filter(|c| c.is_uppercase()).count() as f64 / alpha.len() as f64
}

/// Classifies a block's semantic [`Role`] from text-shape signals
/// (`spec.md` §4.7). `previous_role` implements the one-step neighbour nudge.
pub fn classify_block_role(block: &Block, previous_role: Option<Role>, cfg: &BlockRoleConfig) -> Role {
    let text = block.lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join(" ");
    let lower = text.to_lowercase();

    if is_price_only_block(block) {
        return Role::Price;
    }

    let has_meta_hint = cfg.meta_hint_substrings.iter().any(|hint| lower.contains(hint.as_str())) || META_HINT_RE.is_match(&text);
    if has_meta_hint {
        return Role::Meta;
    }

    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count() as f64;
    let total = text.chars().count().max(1) as f64;
    if alnum / total < 0.2 {
        return Role::Noise;
    }

    let word_count = text.split_whitespace().count();
    let is_short_caps = word_count <= 6 && uppercase_ratio(&text) >= cfg.uppercase_ratio_threshold;
    if is_short_caps && block.lines.len() <= 2 {
        return Role::Heading;
    }

    if word_count <= 2 && block.lines.len() == 1 {
        return Role::Noise;
    }

    match previous_role {
        Some(Role::Heading) => Role::ItemName,
        _ => Role::Item,
    }
}

/// Strips bullet/numeric leaders, joins lines (gluing hyphen-ended lines
/// without a space), and collapses whitespace (`spec.md` §4.8).
pub fn reconstruct_description(lines: &[Line]) -> String {
    static LEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:[-•*]|\d+[.)])\s*").unwrap());

    let mut out = String::new();
    for line in lines {
        let stripped = LEADER_RE.replace(&line.text, "").into_owned();
        if stripped.is_empty() {
            continue;
        }
        if out.ends_with('-') {
            out.pop();
            out.push_str(stripped.trim_start());
        } else {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(stripped.trim());
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: i64, y: i64, w: i64, h: i64) -> Word {
        Word { text: text.into(), bbox: BBox::new(x, y, w, h), conf: 90.0 }
    }

    #[test]
    fn words_to_lines_groups_same_row() {
        let cfg = LayoutStageConfig::default();
        let words = vec![word("Large", 0, 0, 60, 20), word("Pizza", 65, 2, 60, 20), word("$12.99", 300, 0, 60, 20)];
        let lines = words_to_lines(&words, &cfg);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Large Pizza $12.99");
    }

    #[test]
    fn words_to_lines_splits_distant_rows() {
        let cfg = LayoutStageConfig::default();
        let words = vec![word("Pizza", 0, 0, 60, 20), word("Burgers", 0, 400, 60, 20)];
        let lines = words_to_lines(&words, &cfg);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn degenerate_short_line_dropped() {
        let cfg = LayoutStageConfig::default();
        let words = vec![word("ab", 0, 0, 20, 20)];
        let lines = words_to_lines(&words, &cfg);
        assert!(lines.is_empty());
    }

    #[test]
    fn price_only_block_merges_left() {
        let cfg = LayoutStageConfig::default();
        let mut next_id = 0u64;
        let item_line = Line { text: "Burger".into(), bbox: BBox::new(0, 0, 100, 20), words: vec![] };
        let price_line = Line { text: "$8.99".into(), bbox: BBox::new(200, 2, 60, 20), words: vec![] };
        let item_block = finish_block(vec![item_line], 0, 0, &mut next_id);
        let price_block = finish_block(vec![price_line], 0, 0, &mut next_id);
        let merged = merge_two_column_prices(vec![item_block, price_block], 1000, &cfg);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].meta.two_column_merged);
        assert_eq!(merged[0].lines.len(), 2);
    }

    #[test]
    fn reconstruct_description_glues_hyphen_breaks() {
        let lines = vec![
            Line { text: "Served with fresh mozza-".into(), bbox: BBox::default(), words: vec![] },
            Line { text: "rella and basil".into(), bbox: BBox::default(), words: vec![] },
        ];
        assert_eq!(reconstruct_description(&lines), "Served with fresh mozzarella and basil");
    }

    #[test]
    fn reconstruct_description_strips_bullet_leaders() {
        let lines = vec![Line { text: "- Fresh daily".into(), bbox: BBox::default(), words: vec![] }];
        assert_eq!(reconstruct_description(&lines), "Fresh daily");
    }

    #[test]
    fn classify_block_role_detects_heading() {
        let cfg = BlockRoleConfig::default();
        let mut next_id = 0u64;
        let line = Line { text: "APPETIZERS".into(), bbox: BBox::new(0, 0, 100, 20), words: vec![] };
        let block = finish_block(vec![line], 0, 0, &mut next_id);
        assert_eq!(classify_block_role(&block, None, &cfg), Role::Heading);
    }

    #[test]
    fn classify_block_role_meta_hint_phone() {
        let cfg = BlockRoleConfig::default();
        let mut next_id = 0u64;
        let line = Line { text: "Call us 555-1234 or visit www.example.com".into(), bbox: BBox::new(0, 0, 100, 20), words: vec![] };
        let block = finish_block(vec![line], 0, 0, &mut next_id);
        assert_eq!(classify_block_role(&block, None, &cfg), Role::Meta);
    }
}
