//! Pipeline orchestrator (`spec.md` §4.13): a stateless driver that consumes
//! page images from an external [`Rasteriser`], runs the per-page pipeline
//! §4.2-§4.11 in document order, and builds the final
//! [`StructuredMenuPayload`].
//!
//! Grounded on the teacher's `core/extractor` / `core/pipeline` stage-wiring
//! idiom: one function per stage, threaded through an explicit driver rather
//! than an implicit registry.

use crate::category::{apply_inference_to_items, CategoryInput};
use crate::config::PipelineConfig;
use crate::confidence::score_confidence;
use crate::crossitem::check_cross_item_consistency;
use crate::error::{Error, Result, StageWarning};
use crate::grammar::classify_menu_lines;
use crate::layout::{classify_block_role, lines_to_blocks, merge_two_column_prices, reconstruct_description, words_to_lines};
use crate::ocr::columns::split_columns_with_offsets;
use crate::ocr::fusion::fuse_column;
use crate::ocr::orientation::{normalize_orientation, rotate_clockwise, Rotation};
use crate::traits::{Classifier, OcrEngine, Rasteriser};
use crate::types::{Block, CategorySource, LineType, PayloadMeta, Role, Section, StructuredItem, StructuredMenuPayload, TextBlock, Word};
use crate::variants::apply_variants;
use crate::variants::price_integrity::apply_price_integrity;

fn translate_word_x(mut word: Word, offset: i64) -> Word {
    word.bbox.x += offset;
    word
}

/// Lowercase, dash-separated slug for a section title.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            slug.push(ch);
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Runs orientation normalisation, column splitting, multi-pass OCR fusion,
/// and layout segmentation for one page (`spec.md` §4.2-§4.8), returning its
/// surviving (non-noise) blocks converted to [`TextBlock`]s with `merged_text`
/// populated. `next_id` is threaded across the whole document for stable
/// block ids.
fn run_page(
    page_index: usize,
    image: image::RgbImage,
    ocr: &dyn OcrEngine,
    cfg: &PipelineConfig,
    next_id: &mut u64,
    warnings: &mut Vec<StageWarning>,
    rotation_meta: &mut Vec<serde_json::Value>,
) -> Vec<TextBlock> {
    let osd_rotation = ocr.detect_orientation(&image).map(Rotation::from_degrees);
    let (oriented, orientation_warning) = normalize_orientation(&image, None, osd_rotation, |img, rotation| {
        let rotated = rotate_clockwise(img, rotation);
        match ocr.recognize(&rotated, 6) {
            Ok(tokens) if !tokens.is_empty() => tokens.iter().map(|t| t.conf).sum::<f64>() / tokens.len() as f64,
            _ => 0.0,
        }
    });
    if let Some(mut warning) = orientation_warning {
        warning.page = Some(page_index);
        warnings.push(warning);
    }

    if cfg.debug.emit_preprocessed_pages {
        if let Some(sink) = cfg.debug.sink.as_ref() {
            sink.preprocessed_page(page_index, &oriented.image);
        }
    }

    let columns = split_columns_with_offsets(&oriented.image, &cfg.column_split);
    if columns.len() == 1 {
        warnings.push(StageWarning::new(
            "column_split",
            "no gutter found; falling back to a single column",
            Some(page_index),
        ));
    }

    let mut raw_blocks: Vec<Block> = Vec::new();
    let mut block_columns: std::collections::HashMap<u64, usize> = std::collections::HashMap::new();

    for (column_index, (x_offset, column_image)) in columns.into_iter().enumerate() {
        let words = match fuse_column(&column_image, ocr, &cfg.ocr) {
            Ok((words, decision)) => {
                let scores_json = serde_json::json!({
                    "page": page_index,
                    "column": column_index,
                    "winner": decision.winner,
                    "scores": decision.scores,
                });
                if cfg.debug.emit_rotation_scores {
                    if let Some(sink) = cfg.debug.sink.as_ref() {
                        sink.rotation_scores(page_index, column_index, &scores_json);
                    }
                }
                rotation_meta.push(scores_json);
                words.into_iter().map(|w| translate_word_x(w, x_offset as i64)).collect()
            }
            Err(err) => {
                warnings.push(StageWarning::new(
                    "ocr_fusion",
                    format!("column {column_index} failed: {err}"),
                    Some(page_index),
                ));
                Vec::new()
            }
        };

        let lines = words_to_lines(&words, &cfg.layout);
        let column_blocks = lines_to_blocks(lines, page_index, column_index, &cfg.layout, next_id);
        for block in &column_blocks {
            block_columns.insert(block.id, column_index);
        }
        raw_blocks.extend(column_blocks);
    }

    let page_width = oriented.image.width() as i64;
    let merged_blocks = merge_two_column_prices(raw_blocks, page_width, &cfg.layout);

    let mut previous_role: Option<Role> = None;
    let mut text_blocks = Vec::new();
    for block in merged_blocks {
        let role = classify_block_role(&block, previous_role, &cfg.block_role);
        previous_role = Some(role);
        if role == Role::Noise {
            continue;
        }
        let column = block_columns.get(&block.id).copied().unwrap_or(0);
        let merged_text = reconstruct_description(&block.lines);
        let mut tb = TextBlock::new(block.id, block.page, column, block.bbox, block.lines, merged_text);
        tb.role = Some(role);
        tb.is_heading = role == Role::Heading;
        tb.meta = block.meta;
        text_blocks.push(tb);
    }
    text_blocks
}

/// Runs the grammar, category, variant, price-integrity, cross-item, and
/// confidence stages (`spec.md` §4.6, §4.9-§4.12) across the whole document's
/// blocks in order. Also used by [`crate::textonly`], which builds blocks
/// without any geometry and joins the pipeline from this point on.
pub(crate) fn run_document_stages(blocks: &mut Vec<TextBlock>, classifier: Option<&dyn Classifier>, cfg: &PipelineConfig) {
    let texts: Vec<String> = blocks.iter().map(|b| b.merged_text.clone()).collect();
    let parsed = classify_menu_lines(&texts);
    for (block, parsed_item) in blocks.iter_mut().zip(parsed) {
        block.price_candidates = parsed_item.price_mentions.clone();
        block.is_heading = block.is_heading || parsed_item.line_type == Some(LineType::Heading);
        if cfg.debug.emit_grammar_trace {
            if let Some(sink) = cfg.debug.sink.as_ref() {
                sink.grammar_trace(block.id, &format!("{:?} conf={:.2}", parsed_item.line_type, parsed_item.confidence));
            }
        }
        block.grammar = Some(parsed_item);
    }

    let names: Vec<Option<String>> = blocks.iter().map(|b| b.grammar.as_ref().and_then(|g| g.item_name.clone())).collect();
    let descriptions: Vec<Option<String>> = blocks.iter().map(|b| b.grammar.as_ref().and_then(|g| g.description.clone())).collect();
    let price_estimates: Vec<i64> =
        blocks.iter().map(|b| b.price_candidates.iter().filter_map(|c| c.price_cents).find(|c| *c > 0).unwrap_or(0)).collect();

    let inputs: Vec<CategoryInput> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| CategoryInput {
            name: names[i].as_deref(),
            description: descriptions[i].as_deref(),
            price_cents: price_estimates[i],
            existing_category: b.category.as_deref(),
        })
        .collect();
    let outputs = apply_inference_to_items(&inputs, &cfg.category.fallback);
    for (block, output) in blocks.iter_mut().zip(outputs) {
        block.category = Some(output.category);
        block.category_confidence = Some(output.confidence);
        block.category_source = Some(output.source);
    }

    if let Some(clf) = classifier {
        for block in blocks.iter_mut() {
            if let Some((category, confidence)) = clf.classify(&block.merged_text) {
                let confidence_pct = (confidence.clamp(0.0, 1.0) * 100.0).round() as i64;
                if confidence_pct > block.category_confidence.unwrap_or(0) {
                    block.category = Some(category);
                    block.category_confidence = Some(confidence_pct);
                    block.category_source = Some(CategorySource::Inferred);
                }
            }
        }
    }

    apply_variants(blocks, &cfg.variants);
    apply_price_integrity(blocks, &cfg.price_integrity);
    check_cross_item_consistency(blocks, &cfg.cross_item);
    score_confidence(blocks, &cfg.confidence);
}

/// Builds the final [`StructuredMenuPayload`] from the document's fully
/// enriched blocks: sections are formed from consecutive headings, each gets
/// a stable position and slug, and items keep a document-order
/// `item_position` (`spec.md` §4.13).
pub(crate) fn build_payload(blocks: &[TextBlock], cfg: &PipelineConfig) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current_items: Vec<StructuredItem> = Vec::new();
    let mut current_title = "Menu".to_string();
    let mut item_position = 0usize;

    for block in blocks {
        if block.is_heading {
            if !current_items.is_empty() {
                let position = sections.len();
                sections.push(Section {
                    path: current_title.clone(),
                    slug: slugify(&current_title),
                    position,
                    items: std::mem::take(&mut current_items),
                    auto_group_id: None,
                    meta: None,
                });
            }
            current_title = block.display_name();
            continue;
        }

        let category = block.category.clone().unwrap_or_else(|| cfg.category.fallback.clone());
        let item = StructuredItem {
            name: block.display_name(),
            description: block.grammar.as_ref().and_then(|g| g.description.clone()),
            category,
            subcategory: block.subcategory.clone(),
            section_path: Some(current_title.clone()),
            price_cents: block.primary_price_cents().unwrap_or(0),
            variants: block.variants.clone(),
            confidence: block.semantic_confidence.unwrap_or(0),
            price_candidates: block.price_candidates.clone(),
            confidence_map: Some(serde_json::json!(block.semantic_confidence_details)),
            provenance: Some(serde_json::json!({"page": block.page, "column": block.column, "block_id": block.id})),
            cleanup_flags: block.price_flags.clone(),
            warnings: block.meta.errors.clone(),
            section_slug: Some(slugify(&current_title)),
            section_position: Some(sections.len()),
            item_position: Some(item_position),
            auto_group_id: None,
        };
        item_position += 1;
        current_items.push(item);
    }

    if !current_items.is_empty() {
        let position = sections.len();
        sections.push(Section { path: current_title.clone(), slug: slugify(&current_title), position, items: current_items, auto_group_id: None, meta: None });
    }

    sections
}

/// Extracts a structured menu payload from a raw PDF or image document
/// (`spec.md` §4.13). Aborts only on input errors (unreadable document, zero
/// pages); everything else degrades into `meta.warnings`/`meta.errors` or
/// per-item price flags (`spec.md` §7).
pub fn extract(
    input: &[u8],
    rasteriser: &dyn Rasteriser,
    ocr: &dyn OcrEngine,
    classifier: Option<&dyn Classifier>,
    cfg: &PipelineConfig,
) -> Result<StructuredMenuPayload> {
    let pages = rasteriser.render(input)?;
    if pages.is_empty() {
        return Err(Error::input("rasteriser produced zero pages"));
    }

    let mut next_id: u64 = 1;
    let mut warnings: Vec<StageWarning> = Vec::new();
    let mut rotation_meta: Vec<serde_json::Value> = Vec::new();
    let mut blocks: Vec<TextBlock> = Vec::new();

    for (page_index, image) in pages {
        let page_blocks = run_page(page_index, image, ocr, cfg, &mut next_id, &mut warnings, &mut rotation_meta);
        blocks.extend(page_blocks);
    }

    run_document_stages(&mut blocks, classifier, cfg);
    let sections = build_payload(&blocks, cfg);

    for warning in &warnings {
        warning.log();
    }

    Ok(StructuredMenuPayload {
        sections,
        meta: Some(PayloadMeta {
            warnings: warnings.into_iter().map(|w| w.message).collect(),
            errors: Vec::new(),
            rotation_scores: rotation_meta,
        }),
        draft_id: None,
        restaurant_id: None,
        title: None,
        source_job_id: None,
    })
}
