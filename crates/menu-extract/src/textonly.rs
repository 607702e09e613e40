//! Text-only path (`spec.md` §1): parses already-OCR'd raw text with no
//! geometry into the same [`TextBlock`] shape the image pipeline produces,
//! then joins it at the grammar/category/variant/cross-item/confidence
//! stages so both paths share every downstream check.
//!
//! Grounded on `original_source/storage/ai_ocr_helper.py`'s regex-extraction
//! half (header detection, drop-line blacklist); the Claude-invocation half
//! of that module is out of scope per `spec.md` §1 Non-goals.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::{build_payload, run_document_stages};
use crate::traits::Classifier;
use crate::types::{BBox, PayloadMeta, Role, StructuredMenuPayload, TextBlock};

/// Keywords that mark a short, capsish line as a section header rather than
/// an item.
const HEADER_WORDS: &[&str] = &[
    "pizza", "pizzas", "specialty", "wings", "salads", "beverages", "drinks", "burgers", "sandwiches", "subs", "sides", "apps",
    "calzones", "stromboli", "pasta", "appetizers",
];

/// Housekeeping lines that never describe a menu item.
const DROP_LINE_PREFIXES: &[&str] = &["tax", "delivery", "fees", "minimum", "we reserve", "no substitutions"];
const DROP_LINE_SUBSTRINGS: &[&str] =
    &["topping", "toppings", "build your own", "build-your-own", "add-ons", "add on", "extras", "slice", "by the slice", "per slice"];

static LEADING_PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s:;,\-\x{2013}\x{2014}\x{2022}\x{00b7}]+").unwrap());

fn alpha_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
    alpha as f64 / text.chars().count() as f64
}

fn is_drop_line(line: &str) -> bool {
    let low = line.to_lowercase();
    if low.trim().is_empty() {
        return false;
    }
    if DROP_LINE_SUBSTRINGS.iter().any(|w| low.contains(w)) {
        return true;
    }
    DROP_LINE_PREFIXES.iter().any(|p| low.starts_with(p))
}

/// A line reads as a section header when it's short, mostly upper-case, and
/// either all-caps or carries a known category keyword.
fn looks_like_header(line: &str) -> bool {
    let letters: String = line.chars().filter(|c| c.is_alphabetic() || *c == '&' || c.is_whitespace()).collect();
    let alpha_count = letters.chars().filter(|c| c.is_alphabetic()).count();
    if alpha_count == 0 {
        return false;
    }
    let upper_count = letters.chars().filter(|c| c.is_alphabetic() && c.is_uppercase()).count();
    let all_capsish = upper_count as f64 >= 0.8 * alpha_count as f64;
    let shortish = letters.split_whitespace().count() <= 5;
    let has_keyword = HEADER_WORDS.iter().any(|w| line.to_lowercase().contains(w));
    (all_capsish && shortish && alpha_ratio(line) >= 0.5) || has_keyword
}

fn normalize_header(line: &str) -> String {
    let stripped = LEADING_PUNCT_RE.replace(line, "").into_owned();
    if stripped.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()) {
        title_case(&stripped)
    } else {
        stripped
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses raw, already-OCR'd menu text with no geometry into a
/// [`StructuredMenuPayload`], running the same category/variant/price/
/// cross-item/confidence stages the image pipeline uses.
pub fn parse_text_only(raw_text: &str, classifier: Option<&dyn Classifier>, cfg: &PipelineConfig) -> Result<StructuredMenuPayload> {
    let mut next_id: u64 = 1;
    let mut blocks: Vec<TextBlock> = Vec::new();

    for raw_line in raw_text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_drop_line(line) {
            continue;
        }

        let is_heading = looks_like_header(line);
        let text = if is_heading { normalize_header(line) } else { line.to_string() };

        let mut block = TextBlock::new(next_id, 0, 0, BBox::default(), Vec::new(), text);
        next_id += 1;
        block.is_heading = is_heading;
        block.role = Some(if is_heading { Role::Heading } else { Role::Item });
        blocks.push(block);
    }

    run_document_stages(&mut blocks, classifier, cfg);
    let sections = build_payload(&blocks, cfg);

    Ok(StructuredMenuPayload {
        sections,
        meta: Some(PayloadMeta::default()),
        draft_id: None,
        restaurant_id: None,
        title: None,
        source_job_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_line_starts_a_new_section() {
        let cfg = PipelineConfig::default();
        let text = "PIZZA\nCheese Pizza .... 12.99\nWINGS\nBuffalo Wings .... 9.99";
        let payload = parse_text_only(text, None, &cfg).unwrap();
        assert_eq!(payload.sections.len(), 2);
        assert_eq!(payload.sections[0].path, "Pizza");
        assert_eq!(payload.sections[1].path, "Wings");
    }

    #[test]
    fn drop_lines_never_become_items() {
        let cfg = PipelineConfig::default();
        let text = "SIDES\nBuild Your Own Toppings\nMozzarella Sticks $7.99";
        let payload = parse_text_only(text, None, &cfg).unwrap();
        let items: Vec<_> = payload.sections.iter().flat_map(|s| s.items.iter()).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].name.to_lowercase().contains("mozzarella"));
    }

    #[test]
    fn item_with_inline_price_gets_a_price() {
        let cfg = PipelineConfig::default();
        let text = "BURGERS\nBacon Cheeseburger $11.50";
        let payload = parse_text_only(text, None, &cfg).unwrap();
        let items: Vec<_> = payload.sections.iter().flat_map(|s| s.items.iter()).collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price_cents, 1150);
    }

    #[test]
    fn blank_input_produces_no_sections() {
        let cfg = PipelineConfig::default();
        let payload = parse_text_only("", None, &cfg).unwrap();
        assert!(payload.sections.is_empty());
    }
}
