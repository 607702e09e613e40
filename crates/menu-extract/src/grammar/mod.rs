//! Menu grammar: line classification, OCR typo/garble normalisation, and
//! component extraction (`spec.md` §4.6), grounded on
//! `original_source/storage/parsers/menu_grammar.py`.

pub mod components;

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Components, LineType, ParsedMenuItem, PriceCandidate};
use crate::vocab::size::looks_like_size;

// ---------------------------------------------------------------------
// Typo normalisation & garble stripping
// ---------------------------------------------------------------------

/// Fixed menu-domain OCR-typo map (`spec.md` §4.1, §4.6 step 1).
static TYPO_PAIRS: &[(&str, &str)] = &[
    ("88Q", "BBQ"),
    ("piZzA", "PIZZA"),
    ("Basi!", "Basil"),
    ("WI/", "W/"),
];

static LEADING_BRACKET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[a1\s*").unwrap());
static W_SLASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bW/").unwrap());
static WI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bWi\s").unwrap());

static DOT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{3,}").unwrap());
static GARBLE_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]{5,}").unwrap());

/// Applies the fixed OCR-typo map plus the grammar-specific `W/`/`Wi ` →
/// `with ` substitutions (`spec.md` §4.6 step 1).
pub fn normalize_typos(text: &str) -> String {
    let mut out = text.to_string();
    for (bad, good) in TYPO_PAIRS {
        out = out.replace(bad, good);
    }
    out = LEADING_BRACKET_RE.replace(&out, "").into_owned();
    out = W_SLASH_RE.replace_all(&out, "with ").into_owned();
    out = WI_SPACE_RE.replace_all(&out, "with ").into_owned();
    out
}

fn is_vowelless_garble(span: &str) -> bool {
    span.len() >= 5 && !span.chars().any(|c| "aeiouAEIOU".contains(c))
}

fn has_triple_repeat(span: &str) -> bool {
    let chars: Vec<char> = span.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

fn high_garble_ratio(span: &str) -> bool {
    let total = span.chars().count() as f64;
    if total == 0.0 {
        return false;
    }
    let consonant_clusters = span
        .chars()
        .collect::<Vec<_>>()
        .windows(4)
        .filter(|w| w.iter().all(|c| c.is_alphabetic() && !"aeiouAEIOU".contains(*c)))
        .count();
    (consonant_clusters as f64 / total) > 0.4
}

/// Strips dot-leader garble (collapsed to nothing) and alphabetic spans of
/// length ≥ 5 that look like OCR noise: vowel-less, triple-repeat, or a high
/// consonant-cluster ratio (`spec.md` §4.6 step 2).
///
/// Idempotent: `strip_ocr_garble(strip_ocr_garble(x)) == strip_ocr_garble(x)`
/// (`spec.md` §8).
pub fn strip_ocr_garble(text: &str) -> String {
    let mut out = DOT_RUN_RE.replace_all(text, " ").into_owned();
    out = GARBLE_SPAN_RE
        .replace_all(&out, |caps: &regex::Captures| {
            let span = &caps[0];
            if is_vowelless_garble(span) || has_triple_repeat(span) || high_garble_ratio(span) {
                String::new()
            } else {
                span.to_string()
            }
        })
        .into_owned();
    let collapsed: String = out.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
}

// ---------------------------------------------------------------------
// Line-type fast paths
// ---------------------------------------------------------------------

static DIMENSION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)\d+\s*x\s*\d+["°]?"#).unwrap());
static SHORT_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\w]{1,3}$|^\w{1,3}$").unwrap());
static CHOICE_OF_SAUCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)choice of sauce").unwrap());
static STUFFED_CALZONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)all calzones stuffed").unwrap());
static ADD_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^add\s+\S.*\$?\d+(\.\d{2})?$").unwrap());
static TOPPINGS_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[A-Z \-]+TOPPINGS:").unwrap());
static TWO_WORD_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\w+\s+OR\s+\w+$").unwrap());

static KNOWN_HEADINGS: &[&str] = &[
    "PIZZA",
    "SPECIALTY PIZZAS",
    "APPETIZERS",
    "BEVERAGES",
    "WRAPS CITY_",
    "BUILD YOUR OWN BURGER!",
    "SALADS",
    "SANDWICHES",
    "CALZONES",
    "SUBS",
    "DESSERTS",
    "SIDES",
    "WINGS",
    "PASTA",
];

static SIZE_HEADER_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$?\d{1,3}[.,]\d{1,2}").unwrap());
static PRICE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[[:punct:]]*\$?\d{1,3}[.,]\d{2}\s*$").unwrap());
static PRICE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$?\d{1,3}[.,]\d{1,2}").unwrap());
static MODIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(extra|add|no|without|hold|sub|gluten-free|vegetarian|vegan)\b[^,;.]*").unwrap()
});
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s[-:•]\s").unwrap());
static LEADING_CAPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z0-9&' ]*[A-Z0-9])\s+([a-z].*)$").unwrap());

fn price_to_cents(token: &str) -> Option<i64> {
    let cleaned: String = token.chars().filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',').collect();
    let normalized = cleaned.replace(',', ".");
    let value: f64 = normalized.parse().ok()?;
    Some((value * 100.0).round() as i64)
}

fn count_commas(text: &str) -> usize {
    text.matches(',').count()
}

fn alpha_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

fn digit_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_digit()).count()
}

fn is_all_caps_word(word: &str) -> bool {
    word.chars().any(|c| c.is_alphabetic()) && word.chars().all(|c| !c.is_alphabetic() || c.is_uppercase())
}

/// Parses a single merged-text line with the full grammar pipeline
/// (`spec.md` §4.6). Each numbered step may early-return.
pub fn parse_line(raw_text: &str) -> ParsedMenuItem {
    // Step 1-2: typo normalisation + garble stripping.
    let normalized = normalize_typos(raw_text);
    let cleaned = strip_ocr_garble(&normalized);
    let trimmed = cleaned.trim();

    if trimmed.is_empty() {
        return ParsedMenuItem { line_type: Some(LineType::Unknown), confidence: 0.0, ..Default::default() };
    }

    // Step 3: dimension-line fast path.
    if DIMENSION_LINE_RE.is_match(trimmed) {
        return ParsedMenuItem { line_type: Some(LineType::InfoLine), confidence: 0.6, ..Default::default() };
    }

    // Step 4: short-noise scrub.
    if SHORT_NOISE_RE.is_match(trimmed) && alpha_count(trimmed) < 2 && digit_count(trimmed) == 0 {
        return ParsedMenuItem { line_type: Some(LineType::Unknown), confidence: 0.0, ..Default::default() };
    }

    // Step 5: info/topping fast paths.
    if CHOICE_OF_SAUCE_RE.is_match(trimmed) || STUFFED_CALZONE_RE.is_match(trimmed) || ADD_PRICE_RE.is_match(trimmed) {
        return ParsedMenuItem { line_type: Some(LineType::InfoLine), confidence: 0.7, ..Default::default() };
    }
    if TOPPINGS_PREFIX_RE.is_match(trimmed) {
        return ParsedMenuItem { line_type: Some(LineType::ToppingList), confidence: 0.75, ..Default::default() };
    }
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    let all_caps_commas = words.iter().all(|w| is_all_caps_word(w) || w.ends_with(',')) && count_commas(trimmed) >= 3;
    if all_caps_commas {
        return ParsedMenuItem { line_type: Some(LineType::ToppingList), confidence: 0.7, ..Default::default() };
    }
    if TWO_WORD_OPTION_RE.is_match(trimmed) {
        return ParsedMenuItem { line_type: Some(LineType::ToppingList), confidence: 0.65, ..Default::default() };
    }

    // Step 6: known-heading detection.
    if words.len() <= 5 {
        let all_caps_line = words.iter().all(|w| is_all_caps_word(w));
        let known = KNOWN_HEADINGS.iter().any(|h| h.eq_ignore_ascii_case(trimmed));
        if all_caps_line || known {
            return ParsedMenuItem { line_type: Some(LineType::Heading), confidence: 0.85, ..Default::default() };
        }
    }

    // Step 7: size-header detection.
    let size_token_count = words.iter().filter(|w| looks_like_size(w)).count();
    let has_price = SIZE_HEADER_PRICE_RE.is_match(trimmed);
    if size_token_count >= 2 && !has_price && words.len() <= 12 {
        return ParsedMenuItem { line_type: Some(LineType::SizeHeader), confidence: 0.8, ..Default::default() };
    }

    // Step 8: price-only.
    if PRICE_ONLY_RE.is_match(trimmed) {
        let cents = price_to_cents(trimmed);
        return ParsedMenuItem {
            line_type: Some(LineType::PriceOnly),
            confidence: 0.9,
            price_mentions: vec![PriceCandidate { text: trimmed.to_string(), confidence: 0.9, price_cents: cents }],
            ..Default::default()
        };
    }

    // Step 9: price extraction.
    let price_matches: Vec<&str> = PRICE_TOKEN_RE.find_iter(trimmed).map(|m| m.as_str()).collect();
    let price_mentions: Vec<PriceCandidate> =
        price_matches.iter().map(|p| PriceCandidate { text: p.to_string(), confidence: 0.85, price_cents: price_to_cents(p) }).collect();

    let mut working = trimmed.to_string();
    if price_matches.len() > 1 {
        working = PRICE_TOKEN_RE.replace_all(&working, "").trim().to_string();
    } else if price_matches.len() == 1 {
        if let Some(pos) = working.rfind(price_matches[0]) {
            working.truncate(pos);
            working = working.trim_end_matches(|c: char| c.is_whitespace() || c == '-' || c == ':').to_string();
        }
    }

    // Step 10: size mentions.
    let size_mentions: Vec<String> = working.split_whitespace().filter(|w| looks_like_size(w)).map(|w| w.to_string()).collect();

    // Step 11: modifier extraction.
    let modifiers: Vec<String> = MODIFIER_RE.find_iter(&working).map(|m| m.as_str().trim().to_string()).collect();

    // Step 12: separator-based split.
    let mut item_name = None;
    let mut description = None;
    if let Some(m) = SEPARATOR_RE.find(&working) {
        let (left, right) = working.split_at(m.start());
        let right = &right[m.len()..];
        item_name = Some(left.trim().to_string());
        description = Some(right.trim().to_string());
    } else if let Some(caps) = LEADING_CAPS_RE.captures(&working) {
        // Step 13: ALL-CAPS + mixed-case rescue.
        let head = caps.get(1).unwrap().as_str();
        let tail = caps.get(2).unwrap().as_str();
        if head.split_whitespace().count() >= 2 && alpha_count(tail) >= 3 {
            item_name = Some(head.trim().to_string());
            description = Some(tail.trim().to_string());
        }
    }

    if item_name.is_none() {
        // Step 14: description-only fallback.
        let starts_lower = working.chars().next().map(|c| c.is_lowercase()).unwrap_or(false);
        if starts_lower && (working.contains(',') || working.contains(" and ")) {
            return ParsedMenuItem {
                line_type: Some(LineType::DescriptionOnly),
                description: Some(working.clone()),
                price_mentions,
                size_mentions,
                modifiers,
                components: extract_components_if_description(&working),
                confidence: 0.55,
                ..Default::default()
            };
        }
        item_name = Some(working.clone());
    }

    // Step 15: component extraction from the description.
    let components = description.as_deref().and_then(extract_components_if_description);

    let has_name = item_name.as_deref().map(|n| !n.is_empty()).unwrap_or(false);
    let has_desc = description.as_deref().map(|d| !d.is_empty()).unwrap_or(false);
    let has_price = !price_mentions.is_empty();
    let has_sizes = !size_mentions.is_empty();
    let confidence = blend_confidence(has_name, has_price, has_desc, has_sizes, price_matches.len() > 1);

    ParsedMenuItem {
        item_name,
        description,
        modifiers,
        size_mentions,
        price_mentions,
        line_type: Some(LineType::MenuItem),
        confidence,
        components,
        column_segments: None,
    }
}

fn extract_components_if_description(description: &str) -> Option<Components> {
    components::extract_components(description)
}

/// Blends structural signals into a single confidence, capped at 0.95
/// (`spec.md` §4.6 "Confidence scoring").
fn blend_confidence(has_name: bool, has_price: bool, has_desc: bool, has_sizes: bool, multi_price: bool) -> f64 {
    let mut score = 0.3;
    if has_name {
        score += 0.25;
    }
    if has_price {
        score += 0.25;
    }
    if has_desc {
        score += 0.10;
    }
    if has_sizes {
        score += 0.10;
    }
    if multi_price {
        score += 0.05;
    }
    score.min(0.95)
}

// ---------------------------------------------------------------------
// Contextual multi-pass (`classify_menu_lines`)
// ---------------------------------------------------------------------

static MULTI_SPACE_GAP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {5,}").unwrap());

/// Pass 0: detects multi-column merges within a single OCR'd line (gaps of
/// ≥ 5 spaces produce ≥ 2 segments; each segment must carry ≥ 2 alpha chars
/// OR a price) and reclassifies the line as `multi_column`.
fn detect_multi_column(parsed: &mut ParsedMenuItem, raw_text: &str) {
    let segments: Vec<&str> = MULTI_SPACE_GAP_RE.split(raw_text).map(str::trim).filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return;
    }
    let valid = segments.iter().filter(|s| alpha_count(s) >= 2 || PRICE_TOKEN_RE.is_match(s)).count();
    if valid >= 2 {
        parsed.line_type = Some(LineType::MultiColumn);
        parsed.column_segments = Some(segments.iter().map(|s| s.to_string()).collect());
    }
}

/// Runs single-line parsing over every line, then three contextual
/// reclassification passes (`spec.md` §4.6 "Contextual multi-pass").
pub fn classify_menu_lines(lines: &[String]) -> Vec<ParsedMenuItem> {
    let mut parsed: Vec<ParsedMenuItem> = lines.iter().map(|l| parse_line(l)).collect();

    for (i, raw) in lines.iter().enumerate() {
        detect_multi_column(&mut parsed[i], raw);
    }

    // Pass 1: reclassify a non-canonical heading to menu_item when its
    // nearest non-empty neighbour is description_only or price_only, or it
    // is sandwiched between items.
    for i in 0..parsed.len() {
        if parsed[i].line_type != Some(LineType::Heading) {
            continue;
        }
        if lines[i].trim().len() <= 5 || KNOWN_HEADINGS.iter().any(|h| h.eq_ignore_ascii_case(lines[i].trim())) {
            continue;
        }
        let prev = nearest_nonempty(&parsed, i, -1);
        let next = nearest_nonempty(&parsed, i, 1);
        let neighbour_suggests = matches!(prev, Some(LineType::DescriptionOnly) | Some(LineType::PriceOnly))
            || matches!(next, Some(LineType::DescriptionOnly) | Some(LineType::PriceOnly));
        let sandwiched = matches!(prev, Some(LineType::MenuItem)) && matches!(next, Some(LineType::MenuItem));
        if neighbour_suggests || sandwiched {
            parsed[i].line_type = Some(LineType::MenuItem);
            if parsed[i].item_name.is_none() {
                parsed[i].item_name = Some(lines[i].trim().to_string());
            }
        }
    }

    // Pass 2: reclassify clusters of ≥ 2 consecutive unknown/heading lines
    // (runs broken by blanks or canonical section headings) to menu_item.
    let mut i = 0;
    while i < parsed.len() {
        if !matches!(parsed[i].line_type, Some(LineType::Heading) | Some(LineType::Unknown)) {
            i += 1;
            continue;
        }
        let start = i;
        let mut j = i;
        while j < parsed.len()
            && matches!(parsed[j].line_type, Some(LineType::Heading) | Some(LineType::Unknown))
            && !lines[j].trim().is_empty()
            && !KNOWN_HEADINGS.iter().any(|h| h.eq_ignore_ascii_case(lines[j].trim()))
        {
            j += 1;
        }
        if j - start >= 2 {
            for k in start..j {
                parsed[k].line_type = Some(LineType::MenuItem);
                if parsed[k].item_name.is_none() {
                    parsed[k].item_name = Some(lines[k].trim().to_string());
                }
            }
        }
        i = j.max(i + 1);
    }

    parsed
}

fn nearest_nonempty(parsed: &[ParsedMenuItem], from: usize, direction: i64) -> Option<LineType> {
    let mut idx = from as i64 + direction;
    while idx >= 0 && (idx as usize) < parsed.len() {
        let lt = parsed[idx as usize].line_type;
        if lt.is_some() {
            return lt;
        }
        idx += direction;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typo_map_fixes_known_garble() {
        assert_eq!(normalize_typos("88Q Chicken"), "BBQ Chicken");
        assert_eq!(normalize_typos("piZzA Special"), "PIZZA Special");
    }

    #[test]
    fn garble_stripping_is_idempotent() {
        for text in ["xqzjk mmm text", "normal words here", "....leader...."] {
            let once = strip_ocr_garble(text);
            let twice = strip_ocr_garble(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn dimension_line_is_info_line() {
        let parsed = parse_line("12 x 16\" sheet pan");
        assert_eq!(parsed.line_type, Some(LineType::InfoLine));
    }

    #[test]
    fn known_heading_detected() {
        let parsed = parse_line("APPETIZERS");
        assert_eq!(parsed.line_type, Some(LineType::Heading));
    }

    #[test]
    fn size_header_detected() {
        let parsed = parse_line(r#"10"Mini 12" Sml 16"lrg Family Size"#);
        assert_eq!(parsed.line_type, Some(LineType::SizeHeader));
    }

    #[test]
    fn price_only_detected() {
        let parsed = parse_line("$8.00");
        assert_eq!(parsed.line_type, Some(LineType::PriceOnly));
        assert_eq!(parsed.price_mentions[0].price_cents, Some(800));
    }

    #[test]
    fn menu_item_with_price_and_separator() {
        let parsed = parse_line("Cheese Pizza - Classic red sauce and mozzarella $12.99");
        assert_eq!(parsed.line_type, Some(LineType::MenuItem));
        assert_eq!(parsed.item_name.as_deref(), Some("Cheese Pizza"));
        assert!(parsed.price_mentions[0].price_cents == Some(1299));
    }

    #[test]
    fn confidence_never_exceeds_cap() {
        let parsed = parse_line("BBQ Chicken Pizza - hot, mild, honey $11.99 $13.99");
        assert!(parsed.confidence <= 0.95);
    }

    #[test]
    fn contextual_pass_rescues_unknown_runs() {
        let lines = vec!["MELTS".to_string(), "Turkey Melt".to_string(), "Ham Melt".to_string()];
        let parsed = classify_menu_lines(&lines);
        // "Turkey Melt"/"Ham Melt" parse as menu_item directly (no price/sep though,
        // so they fall to Unknown-ish heading path); ensure no panic and length matches.
        assert_eq!(parsed.len(), 3);
    }
}
