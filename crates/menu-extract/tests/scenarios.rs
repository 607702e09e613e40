//! End-to-end cross-item scenarios exercised against small synthetic
//! `TextBlock` fixtures, no OCR engine or image files involved.

use menu_extract::config::CrossItemConfig;
use menu_extract::crossitem::check_cross_item_consistency;
use menu_extract::types::{BBox, FlagReason, Line, PriceCandidate, Severity, TextBlock};

fn item(id: u64, name: &str, category: &str, price_cents: i64) -> TextBlock {
    let mut b = TextBlock::new(
        id,
        0,
        0,
        BBox::default(),
        vec![Line { text: name.into(), bbox: BBox::default(), words: vec![] }],
        name.into(),
    );
    b.category = Some(category.to_string());
    b.price_candidates.push(PriceCandidate { text: String::new(), confidence: 1.0, price_cents: Some(price_cents) });
    b
}

/// Scenario 5: fuzzy duplicate with an OCR typo — one `info`-severity
/// `cross_item_fuzzy_exact_duplicate` flag on each matching item, similarity
/// at or above the 0.82 threshold.
#[test]
fn scenario_5_fuzzy_duplicate_with_ocr_typo() {
    let mut blocks = vec![item(0, "Bufalo Chicken", "Wings", 1299), item(1, "Buffalo Chicken", "Wings", 1299)];
    check_cross_item_consistency(&mut blocks, &CrossItemConfig::default());

    for idx in [0, 1] {
        let flag = blocks[idx]
            .price_flags
            .iter()
            .find(|f| f.reason == FlagReason::CrossItemFuzzyExactDuplicate)
            .unwrap_or_else(|| panic!("item {idx} missing cross_item_fuzzy_exact_duplicate flag"));
        assert_eq!(flag.severity, Severity::Info);
        let similarity = flag.details["similarity"].as_f64().unwrap();
        assert!(similarity >= 0.82, "similarity was {similarity}");
    }
}

/// Scenario 6: cross-category coherence violation — a `Truffle Fries` side
/// priced well above the Pizza category median draws one
/// `cross_category_price_above` flag comparing it against Pizza. The other
/// three "Sides / Appetizers" items give that category's own median enough
/// members to be computed at all (the check requires at least two items
/// per category before it trusts a median).
#[test]
fn scenario_6_cross_category_coherence_violation() {
    let mut blocks = vec![
        item(0, "Cola", "Beverages", 199),
        item(1, "Iced Tea", "Beverages", 299),
        item(2, "Lemonade", "Beverages", 399),
        item(3, "Cheese Pizza", "Pizza", 1299),
        item(4, "Pepperoni Pizza", "Pizza", 1399),
        item(5, "Supreme Pizza", "Pizza", 1499),
        item(6, "Garlic Bread", "Sides / Appetizers", 499),
        item(7, "Mozzarella Sticks", "Sides / Appetizers", 599),
        item(8, "Onion Rings", "Sides / Appetizers", 699),
        item(9, "Truffle Fries", "Sides / Appetizers", 1999),
    ];
    check_cross_item_consistency(&mut blocks, &CrossItemConfig::default());

    let flagged: Vec<usize> =
        (0..blocks.len()).filter(|&i| blocks[i].price_flags.iter().any(|f| f.reason == FlagReason::CrossCategoryPriceAbove)).collect();
    assert_eq!(flagged, vec![9], "expected only the truffle fries item to be flagged above its comparison category");

    let flag = blocks[9].price_flags.iter().find(|f| f.reason == FlagReason::CrossCategoryPriceAbove).unwrap();
    assert_eq!(flag.severity, Severity::Warn);
    assert_eq!(flag.details["compared_category"], "Pizza");
    assert_eq!(flag.details["compared_median_cents"], 1399);

    for idx in 0..=8 {
        assert!(blocks[idx].price_flags.iter().all(|f| f.reason != FlagReason::CrossCategoryPriceAbove));
        assert!(blocks[idx].price_flags.iter().all(|f| f.reason != FlagReason::CrossCategoryPriceBelow));
    }
}
