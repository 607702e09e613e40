//! Category keywords, price bands, and cross-category price-ordering rules
//! (`spec.md` §4.9, §4.11.5), grounded exactly on
//! `original_source/storage/category_infer.py` and `cross_item.py`'s
//! `_CROSS_CAT_PRICE_RULES`.

use std::sync::LazyLock;

use indexmap::IndexMap;

/// Closed set of categories, in the order `spec.md` §4.9 lists them.
/// Iteration order is deterministic — relied on for scoring determinism.
pub static CATEGORY_KEYWORDS: LazyLock<IndexMap<&'static str, &'static [&'static str]>> = LazyLock::new(|| {
    IndexMap::from_iter([
        ("Pizza", &["pizza", "pie", "sicilian", "neapolitan", "margherita", "slice", "toppings", "pizzeria"][..]),
        ("Calzones / Stromboli", &["calzone", "stromboli", "roll", "stuffed", "folded"][..]),
        ("Subs / Sandwiches", &["sub", "hoagie", "grinder", "sandwich", "wrap", "panini", "gyro"][..]),
        ("Burgers", &["burger", "cheeseburger", "patty", "bacon burger"][..]),
        ("Wings", &["wing", "wings", "buffalo", "boneless", "drumette"][..]),
        ("Salads", &["salad", "garden", "caesar", "chef salad", "antipasto"][..]),
        (
            "Pasta",
            &["pasta", "spaghetti", "ziti", "penne", "lasagna", "ravioli", "alfredo", "carbonara", "bolognese"][..],
        ),
        (
            "Sides / Appetizers",
            &[
                "fries",
                "fry",
                "onion rings",
                "mozzarella stick",
                "stick",
                "appetizer",
                "app",
                "garlic bread",
                "breadstick",
                "bread stick",
                "jalapeno popper",
                "cheese stick",
            ][..],
        ),
        (
            "Desserts",
            &["dessert", "brownie", "cookie", "cheesecake", "tiramisu", "cannoli", "ice cream", "lava cake", "cinnamon"]
                [..],
        ),
        (
            "Beverages",
            &[
                "soda",
                "pop",
                "drink",
                "beverage",
                "juice",
                "tea",
                "coffee",
                "coke",
                "pepsi",
                "sprite",
                "mountain dew",
                "root beer",
                "bottle",
                "can",
                "2 liter",
                "2-liter",
                "liter",
            ][..],
        ),
    ])
});

/// `(min_cents, max_cents)` per category.
pub static CATEGORY_PRICE_BANDS: LazyLock<IndexMap<&'static str, (i64, i64)>> = LazyLock::new(|| {
    IndexMap::from_iter([
        ("Pizza", (799, 3999)),
        ("Calzones / Stromboli", (899, 2499)),
        ("Subs / Sandwiches", (699, 1999)),
        ("Burgers", (699, 1999)),
        ("Wings", (699, 2499)),
        ("Salads", (499, 1599)),
        ("Pasta", (899, 2499)),
        ("Sides / Appetizers", (299, 1499)),
        ("Desserts", (299, 1499)),
        ("Beverages", (99, 799)),
    ])
});

/// A closed `(cheap_category, expensive_category)` coherence rule
/// (`spec.md` §4.11.5).
#[derive(Clone, Copy, Debug)]
pub struct CrossCategoryRule {
    pub cheap: &'static str,
    pub expensive: &'static str,
}

pub static CROSS_CATEGORY_PRICE_RULES: LazyLock<Vec<CrossCategoryRule>> = LazyLock::new(|| {
    vec![
        CrossCategoryRule { cheap: "Beverages", expensive: "Pizza" },
        CrossCategoryRule { cheap: "Beverages", expensive: "Burgers" },
        CrossCategoryRule { cheap: "Beverages", expensive: "Pasta" },
        CrossCategoryRule { cheap: "Sides / Appetizers", expensive: "Burgers" },
        CrossCategoryRule { cheap: "Sides / Appetizers", expensive: "Pizza" },
        CrossCategoryRule { cheap: "Sides / Appetizers", expensive: "Pasta" },
        CrossCategoryRule { cheap: "Desserts", expensive: "Pasta" },
        CrossCategoryRule { cheap: "Desserts", expensive: "Pizza" },
        CrossCategoryRule { cheap: "Salads", expensive: "Pizza" },
    ]
});

pub const DEFAULT_FALLBACK_CATEGORY: &str = "Uncategorized";
