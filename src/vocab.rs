//! Fixed product vocabulary shared by the synthetic generator and the
//! validation/filter layers.
//!
//! Both halves of the pipeline read these constants: the generator draws
//! field values from them, and the loader checks persisted datasets against
//! them so the two can never drift apart.

use std::collections::BTreeMap;

use crate::table::data_table::DataTable;

pub const BRANDS: &[&str] = &[
    "Zara", "H&M", "Uniqlo", "Nike", "Adidas", "Levi's", "Gucci", "Prada", "Forever21", "Puma",
];

pub const CATEGORIES: &[&str] = &[
    "T-Shirts",
    "Jeans",
    "Dresses",
    "Jackets",
    "Shoes",
    "Accessories",
    "Skirts",
    "Sweaters",
    "Shorts",
    "Bags",
];

pub const GENDERS: &[&str] = &["Men", "Women", "Unisex", "Kids"];

pub const COLORS: &[&str] = &[
    "Red", "Blue", "Black", "White", "Green", "Yellow", "Pink", "Purple", "Gray", "Brown",
];

pub const SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL"];

/// Adjectives used when the optional `name` column is generated.
pub const STYLE_WORDS: &[&str] = &[
    "Classic", "Sport", "Premium", "Casual", "Vintage", "Urban", "Slim", "Relaxed",
];

/// Categorical columns whose values are constrained to a fixed enumeration,
/// in the order the dashboard presents them.
pub fn dimensions() -> &'static [&'static str] {
    &["brand", "category", "gender", "color", "size"]
}

/// Allowed values for a vocabulary-driven column, or `None` for free-form
/// columns.
pub fn values_for(column: &str) -> Option<&'static [&'static str]> {
    match column {
        "brand" => Some(BRANDS),
        "category" => Some(CATEGORIES),
        "gender" => Some(GENDERS),
        "color" => Some(COLORS),
        "size" => Some(SIZES),
        _ => None,
    }
}

pub fn is_known(column: &str, value: &str) -> bool {
    values_for(column).is_some_and(|values| values.contains(&value))
}

/// Counts values outside the vocabulary, per dimension column present in
/// `table`. An empty map means the table is clean. Callers surface drift as
/// a warning; nothing here rejects data.
pub fn check_table(table: &DataTable) -> BTreeMap<String, usize> {
    let mut drift = BTreeMap::new();
    for &column in dimensions() {
        let Ok(values) = table.str_values(column) else {
            continue;
        };
        let unknown = values
            .filter(|value| !value.is_empty() && !is_known(column, value))
            .count();
        if unknown > 0 {
            drift.insert(column.to_string(), unknown);
        }
    }
    drift
}
