//! Synthetic product catalog generation.
//!
//! Column-at-a-time assembly straight into a [`DataTable`]; every stochastic
//! field draws from the shared vocabulary or a fixed numeric window, so a
//! seeded RNG reproduces the exact same table.

use chrono::{Duration, Local, NaiveDate};
use rand::Rng;

use crate::table::column::date_to_secs;
use crate::table::data_table::{DataTable, TableBuilder};
use crate::table::PipelineError;
use crate::vocab::{BRANDS, CATEGORIES, COLORS, GENDERS, SIZES, STYLE_WORDS};

/// How far back `date_added` may fall, in days before the reference date.
pub const DATE_WINDOW_DAYS: i64 = 730;

pub const PRICE_RANGE: (f64, f64) = (10.0, 500.0);
pub const STOCK_RANGE: (i64, i64) = (0, 100);
pub const RATING_RANGE: (f64, f64) = (1.0, 5.0);

#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Adds a display `name` column composed from brand, style word and
    /// category.
    pub include_name: bool,
    /// Reference date for the `date_added` window; the local date when
    /// unset.
    pub today: Option<NaiveDate>,
}

/// Generates `rows` products with ambient randomness.
pub fn generate(rows: usize) -> Result<DataTable, PipelineError> {
    generate_with(rows, &GeneratorOptions::default(), &mut rand::rng())
}

/// Generates `rows` products from the caller's RNG.
///
/// Product ids are sequential (`P00001`, `P00002`, ...); every other field
/// is drawn independently per row. Prices carry two decimals, ratings one.
pub fn generate_with<R: Rng + ?Sized>(
    rows: usize,
    options: &GeneratorOptions,
    rng: &mut R,
) -> Result<DataTable, PipelineError> {
    let today = options.today.unwrap_or_else(|| Local::now().date_naive());

    let brands: Vec<&str> = (0..rows).map(|_| pick(rng, BRANDS)).collect();
    let categories: Vec<&str> = (0..rows).map(|_| pick(rng, CATEGORIES)).collect();
    let genders: Vec<&str> = (0..rows).map(|_| pick(rng, GENDERS)).collect();
    let colors: Vec<&str> = (0..rows).map(|_| pick(rng, COLORS)).collect();
    let sizes: Vec<&str> = (0..rows).map(|_| pick(rng, SIZES)).collect();

    let prices: Vec<f64> = (0..rows)
        .map(|_| round_to(rng.random_range(PRICE_RANGE.0..=PRICE_RANGE.1), 100.0))
        .collect();
    let stock: Vec<i64> = (0..rows)
        .map(|_| rng.random_range(STOCK_RANGE.0..=STOCK_RANGE.1))
        .collect();
    let ratings: Vec<f64> = (0..rows)
        .map(|_| round_to(rng.random_range(RATING_RANGE.0..=RATING_RANGE.1), 10.0))
        .collect();
    let dates: Vec<i64> = (0..rows)
        .map(|_| {
            let days_back = rng.random_range(0..=DATE_WINDOW_DAYS);
            date_to_secs(today - Duration::days(days_back))
        })
        .collect();

    let mut builder = TableBuilder::new();
    builder.push_str_column("product_id", (1..=rows).map(|i| format!("P{:05}", i)));
    if options.include_name {
        builder.push_str_column(
            "name",
            brands
                .iter()
                .zip(&categories)
                .map(|(brand, category)| {
                    format!("{} {} {}", brand, pick(rng, STYLE_WORDS), category)
                })
                .collect::<Vec<_>>(),
        );
    }
    builder
        .push_str_column("brand", brands)
        .push_str_column("category", categories)
        .push_str_column("gender", genders)
        .push_str_column("color", colors)
        .push_str_column("size", sizes)
        .push_float_column("price", prices)
        .push_int_column("stock", stock)
        .push_float_column("rating", ratings)
        .push_date_column("date_added", dates);
    builder.finish()
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, values: &[&'a str]) -> &'a str {
    values[rng.random_range(0..values.len())]
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column::secs_to_datetime;
    use crate::vocab;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed_options() -> GeneratorOptions {
        GeneratorOptions {
            include_name: false,
            today: NaiveDate::from_ymd_opt(2024, 6, 1),
        }
    }

    #[test]
    fn same_seed_same_table() {
        let options = fixed_options();
        let a = generate_with(200, &options, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = generate_with(200, &options, &mut StdRng::seed_from_u64(42)).unwrap();
        assert!(a.content_eq(&b));
    }

    #[test]
    fn different_seeds_differ() {
        let options = fixed_options();
        let a = generate_with(200, &options, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = generate_with(200, &options, &mut StdRng::seed_from_u64(2)).unwrap();
        assert!(!a.content_eq(&b));
    }

    #[test]
    fn ids_are_sequential_and_padded() {
        let table = generate_with(3, &fixed_options(), &mut StdRng::seed_from_u64(7)).unwrap();
        let ids: Vec<&str> = table.str_values("product_id").unwrap().collect();
        assert_eq!(ids, vec!["P00001", "P00002", "P00003"]);
    }

    #[test]
    fn fields_stay_inside_their_windows() {
        let options = fixed_options();
        let table = generate_with(500, &options, &mut StdRng::seed_from_u64(42)).unwrap();

        for price in table.floats_of("price").unwrap() {
            assert!((PRICE_RANGE.0..=PRICE_RANGE.1).contains(price));
            assert_eq!((price * 100.0).round() / 100.0, *price);
        }
        for rating in table.floats_of("rating").unwrap() {
            assert!((RATING_RANGE.0..=RATING_RANGE.1).contains(rating));
        }
        for stock in table.ints_of("stock").unwrap() {
            assert!((STOCK_RANGE.0..=STOCK_RANGE.1).contains(stock));
        }

        let today = options.today.unwrap();
        let earliest = today - Duration::days(DATE_WINDOW_DAYS);
        for &secs in table.dates_of("date_added").unwrap() {
            let date = secs_to_datetime(secs).unwrap().date();
            assert!(date >= earliest && date <= today);
        }
    }

    #[test]
    fn categorical_columns_use_the_vocabulary() {
        let table = generate_with(300, &fixed_options(), &mut StdRng::seed_from_u64(42)).unwrap();
        let drift = vocab::check_table(&table);
        assert!(drift.is_empty(), "unexpected values: {:?}", drift);
    }

    #[test]
    fn name_column_is_opt_in() {
        let without = generate_with(5, &fixed_options(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert!(!without.has_column("name"));

        let options = GeneratorOptions {
            include_name: true,
            ..fixed_options()
        };
        let with = generate_with(5, &options, &mut StdRng::seed_from_u64(3)).unwrap();
        let brands: Vec<&str> = with.str_values("brand").unwrap().collect();
        let names: Vec<&str> = with.str_values("name").unwrap().collect();
        for (name, brand) in names.iter().zip(brands) {
            assert!(name.starts_with(brand));
        }
    }
}
