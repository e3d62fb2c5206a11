use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use retail_insights::{generate_with, CachedQueries, FilterSelection, GeneratorOptions, QueryCache};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(7);
    let table = generate_with(200_000, &GeneratorOptions::default(), &mut rng)?;

    let selection = FilterSelection::new().any_of("gender", ["Women", "Unisex"]);
    let cache = QueryCache::new();
    let queries = CachedQueries::new(selection.apply(&table)?, selection, Some(&cache));

    // First run computes and fills the cache.
    let start = Instant::now();
    let counts = queries.count_by("category")?;
    println!(
        "first run: {} categories, elapsed {:?}",
        counts.len(),
        start.elapsed()
    );

    // Second run replays the stored result.
    let start = Instant::now();
    let cached = queries.count_by("category")?;
    println!(
        "cached run: {} categories, elapsed {:?}",
        cached.len(),
        start.elapsed()
    );

    let (hits, misses) = cache.stats();
    println!("cache stats: {} hits, {} misses", hits, misses);
    Ok(())
}
