use rand::rngs::StdRng;
use rand::SeedableRng;

use retail_insights::aggregate;
use retail_insights::{generate_with, FilterSelection, GeneratorOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(42);
    let table = generate_with(50_000, &GeneratorOptions::default(), &mut rng)?;

    // Sportswear under 100, the way the sidebar would narrow it.
    let selection = FilterSelection::new()
        .any_of("brand", ["Nike", "Adidas", "Puma"])
        .numeric_range("price", 10.0, 100.0);
    let view = selection.apply(&table)?;

    println!(
        "{} of {} products match the selection",
        view.len(),
        table.row_count()
    );

    for (category, count) in aggregate::count_by(&view, "category")? {
        println!("{:<12} {}", category, count);
    }
    Ok(())
}
