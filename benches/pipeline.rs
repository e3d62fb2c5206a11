use std::io::Write;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use jemallocator::Jemalloc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::NamedTempFile;

use retail_insights::aggregate;
use retail_insights::{
    generate_with, ingest, CachedQueries, DataTable, FilterSelection, GeneratorOptions,
    QueryCache, TableView,
};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const ROWS: usize = 100_000;

fn catalog() -> DataTable {
    let mut rng = StdRng::seed_from_u64(42);
    generate_with(ROWS, &GeneratorOptions::default(), &mut rng).unwrap()
}

fn sales_csv() -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    writeln!(tmp, "InvoiceNo,Quantity,InvoiceDate,UnitPrice,Country").unwrap();
    for i in 0..ROWS {
        writeln!(
            tmp,
            "{},{},12/{}/2010 {}:{:02},{}.{:02},Country{}",
            536_365 + i / 8,
            1 + i % 24,
            1 + i % 28,
            8 + i % 12,
            i % 60,
            1 + i % 45,
            i % 38,
            i % 8
        )
        .unwrap();
    }
    tmp.flush().unwrap();
    tmp
}

fn pipeline_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("RetailInsights");
    group.sample_size(10);
    group.throughput(Throughput::Elements(ROWS as u64));

    group.bench_function("generate_catalog", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(42);
            generate_with(ROWS, &GeneratorOptions::default(), &mut rng).unwrap()
        })
    });

    let table = catalog();
    let selection = FilterSelection::new()
        .any_of("brand", ["Nike", "Adidas", "Puma"])
        .numeric_range("price", 50.0, 250.0);

    group.bench_function("filter_brand_and_price", |b| {
        b.iter(|| selection.apply(&table).unwrap().len())
    });

    let view = TableView::all(&table);
    group.bench_function("count_by_category", |b| {
        b.iter(|| aggregate::count_by(&view, "category").unwrap())
    });

    group.bench_function("count_by_category_cached", |b| {
        let cache = QueryCache::new();
        let queries = CachedQueries::new(
            TableView::all(&table),
            FilterSelection::new(),
            Some(&cache),
        );
        b.iter(|| queries.count_by("category").unwrap())
    });

    let csv = sales_csv();
    group.bench_function("ingest_sales_csv", |b| {
        b.iter(|| ingest(csv.path()).unwrap())
    });

    group.finish();
}

criterion_group!(benches, pipeline_benches);
criterion_main!(benches);
