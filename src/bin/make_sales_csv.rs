use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};

use chrono::{Duration, NaiveDate};
use rand::Rng;

/// Stock code, description and unit price of the catalog the sample
/// export draws from.
const PRODUCTS: &[(&str, &str, f64)] = &[
    ("85123A", "WHITE HANGING HEART T-LIGHT HOLDER", 2.55),
    ("71053", "WHITE METAL LANTERN", 3.39),
    ("84406B", "CREAM CUPID HEARTS COAT HANGER", 2.75),
    ("84029G", "KNITTED UNION FLAG HOT WATER BOTTLE", 3.39),
    ("22752", "SET 7 BABUSHKA NESTING BOXES", 7.65),
    ("21730", "GLASS STAR FROSTED T-LIGHT HOLDER", 4.25),
    ("22633", "HAND WARMER UNION JACK", 1.85),
    ("22960", "JAM MAKING SET WITH JARS", 4.25),
    ("84879", "ASSORTED COLOUR BIRD ORNAMENT", 1.69),
    ("22423", "REGENCY CAKESTAND 3 TIER", 12.75),
];

const COUNTRIES: &[&str] = &[
    "United Kingdom",
    "France",
    "Germany",
    "Netherlands",
    "Spain",
    "Portugal",
    "EIRE",
    "Australia",
];

/// Writes a sample sales export in the shape the CSV dashboard expects.
/// Usage: `make_sales_csv [path] [rows]`, defaulting to `data.csv` with
/// 100,000 rows. Some invoices are returns (negative quantity, `C`
/// prefix) and a quarter of them carry no customer id.
fn main() {
    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "data.csv".to_string());
    let rows: usize = args
        .next()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(100_000);

    let file = File::create(&path).unwrap();
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country"
    )
    .unwrap();

    let mut rng = rand::rng();
    let window_start = NaiveDate::from_ymd_opt(2010, 12, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let mut invoice = 536_365u32;
    let mut written = 0usize;
    while written < rows {
        let lines = rng.random_range(1..=8).min(rows - written);
        let is_return = rng.random_range(0..50) == 0;
        let timestamp = window_start + Duration::minutes(rng.random_range(0..540_000));
        let customer: Option<u32> = if rng.random_range(0..4) == 0 {
            None
        } else {
            Some(rng.random_range(12_346..=18_287))
        };
        let country = COUNTRIES[rng.random_range(0..COUNTRIES.len())];
        let invoice_no = if is_return {
            format!("C{}", invoice)
        } else {
            invoice.to_string()
        };

        for _ in 0..lines {
            let (code, description, price) = PRODUCTS[rng.random_range(0..PRODUCTS.len())];
            let quantity: i32 = rng.random_range(1..=24) * if is_return { -1 } else { 1 };
            let customer_field = customer.map(|id| id.to_string()).unwrap_or_default();
            writeln!(
                writer,
                "{},{},{},{},{},{:.2},{},{}",
                invoice_no,
                code,
                description,
                quantity,
                timestamp.format("%-m/%-d/%Y %-H:%M"),
                price,
                customer_field,
                country
            )
            .unwrap();
            written += 1;
        }
        invoice += 1;
    }

    println!("Sample sales CSV generated: {} ({} rows)", path, written);
}
