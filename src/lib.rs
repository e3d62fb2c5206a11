//! # RetailInsights
//!
//! `retail_insights` is the data engine behind a retail e-commerce
//! dashboard: a single-process columnar pipeline that loads a product
//! catalog or a sales export, filters it with sidebar-style selections
//! and serves the aggregations the dashboard charts. It supports:
//!
//! - Memory-mapped CSV ingestion (zero-copy for clean UTF-8 files)
//! - Encoding sniffing with a windows-1252 fallback for legacy exports
//! - Dynamic schema inference (int, float, date, string)
//! - A seedable synthetic catalog generator with a parquet/snappy cache
//! - SIMD-accelerated range filtering with scalar fallback
//! - Parallel parsing with Rayon
//! - An LRU cache over aggregation results for low-latency redraws
//!
//! # Features
//!
//! - **Columnar storage**: offsets into the CSV buffer for strings,
//!   sentinel-encoded nulls for numerics and dates
//! - **Aggregations**: count-by, sum-by, monthly series, mean, sum,
//!   distinct counts
//! - **Filtering**: conjunctive categorical sets and inclusive
//!   numeric/date ranges
//! - **Dashboard pipeline**: column-driven metric and chart catalogs
//!   behind a pluggable [`Renderer`]
//!
//! # Example
//!
//! ```rust
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use retail_insights::aggregate;
//! use retail_insights::{FilterSelection, GeneratorOptions, PipelineError};
//!
//! fn main() -> Result<(), PipelineError> {
//!     let mut rng = StdRng::seed_from_u64(7);
//!     let table = retail_insights::generate_with(1_000, &GeneratorOptions::default(), &mut rng)?;
//!
//!     let selection = FilterSelection::new()
//!         .any_of("brand", ["Nike", "Adidas"])
//!         .numeric_range("price", 50.0, 150.0);
//!     let view = selection.apply(&table)?;
//!
//!     for (category, count) in aggregate::count_by(&view, "category")? {
//!         println!("{category}: {count}");
//!     }
//!     Ok(())
//! }
//! ```

mod helpers;

pub mod aggregate;
pub mod config;
pub mod filter;
pub mod generate;
pub mod ingest;
pub mod pipeline;
pub mod query;
pub mod render;
pub mod store;
pub mod table;
pub mod vocab;

pub use config::{DashboardConfig, DataSource, Theme};
pub use filter::FilterSelection;
pub use generate::{generate, generate_with, GeneratorOptions};
pub use ingest::{ingest, IngestReport};
pub use pipeline::Dashboard;
pub use query::{CachedQueries, QueryCache};
pub use render::{Renderer, TextRenderer};
pub use store::DatasetStore;
pub use table::data_table::DataTable;
pub use table::view::TableView;
pub use table::{CellError, ParseSummary, PipelineError, ValueRef};
