//! The dashboard itself: one parameterized pipeline covering both the
//! product-catalog and the sales-export flavors.
//!
//! A [`Dashboard`] owns its data source, a query cache and a renderer.
//! Each [`Dashboard::run`] call executes one interaction cycle: load the
//! table (memoized), collect widget selections from the renderer, apply
//! the resulting filter, then walk the metric and chart catalogs. Every
//! catalog entry names the columns it needs and is skipped when the table
//! does not carry them, so the same cycle degrades cleanly on either
//! schema.

use std::collections::HashSet;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::aggregate;
use crate::config::{DashboardConfig, DataSource};
use crate::filter::FilterSelection;
use crate::generate::GeneratorOptions;
use crate::ingest::{self, DATE_COLUMN, QUANTITY_COLUMN, TOTAL_COLUMN, UNIT_PRICE_COLUMN};
use crate::query::{CachedQueries, QueryCache};
use crate::render::Renderer;
use crate::store::DatasetStore;
use crate::table::column::{ColumnType, NULL_I64};
use crate::table::data_table::DataTable;
use crate::table::view::TableView;
use crate::table::{PipelineError, ValueRef};

/// Sidebar multiselects of the catalog dashboard: column name and widget
/// label, in sidebar order.
const CATALOG_FILTERS: [(&str, &str); 4] = [
    ("brand", "Brand"),
    ("category", "Category"),
    ("gender", "Gender"),
    ("color", "Color"),
];

const COUNTRY_COLUMN: &str = "Country";
const DESCRIPTION_COLUMN: &str = "Description";
const INVOICE_COLUMN: &str = "InvoiceNo";
const CUSTOMER_COLUMN: &str = "CustomerID";

/// How many sorted countries the country widget preselects.
const COUNTRY_DEFAULT: usize = 5;

const PRICE_BINS: usize = 50;
const RATING_BINS: usize = 10;
const SALES_BINS: usize = 50;

enum TableSource {
    Store(DatasetStore),
    Ingest {
        path: PathBuf,
        loaded: Option<(DataTable, &'static str)>,
    },
}

/// A configured dashboard bound to a renderer.
pub struct Dashboard<R: Renderer> {
    config: DashboardConfig,
    source: TableSource,
    cache: QueryCache,
    renderer: R,
}

impl<R: Renderer> Dashboard<R> {
    pub fn new(config: DashboardConfig, renderer: R) -> Self {
        let source = match &config.source {
            DataSource::Synthetic {
                rows,
                include_name,
                cache_path,
            } => {
                let options = GeneratorOptions {
                    include_name: *include_name,
                    today: None,
                };
                TableSource::Store(DatasetStore::with_options(cache_path.clone(), *rows, options))
            }
            DataSource::Csv { path } => TableSource::Ingest {
                path: path.clone(),
                loaded: None,
            },
        };
        Dashboard {
            config,
            source,
            cache: QueryCache::new(),
            renderer,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Drops the memoized table and cached query results; the next cycle
    /// reloads from scratch.
    pub fn reset(&mut self) {
        match &mut self.source {
            TableSource::Store(store) => store.reset(),
            TableSource::Ingest { loaded, .. } => *loaded = None,
        }
        self.cache.reset();
    }

    /// Executes one interaction cycle.
    pub fn run(&mut self) -> Result<(), PipelineError> {
        let title = match &self.config.source {
            DataSource::Synthetic { .. } => "Fashion E-Commerce Intelligence Dashboard",
            DataSource::Csv { .. } => "E-Commerce Sales Dashboard",
        };
        let (table, encoding): (&DataTable, Option<&'static str>) = match &mut self.source {
            TableSource::Store(store) => (store.load()?, None),
            TableSource::Ingest { path, loaded } => {
                let pair = match loaded.take() {
                    Some(pair) => loaded.insert(pair),
                    None => {
                        let (table, report) = ingest::ingest(path)?;
                        loaded.insert((table, report.encoding))
                    }
                };
                (&pair.0, Some(pair.1))
            }
        };
        let mut cycle = Cycle {
            config: &self.config,
            cache: &self.cache,
            table,
            renderer: &mut self.renderer,
        };
        cycle.run(title, encoding)
    }
}

/// Borrows for a single interaction cycle.
struct Cycle<'a, R: Renderer> {
    config: &'a DashboardConfig,
    cache: &'a QueryCache,
    table: &'a DataTable,
    renderer: &'a mut R,
}

impl<R: Renderer> Cycle<'_, R> {
    fn run(&mut self, title: &str, encoding: Option<&str>) -> Result<(), PipelineError> {
        self.renderer.apply_theme(&self.config.theme);
        self.renderer.heading(title);
        if let Some(encoding) = encoding {
            self.renderer.metric("Detected file encoding", encoding);
        }

        let selection = self.collect_selection()?;
        let view = selection.apply(self.table)?;
        let queries = CachedQueries::new(view, selection, Some(self.cache));

        self.metrics(&queries)?;
        self.charts(&queries)?;
        self.preview(queries.view());
        Ok(())
    }

    /// Walks the widget catalog and folds the answers into one
    /// conjunctive selection. A multiselect that keeps every option adds
    /// no constraint; range widgets always constrain, so rows with null
    /// dates or sales drop out even at full width.
    fn collect_selection(&mut self) -> Result<FilterSelection, PipelineError> {
        let table = self.table;
        let mut selection = FilterSelection::new();

        for (column, label) in CATALOG_FILTERS {
            if column_kind(table, column) != Some(ColumnType::Str) {
                continue;
            }
            let options = distinct_in_order(table, column)?;
            if options.is_empty() {
                continue;
            }
            let chosen = self.renderer.multiselect(label, &options, &options);
            if !same_set(&chosen, &options) {
                selection = selection.any_of(column, chosen);
            }
        }

        if column_kind(table, COUNTRY_COLUMN) == Some(ColumnType::Str) {
            let mut options = distinct_in_order(table, COUNTRY_COLUMN)?;
            options.sort_unstable();
            if !options.is_empty() {
                let preselected = &options[..options.len().min(COUNTRY_DEFAULT)];
                let chosen = self
                    .renderer
                    .multiselect("Select Country", &options, preselected);
                if !same_set(&chosen, &options) {
                    selection = selection.any_of(COUNTRY_COLUMN, chosen);
                }
            }
        }

        match column_kind(table, DATE_COLUMN) {
            Some(ColumnType::Date) => {
                if let Some((min, max)) = date_extent(table.dates_of(DATE_COLUMN)?) {
                    let (lo, hi) = self.renderer.date_range("Select Date Range", min, max);
                    selection = selection.date_range(DATE_COLUMN, lo, hi);
                }
            }
            Some(_) => debug!(column = DATE_COLUMN, "date filter skipped, not a date column"),
            None => {}
        }

        match column_kind(table, TOTAL_COLUMN) {
            Some(kind) if kind.is_numeric() => {
                if let Some((min, max)) = numeric_extent(table, TOTAL_COLUMN)? {
                    let (lo, hi) = self.renderer.numeric_range("Select Sales Range", min, max);
                    selection = selection.numeric_range(TOTAL_COLUMN, lo, hi);
                }
            }
            Some(_) => debug!(column = TOTAL_COLUMN, "sales filter skipped, not numeric"),
            None => {}
        }

        Ok(selection)
    }

    fn metrics(&mut self, queries: &CachedQueries<'_>) -> Result<(), PipelineError> {
        let table = self.table;
        let view = queries.view();
        self.renderer.heading("Summary Metrics");
        if table.has_column("product_id") {
            self.renderer
                .metric("Total Products", &view.len().to_string());
        }
        if is_numeric(table, "price") {
            let value = match queries.mean("price")? {
                Some(mean) => format!("${:.2}", mean),
                None => "-".to_string(),
            };
            self.renderer.metric("Average Price", &value);
        }
        if is_numeric(table, "rating") {
            let value = match queries.mean("rating")? {
                Some(mean) => format!("{:.1}/5", mean),
                None => "-".to_string(),
            };
            self.renderer.metric("Average Rating", &value);
        }
        if is_numeric(table, "stock") {
            let count = aggregate::count_where(view, "stock", |cell| cell == ValueRef::Int(0))?;
            self.renderer.metric("Out of Stock", &count.to_string());
        }
        if is_numeric(table, TOTAL_COLUMN) {
            let total = queries.sum(TOTAL_COLUMN)?;
            self.renderer
                .metric("Total Sales", &format!("${}", thousands(total)));
        }
        if table.has_column(INVOICE_COLUMN) {
            let orders = queries.count_distinct(INVOICE_COLUMN)?;
            self.renderer
                .metric("Total Orders", &group_digits(&orders.to_string()));
        }
        if is_numeric(table, UNIT_PRICE_COLUMN) {
            let value = match queries.mean(UNIT_PRICE_COLUMN)? {
                Some(mean) => format!("${}", thousands(mean)),
                None => "-".to_string(),
            };
            self.renderer.metric("Avg Unit Price", &value);
        }
        if table.has_column(CUSTOMER_COLUMN) {
            let customers = queries.count_distinct(CUSTOMER_COLUMN)?;
            self.renderer
                .metric("Unique Customers", &group_digits(&customers.to_string()));
        }
        Ok(())
    }

    fn charts(&mut self, queries: &CachedQueries<'_>) -> Result<(), PipelineError> {
        let table = self.table;
        let view = queries.view();

        if column_kind(table, "category") == Some(ColumnType::Str) {
            let counts = queries.count_by("category")?;
            let (labels, values) = counts_to_bars(counts, self.config.top_categories);
            self.renderer.heading("Products by Category");
            self.renderer.render_bar(&labels, &values, "Top Categories");
        } else {
            debug!(chart = "Top Categories", "skipped, required column missing");
        }

        if column_kind(table, "brand") == Some(ColumnType::Str) {
            let counts = queries.count_by("brand")?;
            let (labels, values) = counts_to_bars(counts, self.config.top_brands);
            self.renderer.heading("Products by Brand");
            self.renderer.render_bar(&labels, &values, "Top Brands");
        } else {
            debug!(chart = "Top Brands", "skipped, required column missing");
        }

        let price_ok = is_numeric(table, "price");
        let rating_ok = is_numeric(table, "rating");
        if price_ok || rating_ok {
            // Both distribution charts draw from the same seeded sample.
            let mut rng = StdRng::seed_from_u64(self.config.histogram_seed);
            let sample = aggregate::sample_rows(view, self.config.histogram_sample, &mut rng);
            if price_ok {
                let values = aggregate::numeric_values(&sample, "price")?;
                self.renderer.heading("Price Distribution");
                self.renderer
                    .render_histogram(&values, PRICE_BINS, "Price Distribution");
            }
            if rating_ok {
                let values = aggregate::numeric_values(&sample, "rating")?;
                self.renderer.heading("Rating Distribution");
                self.renderer
                    .render_histogram(&values, RATING_BINS, "Rating Distribution");
            }
        }

        if column_kind(table, "date_added") == Some(ColumnType::Date) {
            let months = queries.monthly_count("date_added")?;
            let (x, y) = months_to_series(months.into_iter().map(|(m, c)| (m, c as f64)));
            self.renderer.heading("Products Added Over Time");
            self.renderer
                .render_line(&x, &y, "New Products Added Monthly");
        } else {
            debug!(
                chart = "New Products Added Monthly",
                "skipped, required column missing"
            );
        }

        if column_kind(table, DATE_COLUMN) == Some(ColumnType::Date)
            && is_numeric(table, TOTAL_COLUMN)
        {
            let months = queries.monthly_sum(DATE_COLUMN, TOTAL_COLUMN)?;
            let (x, y) = months_to_series(months.into_iter());
            self.renderer.heading("Sales Over Time");
            self.renderer
                .render_line(&x, &y, "Sales Trend Over Time");
        } else {
            debug!(
                chart = "Sales Trend Over Time",
                "skipped, required column missing"
            );
        }

        if column_kind(table, COUNTRY_COLUMN) == Some(ColumnType::Str)
            && is_numeric(table, TOTAL_COLUMN)
        {
            let sums = queries.sum_by(COUNTRY_COLUMN, TOTAL_COLUMN)?;
            let (labels, values) = sums_to_bars(sums, usize::MAX);
            self.renderer.heading("Sales by Country");
            self.renderer
                .render_bar(&labels, &values, "Total Sales by Country");
        } else {
            debug!(
                chart = "Total Sales by Country",
                "skipped, required column missing"
            );
        }

        if column_kind(table, DESCRIPTION_COLUMN) == Some(ColumnType::Str)
            && is_numeric(table, TOTAL_COLUMN)
        {
            let sums = queries.sum_by(DESCRIPTION_COLUMN, TOTAL_COLUMN)?;
            let (labels, values) = sums_to_bars(sums, self.config.top_products);
            self.renderer.heading("Top 10 Products by Sales");
            self.renderer.render_bar(&labels, &values, "Top Products");
        } else {
            debug!(chart = "Top Products", "skipped, required column missing");
        }

        if is_numeric(table, QUANTITY_COLUMN) && is_numeric(table, TOTAL_COLUMN) {
            let (x, y, groups) = scatter_points(table, view)?;
            self.renderer.heading("Quantity vs Sales Distribution");
            self.renderer
                .render_scatter(&x, &y, &groups, "Quantity vs Total Sales");
        } else {
            debug!(
                chart = "Quantity vs Total Sales",
                "skipped, required column missing"
            );
        }

        if is_numeric(table, TOTAL_COLUMN) {
            let values = aggregate::numeric_values(view, TOTAL_COLUMN)?;
            self.renderer.heading("Sales Distribution");
            self.renderer
                .render_histogram(&values, SALES_BINS, "Sales Value Distribution");
        } else {
            debug!(
                chart = "Sales Value Distribution",
                "skipped, required column missing"
            );
        }

        match aggregate::correlation_matrix(view)? {
            Some((labels, matrix)) => {
                self.renderer.heading("Correlation Heatmap");
                self.renderer
                    .render_heatmap(&matrix, &labels, &labels, "Correlation Heatmap");
            }
            None => debug!(chart = "Correlation Heatmap", "skipped, no numeric columns"),
        }

        Ok(())
    }

    fn preview(&mut self, view: &TableView<'_>) {
        self.renderer.heading("Raw Data Preview");
        let headers = self.table.headers().to_vec();
        let rows: Vec<Vec<String>> = view
            .head(self.config.preview_limit)
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.to_string()).collect())
            .collect();
        self.renderer.render_table(&headers, &rows, view.len());
    }
}

fn column_kind(table: &DataTable, name: &str) -> Option<ColumnType> {
    if !table.has_column(name) {
        return None;
    }
    table.column_type(name).ok()
}

fn is_numeric(table: &DataTable, name: &str) -> bool {
    column_kind(table, name).is_some_and(|kind| kind.is_numeric())
}

/// First-encounter distinct values of a string column; empty cells are
/// nulls and never become options.
fn distinct_in_order(table: &DataTable, column: &str) -> Result<Vec<String>, PipelineError> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for value in table.str_values(column)? {
        if value.is_empty() || !seen.insert(value) {
            continue;
        }
        values.push(value.to_string());
    }
    Ok(values)
}

fn same_set(chosen: &[String], options: &[String]) -> bool {
    let chosen: HashSet<&str> = chosen.iter().map(String::as_str).collect();
    let options: HashSet<&str> = options.iter().map(String::as_str).collect();
    chosen == options
}

fn date_extent(values: &[i64]) -> Option<(i64, i64)> {
    values
        .iter()
        .filter(|&&v| v != NULL_I64)
        .fold(None, |extent, &v| match extent {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn numeric_extent(table: &DataTable, name: &str) -> Result<Option<(f64, f64)>, PipelineError> {
    Ok(table
        .numeric_values(name)?
        .flatten()
        .fold(None, |extent, v| match extent {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        }))
}

fn counts_to_bars(counts: Vec<(String, u64)>, limit: usize) -> (Vec<String>, Vec<f64>) {
    counts
        .into_iter()
        .take(limit)
        .map(|(label, count)| (label, count as f64))
        .unzip()
}

fn sums_to_bars(sums: Vec<(String, f64)>, limit: usize) -> (Vec<String>, Vec<f64>) {
    sums.into_iter().take(limit).unzip()
}

fn months_to_series(
    months: impl Iterator<Item = (aggregate::YearMonth, f64)>,
) -> (Vec<String>, Vec<f64>) {
    months.map(|(month, v)| (month.to_string(), v)).unzip()
}

/// Row-aligned scatter input: rows where both coordinates are non-null,
/// with the country label carried along when the column exists.
fn scatter_points(
    table: &DataTable,
    view: &TableView<'_>,
) -> Result<(Vec<f64>, Vec<f64>, Vec<String>), PipelineError> {
    let quantity = table.column(QUANTITY_COLUMN)?;
    let total = table.column(TOTAL_COLUMN)?;
    let country = if column_kind(table, COUNTRY_COLUMN) == Some(ColumnType::Str) {
        Some(table.column(COUNTRY_COLUMN)?)
    } else {
        None
    };

    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut groups = Vec::new();
    for row in view.iter() {
        let (Some(q), Some(t)) = (
            numeric_cell(table.cell(quantity, row)),
            numeric_cell(table.cell(total, row)),
        ) else {
            continue;
        };
        x.push(q);
        y.push(t);
        if let Some(country) = country {
            let label = match table.cell(country, row) {
                ValueRef::Str(s) => s.to_string(),
                _ => String::new(),
            };
            groups.push(label);
        }
    }
    Ok((x, y, groups))
}

fn numeric_cell(cell: ValueRef<'_>) -> Option<f64> {
    match cell {
        ValueRef::Int(v) => Some(v as f64),
        ValueRef::Float(v) => Some(v),
        _ => None,
    }
}

/// `1234567.8` -> `1,234,567.80`; the sign stays in front of the digits.
fn thousands(value: f64) -> String {
    if !value.is_finite() {
        return format!("{:.2}", value);
    }
    let formatted = format!("{:.2}", value);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some(parts) => parts,
        None => (formatted.as_str(), "00"),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };
    format!("{}{}.{}", sign, group_digits(digits), frac_part)
}

fn group_digits(digits: &str) -> String {
    let bytes = digits.as_bytes();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(b as char);
    }
    out
}
