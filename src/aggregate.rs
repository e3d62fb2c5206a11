//! Null-aware aggregation over table views.
//!
//! Every operation walks the view's rows in table order and skips null
//! cells (the Int64/Date sentinel, float NaN, the empty string). Group
//! results are owned, so they can live in the query cache after the view
//! is gone.
//!
//! Group orderings are fixed: `count_by` and `sum_by` rank descending with
//! ties broken by first encounter in the view, the monthly series are
//! chronological.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::Datelike;
use rand::Rng;

use crate::table::column::{secs_to_datetime, Column, NULL_I64};
use crate::table::data_table::DataTable;
use crate::table::view::TableView;
use crate::table::{PipelineError, ValueRef};

/// A calendar month, ordered chronologically, displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Rows per distinct value of a string column, most frequent first.
///
/// The empty-string bucket counts too, so bucket totals always add up to
/// the view's row count.
pub fn count_by(view: &TableView, column: &str) -> Result<Vec<(String, u64)>, PipelineError> {
    let table = view.table();
    let offsets = table.str_offsets_of(column)?;

    struct Bucket {
        first_seen: usize,
        count: u64,
    }
    let mut buckets: HashMap<&str, Bucket> = HashMap::new();
    for (position, row) in view.iter().enumerate() {
        let key = table.str_at(offsets[row]);
        match buckets.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().count += 1,
            Entry::Vacant(entry) => {
                entry.insert(Bucket {
                    first_seen: position,
                    count: 1,
                });
            }
        }
    }

    let mut entries: Vec<(&str, Bucket)> = buckets.into_iter().collect();
    entries.sort_by(|a, b| {
        b.1.count
            .cmp(&a.1.count)
            .then(a.1.first_seen.cmp(&b.1.first_seen))
    });
    Ok(entries
        .into_iter()
        .map(|(key, bucket)| (key.to_string(), bucket.count))
        .collect())
}

/// Sum of a numeric column per distinct value of a string column, largest
/// sum first. Null metric cells contribute nothing.
pub fn sum_by(
    view: &TableView,
    group: &str,
    metric: &str,
) -> Result<Vec<(String, f64)>, PipelineError> {
    let table = view.table();
    let offsets = table.str_offsets_of(group)?;
    let metric_column = numeric_column(table, metric)?;

    struct Bucket {
        first_seen: usize,
        sum: f64,
    }
    let mut buckets: HashMap<&str, Bucket> = HashMap::new();
    for (position, row) in view.iter().enumerate() {
        let key = table.str_at(offsets[row]);
        let value = cell_as_f64(table, metric_column, row).unwrap_or(0.0);
        match buckets.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().sum += value,
            Entry::Vacant(entry) => {
                entry.insert(Bucket {
                    first_seen: position,
                    sum: value,
                });
            }
        }
    }

    let mut entries: Vec<(&str, Bucket)> = buckets.into_iter().collect();
    entries.sort_by(|a, b| {
        b.1.sum
            .partial_cmp(&a.1.sum)
            .unwrap_or(Ordering::Equal)
            .then(a.1.first_seen.cmp(&b.1.first_seen))
    });
    Ok(entries
        .into_iter()
        .map(|(key, bucket)| (key.to_string(), bucket.sum))
        .collect())
}

/// Rows per calendar month of a date column, in chronological order.
/// Null dates are left out entirely.
pub fn monthly_count(
    view: &TableView,
    date_column: &str,
) -> Result<Vec<(YearMonth, u64)>, PipelineError> {
    let table = view.table();
    let dates = table.dates_of(date_column)?;

    let mut months: HashMap<YearMonth, u64> = HashMap::new();
    for row in view.iter() {
        if let Some(month) = month_of(dates[row]) {
            *months.entry(month).or_insert(0) += 1;
        }
    }
    let mut entries: Vec<(YearMonth, u64)> = months.into_iter().collect();
    entries.sort_by_key(|&(month, _)| month);
    Ok(entries)
}

/// Sum of a numeric column per calendar month, chronological. Rows with a
/// null date or a null metric are skipped.
pub fn monthly_sum(
    view: &TableView,
    date_column: &str,
    metric: &str,
) -> Result<Vec<(YearMonth, f64)>, PipelineError> {
    let table = view.table();
    let dates = table.dates_of(date_column)?;
    let metric_column = numeric_column(table, metric)?;

    let mut months: HashMap<YearMonth, f64> = HashMap::new();
    for row in view.iter() {
        let (Some(month), Some(value)) = (month_of(dates[row]), cell_as_f64(table, metric_column, row))
        else {
            continue;
        };
        *months.entry(month).or_insert(0.0) += value;
    }
    let mut entries: Vec<(YearMonth, f64)> = months.into_iter().collect();
    entries.sort_by_key(|&(month, _)| month);
    Ok(entries)
}

/// Arithmetic mean of the non-null cells, `None` when there are none.
pub fn mean(view: &TableView, column: &str) -> Result<Option<f64>, PipelineError> {
    let table = view.table();
    let metric_column = numeric_column(table, column)?;

    let mut total = 0.0;
    let mut count = 0u64;
    for row in view.iter() {
        if let Some(value) = cell_as_f64(table, metric_column, row) {
            total += value;
            count += 1;
        }
    }
    Ok((count > 0).then(|| total / count as f64))
}

/// Sum of the non-null cells; an empty view sums to zero.
pub fn sum(view: &TableView, column: &str) -> Result<f64, PipelineError> {
    let table = view.table();
    let metric_column = numeric_column(table, column)?;

    let mut total = 0.0;
    for row in view.iter() {
        if let Some(value) = cell_as_f64(table, metric_column, row) {
            total += value;
        }
    }
    Ok(total)
}

/// Number of distinct non-null values in a column of any type.
pub fn count_distinct(view: &TableView, column: &str) -> Result<usize, PipelineError> {
    let table = view.table();
    match table.column(column)? {
        Column::Int64(values) | Column::Date(values) => {
            let mut seen: HashSet<i64> = HashSet::new();
            for row in view.iter() {
                if values[row] != NULL_I64 {
                    seen.insert(values[row]);
                }
            }
            Ok(seen.len())
        }
        Column::Float64(values) => {
            let mut seen: HashSet<u64> = HashSet::new();
            for row in view.iter() {
                if !values[row].is_nan() {
                    seen.insert(values[row].to_bits());
                }
            }
            Ok(seen.len())
        }
        Column::Str(offsets) => {
            let mut seen: HashSet<&str> = HashSet::new();
            for row in view.iter() {
                let value = table.str_at(offsets[row]);
                if !value.is_empty() {
                    seen.insert(value);
                }
            }
            Ok(seen.len())
        }
    }
}

/// Rows whose cell satisfies the predicate. Null cells are handed to the
/// predicate as [`ValueRef::Null`], so the caller decides their fate.
pub fn count_where<F>(view: &TableView, column: &str, predicate: F) -> Result<usize, PipelineError>
where
    F: Fn(ValueRef<'_>) -> bool,
{
    let table = view.table();
    let target = table.column(column)?;
    let mut count = 0;
    for row in view.iter() {
        if predicate(table.cell(target, row)) {
            count += 1;
        }
    }
    Ok(count)
}

/// Non-null numeric cells of the view, widened to f64, in view order.
pub fn numeric_values(view: &TableView, column: &str) -> Result<Vec<f64>, PipelineError> {
    let table = view.table();
    let metric_column = numeric_column(table, column)?;
    Ok(view
        .iter()
        .filter_map(|row| cell_as_f64(table, metric_column, row))
        .collect())
}

/// Uniform sample of at most `n` view rows, without replacement. A seeded
/// RNG makes the sample reproducible.
pub fn sample_rows<'a, R: Rng + ?Sized>(
    view: &TableView<'a>,
    n: usize,
    rng: &mut R,
) -> TableView<'a> {
    let amount = n.min(view.len());
    let picks = rand::seq::index::sample(rng, view.len(), amount);
    let indices = picks
        .into_iter()
        .filter_map(|position| view.row_at(position))
        .collect();
    TableView::from_indices(view.table(), indices)
}

/// Pearson correlation over every numeric column of the table, pairwise
/// null-skipping. `None` when the table has no numeric columns; a pair
/// with fewer than two complete rows or zero variance yields NaN.
pub fn correlation_matrix(
    view: &TableView,
) -> Result<Option<(Vec<String>, Vec<Vec<f64>>)>, PipelineError> {
    let table = view.table();
    let names: Vec<String> = table
        .numeric_columns()
        .into_iter()
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Ok(None);
    }

    let series: Vec<Vec<Option<f64>>> = names
        .iter()
        .map(|name| {
            let column = numeric_column(table, name)?;
            Ok(view
                .iter()
                .map(|row| cell_as_f64(table, column, row))
                .collect())
        })
        .collect::<Result<_, PipelineError>>()?;

    let mut matrix = vec![vec![f64::NAN; names.len()]; names.len()];
    for i in 0..names.len() {
        for j in i..names.len() {
            let r = pearson(&series[i], &series[j]);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    Ok(Some((names, matrix)))
}

fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let mut n = 0.0;
    let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (Some(x), Some(y)) = (x, y) else { continue };
        n += 1.0;
        sx += x;
        sy += y;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }
    if n < 2.0 {
        return f64::NAN;
    }
    let cov = n * sxy - sx * sy;
    let denom = ((n * sxx - sx * sx) * (n * syy - sy * sy)).sqrt();
    cov / denom
}

fn month_of(secs: i64) -> Option<YearMonth> {
    secs_to_datetime(secs).map(|dt| YearMonth {
        year: dt.year(),
        month: dt.month(),
    })
}

/// Resolves a column and insists it is numeric.
fn numeric_column<'a>(table: &'a DataTable, name: &str) -> Result<&'a Column, PipelineError> {
    let column = table.column(name)?;
    if !column.column_type().is_numeric() {
        return Err(PipelineError::ColumnType {
            column: name.to_string(),
            expected: "a numeric column",
        });
    }
    Ok(column)
}

fn cell_as_f64(table: &DataTable, column: &Column, row: usize) -> Option<f64> {
    match table.cell(column, row) {
        ValueRef::Int(v) => Some(v as f64),
        ValueRef::Float(v) => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::data_table::TableBuilder;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sales_table() -> DataTable {
        let jan = 1_294_000_000; // 2011-01-02
        let feb = 1_296_600_000; // 2011-02-01
        let mut builder = TableBuilder::new();
        builder
            .push_str_column(
                "country",
                ["UK", "France", "UK", "", "France", "UK"],
            )
            .push_float_column("total", vec![10.0, 5.0, 20.0, 40.0, f64::NAN, 30.0])
            .push_int_column("qty", vec![1, 2, 3, 4, 5, NULL_I64])
            .push_date_column(
                "when",
                vec![jan, jan, feb, NULL_I64, feb, feb],
            );
        builder.finish().unwrap()
    }

    #[test]
    fn count_by_ranks_desc_with_first_encounter_ties() {
        let table = sales_table();
        let view = TableView::all(&table);
        let counts = count_by(&view, "country").unwrap();
        assert_eq!(
            counts,
            vec![
                ("UK".to_string(), 3),
                ("France".to_string(), 2),
                ("".to_string(), 1),
            ]
        );
        let total: u64 = counts.iter().map(|(_, c)| c).sum();
        assert_eq!(total, table.row_count() as u64);
    }

    #[test]
    fn count_by_tie_break_uses_first_encounter() {
        let mut builder = TableBuilder::new();
        builder.push_str_column("k", ["b", "a", "b", "a", "c"]);
        let table = builder.finish().unwrap();
        let view = TableView::all(&table);
        let counts = count_by(&view, "k").unwrap();
        assert_eq!(
            counts,
            vec![
                ("b".to_string(), 2),
                ("a".to_string(), 2),
                ("c".to_string(), 1),
            ]
        );
    }

    #[test]
    fn sum_by_skips_null_metrics() {
        let table = sales_table();
        let view = TableView::all(&table);
        let sums = sum_by(&view, "country", "total").unwrap();
        // UK: 10+20+30, "": 40, France: 5 + null.
        assert_eq!(
            sums,
            vec![
                ("UK".to_string(), 60.0),
                ("".to_string(), 40.0),
                ("France".to_string(), 5.0),
            ]
        );
    }

    #[test]
    fn monthly_count_is_chronological_and_drops_null_dates() {
        let table = sales_table();
        let view = TableView::all(&table);
        let months = monthly_count(&view, "when").unwrap();
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].0.to_string(), "2011-01");
        assert_eq!(months[0].1, 2);
        assert_eq!(months[1].0.to_string(), "2011-02");
        assert_eq!(months[1].1, 3);
    }

    #[test]
    fn monthly_sum_skips_rows_missing_either_side() {
        let table = sales_table();
        let view = TableView::all(&table);
        let months = monthly_sum(&view, "when", "total").unwrap();
        // Jan: 10+5; Feb: 20+30 (France's NaN and the null date drop out).
        assert_eq!(months[0].1, 15.0);
        assert_eq!(months[1].1, 50.0);
    }

    #[test]
    fn mean_is_none_on_empty_views() {
        let table = sales_table();
        let empty = TableView::from_indices(&table, Vec::new());
        assert_eq!(mean(&empty, "total").unwrap(), None);
        assert_eq!(sum(&empty, "total").unwrap(), 0.0);

        let view = TableView::all(&table);
        let avg = mean(&view, "total").unwrap().unwrap();
        assert!((avg - 21.0).abs() < 1e-9); // (10+5+20+40+30)/5
    }

    #[test]
    fn mean_ignores_int_nulls() {
        let table = sales_table();
        let view = TableView::all(&table);
        let avg = mean(&view, "qty").unwrap().unwrap();
        assert!((avg - 3.0).abs() < 1e-9); // (1+2+3+4+5)/5
    }

    #[test]
    fn count_distinct_skips_nulls_per_type() {
        let table = sales_table();
        let view = TableView::all(&table);
        assert_eq!(count_distinct(&view, "country").unwrap(), 2);
        assert_eq!(count_distinct(&view, "qty").unwrap(), 5);
        assert_eq!(count_distinct(&view, "when").unwrap(), 2);
    }

    #[test]
    fn count_where_sees_every_cell() {
        let table = sales_table();
        let view = TableView::all(&table);
        let fours = count_where(&view, "qty", |v| v == ValueRef::Int(4)).unwrap();
        assert_eq!(fours, 1);
        let nulls = count_where(&view, "qty", |v| v == ValueRef::Null).unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn numeric_values_drop_nulls() {
        let table = sales_table();
        let view = TableView::all(&table);
        assert_eq!(
            numeric_values(&view, "total").unwrap(),
            vec![10.0, 5.0, 20.0, 40.0, 30.0]
        );
    }

    #[test]
    fn sampling_is_capped_and_reproducible() {
        let table = sales_table();
        let view = TableView::all(&table);

        let all = sample_rows(&view, 100, &mut StdRng::seed_from_u64(42));
        assert_eq!(all.len(), 6);

        let a = sample_rows(&view, 3, &mut StdRng::seed_from_u64(42));
        let b = sample_rows(&view, 3, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn correlation_matrix_is_symmetric_with_unit_diagonal() {
        let mut builder = TableBuilder::new();
        builder
            .push_float_column("x", vec![1.0, 2.0, 3.0, 4.0])
            .push_float_column("y", vec![2.0, 4.0, 6.0, 8.0])
            .push_str_column("label", ["a", "b", "c", "d"]);
        let table = builder.finish().unwrap();
        let view = TableView::all(&table);

        let (names, matrix) = correlation_matrix(&view).unwrap().unwrap();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
        assert!((matrix[0][0] - 1.0).abs() < 1e-9);
        assert!((matrix[0][1] - 1.0).abs() < 1e-9);
        assert_eq!(matrix[0][1], matrix[1][0]);
    }

    #[test]
    fn correlation_needs_numeric_columns() {
        let mut builder = TableBuilder::new();
        builder.push_str_column("label", ["a", "b"]);
        let table = builder.finish().unwrap();
        let view = TableView::all(&table);
        assert!(correlation_matrix(&view).unwrap().is_none());
    }

    #[test]
    fn aggregates_respect_the_view() {
        let table = sales_table();
        let view = TableView::from_indices(&table, vec![0, 2, 5]); // the UK rows
        let counts = count_by(&view, "country").unwrap();
        assert_eq!(counts, vec![("UK".to_string(), 3)]);
        assert_eq!(sum(&view, "total").unwrap(), 60.0);
    }
}
