//! Conjunctive row filtering.
//!
//! A [`FilterSelection`] is a set of per-column constraints, ANDed
//! together. Applying one never copies column data; it produces a
//! [`TableView`] of matching row indices in table order. Selections are
//! hashable by value, which lets the query cache key on them directly.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use crate::helpers::simd_helpers;
use crate::table::column::Column;
use crate::table::data_table::DataTable;
use crate::table::view::TableView;
use crate::table::PipelineError;

/// One column's constraint. Ranges are inclusive on both ends; null cells
/// never satisfy a range.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Cell must equal one of the listed values. An empty set matches
    /// nothing, mirroring a dashboard multiselect with everything
    /// deselected.
    AnyOf(BTreeSet<String>),
    NumericRange { lo: f64, hi: f64 },
    /// Bounds in epoch seconds.
    DateRange { lo: i64, hi: i64 },
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constraint::AnyOf(a), Constraint::AnyOf(b)) => a == b,
            (
                Constraint::NumericRange { lo: a_lo, hi: a_hi },
                Constraint::NumericRange { lo: b_lo, hi: b_hi },
            ) => a_lo.to_bits() == b_lo.to_bits() && a_hi.to_bits() == b_hi.to_bits(),
            (
                Constraint::DateRange { lo: a_lo, hi: a_hi },
                Constraint::DateRange { lo: b_lo, hi: b_hi },
            ) => a_lo == b_lo && a_hi == b_hi,
            _ => false,
        }
    }
}

impl Eq for Constraint {}

impl Hash for Constraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Constraint::AnyOf(values) => {
                0u8.hash(state);
                values.hash(state);
            }
            Constraint::NumericRange { lo, hi } => {
                1u8.hash(state);
                lo.to_bits().hash(state);
                hi.to_bits().hash(state);
            }
            Constraint::DateRange { lo, hi } => {
                2u8.hash(state);
                lo.hash(state);
                hi.hash(state);
            }
        }
    }
}

/// Conjunction of column constraints, at most one per column.
///
/// Built with the chaining methods; columns are kept sorted so that two
/// selections with the same constraints are equal and hash identically
/// no matter the insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterSelection {
    constraints: BTreeMap<String, Constraint>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps rows whose cell is one of `values`. Replaces any previous
    /// constraint on the column.
    pub fn any_of<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        self.constraints
            .insert(column.to_string(), Constraint::AnyOf(values));
        self
    }

    /// Keeps rows whose numeric cell lies in `[lo, hi]`.
    pub fn numeric_range(mut self, column: &str, lo: f64, hi: f64) -> Self {
        self.constraints
            .insert(column.to_string(), Constraint::NumericRange { lo, hi });
        self
    }

    /// Keeps rows whose date cell lies in `[lo, hi]` epoch seconds.
    pub fn date_range(mut self, column: &str, lo: i64, hi: i64) -> Self {
        self.constraints
            .insert(column.to_string(), Constraint::DateRange { lo, hi });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraints(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.constraints.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Applies the conjunction to a table.
    ///
    /// An empty selection is the identity and returns the full table.
    /// Constraints are checked strictly: naming an absent column or
    /// constraining a column of the wrong type is an error, not an empty
    /// result.
    pub fn apply<'a>(&self, table: &'a DataTable) -> Result<TableView<'a>, PipelineError> {
        if self.constraints.is_empty() {
            return Ok(TableView::all(table));
        }

        let mut current: Option<Vec<usize>> = None;
        for (column, constraint) in &self.constraints {
            let next = match current.take() {
                None => evaluate_full(table, column, constraint)?,
                Some(rows) => narrow(table, column, constraint, rows)?,
            };
            if next.is_empty() {
                return Ok(TableView::from_indices(table, Vec::new()));
            }
            current = Some(next);
        }
        Ok(match current {
            Some(rows) => TableView::from_indices(table, rows),
            None => TableView::all(table),
        })
    }
}

/// Integer bounds equivalent to the inclusive f64 range.
fn int_bounds(lo: f64, hi: f64) -> (i64, i64) {
    (lo.ceil() as i64, hi.floor() as i64)
}

/// Evaluates one constraint over the whole column, the SIMD fast path for
/// the first constraint of a conjunction.
fn evaluate_full(
    table: &DataTable,
    column: &str,
    constraint: &Constraint,
) -> Result<Vec<usize>, PipelineError> {
    match constraint {
        Constraint::AnyOf(values) => {
            let offsets = table.str_offsets_of(column)?;
            if values.is_empty() {
                return Ok(Vec::new());
            }
            Ok(offsets
                .iter()
                .enumerate()
                .filter_map(|(row, &span)| values.contains(table.str_at(span)).then_some(row))
                .collect())
        }
        Constraint::NumericRange { lo, hi } => match table.column(column)? {
            Column::Int64(values) => {
                let (lo, hi) = int_bounds(*lo, *hi);
                Ok(simd_helpers::filter_range_i64(values, lo, hi))
            }
            Column::Float64(values) => Ok(simd_helpers::filter_range_f64(values, *lo, *hi)),
            _ => Err(PipelineError::ColumnType {
                column: column.to_string(),
                expected: "a numeric column",
            }),
        },
        Constraint::DateRange { lo, hi } => {
            let dates = table.dates_of(column)?;
            Ok(simd_helpers::filter_range_i64(dates, *lo, *hi))
        }
    }
}

/// Narrows an existing candidate set by one more constraint.
fn narrow(
    table: &DataTable,
    column: &str,
    constraint: &Constraint,
    mut rows: Vec<usize>,
) -> Result<Vec<usize>, PipelineError> {
    match constraint {
        Constraint::AnyOf(values) => {
            let offsets = table.str_offsets_of(column)?;
            if values.is_empty() {
                return Ok(Vec::new());
            }
            rows.retain(|&row| values.contains(table.str_at(offsets[row])));
        }
        Constraint::NumericRange { lo, hi } => match table.column(column)? {
            Column::Int64(values) => {
                let (lo, hi) = int_bounds(*lo, *hi);
                rows.retain(|&row| simd_helpers::in_range_i64(values[row], lo, hi));
            }
            Column::Float64(values) => {
                rows.retain(|&row| simd_helpers::in_range_f64(values[row], *lo, *hi));
            }
            _ => {
                return Err(PipelineError::ColumnType {
                    column: column.to_string(),
                    expected: "a numeric column",
                })
            }
        },
        Constraint::DateRange { lo, hi } => {
            let dates = table.dates_of(column)?;
            rows.retain(|&row| simd_helpers::in_range_i64(dates[row], *lo, *hi));
        }
    }
    Ok(rows)
}
