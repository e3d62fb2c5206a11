use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub mod arrow;
pub mod column;
pub mod data_table;
pub mod view;

/// Error type used across the crate.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow2::error::Error),

    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("column {column} is not {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },

    #[error("corrupt dataset cache at {path}: {detail}")]
    CorruptCache { path: PathBuf, detail: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("schema/parse error: {0}")]
    Parse(String),
}

/// What happened while parsing a delimited file. Malformed cells are
/// collected here instead of aborting the load; the affected cells are
/// nulled so columns stay row-aligned.
#[derive(Debug, Default)]
pub struct ParseSummary {
    pub rows_parsed: usize,
    pub errors: Vec<CellError>,
}

#[derive(Debug, Clone)]
pub struct CellError {
    pub row: usize,
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}, column {}: {:?} ({})",
            self.row, self.column, self.value, self.reason
        )
    }
}

/// Borrowed view of a single cell, used by previews and predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    Null,
    Int(i64),
    Float(f64),
    Str(&'a str),
    /// Naive timestamp in seconds since the Unix epoch.
    Date(i64),
}

impl fmt::Display for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRef::Null => Ok(()),
            ValueRef::Int(v) => write!(f, "{v}"),
            ValueRef::Float(v) => write!(f, "{v:.2}"),
            ValueRef::Str(v) => write!(f, "{v}"),
            ValueRef::Date(secs) => match column::secs_to_datetime(*secs) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
                None => Ok(()),
            },
        }
    }
}
