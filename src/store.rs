//! Dataset persistence: a parquet-backed cache wrapped around the
//! synthetic generator.
//!
//! The store memoizes the loaded table, so repeated loads within a process
//! are free, and it only touches the filesystem when the cache file is
//! missing or unreadable. An unreadable file is diagnosed and silently
//! replaced by a fresh generation rather than aborting the dashboard.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::generate::{self, GeneratorOptions};
use crate::table::arrow;
use crate::table::data_table::DataTable;
use crate::table::PipelineError;
use crate::vocab;

pub struct DatasetStore {
    path: PathBuf,
    rows: usize,
    options: GeneratorOptions,
    cached: Option<DataTable>,
    writes: usize,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>, rows: usize) -> Self {
        Self::with_options(path, rows, GeneratorOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, rows: usize, options: GeneratorOptions) -> Self {
        DatasetStore {
            path: path.into(),
            rows,
            options,
            cached: None,
            writes: 0,
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.path
    }

    /// Number of cache files written over the store's lifetime. Stays at
    /// zero when every load is served from disk or memory.
    pub fn writes_performed(&self) -> usize {
        self.writes
    }

    /// Drops the in-memory memo; the next [`load`](Self::load) goes back
    /// to the cache file (or regenerates if it is gone).
    pub fn reset(&mut self) {
        self.cached = None;
    }

    /// Returns the dataset, loading or generating it on first use.
    pub fn load(&mut self) -> Result<&DataTable, PipelineError> {
        let table = match self.cached.take() {
            Some(table) => table,
            None => self.fetch()?,
        };
        Ok(self.cached.insert(table))
    }

    fn fetch(&mut self) -> Result<DataTable, PipelineError> {
        if self.path.exists() {
            match arrow::read_parquet(&self.path) {
                Ok(table) => {
                    for (column, count) in vocab::check_table(&table) {
                        warn!(
                            column = column.as_str(),
                            rows = count,
                            "cached values outside the fixed vocabulary"
                        );
                    }
                    info!(
                        rows = table.row_count(),
                        path = %self.path.display(),
                        "loaded cached dataset"
                    );
                    return Ok(table);
                }
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "cache file unreadable, regenerating"
                    );
                }
            }
        }

        let table = generate::generate_with(self.rows, &self.options, &mut rand::rng())?;
        arrow::write_parquet(&table, &self.path)?;
        self.writes += 1;
        info!(
            rows = table.row_count(),
            path = %self.path.display(),
            "generated dataset and wrote cache"
        );
        Ok(table)
    }
}
