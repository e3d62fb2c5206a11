//! LRU-cached aggregation queries.
//!
//! A [`QueryKey`] captures the full identity of a computation: the
//! operation, its column arguments and the [`FilterSelection`] the view
//! was produced by. Identical dashboard cycles therefore hit the cache,
//! and any change to the selection changes every key. Results are owned
//! copies, so a hit needs no access to the table that produced it.

use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::aggregate::{self, YearMonth};
use crate::filter::FilterSelection;
use crate::table::view::TableView;
use crate::table::PipelineError;

const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    CountBy {
        selection: FilterSelection,
        column: String,
    },
    SumBy {
        selection: FilterSelection,
        group: String,
        metric: String,
    },
    MonthlyCount {
        selection: FilterSelection,
        date_column: String,
    },
    MonthlySum {
        selection: FilterSelection,
        date_column: String,
        metric: String,
    },
    Mean {
        selection: FilterSelection,
        column: String,
    },
    Sum {
        selection: FilterSelection,
        column: String,
    },
    CountDistinct {
        selection: FilterSelection,
        column: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Counts(Vec<(String, u64)>),
    Sums(Vec<(String, f64)>),
    MonthlyCounts(Vec<(YearMonth, u64)>),
    MonthlySums(Vec<(YearMonth, f64)>),
    Mean(Option<f64>),
    Scalar(f64),
    Distinct(usize),
}

/// Bounded LRU cache of query results, shared by interior mutability so
/// the dashboard can consult it through a plain reference.
#[derive(Debug)]
pub struct QueryCache {
    cache: RefCell<LruCache<QueryKey, QueryResult>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            cache: RefCell::new(LruCache::new(capacity)),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub fn lookup(&self, key: &QueryKey) -> Option<QueryResult> {
        let result = self.cache.borrow_mut().get(key).cloned();
        match result {
            Some(_) => self.hits.set(self.hits.get() + 1),
            None => self.misses.set(self.misses.get() + 1),
        }
        result
    }

    pub fn store(&self, key: QueryKey, value: QueryResult) {
        self.cache.borrow_mut().put(key, value);
    }

    /// Drops every cached result. Used when the underlying dataset
    /// changes; hit counters survive.
    pub fn reset(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifetime (hits, misses) counters.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.get(), self.misses.get())
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A filtered view plus the cache to consult, exposing the aggregation
/// operations with transparent caching. Results are identical with the
/// cache absent.
pub struct CachedQueries<'a> {
    view: TableView<'a>,
    selection: FilterSelection,
    cache: Option<&'a QueryCache>,
}

impl<'a> CachedQueries<'a> {
    pub fn new(view: TableView<'a>, selection: FilterSelection, cache: Option<&'a QueryCache>) -> Self {
        CachedQueries {
            view,
            selection,
            cache,
        }
    }

    pub fn view(&self) -> &TableView<'a> {
        &self.view
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn count_by(&self, column: &str) -> Result<Vec<(String, u64)>, PipelineError> {
        let key = QueryKey::CountBy {
            selection: self.selection.clone(),
            column: column.to_string(),
        };
        if let Some(QueryResult::Counts(counts)) = self.probe(&key) {
            return Ok(counts);
        }
        let counts = aggregate::count_by(&self.view, column)?;
        self.remember(key, QueryResult::Counts(counts.clone()));
        Ok(counts)
    }

    pub fn sum_by(&self, group: &str, metric: &str) -> Result<Vec<(String, f64)>, PipelineError> {
        let key = QueryKey::SumBy {
            selection: self.selection.clone(),
            group: group.to_string(),
            metric: metric.to_string(),
        };
        if let Some(QueryResult::Sums(sums)) = self.probe(&key) {
            return Ok(sums);
        }
        let sums = aggregate::sum_by(&self.view, group, metric)?;
        self.remember(key, QueryResult::Sums(sums.clone()));
        Ok(sums)
    }

    pub fn monthly_count(
        &self,
        date_column: &str,
    ) -> Result<Vec<(YearMonth, u64)>, PipelineError> {
        let key = QueryKey::MonthlyCount {
            selection: self.selection.clone(),
            date_column: date_column.to_string(),
        };
        if let Some(QueryResult::MonthlyCounts(months)) = self.probe(&key) {
            return Ok(months);
        }
        let months = aggregate::monthly_count(&self.view, date_column)?;
        self.remember(key, QueryResult::MonthlyCounts(months.clone()));
        Ok(months)
    }

    pub fn monthly_sum(
        &self,
        date_column: &str,
        metric: &str,
    ) -> Result<Vec<(YearMonth, f64)>, PipelineError> {
        let key = QueryKey::MonthlySum {
            selection: self.selection.clone(),
            date_column: date_column.to_string(),
            metric: metric.to_string(),
        };
        if let Some(QueryResult::MonthlySums(months)) = self.probe(&key) {
            return Ok(months);
        }
        let months = aggregate::monthly_sum(&self.view, date_column, metric)?;
        self.remember(key, QueryResult::MonthlySums(months.clone()));
        Ok(months)
    }

    pub fn mean(&self, column: &str) -> Result<Option<f64>, PipelineError> {
        let key = QueryKey::Mean {
            selection: self.selection.clone(),
            column: column.to_string(),
        };
        if let Some(QueryResult::Mean(mean)) = self.probe(&key) {
            return Ok(mean);
        }
        let mean = aggregate::mean(&self.view, column)?;
        self.remember(key, QueryResult::Mean(mean));
        Ok(mean)
    }

    pub fn sum(&self, column: &str) -> Result<f64, PipelineError> {
        let key = QueryKey::Sum {
            selection: self.selection.clone(),
            column: column.to_string(),
        };
        if let Some(QueryResult::Scalar(total)) = self.probe(&key) {
            return Ok(total);
        }
        let total = aggregate::sum(&self.view, column)?;
        self.remember(key, QueryResult::Scalar(total));
        Ok(total)
    }

    pub fn count_distinct(&self, column: &str) -> Result<usize, PipelineError> {
        let key = QueryKey::CountDistinct {
            selection: self.selection.clone(),
            column: column.to_string(),
        };
        if let Some(QueryResult::Distinct(count)) = self.probe(&key) {
            return Ok(count);
        }
        let count = aggregate::count_distinct(&self.view, column)?;
        self.remember(key, QueryResult::Distinct(count));
        Ok(count)
    }

    fn probe(&self, key: &QueryKey) -> Option<QueryResult> {
        self.cache.and_then(|cache| cache.lookup(key))
    }

    fn remember(&self, key: QueryKey, value: QueryResult) {
        if let Some(cache) = self.cache {
            cache.store(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::data_table::{DataTable, TableBuilder};

    fn small_table() -> DataTable {
        let mut builder = TableBuilder::new();
        builder
            .push_str_column("brand", ["Nike", "Zara", "Nike"])
            .push_float_column("price", vec![10.0, 20.0, 30.0]);
        builder.finish().unwrap()
    }

    fn queries<'a>(table: &'a DataTable, cache: Option<&'a QueryCache>) -> CachedQueries<'a> {
        let selection = FilterSelection::new();
        let view = selection.apply(table).unwrap();
        CachedQueries::new(view, selection, cache)
    }

    #[test]
    fn second_identical_query_hits() {
        let table = small_table();
        let cache = QueryCache::new();
        let q = queries(&table, Some(&cache));

        let first = q.count_by("brand").unwrap();
        let second = q.count_by("brand").unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.stats(), (1, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_selections_get_different_keys() {
        let table = small_table();
        let cache = QueryCache::new();

        let all = queries(&table, Some(&cache));
        all.count_by("brand").unwrap();

        let selection = FilterSelection::new().any_of("brand", ["Nike"]);
        let view = selection.apply(&table).unwrap();
        let nike = CachedQueries::new(view, selection, Some(&cache));
        let counts = nike.count_by("brand").unwrap();

        assert_eq!(counts, vec![("Nike".to_string(), 2)]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats(), (0, 2));
    }

    #[test]
    fn reset_empties_the_cache() {
        let table = small_table();
        let cache = QueryCache::new();
        let q = queries(&table, Some(&cache));

        q.sum("price").unwrap();
        assert_eq!(cache.len(), 1);
        cache.reset();
        assert!(cache.is_empty());

        q.sum("price").unwrap();
        assert_eq!(cache.stats(), (0, 2));
    }

    #[test]
    fn capacity_one_evicts_older_entries() {
        let table = small_table();
        let cache = QueryCache::with_capacity(1);
        let q = queries(&table, Some(&cache));

        q.count_by("brand").unwrap();
        q.sum("price").unwrap();
        assert_eq!(cache.len(), 1);

        // The count query was evicted, so it recomputes.
        q.count_by("brand").unwrap();
        assert_eq!(cache.stats(), (0, 3));
    }

    #[test]
    fn cacheless_queries_still_work() {
        let table = small_table();
        let q = queries(&table, None);
        assert_eq!(q.mean("price").unwrap(), Some(20.0));
        assert_eq!(q.count_distinct("brand").unwrap(), 2);
    }

    #[test]
    fn cached_and_uncached_agree() {
        let table = small_table();
        let cache = QueryCache::new();
        let cached = queries(&table, Some(&cache));
        let plain = queries(&table, None);

        assert_eq!(
            cached.sum_by("brand", "price").unwrap(),
            plain.sum_by("brand", "price").unwrap()
        );
        // Run it twice so the second answer comes from the cache.
        assert_eq!(
            cached.sum_by("brand", "price").unwrap(),
            plain.sum_by("brand", "price").unwrap()
        );
    }
}
