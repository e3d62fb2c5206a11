use crate::table::data_table::DataTable;
use crate::table::ValueRef;

/// Row membership of a view. The full-table case is kept symbolic so that
/// an unconstrained dashboard does not materialize an index per row.
#[derive(Debug, Clone)]
enum Rows {
    All,
    Subset(Vec<usize>),
}

/// A borrowed, possibly filtered row subset of a [`DataTable`].
///
/// Views never copy column data; they hold row indices into the parent
/// table and every aggregate walks those indices in table order.
#[derive(Debug, Clone)]
pub struct TableView<'a> {
    table: &'a DataTable,
    rows: Rows,
}

impl<'a> TableView<'a> {
    /// View over every row of the table.
    pub fn all(table: &'a DataTable) -> Self {
        TableView {
            table,
            rows: Rows::All,
        }
    }

    /// View over an explicit set of row indices, in the given order.
    pub fn from_indices(table: &'a DataTable, indices: Vec<usize>) -> Self {
        debug_assert!(indices.iter().all(|&i| i < table.row_count()));
        TableView {
            table,
            rows: Rows::Subset(indices),
        }
    }

    pub fn table(&self) -> &'a DataTable {
        self.table
    }

    pub fn len(&self) -> usize {
        match &self.rows {
            Rows::All => self.table.row_count(),
            Rows::Subset(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row index at a view position, or `None` past the end.
    pub fn row_at(&self, position: usize) -> Option<usize> {
        match &self.rows {
            Rows::All => (position < self.table.row_count()).then_some(position),
            Rows::Subset(indices) => indices.get(position).copied(),
        }
    }

    /// Iterates the underlying row indices in view order.
    pub fn iter(&self) -> RowIndexIter<'_> {
        let inner = match &self.rows {
            Rows::All => RowIndexInner::All(0..self.table.row_count()),
            Rows::Subset(indices) => RowIndexInner::Subset(indices.iter()),
        };
        RowIndexIter { inner }
    }

    /// First `limit` rows of the view as display cells, one vector per row.
    pub fn head(&self, limit: usize) -> Vec<Vec<ValueRef<'_>>> {
        self.iter()
            .take(limit)
            .map(|row| self.table.row_values(row))
            .collect()
    }
}

pub struct RowIndexIter<'a> {
    inner: RowIndexInner<'a>,
}

enum RowIndexInner<'a> {
    All(std::ops::Range<usize>),
    Subset(std::slice::Iter<'a, usize>),
}

impl Iterator for RowIndexIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match &mut self.inner {
            RowIndexInner::All(range) => range.next(),
            RowIndexInner::Subset(iter) => iter.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            RowIndexInner::All(range) => range.size_hint(),
            RowIndexInner::Subset(iter) => iter.size_hint(),
        }
    }
}

impl ExactSizeIterator for RowIndexIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::data_table::TableBuilder;

    fn sample_table() -> DataTable {
        let mut builder = TableBuilder::new();
        builder
            .push_str_column("brand", ["Nike", "Puma", "Zara"])
            .push_int_column("stock", vec![5, 7, 9]);
        builder.finish().unwrap()
    }

    #[test]
    fn all_view_covers_every_row() {
        let table = sample_table();
        let view = TableView::all(&table);
        assert_eq!(view.len(), 3);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn subset_view_preserves_order() {
        let table = sample_table();
        let view = TableView::from_indices(&table, vec![2, 0]);
        assert_eq!(view.len(), 2);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![2, 0]);
    }

    #[test]
    fn head_limits_rows() {
        let table = sample_table();
        let view = TableView::all(&table);
        let head = view.head(2);
        assert_eq!(head.len(), 2);
        assert_eq!(head[0][0], ValueRef::Str("Nike"));
        assert_eq!(head[1][1], ValueRef::Int(7));
    }
}
