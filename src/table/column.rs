use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Null sentinel for `Int64` and `Date` columns. Two-sided inclusive range
/// checks can never match it, so filters exclude nulls without a branch.
pub const NULL_I64: i64 = i64::MIN;

pub fn secs_to_datetime(secs: i64) -> Option<NaiveDateTime> {
    if secs == NULL_I64 {
        return None;
    }
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

pub fn datetime_to_secs(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

/// Midnight timestamp for a calendar date.
pub fn date_to_secs(date: NaiveDate) -> i64 {
    datetime_to_secs(date.and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Str,
    Date,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Int64 | ColumnType::Float64)
    }
}

/// One typed column. Numeric nulls are `NULL_I64` / `f64::NAN`; string
/// cells are `(start, end)` offsets into the owning table's byte buffer,
/// with the empty slice standing for a missing value; dates are naive epoch
/// seconds.
#[derive(Debug, Clone)]
pub enum Column {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Str(Vec<(usize, usize)>),
    Date(Vec<i64>),
}

impl Column {
    pub fn with_capacity(column_type: ColumnType, capacity: usize) -> Self {
        match column_type {
            ColumnType::Int64 => Column::Int64(Vec::with_capacity(capacity)),
            ColumnType::Float64 => Column::Float64(Vec::with_capacity(capacity)),
            ColumnType::Str => Column::Str(Vec::with_capacity(capacity)),
            ColumnType::Date => Column::Date(Vec::with_capacity(capacity)),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int64(_) => ColumnType::Int64,
            Column::Float64(_) => ColumnType::Float64,
            Column::Str(_) => ColumnType::Str,
            Column::Date(_) => ColumnType::Date,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int64(values) => values.len(),
            Column::Float64(values) => values.len(),
            Column::Str(offsets) => offsets.len(),
            Column::Date(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ints(&self) -> Option<&[i64]> {
        match self {
            Column::Int64(values) => Some(values),
            _ => None,
        }
    }

    pub fn floats(&self) -> Option<&[f64]> {
        match self {
            Column::Float64(values) => Some(values),
            _ => None,
        }
    }

    pub fn str_offsets(&self) -> Option<&[(usize, usize)]> {
        match self {
            Column::Str(offsets) => Some(offsets),
            _ => None,
        }
    }

    pub fn dates(&self) -> Option<&[i64]> {
        match self {
            Column::Date(values) => Some(values),
            _ => None,
        }
    }

    /// Appends another column of the same variant; used when merging the
    /// per-chunk batches of a parallel parse into flat storage.
    pub fn append(&mut self, other: Column) {
        match (self, other) {
            (Column::Int64(dst), Column::Int64(src)) => dst.extend(src),
            (Column::Float64(dst), Column::Float64(src)) => dst.extend(src),
            (Column::Str(dst), Column::Str(src)) => dst.extend(src),
            (Column::Date(dst), Column::Date(src)) => dst.extend(src),
            _ => debug_assert!(false, "column variant mismatch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sentinel_outside_any_inclusive_range() {
        assert!(NULL_I64 < i64::MIN + 1);
        let lo = -1_000_000i64;
        let hi = 1_000_000i64;
        assert!(!(NULL_I64 >= lo && NULL_I64 <= hi));
    }

    #[test]
    fn timestamp_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let secs = date_to_secs(date);
        let back = secs_to_datetime(secs).unwrap();
        assert_eq!(back.date(), date);
        assert_eq!(back.time(), NaiveTime::MIN);
    }

    #[test]
    fn null_sentinel_is_not_a_datetime() {
        assert!(secs_to_datetime(NULL_I64).is_none());
    }

    #[test]
    fn append_merges_batches() {
        let mut col = Column::Int64(vec![1, 2]);
        col.append(Column::Int64(vec![3]));
        assert_eq!(col.ints().unwrap(), &[1, 2, 3]);
        assert_eq!(col.len(), 3);
    }
}
