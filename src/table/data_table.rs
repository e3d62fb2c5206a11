use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::str;

use chrono::{NaiveDate, NaiveDateTime};
use memchr::{memchr, memchr_iter};
use memmap2::Mmap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::table::column::{date_to_secs, datetime_to_secs, Column, ColumnType, NULL_I64};
use crate::table::{CellError, ParseSummary, PipelineError, ValueRef};

/// Rows sampled from the head of a file when inferring column types.
const INFER_SAMPLE_ROWS: usize = 100;

const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M",
    "%m/%d/%y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Bytes backing a table's string cells: either a memory-mapped file
/// (zero-copy for clean UTF-8 CSV input) or an owned buffer (decoded,
/// unquoted or generated data).
pub enum TableBuffer {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl TableBuffer {
    pub fn bytes(&self) -> &[u8] {
        match self {
            TableBuffer::Mapped(mmap) => mmap,
            TableBuffer::Owned(vec) => vec,
        }
    }

    fn into_owned(self) -> TableBuffer {
        match self {
            TableBuffer::Mapped(mmap) => TableBuffer::Owned(mmap.to_vec()),
            owned => owned,
        }
    }
}

impl std::fmt::Debug for TableBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableBuffer::Mapped(mmap) => write!(f, "TableBuffer::Mapped({} bytes)", mmap.len()),
            TableBuffer::Owned(vec) => write!(f, "TableBuffer::Owned({} bytes)", vec.len()),
        }
    }
}

/// Columnar table for the dashboard pipeline.
///
/// Headers, one typed [`Column`] per header and a byte buffer that string
/// cells reference by offset. Built from a delimited file, from the
/// synthetic generator or from a persisted parquet file; treated as
/// read-only once handed to the filter/aggregation layers.
#[derive(Debug)]
pub struct DataTable {
    buffer: TableBuffer,
    headers: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl DataTable {
    /// Parses a delimited UTF-8 file straight from a memory map.
    ///
    /// This is the trusting entry point for files of known provenance
    /// (tests, demos, locally generated data). Real-world input goes
    /// through [`crate::ingest::ingest`], which adds encoding detection
    /// and the rest of the cleanup pipeline before delegating here.
    pub fn from_csv(path: &Path) -> Result<(Self, ParseSummary), PipelineError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse_delimited(TableBuffer::Mapped(mmap))
    }

    /// Parses CSV bytes into a columnar table.
    ///
    /// Quote-free input is split into newline-aligned chunks and parsed in
    /// parallel; input containing RFC 4180 quoting falls back to a
    /// sequential quote-aware scan (and to an owned buffer, so escaped
    /// quotes can be rewritten). Malformed cells become nulls and are
    /// reported in the [`ParseSummary`] instead of aborting.
    pub fn parse_delimited(buffer: TableBuffer) -> Result<(Self, ParseSummary), PipelineError> {
        let quoted = memchr(b'"', buffer.bytes()).is_some();
        let buffer = if quoted { buffer.into_owned() } else { buffer };
        let bytes = buffer.bytes();

        let header_end =
            memchr(b'\n', bytes).ok_or_else(|| PipelineError::Parse("missing header line".into()))?;
        let headers: Vec<String> = split_simple(trim_cr(&bytes[..header_end]))
            .into_iter()
            .map(|(s, e)| {
                String::from_utf8_lossy(strip_quotes(&bytes[s..e])).trim().to_string()
            })
            .collect();

        let data_start = header_end + 1;
        let schema = infer_schema(&bytes[data_start..], headers.len(), quoted);

        let (mut columns, mut errors, row_count, escapes) = if quoted {
            parse_sequential(bytes, data_start, &schema, &headers)
        } else {
            parse_chunked(bytes, data_start, &schema, &headers)
        };

        errors.truncate(MAX_REPORTED_ERRORS);
        let mut table = DataTable {
            buffer,
            headers,
            columns: Vec::new(),
            row_count,
        };
        // Escaped quotes cannot be represented by a plain slice of the
        // input; rewrite them into the buffer tail and repoint the cell.
        if !escapes.is_empty() {
            if let TableBuffer::Owned(vec) = &mut table.buffer {
                for patch in escapes {
                    if let Column::Str(offsets) = &mut columns[patch.column] {
                        let (s, e) = offsets[patch.row];
                        let unescaped = unescape_quotes(&vec[s..e]);
                        let start = vec.len();
                        vec.extend_from_slice(&unescaped);
                        offsets[patch.row] = (start, vec.len());
                    }
                }
            }
        }
        table.columns = columns;

        Ok((
            table,
            ParseSummary {
                rows_parsed: row_count,
                errors,
            },
        ))
    }

    /// Builds a table from fully materialized columns plus the string arena
    /// they point into. Lengths must agree.
    pub(crate) fn from_parts(
        arena: Vec<u8>,
        headers: Vec<String>,
        columns: Vec<Column>,
    ) -> Result<Self, PipelineError> {
        let row_count = columns.first().map_or(0, Column::len);
        if columns.iter().any(|c| c.len() != row_count) {
            return Err(PipelineError::Parse("column lengths differ".into()));
        }
        if headers.len() != columns.len() {
            return Err(PipelineError::Parse("header/column count mismatch".into()));
        }
        Ok(DataTable {
            buffer: TableBuffer::Owned(arena),
            headers,
            columns,
            row_count,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, PipelineError> {
        let idx = self
            .headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        Ok(&self.columns[idx])
    }

    pub fn column_type(&self, name: &str) -> Result<ColumnType, PipelineError> {
        Ok(self.column(name)?.column_type())
    }

    /// Names of the numeric (Int64/Float64) columns, in header order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.headers
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| c.column_type().is_numeric())
            .map(|(h, _)| h.as_str())
            .collect()
    }

    pub fn ints_of(&self, name: &str) -> Result<&[i64], PipelineError> {
        self.column(name)?
            .ints()
            .ok_or_else(|| type_error(name, "an integer column"))
    }

    pub fn floats_of(&self, name: &str) -> Result<&[f64], PipelineError> {
        self.column(name)?
            .floats()
            .ok_or_else(|| type_error(name, "a float column"))
    }

    pub fn dates_of(&self, name: &str) -> Result<&[i64], PipelineError> {
        self.column(name)?
            .dates()
            .ok_or_else(|| type_error(name, "a date column"))
    }

    pub fn str_offsets_of(&self, name: &str) -> Result<&[(usize, usize)], PipelineError> {
        self.column(name)?
            .str_offsets()
            .ok_or_else(|| type_error(name, "a string column"))
    }

    /// Resolves a string cell's offsets against the byte buffer.
    pub fn str_at(&self, (start, end): (usize, usize)) -> &str {
        str::from_utf8(&self.buffer.bytes()[start..end]).unwrap_or("")
    }

    pub fn str_values(
        &self,
        name: &str,
    ) -> Result<impl Iterator<Item = &str> + '_, PipelineError> {
        let offsets = self.str_offsets_of(name)?;
        Ok(offsets.iter().map(move |&span| self.str_at(span)))
    }

    /// Nullable numeric iterator over an Int64 or Float64 column, widened
    /// to f64 (sentinel and NaN both surface as `None`).
    pub fn numeric_values<'a>(
        &'a self,
        name: &str,
    ) -> Result<Box<dyn Iterator<Item = Option<f64>> + 'a>, PipelineError> {
        match self.column(name)? {
            Column::Int64(values) => Ok(Box::new(
                values
                    .iter()
                    .map(|&v| (v != NULL_I64).then_some(v as f64)),
            )),
            Column::Float64(values) => Ok(Box::new(
                values.iter().map(|&v| (!v.is_nan()).then_some(v)),
            )),
            _ => Err(type_error(name, "a numeric column")),
        }
    }

    pub fn cell<'a>(&'a self, column: &'a Column, row: usize) -> ValueRef<'a> {
        match column {
            Column::Int64(values) => match values.get(row) {
                Some(&v) if v != NULL_I64 => ValueRef::Int(v),
                _ => ValueRef::Null,
            },
            Column::Float64(values) => match values.get(row) {
                Some(&v) if !v.is_nan() => ValueRef::Float(v),
                _ => ValueRef::Null,
            },
            Column::Str(offsets) => match offsets.get(row) {
                Some(&span) => {
                    let s = self.str_at(span);
                    if s.is_empty() {
                        ValueRef::Null
                    } else {
                        ValueRef::Str(s)
                    }
                }
                None => ValueRef::Null,
            },
            Column::Date(values) => match values.get(row) {
                Some(&v) if v != NULL_I64 => ValueRef::Date(v),
                _ => ValueRef::Null,
            },
        }
    }

    pub fn row_values(&self, row: usize) -> Vec<ValueRef<'_>> {
        self.columns.iter().map(|c| self.cell(c, row)).collect()
    }

    /// Trims header whitespace and replaces internal spaces with
    /// underscores, the way the CSV dashboard normalizes its input.
    pub fn normalize_headers(&mut self) {
        for header in &mut self.headers {
            *header = header.trim().replace(' ', "_");
        }
    }

    /// Reinterprets a string column as dates; cells that fail every known
    /// format become nulls. Returns the number of nulls introduced.
    /// Converting an existing Date column is a no-op.
    pub fn convert_to_date(&mut self, name: &str) -> Result<usize, PipelineError> {
        let idx = self
            .headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        if matches!(self.columns[idx], Column::Date(_)) {
            return Ok(0);
        }
        let offsets = self.columns[idx]
            .str_offsets()
            .ok_or_else(|| type_error(name, "a string column"))?
            .to_vec();

        let mut nulls = 0;
        let bytes = self.buffer.bytes();
        let values: Vec<i64> = offsets
            .iter()
            .map(|&(s, e)| match parse_date_bytes(&bytes[s..e]) {
                Some(secs) => secs,
                None => {
                    if e > s {
                        nulls += 1;
                    }
                    NULL_I64
                }
            })
            .collect();
        self.columns[idx] = Column::Date(values);
        Ok(nulls)
    }

    /// Appends a Float64 column holding the elementwise product of two
    /// numeric columns; a null in either operand yields a null.
    pub fn derive_product(
        &mut self,
        name: &str,
        left: &str,
        right: &str,
    ) -> Result<(), PipelineError> {
        let a: Vec<Option<f64>> = self.numeric_values(left)?.collect();
        let b: Vec<Option<f64>> = self.numeric_values(right)?.collect();
        let product: Vec<f64> = a
            .into_iter()
            .zip(b)
            .map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) => x * y,
                _ => f64::NAN,
            })
            .collect();
        self.headers.push(name.to_string());
        self.columns.push(Column::Float64(product));
        Ok(())
    }

    /// Logical equality: same header set, same row count, and per-column
    /// values equal by content (strings by text, floats by bit pattern).
    /// Column order does not matter.
    pub fn content_eq(&self, other: &DataTable) -> bool {
        if self.row_count != other.row_count || self.headers.len() != other.headers.len() {
            return false;
        }
        for (name, column) in self.headers.iter().zip(&self.columns) {
            let Ok(theirs) = other.column(name) else {
                return false;
            };
            let equal = match (column, theirs) {
                (Column::Int64(a), Column::Int64(b)) => a == b,
                (Column::Date(a), Column::Date(b)) => a == b,
                (Column::Float64(a), Column::Float64(b)) => {
                    a.len() == b.len()
                        && a.iter()
                            .zip(b)
                            .all(|(x, y)| x.to_bits() == y.to_bits())
                }
                (Column::Str(a), Column::Str(b)) => {
                    a.len() == b.len()
                        && a.iter()
                            .zip(b)
                            .all(|(&x, &y)| self.str_at(x) == other.str_at(y))
                }
                _ => false,
            };
            if !equal {
                return false;
            }
        }
        true
    }

    pub(crate) fn columns(&self) -> &[Column] {
        &self.columns
    }
}

const MAX_REPORTED_ERRORS: usize = 256;

fn type_error(column: &str, expected: &'static str) -> PipelineError {
    PipelineError::ColumnType {
        column: column.to_string(),
        expected,
    }
}

pub(crate) fn parse_date_bytes(field: &[u8]) -> Option<i64> {
    let text = str::from_utf8(strip_quotes(field)).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(datetime_to_secs(dt));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date_to_secs(d));
        }
    }
    None
}

fn trim_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

fn strip_quotes(field: &[u8]) -> &[u8] {
    if field.len() >= 2 && field[0] == b'"' && field[field.len() - 1] == b'"' {
        &field[1..field.len() - 1]
    } else {
        field
    }
}

fn unescape_quotes(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        out.push(field[i]);
        if field[i] == b'"' && field.get(i + 1) == Some(&b'"') {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// Field spans of one quote-free record, relative to the record's slice.
fn split_simple(line: &[u8]) -> Vec<(usize, usize)> {
    let mut fields = Vec::new();
    let mut start = 0;
    for comma in memchr_iter(b',', line) {
        fields.push((start, comma));
        start = comma + 1;
    }
    fields.push((start, line.len()));
    fields
}

/// Field spans of a record that may contain RFC 4180 quoting.
fn split_quoted(record: &[u8]) -> Vec<(usize, usize)> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, &b) in record.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                fields.push((start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push((start, record.len()));
    fields
}

/// Infers per-column types by voting over the first rows: a column is
/// numeric or temporal only if every non-empty sampled cell agrees.
fn infer_schema(data: &[u8], num_cols: usize, quoted: bool) -> Vec<ColumnType> {
    #[derive(Clone, Copy)]
    struct Vote {
        seen: usize,
        int: bool,
        float: bool,
        date: bool,
    }
    let mut votes = vec![
        Vote {
            seen: 0,
            int: true,
            float: true,
            date: true,
        };
        num_cols
    ];

    let mut sampled = 0;
    let mut pos = 0;
    while sampled < INFER_SAMPLE_ROWS && pos < data.len() {
        let end = next_record_end(data, pos, quoted);
        let record = trim_cr(&data[pos..end]);
        pos = end + 1;
        if record.is_empty() {
            continue;
        }
        let spans = if quoted {
            split_quoted(record)
        } else {
            split_simple(record)
        };
        if spans.len() != num_cols {
            continue;
        }
        for (vote, &(s, e)) in votes.iter_mut().zip(&spans) {
            let field = strip_quotes(&record[s..e]);
            if field.is_empty() {
                continue;
            }
            vote.seen += 1;
            vote.int &= atoi_simd::parse::<i64>(field).is_ok();
            vote.float &= fast_float::parse::<f64, _>(field).is_ok();
            vote.date &= parse_date_bytes(field).is_some();
        }
        sampled += 1;
    }

    votes
        .into_iter()
        .map(|v| {
            if v.seen == 0 {
                ColumnType::Str
            } else if v.int {
                ColumnType::Int64
            } else if v.float {
                ColumnType::Float64
            } else if v.date {
                ColumnType::Date
            } else {
                ColumnType::Str
            }
        })
        .collect()
}

/// Index one past the end of the record starting at `pos` (position of the
/// terminating newline, or the buffer end for an unterminated final line).
fn next_record_end(data: &[u8], pos: usize, quoted: bool) -> usize {
    if !quoted {
        return memchr(b'\n', &data[pos..])
            .map(|i| pos + i)
            .unwrap_or(data.len());
    }
    let mut in_quotes = false;
    for (i, &b) in data[pos..].iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => return pos + i,
            _ => {}
        }
    }
    data.len()
}

struct EscapePatch {
    column: usize,
    row: usize,
}

struct Batch {
    columns: Vec<Column>,
    row_count: usize,
    /// Errors with rows local to the batch; the merge step rebases them.
    errors: Vec<CellError>,
}

/// Newline-aligned chunk boundaries for parallel parsing.
fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
    if data.is_empty() {
        return vec![];
    }
    let chunk_size = data.len() / num_chunks.max(1);
    let mut boundaries = Vec::with_capacity(num_chunks);
    let mut start = 0;
    for i in 0..num_chunks.saturating_sub(1) {
        let mut end = (i + 1) * chunk_size;
        if end <= start {
            continue;
        }
        while end < data.len() && data[end] != b'\n' {
            end += 1;
        }
        if end < data.len() {
            end += 1;
        }
        if start < end {
            boundaries.push((start, end));
        }
        start = end;
    }
    if start < data.len() {
        boundaries.push((start, data.len()));
    }
    boundaries
}

fn parse_chunked(
    bytes: &[u8],
    data_start: usize,
    schema: &[ColumnType],
    headers: &[String],
) -> (Vec<Column>, Vec<CellError>, usize, Vec<EscapePatch>) {
    let data = &bytes[data_start..];
    let num_threads = rayon::current_num_threads();
    let chunks = find_chunk_boundaries(data, num_threads);

    let avg_line_len = memchr(b'\n', data).map(|i| i + 1).unwrap_or(64).max(8);
    let estimated_rows = data.len() / num_threads.max(1) / avg_line_len + 16;

    let batches: Vec<Batch> = chunks
        .par_iter()
        .map(|&(start, end)| {
            parse_rows(
                &data[start..end],
                data_start + start,
                schema,
                headers,
                estimated_rows,
                false,
            )
            .0
        })
        .collect();

    merge_batches(batches, schema)
}

fn parse_sequential(
    bytes: &[u8],
    data_start: usize,
    schema: &[ColumnType],
    headers: &[String],
) -> (Vec<Column>, Vec<CellError>, usize, Vec<EscapePatch>) {
    let data = &bytes[data_start..];
    let estimated_rows = data.len() / 64 + 16;
    let (batch, escapes) = parse_rows(data, data_start, schema, headers, estimated_rows, true);
    let row_count = batch.row_count;
    (batch.columns, batch.errors, row_count, escapes)
}

/// Parses every record in `chunk`. String cell offsets are absolute in the
/// table buffer (`chunk` starts at `chunk_offset` within it).
fn parse_rows(
    chunk: &[u8],
    chunk_offset: usize,
    schema: &[ColumnType],
    headers: &[String],
    estimated_rows: usize,
    quoted: bool,
) -> (Batch, Vec<EscapePatch>) {
    let num_cols = schema.len();
    let mut columns: Vec<Column> = schema
        .iter()
        .map(|&t| Column::with_capacity(t, estimated_rows))
        .collect();
    let mut errors = Vec::new();
    let mut escapes = Vec::new();
    let mut row_count = 0;

    let mut pos = 0;
    while pos < chunk.len() {
        let end = next_record_end(chunk, pos, quoted);
        let record = trim_cr(&chunk[pos..end]);
        let record_offset = chunk_offset + pos;
        pos = end + 1;
        if record.is_empty() {
            continue;
        }

        let spans = if quoted {
            split_quoted(record)
        } else {
            split_simple(record)
        };
        if spans.len() != num_cols {
            errors.push(CellError {
                row: row_count,
                column: String::new(),
                value: String::new(),
                reason: format!("expected {} fields, got {}", num_cols, spans.len()),
            });
            continue;
        }

        for (col_idx, &(s, e)) in spans.iter().enumerate() {
            let raw = &record[s..e];
            let field = strip_quotes(raw);
            // Offsets of the field content, absolute in the table buffer.
            let quote_trim = (raw.len() - field.len()) / 2;
            let abs_start = record_offset + s + quote_trim;
            let abs_end = abs_start + field.len();

            match (&mut columns[col_idx], schema[col_idx]) {
                (Column::Int64(values), _) => match atoi_simd::parse::<i64>(field) {
                    Ok(v) => values.push(v),
                    Err(err) => {
                        if !field.is_empty() {
                            errors.push(CellError {
                                row: row_count,
                                column: headers[col_idx].clone(),
                                value: String::from_utf8_lossy(field).to_string(),
                                reason: err.to_string(),
                            });
                        }
                        values.push(NULL_I64);
                    }
                },
                (Column::Float64(values), _) => match fast_float::parse::<f64, _>(field) {
                    Ok(v) => values.push(v),
                    Err(err) => {
                        if !field.is_empty() {
                            errors.push(CellError {
                                row: row_count,
                                column: headers[col_idx].clone(),
                                value: String::from_utf8_lossy(field).to_string(),
                                reason: err.to_string(),
                            });
                        }
                        values.push(f64::NAN);
                    }
                },
                (Column::Date(values), _) => match parse_date_bytes(field) {
                    Some(secs) => values.push(secs),
                    None => {
                        if !field.is_empty() {
                            errors.push(CellError {
                                row: row_count,
                                column: headers[col_idx].clone(),
                                value: String::from_utf8_lossy(field).to_string(),
                                reason: "unrecognized date".into(),
                            });
                        }
                        values.push(NULL_I64);
                    }
                },
                (Column::Str(offsets), _) => {
                    offsets.push((abs_start, abs_end));
                    if quoted && field.windows(2).any(|w| w == b"\"\"") {
                        escapes.push(EscapePatch {
                            column: col_idx,
                            row: row_count,
                        });
                    }
                }
            }
        }
        row_count += 1;
    }

    (
        Batch {
            columns,
            row_count,
            errors,
        },
        escapes,
    )
}

fn merge_batches(
    batches: Vec<Batch>,
    schema: &[ColumnType],
) -> (Vec<Column>, Vec<CellError>, usize, Vec<EscapePatch>) {
    let mut columns: Vec<Column> = schema
        .iter()
        .map(|&t| Column::with_capacity(t, 0))
        .collect();
    let mut errors = Vec::new();
    let mut total_rows = 0;

    for batch in batches {
        for (dst, src) in columns.iter_mut().zip(batch.columns) {
            dst.append(src);
        }
        errors.extend(batch.errors.into_iter().map(|mut e| {
            e.row += total_rows;
            e
        }));
        total_rows += batch.row_count;
    }
    (columns, errors, total_rows, Vec::new())
}

/// Builds in-memory tables (synthetic data, parquet reads) by materializing
/// strings into an owned arena.
#[derive(Default)]
pub struct TableBuilder {
    arena: Vec<u8>,
    headers: Vec<String>,
    columns: Vec<Column>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str_column<S: AsRef<str>>(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let mut offsets = Vec::new();
        for value in values {
            let start = self.arena.len();
            self.arena.extend_from_slice(value.as_ref().as_bytes());
            offsets.push((start, self.arena.len()));
        }
        self.headers.push(name.to_string());
        self.columns.push(Column::Str(offsets));
        self
    }

    pub fn push_int_column(&mut self, name: &str, values: Vec<i64>) -> &mut Self {
        self.headers.push(name.to_string());
        self.columns.push(Column::Int64(values));
        self
    }

    pub fn push_float_column(&mut self, name: &str, values: Vec<f64>) -> &mut Self {
        self.headers.push(name.to_string());
        self.columns.push(Column::Float64(values));
        self
    }

    pub fn push_date_column(&mut self, name: &str, values: Vec<i64>) -> &mut Self {
        self.headers.push(name.to_string());
        self.columns.push(Column::Date(values));
        self
    }

    pub fn finish(self) -> Result<DataTable, PipelineError> {
        let names: HashSet<&str> = self.headers.iter().map(String::as_str).collect();
        if names.len() != self.headers.len() {
            return Err(PipelineError::Parse("duplicate column name".into()));
        }
        DataTable::from_parts(self.arena, self.headers, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column::secs_to_datetime;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table_from(csv: &str) -> (DataTable, ParseSummary) {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", csv).unwrap();
        DataTable::from_csv(tmp.path()).unwrap()
    }

    #[test]
    fn parses_typed_columns() {
        let (table, summary) = table_from("id,price,label\n1,9.5,a\n2,10.25,b\n3,1.0,c\n");
        assert_eq!(table.row_count(), 3);
        assert_eq!(summary.rows_parsed, 3);
        assert!(summary.errors.is_empty());
        assert_eq!(table.ints_of("id").unwrap(), &[1, 2, 3]);
        assert_eq!(table.floats_of("price").unwrap(), &[9.5, 10.25, 1.0]);
        let labels: Vec<&str> = table.str_values("label").unwrap().collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn final_line_without_newline_is_kept() {
        let (table, _) = table_from("id,label\n1,a\n2,b");
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn crlf_input_is_trimmed() {
        let (table, _) = table_from("id,label\r\n1,a\r\n2,b\r\n");
        assert_eq!(table.row_count(), 2);
        let labels: Vec<&str> = table.str_values("label").unwrap().collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn quoted_fields_keep_embedded_delimiters() {
        let (table, _) = table_from(
            "id,description\n1,\"RED, METAL SIGN\"\n2,\"LINE ONE\nLINE TWO\"\n3,PLAIN\n",
        );
        assert_eq!(table.row_count(), 3);
        let descriptions: Vec<&str> = table.str_values("description").unwrap().collect();
        assert_eq!(
            descriptions,
            vec!["RED, METAL SIGN", "LINE ONE\nLINE TWO", "PLAIN"]
        );
    }

    #[test]
    fn doubled_quotes_are_unescaped() {
        let (table, _) = table_from("id,note\n1,\"say \"\"hi\"\" now\"\n");
        let notes: Vec<&str> = table.str_values("note").unwrap().collect();
        assert_eq!(notes, vec!["say \"hi\" now"]);
    }

    #[test]
    fn bad_cell_in_sample_window_demotes_column_to_string() {
        let (table, _) = table_from("id,qty\n1,5\n2,oops\n3,7\n");
        assert_eq!(table.column_type("qty").unwrap(), ColumnType::Str);
    }

    #[test]
    fn bad_numeric_cell_becomes_null_and_is_reported() {
        // The bad cell sits past the inference sample, so the column stays
        // Int64 and the cell itself must degrade to a null.
        let mut csv = String::from("id,qty\n");
        for i in 0..INFER_SAMPLE_ROWS {
            csv.push_str(&format!("{},5\n", i));
        }
        csv.push_str("900,oops\n");
        let (table, summary) = table_from(&csv);
        assert_eq!(table.row_count(), INFER_SAMPLE_ROWS + 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].column, "qty");
        let values: Vec<Option<f64>> = table.numeric_values("qty").unwrap().collect();
        assert_eq!(values[0], Some(5.0));
        assert_eq!(values[INFER_SAMPLE_ROWS], None);
    }

    #[test]
    fn short_row_is_skipped_and_reported() {
        let (table, summary) = table_from("a,b,c\n1,2,3\n4,5\n6,7,8\n");
        assert_eq!(table.row_count(), 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].reason.contains("expected 3 fields"));
    }

    #[test]
    fn mixed_numeric_column_falls_back_to_string() {
        // First value parses as an integer, a later sample does not; the
        // voting pass must settle on Str.
        let (table, _) = table_from("invoice,qty\n536365,2\nC536379,1\n");
        assert_eq!(table.column_type("invoice").unwrap(), ColumnType::Str);
        let invoices: Vec<&str> = table.str_values("invoice").unwrap().collect();
        assert_eq!(invoices, vec!["536365", "C536379"]);
    }

    #[test]
    fn date_column_is_inferred() {
        let (table, _) = table_from("when,qty\n12/1/2010 8:26,2\n12/1/2010 8:28,6\n");
        assert_eq!(table.column_type("when").unwrap(), ColumnType::Date);
        let dates = table.dates_of("when").unwrap();
        assert!(dates.iter().all(|&d| d != NULL_I64));
        let first = secs_to_datetime(dates[0]).unwrap();
        assert_eq!(first.format("%Y-%m-%d %H:%M").to_string(), "2010-12-01 08:26");
    }

    #[test]
    fn convert_to_date_nulls_bad_cells() {
        let (mut table, _) = table_from("when,qty\nlater,1\n2011-01-05,2\n");
        let nulls = table.convert_to_date("when").unwrap();
        assert_eq!(nulls, 1);
        let dates = table.dates_of("when").unwrap();
        assert_eq!(dates[0], NULL_I64);
        assert_ne!(dates[1], NULL_I64);
    }

    #[test]
    fn derive_product_multiplies_elementwise() {
        let (mut table, _) = table_from("q,p\n2,10.0\n-1,20.0\n5,3.0\n");
        table.derive_product("total", "q", "p").unwrap();
        assert_eq!(table.floats_of("total").unwrap(), &[20.0, -20.0, 15.0]);
    }

    #[test]
    fn header_normalization() {
        let (mut table, _) = table_from(" Invoice No , Unit Price \n1,2.0\n");
        table.normalize_headers();
        assert_eq!(table.headers(), &["Invoice_No", "Unit_Price"]);
    }

    #[test]
    fn builder_round_trip() {
        let mut builder = TableBuilder::new();
        builder
            .push_str_column("brand", ["Nike", "Puma"])
            .push_int_column("stock", vec![3, NULL_I64])
            .push_float_column("price", vec![19.99, f64::NAN]);
        let table = builder.finish().unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(table.column("stock").unwrap(), 1), ValueRef::Null);
        let brands: Vec<&str> = table.str_values("brand").unwrap().collect();
        assert_eq!(brands, vec!["Nike", "Puma"]);
    }

    #[test]
    fn builder_rejects_ragged_columns() {
        let mut builder = TableBuilder::new();
        builder
            .push_str_column("a", ["x"])
            .push_int_column("b", vec![1, 2]);
        assert!(builder.finish().is_err());
    }
}
