//! CSV ingestion for the sales dashboard.
//!
//! Wraps the raw table parser with the cleanup the dashboard depends on:
//! encoding detection with a Windows-1252 fallback, header normalization,
//! invoice date parsing and the derived per-line revenue column.

pub mod encoding;

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info, warn};

use crate::table::data_table::{DataTable, TableBuffer};
use crate::table::{CellError, PipelineError};

pub const DATE_COLUMN: &str = "InvoiceDate";
pub const QUANTITY_COLUMN: &str = "Quantity";
pub const UNIT_PRICE_COLUMN: &str = "UnitPrice";
pub const TOTAL_COLUMN: &str = "TotalSales";

/// What ingestion did to a file, for display next to the loaded table.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Name of the encoding the file was finally decoded with.
    pub encoding: &'static str,
    pub rows: usize,
    /// Parse diagnostics, truncated to a displayable amount.
    pub cell_errors: Vec<CellError>,
    /// Invoice dates that failed every known format and became nulls.
    pub unparsed_dates: usize,
    /// Whether the revenue column was derived.
    pub derived_total: bool,
}

/// Loads a delimited sales export into a [`DataTable`].
///
/// The file is memory mapped; clean BOM-less UTF-8 is parsed zero-copy,
/// anything else is decoded into an owned buffer first. After parsing,
/// headers are normalized, the invoice date column becomes a date column
/// and `TotalSales` is derived from quantity times unit price.
///
/// # Errors
///
/// A missing file is [`PipelineError::MissingInput`]; downstream the usual
/// I/O and parse failures apply. Malformed cells are not errors, they
/// degrade to nulls and are listed in the report.
pub fn ingest(path: &Path) -> Result<(DataTable, IngestReport), PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let sample = &mmap[..mmap.len().min(encoding::SNIFF_LEN)];
    let detected = encoding::detect(sample);

    let has_bom = encoding_rs::Encoding::for_bom(&mmap).is_some();
    let (buffer, used) = if detected == encoding_rs::UTF_8
        && !has_bom
        && std::str::from_utf8(&mmap).is_ok()
    {
        (TableBuffer::Mapped(mmap), encoding_rs::UTF_8)
    } else {
        let (text, used) = encoding::decode(&mmap, detected);
        if used != detected {
            warn!(
                path = %path.display(),
                detected = detected.name(),
                used = used.name(),
                "decode errors in detected encoding, fell back"
            );
        }
        (TableBuffer::Owned(text.into_owned().into_bytes()), used)
    };

    let (mut table, summary) = DataTable::parse_delimited(buffer)?;
    table.normalize_headers();

    let unparsed_dates = if table.has_column(DATE_COLUMN) {
        let nulls = table.convert_to_date(DATE_COLUMN)?;
        if nulls > 0 {
            warn!(column = DATE_COLUMN, nulls, "dates failed to parse");
        }
        nulls
    } else {
        debug!(column = DATE_COLUMN, "date column absent, skipping conversion");
        0
    };

    let derived_total = derive_total(&mut table)?;

    info!(
        path = %path.display(),
        rows = table.row_count(),
        encoding = used.name(),
        cell_errors = summary.errors.len(),
        "ingested sales file"
    );

    let report = IngestReport {
        encoding: used.name(),
        rows: summary.rows_parsed,
        cell_errors: summary.errors,
        unparsed_dates,
        derived_total,
    };
    Ok((table, report))
}

/// Adds `TotalSales` when both operands are present and the column is not
/// already there. Returns whether the column was added.
fn derive_total(table: &mut DataTable) -> Result<bool, PipelineError> {
    if table.has_column(TOTAL_COLUMN) {
        return Ok(false);
    }
    if !table.has_column(QUANTITY_COLUMN) || !table.has_column(UNIT_PRICE_COLUMN) {
        debug!(
            quantity = QUANTITY_COLUMN,
            unit_price = UNIT_PRICE_COLUMN,
            "operand column absent, skipping revenue derivation"
        );
        return Ok(false);
    }
    table.derive_product(TOTAL_COLUMN, QUANTITY_COLUMN, UNIT_PRICE_COLUMN)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column::{secs_to_datetime, ColumnType, NULL_I64};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SALES_CSV: &str = "\
InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country
536365,85123A,WHITE HANGING HEART,2,12/1/2010 8:26,10.0,17850,United Kingdom
536366,71053,WHITE METAL LANTERN,-1,12/1/2010 8:28,20.0,17850,United Kingdom
536367,84406B,CREAM CUPID HEARTS,5,12/1/2010 8:34,3.0,13047,France
";

    fn write_file(content: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(content).unwrap();
        tmp
    }

    #[test]
    fn missing_file_is_a_distinct_error() {
        let err = ingest(Path::new("/no/such/file.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[test]
    fn derives_total_sales() {
        let tmp = write_file(SALES_CSV.as_bytes());
        let (table, report) = ingest(tmp.path()).unwrap();
        assert!(report.derived_total);
        assert_eq!(report.encoding, "UTF-8");
        assert_eq!(
            table.floats_of(TOTAL_COLUMN).unwrap(),
            &[20.0, -20.0, 15.0]
        );
    }

    #[test]
    fn invoice_dates_become_a_date_column() {
        let tmp = write_file(SALES_CSV.as_bytes());
        let (table, report) = ingest(tmp.path()).unwrap();
        assert_eq!(report.unparsed_dates, 0);
        assert_eq!(table.column_type(DATE_COLUMN).unwrap(), ColumnType::Date);
        let first = table.dates_of(DATE_COLUMN).unwrap()[0];
        let dt = secs_to_datetime(first).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2010-12-01 08:26");
    }

    #[test]
    fn unparseable_dates_turn_into_nulls() {
        let csv = "\
InvoiceNo,Quantity,InvoiceDate,UnitPrice
1,2,12/1/2010 8:26,1.0
2,3,not a date,2.0
";
        let tmp = write_file(csv.as_bytes());
        let (table, report) = ingest(tmp.path()).unwrap();
        assert_eq!(report.unparsed_dates, 1);
        let dates = table.dates_of(DATE_COLUMN).unwrap();
        assert_ne!(dates[0], NULL_I64);
        assert_eq!(dates[1], NULL_I64);
    }

    #[test]
    fn latin1_file_is_decoded_via_fallback() {
        let csv = b"InvoiceNo,Description,Quantity,UnitPrice\n1,caf\xe9 set,2,3.0\n";
        let tmp = write_file(csv);
        let (table, report) = ingest(tmp.path()).unwrap();
        assert_eq!(report.encoding, "windows-1252");
        let descriptions: Vec<&str> = table.str_values("Description").unwrap().collect();
        assert_eq!(descriptions, vec!["caf\u{e9} set"]);
    }

    #[test]
    fn bom_goes_through_the_decode_path() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice(b"InvoiceNo,Quantity,UnitPrice\n1,2,3.0\n");
        let tmp = write_file(&bytes);
        let (table, _) = ingest(tmp.path()).unwrap();
        assert_eq!(table.headers()[0], "InvoiceNo");
        assert_eq!(table.ints_of("InvoiceNo").unwrap(), &[1]);
    }

    #[test]
    fn headers_are_normalized() {
        let csv = b"Invoice No , Quantity\n1,2\n";
        let tmp = write_file(csv);
        let (table, _) = ingest(tmp.path()).unwrap();
        assert_eq!(table.headers(), &["Invoice_No", "Quantity"]);
    }

    #[test]
    fn existing_total_column_is_left_alone() {
        let csv = b"Quantity,UnitPrice,TotalSales\n2,3.0,99.0\n";
        let tmp = write_file(csv);
        let (table, report) = ingest(tmp.path()).unwrap();
        assert!(!report.derived_total);
        assert_eq!(table.floats_of(TOTAL_COLUMN).unwrap(), &[99.0]);
    }
}
