//! Parquet persistence for [`DataTable`], via arrow2.
//!
//! Null mapping is symmetric with the in-memory encoding: the Int64/Date
//! sentinel, Float64 NaN and the empty string all become arrow validity
//! nulls on write and come back as the same in-memory markers on read.

use std::fs::File;
use std::path::Path;

use arrow2::array::{Array, Float64Array, Int64Array, Utf8Array};
use arrow2::chunk::Chunk;
use arrow2::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow2::io::parquet::read;
use arrow2::io::parquet::write::{
    transverse, CompressionOptions, Encoding, FileWriter, RowGroupIterator, Version, WriteOptions,
};

use crate::table::column::{Column, NULL_I64};
use crate::table::data_table::{DataTable, TableBuilder};
use crate::table::PipelineError;

/// Writes the table to `path` as snappy-compressed parquet.
pub fn write_parquet(table: &DataTable, path: &Path) -> Result<(), PipelineError> {
    let mut fields = Vec::with_capacity(table.headers().len());
    let mut arrays: Vec<Box<dyn Array>> = Vec::with_capacity(table.headers().len());

    for (name, column) in table.headers().iter().zip(table.columns()) {
        match column {
            Column::Int64(values) => {
                fields.push(Field::new(name, DataType::Int64, true));
                arrays.push(
                    Int64Array::from_iter(values.iter().map(|&v| (v != NULL_I64).then_some(v)))
                        .boxed(),
                );
            }
            Column::Float64(values) => {
                fields.push(Field::new(name, DataType::Float64, true));
                arrays.push(
                    Float64Array::from_iter(values.iter().map(|&v| (!v.is_nan()).then_some(v)))
                        .boxed(),
                );
            }
            Column::Str(offsets) => {
                fields.push(Field::new(name, DataType::Utf8, true));
                arrays.push(
                    Utf8Array::<i32>::from_iter(offsets.iter().map(|&span| {
                        let s = table.str_at(span);
                        (!s.is_empty()).then_some(s)
                    }))
                    .boxed(),
                );
            }
            Column::Date(values) => {
                let data_type = DataType::Timestamp(TimeUnit::Second, None);
                fields.push(Field::new(name, data_type.clone(), true));
                arrays.push(
                    Int64Array::from_iter(values.iter().map(|&v| (v != NULL_I64).then_some(v)))
                        .to(data_type)
                        .boxed(),
                );
            }
        }
    }

    let schema = Schema::from(fields);
    let options = WriteOptions {
        write_statistics: true,
        compression: CompressionOptions::Snappy,
        version: Version::V2,
        data_pagesize_limit: None,
    };
    let encodings: Vec<Vec<Encoding>> = schema
        .fields
        .iter()
        .map(|f| transverse(&f.data_type, |_| Encoding::Plain))
        .collect();

    let chunk = Chunk::new(arrays);
    let row_groups =
        RowGroupIterator::try_new(std::iter::once(Ok(chunk)), &schema, options, encodings)?;

    let file = File::create(path)?;
    let mut writer = FileWriter::try_new(file, schema, options)?;
    for group in row_groups {
        writer.write(group?)?;
    }
    writer.end(None)?;
    Ok(())
}

enum Accum {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Date(Vec<i64>),
    Str(Vec<String>),
}

/// Reads a parquet file written by [`write_parquet`] back into a table.
pub fn read_parquet(path: &Path) -> Result<DataTable, PipelineError> {
    let mut file = File::open(path)?;
    let metadata = read::read_metadata(&mut file)?;
    let schema = read::infer_schema(&metadata)?;
    let row_groups = metadata.row_groups;

    let mut names = Vec::with_capacity(schema.fields.len());
    let mut accums: Vec<Accum> = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        names.push(field.name.clone());
        accums.push(match field.data_type() {
            DataType::Int64 => Accum::Int(Vec::new()),
            DataType::Float64 => Accum::Float(Vec::new()),
            DataType::Timestamp(TimeUnit::Second, _) => Accum::Date(Vec::new()),
            DataType::Utf8 => Accum::Str(Vec::new()),
            other => {
                return Err(PipelineError::CorruptCache {
                    path: path.to_path_buf(),
                    detail: format!("unsupported column type {:?}", other),
                })
            }
        });
    }

    let reader = read::FileReader::new(file, row_groups, schema, None, None, None);
    for maybe_chunk in reader {
        let chunk = maybe_chunk?;
        for (accum, array) in accums.iter_mut().zip(chunk.arrays()) {
            extend_accum(accum, array.as_ref(), path)?;
        }
    }

    let mut builder = TableBuilder::new();
    for (name, accum) in names.iter().zip(accums) {
        match accum {
            Accum::Int(values) => builder.push_int_column(name, values),
            Accum::Float(values) => builder.push_float_column(name, values),
            Accum::Date(values) => builder.push_date_column(name, values),
            Accum::Str(values) => builder.push_str_column(name, values),
        };
    }
    builder.finish()
}

fn extend_accum(accum: &mut Accum, array: &dyn Array, path: &Path) -> Result<(), PipelineError> {
    let mismatch = || PipelineError::CorruptCache {
        path: path.to_path_buf(),
        detail: "column data does not match the file schema".into(),
    };
    match accum {
        Accum::Int(values) | Accum::Date(values) => {
            let array = array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(mismatch)?;
            values.extend(array.iter().map(|v| v.copied().unwrap_or(NULL_I64)));
        }
        Accum::Float(values) => {
            let array = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(mismatch)?;
            values.extend(array.iter().map(|v| v.copied().unwrap_or(f64::NAN)));
        }
        Accum::Str(values) => {
            let array = array
                .as_any()
                .downcast_ref::<Utf8Array<i32>>()
                .ok_or_else(mismatch)?;
            values.extend(array.iter().map(|v| v.unwrap_or("").to_string()));
        }
    }
    Ok(())
}
