//! Conversion between decoded ORC columns and Arrow record batches.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array,
    Float64Array, Int16Array, Int32Array, Int64Array, Int8Array, LargeStringArray, StringArray,
    TimestampNanosecondArray,
};
use arrow::datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;

use crate::error::{OrcError, Result};
use crate::reader::{ColumnBuffer, StripeReader};
use crate::schema::{Column, DataType, Schema, MAX_DECIMAL_PRECISION};
use crate::table::{date_from_days, days_from_date, Decimal, Row, Table, Value};

pub fn arrow_data_type(data_type: &DataType) -> ArrowDataType {
    match data_type {
        DataType::Boolean => ArrowDataType::Boolean,
        DataType::Byte => ArrowDataType::Int8,
        DataType::Short => ArrowDataType::Int16,
        DataType::Int => ArrowDataType::Int32,
        DataType::Long => ArrowDataType::Int64,
        DataType::Float => ArrowDataType::Float32,
        DataType::Double => ArrowDataType::Float64,
        DataType::String | DataType::Varchar { .. } | DataType::Char { .. } => {
            ArrowDataType::Utf8
        }
        DataType::Binary => ArrowDataType::Binary,
        DataType::Decimal { precision, scale } => {
            ArrowDataType::Decimal128(*precision as u8, *scale as i8)
        }
        DataType::Date => ArrowDataType::Date32,
        DataType::Timestamp => ArrowDataType::Timestamp(TimeUnit::Nanosecond, None),
    }
}

pub fn arrow_schema(schema: &Schema) -> ArrowSchema {
    let fields: Vec<Field> = schema
        .columns
        .iter()
        .map(|c| Field::new(c.name.clone(), arrow_data_type(&c.data_type), true))
        .collect();
    ArrowSchema::new(fields)
}

fn narrow<T: TryFrom<i64>>(values: &[Option<i64>]) -> Result<Vec<Option<T>>> {
    values
        .iter()
        .map(|v| match v {
            Some(v) => T::try_from(*v)
                .map(Some)
                .map_err(|_| OrcError::InvalidFormat(format!("value {} overflows column", v))),
            None => Ok(None),
        })
        .collect()
}

/// Builds an Arrow array from a decoded column of type `data_type`.
pub fn column_to_array(buffer: &ColumnBuffer, data_type: &DataType) -> Result<ArrayRef> {
    let array: ArrayRef = match (buffer, data_type) {
        (ColumnBuffer::Boolean(b), DataType::Boolean) => {
            Arc::new(BooleanArray::from(b.values().to_vec()))
        }
        (ColumnBuffer::Integer(b), DataType::Byte) => {
            Arc::new(Int8Array::from(narrow::<i8>(b.values())?))
        }
        (ColumnBuffer::Integer(b), DataType::Short) => {
            Arc::new(Int16Array::from(narrow::<i16>(b.values())?))
        }
        (ColumnBuffer::Integer(b), DataType::Int) => {
            Arc::new(Int32Array::from(narrow::<i32>(b.values())?))
        }
        (ColumnBuffer::Integer(b), DataType::Long) => {
            Arc::new(Int64Array::from(b.values().to_vec()))
        }
        (ColumnBuffer::Float(b), DataType::Float) => {
            Arc::new(Float32Array::from(b.values().to_vec()))
        }
        (ColumnBuffer::Double(b), DataType::Double) => {
            Arc::new(Float64Array::from(b.values().to_vec()))
        }
        (ColumnBuffer::String(b), _) if data_type.is_string() => Arc::new(StringArray::from(
            b.values().iter().map(|v| v.as_deref()).collect::<Vec<_>>(),
        )),
        (ColumnBuffer::Binary(b), DataType::Binary) => Arc::new(BinaryArray::from(
            b.values().iter().map(|v| v.as_deref()).collect::<Vec<_>>(),
        )),
        (ColumnBuffer::Decimal(b), DataType::Decimal { precision, scale }) => {
            let values: Vec<Option<i128>> =
                b.values().iter().map(|v| v.map(|d| d.unscaled)).collect();
            Arc::new(
                Decimal128Array::from(values)
                    .with_precision_and_scale(*precision as u8, *scale as i8)?,
            )
        }
        (ColumnBuffer::Date(b), DataType::Date) => {
            let days: Vec<Option<i32>> = b
                .values()
                .iter()
                .map(|v| v.map(|d| days_from_date(d) as i32))
                .collect();
            Arc::new(Date32Array::from(days))
        }
        (ColumnBuffer::Timestamp(b), DataType::Timestamp) => {
            let nanos = b
                .values()
                .iter()
                .map(|v| match v {
                    Some(ts) => ts.and_utc().timestamp_nanos_opt().map(Some).ok_or_else(|| {
                        OrcError::Unsupported(format!(
                            "timestamp {} is outside the nanosecond range",
                            ts
                        ))
                    }),
                    None => Ok(None),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(TimestampNanosecondArray::from(nanos))
        }
        _ => {
            return Err(OrcError::SchemaMismatch(format!(
                "decoded buffer does not hold {} values",
                data_type
            )))
        }
    };
    Ok(array)
}

/// Decodes the selected schema columns of a stripe into one record batch.
pub fn stripe_to_record_batch(stripe: &StripeReader, columns: &[usize]) -> Result<RecordBatch> {
    let schema = stripe.schema();
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for &c in columns {
        let column = schema
            .columns
            .get(c)
            .ok_or_else(|| OrcError::ColumnNotFound(format!("column #{}", c)))?;
        let buffer = stripe.read_column(c)?;
        fields.push(Field::new(
            column.name.clone(),
            arrow_data_type(&column.data_type),
            true,
        ));
        arrays.push(column_to_array(&buffer, &column.data_type)?);
    }
    Ok(RecordBatch::try_new(
        Arc::new(ArrowSchema::new(fields)),
        arrays,
    )?)
}

fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        OrcError::SchemaMismatch(format!("unexpected array type {}", array.data_type()))
    })
}

pub fn convert_data_type(arrow_type: &ArrowDataType) -> Result<DataType> {
    Ok(match arrow_type {
        ArrowDataType::Boolean => DataType::Boolean,
        ArrowDataType::Int8 => DataType::Byte,
        ArrowDataType::Int16 => DataType::Short,
        ArrowDataType::Int32 => DataType::Int,
        ArrowDataType::Int64 => DataType::Long,
        ArrowDataType::Float32 => DataType::Float,
        ArrowDataType::Float64 => DataType::Double,
        ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 => DataType::String,
        ArrowDataType::Binary => DataType::Binary,
        ArrowDataType::Decimal128(precision, scale)
            if *scale >= 0 && (*precision as u32) <= MAX_DECIMAL_PRECISION =>
        {
            DataType::Decimal {
                precision: *precision as u32,
                scale: *scale as u32,
            }
        }
        ArrowDataType::Date32 => DataType::Date,
        ArrowDataType::Timestamp(TimeUnit::Nanosecond, _) => DataType::Timestamp,
        other => return Err(OrcError::UnsupportedType(other.to_string())),
    })
}

pub fn convert_schema(arrow_schema: &ArrowSchema) -> Result<Schema> {
    let columns = arrow_schema
        .fields()
        .iter()
        .map(|field| Ok(Column::new(field.name().clone(), convert_data_type(field.data_type())?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::new(columns))
}

fn convert_array_value(array: &ArrayRef, index: usize) -> Result<Value> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        ArrowDataType::Boolean => Value::Boolean(downcast::<BooleanArray>(array)?.value(index)),
        ArrowDataType::Int8 => Value::Integer(downcast::<Int8Array>(array)?.value(index) as i64),
        ArrowDataType::Int16 => Value::Integer(downcast::<Int16Array>(array)?.value(index) as i64),
        ArrowDataType::Int32 => Value::Integer(downcast::<Int32Array>(array)?.value(index) as i64),
        ArrowDataType::Int64 => Value::Integer(downcast::<Int64Array>(array)?.value(index)),
        ArrowDataType::Float32 => {
            Value::Float(downcast::<Float32Array>(array)?.value(index) as f64)
        }
        ArrowDataType::Float64 => Value::Float(downcast::<Float64Array>(array)?.value(index)),
        ArrowDataType::Utf8 => {
            Value::String(downcast::<StringArray>(array)?.value(index).to_string())
        }
        ArrowDataType::LargeUtf8 => {
            Value::String(downcast::<LargeStringArray>(array)?.value(index).to_string())
        }
        ArrowDataType::Binary => Value::Binary(downcast::<BinaryArray>(array)?.value(index).to_vec()),
        ArrowDataType::Decimal128(_, scale) => Value::Decimal(Decimal::new(
            downcast::<Decimal128Array>(array)?.value(index),
            *scale as u32,
        )),
        ArrowDataType::Date32 => {
            let days = downcast::<Date32Array>(array)?.value(index);
            Value::Date(date_from_days(days as i64).ok_or_else(|| {
                OrcError::InvalidFormat(format!("date {} days out of range", days))
            })?)
        }
        ArrowDataType::Timestamp(TimeUnit::Nanosecond, _) => {
            let nanos = downcast::<TimestampNanosecondArray>(array)?.value(index);
            let ts = DateTime::from_timestamp(
                nanos.div_euclid(1_000_000_000),
                nanos.rem_euclid(1_000_000_000) as u32,
            )
            .ok_or_else(|| OrcError::InvalidFormat(format!("timestamp {}ns out of range", nanos)))?;
            Value::Timestamp(ts.naive_utc())
        }
        other => return Err(OrcError::UnsupportedType(other.to_string())),
    };
    Ok(value)
}

/// Turns record batches into rows, e.g. to feed an [`crate::OrcWriter`].
pub fn record_batch_to_table(
    table_name: impl Into<String>,
    batches: &[RecordBatch],
) -> Result<Table> {
    let first = batches
        .first()
        .ok_or_else(|| OrcError::SchemaMismatch("no record batches to convert".into()))?;
    let schema = convert_schema(&first.schema())?;
    let mut rows = Vec::new();
    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let values = batch
                .columns()
                .iter()
                .map(|array| convert_array_value(array, row_idx))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row::new(values));
        }
    }
    Ok(Table::with_rows(table_name, schema, rows))
}
