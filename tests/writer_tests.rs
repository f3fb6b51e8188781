mod common;

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use orcfile::conversion::record_batch_to_table;
use orcfile::io::InMemoryByteRangeProvider;
use orcfile::{
    Column, DataType, Decimal, OrcError, OrcReader, OrcWriter, Row, Schema, Table, Value,
    WriterOptions,
};

fn read_all(bytes: Vec<u8>) -> Table {
    OrcReader::open(InMemoryByteRangeProvider::new(bytes))
        .unwrap()
        .read_table(None)
        .unwrap()
}

#[test]
fn test_write_record_batches() {
    let arrow_schema = Arc::new(ArrowSchema::new(vec![
        Field::new("id", ArrowDataType::Int64, false),
        Field::new("name", ArrowDataType::Utf8, true),
        Field::new("score", ArrowDataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        arrow_schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef,
            Arc::new(StringArray::from(vec![Some("ann"), None, Some("cy")])) as ArrayRef,
            Arc::new(Float64Array::from(vec![Some(1.5), Some(-2.25), None])) as ArrayRef,
        ],
    )
    .unwrap();
    let table = record_batch_to_table("scores", &[batch.clone(), batch]).unwrap();
    assert_eq!(table.row_count(), 6);

    let mut writer =
        OrcWriter::new(Vec::new(), table.schema.clone(), WriterOptions::new()).unwrap();
    writer.write_table(&table).unwrap();
    assert_eq!(writer.rows_written(), 6);
    let read = read_all(writer.close().unwrap());

    assert_eq!(read.schema, table.schema);
    assert_eq!(read.rows, table.rows);
}

#[test]
fn test_write_table_schema_mismatch() {
    let schema = Schema::new(vec![Column::new("a", DataType::Int)]);
    let other = Table::new("t", Schema::new(vec![Column::new("b", DataType::Int)]));
    let mut writer = OrcWriter::new(Vec::new(), schema, WriterOptions::new()).unwrap();
    assert!(matches!(
        writer.write_table(&other),
        Err(OrcError::SchemaMismatch(_))
    ));
}

#[test]
fn test_rejected_values() {
    let schema = Schema::new(vec![
        Column::new("tiny", DataType::Byte),
        Column::new("price", DataType::Decimal { precision: 5, scale: 2 }),
    ]);
    let mut writer = OrcWriter::new(Vec::new(), schema, WriterOptions::new()).unwrap();

    let overflow = Row::new(vec![Value::Integer(300), Value::Null]);
    let err = writer.write_row(&overflow).unwrap_err();
    assert!(err.to_string().contains("tiny"));

    let too_precise = Row::new(vec![Value::Null, Value::Decimal(Decimal::new(1_000_000, 2))]);
    assert!(matches!(
        writer.write_row(&too_precise),
        Err(OrcError::SchemaMismatch(_))
    ));

    let wrong_kind = Row::new(vec![Value::String("x".into()), Value::Null]);
    assert!(writer.write_row(&wrong_kind).is_err());

    let short = Row::new(vec![Value::Integer(1)]);
    assert!(writer.write_row(&short).is_err());

    assert_eq!(writer.rows_written(), 0);
    writer
        .write_row(&Row::new(vec![Value::Integer(-128), Value::Integer(12)]))
        .unwrap();
    let read = read_all(writer.close().unwrap());
    assert_eq!(
        read.rows,
        vec![Row::new(vec![
            Value::Integer(-128),
            Value::Decimal(Decimal::new(1_200, 2)),
        ])]
    );
}

#[test]
fn test_fixed_width_strings_and_decimal_scale() {
    let schema = Schema::new(vec![
        Column::new("code", DataType::Varchar { max_length: 3 }),
        Column::new("tag", DataType::Char { max_length: 4 }),
        Column::new("price", DataType::Decimal { precision: 10, scale: 3 }),
    ]);
    let rows = vec![
        Row::new(vec![
            Value::String("abcdef".into()),
            Value::String("xy".into()),
            Value::Decimal(Decimal::new(125, 1)),
        ]),
        Row::new(vec![
            Value::String("héllo".into()),
            Value::String("toolong".into()),
            Value::Decimal(Decimal::new(-12_345_678, 6)),
        ]),
    ];
    let mut writer = OrcWriter::new(Vec::new(), schema, WriterOptions::new()).unwrap();
    writer.write_rows(&rows).unwrap();
    let read = read_all(writer.close().unwrap());

    assert_eq!(
        read.rows,
        vec![
            Row::new(vec![
                Value::String("abc".into()),
                Value::String("xy  ".into()),
                Value::Decimal(Decimal::new(12_500, 3)),
            ]),
            Row::new(vec![
                Value::String("hél".into()),
                Value::String("tool".into()),
                Value::Decimal(Decimal::new(-12_346, 3)),
            ]),
        ]
    );
}

#[test]
fn test_rows_across_many_stripes() {
    let schema = Schema::new(vec![
        Column::new("n", DataType::Long),
        Column::new("s", DataType::String),
    ]);
    let rows: Vec<Row> = (0..5_000i64)
        .map(|i| Row::new(vec![Value::Integer(i * i), Value::String(format!("row{}", i))]))
        .collect();
    // A one-byte stripe size flushes at every row group.
    let options = WriterOptions::new()
        .with_row_index_stride(500)
        .with_stripe_size(1);
    let mut writer = OrcWriter::new(Vec::new(), schema, options).unwrap();
    writer.write_rows(&rows).unwrap();
    let bytes = writer.close().unwrap();

    let reader = OrcReader::open(InMemoryByteRangeProvider::new(bytes)).unwrap();
    assert_eq!(reader.stripes().len(), 10);
    assert!(reader.stripes().iter().all(|s| s.number_of_rows == 500));
    assert_eq!(reader.read_table(None).unwrap().rows, rows);
}
