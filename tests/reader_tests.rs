mod common;

use arrow::array::{Array, Int32Array, StringArray};
use common::*;
use orcfile::conversion::stripe_to_record_batch;
use orcfile::io::{AsyncFileByteRangeProvider, InMemoryByteRangeProvider};
use orcfile::proto::TypeStatistics;
use orcfile::reader::ColumnBuffer;
use orcfile::{Column, DataType, OrcError, OrcReader, OrcWriter, Row, Schema, Value, WriterOptions};

fn multi_stripe_reader(rows: usize, seed: u64) -> (OrcReader<InMemoryByteRangeProvider>, Vec<Row>) {
    let schema = all_types_schema();
    let rows = random_rows(&schema, rows, seed);
    let bytes = write_to_vec(&schema, &rows, multi_stripe_options());
    let reader = OrcReader::open(InMemoryByteRangeProvider::new(bytes)).unwrap();
    (reader, stored_rows(&schema, &rows))
}

/// One stripe with several row groups of 1000 rows.
fn single_stripe_reader(rows: usize, seed: u64) -> OrcReader<InMemoryByteRangeProvider> {
    let schema = all_types_schema();
    let rows = random_rows(&schema, rows, seed);
    let options = WriterOptions::new().with_row_index_stride(1_000);
    OrcReader::open(InMemoryByteRangeProvider::new(write_to_vec(&schema, &rows, options))).unwrap()
}

#[test]
fn test_row_group_reads_match_full_read() {
    let (reader, _) = multi_stripe_reader(12_345, 11);
    let columns = reader.schema().column_count();

    for s in 0..reader.stripes().len() {
        let stripe = reader.stripe(s).unwrap();
        assert!(stripe.row_group_count() >= 1);
        for column in 0..columns {
            let full = stripe.read_column(column).unwrap();
            let mut start = 0usize;
            for rg in 0..stripe.row_group_count() {
                let group = stripe.read_row_group(column, rg).unwrap();
                assert_eq!(group.len() as u64, stripe.row_group_rows(rg));
                for i in 0..group.len() {
                    assert_eq!(
                        group.value(i),
                        full.value(start + i),
                        "stripe {} column {} row group {} row {}",
                        s,
                        column,
                        rg,
                        i
                    );
                }
                start += group.len();
            }
            assert_eq!(start, full.len());
        }
    }
}

#[test]
fn test_row_range_reads_cross_row_groups() {
    let reader = single_stripe_reader(6_000, 12);
    let stripe = reader.stripe(0).unwrap();
    let rows = stripe.number_of_rows();
    assert_eq!(rows, 6_000);
    assert_eq!(stripe.row_group_count(), 6);

    for column in 0..reader.schema().column_count() {
        let full = stripe.read_column(column).unwrap();
        for (start, end) in [(0, 10), (999, 1_001), (1_500, rows), (rows - 1, rows), (3, 3)] {
            let part = stripe.read_rows(column, start..end).unwrap();
            assert_eq!(part.len() as u64, end - start);
            for i in 0..part.len() {
                assert_eq!(part.value(i), full.value(start as usize + i));
            }
        }
    }
    assert!(stripe.read_rows(0, 0..rows + 1).is_err());
}

#[test]
fn test_fill_row_group_reuses_buffer() {
    let reader = single_stripe_reader(3_000, 13);
    let stripe = reader.stripe(0).unwrap();
    let data_type = reader.schema().columns[4].data_type;

    let mut buffer = ColumnBuffer::for_type(&data_type, 1_000);
    stripe.fill_row_group(4, 0, &mut buffer).unwrap();
    let first = buffer.clone();
    stripe.fill_row_group(4, 1, &mut buffer).unwrap();
    assert_eq!(buffer.len(), 1_000);
    assert_ne!(first, buffer);

    let mut small = ColumnBuffer::for_type(&data_type, 10);
    match stripe.fill_row_group(4, 0, &mut small) {
        Err(OrcError::BufferTooSmall { required, provided }) => {
            assert_eq!(required, 1_000);
            assert_eq!(provided, 10);
        }
        other => panic!("expected BufferTooSmall, got {:?}", other.map(|_| ())),
    }

    let past = stripe.row_group_count();
    assert!(stripe.fill_row_group(4, past, &mut buffer).is_err());
}

#[test]
fn test_null_interleaving() {
    let schema = Schema::new(vec![
        Column::new("n", DataType::Int),
        Column::new("s", DataType::String),
        Column::new("b", DataType::Boolean),
    ]);
    let rows: Vec<Row> = (0..3_000i64)
        .map(|i| {
            let n = if i % 3 == 0 { Value::Null } else { Value::Integer(i) };
            let s = if i % 7 == 0 { Value::String(format!("s{}", i % 5)) } else { Value::Null };
            let b = if i % 2 == 0 { Value::Boolean(i % 4 == 0) } else { Value::Null };
            Row::new(vec![n, s, b])
        })
        .collect();
    let bytes = write_to_vec(&schema, &rows, WriterOptions::new().with_row_index_stride(1_000));
    let reader = OrcReader::open(InMemoryByteRangeProvider::new(bytes)).unwrap();

    let stripe = reader.stripe(0).unwrap();
    let ints = stripe.read_column(0).unwrap();
    assert_eq!(ints.null_count(), 1_000);
    assert!(ints.is_null(0));
    assert_eq!(ints.value(1), Value::Integer(1));

    let group = stripe.read_row_group(1, 2).unwrap();
    assert_eq!(group.value(0), rows[2_000].values[1]);
    assert_eq!(group.value(2), rows[2_002].values[1]);

    assert_eq!(reader.read_table(None).unwrap().rows, rows);
}

#[test]
fn test_statistics() {
    let schema = Schema::new(vec![
        Column::new("n", DataType::Long),
        Column::new("s", DataType::String),
    ]);
    let rows: Vec<Row> = (0..2_500i64)
        .map(|i| {
            let n = if i == 10 { Value::Null } else { Value::Integer(i - 100) };
            Row::new(vec![n, Value::String(format!("k{:04}", i))])
        })
        .collect();
    let bytes = write_to_vec(&schema, &rows, multi_stripe_options());
    let reader = OrcReader::open(InMemoryByteRangeProvider::new(bytes)).unwrap();

    assert_eq!(reader.statistics()[0].number_of_values, 2_500);
    let n = reader.column_statistics("n").unwrap();
    assert_eq!(n.number_of_values, 2_499);
    assert_eq!(n.has_null, Some(true));
    match &n.type_stats {
        Some(TypeStatistics::Integer { minimum, maximum, .. }) => {
            assert_eq!(*minimum, Some(-100));
            assert_eq!(*maximum, Some(2_399));
        }
        other => panic!("unexpected statistics {:?}", other),
    }

    let s = reader.column_statistics("s").unwrap();
    assert_eq!(s.has_null, Some(false));
    match &s.type_stats {
        Some(TypeStatistics::String { minimum, maximum, .. }) => {
            assert_eq!(minimum.as_deref(), Some("k0000"));
            assert_eq!(maximum.as_deref(), Some("k2499"));
        }
        other => panic!("unexpected statistics {:?}", other),
    }

    assert_eq!(reader.stripe_statistics().len(), reader.stripes().len());
    let per_stripe: u64 = reader
        .stripe_statistics()
        .iter()
        .map(|s| s.col_stats[0].number_of_values)
        .sum();
    assert_eq!(per_stripe, 2_500);

    let stripe = reader.stripe(0).unwrap();
    let first_group = stripe.row_group_statistics(1, 0).unwrap();
    assert_eq!(first_group.number_of_values, 999);
    assert!(reader.column_statistics("missing").is_err());
}

#[test]
fn test_user_metadata() {
    let schema = Schema::new(vec![Column::new("n", DataType::Int)]);
    let mut writer = OrcWriter::new(Vec::new(), schema, WriterOptions::new()).unwrap();
    writer.add_user_metadata("origin", b"unit".to_vec());
    writer.add_user_metadata("blank", Vec::new());
    writer.write_row(&Row::new(vec![Value::Integer(1)])).unwrap();
    let bytes = writer.close().unwrap();

    let reader = OrcReader::open(InMemoryByteRangeProvider::new(bytes)).unwrap();
    assert_eq!(reader.user_metadata().len(), 2);
    assert_eq!(reader.user_metadata_value("origin"), Some(&b"unit"[..]));
    assert_eq!(reader.user_metadata_value("blank"), Some(&b""[..]));
    assert_eq!(reader.user_metadata_value("absent"), None);
}

#[test]
fn test_stripe_streams_are_located() {
    let (reader, _) = multi_stripe_reader(2_000, 14);
    let stripe = reader.stripe(0).unwrap();
    assert_eq!(stripe.writer_timezone(), Some("UTC"));
    assert!(stripe.get_stream(0, orcfile::proto::StreamKind::RowIndex).is_some());
    assert!(stripe.get_stream(5, orcfile::proto::StreamKind::Data).is_some());
    assert!(stripe.get_stream(99, orcfile::proto::StreamKind::Data).is_none());
    assert_eq!(stripe.get_positions(0, 0).unwrap(), &[] as &[u64]);
    assert!(stripe.get_positions(1, 1_000).is_err());
}

#[test]
fn test_stripe_to_record_batch() {
    let (reader, expected) = multi_stripe_reader(1_500, 15);
    let stripe = reader.stripe(0).unwrap();
    let batch = stripe_to_record_batch(&stripe, &[3, 7]).unwrap();

    assert_eq!(batch.num_columns(), 2);
    assert_eq!(batch.num_rows() as u64, stripe.number_of_rows());
    assert_eq!(batch.schema().field(0).name(), "id");

    let ids = batch.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
    let words = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    for i in 0..batch.num_rows() {
        match &expected[i].values[3] {
            Value::Integer(v) => assert_eq!(ids.value(i) as i64, *v),
            _ => assert!(ids.is_null(i)),
        }
        match &expected[i].values[7] {
            Value::String(v) => assert_eq!(words.value(i), v),
            _ => assert!(words.is_null(i)),
        }
    }
}

#[tokio::test]
async fn test_async_in_memory_reader() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 4_000, 16);
    let bytes = write_to_vec(&schema, &rows, multi_stripe_options());

    let reader = OrcReader::open_async(InMemoryByteRangeProvider::new(bytes))
        .await
        .unwrap();
    assert_eq!(reader.number_of_rows(), 4_000);
    let table = reader.read_table_async(None).await.unwrap();
    assert_eq!(table.rows, stored_rows(&schema, &rows));
}

#[tokio::test]
async fn test_damaged_header_still_opens() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 500, 18);
    let mut bytes = write_to_vec(&schema, &rows, WriterOptions::new());
    bytes[..3].copy_from_slice(b"XYZ");

    let reader = OrcReader::open(InMemoryByteRangeProvider::new(bytes.clone())).unwrap();
    let table = reader.read_table(None).unwrap();
    assert_eq!(table.rows, stored_rows(&schema, &rows));

    let reader = OrcReader::open_async(InMemoryByteRangeProvider::new(bytes))
        .await
        .unwrap();
    assert_eq!(reader.number_of_rows(), 500);
}

#[tokio::test]
async fn test_async_file_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("async.orc");
    let schema = all_types_schema();
    let rows = random_rows(&schema, 800, 17);
    std::fs::write(&path, write_to_vec(&schema, &rows, WriterOptions::new())).unwrap();

    let reader = OrcReader::<AsyncFileByteRangeProvider>::open_path_async(&path)
        .await
        .unwrap();
    let stripe = reader.stripe_async(0).await.unwrap();
    assert_eq!(stripe.number_of_rows(), 800);
    let columns = vec!["at".to_string()];
    let table = reader.read_table_async(Some(&columns)).await.unwrap();
    let expected = stored_rows(&schema, &rows);
    for (got, want) in table.rows.iter().zip(&expected) {
        assert_eq!(got.values[0], want.values[13]);
    }
}
