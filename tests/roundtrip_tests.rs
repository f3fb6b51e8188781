mod common;

use common::*;
use orcfile::io::InMemoryByteRangeProvider;
use orcfile::{
    Column, CompressionKind, DataType, OrcError, OrcReader, Row, Schema, Value, WriterOptions,
};

fn read_back(bytes: Vec<u8>) -> OrcReader<InMemoryByteRangeProvider> {
    OrcReader::open(InMemoryByteRangeProvider::new(bytes)).unwrap()
}

#[test]
fn test_single_stripe_roundtrip() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 500, 1);
    let reader = read_back(write_to_vec(&schema, &rows, WriterOptions::new()));

    assert_eq!(reader.number_of_rows(), 500);
    assert_eq!(reader.stripes().len(), 1);
    assert_eq!(reader.schema(), &schema);
    assert_eq!(reader.compression(), CompressionKind::Zlib);

    let table = reader.read_table(None).unwrap();
    assert_eq!(table.rows, stored_rows(&schema, &rows));
}

#[test]
fn test_multi_stripe_roundtrip() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 25_000, 2);
    let reader = read_back(write_to_vec(&schema, &rows, multi_stripe_options()));

    assert!(reader.stripes().len() > 1);
    assert_eq!(reader.row_index_stride(), 1_000);
    let total: u64 = reader.stripes().iter().map(|s| s.number_of_rows).sum();
    assert_eq!(total, 25_000);

    let table = reader.read_table(None).unwrap();
    assert_eq!(table.row_count(), 25_000);
    assert_eq!(table.rows, stored_rows(&schema, &rows));
}

#[test]
fn test_uncompressed_roundtrip() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 3_000, 3);
    let options = multi_stripe_options().with_compression(CompressionKind::None);
    let reader = read_back(write_to_vec(&schema, &rows, options));

    assert_eq!(reader.compression(), CompressionKind::None);
    let table = reader.read_table(None).unwrap();
    assert_eq!(table.rows, stored_rows(&schema, &rows));
}

#[test]
fn test_aligned_bit_packing_roundtrip() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 2_000, 4);
    let options =
        WriterOptions::new().with_bit_packing(orcfile::encoding::BitPacking::Aligned);
    let reader = read_back(write_to_vec(&schema, &rows, options));

    let table = reader.read_table(None).unwrap();
    assert_eq!(table.rows, stored_rows(&schema, &rows));
}

#[test]
fn test_row_index_disabled() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 1_500, 5);
    let options = WriterOptions::new().with_row_index_stride(0);
    let reader = read_back(write_to_vec(&schema, &rows, options));

    assert_eq!(reader.row_index_stride(), 0);
    let stripe = reader.stripe(0).unwrap();
    assert_eq!(stripe.row_group_count(), 1);
    assert!(stripe.row_index(1).is_err());

    // Range reads fall back to skipping from the start of the stripe.
    let part = stripe.read_rows(4, 700..900).unwrap();
    let full = stripe.read_column(4).unwrap();
    for i in 0..200 {
        assert_eq!(part.value(i), full.value(700 + i));
    }
}

#[test]
fn test_projection() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 100, 6);
    let reader = read_back(write_to_vec(&schema, &rows, WriterOptions::new()));

    let columns = vec!["word".to_string(), "id".to_string()];
    let table = reader.read_table(Some(&columns)).unwrap();
    assert_eq!(table.schema.column_names(), vec!["word", "id"]);

    let expected = stored_rows(&schema, &rows);
    for (got, want) in table.rows.iter().zip(&expected) {
        assert_eq!(got.values, vec![want.values[7].clone(), want.values[3].clone()]);
    }

    let missing = vec!["nope".to_string()];
    assert!(matches!(
        reader.read_table(Some(&missing)),
        Err(OrcError::ColumnNotFound(_))
    ));
}

#[test]
fn test_all_null_and_no_null_columns() {
    let schema = Schema::new(vec![
        Column::new("empty", DataType::Long),
        Column::new("full", DataType::String),
    ]);
    let rows: Vec<Row> = (0..2_500)
        .map(|i| Row::new(vec![Value::Null, Value::String(format!("v{}", i))]))
        .collect();
    let reader = read_back(write_to_vec(
        &schema,
        &rows,
        WriterOptions::new().with_row_index_stride(1_000),
    ));

    let stripe = reader.stripe(0).unwrap();
    assert!(stripe.has_stream(1, orcfile::proto::StreamKind::Present));
    assert!(!stripe.has_stream(2, orcfile::proto::StreamKind::Present));

    let empty = stripe.read_column(0).unwrap();
    assert_eq!(empty.null_count(), 2_500);

    // 2500 distinct values out of 2500: direct encoding.
    assert_eq!(
        stripe.encoding(2).unwrap(),
        orcfile::proto::ColumnEncodingKind::DirectV2
    );
    let table = reader.read_table(None).unwrap();
    assert_eq!(table.rows, rows);
}

#[test]
fn test_dictionary_encoding_chosen_for_repeated_strings() {
    let schema = Schema::new(vec![Column::new("word", DataType::String)]);
    let rows: Vec<Row> = (0..1_000)
        .map(|i| Row::new(vec![Value::String(WORDS[i % 3].to_string())]))
        .collect();
    let reader = read_back(write_to_vec(&schema, &rows, WriterOptions::new()));

    let stripe = reader.stripe(0).unwrap();
    assert_eq!(
        stripe.encoding(1).unwrap(),
        orcfile::proto::ColumnEncodingKind::DictionaryV2
    );
    assert_eq!(stripe.dictionary_size(1).unwrap(), 3);
    assert_eq!(reader.read_table(None).unwrap().rows, rows);
}

#[test]
fn test_empty_file() {
    let schema = all_types_schema();
    let reader = read_back(write_to_vec(&schema, &[], WriterOptions::new()));

    assert_eq!(reader.number_of_rows(), 0);
    assert!(reader.stripes().is_empty());
    assert_eq!(reader.schema(), &schema);
    assert_eq!(reader.read_table(None).unwrap().row_count(), 0);
}

#[test]
fn test_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.orc");
    let schema = all_types_schema();
    let rows = random_rows(&schema, 1_200, 7);

    let mut writer = orcfile::OrcWriter::create(&path, schema.clone(), multi_stripe_options())
        .unwrap();
    writer.write_rows(&rows).unwrap();
    writer.close().unwrap();

    let reader = OrcReader::open_path(&path).unwrap();
    assert_eq!(reader.file_length(), std::fs::metadata(&path).unwrap().len());
    assert_eq!(reader.read_table(None).unwrap().rows, stored_rows(&schema, &rows));
}

#[test]
fn test_small_tail_read_is_extended() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 200, 8);
    let bytes = write_to_vec(&schema, &rows, WriterOptions::new());
    let options = orcfile::ReaderOptions::new().with_tail_read_size(16);
    let reader =
        OrcReader::open_with_options(InMemoryByteRangeProvider::new(bytes), options).unwrap();
    assert_eq!(reader.read_table(None).unwrap().rows, stored_rows(&schema, &rows));
}

#[test]
fn test_truncated_file_is_rejected() {
    let schema = all_types_schema();
    let rows = random_rows(&schema, 200, 9);
    let mut bytes = write_to_vec(&schema, &rows, WriterOptions::new());
    bytes.truncate(bytes.len() / 2);
    assert!(OrcReader::open(InMemoryByteRangeProvider::new(bytes)).is_err());
}
