#![allow(dead_code)]

use chrono::{DateTime, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use orcfile::table::date_from_days;
use orcfile::writer::normalize;
use orcfile::{Column, DataType, Decimal, OrcWriter, Row, Schema, Value, WriterOptions};

pub const WORDS: [&str; 6] = ["alpha", "beta", "gamma", "delta", "", "épsilon"];

pub fn all_types_schema() -> Schema {
    Schema::new(vec![
        Column::new("flag", DataType::Boolean),
        Column::new("tiny", DataType::Byte),
        Column::new("small", DataType::Short),
        Column::new("id", DataType::Int),
        Column::new("big", DataType::Long),
        Column::new("ratio", DataType::Float),
        Column::new("amount", DataType::Double),
        Column::new("word", DataType::String),
        Column::new("code", DataType::Varchar { max_length: 8 }),
        Column::new("tag", DataType::Char { max_length: 4 }),
        Column::new("blob", DataType::Binary),
        Column::new("price", DataType::Decimal { precision: 18, scale: 4 }),
        Column::new("day", DataType::Date),
        Column::new("at", DataType::Timestamp),
    ])
}

fn random_text(rng: &mut StdRng, max_len: usize) -> String {
    let len = rng.gen_range(0..=max_len);
    (0..len)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

/// Seconds never fall in (-1, 0), where the stored form is ambiguous.
fn random_timestamp(rng: &mut StdRng) -> NaiveDateTime {
    let seconds = if rng.gen_bool(0.2) {
        rng.gen_range(-2_000_000_000i64..=-2)
    } else {
        rng.gen_range(0i64..4_000_000_000)
    };
    let nanos = match rng.gen_range(0..4) {
        0 => 0,
        1 => rng.gen_range(0..1_000) * 1_000_000,
        2 => rng.gen_range(0..1_000_000),
        _ => rng.gen_range(0..1_000_000_000),
    };
    DateTime::from_timestamp(seconds, nanos)
        .map(|dt| dt.naive_utc())
        .unwrap()
}

fn random_value(rng: &mut StdRng, data_type: &DataType, row: usize) -> Value {
    if rng.gen_bool(0.1) {
        return Value::Null;
    }
    match data_type {
        DataType::Boolean => Value::Boolean(rng.gen_bool(0.3)),
        DataType::Byte => Value::Integer(rng.gen_range(i8::MIN..=i8::MAX) as i64),
        DataType::Short => Value::Integer(rng.gen_range(-50i64..50)),
        // Runs of ascending ids with occasional jumps.
        DataType::Int => Value::Integer(if rng.gen_bool(0.05) {
            rng.gen_range(i32::MIN..=i32::MAX) as i64
        } else {
            row as i64
        }),
        // Mostly small values with rare outliers so patched runs appear.
        DataType::Long => Value::Integer(match rng.gen_range(0..100) {
            0 => rng.gen_range(-(1i64 << 40)..(1i64 << 40)),
            1 => i64::MAX,
            2 => i64::MIN,
            3..=30 => 7,
            _ => rng.gen_range(0..1_000),
        }),
        DataType::Float => Value::Float(rng.gen_range(-1.0e6f32..1.0e6) as f64),
        DataType::Double => Value::Float(rng.gen::<f64>() * 1.0e9 - 5.0e8),
        DataType::String => Value::String(WORDS[rng.gen_range(0..WORDS.len())].to_string()),
        DataType::Varchar { .. } => Value::String(random_text(rng, 12)),
        DataType::Char { .. } => Value::String(random_text(rng, 6)),
        DataType::Binary => {
            let len = rng.gen_range(0..10);
            Value::Binary((0..len).map(|_| rng.gen()).collect())
        }
        DataType::Decimal { scale, .. } => Value::Decimal(Decimal::new(
            rng.gen_range(-(10i128.pow(14))..10i128.pow(14)),
            *scale,
        )),
        DataType::Date => Value::Date(date_from_days(rng.gen_range(-200_000i64..200_000)).unwrap()),
        DataType::Timestamp => Value::Timestamp(random_timestamp(rng)),
    }
}

pub fn random_rows(schema: &Schema, count: usize, seed: u64) -> Vec<Row> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|r| {
            Row::new(
                schema
                    .columns
                    .iter()
                    .map(|c| random_value(&mut rng, &c.data_type, r))
                    .collect(),
            )
        })
        .collect()
}

/// Rows as the reader returns them: truncated, padded and rescaled.
pub fn stored_rows(schema: &Schema, rows: &[Row]) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            Row::new(
                schema
                    .columns
                    .iter()
                    .zip(&row.values)
                    .map(|(c, v)| normalize(&c.data_type, v).unwrap())
                    .collect(),
            )
        })
        .collect()
}

pub fn write_to_vec(schema: &Schema, rows: &[Row], options: WriterOptions) -> Vec<u8> {
    let mut writer = OrcWriter::new(Vec::new(), schema.clone(), options).unwrap();
    writer.write_rows(rows).unwrap();
    writer.close().unwrap()
}

/// Many small stripes, each with several row groups.
pub fn multi_stripe_options() -> WriterOptions {
    WriterOptions::new()
        .with_row_index_stride(1_000)
        .with_stripe_size(64 * 1024)
        .with_compression_block_size(4 * 1024)
}
