//! Column statistics accumulated by the writer for each row group, stripe
//! and the whole file.

use crate::error::{OrcError, Result};
use crate::proto::{ColumnStatistics, TypeStatistics};
use crate::schema::DataType;
use crate::table::{days_from_date, Decimal, Value};

#[derive(Debug, Clone)]
enum Accumulator {
    Boolean {
        true_count: u64,
    },
    Integer {
        minimum: i64,
        maximum: i64,
        sum: Option<i64>,
    },
    Double {
        minimum: f64,
        maximum: f64,
        sum: f64,
    },
    String {
        minimum: Option<String>,
        maximum: Option<String>,
        total_length: i64,
    },
    Binary {
        total_length: i64,
    },
    Decimal {
        minimum: Option<Decimal>,
        maximum: Option<Decimal>,
        sum: Option<Decimal>,
        scale: u32,
    },
    Date {
        minimum: i32,
        maximum: i32,
    },
    Timestamp {
        minimum: i64,
        maximum: i64,
    },
}

impl Accumulator {
    fn new(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean => Accumulator::Boolean { true_count: 0 },
            DataType::Byte | DataType::Short | DataType::Int | DataType::Long => {
                Accumulator::Integer {
                    minimum: i64::MAX,
                    maximum: i64::MIN,
                    sum: Some(0),
                }
            }
            DataType::Float | DataType::Double => Accumulator::Double {
                minimum: f64::INFINITY,
                maximum: f64::NEG_INFINITY,
                sum: 0.0,
            },
            DataType::String | DataType::Varchar { .. } | DataType::Char { .. } => {
                Accumulator::String {
                    minimum: None,
                    maximum: None,
                    total_length: 0,
                }
            }
            DataType::Binary => Accumulator::Binary { total_length: 0 },
            DataType::Decimal { scale, .. } => Accumulator::Decimal {
                minimum: None,
                maximum: None,
                sum: Some(Decimal::new(0, *scale)),
                scale: *scale,
            },
            DataType::Date => Accumulator::Date {
                minimum: i32::MAX,
                maximum: i32::MIN,
            },
            DataType::Timestamp => Accumulator::Timestamp {
                minimum: i64::MAX,
                maximum: i64::MIN,
            },
        }
    }
}

/// Running statistics for one column.
#[derive(Debug, Clone)]
pub struct StatisticsBuilder {
    data_type: DataType,
    count: u64,
    has_null: bool,
    acc: Accumulator,
}

impl StatisticsBuilder {
    pub fn new(data_type: DataType) -> Self {
        Self {
            acc: Accumulator::new(&data_type),
            data_type,
            count: 0,
            has_null: false,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn has_null(&self) -> bool {
        self.has_null
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.data_type);
    }

    pub fn update(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            self.has_null = true;
            return Ok(());
        }
        match (&mut self.acc, value) {
            (Accumulator::Boolean { true_count }, Value::Boolean(b)) => {
                *true_count += *b as u64;
            }
            (
                Accumulator::Integer {
                    minimum,
                    maximum,
                    sum,
                },
                Value::Integer(v),
            ) => {
                *minimum = (*minimum).min(*v);
                *maximum = (*maximum).max(*v);
                *sum = sum.and_then(|s| s.checked_add(*v));
            }
            (
                Accumulator::Double {
                    minimum,
                    maximum,
                    sum,
                },
                Value::Float(v),
            ) => {
                if !v.is_nan() {
                    *minimum = minimum.min(*v);
                    *maximum = maximum.max(*v);
                }
                *sum += *v;
            }
            (
                Accumulator::String {
                    minimum,
                    maximum,
                    total_length,
                },
                Value::String(s),
            ) => {
                if minimum.as_deref().map_or(true, |m| s.as_str() < m) {
                    *minimum = Some(s.clone());
                }
                if maximum.as_deref().map_or(true, |m| s.as_str() > m) {
                    *maximum = Some(s.clone());
                }
                *total_length += s.len() as i64;
            }
            (Accumulator::Binary { total_length }, Value::Binary(bytes)) => {
                *total_length += bytes.len() as i64;
            }
            (
                Accumulator::Decimal {
                    minimum,
                    maximum,
                    sum,
                    scale,
                },
                Value::Decimal(d),
            ) => {
                let d = d.rescale(*scale).ok_or_else(|| {
                    OrcError::SchemaMismatch(format!("decimal {} overflows scale {}", d, scale))
                })?;
                if minimum.map_or(true, |m| d.unscaled < m.unscaled) {
                    *minimum = Some(d);
                }
                if maximum.map_or(true, |m| d.unscaled > m.unscaled) {
                    *maximum = Some(d);
                }
                *sum = sum.and_then(|s| {
                    s.unscaled
                        .checked_add(d.unscaled)
                        .map(|u| Decimal::new(u, *scale))
                });
            }
            (Accumulator::Date { minimum, maximum }, Value::Date(date)) => {
                let days = days_from_date(*date) as i32;
                *minimum = (*minimum).min(days);
                *maximum = (*maximum).max(days);
            }
            (Accumulator::Timestamp { minimum, maximum }, Value::Timestamp(ts)) => {
                let millis = ts.and_utc().timestamp_millis();
                *minimum = (*minimum).min(millis);
                *maximum = (*maximum).max(millis);
            }
            (_, other) => {
                return Err(OrcError::SchemaMismatch(format!(
                    "value {:?} does not fit column type {}",
                    other, self.data_type
                )))
            }
        }
        self.count += 1;
        Ok(())
    }

    /// Folds `other` (same column type) into `self`.
    pub fn merge(&mut self, other: &StatisticsBuilder) {
        self.count += other.count;
        self.has_null |= other.has_null;
        if other.count == 0 {
            return;
        }
        match (&mut self.acc, &other.acc) {
            (Accumulator::Boolean { true_count }, Accumulator::Boolean { true_count: t }) => {
                *true_count += t;
            }
            (
                Accumulator::Integer {
                    minimum,
                    maximum,
                    sum,
                },
                Accumulator::Integer {
                    minimum: omin,
                    maximum: omax,
                    sum: osum,
                },
            ) => {
                *minimum = (*minimum).min(*omin);
                *maximum = (*maximum).max(*omax);
                *sum = match (*sum, *osum) {
                    (Some(a), Some(b)) => a.checked_add(b),
                    _ => None,
                };
            }
            (
                Accumulator::Double {
                    minimum,
                    maximum,
                    sum,
                },
                Accumulator::Double {
                    minimum: omin,
                    maximum: omax,
                    sum: osum,
                },
            ) => {
                *minimum = minimum.min(*omin);
                *maximum = maximum.max(*omax);
                *sum += osum;
            }
            (
                Accumulator::String {
                    minimum,
                    maximum,
                    total_length,
                },
                Accumulator::String {
                    minimum: omin,
                    maximum: omax,
                    total_length: olen,
                },
            ) => {
                if let Some(o) = omin {
                    if minimum.as_ref().map_or(true, |m| o < m) {
                        *minimum = Some(o.clone());
                    }
                }
                if let Some(o) = omax {
                    if maximum.as_ref().map_or(true, |m| o > m) {
                        *maximum = Some(o.clone());
                    }
                }
                *total_length += olen;
            }
            (
                Accumulator::Binary { total_length },
                Accumulator::Binary {
                    total_length: olen,
                },
            ) => *total_length += olen,
            (
                Accumulator::Decimal {
                    minimum,
                    maximum,
                    sum,
                    scale,
                },
                Accumulator::Decimal {
                    minimum: omin,
                    maximum: omax,
                    sum: osum,
                    ..
                },
            ) => {
                if let Some(o) = omin {
                    if minimum.map_or(true, |m| o.unscaled < m.unscaled) {
                        *minimum = Some(*o);
                    }
                }
                if let Some(o) = omax {
                    if maximum.map_or(true, |m| o.unscaled > m.unscaled) {
                        *maximum = Some(*o);
                    }
                }
                *sum = match (*sum, *osum) {
                    (Some(a), Some(b)) => a
                        .unscaled
                        .checked_add(b.unscaled)
                        .map(|u| Decimal::new(u, *scale)),
                    _ => None,
                };
            }
            (
                Accumulator::Date { minimum, maximum },
                Accumulator::Date {
                    minimum: omin,
                    maximum: omax,
                },
            ) => {
                *minimum = (*minimum).min(*omin);
                *maximum = (*maximum).max(*omax);
            }
            (
                Accumulator::Timestamp { minimum, maximum },
                Accumulator::Timestamp {
                    minimum: omin,
                    maximum: omax,
                },
            ) => {
                *minimum = (*minimum).min(*omin);
                *maximum = (*maximum).max(*omax);
            }
            _ => {}
        }
    }

    pub fn build(&self) -> ColumnStatistics {
        let type_stats = if self.count == 0 {
            None
        } else {
            Some(match &self.acc {
                Accumulator::Boolean { true_count } => TypeStatistics::Bucket {
                    count: vec![*true_count],
                },
                Accumulator::Integer {
                    minimum,
                    maximum,
                    sum,
                } => TypeStatistics::Integer {
                    minimum: Some(*minimum),
                    maximum: Some(*maximum),
                    sum: *sum,
                },
                Accumulator::Double {
                    minimum,
                    maximum,
                    sum,
                } => TypeStatistics::Double {
                    minimum: Some(*minimum),
                    maximum: Some(*maximum),
                    sum: Some(*sum),
                },
                Accumulator::String {
                    minimum,
                    maximum,
                    total_length,
                } => TypeStatistics::String {
                    minimum: minimum.clone(),
                    maximum: maximum.clone(),
                    sum: Some(*total_length),
                },
                Accumulator::Binary { total_length } => TypeStatistics::Binary {
                    sum: Some(*total_length),
                },
                Accumulator::Decimal {
                    minimum,
                    maximum,
                    sum,
                    ..
                } => TypeStatistics::Decimal {
                    minimum: minimum.map(|d| d.to_string()),
                    maximum: maximum.map(|d| d.to_string()),
                    sum: sum.map(|d| d.to_string()),
                },
                Accumulator::Date { minimum, maximum } => TypeStatistics::Date {
                    minimum: Some(*minimum),
                    maximum: Some(*maximum),
                },
                Accumulator::Timestamp { minimum, maximum } => TypeStatistics::Timestamp {
                    minimum: Some(*minimum),
                    maximum: Some(*maximum),
                },
            })
        };
        ColumnStatistics {
            number_of_values: self.count,
            has_null: Some(self.has_null),
            type_stats,
        }
    }
}

/// Statistics for the root struct column: only the row count.
pub fn root_statistics(rows: u64) -> ColumnStatistics {
    ColumnStatistics {
        number_of_values: rows,
        has_null: Some(false),
        type_stats: None,
    }
}

/// One-line human readable summary, used by the metadata dump.
pub fn describe(stats: &ColumnStatistics) -> String {
    let mut out = format!("count={}", stats.number_of_values);
    if let Some(has_null) = stats.has_null {
        out.push_str(&format!(" hasNull={}", has_null));
    }
    match &stats.type_stats {
        Some(TypeStatistics::Integer {
            minimum,
            maximum,
            sum,
        }) => out.push_str(&format!(" min={:?} max={:?} sum={:?}", minimum, maximum, sum)),
        Some(TypeStatistics::Double {
            minimum,
            maximum,
            sum,
        }) => out.push_str(&format!(" min={:?} max={:?} sum={:?}", minimum, maximum, sum)),
        Some(TypeStatistics::String {
            minimum,
            maximum,
            sum,
        }) => out.push_str(&format!(
            " min={:?} max={:?} totalLength={:?}",
            minimum, maximum, sum
        )),
        Some(TypeStatistics::Bucket { count }) => {
            out.push_str(&format!(" true={:?}", count.first()))
        }
        Some(TypeStatistics::Decimal {
            minimum,
            maximum,
            sum,
        }) => out.push_str(&format!(" min={:?} max={:?} sum={:?}", minimum, maximum, sum)),
        Some(TypeStatistics::Date { minimum, maximum }) => {
            out.push_str(&format!(" min={:?} max={:?}", minimum, maximum))
        }
        Some(TypeStatistics::Binary { sum }) => {
            out.push_str(&format!(" totalLength={:?}", sum))
        }
        Some(TypeStatistics::Timestamp { minimum, maximum }) => {
            out.push_str(&format!(" minMillis={:?} maxMillis={:?}", minimum, maximum))
        }
        None => {}
    }
    out
}
