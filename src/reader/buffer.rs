//! Decoded column buffers and the scratch pool used while filling them.

use std::ops::{Deref, DerefMut};

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;

use crate::error::{OrcError, Result};
use crate::schema::DataType;
use crate::table::{Decimal, Value};

/// A fixed-capacity run of nullable values.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedBuffer<T> {
    values: Vec<Option<T>>,
    capacity: usize,
}

impl<T> TypedBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: Option<T>) -> Result<()> {
        if self.values.len() == self.capacity {
            return Err(OrcError::BufferTooSmall {
                required: self.values.len() + 1,
                provided: self.capacity,
            });
        }
        self.values.push(value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    pub fn values(&self) -> &[Option<T>] {
        &self.values
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// One column's decoded values, tagged by physical type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnBuffer {
    Boolean(TypedBuffer<bool>),
    /// BYTE, SHORT, INT and LONG columns.
    Integer(TypedBuffer<i64>),
    Float(TypedBuffer<f32>),
    Double(TypedBuffer<f64>),
    /// STRING, VARCHAR and CHAR columns.
    String(TypedBuffer<String>),
    Binary(TypedBuffer<Vec<u8>>),
    Decimal(TypedBuffer<Decimal>),
    Date(TypedBuffer<NaiveDate>),
    Timestamp(TypedBuffer<NaiveDateTime>),
}

macro_rules! each_buffer {
    ($self:expr, $buf:ident => $body:expr) => {
        match $self {
            ColumnBuffer::Boolean($buf) => $body,
            ColumnBuffer::Integer($buf) => $body,
            ColumnBuffer::Float($buf) => $body,
            ColumnBuffer::Double($buf) => $body,
            ColumnBuffer::String($buf) => $body,
            ColumnBuffer::Binary($buf) => $body,
            ColumnBuffer::Decimal($buf) => $body,
            ColumnBuffer::Date($buf) => $body,
            ColumnBuffer::Timestamp($buf) => $body,
        }
    };
}

impl ColumnBuffer {
    pub fn for_type(data_type: &DataType, capacity: usize) -> Self {
        match data_type {
            DataType::Boolean => ColumnBuffer::Boolean(TypedBuffer::with_capacity(capacity)),
            DataType::Byte | DataType::Short | DataType::Int | DataType::Long => {
                ColumnBuffer::Integer(TypedBuffer::with_capacity(capacity))
            }
            DataType::Float => ColumnBuffer::Float(TypedBuffer::with_capacity(capacity)),
            DataType::Double => ColumnBuffer::Double(TypedBuffer::with_capacity(capacity)),
            DataType::String | DataType::Varchar { .. } | DataType::Char { .. } => {
                ColumnBuffer::String(TypedBuffer::with_capacity(capacity))
            }
            DataType::Binary => ColumnBuffer::Binary(TypedBuffer::with_capacity(capacity)),
            DataType::Decimal { .. } => {
                ColumnBuffer::Decimal(TypedBuffer::with_capacity(capacity))
            }
            DataType::Date => ColumnBuffer::Date(TypedBuffer::with_capacity(capacity)),
            DataType::Timestamp => ColumnBuffer::Timestamp(TypedBuffer::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        each_buffer!(self, b => b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        each_buffer!(self, b => b.capacity())
    }

    pub fn clear(&mut self) {
        each_buffer!(self, b => b.clear())
    }

    pub fn null_count(&self) -> usize {
        each_buffer!(self, b => b.null_count())
    }

    pub fn is_null(&self, index: usize) -> bool {
        each_buffer!(self, b => b.values().get(index).map_or(true, |v| v.is_none()))
    }

    /// The value at `index` as a row cell; out of range reads as NULL.
    pub fn value(&self, index: usize) -> Value {
        match self {
            ColumnBuffer::Boolean(b) => b.get(index).map(|v| Value::Boolean(*v)),
            ColumnBuffer::Integer(b) => b.get(index).map(|v| Value::Integer(*v)),
            ColumnBuffer::Float(b) => b.get(index).map(|v| Value::Float(*v as f64)),
            ColumnBuffer::Double(b) => b.get(index).map(|v| Value::Float(*v)),
            ColumnBuffer::String(b) => b.get(index).map(|v| Value::String(v.clone())),
            ColumnBuffer::Binary(b) => b.get(index).map(|v| Value::Binary(v.clone())),
            ColumnBuffer::Decimal(b) => b.get(index).map(|v| Value::Decimal(*v)),
            ColumnBuffer::Date(b) => b.get(index).map(|v| Value::Date(*v)),
            ColumnBuffer::Timestamp(b) => b.get(index).map(|v| Value::Timestamp(*v)),
        }
        .unwrap_or(Value::Null)
    }
}

/// Free list of scratch vectors of one element type.
pub struct Pool<T> {
    free: Mutex<Vec<Vec<T>>>,
}

impl<T: Clone + Default> Pool<T> {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Rents a vector of `len` default values. It goes back to the pool when
    /// the guard drops, on success and error paths alike.
    pub fn rent(&self, len: usize) -> PooledVec<'_, T> {
        let mut vec = self.free.lock().pop().unwrap_or_default();
        vec.clear();
        vec.resize(len, T::default());
        PooledVec {
            vec: Some(vec),
            pool: self,
        }
    }

    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}

impl<T: Clone + Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PooledVec<'a, T> {
    vec: Option<Vec<T>>,
    pool: &'a Pool<T>,
}

impl<T> Deref for PooledVec<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        self.vec.as_ref().unwrap_or_else(|| unreachable!("taken only on drop"))
    }
}

impl<T> DerefMut for PooledVec<'_, T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        self.vec.as_mut().unwrap_or_else(|| unreachable!("taken only on drop"))
    }
}

impl<T> Drop for PooledVec<'_, T> {
    fn drop(&mut self) {
        if let Some(vec) = self.vec.take() {
            self.pool.free.lock().push(vec);
        }
    }
}

/// Scratch arrays shared by the column decoders of one reader.
#[derive(Default)]
pub struct BufferPool {
    pub bools: Pool<bool>,
    pub longs: Pool<i64>,
    pub bytes: Pool<u8>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_buffer_capacity() {
        let mut buf = TypedBuffer::with_capacity(2);
        buf.push(Some(1i64)).unwrap();
        buf.push(None).unwrap();
        assert!(matches!(
            buf.push(Some(3)),
            Err(OrcError::BufferTooSmall {
                required: 3,
                provided: 2
            })
        ));
        assert_eq!(buf.null_count(), 1);
        assert_eq!(buf.get(0), Some(&1));
        assert_eq!(buf.get(1), None);
    }

    #[test]
    fn test_column_buffer_values() {
        let mut col = ColumnBuffer::for_type(&DataType::Float, 4);
        if let ColumnBuffer::Float(b) = &mut col {
            b.push(Some(1.5)).unwrap();
            b.push(None).unwrap();
        }
        assert_eq!(col.len(), 2);
        assert_eq!(col.value(0), Value::Float(1.5));
        assert!(col.is_null(1));
        assert_eq!(col.value(7), Value::Null);
        col.clear();
        assert!(col.is_empty());
        assert_eq!(col.capacity(), 4);
    }

    #[test]
    fn test_pool_returns_on_error_path() {
        let pool = BufferPool::new();
        let failing = || -> Result<()> {
            let mut scratch = pool.longs.rent(16);
            scratch[0] = 9;
            Err(OrcError::InvalidFormat("boom".into()))
        };
        assert!(failing().is_err());
        assert_eq!(pool.longs.available(), 1);

        let reused = pool.longs.rent(4);
        assert_eq!(reused.len(), 4);
        assert!(reused.iter().all(|&v| v == 0));
        assert_eq!(pool.longs.available(), 0);
    }
}
