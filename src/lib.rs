//! Reader and writer for Apache ORC columnar files.
//!
//! [`OrcReader`] parses the file tail and hands out [`reader::StripeReader`]s
//! whose columns decode into pooled [`reader::ColumnBuffer`]s; [`OrcWriter`]
//! appends rows and produces files any ORC reader understands.

pub mod cli;
pub mod compression;
pub mod conversion;
pub mod encoding;
pub mod error;
pub mod io;
pub mod proto;
pub mod reader;
pub mod schema;
pub mod stats;
pub mod table;
pub mod writer;

pub use compression::CompressionKind;
pub use error::{OrcError, Result};
pub use reader::{OrcReader, ReaderOptions};
pub use schema::{Column, DataType, Schema};
pub use table::{Decimal, Row, Table, Value};
pub use writer::{OrcWriter, WriterOptions};
