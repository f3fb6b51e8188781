use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Read past end of stream: {0}")]
    ReadPastEnd(String),

    #[error("Buffer too small: required {required}, provided {provided}")]
    BufferTooSmall { required: usize, provided: usize },

    #[error("Size mismatch: requested {requested} bytes, got {actual}")]
    SizeMismatch { requested: usize, actual: usize },

    #[error("Invalid ORC file: {0}")]
    InvalidFormat(String),

    #[error("Protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),
}

impl OrcError {
    pub(crate) fn read_past_end(what: impl Into<String>) -> Self {
        OrcError::ReadPastEnd(what.into())
    }
}

pub type Result<T> = std::result::Result<T, OrcError>;
