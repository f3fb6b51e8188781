use super::pb::*;
use super::Message;
use crate::compression::CompressionKind;
use crate::error::{OrcError, Result};

pub const MAGIC: &str = "ORC";

fn decode_all<M: Message>(protos: Vec<M::Proto>) -> Result<Vec<M>> {
    protos.into_iter().map(M::from_proto).collect()
}

fn encode_all<M: Message>(messages: &[M]) -> Vec<M::Proto> {
    messages.iter().map(Message::to_proto).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostScript {
    pub footer_length: u64,
    pub compression: CompressionKind,
    pub compression_block_size: Option<u64>,
    pub version: Vec<u32>,
    pub metadata_length: u64,
    pub writer_version: Option<u32>,
    pub magic: Option<String>,
}

impl Message for PostScript {
    type Proto = PostScriptPb;

    fn from_proto(proto: PostScriptPb) -> Result<Self> {
        let compression = match proto.compression {
            Some(kind) => CompressionKind::try_from(kind)?,
            None => CompressionKind::None,
        };
        Ok(PostScript {
            footer_length: proto.footer_length.unwrap_or_default(),
            compression,
            compression_block_size: proto.compression_block_size,
            version: proto.version,
            metadata_length: proto.metadata_length.unwrap_or_default(),
            writer_version: proto.writer_version,
            magic: proto.magic,
        })
    }

    fn to_proto(&self) -> PostScriptPb {
        PostScriptPb {
            footer_length: Some(self.footer_length),
            compression: Some(self.compression.into()),
            compression_block_size: self.compression_block_size,
            version: self.version.clone(),
            metadata_length: Some(self.metadata_length),
            writer_version: self.writer_version,
            magic: self.magic.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripeInformation {
    pub offset: u64,
    pub index_length: u64,
    pub data_length: u64,
    pub footer_length: u64,
    pub number_of_rows: u64,
}

impl StripeInformation {
    pub fn total_length(&self) -> u64 {
        self.index_length + self.data_length + self.footer_length
    }
}

impl Message for StripeInformation {
    type Proto = StripeInformationPb;

    fn from_proto(proto: StripeInformationPb) -> Result<Self> {
        Ok(StripeInformation {
            offset: proto.offset.unwrap_or_default(),
            index_length: proto.index_length.unwrap_or_default(),
            data_length: proto.data_length.unwrap_or_default(),
            footer_length: proto.footer_length.unwrap_or_default(),
            number_of_rows: proto.number_of_rows.unwrap_or_default(),
        })
    }

    fn to_proto(&self) -> StripeInformationPb {
        StripeInformationPb {
            offset: Some(self.offset),
            index_length: Some(self.index_length),
            data_length: Some(self.data_length),
            footer_length: Some(self.footer_length),
            number_of_rows: Some(self.number_of_rows),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Binary,
    Timestamp,
    List,
    Map,
    Struct,
    Union,
    Decimal,
    Date,
    Varchar,
    Char,
}

impl TryFrom<u64> for TypeKind {
    type Error = OrcError;

    fn try_from(value: u64) -> Result<Self> {
        Ok(match value {
            0 => TypeKind::Boolean,
            1 => TypeKind::Byte,
            2 => TypeKind::Short,
            3 => TypeKind::Int,
            4 => TypeKind::Long,
            5 => TypeKind::Float,
            6 => TypeKind::Double,
            7 => TypeKind::String,
            8 => TypeKind::Binary,
            9 => TypeKind::Timestamp,
            10 => TypeKind::List,
            11 => TypeKind::Map,
            12 => TypeKind::Struct,
            13 => TypeKind::Union,
            14 => TypeKind::Decimal,
            15 => TypeKind::Date,
            16 => TypeKind::Varchar,
            17 => TypeKind::Char,
            _ => {
                return Err(OrcError::UnsupportedType(format!(
                    "Unknown type kind: {}",
                    value
                )))
            }
        })
    }
}

impl From<TypeKind> for u64 {
    fn from(kind: TypeKind) -> u64 {
        match kind {
            TypeKind::Boolean => 0,
            TypeKind::Byte => 1,
            TypeKind::Short => 2,
            TypeKind::Int => 3,
            TypeKind::Long => 4,
            TypeKind::Float => 5,
            TypeKind::Double => 6,
            TypeKind::String => 7,
            TypeKind::Binary => 8,
            TypeKind::Timestamp => 9,
            TypeKind::List => 10,
            TypeKind::Map => 11,
            TypeKind::Struct => 12,
            TypeKind::Union => 13,
            TypeKind::Decimal => 14,
            TypeKind::Date => 15,
            TypeKind::Varchar => 16,
            TypeKind::Char => 17,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
    pub subtypes: Vec<u32>,
    pub field_names: Vec<String>,
    pub maximum_length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            subtypes: Vec::new(),
            field_names: Vec::new(),
            maximum_length: None,
            precision: None,
            scale: None,
        }
    }
}

impl Message for Type {
    type Proto = TypePb;

    fn from_proto(proto: TypePb) -> Result<Self> {
        let kind = match proto.kind {
            Some(kind) => TypeKind::try_from(kind)?,
            None => TypeKind::Struct,
        };
        Ok(Type {
            kind,
            subtypes: proto.subtypes,
            field_names: proto.field_names,
            maximum_length: proto.maximum_length,
            precision: proto.precision,
            scale: proto.scale,
        })
    }

    fn to_proto(&self) -> TypePb {
        TypePb {
            kind: Some(self.kind.into()),
            subtypes: self.subtypes.clone(),
            field_names: self.field_names.clone(),
            maximum_length: self.maximum_length,
            precision: self.precision,
            scale: self.scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMetadataItem {
    pub name: String,
    pub value: Vec<u8>,
}

impl Message for UserMetadataItem {
    type Proto = UserMetadataItemPb;

    fn from_proto(proto: UserMetadataItemPb) -> Result<Self> {
        Ok(UserMetadataItem {
            name: proto.name.unwrap_or_default(),
            value: proto.value.unwrap_or_default(),
        })
    }

    fn to_proto(&self) -> UserMetadataItemPb {
        UserMetadataItemPb {
            name: Some(self.name.clone()),
            value: Some(self.value.clone()),
        }
    }
}

/// Type-specific part of a column statistics message.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeStatistics {
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
        sum: Option<i64>,
    },
    Double {
        minimum: Option<f64>,
        maximum: Option<f64>,
        sum: Option<f64>,
    },
    String {
        minimum: Option<String>,
        maximum: Option<String>,
        sum: Option<i64>,
    },
    Bucket {
        count: Vec<u64>,
    },
    Decimal {
        minimum: Option<String>,
        maximum: Option<String>,
        sum: Option<String>,
    },
    Date {
        minimum: Option<i32>,
        maximum: Option<i32>,
    },
    Binary {
        sum: Option<i64>,
    },
    /// Milliseconds since the Unix epoch.
    Timestamp {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
}

impl TypeStatistics {
    /// Picks the first typed sub-message present, in field order.
    fn from_proto(proto: &mut ColumnStatisticsPb) -> Option<Self> {
        if let Some(s) = proto.int_statistics.take() {
            return Some(TypeStatistics::Integer {
                minimum: s.minimum,
                maximum: s.maximum,
                sum: s.sum,
            });
        }
        if let Some(s) = proto.double_statistics.take() {
            return Some(TypeStatistics::Double {
                minimum: s.minimum,
                maximum: s.maximum,
                sum: s.sum,
            });
        }
        if let Some(s) = proto.string_statistics.take() {
            return Some(TypeStatistics::String {
                minimum: s.minimum,
                maximum: s.maximum,
                sum: s.sum,
            });
        }
        if let Some(s) = proto.bucket_statistics.take() {
            return Some(TypeStatistics::Bucket { count: s.count });
        }
        if let Some(s) = proto.decimal_statistics.take() {
            return Some(TypeStatistics::Decimal {
                minimum: s.minimum,
                maximum: s.maximum,
                sum: s.sum,
            });
        }
        if let Some(s) = proto.date_statistics.take() {
            return Some(TypeStatistics::Date {
                minimum: s.minimum,
                maximum: s.maximum,
            });
        }
        if let Some(s) = proto.binary_statistics.take() {
            return Some(TypeStatistics::Binary { sum: s.sum });
        }
        proto
            .timestamp_statistics
            .take()
            .map(|s| TypeStatistics::Timestamp {
                minimum: s.minimum,
                maximum: s.maximum,
            })
    }

    fn fill_proto(&self, proto: &mut ColumnStatisticsPb) {
        match self.clone() {
            TypeStatistics::Integer {
                minimum,
                maximum,
                sum,
            } => {
                proto.int_statistics = Some(IntegerStatisticsPb {
                    minimum,
                    maximum,
                    sum,
                })
            }
            TypeStatistics::Double {
                minimum,
                maximum,
                sum,
            } => {
                proto.double_statistics = Some(DoubleStatisticsPb {
                    minimum,
                    maximum,
                    sum,
                })
            }
            TypeStatistics::String {
                minimum,
                maximum,
                sum,
            } => {
                proto.string_statistics = Some(StringStatisticsPb {
                    minimum,
                    maximum,
                    sum,
                })
            }
            TypeStatistics::Bucket { count } => {
                proto.bucket_statistics = Some(BucketStatisticsPb { count })
            }
            TypeStatistics::Decimal {
                minimum,
                maximum,
                sum,
            } => {
                proto.decimal_statistics = Some(DecimalStatisticsPb {
                    minimum,
                    maximum,
                    sum,
                })
            }
            TypeStatistics::Date { minimum, maximum } => {
                proto.date_statistics = Some(DateStatisticsPb { minimum, maximum })
            }
            TypeStatistics::Binary { sum } => {
                proto.binary_statistics = Some(BinaryStatisticsPb { sum })
            }
            TypeStatistics::Timestamp { minimum, maximum } => {
                proto.timestamp_statistics = Some(TimestampStatisticsPb { minimum, maximum })
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStatistics {
    pub number_of_values: u64,
    pub has_null: Option<bool>,
    pub type_stats: Option<TypeStatistics>,
}

impl Message for ColumnStatistics {
    type Proto = ColumnStatisticsPb;

    fn from_proto(mut proto: ColumnStatisticsPb) -> Result<Self> {
        Ok(ColumnStatistics {
            number_of_values: proto.number_of_values.unwrap_or_default(),
            has_null: proto.has_null,
            type_stats: TypeStatistics::from_proto(&mut proto),
        })
    }

    fn to_proto(&self) -> ColumnStatisticsPb {
        let mut proto = ColumnStatisticsPb {
            number_of_values: Some(self.number_of_values),
            has_null: self.has_null,
            ..Default::default()
        };
        if let Some(type_stats) = &self.type_stats {
            type_stats.fill_proto(&mut proto);
        }
        proto
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StripeStatistics {
    pub col_stats: Vec<ColumnStatistics>,
}

impl Message for StripeStatistics {
    type Proto = StripeStatisticsPb;

    fn from_proto(proto: StripeStatisticsPb) -> Result<Self> {
        Ok(StripeStatistics {
            col_stats: decode_all(proto.col_stats)?,
        })
    }

    fn to_proto(&self) -> StripeStatisticsPb {
        StripeStatisticsPb {
            col_stats: encode_all(&self.col_stats),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub stripe_stats: Vec<StripeStatistics>,
}

impl Message for Metadata {
    type Proto = MetadataPb;

    fn from_proto(proto: MetadataPb) -> Result<Self> {
        Ok(Metadata {
            stripe_stats: decode_all(proto.stripe_stats)?,
        })
    }

    fn to_proto(&self) -> MetadataPb {
        MetadataPb {
            stripe_stats: encode_all(&self.stripe_stats),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Footer {
    pub header_length: u64,
    pub content_length: u64,
    pub stripes: Vec<StripeInformation>,
    pub types: Vec<Type>,
    pub metadata: Vec<UserMetadataItem>,
    pub number_of_rows: u64,
    pub statistics: Vec<ColumnStatistics>,
    pub row_index_stride: u32,
}

impl Message for Footer {
    type Proto = FooterPb;

    fn from_proto(proto: FooterPb) -> Result<Self> {
        Ok(Footer {
            header_length: proto.header_length.unwrap_or_default(),
            content_length: proto.content_length.unwrap_or_default(),
            stripes: decode_all(proto.stripes)?,
            types: decode_all(proto.types)?,
            metadata: decode_all(proto.metadata)?,
            number_of_rows: proto.number_of_rows.unwrap_or_default(),
            statistics: decode_all(proto.statistics)?,
            row_index_stride: proto.row_index_stride.unwrap_or_default(),
        })
    }

    fn to_proto(&self) -> FooterPb {
        FooterPb {
            header_length: Some(self.header_length),
            content_length: Some(self.content_length),
            stripes: encode_all(&self.stripes),
            types: encode_all(&self.types),
            metadata: encode_all(&self.metadata),
            number_of_rows: Some(self.number_of_rows),
            statistics: encode_all(&self.statistics),
            row_index_stride: Some(self.row_index_stride),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Present,
    Data,
    Length,
    DictionaryData,
    DictionaryCount,
    Secondary,
    RowIndex,
    BloomFilter,
    BloomFilterUtf8,
}

impl StreamKind {
    /// Index streams live in the stripe's index section, the rest in its
    /// data section.
    pub fn is_index(self) -> bool {
        matches!(
            self,
            StreamKind::RowIndex | StreamKind::BloomFilter | StreamKind::BloomFilterUtf8
        )
    }
}

impl TryFrom<u64> for StreamKind {
    type Error = OrcError;

    fn try_from(value: u64) -> Result<Self> {
        Ok(match value {
            0 => StreamKind::Present,
            1 => StreamKind::Data,
            2 => StreamKind::Length,
            3 => StreamKind::DictionaryData,
            4 => StreamKind::DictionaryCount,
            5 => StreamKind::Secondary,
            6 => StreamKind::RowIndex,
            7 => StreamKind::BloomFilter,
            8 => StreamKind::BloomFilterUtf8,
            _ => {
                return Err(OrcError::Unsupported(format!(
                    "Stream kind {}",
                    value
                )))
            }
        })
    }
}

impl From<StreamKind> for u64 {
    fn from(kind: StreamKind) -> u64 {
        match kind {
            StreamKind::Present => 0,
            StreamKind::Data => 1,
            StreamKind::Length => 2,
            StreamKind::DictionaryData => 3,
            StreamKind::DictionaryCount => 4,
            StreamKind::Secondary => 5,
            StreamKind::RowIndex => 6,
            StreamKind::BloomFilter => 7,
            StreamKind::BloomFilterUtf8 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stream {
    pub kind: StreamKind,
    pub column: u32,
    pub length: u64,
}

impl Message for Stream {
    type Proto = StreamPb;

    fn from_proto(proto: StreamPb) -> Result<Self> {
        let kind = match proto.kind {
            Some(kind) => StreamKind::try_from(kind)?,
            None => StreamKind::Present,
        };
        Ok(Stream {
            kind,
            column: proto.column.unwrap_or_default(),
            length: proto.length.unwrap_or_default(),
        })
    }

    fn to_proto(&self) -> StreamPb {
        StreamPb {
            kind: Some(self.kind.into()),
            column: Some(self.column),
            length: Some(self.length),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnEncodingKind {
    #[default]
    Direct,
    Dictionary,
    DirectV2,
    DictionaryV2,
}

impl ColumnEncodingKind {
    pub fn is_v2(self) -> bool {
        matches!(
            self,
            ColumnEncodingKind::DirectV2 | ColumnEncodingKind::DictionaryV2
        )
    }

    pub fn is_dictionary(self) -> bool {
        matches!(
            self,
            ColumnEncodingKind::Dictionary | ColumnEncodingKind::DictionaryV2
        )
    }
}

impl TryFrom<u64> for ColumnEncodingKind {
    type Error = OrcError;

    fn try_from(value: u64) -> Result<Self> {
        match value {
            0 => Ok(ColumnEncodingKind::Direct),
            1 => Ok(ColumnEncodingKind::Dictionary),
            2 => Ok(ColumnEncodingKind::DirectV2),
            3 => Ok(ColumnEncodingKind::DictionaryV2),
            _ => Err(OrcError::InvalidFormat(format!(
                "Unknown column encoding: {}",
                value
            ))),
        }
    }
}

impl From<ColumnEncodingKind> for u64 {
    fn from(kind: ColumnEncodingKind) -> u64 {
        match kind {
            ColumnEncodingKind::Direct => 0,
            ColumnEncodingKind::Dictionary => 1,
            ColumnEncodingKind::DirectV2 => 2,
            ColumnEncodingKind::DictionaryV2 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnEncoding {
    pub kind: ColumnEncodingKind,
    pub dictionary_size: u32,
}

impl Message for ColumnEncoding {
    type Proto = ColumnEncodingPb;

    fn from_proto(proto: ColumnEncodingPb) -> Result<Self> {
        let kind = match proto.kind {
            Some(kind) => ColumnEncodingKind::try_from(kind)?,
            None => ColumnEncodingKind::Direct,
        };
        Ok(ColumnEncoding {
            kind,
            dictionary_size: proto.dictionary_size.unwrap_or_default(),
        })
    }

    fn to_proto(&self) -> ColumnEncodingPb {
        ColumnEncodingPb {
            kind: Some(self.kind.into()),
            dictionary_size: self
                .kind
                .is_dictionary()
                .then_some(self.dictionary_size),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripeFooter {
    pub streams: Vec<Stream>,
    pub columns: Vec<ColumnEncoding>,
    pub writer_timezone: Option<String>,
}

impl Message for StripeFooter {
    type Proto = StripeFooterPb;

    fn from_proto(proto: StripeFooterPb) -> Result<Self> {
        Ok(StripeFooter {
            streams: decode_all(proto.streams)?,
            columns: decode_all(proto.columns)?,
            writer_timezone: proto.writer_timezone,
        })
    }

    fn to_proto(&self) -> StripeFooterPb {
        StripeFooterPb {
            streams: encode_all(&self.streams),
            columns: encode_all(&self.columns),
            writer_timezone: self.writer_timezone.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowIndexEntry {
    pub positions: Vec<u64>,
    pub statistics: Option<ColumnStatistics>,
}

impl Message for RowIndexEntry {
    type Proto = RowIndexEntryPb;

    fn from_proto(proto: RowIndexEntryPb) -> Result<Self> {
        Ok(RowIndexEntry {
            positions: proto.positions,
            statistics: proto
                .statistics
                .map(ColumnStatistics::from_proto)
                .transpose()?,
        })
    }

    fn to_proto(&self) -> RowIndexEntryPb {
        RowIndexEntryPb {
            positions: self.positions.clone(),
            statistics: self.statistics.as_ref().map(Message::to_proto),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowIndex {
    pub entries: Vec<RowIndexEntry>,
}

impl Message for RowIndex {
    type Proto = RowIndexPb;

    fn from_proto(proto: RowIndexPb) -> Result<Self> {
        Ok(RowIndex {
            entries: decode_all(proto.entry)?,
        })
    }

    fn to_proto(&self) -> RowIndexPb {
        RowIndexPb {
            entry: encode_all(&self.entries),
        }
    }
}
