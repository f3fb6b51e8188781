//! Wire schema of orc_proto.proto. Enum fields are carried as raw varints and
//! checked when converted into the typed messages.

use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct PostScriptPb {
    #[prost(uint64, optional, tag = "1")]
    pub footer_length: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub compression: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub compression_block_size: Option<u64>,
    #[prost(uint32, repeated, tag = "4")]
    pub version: Vec<u32>,
    #[prost(uint64, optional, tag = "5")]
    pub metadata_length: Option<u64>,
    #[prost(uint32, optional, tag = "6")]
    pub writer_version: Option<u32>,
    #[prost(string, optional, tag = "8000")]
    pub magic: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StripeInformationPb {
    #[prost(uint64, optional, tag = "1")]
    pub offset: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub index_length: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub data_length: Option<u64>,
    #[prost(uint64, optional, tag = "4")]
    pub footer_length: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub number_of_rows: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TypePb {
    #[prost(uint64, optional, tag = "1")]
    pub kind: Option<u64>,
    #[prost(uint32, repeated, tag = "2")]
    pub subtypes: Vec<u32>,
    #[prost(string, repeated, tag = "3")]
    pub field_names: Vec<String>,
    #[prost(uint32, optional, tag = "4")]
    pub maximum_length: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub precision: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub scale: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct UserMetadataItemPb {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct IntegerStatisticsPb {
    #[prost(sint64, optional, tag = "1")]
    pub minimum: Option<i64>,
    #[prost(sint64, optional, tag = "2")]
    pub maximum: Option<i64>,
    #[prost(sint64, optional, tag = "3")]
    pub sum: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DoubleStatisticsPb {
    #[prost(double, optional, tag = "1")]
    pub minimum: Option<f64>,
    #[prost(double, optional, tag = "2")]
    pub maximum: Option<f64>,
    #[prost(double, optional, tag = "3")]
    pub sum: Option<f64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StringStatisticsPb {
    #[prost(string, optional, tag = "1")]
    pub minimum: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub maximum: Option<String>,
    #[prost(sint64, optional, tag = "3")]
    pub sum: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BucketStatisticsPb {
    #[prost(uint64, repeated, tag = "1")]
    pub count: Vec<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DecimalStatisticsPb {
    #[prost(string, optional, tag = "1")]
    pub minimum: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub maximum: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub sum: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DateStatisticsPb {
    #[prost(sint32, optional, tag = "1")]
    pub minimum: Option<i32>,
    #[prost(sint32, optional, tag = "2")]
    pub maximum: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BinaryStatisticsPb {
    #[prost(sint64, optional, tag = "1")]
    pub sum: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimestampStatisticsPb {
    #[prost(sint64, optional, tag = "1")]
    pub minimum: Option<i64>,
    #[prost(sint64, optional, tag = "2")]
    pub maximum: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ColumnStatisticsPb {
    #[prost(uint64, optional, tag = "1")]
    pub number_of_values: Option<u64>,
    #[prost(message, optional, tag = "2")]
    pub int_statistics: Option<IntegerStatisticsPb>,
    #[prost(message, optional, tag = "3")]
    pub double_statistics: Option<DoubleStatisticsPb>,
    #[prost(message, optional, tag = "4")]
    pub string_statistics: Option<StringStatisticsPb>,
    #[prost(message, optional, tag = "5")]
    pub bucket_statistics: Option<BucketStatisticsPb>,
    #[prost(message, optional, tag = "6")]
    pub decimal_statistics: Option<DecimalStatisticsPb>,
    #[prost(message, optional, tag = "7")]
    pub date_statistics: Option<DateStatisticsPb>,
    #[prost(message, optional, tag = "8")]
    pub binary_statistics: Option<BinaryStatisticsPb>,
    #[prost(message, optional, tag = "9")]
    pub timestamp_statistics: Option<TimestampStatisticsPb>,
    #[prost(bool, optional, tag = "10")]
    pub has_null: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StripeStatisticsPb {
    #[prost(message, repeated, tag = "1")]
    pub col_stats: Vec<ColumnStatisticsPb>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MetadataPb {
    #[prost(message, repeated, tag = "1")]
    pub stripe_stats: Vec<StripeStatisticsPb>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FooterPb {
    #[prost(uint64, optional, tag = "1")]
    pub header_length: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub content_length: Option<u64>,
    #[prost(message, repeated, tag = "3")]
    pub stripes: Vec<StripeInformationPb>,
    #[prost(message, repeated, tag = "4")]
    pub types: Vec<TypePb>,
    #[prost(message, repeated, tag = "5")]
    pub metadata: Vec<UserMetadataItemPb>,
    #[prost(uint64, optional, tag = "6")]
    pub number_of_rows: Option<u64>,
    #[prost(message, repeated, tag = "7")]
    pub statistics: Vec<ColumnStatisticsPb>,
    #[prost(uint32, optional, tag = "8")]
    pub row_index_stride: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StreamPb {
    #[prost(uint64, optional, tag = "1")]
    pub kind: Option<u64>,
    #[prost(uint32, optional, tag = "2")]
    pub column: Option<u32>,
    #[prost(uint64, optional, tag = "3")]
    pub length: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ColumnEncodingPb {
    #[prost(uint64, optional, tag = "1")]
    pub kind: Option<u64>,
    #[prost(uint32, optional, tag = "2")]
    pub dictionary_size: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StripeFooterPb {
    #[prost(message, repeated, tag = "1")]
    pub streams: Vec<StreamPb>,
    #[prost(message, repeated, tag = "2")]
    pub columns: Vec<ColumnEncodingPb>,
    #[prost(string, optional, tag = "3")]
    pub writer_timezone: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RowIndexEntryPb {
    #[prost(uint64, repeated, tag = "1")]
    pub positions: Vec<u64>,
    #[prost(message, optional, tag = "2")]
    pub statistics: Option<ColumnStatisticsPb>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RowIndexPb {
    #[prost(message, repeated, tag = "1")]
    pub entry: Vec<RowIndexEntryPb>,
}
