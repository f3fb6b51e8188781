//! The protobuf messages of the ORC file tail and stripe metadata. The wire
//! schema is prost-derived; the types exported here check enum values and
//! fill in defaults on the way in.

mod messages;
mod pb;

pub use messages::*;

use crate::error::Result;

pub trait Message: Sized {
    type Proto: prost::Message + Default;

    fn from_proto(proto: Self::Proto) -> Result<Self>;

    fn to_proto(&self) -> Self::Proto;

    fn decode(data: &[u8]) -> Result<Self> {
        let proto = <Self::Proto as prost::Message>::decode(data)?;
        Self::from_proto(proto)
    }

    fn encode(&self) -> Vec<u8> {
        prost::Message::encode_to_vec(&self.to_proto())
    }
}
