//! Integer run-length encoding, version 2.
//!
//! Each run starts with a header byte whose top two bits select one of four
//! sub-encodings:
//!
//! ```text
//! 00 SHORT_REPEAT  3..=10 copies of one value stored in 1..=8 bytes
//! 01 DIRECT        up to 512 values bit-packed at a fixed width
//! 10 PATCHED_BASE  base + narrow bit-packed values + a list of high-bit patches
//! 11 DELTA         first value, delta base, bit-packed delta magnitudes
//! ```

mod decoder;
mod encoder;

pub use decoder::RleV2Decoder;
pub use encoder::RleV2Encoder;

pub(crate) const MAX_SCOPE: usize = 512;
pub(crate) const MIN_REPEAT: usize = 3;
pub(crate) const MAX_SHORT_REPEAT: usize = 10;

const SHORT_REPEAT: u8 = 0;
const DIRECT: u8 = 1;
const PATCHED_BASE: u8 = 2;
const DELTA: u8 = 3;
