//! Bulk transfer wire format for hashfs objects.
//!
//! An object travels as one flat payload instead of block-by-block range
//! requests. Integers are big-endian; names and hashes are raw UTF-8 with no
//! length prefix.
//!
//! ```text
//! [name bytes]
//! [4 bytes: block count (u32)]
//! [8 bytes: total size (u64)]
//! repeated per block, in physical order:
//!   [hash bytes]
//!   [8 bytes: block length (u64)]
//!   [block payload]
//! ```
//!
//! An object with no blocks encodes to an empty payload. Decoding is an
//! explicit field-by-field parse; nothing is reconstructed reflectively.

pub mod codec;
pub mod error;

pub use codec::ObjectCodec;
pub use error::{CodecError, CodecResult};
