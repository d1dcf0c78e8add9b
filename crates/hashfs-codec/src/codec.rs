use std::io::Read;

use bytes::Bytes;
use hashfs_types::{Block, BlockHash, HashAlgorithm, StoredObject};

use crate::error::{CodecError, CodecResult};

/// Width of the block count field.
const COUNT_WIDTH: usize = 4;
/// Width of the total size and block length fields.
const LEN_WIDTH: usize = 8;

/// Encoder/decoder for the bulk object wire format.
///
/// The layout carries no length prefix for the object name or the block
/// hashes, so the codec is parameterised by the hash width in bytes. The
/// name boundary is recovered on decode from the fixed-width fields that
/// follow it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectCodec {
    hash_len: usize,
}

impl ObjectCodec {
    /// Codec for hashes that are exactly `hash_len` bytes on the wire.
    pub const fn new(hash_len: usize) -> Self {
        Self { hash_len }
    }

    /// Codec for hex digests produced by `algorithm`.
    pub const fn for_algorithm(algorithm: HashAlgorithm) -> Self {
        Self::new(algorithm.hex_len())
    }

    pub const fn hash_len(&self) -> usize {
        self.hash_len
    }

    /// Encode `object`. An object without blocks encodes to an empty payload.
    pub fn serialize(&self, object: &StoredObject) -> CodecResult<Vec<u8>> {
        if object.blocks.is_empty() {
            return Ok(Vec::new());
        }
        let count = u32::try_from(object.blocks.len())
            .map_err(|_| CodecError::TooManyBlocks(object.blocks.len()))?;
        let total_size = object.total_size();

        let mut buf = Vec::with_capacity(
            object.name.len()
                + COUNT_WIDTH
                + LEN_WIDTH
                + object.blocks.len() * (self.hash_len + LEN_WIDTH)
                + total_size as usize,
        );
        buf.extend_from_slice(object.name.as_bytes());
        buf.extend_from_slice(&count.to_be_bytes());
        buf.extend_from_slice(&total_size.to_be_bytes());

        for (index, block) in object.blocks.iter().enumerate() {
            let hash = block.hash().as_bytes();
            if hash.len() != self.hash_len {
                return Err(CodecError::HashLength {
                    index,
                    expected: self.hash_len,
                    actual: hash.len(),
                });
            }
            buf.extend_from_slice(hash);
            buf.extend_from_slice(&block.len().to_be_bytes());
            buf.extend_from_slice(block.data());
        }

        tracing::debug!(
            name = %object.name,
            blocks = count,
            total_size,
            payload = buf.len(),
            "encoded object"
        );
        Ok(buf)
    }

    /// Decode a payload. `None` input, or an empty payload, yields `Ok(None)`.
    pub fn deserialize(&self, input: Option<&[u8]>) -> CodecResult<Option<StoredObject>> {
        let Some(data) = input else {
            return Ok(None);
        };
        if data.is_empty() {
            return Ok(None);
        }
        let fixed = COUNT_WIDTH + LEN_WIDTH;
        if data.len() < fixed {
            return Err(CodecError::Corrupt {
                offset: 0,
                reason: format!("payload of {} bytes is shorter than the header", data.len()),
            });
        }

        // The tail after the name must hold exactly `count` block headers
        // plus `total_size` payload bytes, which pins the name length.
        for name_len in 0..=data.len() - fixed {
            if self.tail_fits(data, name_len) {
                if let Ok(object) = self.decode_at(data, name_len) {
                    return Ok(Some(object));
                }
            }
        }
        Err(CodecError::NoLayout)
    }

    /// Decode a payload whose object name is already known to the caller.
    pub fn deserialize_named(&self, name: &str, data: &[u8]) -> CodecResult<Option<StoredObject>> {
        if data.is_empty() {
            return Ok(None);
        }
        if !data.starts_with(name.as_bytes()) {
            return Err(CodecError::Corrupt {
                offset: 0,
                reason: format!("payload does not start with name {name:?}"),
            });
        }
        if !self.tail_fits(data, name.len()) {
            return Err(CodecError::NoLayout);
        }
        self.decode_at(data, name.len()).map(Some)
    }

    /// Read a whole stream and decode it.
    pub fn deserialize_reader<R: Read>(&self, input: Option<R>) -> CodecResult<Option<StoredObject>> {
        let Some(mut reader) = input else {
            return Ok(None);
        };
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.deserialize(Some(&data))
    }

    fn tail_fits(&self, data: &[u8], name_len: usize) -> bool {
        let mut cursor = Cursor::new(data, name_len);
        let (Ok(count), Ok(total_size)) = (cursor.read_u32(), cursor.read_u64()) else {
            return false;
        };
        let expected = (count as u64)
            .checked_mul((self.hash_len + LEN_WIDTH) as u64)
            .and_then(|headers| headers.checked_add(total_size));
        expected == Some(cursor.remaining() as u64)
    }

    fn decode_at(&self, data: &[u8], name_len: usize) -> CodecResult<StoredObject> {
        let name = std::str::from_utf8(&data[..name_len]).map_err(|_| CodecError::InvalidName)?;
        let mut cursor = Cursor::new(data, name_len);
        let count = cursor.read_u32()?;
        let total_size = cursor.read_u64()?;

        // Each block needs at least a hash and a length field.
        let max_blocks = cursor.remaining() / (self.hash_len + LEN_WIDTH);
        let mut blocks = Vec::with_capacity((count as usize).min(max_blocks));
        let mut seen: u64 = 0;
        for _ in 0..count {
            let offset = cursor.pos;
            let hash_bytes = cursor.take(self.hash_len)?;
            let hash = std::str::from_utf8(hash_bytes)
                .ok()
                .and_then(|s| BlockHash::parse(s).ok())
                .ok_or_else(|| CodecError::Corrupt {
                    offset,
                    reason: "block hash is not hex text".into(),
                })?;
            let len = cursor.read_u64()?;
            let payload_len = usize::try_from(len).map_err(|_| CodecError::Corrupt {
                offset: cursor.pos,
                reason: format!("block length {len} does not fit in memory"),
            })?;
            let payload = cursor.take(payload_len)?;
            seen += len;
            blocks.push(Block::new(hash, Bytes::copy_from_slice(payload)));
        }

        if seen != total_size {
            return Err(CodecError::Corrupt {
                offset: cursor.pos,
                reason: format!("blocks hold {seen} bytes, header says {total_size}"),
            });
        }
        if cursor.remaining() != 0 {
            return Err(CodecError::Corrupt {
                offset: cursor.pos,
                reason: format!("{} trailing bytes", cursor.remaining()),
            });
        }

        // The wire format does not carry the block size; every block but the
        // last is full, so the first block's length is the block size.
        let block_size = blocks.first().map(Block::len).unwrap_or(0);
        Ok(StoredObject::new(name, block_size, blocks))
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::Corrupt {
                offset: self.pos,
                reason: format!("need {n} bytes, have {}", self.remaining()),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> CodecResult<u32> {
        let mut raw = [0u8; COUNT_WIDTH];
        raw.copy_from_slice(self.take(COUNT_WIDTH)?);
        Ok(u32::from_be_bytes(raw))
    }

    fn read_u64(&mut self) -> CodecResult<u64> {
        let mut raw = [0u8; LEN_WIDTH];
        raw.copy_from_slice(self.take(LEN_WIDTH)?);
        Ok(u64::from_be_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALGO: HashAlgorithm = HashAlgorithm::Sha256;

    fn codec() -> ObjectCodec {
        ObjectCodec::for_algorithm(ALGO)
    }

    fn object(name: &str, data: &[u8], block_size: u64) -> StoredObject {
        StoredObject::from_bytes(name, block_size, ALGO, data).unwrap()
    }

    #[test]
    fn field_order_and_widths() {
        let obj = object("ab", b"xyz", 4);
        let bytes = codec().serialize(&obj).unwrap();

        assert_eq!(&bytes[0..2], b"ab");
        assert_eq!(&bytes[2..6], &1u32.to_be_bytes());
        assert_eq!(&bytes[6..14], &3u64.to_be_bytes());
        let hash = ALGO.digest(b"xyz");
        assert_eq!(&bytes[14..78], hash.as_bytes());
        assert_eq!(&bytes[78..86], &3u64.to_be_bytes());
        assert_eq!(&bytes[86..], b"xyz");
    }

    #[test]
    fn zero_blocks_encode_to_nothing() {
        let obj = StoredObject::new("empty", 4, vec![]);
        assert!(codec().serialize(&obj).unwrap().is_empty());
    }

    #[test]
    fn absent_and_empty_input_decode_to_none() {
        assert!(codec().deserialize(None).unwrap().is_none());
        assert!(codec().deserialize(Some(&[])).unwrap().is_none());
        assert!(codec().deserialize_reader::<&[u8]>(None).unwrap().is_none());
    }

    #[test]
    fn decode_recovers_name_and_blocks() {
        let obj = object("dir/part-00000", b"0123456789", 4);
        let bytes = codec().serialize(&obj).unwrap();
        let decoded = codec().deserialize(Some(&bytes)).unwrap().unwrap();
        assert_eq!(decoded, obj);
        assert_eq!(decoded.block_size, 4);
    }

    #[test]
    fn decode_named_skips_boundary_search() {
        let obj = object("n", b"abcdefgh", 3);
        let bytes = codec().serialize(&obj).unwrap();
        let decoded = codec().deserialize_named("n", &bytes).unwrap().unwrap();
        assert_eq!(decoded.content(), b"abcdefgh");
        assert!(codec().deserialize_named("other", &bytes).is_err());
    }

    #[test]
    fn decode_named_rejects_inflated_block_count() {
        let mut payload = vec![b'n'];
        payload.extend_from_slice(&u32::MAX.to_be_bytes());
        payload.extend_from_slice(&0u64.to_be_bytes());
        let err = codec().deserialize_named("n", &payload).unwrap_err();
        assert!(matches!(err, CodecError::NoLayout));
    }

    #[test]
    fn decode_from_reader() {
        let obj = object("r", b"stream me", 4);
        let bytes = codec().serialize(&obj).unwrap();
        let decoded = codec().deserialize_reader(Some(bytes.as_slice())).unwrap().unwrap();
        assert_eq!(decoded, obj);
    }

    #[test]
    fn wrong_hash_width_rejected_on_encode() {
        let obj = StoredObject::new("x", 4, vec![Block::new(BlockHash::parse("abcd").unwrap(), &b"1"[..])]);
        let err = codec().serialize(&obj).unwrap_err();
        assert!(matches!(err, CodecError::HashLength { index: 0, expected: 64, actual: 4 }));
    }

    #[test]
    fn truncated_payload_fails() {
        let obj = object("t", b"0123456789", 4);
        let bytes = codec().serialize(&obj).unwrap();
        let err = codec().deserialize(Some(&bytes[..bytes.len() - 1])).unwrap_err();
        assert!(matches!(err, CodecError::NoLayout));
    }

    #[test]
    fn short_header_fails() {
        let err = codec().deserialize(Some(&[1, 2, 3])).unwrap_err();
        assert!(matches!(err, CodecError::Corrupt { offset: 0, .. }));
    }

    #[test]
    fn custom_hash_width() {
        let small = ObjectCodec::new(4);
        let obj = StoredObject::new(
            "s",
            2,
            vec![
                Block::new(BlockHash::parse("00aa").unwrap(), &b"hi"[..]),
                Block::new(BlockHash::parse("00bb").unwrap(), &b"!"[..]),
            ],
        );
        let bytes = small.serialize(&obj).unwrap();
        assert_eq!(bytes.len(), 1 + 4 + 8 + 2 * (4 + 8) + 3);
        assert_eq!(small.deserialize(Some(&bytes)).unwrap().unwrap(), obj);
    }
}
