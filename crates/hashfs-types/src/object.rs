use crate::block::Block;
use crate::error::TypeError;
use crate::hash::{BlockHash, HashAlgorithm};

/// An object held in memory as its name, block size and ordered blocks.
///
/// Block order is physical order: block `i` covers bytes
/// `[block_size * i, block_size * (i + 1))`, except the last one which may
/// be shorter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    pub block_size: u64,
    pub blocks: Vec<Block>,
}

impl StoredObject {
    pub fn new(name: impl Into<String>, block_size: u64, blocks: Vec<Block>) -> Self {
        Self {
            name: name.into(),
            block_size,
            blocks,
        }
    }

    /// Split `data` into blocks of `block_size` bytes hashed with `algorithm`.
    pub fn from_bytes(
        name: impl Into<String>,
        block_size: u64,
        algorithm: HashAlgorithm,
        data: &[u8],
    ) -> Result<Self, TypeError> {
        if block_size == 0 {
            return Err(TypeError::InvalidLayout("block size must be positive".into()));
        }
        let chunk = usize::try_from(block_size)
            .map_err(|_| TypeError::InvalidLayout(format!("block size {block_size} too large")))?;
        let blocks = data
            .chunks(chunk)
            .map(|c| Block::from_data(algorithm, c.to_vec()))
            .collect();
        Ok(Self::new(name, block_size, blocks))
    }

    /// Sum of all block lengths.
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(Block::len).sum()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_hashes(&self) -> Vec<BlockHash> {
        self.blocks.iter().map(|b| b.hash().clone()).collect()
    }

    /// Concatenate every block payload.
    pub fn content(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size() as usize);
        for block in &self.blocks {
            out.extend_from_slice(block.data());
        }
        out
    }

    /// Check that all blocks but the last are exactly `block_size` bytes and
    /// the last holds between 1 and `block_size` bytes.
    pub fn check_layout(&self) -> Result<(), TypeError> {
        if self.block_size == 0 {
            return Err(TypeError::InvalidLayout("block size must be positive".into()));
        }
        let Some((last, full)) = self.blocks.split_last() else {
            return Ok(());
        };
        if let Some((i, b)) = full
            .iter()
            .enumerate()
            .find(|(_, b)| b.len() != self.block_size)
        {
            return Err(TypeError::InvalidLayout(format!(
                "block {} holds {} bytes, expected {}",
                i + 1,
                b.len(),
                self.block_size
            )));
        }
        if last.is_empty() || last.len() > self.block_size {
            return Err(TypeError::InvalidLayout(format!(
                "last block holds {} bytes, expected 1..={}",
                last.len(),
                self.block_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_splits_with_remainder() {
        let obj = StoredObject::from_bytes("a/b", 4, HashAlgorithm::Sha256, b"0123456789").unwrap();
        assert_eq!(obj.block_count(), 3);
        assert_eq!(obj.total_size(), 10);
        assert_eq!(obj.blocks[2].len(), 2);
        assert_eq!(obj.content(), b"0123456789");
        obj.check_layout().unwrap();
    }

    #[test]
    fn from_bytes_empty_has_no_blocks() {
        let obj = StoredObject::from_bytes("e", 4, HashAlgorithm::Sha256, b"").unwrap();
        assert_eq!(obj.block_count(), 0);
        assert_eq!(obj.total_size(), 0);
        obj.check_layout().unwrap();
    }

    #[test]
    fn zero_block_size_rejected() {
        assert!(StoredObject::from_bytes("z", 0, HashAlgorithm::Sha256, b"x").is_err());
    }

    #[test]
    fn layout_rejects_short_middle_block() {
        let algo = HashAlgorithm::Sha256;
        let obj = StoredObject::new(
            "bad",
            4,
            vec![
                Block::from_data(algo, &b"0123"[..]),
                Block::from_data(algo, &b"45"[..]),
                Block::from_data(algo, &b"6789"[..]),
            ],
        );
        assert!(matches!(obj.check_layout(), Err(TypeError::InvalidLayout(_))));
    }

    #[test]
    fn layout_rejects_oversized_last_block() {
        let algo = HashAlgorithm::Sha256;
        let obj = StoredObject::new("bad", 2, vec![Block::from_data(algo, &b"abc"[..])]);
        assert!(obj.check_layout().is_err());
    }
}
