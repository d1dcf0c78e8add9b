use bytes::Bytes;

use crate::hash::{BlockHash, HashAlgorithm};

/// One block of an object: its hash and payload.
///
/// Blocks are immutable values. `len()` always equals the payload length,
/// since the length is derived from the bytes instead of stored beside them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    hash: BlockHash,
    data: Bytes,
}

impl Block {
    /// Wrap bytes fetched for `hash`. The hash is taken on trust.
    pub fn new(hash: BlockHash, data: impl Into<Bytes>) -> Self {
        Self {
            hash,
            data: data.into(),
        }
    }

    /// Build a block by hashing `data` with `algorithm`.
    pub fn from_data(algorithm: HashAlgorithm, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let hash = algorithm.digest(&data);
        Self { hash, data }
    }

    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Recompute the digest and compare it with the block's hash.
    pub fn verify(&self, algorithm: HashAlgorithm) -> bool {
        algorithm.digest(&self.data) == self.hash
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_data_hashes_payload() {
        let block = Block::from_data(HashAlgorithm::Sha256, &b"hello"[..]);
        assert_eq!(block.len(), 5);
        assert_eq!(block.hash(), &HashAlgorithm::Sha256.digest(b"hello"));
        assert!(block.verify(HashAlgorithm::Sha256));
    }

    #[test]
    fn verify_detects_wrong_hash() {
        let wrong = HashAlgorithm::Sha256.digest(b"other");
        let block = Block::new(wrong, &b"hello"[..]);
        assert!(!block.verify(HashAlgorithm::Sha256));
    }

    #[test]
    fn clones_share_payload() {
        let block = Block::from_data(HashAlgorithm::Blake3, vec![7u8; 1024]);
        let copy = block.clone();
        assert_eq!(block.data().as_ptr(), copy.data().as_ptr());
    }
}
