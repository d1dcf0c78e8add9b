use hashfs_types::BlockHash;

/// Ordered block hashes of one object, as the backend reported them.
///
/// Position in the list is physical block order. Built once from a metadata
/// response and never modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHashIndex {
    hashes: Vec<BlockHash>,
}

impl BlockHashIndex {
    pub fn new(hashes: Vec<BlockHash>) -> Self {
        Self { hashes }
    }

    /// 1-based position of the first block with `hash`.
    ///
    /// Identical blocks share a hash, so a repeated hash always resolves to
    /// its first occurrence.
    pub fn locate(&self, hash: &BlockHash) -> Option<u64> {
        self.hashes
            .iter()
            .position(|h| h == hash)
            .map(|i| i as u64 + 1)
    }

    pub fn count(&self) -> u64 {
        self.hashes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Hash at 1-based `index`.
    pub fn get(&self, index: u64) -> Option<&BlockHash> {
        let i = usize::try_from(index.checked_sub(1)?).ok()?;
        self.hashes.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockHash> {
        self.hashes.iter()
    }

    pub fn as_slice(&self) -> &[BlockHash] {
        &self.hashes
    }
}

impl From<Vec<BlockHash>> for BlockHashIndex {
    fn from(hashes: Vec<BlockHash>) -> Self {
        Self::new(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> BlockHash {
        BlockHash::parse(s).unwrap()
    }

    #[test]
    fn locate_is_one_based() {
        let index = BlockHashIndex::new(vec![h("aa"), h("bb"), h("cc")]);
        assert_eq!(index.locate(&h("aa")), Some(1));
        assert_eq!(index.locate(&h("cc")), Some(3));
        assert_eq!(index.count(), 3);
    }

    #[test]
    fn locate_first_match() {
        let index = BlockHashIndex::new(vec![h("00"), h("11"), h("00")]);
        assert_eq!(index.locate(&h("00")), Some(1));
    }

    #[test]
    fn locate_missing() {
        let index = BlockHashIndex::new(vec![h("aa")]);
        assert_eq!(index.locate(&h("ff")), None);
    }

    #[test]
    fn get_by_position() {
        let index = BlockHashIndex::new(vec![h("aa"), h("bb")]);
        assert_eq!(index.get(2), Some(&h("bb")));
        assert_eq!(index.get(0), None);
        assert_eq!(index.get(3), None);
    }
}
