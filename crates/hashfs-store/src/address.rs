//! Block addressing: which bytes of an object a block covers.
//!
//! A wrong range here does not fail loudly. The backend happily serves the
//! neighbouring block's bytes, so every branch is checked integer arithmetic
//! and inconsistent inputs are rejected instead of clamped.

use hashfs_types::ByteRange;

use crate::error::{StoreError, StoreResult};

/// Inclusive byte range of block `block_index` (1-based) in an object of
/// `total_size` bytes split into `block_count` blocks of `block_size`.
///
/// - a single-block object always spans `[0, total_size - 1]`, whatever
///   `block_size` says;
/// - the first of several blocks spans `[0, block_size - 1]`;
/// - the last block holds the remainder `total_size - block_size * (block_count - 1)`;
/// - every other block spans `[block_size * (i - 1), block_size * i - 1]`.
pub fn block_range(
    total_size: u64,
    block_size: u64,
    block_count: u64,
    block_index: u64,
) -> StoreResult<ByteRange> {
    if block_size == 0 {
        return Err(StoreError::InvalidRange("block size must be positive".into()));
    }
    if block_count == 0 || block_index == 0 || block_index > block_count {
        return Err(StoreError::InvalidRange(format!(
            "block index {block_index} outside 1..={block_count}"
        )));
    }
    if total_size == 0 {
        return Err(StoreError::InvalidRange(
            "an empty object has no addressable bytes".into(),
        ));
    }

    let range = if block_count == 1 {
        ByteRange::new(0, total_size - 1)
    } else {
        let last_len = last_block_len(total_size, block_size, block_count)?;
        if block_index == 1 {
            ByteRange::new(0, block_size - 1)
        } else if block_index == block_count {
            ByteRange::new(total_size - last_len, total_size - 1)
        } else {
            let start = block_size * (block_index - 1);
            ByteRange::new(start, start + block_size - 1)
        }
    };

    tracing::trace!(total_size, block_size, block_count, block_index, %range, "block range");
    Ok(range)
}

/// Size of the final block, checked to lie in `(0, block_size]`.
fn last_block_len(total_size: u64, block_size: u64, block_count: u64) -> StoreResult<u64> {
    let full = block_size
        .checked_mul(block_count - 1)
        .ok_or_else(|| StoreError::InvalidRange("block layout overflows u64".into()))?;
    match total_size.checked_sub(full) {
        Some(last) if last > 0 && last <= block_size => Ok(last),
        _ => Err(StoreError::InvalidRange(format!(
            "{total_size} bytes cannot form {block_count} blocks of {block_size}"
        ))),
    }
}

/// Number of blocks needed for `total_size` bytes.
pub fn block_count_for(total_size: u64, block_size: u64) -> StoreResult<u64> {
    if block_size == 0 {
        return Err(StoreError::InvalidRange("block size must be positive".into()));
    }
    Ok(total_size.div_ceil(block_size))
}

/// 1-based index of the block holding byte `offset`.
pub fn block_index_of(offset: u64, total_size: u64, block_size: u64) -> StoreResult<u64> {
    if block_size == 0 {
        return Err(StoreError::InvalidRange("block size must be positive".into()));
    }
    if offset >= total_size {
        return Err(StoreError::InvalidRange(format!(
            "offset {offset} beyond object of {total_size} bytes"
        )));
    }
    Ok(offset / block_size + 1)
}

/// Iterate the ranges of every block in order.
pub fn block_ranges(
    total_size: u64,
    block_size: u64,
) -> StoreResult<impl Iterator<Item = StoreResult<ByteRange>>> {
    let count = block_count_for(total_size, block_size)?;
    Ok((1..=count).map(move |i| block_range(total_size, block_size, count, i)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Fixed vectors
    // -----------------------------------------------------------------------

    #[test]
    fn remainder_last_block() {
        assert_eq!(block_range(10, 4, 3, 3).unwrap(), ByteRange::new(8, 9));
    }

    #[test]
    fn exact_multiple_blocks() {
        assert_eq!(block_range(12, 4, 3, 1).unwrap(), ByteRange::new(0, 3));
        assert_eq!(block_range(12, 4, 3, 2).unwrap(), ByteRange::new(4, 7));
        assert_eq!(block_range(12, 4, 3, 3).unwrap(), ByteRange::new(8, 11));
    }

    #[test]
    fn single_block_ignores_block_size() {
        assert_eq!(block_range(10, 4, 1, 1).unwrap(), ByteRange::new(0, 9));
        assert_eq!(block_range(3, 4_194_304, 1, 1).unwrap(), ByteRange::new(0, 2));
    }

    #[test]
    fn one_byte_last_block() {
        assert_eq!(block_range(9, 4, 3, 3).unwrap(), ByteRange::new(8, 8));
    }

    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------

    #[test]
    fn zero_block_size_rejected() {
        assert!(matches!(block_range(10, 0, 3, 1), Err(StoreError::InvalidRange(_))));
    }

    #[test]
    fn index_out_of_bounds_rejected() {
        assert!(block_range(10, 4, 3, 0).is_err());
        assert!(block_range(10, 4, 3, 4).is_err());
        assert!(block_range(10, 4, 0, 1).is_err());
    }

    #[test]
    fn empty_object_rejected() {
        assert!(block_range(0, 4, 1, 1).is_err());
    }

    #[test]
    fn inconsistent_layout_rejected() {
        // 8 bytes cannot be three blocks of four.
        assert!(block_range(8, 4, 3, 2).is_err());
        // 13 bytes overflow three blocks of four.
        assert!(block_range(13, 4, 3, 1).is_err());
    }

    #[test]
    fn overflow_rejected() {
        assert!(block_range(u64::MAX, u64::MAX, 3, 2).is_err());
    }

    #[test]
    fn index_of_offset() {
        assert_eq!(block_index_of(0, 10, 4).unwrap(), 1);
        assert_eq!(block_index_of(3, 10, 4).unwrap(), 1);
        assert_eq!(block_index_of(4, 10, 4).unwrap(), 2);
        assert_eq!(block_index_of(9, 10, 4).unwrap(), 3);
        assert!(block_index_of(10, 10, 4).is_err());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn ranges_tile_the_object(total_size in 1u64..100_000, block_size in 1u64..5_000) {
            let ranges: Vec<ByteRange> = block_ranges(total_size, block_size)
                .unwrap()
                .collect::<StoreResult<_>>()
                .unwrap();

            prop_assert_eq!(ranges.first().unwrap().start, 0);
            prop_assert_eq!(ranges.last().unwrap().end, total_size - 1);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end + 1, pair[1].start);
            }
            let covered: u64 = ranges.iter().map(ByteRange::len).sum();
            prop_assert_eq!(covered, total_size);
            for r in &ranges {
                prop_assert!(r.len() <= block_size || ranges.len() == 1);
            }
        }

        #[test]
        fn offset_lands_in_its_block(total_size in 1u64..100_000, block_size in 1u64..5_000, pick in any::<u64>()) {
            let offset = pick % total_size;
            let count = block_count_for(total_size, block_size).unwrap();
            let index = block_index_of(offset, total_size, block_size).unwrap();
            let range = block_range(total_size, block_size, count, index).unwrap();
            prop_assert!(range.contains(offset));
        }
    }
}
