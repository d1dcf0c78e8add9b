use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive byte span `[start, end]` of an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Callers guarantee `start <= end`.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered.
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are inclusive, so they are never empty.
    pub const fn is_empty(&self) -> bool {
        false
    }

    pub const fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset <= self.end
    }

    /// Returns `true` when the span runs to the last byte of the object.
    pub const fn reaches_end(&self, total_size: u64) -> bool {
        total_size > 0 && self.end == total_size - 1
    }

    /// HTTP `Range` header value for this span.
    ///
    /// A span ending on the object's final byte is sent open-ended
    /// (`bytes=<start>-`); every other span is closed (`bytes=<start>-<end>`).
    pub fn header_value(&self, total_size: u64) -> String {
        if self.reaches_end(total_size) {
            format!("bytes={}-", self.start)
        } else {
            format!("bytes={}-{}", self.start, self.end)
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_is_inclusive() {
        assert_eq!(ByteRange::new(0, 0).len(), 1);
        assert_eq!(ByteRange::new(4, 7).len(), 4);
    }

    #[test]
    fn contains_both_ends() {
        let r = ByteRange::new(4, 7);
        assert!(r.contains(4));
        assert!(r.contains(7));
        assert!(!r.contains(3));
        assert!(!r.contains(8));
    }

    #[test]
    fn header_closed_in_middle() {
        assert_eq!(ByteRange::new(4, 7).header_value(10), "bytes=4-7");
    }

    #[test]
    fn header_open_for_final_span() {
        assert_eq!(ByteRange::new(8, 9).header_value(10), "bytes=8-");
        assert_eq!(ByteRange::new(0, 9).header_value(10), "bytes=0-");
    }
}
