//! Block index newtype.
//!
//! Allocations hand out positions in the flat base-block index space. Wrapping them keeps
//! block positions from being mixed up with counts or byte sizes at call sites.

use core::{
    fmt,
    ops::{Add, Sub},
};

/// A position in the base-block index space, i.e. a bit index at the finest level.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct BlockIndex(usize);

impl BlockIndex {
    /// Creates a new block index.
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw block index.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns the index of the block `count` blocks past this one, or `None` on overflow.
    #[inline]
    pub const fn checked_add(self, count: usize) -> Option<Self> {
        match self.0.checked_add(count) {
            Some(index) => Some(Self(index)),
            None => None,
        }
    }
}

impl fmt::Debug for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockIndex({})", self.0)
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for BlockIndex {
    #[inline]
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl From<BlockIndex> for usize {
    #[inline]
    fn from(index: BlockIndex) -> Self {
        index.0
    }
}

impl Add<usize> for BlockIndex {
    type Output = Self;

    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<usize> for BlockIndex {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: usize) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Sub<BlockIndex> for BlockIndex {
    type Output = usize;

    #[inline]
    fn sub(self, rhs: BlockIndex) -> Self::Output {
        self.0 - rhs.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let start = BlockIndex::new(10);
        assert_eq!((start + 6).as_usize(), 16);
        assert_eq!((start - 4).as_usize(), 6);
        assert_eq!(BlockIndex::new(16) - start, 6);
    }

    #[test]
    fn checked_add_detects_overflow() {
        assert_eq!(BlockIndex::new(1).checked_add(2), Some(BlockIndex::new(3)));
        assert_eq!(BlockIndex::new(usize::MAX).checked_add(1), None);
    }

    #[test]
    fn formats() {
        assert_eq!(format!("{}", BlockIndex::new(42)), "42");
        assert_eq!(format!("{:?}", BlockIndex::new(42)), "BlockIndex(42)");
    }
}
