//! A single granularity tier of the hierarchy.
//!
//! Each level owns two spans of the caller's region: a fixed-size header holding its
//! geometry and free hint, and the bitmap itself. The header lives in the region so that the
//! bytes reported as consumed by init cover all of the allocator's state.

use crate::bitmap::{Bitmap, Scan, read_word, write_word};

/// Size in bytes of one level header inside the region.
pub const LEVEL_HEADER_SIZE: usize = 16;

// Header field positions, in words.
const GRANULARITY: usize = 0;
const BIT_COUNT: usize = 1;
const FREE_HINT: usize = 2;
const WORD_COUNT: usize = 3;

/// Read-only snapshot of one level, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    /// Position in the hierarchy; 0 is the coarsest level.
    pub index: usize,
    /// Number of base blocks one bit at this level stands for.
    pub granularity: usize,
    /// Number of bits tracked at this level.
    pub bit_count: usize,
    /// Approximate count of clear bits. Not ground truth.
    pub free_hint: u32,
}

#[derive(Default)]
pub(crate) struct Level<'a> {
    header: &'a mut [u8],
    bits: Bitmap<'a>,
}

impl<'a> Level<'a> {
    /// Lays out a level over its header and bitmap spans, with every bit set and a zero hint.
    ///
    /// `granularity` and `bit_count` must fit in a `u32`; the hierarchy's block ceiling
    /// guarantees this.
    pub(crate) fn new(
        header: &'a mut [u8],
        bits: &'a mut [u8],
        granularity: usize,
        bit_count: usize,
    ) -> Self {
        debug_assert_eq!(header.len(), LEVEL_HEADER_SIZE);

        let bits = Bitmap::new_full(bits);
        write_word(header, GRANULARITY, granularity as u32);
        write_word(header, BIT_COUNT, bit_count as u32);
        write_word(header, FREE_HINT, 0);
        write_word(header, WORD_COUNT, bits.word_count() as u32);

        Self { header, bits }
    }

    pub(crate) fn granularity(&self) -> usize {
        read_word(self.header, GRANULARITY) as usize
    }

    pub(crate) fn bit_count(&self) -> usize {
        read_word(self.header, BIT_COUNT) as usize
    }

    pub(crate) fn free_hint(&self) -> u32 {
        read_word(self.header, FREE_HINT)
    }

    pub(crate) fn set_free_hint(&mut self, hint: u32) {
        write_word(self.header, FREE_HINT, hint);
    }

    pub(crate) fn is_set(&self, bit: usize) -> bool {
        self.bits.test(bit)
    }

    /// Marks `bit` unavailable and counts one fewer free bit.
    pub(crate) fn set(&mut self, bit: usize) {
        self.bits.set(bit);
        let hint = self.free_hint().saturating_sub(1);
        self.set_free_hint(hint);
    }

    /// Marks `bit` free and counts one more free bit.
    pub(crate) fn clear(&mut self, bit: usize) {
        self.bits.clear(bit);
        let hint = self.free_hint().saturating_add(1);
        self.set_free_hint(hint);
    }

    pub(crate) fn pair_clear(&self, bit: usize) -> bool {
        self.bits.pair_clear(bit)
    }

    /// First-fit search for `len` consecutive clear bits.
    pub(crate) fn find_clear_run(&self, len: usize) -> Scan {
        self.bits.find_clear_run(self.bit_count(), len)
    }

    pub(crate) fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.words()
    }

    pub(crate) fn info(&self, index: usize) -> LevelInfo {
        LevelInfo {
            index,
            granularity: self.granularity(),
            bit_count: self.bit_count(),
            free_hint: self.free_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lives_in_region() {
        let mut header = [0u8; LEVEL_HEADER_SIZE];
        let mut bits = [0u8; 8];
        {
            let mut level = Level::new(&mut header, &mut bits, 4, 40);
            assert_eq!(level.granularity(), 4);
            assert_eq!(level.bit_count(), 40);
            assert_eq!(level.free_hint(), 0);

            level.clear(5);
            level.clear(6);
            level.set(6);
            assert_eq!(level.free_hint(), 1);
        }

        assert_eq!(read_word(&header, GRANULARITY), 4);
        assert_eq!(read_word(&header, BIT_COUNT), 40);
        assert_eq!(read_word(&header, FREE_HINT), 1);
        assert_eq!(read_word(&header, WORD_COUNT), 2);
        assert_eq!(read_word(&bits, 0), !(1 << 5));
    }

    #[test]
    fn hint_is_a_counter_not_a_census() {
        let mut header = [0u8; LEVEL_HEADER_SIZE];
        let mut bits = [0u8; 4];
        let mut level = Level::new(&mut header, &mut bits, 1, 16);

        // Clearing an already clear bit still counts.
        level.clear(3);
        level.clear(3);
        assert_eq!(level.free_hint(), 2);
        assert_eq!(level.words().next(), Some(!(1 << 3)));
    }

    #[test]
    fn scan_is_limited_to_bit_count() {
        let mut header = [0u8; LEVEL_HEADER_SIZE];
        let mut bits = [0u8; 4];
        let mut level = Level::new(&mut header, &mut bits, 1, 8);

        // Bits past bit_count belong to the margin and are never handed out.
        level.clear(12);
        assert_eq!(level.find_clear_run(1), Scan::Empty);
        level.clear(2);
        assert_eq!(level.find_clear_run(1), Scan::Found(2));
    }
}
