//! Word-addressed bit vectors stored in carved region bytes.

/// Number of bits in one bitmap word.
pub const WORD_BITS: usize = u32::BITS as usize;

/// Size of one bitmap word in bytes.
pub(crate) const WORD_BYTES: usize = core::mem::size_of::<u32>();

/// Reads the native-endian `u32` at word position `word` of `bytes`.
#[inline]
pub(crate) fn read_word(bytes: &[u8], word: usize) -> u32 {
    let at = word * WORD_BYTES;
    u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Writes `value` as a native-endian `u32` at word position `word` of `bytes`.
#[inline]
pub(crate) fn write_word(bytes: &mut [u8], word: usize, value: u32) {
    let at = word * WORD_BYTES;
    bytes[at..at + WORD_BYTES].copy_from_slice(&value.to_ne_bytes());
}

/// Outcome of a first-fit search for clear bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// A run of the requested length starts at this bit.
    Found(usize),
    /// Clear bits exist, but no run is long enough.
    NoRun,
    /// Every bit in range is set.
    Empty,
}

/// A bit vector over a byte span. Bit = 1 means unavailable, bit = 0 means free.
#[derive(Default)]
pub(crate) struct Bitmap<'a> {
    bytes: &'a mut [u8],
}

impl<'a> Bitmap<'a> {
    /// Number of bytes needed for `bit_count` bits, plus one word of margin.
    pub(crate) const fn bytes_for(bit_count: usize) -> usize {
        (bit_count / WORD_BITS + 1) * WORD_BYTES
    }

    /// Wraps a span and marks every bit in it as set.
    pub(crate) fn new_full(bytes: &'a mut [u8]) -> Self {
        let mut bitmap = Self { bytes };
        for word in 0..bitmap.word_count() {
            bitmap.set_word(word, u32::MAX);
        }
        bitmap
    }

    pub(crate) fn word_count(&self) -> usize {
        self.bytes.len() / WORD_BYTES
    }

    pub(crate) fn word(&self, word: usize) -> u32 {
        read_word(self.bytes, word)
    }

    fn set_word(&mut self, word: usize, value: u32) {
        write_word(self.bytes, word, value);
    }

    #[inline]
    fn locate(bit: usize) -> (usize, u32) {
        (bit / WORD_BITS, 1 << (bit % WORD_BITS))
    }

    pub(crate) fn test(&self, bit: usize) -> bool {
        let (word, mask) = Self::locate(bit);
        self.word(word) & mask != 0
    }

    pub(crate) fn set(&mut self, bit: usize) {
        let (word, mask) = Self::locate(bit);
        self.set_word(word, self.word(word) | mask);
    }

    pub(crate) fn clear(&mut self, bit: usize) {
        let (word, mask) = Self::locate(bit);
        self.set_word(word, self.word(word) & !mask);
    }

    /// Returns true if `bit` and its sibling (`bit ^ 1`) are both clear.
    ///
    /// Siblings always share a word, since a pair starts on an even bit.
    pub(crate) fn pair_clear(&self, bit: usize) -> bool {
        let (word, _) = Self::locate(bit);
        let pair = 0b11 << (bit % WORD_BITS & !1);
        self.word(word) & pair == 0
    }

    /// First-fit search for `len` consecutive clear bits among the first `limit` bits.
    pub(crate) fn find_clear_run(&self, limit: usize, len: usize) -> Scan {
        let mut any_clear = false;
        let mut run_start = 0;
        let mut run_len = 0;
        let mut bit = 0;

        while bit < limit {
            // Skip whole words that have nothing free.
            if bit % WORD_BITS == 0 && self.word(bit / WORD_BITS) == u32::MAX {
                run_len = 0;
                bit += WORD_BITS;
                continue;
            }

            if self.test(bit) {
                run_len = 0;
            } else {
                any_clear = true;
                if run_len == 0 {
                    run_start = bit;
                }
                run_len += 1;
                if run_len == len {
                    return Scan::Found(run_start);
                }
            }
            bit += 1;
        }

        if any_clear { Scan::NoRun } else { Scan::Empty }
    }

    pub(crate) fn words(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.word_count()).map(|word| self.word(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_include_margin_word() {
        assert_eq!(Bitmap::bytes_for(0), 4);
        assert_eq!(Bitmap::bytes_for(31), 4);
        assert_eq!(Bitmap::bytes_for(32), 8);
        assert_eq!(Bitmap::bytes_for(2048), 65 * 4);
    }

    #[test]
    fn starts_full() {
        let mut bytes = [0u8; 8];
        let bitmap = Bitmap::new_full(&mut bytes);
        assert_eq!(bitmap.word_count(), 2);
        assert!(bitmap.words().all(|word| word == u32::MAX));
        assert_eq!(bitmap.find_clear_run(64, 1), Scan::Empty);
    }

    #[test]
    fn set_and_clear_bits() {
        let mut bytes = [0u8; 8];
        let mut bitmap = Bitmap::new_full(&mut bytes);

        bitmap.clear(33);
        assert!(!bitmap.test(33));
        assert!(bitmap.test(32));
        assert_eq!(bitmap.word(1), !(1 << 1));

        bitmap.set(33);
        assert_eq!(bitmap.word(1), u32::MAX);
    }

    #[test]
    fn pair_clear_checks_sibling() {
        let mut bytes = [0u8; 4];
        let mut bitmap = Bitmap::new_full(&mut bytes);

        bitmap.clear(6);
        assert!(!bitmap.pair_clear(6));
        assert!(!bitmap.pair_clear(7));
        bitmap.clear(7);
        assert!(bitmap.pair_clear(6));
        assert!(bitmap.pair_clear(7));
        assert!(!bitmap.pair_clear(8));
    }

    #[test]
    fn finds_first_fit_runs() {
        let mut bytes = [0u8; 12];
        let mut bitmap = Bitmap::new_full(&mut bytes);

        bitmap.clear(3);
        for bit in 40..44 {
            bitmap.clear(bit);
        }
        bitmap.clear(70);

        assert_eq!(bitmap.find_clear_run(96, 1), Scan::Found(3));
        assert_eq!(bitmap.find_clear_run(96, 2), Scan::Found(40));
        assert_eq!(bitmap.find_clear_run(96, 4), Scan::Found(40));
        assert_eq!(bitmap.find_clear_run(96, 5), Scan::NoRun);
        assert_eq!(bitmap.find_clear_run(3, 1), Scan::Empty);
    }

    #[test]
    fn runs_cross_word_boundaries() {
        let mut bytes = [0u8; 8];
        let mut bitmap = Bitmap::new_full(&mut bytes);

        for bit in 30..34 {
            bitmap.clear(bit);
        }
        assert_eq!(bitmap.find_clear_run(64, 4), Scan::Found(30));
    }
}
