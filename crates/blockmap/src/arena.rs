//! Bump-allocating layout builder over a caller-owned byte region.
//!
//! The hierarchy never allocates on its own: every header and bitmap is carved, in order,
//! from the region handed to init. Carving is bounds-checked against the region length, so a
//! region that is too small fails cleanly instead of being overrun.

use crate::AllocError;

/// Fills a freshly carved span with zeros before it is handed out.
#[inline]
pub(crate) fn zero_fill(bytes: &mut [u8]) {
    bytes.fill(0);
}

/// Hands out consecutive, non-overlapping spans of a byte region.
pub(crate) struct LayoutArena<'a> {
    remaining: &'a mut [u8],
    used: usize,
}

impl<'a> LayoutArena<'a> {
    /// Creates an arena that carves from the start of `region`.
    pub(crate) fn new(region: &'a mut [u8]) -> Self {
        Self {
            remaining: region,
            used: 0,
        }
    }

    /// Carves the next `size` bytes, zero-filled.
    ///
    /// Fails with [`AllocError::RegionTooSmall`] when fewer than `size` bytes remain; the arena
    /// is left unchanged in that case.
    pub(crate) fn take(&mut self, size: usize) -> Result<&'a mut [u8], AllocError> {
        if size > self.remaining.len() {
            return Err(AllocError::RegionTooSmall);
        }

        let region = core::mem::take(&mut self.remaining);
        let (span, rest) = region.split_at_mut(size);
        self.remaining = rest;
        self.used += size;

        zero_fill(span);
        Ok(span)
    }

    /// Consumes the arena, returning the bytes used and the untouched tail of the region.
    pub(crate) fn finish(self) -> (usize, &'a mut [u8]) {
        (self.used, self.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carves_in_order() {
        let mut region = [0xAAu8; 16];
        let mut arena = LayoutArena::new(&mut region);

        let first = arena.take(4).unwrap();
        assert_eq!(first, &[0, 0, 0, 0]);
        first[0] = 1;

        let second = arena.take(8).unwrap();
        assert_eq!(second.len(), 8);

        let (used, rest) = arena.finish();
        assert_eq!(used, 12);
        assert_eq!(rest, &[0xAA; 4]);
        assert_eq!(region[0], 1);
        assert_eq!(region[4..12], [0; 8]);
    }

    #[test]
    fn refuses_to_overrun() {
        let mut region = [0xAAu8; 8];
        let mut arena = LayoutArena::new(&mut region);

        arena.take(6).unwrap();
        assert_eq!(arena.take(3), Err(AllocError::RegionTooSmall));

        // The failed request leaves the remainder available.
        assert_eq!(arena.take(2).unwrap().len(), 2);
        let (used, rest) = arena.finish();
        assert_eq!(used, 8);
        assert!(rest.is_empty());
    }
}
