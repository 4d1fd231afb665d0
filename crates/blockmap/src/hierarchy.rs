//! Multi-level bitmap hierarchy.
//!
//! The hierarchy tracks a flat space of base blocks with a chain of bitmaps. The finest level
//! has one bit per base block; every coarser level has one bit per pair of bits in the level
//! below it, so a bit at level `i` covers bits `2b` and `2b + 1` at level `i + 1`. Level 0 is
//! the coarsest and is sized so that its bitmap fills one word when the block count is a
//! power of two.
//!
//! A clear bit at any level means the whole span it covers is free:
//!
//! - setting a bit marks every still-clear coarser bit above it, since those spans are no
//!   longer entirely free;
//! - clearing a bit only frees the coarser bit once both halves of the pair are clear.
//!
//! This is what lets allocation work at the coarsest granularity that fits a request and
//! trust a single clear bit there without looking at the levels below.
//!
//! Each level also keeps a free hint: a counter bumped on every clear and dropped on every
//! set at that level. It is never recomputed from the bitmap and only used to skip scans of
//! levels that are known to be exhausted.

use core::fmt;

use crate::arena::LayoutArena;
use crate::bitmap::{Bitmap, Scan, WORD_BITS};
use crate::error::{Fatal, FatalHandler, FatalKind, panic_on_fatal};
use crate::level::{LEVEL_HEADER_SIZE, Level, LevelInfo};
use crate::{AllocError, BlockIndex, HumanSize};

/// Ceiling on the number of blocks a hierarchy can track. The block count, rounded up to a
/// power of two, must stay below this.
pub const MAX_BLOCKS: usize = 256 * 1024 * 1024;

/// Maximum number of levels in a hierarchy.
pub const MAX_LEVELS: usize = (MAX_BLOCKS.trailing_zeros() - WORD_BITS.trailing_zeros()) as usize;

/// Shape of a hierarchy for a given block count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    total_blocks: usize,
    /// Granularity of level 0.
    coarsest: usize,
    level_count: usize,
}

impl Geometry {
    fn for_blocks(total_blocks: usize) -> Result<Self, AllocError> {
        let mut rounded = 1;
        while rounded < MAX_BLOCKS && rounded < total_blocks {
            rounded *= 2;
        }

        if rounded >= MAX_BLOCKS {
            return Err(AllocError::RegionTooSmall);
        }

        // The top level should fill at least one whole bitmap word; anything smaller is
        // not worth a hierarchy.
        let coarsest = rounded / WORD_BITS;
        if coarsest == 0 {
            return Err(AllocError::RegionTooSmall);
        }

        Ok(Self {
            total_blocks,
            coarsest,
            level_count: coarsest.trailing_zeros() as usize + 1,
        })
    }

    fn granularity(&self, level: usize) -> usize {
        self.coarsest >> level
    }

    fn bit_count(&self, level: usize) -> usize {
        self.total_blocks / self.granularity(level)
    }

    fn required_bytes(&self) -> usize {
        (0..self.level_count)
            .map(|level| LEVEL_HEADER_SIZE + Bitmap::bytes_for(self.bit_count(level)))
            .sum()
    }
}

/// A multi-level bitmap block allocator laid out inside a caller-owned byte region.
///
/// All mutation goes through `&mut self`, so a hierarchy has exactly one mutator at a time.
/// Use [`LockedHierarchy`](crate::LockedHierarchy) to share one between contexts.
pub struct Hierarchy<'a> {
    levels: [Level<'a>; MAX_LEVELS],
    level_count: usize,
    total_blocks: usize,
    bytes_used: usize,
    on_fatal: FatalHandler,
}

impl<'a> Hierarchy<'a> {
    /// Returns the number of region bytes a hierarchy of `total_blocks` blocks consumes.
    pub fn required_bytes(total_blocks: usize) -> Result<usize, AllocError> {
        Ok(Geometry::for_blocks(total_blocks)?.required_bytes())
    }

    /// Lays out a hierarchy for `total_blocks` blocks at the start of `region` and marks every
    /// block free.
    ///
    /// Returns the hierarchy and the number of bytes of `region` it consumed. Internal
    /// consistency violations panic; see [`Hierarchy::init_with_fatal`] to route them
    /// elsewhere.
    pub fn init(region: &'a mut [u8], total_blocks: usize) -> Result<(Self, usize), AllocError> {
        Self::init_with_fatal(region, total_blocks, panic_on_fatal)
    }

    /// Like [`Hierarchy::init`], reporting consistency violations to `on_fatal`.
    pub fn init_with_fatal(
        region: &'a mut [u8],
        total_blocks: usize,
        on_fatal: FatalHandler,
    ) -> Result<(Self, usize), AllocError> {
        let (hierarchy, _) = Self::build(region, total_blocks, on_fatal)?;
        let bytes_used = hierarchy.bytes_used;
        Ok((hierarchy, bytes_used))
    }

    /// Like [`Hierarchy::init`], returning the unused tail of `region` instead of the byte
    /// count so the caller can put it to other use.
    pub fn init_split(
        region: &'a mut [u8],
        total_blocks: usize,
    ) -> Result<(Self, &'a mut [u8]), AllocError> {
        Self::build(region, total_blocks, panic_on_fatal)
    }

    fn build(
        region: &'a mut [u8],
        total_blocks: usize,
        on_fatal: FatalHandler,
    ) -> Result<(Self, &'a mut [u8]), AllocError> {
        let geometry = Geometry::for_blocks(total_blocks)?;
        let level_count = geometry.level_count;
        let mut arena = LayoutArena::new(region);

        // Headers first, then every bitmap in level order.
        let mut headers: [&'a mut [u8]; MAX_LEVELS] = Default::default();
        for header in headers.iter_mut().take(level_count) {
            *header = arena.take(LEVEL_HEADER_SIZE)?;
        }

        let mut levels: [Level<'a>; MAX_LEVELS] = Default::default();
        for (index, (level, header)) in levels
            .iter_mut()
            .zip(headers.iter_mut())
            .take(level_count)
            .enumerate()
        {
            let bit_count = geometry.bit_count(index);
            let bits = arena.take(Bitmap::bytes_for(bit_count))?;
            *level = Level::new(
                core::mem::take(header),
                bits,
                geometry.granularity(index),
                bit_count,
            );
        }

        let (bytes_used, rest) = arena.finish();
        let mut hierarchy = Self {
            levels,
            level_count,
            total_blocks,
            bytes_used,
            on_fatal,
        };
        hierarchy.free(BlockIndex::new(0), total_blocks)?;

        log::debug!(
            "block hierarchy: {} blocks in {} levels, {} of metadata",
            total_blocks,
            level_count,
            HumanSize(bytes_used)
        );

        Ok((hierarchy, rest))
    }

    /// Allocates `count` contiguous blocks and returns the index of the first one.
    ///
    /// The request is served at the coarsest level whose granularity does not exceed
    /// `count`, falling back to coarser levels when that one has nothing free. Within the
    /// chosen level the first run of clear bits wide enough to cover `count` blocks wins;
    /// requests wider than a single coarsest bit take a run of coarsest bits.
    pub fn allocate(&mut self, count: usize) -> Result<BlockIndex, AllocError> {
        if count == 0 {
            log::warn!("rejected allocation of zero blocks");
            return Err(AllocError::InvalidParameter);
        }

        let finest = self.finest();
        let mut index = 0;
        while index < finest && self.levels[index].granularity() > count {
            index += 1;
        }

        while self.levels[index].free_hint() == 0 {
            if index == 0 {
                log::warn!("out of blocks: failed to allocate {} blocks", count);
                return Err(AllocError::NotEnoughMemory);
            }
            index -= 1;
        }

        let level = &self.levels[index];
        let granularity = level.granularity();
        let found = match level.find_clear_run(count.div_ceil(granularity)) {
            Scan::Found(bit) => bit,
            Scan::NoRun => {
                log::warn!(
                    "no contiguous run: failed to allocate {} blocks at granularity {}",
                    count,
                    granularity
                );
                return Err(AllocError::NotEnoughMemory);
            }
            Scan::Empty => self.fatal(FatalKind::HintWithoutFreeBit {
                level: index,
                hint: level.free_hint(),
            }),
        };

        // Each step toward the finest level doubles the index.
        let mut start = found;
        for _ in index..finest {
            start *= 2;
        }

        for block in start..start + count {
            self.set_bit(finest, block);
        }

        log::trace!("allocated blocks {}..{}", start, start + count);
        Ok(BlockIndex::new(start))
    }

    /// Releases `count` blocks starting at `start`.
    ///
    /// The range must lie within the finest level; otherwise nothing changes and
    /// [`AllocError::InvalidParameter`] is returned. An empty range is accepted.
    pub fn free(&mut self, start: BlockIndex, count: usize) -> Result<(), AllocError> {
        let finest = self.finest();
        let limit = self.levels[finest].bit_count();

        let Some(end) = start
            .checked_add(count)
            .filter(|end| end.as_usize() <= limit)
        else {
            log::warn!(
                "rejected free of {} blocks at {}: hierarchy tracks {} blocks",
                count,
                start,
                limit
            );
            return Err(AllocError::InvalidParameter);
        };

        for block in start.as_usize()..end.as_usize() {
            self.clear_bit(finest, block);
        }

        log::trace!("freed blocks {}..{}", start, end);
        Ok(())
    }

    /// Marks `bit` at `level` used and pushes the fact up through every coarser bit that
    /// was still clear.
    fn set_bit(&mut self, mut level: usize, mut bit: usize) {
        loop {
            self.levels[level].set(bit);

            if level == 0 {
                break;
            }

            let parent = bit / 2;
            if self.levels[level - 1].is_set(parent) {
                break;
            }

            level -= 1;
            bit = parent;
        }
    }

    /// Marks `bit` at `level` free, freeing the coarser bit whenever the whole pair is clear.
    fn clear_bit(&mut self, mut level: usize, mut bit: usize) {
        loop {
            let current = &mut self.levels[level];
            current.clear(bit);

            if level == 0 || !current.pair_clear(bit) {
                break;
            }

            level -= 1;
            bit /= 2;
        }
    }

    #[track_caller]
    fn fatal(&self, kind: FatalKind) -> ! {
        let fatal = Fatal::new(kind);
        log::error!("{}", fatal);
        (self.on_fatal)(&fatal)
    }

    fn finest(&self) -> usize {
        self.level_count - 1
    }

    /// Returns the number of blocks this hierarchy was built for.
    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    /// Returns the number of region bytes holding headers and bitmaps.
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    /// Returns the number of levels, coarsest through finest.
    pub fn level_count(&self) -> usize {
        self.level_count
    }

    /// Returns a snapshot of level `index`, where 0 is the coarsest level.
    pub fn level(&self, index: usize) -> Option<LevelInfo> {
        self.levels[..self.level_count]
            .get(index)
            .map(|level| level.info(index))
    }

    /// Returns the raw bitmap words of level `index`, margin word included.
    pub fn bitmap_words(&self, index: usize) -> Option<impl Iterator<Item = u32> + '_> {
        self.levels[..self.level_count]
            .get(index)
            .map(|level| level.words())
    }

    /// Iterates over snapshots of every level, coarsest first.
    pub fn levels(&self) -> impl Iterator<Item = LevelInfo> + '_ {
        self.levels[..self.level_count]
            .iter()
            .enumerate()
            .map(|(index, level)| level.info(index))
    }
}

impl fmt::Debug for Hierarchy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hierarchy")
            .field("total_blocks", &self.total_blocks)
            .field("bytes_used", &self.bytes_used)
            .field("levels", &DebugLevels(self))
            .finish()
    }
}

struct DebugLevels<'h, 'a>(&'h Hierarchy<'a>);

impl fmt::Debug for DebugLevels<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.levels()).finish()
    }
}
