//! Error and fatal-condition types.
//!
//! Ordinary failures are returned as [`AllocError`] values and left to the caller. Broken
//! internal bookkeeping is not something the allocator can recover from: it is described by a
//! [`Fatal`] record and handed to a [`FatalHandler`], which must not return.

use core::fmt;
use core::panic::Location;

/// Errors that can occur during hierarchy construction, allocation, or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The requested block count is unsupported, or the region cannot hold every level header
    /// and bitmap the block count requires.
    RegionTooSmall,
    /// No level from the matching granularity up to the coarsest has a usable free run.
    NotEnoughMemory,
    /// The range passed to free is out of bounds or malformed, or a zero-block allocation
    /// was requested.
    InvalidParameter,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::RegionTooSmall => f.write_str("region too small for block hierarchy"),
            AllocError::NotEnoughMemory => f.write_str("not enough free blocks"),
            AllocError::InvalidParameter => f.write_str("invalid block range"),
        }
    }
}

/// The internal invariant that was found broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// A level's free hint promised free bits but a full scan of its bitmap found none.
    HintWithoutFreeBit {
        /// Position of the level in the hierarchy (0 is coarsest).
        level: usize,
        /// The hint value at the time of the scan.
        hint: u32,
    },
}

/// A fatal consistency violation, reported to the [`FatalHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fatal {
    kind: FatalKind,
    location: &'static Location<'static>,
}

impl Fatal {
    /// Records a violation at the caller's source location.
    #[track_caller]
    pub fn new(kind: FatalKind) -> Self {
        Self {
            kind,
            location: Location::caller(),
        }
    }

    /// Returns which invariant was violated.
    pub const fn kind(&self) -> FatalKind {
        self.kind
    }

    /// Returns the source location of the failed check.
    pub const fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FatalKind::HintWithoutFreeBit { level, hint } => write!(
                f,
                "level {} reports {} free bits but none are clear (at {})",
                level, hint, self.location
            ),
        }
    }
}

/// Hook invoked when the allocator detects that its own bookkeeping is wrong.
///
/// The embedding kernel decides what happens (halt, dump state, reset); the allocator only
/// requires that control never comes back.
pub type FatalHandler = fn(&Fatal) -> !;

/// Default [`FatalHandler`]: panics, leaving the halt to the kernel's panic handler.
pub fn panic_on_fatal(fatal: &Fatal) -> ! {
    panic!("block hierarchy corrupted: {}", fatal)
}
