#![cfg_attr(not(test), no_std)]

//! # Block bitmap allocator
//!
//! A block allocator for early kernel memory management. It hands out contiguous runs of
//! fixed-size blocks (typically physical page frames) from a flat index space, tracking them
//! with a hierarchy of bitmaps laid out inside a region supplied by the caller:
//!
//! - One bitmap per granularity level, from a coarse top level down to one bit per block.
//! - Allocation at the coarsest granularity that fits the request.
//! - Lazy coalescing on free: a coarser bit becomes free once both halves below it are.
//! - No dynamic allocation; all metadata lives in the caller's region.
//!
//! ```
//! use blockmap::{AllocError, Hierarchy};
//!
//! let mut region = [0u8; 1024];
//! let (mut blocks, used) = Hierarchy::init(&mut region, 2048).unwrap();
//! assert_eq!(used, 648);
//!
//! let start = blocks.allocate(16).unwrap();
//! blocks.free(start, 16).unwrap();
//!
//! assert!(blocks.allocate(2048).is_ok());
//! assert_eq!(blocks.allocate(1), Err(AllocError::NotEnoughMemory));
//! ```

mod arena;
mod bitmap;
mod error;
mod hierarchy;
mod human_size;
mod level;
mod locked;
mod numbers;

pub use bitmap::WORD_BITS;
pub use error::{AllocError, Fatal, FatalHandler, FatalKind, panic_on_fatal};
pub use hierarchy::{Hierarchy, MAX_BLOCKS, MAX_LEVELS};
pub use human_size::HumanSize;
pub use level::{LEVEL_HEADER_SIZE, LevelInfo};
pub use locked::LockedHierarchy;
pub use numbers::BlockIndex;
