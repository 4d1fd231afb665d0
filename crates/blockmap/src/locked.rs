//! Spinlock-guarded hierarchy for kernels that share one allocator between contexts.

use crate::{AllocError, BlockIndex, Hierarchy};

/// A [`Hierarchy`] behind a `spin::Mutex`.
///
/// The hierarchy itself assumes a single mutator. This wrapper serializes callers so that
/// allocation and release can go through `&self`, which is what a kernel-global allocator
/// needs. Contention is expected to be low until secondary processors are started.
pub struct LockedHierarchy<'a> {
    inner: spin::Mutex<Hierarchy<'a>>,
}

impl<'a> LockedHierarchy<'a> {
    /// Wraps an initialized hierarchy.
    pub const fn new(hierarchy: Hierarchy<'a>) -> Self {
        Self {
            inner: spin::Mutex::new(hierarchy),
        }
    }

    /// Allocates `count` contiguous blocks; see [`Hierarchy::allocate`].
    pub fn allocate(&self, count: usize) -> Result<BlockIndex, AllocError> {
        self.inner.lock().allocate(count)
    }

    /// Releases `count` blocks starting at `start`; see [`Hierarchy::free`].
    pub fn free(&self, start: BlockIndex, count: usize) -> Result<(), AllocError> {
        self.inner.lock().free(start, count)
    }

    /// Locks the hierarchy for a sequence of operations or for inspection.
    pub fn lock(&self) -> spin::MutexGuard<'_, Hierarchy<'a>> {
        self.inner.lock()
    }

    /// Unwraps the hierarchy.
    pub fn into_inner(self) -> Hierarchy<'a> {
        self.inner.into_inner()
    }
}

impl<'a> From<Hierarchy<'a>> for LockedHierarchy<'a> {
    fn from(hierarchy: Hierarchy<'a>) -> Self {
        Self::new(hierarchy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_allocator_between_threads() {
        let mut region = [0u8; 4096];
        let (hierarchy, _) = Hierarchy::init(&mut region, 2048).unwrap();
        let locked = LockedHierarchy::new(hierarchy);

        let mut owned: Vec<usize> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..128)
                            .map(|_| locked.allocate(4).unwrap().as_usize())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        owned.sort_unstable();
        let expected: Vec<usize> = (0..512).map(|unit| unit * 4).collect();
        assert_eq!(owned, expected);
        assert_eq!(locked.allocate(1), Err(AllocError::NotEnoughMemory));

        for start in owned {
            locked.free(BlockIndex::new(start), 4).unwrap();
        }
        let hierarchy = locked.into_inner();
        assert_eq!(hierarchy.level(0).unwrap().free_hint, 32);
    }

    #[test]
    fn guard_exposes_levels() {
        let mut region = [0u8; 4096];
        let (hierarchy, _) = Hierarchy::init(&mut region, 256).unwrap();
        let locked: LockedHierarchy = hierarchy.into();

        locked.allocate(8).unwrap();
        let guard = locked.lock();
        assert_eq!(guard.level(0).unwrap().free_hint, 31);
    }
}
