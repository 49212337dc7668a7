//! Monotonic physical frame allocator. The source lineage this crate was
//! transformed from tracks per-page allocation state in a `Vec` and reuses
//! freed pages; frame reuse is deliberately out of scope here, so this
//! collapses to a single bump counter with no deallocation path.

use crate::constants::RESERVED_FRAMES;
use crate::error::KernelError;

#[derive(Debug, Clone)]
pub struct FrameAllocator {
    next_free: usize,
    capacity: usize,
}

impl FrameAllocator {
    /// `capacity` is the total number of physical frames the simulated
    /// machine has; allocation starts past the reserved save-area frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            next_free: RESERVED_FRAMES,
            capacity,
        }
    }

    /// Bumps the counter by `count` frames and returns the first frame index
    /// of the contiguous run, or `OutOfFrames` if the machine doesn't have
    /// that many frames left.
    pub fn alloc_contiguous(&mut self, count: usize) -> Result<usize, KernelError> {
        let available = self.capacity.saturating_sub(self.next_free);
        if count > available {
            return Err(KernelError::OutOfFrames {
                requested: count,
                available,
            });
        }
        let base = self.next_free;
        self.next_free += count;
        Ok(base)
    }

    pub fn frames_in_use(&self) -> usize {
        self.next_free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_bumps_monotonically() {
        let mut alloc = FrameAllocator::new(RESERVED_FRAMES + 10);
        let first = alloc.alloc_contiguous(3).unwrap();
        let second = alloc.alloc_contiguous(2).unwrap();
        assert_eq!(first, RESERVED_FRAMES);
        assert_eq!(second, RESERVED_FRAMES + 3);
    }

    #[test]
    fn exhaustion_reports_counts() {
        let mut alloc = FrameAllocator::new(RESERVED_FRAMES + 1);
        let err = alloc.alloc_contiguous(5).unwrap_err();
        match err {
            KernelError::OutOfFrames {
                requested,
                available,
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
