//! The two things the engines need from an accelerator: buffers of `u32` in
//! device memory, and blocking kernel launches over a 1-D grid.

use crate::{reduce::Strategy, scan::ScanPass, Result};
use scan_reduce_gpu::WORK_GROUP_SIZE;

/// A resizable array of `u32` in accelerator memory. The host can only move
/// whole buffers in and out; element access happens inside kernels.
pub trait DeviceMemory {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reallocates to `len` elements. Contents are unspecified until the next
    /// `write`.
    fn resize(&mut self, len: usize) -> Result<()>;

    /// Copies `src` into the buffer. `src.len()` must equal `self.len()`.
    fn write(&mut self, src: &[u32]) -> Result<()>;

    /// Copies the buffer into `dst`. `dst.len()` must equal `self.len()`.
    fn read(&self, dst: &mut [u32]) -> Result<()>;
}

/// Launch geometry: `global_size` threads in blocks of `group_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    pub group_size: usize,
    pub global_size: usize,
}

impl WorkSize {
    /// Rounds `logical` threads up to a whole number of blocks.
    pub fn new(group_size: usize, logical: usize) -> Self {
        let groups = (logical + group_size - 1) / group_size;
        Self {
            group_size,
            global_size: groups * group_size,
        }
    }

    /// Rounds up using the block size every kernel in this crate expects.
    pub fn for_items(logical: usize) -> Self {
        Self::new(WORK_GROUP_SIZE, logical)
    }

    pub fn group_count(&self) -> usize {
        self.global_size / self.group_size
    }

    pub fn is_empty(&self) -> bool {
        self.global_size == 0
    }
}

/// Something that can run the scan and sum kernels.
///
/// Launches may be queued. [`Accelerator::synchronize`] blocks until every
/// queued launch has finished and its writes are visible to the next launch
/// and to `read`. The engines call it after every launch.
pub trait Accelerator {
    type Buffer: DeviceMemory;

    fn name(&self) -> &str;

    /// Allocates a zeroed buffer of `len` elements.
    fn alloc(&self, len: usize) -> Result<Self::Buffer>;

    /// One up-sweep or down-sweep level over all of `xs`.
    fn launch_scan_pass(
        &self,
        pass: ScanPass,
        work: WorkSize,
        xs: &mut Self::Buffer,
        block_size: usize,
    ) -> Result<()>;

    /// Accumulates `xs` into the single element of `result`, which the
    /// caller has zeroed.
    fn launch_reduction(
        &self,
        strategy: Strategy,
        work: WorkSize,
        xs: &Self::Buffer,
        result: &mut Self::Buffer,
    ) -> Result<()>;

    fn synchronize(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::WorkSize;

    #[test]
    fn rounds_up_to_whole_groups() {
        let work = WorkSize::new(128, 1);
        assert_eq!(work.global_size, 128);
        assert_eq!(work.group_count(), 1);

        let work = WorkSize::new(128, 129);
        assert_eq!(work.global_size, 256);
        assert_eq!(work.group_count(), 2);

        let work = WorkSize::new(128, 256);
        assert_eq!(work.global_size, 256);
    }

    #[test]
    fn zero_items_is_empty() {
        let work = WorkSize::for_items(0);
        assert!(work.is_empty());
        assert_eq!(work.group_count(), 0);
    }
}
