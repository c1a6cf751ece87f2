//! CPU emulation of the accelerator.
//!
//! Each launch calls the same per-thread bodies as the CUDA kernels, once per
//! thread of the padded grid. Threads of one launch run in an order picked by
//! [`Schedule`]. A launch returns only after all of its threads finish, which
//! gives the barrier between launches. Block-local memory for the tree
//! reduction is a scratch vector per block. Within a block, the threads run
//! one level at a time, so each level boundary acts as a block barrier.

use crate::{
    device::{Accelerator, DeviceMemory, WorkSize},
    reduce::Strategy,
    scan::ScanPass,
    Error, Result,
};
use rayon::prelude::*;
use scan_reduce_gpu::{reduce, scan};

/// Order in which threads (and blocks) of a launch are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Spread across the rayon pool in no particular order.
    #[default]
    Parallel,
    /// One at a time in index order.
    Sequential,
    /// One at a time from the highest index down.
    Reversed,
}

pub struct HostBuffer {
    data: Vec<u32>,
}

impl HostBuffer {
    fn check_len(&self, host: usize) -> Result<()> {
        if host != self.data.len() {
            return Err(Error::LengthMismatch {
                host,
                device: self.data.len(),
            });
        }
        Ok(())
    }
}

impl DeviceMemory for HostBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn resize(&mut self, len: usize) -> Result<()> {
        self.data.resize(len, 0);
        Ok(())
    }

    fn write(&mut self, src: &[u32]) -> Result<()> {
        self.check_len(src.len())?;
        self.data.copy_from_slice(src);
        Ok(())
    }

    fn read(&self, dst: &mut [u32]) -> Result<()> {
        self.check_len(dst.len())?;
        dst.copy_from_slice(&self.data);
        Ok(())
    }
}

/// Raw pointer handed to every emulated thread of a launch. The kernel bodies
/// only touch disjoint elements or go through atomics.
#[derive(Clone, Copy)]
struct SharedPtr(*mut u32);

unsafe impl Send for SharedPtr {}
unsafe impl Sync for SharedPtr {}

impl SharedPtr {
    fn get(self) -> *mut u32 {
        self.0
    }
}

#[derive(Default)]
pub struct HostDevice {
    schedule: Schedule,
    pool: Option<rayon::ThreadPool>,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs launches on a dedicated pool of `threads` workers. Zero means the
    /// global rayon pool.
    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = if threads == 0 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()?,
            )
        };
        Ok(Self {
            schedule: Schedule::default(),
            pool,
        })
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    fn for_each_index<F>(&self, count: usize, f: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        match self.schedule {
            Schedule::Parallel => match &self.pool {
                Some(pool) => pool.install(|| (0..count).into_par_iter().for_each(&f)),
                None => (0..count).into_par_iter().for_each(&f),
            },
            Schedule::Sequential => (0..count).for_each(f),
            Schedule::Reversed => (0..count).rev().for_each(f),
        }
    }
}

/// Runs one level of a block, thread by thread.
fn for_each_local(schedule: Schedule, count: usize, f: impl FnMut(usize)) {
    match schedule {
        Schedule::Reversed => (0..count).rev().for_each(f),
        Schedule::Parallel | Schedule::Sequential => (0..count).for_each(f),
    }
}

impl Accelerator for HostDevice {
    type Buffer = HostBuffer;

    fn name(&self) -> &str {
        "host"
    }

    fn alloc(&self, len: usize) -> Result<HostBuffer> {
        Ok(HostBuffer { data: vec![0; len] })
    }

    fn launch_scan_pass(
        &self,
        pass: ScanPass,
        work: WorkSize,
        xs: &mut HostBuffer,
        block_size: usize,
    ) -> Result<()> {
        let n = xs.data.len();
        let xs = SharedPtr(xs.data.as_mut_ptr());

        self.for_each_index(work.global_size, |i| unsafe {
            match pass {
                ScanPass::UpSweep => scan::up_sweep_item(xs.get(), n, block_size, i),
                ScanPass::DownSweep => scan::down_sweep_item(xs.get(), n, block_size, i),
            }
        });
        Ok(())
    }

    fn launch_reduction(
        &self,
        strategy: Strategy,
        work: WorkSize,
        xs: &HostBuffer,
        result: &mut HostBuffer,
    ) -> Result<()> {
        result.check_len(1)?;
        let xs = xs.data.as_slice();
        let sum = SharedPtr(result.data.as_mut_ptr());
        let group_size = work.group_size;

        match strategy {
            Strategy::Atomic => self.for_each_index(work.global_size, |i| unsafe {
                reduce::sum_atomic_item(xs, sum.get(), i)
            }),
            Strategy::LoopNotCoalesced => self.for_each_index(work.global_size, |i| unsafe {
                reduce::sum_loop_not_coalesced_item(xs, sum.get(), i)
            }),
            Strategy::LoopCoalesced => self.for_each_index(work.global_size, |i| unsafe {
                reduce::sum_loop_coalesced_item(
                    xs,
                    sum.get(),
                    i / group_size,
                    i % group_size,
                    group_size,
                )
            }),
            Strategy::MainThread => self.for_each_index(work.global_size, |i| unsafe {
                reduce::sum_main_thread_item(xs, sum.get(), i)
            }),
            Strategy::Tree => {
                let schedule = self.schedule;
                self.for_each_index(work.group_count(), |group| {
                    let mut local_xs = vec![0u32; group_size];
                    let local_ptr = local_xs.as_mut_ptr();
                    for_each_local(schedule, group_size, |local| unsafe {
                        reduce::tree_load(local_ptr, xs, local, group * group_size + local)
                    });
                    for width in reduce::tree_widths(group_size) {
                        for_each_local(schedule, group_size, |local| unsafe {
                            reduce::tree_combine(local_ptr, local, width)
                        });
                    }
                    unsafe { reduce::atomic_add(sum.get(), local_xs[0]) };
                });
            }
        }
        Ok(())
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}
