use crate::{
    device::{Accelerator, DeviceMemory, WorkSize},
    Error, Result,
};
use itertools::Itertools;
use scan_reduce_gpu::VALUES_PER_WORK_ITEM;
use std::{fmt, str::FromStr};
use tracing::debug;

/// How a sum is spread over threads and how partial sums are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Every thread atomically adds one element.
    Atomic,
    /// Every thread sums a contiguous run of 64 elements, then adds it atomically.
    LoopNotCoalesced,
    /// Like `LoopNotCoalesced`, but the threads of a block read adjacent
    /// addresses in each iteration.
    LoopCoalesced,
    /// A single thread sums the whole array.
    MainThread,
    /// Each block folds its elements in shared memory, then adds its total
    /// atomically.
    Tree,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Atomic,
        Strategy::LoopNotCoalesced,
        Strategy::LoopCoalesced,
        Strategy::MainThread,
        Strategy::Tree,
    ];

    /// Entry point name in the PTX module.
    pub fn kernel_name(self) -> &'static str {
        match self {
            Strategy::Atomic => "sum_atomic",
            Strategy::LoopNotCoalesced => "sum_loop_not_coalesced",
            Strategy::LoopCoalesced => "sum_loop_coalesced",
            Strategy::MainThread => "sum_main_thread",
            Strategy::Tree => "sum_tree",
        }
    }

    /// Number of threads that do useful work for `n` elements, before
    /// padding to whole blocks.
    pub fn work_items(self, n: usize) -> usize {
        match self {
            Strategy::Atomic | Strategy::Tree => n,
            Strategy::LoopNotCoalesced | Strategy::LoopCoalesced => {
                (n + VALUES_PER_WORK_ITEM - 1) / VALUES_PER_WORK_ITEM
            }
            Strategy::MainThread => 1,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Strategy::Atomic => "atomic",
            Strategy::LoopNotCoalesced => "loop-not-coalesced",
            Strategy::LoopCoalesced => "loop-coalesced",
            Strategy::MainThread => "main-thread",
            Strategy::Tree => "tree",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s || strategy.kernel_name() == s)
            .ok_or_else(|| Error::UnknownStrategy {
                name: s.to_string(),
                known: Strategy::ALL.iter().join(", "),
            })
    }
}

pub struct ReductionEngine<'d, D> {
    device: &'d D,
}

impl<'d, D: Accelerator> ReductionEngine<'d, D> {
    pub fn new(device: &'d D) -> Self {
        Self { device }
    }

    /// Sums `xs` into `result`, which must hold exactly one element, and
    /// returns the sum. `result` is zeroed first.
    pub fn run(&self, strategy: Strategy, xs: &D::Buffer, result: &mut D::Buffer) -> Result<u32> {
        if result.len() != 1 {
            return Err(Error::LengthMismatch {
                host: 1,
                device: result.len(),
            });
        }
        result.write(&[0])?;

        let work = WorkSize::for_items(strategy.work_items(xs.len()));
        debug!(
            %strategy,
            n = xs.len(),
            global_size = work.global_size,
            "sum launch"
        );
        if !work.is_empty() {
            self.device.launch_reduction(strategy, work, xs, result)?;
            self.device.synchronize()?;
        }

        let mut sum = [0u32];
        result.read(&mut sum)?;
        Ok(sum[0])
    }

    /// Copies `xs` to the device and sums it.
    pub fn sum(&self, strategy: Strategy, xs: &[u32]) -> Result<u32> {
        let mut dev_xs = self.device.alloc(xs.len())?;
        dev_xs.write(xs)?;
        let mut dev_sum = self.device.alloc(1)?;
        self.run(strategy, &dev_xs, &mut dev_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::Strategy;
    use crate::Error;

    #[test]
    fn parses_names() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
            assert_eq!(strategy.kernel_name().parse::<Strategy>().unwrap(), strategy);
        }
        assert!(matches!(
            "bogus".parse::<Strategy>(),
            Err(Error::UnknownStrategy { name, .. }) if name == "bogus"
        ));
    }

    #[test]
    fn unknown_strategy_lists_names() {
        let err = "sum_bogus".parse::<Strategy>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown reduction strategy `sum_bogus`, expected one of: \
             atomic, loop-not-coalesced, loop-coalesced, main-thread, tree"
        );
    }

    #[test]
    fn work_items_test() {
        assert_eq!(Strategy::Atomic.work_items(1000), 1000);
        assert_eq!(Strategy::Tree.work_items(1000), 1000);
        assert_eq!(Strategy::LoopNotCoalesced.work_items(1000), 16);
        assert_eq!(Strategy::LoopCoalesced.work_items(1024), 16);
        assert_eq!(Strategy::MainThread.work_items(1000), 1);
        assert_eq!(Strategy::LoopCoalesced.work_items(0), 0);
    }
}
