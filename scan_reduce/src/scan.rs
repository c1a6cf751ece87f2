use crate::{
    device::{Accelerator, DeviceMemory, WorkSize},
    Error, Result,
};
use scan_reduce_gpu::{
    scan::{down_sweep_items, up_sweep_items},
    step::{div_step, mult_step},
};
use tracing::debug;

/// The two phases of the work-efficient scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPass {
    UpSweep,
    DownSweep,
}

impl ScanPass {
    /// Entry point name in the PTX module.
    pub fn kernel_name(self) -> &'static str {
        match self {
            ScanPass::UpSweep => "work_efficient_prefix_sum_up_sweep",
            ScanPass::DownSweep => "work_efficient_prefix_sum_down_sweep",
        }
    }
}

/// One launch of the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRound {
    pub pass: ScanPass,
    pub block_size: usize,
    pub work: WorkSize,
}

/// Every launch needed to scan `n` elements, in order. `n` must be zero or a
/// power of two.
pub fn scan_rounds(n: usize) -> Vec<ScanRound> {
    let up = mult_step(2, 2)
        .take_while(|&block_size| block_size <= n)
        .map(|block_size| ScanRound {
            pass: ScanPass::UpSweep,
            block_size,
            work: WorkSize::for_items(up_sweep_items(n, block_size)),
        });
    let down = div_step(n / 4, 2)
        .take_while(|&block_size| block_size > 0)
        .map(|block_size| ScanRound {
            pass: ScanPass::DownSweep,
            block_size,
            work: WorkSize::for_items(down_sweep_items(n, block_size)),
        });
    up.chain(down).collect()
}

/// A buffer being scanned in place, together with the number of rounds
/// already applied to it.
pub struct ScanState<'b, B> {
    xs: &'b mut B,
    rounds_done: usize,
}

impl<'b, B: DeviceMemory> ScanState<'b, B> {
    pub fn new(xs: &'b mut B) -> Self {
        Self { xs, rounds_done: 0 }
    }

    pub fn rounds_done(&self) -> usize {
        self.rounds_done
    }

    /// Launches `round` and waits for it, so the next round sees its writes.
    pub fn apply<D>(&mut self, device: &D, round: &ScanRound) -> Result<()>
    where
        D: Accelerator<Buffer = B>,
    {
        debug!(
            pass = ?round.pass,
            block_size = round.block_size,
            global_size = round.work.global_size,
            round = self.rounds_done,
            "scan round"
        );
        if !round.work.is_empty() {
            device.launch_scan_pass(round.pass, round.work, self.xs, round.block_size)?;
            device.synchronize()?;
        }
        self.rounds_done += 1;
        Ok(())
    }
}

/// Inclusive prefix sum with O(n) work and O(log n) launches.
pub struct ScanEngine<'d, D> {
    device: &'d D,
}

impl<'d, D: Accelerator> ScanEngine<'d, D> {
    pub fn new(device: &'d D) -> Self {
        Self { device }
    }

    /// Replaces the contents of `xs` with their inclusive prefix sum.
    pub fn run(&self, xs: &mut D::Buffer) -> Result<()> {
        let n = xs.len();
        if n > 1 && !n.is_power_of_two() {
            return Err(Error::NotPowerOfTwo(n));
        }

        let mut state = ScanState::new(xs);
        for round in scan_rounds(n) {
            state.apply(self.device, &round)?;
        }
        Ok(())
    }

    /// Copies `xs` to the device, scans it and copies the result back.
    pub fn scan(&self, xs: &[u32]) -> Result<Vec<u32>> {
        if xs.len() > 1 && !xs.len().is_power_of_two() {
            return Err(Error::NotPowerOfTwo(xs.len()));
        }

        let mut dev_xs = self.device.alloc(xs.len())?;
        dev_xs.write(xs)?;
        self.run(&mut dev_xs)?;

        let mut ys = vec![0u32; xs.len()];
        dev_xs.read(&mut ys)?;
        Ok(ys)
    }
}

#[cfg(test)]
mod tests {
    use super::{scan_rounds, ScanPass, ScanRound, ScanState};
    use crate::device::{Accelerator, DeviceMemory, WorkSize};
    use crate::HostDevice;
    use itertools::Itertools;

    #[test]
    fn rounds_for_sixteen() {
        let rounds = scan_rounds(16);
        let plan = rounds
            .iter()
            .map(|r| (r.pass, r.block_size))
            .collect_vec();
        assert_eq!(
            plan,
            vec![
                (ScanPass::UpSweep, 2),
                (ScanPass::UpSweep, 4),
                (ScanPass::UpSweep, 8),
                (ScanPass::UpSweep, 16),
                (ScanPass::DownSweep, 4),
                (ScanPass::DownSweep, 2),
                (ScanPass::DownSweep, 1),
            ]
        );
        assert!(rounds.iter().all(|r| r.work == WorkSize::new(128, 128)));
    }

    #[test]
    fn large_rounds_pad_to_group_multiples() {
        let rounds = scan_rounds(1 << 12);
        assert_eq!(
            rounds[0],
            ScanRound {
                pass: ScanPass::UpSweep,
                block_size: 2,
                work: WorkSize::new(128, 2048),
            }
        );
        let last = rounds.last().unwrap();
        assert_eq!(last.pass, ScanPass::DownSweep);
        assert_eq!(last.block_size, 1);
        // 2047 useful threads, padded to 16 blocks.
        assert_eq!(last.work.global_size, 2048);
        assert_eq!(rounds.len(), 12 + 11);
    }

    #[test]
    fn state_counts_rounds() {
        let device = HostDevice::new();
        let mut xs = device.alloc(8).unwrap();
        xs.write(&[1; 8]).unwrap();

        let mut state = ScanState::new(&mut xs);
        for round in scan_rounds(8) {
            state.apply(&device, &round).unwrap();
        }
        assert_eq!(state.rounds_done(), 5);

        let mut ys = [0u32; 8];
        xs.read(&mut ys).unwrap();
        assert_eq!(ys, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn degenerate_sizes() {
        assert!(scan_rounds(0).is_empty());
        assert!(scan_rounds(1).is_empty());
        let rounds = scan_rounds(2);
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].pass, ScanPass::UpSweep);
    }
}
