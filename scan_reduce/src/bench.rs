//! Timing harness around the engines. Every measured run is checked against
//! the reference, and the first mismatch aborts the run.

use crate::{
    device::{Accelerator, DeviceMemory},
    reduce::{ReductionEngine, Strategy},
    reference,
    scan::ScanEngine,
    verify, Result,
};
use rand::{Rng, SeedableRng};
use rand_hc::Hc128Rng;
use std::{
    fmt,
    time::{Duration, Instant},
};
use tracing::info;

/// Settings shared by every benchmark run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub iters: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self { iters: 10 }
    }
}

/// Lap timer. `next_lap` closes the current lap and starts the next one.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    laps: Vec<Duration>,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            laps: Vec::new(),
        }
    }

    /// Starts the current lap over without recording anything.
    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    pub fn next_lap(&mut self) {
        let now = Instant::now();
        self.laps.push(now - self.start);
        self.start = now;
    }

    pub fn laps(&self) -> &[Duration] {
        &self.laps
    }

    /// Mean lap length in seconds.
    pub fn lap_avg(&self) -> f64 {
        if self.laps.is_empty() {
            return 0.0;
        }
        self.laps.iter().map(Duration::as_secs_f64).sum::<f64>() / self.laps.len() as f64
    }

    /// Population standard deviation of the lap lengths in seconds.
    pub fn lap_std(&self) -> f64 {
        if self.laps.is_empty() {
            return 0.0;
        }
        let avg = self.lap_avg();
        let var = self
            .laps
            .iter()
            .map(|lap| (lap.as_secs_f64() - avg).powi(2))
            .sum::<f64>()
            / self.laps.len() as f64;
        var.sqrt()
    }
}

/// Timing summary for one benchmark over `n` elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub label: String,
    pub n: usize,
    pub avg_secs: f64,
    pub std_secs: f64,
}

impl Report {
    fn from_timer(label: impl Into<String>, n: usize, timer: &Timer) -> Self {
        let report = Self {
            label: label.into(),
            n,
            avg_secs: timer.lap_avg(),
            std_secs: timer.lap_std(),
        };
        info!(
            label = %report.label,
            n,
            avg_secs = report.avg_secs,
            millions_per_sec = report.millions_per_sec(),
            "benchmark"
        );
        report
    }

    pub fn millions_per_sec(&self) -> f64 {
        if self.avg_secs == 0.0 {
            return f64::INFINITY;
        }
        (self.n as f64 / 1_000_000.0) / self.avg_secs
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.6}+-{:.6} s, {:.2} millions/s",
            self.label,
            self.avg_secs,
            self.std_secs,
            self.millions_per_sec()
        )
    }
}

/// `n` values drawn uniformly from `0..=max_value`.
pub fn random_input(n: usize, max_value: u32, seed: u64) -> Vec<u32> {
    let mut rng = Hc128Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..=max_value)).collect()
}

/// Largest value that keeps a scan of `n` elements inside `i32`.
pub fn scan_value_range(n: usize) -> u32 {
    1023u32.min(i32::MAX as u32 / clamp_len(n))
}

/// Largest value that keeps a sum of `n` elements inside `u32`.
pub fn sum_value_range(n: usize) -> u32 {
    u32::MAX / clamp_len(n)
}

/// `n` as a nonzero divisor, saturating at `u32::MAX`.
fn clamp_len(n: usize) -> u32 {
    u32::try_from(n.max(1)).unwrap_or(u32::MAX)
}

pub fn bench_reference_scan(config: &BenchConfig, xs: &[u32]) -> (Vec<u32>, Report) {
    let mut ys = Vec::new();
    let mut timer = Timer::new();
    for _ in 0..config.iters {
        ys = reference::inclusive_scan(xs);
        timer.next_lap();
    }
    (ys, Report::from_timer("CPU", xs.len(), &timer))
}

/// Times the in-place scan. The input is copied back before each iteration,
/// outside the timed region.
pub fn bench_scan<D: Accelerator>(
    device: &D,
    config: &BenchConfig,
    xs: &[u32],
    expected: &[u32],
) -> Result<Report> {
    let engine = ScanEngine::new(device);
    let mut dev_xs = device.alloc(0)?;
    dev_xs.resize(xs.len())?;

    let mut timer = Timer::new();
    for _ in 0..config.iters {
        dev_xs.write(xs)?;
        timer.restart();
        engine.run(&mut dev_xs)?;
        timer.next_lap();
    }

    let mut ys = vec![0u32; xs.len()];
    dev_xs.read(&mut ys)?;
    verify::expect_same_scan(expected, &ys)?;

    let label = format!("{} [work-efficient]", device.name());
    Ok(Report::from_timer(label, xs.len(), &timer))
}

pub fn bench_reference_sum(config: &BenchConfig, xs: &[u32], expected: u32) -> Result<Report> {
    let mut timer = Timer::new();
    for _ in 0..config.iters {
        verify::expect_same_sum(expected, reference::sum(xs))?;
        timer.next_lap();
    }
    Ok(Report::from_timer("CPU", xs.len(), &timer))
}

pub fn bench_reference_par_sum(config: &BenchConfig, xs: &[u32], expected: u32) -> Result<Report> {
    let mut timer = Timer::new();
    for _ in 0..config.iters {
        verify::expect_same_sum(expected, reference::par_sum(xs))?;
        timer.next_lap();
    }
    Ok(Report::from_timer("CPU rayon", xs.len(), &timer))
}

/// Times one reduction strategy. The result is reset and checked on every
/// iteration.
pub fn bench_sum<D: Accelerator>(
    device: &D,
    config: &BenchConfig,
    strategy: Strategy,
    xs: &[u32],
    expected: u32,
) -> Result<Report> {
    let engine = ReductionEngine::new(device);
    let mut dev_xs = device.alloc(xs.len())?;
    dev_xs.write(xs)?;
    let mut dev_sum = device.alloc(1)?;

    let mut timer = Timer::new();
    for _ in 0..config.iters {
        let sum = engine.run(strategy, &dev_xs, &mut dev_sum)?;
        verify::expect_same_sum(expected, sum)?;
        timer.next_lap();
    }

    let label = format!("{} {}", device.name(), strategy.kernel_name());
    Ok(Report::from_timer(label, xs.len(), &timer))
}
