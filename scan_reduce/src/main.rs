use anyhow::{ensure, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scan_reduce::{
    bench::{self, BenchConfig},
    reference, Accelerator, HostDevice, Strategy,
};
use scan_reduce_gpu::step::mult_step;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scan_reduce")]
#[command(about = "Benchmark a work-efficient prefix sum and five parallel sum strategies")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error). RUST_LOG wins if set.
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    /// Where the kernels run.
    #[arg(long, global = true, value_enum, default_value_t = Backend::Host)]
    backend: Backend,

    /// Host backend threads (0 = rayon default).
    #[arg(long, global = true, default_value = "0")]
    threads: usize,

    /// Timed iterations per benchmark.
    #[arg(long, global = true, default_value = "10")]
    iters: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Host,
    Cuda,
}

#[derive(Subcommand)]
enum Commands {
    /// Inclusive prefix sum for n = min_n, 4 * min_n, ... up to max_n
    Scan {
        /// Smallest input, must be a power of two
        #[arg(long, default_value = "4096")]
        min_n: usize,

        /// Largest input
        #[arg(long, default_value = "16777216")]
        max_n: usize,
    },

    /// Sum of n elements with each reduction strategy
    Sum {
        #[arg(long, default_value = "100000000")]
        n: usize,

        /// `all`, or one of atomic, loop-not-coalesced, loop-coalesced,
        /// main-thread, tree
        #[arg(long, default_value = "all")]
        strategy: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_string().to_lowercase())),
        )
        .with_target(false)
        .init();

    let config = BenchConfig { iters: cli.iters };
    match cli.backend {
        Backend::Host => {
            let device = HostDevice::with_threads(cli.threads)?;
            run(&device, &config, &cli.command)
        }
        Backend::Cuda => run_cuda(&config, &cli.command),
    }
}

#[cfg(feature = "cuda")]
fn run_cuda(config: &BenchConfig, command: &Commands) -> Result<()> {
    let device = scan_reduce::CudaDevice::new()?;
    run(&device, config, command)
}

#[cfg(not(feature = "cuda"))]
fn run_cuda(_config: &BenchConfig, _command: &Commands) -> Result<()> {
    Err(scan_reduce::Error::Unsupported("CUDA").into())
}

fn run<D: Accelerator>(device: &D, config: &BenchConfig, command: &Commands) -> Result<()> {
    match command {
        Commands::Scan { min_n, max_n } => run_scan(device, config, *min_n, *max_n),
        Commands::Sum { n, strategy } => run_sum(device, config, *n, strategy),
    }
}

fn run_scan<D: Accelerator>(
    device: &D,
    config: &BenchConfig,
    min_n: usize,
    max_n: usize,
) -> Result<()> {
    ensure!(
        min_n.is_power_of_two(),
        "--min-n must be a power of two, got {min_n}"
    );

    for n in mult_step(min_n, 4).take_while(|&n| n <= max_n) {
        println!("______________________________________________");
        let values_range = bench::scan_value_range(n);
        println!("n={n} values in range: [0; {values_range}]");

        let xs = bench::random_input(n, values_range, n as u64);
        let (expected, cpu) = bench::bench_reference_scan(config, &xs);
        println!("{cpu}");

        let gpu = bench::bench_scan(device, config, &xs, &expected)?;
        println!("{gpu}");
    }
    Ok(())
}

fn run_sum<D: Accelerator>(device: &D, config: &BenchConfig, n: usize, strategy: &str) -> Result<()> {
    let strategies = if strategy == "all" {
        Strategy::ALL.to_vec()
    } else {
        vec![strategy.parse::<Strategy>()?]
    };

    let xs = bench::random_input(n, bench::sum_value_range(n), 42);
    let expected = reference::sum(&xs);

    println!("{}", bench::bench_reference_sum(config, &xs, expected)?);
    println!("{}", bench::bench_reference_par_sum(config, &xs, expected)?);
    for strategy in strategies {
        println!("{}", bench::bench_sum(device, config, strategy, &xs, expected)?);
    }
    Ok(())
}
