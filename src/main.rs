//! Benchmark driver for the multiplication algorithms.
//!
//! ```text
//! hybrid-strassen strassen 1024 --check --threads 8 --max-depth 2
//! hybrid-strassen hybrid 2048 --workers 7
//! RUST_LOG=debug hybrid-strassen divide-conquer 512 --threshold 64
//! ```

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use hybrid_strassen::distributed::{hybrid_padded_size, run_hybrid_local, run_row_block_local};
use hybrid_strassen::tiled::{self, DEFAULT_TILE};
use hybrid_strassen::utils::{gflops, naive_multiply, padded_size, random_matrix, relative_l2_error, Timer};
use hybrid_strassen::{
    divide_conquer, Matrix, RayonScheduler, Result, Strassen, StrassenConfig, TaskScheduler,
    DEFAULT_MAX_DEPTH, DEFAULT_THRESHOLD, STRASSEN_FAN_OUT,
};

/// Relative L2 error below which a run counts as correct.
const TOLERANCE: f64 = 1e-4;

/// Parallel and distributed matrix multiplication benchmarks
#[derive(Parser)]
#[command(name = "hybrid-strassen")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task-parallel Strassen on a Rayon pool
    Strassen(RunArgs),
    /// Eight-product divide-and-conquer, two waves per level
    DivideConquer(RunArgs),
    /// Row-band tiled multiply
    Tiled {
        #[command(flatten)]
        run: RunArgs,

        /// Tile side
        #[arg(long, default_value_t = DEFAULT_TILE)]
        tile: usize,
    },
    /// Serial naive triple loop
    Naive(RunArgs),
    /// Strassen fanned out over seven in-process ranks
    Hybrid(RunArgs),
    /// Row-block naive multiply over in-process ranks
    RowBlock(RunArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Matrix side
    #[arg(value_name = "N")]
    size: usize,

    /// Verify against the naive multiply and report the speed-up
    #[arg(long)]
    check: bool,

    /// Worker threads per pool (Rayon default when omitted)
    #[arg(long)]
    threads: Option<usize>,

    /// Base-case cutoff and padding granularity
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: usize,

    /// Recursion levels that fork tasks
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Process count for the distributed variants
    #[arg(long, default_value_t = STRASSEN_FAN_OUT)]
    workers: usize,

    /// Seed for A
    #[arg(long, default_value_t = 123)]
    seed_a: u64,

    /// Seed for B
    #[arg(long, default_value_t = 456)]
    seed_b: u64,
}

impl RunArgs {
    fn config(&self) -> StrassenConfig {
        StrassenConfig {
            threshold: self.threshold,
            max_depth: self.max_depth,
            threads: self.threads,
            worker_count: self.workers,
        }
    }

    fn operands(&self) -> (Matrix<f32>, Matrix<f32>) {
        (
            random_matrix(self.size, self.seed_a),
            random_matrix(self.size, self.seed_b),
        )
    }
}

/// Outcome of one timed run.
struct Run {
    product: Matrix<f32>,
    seconds: f64,
    padded: usize,
    parallelism: String,
}

fn timed(f: impl FnOnce() -> Result<Matrix<f32>>) -> Result<(Matrix<f32>, f64)> {
    let timer = Timer::start();
    let product = f()?;
    Ok((product, timer.elapsed()))
}

fn execute(command: &Commands) -> Result<(&'static str, &RunArgs, Run)> {
    match command {
        Commands::Strassen(args) => {
            let engine = Strassen::new(args.config())?;
            let (a, b) = args.operands();
            let (product, seconds) = timed(|| engine.multiply(&a, &b))?;
            Ok((
                "Strassen (task-parallel)",
                args,
                Run {
                    product,
                    seconds,
                    padded: padded_size(args.size, args.threshold.max(1)),
                    parallelism: format!("{} threads", engine.scheduler().threads()),
                },
            ))
        }
        Commands::DivideConquer(args) => {
            let scheduler = RayonScheduler::new(args.threads)?;
            let (a, b) = args.operands();
            let (product, seconds) = timed(|| {
                let mut c = Matrix::zeros(args.size);
                divide_conquer::multiply(a.view(), b.view(), c.view_mut(), args.threshold, &scheduler)?;
                Ok(c)
            })?;
            Ok((
                "Divide & conquer",
                args,
                Run {
                    product,
                    seconds,
                    padded: args.size,
                    parallelism: format!("{} threads", scheduler.threads()),
                },
            ))
        }
        Commands::Tiled { run: args, tile } => {
            let scheduler = RayonScheduler::new(args.threads)?;
            let (a, b) = args.operands();
            let (product, seconds) = timed(|| tiled::par_multiply(&a, &b, *tile, &scheduler))?;
            Ok((
                "Tiled",
                args,
                Run {
                    product,
                    seconds,
                    padded: args.size,
                    parallelism: format!("{} threads, tile {tile}", scheduler.threads()),
                },
            ))
        }
        Commands::Naive(args) => {
            let (a, b) = args.operands();
            let (product, seconds) = timed(|| naive_multiply(&a, &b))?;
            Ok((
                "Naive",
                args,
                Run {
                    product,
                    seconds,
                    padded: args.size,
                    parallelism: "1 thread".to_string(),
                },
            ))
        }
        Commands::Hybrid(args) => {
            let config = args.config();
            let (a, b) = args.operands();
            let (product, seconds) = timed(|| run_hybrid_local(&config, &a, &b))?;
            Ok((
                "Hybrid Strassen",
                args,
                Run {
                    product,
                    seconds,
                    padded: hybrid_padded_size(args.size, args.threshold.max(1)),
                    parallelism: format!("{} ranks", args.workers),
                },
            ))
        }
        Commands::RowBlock(args) => {
            let (a, b) = args.operands();
            let timer = Timer::start();
            let outcome = run_row_block_local(args.workers, &a, &b)?;
            let seconds = timer.elapsed();
            Ok((
                "Row-block distributed",
                args,
                Run {
                    product: outcome.product,
                    seconds,
                    padded: args.size,
                    parallelism: format!(
                        "{} ranks, slowest rank {:.4}s",
                        args.workers, outcome.max_compute_seconds
                    ),
                },
            ))
        }
    }
}

fn report(name: &str, args: &RunArgs, run: &Run) -> Result<bool> {
    println!("================================================");
    println!("{name}");
    println!("{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("================================================");
    println!(
        "Size: {n}x{n} | Padded: {} | {} | Threshold: {} | Max depth: {}",
        run.padded,
        run.parallelism,
        args.threshold,
        args.max_depth,
        n = args.size
    );
    println!(
        "Time: {:.4}s | {:.2} GFLOPS",
        run.seconds,
        gflops(args.size, run.seconds)
    );

    if !args.check {
        return Ok(true);
    }
    let (a, b) = args.operands();
    let (reference, naive_seconds) = timed(|| naive_multiply(&a, &b))?;
    let error = relative_l2_error(&run.product, &reference)?;
    let passed = error < TOLERANCE;
    println!("Naive completed in {naive_seconds:.4}s");
    println!("Relative L2 error: {error:.3e}");
    println!("Verification: {}", if passed { "PASSED" } else { "FAILED" });
    if run.seconds > 0.0 {
        println!("Speed-up vs naive: {:.2}x", naive_seconds / run.seconds);
    }
    Ok(passed)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = execute(&cli.command).and_then(|(name, args, run)| report(name, args, &run));
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
