//! Medir CLI - benchmark harness for external attention kernels
//!
//! Runs both experiment sweeps against the selected kernel variant with
//! sensible defaults (no required arguments), prints the aggregated tables
//! to stdout, and writes chart and table artifacts plus a JSON results
//! file to the output directory.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;

use medir::error::{MedirError, Result};
use medir::probe::CommandProbe;
use medir::report;
use medir::sweep::{concurrency_sweep, size_sweep, ExperimentTable};
use medir::workload::WorkloadShape;

/// Medir - benchmark harness for external attention kernels
///
/// Drives an attention executable across a concurrency sweep and a
/// problem-size sweep, aggregates its self-reported latencies, and renders
/// line-chart and table artifacts.
#[derive(Parser)]
#[command(name = "medir")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Kernel variant to benchmark
    #[arg(long, value_enum, default_value = "single")]
    mode: Mode,

    /// Path to the kernel executable (defaults to ./attention or
    /// ./multiHeadAttention per mode)
    #[arg(long)]
    exec: Option<PathBuf>,

    /// Attention heads per workload (multi mode only)
    #[arg(long, default_value_t = 4)]
    heads: usize,

    /// Trials per sweep point
    #[arg(long, default_value_t = 3)]
    trials: u32,

    /// Seed for workload synthesis
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Per-probe deadline in seconds (0 disables)
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Fixed concurrency level for the size sweep
    #[arg(long, default_value_t = 4)]
    size_concurrency: u32,

    /// Directory for rendered artifacts
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Single-head kernel: concurrency argument is a thread count
    Single,
    /// Multi-head kernel: concurrency argument is a process count
    Multi,
}

impl Mode {
    fn default_exec(self) -> &'static str {
        match self {
            Self::Single => "./attention",
            Self::Multi => "./multiHeadAttention",
        }
    }

    fn axis_label(self) -> &'static str {
        match self {
            Self::Single => "Threads",
            Self::Multi => "Processes",
        }
    }
}

/// Run configuration echoed into the JSON results file.
#[derive(Serialize)]
struct RunReport<'a> {
    mode: &'a str,
    executable: String,
    trials: u32,
    seed: u64,
    heads: usize,
    by_concurrency: &'a ExperimentTable,
    by_size: &'a ExperimentTable,
}

fn main() {
    if let Err(err) = run(&Cli::parse()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let heads = match cli.mode {
        Mode::Single => 1,
        Mode::Multi => {
            if cli.heads < 2 {
                return Err(MedirError::InvalidParameter {
                    reason: "multi mode needs --heads >= 2".to_string(),
                });
            }
            cli.heads
        },
    };

    let exec = cli
        .exec
        .clone()
        .unwrap_or_else(|| PathBuf::from(cli.mode.default_exec()));
    let mut probe = CommandProbe::new(&exec);
    if cli.timeout_secs > 0 {
        probe = probe.with_timeout(Duration::from_secs(cli.timeout_secs));
    }

    let axis = cli.mode.axis_label();
    println!("medir v{} - benchmarking {}", medir::VERSION, exec.display());
    println!();

    // Experiment 1: concurrency sweep at a fixed 200x200x200 shape, one
    // workload reused across all levels.
    let fixed_shape = WorkloadShape::new(heads, 200, 200, 200);
    let levels: Vec<u32> = (1..=10).collect();
    println!(
        "[1/2] {} sweep 1..{} ({} trials per point)",
        axis.to_lowercase(),
        levels.len(),
        cli.trials
    );
    let by_concurrency =
        concurrency_sweep(&probe, &fixed_shape, &levels, cli.trials, cli.seed, axis)?;
    print_table(&by_concurrency);

    // Experiment 2: size sweep at a fixed concurrency level, fresh
    // workload per size.
    let sizes: Vec<u32> = (1..=10).map(|step| step * 100).collect();
    println!(
        "[2/2] size sweep {}..{} step 100 (fixed {}: {})",
        sizes[0],
        sizes[sizes.len() - 1],
        axis.to_lowercase(),
        cli.size_concurrency
    );
    let by_size = size_sweep(
        &probe,
        heads,
        &sizes,
        cli.size_concurrency,
        cli.trials,
        cli.seed,
    )?;
    print_table(&by_size);

    write_artifacts(cli, axis, heads, &exec, &by_concurrency, &by_size)
}

fn print_table(table: &ExperimentTable) {
    println!("{}", table.to_markdown_table());
    println!("  trend: {}", report::render_sparkline(&table.latencies(), 40));
    println!();
}

fn write_artifacts(
    cli: &Cli,
    axis: &str,
    heads: usize,
    exec: &std::path::Path,
    by_concurrency: &ExperimentTable,
    by_size: &ExperimentTable,
) -> Result<()> {
    let prefix = match cli.mode {
        Mode::Single => "",
        Mode::Multi => "multi_",
    };
    let axis_file = match cli.mode {
        Mode::Single => "thread",
        Mode::Multi => "process",
    };
    let axis_plural = match cli.mode {
        Mode::Single => "threads",
        Mode::Multi => "processes",
    };

    let concurrency_chart = report::render_line_chart(
        by_concurrency,
        axis,
        "Latency (ms)",
        &format!("Latency vs {axis} (Fixed Size: 200x200)"),
    );
    let size_chart = report::render_line_chart(
        by_size,
        "Matrix Size (R=C)",
        "Latency (ms)",
        &format!("Latency vs Matrix Size (Fixed {axis}: {})", cli.size_concurrency),
    );
    let concurrency_table = report::render_table_image(
        by_concurrency,
        &format!("Latency by {axis}"),
    );
    let size_table = report::render_table_image(
        by_size,
        match cli.mode {
            Mode::Single => "Latency by Size",
            Mode::Multi => "Latency by Size (Multi)",
        },
    );

    let artifacts = [
        (format!("{prefix}{axis_file}_vs_latency.svg"), concurrency_chart),
        (format!("{prefix}size_vs_latency.svg"), size_chart),
        (
            format!("{prefix}latency_table_{axis_plural}.svg"),
            concurrency_table,
        ),
        (format!("{prefix}latency_table_sizes.svg"), size_table),
    ];

    for (name, svg) in &artifacts {
        let path = cli.out_dir.join(name);
        report::write_artifact(&path, svg)?;
        println!("✓ {}", path.display());
    }

    let run_report = RunReport {
        mode: match cli.mode {
            Mode::Single => "single",
            Mode::Multi => "multi",
        },
        executable: exec.display().to_string(),
        trials: cli.trials,
        seed: cli.seed,
        heads,
        by_concurrency,
        by_size,
    };
    let json = serde_json::to_string_pretty(&run_report)?;
    let json_path = cli.out_dir.join(format!("{prefix}benchmark_results.json"));
    report::write_artifact(&json_path, &json)?;
    println!("✓ {}", json_path.display());

    Ok(())
}
