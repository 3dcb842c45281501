//! # Medir
//!
//! Benchmark harness for externally built attention-computation kernels.
//!
//! Medir (Spanish: "to measure") drives an opaque kernel executable across
//! a matrix of experiment parameters — concurrency level and problem size —
//! feeding it randomized integer workloads over a line-oriented stdin
//! protocol, aggregating the latency the kernel reports on its first
//! stdout line, and rendering the aggregate as chart and table artifacts.
//!
//! The kernel is a black box: it is consumed only through stdin/stdout and
//! a process exit. Everything with a design decision lives here — workload
//! synthesis, the process-boundary protocol, trial aggregation, sweep
//! ordering, and the reporting pipeline.
//!
//! ## Pipeline
//!
//! Data flows strictly downward, no feedback loops:
//!
//! ```text
//! workload ──▶ probe ──▶ aggregate ──▶ sweep ──▶ report
//! ```
//!
//! ## Example
//!
//! ```rust
//! use medir::probe::StubProbe;
//! use medir::sweep::concurrency_sweep;
//! use medir::workload::WorkloadShape;
//!
//! let probe = StubProbe::constant(42);
//! let shape = WorkloadShape::new(1, 8, 8, 4);
//! let table = concurrency_sweep(&probe, &shape, &[1, 2, 3], 3, 7, "Threads").unwrap();
//!
//! assert_eq!(table.rows.len(), 3);
//! assert!(table.rows.iter().all(|row| row.mean_latency == 42.0));
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::float_cmp)] // Exact float comparisons in tests

pub mod error;
/// Process-boundary probe: temp staging, kernel invocation, latency parse
pub mod probe;
/// Chart and table artifact rendering
pub mod report;
/// Trial aggregation and the generic sweep controller
pub mod sweep;
/// Workload synthesis and wire serialization
pub mod workload;

pub use error::{MedirError, Result};
pub use probe::{Measurement, ProbeFailure, ProbeRunner};
pub use sweep::ExperimentTable;

/// Crate version, surfaced by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
