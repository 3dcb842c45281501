//! Trial aggregation and the generic sweep controller.
//!
//! A sweep iterates one experiment dimension (concurrency level or problem
//! size) holding everything else fixed, aggregates a fixed number of
//! trials per point into an arithmetic mean, and accumulates one row per
//! swept value into an [`ExperimentTable`]. Execution is strictly
//! sequential: points run one after another, trials within a point run one
//! after another, and concurrency is only ever an argument passed *into*
//! the kernel.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};
use crate::probe::ProbeRunner;
use crate::workload::{Workload, WorkloadShape};

/// Parameters for one kernel invocation: the concurrency argument and the
/// serialized workload fed on stdin.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Concurrency argument (threads or processes, kernel-defined)
    pub concurrency: u32,
    /// Serialized workload; shared when a sweep reuses one workload
    pub payload: Arc<Vec<u8>>,
}

/// One aggregated sweep point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    /// Swept parameter value (concurrency level or problem size)
    pub parameter: u32,
    /// Mean latency over the point's trials (time unit owned by the kernel)
    pub mean_latency: f64,
}

/// Ordered result rows for one sweep axis.
///
/// Rows appear in sweep order, ascending by parameter, and the table is
/// never mutated after the sweep completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentTable {
    /// Column label for the swept parameter (e.g. "Threads")
    pub parameter_label: String,
    /// Column label for the aggregated latency (e.g. "Latency (ms)")
    pub latency_label: String,
    /// Rows in sweep order
    pub rows: Vec<SweepRow>,
}

impl ExperimentTable {
    /// Create an empty table with column labels.
    #[must_use]
    pub fn new(parameter_label: &str, latency_label: &str) -> Self {
        Self {
            parameter_label: parameter_label.to_string(),
            latency_label: latency_label.to_string(),
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean latencies in row order, for renderers.
    #[must_use]
    pub fn latencies(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.mean_latency).collect()
    }

    /// Markdown rendering for stdout summaries.
    #[must_use]
    pub fn to_markdown_table(&self) -> String {
        let mut table = String::new();
        let _ = writeln!(
            table,
            "| {} | {} |",
            self.parameter_label, self.latency_label
        );
        let _ = writeln!(table, "|---|---|");
        for row in &self.rows {
            let _ = writeln!(table, "| {} | {:.2} |", row.parameter, row.mean_latency);
        }
        table
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or doesn't match the schema.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Repeat one invocation `trials` times and reduce to the arithmetic mean.
///
/// Failed trials contribute the `-1.0` sentinel term rather than being
/// excluded or retried, so rows built from the same trial count stay
/// comparable across the sweep.
///
/// # Errors
///
/// Rejects `trials == 0` before invoking anything; propagates probe
/// resource failures.
pub fn aggregate(probe: &dyn ProbeRunner, invocation: &Invocation, trials: u32) -> Result<f64> {
    if trials == 0 {
        return Err(MedirError::InvalidParameter {
            reason: "trials must be >= 1".to_string(),
        });
    }
    let mut sum = 0.0;
    for _ in 0..trials {
        sum += probe
            .invoke(&invocation.payload, invocation.concurrency)?
            .as_mean_term();
    }
    Ok(sum / f64::from(trials))
}

/// Generic sweep controller: one aggregated row per parameter value, rows
/// emitted in the same order the values were given.
///
/// `build` maps the swept value to its invocation — the concurrency axis
/// reuses one payload, the size axis synthesizes a fresh one per point.
///
/// # Errors
///
/// Rejects an empty or non-ascending value range and `trials == 0` before
/// any process is invoked; propagates probe resource failures.
pub fn sweep<F>(
    probe: &dyn ProbeRunner,
    parameter_label: &str,
    latency_label: &str,
    values: &[u32],
    trials: u32,
    mut build: F,
) -> Result<ExperimentTable>
where
    F: FnMut(u32) -> Result<Invocation>,
{
    validate_range(values, trials)?;

    let mut table = ExperimentTable::new(parameter_label, latency_label);
    for &value in values {
        let invocation = build(value)?;
        let mean = aggregate(probe, &invocation, trials)?;
        table.rows.push(SweepRow {
            parameter: value,
            mean_latency: mean,
        });
    }
    Ok(table)
}

/// Concurrency sweep: one workload at a fixed shape, synthesized once and
/// reused across an ascending range of concurrency levels.
///
/// # Errors
///
/// Rejects invalid shapes and ranges before any process is invoked;
/// propagates probe resource failures.
pub fn concurrency_sweep(
    probe: &dyn ProbeRunner,
    shape: &WorkloadShape,
    levels: &[u32],
    trials: u32,
    seed: u64,
    parameter_label: &str,
) -> Result<ExperimentTable> {
    shape.validate()?;
    let payload = Arc::new(Workload::from_seed(shape, seed).to_wire());
    sweep(
        probe,
        parameter_label,
        LATENCY_LABEL,
        levels,
        trials,
        |level| {
            Ok(Invocation {
                concurrency: level,
                payload: Arc::clone(&payload),
            })
        },
    )
}

/// Size sweep: fixed concurrency, fresh workload per size. Query and Key
/// are `size x size`; Value columns track the kernels' `size / 2`
/// convention. Each size derives its own seed so any single point is
/// reproducible in isolation.
///
/// # Errors
///
/// Rejects a zero concurrency level, invalid per-size shapes, and invalid
/// ranges; propagates probe resource failures.
pub fn size_sweep(
    probe: &dyn ProbeRunner,
    heads: usize,
    sizes: &[u32],
    concurrency: u32,
    trials: u32,
    seed: u64,
) -> Result<ExperimentTable> {
    if concurrency == 0 {
        return Err(MedirError::InvalidParameter {
            reason: "size sweep concurrency must be >= 1".to_string(),
        });
    }
    sweep(probe, "Size (R=C)", LATENCY_LABEL, sizes, trials, |size| {
        let side = size as usize;
        let shape = WorkloadShape::new(heads, side, side, side / 2);
        shape.validate()?;
        let workload = Workload::from_seed(&shape, seed.wrapping_add(u64::from(size)));
        Ok(Invocation {
            concurrency,
            payload: Arc::new(workload.to_wire()),
        })
    })
}

/// Latency column label shared by both sweep axes.
pub const LATENCY_LABEL: &str = "Latency (ms)";

fn validate_range(values: &[u32], trials: u32) -> Result<()> {
    if values.is_empty() {
        return Err(MedirError::InvalidParameter {
            reason: "sweep range must not be empty".to_string(),
        });
    }
    if values.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(MedirError::InvalidParameter {
            reason: "sweep range must be strictly ascending".to_string(),
        });
    }
    if trials == 0 {
        return Err(MedirError::InvalidParameter {
            reason: "trials must be >= 1".to_string(),
        });
    }
    Ok(())
}
