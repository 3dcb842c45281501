//! End-to-end sweep scenarios over a scripted probe.
//!
//! These exercise the aggregation policy and sweep ordering guarantees
//! without any external process.

use medir::probe::{Measurement, ProbeFailure, StubProbe};
use medir::sweep::{aggregate, concurrency_sweep, size_sweep, Invocation};
use medir::workload::WorkloadShape;

use std::sync::Arc;

fn fixed_shape() -> WorkloadShape {
    WorkloadShape::new(1, 8, 8, 4)
}

#[test]
fn constant_stub_concurrency_sweep_matches_expected_table() {
    let stub = StubProbe::constant(42);
    let table = concurrency_sweep(&stub, &fixed_shape(), &[1, 2, 3], 3, 7, "Threads").unwrap();

    let rows: Vec<(u32, f64)> = table
        .rows
        .iter()
        .map(|row| (row.parameter, row.mean_latency))
        .collect();
    assert_eq!(rows, vec![(1, 42.0), (2, 42.0), (3, 42.0)]);
    assert_eq!(stub.calls(), 9);
}

#[test]
fn concurrency_sweep_full_range_is_ten_ascending_rows() {
    let stub = StubProbe::constant(5);
    let levels: Vec<u32> = (1..=10).collect();
    let table = concurrency_sweep(&stub, &fixed_shape(), &levels, 3, 7, "Threads").unwrap();

    assert_eq!(table.len(), 10);
    let params: Vec<u32> = table.rows.iter().map(|row| row.parameter).collect();
    assert_eq!(params, levels);
    assert!(params.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn size_sweep_yields_exact_size_sequence() {
    let stub = StubProbe::constant(9);
    let sizes: Vec<u32> = (1..=10).map(|step| step * 100).collect();
    let table = size_sweep(&stub, 1, &sizes, 4, 3, 7).unwrap();

    let params: Vec<u32> = table.rows.iter().map(|row| row.parameter).collect();
    assert_eq!(
        params,
        vec![100, 200, 300, 400, 500, 600, 700, 800, 900, 1000]
    );
}

#[test]
fn all_failing_probe_still_completes_with_sentinel_rows() {
    let stub = StubProbe::failing();
    let table = concurrency_sweep(&stub, &fixed_shape(), &[1, 2, 3, 4], 3, 7, "Threads").unwrap();

    assert_eq!(table.len(), 4);
    assert!(table.rows.iter().all(|row| row.mean_latency == -1.0));
}

#[test]
fn aggregate_returns_constant_for_any_trial_count() {
    for trials in [1, 3, 7] {
        let stub = StubProbe::constant(42);
        let invocation = Invocation {
            concurrency: 1,
            payload: Arc::new(vec![0]),
        };
        assert_eq!(aggregate(&stub, &invocation, trials).unwrap(), 42.0);
    }
}

#[test]
fn one_failure_among_trials_shifts_mean_by_sentinel_policy() {
    let stub = StubProbe::sequence(vec![
        Measurement::Latency(100),
        Measurement::Latency(100),
        Measurement::Failed(ProbeFailure::TimedOut { limit_ms: 50 }),
    ]);
    let invocation = Invocation {
        concurrency: 2,
        payload: Arc::new(vec![0]),
    };
    let mean = aggregate(&stub, &invocation, 3).unwrap();
    // (100 + 100 - 1) / 3: the failed trial is averaged in, not excluded.
    assert!((mean - 199.0 / 3.0).abs() < 1e-12);
}

#[test]
fn contract_violations_are_rejected_before_any_probe_runs() {
    let stub = StubProbe::constant(1);

    // Empty parameter range.
    assert!(concurrency_sweep(&stub, &fixed_shape(), &[], 3, 7, "Threads").is_err());
    // Zero trials.
    assert!(concurrency_sweep(&stub, &fixed_shape(), &[1, 2], 0, 7, "Threads").is_err());
    // Non-positive workload dimensions.
    let bad_shape = WorkloadShape::new(1, 0, 8, 4);
    assert!(concurrency_sweep(&stub, &bad_shape, &[1, 2], 3, 7, "Threads").is_err());
    // Unordered range.
    assert!(size_sweep(&stub, 1, &[200, 100], 4, 3, 7).is_err());

    assert_eq!(stub.calls(), 0);
}

#[test]
fn multi_head_size_sweep_keeps_head_count_fixed() {
    let stub = StubProbe::constant(3);
    let table = size_sweep(&stub, 4, &[10, 20, 30], 4, 2, 7).unwrap();
    assert_eq!(table.len(), 3);
    // Every invocation carries the fixed process count, not the head count.
    assert!(stub.seen_concurrency().iter().all(|&c| c == 4));
}
