//! Property tests for the wire protocol: serializing a workload and
//! parsing it back through the reference parser must reproduce the
//! matrices exactly.

use medir::workload::{WireFormat, Workload, WorkloadShape};
use proptest::prelude::*;

proptest! {
    #[test]
    fn wire_roundtrip_reproduces_workload(
        heads in 1usize..5,
        rows in 1usize..8,
        cols in 1usize..8,
        value_cols in 1usize..8,
        seed in any::<u64>(),
    ) {
        let shape = WorkloadShape::new(heads, rows, cols, value_cols);
        let workload = Workload::from_seed(&shape, seed);

        let wire = workload.to_wire();
        let text = std::str::from_utf8(&wire).unwrap();
        let format = if heads > 1 {
            WireFormat::MultiHead
        } else {
            WireFormat::SingleHead
        };
        let parsed = Workload::parse_wire(text, format).unwrap();

        prop_assert_eq!(workload, parsed);
    }

    #[test]
    fn wire_is_ascii_lines_of_integers(
        rows in 1usize..6,
        cols in 1usize..6,
        seed in any::<u64>(),
    ) {
        let shape = WorkloadShape::new(1, rows, cols, cols);
        let wire = Workload::from_seed(&shape, seed).to_wire();
        let text = std::str::from_utf8(&wire).unwrap();

        prop_assert!(text.ends_with('\n'));
        for line in text.lines() {
            for token in line.split_whitespace() {
                prop_assert!(token.parse::<i64>().is_ok());
            }
        }
    }

    #[test]
    fn same_seed_is_deterministic(
        heads in 1usize..4,
        side in 1usize..6,
        seed in any::<u64>(),
    ) {
        let shape = WorkloadShape::new(heads, side, side, side);
        prop_assert_eq!(
            Workload::from_seed(&shape, seed).to_wire(),
            Workload::from_seed(&shape, seed).to_wire()
        );
    }
}
