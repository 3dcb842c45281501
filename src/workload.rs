//! Workload synthesis and wire serialization.
//!
//! A workload is an ordered list of attention heads, each holding
//! Query/Key/Value integer matrices. Entries are drawn uniformly from a
//! small fixed range so the external kernels see realistic-but-cheap
//! integer inputs. Generation is seeded and deterministic; two calls with
//! the same shape and seed produce identical workloads.

use std::fmt::Write as _;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};

/// Entry range for synthesized matrices (uniform iid per entry).
const ENTRY_RANGE: std::ops::Range<i64> = 0..10;

/// Row-major integer matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
    /// Row-major entries, `rows * cols` long
    pub data: Vec<i64>,
}

impl Matrix {
    /// Fill a `rows x cols` matrix with uniform entries from the fixed range.
    fn random<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols)
            .map(|_| rng.gen_range(ENTRY_RANGE))
            .collect();
        Self { rows, cols, data }
    }

    /// Entry at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> i64 {
        self.data[row * self.cols + col]
    }
}

/// One attention head: Query, Key and Value matrices.
///
/// Invariant: `query` and `key` share `(rows, cols)`; `value` shares
/// `rows` but carries its own column count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionHead {
    /// Query matrix
    pub query: Matrix,
    /// Key matrix, same shape as `query`
    pub key: Matrix,
    /// Value matrix, same row count as `query`
    pub value: Matrix,
}

/// Dimensions of a workload to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadShape {
    /// Number of attention heads (1 for the single-head kernel)
    pub heads: usize,
    /// Rows of Query/Key/Value
    pub rows: usize,
    /// Columns of Query/Key
    pub cols: usize,
    /// Columns of Value
    pub value_cols: usize,
}

impl WorkloadShape {
    /// Create a shape; validate with [`WorkloadShape::validate`] at the
    /// sweep boundary before synthesizing.
    #[must_use]
    pub fn new(heads: usize, rows: usize, cols: usize, value_cols: usize) -> Self {
        Self {
            heads,
            rows,
            cols,
            value_cols,
        }
    }

    /// Reject non-positive dimensions or an empty head list.
    ///
    /// # Errors
    ///
    /// Returns `MedirError::InvalidParameter` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let offending = if self.heads == 0 {
            Some("heads")
        } else if self.rows == 0 {
            Some("rows")
        } else if self.cols == 0 {
            Some("cols")
        } else if self.value_cols == 0 {
            Some("value_cols")
        } else {
            None
        };
        match offending {
            Some(field) => Err(MedirError::InvalidParameter {
                reason: format!("workload dimension '{field}' must be positive"),
            }),
            None => Ok(()),
        }
    }
}

/// Which wire framing the kernel expects on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Three matrix blocks, no head-count line
    SingleHead,
    /// Leading head-count line, then one block triple per head
    MultiHead,
}

/// One synthesized problem instance, immutable once serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Attention heads in order
    pub heads: Vec<AttentionHead>,
}

impl Workload {
    /// Synthesize a workload from an explicit generator.
    ///
    /// Generation cannot fail; shapes are validated at the sweep boundary,
    /// not here.
    #[must_use]
    pub fn synthesize<R: Rng>(shape: &WorkloadShape, rng: &mut R) -> Self {
        let heads = (0..shape.heads)
            .map(|_| AttentionHead {
                query: Matrix::random(shape.rows, shape.cols, rng),
                key: Matrix::random(shape.rows, shape.cols, rng),
                value: Matrix::random(shape.rows, shape.value_cols, rng),
            })
            .collect();
        Self { heads }
    }

    /// Synthesize from a bare seed (`StdRng::seed_from_u64`).
    #[must_use]
    pub fn from_seed(shape: &WorkloadShape, seed: u64) -> Self {
        Self::synthesize(shape, &mut StdRng::seed_from_u64(seed))
    }

    /// Number of attention heads.
    #[must_use]
    pub fn head_count(&self) -> usize {
        self.heads.len()
    }

    /// Wire framing this workload serializes with.
    #[must_use]
    pub fn wire_format(&self) -> WireFormat {
        if self.heads.len() > 1 {
            WireFormat::MultiHead
        } else {
            WireFormat::SingleHead
        }
    }

    /// Serialize to the line-oriented protocol the kernels read on stdin.
    ///
    /// Per matrix: a `rows cols` header line, then one line of
    /// space-separated entries per row. Multi-head workloads lead with the
    /// head count; blocks concatenate with no separator.
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = String::new();
        if self.wire_format() == WireFormat::MultiHead {
            let _ = writeln!(out, "{}", self.heads.len());
        }
        for head in &self.heads {
            write_matrix(&mut out, &head.query);
            write_matrix(&mut out, &head.key);
            write_matrix(&mut out, &head.value);
        }
        out.into_bytes()
    }

    /// Reference parser: inverse of [`Workload::to_wire`].
    ///
    /// Used by the round-trip tests and for probe-input diagnostics; the
    /// kernels themselves never run this.
    ///
    /// # Errors
    ///
    /// Returns `MedirError::WireParse` on truncated input, non-integer
    /// tokens, non-positive dimensions, trailing garbage, or head blocks
    /// violating the Query/Key/Value shape invariant.
    pub fn parse_wire(input: &str, format: WireFormat) -> Result<Self> {
        let mut tokens = Tokens::new(input);
        let head_count = match format {
            WireFormat::SingleHead => 1,
            WireFormat::MultiHead => tokens.next_dim("head count")?,
        };

        let mut heads = Vec::with_capacity(head_count);
        for index in 0..head_count {
            let query = parse_matrix(&mut tokens)?;
            let key = parse_matrix(&mut tokens)?;
            let value = parse_matrix(&mut tokens)?;

            if key.rows != query.rows || key.cols != query.cols {
                return Err(MedirError::WireParse {
                    reason: format!(
                        "head {index}: key is {}x{} but query is {}x{}",
                        key.rows, key.cols, query.rows, query.cols
                    ),
                });
            }
            if value.rows != query.rows {
                return Err(MedirError::WireParse {
                    reason: format!(
                        "head {index}: value has {} rows but query has {}",
                        value.rows, query.rows
                    ),
                });
            }
            heads.push(AttentionHead { query, key, value });
        }

        if !tokens.finished() {
            return Err(MedirError::WireParse {
                reason: "trailing tokens after final matrix".to_string(),
            });
        }
        Ok(Self { heads })
    }
}

fn write_matrix(out: &mut String, matrix: &Matrix) {
    let _ = writeln!(out, "{} {}", matrix.rows, matrix.cols);
    for row in 0..matrix.rows {
        let entries = &matrix.data[row * matrix.cols..(row + 1) * matrix.cols];
        let line = entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{line}");
    }
}

/// Whitespace token stream over wire input.
struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            inner: input.split_whitespace(),
        }
    }

    fn next_int(&mut self, what: &str) -> Result<i64> {
        let token = self.inner.next().ok_or_else(|| MedirError::WireParse {
            reason: format!("unexpected end of input reading {what}"),
        })?;
        token.parse().map_err(|_| MedirError::WireParse {
            reason: format!("non-integer token '{token}' reading {what}"),
        })
    }

    fn next_dim(&mut self, what: &str) -> Result<usize> {
        let value = self.next_int(what)?;
        usize::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| MedirError::WireParse {
                reason: format!("{what} must be positive, got {value}"),
            })
    }

    fn finished(&mut self) -> bool {
        self.inner.next().is_none()
    }
}

fn parse_matrix(tokens: &mut Tokens<'_>) -> Result<Matrix> {
    let rows = tokens.next_dim("matrix rows")?;
    let cols = tokens.next_dim("matrix cols")?;
    let mut data = Vec::with_capacity(rows * cols);
    for _ in 0..rows * cols {
        data.push(tokens.next_int("matrix entry")?);
    }
    Ok(Matrix { rows, cols, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_share_rows_and_cols() {
        let shape = WorkloadShape::new(3, 5, 4, 2);
        let workload = Workload::from_seed(&shape, 7);

        assert_eq!(workload.head_count(), 3);
        for head in &workload.heads {
            assert_eq!(head.query.rows, 5);
            assert_eq!(head.query.cols, 4);
            assert_eq!(head.key.rows, head.query.rows);
            assert_eq!(head.key.cols, head.query.cols);
            assert_eq!(head.value.rows, head.query.rows);
            assert_eq!(head.value.cols, 2);
        }
    }

    #[test]
    fn test_entries_within_range() {
        let shape = WorkloadShape::new(1, 10, 10, 5);
        let workload = Workload::from_seed(&shape, 0);
        for head in &workload.heads {
            for matrix in [&head.query, &head.key, &head.value] {
                assert!(matrix.data.iter().all(|&v| (0..10).contains(&v)));
            }
        }
    }

    #[test]
    fn test_same_seed_same_workload() {
        let shape = WorkloadShape::new(2, 4, 4, 2);
        assert_eq!(
            Workload::from_seed(&shape, 42),
            Workload::from_seed(&shape, 42)
        );
    }

    #[test]
    fn test_different_seed_different_workload() {
        let shape = WorkloadShape::new(1, 8, 8, 4);
        assert_ne!(
            Workload::from_seed(&shape, 1),
            Workload::from_seed(&shape, 2)
        );
    }

    #[test]
    fn test_single_head_wire_layout() {
        let workload = Workload {
            heads: vec![AttentionHead {
                query: Matrix {
                    rows: 2,
                    cols: 2,
                    data: vec![1, 2, 3, 4],
                },
                key: Matrix {
                    rows: 2,
                    cols: 2,
                    data: vec![5, 6, 7, 8],
                },
                value: Matrix {
                    rows: 2,
                    cols: 1,
                    data: vec![9, 0],
                },
            }],
        };

        let wire = String::from_utf8(workload.to_wire()).unwrap();
        assert_eq!(wire, "2 2\n1 2\n3 4\n2 2\n5 6\n7 8\n2 1\n9\n0\n");
    }

    #[test]
    fn test_multi_head_wire_leads_with_count() {
        let shape = WorkloadShape::new(3, 2, 2, 1);
        let workload = Workload::from_seed(&shape, 9);
        let wire = String::from_utf8(workload.to_wire()).unwrap();
        assert!(wire.starts_with("3\n"));
        assert_eq!(workload.wire_format(), WireFormat::MultiHead);
    }

    #[test]
    fn test_single_head_wire_has_no_count() {
        let shape = WorkloadShape::new(1, 2, 2, 1);
        let workload = Workload::from_seed(&shape, 9);
        let wire = String::from_utf8(workload.to_wire()).unwrap();
        // First line is the query header, not a bare head count.
        assert!(wire.starts_with("2 2\n"));
    }

    #[test]
    fn test_wire_roundtrip_single() {
        let shape = WorkloadShape::new(1, 3, 4, 2);
        let workload = Workload::from_seed(&shape, 11);
        let wire = workload.to_wire();
        let parsed =
            Workload::parse_wire(std::str::from_utf8(&wire).unwrap(), WireFormat::SingleHead)
                .unwrap();
        assert_eq!(workload, parsed);
    }

    #[test]
    fn test_wire_roundtrip_multi() {
        let shape = WorkloadShape::new(4, 3, 3, 2);
        let workload = Workload::from_seed(&shape, 13);
        let wire = workload.to_wire();
        let parsed =
            Workload::parse_wire(std::str::from_utf8(&wire).unwrap(), WireFormat::MultiHead)
                .unwrap();
        assert_eq!(workload, parsed);
    }

    #[test]
    fn test_parse_rejects_truncated_input() {
        let err = Workload::parse_wire("2 2\n1 2\n3", WireFormat::SingleHead).unwrap_err();
        assert!(err.to_string().contains("unexpected end of input"));
    }

    #[test]
    fn test_parse_rejects_non_integer() {
        let err = Workload::parse_wire("2 x\n", WireFormat::SingleHead).unwrap_err();
        assert!(err.to_string().contains("non-integer"));
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        let wire = "1 1\n5\n1 1\n6\n1 1\n7\n99\n";
        let err = Workload::parse_wire(wire, WireFormat::SingleHead).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_parse_rejects_shape_mismatch() {
        // Key block is 1x2, query is 1x1.
        let wire = "1 1\n5\n1 2\n6 7\n1 1\n8\n";
        let err = Workload::parse_wire(wire, WireFormat::SingleHead).unwrap_err();
        assert!(err.to_string().contains("key"));
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        assert!(WorkloadShape::new(0, 2, 2, 2).validate().is_err());
        assert!(WorkloadShape::new(1, 0, 2, 2).validate().is_err());
        assert!(WorkloadShape::new(1, 2, 0, 2).validate().is_err());
        assert!(WorkloadShape::new(1, 2, 2, 0).validate().is_err());
        assert!(WorkloadShape::new(1, 2, 2, 2).validate().is_ok());
    }

    #[test]
    fn test_matrix_get() {
        let matrix = Matrix {
            rows: 2,
            cols: 3,
            data: vec![0, 1, 2, 3, 4, 5],
        };
        assert_eq!(matrix.get(0, 0), 0);
        assert_eq!(matrix.get(1, 2), 5);
    }
}
