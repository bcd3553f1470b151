//! Symmetric inter-region latency matrices.

use std::fmt;

/// An `n × n` table of latencies in milliseconds.
///
/// Invariants: entries are non-negative and the matrix is symmetric
/// (`m[i][j] == m[j][i]`). The diagonal holds the intra-region latency,
/// which may differ from the cross-region entries. Matrices are built once
/// by [`crate::topology::build_matrix`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyMatrix {
    n: usize,
    cells: Vec<f64>,
}

impl LatencyMatrix {
    /// Create an `n × n` matrix with every entry set to `value`.
    pub fn filled(n: usize, value: f64) -> Self {
        Self { n, cells: vec![value; n * n] }
    }

    /// Create a matrix from a row-major table. Rows must be square.
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let n = rows.len();
        let mut cells = Vec::with_capacity(n * n);
        for row in rows {
            debug_assert_eq!(row.len(), n, "latency table must be square");
            cells.extend_from_slice(row);
        }
        Self { n, cells }
    }

    /// Number of regions (rows) in the matrix.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the matrix has no regions.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The latency between regions `i` and `j` in milliseconds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.cells[i * self.n + j]
    }

    /// Set `m[i][j]` and `m[j][i]` to `value`, preserving symmetry.
    pub(crate) fn set_symmetric(&mut self, i: usize, j: usize, value: f64) {
        self.cells[i * self.n + j] = value;
        self.cells[j * self.n + i] = value;
    }

    /// The full latency row for region `i`, as seen from a host in `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.cells[i * self.n..(i + 1) * self.n]
    }

    /// Whether the matrix is symmetric. Holds for every built matrix; used
    /// by tests and debug assertions.
    pub fn is_symmetric(&self) -> bool {
        for i in 0..self.n {
            for j in 0..i {
                if self.get(i, j) != self.get(j, i) {
                    return false;
                }
            }
        }
        true
    }
}

impl fmt::Display for LatencyMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.n {
            for j in 0..self.n {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>7.1}", self.get(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
