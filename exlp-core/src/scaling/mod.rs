//! Equilibration scaling of the floating LP.
//!
//! Bi-equilibration runs one infinity-norm pass over the rows followed by
//! one over the columns, so every scaled row and column has maximum
//! absolute value one. The factors are kept exact enough to unscale
//! solutions: primal values multiply by the column factor, duals by the
//! row factor. Scaling applies only to the floating side; the rational LP
//! is never scaled.

use crate::sparse::SparseVec;

/// Row and column scaling factors applied as `A' = R A C`.
#[derive(Debug, Clone)]
pub struct ScaleFactors {
    pub row: Vec<f64>,
    pub col: Vec<f64>,
}

impl ScaleFactors {
    /// No-op scaling.
    pub fn identity(num_rows: usize, num_cols: usize) -> Self {
        Self {
            row: vec![1.0; num_rows],
            col: vec![1.0; num_cols],
        }
    }

    /// Computes bi-equilibration factors from the unscaled columns.
    pub fn biequi(columns: &[SparseVec<f64>], num_rows: usize) -> Self {
        let mut row_max = vec![0.0_f64; num_rows];
        for col in columns {
            for (i, &v) in col.iter() {
                row_max[i] = row_max[i].max(v.abs());
            }
        }
        let row: Vec<f64> = row_max
            .iter()
            .map(|&m| if m > 0.0 { 1.0 / m } else { 1.0 })
            .collect();

        let col: Vec<f64> = columns
            .iter()
            .map(|c| {
                let m = c
                    .iter()
                    .map(|(i, &v)| (v * row[i]).abs())
                    .fold(0.0_f64, f64::max);
                if m > 0.0 {
                    1.0 / m
                } else {
                    1.0
                }
            })
            .collect();

        Self { row, col }
    }

    /// Scaled value of one matrix entry.
    #[inline]
    pub fn entry(&self, r: usize, c: usize, v: f64) -> f64 {
        v * self.row[r] * self.col[c]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let s = ScaleFactors::identity(2, 3);
        assert_eq!(s.row, vec![1.0, 1.0]);
        assert_eq!(s.col, vec![1.0; 3]);
        assert_eq!(s.entry(0, 1, 5.0), 5.0);
    }

    #[test]
    fn test_biequi_normalizes() {
        // A = [[100, 1], [0, 0.01]]
        let cols = vec![
            SparseVec::from_pairs(vec![(0, 100.0)]),
            SparseVec::from_pairs(vec![(0, 1.0), (1, 0.01)]),
        ];
        let s = ScaleFactors::biequi(&cols, 2);

        // every scaled row and column has max abs <= 1, with at least one
        // entry at 1 per column
        for (j, col) in cols.iter().enumerate() {
            let m = col
                .iter()
                .map(|(i, &v)| s.entry(i, j, v).abs())
                .fold(0.0_f64, f64::max);
            assert!((m - 1.0).abs() < 1e-12, "column {} max {}", j, m);
        }
    }

    #[test]
    fn test_empty_row_gets_unit_factor() {
        let cols = vec![SparseVec::from_pairs(vec![(0, 2.0)])];
        let s = ScaleFactors::biequi(&cols, 3);
        assert_eq!(s.row[1], 1.0);
        assert_eq!(s.row[2], 1.0);
    }
}
