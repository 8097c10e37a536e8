//! Markowitz-threshold sparse LU factorization and triangular solves.

use thiserror::Error;

use super::dring::CountRings;
use super::update::{PendingUpdate, UpdateKind};
use crate::sparse::{SemiSparseVec, SparseVec};

/// Factorization and update errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LuError {
    /// No admissible pivot exists; the matrix is singular at the current
    /// threshold.
    #[error("basis matrix is singular")]
    Singular,

    /// Input columns do not form a square matrix of the stated dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },

    /// An incremental update produced a zero pivot; refactorization is
    /// required.
    #[error("update produced an unusable pivot")]
    UnstableUpdate,

    /// Update requested without a preceding `solve_right_for_update`.
    #[error("no pending update vector")]
    NoPendingUpdate,
}

/// Sparse LU factors of a square basis matrix `B`, with permutations
/// `P B Q = L U`.
///
/// `U` is held both row-major (with values) and column-major (pattern
/// only, for the update spike removal); `L` is the ordered sequence of
/// pivot eta columns from the elimination. Incremental updates append
/// either Forrest–Tomlin row etas plus a permutation correction, or
/// product-form Eta columns; the update kind is fixed per factorization.
///
/// Cloning performs a full arena copy; factors are never shared.
#[derive(Debug, Clone)]
pub struct LuFactorization {
    pub(super) dim: usize,
    pub(super) eps: f64,

    // permutations: position <-> original index
    pub(super) row_orig: Vec<usize>,
    pub(super) row_perm: Vec<usize>,
    pub(super) col_orig: Vec<usize>,
    pub(super) col_perm: Vec<usize>,

    // L eta columns, append-only
    pub(super) l_pivot: Vec<usize>,
    pub(super) l_start: Vec<usize>,
    pub(super) l_rows: Vec<usize>,
    pub(super) l_vals: Vec<f64>,

    // U: strictly-right-of-diagonal entries per original row, keyed by
    // original column; diag by position
    pub(super) u_rows: Vec<Vec<(usize, f64)>>,
    pub(super) u_cols: Vec<Vec<usize>>,
    pub(super) diag: Vec<f64>,

    // incremental updates
    pub(super) update_kind: UpdateKind,
    pub(super) num_updates: u32,
    pub(super) ft_pivot: Vec<usize>,
    pub(super) ft_start: Vec<usize>,
    pub(super) ft_rows: Vec<usize>,
    pub(super) ft_vals: Vec<f64>,
    pub(super) eta_pos: Vec<usize>,
    pub(super) eta_start: Vec<usize>,
    pub(super) eta_idx: Vec<usize>,
    pub(super) eta_vals: Vec<f64>,
    pub(super) eta_pivot_val: Vec<f64>,

    // stability tracking
    pub(super) init_maxabs: f64,
    pub(super) maxabs: f64,

    pub(super) pending: Option<PendingUpdate>,
}

impl LuFactorization {
    /// Factorizes the matrix whose columns are given, using Markowitz
    /// pivoting with the given threshold `theta` in `[0, 1]`.
    pub fn factor(
        columns: &[SparseVec<f64>],
        theta: f64,
        eps: f64,
        update_kind: UpdateKind,
    ) -> Result<Self, LuError> {
        let dim = columns.len();
        for col in columns {
            if col.min_dim() > dim {
                return Err(LuError::DimensionMismatch {
                    expected: dim,
                    actual: col.min_dim(),
                });
            }
        }

        let mut lu = Self {
            dim,
            eps,
            row_orig: vec![usize::MAX; dim],
            row_perm: vec![usize::MAX; dim],
            col_orig: vec![usize::MAX; dim],
            col_perm: vec![usize::MAX; dim],
            l_pivot: Vec::new(),
            l_start: vec![0],
            l_rows: Vec::new(),
            l_vals: Vec::new(),
            u_rows: vec![Vec::new(); dim],
            u_cols: vec![Vec::new(); dim],
            diag: vec![0.0; dim],
            update_kind,
            num_updates: 0,
            ft_pivot: Vec::new(),
            ft_start: vec![0],
            ft_rows: Vec::new(),
            ft_vals: Vec::new(),
            eta_pos: Vec::new(),
            eta_start: vec![0],
            eta_idx: Vec::new(),
            eta_vals: Vec::new(),
            eta_pivot_val: Vec::new(),
            init_maxabs: 0.0,
            maxabs: 0.0,
            pending: None,
        };

        lu.eliminate(columns, theta)?;

        lu.init_maxabs = lu.init_maxabs.max(1e-300);
        lu.maxabs = lu.init_maxabs;
        Ok(lu)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn update_kind(&self) -> UpdateKind {
        self.update_kind
    }

    pub fn num_updates(&self) -> u32 {
        self.num_updates
    }

    /// Stability metric `initMaxabs / maxabs`, clamped to `[0, 1]`. Falls
    /// as update growth inflates the factors.
    pub fn stability(&self) -> f64 {
        if self.maxabs <= 0.0 {
            return 0.0;
        }
        (self.init_maxabs / self.maxabs).clamp(0.0, 1.0)
    }

    fn note_value(&mut self, v: f64) {
        let a = v.abs();
        if a > self.init_maxabs {
            self.init_maxabs = a;
        }
    }

    // ---- elimination ---------------------------------------------------

    fn eliminate(&mut self, columns: &[SparseVec<f64>], theta: f64) -> Result<(), LuError> {
        let dim = self.dim;
        if dim == 0 {
            return Ok(());
        }

        // working matrix: rows with values, column patterns
        let mut wrows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); dim];
        let mut wcols: Vec<Vec<usize>> = vec![Vec::new(); dim];

        for (j, col) in columns.iter().enumerate() {
            for (i, &v) in col.iter() {
                if v.abs() > self.eps {
                    wrows[i].push((j, v));
                    wcols[j].push(i);
                    self.note_value(v);
                }
            }
        }

        let mut row_active = vec![true; dim];
        let mut col_active = vec![true; dim];

        let mut row_rings = CountRings::new(dim);
        let mut col_rings = CountRings::new(dim);
        for r in 0..dim {
            if wrows[r].is_empty() {
                return Err(LuError::Singular);
            }
            row_rings.insert(r, wrows[r].len());
        }
        for c in 0..dim {
            if wcols[c].is_empty() {
                return Err(LuError::Singular);
            }
            col_rings.insert(c, wcols[c].len());
        }

        // scratch for the pivot row scatter and fill-in detection
        let mut scratch = vec![0.0; dim];
        let mut stamp = vec![0u32; dim];
        let mut cur_stamp = 0u32;

        for step in 0..dim {
            let (pr, pc, pval) = self.select_pivot(
                theta,
                &wrows,
                &wcols,
                &row_rings,
                &col_rings,
                &row_active,
                &col_active,
            )?;

            self.row_orig[step] = pr;
            self.row_perm[pr] = step;
            self.col_orig[step] = pc;
            self.col_perm[pc] = step;
            self.diag[step] = pval;

            row_active[pr] = false;
            col_active[pc] = false;
            row_rings.remove(pr);
            col_rings.remove(pc);

            // scatter the pivot row (active columns only)
            cur_stamp += 1;
            for &(c, v) in &wrows[pr] {
                if col_active[c] {
                    scratch[c] = v;
                    stamp[c] = cur_stamp;
                }
            }

            // rows to eliminate: every active row with an entry in pc
            let victims: Vec<usize> = wcols[pc]
                .iter()
                .copied()
                .filter(|&r| row_active[r])
                .collect();

            for &r in &victims {
                let val = wrows[r]
                    .iter()
                    .find(|&&(c, _)| c == pc)
                    .map(|&(_, v)| v)
                    .expect("column pattern out of sync");
                let mult = val / pval;

                self.l_rows.push(r);
                self.l_vals.push(mult);
                self.note_value(mult);

                // row_r -= mult * pivot_row
                let mut touched: Vec<usize> = Vec::with_capacity(wrows[pr].len());
                let old_row = std::mem::take(&mut wrows[r]);
                let mut new_row = Vec::with_capacity(old_row.len());

                for (c, v) in old_row {
                    if c == pc {
                        continue;
                    }
                    if stamp[c] == cur_stamp && col_active[c] {
                        let nv = v - mult * scratch[c];
                        touched.push(c);
                        if nv.abs() > self.eps {
                            self.note_value(nv);
                            new_row.push((c, nv));
                        } else {
                            // cancellation: drop from the column pattern
                            wcols[c].retain(|&rr| rr != r);
                            col_rings.relink(c, wcols[c].len());
                        }
                    } else {
                        new_row.push((c, v));
                    }
                }

                // fill-in from untouched pivot-row columns
                for &(c, pv) in &wrows[pr] {
                    if c == pc || !col_active[c] {
                        continue;
                    }
                    if touched.contains(&c) {
                        continue;
                    }
                    let nv = -mult * pv;
                    if nv.abs() > self.eps {
                        self.note_value(nv);
                        new_row.push((c, nv));
                        wcols[c].push(r);
                        col_rings.relink(c, wcols[c].len());
                    }
                }

                wrows[r] = new_row;
                if wrows[r].is_empty() {
                    return Err(LuError::Singular);
                }
                row_rings.relink(r, wrows[r].len());
            }

            self.l_pivot.push(pr);
            self.l_start.push(self.l_rows.len());

            // finalize the pivot row into U and retire its pattern
            let pivot_row = std::mem::take(&mut wrows[pr]);
            for (c, v) in pivot_row {
                if c != pc && col_active[c] {
                    self.u_rows[pr].push((c, v));
                    wcols[c].retain(|&rr| rr != pr);
                    if wcols[c].is_empty() {
                        return Err(LuError::Singular);
                    }
                    col_rings.relink(c, wcols[c].len());
                }
            }
            wcols[pc].clear();
        }

        // rebuild the column-major pattern of U from the finalized rows
        for r in 0..dim {
            for &(c, _) in &self.u_rows[r] {
                self.u_cols[c].push(r);
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn select_pivot(
        &self,
        theta: f64,
        wrows: &[Vec<(usize, f64)>],
        wcols: &[Vec<usize>],
        row_rings: &CountRings,
        col_rings: &CountRings,
        row_active: &[bool],
        col_active: &[bool],
    ) -> Result<(usize, usize, f64), LuError> {
        let dim = self.dim;
        let mut best: Option<(usize, usize, usize, f64)> = None; // cost, row, col, val

        let row_max = |r: usize| -> f64 {
            wrows[r]
                .iter()
                .filter(|&&(c, _)| col_active[c])
                .map(|&(_, v)| v.abs())
                .fold(0.0_f64, f64::max)
        };

        let consider = |cost: usize, r: usize, c: usize, v: f64, best: &mut Option<(usize, usize, usize, f64)>| {
            let better = match best {
                None => true,
                Some((bcost, brow, _, _)) => cost < *bcost || (cost == *bcost && r < *brow),
            };
            if better {
                *best = Some((cost, r, c, v));
            }
        };

        for k in 1..=dim {
            for r in row_rings.bucket(k) {
                let rmax = row_max(r);
                if rmax <= 0.0 {
                    continue;
                }
                for &(c, v) in &wrows[r] {
                    if !col_active[c] {
                        continue;
                    }
                    if v.abs() >= theta * rmax {
                        let cost = (k - 1) * (wcols[c].len() - 1);
                        consider(cost, r, c, v, &mut best);
                    }
                }
            }

            for c in col_rings.bucket(k) {
                for &r in &wcols[c] {
                    if !row_active[r] {
                        continue;
                    }
                    let rmax = row_max(r);
                    if rmax <= 0.0 {
                        continue;
                    }
                    let v = wrows[r]
                        .iter()
                        .find(|&&(cc, _)| cc == c)
                        .map(|&(_, v)| v)
                        .unwrap_or(0.0);
                    if v != 0.0 && v.abs() >= theta * rmax {
                        let cost = (wrows[r].len() - 1) * (k - 1);
                        consider(cost, r, c, v, &mut best);
                    }
                }
            }

            if let Some((cost, _, _, _)) = best {
                // a candidate from bucket k can never beat cost (k-1)^2 in
                // later buckets
                if cost <= (k - 1) * (k - 1) {
                    break;
                }
            }
        }

        match best {
            Some((_, r, c, v)) => Ok((r, c, v)),
            None => Err(LuError::Singular),
        }
    }

    // ---- solves --------------------------------------------------------

    /// Applies `L^{-1}` in elimination order.
    pub(super) fn apply_l(&self, work: &mut [f64]) {
        for e in 0..self.l_pivot.len() {
            let xp = work[self.l_pivot[e]];
            if xp == 0.0 {
                continue;
            }
            for k in self.l_start[e]..self.l_start[e + 1] {
                work[self.l_rows[k]] -= self.l_vals[k] * xp;
            }
        }
    }

    /// Applies `L^{-T}` in reverse elimination order.
    pub(super) fn apply_l_transposed(&self, work: &mut [f64]) {
        for e in (0..self.l_pivot.len()).rev() {
            let mut acc = 0.0;
            for k in self.l_start[e]..self.l_start[e + 1] {
                acc += self.l_vals[k] * work[self.l_rows[k]];
            }
            work[self.l_pivot[e]] -= acc;
        }
    }

    /// Applies the Forrest–Tomlin row etas in creation order.
    pub(super) fn apply_ft(&self, work: &mut [f64]) {
        for e in 0..self.ft_pivot.len() {
            let mut acc = 0.0;
            for k in self.ft_start[e]..self.ft_start[e + 1] {
                acc += self.ft_vals[k] * work[self.ft_rows[k]];
            }
            work[self.ft_pivot[e]] -= acc;
        }
    }

    /// Applies the transposed row etas in reverse creation order.
    pub(super) fn apply_ft_transposed(&self, work: &mut [f64]) {
        for e in (0..self.ft_pivot.len()).rev() {
            let xp = work[self.ft_pivot[e]];
            if xp == 0.0 {
                continue;
            }
            for k in self.ft_start[e]..self.ft_start[e + 1] {
                work[self.ft_rows[k]] -= self.ft_vals[k] * xp;
            }
        }
    }

    /// Back substitution `x = U^{-1} work`, reading by row and writing by
    /// column position.
    pub(super) fn backsolve_u(&self, work: &[f64], x: &mut [f64]) {
        for p in (0..self.dim).rev() {
            let r = self.row_orig[p];
            let c = self.col_orig[p];
            let mut acc = work[r];
            for &(cc, v) in &self.u_rows[r] {
                acc -= v * x[cc];
            }
            x[c] = acc / self.diag[p];
        }
    }

    /// Forward substitution `z = U^{-T} work` (destroys `work`).
    pub(super) fn forward_solve_ut(&self, work: &mut [f64], z: &mut [f64]) {
        for p in 0..self.dim {
            let r = self.row_orig[p];
            let c = self.col_orig[p];
            let zp = work[c] / self.diag[p];
            z[r] = zp;
            if zp != 0.0 {
                for &(cc, v) in &self.u_rows[r] {
                    work[cc] -= v * zp;
                }
            }
        }
    }

    /// Applies the product-form eta updates to a right solve, in creation
    /// order.
    pub(super) fn apply_etas_right(&self, x: &mut [f64]) {
        for e in 0..self.eta_pos.len() {
            let p = self.eta_pos[e];
            let xp = x[p] / self.eta_pivot_val[e];
            x[p] = xp;
            if xp != 0.0 {
                for k in self.eta_start[e]..self.eta_start[e + 1] {
                    let i = self.eta_idx[k];
                    if i != p {
                        x[i] -= self.eta_vals[k] * xp;
                    }
                }
            }
        }
    }

    /// Applies the transposed eta updates to a left solve, in reverse
    /// creation order.
    pub(super) fn apply_etas_left(&self, c: &mut [f64]) {
        for e in (0..self.eta_pos.len()).rev() {
            let p = self.eta_pos[e];
            let mut acc = c[p];
            for k in self.eta_start[e]..self.eta_start[e + 1] {
                let i = self.eta_idx[k];
                if i != p {
                    acc -= self.eta_vals[k] * c[i];
                }
            }
            c[p] = acc / self.eta_pivot_val[e];
        }
    }

    /// Solves `B x = b` with a dense right-hand side.
    pub fn solve_right_dense(&self, b: &[f64]) -> Vec<f64> {
        debug_assert_eq!(b.len(), self.dim);
        let mut work = b.to_vec();
        self.apply_l(&mut work);
        self.apply_ft(&mut work);
        let mut x = vec![0.0; self.dim];
        self.backsolve_u(&work, &mut x);
        self.apply_etas_right(&mut x);
        x
    }

    /// Solves `B x = b` with a sparse right-hand side, producing a
    /// semi-sparse result.
    pub fn solve_right_sparse(&self, b: &SparseVec<f64>, eps_zero: f64) -> SemiSparseVec {
        let mut work = vec![0.0; self.dim];
        b.scatter_into(&mut work);
        self.apply_l(&mut work);
        self.apply_ft(&mut work);
        let mut x = vec![0.0; self.dim];
        self.backsolve_u(&work, &mut x);
        self.apply_etas_right(&mut x);

        let mut out = SemiSparseVec::zeros(self.dim, eps_zero);
        for (i, &v) in x.iter().enumerate() {
            if v.abs() > eps_zero {
                out.set_value(i, v);
            }
        }
        out
    }

    /// Solves `Bᵀ y = c` with a dense right-hand side.
    pub fn solve_left_dense(&self, c: &[f64]) -> Vec<f64> {
        debug_assert_eq!(c.len(), self.dim);
        let mut work = c.to_vec();
        self.apply_etas_left(&mut work);
        let mut z = vec![0.0; self.dim];
        self.forward_solve_ut(&mut work, &mut z);
        self.apply_ft_transposed(&mut z);
        self.apply_l_transposed(&mut z);
        z
    }

    /// Solves `Bᵀ y = c` with a sparse right-hand side.
    pub fn solve_left_sparse(&self, c: &SparseVec<f64>, eps_zero: f64) -> SemiSparseVec {
        let mut work = vec![0.0; self.dim];
        c.scatter_into(&mut work);
        self.apply_etas_left(&mut work);
        let mut z = vec![0.0; self.dim];
        self.forward_solve_ut(&mut work, &mut z);
        self.apply_ft_transposed(&mut z);
        self.apply_l_transposed(&mut z);

        let mut out = SemiSparseVec::zeros(self.dim, eps_zero);
        for (i, &v) in z.iter().enumerate() {
            if v.abs() > eps_zero {
                out.set_value(i, v);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_cols(cols: &[Vec<f64>]) -> Vec<SparseVec<f64>> {
        cols.iter().map(|c| SparseVec::from_dense(c)).collect()
    }

    fn factor(cols: &[Vec<f64>]) -> LuFactorization {
        LuFactorization::factor(&dense_cols(cols), 0.01, 1e-14, UpdateKind::ForrestTomlin)
            .expect("factorization failed")
    }

    fn mat_vec(cols: &[Vec<f64>], x: &[f64]) -> Vec<f64> {
        let n = cols[0].len();
        let mut out = vec![0.0; n];
        for (j, col) in cols.iter().enumerate() {
            for i in 0..n {
                out[i] += col[i] * x[j];
            }
        }
        out
    }

    fn mat_t_vec(cols: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
        cols.iter()
            .map(|col| col.iter().zip(y).map(|(a, b)| a * b).sum())
            .collect()
    }

    #[test]
    fn test_identity() {
        let cols = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let lu = factor(&cols);
        let x = lu.solve_right_dense(&[3.0, 4.0]);
        assert_eq!(x, vec![3.0, 4.0]);
        let y = lu.solve_left_dense(&[5.0, 6.0]);
        assert_eq!(y, vec![5.0, 6.0]);
    }

    #[test]
    fn test_solve_right_general() {
        let cols = vec![
            vec![2.0, 1.0, 0.0],
            vec![1.0, 3.0, 1.0],
            vec![0.0, 1.0, 4.0],
        ];
        let lu = factor(&cols);
        let b = vec![5.0, 10.0, 13.0];
        let x = lu.solve_right_dense(&b);
        let back = mat_vec(&cols, &x);
        for i in 0..3 {
            assert!((back[i] - b[i]).abs() < 1e-10, "residual at {}", i);
        }
    }

    #[test]
    fn test_solve_left_general() {
        let cols = vec![
            vec![2.0, 1.0, 0.0],
            vec![1.0, 3.0, 1.0],
            vec![-1.0, 1.0, 4.0],
        ];
        let lu = factor(&cols);
        let c = vec![1.0, -2.0, 3.0];
        let y = lu.solve_left_dense(&c);
        let back = mat_t_vec(&cols, &y);
        for j in 0..3 {
            assert!((back[j] - c[j]).abs() < 1e-10, "residual at {}", j);
        }
    }

    #[test]
    fn test_singular_detected() {
        let cols = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let res = LuFactorization::factor(
            &dense_cols(&cols),
            0.01,
            1e-14,
            UpdateKind::ForrestTomlin,
        );
        assert_eq!(res.unwrap_err(), LuError::Singular);
    }

    #[test]
    fn test_structurally_singular() {
        let cols = vec![vec![1.0, 0.0], vec![0.0, 0.0]];
        let res = LuFactorization::factor(
            &dense_cols(&cols),
            0.01,
            1e-14,
            UpdateKind::ForrestTomlin,
        );
        assert_eq!(res.unwrap_err(), LuError::Singular);
    }

    #[test]
    fn test_sparse_rhs_matches_dense() {
        let cols = vec![
            vec![3.0, 1.0, 0.0, 0.0],
            vec![0.0, 2.0, 1.0, 0.0],
            vec![1.0, 0.0, 4.0, 1.0],
            vec![0.0, 0.0, 0.0, 5.0],
        ];
        let lu = factor(&cols);
        let sparse_b = SparseVec::from_pairs(vec![(1, 2.0)]);
        let dense_b = vec![0.0, 2.0, 0.0, 0.0];

        let xs = lu.solve_right_sparse(&sparse_b, 1e-16);
        let xd = lu.solve_right_dense(&dense_b);
        for i in 0..4 {
            assert!((xs.value(i) - xd[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_stability_starts_at_one() {
        let cols = vec![vec![2.0, 0.0], vec![1.0, 1.0]];
        let lu = factor(&cols);
        assert!((lu.stability() - 1.0).abs() < 1e-12);
    }
}
