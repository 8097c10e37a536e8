//! Incremental basis updates: Forrest–Tomlin and product-form Eta.

use super::factor::{LuError, LuFactorization};
use crate::sparse::{SemiSparseVec, SparseVec};

/// Update strategy, fixed per factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateKind {
    /// Cancel the spike row into U, appending a row eta and a permutation
    /// correction; L stays untouched.
    #[default]
    ForrestTomlin,
    /// Append a product-form eta column; U stays untouched.
    Eta,
}

/// Partial solve retained between `solve_right_for_update` and `update`.
#[derive(Debug, Clone)]
pub(super) enum PendingUpdate {
    /// `L^{-1}` (and prior row etas) applied to the entering column,
    /// indexed by original row. Used by Forrest–Tomlin.
    Spike(Vec<(usize, f64)>),
    /// Full solution `B^{-1} w`, indexed by basis position. Used by Eta.
    Solution(Vec<(usize, f64)>),
}

impl LuFactorization {
    fn note_update_value(&mut self, v: f64) {
        let a = v.abs();
        if a > self.maxabs {
            self.maxabs = a;
        }
    }

    /// Solves `B x = w` and retains the partial result the configured
    /// update kind needs, so a following [`update`](Self::update) is cheap.
    pub fn solve_right_for_update(
        &mut self,
        w: &SparseVec<f64>,
        eps_zero: f64,
    ) -> SemiSparseVec {
        let mut work = vec![0.0; self.dim];
        w.scatter_into(&mut work);
        self.apply_l(&mut work);
        self.apply_ft(&mut work);

        if self.update_kind == UpdateKind::ForrestTomlin {
            let spike: Vec<(usize, f64)> = work
                .iter()
                .enumerate()
                .filter(|(_, v)| v.abs() > self.eps)
                .map(|(i, v)| (i, *v))
                .collect();
            self.pending = Some(PendingUpdate::Spike(spike));
        }

        let mut x = vec![0.0; self.dim];
        self.backsolve_u(&work, &mut x);
        self.apply_etas_right(&mut x);

        if self.update_kind == UpdateKind::Eta {
            let sol: Vec<(usize, f64)> = x
                .iter()
                .enumerate()
                .filter(|(_, v)| v.abs() > self.eps)
                .map(|(i, v)| (i, *v))
                .collect();
            self.pending = Some(PendingUpdate::Solution(sol));
        }

        let mut out = SemiSparseVec::zeros(self.dim, eps_zero);
        for (i, &v) in x.iter().enumerate() {
            if v.abs() > eps_zero {
                out.set_value(i, v);
            }
        }
        out
    }

    /// Discards a pending update vector (pivot was not taken).
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Replaces the basis column at position `pos` with the column passed
    /// to the preceding `solve_right_for_update`.
    pub fn update(&mut self, pos: usize) -> Result<(), LuError> {
        debug_assert!(pos < self.dim);
        let pending = self.pending.take().ok_or(LuError::NoPendingUpdate)?;
        match pending {
            PendingUpdate::Spike(spike) => self.update_forrest_tomlin(pos, &spike),
            PendingUpdate::Solution(sol) => self.update_eta(pos, &sol),
        }
    }

    fn update_eta(&mut self, pos: usize, sol: &[(usize, f64)]) -> Result<(), LuError> {
        let pivot_val = sol
            .iter()
            .find(|&&(i, _)| i == pos)
            .map(|&(_, v)| v)
            .unwrap_or(0.0);
        if pivot_val.abs() <= self.eps {
            return Err(LuError::UnstableUpdate);
        }

        for &(i, v) in sol {
            self.eta_idx.push(i);
            self.eta_vals.push(v);
            self.note_update_value(v);
        }
        self.eta_pos.push(pos);
        self.eta_pivot_val.push(pivot_val);
        self.eta_start.push(self.eta_idx.len());
        self.note_update_value(1.0 / pivot_val);
        self.num_updates += 1;
        Ok(())
    }

    fn update_forrest_tomlin(&mut self, pos: usize, spike: &[(usize, f64)]) -> Result<(), LuError> {
        let dim = self.dim;
        let last = dim - 1;
        let co = pos;
        let cp = self.col_perm[co];
        let rp = self.row_orig[cp];

        // remove the replaced column from U
        let hit_rows = std::mem::take(&mut self.u_cols[co]);
        for r in hit_rows {
            self.u_rows[r].retain(|&(c, _)| c != co);
        }

        // remove the spike row's entries; they are re-gathered for the
        // cancellation below
        let mut scratch = vec![0.0; dim];
        let old_rp_row = std::mem::take(&mut self.u_rows[rp]);
        for &(c, v) in &old_rp_row {
            scratch[c] = v;
            self.u_cols[c].retain(|&rr| rr != rp);
        }

        // permutation correction: rotate positions cp..=last left by one,
        // sending the replaced column and its row to the end
        for p in cp..last {
            let c_next = self.col_orig[p + 1];
            self.col_orig[p] = c_next;
            self.col_perm[c_next] = p;
            let r_next = self.row_orig[p + 1];
            self.row_orig[p] = r_next;
            self.row_perm[r_next] = p;
            self.diag[p] = self.diag[p + 1];
        }
        self.col_orig[last] = co;
        self.col_perm[co] = last;
        self.row_orig[last] = rp;
        self.row_perm[rp] = last;

        // insert the spike as the new last column
        let mut spike_diag = 0.0;
        for &(r, v) in spike {
            if r == rp {
                spike_diag = v;
            } else {
                self.u_rows[r].push((co, v));
                self.u_cols[co].push(r);
                self.note_update_value(v);
            }
        }

        // cancel the spike row left to right, accumulating the row eta
        let mut eta_rows: Vec<usize> = Vec::new();
        let mut eta_vals: Vec<f64> = Vec::new();
        let mut new_diag = spike_diag;

        for q in cp..last {
            let cq = self.col_orig[q];
            let val = scratch[cq];
            scratch[cq] = 0.0;
            if val.abs() <= self.eps {
                continue;
            }
            let rq = self.row_orig[q];
            let mult = val / self.diag[q];
            eta_rows.push(rq);
            eta_vals.push(mult);
            self.note_update_value(mult);

            for &(c2, v) in &self.u_rows[rq] {
                if c2 == co {
                    new_diag -= mult * v;
                } else {
                    scratch[c2] -= mult * v;
                }
            }
        }

        if new_diag.abs() <= self.eps {
            return Err(LuError::UnstableUpdate);
        }
        self.diag[last] = new_diag;
        self.note_update_value(new_diag);

        if !eta_rows.is_empty() {
            for (r, v) in eta_rows.into_iter().zip(eta_vals) {
                self.ft_rows.push(r);
                self.ft_vals.push(v);
            }
            self.ft_pivot.push(rp);
            self.ft_start.push(self.ft_rows.len());
        }

        self.num_updates += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_cols(cols: &[Vec<f64>]) -> Vec<SparseVec<f64>> {
        cols.iter().map(|c| SparseVec::from_dense(c)).collect()
    }

    fn factor_kind(cols: &[Vec<f64>], kind: UpdateKind) -> LuFactorization {
        LuFactorization::factor(&dense_cols(cols), 0.01, 1e-14, kind).expect("factor failed")
    }

    /// Replaces column `pos` in a dense column set.
    fn replace(cols: &[Vec<f64>], pos: usize, w: &[f64]) -> Vec<Vec<f64>> {
        let mut out = cols.to_vec();
        out[pos] = w.to_vec();
        out
    }

    fn check_update_matches_refactor(kind: UpdateKind) {
        let cols = vec![
            vec![2.0, 1.0, 0.0, 0.0],
            vec![1.0, 3.0, 1.0, 0.0],
            vec![0.0, 1.0, 4.0, 1.0],
            vec![0.0, 0.0, 1.0, 5.0],
        ];
        let w = vec![1.0, 0.0, 2.0, 1.0];
        let pos = 1;

        let mut lu = factor_kind(&cols, kind);
        let wv = SparseVec::from_dense(&w);
        let _alpha = lu.solve_right_for_update(&wv, 1e-16);
        lu.update(pos).expect("update failed");

        let fresh = factor_kind(&replace(&cols, pos, &w), kind);

        // solveRight(e_p) must match a from-scratch factorization
        for p in 0..4 {
            let mut e = vec![0.0; 4];
            e[p] = 1.0;
            let xu = lu.solve_right_dense(&e);
            let xf = fresh.solve_right_dense(&e);
            for i in 0..4 {
                assert!(
                    (xu[i] - xf[i]).abs() < 1e-9,
                    "right solve mismatch at e_{} component {}: {} vs {}",
                    p,
                    i,
                    xu[i],
                    xf[i]
                );
            }
            let yu = lu.solve_left_dense(&e);
            let yf = fresh.solve_left_dense(&e);
            for i in 0..4 {
                assert!(
                    (yu[i] - yf[i]).abs() < 1e-9,
                    "left solve mismatch at e_{} component {}",
                    p,
                    i
                );
            }
        }
        assert_eq!(lu.num_updates(), 1);
    }

    #[test]
    fn test_forrest_tomlin_matches_refactor() {
        check_update_matches_refactor(UpdateKind::ForrestTomlin);
    }

    #[test]
    fn test_eta_matches_refactor() {
        check_update_matches_refactor(UpdateKind::Eta);
    }

    #[test]
    fn test_two_successive_updates() {
        let cols = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let mut lu = factor_kind(&cols, UpdateKind::ForrestTomlin);

        let w1 = vec![1.0, 1.0, 0.0];
        let _ = lu.solve_right_for_update(&SparseVec::from_dense(&w1), 1e-16);
        lu.update(0).unwrap();

        let w2 = vec![0.0, 2.0, 1.0];
        let _ = lu.solve_right_for_update(&SparseVec::from_dense(&w2), 1e-16);
        lu.update(1).unwrap();

        let cols2 = vec![w1.clone(), w2.clone(), vec![0.0, 0.0, 1.0]];
        let fresh = factor_kind(&cols2, UpdateKind::ForrestTomlin);

        let b = vec![3.0, -1.0, 2.0];
        let xu = lu.solve_right_dense(&b);
        let xf = fresh.solve_right_dense(&b);
        for i in 0..3 {
            assert!((xu[i] - xf[i]).abs() < 1e-10);
        }
        assert_eq!(lu.num_updates(), 2);
    }

    #[test]
    fn test_update_without_solve_errors() {
        let cols = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let mut lu = factor_kind(&cols, UpdateKind::Eta);
        assert_eq!(lu.update(0).unwrap_err(), LuError::NoPendingUpdate);
    }

    #[test]
    fn test_singular_update_detected() {
        let cols = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let mut lu = factor_kind(&cols, UpdateKind::Eta);
        // replacing column 0 with e_1 makes the basis singular
        let w = SparseVec::from_dense(&[0.0, 1.0]);
        let _ = lu.solve_right_for_update(&w, 1e-16);
        assert_eq!(lu.update(0).unwrap_err(), LuError::UnstableUpdate);
    }

    #[test]
    fn test_stability_degrades_with_growth() {
        let cols = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let mut lu = factor_kind(&cols, UpdateKind::Eta);
        let w = SparseVec::from_dense(&[1e6, 1.0]);
        let _ = lu.solve_right_for_update(&w, 1e-16);
        lu.update(0).unwrap();
        assert!(lu.stability() < 1e-3);
    }
}
