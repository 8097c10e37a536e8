//! Basis solver adapter around the floating LU factorization.

use crate::lu::{LuError, LuFactorization, UpdateKind};
use crate::sparse::{SemiSparseVec, SparseVec};

/// Owns the LU factors of the current basis matrix together with the
/// refactorization policy: the Markowitz threshold ladder, the update
/// budget, and the stability watermark.
#[derive(Debug, Clone)]
pub struct BasisSolver {
    lu: Option<LuFactorization>,
    update_kind: UpdateKind,

    markowitz: f64,
    eps_factor: f64,
    eps_zero: f64,
    max_updates: u32,
    min_stability: f64,

    factor_count: u64,
}

impl BasisSolver {
    pub fn new(
        update_kind: UpdateKind,
        min_markowitz: f64,
        eps_factor: f64,
        eps_zero: f64,
        max_updates: u32,
        min_stability: f64,
    ) -> Self {
        Self {
            lu: None,
            update_kind,
            markowitz: min_markowitz,
            eps_factor,
            eps_zero,
            max_updates,
            min_stability,
            factor_count: 0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.lu.is_some()
    }

    pub fn factor_count(&self) -> u64 {
        self.factor_count
    }

    pub fn num_updates(&self) -> u32 {
        self.lu.as_ref().map_or(0, |lu| lu.num_updates())
    }

    /// Current Markowitz threshold.
    pub fn markowitz(&self) -> f64 {
        self.markowitz
    }

    /// Sets the threshold directly (recovery ladder).
    pub fn set_markowitz(&mut self, theta: f64) {
        self.markowitz = theta.clamp(0.0, 0.99999);
    }

    /// Raises the pivot threshold one step: times ten up to 0.1, then
    /// halving the distance to one, capped at 0.99999.
    pub fn better_threshold(&mut self) {
        let t = self.markowitz;
        self.markowitz = if t < 0.1 {
            (t * 10.0).min(0.1)
        } else {
            ((t + 1.0) / 2.0).min(0.99999)
        };
    }

    /// Drops the factorization; the next load starts from scratch.
    pub fn clear(&mut self) {
        self.lu = None;
    }

    /// Factors the given basis matrix columns, retrying with a raised
    /// threshold on singularity before giving up.
    pub fn load(&mut self, columns: &[SparseVec<f64>]) -> Result<(), LuError> {
        let mut attempts = 0;
        loop {
            match LuFactorization::factor(columns, self.markowitz, self.eps_factor, self.update_kind)
            {
                Ok(lu) => {
                    self.lu = Some(lu);
                    self.factor_count += 1;
                    return Ok(());
                }
                Err(LuError::Singular) if attempts < 2 => {
                    attempts += 1;
                    self.better_threshold();
                }
                Err(e) => {
                    self.lu = None;
                    return Err(e);
                }
            }
        }
    }

    /// Stability of the current factors; 0 when nothing is loaded.
    pub fn stability(&self) -> f64 {
        self.lu.as_ref().map_or(0.0, |lu| lu.stability())
    }

    /// True when the update budget is exhausted or stability dropped
    /// below the watermark; the owner must refactor before pivoting on.
    pub fn needs_refactor(&self) -> bool {
        match &self.lu {
            None => true,
            Some(lu) => {
                lu.num_updates() >= self.max_updates || lu.stability() < self.min_stability
            }
        }
    }

    /// True when stability fell below the watermark; the refinement
    /// driver should also raise the threshold in that case.
    pub fn stability_lost(&self) -> bool {
        self.lu
            .as_ref()
            .is_some_and(|lu| lu.stability() < self.min_stability)
    }

    fn lu(&self) -> &LuFactorization {
        self.lu.as_ref().expect("basis solver used before load")
    }

    pub fn solve_right_dense(&self, b: &[f64]) -> Vec<f64> {
        self.lu().solve_right_dense(b)
    }

    pub fn solve_right_sparse(&self, b: &SparseVec<f64>) -> SemiSparseVec {
        self.lu().solve_right_sparse(b, self.eps_zero)
    }

    pub fn solve_left_dense(&self, c: &[f64]) -> Vec<f64> {
        self.lu().solve_left_dense(c)
    }

    pub fn solve_left_sparse(&self, c: &SparseVec<f64>) -> SemiSparseVec {
        self.lu().solve_left_sparse(c, self.eps_zero)
    }

    /// Solves for the entering column and retains the update vector.
    pub fn solve_right_for_update(&mut self, w: &SparseVec<f64>) -> SemiSparseVec {
        let eps_zero = self.eps_zero;
        self.lu
            .as_mut()
            .expect("basis solver used before load")
            .solve_right_for_update(w, eps_zero)
    }

    /// Applies the retained update at basis position `pos`.
    pub fn update(&mut self, pos: usize) -> Result<(), LuError> {
        self.lu
            .as_mut()
            .expect("basis solver used before load")
            .update(pos)
    }

    /// Discards a retained update vector.
    pub fn clear_pending(&mut self) {
        if let Some(lu) = self.lu.as_mut() {
            lu.clear_pending();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> BasisSolver {
        BasisSolver::new(UpdateKind::ForrestTomlin, 0.01, 1e-14, 1e-16, 4, 1e-6)
    }

    fn identity_cols(n: usize) -> Vec<SparseVec<f64>> {
        (0..n)
            .map(|i| SparseVec::from_pairs(vec![(i, 1.0)]))
            .collect()
    }

    #[test]
    fn test_threshold_ladder() {
        let mut s = solver();
        assert_eq!(s.markowitz(), 0.01);
        s.better_threshold();
        assert!((s.markowitz() - 0.1).abs() < 1e-12);
        s.better_threshold();
        assert!((s.markowitz() - 0.55).abs() < 1e-12);
        for _ in 0..40 {
            s.better_threshold();
        }
        assert!((s.markowitz() - 0.99999).abs() < 1e-9);
    }

    #[test]
    fn test_load_and_solve() {
        let mut s = solver();
        s.load(&identity_cols(3)).unwrap();
        assert!(s.is_loaded());
        assert_eq!(s.factor_count(), 1);
        let x = s.solve_right_dense(&[1.0, 2.0, 3.0]);
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_update_budget_forces_refactor() {
        let mut s = solver();
        s.load(&identity_cols(3)).unwrap();
        assert!(!s.needs_refactor());

        for k in 0..4 {
            let w = SparseVec::from_pairs(vec![(k % 3, 2.0), ((k + 1) % 3, 1.0)]);
            let _ = s.solve_right_for_update(&w);
            s.update(k % 3).unwrap();
        }
        assert!(s.needs_refactor());
    }

    #[test]
    fn test_singular_after_retries() {
        let mut s = solver();
        let cols = vec![
            SparseVec::from_pairs(vec![(0, 1.0), (1, 2.0)]),
            SparseVec::from_pairs(vec![(0, 2.0), (1, 4.0)]),
        ];
        assert_eq!(s.load(&cols).unwrap_err(), LuError::Singular);
        // threshold was raised along the way
        assert!(s.markowitz() > 0.01);
        assert!(!s.is_loaded());
    }
}
