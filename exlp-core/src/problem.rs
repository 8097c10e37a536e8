//! Problem data: the coupled rational/floating LP pair.
//!
//! The refinement algorithm keeps an exact LP and a floating-point LP of
//! identical dimensions at all times. They are stored as one container
//! with parallel coefficient arrays, which removes any synchronization
//! code between two independent objects: every structural mutation
//! updates both sides, while the refinement loop may overwrite the
//! floating side alone and re-derive it from the rational data later.
//!
//! Bound and side finiteness is carried by [`RangeType`] values; the
//! floating arrays use the `±1e100` sentinel only at the container
//! boundary and no algorithm compares against it directly.

use thiserror::Error;

use num_traits::Zero;

use crate::rational::{rational_to_f64, Rational};
use crate::settings::ObjSense;
use crate::sparse::SparseVec;

/// Classification of a bound or side pair by finiteness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeType {
    /// Both infinite.
    Free,
    /// Finite lower, infinite upper.
    Lower,
    /// Infinite lower, finite upper.
    Upper,
    /// Both finite, distinct.
    Boxed,
    /// Both finite and equal.
    Fixed,
}

impl RangeType {
    pub fn from_bounds(lower: Option<&Rational>, upper: Option<&Rational>) -> Self {
        match (lower, upper) {
            (None, None) => RangeType::Free,
            (Some(_), None) => RangeType::Lower,
            (None, Some(_)) => RangeType::Upper,
            (Some(l), Some(u)) => {
                if l == u {
                    RangeType::Fixed
                } else {
                    RangeType::Boxed
                }
            }
        }
    }

    pub fn has_lower(self) -> bool {
        matches!(self, RangeType::Lower | RangeType::Boxed | RangeType::Fixed)
    }

    pub fn has_upper(self) -> bool {
        matches!(self, RangeType::Upper | RangeType::Boxed | RangeType::Fixed)
    }

    /// Swaps the roles of lower and upper, as needed when a row range
    /// becomes a negated slack-column range.
    pub fn switched(self) -> Self {
        match self {
            RangeType::Lower => RangeType::Upper,
            RangeType::Upper => RangeType::Lower,
            other => other,
        }
    }
}

/// Errors raised by problem construction and mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LpError {
    #[error("index {index} out of range (size {size})")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("lower bound exceeds upper bound at index {index}")]
    InconsistentBounds { index: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// The coupled LP pair.
///
/// The objective is stored internally in maximization form; the user
/// sense is applied at load and report boundaries.
#[derive(Debug, Clone)]
pub struct LpPair {
    cols: Vec<SparseVec<Rational>>,
    cols_f: Vec<SparseVec<f64>>,

    max_obj: Vec<Rational>,
    max_obj_f: Vec<f64>,

    lower: Vec<Rational>,
    upper: Vec<Rational>,
    lower_f: Vec<f64>,
    upper_f: Vec<f64>,

    lhs: Vec<Rational>,
    rhs: Vec<Rational>,
    lhs_f: Vec<f64>,
    rhs_f: Vec<f64>,

    /// Transient per-row objective used by the refinement loop; always
    /// floating, cleared after each refined solve.
    row_obj_f: Vec<f64>,

    col_range: Vec<RangeType>,
    row_range: Vec<RangeType>,

    sense: ObjSense,
    infinity: f64,
}

impl LpPair {
    pub fn new(sense: ObjSense) -> Self {
        Self::with_infinity(sense, crate::settings::DEFAULT_INFINITY)
    }

    pub fn with_infinity(sense: ObjSense, infinity: f64) -> Self {
        Self {
            cols: Vec::new(),
            cols_f: Vec::new(),
            max_obj: Vec::new(),
            max_obj_f: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            lower_f: Vec::new(),
            upper_f: Vec::new(),
            lhs: Vec::new(),
            rhs: Vec::new(),
            lhs_f: Vec::new(),
            rhs_f: Vec::new(),
            row_obj_f: Vec::new(),
            col_range: Vec::new(),
            row_range: Vec::new(),
            sense,
            infinity,
        }
    }

    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn num_rows(&self) -> usize {
        self.lhs.len()
    }

    pub fn sense(&self) -> ObjSense {
        self.sense
    }

    pub fn infinity(&self) -> f64 {
        self.infinity
    }

    fn bound_to_f64(&self, v: &Rational) -> f64 {
        rational_to_f64(v).clamp(-self.infinity, self.infinity)
    }

    // ---- construction --------------------------------------------------

    /// Appends a column with the given user-sense objective coefficient
    /// and bounds (`None` means infinite). Returns its index.
    pub fn add_col(
        &mut self,
        obj: Rational,
        lower: Option<Rational>,
        upper: Option<Rational>,
    ) -> usize {
        self.add_col_with(obj, lower, upper, SparseVec::new())
    }

    /// Appends a column with coefficients; entries must reference
    /// existing rows.
    pub fn add_col_with(
        &mut self,
        obj: Rational,
        lower: Option<Rational>,
        upper: Option<Rational>,
        entries: SparseVec<Rational>,
    ) -> usize {
        let c = self.num_cols();
        let range = RangeType::from_bounds(lower.as_ref(), upper.as_ref());

        let max_obj = match self.sense {
            ObjSense::Maximize => obj,
            ObjSense::Minimize => -obj,
        };
        self.max_obj_f.push(rational_to_f64(&max_obj));
        self.max_obj.push(max_obj);

        let (low, low_f) = match lower {
            Some(l) => {
                let f = self.bound_to_f64(&l);
                (l, f)
            }
            None => (Rational::zero(), -self.infinity),
        };
        let (up, up_f) = match upper {
            Some(u) => {
                let f = self.bound_to_f64(&u);
                (u, f)
            }
            None => (Rational::zero(), self.infinity),
        };
        self.lower.push(low);
        self.upper.push(up);
        self.lower_f.push(low_f);
        self.upper_f.push(up_f);
        self.col_range.push(range);

        self.cols_f.push(SparseVec::from_pairs(
            entries.iter().map(|(i, v)| (i, rational_to_f64(v))),
        ));
        self.cols.push(entries);
        c
    }

    /// Appends a row given its sides and coefficients. Returns its index.
    pub fn add_row(
        &mut self,
        lhs: Option<Rational>,
        entries: &[(usize, Rational)],
        rhs: Option<Rational>,
    ) -> usize {
        let r = self.num_rows();
        let range = RangeType::from_bounds(lhs.as_ref(), rhs.as_ref());

        let (l, lf) = match lhs {
            Some(v) => {
                let f = self.bound_to_f64(&v);
                (v, f)
            }
            None => (Rational::zero(), -self.infinity),
        };
        let (u, uf) = match rhs {
            Some(v) => {
                let f = self.bound_to_f64(&v);
                (v, f)
            }
            None => (Rational::zero(), self.infinity),
        };
        self.lhs.push(l);
        self.rhs.push(u);
        self.lhs_f.push(lf);
        self.rhs_f.push(uf);
        self.row_obj_f.push(0.0);
        self.row_range.push(range);

        for (c, v) in entries {
            debug_assert!(*c < self.num_cols());
            if !v.is_zero() {
                self.cols_f[*c].push(r, rational_to_f64(v));
                self.cols[*c].push(r, v.clone());
            }
        }
        r
    }

    /// Checks bound consistency and coefficient index ranges.
    pub fn validate(&self) -> Result<(), LpError> {
        for c in 0..self.num_cols() {
            if self.col_range[c] == RangeType::Boxed || self.col_range[c] == RangeType::Fixed {
                if self.lower[c] > self.upper[c] {
                    return Err(LpError::InconsistentBounds { index: c });
                }
            }
            for (r, _) in self.cols[c].iter() {
                if r >= self.num_rows() {
                    return Err(LpError::IndexOutOfRange {
                        index: r,
                        size: self.num_rows(),
                    });
                }
            }
        }
        for r in 0..self.num_rows() {
            if (self.row_range[r] == RangeType::Boxed || self.row_range[r] == RangeType::Fixed)
                && self.lhs[r] > self.rhs[r]
            {
                return Err(LpError::InconsistentBounds { index: r });
            }
        }
        Ok(())
    }

    // ---- rational accessors -------------------------------------------

    pub fn col_range(&self, c: usize) -> RangeType {
        self.col_range[c]
    }

    pub fn row_range(&self, r: usize) -> RangeType {
        self.row_range[r]
    }

    pub fn lower(&self, c: usize) -> Option<&Rational> {
        self.col_range[c].has_lower().then(|| &self.lower[c])
    }

    pub fn upper(&self, c: usize) -> Option<&Rational> {
        self.col_range[c].has_upper().then(|| &self.upper[c])
    }

    pub fn lhs(&self, r: usize) -> Option<&Rational> {
        self.row_range[r].has_lower().then(|| &self.lhs[r])
    }

    pub fn rhs(&self, r: usize) -> Option<&Rational> {
        self.row_range[r].has_upper().then(|| &self.rhs[r])
    }

    /// Raw stored lower bound, meaningful only when the range says so.
    pub fn lower_raw(&self, c: usize) -> &Rational {
        &self.lower[c]
    }

    pub fn upper_raw(&self, c: usize) -> &Rational {
        &self.upper[c]
    }

    pub fn lhs_raw(&self, r: usize) -> &Rational {
        &self.lhs[r]
    }

    pub fn rhs_raw(&self, r: usize) -> &Rational {
        &self.rhs[r]
    }

    /// Maximization objective coefficient.
    pub fn max_obj(&self, c: usize) -> &Rational {
        &self.max_obj[c]
    }

    /// Objective coefficient in the user's sense.
    pub fn obj(&self, c: usize) -> Rational {
        match self.sense {
            ObjSense::Maximize => self.max_obj[c].clone(),
            ObjSense::Minimize => -self.max_obj[c].clone(),
        }
    }

    pub fn col_vector(&self, c: usize) -> &SparseVec<Rational> {
        &self.cols[c]
    }

    // ---- floating accessors -------------------------------------------

    pub fn lower_f(&self, c: usize) -> f64 {
        self.lower_f[c]
    }

    pub fn upper_f(&self, c: usize) -> f64 {
        self.upper_f[c]
    }

    pub fn lhs_f(&self, r: usize) -> f64 {
        self.lhs_f[r]
    }

    pub fn rhs_f(&self, r: usize) -> f64 {
        self.rhs_f[r]
    }

    pub fn max_obj_f(&self, c: usize) -> f64 {
        self.max_obj_f[c]
    }

    pub fn row_obj_f(&self, r: usize) -> f64 {
        self.row_obj_f[r]
    }

    pub fn col_vector_f(&self, c: usize) -> &SparseVec<f64> {
        &self.cols_f[c]
    }

    /// Assembles the floating constraint matrix in CSC form.
    pub fn float_matrix(&self) -> sprs::CsMat<f64> {
        let mut tri = sprs::TriMat::new((self.num_rows(), self.num_cols()));
        for (j, col) in self.cols_f.iter().enumerate() {
            for (i, &v) in col.iter() {
                tri.add_triplet(i, j, v);
            }
        }
        tri.to_csc()
    }

    // ---- structural mutation (both sides) -----------------------------

    pub fn change_lower(&mut self, c: usize, lower: Option<Rational>) {
        let has_upper = self.col_range[c].has_upper();
        match lower {
            Some(l) => {
                self.lower_f[c] = self.bound_to_f64(&l);
                self.lower[c] = l;
                self.col_range[c] = Self::range_of(true, has_upper, &self.lower[c], &self.upper[c]);
            }
            None => {
                self.lower_f[c] = -self.infinity;
                self.lower[c] = Rational::zero();
                self.col_range[c] = Self::range_of(false, has_upper, &self.lower[c], &self.upper[c]);
            }
        }
    }

    pub fn change_upper(&mut self, c: usize, upper: Option<Rational>) {
        let has_lower = self.col_range[c].has_lower();
        match upper {
            Some(u) => {
                self.upper_f[c] = self.bound_to_f64(&u);
                self.upper[c] = u;
                self.col_range[c] = Self::range_of(has_lower, true, &self.lower[c], &self.upper[c]);
            }
            None => {
                self.upper_f[c] = self.infinity;
                self.upper[c] = Rational::zero();
                self.col_range[c] = Self::range_of(has_lower, false, &self.lower[c], &self.upper[c]);
            }
        }
    }

    pub fn change_bounds(&mut self, c: usize, lower: Option<Rational>, upper: Option<Rational>) {
        let has_lower = lower.is_some();
        let has_upper = upper.is_some();
        match lower {
            Some(l) => {
                self.lower_f[c] = self.bound_to_f64(&l);
                self.lower[c] = l;
            }
            None => {
                self.lower_f[c] = -self.infinity;
                self.lower[c] = Rational::zero();
            }
        }
        match upper {
            Some(u) => {
                self.upper_f[c] = self.bound_to_f64(&u);
                self.upper[c] = u;
            }
            None => {
                self.upper_f[c] = self.infinity;
                self.upper[c] = Rational::zero();
            }
        }
        self.col_range[c] = Self::range_of(has_lower, has_upper, &self.lower[c], &self.upper[c]);
    }

    pub fn change_lhs(&mut self, r: usize, lhs: Option<Rational>) {
        let has_upper = self.row_range[r].has_upper();
        match lhs {
            Some(l) => {
                self.lhs_f[r] = self.bound_to_f64(&l);
                self.lhs[r] = l;
                self.row_range[r] = Self::range_of(true, has_upper, &self.lhs[r], &self.rhs[r]);
            }
            None => {
                self.lhs_f[r] = -self.infinity;
                self.lhs[r] = Rational::zero();
                self.row_range[r] = Self::range_of(false, has_upper, &self.lhs[r], &self.rhs[r]);
            }
        }
    }

    pub fn change_rhs(&mut self, r: usize, rhs: Option<Rational>) {
        let has_lower = self.row_range[r].has_lower();
        match rhs {
            Some(u) => {
                self.rhs_f[r] = self.bound_to_f64(&u);
                self.rhs[r] = u;
                self.row_range[r] = Self::range_of(has_lower, true, &self.lhs[r], &self.rhs[r]);
            }
            None => {
                self.rhs_f[r] = self.infinity;
                self.rhs[r] = Rational::zero();
                self.row_range[r] = Self::range_of(has_lower, false, &self.lhs[r], &self.rhs[r]);
            }
        }
    }

    pub fn change_range(&mut self, r: usize, lhs: Option<Rational>, rhs: Option<Rational>) {
        self.change_lhs(r, lhs);
        self.change_rhs(r, rhs);
    }

    /// Changes the maximization objective coefficient on both sides.
    pub fn change_max_obj(&mut self, c: usize, obj: Rational) {
        self.max_obj_f[c] = rational_to_f64(&obj);
        self.max_obj[c] = obj;
    }

    /// Sets, overwrites, or removes (zero value) a matrix coefficient on
    /// both sides.
    pub fn change_element(&mut self, r: usize, c: usize, v: Rational) {
        let remove = v.is_zero();
        let rational = std::mem::take(&mut self.cols[c]);
        let float = std::mem::take(&mut self.cols_f[c]);

        let mut new_rational = SparseVec::with_capacity(rational.nnz() + 1);
        let mut new_float = SparseVec::with_capacity(float.nnz() + 1);
        let mut found = false;
        for ((i, val), (_, fval)) in rational.iter().zip(float.iter()) {
            if i == r {
                found = true;
                if !remove {
                    new_rational.push(i, v.clone());
                    new_float.push(i, rational_to_f64(&v));
                }
            } else {
                new_rational.push(i, val.clone());
                new_float.push(i, *fval);
            }
        }
        if !found && !remove {
            new_rational.push(r, v.clone());
            new_float.push(r, rational_to_f64(&v));
        }
        self.cols[c] = new_rational;
        self.cols_f[c] = new_float;
    }

    /// Removes trailing columns so that `keep` remain.
    pub fn truncate_cols(&mut self, keep: usize) {
        self.cols.truncate(keep);
        self.cols_f.truncate(keep);
        self.max_obj.truncate(keep);
        self.max_obj_f.truncate(keep);
        self.lower.truncate(keep);
        self.upper.truncate(keep);
        self.lower_f.truncate(keep);
        self.upper_f.truncate(keep);
        self.col_range.truncate(keep);
    }

    /// Removes trailing rows so that `keep` remain; coefficients in the
    /// removed rows are dropped from every column.
    pub fn truncate_rows(&mut self, keep: usize) {
        self.lhs.truncate(keep);
        self.rhs.truncate(keep);
        self.lhs_f.truncate(keep);
        self.rhs_f.truncate(keep);
        self.row_obj_f.truncate(keep);
        self.row_range.truncate(keep);

        for c in 0..self.cols.len() {
            let col = std::mem::take(&mut self.cols[c]);
            let col_f = std::mem::take(&mut self.cols_f[c]);
            self.cols[c] = SparseVec::from_pairs(
                col.iter().filter(|(i, _)| *i < keep).map(|(i, v)| (i, v.clone())),
            );
            self.cols_f[c] = SparseVec::from_pairs(
                col_f.iter().filter(|(i, _)| *i < keep).map(|(i, v)| (i, *v)),
            );
        }
    }

    // ---- floating-only mutation (refinement loop) ---------------------

    pub fn set_lower_f(&mut self, c: usize, v: f64) {
        self.lower_f[c] = v;
    }

    pub fn set_upper_f(&mut self, c: usize, v: f64) {
        self.upper_f[c] = v;
    }

    pub fn set_lhs_f(&mut self, r: usize, v: f64) {
        self.lhs_f[r] = v;
    }

    pub fn set_rhs_f(&mut self, r: usize, v: f64) {
        self.rhs_f[r] = v;
    }

    pub fn set_max_obj_f(&mut self, c: usize, v: f64) {
        self.max_obj_f[c] = v;
    }

    pub fn set_row_obj_f(&mut self, r: usize, v: f64) {
        self.row_obj_f[r] = v;
    }

    pub fn clear_row_objs_f(&mut self) {
        self.row_obj_f.fill(0.0);
    }

    /// Re-derives the entire floating side from the rational data.
    pub fn sync_float_from_rational(&mut self) {
        for c in 0..self.num_cols() {
            self.max_obj_f[c] = rational_to_f64(&self.max_obj[c]);
            self.lower_f[c] = if self.col_range[c].has_lower() {
                self.bound_to_f64(&self.lower[c])
            } else {
                -self.infinity
            };
            self.upper_f[c] = if self.col_range[c].has_upper() {
                self.bound_to_f64(&self.upper[c])
            } else {
                self.infinity
            };
            self.cols_f[c] = SparseVec::from_pairs(
                self.cols[c].iter().map(|(i, v)| (i, rational_to_f64(v))),
            );
        }
        for r in 0..self.num_rows() {
            self.lhs_f[r] = if self.row_range[r].has_lower() {
                self.bound_to_f64(&self.lhs[r])
            } else {
                -self.infinity
            };
            self.rhs_f[r] = if self.row_range[r].has_upper() {
                self.bound_to_f64(&self.rhs[r])
            } else {
                self.infinity
            };
            self.row_obj_f[r] = 0.0;
        }
    }

    // ---- activities ----------------------------------------------------

    /// `slacks = A x` over rationals.
    pub fn compute_primal_activity(&self, primal: &[Rational]) -> Vec<Rational> {
        debug_assert_eq!(primal.len(), self.num_cols());
        let mut slacks = vec![Rational::zero(); self.num_rows()];
        for (c, col) in self.cols.iter().enumerate() {
            if primal[c].is_zero() {
                continue;
            }
            col.axpy_into_rational(&primal[c], &mut slacks);
        }
        slacks
    }

    /// `slacks += A diff` for a sparse primal correction.
    pub fn add_primal_activity(&self, diff: &SparseVec<Rational>, slacks: &mut [Rational]) {
        for (c, v) in diff.iter() {
            if v.is_zero() {
                continue;
            }
            self.cols[c].axpy_into_rational(v, slacks);
        }
    }

    /// `red_cost[c] -= col_c · dual` for every column.
    pub fn sub_dual_activity(&self, dual: &[Rational], red_cost: &mut [Rational]) {
        debug_assert_eq!(dual.len(), self.num_rows());
        for (c, col) in self.cols.iter().enumerate() {
            let act = col.dot_dense_rational(dual);
            if !act.is_zero() {
                red_cost[c] -= act;
            }
        }
    }

    /// Maximization objective value of a primal point.
    pub fn max_obj_value(&self, primal: &[Rational]) -> Rational {
        let mut acc = Rational::zero();
        for c in 0..self.num_cols() {
            if !self.max_obj[c].is_zero() && !primal[c].is_zero() {
                acc += &self.max_obj[c] * &primal[c];
            }
        }
        acc
    }

    fn range_of(has_lower: bool, has_upper: bool, lower: &Rational, upper: &Rational) -> RangeType {
        match (has_lower, has_upper) {
            (false, false) => RangeType::Free,
            (true, false) => RangeType::Lower,
            (false, true) => RangeType::Upper,
            (true, true) => {
                if lower == upper {
                    RangeType::Fixed
                } else {
                    RangeType::Boxed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64, d: i64) -> Rational {
        Rational::new(n.into(), d.into())
    }

    fn sample_lp() -> LpPair {
        // min x1 + x2  s.t.  x1 + 2 x2 >= 3,  2 x1 + x2 >= 3,  x >= 0
        let mut lp = LpPair::new(ObjSense::Minimize);
        let x1 = lp.add_col(rat(1, 1), Some(rat(0, 1)), None);
        let x2 = lp.add_col(rat(1, 1), Some(rat(0, 1)), None);
        lp.add_row(
            Some(rat(3, 1)),
            &[(x1, rat(1, 1)), (x2, rat(2, 1))],
            None,
        );
        lp.add_row(
            Some(rat(3, 1)),
            &[(x1, rat(2, 1)), (x2, rat(1, 1))],
            None,
        );
        lp
    }

    #[test]
    fn test_dimensions_and_ranges() {
        let lp = sample_lp();
        assert_eq!(lp.num_cols(), 2);
        assert_eq!(lp.num_rows(), 2);
        assert_eq!(lp.col_range(0), RangeType::Lower);
        assert_eq!(lp.row_range(0), RangeType::Lower);
        assert!(lp.validate().is_ok());
    }

    #[test]
    fn test_internal_maximization() {
        let lp = sample_lp();
        // minimize sense negates the stored objective
        assert_eq!(*lp.max_obj(0), rat(-1, 1));
        assert_eq!(lp.obj(0), rat(1, 1));
        assert_eq!(lp.max_obj_f(0), -1.0);
    }

    #[test]
    fn test_float_mirror() {
        let lp = sample_lp();
        assert_eq!(lp.lower_f(0), 0.0);
        assert_eq!(lp.upper_f(0), lp.infinity());
        assert_eq!(lp.lhs_f(1), 3.0);
        assert_eq!(lp.rhs_f(1), lp.infinity());
        let m = lp.float_matrix();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 2);
        assert_eq!(m.nnz(), 4);
    }

    #[test]
    fn test_activity() {
        let lp = sample_lp();
        let act = lp.compute_primal_activity(&[rat(1, 1), rat(1, 1)]);
        assert_eq!(act, vec![rat(3, 1), rat(3, 1)]);
    }

    #[test]
    fn test_change_bounds_updates_range() {
        let mut lp = sample_lp();
        lp.change_bounds(0, Some(rat(1, 1)), Some(rat(1, 1)));
        assert_eq!(lp.col_range(0), RangeType::Fixed);
        lp.change_upper(0, None);
        assert_eq!(lp.col_range(0), RangeType::Lower);
        lp.change_lower(0, None);
        assert_eq!(lp.col_range(0), RangeType::Free);
        assert_eq!(lp.lower_f(0), -lp.infinity());
    }

    #[test]
    fn test_change_element() {
        let mut lp = sample_lp();
        lp.change_element(0, 0, rat(5, 1));
        assert_eq!(lp.col_vector(0).get(0), rat(5, 1));
        assert_eq!(lp.col_vector_f(0).get(0), 5.0);
        lp.change_element(0, 0, rat(0, 1));
        assert_eq!(lp.col_vector(0).get(0), rat(0, 1));
        assert_eq!(lp.col_vector(0).nnz(), 1);
    }

    #[test]
    fn test_truncate() {
        let mut lp = sample_lp();
        let z = lp.add_col(rat(0, 1), Some(rat(0, 1)), Some(rat(1, 1)));
        lp.add_row(Some(rat(0, 1)), &[(z, rat(1, 1))], Some(rat(0, 1)));
        assert_eq!(lp.num_cols(), 3);
        assert_eq!(lp.num_rows(), 3);

        lp.truncate_rows(2);
        lp.truncate_cols(2);
        assert_eq!(lp.num_cols(), 2);
        assert_eq!(lp.num_rows(), 2);
        assert!(lp.validate().is_ok());
    }

    #[test]
    fn test_sync_float_from_rational() {
        let mut lp = sample_lp();
        lp.set_lower_f(0, -123.0);
        lp.set_max_obj_f(0, 7.0);
        lp.set_row_obj_f(0, 2.0);
        lp.sync_float_from_rational();
        assert_eq!(lp.lower_f(0), 0.0);
        assert_eq!(lp.max_obj_f(0), -1.0);
        assert_eq!(lp.row_obj_f(0), 0.0);
    }
}
