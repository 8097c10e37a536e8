//! Semi-sparse vector: dense values plus an explicit nonzero index set.
//!
//! The invariant is governed by the `is_setup` flag: when set, the index
//! list is exactly the set of positions whose absolute value exceeds the
//! epsilon; when clear, the dense values are authoritative and the index
//! list is stale. Every mutating operation either maintains both sides or
//! clears the flag. Cancellation below epsilon while set rounds the value
//! to zero and drops the index.

use super::SparseVec;

/// Dense-valued vector with a maintained nonzero index list.
#[derive(Debug, Clone)]
pub struct SemiSparseVec {
    values: Vec<f64>,
    indices: Vec<usize>,
    is_setup: bool,
    epsilon: f64,
}

impl SemiSparseVec {
    /// Creates a zero vector of the given dimension, set up.
    pub fn zeros(dim: usize, epsilon: f64) -> Self {
        Self {
            values: vec![0.0; dim],
            indices: Vec::new(),
            is_setup: true,
            epsilon,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    /// Number of recorded nonzeros; only meaningful when set up.
    pub fn nnz(&self) -> usize {
        debug_assert!(self.is_setup);
        self.indices.len()
    }

    #[inline]
    pub fn value(&self, i: usize) -> f64 {
        self.values[i]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Recorded nonzero indices; only meaningful when set up.
    pub fn indices(&self) -> &[usize] {
        debug_assert!(self.is_setup);
        &self.indices
    }

    /// Marks the index list stale; the dense array becomes authoritative.
    pub fn unsetup(&mut self) {
        self.is_setup = false;
    }

    /// Rebuilds the index list from the dense array in one pass, rounding
    /// sub-epsilon values to zero.
    pub fn setup(&mut self) {
        self.indices.clear();
        for i in 0..self.values.len() {
            let v = self.values[i];
            if v.abs() > self.epsilon {
                self.indices.push(i);
            } else {
                self.values[i] = 0.0;
            }
        }
        self.is_setup = true;
        self.assert_consistent();
    }

    /// Zeroes the vector. Uses the index list when set up.
    pub fn clear(&mut self) {
        if self.is_setup {
            for &i in &self.indices {
                self.values[i] = 0.0;
            }
        } else {
            self.values.fill(0.0);
        }
        self.indices.clear();
        self.is_setup = true;
    }

    /// Resizes to a new dimension, zeroing all content.
    pub fn clear_and_resize(&mut self, dim: usize) {
        self.values.clear();
        self.values.resize(dim, 0.0);
        self.indices.clear();
        self.is_setup = true;
    }

    /// Writes a value through the invariant: the index list is updated
    /// when the setup flag is held, and sub-epsilon writes round to zero.
    pub fn set_value(&mut self, i: usize, v: f64) {
        let rounded = if v.abs() > self.epsilon { v } else { 0.0 };
        let was_nonzero = self.values[i] != 0.0;
        self.values[i] = rounded;

        if self.is_setup {
            if rounded != 0.0 && !was_nonzero {
                self.indices.push(i);
            } else if rounded == 0.0 && was_nonzero {
                self.indices.retain(|&j| j != i);
            }
        }
        self.assert_consistent();
    }

    /// Adds to a single position, maintaining the invariant.
    pub fn add_value(&mut self, i: usize, delta: f64) {
        self.set_value(i, self.values[i] + delta);
    }

    /// Direct dense write without index maintenance; clears the flag.
    pub fn set_value_unchecked(&mut self, i: usize, v: f64) {
        self.values[i] = v;
        self.is_setup = false;
    }

    /// Loads the content of a sparse vector, replacing any previous state.
    pub fn assign(&mut self, sv: &SparseVec<f64>) {
        self.clear();
        for (i, &v) in sv.iter() {
            if v.abs() > self.epsilon {
                self.values[i] = v;
                self.indices.push(i);
            }
        }
        self.assert_consistent();
    }

    /// Dot product against a sparse vector.
    ///
    /// The pair list is walked with constant-time lookups into the dense
    /// side, so the cost is the nonzero count of `sv` regardless of this
    /// vector's density.
    pub fn dot(&self, sv: &SparseVec<f64>) -> f64 {
        sv.iter().map(|(i, v)| v * self.values[i]).sum()
    }

    /// Dot product against another semi-sparse vector, iterating the
    /// sparser index list. Both operands must be set up.
    pub fn dot_ssv(&self, other: &SemiSparseVec) -> f64 {
        debug_assert!(self.is_setup && other.is_setup);
        let (walk, dense) = if self.indices.len() <= other.indices.len() {
            (self, other)
        } else {
            (other, self)
        };
        walk.indices
            .iter()
            .map(|&i| walk.values[i] * dense.values[i])
            .sum()
    }

    /// `self += alpha * sv`, updating indices incrementally while set up.
    ///
    /// Cancellation below epsilon removes the index and rounds to zero.
    pub fn axpy(&mut self, alpha: f64, sv: &SparseVec<f64>) {
        if alpha == 0.0 {
            return;
        }

        if !self.is_setup {
            for (i, &v) in sv.iter() {
                self.values[i] += alpha * v;
            }
            return;
        }

        for (i, &v) in sv.iter() {
            let old = self.values[i];
            let new = old + alpha * v;

            if old == 0.0 {
                if new.abs() > self.epsilon {
                    self.values[i] = new;
                    self.indices.push(i);
                } else {
                    // fresh entry already below epsilon: round away
                    self.values[i] = 0.0;
                }
            } else if new.abs() > self.epsilon {
                self.values[i] = new;
            } else {
                // cancellation: round to zero and drop the index
                self.values[i] = 0.0;
                self.indices.retain(|&j| j != i);
            }
        }
        self.assert_consistent();
    }

    /// Maximum absolute value; iterates the nonzero list when set up.
    pub fn max_abs(&self) -> f64 {
        if self.is_setup {
            self.indices
                .iter()
                .map(|&i| self.values[i].abs())
                .fold(0.0_f64, f64::max)
        } else {
            self.values.iter().map(|v| v.abs()).fold(0.0_f64, f64::max)
        }
    }

    /// Squared Euclidean norm; iterates the nonzero list when set up.
    pub fn length2(&self) -> f64 {
        if self.is_setup {
            self.indices.iter().map(|&i| self.values[i].powi(2)).sum()
        } else {
            self.values.iter().map(|v| v * v).sum()
        }
    }

    /// Iterates the nonzero entries. Requires setup.
    pub fn iter_nonzeros(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        debug_assert!(self.is_setup);
        self.indices.iter().map(move |&i| (i, self.values[i]))
    }

    /// Extracts the nonzeros into a sparse vector. Requires setup.
    pub fn to_sparse(&self) -> SparseVec<f64> {
        debug_assert!(self.is_setup);
        SparseVec::from_pairs(self.iter_nonzeros())
    }

    #[inline]
    fn assert_consistent(&self) {
        #[cfg(debug_assertions)]
        if self.is_setup {
            for (i, &v) in self.values.iter().enumerate() {
                let listed = self.indices.contains(&i);
                debug_assert_eq!(
                    v.abs() > self.epsilon,
                    listed,
                    "semi-sparse invariant broken at {}: value {} listed {}",
                    i,
                    v,
                    listed
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn check_invariant(v: &SemiSparseVec) {
        assert!(v.is_setup());
        for i in 0..v.dim() {
            assert_eq!(
                v.value(i).abs() > v.epsilon(),
                v.indices().contains(&i),
                "invariant broken at {}",
                i
            );
        }
    }

    #[test]
    fn test_setup_rebuilds_indices() {
        let mut v = SemiSparseVec::zeros(5, EPS);
        v.set_value_unchecked(1, 2.0);
        v.set_value_unchecked(3, 1e-15);
        assert!(!v.is_setup());

        v.setup();
        check_invariant(&v);
        assert_eq!(v.indices(), &[1]);
        // sub-epsilon value was rounded away
        assert_eq!(v.value(3), 0.0);
    }

    #[test]
    fn test_set_value_maintains_invariant() {
        let mut v = SemiSparseVec::zeros(4, EPS);
        v.set_value(2, 1.0);
        check_invariant(&v);
        v.set_value(2, 0.0);
        check_invariant(&v);
        assert_eq!(v.nnz(), 0);
        // sub-epsilon write rounds to zero
        v.set_value(0, 1e-14);
        check_invariant(&v);
        assert_eq!(v.value(0), 0.0);
    }

    #[test]
    fn test_axpy_incremental_and_cancellation() {
        let mut v = SemiSparseVec::zeros(4, EPS);
        v.set_value(0, 1.0);
        v.set_value(2, 2.0);

        let sv = SparseVec::from_pairs(vec![(0, 1.0), (1, 3.0), (2, -2.0)]);
        v.axpy(1.0, &sv);
        check_invariant(&v);

        assert_eq!(v.value(0), 2.0);
        assert_eq!(v.value(1), 3.0);
        // exact cancellation at position 2
        assert_eq!(v.value(2), 0.0);
        assert!(!v.indices().contains(&2));
    }

    #[test]
    fn test_axpy_near_cancellation_rounds() {
        let mut v = SemiSparseVec::zeros(2, 1e-9);
        v.set_value(0, 1.0);
        let sv = SparseVec::from_pairs(vec![(0, -1.0 + 1e-12)]);
        v.axpy(1.0, &sv);
        check_invariant(&v);
        assert_eq!(v.value(0), 0.0);
    }

    #[test]
    fn test_length2_and_max_abs() {
        let mut v = SemiSparseVec::zeros(3, EPS);
        v.set_value(0, 3.0);
        v.set_value(2, -4.0);
        assert_eq!(v.length2(), 25.0);
        assert_eq!(v.max_abs(), 4.0);

        v.unsetup();
        assert_eq!(v.length2(), 25.0);
        assert_eq!(v.max_abs(), 4.0);
    }

    #[test]
    fn test_clear_uses_indices() {
        let mut v = SemiSparseVec::zeros(8, EPS);
        v.set_value(5, 1.0);
        v.clear();
        check_invariant(&v);
        assert_eq!(v.nnz(), 0);
        assert_eq!(v.value(5), 0.0);
    }
}
