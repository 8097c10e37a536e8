//! Exact LU factorization over rationals.
//!
//! Factors the basis matrix expressed in rationals, without a pivot
//! threshold: any zero pivot is a true singularity. The factorization
//! owns its storage, distinct from the floating LU, and honors a time
//! budget; exceeding it is reported as a status the driver treats as a
//! soft failure.

use std::time::{Duration, Instant};

use num_traits::Zero;

use crate::rational::Rational;
use crate::sparse::SparseVec;

/// State of the rational factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RationalLuStatus {
    /// No matrix loaded.
    #[default]
    Unloaded,
    /// Factorization complete and usable.
    Ok,
    /// Time budget exceeded; factors are unusable.
    TimeLimit,
    /// Zero pivot encountered; the basis is exactly singular.
    Singular,
}

/// Exact sparse LU of a square rational matrix.
#[derive(Debug, Clone, Default)]
pub struct RationalLu {
    dim: usize,
    status: RationalLuStatus,

    row_orig: Vec<usize>,
    row_perm: Vec<usize>,
    col_orig: Vec<usize>,
    col_perm: Vec<usize>,

    l_pivot: Vec<usize>,
    l_start: Vec<usize>,
    l_rows: Vec<usize>,
    l_vals: Vec<Rational>,

    u_rows: Vec<Vec<(usize, Rational)>>,
    diag: Vec<Rational>,

    factor_time: Duration,
    factor_count: u64,
}

impl RationalLu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RationalLuStatus {
        self.status
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Total time spent factorizing since the last counter reset.
    pub fn factor_time(&self) -> Duration {
        self.factor_time
    }

    pub fn factor_count(&self) -> u64 {
        self.factor_count
    }

    pub fn reset_counters(&mut self) {
        self.factor_time = Duration::ZERO;
        self.factor_count = 0;
    }

    /// Drops the factorization; the next load starts from scratch.
    pub fn clear(&mut self) {
        *self = Self {
            factor_time: self.factor_time,
            factor_count: self.factor_count,
            ..Self::default()
        };
    }

    /// Factors the matrix whose columns are given. Returns the resulting
    /// status; on `TimeLimit` or `Singular` the factors are cleared.
    pub fn load(
        &mut self,
        columns: &[SparseVec<Rational>],
        time_limit: Option<Duration>,
    ) -> RationalLuStatus {
        let begin = Instant::now();
        self.factor_count += 1;

        let result = self.factorize(columns, time_limit, begin);

        self.factor_time += begin.elapsed();
        self.status = result;
        if result != RationalLuStatus::Ok {
            let (time, count) = (self.factor_time, self.factor_count);
            self.clear();
            self.factor_time = time;
            self.factor_count = count;
            self.status = result;
        }
        result
    }

    fn factorize(
        &mut self,
        columns: &[SparseVec<Rational>],
        time_limit: Option<Duration>,
        begin: Instant,
    ) -> RationalLuStatus {
        let dim = columns.len();
        self.dim = dim;
        self.row_orig = vec![usize::MAX; dim];
        self.row_perm = vec![usize::MAX; dim];
        self.col_orig = vec![usize::MAX; dim];
        self.col_perm = vec![usize::MAX; dim];
        self.l_pivot = Vec::new();
        self.l_start = vec![0];
        self.l_rows = Vec::new();
        self.l_vals = Vec::new();
        self.u_rows = vec![Vec::new(); dim];
        self.diag = vec![Rational::zero(); dim];

        let mut wrows: Vec<Vec<(usize, Rational)>> = vec![Vec::new(); dim];
        let mut wcols: Vec<Vec<usize>> = vec![Vec::new(); dim];
        for (j, col) in columns.iter().enumerate() {
            for (i, v) in col.iter() {
                if !v.is_zero() {
                    wrows[i].push((j, v.clone()));
                    wcols[j].push(i);
                }
            }
        }

        let mut row_active = vec![true; dim];
        let mut col_active = vec![true; dim];

        for step in 0..dim {
            if let Some(limit) = time_limit {
                if begin.elapsed() > limit {
                    return RationalLuStatus::TimeLimit;
                }
            }

            // pivot: sparsest available row, sparsest column within it
            let mut best: Option<(usize, usize, usize)> = None; // (cost, row, col)
            for r in 0..dim {
                if !row_active[r] || wrows[r].is_empty() {
                    continue;
                }
                let rlen = wrows[r].len();
                for &(c, _) in &wrows[r] {
                    if !col_active[c] {
                        continue;
                    }
                    let cost = (rlen - 1) * (wcols[c].len().saturating_sub(1));
                    let better = match best {
                        None => true,
                        Some((bc, br, _)) => cost < bc || (cost == bc && r < br),
                    };
                    if better {
                        best = Some((cost, r, c));
                    }
                }
            }

            let (pr, pc) = match best {
                Some((_, r, c)) => (r, c),
                None => return RationalLuStatus::Singular,
            };

            let pval = wrows[pr]
                .iter()
                .find(|(c, _)| *c == pc)
                .map(|(_, v)| v.clone())
                .expect("pivot entry disappeared");
            debug_assert!(!pval.is_zero());

            self.row_orig[step] = pr;
            self.row_perm[pr] = step;
            self.col_orig[step] = pc;
            self.col_perm[pc] = step;
            self.diag[step] = pval.clone();
            row_active[pr] = false;
            col_active[pc] = false;

            let victims: Vec<usize> = wcols[pc]
                .iter()
                .copied()
                .filter(|&r| row_active[r])
                .collect();

            let pivot_row = std::mem::take(&mut wrows[pr]);

            for &r in &victims {
                let val = wrows[r]
                    .iter()
                    .find(|(c, _)| *c == pc)
                    .map(|(_, v)| v.clone())
                    .expect("column pattern out of sync");
                let mult = val / &pval;

                self.l_rows.push(r);
                self.l_vals.push(mult.clone());

                let old_row = std::mem::take(&mut wrows[r]);
                let mut new_row: Vec<(usize, Rational)> = Vec::with_capacity(old_row.len());
                let mut touched: Vec<usize> = Vec::new();

                for (c, v) in old_row {
                    if c == pc {
                        continue;
                    }
                    if let Some((_, pv)) = pivot_row.iter().find(|(cc, _)| *cc == c) {
                        if col_active[c] {
                            let nv = v - &mult * pv;
                            touched.push(c);
                            if nv.is_zero() {
                                wcols[c].retain(|&rr| rr != r);
                            } else {
                                new_row.push((c, nv));
                            }
                            continue;
                        }
                    }
                    new_row.push((c, v));
                }

                for (c, pv) in &pivot_row {
                    if *c == pc || !col_active[*c] || touched.contains(c) {
                        continue;
                    }
                    let nv = -(&mult * pv);
                    if !nv.is_zero() {
                        new_row.push((*c, nv));
                        wcols[*c].push(r);
                    }
                }

                wrows[r] = new_row;
            }

            self.l_pivot.push(pr);
            self.l_start.push(self.l_rows.len());

            for (c, v) in pivot_row {
                if c != pc && col_active[c] {
                    self.u_rows[pr].push((c, v));
                    wcols[c].retain(|&rr| rr != pr);
                }
            }
            wcols[pc].clear();
        }

        RationalLuStatus::Ok
    }

    /// Solves `B x = b` exactly. Returns `None` when no factorization is
    /// loaded.
    pub fn solve_right(&self, b: &[Rational]) -> Option<Vec<Rational>> {
        if self.status != RationalLuStatus::Ok {
            return None;
        }
        debug_assert_eq!(b.len(), self.dim);
        let mut work = b.to_vec();

        for e in 0..self.l_pivot.len() {
            let xp = work[self.l_pivot[e]].clone();
            if xp.is_zero() {
                continue;
            }
            for k in self.l_start[e]..self.l_start[e + 1] {
                let r = self.l_rows[k];
                let delta = &self.l_vals[k] * &xp;
                work[r] -= delta;
            }
        }

        let mut x = vec![Rational::zero(); self.dim];
        for p in (0..self.dim).rev() {
            let r = self.row_orig[p];
            let c = self.col_orig[p];
            let mut acc = work[r].clone();
            for (cc, v) in &self.u_rows[r] {
                acc -= v * &x[*cc];
            }
            x[c] = acc / &self.diag[p];
        }
        Some(x)
    }

    /// Solves `Bᵀ y = c` exactly. Returns `None` when no factorization is
    /// loaded.
    pub fn solve_left(&self, c: &[Rational]) -> Option<Vec<Rational>> {
        if self.status != RationalLuStatus::Ok {
            return None;
        }
        debug_assert_eq!(c.len(), self.dim);
        let mut work = c.to_vec();
        let mut z = vec![Rational::zero(); self.dim];

        for p in 0..self.dim {
            let r = self.row_orig[p];
            let cc = self.col_orig[p];
            let zp = work[cc].clone() / &self.diag[p];
            if !zp.is_zero() {
                for (c2, v) in &self.u_rows[r] {
                    let delta = v * &zp;
                    work[*c2] -= delta;
                }
            }
            z[r] = zp;
        }

        for e in (0..self.l_pivot.len()).rev() {
            let mut acc = Rational::zero();
            for k in self.l_start[e]..self.l_start[e + 1] {
                acc += &self.l_vals[k] * &z[self.l_rows[k]];
            }
            z[self.l_pivot[e]] -= acc;
        }
        Some(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64, d: i64) -> Rational {
        Rational::new(n.into(), d.into())
    }

    fn cols_from(dense: &[Vec<i64>]) -> Vec<SparseVec<Rational>> {
        dense
            .iter()
            .map(|col| {
                SparseVec::from_pairs(
                    col.iter()
                        .enumerate()
                        .filter(|(_, v)| **v != 0)
                        .map(|(i, v)| (i, rat(*v, 1))),
                )
            })
            .collect()
    }

    #[test]
    fn test_exact_solve() {
        // B = [[2, 1], [1, 3]], det = 5
        let cols = cols_from(&[vec![2, 1], vec![1, 3]]);
        let mut lu = RationalLu::new();
        assert_eq!(lu.load(&cols, None), RationalLuStatus::Ok);

        let b = vec![rat(1, 1), rat(0, 1)];
        let x = lu.solve_right(&b).unwrap();
        assert_eq!(x, vec![rat(3, 5), rat(-1, 5)]);

        let c = vec![rat(0, 1), rat(1, 1)];
        let y = lu.solve_left(&c).unwrap();
        // B^T y = c => y = (B^T)^{-1} e_2 = (-1/5, 2/5)
        assert_eq!(y, vec![rat(-1, 5), rat(2, 5)]);
    }

    #[test]
    fn test_exact_singular() {
        let cols = cols_from(&[vec![1, 2], vec![2, 4]]);
        let mut lu = RationalLu::new();
        assert_eq!(lu.load(&cols, None), RationalLuStatus::Singular);
        assert!(lu.solve_right(&[rat(1, 1), rat(1, 1)]).is_none());
    }

    #[test]
    fn test_rational_entries() {
        // B = [[1/2, 0], [1/3, 1/4]]
        let cols = vec![
            SparseVec::from_pairs(vec![(0, rat(1, 2)), (1, rat(1, 3))]),
            SparseVec::from_pairs(vec![(1, rat(1, 4))]),
        ];
        let mut lu = RationalLu::new();
        assert_eq!(lu.load(&cols, None), RationalLuStatus::Ok);

        let b = vec![rat(1, 1), rat(1, 1)];
        let x = lu.solve_right(&b).unwrap();
        // x1 = 2, x2 = (1 - 2/3) * 4 = 4/3
        assert_eq!(x, vec![rat(2, 1), rat(4, 3)]);
    }

    #[test]
    fn test_clear_resets_status() {
        let cols = cols_from(&[vec![1, 0], vec![0, 1]]);
        let mut lu = RationalLu::new();
        lu.load(&cols, None);
        assert_eq!(lu.status(), RationalLuStatus::Ok);
        lu.clear();
        assert_eq!(lu.status(), RationalLuStatus::Unloaded);
    }
}
