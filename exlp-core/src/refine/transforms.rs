//! Problem transforms of the refinement driver.
//!
//! Each transform mutates the coupled LP pair in place and records what
//! it needs to undo itself exactly; applying a transform and undoing it
//! is the identity on the original LP. Nesting order is strict: lifting
//! is outermost, the equality transform next, and the unbounded or
//! feasibility auxiliaries innermost.

use num_traits::{One, Signed, Zero};

use super::driver::{BoundsStore, IrResult, RefinementDriver};
use crate::basis::VarStatus;
use crate::problem::RangeType;
use crate::rational::{rational_from_f64, Rational};
use crate::solution::RationalSolution;
use crate::sparse::SparseVec;
use crate::util::logging::{log_debug, log_info};

impl RefinementDriver<'_> {
    // ---- equality transform -------------------------------------------

    /// Introduces one slack column per inequality row so all rows become
    /// equations.
    pub(super) fn transform_equality(&mut self) {
        log_debug!(self.log, "Transforming rows to equation form.");
        self.slack_col_rows.clear();

        let num_rows = self.lp.num_rows();
        for r in 0..num_rows {
            if self.lp.row_range(r) == RangeType::Fixed {
                continue;
            }

            // slack bounds are the negated, swapped row sides
            let lower = self.lp.rhs(r).cloned().map(|v| -v);
            let upper = self.lp.lhs(r).cloned().map(|v| -v);
            let entries = SparseVec::from_pairs([(r, Rational::one())]);
            self.lp
                .add_col_with(Rational::zero(), lower, upper, entries);
            self.slack_col_rows.push(r);

            self.lp
                .change_range(r, Some(Rational::zero()), Some(Rational::zero()));

            if self.has_basis {
                let col_status = match self.basis.rows[r] {
                    VarStatus::OnLower => VarStatus::OnUpper,
                    VarStatus::OnUpper => VarStatus::OnLower,
                    other => other,
                };
                self.basis.cols.push(col_status);
                self.basis.rows[r] = VarStatus::Fixed;
            }
        }

        if !self.slack_col_rows.is_empty() {
            self.rat_lu.clear();
            log_info!(
                self.log,
                "Added {} slack columns to transform rows to equality form.",
                self.slack_col_rows.len()
            );
        }
    }

    /// Removes the equality slack columns and restores the row sides.
    pub(super) fn untransform_equality(&mut self, sol: &mut RationalSolution) {
        let num_cols = self.lp.num_cols();
        let num_orig_cols = num_cols - self.slack_col_rows.len();

        if sol.is_primal_feasible {
            for (i, &row) in self.slack_col_rows.iter().enumerate() {
                let col = num_orig_cols + i;
                let z = sol.primal[col].clone();
                sol.slacks[row] -= z;
            }
            sol.primal.truncate(num_orig_cols);
        }
        if sol.has_primal_ray {
            sol.primal_ray.truncate(num_orig_cols);
        }

        if self.has_basis {
            for (i, &row) in self.slack_col_rows.iter().enumerate() {
                let col = num_orig_cols + i;
                if self.basis.rows[row] != VarStatus::Basic {
                    self.basis.rows[row] = match self.basis.cols[col] {
                        VarStatus::OnLower => VarStatus::OnUpper,
                        VarStatus::OnUpper => VarStatus::OnLower,
                        other => other,
                    };
                }
            }
            self.basis.cols.truncate(num_orig_cols);
            if !self.slack_col_rows.is_empty() {
                self.rat_lu.clear();
            }
        }

        if sol.is_dual_feasible {
            sol.red_cost.truncate(num_orig_cols);
        }

        // restore sides from the slack bounds and drop the columns
        for (i, &row) in self.slack_col_rows.iter().enumerate() {
            let col = num_orig_cols + i;
            let lhs = self.lp.upper(col).cloned().map(|v| -v);
            let rhs = self.lp.lower(col).cloned().map(|v| -v);
            self.lp.change_range(row, lhs, rhs);
        }
        self.lp.truncate_cols(num_orig_cols);
        self.slack_col_rows.clear();
    }

    // ---- lifting -------------------------------------------------------

    /// Reduces the matrix coefficient range by pushing oversized entries
    /// through auxiliary columns.
    pub(super) fn lift(&mut self) {
        log_debug!(self.log, "Reducing matrix coefficients by lifting.");

        self.before_lift_cols = self.lp.num_cols();
        self.before_lift_rows = self.lp.num_rows();
        self.lifted = true;

        let max_value = rational_from_f64(self.settings.liftmaxval);
        self.lift_pass(&max_value, true);
        let min_value = rational_from_f64(self.settings.liftminval);
        self.lift_pass(&min_value, false);

        if self.has_basis {
            while self.basis.cols.len() < self.lp.num_cols() {
                self.basis.cols.push(VarStatus::Basic);
            }
            while self.basis.rows.len() < self.lp.num_rows() {
                self.basis.rows.push(VarStatus::Fixed);
            }
            self.rat_lu.clear();
        }

        let added_cols = self.lp.num_cols() - self.before_lift_cols;
        let added_rows = self.lp.num_rows() - self.before_lift_rows;
        if added_cols > 0 || added_rows > 0 {
            log_info!(
                self.log,
                "Added {} columns and {} rows to reduce large matrix coefficients.",
                added_cols,
                added_rows
            );
        }
    }

    /// One lifting pass: entries larger than the threshold (`large`) or
    /// smaller than it (`!large`) are moved into an auxiliary column
    /// related to the original by `threshold * x - z = 0`.
    fn lift_pass(&mut self, threshold: &Rational, large: bool) {
        let num_cols_at_entry = self.lp.num_cols();
        for i in 0..num_cols_at_entry {
            let col_vector = self.lp.col_vector(i).clone();
            let mut lifting_col: Option<usize> = None;

            for (row, value) in col_vector.iter() {
                if row >= self.before_lift_rows {
                    continue;
                }
                let oversized = if large {
                    value.abs() > *threshold
                } else {
                    !value.is_zero() && value.abs() < *threshold
                };
                if !oversized {
                    continue;
                }

                let z = match lifting_col {
                    Some(z) => z,
                    None => {
                        let z = self.lp.add_col(Rational::zero(), None, None);
                        self.lp.add_row(
                            Some(Rational::zero()),
                            &[(i, threshold.clone()), (z, -Rational::one())],
                            Some(Rational::zero()),
                        );
                        lifting_col = Some(z);
                        z
                    }
                };

                self.lp.change_element(row, i, Rational::zero());
                self.lp.change_element(row, z, value / threshold);
            }
        }
    }

    /// Undoes lifting by dropping the auxiliary rows and columns; checks
    /// that the lifting columns carry no reduced cost.
    pub(super) fn project(&mut self, sol: &mut RationalSolution) {
        let num_cols = self.lp.num_cols();
        let num_rows = self.lp.num_rows();

        let max_value = rational_from_f64(self.settings.liftmaxval);
        for i in self.before_lift_cols..num_cols {
            if !sol.is_dual_feasible {
                break;
            }
            if (&max_value * &sol.red_cost[i]).abs() > self.settings.opttol {
                log_info!(self.log, "Warning: lost dual solution during project phase.");
                sol.is_dual_feasible = false;
            }
        }

        for i in self.before_lift_cols..num_cols {
            if !self.has_basis {
                break;
            }
            if self.basis.cols[i] != VarStatus::Basic {
                log_info!(
                    self.log,
                    "Warning: lost basis during project phase because of nonbasic lifting column."
                );
                self.has_basis = false;
                self.rat_lu.clear();
            }
        }
        for i in self.before_lift_rows..num_rows {
            if !self.has_basis {
                break;
            }
            if self.basis.rows[i] == VarStatus::Basic {
                log_info!(
                    self.log,
                    "Warning: lost basis during project phase because of basic lifting row."
                );
                self.has_basis = false;
                self.rat_lu.clear();
            }
        }

        self.lp.truncate_rows(self.before_lift_rows);
        self.lp.truncate_cols(self.before_lift_cols);

        if sol.is_primal_feasible {
            sol.primal.truncate(self.before_lift_cols);
            sol.slacks.truncate(self.before_lift_rows);
        }
        if sol.has_primal_ray {
            sol.primal_ray.truncate(self.before_lift_cols);
        }
        if sol.is_dual_feasible {
            sol.red_cost.truncate(self.before_lift_cols);
            sol.dual.truncate(self.before_lift_rows);
        }
        if sol.has_dual_farkas {
            sol.dual_farkas.truncate(self.before_lift_rows);
        }

        if self.has_basis {
            self.basis.cols.truncate(self.before_lift_cols);
            self.basis.rows.truncate(self.before_lift_rows);
            self.rat_lu.clear();
        }
        self.lifted = false;
    }

    // ---- unbounded auxiliary ------------------------------------------

    /// Refines the auxiliary LP that certifies or rejects primal
    /// unboundedness; returns the refinement outcome and whether a
    /// primal ray was obtained.
    pub(super) fn perform_unbounded_ir(
        &mut self,
        sol: &mut RationalSolution,
    ) -> (IrResult, bool) {
        let t = std::time::Instant::now();
        self.transform_unbounded();
        self.stats.transform_time_ms += t.elapsed().as_millis() as u64;
        *sol = RationalSolution::new(self.lp.num_cols(), self.lp.num_rows());

        let old_refinements = self.stats.refinements;
        let mut ir = self.perform_opt_ir(sol, false, false, 0);
        self.stats.unbd_refinements += self.stats.refinements - old_refinements;

        let mut has_ray = false;
        if ir.stopped() {
            sol.invalidate();
            ir.error = false;
        } else if ir.error || ir.unbounded || ir.infeasible || !ir.primal_feasible || !ir.dual_feasible
        {
            sol.invalidate();
            has_ray = false;
            ir.error = true;
        } else {
            let tau = sol.primal[self.lp.num_cols() - 1].clone();
            log_debug!(
                self.log,
                "tau = {:e}",
                crate::rational::rational_to_f64(&tau)
            );
            // tau is basic near zero or nonbasic at its upper bound one
            ir.error = !(tau >= Rational::one() || tau <= self.settings.feastol);
            has_ray = tau >= Rational::one();
        }

        let t = std::time::Instant::now();
        self.untransform_unbounded(sol, has_ray);
        self.stats.transform_time_ms += t.elapsed().as_millis() as u64;
        (ir, has_ray)
    }

    /// Moves the objective into a constraint `c·x - τ = 0`, zeroes all
    /// finite bounds and sides, and maximizes `τ ∈ (-∞, 1]`.
    fn transform_unbounded(&mut self) {
        log_info!(self.log, "Setting up LP to compute primal unbounded ray.");

        let num_cols = self.lp.num_cols();
        let num_rows = self.lp.num_rows();

        let mut store = BoundsStore::default();
        for c in 0..num_cols {
            store.lower.push(self.lp.lower(c).cloned());
            store.upper.push(self.lp.upper(c).cloned());
            store.obj.push(self.lp.max_obj(c).clone());
        }
        for r in 0..num_rows {
            store.lhs.push(self.lp.lhs(r).cloned());
            store.rhs.push(self.lp.rhs(r).cloned());
        }

        // zero the finite sides
        for r in 0..num_rows {
            if self.lp.row_range(r).has_lower() {
                self.lp.change_lhs(r, Some(Rational::zero()));
            }
            if self.lp.row_range(r).has_upper() {
                self.lp.change_rhs(r, Some(Rational::zero()));
            }
        }

        // objective row: c·x - τ = 0
        let tau_col = self.lp.add_col(Rational::zero(), None, Some(Rational::one()));
        let mut obj_row: Vec<(usize, Rational)> = store
            .obj
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_zero())
            .map(|(c, v)| (c, v.clone()))
            .collect();
        obj_row.push((tau_col, -Rational::one()));
        self.lp
            .add_row(Some(Rational::zero()), &obj_row, Some(Rational::zero()));

        self.lp.change_max_obj(tau_col, Rational::one());

        // zero objective and finite bounds of the original variables
        for c in 0..num_cols {
            self.lp.change_max_obj(c, Rational::zero());
            if self.lp.col_range(c).has_lower() {
                self.lp.change_lower(c, Some(Rational::zero()));
            }
            if self.lp.col_range(c).has_upper() {
                self.lp.change_upper(c, Some(Rational::zero()));
            }
        }

        if self.has_basis {
            self.basis.cols.push(VarStatus::OnUpper);
            self.basis.rows.push(VarStatus::Basic);
            self.rat_lu.clear();
        }
        self.unb_store = Some(store);
    }

    /// Restores the problem after the unbounded auxiliary; extracts the
    /// primal ray when one was certified.
    fn untransform_unbounded(&mut self, sol: &mut RationalSolution, unbounded: bool) {
        let num_orig_cols = self.lp.num_cols() - 1;
        let num_orig_rows = self.lp.num_rows() - 1;
        let tau = sol.primal.get(num_orig_cols).cloned().unwrap_or_else(Rational::zero);

        if unbounded {
            sol.is_primal_feasible = false;
            sol.has_primal_ray = true;
            sol.is_dual_feasible = false;
            sol.has_dual_farkas = false;

            if !tau.is_zero() && tau != Rational::one() {
                for v in sol.primal.iter_mut() {
                    *v /= &tau;
                }
            }
            sol.primal_ray = sol.primal.clone();
            sol.primal_ray.truncate(num_orig_cols);

            if self.has_basis {
                self.has_basis = self.basis.cols[num_orig_cols] != VarStatus::Basic
                    && self.basis.rows[num_orig_rows] == VarStatus::Basic;
            }
            self.basis.cols.truncate(num_orig_cols);
            self.basis.rows.truncate(num_orig_rows);
        } else if self.settings.test_dual_inf && tau < self.settings.feastol {
            let alpha = sol.dual[num_orig_rows].clone();

            sol.is_primal_feasible = false;
            sol.has_primal_ray = false;
            sol.has_dual_farkas = false;

            if alpha != -Rational::one() && !alpha.is_zero() {
                let neg_alpha = -alpha;
                for v in sol.dual.iter_mut() {
                    *v /= &neg_alpha;
                }
                for v in sol.red_cost.iter_mut() {
                    *v /= &neg_alpha;
                }
            }
            sol.dual.truncate(num_orig_rows);
            sol.red_cost.truncate(num_orig_cols);
        } else {
            sol.invalidate();
            self.has_basis = false;
            self.basis.cols.truncate(num_orig_cols);
            self.basis.rows.truncate(num_orig_rows);
        }

        let store = self.unb_store.take().expect("unbounded store missing");

        // drop the objective row and the auxiliary variable
        self.lp.truncate_rows(num_orig_rows);
        self.lp.truncate_cols(num_orig_cols);

        // restore objective, sides, and bounds
        for c in 0..num_orig_cols {
            self.lp.change_max_obj(c, store.obj[c].clone());
            if store.lower[c].is_some() {
                self.lp.change_lower(c, store.lower[c].clone());
            }
            if store.upper[c].is_some() {
                self.lp.change_upper(c, store.upper[c].clone());
            }
        }
        for r in 0..num_orig_rows {
            if store.lhs[r].is_some() {
                self.lp.change_lhs(r, store.lhs[r].clone());
            }
            if store.rhs[r].is_some() {
                self.lp.change_rhs(r, store.rhs[r].clone());
            }
        }

        self.rat_lu.clear();
        sol.resize(num_orig_cols, num_orig_rows);
    }

    // ---- feasibility auxiliary ----------------------------------------

    /// Refines the feasibility auxiliary LP; returns the outcome and
    /// whether the original problem was proven infeasible.
    pub(super) fn perform_feas_ir(&mut self, sol: &mut RationalSolution) -> (IrResult, bool) {
        let t = std::time::Instant::now();
        self.transform_feasibility();
        self.stats.transform_time_ms += t.elapsed().as_millis() as u64;
        *sol = RationalSolution::new(self.lp.num_cols(), self.lp.num_rows());

        let mut infeasible = false;
        let mut ir;
        loop {
            let old_refinements = self.stats.refinements;
            ir = self.perform_opt_ir(sol, false, false, 0);
            self.stats.feas_refinements += self.stats.refinements - old_refinements;

            let mut success = false;
            if ir.stopped() {
                sol.invalidate();
                infeasible = false;
                ir.error = false;
            } else if ir.error
                || ir.unbounded
                || ir.infeasible
                || !ir.primal_feasible
                || !ir.dual_feasible
            {
                sol.invalidate();
                infeasible = false;
                ir.error = true;
            } else {
                let tau = sol.primal[self.lp.num_cols() - 1].clone();
                log_debug!(
                    self.log,
                    "tau = {:e}",
                    crate::rational::rational_to_f64(&tau)
                );
                ir.error = tau < -self.settings.feastol.clone()
                    || tau > Rational::one() + &self.settings.feastol;
                infeasible = tau < Rational::one();

                if infeasible {
                    sol.has_dual_farkas = true;
                    sol.dual_farkas = sol.dual.clone();
                    sol.is_primal_feasible = false;
                    if !self.verify_farkas_box(sol) {
                        // the approximate certificate stands; failing to
                        // expand a provable box is a soft failure
                        log_debug!(self.log, "Farkas box not certified exactly.");
                    }
                    success = true;
                } else {
                    sol.is_dual_feasible = false;
                    success = true;
                }
            }

            if ir.error || success || ir.stopped() {
                break;
            }
        }

        let t = std::time::Instant::now();
        self.untransform_feasibility(sol, infeasible);
        self.stats.transform_time_ms += t.elapsed().as_millis() as u64;
        (ir, infeasible)
    }

    /// Zeroes the objective, shifts variables so zero lies within the
    /// bounds, and homogenizes the sides through a boxed variable
    /// `τ ∈ [0, 1]` that is maximized.
    fn transform_feasibility(&mut self) {
        log_info!(self.log, "Setting up LP to test for feasibility.");

        let num_cols = self.lp.num_cols();
        let num_rows = self.lp.num_rows();

        let mut store = BoundsStore::default();
        for c in 0..num_cols {
            store.obj.push(self.lp.max_obj(c).clone());
            store.lower.push(self.lp.lower(c).cloned());
            store.upper.push(self.lp.upper(c).cloned());
        }
        for r in 0..num_rows {
            store.lhs.push(self.lp.lhs(r).cloned());
            store.rhs.push(self.lp.rhs(r).cloned());
        }

        // zero objective, shift columns so zero is inside the bounds
        for c in 0..num_cols {
            self.lp.change_max_obj(c, Rational::zero());

            let lower_pos = self
                .lp
                .lower(c)
                .map(|l| l.is_positive())
                .unwrap_or(false);
            let upper_neg = self
                .lp
                .upper(c)
                .map(|u| u.is_negative())
                .unwrap_or(false);

            if lower_pos {
                let shift = self.lp.lower_raw(c).clone();
                self.shift_column_into_sides(c, &shift);
                let new_upper = self.lp.upper(c).map(|u| u - &shift);
                self.lp.change_bounds(c, Some(Rational::zero()), new_upper);
            } else if upper_neg {
                let shift = self.lp.upper_raw(c).clone();
                self.shift_column_into_sides(c, &shift);
                let new_lower = self.lp.lower(c).map(|l| l - &shift);
                self.lp.change_bounds(c, new_lower, Some(Rational::zero()));
            }
        }

        // homogenize sides through the tau column
        let mut tau_entries: Vec<(usize, Rational)> = Vec::new();
        for r in 0..num_rows {
            let lhs_pos = self.lp.lhs(r).map(|l| l.is_positive()).unwrap_or(false);
            let rhs_neg = self.lp.rhs(r).map(|u| u.is_negative()).unwrap_or(false);

            if lhs_pos {
                let lhs = self.lp.lhs_raw(r).clone();
                tau_entries.push((r, lhs.clone()));
                if self.lp.row_range(r).has_upper() {
                    let new_rhs = self.lp.rhs_raw(r) - &lhs;
                    self.lp
                        .change_range(r, Some(Rational::zero()), Some(new_rhs));
                } else {
                    self.lp.change_lhs(r, Some(Rational::zero()));
                }
            } else if rhs_neg {
                let rhs = self.lp.rhs_raw(r).clone();
                tau_entries.push((r, rhs.clone()));
                if self.lp.row_range(r).has_lower() {
                    let new_lhs = self.lp.lhs_raw(r) - &rhs;
                    self.lp
                        .change_range(r, Some(new_lhs), Some(Rational::zero()));
                } else {
                    self.lp.change_rhs(r, Some(Rational::zero()));
                }
            }
        }

        if tau_entries.is_empty() {
            log_debug!(self.log, "LP is trivially feasible.");
        }
        for (_, v) in tau_entries.iter_mut() {
            *v = -v.clone();
        }

        let tau_col = self.lp.add_col_with(
            Rational::zero(),
            Some(Rational::zero()),
            Some(Rational::one()),
            SparseVec::from_pairs(tau_entries),
        );
        self.lp.change_max_obj(tau_col, Rational::one());

        if self.has_basis {
            self.basis.cols.push(VarStatus::OnUpper);
        }
        self.rat_lu.clear();
        self.feas_store = Some(store);
    }

    /// Adds `-shift * col_c` into every finite side the column touches.
    fn shift_column_into_sides(&mut self, c: usize, shift: &Rational) {
        let col = self.lp.col_vector(c).clone();
        for (r, v) in col.iter() {
            let delta = v * shift;
            if self.lp.row_range(r).has_lower() {
                let new_lhs = self.lp.lhs_raw(r) - &delta;
                self.lp.change_lhs(r, Some(new_lhs));
            }
            if self.lp.row_range(r).has_upper() {
                let new_rhs = self.lp.rhs_raw(r) - &delta;
                self.lp.change_rhs(r, Some(new_rhs));
            }
        }
    }

    /// Restores the problem after the feasibility auxiliary and recovers
    /// the primal by unshifting when the problem proved feasible.
    fn untransform_feasibility(&mut self, sol: &mut RationalSolution, infeasible: bool) {
        let num_orig_cols = self.lp.num_cols() - 1;
        let tau_col_vector = self.lp.col_vector(num_orig_cols).clone();

        if infeasible {
            sol.is_primal_feasible = false;
            sol.has_primal_ray = false;
            sol.is_dual_feasible = false;
            sol.has_dual_farkas = true;
            self.has_basis = false;
            self.basis.cols.truncate(num_orig_cols);
        } else if sol.is_primal_feasible {
            let tau = sol.primal[num_orig_cols].clone();
            debug_assert!(tau >= Rational::one());

            sol.has_primal_ray = false;
            sol.is_dual_feasible = false;
            sol.has_dual_farkas = false;

            if tau != Rational::one() && !tau.is_zero() {
                for v in sol.slacks.iter_mut() {
                    *v /= &tau;
                }
                for v in sol.primal.iter_mut() {
                    *v /= &tau;
                }
            }
            sol.primal.truncate(num_orig_cols);
            for (r, v) in tau_col_vector.iter() {
                sol.slacks[r] -= v;
            }

            if self.has_basis {
                self.has_basis = self.basis.cols[num_orig_cols] != VarStatus::Basic;
            }
            self.basis.cols.truncate(num_orig_cols);
        } else {
            self.has_basis = false;
            self.basis.cols.truncate(num_orig_cols);
        }

        let store = self.feas_store.take().expect("feasibility store missing");

        // restore sides
        for r in 0..self.lp.num_rows() {
            if store.lhs[r].is_some() {
                self.lp.change_lhs(r, store.lhs[r].clone());
            } else {
                self.lp.change_lhs(r, None);
            }
            if store.rhs[r].is_some() {
                self.lp.change_rhs(r, store.rhs[r].clone());
            } else {
                self.lp.change_rhs(r, None);
            }
        }

        // unshift columns and restore objective and bounds
        for c in 0..num_orig_cols {
            let shifted = matches!(&store.lower[c], Some(l) if l.is_positive())
                || matches!(&store.upper[c], Some(u) if u.is_negative());

            if shifted && sol.is_primal_feasible {
                let shift = match (&store.lower[c], &store.upper[c]) {
                    (Some(l), _) if l.is_positive() => {
                        store.lower[c].clone().unwrap() - self.lp.lower_raw(c)
                    }
                    (_, Some(u)) if u.is_negative() => {
                        store.upper[c].clone().unwrap() - self.lp.upper_raw(c)
                    }
                    _ => Rational::zero(),
                };
                sol.primal[c] += &shift;
                let col = self.lp.col_vector(c).clone();
                for (r, v) in col.iter() {
                    sol.slacks[r] += v * &shift;
                }
            }

            self.lp.change_bounds(c, store.lower[c].clone(), store.upper[c].clone());
            self.lp.change_max_obj(c, store.obj[c].clone());
        }

        self.lp.truncate_cols(num_orig_cols);
        self.rat_lu.clear();
        sol.resize(num_orig_cols, self.lp.num_rows());
    }

    // ---- Farkas box verification --------------------------------------

    /// Weighted ℓ₁ check of an approximate Farkas proof.
    ///
    /// With positive multipliers acting on right-hand sides and negative
    /// ones on left-hand sides, a valid proof has `Σ y₊ rhs + Σ y₋ lhs`
    /// negative while `yᵀA = 0`. When `yᵀA` vanishes exactly the
    /// certificate is exact; otherwise a box of radius
    /// `-(Σ y₊ rhs + Σ y₋ lhs) / Σ|yᵀA|` provably contains no feasible
    /// point, which certifies infeasibility when every variable's bounds
    /// lie inside it.
    pub(super) fn verify_farkas_box(&self, sol: &RationalSolution) -> bool {
        if !sol.has_dual_farkas {
            return false;
        }
        let y = &sol.dual_farkas;
        let num_cols = self.lp.num_cols();
        let num_rows = self.lp.num_rows().min(y.len());

        let mut numer = Rational::zero();
        for r in 0..num_rows {
            if y[r].is_positive() {
                if !self.lp.row_range(r).has_upper() {
                    return false;
                }
                numer -= &y[r] * self.lp.rhs_raw(r);
            } else if y[r].is_negative() {
                if !self.lp.row_range(r).has_lower() {
                    return false;
                }
                numer -= &y[r] * self.lp.lhs_raw(r);
            }
        }
        if !numer.is_positive() {
            return false;
        }

        let mut denom = Rational::zero();
        for c in 0..num_cols {
            let mut yta = Rational::zero();
            for (r, v) in self.lp.col_vector(c).iter() {
                if r < num_rows {
                    yta += v * &y[r];
                }
            }
            denom += yta.abs();
        }
        if denom.is_zero() {
            // yᵀA vanishes exactly: the Farkas proof is exact
            return true;
        }

        let radius = numer / denom;
        for c in 0..num_cols {
            let inside = match (self.lp.lower(c), self.lp.upper(c)) {
                (Some(l), Some(u)) => l.abs() < radius && u.abs() < radius,
                _ => false,
            };
            if !inside {
                return false;
            }
        }
        true
    }
}
