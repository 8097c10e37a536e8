//! The iterative-refinement driver.

use std::time::Instant;

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use super::violation;
use crate::basis::{BasisDesc, VarStatus};
use crate::lu::{RationalLu, RationalLuStatus};
use crate::problem::{LpPair, RangeType};
use crate::rational::{
    invert, rational_from_f64, reconstruct_vector, Rational,
};
use crate::settings::{RatioTesterKind, SolverSettings, SyncMode};
use crate::simplex::SimplexEngine;
use crate::solution::{RationalSolution, SolveResult, Statistics};
use crate::sparse::SparseVec;
use crate::status::Status;
use crate::util::logging::{log_debug, log_info, Logger};
use crate::util::Timer;

/// Outcome flags of one `perform_opt_ir` invocation.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct IrResult {
    pub primal_feasible: bool,
    pub dual_feasible: bool,
    pub infeasible: bool,
    pub unbounded: bool,
    pub stopped_time: bool,
    pub stopped_iter: bool,
    pub error: bool,
}

impl IrResult {
    pub fn stopped(&self) -> bool {
        self.stopped_time || self.stopped_iter
    }
}

/// Saved bounds and sides of a transform, with finiteness.
#[derive(Debug, Clone, Default)]
pub(super) struct BoundsStore {
    pub lower: Vec<Option<Rational>>,
    pub upper: Vec<Option<Rational>>,
    pub lhs: Vec<Option<Rational>>,
    pub rhs: Vec<Option<Rational>>,
    pub obj: Vec<Rational>,
}

/// Driver state for one rational solve.
pub(super) struct RefinementDriver<'a> {
    pub(super) lp: &'a mut LpPair,
    pub(super) settings: SolverSettings,
    pub(super) engine: SimplexEngine,

    pub(super) basis: BasisDesc,
    pub(super) has_basis: bool,
    pub(super) stored_basis: Option<BasisDesc>,

    pub(super) rat_lu: RationalLu,
    pub(super) rat_lu_bind: Vec<i64>,

    pub(super) stats: Statistics,
    pub(super) log: Logger,
    pub(super) deadline: Option<Instant>,

    // floating data stored at solve entry, restored at exit
    pub(super) stored_lower_f: Vec<f64>,
    pub(super) stored_upper_f: Vec<f64>,
    pub(super) stored_lhs_f: Vec<f64>,
    pub(super) stored_rhs_f: Vec<f64>,
    pub(super) stored_obj_f: Vec<f64>,

    // transform records
    pub(super) slack_col_rows: Vec<usize>,
    pub(super) before_lift_cols: usize,
    pub(super) before_lift_rows: usize,
    pub(super) lifted: bool,
    pub(super) unb_store: Option<BoundsStore>,
    pub(super) feas_store: Option<BoundsStore>,
}

/// Solves the rational LP to an exact optimum, Farkas certificate, or
/// primal ray, using iterative refinement over floating-point simplex
/// solves.
pub fn solve(lp: &mut LpPair, settings: &SolverSettings) -> SolveResult {
    let mut timer = Timer::new();
    timer.start();

    let mut driver = RefinementDriver::new(lp, settings.clone());
    let (status, mut sol) = driver.run();

    let mut stats = driver.stats;
    timer.stop();
    stats.solve_time_ms = timer.time_ms();

    if status != Status::Optimal {
        sol.is_primal_feasible = false;
        sol.is_dual_feasible = false;
    }

    // internal duals live in maximization sense; flip for minimization
    if settings.objsense == crate::settings::ObjSense::Minimize {
        for v in sol.dual.iter_mut() {
            *v = -v.clone();
        }
        for v in sol.red_cost.iter_mut() {
            *v = -v.clone();
        }
    }

    SolveResult {
        status,
        solution: sol,
        info: stats,
    }
}

impl<'a> RefinementDriver<'a> {
    pub(super) fn new(lp: &'a mut LpPair, settings: SolverSettings) -> Self {
        let engine = SimplexEngine::new(&settings);
        let log = Logger::new(settings.verbosity);
        let deadline = settings.time_limit.map(|d| Instant::now() + d);
        Self {
            lp,
            settings,
            engine,
            basis: BasisDesc::default(),
            has_basis: false,
            stored_basis: None,
            rat_lu: RationalLu::new(),
            rat_lu_bind: Vec::new(),
            stats: Statistics::default(),
            log,
            deadline,
            stored_lower_f: Vec::new(),
            stored_upper_f: Vec::new(),
            stored_lhs_f: Vec::new(),
            stored_rhs_f: Vec::new(),
            stored_obj_f: Vec::new(),
            slack_col_rows: Vec::new(),
            before_lift_cols: 0,
            before_lift_rows: 0,
            lifted: false,
            unb_store: None,
            feas_store: None,
        }
    }

    fn maxscaleincr() -> Rational {
        Rational::from_integer(BigInt::from(10).pow(25u32))
    }

    pub(super) fn time_up(&self) -> bool {
        if let Some(cancel) = &self.settings.cancel {
            if cancel.load(std::sync::atomic::Ordering::Relaxed) {
                return true;
            }
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn iters_up(&self) -> bool {
        self.settings
            .iter_limit
            .is_some_and(|l| self.stats.iterations >= l)
    }

    // ---- top-level control flow ---------------------------------------

    pub(super) fn run(&mut self) -> (Status, RationalSolution) {
        if self.lp.validate().is_err() {
            return (
                Status::Error,
                RationalSolution::new(self.lp.num_cols(), self.lp.num_rows()),
            );
        }
        if self.lp.num_rows() == 0 && self.lp.num_cols() == 0 {
            return (Status::NoProblem, RationalSolution::new(0, 0));
        }

        if self.settings.syncmode == SyncMode::Auto {
            self.lp.sync_float_from_rational();
        }
        self.store_lp_real();

        // deactivate the objective limit during refinement
        self.engine
            .set_termination(f64::INFINITY, self.deadline, None);

        if self.settings.lifting {
            let t = Instant::now();
            self.lift();
            self.stats.transform_time_ms += t.elapsed().as_millis() as u64;
        }

        // force column representation and the fast ratio test during
        // refinement (no bound flips, row objectives supported)
        self.engine
            .set_representation(crate::settings::Representation::Column);
        self.engine.set_ratio_tester(RatioTesterKind::Fast);

        if self.settings.eqtrans {
            let t = Instant::now();
            self.transform_equality();
            self.stats.transform_time_ms += t.elapsed().as_millis() as u64;
        }

        let mut sol = RationalSolution::new(self.lp.num_cols(), self.lp.num_rows());
        let mut status = Status::Unknown;
        let mut infeasibility_not_certified = false;
        let mut unboundedness_not_certified = false;
        let mut has_unbounded_ray = false;

        loop {
            let ir = self.perform_opt_ir(
                &mut sol,
                !unboundedness_not_certified,
                !infeasibility_not_certified,
                0,
            );

            if ir.error {
                status = Status::Error;
                break;
            } else if ir.stopped_time {
                status = Status::AbortTime;
                break;
            } else if ir.stopped_iter {
                status = Status::AbortIter;
                break;
            } else if ir.unbounded && !unboundedness_not_certified {
                let mut sol_unbounded = RationalSolution::default();
                let (unb_ir, ray) = self.perform_unbounded_ir(&mut sol_unbounded);
                has_unbounded_ray = ray;

                if unb_ir.error {
                    log_info!(self.log, "Error while testing for unboundedness.");
                    status = Status::Error;
                    break;
                }
                if has_unbounded_ray {
                    log_info!(self.log, "Dual infeasible.  Primal unbounded ray available.");
                } else {
                    log_info!(self.log, "Dual feasible.  Rejecting primal unboundedness.");
                }
                unboundedness_not_certified = !has_unbounded_ray;

                if unb_ir.stopped_time {
                    status = Status::AbortTime;
                    break;
                } else if unb_ir.stopped_iter {
                    status = Status::AbortIter;
                    break;
                }

                let (feas_ir, infeasible) = self.perform_feas_ir(&mut sol);
                if has_unbounded_ray {
                    sol.primal_ray = sol_unbounded.primal_ray.clone();
                    sol.has_primal_ray = true;
                }

                if feas_ir.error {
                    log_info!(self.log, "Error while testing for feasibility.");
                    status = Status::Error;
                    break;
                } else if feas_ir.stopped_time {
                    status = Status::AbortTime;
                    break;
                } else if feas_ir.stopped_iter {
                    status = Status::AbortIter;
                    break;
                } else if infeasible {
                    log_info!(self.log, "Primal infeasible.  Dual Farkas ray available.");
                    status = Status::Infeasible;
                    break;
                } else if has_unbounded_ray {
                    log_info!(self.log, "Primal feasible and unbounded.");
                    status = Status::Unbounded;
                    break;
                } else {
                    log_info!(self.log, "Primal feasible and bounded.  Optimizing again.");
                    continue;
                }
            } else if ir.infeasible && !infeasibility_not_certified {
                self.store_basis();

                let (feas_ir, infeasible) = self.perform_feas_ir(&mut sol);

                if feas_ir.error {
                    log_info!(self.log, "Error while testing for infeasibility.");
                    status = Status::Error;
                    self.restore_basis();
                    break;
                }
                infeasibility_not_certified = !infeasible;

                if feas_ir.stopped_time {
                    status = Status::AbortTime;
                    self.restore_basis();
                    break;
                } else if feas_ir.stopped_iter {
                    status = Status::AbortIter;
                    self.restore_basis();
                    break;
                }

                if infeasible && self.settings.test_dual_inf {
                    let mut sol_unbounded = RationalSolution::default();
                    let (unb_ir, ray) = self.perform_unbounded_ir(&mut sol_unbounded);
                    if unb_ir.error {
                        log_info!(self.log, "Error while testing for dual infeasibility.");
                        status = Status::Error;
                        self.restore_basis();
                        break;
                    }
                    if ray {
                        sol.primal_ray = sol_unbounded.primal_ray.clone();
                        sol.has_primal_ray = true;
                        has_unbounded_ray = true;
                    } else if sol_unbounded.is_dual_feasible {
                        sol.dual = sol_unbounded.dual.clone();
                        sol.red_cost = sol_unbounded.red_cost.clone();
                        sol.is_dual_feasible = true;
                    }
                }

                self.restore_basis();

                if infeasible {
                    log_info!(self.log, "Primal infeasible.  Dual Farkas ray available.");
                    status = Status::Infeasible;
                    break;
                } else if has_unbounded_ray {
                    status = Status::Unbounded;
                    break;
                } else {
                    log_info!(self.log, "Primal feasible.  Optimizing again.");
                    continue;
                }
            } else if ir.primal_feasible && ir.dual_feasible {
                log_info!(self.log, "Solved to optimality.");
                status = Status::Optimal;
                break;
            } else {
                log_info!(self.log, "Terminating without success.");
                status = Status::Error;
                break;
            }
        }

        // undo transforms in reverse nesting order
        let t = Instant::now();
        if self.settings.eqtrans {
            self.untransform_equality(&mut sol);
        }
        if self.lifted {
            self.project(&mut sol);
        }
        self.stats.transform_time_ms += t.elapsed().as_millis() as u64;
        self.restore_lp_real();

        (status, sol)
    }

    // ---- one optimality refinement campaign ---------------------------

    #[allow(clippy::too_many_lines)]
    pub(super) fn perform_opt_ir(
        &mut self,
        sol: &mut RationalSolution,
        accept_unbounded: bool,
        accept_infeasible: bool,
        mut min_rounds: i32,
    ) -> IrResult {
        let mut ir = IrResult::default();

        self.engine
            .set_tolerances(self.settings.fp_feastol, self.settings.fp_opttol);

        // each campaign starts from a floating LP that mirrors the
        // (possibly transformed) rational LP; earlier refinements leave
        // scaled residual data behind
        self.lp.sync_float_from_rational();

        let num_cols = self.lp.num_cols();
        let num_rows = self.lp.num_rows();
        sol.resize(num_cols, num_rows);

        let mut mod_lower = vec![Rational::zero(); num_cols];
        let mut mod_upper = vec![Rational::zero(); num_cols];
        let mut mod_lhs = vec![Rational::zero(); num_rows];
        let mut mod_rhs = vec![Rational::zero(); num_rows];
        let mut mod_obj: Vec<Rational>;

        log_info!(self.log, "Initial floating-point solve . . .");
        let (result, mut primal_f, mut dual_f) =
            self.solve_real_stable(accept_unbounded, accept_infeasible, false);

        if self.evaluate_result(result, false, sol, &dual_f, &mut ir) {
            return ir;
        }

        self.store_real_solution_as_rational(sol, &primal_f, &dual_f);

        let mut primal_scale = Rational::one();
        let mut dual_scale = Rational::one();

        let mut best_violation: Option<Rational> = None; // None = infinite
        let improvement_factor = Rational::from_integer(16.into());
        let error_correction_factor = Rational::new(11.into(), 10.into());
        let mut error_correction = Rational::from_integer(2.into());
        let mut num_failed_refinements = 0u32;

        let mut factor_sol_new_basis = true;
        let mut last_stall_refinements = 0u32;
        let mut next_ratrec_refinement = 0u32;

        loop {
            min_rounds -= 1;

            let bounds_viol = violation::bounds_violation(self.lp, sol, &mut mod_lower, &mut mod_upper);
            let sides_viol =
                violation::sides_violation(self.lp, sol, &self.basis, &mut mod_lhs, &mut mod_rhs);
            let red_cost_viol = violation::red_cost_violation(self.lp, sol, &self.basis);
            let dual_viol = violation::dual_violation(self.lp, sol, &self.basis);

            mod_obj = sol.red_cost.clone();

            log_info!(
                self.log,
                "Refinement {}: violations bound={:e} side={:e} redcost={:e} dual={:e}",
                self.stats.refinements,
                crate::rational::rational_to_f64(&bounds_viol),
                crate::rational::rational_to_f64(&sides_viol),
                crate::rational::rational_to_f64(&red_cost_viol),
                crate::rational::rational_to_f64(&dual_viol),
            );

            // termination on tolerances
            ir.primal_feasible =
                bounds_viol <= self.settings.feastol && sides_viol <= self.settings.feastol;
            ir.dual_feasible =
                red_cost_viol <= self.settings.opttol && dual_viol <= self.settings.opttol;
            if ir.primal_feasible && ir.dual_feasible && min_rounds < 0 {
                log_info!(self.log, "Tolerances reached.");
                break;
            }
            if self.time_up() {
                ir.stopped_time = true;
                break;
            }
            if self.iters_up() {
                ir.stopped_iter = true;
                break;
            }
            if num_failed_refinements > 2 {
                log_info!(self.log, "Giving up after three failed refinements.");
                break;
            }
            if self.stats.refinements >= self.settings.max_refinements {
                ir.stopped_iter = true;
                break;
            }

            // progress check
            let mut max_violation = bounds_viol.clone();
            if sides_viol > max_violation {
                max_violation = sides_viol.clone();
            }
            if red_cost_viol > max_violation {
                max_violation = red_cost_viol.clone();
            }
            if dual_viol > max_violation {
                max_violation = dual_viol.clone();
            }
            match &mut best_violation {
                Some(best) => {
                    let shrunk = &*best / &improvement_factor;
                    if max_violation > shrunk {
                        log_info!(self.log, "Failed to reduce violation significantly.");
                        num_failed_refinements += 1;
                    } else {
                        *best = max_violation.clone();
                    }
                }
                None => best_violation = Some(max_violation.clone()),
            }

            // rational reconstruction and/or exact factorization
            error_correction *= &error_correction_factor;
            let mut break_after = false;
            let mut continue_after = false;
            self.ratrec_and_ratfac(
                &mut min_rounds,
                last_stall_refinements,
                &mut factor_sol_new_basis,
                &mut next_ratrec_refinement,
                &error_correction,
                &max_violation,
                sol,
                &mut ir,
                &mut break_after,
                &mut continue_after,
            );
            if break_after {
                break;
            }
            if ir.stopped() {
                break;
            }
            if continue_after {
                continue;
            }

            // scaling factors
            violation::primal_scaling_factor(
                &mut primal_scale,
                &bounds_viol,
                &sides_viol,
                &red_cost_viol,
                &Self::maxscaleincr(),
                self.settings.powerscaling,
            );
            self.apply_scaled_bounds(&mut mod_lower, &mut mod_upper, &mut primal_scale);
            self.apply_scaled_sides(&mut mod_lhs, &mut mod_rhs, &primal_scale);

            violation::dual_scaling_factor(
                &mut dual_scale,
                &primal_scale,
                &red_cost_viol,
                &dual_viol,
                &Self::maxscaleincr(),
                self.settings.powerscaling,
                &mut mod_obj,
            );
            self.apply_scaled_obj(&mod_obj, &dual_scale, sol);

            log_info!(self.log, "Refined floating-point solve . . .");

            // keep slack columns basic and their rows nonbasic, else the
            // dual of restricted inequalities is lost on untransform
            self.restore_slack_basic_invariant();

            let prev_iterations = self.stats.iterations;
            let (result, p, d) = self.solve_real_stable(accept_unbounded, accept_infeasible, true);
            primal_f = p;
            dual_f = d;

            self.stats.refinements += 1;
            if self.stats.iterations <= prev_iterations {
                last_stall_refinements += 1;
                self.stats.stall_refinements += 1;
            } else {
                factor_sol_new_basis = true;
                last_stall_refinements = 0;
                self.stats.pivot_refinements = self.stats.refinements;
            }

            if self.evaluate_result(result, true, sol, &dual_f, &mut ir) {
                return ir;
            }

            // lift the floating corrections into the rational solution
            let (primal_diff, primal_size) =
                self.correct_primal_solution(sol, &primal_scale, &primal_f);
            if primal_diff.nnz() < primal_size {
                self.lp.add_primal_activity(&primal_diff, &mut sol.slacks);
            } else {
                sol.slacks = self.lp.compute_primal_activity(&sol.primal);
            }

            let (dual_diff, dual_size) = self.correct_dual_solution(sol, &dual_scale, &dual_f);
            if dual_diff.nnz() < dual_size + 1 {
                self.add_dual_activity(&dual_diff, &mut sol.red_cost);
            } else {
                for c in 0..self.lp.num_cols() {
                    sol.red_cost[c] = self.lp.max_obj(c).clone();
                }
                self.lp.sub_dual_activity(&sol.dual, &mut sol.red_cost);
            }
        }

        // restore FIXED statuses of restricted inequality rows
        if self.has_basis {
            for r in 0..self.lp.num_rows() {
                if self.lp.row_range(r) != RangeType::Fixed
                    && self.basis.rows[r] == VarStatus::Fixed
                {
                    self.basis.rows[r] = if sol.dual[r].is_negative() {
                        VarStatus::OnLower
                    } else {
                        VarStatus::OnUpper
                    };
                }
            }
        }

        sol.is_primal_feasible = ir.primal_feasible;
        sol.is_dual_feasible = ir.dual_feasible;
        if sol.is_primal_feasible {
            let max_val = self.lp.max_obj_value(&sol.primal);
            sol.obj_value = match self.settings.objsense {
                crate::settings::ObjSense::Maximize => max_val,
                crate::settings::ObjSense::Minimize => -max_val,
            };
        }

        self.lp.clear_row_objs_f();
        ir
    }

    // ---- evaluation and data shuffling --------------------------------

    /// Returns true when the refinement loop must stop.
    fn evaluate_result(
        &mut self,
        result: Status,
        using_refined_lp: bool,
        sol: &mut RationalSolution,
        dual_f: &[f64],
        ir: &mut IrResult,
    ) -> bool {
        match result {
            Status::Optimal => {
                log_info!(self.log, "Floating-point optimal.");
                false
            }
            Status::Infeasible => {
                log_info!(self.log, "Floating-point infeasible.");
                if using_refined_lp || self.has_basis {
                    sol.dual_farkas = dual_f.iter().map(|&v| rational_from_f64(v)).collect();
                    sol.has_dual_farkas = true;
                }
                if using_refined_lp {
                    self.lp.clear_row_objs_f();
                }
                ir.infeasible = true;
                true
            }
            Status::Unbounded => {
                log_info!(self.log, "Floating-point unbounded.");
                if using_refined_lp {
                    self.lp.clear_row_objs_f();
                }
                ir.unbounded = true;
                true
            }
            Status::AbortTime => {
                ir.stopped_time = true;
                true
            }
            Status::AbortIter => {
                if using_refined_lp {
                    self.lp.clear_row_objs_f();
                }
                ir.stopped_iter = true;
                true
            }
            _ => {
                if using_refined_lp {
                    self.lp.clear_row_objs_f();
                }
                ir.error = true;
                true
            }
        }
    }

    /// Stores the floating solution as the initial rational solution,
    /// aligning it with the basis: nonbasic variables snap to their exact
    /// bounds.
    fn store_real_solution_as_rational(
        &mut self,
        sol: &mut RationalSolution,
        primal_f: &[f64],
        dual_f: &[f64],
    ) {
        sol.is_primal_feasible = true;
        sol.is_dual_feasible = true;

        for c in 0..self.lp.num_cols() {
            match self.basis.cols[c] {
                VarStatus::OnLower => sol.primal[c] = self.lp.lower_raw(c).clone(),
                VarStatus::OnUpper => sol.primal[c] = self.lp.upper_raw(c).clone(),
                VarStatus::Fixed => {
                    // bounds may differ in the rational LP even when the
                    // floating bounds coincide; resolve to the lower one
                    sol.primal[c] = self.lp.lower_raw(c).clone();
                    self.basis.cols[c] = VarStatus::OnLower;
                }
                VarStatus::Zero => sol.primal[c] = Rational::zero(),
                _ => sol.primal[c] = rational_from_f64(primal_f[c]),
            }
        }
        sol.slacks = self.lp.compute_primal_activity(&sol.primal);

        for r in 0..self.lp.num_rows() {
            if self.basis.rows[r] == VarStatus::Fixed {
                self.basis.rows[r] = VarStatus::OnLower;
            }
            sol.dual[r] = rational_from_f64(dual_f[r]);
        }

        for c in 0..self.lp.num_cols() {
            sol.red_cost[c] = self.lp.max_obj(c).clone();
        }
        self.lp.sub_dual_activity(&sol.dual, &mut sol.red_cost);
    }

    /// Forces nonbasic variables onto their exact bounds and adds the
    /// scaled floating correction to the basic ones. Returns the sparse
    /// primal correction and the primal support size.
    fn correct_primal_solution(
        &mut self,
        sol: &mut RationalSolution,
        primal_scale: &Rational,
        primal_f: &[f64],
    ) -> (SparseVec<Rational>, usize) {
        let mut diff = SparseVec::new();
        let mut primal_size = 0;
        let mut scale_inv = primal_scale.clone();
        invert(&mut scale_inv);

        for c in 0..self.lp.num_cols() {
            match self.basis.cols[c] {
                VarStatus::OnLower => {
                    if &sol.primal[c] != self.lp.lower_raw(c) {
                        let delta = self.lp.lower_raw(c) - &sol.primal[c];
                        diff.push(c, delta);
                        sol.primal[c] = self.lp.lower_raw(c).clone();
                    }
                }
                VarStatus::OnUpper => {
                    if &sol.primal[c] != self.lp.upper_raw(c) {
                        let delta = self.lp.upper_raw(c) - &sol.primal[c];
                        diff.push(c, delta);
                        sol.primal[c] = self.lp.upper_raw(c).clone();
                    }
                }
                VarStatus::Fixed => {
                    self.basis.cols[c] = VarStatus::OnLower;
                    if &sol.primal[c] != self.lp.lower_raw(c) {
                        let delta = self.lp.lower_raw(c) - &sol.primal[c];
                        diff.push(c, delta);
                        sol.primal[c] = self.lp.lower_raw(c).clone();
                    }
                }
                VarStatus::Zero => {
                    if !sol.primal[c].is_zero() {
                        diff.push(c, -sol.primal[c].clone());
                        sol.primal[c] = Rational::zero();
                    }
                }
                _ => {
                    if primal_f[c] != 0.0 {
                        let delta = rational_from_f64(primal_f[c]) * &scale_inv;
                        sol.primal[c] += &delta;
                        diff.push(c, delta);
                    }
                }
            }
            if !sol.primal[c].is_zero() {
                primal_size += 1;
            }
        }
        (diff, primal_size)
    }

    /// Adds the scaled floating dual correction. Returns the negated
    /// sparse dual correction and the dual support size.
    fn correct_dual_solution(
        &mut self,
        sol: &mut RationalSolution,
        dual_scale: &Rational,
        dual_f: &[f64],
    ) -> (SparseVec<Rational>, usize) {
        let mut scale_inv_neg = dual_scale.clone();
        invert(&mut scale_inv_neg);
        scale_inv_neg = -scale_inv_neg;

        let mut diff = SparseVec::new();
        let mut dual_size = 0;

        for r in 0..self.lp.num_rows() {
            if self.basis.rows[r] == VarStatus::Fixed {
                self.basis.rows[r] = VarStatus::OnLower;
            }
            if dual_f[r] != 0.0 {
                let v = rational_from_f64(dual_f[r]) * &scale_inv_neg;
                sol.dual[r] -= &v;
                diff.push(r, v);
            }
            dual_size += 1;
        }
        (diff, dual_size)
    }

    /// `red_cost[c] += col_c · diff` for a sparse (row-indexed) dual
    /// correction.
    fn add_dual_activity(&self, diff: &SparseVec<Rational>, red_cost: &mut [Rational]) {
        let mut dense = vec![Rational::zero(); self.lp.num_rows()];
        for (r, v) in diff.iter() {
            dense[r] = v.clone();
        }
        for c in 0..self.lp.num_cols() {
            let act = self.lp.col_vector(c).dot_dense_rational(&dense);
            if !act.is_zero() {
                red_cost[c] += act;
            }
        }
    }

    // ---- scaled problem assembly --------------------------------------

    fn apply_scaled_bounds(
        &mut self,
        mod_lower: &mut [Rational],
        mod_upper: &mut [Rational],
        primal_scale: &mut Rational,
    ) {
        let one = Rational::one();
        if *primal_scale < one {
            *primal_scale = one.clone();
        }
        if *primal_scale > one {
            log_debug!(
                self.log,
                "Scaling primal by {:e}.",
                crate::rational::rational_to_f64(primal_scale)
            );
        }

        for c in 0..self.lp.num_cols() {
            if self.lp.col_range(c).has_lower() {
                if *primal_scale > one {
                    mod_lower[c] *= &*primal_scale;
                }
                self.lp
                    .set_lower_f(c, crate::rational::rational_to_f64(&mod_lower[c]));
            }
            if self.lp.col_range(c).has_upper() {
                if *primal_scale > one {
                    mod_upper[c] *= &*primal_scale;
                }
                self.lp
                    .set_upper_f(c, crate::rational::rational_to_f64(&mod_upper[c]));
            }
        }
    }

    fn apply_scaled_sides(
        &mut self,
        mod_lhs: &mut [Rational],
        mod_rhs: &mut [Rational],
        primal_scale: &Rational,
    ) {
        let one = Rational::one();
        for r in 0..self.lp.num_rows() {
            if self.lp.row_range(r).has_lower() {
                if *primal_scale != one {
                    mod_lhs[r] *= primal_scale;
                }
                self.lp
                    .set_lhs_f(r, crate::rational::rational_to_f64(&mod_lhs[r]));
            }
            if self.lp.row_range(r).has_upper() {
                if *primal_scale != one {
                    mod_rhs[r] *= primal_scale;
                }
                self.lp
                    .set_rhs_f(r, crate::rational::rational_to_f64(&mod_rhs[r]));
            }
        }
    }

    fn apply_scaled_obj(
        &mut self,
        mod_obj: &[Rational],
        dual_scale: &Rational,
        sol: &RationalSolution,
    ) {
        for c in 0..self.lp.num_cols() {
            self.lp
                .set_max_obj_f(c, crate::rational::rational_to_f64(&mod_obj[c]));
        }
        for r in 0..self.lp.num_rows() {
            if self.lp.row_range(r) == RangeType::Fixed {
                self.lp.set_row_obj_f(r, 0.0);
            } else {
                let row_obj = &sol.dual[r] * dual_scale;
                self.lp
                    .set_row_obj_f(r, -crate::rational::rational_to_f64(&row_obj));
            }
        }
    }

    /// Makes sure every equality slack column stays basic while its row
    /// is nonbasic; scaling can break that pairing.
    fn restore_slack_basic_invariant(&mut self) {
        if self.slack_col_rows.is_empty() || !self.has_basis {
            return;
        }
        let num_orig_cols = self.lp.num_cols() - self.slack_col_rows.len();
        for (i, &row) in self.slack_col_rows.iter().enumerate() {
            let col = num_orig_cols + i;
            if self.basis.rows[row] == VarStatus::Basic
                && self.basis.cols[col] != VarStatus::Basic
            {
                self.basis.rows[row] = self.basis.cols[col];
                self.basis.cols[col] = VarStatus::Basic;
                self.rat_lu.clear();
            }
        }
    }

    // ---- reconstruction and exact factorization -----------------------

    #[allow(clippy::too_many_arguments)]
    fn ratrec_and_ratfac(
        &mut self,
        min_rounds: &mut i32,
        last_stall_refinements: u32,
        factor_sol_new_basis: &mut bool,
        next_ratrec_refinement: &mut u32,
        error_correction: &Rational,
        max_violation: &Rational,
        sol: &mut RationalSolution,
        ir: &mut IrResult,
        break_after: &mut bool,
        continue_after: &mut bool,
    ) {
        let force_basic = self.settings.force_basic;
        let mut perform_ratfac = self.settings.ratfac
            && last_stall_refinements >= self.settings.ratfac_min_stalls
            && self.has_basis
            && *factor_sol_new_basis;
        let perform_ratrec = self.settings.ratrec
            && (self.stats.refinements >= *next_ratrec_refinement || perform_ratfac);
        perform_ratfac = perform_ratfac || force_basic;

        if perform_ratrec && !max_violation.is_zero() {
            log_info!(self.log, "Performing rational reconstruction . . .");
            self.stats.reconstruction_attempts += 1;

            let mut denom_bound = max_violation * error_correction;
            invert(&mut denom_bound);
            let denom_bound = denom_bound.to_integer().abs().max(BigInt::one());

            if self.reconstruct_solution(sol, &denom_bound) {
                log_info!(self.log, "Tolerances reached.");
                self.stats.reconstruction_successes += 1;
                ir.primal_feasible = true;
                ir.dual_feasible = true;
                sol.is_primal_feasible = true;
                sol.is_dual_feasible = true;
                if self.has_basis || !force_basic {
                    *break_after = true;
                    return;
                }
            }

            *next_ratrec_refinement =
                (self.stats.refinements as f64 * self.settings.ratrec_freq) as u32 + 1;
            log_debug!(
                self.log,
                "Next rational reconstruction after refinement {}.",
                next_ratrec_refinement
            );
        }

        if (perform_ratfac && !max_violation.is_zero()) || (!self.has_basis && force_basic) {
            log_info!(self.log, "Performing rational factorization . . .");
            let mut error = false;
            let mut optimal = false;
            self.factorize_column_rational(sol, ir, &mut error, &mut optimal);
            *factor_sol_new_basis = false;

            if ir.stopped_time {
                log_info!(self.log, "Stopped rational factorization.");
            } else if error {
                // continue without the exact-basis shortcut
            } else if optimal {
                log_info!(self.log, "Tolerances reached.");
                ir.primal_feasible = true;
                ir.dual_feasible = true;
                sol.is_primal_feasible = true;
                sol.is_dual_feasible = true;
                *break_after = true;
            } else if self.settings.ratfac_jump {
                log_info!(self.log, "Jumping to exact basic solution.");
                *min_rounds += 1;
                *continue_after = true;
            }
        }
    }

    /// Continued-fraction reconstruction of the full solution; accepted
    /// only when every exact feasibility and complementarity check
    /// passes.
    fn reconstruct_solution(&self, sol: &mut RationalSolution, denom_bound: &BigInt) -> bool {
        let Some(primal) = reconstruct_vector(&sol.primal, denom_bound) else {
            return false;
        };
        let Some(dual) = reconstruct_vector(&sol.dual, denom_bound) else {
            return false;
        };

        let mut candidate = RationalSolution::new(self.lp.num_cols(), self.lp.num_rows());
        candidate.primal = primal;
        candidate.dual = dual;
        candidate.slacks = self.lp.compute_primal_activity(&candidate.primal);
        for c in 0..self.lp.num_cols() {
            candidate.red_cost[c] = self.lp.max_obj(c).clone();
        }
        self.lp.sub_dual_activity(&candidate.dual, &mut candidate.red_cost);

        if !self.is_exactly_optimal(&candidate) {
            return false;
        }

        sol.primal = candidate.primal;
        sol.dual = candidate.dual;
        sol.slacks = candidate.slacks;
        sol.red_cost = candidate.red_cost;
        true
    }

    /// Exact optimality check of a candidate against the current basis.
    fn is_exactly_optimal(&self, sol: &RationalSolution) -> bool {
        let n = self.lp.num_cols();
        let m = self.lp.num_rows();
        let mut ml = vec![Rational::zero(); n];
        let mut mu = vec![Rational::zero(); n];
        let mut mlh = vec![Rational::zero(); m];
        let mut mrh = vec![Rational::zero(); m];

        violation::bounds_violation(self.lp, sol, &mut ml, &mut mu).is_zero()
            && violation::sides_violation(self.lp, sol, &self.basis, &mut mlh, &mut mrh).is_zero()
            && violation::red_cost_violation(self.lp, sol, &self.basis).is_zero()
            && violation::dual_violation(self.lp, sol, &self.basis).is_zero()
    }

    /// Exact factorization of the current basis matrix; on success the
    /// solution becomes the exact basic solution of that basis.
    fn factorize_column_rational(
        &mut self,
        sol: &mut RationalSolution,
        ir: &mut IrResult,
        error: &mut bool,
        optimal: &mut bool,
    ) {
        *error = false;
        *optimal = false;

        // cancellation is polled at every rational factorization entry
        if self.time_up() {
            ir.stopped_time = true;
            return;
        }

        let dim = self.lp.num_rows();
        let load_matrix = !matches!(self.rat_lu.status(), RationalLuStatus::Ok);

        let mut primal_rhs = vec![Rational::zero(); dim];
        let mut dual_rhs = vec![Rational::zero(); dim];
        if load_matrix {
            self.rat_lu_bind = Vec::with_capacity(dim);
        }

        let mut j = 0usize;
        for i in 0..dim {
            match self.basis.rows[i] {
                VarStatus::Basic => {
                    if j >= dim {
                        log_info!(self.log, "Too many basic rows in rational factorization.");
                        *error = true;
                        return;
                    }
                    if load_matrix {
                        self.rat_lu_bind.push(-1 - i as i64);
                    }
                    dual_rhs[j] = Rational::zero();
                    j += 1;
                }
                VarStatus::OnLower => primal_rhs[i] = self.lp.lhs_raw(i).clone(),
                VarStatus::OnUpper => primal_rhs[i] = self.lp.rhs_raw(i).clone(),
                VarStatus::Fixed => primal_rhs[i] = self.lp.lhs_raw(i).clone(),
                VarStatus::Zero => primal_rhs[i] = Rational::zero(),
                VarStatus::Undefined => {
                    log_info!(self.log, "Undefined basis status of row in rational factorization.");
                    *error = true;
                    return;
                }
            }
        }
        for c in 0..self.lp.num_cols() {
            match self.basis.cols[c] {
                VarStatus::Basic => {
                    if j >= dim {
                        log_info!(self.log, "Too many basic columns in rational factorization.");
                        *error = true;
                        return;
                    }
                    if load_matrix {
                        self.rat_lu_bind.push(c as i64);
                    }
                    dual_rhs[j] = self.lp.max_obj(c).clone();
                    j += 1;
                }
                VarStatus::OnLower | VarStatus::Fixed => {
                    let val = -self.lp.lower_raw(c);
                    self.lp.col_vector(c).axpy_into_rational(&val, &mut primal_rhs);
                }
                VarStatus::OnUpper => {
                    let val = -self.lp.upper_raw(c);
                    self.lp.col_vector(c).axpy_into_rational(&val, &mut primal_rhs);
                }
                VarStatus::Zero => {}
                VarStatus::Undefined => {
                    log_info!(
                        self.log,
                        "Undefined basis status of column in rational factorization."
                    );
                    *error = true;
                    return;
                }
            }
        }
        if j != dim {
            log_info!(self.log, "Too few basic entries in rational factorization.");
            *error = true;
            return;
        }

        if load_matrix {
            let columns: Vec<SparseVec<Rational>> = self
                .rat_lu_bind
                .iter()
                .map(|&b| {
                    if b >= 0 {
                        self.lp.col_vector(b as usize).clone()
                    } else {
                        SparseVec::from_pairs([((-1 - b) as usize, Rational::one())])
                    }
                })
                .collect();

            let timer = Instant::now();
            let status = self.rat_lu.load(&columns, self.settings.ratfac_time_limit);
            self.stats.rational_factor_time_ms += timer.elapsed().as_millis() as u64;
            self.stats.rational_factorizations += 1;

            match status {
                RationalLuStatus::Ok => {}
                RationalLuStatus::TimeLimit => {
                    log_info!(self.log, "Rational factorization hit time limit.");
                    ir.stopped_time = self.time_up();
                    return;
                }
                _ => {
                    log_info!(self.log, "Error performing rational LU factorization.");
                    *error = true;
                    return;
                }
            }
        }

        let Some(basic_primal) = self.rat_lu.solve_right(&primal_rhs) else {
            *error = true;
            return;
        };
        let Some(basic_dual) = self.rat_lu.solve_left(&dual_rhs) else {
            *error = true;
            return;
        };

        // feasibility of the exact basic solution
        let mut feasible = true;
        for (pos, &bind) in self.rat_lu_bind.iter().enumerate() {
            if bind >= 0 {
                let c = bind as usize;
                let range = self.lp.col_range(c);
                if (range.has_lower() && &basic_primal[pos] < self.lp.lower_raw(c))
                    || (range.has_upper() && &basic_primal[pos] > self.lp.upper_raw(c))
                {
                    feasible = false;
                    break;
                }
            } else {
                let r = (-1 - bind) as usize;
                let range = self.lp.row_range(r);
                // row position holds the negated activity
                let activity = -&basic_primal[pos];
                if (range.has_lower() && &activity < self.lp.lhs_raw(r))
                    || (range.has_upper() && &activity > self.lp.rhs_raw(r))
                {
                    feasible = false;
                    break;
                }
            }
        }
        if !feasible {
            log_info!(self.log, "Rational solution primal infeasible.");
            return;
        }

        // assemble the exact basic solution
        let mut exact = RationalSolution::new(self.lp.num_cols(), self.lp.num_rows());
        for c in 0..self.lp.num_cols() {
            exact.primal[c] = match self.basis.cols[c] {
                VarStatus::OnLower | VarStatus::Fixed => self.lp.lower_raw(c).clone(),
                VarStatus::OnUpper => self.lp.upper_raw(c).clone(),
                _ => Rational::zero(),
            };
        }
        for (pos, &bind) in self.rat_lu_bind.iter().enumerate() {
            if bind >= 0 {
                exact.primal[bind as usize] = basic_primal[pos].clone();
            }
        }
        exact.slacks = self.lp.compute_primal_activity(&exact.primal);
        exact.dual = basic_dual;
        for c in 0..self.lp.num_cols() {
            exact.red_cost[c] = self.lp.max_obj(c).clone();
        }
        self.lp.sub_dual_activity(&exact.dual, &mut exact.red_cost);

        let dual_ok = violation::red_cost_violation(self.lp, &exact, &self.basis).is_zero()
            && violation::dual_violation(self.lp, &exact, &self.basis).is_zero();

        // the exact basic solution always replaces the approximation;
        // optimality additionally requires dual feasibility
        sol.primal = exact.primal;
        sol.slacks = exact.slacks;
        sol.dual = exact.dual;
        sol.red_cost = exact.red_cost;
        *optimal = dual_ok;
    }

    // ---- basis and floating-LP store/restore --------------------------

    pub(super) fn store_basis(&mut self) {
        debug_assert!(self.stored_basis.is_none());
        if self.has_basis {
            self.stored_basis = Some(self.basis.clone());
        }
    }

    pub(super) fn restore_basis(&mut self) {
        if let Some(b) = self.stored_basis.take() {
            self.basis = b;
            self.has_basis = true;
        }
    }

    fn store_lp_real(&mut self) {
        let n = self.lp.num_cols();
        let m = self.lp.num_rows();
        self.stored_lower_f = (0..n).map(|c| self.lp.lower_f(c)).collect();
        self.stored_upper_f = (0..n).map(|c| self.lp.upper_f(c)).collect();
        self.stored_obj_f = (0..n).map(|c| self.lp.max_obj_f(c)).collect();
        self.stored_lhs_f = (0..m).map(|r| self.lp.lhs_f(r)).collect();
        self.stored_rhs_f = (0..m).map(|r| self.lp.rhs_f(r)).collect();
    }

    fn restore_lp_real(&mut self) {
        for c in 0..self.stored_lower_f.len().min(self.lp.num_cols()) {
            self.lp.set_lower_f(c, self.stored_lower_f[c]);
            self.lp.set_upper_f(c, self.stored_upper_f[c]);
            self.lp.set_max_obj_f(c, self.stored_obj_f[c]);
        }
        for r in 0..self.stored_lhs_f.len().min(self.lp.num_rows()) {
            self.lp.set_lhs_f(r, self.stored_lhs_f[r]);
            self.lp.set_rhs_f(r, self.stored_rhs_f[r]);
        }
        self.lp.clear_row_objs_f();
    }
}
