//! The revised simplex engine.
//!
//! Variables live in one index space: `0..n` are the structural columns,
//! `n..n+m` are the logical (row) variables. A logical variable holds the
//! negated row activity, so its bounds are `[-rhs, -lhs]` and the
//! constraint system reads `A x + I σ = 0`. With that convention the
//! basis matrix is made of original LP columns and unit vectors exactly,
//! and the right-hand side of every basic solve is the negated activity
//! of the nonbasic variables.

use std::sync::atomic::Ordering;
use std::time::Instant;

use super::pricer::Pricer;
use super::ratiotest::{RatioOutcome, RatioTester};
use crate::basis::{BasisDesc, BasisSolver, VarStatus};
use crate::lu::LuError;
use crate::problem::LpPair;
use crate::scaling::ScaleFactors;
use crate::settings::{Algorithm, Representation, ScalerKind, SolverSettings};
use crate::sparse::{SemiSparseVec, SparseVec};
use crate::status::Status;
use crate::util::logging::{log_debug, Logger};

/// Result of one pivot attempt.
enum StepResult {
    Pivoted { step: f64 },
    NoCandidate,
    Unbounded,
    Infeasible,
    Fatal(Status),
}

/// Revised simplex over the floating LP.
pub struct SimplexEngine {
    // problem data, scaled
    n: usize,
    m: usize,
    cols: Vec<SparseVec<f64>>,
    cost: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    orig_lower: Vec<f64>,
    orig_upper: Vec<f64>,
    scale: ScaleFactors,

    // basis
    basis: Vec<usize>,
    in_basis: Vec<usize>,
    vstat: Vec<VarStatus>,
    bsolver: BasisSolver,

    // iterate state
    xb: Vec<f64>,
    nb_val: Vec<f64>,
    y: Vec<f64>,
    d: Vec<f64>,
    duals_valid: bool,

    pricer: Pricer,
    ratio: RatioTester,

    // shifting and cycling
    the_shift: f64,
    num_cycle: u32,
    perturbed: bool,

    // tolerances and limits
    feastol: f64,
    opttol: f64,
    eps_zero: f64,
    algorithm: Algorithm,
    representation: Representation,
    accept_cycling: bool,
    max_cycle: u32,
    objlimit_upper: f64,
    infinity: f64,
    iter_limit: Option<u64>,
    deadline: Option<Instant>,
    cancel: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,

    // results
    status: Status,
    iterations: u64,
    farkas: Option<Vec<f64>>,
    initialized: bool,
    log: Logger,
    elapsed_ms: u64,
}

impl SimplexEngine {
    pub fn new(settings: &SolverSettings) -> Self {
        Self {
            n: 0,
            m: 0,
            cols: Vec::new(),
            cost: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            orig_lower: Vec::new(),
            orig_upper: Vec::new(),
            scale: ScaleFactors::identity(0, 0),
            basis: Vec::new(),
            in_basis: Vec::new(),
            vstat: Vec::new(),
            bsolver: BasisSolver::new(
                settings.lu_update,
                settings.min_markowitz,
                settings.epsilon_factor,
                settings.epsilon_zero,
                settings.max_updates,
                settings.min_stability,
            ),
            xb: Vec::new(),
            nb_val: Vec::new(),
            y: Vec::new(),
            d: Vec::new(),
            duals_valid: false,
            pricer: Pricer::new(settings.pricer),
            ratio: RatioTester::new(settings.ratio_tester, settings.fp_feastol, 1e-10),
            the_shift: 0.0,
            num_cycle: 0,
            perturbed: false,
            feastol: settings.fp_feastol,
            opttol: settings.fp_opttol,
            eps_zero: settings.epsilon_zero,
            algorithm: settings.algorithm,
            representation: settings.representation,
            accept_cycling: settings.accept_cycling,
            max_cycle: settings.max_cycle,
            objlimit_upper: f64::INFINITY,
            infinity: settings.infinity,
            iter_limit: None,
            deadline: None,
            cancel: settings.cancel.clone(),
            status: Status::NoProblem,
            iterations: 0,
            farkas: None,
            initialized: false,
            log: Logger::new(settings.verbosity),
            elapsed_ms: 0,
        }
    }

    // ---- contract surface ---------------------------------------------

    pub fn set_tolerances(&mut self, feastol: f64, opttol: f64) {
        self.feastol = feastol;
        self.opttol = opttol;
        self.ratio.set_feastol(feastol);
    }

    pub fn set_pricer(&mut self, kind: crate::settings::PricerKind) {
        self.pricer.set_kind(kind);
    }

    pub fn set_ratio_tester(&mut self, kind: crate::settings::RatioTesterKind) {
        self.ratio.set_kind(kind);
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    /// Sets the pricing view. The basis stays column-defined; under the
    /// row representation the logical variables are priced first.
    pub fn set_representation(&mut self, representation: Representation) {
        self.representation = representation;
    }

    pub fn set_markowitz(&mut self, theta: f64) {
        self.bsolver.set_markowitz(theta);
    }

    /// Sets the abort thresholds for the next solve: maximization value
    /// limit, wall-clock deadline, and iteration budget.
    pub fn set_termination(
        &mut self,
        value_limit: f64,
        deadline: Option<Instant>,
        iter_limit: Option<u64>,
    ) {
        self.objlimit_upper = value_limit;
        self.deadline = deadline;
        self.iter_limit = iter_limit;
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn time_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn shift(&self) -> f64 {
        self.the_shift
    }

    pub fn lu_factorizations(&self) -> u64 {
        self.bsolver.factor_count()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Loads (or reloads) the floating LP. Any previous basis statuses
    /// survive if dimensions match; otherwise a slack basis is installed.
    pub fn load(&mut self, lp: &LpPair, scaler: ScalerKind) {
        let n = lp.num_cols();
        let m = lp.num_rows();
        let dims_changed = n != self.n || m != self.m;
        self.n = n;
        self.m = m;

        let raw_cols: Vec<SparseVec<f64>> =
            (0..n).map(|c| lp.col_vector_f(c).clone()).collect();
        self.scale = match scaler {
            ScalerKind::Off => ScaleFactors::identity(m, n),
            ScalerKind::BiEqui => ScaleFactors::biequi(&raw_cols, m),
        };

        // assemble the constraint matrix in CSC form and apply the scaling
        let csc = lp.float_matrix();
        self.cols = (0..n)
            .map(|j| {
                let col = csc.outer_view(j).expect("column view out of range");
                SparseVec::from_pairs(
                    col.iter().map(|(i, &v)| (i, self.scale.entry(i, j, v))),
                )
            })
            .collect();

        let nt = n + m;
        self.cost = Vec::with_capacity(nt);
        self.lower = Vec::with_capacity(nt);
        self.upper = Vec::with_capacity(nt);
        for j in 0..n {
            self.cost.push(lp.max_obj_f(j) * self.scale.col[j]);
            let range = lp.col_range(j);
            self.lower.push(if range.has_lower() {
                lp.lower_f(j) / self.scale.col[j]
            } else {
                f64::NEG_INFINITY
            });
            self.upper.push(if range.has_upper() {
                lp.upper_f(j) / self.scale.col[j]
            } else {
                f64::INFINITY
            });
        }
        for i in 0..m {
            self.cost.push(lp.row_obj_f(i) / self.scale.row[i]);
            let range = lp.row_range(i);
            // logical value is the negated activity: bounds swap roles
            self.lower.push(if range.has_upper() {
                -lp.rhs_f(i) * self.scale.row[i]
            } else {
                f64::NEG_INFINITY
            });
            self.upper.push(if range.has_lower() {
                -lp.lhs_f(i) * self.scale.row[i]
            } else {
                f64::INFINITY
            });
        }
        self.orig_lower = self.lower.clone();
        self.orig_upper = self.upper.clone();

        if dims_changed || self.vstat.len() != nt {
            self.install_slack_basis();
        }
        let nrm_cols = &self.cols;
        self.pricer.load(nt, m, |k| {
            if k < n {
                nrm_cols[k].iter().map(|(_, v)| v * v).sum()
            } else {
                1.0
            }
        });
        self.bsolver.clear();
        self.the_shift = 0.0;
        self.num_cycle = 0;
        self.perturbed = false;
        self.duals_valid = false;
        self.farkas = None;
        self.status = Status::Regular;
        self.initialized = true;
    }

    fn install_slack_basis(&mut self) {
        let nt = self.n + self.m;
        self.vstat = vec![VarStatus::Undefined; nt];
        for j in 0..self.n {
            self.vstat[j] = self.default_nonbasic_status(j);
        }
        self.basis = (0..self.m).map(|i| self.n + i).collect();
        for i in 0..self.m {
            self.vstat[self.n + i] = VarStatus::Basic;
        }
        self.rebuild_in_basis();
        self.bsolver.clear();
        self.duals_valid = false;
    }

    fn default_nonbasic_status(&self, k: usize) -> VarStatus {
        let lo = self.lower[k];
        let up = self.upper[k];
        if lo.is_finite() && up.is_finite() {
            if lo == up {
                VarStatus::Fixed
            } else {
                VarStatus::OnLower
            }
        } else if lo.is_finite() {
            VarStatus::OnLower
        } else if up.is_finite() {
            VarStatus::OnUpper
        } else {
            VarStatus::Zero
        }
    }

    fn rebuild_in_basis(&mut self) {
        self.in_basis = vec![usize::MAX; self.n + self.m];
        for (pos, &v) in self.basis.iter().enumerate() {
            self.in_basis[v] = pos;
        }
    }

    /// Installs a basis descriptor. Returns false (and installs the slack
    /// basis) when the descriptor does not carry exactly `m` basic
    /// entries.
    pub fn set_basis(&mut self, desc: &BasisDesc) -> bool {
        if desc.cols.len() != self.n || desc.rows.len() != self.m {
            self.install_slack_basis();
            return false;
        }
        let nt = self.n + self.m;
        let mut vstat = vec![VarStatus::Undefined; nt];
        let mut basis = Vec::with_capacity(self.m);

        for i in 0..self.m {
            let mapped = match desc.rows[i] {
                VarStatus::Basic => VarStatus::Basic,
                VarStatus::OnLower => VarStatus::OnUpper,
                VarStatus::OnUpper => VarStatus::OnLower,
                other => other,
            };
            vstat[self.n + i] = mapped;
            if mapped == VarStatus::Basic {
                basis.push(self.n + i);
            }
        }
        for j in 0..self.n {
            vstat[j] = desc.cols[j];
            if desc.cols[j] == VarStatus::Basic {
                basis.push(j);
            }
        }

        if basis.len() != self.m {
            self.install_slack_basis();
            return false;
        }

        // repair statuses that disagree with bound finiteness
        for k in 0..nt {
            vstat[k] = match vstat[k] {
                VarStatus::Basic => VarStatus::Basic,
                VarStatus::OnLower if !self.lower[k].is_finite() => {
                    self.default_nonbasic_status(k)
                }
                VarStatus::OnUpper if !self.upper[k].is_finite() => {
                    self.default_nonbasic_status(k)
                }
                VarStatus::Fixed if self.lower[k] != self.upper[k] => VarStatus::OnLower,
                VarStatus::Undefined => self.default_nonbasic_status(k),
                s => s,
            };
        }

        self.vstat = vstat;
        self.basis = basis;
        self.rebuild_in_basis();
        self.bsolver.clear();
        self.duals_valid = false;
        true
    }

    /// Discards any installed basis; the next solve starts from the
    /// slack basis.
    pub fn reset_basis(&mut self) {
        self.install_slack_basis();
    }

    /// Exports the basis in LP row/column terms.
    pub fn get_basis(&self) -> BasisDesc {
        let mut desc = BasisDesc {
            rows: Vec::with_capacity(self.m),
            cols: Vec::with_capacity(self.n),
        };
        for i in 0..self.m {
            let s = match self.vstat[self.n + i] {
                VarStatus::Basic => VarStatus::Basic,
                VarStatus::OnLower => VarStatus::OnUpper,
                VarStatus::OnUpper => VarStatus::OnLower,
                other => other,
            };
            desc.rows.push(s);
        }
        for j in 0..self.n {
            desc.cols.push(self.vstat[j]);
        }
        desc
    }

    // ---- linear algebra helpers ---------------------------------------

    fn column(&self, k: usize) -> SparseVec<f64> {
        if k < self.n {
            self.cols[k].clone()
        } else {
            SparseVec::from_pairs([(k - self.n, 1.0)])
        }
    }

    fn column_dot(&self, k: usize, dense: &[f64]) -> f64 {
        if k < self.n {
            self.cols[k].dot_dense(dense)
        } else {
            dense[k - self.n]
        }
    }

    fn nonbasic_value(&self, k: usize) -> f64 {
        match self.vstat[k] {
            VarStatus::OnLower | VarStatus::Fixed => self.lower[k],
            VarStatus::OnUpper => self.upper[k],
            _ => 0.0,
        }
    }

    fn factorize(&mut self) -> Result<(), Status> {
        // cancellation and limits are polled at every factorization entry
        if let Some(abort) = self.poll_limits() {
            return Err(abort);
        }
        let columns: Vec<SparseVec<f64>> =
            self.basis.iter().map(|&v| self.column(v)).collect();
        match self.bsolver.load(&columns) {
            Ok(()) => Ok(()),
            Err(LuError::Singular) => {
                // fall back to the slack basis, which always factors
                let was_slack = self.basis.iter().all(|&v| v >= self.n);
                if was_slack {
                    return Err(Status::Singular);
                }
                log_debug!(self.log, "singular basis, falling back to slack basis");
                self.install_slack_basis();
                let columns: Vec<SparseVec<f64>> =
                    self.basis.iter().map(|&v| self.column(v)).collect();
                self.bsolver.load(&columns).map_err(|_| Status::Singular)
            }
            Err(_) => Err(Status::Error),
        }
    }

    fn compute_basic_values(&mut self) {
        let mut rhs = vec![0.0; self.m];
        for k in 0..self.n + self.m {
            if self.vstat[k] == VarStatus::Basic {
                continue;
            }
            let val = self.nonbasic_value(k);
            self.nb_val[k] = val;
            if val != 0.0 {
                if k < self.n {
                    self.cols[k].axpy_into(-val, &mut rhs);
                } else {
                    rhs[k - self.n] -= val;
                }
            }
        }
        self.xb = self.bsolver.solve_right_dense(&rhs);
    }

    fn compute_duals(&mut self) {
        let cb: Vec<f64> = self.basis.iter().map(|&v| self.cost[v]).collect();
        self.y = self.bsolver.solve_left_dense(&cb);
        self.d = vec![0.0; self.n + self.m];
        for k in 0..self.n + self.m {
            if self.vstat[k] != VarStatus::Basic {
                self.d[k] = self.cost[k] - self.column_dot(k, &self.y);
            }
        }
        self.duals_valid = true;
    }

    /// Current objective value in the scaled (= unscaled) maximization
    /// sense.
    pub fn value(&self) -> f64 {
        let mut v = 0.0;
        for (pos, &k) in self.basis.iter().enumerate() {
            v += self.cost[k] * self.xb[pos];
        }
        for k in 0..self.n + self.m {
            if self.vstat[k] != VarStatus::Basic {
                v += self.cost[k] * self.nb_val[k];
            }
        }
        v
    }

    fn infeasibility(&self) -> f64 {
        let mut f = 0.0;
        for (pos, &k) in self.basis.iter().enumerate() {
            let x = self.xb[pos];
            if x < self.lower[k] - self.feastol {
                f += self.lower[k] - x;
            } else if x > self.upper[k] + self.feastol {
                f += x - self.upper[k];
            }
        }
        f
    }

    fn poll_limits(&self) -> Option<Status> {
        if let Some(cancel) = &self.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Some(Status::AbortTime);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(Status::AbortTime);
            }
        }
        if let Some(limit) = self.iter_limit {
            if self.iterations >= limit {
                return Some(Status::AbortIter);
            }
        }
        None
    }

    // ---- main loop -----------------------------------------------------

    /// Runs the simplex algorithm on the loaded problem.
    pub fn solve(&mut self) -> Status {
        if !self.initialized {
            return Status::NoProblem;
        }
        let start = Instant::now();
        self.status = Status::Running;
        self.iterations = 0;
        self.farkas = None;
        self.nb_val = vec![0.0; self.n + self.m];

        if let Err(s) = self.factorize() {
            self.status = s;
            self.elapsed_ms = start.elapsed().as_millis() as u64;
            return self.status;
        }
        self.compute_basic_values();
        self.duals_valid = false;

        let result = self.run_loop();
        self.status = result;
        self.elapsed_ms = start.elapsed().as_millis() as u64;
        result
    }

    fn run_loop(&mut self) -> Status {
        loop {
            if let Some(abort) = self.poll_limits() {
                return abort;
            }

            if self.bsolver.needs_refactor() {
                if let Err(s) = self.refactor_and_recompute() {
                    return s;
                }
            }

            let infeas = self.infeasibility();
            let dual_mode = self.algorithm == Algorithm::Dual
                && infeas > self.feastol
                && self.dual_feasible();

            let step = if dual_mode {
                self.dual_step()
            } else if infeas > self.feastol {
                self.primal_step(true)
            } else {
                self.primal_step(false)
            };

            match step {
                StepResult::Pivoted { step } => {
                    self.iterations += 1;
                    if step.abs() <= self.eps_zero {
                        self.num_cycle += 1;
                        if self.num_cycle >= self.max_cycle {
                            if self.accept_cycling {
                                return Status::AbortCycling;
                            }
                            self.perturb();
                        }
                    } else {
                        self.num_cycle = 0;
                    }
                    if self.objlimit_upper < self.infinity && self.value() >= self.objlimit_upper
                    {
                        return Status::AbortValue;
                    }
                }
                StepResult::NoCandidate => {
                    // optimality candidate: remove shifts before claiming
                    if self.the_shift > 0.0 || self.perturbed {
                        self.unshift();
                        if let Err(s) = self.refactor_and_recompute() {
                            return s;
                        }
                        if self.infeasibility() > self.feastol {
                            continue;
                        }
                    }
                    return Status::Optimal;
                }
                StepResult::Unbounded => return Status::Unbounded,
                StepResult::Infeasible => return Status::Infeasible,
                StepResult::Fatal(s) => return s,
            }
        }
    }

    fn refactor_and_recompute(&mut self) -> Result<(), Status> {
        let old_xb = self.xb.clone();
        self.factorize()?;
        self.compute_basic_values();
        if old_xb.len() == self.xb.len() {
            let drift = old_xb
                .iter()
                .zip(self.xb.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f64, f64::max);
            if drift > 1e-6 {
                log_debug!(self.log, "refactorization drift {:.3e}", drift);
            }
        }
        self.duals_valid = false;
        Ok(())
    }

    fn dual_feasible(&mut self) -> bool {
        if !self.duals_valid {
            self.compute_duals();
        }
        for k in 0..self.n + self.m {
            let test = self.enter_test(k, &self.d);
            if test < -self.opttol {
                return false;
            }
        }
        true
    }

    /// Entering test value: negative when the reduced cost violates the
    /// status of a nonbasic variable (maximization sense).
    fn enter_test(&self, k: usize, d: &[f64]) -> f64 {
        match self.vstat[k] {
            VarStatus::OnLower => -d[k],
            VarStatus::OnUpper => d[k],
            VarStatus::Zero => -d[k].abs(),
            _ => 0.0,
        }
    }

    fn primal_step(&mut self, phase1: bool) -> StepResult {
        let d_work: Vec<f64>;
        let d_ref: &[f64] = if phase1 {
            d_work = self.phase1_duals();
            &d_work
        } else {
            if !self.duals_valid {
                self.compute_duals();
            }
            &self.d
        };

        let tol = if phase1 { self.feastol } else { self.opttol };
        let nt = self.n + self.m;
        // the representation decides which side of the index space is
        // priced first (ties in the pricer score keep the earlier one)
        let order: Box<dyn Iterator<Item = usize>> = match self.representation {
            Representation::Column => Box::new(0..nt),
            Representation::Row => Box::new((self.n..nt).chain(0..self.n)),
        };
        let candidates = order.map(|k| (k, self.enter_test(k, d_ref)));
        let entering = match self.pricer.select_enter(candidates, tol) {
            Some(q) => q,
            None => {
                if phase1 {
                    self.farkas = Some(self.phase1_farkas());
                    return StepResult::Infeasible;
                }
                return StepResult::NoCandidate;
            }
        };

        let sigma = match self.vstat[entering] {
            VarStatus::OnLower => 1.0,
            VarStatus::OnUpper => -1.0,
            VarStatus::Zero => {
                if d_ref[entering] > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            _ => return StepResult::Fatal(Status::Error),
        };

        let enter_col = self.column(entering);
        let alpha = self.bsolver.solve_right_for_update(&enter_col);

        let entering_gap = if sigma > 0.0 {
            self.upper[entering] - self.nonbasic_value(entering)
        } else {
            self.nonbasic_value(entering) - self.lower[entering]
        };

        let outcome = {
            let basis = &self.basis;
            let lower = &self.lower;
            let upper = &self.upper;
            let feastol = self.feastol;
            let xb = &self.xb;
            let phase1_lower = move |j: usize| {
                let k = basis[j];
                if phase1 && xb[j] > upper[k] + feastol {
                    upper[k]
                } else {
                    lower[k]
                }
            };
            let phase1_upper = move |j: usize| {
                let k = basis[j];
                if phase1 && xb[j] < lower[k] - feastol {
                    lower[k]
                } else {
                    upper[k]
                }
            };
            self.ratio
                .select_leaving(&alpha, sigma, xb, phase1_lower, phase1_upper, entering_gap)
        };

        match outcome {
            RatioOutcome::Unbounded => {
                self.bsolver.clear_pending();
                if phase1 {
                    // the phase-1 objective is bounded by construction
                    StepResult::Fatal(Status::Error)
                } else {
                    StepResult::Unbounded
                }
            }
            RatioOutcome::BoundFlip { step } => {
                self.bsolver.clear_pending();
                self.apply_step(&alpha, sigma, step);
                self.vstat[entering] = if sigma > 0.0 {
                    VarStatus::OnUpper
                } else {
                    VarStatus::OnLower
                };
                self.nb_val[entering] = self.nonbasic_value(entering);
                StepResult::Pivoted { step }
            }
            RatioOutcome::Step {
                leaving_pos,
                step,
                leaving_to_upper,
                shift,
            } => {
                let leaving = self.basis[leaving_pos];
                if shift > 0.0 {
                    // enlarge the blocking bound onto the current value
                    if leaving_to_upper {
                        self.upper[leaving] += shift;
                    } else {
                        self.lower[leaving] -= shift;
                    }
                    self.the_shift += shift;
                }
                self.pivot(entering, leaving_pos, sigma, step, &alpha)
            }
        }
    }

    /// Moves the iterate along the entering direction without a basis
    /// change.
    fn apply_step(&mut self, alpha: &SemiSparseVec, sigma: f64, step: f64) {
        if step == 0.0 {
            return;
        }
        for (j, a) in alpha.iter_nonzeros() {
            self.xb[j] += -sigma * a * step;
        }
    }

    fn pivot(
        &mut self,
        entering: usize,
        leaving_pos: usize,
        sigma: f64,
        step: f64,
        alpha: &SemiSparseVec,
    ) -> StepResult {
        let leaving = self.basis[leaving_pos];
        let pivot_elem = alpha.value(leaving_pos);
        if pivot_elem.abs() <= 1e-12 {
            // pivot too small to trust; force a refactorization instead
            self.bsolver.clear_pending();
            return match self.refactor_and_recompute() {
                Ok(()) => StepResult::Pivoted { step: 0.0 },
                Err(s) => StepResult::Fatal(s),
            };
        }

        let entering_val = self.nonbasic_value(entering) + sigma * step;
        self.apply_step(alpha, sigma, step);

        // the blocker lands on whichever of its bounds the step reached
        let leave_val = self.xb[leaving_pos];
        let leave_lo = self.lower[leaving];
        let leave_up = self.upper[leaving];
        let leaving_status = match (leave_lo.is_finite(), leave_up.is_finite()) {
            (true, true) => {
                if leave_lo == leave_up {
                    VarStatus::Fixed
                } else if (leave_val - leave_up).abs() <= (leave_val - leave_lo).abs() {
                    VarStatus::OnUpper
                } else {
                    VarStatus::OnLower
                }
            }
            (true, false) => VarStatus::OnLower,
            (false, true) => VarStatus::OnUpper,
            (false, false) => VarStatus::Zero,
        };

        // dual updates need the pivot row of the outgoing basis
        if self.duals_valid {
            let e_r = SparseVec::from_pairs([(leaving_pos, 1.0)]);
            let rho = self.bsolver.solve_left_sparse(&e_r);
            let tau = self.d[entering] / pivot_elem;

            let mut pivot_row: Vec<(usize, f64)> = Vec::new();
            for k in 0..self.n + self.m {
                if self.vstat[k] == VarStatus::Basic || k == entering {
                    continue;
                }
                let w = if k < self.n {
                    self.cols[k].iter().map(|(i, v)| v * rho.value(i)).sum()
                } else {
                    rho.value(k - self.n)
                };
                if w != 0.0 {
                    pivot_row.push((k, w));
                    self.d[k] -= tau * w;
                }
            }
            if tau != 0.0 {
                for (i, r) in rho.iter_nonzeros() {
                    self.y[i] += tau * r;
                }
            }
            self.d[leaving] = -tau;
            self.d[entering] = 0.0;
            self.pricer
                .entered(entering, leaving, pivot_elem, pivot_row.into_iter());
            self.pricer.left(leaving_pos, entering);
        }

        // statuses and values
        self.vstat[leaving] = leaving_status;
        self.nb_val[leaving] = self.nonbasic_value(leaving);
        self.vstat[entering] = VarStatus::Basic;
        self.basis[leaving_pos] = entering;
        self.in_basis[entering] = leaving_pos;
        self.in_basis[leaving] = usize::MAX;
        self.xb[leaving_pos] = entering_val;

        match self.bsolver.update(leaving_pos) {
            Ok(()) => {}
            Err(_) => {
                if let Err(s) = self.refactor_and_recompute() {
                    return StepResult::Fatal(s);
                }
            }
        }
        StepResult::Pivoted { step }
    }

    fn phase1_duals(&mut self) -> Vec<f64> {
        let mut g = vec![0.0; self.m];
        for (pos, &k) in self.basis.iter().enumerate() {
            let x = self.xb[pos];
            if x < self.lower[k] - self.feastol {
                g[pos] = -1.0;
            } else if x > self.upper[k] + self.feastol {
                g[pos] = 1.0;
            }
        }
        let y1 = self.bsolver.solve_left_dense(&g);
        let nt = self.n + self.m;
        let mut d1 = vec![0.0; nt];
        for k in 0..nt {
            if self.vstat[k] != VarStatus::Basic {
                d1[k] = self.column_dot(k, &y1);
            }
        }
        self.y = y1;
        self.duals_valid = false;
        d1
    }

    /// Farkas certificate from the phase-1 duals, unscaled to LP space.
    ///
    /// Sign convention: positive multipliers act on right-hand sides,
    /// negative ones on left-hand sides; the phase-1 gradient solve has
    /// the opposite orientation, so the certificate is its negation.
    fn phase1_farkas(&self) -> Vec<f64> {
        (0..self.m)
            .map(|i| -self.y[i] * self.scale.row[i])
            .collect()
    }

    fn dual_step(&mut self) -> StepResult {
        if !self.duals_valid {
            self.compute_duals();
        }

        // leaving selection over feasibility violations
        let tests: Vec<f64> = self
            .basis
            .iter()
            .enumerate()
            .map(|(pos, &k)| {
                let x = self.xb[pos];
                let viol = (self.lower[k] - x).max(x - self.upper[k]).max(0.0);
                -viol
            })
            .collect();
        let leaving_pos = match self.pricer.select_leave(&tests, self.feastol) {
            Some(j) => j,
            None => return StepResult::NoCandidate,
        };
        let leaving = self.basis[leaving_pos];
        let below = self.xb[leaving_pos] < self.lower[leaving];

        let e_r = SparseVec::from_pairs([(leaving_pos, 1.0)]);
        let rho = self.bsolver.solve_left_sparse(&e_r);

        let nt = self.n + self.m;
        let mut row: Vec<(usize, f64)> = Vec::new();
        for k in 0..nt {
            if self.vstat[k] == VarStatus::Basic || self.vstat[k] == VarStatus::Fixed {
                continue;
            }
            let w = if k < self.n {
                self.cols[k].iter().map(|(i, v)| v * rho.value(i)).sum()
            } else {
                rho.value(k - self.n)
            };
            if w.abs() > self.eps_zero {
                row.push((k, w));
            }
        }

        let vstat = &self.vstat;
        let admissible = |k: usize, w: f64| -> bool {
            match vstat[k] {
                VarStatus::OnLower => {
                    if below {
                        w < 0.0
                    } else {
                        w > 0.0
                    }
                }
                VarStatus::OnUpper => {
                    if below {
                        w > 0.0
                    } else {
                        w < 0.0
                    }
                }
                VarStatus::Zero => true,
                _ => false,
            }
        };
        let lower = &self.lower;
        let upper = &self.upper;
        let boxed_gap = |k: usize| -> Option<f64> {
            if lower[k].is_finite() && upper[k].is_finite() && lower[k] < upper[k] {
                Some(upper[k] - lower[k])
            } else {
                None
            }
        };
        let infeas = -tests[leaving_pos];

        let mut flips = Vec::new();
        let entering = match self.ratio.select_entering_dual(
            &row,
            &self.d,
            admissible,
            boxed_gap,
            infeas,
            &mut flips,
        ) {
            Some(q) => q,
            None => {
                // dual unbounded: the row multipliers certify primal
                // infeasibility
                let dir = if below { 1.0 } else { -1.0 };
                self.farkas = Some(
                    (0..self.m)
                        .map(|i| dir * rho.value(i) * self.scale.row[i])
                        .collect(),
                );
                return StepResult::Infeasible;
            }
        };

        // apply bound flips of passed-over boxed nonbasics
        if !flips.is_empty() {
            let mut flip_rhs = vec![0.0; self.m];
            for &k in &flips {
                let (delta, new_stat) = match self.vstat[k] {
                    VarStatus::OnLower => (self.upper[k] - self.lower[k], VarStatus::OnUpper),
                    VarStatus::OnUpper => (self.lower[k] - self.upper[k], VarStatus::OnLower),
                    _ => continue,
                };
                self.vstat[k] = new_stat;
                self.nb_val[k] = self.nonbasic_value(k);
                if k < self.n {
                    self.cols[k].axpy_into(-delta, &mut flip_rhs);
                } else {
                    flip_rhs[k - self.n] -= delta;
                }
            }
            let dxb = self.bsolver.solve_right_dense(&flip_rhs);
            for j in 0..self.m {
                self.xb[j] += dxb[j];
            }
        }

        let w_q = row
            .iter()
            .find(|&&(k, _)| k == entering)
            .map(|&(_, w)| w)
            .unwrap_or(0.0);
        if w_q.abs() <= self.eps_zero {
            return StepResult::Fatal(Status::Error);
        }

        let target = if below {
            self.lower[leaving]
        } else {
            self.upper[leaving]
        };
        let t = (self.xb[leaving_pos] - target) / w_q;

        let enter_col = self.column(entering);
        let alpha = self.bsolver.solve_right_for_update(&enter_col);

        // primal update: x_q moves by t, basics by -alpha t
        for (j, a) in alpha.iter_nonzeros() {
            self.xb[j] -= a * t;
        }
        let entering_val = self.nonbasic_value(entering) + t;

        // dual update
        let tau = self.d[entering] / w_q;
        for &(k, w) in &row {
            if k != entering {
                self.d[k] -= tau * w;
            }
        }
        if tau != 0.0 {
            for (i, r) in rho.iter_nonzeros() {
                self.y[i] += tau * r;
            }
        }
        self.d[leaving] = -tau;
        self.d[entering] = 0.0;
        self.pricer.left(leaving_pos, entering);

        self.vstat[leaving] = if self.lower[leaving] == self.upper[leaving] {
            VarStatus::Fixed
        } else if below {
            VarStatus::OnLower
        } else {
            VarStatus::OnUpper
        };
        self.nb_val[leaving] = self.nonbasic_value(leaving);
        self.vstat[entering] = VarStatus::Basic;
        self.basis[leaving_pos] = entering;
        self.in_basis[entering] = leaving_pos;
        self.in_basis[leaving] = usize::MAX;
        self.xb[leaving_pos] = entering_val;

        match self.bsolver.update(leaving_pos) {
            Ok(()) => {}
            Err(_) => {
                if let Err(s) = self.refactor_and_recompute() {
                    return StepResult::Fatal(s);
                }
            }
        }
        StepResult::Pivoted { step: t.abs() }
    }

    // ---- shifting, perturbation ---------------------------------------

    fn unshift(&mut self) {
        self.lower.clone_from(&self.orig_lower);
        self.upper.clone_from(&self.orig_upper);
        for k in 0..self.n + self.m {
            if self.vstat[k] != VarStatus::Basic {
                if self.vstat[k] == VarStatus::Fixed && self.lower[k] != self.upper[k] {
                    self.vstat[k] = VarStatus::OnLower;
                }
                self.nb_val[k] = self.nonbasic_value(k);
            }
        }
        self.the_shift = 0.0;
        self.perturbed = false;
        self.duals_valid = false;
    }

    /// Deterministic bound perturbation to break cycling.
    fn perturb(&mut self) {
        let base = self.feastol * 0.125;
        for k in 0..self.n + self.m {
            let xi = base * (1.0 + (k % 13) as f64 / 13.0);
            match self.vstat[k] {
                VarStatus::OnLower if self.lower[k].is_finite() => {
                    self.lower[k] -= xi;
                    self.the_shift += xi;
                }
                VarStatus::OnUpper if self.upper[k].is_finite() => {
                    self.upper[k] += xi;
                    self.the_shift += xi;
                }
                _ => {}
            }
        }
        self.perturbed = true;
        self.num_cycle = 0;
        log_debug!(self.log, "perturbed bounds to break cycling");
    }

    // ---- solution readback --------------------------------------------

    /// Structural primal values, unscaled.
    pub fn get_primal(&self) -> Vec<f64> {
        let mut x = vec![0.0; self.n];
        for j in 0..self.n {
            let v = if self.vstat[j] == VarStatus::Basic {
                self.xb[self.in_basis[j]]
            } else {
                self.nb_val[j]
            };
            x[j] = v * self.scale.col[j];
        }
        x
    }

    /// Row activities, unscaled.
    pub fn get_slacks(&self) -> Vec<f64> {
        let mut s = vec![0.0; self.m];
        for i in 0..self.m {
            let k = self.n + i;
            let sigma = if self.vstat[k] == VarStatus::Basic {
                self.xb[self.in_basis[k]]
            } else {
                self.nb_val[k]
            };
            s[i] = -sigma / self.scale.row[i];
        }
        s
    }

    /// Row duals, unscaled.
    pub fn get_dual(&self) -> Vec<f64> {
        (0..self.m)
            .map(|i| self.y.get(i).copied().unwrap_or(0.0) * self.scale.row[i])
            .collect()
    }

    /// Reduced costs of the structural columns, unscaled.
    pub fn get_redcost(&self) -> Vec<f64> {
        (0..self.n)
            .map(|j| {
                if self.vstat[j] == VarStatus::Basic {
                    0.0
                } else {
                    self.d.get(j).copied().unwrap_or(0.0) / self.scale.col[j]
                }
            })
            .collect()
    }

    /// Farkas multipliers from an infeasible solve, if available.
    pub fn get_farkas(&self) -> Option<&[f64]> {
        self.farkas.as_deref()
    }

    /// Makes sure the dual vectors are populated (used before readback).
    pub fn ensure_duals(&mut self) {
        if !self.duals_valid && self.bsolver.is_loaded() {
            self.compute_duals();
        }
    }
}
