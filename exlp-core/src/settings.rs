//! Solver settings and tunable parameters.
//!
//! All tunables live on [`SolverSettings`]; there is no global state. The
//! defaults match the constants the refinement algorithm was designed
//! around; a few knobs honor environment-variable overrides so test runs
//! can be tuned without recompiling.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::rational::Rational;
use crate::util::Verbosity;

/// Basis representation of the simplex engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    /// Column basis (one basis column per row of the constraint matrix).
    #[default]
    Column,
    /// Row-wise pricing view; the basis remains column-defined.
    Row,
}

/// Simplex algorithm variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Entering variant (primal simplex in column representation).
    #[default]
    Primal,
    /// Leaving variant (dual simplex in column representation).
    Dual,
}

/// Ratio tester plug-in selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatioTesterKind {
    /// Plain textbook minimum-ratio rule.
    Textbook,
    /// Harris two-pass test with tolerance relaxation and shifting.
    #[default]
    Fast,
    /// Long-step test flipping boxed nonbasic variables.
    BoundFlipping,
}

/// Pricer plug-in selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricerKind {
    /// Most-violated (Dantzig) rule.
    Dantzig,
    /// Devex reference-framework pricing.
    #[default]
    Devex,
    /// Steepest-edge pricing with incremental norm updates.
    Steep,
}

/// LP simplifier selection. The internal simplifier is an external
/// collaborator; `Internal` is accepted and currently resolves to a no-op
/// pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimplifierKind {
    Off,
    #[default]
    Internal,
}

/// Scaler selection for the floating-point LP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalerKind {
    Off,
    /// Bi-equilibration: one row pass and one column pass of inf-norm
    /// scaling.
    #[default]
    BiEqui,
}

/// Objective sense of the loaded problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjSense {
    Maximize,
    #[default]
    Minimize,
}

/// Synchronization mode of the rational/floating LP pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// The floating LP is re-derived from the rational LP at solve entry.
    #[default]
    Auto,
    /// The caller keeps the pair in sync; only dimensions are verified.
    Manual,
}

/// Floating-point infinity sentinel used in the floating LP.
pub const DEFAULT_INFINITY: f64 = 1e100;

/// All solver tunables, owned per instance.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub representation: Representation,
    pub algorithm: Algorithm,
    pub ratio_tester: RatioTesterKind,
    pub pricer: PricerKind,
    pub simplifier: SimplifierKind,
    pub scaler: ScalerKind,

    /// Transform all inequality rows into equations before refining.
    pub eqtrans: bool,
    /// Reduce the coefficient range by lifting before refining.
    pub lifting: bool,

    /// Attempt exact rational basis factorization during refinement.
    pub ratfac: bool,
    /// After a successful rational factorization that is not yet optimal,
    /// continue from the exact basic solution.
    pub ratfac_jump: bool,
    /// Number of stalled refinements before rational factorization kicks in.
    pub ratfac_min_stalls: u32,

    /// Attempt continued-fraction rational reconstruction.
    pub ratrec: bool,
    /// Reconstruction is rescheduled after `ratrec_freq * refinements`
    /// further refinements.
    pub ratrec_freq: f64,

    /// Round refinement scaling factors down to powers of two.
    pub powerscaling: bool,
    /// Repair the basis to exactly `m` basic entries before rational lifts.
    pub force_basic: bool,
    /// On infeasibility, also run the unbounded auxiliary on the dual to
    /// distinguish infeasible from dual-infeasible.
    pub test_dual_inf: bool,
    /// Return `AbortCycling` instead of perturbing when cycling persists.
    pub accept_cycling: bool,

    /// Floating-point feasibility tolerance for the simplex engine.
    pub fp_feastol: f64,
    /// Floating-point optimality tolerance for the simplex engine.
    pub fp_opttol: f64,
    /// Rational feasibility tolerance of the refinement loop.
    pub feastol: Rational,
    /// Rational optimality tolerance of the refinement loop.
    pub opttol: Rational,

    /// Lower objective limit; crossing it aborts with `AbortValue`.
    pub objlimit_lower: f64,
    /// Upper objective limit.
    pub objlimit_upper: f64,
    /// Infinity sentinel of the floating LP.
    pub infinity: f64,

    /// Coefficients above this absolute value are lifted out.
    pub liftmaxval: f64,
    /// Coefficients below this absolute value are lifted out.
    pub liftminval: f64,

    pub objsense: ObjSense,
    pub syncmode: SyncMode,

    /// Incremental LU update strategy, fixed per factorization.
    pub lu_update: crate::lu::UpdateKind,
    /// Maximum LU updates before a refactorization is forced.
    pub max_updates: u32,
    /// Refactorize when the LU stability metric drops below this value.
    pub min_stability: f64,
    /// Initial Markowitz pivot threshold.
    pub min_markowitz: f64,
    /// Zero threshold during LU factorization.
    pub epsilon_factor: f64,
    /// Solution zero threshold (semi-sparse vectors, pivot steps).
    pub epsilon_zero: f64,
    /// Consecutive degenerate pivots tolerated before perturbing.
    pub max_cycle: u32,

    /// Wall-clock limit for the whole solve.
    pub time_limit: Option<Duration>,
    /// Simplex iteration limit across all refinements.
    pub iter_limit: Option<u64>,
    /// Time budget for a single rational factorization; exceeding it is a
    /// soft failure.
    pub ratfac_time_limit: Option<Duration>,
    /// Caller-set cancellation flag, polled at operation boundaries.
    pub cancel: Option<Arc<AtomicBool>>,

    /// Cap on refinement rounds (safety net, not a tunable of the
    /// algorithm itself).
    pub max_refinements: u32,

    pub verbosity: Verbosity,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let verbosity = match std::env::var("EXLP_VERBOSE").ok().as_deref() {
            Some("2") => Verbosity::Debug,
            Some("1") => Verbosity::Info,
            _ => Verbosity::Quiet,
        };

        let max_refinements = std::env::var("EXLP_REFINE_MAX")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(200);

        Self {
            representation: Representation::default(),
            algorithm: Algorithm::default(),
            ratio_tester: RatioTesterKind::default(),
            pricer: PricerKind::default(),
            simplifier: SimplifierKind::default(),
            scaler: ScalerKind::default(),

            eqtrans: false,
            lifting: false,

            ratfac: true,
            ratfac_jump: false,
            ratfac_min_stalls: 2,

            ratrec: true,
            ratrec_freq: 1.2,

            powerscaling: true,
            force_basic: false,
            test_dual_inf: false,
            accept_cycling: false,

            fp_feastol: 1e-9,
            fp_opttol: 1e-9,
            feastol: Rational::new(1.into(), 1_000_000u32.into()),
            opttol: Rational::new(1.into(), 1_000_000u32.into()),

            objlimit_lower: -DEFAULT_INFINITY,
            objlimit_upper: DEFAULT_INFINITY,
            infinity: DEFAULT_INFINITY,

            liftmaxval: 1024.0,
            liftminval: 1.0 / 1024.0,

            objsense: ObjSense::default(),
            syncmode: SyncMode::default(),

            lu_update: crate::lu::UpdateKind::default(),
            max_updates: 200,
            min_stability: 1e-4,
            min_markowitz: 0.01,
            epsilon_factor: 1e-14,
            epsilon_zero: 1e-16,
            max_cycle: 100,

            time_limit: None,
            iter_limit: None,
            ratfac_time_limit: Some(Duration::from_secs(60)),
            cancel: None,

            max_refinements,

            verbosity,
        }
    }
}

impl SolverSettings {
    /// True if either objective limit is active.
    pub fn has_objlimit(&self) -> bool {
        self.objlimit_lower > -self.infinity || self.objlimit_upper < self.infinity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    #[test]
    fn test_defaults() {
        let s = SolverSettings::default();
        assert_eq!(s.representation, Representation::Column);
        assert_eq!(s.ratio_tester, RatioTesterKind::Fast);
        assert_eq!(s.min_markowitz, 0.01);
        assert_eq!(s.max_cycle, 100);
        assert!(!s.has_objlimit());
        assert!(s.feastol.to_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_objlimit_active() {
        let mut s = SolverSettings::default();
        s.objlimit_upper = 10.0;
        assert!(s.has_objlimit());
    }
}
