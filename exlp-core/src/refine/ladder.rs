//! Stable floating-point solve with a recovery ladder.
//!
//! On a failed floating solve the driver walks a fixed sequence of
//! setting changes, restarting once from scratch along the way: scaler
//! off, raised Markowitz threshold, forced refactorization, scaler and
//! simplifier switches, relaxed then tightened tolerances, ratio-tester
//! and pricer switches. All settings are restored afterwards.

use super::driver::RefinementDriver;
use crate::settings::{PricerKind, RatioTesterKind, ScalerKind, SimplifierKind};
use crate::status::Status;
use crate::util::logging::log_info;

/// One rung of the recovery ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rung {
    Initial,
    NoScaling,
    RaiseMarkowitz,
    ForceRefactor,
    SwitchScaler,
    SwitchSimplifier,
    RelaxTolerances,
    TightenTolerances,
    SwitchRatioTester,
    SwitchPricer,
    RestartFromScratch,
}

const LADDER: [Rung; 11] = [
    Rung::Initial,
    Rung::NoScaling,
    Rung::RaiseMarkowitz,
    Rung::ForceRefactor,
    Rung::SwitchScaler,
    Rung::SwitchSimplifier,
    Rung::RelaxTolerances,
    Rung::TightenTolerances,
    Rung::SwitchRatioTester,
    Rung::SwitchPricer,
    Rung::RestartFromScratch,
];

impl RefinementDriver<'_> {
    /// Solves the floating LP, walking the recovery ladder on failure.
    /// Returns the final status together with the floating primal and
    /// dual vectors (the dual carries the Farkas multipliers on an
    /// infeasible result).
    pub(super) fn solve_real_stable(
        &mut self,
        accept_unbounded: bool,
        accept_infeasible: bool,
        _refined: bool,
    ) -> (Status, Vec<f64>, Vec<f64>) {
        let saved_scaler = self.settings.scaler;
        let saved_simplifier = self.settings.simplifier;
        let saved_feastol = self.settings.fp_feastol;
        let saved_opttol = self.settings.fp_opttol;
        let saved_ratio = self.settings.ratio_tester;
        let saved_pricer = self.settings.pricer;
        let saved_markowitz = self.settings.min_markowitz;

        let mut result = Status::Unknown;

        for &rung in LADDER.iter() {
            match rung {
                Rung::Initial => {}
                Rung::NoScaling => {
                    log_info!(self.log, "Numerical troubles.  Turning off scaling.");
                    self.settings.scaler = ScalerKind::Off;
                    self.settings.simplifier = SimplifierKind::Off;
                }
                Rung::RaiseMarkowitz => {
                    log_info!(self.log, "Raising Markowitz threshold.");
                    self.engine.set_markowitz(0.9);
                }
                Rung::ForceRefactor => {
                    // reloading the engine refactors from scratch with
                    // the current basis
                }
                Rung::SwitchScaler => {
                    self.settings.scaler = match saved_scaler {
                        ScalerKind::Off => ScalerKind::BiEqui,
                        ScalerKind::BiEqui => ScalerKind::Off,
                    };
                }
                Rung::SwitchSimplifier => {
                    self.settings.simplifier = match saved_simplifier {
                        SimplifierKind::Off => SimplifierKind::Internal,
                        SimplifierKind::Internal => SimplifierKind::Off,
                    };
                }
                Rung::RelaxTolerances => {
                    self.engine.set_tolerances(1e-3, 1e-3);
                }
                Rung::TightenTolerances => {
                    self.engine.set_tolerances(1e-9, 1e-9);
                }
                Rung::SwitchRatioTester => {
                    let next = match self.settings.ratio_tester {
                        RatioTesterKind::Textbook => RatioTesterKind::Fast,
                        _ => RatioTesterKind::Textbook,
                    };
                    self.settings.ratio_tester = next;
                    self.engine.set_ratio_tester(next);
                }
                Rung::SwitchPricer => {
                    let next = match self.settings.pricer {
                        PricerKind::Devex => PricerKind::Steep,
                        _ => PricerKind::Devex,
                    };
                    self.settings.pricer = next;
                    self.engine.set_pricer(next);
                }
                Rung::RestartFromScratch => {
                    log_info!(self.log, "Restarting from scratch.");
                    self.has_basis = false;
                }
            }

            result = self.solve_real_once();

            let acceptable = match result {
                Status::Optimal => true,
                Status::Infeasible => accept_infeasible,
                Status::Unbounded => accept_unbounded,
                Status::AbortTime | Status::AbortIter | Status::AbortValue => true,
                _ => false,
            };
            if acceptable {
                break;
            }
            if self.time_up() {
                result = Status::AbortTime;
                break;
            }
        }

        // restore the settings touched by the ladder
        self.settings.scaler = saved_scaler;
        self.settings.simplifier = saved_simplifier;
        self.settings.fp_feastol = saved_feastol;
        self.settings.fp_opttol = saved_opttol;
        self.settings.ratio_tester = saved_ratio;
        self.settings.pricer = saved_pricer;
        self.engine.set_tolerances(saved_feastol, saved_opttol);
        self.engine.set_ratio_tester(saved_ratio);
        self.engine.set_pricer(saved_pricer);
        self.engine.set_markowitz(saved_markowitz);

        // read back the floating solution
        self.engine.ensure_duals();
        let primal = self.engine.get_primal();
        let dual = match result {
            Status::Infeasible => self
                .engine
                .get_farkas()
                .map(|f| f.to_vec())
                .unwrap_or_else(|| self.engine.get_dual()),
            _ => self.engine.get_dual(),
        };

        if matches!(
            result,
            Status::Optimal | Status::Infeasible | Status::Unbounded
        ) {
            self.basis = self.engine.get_basis();
            self.has_basis = true;
        }

        (result, primal, dual)
    }

    /// One engine invocation with the current settings and basis.
    fn solve_real_once(&mut self) -> Status {
        self.engine.load(self.lp, self.settings.scaler);
        if self.has_basis {
            let basis = self.basis.clone();
            self.engine.set_basis(&basis);
        } else {
            self.engine.reset_basis();
        }
        let remaining_iters = self
            .settings
            .iter_limit
            .map(|l| l.saturating_sub(self.stats.iterations));
        self.engine
            .set_termination(f64::INFINITY, self.deadline, remaining_iters);

        let before_factor = self.engine.lu_factorizations();
        let status = self.engine.solve();
        self.stats.iterations += self.engine.iterations();
        self.stats.lu_factorizations += self.engine.lu_factorizations() - before_factor;
        status
    }
}
