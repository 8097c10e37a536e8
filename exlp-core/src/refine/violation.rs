//! Exact violation measures and refinement scaling factors.
//!
//! All computations run in rationals over the current (possibly
//! transformed) LP. The `mod_*` vectors double as the residual problem
//! data: the bound residual `bound - value` computed here is exactly
//! what the scaled floating LP receives as its new bound.

use num_traits::{One, Zero};

use crate::basis::{BasisDesc, VarStatus};
use crate::problem::{LpPair, RangeType};
use crate::rational::{invert, round_down_pow2, Rational};
use crate::solution::RationalSolution;

/// Bounds violation: `max(0, lower - x, x - upper)` over finite bounds.
/// Fills `mod_lower`/`mod_upper` with the bound residuals.
pub(super) fn bounds_violation(
    lp: &LpPair,
    sol: &RationalSolution,
    mod_lower: &mut [Rational],
    mod_upper: &mut [Rational],
) -> Rational {
    let mut violation = Rational::zero();
    for c in 0..lp.num_cols() {
        if lp.col_range(c).has_lower() {
            mod_lower[c] = lp.lower_raw(c) - &sol.primal[c];
            if mod_lower[c] > violation {
                violation = mod_lower[c].clone();
            }
        }
        if lp.col_range(c).has_upper() {
            mod_upper[c] = lp.upper_raw(c) - &sol.primal[c];
            if -&mod_upper[c] > violation {
                violation = -&mod_upper[c];
            }
        }
    }
    violation
}

/// Sides violation over finite sides, extended by a complementary
/// slackness term for rows resting at the wrong side.
pub(super) fn sides_violation(
    lp: &LpPair,
    sol: &RationalSolution,
    basis: &BasisDesc,
    mod_lhs: &mut [Rational],
    mod_rhs: &mut [Rational],
) -> Rational {
    let mut violation = Rational::zero();
    for r in 0..lp.num_rows() {
        let status = basis.rows[r];
        if lp.row_range(r).has_lower() {
            mod_lhs[r] = lp.lhs_raw(r) - &sol.slacks[r];
            if mod_lhs[r] > violation {
                violation = mod_lhs[r].clone();
            } else if status == VarStatus::OnLower && -&mod_lhs[r] > violation {
                // activity is feasible but strays from the active side:
                // counts as a side violation via complementary slackness
                violation = -&mod_lhs[r];
            }
        }
        if lp.row_range(r).has_upper() {
            mod_rhs[r] = lp.rhs_raw(r) - &sol.slacks[r];
            if -&mod_rhs[r] > violation {
                violation = -&mod_rhs[r];
            } else if status == VarStatus::OnUpper && mod_rhs[r] > violation {
                violation = mod_rhs[r].clone();
            }
        }
    }
    violation
}

/// Reduced-cost violation in the internal maximization sense.
pub(super) fn red_cost_violation(
    lp: &LpPair,
    sol: &RationalSolution,
    basis: &BasisDesc,
) -> Rational {
    let mut violation = Rational::zero();
    for c in 0..lp.num_cols() {
        if lp.col_range(c) == RangeType::Fixed {
            continue;
        }
        let status = basis.cols[c];
        // maximizing: positive reduced cost is allowed only at the upper
        // bound, negative only at the lower bound
        if status != VarStatus::OnLower && -&sol.red_cost[c] > violation {
            violation = -&sol.red_cost[c];
        }
        if status != VarStatus::OnUpper && sol.red_cost[c] > violation {
            violation = sol.red_cost[c].clone();
        }
    }
    violation
}

/// Dual violation in the internal maximization sense.
pub(super) fn dual_violation(
    lp: &LpPair,
    sol: &RationalSolution,
    basis: &BasisDesc,
) -> Rational {
    let mut violation = Rational::zero();
    for r in 0..lp.num_rows() {
        if lp.row_range(r) == RangeType::Fixed {
            continue;
        }
        let status = basis.rows[r];
        if status != VarStatus::OnLower && -&sol.dual[r] > violation {
            violation = -&sol.dual[r];
        }
        if status != VarStatus::OnUpper && sol.dual[r] > violation {
            violation = sol.dual[r].clone();
        }
    }
    violation
}

/// Computes the next primal scaling factor, limited to grow by at most
/// `maxscaleincr` per refinement.
pub(super) fn primal_scaling_factor(
    primal_scale: &mut Rational,
    bounds_viol: &Rational,
    sides_viol: &Rational,
    red_cost_viol: &Rational,
    maxscaleincr: &Rational,
    powerscaling: bool,
) {
    let max_scale = &*primal_scale * maxscaleincr;

    let mut scale = if bounds_viol > sides_viol {
        bounds_viol.clone()
    } else {
        sides_viol.clone()
    };
    if &scale < red_cost_viol {
        scale = red_cost_viol.clone();
    }

    if scale.is_zero() {
        scale = max_scale;
    } else {
        invert(&mut scale);
        if scale > max_scale {
            scale = max_scale;
        }
    }

    if powerscaling {
        round_down_pow2(&mut scale);
    }
    *primal_scale = scale;
}

/// Computes the next dual scaling factor; capped by the primal scale and
/// floored at one. Scales `mod_obj` in place when it exceeds one.
#[allow(clippy::too_many_arguments)]
pub(super) fn dual_scaling_factor(
    dual_scale: &mut Rational,
    primal_scale: &Rational,
    red_cost_viol: &Rational,
    dual_viol: &Rational,
    maxscaleincr: &Rational,
    powerscaling: bool,
    mod_obj: &mut [Rational],
) {
    let max_scale = &*dual_scale * maxscaleincr;

    let mut scale = if red_cost_viol > dual_viol {
        red_cost_viol.clone()
    } else {
        dual_viol.clone()
    };

    if scale.is_zero() {
        scale = max_scale;
    } else {
        invert(&mut scale);
        if scale > max_scale {
            scale = max_scale;
        }
    }

    if powerscaling {
        round_down_pow2(&mut scale);
    }

    if &scale > primal_scale {
        scale = primal_scale.clone();
    }
    let one = Rational::one();
    if scale < one {
        scale = one;
    } else if scale != one {
        for v in mod_obj.iter_mut() {
            *v *= &scale;
        }
    }
    *dual_scale = scale;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ObjSense;

    fn rat(n: i64, d: i64) -> Rational {
        Rational::new(n.into(), d.into())
    }

    fn lp_one_col() -> LpPair {
        let mut lp = LpPair::new(ObjSense::Maximize);
        let c = lp.add_col(rat(1, 1), Some(rat(0, 1)), Some(rat(2, 1)));
        lp.add_row(Some(rat(1, 1)), &[(c, rat(1, 1))], Some(rat(3, 1)));
        lp
    }

    #[test]
    fn test_bounds_violation() {
        let lp = lp_one_col();
        let mut sol = RationalSolution::new(1, 1);
        sol.primal[0] = rat(-1, 2);
        let mut ml = vec![Rational::zero(); 1];
        let mut mu = vec![Rational::zero(); 1];
        let v = bounds_violation(&lp, &sol, &mut ml, &mut mu);
        assert_eq!(v, rat(1, 2));
        // residual of the lower bound is exactly the violation
        assert_eq!(ml[0], rat(1, 2));

        sol.primal[0] = rat(5, 2);
        let v = bounds_violation(&lp, &sol, &mut ml, &mut mu);
        assert_eq!(v, rat(1, 2));
    }

    #[test]
    fn test_sides_violation_with_complementarity() {
        let lp = lp_one_col();
        let mut basis = BasisDesc::slack_basis(1, 1);
        let mut sol = RationalSolution::new(1, 1);

        // activity below lhs
        sol.slacks[0] = rat(1, 2);
        let mut ml = vec![Rational::zero(); 1];
        let mut mr = vec![Rational::zero(); 1];
        let v = sides_violation(&lp, &sol, &basis, &mut ml, &mut mr);
        assert_eq!(v, rat(1, 2));

        // activity feasible but away from the claimed active side
        basis.rows[0] = VarStatus::OnLower;
        sol.slacks[0] = rat(2, 1);
        let v = sides_violation(&lp, &sol, &basis, &mut ml, &mut mr);
        assert_eq!(v, rat(1, 1));
    }

    #[test]
    fn test_red_cost_violation_signs() {
        let lp = lp_one_col();
        let mut basis = BasisDesc::slack_basis(1, 1);
        let mut sol = RationalSolution::new(1, 1);

        basis.cols[0] = VarStatus::OnLower;
        sol.red_cost[0] = rat(1, 1);
        // positive reduced cost at lower bound violates (maximization)
        let v = red_cost_violation(&lp, &sol, &basis);
        assert_eq!(v, rat(1, 1));

        basis.cols[0] = VarStatus::OnUpper;
        let v = red_cost_violation(&lp, &sol, &basis);
        assert_eq!(v, Rational::zero());
    }

    #[test]
    fn test_primal_scale_inverts_violation() {
        let mut scale = Rational::from_integer(1.into());
        let incr = Rational::from_integer(1_000_000.into());
        primal_scaling_factor(
            &mut scale,
            &rat(1, 64),
            &rat(1, 128),
            &Rational::zero(),
            &incr,
            true,
        );
        assert_eq!(scale, rat(64, 1));
    }

    #[test]
    fn test_dual_scale_capped_by_primal() {
        let mut dual = Rational::from_integer(1.into());
        let incr = Rational::from_integer(1_000_000.into());
        let mut mod_obj = vec![rat(1, 2)];
        dual_scaling_factor(
            &mut dual,
            &rat(16, 1),
            &rat(1, 1024),
            &Rational::zero(),
            &incr,
            true,
            &mut mod_obj,
        );
        assert_eq!(dual, rat(16, 1));
        assert_eq!(mod_obj[0], rat(8, 1));
    }
}
