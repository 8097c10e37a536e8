//! End-to-end tests for the exact rational solve pipeline.
//!
//! These tests validate the full refinement loop on the public API:
//! exact optima, certificates of unboundedness and infeasibility, the
//! lifting transform, and exactness under zero rational tolerances.

use exlp_core::rational::Rational;
use exlp_core::{solve, LpPair, ObjSense, SolverSettings, Status};
use num_traits::{Signed, Zero};

fn rat(n: i64, d: i64) -> Rational {
    Rational::new(n.into(), d.into())
}

fn int(n: i64) -> Rational {
    Rational::from_integer(n.into())
}

/// Settings demanding exact rational answers.
fn exact_settings() -> SolverSettings {
    SolverSettings {
        feastol: Rational::zero(),
        opttol: Rational::zero(),
        ..SolverSettings::default()
    }
}

#[test]
fn test_optimal_exact() {
    // min x1 + x2
    // s.t. x1 + 2 x2 >= 3
    //      2 x1 + x2 >= 3
    //      x1, x2 >= 0
    //
    // Optimal: x = (1, 1), obj = 2, duals (1/3, 1/3)
    let mut lp = LpPair::new(ObjSense::Minimize);
    let x1 = lp.add_col(int(1), Some(int(0)), None);
    let x2 = lp.add_col(int(1), Some(int(0)), None);
    lp.add_row(Some(int(3)), &[(x1, int(1)), (x2, int(2))], None);
    lp.add_row(Some(int(3)), &[(x1, int(2)), (x2, int(1))], None);

    let result = solve(&mut lp, &exact_settings());

    println!("status = {:?}", result.status);
    assert_eq!(result.status, Status::Optimal);
    assert_eq!(*result.obj_value(), int(2));
    assert_eq!(result.solution.primal, vec![int(1), int(1)]);
    assert_eq!(result.solution.dual, vec![rat(1, 3), rat(1, 3)]);
    assert_eq!(result.solution.slacks, vec![int(3), int(3)]);
    assert!(result.solution.is_primal_feasible);
    assert!(result.solution.is_dual_feasible);
}

#[test]
fn test_unbounded_with_ray() {
    // max x s.t. x >= 0 (no constraints, no upper bound)
    let mut lp = LpPair::new(ObjSense::Maximize);
    lp.add_col(int(1), Some(int(0)), None);

    let result = solve(&mut lp, &exact_settings());

    assert_eq!(result.status, Status::Unbounded);
    assert!(result.solution.has_primal_ray);
    let ray = &result.solution.primal_ray;
    assert_eq!(ray.len(), 1);
    // any positive multiple of (1) certifies; normalize and compare
    assert!(ray[0].is_positive());
}

#[test]
fn test_infeasible_with_farkas() {
    // min 0 s.t. x <= -1, x >= 0 (both as rows, x free)
    let mut lp = LpPair::new(ObjSense::Minimize);
    let x = lp.add_col(int(0), None, None);
    lp.add_row(None, &[(x, int(1))], Some(int(-1)));
    lp.add_row(Some(int(0)), &[(x, int(1))], None);

    let result = solve(&mut lp, &exact_settings());

    assert_eq!(result.status, Status::Infeasible);
    assert!(result.solution.has_dual_farkas);
    let y = &result.solution.dual_farkas;
    assert_eq!(y.len(), 2);

    // certificate: y^T A = 0 and y+^T rhs + y-^T lhs < 0
    let yta = &y[0] + &y[1];
    assert!(yta.is_zero(), "y^T A = {:?} should vanish", yta);

    let mut combined = Rational::zero();
    if y[0].is_positive() {
        combined += &y[0] * rat(-1, 1); // rhs of row 0
    } else {
        panic!("expected positive multiplier on the upper-bounded row");
    }
    if y[1].is_negative() {
        combined += &y[1] * int(0); // lhs of row 1
    } else {
        panic!("expected negative multiplier on the lower-bounded row");
    }
    assert!(combined.is_negative(), "certificate value {:?}", combined);
}

#[test]
fn test_klee_minty_cube() {
    // Klee-Minty cube of size 5:
    //   max sum_j 2^(5-j) x_j
    //   s.t. sum_{j<i} 2^(i-j+1) x_j + x_i <= 5^i   (i = 1..5)
    //        x >= 0
    // Optimum 5^5 = 3125 at x = (0, 0, 0, 0, 3125).
    const N: usize = 5;
    let mut lp = LpPair::new(ObjSense::Maximize);
    let cols: Vec<usize> = (1..=N as i64)
        .map(|j| lp.add_col(int(1 << (N as i64 - j)), Some(int(0)), None))
        .collect();
    for i in 1..=N {
        let mut entries = Vec::new();
        for (idx, &c) in cols.iter().enumerate().take(i) {
            let j = idx + 1;
            if j < i {
                entries.push((c, int(1 << (i - j + 1))));
            } else {
                entries.push((c, int(1)));
            }
        }
        lp.add_row(None, &entries, Some(int(5i64.pow(i as u32))));
    }

    let result = solve(&mut lp, &exact_settings());

    assert_eq!(result.status, Status::Optimal);
    assert_eq!(*result.obj_value(), int(3125));
    assert_eq!(result.solution.primal[N - 1], int(3125));
    for j in 0..N - 1 {
        assert_eq!(result.solution.primal[j], int(0));
    }
    // with the shift mechanism enabled the pivot count stays polynomial
    // in practice; allow a generous deterministic bound
    assert!(
        result.info.iterations <= 200,
        "iteration bound exceeded: {}",
        result.info.iterations
    );
}

#[test]
fn test_lifting_matches_unlifted() {
    // one coefficient of magnitude 1e8 in an otherwise well-scaled LP
    fn build() -> LpPair {
        let mut lp = LpPair::new(ObjSense::Minimize);
        let x1 = lp.add_col(int(1), Some(int(0)), None);
        let x2 = lp.add_col(int(1), Some(int(0)), None);
        lp.add_row(
            Some(int(100_000_000)),
            &[(x1, int(100_000_000)), (x2, int(2))],
            None,
        );
        lp.add_row(Some(int(3)), &[(x1, int(2)), (x2, int(1))], None);
        lp
    }

    let mut plain = build();
    let reference = solve(&mut plain, &exact_settings());
    assert_eq!(reference.status, Status::Optimal);

    let mut lifted = build();
    let settings = SolverSettings {
        lifting: true,
        ..exact_settings()
    };
    let result = solve(&mut lifted, &settings);

    assert_eq!(result.status, Status::Optimal);
    assert_eq!(result.obj_value(), reference.obj_value());
    assert_eq!(result.solution.primal, reference.solution.primal);

    // the lifting transform was undone: dimensions are back to normal
    assert_eq!(lifted.num_cols(), 2);
    assert_eq!(lifted.num_rows(), 2);
}

#[test]
fn test_refinement_reaches_exact_rational() {
    // min x s.t. 3x >= 1: the floating optimum 0.333... disagrees with
    // the exact 1/3 beyond the fourth decimal's precision
    let mut lp = LpPair::new(ObjSense::Minimize);
    let x = lp.add_col(int(1), Some(int(0)), None);
    lp.add_row(Some(int(1)), &[(x, int(3))], None);

    let result = solve(&mut lp, &exact_settings());

    assert_eq!(result.status, Status::Optimal);
    assert_eq!(result.solution.primal[0], rat(1, 3));
    assert_eq!(*result.obj_value(), rat(1, 3));
    assert!(
        result.info.refinements <= 3,
        "expected convergence within 3 refinements, took {}",
        result.info.refinements
    );
}

#[test]
fn test_equality_transform_round_trip() {
    // solving with the equality transform restores the original LP
    let mut lp = LpPair::new(ObjSense::Minimize);
    let x1 = lp.add_col(int(1), Some(int(0)), None);
    let x2 = lp.add_col(int(1), Some(int(0)), None);
    lp.add_row(Some(int(3)), &[(x1, int(1)), (x2, int(2))], None);
    lp.add_row(Some(int(3)), &[(x1, int(2)), (x2, int(1))], None);

    let settings = SolverSettings {
        eqtrans: true,
        ..exact_settings()
    };
    let result = solve(&mut lp, &settings);

    assert_eq!(result.status, Status::Optimal);
    assert_eq!(*result.obj_value(), int(2));

    // original shape and data are restored
    assert_eq!(lp.num_cols(), 2);
    assert_eq!(lp.num_rows(), 2);
    assert_eq!(lp.lhs(0), Some(&int(3)));
    assert_eq!(lp.rhs(0), None);
    assert_eq!(lp.lhs_f(0), 3.0);
    // solution is reported in original dimensions
    assert_eq!(result.solution.primal.len(), 2);
    assert_eq!(result.solution.dual.len(), 2);
}

#[test]
fn test_floating_lp_restored_after_solve() {
    let mut lp = LpPair::new(ObjSense::Minimize);
    let x1 = lp.add_col(int(1), Some(int(0)), Some(int(10)));
    lp.add_row(Some(int(2)), &[(x1, int(1))], Some(int(5)));

    let lower_before = lp.lower_f(0);
    let upper_before = lp.upper_f(0);
    let lhs_before = lp.lhs_f(0);
    let rhs_before = lp.rhs_f(0);
    let obj_before = lp.max_obj_f(0);

    let result = solve(&mut lp, &exact_settings());
    assert_eq!(result.status, Status::Optimal);
    assert_eq!(result.solution.primal[0], int(2));

    assert_eq!(lp.lower_f(0), lower_before);
    assert_eq!(lp.upper_f(0), upper_before);
    assert_eq!(lp.lhs_f(0), lhs_before);
    assert_eq!(lp.rhs_f(0), rhs_before);
    assert_eq!(lp.max_obj_f(0), obj_before);
    assert_eq!(lp.row_obj_f(0), 0.0);
}

#[test]
fn test_boxed_and_fixed_variables() {
    // min -x1 - x2 s.t. x1 + x2 <= 3, 0 <= x1 <= 2, x2 = 1
    let mut lp = LpPair::new(ObjSense::Minimize);
    let x1 = lp.add_col(int(-1), Some(int(0)), Some(int(2)));
    let x2 = lp.add_col(int(-1), Some(int(1)), Some(int(1)));
    lp.add_row(None, &[(x1, int(1)), (x2, int(1))], Some(int(3)));

    let result = solve(&mut lp, &exact_settings());

    assert_eq!(result.status, Status::Optimal);
    assert_eq!(result.solution.primal, vec![int(2), int(1)]);
    assert_eq!(*result.obj_value(), int(-3));
}

#[test]
fn test_ranged_row() {
    // max x1 s.t. 1 <= x1 + x2 <= 4, 0 <= x2 <= 1, x1 <= 3
    let mut lp = LpPair::new(ObjSense::Maximize);
    let x1 = lp.add_col(int(1), None, Some(int(3)));
    let x2 = lp.add_col(int(0), Some(int(0)), Some(int(1)));
    lp.add_row(Some(int(1)), &[(x1, int(1)), (x2, int(1))], Some(int(4)));

    let result = solve(&mut lp, &exact_settings());

    assert_eq!(result.status, Status::Optimal);
    assert_eq!(result.solution.primal[0], int(3));
    assert_eq!(*result.obj_value(), int(3));
}

#[test]
fn test_dual_algorithm_agrees() {
    use exlp_core::Algorithm;

    let build = |settings: &SolverSettings| {
        let mut lp = LpPair::new(ObjSense::Minimize);
        let x1 = lp.add_col(int(1), Some(int(0)), None);
        let x2 = lp.add_col(int(1), Some(int(0)), None);
        lp.add_row(Some(int(3)), &[(x1, int(1)), (x2, int(2))], None);
        lp.add_row(Some(int(3)), &[(x1, int(2)), (x2, int(1))], None);
        solve(&mut lp, settings)
    };

    let primal = build(&exact_settings());
    let dual = build(&SolverSettings {
        algorithm: Algorithm::Dual,
        ..exact_settings()
    });

    assert_eq!(primal.status, Status::Optimal);
    assert_eq!(dual.status, Status::Optimal);
    assert_eq!(primal.obj_value(), dual.obj_value());
}

#[test]
fn test_minimize_maximize_symmetry() {
    // max x s.t. x <= 7 equals -(min -x s.t. x <= 7)
    let mut max_lp = LpPair::new(ObjSense::Maximize);
    let x = max_lp.add_col(int(1), Some(int(0)), None);
    max_lp.add_row(None, &[(x, int(1))], Some(int(7)));
    let max_result = solve(&mut max_lp, &exact_settings());

    let mut min_lp = LpPair::new(ObjSense::Minimize);
    let x = min_lp.add_col(int(-1), Some(int(0)), None);
    min_lp.add_row(None, &[(x, int(1))], Some(int(7)));
    let min_result = solve(&mut min_lp, &exact_settings());

    assert_eq!(max_result.status, Status::Optimal);
    assert_eq!(min_result.status, Status::Optimal);
    assert_eq!(*max_result.obj_value(), int(7));
    assert_eq!(*min_result.obj_value(), int(-7));
}

#[test]
fn test_iteration_limit_aborts() {
    let mut lp = LpPair::new(ObjSense::Minimize);
    let x1 = lp.add_col(int(1), Some(int(0)), None);
    let x2 = lp.add_col(int(1), Some(int(0)), None);
    lp.add_row(Some(int(3)), &[(x1, int(1)), (x2, int(2))], None);
    lp.add_row(Some(int(3)), &[(x1, int(2)), (x2, int(1))], None);

    let settings = SolverSettings {
        iter_limit: Some(0),
        ..exact_settings()
    };
    let result = solve(&mut lp, &settings);
    assert_eq!(result.status, Status::AbortIter);
}

#[test]
fn test_statistics_populated() {
    let mut lp = LpPair::new(ObjSense::Minimize);
    let x = lp.add_col(int(1), Some(int(0)), None);
    lp.add_row(Some(int(1)), &[(x, int(3))], None);

    let result = solve(&mut lp, &exact_settings());
    assert_eq!(result.status, Status::Optimal);
    assert!(result.info.lu_factorizations >= 1);
    assert!(result.info.iterations >= 1);
}
