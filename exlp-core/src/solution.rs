//! Solution containers and solve statistics.

use num_traits::Zero;

use crate::rational::Rational;
use crate::status::Status;

/// Exact rational solution of an LP solve.
///
/// Vectors are dimensioned to the LP; the feasibility flags say which of
/// them carry meaning. Rays are populated only together with their flag.
#[derive(Debug, Clone, Default)]
pub struct RationalSolution {
    pub primal: Vec<Rational>,
    pub slacks: Vec<Rational>,
    pub dual: Vec<Rational>,
    pub red_cost: Vec<Rational>,

    pub primal_ray: Vec<Rational>,
    pub dual_farkas: Vec<Rational>,

    pub is_primal_feasible: bool,
    pub is_dual_feasible: bool,
    pub has_primal_ray: bool,
    pub has_dual_farkas: bool,

    /// Objective value in the user's sense; meaningful when primal
    /// feasible.
    pub obj_value: Rational,
}

impl RationalSolution {
    pub fn new(num_cols: usize, num_rows: usize) -> Self {
        Self {
            primal: vec![Rational::zero(); num_cols],
            slacks: vec![Rational::zero(); num_rows],
            dual: vec![Rational::zero(); num_rows],
            red_cost: vec![Rational::zero(); num_cols],
            ..Self::default()
        }
    }

    /// Drops all claims the solution makes; vectors keep their storage.
    pub fn invalidate(&mut self) {
        self.is_primal_feasible = false;
        self.is_dual_feasible = false;
        self.has_primal_ray = false;
        self.has_dual_farkas = false;
    }

    /// Resizes all vectors, used when transforms change the dimensions.
    pub fn resize(&mut self, num_cols: usize, num_rows: usize) {
        self.primal.resize(num_cols, Rational::zero());
        self.red_cost.resize(num_cols, Rational::zero());
        self.slacks.resize(num_rows, Rational::zero());
        self.dual.resize(num_rows, Rational::zero());
        if self.has_primal_ray {
            self.primal_ray.resize(num_cols, Rational::zero());
        }
        if self.has_dual_farkas {
            self.dual_farkas.resize(num_rows, Rational::zero());
        }
    }
}

/// Per-solve statistics, reset at solve entry.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    /// Total refinement rounds.
    pub refinements: u32,
    /// Refinement rounds without simplex pivots.
    pub stall_refinements: u32,
    /// Value of `refinements` at the last round that made pivots.
    pub pivot_refinements: u32,
    /// Refinements spent in the feasibility auxiliary problem.
    pub feas_refinements: u32,
    /// Refinements spent in the unbounded auxiliary problem.
    pub unbd_refinements: u32,

    /// Simplex iterations across all floating solves.
    pub iterations: u64,
    /// Floating LU factorizations performed.
    pub lu_factorizations: u64,
    /// Exact LU factorizations performed.
    pub rational_factorizations: u64,
    /// Time spent in exact factorization, milliseconds.
    pub rational_factor_time_ms: u64,

    pub reconstruction_attempts: u32,
    pub reconstruction_successes: u32,

    /// Time spent applying and undoing problem transforms, milliseconds.
    pub transform_time_ms: u64,
    /// Total wall time of the solve, milliseconds.
    pub solve_time_ms: u64,
}

/// Result surface of a rational solve.
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub status: Status,
    pub solution: RationalSolution,
    pub info: Statistics,
}

impl SolveResult {
    /// Objective value in the user's sense; meaningful on `Optimal`.
    pub fn obj_value(&self) -> &Rational {
        &self.solution.obj_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate() {
        let mut sol = RationalSolution::new(2, 3);
        sol.is_primal_feasible = true;
        sol.has_dual_farkas = true;
        sol.invalidate();
        assert!(!sol.is_primal_feasible);
        assert!(!sol.has_dual_farkas);
        assert_eq!(sol.primal.len(), 2);
        assert_eq!(sol.dual.len(), 3);
    }

    #[test]
    fn test_resize() {
        let mut sol = RationalSolution::new(2, 2);
        sol.resize(4, 3);
        assert_eq!(sol.primal.len(), 4);
        assert_eq!(sol.slacks.len(), 3);
    }
}
