//! EXLP: exact rational linear programming by iterative refinement.
//!
//! This library solves linear programs to exact rational optimality. It
//! couples two engines:
//!
//! - **Revised simplex** over floating-point arithmetic, backed by a
//!   sparse LU factorization of the basis matrix with Markowitz
//!   threshold pivoting and incremental Forrest–Tomlin or Eta updates.
//! - **Iterative refinement** over arbitrary-precision rationals: the
//!   driver repeatedly solves floating LPs with scaled bounds, sides and
//!   objective, measures the exact violations, and terminates with an
//!   exact optimum, an exact Farkas certificate of infeasibility, or an
//!   exact primal ray of unboundedness.
//!
//! # Example
//!
//! ```ignore
//! use exlp_core::{solve, LpPair, ObjSense, SolverSettings, Status};
//! use exlp_core::rational::Rational;
//!
//! // minimize x1 + x2  s.t.  x1 + 2 x2 >= 3,  2 x1 + x2 >= 3,  x >= 0
//! let mut lp = LpPair::new(ObjSense::Minimize);
//! let one = Rational::from_integer(1.into());
//! let x1 = lp.add_col(one.clone(), Some(Rational::from_integer(0.into())), None);
//! let x2 = lp.add_col(one.clone(), Some(Rational::from_integer(0.into())), None);
//! lp.add_row(Some(Rational::from_integer(3.into())),
//!            &[(x1, one.clone()), (x2, Rational::from_integer(2.into()))], None);
//! lp.add_row(Some(Rational::from_integer(3.into())),
//!            &[(x1, Rational::from_integer(2.into())), (x2, one)], None);
//!
//! let result = solve(&mut lp, &SolverSettings::default());
//! assert_eq!(result.status, Status::Optimal);
//! // objective is exactly 2
//! ```
//!
//! # Scope
//!
//! File I/O (LP/MPS), the CLI driver, and presolving are external
//! collaborators; this crate owns the numerical core only. There is no
//! interior-point method, no integer programming, and no parallelism:
//! each solver instance is single-threaded and owns all of its state.

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod basis;
pub mod lu;
pub mod problem;
pub mod rational;
pub mod refine;
pub mod scaling;
pub mod settings;
pub mod simplex;
pub mod solution;
pub mod sparse;
pub mod status;
pub mod util;

pub use basis::{BasisDesc, VarStatus};
pub use problem::{LpError, LpPair, RangeType};
pub use settings::{
    Algorithm, ObjSense, PricerKind, RatioTesterKind, Representation, ScalerKind,
    SimplifierKind, SolverSettings, SyncMode,
};
pub use solution::{RationalSolution, SolveResult, Statistics};
pub use status::Status;

/// Solves the rational LP held in `lp` to an exact optimum, Farkas
/// certificate, or primal ray.
///
/// The floating side of the pair is modified during refinement and
/// restored before returning; the rational side is restored exactly
/// after any problem transforms.
pub fn solve(lp: &mut LpPair, settings: &SolverSettings) -> SolveResult {
    refine::solve(lp, settings)
}
