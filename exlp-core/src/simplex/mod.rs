//! Revised simplex engine.
//!
//! The engine runs the entering (primal) or leaving (dual) variant over a
//! column-defined basis, with the pricer and ratio tester realized as
//! closed sum types carrying their own state. Bound shifting keeps pivots
//! numerically safe and is fully removed before optimality is claimed; a
//! cycling guard perturbs bounds after too many consecutive degenerate
//! steps.

pub mod engine;
pub mod pricer;
pub mod ratiotest;

pub use engine::SimplexEngine;
pub use pricer::Pricer;
pub use ratiotest::{RatioOutcome, RatioTester};
