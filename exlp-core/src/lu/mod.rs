//! Sparse LU factorization of the basis matrix.
//!
//! The floating-point factorization ([`LuFactorization`]) does a
//! Markowitz-style sparse LU with threshold pivoting, driven by
//! nonzero-count rings over the active rows and columns. It supports
//! forward (`Bx = b`) and backward (`Bᵀy = c`) solves with dense and
//! semi-sparse right-hand sides, and two incremental update strategies:
//! Forrest–Tomlin (row-eta spike cancellation into U) and product-form
//! Eta columns. The exact factorization over rationals
//! ([`RationalLu`]) shares the structure but pivots without a threshold:
//! any zero pivot there is a true singularity.

pub mod dring;
pub mod factor;
pub mod rational;
pub mod update;

pub use factor::{LuError, LuFactorization};
pub use rational::{RationalLu, RationalLuStatus};
pub use update::UpdateKind;
