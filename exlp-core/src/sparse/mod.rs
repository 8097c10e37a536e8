//! Sparse vector types.
//!
//! Two representations cover the solver's needs: [`SparseVec`], an
//! immutable list of index/value pairs used for matrix columns and rows,
//! and [`SemiSparseVec`], a dense value array with an explicit nonzero
//! index set used as working storage in the LU solves and updates.

pub mod ssvec;
pub mod svec;

pub use ssvec::SemiSparseVec;
pub use svec::SparseVec;
