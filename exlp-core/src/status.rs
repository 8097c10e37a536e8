//! Solve status taxonomy.

use std::fmt;

/// Outcome of a solve or of an internal algorithm stage.
///
/// The simplex engine, the basis solver, and the refinement driver all
/// communicate through these values; panics are reserved for internal
/// invariant violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Optimal solution found.
    Optimal,

    /// Problem is primal infeasible (Farkas certificate available).
    Infeasible,

    /// Problem is primal unbounded (primal ray available).
    Unbounded,

    /// Problem is infeasible or unbounded; not yet distinguished.
    InfOrUnbd,

    /// A regular basis is loaded but the solve has not concluded.
    Regular,

    /// Solve in progress.
    Running,

    /// Time limit or cancellation flag hit.
    AbortTime,

    /// Iteration limit hit.
    AbortIter,

    /// Objective limit crossed.
    AbortValue,

    /// Cycling detected and not recovered.
    AbortCycling,

    /// Basis matrix is singular.
    Singular,

    /// No problem has been loaded.
    NoProblem,

    /// Unrecoverable error (inconsistent internal state).
    Error,

    /// Status not yet determined.
    Unknown,
}

impl Status {
    /// True for the statuses that abort a solve due to an external limit.
    pub fn is_abort(self) -> bool {
        matches!(
            self,
            Status::AbortTime | Status::AbortIter | Status::AbortValue | Status::AbortCycling
        )
    }

    /// True if the status is a conclusive answer about the problem.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Optimal | Status::Infeasible | Status::Unbounded | Status::InfOrUnbd
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Optimal => "Optimal",
            Status::Infeasible => "Infeasible",
            Status::Unbounded => "Unbounded",
            Status::InfOrUnbd => "Infeasible or Unbounded",
            Status::Regular => "Regular",
            Status::Running => "Running",
            Status::AbortTime => "Time Limit",
            Status::AbortIter => "Iteration Limit",
            Status::AbortValue => "Objective Limit",
            Status::AbortCycling => "Cycling",
            Status::Singular => "Singular Basis",
            Status::NoProblem => "No Problem",
            Status::Error => "Error",
            Status::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(Status::Optimal.is_terminal());
        assert!(Status::Infeasible.is_terminal());
        assert!(!Status::AbortTime.is_terminal());
        assert!(Status::AbortTime.is_abort());
        assert!(Status::AbortCycling.is_abort());
        assert!(!Status::Optimal.is_abort());
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::Optimal.to_string(), "Optimal");
        assert_eq!(Status::AbortValue.to_string(), "Objective Limit");
    }
}
