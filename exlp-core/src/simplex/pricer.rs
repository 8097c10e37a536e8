//! Pricing rules as a closed sum type.
//!
//! The engine stores which rule is active plus the per-variant state
//! (reference weights); there is no open-ended subclassing. All variants
//! select among negative test values only: a candidate's test value is
//! the magnitude of its optimality violation, negated.

use crate::settings::PricerKind;

/// Pricer state. Weights are indexed by variable for the entering
/// variant and by basis position for the leaving variant.
#[derive(Debug, Clone)]
pub struct Pricer {
    kind: PricerKind,
    weights: Vec<f64>,
    pos_weights: Vec<f64>,
}

impl Pricer {
    pub fn new(kind: PricerKind) -> Self {
        Self {
            kind,
            weights: Vec::new(),
            pos_weights: Vec::new(),
        }
    }

    pub fn kind(&self) -> PricerKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: PricerKind) {
        if self.kind != kind {
            self.kind = kind;
            // weights of a different rule are meaningless
            self.weights.fill(1.0);
            self.pos_weights.fill(1.0);
        }
    }

    /// (Re)initializes the weight arrays for a problem with `num_vars`
    /// variables and `num_rows` basis positions. Steepest-edge weights
    /// are seeded with the squared column norms.
    pub fn load(&mut self, num_vars: usize, num_rows: usize, col_norms2: impl Fn(usize) -> f64) {
        self.weights.clear();
        self.pos_weights.clear();
        match self.kind {
            PricerKind::Steep => {
                self.weights.extend((0..num_vars).map(|k| 1.0 + col_norms2(k)));
            }
            _ => self.weights.resize(num_vars, 1.0),
        }
        self.pos_weights.resize(num_rows, 1.0);
    }

    pub fn clear(&mut self) {
        self.weights.clear();
        self.pos_weights.clear();
    }

    /// Entering selection: returns the candidate with the best score
    /// among variables whose test value is below `-tol`, or `None`.
    pub fn select_enter<'a, I>(&self, candidates: I, tol: f64) -> Option<usize>
    where
        I: Iterator<Item = (usize, f64)> + 'a,
    {
        let mut best: Option<(usize, f64)> = None;
        for (k, test) in candidates {
            if test >= -tol {
                continue;
            }
            let score = match self.kind {
                PricerKind::Dantzig => -test,
                PricerKind::Devex | PricerKind::Steep => test * test / self.weights[k].max(1e-10),
            };
            match best {
                Some((_, bs)) if bs >= score => {}
                _ => best = Some((k, score)),
            }
        }
        best.map(|(k, _)| k)
    }

    /// Leaving selection: returns the basis position with the best score
    /// among positions whose feasibility test is below `-tol`.
    pub fn select_leave(&self, tests: &[f64], tol: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (j, &test) in tests.iter().enumerate() {
            if test >= -tol {
                continue;
            }
            let score = match self.kind {
                PricerKind::Dantzig => -test,
                PricerKind::Devex | PricerKind::Steep => {
                    test * test / self.pos_weights[j].max(1e-10)
                }
            };
            match best {
                Some((_, bs)) if bs >= score => {}
                _ => best = Some((j, score)),
            }
        }
        best.map(|(j, _)| j)
    }

    /// Reference-weight update after a pivot of the entering variant.
    ///
    /// `pivot_row` yields `(variable, row entry)` for the nonbasic
    /// variables, `pivot_elem` is the entry of the entering column at the
    /// leaving position, and `entering`/`leaving` are variable indices.
    pub fn entered(
        &mut self,
        entering: usize,
        leaving: usize,
        pivot_elem: f64,
        pivot_row: impl Iterator<Item = (usize, f64)>,
    ) {
        if self.kind == PricerKind::Dantzig || self.weights.is_empty() {
            return;
        }
        let gamma_q = self.weights[entering].max(1.0);
        let pivot2 = pivot_elem * pivot_elem;
        if pivot2 <= 0.0 {
            return;
        }
        for (k, w) in pivot_row {
            if k == entering {
                continue;
            }
            let cand = (w * w / pivot2) * gamma_q;
            if cand > self.weights[k] {
                self.weights[k] = cand;
            }
        }
        self.weights[leaving] = (gamma_q / pivot2).max(1.0);
    }

    /// Weight touch-up for the leaving variant: the position that pivoted
    /// gets the entering variable's weight.
    pub fn left(&mut self, pos: usize, entering: usize) {
        if self.pos_weights.is_empty() || self.weights.is_empty() {
            return;
        }
        self.pos_weights[pos] = self.weights[entering].max(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dantzig_selects_most_negative() {
        let mut p = Pricer::new(PricerKind::Dantzig);
        p.load(4, 2, |_| 0.0);
        let tests = vec![(0, -0.5), (1, -2.0), (2, 0.1), (3, -1.0)];
        assert_eq!(p.select_enter(tests.into_iter(), 1e-9), Some(1));
    }

    #[test]
    fn test_tolerance_excludes_small() {
        let mut p = Pricer::new(PricerKind::Dantzig);
        p.load(2, 1, |_| 0.0);
        let tests = vec![(0, -1e-12), (1, 1.0)];
        assert_eq!(p.select_enter(tests.into_iter(), 1e-9), None);
    }

    #[test]
    fn test_devex_uses_weights() {
        let mut p = Pricer::new(PricerKind::Devex);
        p.load(3, 1, |_| 0.0);
        // equal tests, weight of var 0 grows after an update
        p.entered(1, 2, 1.0, vec![(0, 10.0)].into_iter());
        let tests = vec![(0, -1.0), (1, -1.0)];
        assert_eq!(p.select_enter(tests.into_iter(), 1e-9), Some(1));
    }

    #[test]
    fn test_steep_seeds_column_norms() {
        let mut p = Pricer::new(PricerKind::Steep);
        p.load(2, 1, |k| if k == 0 { 99.0 } else { 0.0 });
        let tests = vec![(0, -1.0), (1, -1.0)];
        // var 0 has a huge norm, so var 1 scores better
        assert_eq!(p.select_enter(tests.into_iter(), 1e-9), Some(1));
    }

    #[test]
    fn test_select_leave() {
        let mut p = Pricer::new(PricerKind::Dantzig);
        p.load(3, 3, |_| 0.0);
        assert_eq!(p.select_leave(&[0.0, -3.0, -1.0], 1e-9), Some(1));
        assert_eq!(p.select_leave(&[0.0, 0.0, 0.0], 1e-9), None);
    }
}
