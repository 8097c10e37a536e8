//! Continued-fraction rational reconstruction.
//!
//! Given a rational value known to lie close to a "nice" rational with a
//! bounded denominator, the continued-fraction expansion recovers that
//! rational exactly: the expansion is truncated at the last convergent
//! whose denominator stays within the bound. Reconstructing a vector
//! threads a shared denominator through the components, which makes the
//! common case (all components over one basis determinant) fast.

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use super::Rational;

/// Reconstructs the best rational approximation of `x` with denominator
/// bounded by `denom_bound`.
///
/// Returns `None` when the best convergent `p/q` with an admissible
/// denominator is not within `1 / (2 q * denom_bound)` of `x`; by the
/// classic approximation theorem a rational that close with denominator
/// within the bound is unique, so a returned value is certified.
///
/// Reconstruction is idempotent: if `x` itself has an admissible
/// denominator, the expansion terminates exactly and `x` is returned.
pub fn reconstruct_rational(x: &Rational, denom_bound: &BigInt) -> Option<Rational> {
    debug_assert!(denom_bound.is_positive());

    if x.denom() <= denom_bound {
        return Some(x.clone());
    }

    // Work on the magnitude; division below is then plain floor division.
    let negative = x.is_negative();
    let abs = x.abs();

    // Continued-fraction expansion via the Euclidean algorithm on
    // (numerator, denominator), tracking convergents p/q.
    let mut a = abs.numer().clone();
    let mut b = abs.denom().clone();

    let mut p_prev = BigInt::one();
    let mut p = &a / &b;
    let mut q_prev = BigInt::zero();
    let mut q = BigInt::one();

    a -= &p * &b;
    std::mem::swap(&mut a, &mut b);

    while !b.is_zero() {
        let quot = &a / &b;

        let p_next = &quot * &p + &p_prev;
        let q_next = &quot * &q + &q_prev;

        if &q_next > denom_bound {
            break;
        }

        p_prev = std::mem::replace(&mut p, p_next);
        q_prev = std::mem::replace(&mut q, q_next);

        a -= &quot * &b;
        std::mem::swap(&mut a, &mut b);
    }

    let mut candidate = Rational::new(p, q);
    if negative {
        candidate = -candidate;
    }

    // certify: |x - p/q| must be below 1 / (2 q * bound)
    let err = (x - &candidate).abs();
    let cert = Rational::new(
        BigInt::one(),
        BigInt::from(2) * candidate.denom() * denom_bound,
    );

    if err < cert {
        Some(candidate)
    } else {
        None
    }
}

/// Reconstructs every component of a vector under a shared denominator
/// bound, exploiting a common denominator across components.
///
/// Each component is first scaled by the least common denominator of the
/// components already reconstructed; when the components share a
/// denominator (the typical basic-solution case) the scaled values are
/// near-integral and reconstruct in one Euclidean step.
pub fn reconstruct_vector(values: &[Rational], denom_bound: &BigInt) -> Option<Vec<Rational>> {
    let mut out = Vec::with_capacity(values.len());
    let mut shared_denom = BigInt::one();

    for v in values {
        let scaled = v * Rational::from_integer(shared_denom.clone());
        let rec = reconstruct_rational(&scaled, denom_bound)?;
        let result = rec / Rational::from_integer(shared_denom.clone());

        let d = result.denom();
        if !(&shared_denom % d).is_zero() {
            shared_denom = lcm(&shared_denom, d);
        }

        out.push(result);
    }

    Some(out)
}

fn lcm(a: &BigInt, b: &BigInt) -> BigInt {
    use num_bigint::BigUint;
    let ga: BigUint = a.magnitude().clone();
    let gb: BigUint = b.magnitude().clone();
    let g = gcd(ga.clone(), gb.clone());
    BigInt::from(ga / g * gb)
}

fn gcd(mut a: num_bigint::BigUint, mut b: num_bigint::BigUint) -> num_bigint::BigUint {
    while !b.is_zero() {
        let r = a % &b;
        a = std::mem::replace(&mut b, r);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64, d: i64) -> Rational {
        Rational::new(n.into(), d.into())
    }

    #[test]
    fn test_reconstruct_exact_idempotent() {
        let x = rat(1, 3);
        let bound = BigInt::from(100);
        assert_eq!(reconstruct_rational(&x, &bound), Some(rat(1, 3)));
    }

    #[test]
    fn test_reconstruct_from_float_approximation() {
        // double approximation of 1/3 has a huge dyadic denominator
        let approx = super::super::rational_from_f64(1.0 / 3.0);
        let bound = BigInt::from(1000);
        assert_eq!(reconstruct_rational(&approx, &bound), Some(rat(1, 3)));
    }

    #[test]
    fn test_reconstruct_fails_outside_bound() {
        // 1/100003 cannot be recovered with denominators up to 10
        let x = rat(1, 100_003);
        let bound = BigInt::from(10);
        let rec = reconstruct_rational(&x, &bound);
        // the best convergent is 0/1, which is within 1/(2*100) of x only
        // if 1/100003 < 1/200, which holds, so 0 is actually certified
        assert_eq!(rec, Some(rat(0, 1)));

        // 5/12 is equidistant from 1/3 and 1/2, farther than the
        // certification radius 1/18 for bound 3
        let y = rat(5, 12);
        let small_bound = BigInt::from(3);
        assert_eq!(reconstruct_rational(&y, &small_bound), None);
    }

    #[test]
    fn test_reconstruct_vector_shared_denominator() {
        let vals = vec![
            super::super::rational_from_f64(1.0 / 3.0),
            super::super::rational_from_f64(2.0 / 3.0),
            super::super::rational_from_f64(1.0 / 6.0),
        ];
        let bound = BigInt::from(1_000_000);
        let rec = reconstruct_vector(&vals, &bound).unwrap();
        assert_eq!(rec, vec![rat(1, 3), rat(2, 3), rat(1, 6)]);
    }
}
