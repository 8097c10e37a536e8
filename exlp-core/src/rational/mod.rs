//! Arbitrary-precision rational scalar and helpers.
//!
//! The solver's exact side is built on `num-rational`'s [`BigRational`].
//! This module collects the conversions and roundings the refinement loop
//! needs: exact double-to-rational assignment, best-effort rational-to-
//! double conversion, in-place inversion, and power-of-two rounding of
//! scaling factors.

pub mod reconstruct;

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

pub use num_rational::BigRational as Rational;
pub use reconstruct::{reconstruct_rational, reconstruct_vector};

/// Exact conversion of a finite double into a rational.
///
/// Every finite IEEE double is a dyadic rational, so this never loses
/// information. Non-finite inputs have no rational counterpart; callers
/// must route infinite bounds through the range types instead.
pub fn rational_from_f64(x: f64) -> Rational {
    debug_assert!(x.is_finite(), "non-finite double has no rational value");
    Rational::from_float(x).unwrap_or_else(Rational::zero)
}

/// Nearest-double conversion of a rational.
///
/// Values beyond the double range collapse to signed infinity so that the
/// floating LP's sentinel handling stays consistent.
pub fn rational_to_f64(r: &Rational) -> f64 {
    match r.to_f64() {
        Some(x) => x,
        None => {
            if r.is_negative() {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        }
    }
}

/// In-place inversion. The value must be nonzero.
pub fn invert(r: &mut Rational) {
    debug_assert!(!r.is_zero());
    *r = r.recip();
}

/// Rounds a positive rational down to a power of two.
///
/// Used under power scaling so that multiplying the floating LP by the
/// scale factor is exact. Values in `(0, 1)` round to the reciprocal of a
/// power of two; non-positive values are left untouched.
pub fn round_down_pow2(r: &mut Rational) {
    if !r.is_positive() {
        return;
    }

    if *r >= Rational::one() {
        let floor = r.to_integer();
        let bits = floor.bits();
        debug_assert!(bits >= 1);
        *r = Rational::from_integer(BigInt::one() << (bits - 1) as usize);
    } else {
        let mut inv = r.recip();
        // 1/r >= 1; round 1/r *up* to a power of two so r rounds down
        let floor = inv.to_integer();
        let bits = floor.bits();
        let pow = BigInt::one() << (bits - 1) as usize;
        if inv != Rational::from_integer(pow.clone()) {
            inv = Rational::from_integer(pow << 1);
        } else {
            inv = Rational::from_integer(pow);
        }
        *r = inv.recip();
    }
}

/// `max(a, b)` by value for rationals.
pub fn rational_max(a: Rational, b: Rational) -> Rational {
    if a >= b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64, d: i64) -> Rational {
        Rational::new(n.into(), d.into())
    }

    #[test]
    fn test_from_f64_exact() {
        assert_eq!(rational_from_f64(0.5), rat(1, 2));
        assert_eq!(rational_from_f64(-3.0), rat(-3, 1));
        // 0.1 is not exactly 1/10 in binary; conversion must keep the
        // dyadic value, not round to the decimal
        assert_ne!(rational_from_f64(0.1), rat(1, 10));
        assert_eq!(rational_to_f64(&rational_from_f64(0.1)), 0.1);
    }

    #[test]
    fn test_invert() {
        let mut r = rat(3, 7);
        invert(&mut r);
        assert_eq!(r, rat(7, 3));
    }

    #[test]
    fn test_round_down_pow2_large() {
        let mut r = rat(1000, 1);
        round_down_pow2(&mut r);
        assert_eq!(r, rat(512, 1));

        let mut r = rat(512, 1);
        round_down_pow2(&mut r);
        assert_eq!(r, rat(512, 1));

        let mut r = rat(3, 2);
        round_down_pow2(&mut r);
        assert_eq!(r, rat(1, 1));
    }

    #[test]
    fn test_round_down_pow2_small() {
        let mut r = rat(3, 7); // 1/4 <= 3/7 < 1/2
        round_down_pow2(&mut r);
        assert_eq!(r, rat(1, 4));

        let mut r = rat(1, 4);
        round_down_pow2(&mut r);
        assert_eq!(r, rat(1, 4));
    }

    #[test]
    fn test_to_f64_overflow() {
        let huge = Rational::from_integer(BigInt::from(10).pow(400u32));
        assert_eq!(rational_to_f64(&huge), f64::INFINITY);
        assert_eq!(rational_to_f64(&-huge), f64::NEG_INFINITY);
    }
}
