//! Limiter functions and their derivatives.
//!
//! Q-type components apply these inside residual and Jacobian assembly so that
//! Newton iterations see the limiter's slope instead of a post-hoc clamp.
//! Derivative helpers return 1.0 where the argument passes through unchanged
//! (including exactly on a boundary) and 0.0 where the limiter saturates.

use crate::numeric::Real;

/// Clamp `x` into `[lo, hi]`.
#[inline]
pub fn limit(x: Real, lo: Real, hi: Real) -> Real {
    if x > hi {
        hi
    } else if x < lo {
        lo
    } else {
        x
    }
}

/// Derivative of [`limit`] with respect to its argument.
#[inline]
pub fn dx_limit(x: Real, lo: Real, hi: Real) -> Real {
    if x > hi || x < lo { 0.0 } else { 1.0 }
}

#[inline]
pub fn low_limit(x: Real, lo: Real) -> Real {
    if x < lo { lo } else { x }
}

#[inline]
pub fn dx_low_limit(x: Real, lo: Real) -> Real {
    if x < lo { 0.0 } else { 1.0 }
}

#[inline]
pub fn high_limit(x: Real, hi: Real) -> Real {
    if x > hi { hi } else { x }
}

#[inline]
pub fn dx_high_limit(x: Real, hi: Real) -> Real {
    if x > hi { 0.0 } else { 1.0 }
}

/// 1.0 for non-negative `x`, else 0.0.
#[inline]
pub fn on_positive(x: Real) -> Real {
    if x < 0.0 { 0.0 } else { 1.0 }
}

/// 1.0 for negative `x`, else 0.0.
#[inline]
pub fn on_negative(x: Real) -> Real {
    if x < 0.0 { 1.0 } else { 0.0 }
}

/// Signed square root with a laminar-like region of width `x0` around zero:
/// `sign(x) * (sqrt(x0 + |x|) - sqrt(x0))`.
#[inline]
pub fn signed_square_l(x: Real, x0: Real) -> Real {
    ((x0 + x.abs()).sqrt() - x0.sqrt()) * sign(x)
}

#[inline]
pub fn dx_signed_square_l(x: Real, x0: Real) -> Real {
    1.0 / (2.0 * (x0 + x.abs()).sqrt())
}

/// Exact signed square root for `|x| >= x0`, straight line through the origin below.
///
/// Continuous at `|x| = x0`; the slope below the transition is `1/sqrt(x0)`.
#[inline]
pub fn turbulent_sqrt(x: Real, x0: Real) -> Real {
    if x.abs() >= x0 {
        sign(x) * x.abs().sqrt()
    } else {
        x / x0.sqrt()
    }
}

#[inline]
pub fn dx_turbulent_sqrt(x: Real, x0: Real) -> Real {
    if x.abs() >= x0 {
        1.0 / (2.0 * x.abs().sqrt())
    } else {
        1.0 / x0.sqrt()
    }
}

/// -1.0, 0.0 or 1.0.
#[inline]
pub fn sign(x: Real) -> Real {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn limit_clamps_to_boundaries() {
        assert_eq!(limit(5.0, 0.0, 10.0), 5.0);
        assert_eq!(limit(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(limit(11.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn dx_limit_passes_slope_on_boundary() {
        assert_eq!(dx_limit(0.0, 0.0, 1.0), 1.0);
        assert_eq!(dx_limit(1.0, 0.0, 1.0), 1.0);
        assert_eq!(dx_limit(1.5, 0.0, 1.0), 0.0);
        assert_eq!(dx_limit(-0.5, 0.0, 1.0), 0.0);
    }

    #[test]
    fn one_sided_limits() {
        assert_eq!(low_limit(-3.0, 0.0), 0.0);
        assert_eq!(dx_low_limit(-3.0, 0.0), 0.0);
        assert_eq!(high_limit(3.0, 1.0), 1.0);
        assert_eq!(dx_high_limit(0.5, 1.0), 1.0);
    }

    #[test]
    fn turbulent_sqrt_is_continuous_at_transition() {
        let x0 = 100.0;
        let below = turbulent_sqrt(x0 * (1.0 - 1e-12), x0);
        let above = turbulent_sqrt(x0, x0);
        assert!((below - above).abs() < 1e-9);
        assert_eq!(turbulent_sqrt(1e5, x0), 1e5_f64.sqrt());
        assert_eq!(turbulent_sqrt(-1e5, x0), -(1e5_f64.sqrt()));
    }

    #[test]
    fn signed_square_l_is_odd() {
        let a = signed_square_l(250.0, 1e3);
        let b = signed_square_l(-250.0, 1e3);
        assert_eq!(a, -b);
        assert_eq!(signed_square_l(0.0, 1e3), 0.0);
    }

    proptest! {
        #[test]
        fn limit_in_range_is_identity(lo in -1e3f64..0.0, span in 0.0f64..1e3, frac in 0.0f64..=1.0) {
            let hi = lo + span;
            let x = lo + frac * span;
            if x >= lo && x <= hi {
                prop_assert_eq!(limit(x, lo, hi), x);
                prop_assert_eq!(dx_limit(x, lo, hi), 1.0);
            }
        }

        #[test]
        fn limit_out_of_range_returns_boundary(lo in -1e3f64..0.0, span in 0.0f64..1e3, excess in 1e-6f64..1e3) {
            let hi = lo + span;
            prop_assert_eq!(limit(hi + excess, lo, hi), hi);
            prop_assert_eq!(dx_limit(hi + excess, lo, hi), 0.0);
            prop_assert_eq!(limit(lo - excess, lo, hi), lo);
            prop_assert_eq!(dx_limit(lo - excess, lo, hi), 0.0);
        }

        #[test]
        fn limit_is_idempotent(x in -1e6f64..1e6, lo in -1e3f64..0.0, span in 0.0f64..1e3) {
            let hi = lo + span;
            let once = limit(x, lo, hi);
            prop_assert_eq!(limit(once, lo, hi), once);
        }
    }
}
