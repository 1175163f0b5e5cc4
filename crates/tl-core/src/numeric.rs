use crate::TlError;

/// Scalar type of node slots, parameters and time.
pub type Real = f64;

/// Absolute and relative bounds for comparing timesteps and step counts.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

/// True when `a` and `b` agree within either bound.
pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Pass `v` through, or name it in a [`TlError::NonFinite`].
pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, TlError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(TlError::NonFinite { what, value: v })
    }
}

/// Division that keeps the denominator's magnitude at or above `eps`.
///
/// The sign of `den` is preserved; a zero denominator is treated as positive.
pub fn guarded_div(num: Real, den: Real, eps: Real) -> Real {
    if den.abs() >= eps {
        num / den
    } else if den < 0.0 {
        num / -eps
    } else {
        num / eps
    }
}

/// Number of whole steps of `dt` that fit in `span`, rounded to the nearest integer.
pub fn step_count(span: Real, dt: Real) -> usize {
    if dt <= 0.0 || span <= 0.0 {
        return 0;
    }
    (span / dt).round() as usize
}
