//! Finite difference Jacobian computation.
//!
//! Components supply analytic Jacobians; these are the reference they are
//! checked against.

use nalgebra::{DMatrix, DVector};
use tl_core::Real;

/// Forward differences: column j is `(f(x + h e_j) - f(x)) / h`.
pub fn finite_difference_jacobian<F>(x: &DVector<Real>, f: F, epsilon: Real) -> DMatrix<Real>
where
    F: Fn(&DVector<Real>) -> DVector<Real>,
{
    let n = x.len();
    let f_x = f(x);
    let mut jac = DMatrix::zeros(f_x.len(), n);

    for j in 0..n {
        let mut x_perturbed = x.clone();
        let dx = epsilon * x[j].abs().max(1.0);
        x_perturbed[j] += dx;

        let df = (f(&x_perturbed) - &f_x) / dx;
        jac.set_column(j, &df);
    }

    jac
}

/// Central differences; twice the evaluations, second-order accurate.
pub fn central_difference_jacobian<F>(x: &DVector<Real>, f: F, epsilon: Real) -> DMatrix<Real>
where
    F: Fn(&DVector<Real>) -> DVector<Real>,
{
    let n = x.len();
    let m = f(x).len();
    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let dx = epsilon * x[j].abs().max(1.0);

        let mut x_plus = x.clone();
        x_plus[j] += dx;
        let mut x_minus = x.clone();
        x_minus[j] -= dx;

        let df = (f(&x_plus) - f(&x_minus)) / (2.0 * dx);
        jac.set_column(j, &df);
    }

    jac
}

/// Largest element-wise deviation, relative to `max(|a|, |b|, 1)`.
pub fn max_relative_deviation(a: &DMatrix<Real>, b: &DMatrix<Real>) -> Real {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs() / x.abs().max(y.abs()).max(1.0))
        .fold(0.0, Real::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobian_linear() {
        let f = |x: &DVector<f64>| DVector::from_element(1, 2.0 * x[0]);
        let x = DVector::from_element(1, 3.0);
        let jac = finite_difference_jacobian(&x, f, 1e-7);
        assert!((jac[(0, 0)] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn central_is_tighter_on_quadratic() {
        let f = |x: &DVector<f64>| DVector::from_element(1, x[0] * x[0]);
        let x = DVector::from_element(1, 3.0);
        let fwd = finite_difference_jacobian(&x, f, 1e-6);
        let ctr = central_difference_jacobian(&x, f, 1e-6);
        assert!((ctr[(0, 0)] - 6.0).abs() <= (fwd[(0, 0)] - 6.0).abs());
        assert!((ctr[(0, 0)] - 6.0).abs() < 1e-6);
    }

    #[test]
    fn jacobian_two_by_two() {
        // f = [x0*x1, x0 + 3 x1]
        let f = |x: &DVector<f64>| DVector::from_vec(vec![x[0] * x[1], x[0] + 3.0 * x[1]]);
        let x = DVector::from_vec(vec![2.0, 5.0]);
        let jac = central_difference_jacobian(&x, f, 1e-6);
        let exact = DMatrix::from_row_slice(2, 2, &[5.0, 2.0, 1.0, 3.0]);
        assert!(max_relative_deviation(&jac, &exact) < 1e-8);
    }
}
