//! Gauss quadrature for the reference interval `[-1, 1]`.
use std::f64::consts::PI;

/// Quadrature weights and points.
pub type Rule = (Vec<f64>, Vec<f64>);

/// Legendre polynomial `p_n(x)` and its predecessor `p_{n-1}(x)`.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    //  m P_m(x) = (2m - 1) * x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
    let mut p1 = 1.0;
    let mut p2 = 0.0;
    for m in 1..=n {
        let m = m as f64;
        let p3 = p2;
        p2 = p1;
        p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
    }
    (p1, p2)
}

/// Value and derivative of the Legendre polynomial of degree `n` in the open interval `(-1, 1)`.
fn legendre_value_and_derivative(n: usize, x: f64) -> (f64, f64) {
    let (p1, p2) = legendre(n, x);
    let dp = n as f64 * (x * p1 - p2) / (x * x - 1.0);
    (p1, dp)
}

/// Returns the Gauss rule with `num_points` points, exact for polynomials of degree `2n - 1`.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let m = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    for i in 0..m {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let (mut p, mut dp) = legendre_value_and_derivative(n, x);

        // Newton's method on p_n
        for _ in 0..100 {
            let dx = -p / dp;
            x += dx;
            let (p_new, dp_new) = legendre_value_and_derivative(n, x);
            p = p_new;
            dp = dp_new;
            if dx.abs() <= 1e-15 {
                break;
            }
        }

        points.push(x);
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
    }

    // The remaining points follow by symmetry
    for i in m..n {
        let mirror_idx = n - i - 1;
        points.push(-points[mirror_idx]);
        weights.push(weights[mirror_idx]);
    }

    (weights, points)
}
