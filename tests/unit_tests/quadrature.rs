use hytra::quadrature::gauss;
use matrixcompare::assert_scalar_eq;

#[test]
fn weights_sum_to_reference_length() {
    for n in 1..=8 {
        let (weights, points) = gauss(n);
        assert_eq!(weights.len(), n);
        assert_eq!(points.len(), n);
        assert_scalar_eq!(weights.iter().sum::<f64>(), 2.0, comp = abs, tol = 1e-13);
        assert!(points.iter().all(|x| x.abs() < 1.0));
    }
}

#[test]
fn integrates_polynomials_exactly() {
    for n in 1..=6 {
        let (weights, points) = gauss(n);
        for degree in 0..(2 * n) {
            let integral: f64 = weights
                .iter()
                .zip(&points)
                .map(|(w, x)| w * x.powi(degree as i32))
                .sum();
            let expected = if degree % 2 == 0 {
                2.0 / (degree as f64 + 1.0)
            } else {
                0.0
            };
            assert_scalar_eq!(integral, expected, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn two_point_rule() {
    let (weights, points) = gauss(2);
    let x = 1.0 / f64::sqrt(3.0);
    assert_scalar_eq!(weights[0], 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(points[0].abs(), x, comp = abs, tol = 1e-15);
    assert_scalar_eq!(points[0] + points[1], 0.0, comp = abs, tol = 1e-15);
}
