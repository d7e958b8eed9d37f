use crate::unit_interval_function;
use hytra::expr::{EvaluationPoint, Expr, Parameter, SubExpressions, Variable};
use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;

#[test]
fn construction_folds_constants() {
    let x = Expr::x();
    assert!((Expr::zero() * &x).is_zero());
    assert!((&x * 0.0).is_zero());
    assert_eq!(Expr::one() * &x, x);
    assert_eq!(&x + 0.0, x);
    assert_eq!(0.0 + &x, x);
    assert_eq!(&x - 0.0, x);
    assert_eq!(-(-x.clone()), x);
    assert_eq!(0.0 / &x, Expr::zero());
    assert_eq!(Expr::zero().exp(), Expr::one());
    assert_eq!(Expr::constant(4.0).sqrt(), Expr::constant(2.0));
    assert_eq!((Expr::constant(2.0) + 3.0) * 2.0, Expr::constant(10.0));
    assert_eq!(x.clone().powi(1), x);
    assert_eq!(x.clone().powi(0), Expr::one());
}

#[test]
fn eval_arithmetic_and_functions() {
    let x = Expr::x();
    let t = Expr::time();
    let expr = (&x * 2.0 + &t).powi(2) / (1.0 + x.clone().exp()) - t.clone().sin() * x.clone().cos();
    let (xv, tv): (f64, f64) = (0.3, 1.7);
    let expected = (2.0 * xv + tv).powi(2) / (1.0 + f64::exp(xv)) - f64::sin(tv) * f64::cos(xv);
    assert_scalar_eq!(expr.eval_at(xv, tv), expected, comp = abs, tol = 1e-14);
}

#[test]
fn indicators_evaluate_to_zero_or_one() {
    let mask = Expr::x().lt(0.5);
    assert_eq!(mask.eval_at(0.2, 0.0), 1.0);
    assert_eq!(mask.eval_at(0.7, 0.0), 0.0);
    assert_eq!(Expr::x().ge(0.5).eval_at(0.5, 0.0), 1.0);
    assert_eq!(Expr::constant(1.0).gt(2.0), Expr::zero());
    // Indicators are piecewise constant
    assert!(mask.grad().is_zero());
}

#[test]
fn parameters_are_shared_between_clones() {
    let dt = Parameter::new("dt", 1.0);
    let expr = 2.0 / Expr::parameter(&dt);
    assert_eq!(expr.eval_at(0.0, 0.0), 2.0);
    dt.clone().set(4.0);
    assert_eq!(expr.eval_at(0.0, 0.0), 0.5);
    assert_ne!(Expr::parameter(&dt), Expr::parameter(&Parameter::new("dt", 4.0)));
}

#[test]
fn timed_expressions_use_their_own_clock() {
    let clock = Parameter::new("t", 3.0);
    let expr = Expr::timed(2.0 * Expr::time() + Expr::x(), &clock);
    assert_eq!(expr.eval_at(1.0, 100.0), 7.0);
    clock.set(5.0);
    assert_eq!(expr.eval_at(1.0, 100.0), 11.0);
    assert!(!expr.depends_on_time());
    assert!((2.0 * Expr::time()).depends_on_time());
    assert!(expr.diff(&Variable::Time).is_zero());
    assert_eq!(expr.grad().eval_at(0.0, 0.0), 1.0);
}

#[test]
fn timed_expressions_compare_equal_regardless_of_clock() {
    let a = Expr::timed(Expr::time(), &Parameter::new("t", 0.0));
    let b = Expr::timed(Expr::time(), &Parameter::new("t", 1.0));
    assert_eq!(a, b);
    assert_eq!(Expr::timed(Expr::constant(2.0), &Parameter::new("t", 0.0)), Expr::constant(2.0));
}

#[test]
fn grad_applies_chain_rule() {
    let x = Expr::x();
    let expr = x.clone().powi(3) + (2.0 * &x).sin() + x.clone().ln();
    let xv = 0.7;
    let expected = 3.0 * xv * xv + 2.0 * f64::cos(2.0 * xv) + 1.0 / xv;
    assert_scalar_eq!(expr.grad().eval_at(xv, 0.0), expected, comp = abs, tol = 1e-13);
    assert!(Expr::time().grad().is_zero());
}

#[test]
fn diff_with_respect_to_time() {
    let expr = Expr::time() * Expr::x() + Expr::time().powi(2);
    assert_scalar_eq!(expr.diff(&Variable::Time).eval_at(2.0, 5.0), 12.0, comp = abs, tol = 1e-14);
}

#[test]
fn diff_with_respect_to_coefficients_and_tests() {
    let u = unit_interval_function(2, 2, "u");
    u.set_dofs(&nalgebra::DVector::from_vec(vec![2.0, 1.0, 2.0, 1.0, 2.0, 1.0]));
    let u0 = Expr::coefficient(&u, 0);
    let u1 = Expr::coefficient(&u, 1);

    let integrand = 3.0 * u0.clone().powi(2) * u1.clone() * Expr::test(1) + u0.grad() * Expr::test_grad(0);
    let point = EvaluationPoint {
        cell: 0,
        xi: 0.0,
        x: 0.25,
        t: 0.0,
    };

    let a_1 = integrand.diff(&Variable::Test(1));
    assert_scalar_eq!(a_1.eval(&point), 12.0, comp = abs, tol = 1e-14);
    let b_0 = integrand.diff(&Variable::TestGradient(0));
    assert_eq!(b_0, Expr::coefficient_grad(&u, 0));
    assert!(integrand.diff(&Variable::Test(0)).is_zero());

    let d_a_1 = a_1.diff(&Variable::Value(u.clone(), 0));
    assert_scalar_eq!(d_a_1.eval(&point), 12.0, comp = abs, tol = 1e-14);
    assert!(b_0.diff(&Variable::Value(u.clone(), 0)).is_zero());
    assert!(b_0.diff(&Variable::Gradient(u.clone(), 0)).is_one());
    assert!(integrand.references(&u));
    assert!(integrand.contains_test());
    assert!(!a_1.contains_test());
}

#[test]
fn sub_expressions_register_non_constant_expressions() {
    let mut sub_expressions = SubExpressions::new();
    assert_eq!(sub_expressions.register(Expr::constant(2.0)), Expr::constant(2.0));
    assert!(sub_expressions.is_empty());

    let flux = sub_expressions.register(Expr::x() * Expr::time());
    let other = sub_expressions.register(Expr::time());
    assert_eq!(sub_expressions.len(), 2);
    sub_expressions.set_time(2.0);
    assert_eq!(flux.eval_at(3.0, 0.0), 6.0);
    assert_eq!(other.eval_at(3.0, 0.0), 2.0);
    assert_eq!(sub_expressions.get(0), Some(&flux));
}

#[test]
fn display_is_readable() {
    let expr = (Expr::x() + Expr::time()) * Expr::test(0);
    assert_eq!(format!("{}", expr), "(x + t) * v[0]");
}

proptest! {
    #[test]
    fn grad_agrees_with_finite_differences(x in 0.1..3.0f64, a in -2.0..2.0f64, n in 1..4i32) {
        let e = Expr::x();
        let expr = (a * &e).exp() * e.clone().powi(n) / (1.0 + e.clone().powi(2)).sqrt() + (&e * a).cos();
        let h = 1e-6;
        let fd = (expr.eval_at(x + h, 0.0) - expr.eval_at(x - h, 0.0)) / (2.0 * h);
        let exact = expr.grad().eval_at(x, 0.0);
        prop_assert!((fd - exact).abs() <= 1e-5 * (1.0 + exact.abs()));
    }
}
