use crate::unit_interval_function;
use hytra::error::{estimate_L2_error, max_vertex_error};
use hytra::expr::Expr;
use hytra::form::{Form, Measure};
use hytra::mesh::{LEFT_SURFACE, RIGHT_SURFACE};
use hytra::optimize::newton::{NewtonError, NewtonSettings};
use hytra::problem::{DirichletBc, NonlinearProblem};
use matrixcompare::assert_scalar_eq;

fn settings() -> NewtonSettings<f64> {
    NewtonSettings {
        max_iterations: Some(20),
        absolute_tolerance: 1e-12,
        relative_tolerance: 1e-12,
    }
}

#[test]
fn poisson_problem_is_nodally_exact() {
    // -u'' = 2 with u(0) = 1, u(1) = 2 has the solution u = 1 + 2x - x^2
    let u = unit_interval_function(8, 1, "u");
    let c = Expr::coefficient(&u, 0);
    let form = Form::from((c.grad() * Expr::test_grad(0) - 2.0 * Expr::test(0)) * Measure::Domain);
    let bcs = [
        DirichletBc::new(0, LEFT_SURFACE, Expr::constant(1.0)),
        DirichletBc::new(0, RIGHT_SURFACE, Expr::constant(2.0)),
    ];
    let mut problem = NonlinearProblem::new(&form, &u, &bcs).unwrap();
    let iterations = problem.solve(settings(), false).unwrap();
    assert!(iterations <= 2);

    let exact = 1.0 + 2.0 * Expr::x() - Expr::x().powi(2);
    assert!(max_vertex_error(&u, 0, &exact, 0.0) < 1e-12);
    let l2_error = estimate_L2_error(&u, 0, &exact, 0.0, 4);
    assert!(l2_error > 0.0 && l2_error < 1e-2);
}

#[test]
fn nonlinear_problem_converges_with_line_search() {
    // -(u^2 u')' = 0 with u(0) = 1, u(1) = 2 has the solution u^3 = 1 + 7x
    let u = unit_interval_function(16, 1, "u");
    u.interpolate_component(0, &Expr::constant(1.0), 0.0);
    let c = Expr::coefficient(&u, 0);
    let form = Form::from((c.clone().powi(2) * c.grad() * Expr::test_grad(0)) * Measure::Domain);
    let bcs = [
        DirichletBc::new(0, LEFT_SURFACE, Expr::constant(1.0)),
        DirichletBc::new(0, RIGHT_SURFACE, Expr::constant(2.0)),
    ];
    let mut problem = NonlinearProblem::new(&form, &u, &bcs).unwrap();
    problem.solve(settings(), true).unwrap();

    let values = u.component_values(0);
    for (x, value) in u.space().mesh().vertices().iter().zip(values) {
        assert_scalar_eq!(value.powi(3), 1.0 + 7.0 * x, comp = abs, tol = 1e-10);
    }
}

#[test]
fn time_dependent_dirichlet_values_follow_global_time() {
    let u = unit_interval_function(4, 1, "u");
    let c = Expr::coefficient(&u, 0);
    let form = Form::from((c.grad() * Expr::test_grad(0)) * Measure::Domain);
    let bcs = [
        DirichletBc::new(0, LEFT_SURFACE, Expr::time()),
        DirichletBc::new(0, RIGHT_SURFACE, Expr::constant(0.0)),
    ];
    let mut problem = NonlinearProblem::new(&form, &u, &bcs).unwrap();
    problem.set_time(4.0);
    problem.solve(settings(), false).unwrap();
    for (value, expected) in u.component_values(0).into_iter().zip([4.0, 3.0, 2.0, 1.0, 0.0]) {
        assert_scalar_eq!(value, expected, comp = abs, tol = 1e-12);
    }
}

#[test]
fn failed_solve_restores_initial_guess() {
    let u = unit_interval_function(4, 1, "u");
    u.interpolate_component(0, &Expr::constant(1.0), 0.0);
    let c = Expr::coefficient(&u, 0);
    let form = Form::from((c.clone().exp() * c.grad() * Expr::test_grad(0) - 10.0 * Expr::test(0)) * Measure::Domain);
    let bcs = [DirichletBc::new(0, LEFT_SURFACE, Expr::constant(0.0))];
    let mut problem = NonlinearProblem::new(&form, &u, &bcs).unwrap();

    let no_iterations = NewtonSettings {
        max_iterations: Some(0),
        ..settings()
    };
    let result = problem.solve(no_iterations, false);
    assert!(matches!(result, Err(NewtonError::MaximumIterationsReached(0))));
    assert_eq!(u.component_values(0), vec![1.0; 5]);
}
