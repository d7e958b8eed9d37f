use crate::unit_interval_function;
use hytra::assembly::{evaluate_on_surface, integrate, measure_points, CompiledForm, FormError};
use hytra::expr::Expr;
use hytra::form::{Form, Measure};
use hytra::mesh::procedural::create_uniform_interval_mesh;
use hytra::mesh::{LEFT_SURFACE, RIGHT_SURFACE};
use hytra::optimize::calculus::approximate_jacobian;
use hytra::problem::{DirichletBc, NonlinearProblem};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DVector;

#[test]
fn integrate_over_measures() {
    let mut mesh = create_uniform_interval_mesh(0.0, 1.0, 4).unwrap();
    mesh.mark_volumes(|x| if x < 0.5 { 1 } else { 2 });
    let x = Expr::x();

    assert_scalar_eq!(integrate(&x.clone().powi(2), &mesh, Measure::Domain, 0.0), 1.0 / 3.0, comp = abs, tol = 1e-14);
    let on_volume = integrate(&x.clone().powi(2), &mesh, Measure::Volume(2), 0.0);
    assert_scalar_eq!(on_volume, 7.0 / 24.0, comp = abs, tol = 1e-14);
    assert_eq!(integrate(&x, &mesh, Measure::Volume(3), 0.0), 0.0);
    let on_surface = integrate(&(&x + Expr::time()), &mesh, Measure::Surface(RIGHT_SURFACE), 2.0);
    assert_scalar_eq!(on_surface, 3.0, comp = abs, tol = 1e-14);

    assert_eq!(measure_points(&mesh, Measure::Volume(1), 3).len(), 6);
    assert_eq!(measure_points(&mesh, Measure::Surface(LEFT_SURFACE), 3), vec![(0, -1.0, 1.0)]);
    assert_eq!(evaluate_on_surface(&(2.0 * &x), &mesh, RIGHT_SURFACE, 0.0), vec![(4, 2.0)]);
}

#[test]
fn residual_of_laplacian() {
    let u = unit_interval_function(4, 1, "u");
    u.interpolate_component(0, &(Expr::x() + 2.0), 0.0);
    let c = Expr::coefficient(&u, 0);

    let mut form = Form::new();
    form += (c.grad() * Expr::test_grad(0)) * Measure::Domain;
    form += (&c * Expr::test(0)) * Measure::Surface(LEFT_SURFACE);
    let compiled = CompiledForm::compile(&form, &u).unwrap();
    let residual = compiled.assemble_residual(0.0);

    let expected = DVector::from_vec(vec![-1.0 + 2.0, 0.0, 0.0, 0.0, 1.0]);
    assert_matrix_eq!(residual, expected, comp = abs, tol = 1e-13);
}

#[test]
fn compile_rejects_malformed_forms() {
    let u = unit_interval_function(2, 1, "u");
    let c = Expr::coefficient(&u, 0);

    let form = Form::from(c.clone() * Measure::Domain);
    assert_eq!(
        CompiledForm::compile(&form, &u).unwrap_err(),
        FormError::MissingTest { integral: 0 }
    );

    let mut form = Form::from((&c * Expr::test(0)) * Measure::Domain);
    form += (&c * Expr::test(1)) * Measure::Domain;
    assert_eq!(
        CompiledForm::compile(&form, &u).unwrap_err(),
        FormError::TestComponentOutOfRange {
            component: 1,
            num_components: 1
        }
    );

    let form = Form::from((Expr::test(0) * Expr::test(0)) * Measure::Domain);
    assert_eq!(
        CompiledForm::compile(&form, &u).unwrap_err(),
        FormError::NonlinearInTest { integral: 0 }
    );
}

#[test]
fn jacobian_matches_finite_differences() {
    let u = unit_interval_function(5, 2, "u");
    u.interpolate(&[1.0 + Expr::x().powi(2), 0.5 * Expr::x().sin() + 0.2], 0.0);
    let u_0 = Expr::coefficient(&u, 0);
    let u_1 = Expr::coefficient(&u, 1);

    let mut form = Form::new();
    form += ((1.0 + u_0.clone().powi(2)) * u_0.grad() * Expr::test_grad(0)) * Measure::Domain;
    form += (-(&u_0 * &u_1 * (1.0 - &u_1)) * Expr::test(1)) * Measure::Domain;
    form += (u_1.grad() * Expr::test_grad(1) + Expr::x() * u_1.clone().exp() * Expr::test(0)) * Measure::Domain;
    form += (u_0.clone().powi(2) * Expr::test(0)) * Measure::Surface(LEFT_SURFACE);
    let bcs = [DirichletBc::new(1, RIGHT_SURFACE, Expr::constant(0.3))];

    let mut problem = NonlinearProblem::new(&form, &u, &bcs).unwrap();
    assert_eq!(problem.constrained_dofs().collect::<Vec<_>>(), vec![11]);

    let x = u.clone_dofs();
    let jacobian = problem.jacobian(&x).to_dense();
    let approx = approximate_jacobian(&mut problem, &x, &1e-6);
    assert_matrix_eq!(jacobian, approx, comp = abs, tol = 1e-6);
}
