use crate::unit_interval_function;
use hytra::expr::Expr;
use matrixcompare::assert_scalar_eq;

#[test]
fn dofs_are_interleaved_by_node() {
    let u = unit_interval_function(4, 3, "u");
    let space = u.space();
    assert_eq!(space.num_nodes(), 5);
    assert_eq!(space.num_dofs(), 15);
    assert_eq!(space.dof(2, 1), 7);
    assert_eq!(space.cell_dof_offset(3), 9);
    assert_eq!(space.bandwidth(), 5);
}

#[test]
fn interpolation_is_exact_for_linear_functions() {
    let u = unit_interval_function(4, 2, "u");
    u.interpolate(&[2.0 * Expr::x() + 1.0, Expr::time() - Expr::x()], 3.0);
    assert_eq!(u.component_values(0), vec![1.0, 1.5, 2.0, 2.5, 3.0]);
    assert_eq!(u.component_values(1), vec![3.0, 2.75, 2.5, 2.25, 2.0]);

    for x in [0.0, 0.1, 0.33, 0.5, 0.9, 1.0] {
        assert_scalar_eq!(u.evaluate_at(x, 0).unwrap(), 2.0 * x + 1.0, comp = abs, tol = 1e-14);
        assert_scalar_eq!(u.evaluate_at(x, 1).unwrap(), 3.0 - x, comp = abs, tol = 1e-14);
    }
    assert_eq!(u.evaluate_at(1.1, 0), None);
    assert_scalar_eq!(u.gradient_in_cell(2, 0), 2.0, comp = abs, tol = 1e-13);
    assert_scalar_eq!(u.gradient_in_cell(2, 1), -1.0, comp = abs, tol = 1e-13);
}

#[test]
fn clones_share_values_and_assign_copies() {
    let u = unit_interval_function(3, 1, "u");
    let alias = u.clone();
    u.interpolate_component(0, &Expr::constant(4.0), 0.0);
    assert!(alias.ptr_eq(&u));
    assert_eq!(alias.component_values(0), vec![4.0; 4]);

    let v = hytra::space::Function::new(u.space().clone(), "v");
    assert!(!v.ptr_eq(&u));
    v.assign(&u);
    u.interpolate_component(0, &Expr::constant(1.0), 0.0);
    assert_eq!(v.component_values(0), vec![4.0; 4]);
}

#[test]
fn assign_component_copies_between_spaces() {
    let u = unit_interval_function(3, 3, "u");
    let n = hytra::space::Function::new(hytra::space::FunctionSpace::scalar(u.space().mesh().clone()), "n");
    n.interpolate_component(0, &Expr::x(), 0.0);
    u.assign_component(2, &n, 0);
    assert_eq!(u.component_values(2), n.component_values(0));
    assert_eq!(u.component_values(0), vec![0.0; 4]);
}
