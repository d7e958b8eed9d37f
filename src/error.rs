//! Functionality for error estimation against exact solutions.
use crate::expr::{EvaluationPoint, Expr};
use crate::quadrature::gauss;
use crate::space::Function;
use itertools::izip;

/// Maximum absolute difference between a component of `u_h` and `u` over the mesh vertices.
pub fn max_vertex_error(u_h: &Function, component: usize, u: &Expr, t: f64) -> f64 {
    let mesh = u_h.space().mesh();
    let values = u_h.component_values(component);
    izip!(mesh.vertices(), values)
        .map(|(x, value)| (value - u.eval_at(*x, t)).abs())
        .fold(0.0, f64::max)
}

/// Estimate the $L^2$ error $\norm{u_h - u}_{L^2}$ of one component of `u_h`.
#[allow(non_snake_case)]
pub fn estimate_L2_error(u_h: &Function, component: usize, u: &Expr, t: f64, quadrature_points: usize) -> f64 {
    let space = u_h.space();
    let (weights, points) = gauss(quadrature_points);

    let mut result = 0.0;
    for cell in 0..space.mesh().num_cells() {
        let element = space.element(cell);
        let j = element.reference_jacobian().abs();
        for (w, xi) in izip!(&weights, &points) {
            let x = element.map_reference_coords(*xi);
            let u_h_at_x = u_h.evaluate_in_cell(cell, *xi, component);
            let u_at_x = u.eval(&EvaluationPoint { cell, xi: *xi, x, t });
            result += w * (u_h_at_x - u_at_x).powi(2) * j;
        }
    }
    result.sqrt()
}
