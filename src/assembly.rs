//! Assembly of residual vectors, banded Jacobians and scalar functionals.
//!
//! A [`Form`] residual is linear in the test function, so every integrand can be written as
//!
//! ```text
//! I = sum_k A_k v_k + B_k v_k'
//! ```
//!
//! The coefficients `A_k` and `B_k` are extracted symbolically at compile time, together
//! with their partial derivatives with respect to the values and gradients of the unknown.
//! Assembly then only evaluates these expressions at quadrature points.
use crate::expr::{EvaluationPoint, Expr, Variable};
use crate::form::{Form, Measure};
use crate::mesh::IntervalMesh;
use crate::quadrature::gauss;
use crate::space::Function;
use hytra_sparse::BandMatrix;
use nalgebra::DVector;
use rayon::prelude::*;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Default number of Gauss points per cell.
pub const DEFAULT_QUADRATURE_POINTS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum FormError {
    /// An integrand references a test component that the unknown does not have.
    TestComponentOutOfRange { component: usize, num_components: usize },
    /// The coefficient of a test placeholder still contains test placeholders.
    NonlinearInTest { integral: usize },
    /// A non-zero integrand does not contain the test function at all.
    MissingTest { integral: usize },
}

impl Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::TestComponentOutOfRange {
                component,
                num_components,
            } => write!(
                f,
                "Test component {} is out of range for an unknown with {} components.",
                component, num_components
            ),
            FormError::NonlinearInTest { integral } => {
                write!(f, "Integral {} is not linear in the test function.", integral)
            }
            FormError::MissingTest { integral } => {
                write!(f, "Integral {} does not contain the test function.", integral)
            }
        }
    }
}

impl Error for FormError {}

#[derive(Debug, Clone)]
struct TrialCoefficients {
    component: usize,
    value_value: Expr,
    value_gradient: Expr,
    gradient_value: Expr,
    gradient_gradient: Expr,
}

#[derive(Debug, Clone)]
struct TestCoefficients {
    component: usize,
    value: Expr,
    gradient: Expr,
    trials: Vec<TrialCoefficients>,
}

#[derive(Debug, Clone, Copy)]
struct QuadraturePoint {
    integral: usize,
    xi: f64,
    weight: f64,
}

/// Quadrature points of `measure`, as `(cell, xi, weight)` with physical weights.
pub fn measure_points(mesh: &IntervalMesh, measure: Measure, num_points: usize) -> Vec<(usize, f64, f64)> {
    let mut points = Vec::new();
    match measure {
        Measure::Domain | Measure::Volume(_) => {
            let (weights, xis) = gauss(num_points);
            for cell in 0..mesh.num_cells() {
                let included = match measure {
                    Measure::Volume(id) => mesh.volume_marker(cell) == id,
                    _ => true,
                };
                if included {
                    let jacobian = 0.5 * mesh.cell_size(cell);
                    for (w, xi) in weights.iter().zip(&xis) {
                        points.push((cell, *xi, w * jacobian));
                    }
                }
            }
        }
        Measure::Surface(id) => {
            for vertex in 0..mesh.num_vertices() {
                if mesh.surface_marker(vertex) == id {
                    let (cell, xi) = mesh.vertex_cell(vertex);
                    points.push((cell, xi, 1.0));
                }
            }
        }
    }
    points
}

/// A residual form prepared for repeated assembly with respect to an unknown function.
#[derive(Debug, Clone)]
pub struct CompiledForm {
    unknown: Function,
    integrals: Vec<Vec<TestCoefficients>>,
    cell_points: Vec<Vec<QuadraturePoint>>,
}

impl CompiledForm {
    pub fn compile(form: &Form, unknown: &Function) -> Result<Self, FormError> {
        Self::compile_with_quadrature(form, unknown, DEFAULT_QUADRATURE_POINTS)
    }

    pub fn compile_with_quadrature(
        form: &Form,
        unknown: &Function,
        quadrature_points: usize,
    ) -> Result<Self, FormError> {
        let num_components = unknown.num_components();
        let mesh = unknown.space().mesh();
        let mut integrals = Vec::with_capacity(form.len());
        let mut cell_points = vec![Vec::new(); mesh.num_cells()];

        for (index, integral) in form.iter().enumerate() {
            let integrand = &integral.integrand;
            if let Some(component) = max_test_component(integrand) {
                if component >= num_components {
                    return Err(FormError::TestComponentOutOfRange {
                        component,
                        num_components,
                    });
                }
            }
            if !integrand.is_zero() && !integrand.contains_test() {
                return Err(FormError::MissingTest { integral: index });
            }

            let mut tests = Vec::new();
            for k in 0..num_components {
                let value = integrand.diff(&Variable::Test(k));
                let gradient = integrand.diff(&Variable::TestGradient(k));
                if value.contains_test() || gradient.contains_test() {
                    return Err(FormError::NonlinearInTest { integral: index });
                }
                if value.is_zero() && gradient.is_zero() {
                    continue;
                }

                let trials = (0..num_components)
                    .map(|j| {
                        let u = Variable::Value(unknown.clone(), j);
                        let du = Variable::Gradient(unknown.clone(), j);
                        TrialCoefficients {
                            component: j,
                            value_value: value.diff(&u),
                            value_gradient: value.diff(&du),
                            gradient_value: gradient.diff(&u),
                            gradient_gradient: gradient.diff(&du),
                        }
                    })
                    .filter(|trial| {
                        !(trial.value_value.is_zero()
                            && trial.value_gradient.is_zero()
                            && trial.gradient_value.is_zero()
                            && trial.gradient_gradient.is_zero())
                    })
                    .collect();

                tests.push(TestCoefficients {
                    component: k,
                    value,
                    gradient,
                    trials,
                });
            }

            for (cell, xi, weight) in measure_points(mesh, integral.measure, quadrature_points) {
                cell_points[cell].push(QuadraturePoint {
                    integral: index,
                    xi,
                    weight,
                });
            }
            integrals.push(tests);
        }

        Ok(Self {
            unknown: unknown.clone(),
            integrals,
            cell_points,
        })
    }

    pub fn unknown(&self) -> &Function {
        &self.unknown
    }

    pub fn num_dofs(&self) -> usize {
        self.unknown.space().num_dofs()
    }

    fn local_residual(&self, cell: usize, t: f64) -> Vec<f64> {
        let nc = self.unknown.num_components();
        let element = self.unknown.space().element(cell);
        let dphi = element.gradients();
        let mut local = vec![0.0; 2 * nc];

        for qp in &self.cell_points[cell] {
            let phi = element.evaluate_basis(qp.xi);
            let point = EvaluationPoint {
                cell,
                xi: qp.xi,
                x: element.map_reference_coords(qp.xi),
                t,
            };
            for test in &self.integrals[qp.integral] {
                let a = test.value.eval(&point);
                let b = test.gradient.eval(&point);
                for node in 0..2 {
                    local[node * nc + test.component] += qp.weight * (a * phi[node] + b * dphi[node]);
                }
            }
        }
        local
    }

    fn local_jacobian(&self, cell: usize, t: f64) -> Vec<f64> {
        let nc = self.unknown.num_components();
        let n = 2 * nc;
        let element = self.unknown.space().element(cell);
        let dphi = element.gradients();
        let mut local = vec![0.0; n * n];

        for qp in &self.cell_points[cell] {
            let phi = element.evaluate_basis(qp.xi);
            let point = EvaluationPoint {
                cell,
                xi: qp.xi,
                x: element.map_reference_coords(qp.xi),
                t,
            };
            for test in &self.integrals[qp.integral] {
                for trial in &test.trials {
                    let vv = trial.value_value.eval(&point);
                    let vg = trial.value_gradient.eval(&point);
                    let gv = trial.gradient_value.eval(&point);
                    let gg = trial.gradient_gradient.eval(&point);
                    for a in 0..2 {
                        for b in 0..2 {
                            let row = a * nc + test.component;
                            let col = b * nc + trial.component;
                            local[row * n + col] += qp.weight
                                * (vv * phi[a] * phi[b]
                                    + vg * phi[a] * dphi[b]
                                    + gv * dphi[a] * phi[b]
                                    + gg * dphi[a] * dphi[b]);
                        }
                    }
                }
            }
        }
        local
    }

    /// Assembles the residual using the current values of the unknown.
    pub fn assemble_residual_into(&self, residual: &mut DVector<f64>, t: f64) {
        assert_eq!(residual.len(), self.num_dofs());
        let space = self.unknown.space();
        let locals: Vec<Vec<f64>> = (0..space.mesh().num_cells())
            .into_par_iter()
            .map(|cell| self.local_residual(cell, t))
            .collect();

        residual.fill(0.0);
        for (cell, local) in locals.into_iter().enumerate() {
            let offset = space.cell_dof_offset(cell);
            for (i, value) in local.into_iter().enumerate() {
                residual[offset + i] += value;
            }
        }
    }

    pub fn assemble_residual(&self, t: f64) -> DVector<f64> {
        let mut residual = DVector::zeros(self.num_dofs());
        self.assemble_residual_into(&mut residual, t);
        residual
    }

    /// Assembles the Jacobian of the residual with respect to the dofs of the unknown.
    pub fn assemble_jacobian(&self, t: f64) -> BandMatrix<f64> {
        let space = self.unknown.space();
        let n = 2 * space.num_components();
        let locals: Vec<Vec<f64>> = (0..space.mesh().num_cells())
            .into_par_iter()
            .map(|cell| self.local_jacobian(cell, t))
            .collect();

        let bandwidth = space.bandwidth();
        let mut jacobian = BandMatrix::zeros(self.num_dofs(), bandwidth, bandwidth);
        for (cell, local) in locals.into_iter().enumerate() {
            let offset = space.cell_dof_offset(cell);
            for row in 0..n {
                for col in 0..n {
                    let value = local[row * n + col];
                    if value != 0.0 {
                        jacobian.add_to(offset + row, offset + col, value);
                    }
                }
            }
        }
        jacobian
    }
}

fn max_test_component(expr: &Expr) -> Option<usize> {
    let mut max = None;
    let mut stack = vec![expr];
    while let Some(e) = stack.pop() {
        match e {
            Expr::Test(k) | Expr::TestGrad(k) => max = max.max(Some(*k)),
            _ => {}
        }
        stack.extend(e.children().into_iter().map(|child| child.as_ref()));
    }
    max
}

/// Integrates a scalar expression over a measure of the mesh.
///
/// Surface measures sum the expression over the marked vertices.
pub fn integrate(expr: &Expr, mesh: &IntervalMesh, measure: Measure, t: f64) -> f64 {
    measure_points(mesh, measure, DEFAULT_QUADRATURE_POINTS)
        .into_iter()
        .map(|(cell, xi, weight)| {
            let [a, b] = mesh.cell_bounds(cell);
            let x = 0.5 * (a + b) + 0.5 * (b - a) * xi;
            weight * expr.eval(&EvaluationPoint { cell, xi, x, t })
        })
        .sum()
}

/// Evaluates an expression at every vertex carrying the given surface marker.
///
/// Returns `(vertex, value)` pairs.
pub fn evaluate_on_surface(expr: &Expr, mesh: &IntervalMesh, surface: usize, t: f64) -> Vec<(usize, f64)> {
    (0..mesh.num_vertices())
        .filter(|vertex| mesh.surface_marker(*vertex) == surface)
        .map(|vertex| {
            let (cell, xi) = mesh.vertex_cell(vertex);
            let x = mesh.vertices()[vertex];
            (vertex, expr.eval(&EvaluationPoint { cell, xi, x, t }))
        })
        .collect()
}
