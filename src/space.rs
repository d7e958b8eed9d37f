//! Vector-valued continuous piecewise linear function spaces and discrete functions.
//!
//! Degrees of freedom are interleaved by node: the dof of component `c` at node `n` is
//! `n * num_components + c`. The dofs of a cell are therefore contiguous, which makes the
//! global Jacobian banded.
use crate::element::Segment2Element;
use crate::expr::{EvaluationPoint, Expr};
use crate::mesh::IntervalMesh;
use nalgebra::{DVector, DVectorView};
use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FunctionSpace {
    mesh: Arc<IntervalMesh>,
    num_components: usize,
}

impl FunctionSpace {
    pub fn new(mesh: Arc<IntervalMesh>, num_components: usize) -> Self {
        assert!(num_components > 0, "A function space needs at least one component");
        Self { mesh, num_components }
    }

    pub fn scalar(mesh: Arc<IntervalMesh>) -> Self {
        Self::new(mesh, 1)
    }

    pub fn mesh(&self) -> &Arc<IntervalMesh> {
        &self.mesh
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn num_nodes(&self) -> usize {
        self.mesh.num_vertices()
    }

    pub fn num_dofs(&self) -> usize {
        self.num_nodes() * self.num_components
    }

    pub fn dof(&self, node: usize, component: usize) -> usize {
        node * self.num_components + component
    }

    /// Index of the first dof of `cell`. The cell owns `2 * num_components` consecutive dofs.
    pub fn cell_dof_offset(&self, cell: usize) -> usize {
        cell * self.num_components
    }

    pub fn element(&self, cell: usize) -> Segment2Element {
        Segment2Element::from_vertices(self.mesh.cell_bounds(cell))
    }

    /// Bandwidth of matrices coupling the dofs of this space through cells.
    pub fn bandwidth(&self) -> usize {
        2 * self.num_components - 1
    }

    pub fn same_layout(&self, other: &FunctionSpace) -> bool {
        self.num_components == other.num_components
            && (Arc::ptr_eq(&self.mesh, &other.mesh) || self.mesh == other.mesh)
    }
}

struct FunctionData {
    name: String,
    space: FunctionSpace,
    dofs: RwLock<DVector<f64>>,
}

/// A discrete function in a [`FunctionSpace`].
///
/// `Function` is a handle: clones refer to the same dofs, and expressions referencing the
/// function observe every later update of its values.
#[derive(Clone)]
pub struct Function {
    data: Arc<FunctionData>,
}

impl Function {
    pub fn new(space: FunctionSpace, name: &str) -> Self {
        let dofs = DVector::zeros(space.num_dofs());
        Self {
            data: Arc::new(FunctionData {
                name: name.to_string(),
                space,
                dofs: RwLock::new(dofs),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn space(&self) -> &FunctionSpace {
        &self.data.space
    }

    pub fn num_components(&self) -> usize {
        self.data.space.num_components()
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn dofs(&self) -> RwLockReadGuard<'_, DVector<f64>> {
        self.data.dofs.read()
    }

    pub fn clone_dofs(&self) -> DVector<f64> {
        self.data.dofs.read().clone()
    }

    pub fn set_dofs<'a>(&self, values: impl Into<DVectorView<'a, f64>>) {
        let values = values.into();
        let mut dofs = self.data.dofs.write();
        assert_eq!(dofs.len(), values.len(), "Dof vector dimension mismatch");
        dofs.copy_from(&values);
    }

    /// Copies the values of `other`, which must live in a space with the same layout.
    pub fn assign(&self, other: &Function) {
        if self.ptr_eq(other) {
            return;
        }
        assert!(
            self.space().same_layout(other.space()),
            "Cannot assign {} to {}: incompatible function spaces",
            other.name(),
            self.name()
        );
        let values = other.clone_dofs();
        self.set_dofs(&values);
    }

    /// Copies one component of `other` into one component of `self`.
    pub fn assign_component(&self, component: usize, other: &Function, other_component: usize) {
        let values = other.component_values(other_component);
        assert_eq!(values.len(), self.space().num_nodes());
        let stride = self.num_components();
        let mut dofs = self.data.dofs.write();
        for (node, value) in values.into_iter().enumerate() {
            dofs[node * stride + component] = value;
        }
    }

    /// Nodal values of a single component.
    pub fn component_values(&self, component: usize) -> Vec<f64> {
        let stride = self.num_components();
        let dofs = self.data.dofs.read();
        dofs.iter().skip(component).step_by(stride).copied().collect()
    }

    /// Sets the nodal values of `component` to the values of `expr` at time `t`.
    pub fn interpolate_component(&self, component: usize, expr: &Expr, t: f64) {
        let mesh = self.space().mesh().clone();
        // Evaluate before locking, the expression may reference this function
        let values: Vec<f64> = (0..mesh.num_vertices())
            .map(|vertex| {
                let (cell, xi) = mesh.vertex_cell(vertex);
                expr.eval(&EvaluationPoint {
                    cell,
                    xi,
                    x: mesh.vertices()[vertex],
                    t,
                })
            })
            .collect();
        self.set_component_values(component, &values);
    }

    /// Sets the nodal values of `component`, one value per mesh vertex.
    pub fn set_component_values(&self, component: usize, values: &[f64]) {
        assert_eq!(values.len(), self.space().mesh().num_vertices(), "Need one value per vertex");
        let stride = self.num_components();
        let mut dofs = self.data.dofs.write();
        for (node, value) in values.iter().enumerate() {
            dofs[node * stride + component] = *value;
        }
    }

    /// Interpolates one expression per component.
    pub fn interpolate(&self, exprs: &[Expr], t: f64) {
        assert_eq!(exprs.len(), self.num_components(), "Need one expression per component");
        for (component, expr) in exprs.iter().enumerate() {
            self.interpolate_component(component, expr, t);
        }
    }

    pub fn evaluate_in_cell(&self, cell: usize, xi: f64, component: usize) -> f64 {
        let offset = self.space().cell_dof_offset(cell);
        let stride = self.num_components();
        let [phi_1, phi_2] = self.space().element(cell).evaluate_basis(xi);
        let dofs = self.data.dofs.read();
        phi_1 * dofs[offset + component] + phi_2 * dofs[offset + stride + component]
    }

    pub fn gradient_in_cell(&self, cell: usize, component: usize) -> f64 {
        let offset = self.space().cell_dof_offset(cell);
        let stride = self.num_components();
        let [g1, g2] = self.space().element(cell).gradients();
        let dofs = self.data.dofs.read();
        g1 * dofs[offset + component] + g2 * dofs[offset + stride + component]
    }

    /// Evaluates a component at an arbitrary point, or `None` outside the mesh.
    pub fn evaluate_at(&self, x: f64, component: usize) -> Option<f64> {
        let mesh = self.space().mesh();
        let cell = mesh.find_cell(x)?;
        let xi = mesh.reference_coordinate(cell, x);
        Some(self.evaluate_in_cell(cell, xi, component))
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Function({}, {} components, {} dofs)",
            self.name(),
            self.num_components(),
            self.space().num_dofs()
        )
    }
}
