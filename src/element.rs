//! Linear Lagrange element on a segment.

/// A segment `[a, b]` in one dimension with linear Lagrange basis functions.
///
/// The reference domain is `[-1, 1]`, with node 0 at `xi = -1` and node 1 at `xi = 1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Segment2Element {
    vertices: [f64; 2],
}

impl Segment2Element {
    pub fn from_vertices(vertices: [f64; 2]) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[f64; 2] {
        &self.vertices
    }

    pub fn evaluate_basis(&self, xi: f64) -> [f64; 2] {
        segment2_basis(xi)
    }

    /// Gradients of the basis functions with respect to the reference coordinate.
    pub fn reference_gradients(&self) -> [f64; 2] {
        segment2_gradients()
    }

    /// Gradients of the basis functions with respect to the physical coordinate.
    pub fn gradients(&self) -> [f64; 2] {
        let j = self.reference_jacobian();
        let [g0, g1] = segment2_gradients();
        [g0 / j, g1 / j]
    }

    pub fn reference_jacobian(&self) -> f64 {
        let [a, b] = self.vertices;
        (b - a) / 2.0
    }

    pub fn map_reference_coords(&self, xi: f64) -> f64 {
        let [a, b] = self.vertices;
        let [phi_1, phi_2] = segment2_basis(xi);
        a * phi_1 + b * phi_2
    }

    pub fn diameter(&self) -> f64 {
        (self.vertices[1] - self.vertices[0]).abs()
    }
}

fn segment2_basis(xi: f64) -> [f64; 2] {
    let phi_1 = (1.0 - xi) / 2.0;
    let phi_2 = (1.0 + xi) / 2.0;
    [phi_1, phi_2]
}

fn segment2_gradients() -> [f64; 2] {
    [-0.5, 0.5]
}
