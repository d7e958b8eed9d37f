//! One-dimensional interval meshes with volume and surface markers.
use ordered_float::NotNan;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

pub mod procedural;

/// Surface marker of the left boundary vertex.
pub const LEFT_SURFACE: usize = 1;
/// Surface marker of the right boundary vertex.
pub const RIGHT_SURFACE: usize = 2;
/// Volume marker assigned to cells that have not been marked explicitly.
pub const DEFAULT_VOLUME: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    TooFewVertices(usize),
    NonFiniteVertex(usize),
    DuplicateVertex(f64),
    InvalidParameter(String),
}

impl Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::TooFewVertices(n) => write!(f, "A mesh needs at least two vertices, got {}.", n),
            MeshError::NonFiniteVertex(i) => write!(f, "Vertex {} is not finite.", i),
            MeshError::DuplicateVertex(x) => write!(f, "Vertex at x = {} appears more than once.", x),
            MeshError::InvalidParameter(msg) => write!(f, "Invalid mesh parameter: {}", msg),
        }
    }
}

impl Error for MeshError {}

/// A mesh of the interval `[x_0, x_N]` made of the cells `[x_i, x_{i+1}]`.
///
/// Every cell carries a volume marker and every vertex a surface marker, where `0` means
/// unmarked. By default the left and right boundary vertices are marked with
/// [`LEFT_SURFACE`] and [`RIGHT_SURFACE`] and all cells with [`DEFAULT_VOLUME`].
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalMesh {
    vertices: Vec<f64>,
    volume_markers: Vec<usize>,
    surface_markers: Vec<usize>,
}

impl IntervalMesh {
    /// Builds a mesh from vertex positions given in any order.
    pub fn from_vertices(vertices: Vec<f64>) -> Result<Self, MeshError> {
        if vertices.len() < 2 {
            return Err(MeshError::TooFewVertices(vertices.len()));
        }

        let mut sorted = Vec::with_capacity(vertices.len());
        for (i, x) in vertices.into_iter().enumerate() {
            if !x.is_finite() {
                return Err(MeshError::NonFiniteVertex(i));
            }
            sorted.push(NotNan::new(x).map_err(|_| MeshError::NonFiniteVertex(i))?);
        }
        sorted.sort_unstable();

        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(MeshError::DuplicateVertex(pair[0].into_inner()));
        }

        let vertices: Vec<f64> = sorted.into_iter().map(NotNan::into_inner).collect();
        let num_cells = vertices.len() - 1;
        let mut surface_markers = vec![0; vertices.len()];
        surface_markers[0] = LEFT_SURFACE;
        surface_markers[num_cells] = RIGHT_SURFACE;

        Ok(Self {
            vertices,
            volume_markers: vec![DEFAULT_VOLUME; num_cells],
            surface_markers,
        })
    }

    pub fn vertices(&self) -> &[f64] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.vertices.len() - 1
    }

    pub fn cell_vertices(&self, cell: usize) -> [usize; 2] {
        [cell, cell + 1]
    }

    pub fn cell_bounds(&self, cell: usize) -> [f64; 2] {
        [self.vertices[cell], self.vertices[cell + 1]]
    }

    pub fn cell_size(&self, cell: usize) -> f64 {
        self.vertices[cell + 1] - self.vertices[cell]
    }

    pub fn cell_midpoint(&self, cell: usize) -> f64 {
        0.5 * (self.vertices[cell] + self.vertices[cell + 1])
    }

    pub fn min_cell_size(&self) -> f64 {
        (0..self.num_cells())
            .map(|cell| self.cell_size(cell))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn start(&self) -> f64 {
        self.vertices[0]
    }

    pub fn end(&self) -> f64 {
        self.vertices[self.num_cells()]
    }

    pub fn volume_marker(&self, cell: usize) -> usize {
        self.volume_markers[cell]
    }

    pub fn volume_markers(&self) -> &[usize] {
        &self.volume_markers
    }

    pub fn surface_marker(&self, vertex: usize) -> usize {
        self.surface_markers[vertex]
    }

    pub fn surface_markers(&self) -> &[usize] {
        &self.surface_markers
    }

    /// Marks every cell with the id returned for its midpoint.
    pub fn mark_volumes(&mut self, mut marker: impl FnMut(f64) -> usize) {
        for cell in 0..self.num_cells() {
            self.volume_markers[cell] = marker(self.cell_midpoint(cell));
        }
    }

    /// Marks cells whose midpoint lies in one of the given `[start, end]` intervals.
    ///
    /// Cells outside every interval keep their marker.
    pub fn mark_volumes_from_borders(&mut self, borders: &[([f64; 2], usize)]) {
        for cell in 0..self.num_cells() {
            let midpoint = self.cell_midpoint(cell);
            if let Some((_, id)) = borders
                .iter()
                .find(|([start, end], _)| *start <= midpoint && midpoint <= *end)
            {
                self.volume_markers[cell] = *id;
            }
        }
    }

    pub fn mark_surface(&mut self, vertex: usize, id: usize) {
        self.surface_markers[vertex] = id;
    }

    /// Returns the cell containing `x`, preferring the left cell at interior vertices.
    pub fn find_cell(&self, x: f64) -> Option<usize> {
        if !(self.start() <= x && x <= self.end()) {
            return None;
        }
        let idx = self.vertices.partition_point(|v| *v < x);
        Some(idx.saturating_sub(1).min(self.num_cells() - 1))
    }

    /// Maps `x` inside `cell` to the reference coordinate in `[-1, 1]`.
    pub fn reference_coordinate(&self, cell: usize, x: f64) -> f64 {
        let [a, b] = self.cell_bounds(cell);
        (2.0 * x - a - b) / (b - a)
    }

    /// Returns the cell adjacent to a vertex together with the reference coordinate of the
    /// vertex in that cell.
    pub fn vertex_cell(&self, vertex: usize) -> (usize, f64) {
        if vertex == 0 {
            (0, -1.0)
        } else {
            (vertex - 1, 1.0)
        }
    }

    /// Outward normal at a boundary vertex, `-1` on the left and `1` elsewhere.
    pub fn outward_normal(&self, vertex: usize) -> f64 {
        if vertex == 0 {
            -1.0
        } else {
            1.0
        }
    }
}
