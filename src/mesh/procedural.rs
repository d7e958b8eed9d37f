//! Basic procedural mesh generation routines.
use crate::mesh::{IntervalMesh, MeshError};
use serde::{Deserialize, Serialize};

/// Creates a mesh of `[start, end]` with `num_cells` cells of equal size.
pub fn create_uniform_interval_mesh(start: f64, end: f64, num_cells: usize) -> Result<IntervalMesh, MeshError> {
    if num_cells == 0 {
        return Err(MeshError::InvalidParameter("number of cells must be positive".to_string()));
    }
    if !(start < end) {
        return Err(MeshError::InvalidParameter(format!(
            "interval start ({}) must be less than end ({})",
            start, end
        )));
    }
    let h = (end - start) / num_cells as f64;
    let vertices = (0..=num_cells)
        .map(|i| if i == num_cells { end } else { start + i as f64 * h })
        .collect();
    IntervalMesh::from_vertices(vertices)
}

/// A local refinement: cells whose midpoint lies below `x` are bisected `cells` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub cells: usize,
    pub x: f64,
}

/// Creates a uniform mesh of `[0, size]` and applies the refinements in order.
pub fn create_refined_interval_mesh(
    initial_number_of_cells: usize,
    size: f64,
    refinements: &[Refinement],
) -> Result<IntervalMesh, MeshError> {
    let mesh = create_uniform_interval_mesh(0.0, size, initial_number_of_cells)?;
    let mut vertices = mesh.vertices().to_vec();

    for refinement in refinements {
        for _ in 0..refinement.cells {
            let mut refined = Vec::with_capacity(2 * vertices.len());
            for pair in vertices.windows(2) {
                refined.push(pair[0]);
                let midpoint = 0.5 * (pair[0] + pair[1]);
                if midpoint < refinement.x {
                    refined.push(midpoint);
                }
            }
            if let Some(last) = vertices.last() {
                refined.push(*last);
            }
            vertices = refined;
        }
    }

    IntervalMesh::from_vertices(vertices)
}

/// Serializable description of how to construct a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeshDescription {
    Uniform {
        start: f64,
        end: f64,
        cells: usize,
    },
    Vertices {
        vertices: Vec<f64>,
    },
    Refinements {
        initial_number_of_cells: usize,
        size: f64,
        refinements: Vec<Refinement>,
    },
}

impl MeshDescription {
    pub fn build(&self) -> Result<IntervalMesh, MeshError> {
        match self {
            MeshDescription::Uniform { start, end, cells } => create_uniform_interval_mesh(*start, *end, *cells),
            MeshDescription::Vertices { vertices } => IntervalMesh::from_vertices(vertices.clone()),
            MeshDescription::Refinements {
                initial_number_of_cells,
                size,
                refinements,
            } => create_refined_interval_mesh(*initial_number_of_cells, *size, refinements),
        }
    }
}
