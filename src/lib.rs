pub mod assembly;
pub mod boundary_conditions;
pub mod element;
pub mod error;
pub mod exports;
pub mod expr;
pub mod form;
pub mod formulation;
pub mod heat_transfer;
pub mod io;
pub mod materials;
pub mod mesh;
pub mod problem;
pub mod quadrature;
pub mod settings;
pub mod simulation;
pub mod sources;
pub mod space;
pub mod stepsize;
pub mod traps;

pub mod optimize {
    pub use hytra_optimize::*;
}

pub mod sparse {
    pub use hytra_sparse::*;
}

pub extern crate nalgebra;
pub extern crate vtkio;

/// Boltzmann constant in eV/K.
pub const K_B: f64 = 8.6173303e-5;

/// Gas constant in J/(mol K).
pub const R: f64 = 8.314462618;
