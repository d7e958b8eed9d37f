//! File output: VTK snapshots and CSV tables.
pub mod csv;
pub mod vtk;
