//! Banded matrices and direct solvers for the Jacobian systems produced by hytra.
//!
//! One-dimensional Lagrange discretizations with an interleaved (node-major) degree of
//! freedom layout give matrices whose non-zeros are confined to a narrow band around the
//! diagonal. Storing only the band keeps both assembly and factorization linear in the
//! number of unknowns.

/// Band storage and partially pivoted LU factorization.
pub mod band;

pub use band::{BandError, BandLu, BandMatrix};
