use nalgebra::RealField;

/// Vector function traits and numerical differentiation
pub mod calculus;
/// Newton's method for systems of nonlinear equations, with optional line search
pub mod newton;

pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
