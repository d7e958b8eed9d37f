use crate::calculus::{DifferentiableVectorFunction, VectorFunction};
use crate::Real;
use itertools::iterate;
use log::debug;
use nalgebra::{DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Convergence settings for [`newton`].
///
/// Iterations stop as soon as `|F(u)|_2 <= absolute_tolerance` or
/// `|F(u)|_2 <= relative_tolerance * |F(u_0)|_2`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonSettings<T> {
    pub max_iterations: Option<usize>,
    pub absolute_tolerance: T,
    pub relative_tolerance: T,
}

impl<T: Real> NewtonSettings<T> {
    pub fn is_converged(&self, residual_norm: T, initial_residual_norm: T) -> bool {
        residual_norm <= self.absolute_tolerance
            || residual_norm <= self.relative_tolerance * initial_residual_norm
    }

    /// Returns true if `iterations` Newton steps exhaust the iteration budget.
    pub fn exhausted_by(&self, iterations: usize) -> bool {
        self.max_iterations == Some(iterations)
    }
}

#[derive(Debug)]
pub enum NewtonError {
    /// The iteration budget was spent before the residual converged.
    MaximumIterationsReached(usize),
    /// The residual became infinite or NaN at the given iteration.
    NonFiniteResidual(usize),
    /// The linear solve with the Jacobian failed.
    JacobianError(Box<dyn Error>),
    /// The line search found no step length with sufficient decrease.
    LineSearchError(Box<dyn Error>),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewtonError::MaximumIterationsReached(iterations) => {
                write!(f, "Newton did not converge within {} iterations", iterations)
            }
            NewtonError::NonFiniteResidual(iteration) => {
                write!(f, "Residual is not finite at Newton iteration {}", iteration)
            }
            NewtonError::JacobianError(err) => write!(f, "Jacobian solve failed: {}", err),
            NewtonError::LineSearchError(err) => write!(f, "Line search failed: {}", err),
        }
    }
}

impl Error for NewtonError {}

/// Solves `F(u) = 0` with full Newton steps.
///
/// `x` holds the initial guess on entry and the solution on successful return. `f` and `dx`
/// are work buffers of the same length, so no allocation takes place.
///
/// Returns the number of Newton steps taken.
pub fn newton<'a, T: Real, F: DifferentiableVectorFunction<T>>(
    function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
) -> Result<usize, NewtonError> {
    newton_line_search(function, x, f, dx, settings, &mut NoLineSearch)
}

/// Solves `F(u) = 0`, scaling each Newton step with `line_search`.
pub fn newton_line_search<'a, T: Real, F: DifferentiableVectorFunction<T>>(
    mut function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
    line_search: &mut impl LineSearch<T, F>,
) -> Result<usize, NewtonError> {
    let mut x = x.into();
    let mut f = f.into();
    let mut direction = dx.into();
    assert_eq!(x.nrows(), f.nrows());
    assert_eq!(direction.nrows(), f.nrows());

    function.eval_into(&mut f, &DVectorView::from(&x));
    let initial_norm = f.norm();
    let mut norm = initial_norm;
    let mut iteration = 0;

    loop {
        if !norm.is_finite() {
            return Err(NewtonError::NonFiniteResidual(iteration));
        }
        debug!("Newton iteration {}: residual norm {}", iteration, norm);
        if settings.is_converged(norm, initial_norm) {
            return Ok(iteration);
        }
        if settings.exhausted_by(iteration) {
            return Err(NewtonError::MaximumIterationsReached(iteration));
        }

        // J p = -F is solved as J (-p) = F
        function
            .solve_jacobian_system(&mut direction, &DVectorView::from(&x), &DVectorView::from(&f))
            .map_err(NewtonError::JacobianError)?;
        direction.neg_mut();

        let step_length = line_search
            .step(
                &mut function,
                DVectorViewMut::from(&mut f),
                DVectorViewMut::from(&mut x),
                DVectorView::from(&direction),
            )
            .map_err(NewtonError::LineSearchError)?;
        debug!("Newton step length at iteration {}: {}", iteration, step_length);
        norm = f.norm();
        iteration += 1;
    }
}

/// Moves `x` along a Newton direction and leaves `F(x)` at the new point in `residual`.
pub trait LineSearch<T: Scalar, F: VectorFunction<T>> {
    /// Returns the accepted step length.
    fn step(
        &mut self,
        function: &mut F,
        residual: DVectorViewMut<T>,
        x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error>>;
}

/// Always takes the full Newton step.
#[derive(Clone, Debug)]
pub struct NoLineSearch;

impl<T: Real, F: VectorFunction<T>> LineSearch<T, F> for NoLineSearch {
    fn step(
        &mut self,
        function: &mut F,
        mut residual: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error>> {
        x.axpy(T::one(), &direction, T::one());
        function.eval_into(&mut residual, &DVectorView::from(&x));
        Ok(T::one())
    }
}

/// Backtracking line search on `g(x) = |F(x)|^2 / 2` using the Armijo condition.
///
/// With `p` the Newton direction, `grad g^T p ~= -2 g(x)`, so sufficient decrease reduces to
/// `g(x + alpha p) <= (1 - c alpha) g(x)`. See Jorge & Nocedal (2006), Numerical Optimization,
/// Chapter 3.1.
#[derive(Clone, Debug)]
pub struct BacktrackingLineSearch {
    pub sufficient_decrease: f64,
    pub min_step_length: f64,
}

impl Default for BacktrackingLineSearch {
    fn default() -> Self {
        Self {
            sufficient_decrease: 1e-4,
            min_step_length: 1e-6,
        }
    }
}

/// Trial step lengths: `1, 0.75, 0.5`, then repeated quartering.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn trial_step_lengths<T: Real>() -> impl Iterator<Item = T> {
    [1.0, 0.75, 0.5]
        .into_iter()
        .chain(iterate(0.25, |alpha: &T| 0.25 * *alpha))
}

impl<T: Real, F: VectorFunction<T>> LineSearch<T, F> for BacktrackingLineSearch {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn step(
        &mut self,
        function: &mut F,
        mut residual: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error>> {
        let c = T::from_f64(self.sufficient_decrease).unwrap();
        let alpha_min = T::from_f64(self.min_step_length).unwrap();
        let g_initial = 0.5 * residual.magnitude_squared();

        // x is moved by the difference of consecutive step lengths, so x_0 need not be stored
        let mut alpha_prev = 0.0;
        for alpha in trial_step_lengths::<T>().take_while(|alpha| *alpha >= alpha_min) {
            x.axpy(alpha - alpha_prev, &direction, T::one());
            function.eval_into(&mut residual, &DVectorView::from(&x));
            if 0.5 * residual.magnitude_squared() <= (1.0 - c * alpha) * g_initial {
                return Ok(alpha);
            }
            alpha_prev = alpha;
        }
        Err(Box::from(format!(
            "no step length above {} decreases the residual sufficiently",
            alpha_min
        )))
    }
}
