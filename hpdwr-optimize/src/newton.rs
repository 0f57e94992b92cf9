//! Newton's method for steady residual equations `R(u) = 0`.
use crate::calculus::{DifferentiableVectorFunction, VectorFunction};
use hpdwr_traits::Real;
use itertools::iterate;
use log::{debug, info};
use nalgebra::{DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonSettings<T> {
    /// Maximum number of Newton updates. `None` means no limit.
    pub max_iterations: Option<usize>,
    /// Convergence is declared once `|R(u)|_2 <= tolerance`.
    pub tolerance: T,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonOutput<T> {
    pub iterations: usize,
    pub residual_norm: T,
}

#[derive(Debug)]
pub enum NewtonError {
    /// The residual norm did not drop below the tolerance within the iteration limit.
    MaximumIterationsReached { iterations: usize, residual_norm: f64 },
    /// Evaluating the residual failed.
    ResidualError(Box<dyn Error + Send + Sync>),
    /// Solving the Jacobian system failed.
    JacobianError(Box<dyn Error + Send + Sync>),
    /// The line search failed to produce an acceptable step.
    LineSearchError(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewtonError::MaximumIterationsReached {
                iterations,
                residual_norm,
            } => write!(
                f,
                "Newton iteration did not converge within {} iterations (residual norm {:e})",
                iterations, residual_norm
            ),
            NewtonError::ResidualError(err) => write!(f, "Failed to evaluate residual: {}", err),
            NewtonError::JacobianError(err) => write!(f, "Failed to solve Jacobian system: {}", err),
            NewtonError::LineSearchError(err) => write!(f, "Line search failed: {}", err),
        }
    }
}

impl Error for NewtonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NewtonError::MaximumIterationsReached { .. } => None,
            NewtonError::ResidualError(err) | NewtonError::JacobianError(err) | NewtonError::LineSearchError(err) => {
                Some(err.as_ref())
            }
        }
    }
}

/// Solves `F(x) = 0` with full Newton steps, starting from the given `x`.
///
/// `f` and `dx` are work vectors of the same length as `x`. On success `f` holds the
/// residual at the returned solution.
pub fn newton<'a, T, F>(
    function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
) -> Result<NewtonOutput<T>, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    newton_line_search(function, x, f, dx, settings, &mut NoLineSearch)
}

/// Same as [`newton`], but each update is scaled by the given line search.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn newton_line_search<'a, T, F>(
    mut function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
    line_search: &mut impl LineSearch<T, F>,
) -> Result<NewtonOutput<T>, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    let mut x = x.into();
    let mut f = f.into();
    let mut dx = dx.into();

    assert_eq!(x.nrows(), f.nrows(), "Residual and solution vectors must have equal length");
    assert_eq!(dx.nrows(), f.nrows(), "Update and residual vectors must have equal length");

    function
        .eval_into(&mut f, &DVectorView::from(&x))
        .map_err(NewtonError::ResidualError)?;

    let mut iterations = 0;
    let mut residual_norm = f.norm();
    debug!("Newton initial residual norm: {:e}", residual_norm.to_subset().unwrap_or(f64::NAN));

    // A NaN residual never compares as converged
    while !residual_norm.le(&settings.tolerance) {
        if settings.max_iterations == Some(iterations) {
            return Err(NewtonError::MaximumIterationsReached {
                iterations,
                residual_norm: residual_norm.to_subset().unwrap_or(f64::NAN),
            });
        }

        // J (-dx) = R
        function
            .solve_jacobian_system(&mut dx, &DVectorView::from(&x), &DVectorView::from(&f))
            .map_err(NewtonError::JacobianError)?;
        dx *= -1.0;

        let step_length = line_search
            .step(
                &mut function,
                DVectorViewMut::from(&mut f),
                DVectorViewMut::from(&mut x),
                DVectorView::from(&dx),
            )
            .map_err(NewtonError::LineSearchError)?;

        iterations += 1;
        residual_norm = f.norm();
        debug!(
            "Newton iteration {}: step length {}, residual norm {:e}",
            iterations,
            step_length,
            residual_norm.to_subset().unwrap_or(f64::NAN)
        );
    }

    info!(
        "Newton converged in {} iterations, residual norm {:e}",
        iterations,
        residual_norm.to_subset().unwrap_or(f64::NAN)
    );
    Ok(NewtonOutput {
        iterations,
        residual_norm,
    })
}

/// Takes a step from `x` along `direction`, updating `x` and the residual `f` in place.
pub trait LineSearch<T: Scalar, F: VectorFunction<T>> {
    /// Returns the accepted step length.
    fn step(
        &mut self,
        function: &mut F,
        f: DVectorViewMut<T>,
        x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error + Send + Sync>>;
}

/// Always takes the full step.
#[derive(Clone, Debug, Default)]
pub struct NoLineSearch;

impl<T, F> LineSearch<T, F> for NoLineSearch
where
    T: Real,
    F: VectorFunction<T>,
{
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error + Send + Sync>> {
        x.axpy(T::one(), &direction, T::one());
        function.eval_into(&mut f, &DVectorView::from(&x))?;
        Ok(T::one())
    }
}

/// Backtracking on the merit function `g(x) = |F(x)|^2 / 2` with an Armijo-type
/// sufficient decrease condition.
///
/// Since the direction solves the Newton equation, `grad g . p = -2 g(x)`, so a step of
/// length `alpha` is accepted when `g(x + alpha p) <= (1 - c alpha) g(x)`.
#[derive(Clone, Debug)]
pub struct BacktrackingLineSearch<T> {
    pub sufficient_decrease: T,
    pub min_step_length: T,
}

impl<T: Real> Default for BacktrackingLineSearch<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            sufficient_decrease: 1e-4,
            min_step_length: 1e-6,
        }
    }
}

impl<T, F> LineSearch<T, F> for BacktrackingLineSearch<T>
where
    T: Real,
    F: VectorFunction<T>,
{
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error + Send + Sync>> {
        let c = self.sufficient_decrease;
        let g_initial = 0.5 * f.magnitude_squared();

        // Gentle reductions first, then quarter the step each time
        let mut alphas = [1.0, 0.75, 0.5]
            .into_iter()
            .chain(iterate(0.25, |alpha: &T| 0.25 * *alpha));

        let mut alpha_prev = T::zero();
        loop {
            let alpha = alphas
                .next()
                .ok_or_else(|| Box::<dyn Error + Send + Sync>::from("Step length sequence exhausted"))?;

            // x_new = x_0 + alpha p = x_prev + (alpha - alpha_prev) p
            x.axpy(alpha - alpha_prev, &direction, T::one());
            function.eval_into(&mut f, &DVectorView::from(&x))?;

            let g = 0.5 * f.magnitude_squared();
            if g <= (1.0 - c * alpha) * g_initial {
                return Ok(alpha);
            } else if alpha < self.min_step_length {
                return Err(Box::from(format!(
                    "Step length {} fell below the minimum {} without sufficient decrease",
                    alpha, self.min_step_length
                )));
            }
            alpha_prev = alpha;
        }
    }
}
