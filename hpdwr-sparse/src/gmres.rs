use crate::operator::{IdentityOperator, LinearOperator};
use core::fmt;
use hpdwr_traits::Real;
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Scalar};
use num::Zero;
use std::error::Error;
use std::ops::{Deref, DerefMut};

pub trait StoppingCriterion<T: Scalar> {
    /// Decides convergence from the norm of the right-hand side and the current residual norm.
    ///
    /// `residual_norm` is either the true residual `||b - Ax||` (at the start of every restart
    /// cycle) or the estimate maintained by the Arnoldi process.
    fn has_converged(&self, b_norm: T, residual_norm: T, iteration: usize) -> bool;
}

/// Relative residual tolerance `||r|| <= tol * ||b||`.
#[derive(Debug, Clone, Copy)]
pub struct RelativeResidualCriterion<T: Scalar> {
    tol: T,
}

impl<T: Scalar + Zero> RelativeResidualCriterion<T> {
    pub fn new(tol: T) -> Self {
        Self { tol }
    }
}

impl Default for RelativeResidualCriterion<f64> {
    fn default() -> Self {
        Self::new(1e-10)
    }
}

impl<T: Real> StoppingCriterion<T> for RelativeResidualCriterion<T> {
    fn has_converged(&self, b_norm: T, residual_norm: T, _iteration: usize) -> bool {
        residual_norm <= self.tol * b_norm
    }
}

/// Buffers used by GMRES. Can be reused across solves to avoid repeated allocation.
#[derive(Debug, Clone)]
pub struct GmresWorkspace<T: Scalar> {
    /// Orthonormal Krylov basis, `restart + 1` vectors.
    basis: Vec<DVector<T>>,
    /// Hessenberg matrix, reduced to upper triangular form by Givens rotations as we go.
    hessenberg: DMatrix<T>,
    cosines: Vec<T>,
    sines: Vec<T>,
    rhs: Vec<T>,
    r: DVector<T>,
    w: DVector<T>,
    z: DVector<T>,
}

impl<T: Scalar + Zero> Default for GmresWorkspace<T> {
    fn default() -> Self {
        Self {
            basis: Vec::new(),
            hessenberg: DMatrix::zeros(0, 0),
            cosines: Vec::new(),
            sines: Vec::new(),
            rhs: Vec::new(),
            r: DVector::zeros(0),
            w: DVector::zeros(0),
            z: DVector::zeros(0),
        }
    }
}

impl<T: Scalar + Zero> GmresWorkspace<T> {
    fn prepare(&mut self, dim: usize, restart: usize) {
        self.basis.resize_with(restart + 1, || DVector::zeros(dim));
        for v in &mut self.basis {
            v.resize_vertically_mut(dim, T::zero());
        }
        self.hessenberg = DMatrix::zeros(restart + 1, restart);
        self.cosines.clear();
        self.cosines.resize(restart, T::zero());
        self.sines.clear();
        self.sines.resize(restart, T::zero());
        self.rhs.clear();
        self.rhs.resize(restart + 1, T::zero());
        self.r.resize_vertically_mut(dim, T::zero());
        self.w.resize_vertically_mut(dim, T::zero());
        self.z.resize_vertically_mut(dim, T::zero());
    }
}

#[derive(Debug)]
enum OwnedOrMutRef<'a, T> {
    Owned(T),
    MutRef(&'a mut T),
}

impl<'a, T> Deref for OwnedOrMutRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

impl<'a, T> DerefMut for OwnedOrMutRef<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

/// Restarted GMRES with right preconditioning.
///
/// Configured through a builder:
///
/// ```ignore
/// let output = Gmres::new()
///     .with_operator(&matrix)
///     .with_stopping_criterion(RelativeResidualCriterion::new(1e-10))
///     .with_restart(50)
///     .with_max_iter(500)
///     .solve_with_guess(&b, &mut x)?;
/// ```
#[derive(Debug)]
pub struct Gmres<'a, T, A, P, Criterion>
where
    T: Scalar,
{
    workspace: OwnedOrMutRef<'a, GmresWorkspace<T>>,
    operator: A,
    preconditioner: P,
    stopping_criterion: Criterion,
    restart: usize,
    max_iter: Option<usize>,
}

const DEFAULT_RESTART: usize = 30;

impl<'a, T: Scalar + Zero> Gmres<'a, T, (), IdentityOperator, ()> {
    pub fn new() -> Self {
        Self {
            workspace: OwnedOrMutRef::Owned(GmresWorkspace::default()),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            restart: DEFAULT_RESTART,
            max_iter: None,
        }
    }
}

impl<'a, T: Scalar> Gmres<'a, T, (), IdentityOperator, ()> {
    pub fn with_workspace(workspace: &'a mut GmresWorkspace<T>) -> Self {
        Self {
            workspace: OwnedOrMutRef::MutRef(workspace),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            restart: DEFAULT_RESTART,
            max_iter: None,
        }
    }
}

impl<'a, T: Scalar, P, Criterion> Gmres<'a, T, (), P, Criterion> {
    pub fn with_operator<A>(self, operator: A) -> Gmres<'a, T, A, P, Criterion> {
        Gmres {
            workspace: self.workspace,
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            restart: self.restart,
            max_iter: self.max_iter,
        }
    }
}

impl<'a, T: Scalar, A, P, Criterion> Gmres<'a, T, A, P, Criterion> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> Gmres<'a, T, A, P2, Criterion> {
        Gmres {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
            restart: self.restart,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }

    /// Sets the dimension of the Krylov subspace built before each restart.
    ///
    /// # Panics
    ///
    /// Panics if `restart` is zero.
    pub fn with_restart(self, restart: usize) -> Self {
        assert!(restart > 0, "GMRES restart length must be positive");
        Self { restart, ..self }
    }
}

impl<'a, T: Scalar, A, P> Gmres<'a, T, A, P, ()> {
    pub fn with_stopping_criterion<Criterion>(self, stopping_criterion: Criterion) -> Gmres<'a, T, A, P, Criterion> {
        Gmres {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner: self.preconditioner,
            stopping_criterion,
            restart: self.restart,
            max_iter: self.max_iter,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(Box<dyn Error + Send + Sync>),
    PreconditionerError(Box<dyn Error + Send + Sync>),
    DimensionMismatch { rhs: usize, solution: usize },
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => write!(f, "Error applying operator: {}", err),
            Self::PreconditionerError(err) => write!(f, "Error applying preconditioner: {}", err),
            Self::DimensionMismatch { rhs, solution } => {
                write!(f, "Right-hand side has length {} but solution has length {}", rhs, solution)
            }
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
        }
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct SolveError<T> {
    pub output: GmresOutput<T>,
    pub kind: SolveErrorKind,
}

impl<T> SolveError<T> {
    fn new(output: GmresOutput<T>, kind: SolveErrorKind) -> Self {
        Self { output, kind }
    }
}

impl<T: fmt::Debug> fmt::Display for SolveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GMRES solve failed after {} iterations (residual norm {:?}). Error: {}",
            self.output.num_iterations, self.output.residual_norm, self.kind
        )
    }
}

impl<T: fmt::Debug> std::error::Error for SolveError<T> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            SolveErrorKind::OperatorError(err) | SolveErrorKind::PreconditionerError(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct GmresOutput<T> {
    /// Total number of Arnoldi steps, summed over all restart cycles.
    pub num_iterations: usize,
    /// Number of restart cycles started.
    pub num_restarts: usize,
    /// Norm of the true residual `b - Ax` at the returned solution, or the last known
    /// residual norm if the solve failed.
    pub residual_norm: Option<T>,
}

/// y = Ax
fn apply_operator<'a, T, A>(
    y: impl Into<DVectorViewMut<'a, T>>,
    a: &'a A,
    x: impl Into<DVectorView<'a, T>>,
) -> Result<(), Box<dyn Error + Send + Sync>>
where
    T: Scalar,
    A: LinearOperator<T>,
{
    a.apply(y.into(), x.into())
}

impl<'a, T, A, P, Criterion> Gmres<'a, T, A, P, Criterion>
where
    T: Real,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
    Criterion: StoppingCriterion<T>,
{
    pub fn solve_with_guess<'b>(
        &mut self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<GmresOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    fn solve_with_guess_(&mut self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<GmresOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;

        let mut output = GmresOutput {
            num_iterations: 0,
            num_restarts: 0,
            residual_norm: None,
        };

        if b.len() != x.len() {
            let kind = DimensionMismatch {
                rhs: b.len(),
                solution: x.len(),
            };
            return Err(SolveError::new(output, kind));
        }

        let n = b.len();
        let m = self.restart;
        let b_norm = b.norm();

        if b_norm == T::zero() {
            x.fill(T::zero());
            output.residual_norm = Some(T::zero());
            return Ok(output);
        }

        let workspace = &mut *self.workspace;
        workspace.prepare(n, m);

        loop {
            // r = b - Ax
            if let Err(err) = apply_operator(&mut workspace.r, &self.operator, &x) {
                return Err(SolveError::new(output, OperatorError(err)));
            }
            workspace.r.zip_apply(&b, |ax_i, b_i| *ax_i = b_i - *ax_i);
            let beta = workspace.r.norm();
            output.residual_norm = Some(beta);

            if self
                .stopping_criterion
                .has_converged(b_norm, beta, output.num_iterations)
            {
                break;
            } else if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            output.num_restarts += 1;
            workspace.basis[0].copy_from(&workspace.r);
            workspace.basis[0] /= beta;
            workspace.hessenberg.fill(T::zero());
            workspace.rhs.iter_mut().for_each(|g| *g = T::zero());
            workspace.rhs[0] = beta;

            let mut krylov_dim = 0;
            for j in 0..m {
                // w = A P v_j
                if let Err(err) = apply_operator(&mut workspace.z, &self.preconditioner, &workspace.basis[j]) {
                    return Err(SolveError::new(output, PreconditionerError(err)));
                }
                if let Err(err) = apply_operator(&mut workspace.w, &self.operator, &workspace.z) {
                    return Err(SolveError::new(output, OperatorError(err)));
                }

                // Modified Gram-Schmidt
                for i in 0..=j {
                    let h_ij = workspace.w.dot(&workspace.basis[i]);
                    workspace.hessenberg[(i, j)] = h_ij;
                    workspace.w.axpy(-h_ij, &workspace.basis[i], T::one());
                }
                let h_next = workspace.w.norm();
                workspace.hessenberg[(j + 1, j)] = h_next;
                let breakdown = h_next == T::zero();
                if !breakdown {
                    workspace.basis[j + 1].copy_from(&workspace.w);
                    workspace.basis[j + 1] /= h_next;
                }

                // Apply the previous rotations to the new column, then eliminate h_{j+1, j}
                for i in 0..j {
                    let (c, s) = (workspace.cosines[i], workspace.sines[i]);
                    let h_i = workspace.hessenberg[(i, j)];
                    let h_ip1 = workspace.hessenberg[(i + 1, j)];
                    workspace.hessenberg[(i, j)] = c * h_i + s * h_ip1;
                    workspace.hessenberg[(i + 1, j)] = c * h_ip1 - s * h_i;
                }
                let h_jj = workspace.hessenberg[(j, j)];
                let h_j1j = workspace.hessenberg[(j + 1, j)];
                let denom = (h_jj * h_jj + h_j1j * h_j1j).sqrt();
                let (c, s) = if denom == T::zero() {
                    (T::one(), T::zero())
                } else {
                    (h_jj / denom, h_j1j / denom)
                };
                workspace.cosines[j] = c;
                workspace.sines[j] = s;
                workspace.hessenberg[(j, j)] = c * h_jj + s * h_j1j;
                workspace.hessenberg[(j + 1, j)] = T::zero();
                let g_j = workspace.rhs[j];
                workspace.rhs[j + 1] = -s * g_j;
                workspace.rhs[j] = c * g_j;

                output.num_iterations += 1;
                krylov_dim = j + 1;

                let estimate = workspace.rhs[j + 1].abs();
                let reached_max_iter = self
                    .max_iter
                    .map(|max_iter| output.num_iterations >= max_iter)
                    .unwrap_or(false);
                if breakdown
                    || reached_max_iter
                    || self
                        .stopping_criterion
                        .has_converged(b_norm, estimate, output.num_iterations)
                {
                    break;
                }
            }

            // Solve the triangular least-squares system H y = g by back substitution,
            // storing y in place of g
            for i in (0..krylov_dim).rev() {
                let mut sum = workspace.rhs[i];
                for k in (i + 1)..krylov_dim {
                    sum -= workspace.hessenberg[(i, k)] * workspace.rhs[k];
                }
                let h_ii = workspace.hessenberg[(i, i)];
                workspace.rhs[i] = if h_ii == T::zero() { T::zero() } else { sum / h_ii };
            }

            // x <- x + P (V y)
            workspace.w.fill(T::zero());
            for i in 0..krylov_dim {
                workspace.w.axpy(workspace.rhs[i], &workspace.basis[i], T::one());
            }
            if let Err(err) = apply_operator(&mut workspace.z, &self.preconditioner, &workspace.w) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            x.axpy(T::one(), &workspace.z, T::one());

            debug!(
                "GMRES restart cycle {} finished after {} total iterations",
                output.num_restarts, output.num_iterations
            );
        }

        Ok(output)
    }
}
