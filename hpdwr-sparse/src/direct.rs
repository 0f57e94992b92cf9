//! Direct solution of sparse systems through a dense LU factorization.
//!
//! Intended for the moderately sized systems of one-dimensional problems and for reference
//! solutions in tests, where round-off accurate solutions are required.
use hpdwr_traits::Real;
use nalgebra::{DMatrix, DVector, DVectorView};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectSolveError {
    NotSquare { nrows: usize, ncols: usize },
    DimensionMismatch { nrows: usize, rhs: usize },
    Singular,
}

impl fmt::Display for DirectSolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSquare { nrows, ncols } => {
                write!(f, "Matrix of size {}x{} is not square", nrows, ncols)
            }
            Self::DimensionMismatch { nrows, rhs } => {
                write!(f, "Matrix has {} rows but right-hand side has length {}", nrows, rhs)
            }
            Self::Singular => write!(f, "Matrix is singular"),
        }
    }
}

impl Error for DirectSolveError {}

/// Solves `A x = b` with partial-pivoting LU on a dense copy of `A`.
pub fn lu_solve<'a, T: Real>(
    matrix: &CsrMatrix<T>,
    rhs: impl Into<DVectorView<'a, T>>,
) -> Result<DVector<T>, DirectSolveError> {
    let dense = convert_csr_dense(matrix);
    lu_solve_dense(dense, rhs)
}

/// Solves `A^T x = b`, where `A` is given in CSR format.
pub fn lu_solve_transpose<'a, T: Real>(
    matrix: &CsrMatrix<T>,
    rhs: impl Into<DVectorView<'a, T>>,
) -> Result<DVector<T>, DirectSolveError> {
    let dense = convert_csr_dense(matrix).transpose();
    lu_solve_dense(dense, rhs)
}

fn lu_solve_dense<'a, T: Real>(
    dense: DMatrix<T>,
    rhs: impl Into<DVectorView<'a, T>>,
) -> Result<DVector<T>, DirectSolveError> {
    let rhs = rhs.into();
    let (nrows, ncols) = dense.shape();
    if nrows != ncols {
        return Err(DirectSolveError::NotSquare { nrows, ncols });
    }
    if rhs.len() != nrows {
        return Err(DirectSolveError::DimensionMismatch { nrows, rhs: rhs.len() });
    }
    if nrows == 0 {
        return Ok(DVector::zeros(0));
    }

    let b = rhs.clone_owned();
    dense.lu().solve(&b).ok_or(DirectSolveError::Singular)
}
