use hpdwr_traits::Real;
use nalgebra::{DMatrix, DVectorView, DVectorViewMut, Scalar};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

/// A linear map `y = A x` on dynamically sized vectors.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

fn check_dimensions(nrows: usize, ncols: usize, y_len: usize, x_len: usize) -> Result<(), Box<dyn Error + Send + Sync>> {
    if ncols != x_len || nrows != y_len {
        Err(Box::from(format!(
            "Operator of size {}x{} cannot map vector of length {} into vector of length {}",
            nrows, ncols, x_len, y_len
        )))
    } else {
        Ok(())
    }
}

impl<T: Real> LinearOperator<T> for DMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>> {
        check_dimensions(self.nrows(), self.ncols(), y.len(), x.len())?;
        y.gemv(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T: Real> LinearOperator<T> for CsrMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>> {
        check_dimensions(self.nrows(), self.ncols(), y.len(), x.len())?;
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

/// The transpose `A^T` of a CSR matrix, applied without forming the transposed matrix.
///
/// This is the natural operator for adjoint systems, where the residual Jacobian is assembled
/// once and its transpose is only ever needed through matrix-vector products.
#[derive(Debug, Clone, Copy)]
pub struct TransposedCsr<'a, T>(pub &'a CsrMatrix<T>);

impl<'a, T: Real> LinearOperator<T> for TransposedCsr<'a, T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let a = self.0;
        check_dimensions(a.ncols(), a.nrows(), y.len(), x.len())?;
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::Transpose(a), Op::NoOp(&x));
        Ok(())
    }
}

pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>> {
        check_dimensions(y.len(), x.len(), y.len(), x.len())?;
        y.copy_from(&x);
        Ok(())
    }
}

/// Jacobi (diagonal) preconditioner `P = diag(A)^{-1}`.
///
/// Zero diagonal entries are replaced by one, so that the preconditioner is always defined.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<T: Scalar> {
    inverse_diagonal: Vec<T>,
}

impl<T: Real> JacobiPreconditioner<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Self {
        let n = matrix.nrows().min(matrix.ncols());
        let inverse_diagonal = (0..n)
            .map(|i| {
                let a_ii = matrix
                    .get_entry(i, i)
                    .map(|entry| entry.into_value())
                    .unwrap_or_else(T::zero);
                if a_ii == T::zero() {
                    T::one()
                } else {
                    T::one() / a_ii
                }
            })
            .collect();
        Self { inverse_diagonal }
    }
}

impl<T: Real> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let n = self.inverse_diagonal.len();
        check_dimensions(n, n, y.len(), x.len())?;
        for i in 0..n {
            y[i] = self.inverse_diagonal[i] * x[i];
        }
        Ok(())
    }
}
