use hpdwr_traits::Real;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;

/// A function `F: R^n -> R^n`, typically a discrete residual.
pub trait VectorFunction<T>
where
    T: Scalar,
{
    fn dimension(&self) -> usize;

    /// Evaluates `f = F(x)`.
    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>>;
}

impl<T, X> VectorFunction<T> for &mut X
where
    T: Scalar,
    X: VectorFunction<T>,
{
    fn dimension(&self) -> usize {
        X::dimension(self)
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>> {
        X::eval_into(self, f, x)
    }
}

/// A vector function whose Jacobian systems `J(x) sol = rhs` can be solved.
pub trait DifferentiableVectorFunction<T>: VectorFunction<T>
where
    T: Scalar,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

impl<T, X> DifferentiableVectorFunction<T> for &mut X
where
    T: Scalar,
    X: DifferentiableVectorFunction<T>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        X::solve_jacobian_system(self, sol, x, rhs)
    }
}

/// Approximates the gradient of `f: R^n -> R` at `x` with central differences of step `h`.
///
/// `x` is used as scratch space, but its content is restored before returning.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn approximate_gradient_fd<T>(mut f: impl FnMut(DVectorView<T>) -> T, x: &mut DVector<T>, h: T) -> DVector<T>
where
    T: Real,
{
    let n = x.len();
    let mut df = DVector::zeros(n);
    for i in 0..n {
        let x_i = x[i];
        x[i] = x_i + h;
        let f_plus = f(DVectorView::from(&*x));
        x[i] = x_i - h;
        let f_minus = f(DVectorView::from(&*x));
        x[i] = x_i;
        df[i] = (f_plus - f_minus) / (2.0 * h);
    }
    df
}

/// Approximates the $m \times n$ Jacobian $J_{ij} = \partial f_i / \partial x_j$ of
/// $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$ at `x` with central differences of step `h`.
///
/// `x` is used as scratch space, but its content is restored before returning.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn approximate_jacobian_fd<T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: &mut DVector<T>,
    h: T,
) -> DMatrix<T>
where
    T: Real,
{
    let n = x.len();
    let mut jacobian = DMatrix::zeros(m, n);
    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);

    // Build column by column: df/dx_j ~ (f(x + h e_j) - f(x - h e_j)) / (2 h)
    for j in 0..n {
        let x_j = x[j];
        x[j] = x_j + h;
        f(DVectorView::from(&*x), DVectorViewMut::from(&mut f_plus));
        x[j] = x_j - h;
        f(DVectorView::from(&*x), DVectorViewMut::from(&mut f_minus));
        x[j] = x_j;

        let mut column = jacobian.column_mut(j);
        column.copy_from(&f_plus);
        column -= &f_minus;
        column /= 2.0 * h;
    }

    jacobian
}
