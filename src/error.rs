//! Functionality for error estimation against manufactured solutions.
use crate::discretization::VolumeQuadrature;
use crate::functional::FunctionalIntegrand;
use crate::mesh::Mesh1d;
use crate::physics::ManufacturedSolution;
use crate::quadrature::gauss_on_interval;
use hpdwr_traits::Real;
use itertools::izip;

/// Gauss points per cell used for reference values of exact functionals.
pub const EXACT_QUADRATURE_POINTS: usize = 20;

/// Estimate the squared $L^2$ error $\norm{u_h - u}^2_{L^2}$ on one cell, using the cell
/// quadrature of the discretization.
#[allow(non_snake_case)]
pub fn estimate_cell_L2_error_squared<T, D>(discretization: &D, cell: usize, u: &(impl ManufacturedSolution<T> + ?Sized)) -> T
where
    T: Real,
    D: VolumeQuadrature<T> + ?Sized,
{
    let quadrature = discretization.cell_quadrature(cell);
    let u_h = &quadrature.basis * discretization.solution().rows_range(discretization.cell_dofs(cell));

    let mut result = T::zero();
    for (w, x, u_h) in izip!(&quadrature.weights, &quadrature.points, u_h.iter()) {
        let error = *u_h - u.value(*x);
        result += *w * error * error;
    }
    result
}

/// Estimate the $L^2$ error $\norm{u_h - u}_{L^2}$ over the whole domain.
#[allow(non_snake_case)]
pub fn estimate_L2_error<T, D>(discretization: &D, u: &(impl ManufacturedSolution<T> + ?Sized)) -> T
where
    T: Real,
    D: VolumeQuadrature<T> + ?Sized,
{
    (0..discretization.n_cells())
        .map(|cell| estimate_cell_L2_error_squared(discretization, cell, u))
        .fold(T::zero(), |acc, e| acc + e)
        .sqrt()
}

/// $\int_\Omega g(x, u(x)) \, dx$ for the exact solution `u`, integrated with
/// [`EXACT_QUADRATURE_POINTS`] Gauss points on every cell of `mesh`.
pub fn exact_functional_value<T, I>(integrand: &I, u: &(impl ManufacturedSolution<T> + ?Sized), mesh: &Mesh1d<T>) -> T
where
    T: Real,
    I: FunctionalIntegrand<T> + ?Sized,
{
    (0..mesh.num_cells())
        .map(|cell| {
            let (a, b) = mesh.cell_interval(cell);
            let (weights, points) = gauss_on_interval(EXACT_QUADRATURE_POINTS, a, b);
            izip!(&weights, &points).fold(T::zero(), |acc, (w, x)| acc + *w * integrand.value(*x, u.value(*x)))
        })
        .fold(T::zero(), |acc, j| acc + j)
}
