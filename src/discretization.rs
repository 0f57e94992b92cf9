//! Interfaces through which the adjoint engine drives a discretization.
use crate::transfer::DegreeDistribution;
use hpdwr_traits::Real;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::ops::Range;

/// A named field attached to a visualization export.
#[derive(Debug, Clone, Copy)]
pub enum OutputField<'a, T> {
    /// A vector with one entry per degree of freedom, e.g. an adjoint.
    DofVector { name: &'a str, values: &'a DVector<T> },
    /// A vector with one entry per cell, e.g. an error indicator.
    CellScalars { name: &'a str, values: &'a DVector<T> },
}

impl<'a, T> OutputField<'a, T> {
    pub fn name(&self) -> &'a str {
        match self {
            OutputField::DofVector { name, .. } | OutputField::CellScalars { name, .. } => name,
        }
    }
}

/// A discretization of a steady residual equation `R(u) = 0` with a variable per-cell
/// polynomial degree.
///
/// Degrees of freedom are numbered cell by cell, so that the dofs of each cell form a
/// contiguous range.
pub trait Discretization<T: Real> {
    fn n_dofs(&self) -> usize;

    fn n_cells(&self) -> usize;

    fn cell_dofs(&self, cell: usize) -> Range<usize>;

    /// The largest polynomial degree the discretization supports.
    fn max_degree(&self) -> usize;

    fn degree_distribution(&self) -> &DegreeDistribution;

    fn solution(&self) -> &DVector<T>;

    fn solution_mut(&mut self) -> &mut DVector<T>;

    /// Sets up dofs for a new degree distribution. The solution is zeroed.
    fn reallocate(&mut self, degrees: &DegreeDistribution) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Sets up dofs for a new degree distribution and projects the current solution onto
    /// the new space.
    ///
    /// Projection onto a space containing the current one must be exact.
    fn transfer_to(&mut self, degrees: &DegreeDistribution) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Evaluates the residual at the current solution.
    fn assemble_residual(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Evaluates the residual and its Jacobian at the current solution.
    fn assemble_residual_and_jacobian(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// The most recently assembled residual.
    fn residual(&self) -> &DVector<T>;

    /// The most recently assembled Jacobian `dR/du`.
    fn system_matrix(&self) -> &CsrMatrix<T>;

    fn solve_linear_system(&self, matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> Result<DVector<T>, Box<dyn Error + Send + Sync>>;

    /// Solves `A^T x = b` without forming the transpose of `A`.
    fn solve_transposed_linear_system(
        &self,
        matrix: &CsrMatrix<T>,
        rhs: &DVector<T>,
    ) -> Result<DVector<T>, Box<dyn Error + Send + Sync>>;

    /// Writes the current solution, together with the given fields, for visualization.
    fn output_results_vtk(&self, cycle: usize, fields: &[OutputField<'_, T>]) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Quadrature data for one cell, in physical coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CellQuadrature<T: Real> {
    pub points: Vec<T>,
    /// Weights including the cell Jacobian, so that they sum to the cell size.
    pub weights: Vec<T>,
    /// `basis[(q, i)]` is the value of the `i`-th local basis function at point `q`.
    pub basis: DMatrix<T>,
}

/// A discretization that exposes volume quadrature, sufficient to evaluate integral
/// functionals of the solution.
pub trait VolumeQuadrature<T: Real>: Discretization<T> {
    fn cell_quadrature(&self, cell: usize) -> CellQuadrature<T>;
}
