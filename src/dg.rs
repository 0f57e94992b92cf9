//! Modal discontinuous Galerkin discretization of steady scalar conservation laws in 1D.
//!
//! On each cell $K = [x_K, x_{K+1}]$ with degree $p_K$ the solution is expanded in Legendre
//! modes of the reference coordinate $\xi \in [-1, 1]$. For `dF(u)/dx = s(x)` the residual of
//! test function $v_j$ is
//!
//! $$ R_{K,j} = -\int_K F(u_h) \frac{dv_j}{dx} \, dx + \hat{F}_{K+1/2} v_j(x_{K+1}^-)
//!     - \hat{F}_{K-1/2} v_j(x_K^+) - \int_K s \, v_j \, dx, $$
//!
//! where the boundary traces outside the domain are given by the manufactured solution.
use crate::basis::{populate_legendre, populate_legendre_with_derivatives, value_at_left, value_at_right};
use crate::discretization::{CellQuadrature, Discretization, OutputField, VolumeQuadrature};
use crate::io::vtk::DgDataSetBuilder;
use crate::mesh::Mesh1d;
use crate::parameters::{LinearSolverParam, NewtonParam, OutputParam};
use crate::physics::{source_term, ManufacturedSolution, Physics};
use crate::quadrature::{gauss, Rule};
use crate::transfer::DegreeDistribution;
use hpdwr_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use hpdwr_optimize::newton::{newton, newton_line_search, BacktrackingLineSearch, NewtonError, NewtonOutput, NewtonSettings};
use hpdwr_sparse::direct::{lu_solve, lu_solve_transpose};
use hpdwr_sparse::gmres::{Gmres, RelativeResidualCriterion};
use hpdwr_sparse::operator::{JacobiPreconditioner, LinearOperator, TransposedCsr};
use hpdwr_traits::{real, real_from_usize, Real};
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use std::error::Error;
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DgError {
    /// The degree distribution does not have one entry per cell.
    CellCountMismatch { cells: usize, degrees: usize },
    DegreeAboveMaximum { cell: usize, degree: usize, max_degree: usize },
    /// A vector does not match the number of dofs or cells it belongs to.
    DimensionMismatch { expected: usize, actual: usize },
}

impl fmt::Display for DgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DgError::CellCountMismatch { cells, degrees } => write!(
                f,
                "Degree distribution has {} entries, but the mesh has {} cells",
                degrees, cells
            ),
            DgError::DegreeAboveMaximum {
                cell,
                degree,
                max_degree,
            } => write!(
                f,
                "Degree {} of cell {} exceeds the maximum degree {}",
                degree, cell, max_degree
            ),
            DgError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected length {}, got {}", expected, actual)
            }
        }
    }
}

impl Error for DgError {}

#[derive(Debug, Clone, PartialEq)]
pub struct DgSettings {
    pub max_degree: usize,
    /// Quadrature points per cell beyond `p + 1`.
    pub overintegration: usize,
    pub linear_solver: LinearSolverParam,
    pub output: OutputParam,
}

impl Default for DgSettings {
    fn default() -> Self {
        Self {
            max_degree: 8,
            overintegration: 2,
            linear_solver: LinearSolverParam::Direct,
            output: OutputParam::default(),
        }
    }
}

/// Residual contributions of a single cell.
struct CellBlock<T: Real> {
    residual: DVector<T>,
    /// `dR_K / du_K`
    diagonal: DMatrix<T>,
    /// `dR_K / du_{K-1}`, absent for the first cell.
    lower: Option<DMatrix<T>>,
    /// `dR_K / du_{K+1}`, absent for the last cell.
    upper: Option<DMatrix<T>>,
}

/// hp discontinuous Galerkin discretization with physics `P` and manufactured solution `S`.
#[derive(Debug, Clone)]
pub struct DgDiscretization<T: Real, P, S> {
    mesh: Mesh1d<T>,
    physics: P,
    manufactured_solution: S,
    settings: DgSettings,
    /// Volume quadrature for each degree `0..=max_degree`
    rules: Vec<Rule<T>>,
    degrees: DegreeDistribution,
    /// Dofs of cell `k` are `offsets[k]..offsets[k + 1]`
    offsets: Vec<usize>,
    solution: DVector<T>,
    residual: DVector<T>,
    jacobian: CsrMatrix<T>,
}

impl<T, P, S> DgDiscretization<T, P, S>
where
    T: Real,
    P: Physics<T>,
    S: ManufacturedSolution<T>,
{
    pub fn new(
        mesh: Mesh1d<T>,
        degrees: DegreeDistribution,
        physics: P,
        manufactured_solution: S,
        settings: DgSettings,
    ) -> Result<Self, DgError> {
        let rules = (0..=settings.max_degree)
            .map(|p| gauss(p + 1 + settings.overintegration))
            .collect();
        let mut dg = Self {
            mesh,
            physics,
            manufactured_solution,
            settings,
            rules,
            degrees: DegreeDistribution::new(Vec::new()),
            offsets: vec![0],
            solution: DVector::zeros(0),
            residual: DVector::zeros(0),
            jacobian: CsrMatrix::zeros(0, 0),
        };
        dg.set_degrees(&degrees)?;
        Ok(dg)
    }

    pub fn mesh(&self) -> &Mesh1d<T> {
        &self.mesh
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn manufactured_solution(&self) -> &S {
        &self.manufactured_solution
    }

    pub fn settings(&self) -> &DgSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DgSettings {
        &mut self.settings
    }

    /// Replaces the mesh and degree distribution. The solution is zeroed.
    pub fn set_mesh(&mut self, mesh: Mesh1d<T>, degrees: &DegreeDistribution) -> Result<(), DgError> {
        let previous = std::mem::replace(&mut self.mesh, mesh);
        if let Err(err) = self.set_degrees(degrees) {
            self.mesh = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Validates `degrees` and sets up dof offsets and zeroed vectors.
    fn set_degrees(&mut self, degrees: &DegreeDistribution) -> Result<(), DgError> {
        let n_cells = self.mesh.num_cells();
        if degrees.num_cells() != n_cells {
            return Err(DgError::CellCountMismatch {
                cells: n_cells,
                degrees: degrees.num_cells(),
            });
        }
        let max_degree = self.settings.max_degree;
        if let Some((cell, degree)) = degrees.iter().enumerate().find(|(_, p)| *p > max_degree) {
            return Err(DgError::DegreeAboveMaximum {
                cell,
                degree,
                max_degree,
            });
        }

        self.degrees = degrees.clone();
        self.offsets = std::iter::once(0)
            .chain(degrees.iter().scan(0, |offset, p| {
                *offset += p + 1;
                Some(*offset)
            }))
            .collect();
        let n_dofs = degrees.num_dofs();
        self.solution = DVector::zeros(n_dofs);
        self.residual = DVector::zeros(n_dofs);
        self.jacobian = CsrMatrix::zeros(n_dofs, n_dofs);
        Ok(())
    }

    pub fn cell_solution(&self, cell: usize) -> DVectorView<T> {
        self.solution.rows_range(self.offsets[cell]..self.offsets[cell + 1])
    }

    /// Trace of the solution in `cell` at its left (`xi = -1`) end.
    fn left_trace(&self, cell: usize) -> T {
        self.cell_solution(cell)
            .iter()
            .enumerate()
            .fold(T::zero(), |acc, (i, u)| acc + *u * value_at_left::<T>(i))
    }

    /// Trace of the solution in `cell` at its right (`xi = 1`) end.
    fn right_trace(&self, cell: usize) -> T {
        self.cell_solution(cell).sum()
    }

    /// Interface states `(u_minus, u_plus)` on the left and right of `cell`.
    fn interface_states(&self, cell: usize) -> ((T, T), (T, T)) {
        let (a, b) = self.mesh.domain();
        let last = self.mesh.num_cells() - 1;
        let left_neighbor = if cell == 0 {
            self.manufactured_solution.value(a)
        } else {
            self.right_trace(cell - 1)
        };
        let right_neighbor = if cell == last {
            self.manufactured_solution.value(b)
        } else {
            self.left_trace(cell + 1)
        };
        (
            (left_neighbor, self.left_trace(cell)),
            (self.right_trace(cell), right_neighbor),
        )
    }

    #[allow(clippy::needless_range_loop)]
    fn assemble_cell(&self, cell: usize, with_jacobian: bool) -> CellBlock<T> {
        let p = self.degrees.degree(cell);
        let n = p + 1;
        let (weights, points) = &self.rules[p];
        let half_h = self.mesh.cell_size(cell) / real(2.0);
        let u_cell = self.cell_solution(cell);

        let mut residual = DVector::zeros(n);
        let n_jacobian = if with_jacobian { n } else { 0 };
        let mut diagonal = DMatrix::zeros(n_jacobian, n_jacobian);
        let mut phi = vec![T::zero(); n];
        let mut dphi = vec![T::zero(); n];

        for (&w, &xi) in weights.iter().zip(points) {
            populate_legendre_with_derivatives(&mut phi, &mut dphi, xi);
            let u = phi
                .iter()
                .zip(u_cell.iter())
                .fold(T::zero(), |acc, (phi_i, u_i)| acc + *phi_i * *u_i);
            let x = self.mesh.to_physical(cell, xi);
            let flux = self.physics.flux(u);
            let source = source_term(&self.physics, &self.manufactured_solution, x);

            // dv/dx dx = dv/dxi dxi, so the Jacobian of the map cancels in the flux term
            for j in 0..n {
                residual[j] -= w * (flux * dphi[j] + half_h * source * phi[j]);
            }
            if with_jacobian {
                let dflux = self.physics.flux_derivative(u);
                for j in 0..n {
                    for i in 0..n {
                        diagonal[(j, i)] -= w * dflux * phi[i] * dphi[j];
                    }
                }
            }
        }

        let ((left_minus, left_plus), (right_minus, right_plus)) = self.interface_states(cell);
        let flux_left = self.physics.numerical_flux(left_minus, left_plus);
        let flux_right = self.physics.numerical_flux(right_minus, right_plus);
        for j in 0..n {
            residual[j] += flux_right.value * value_at_right::<T>(j) - flux_left.value * value_at_left::<T>(j);
        }

        let mut lower = None;
        let mut upper = None;
        if with_jacobian {
            for j in 0..n {
                for i in 0..n {
                    diagonal[(j, i)] += flux_right.d_minus * value_at_right::<T>(i) * value_at_right::<T>(j)
                        - flux_left.d_plus * value_at_left::<T>(i) * value_at_left::<T>(j);
                }
            }
            if cell > 0 {
                let n_left = self.degrees.degree(cell - 1) + 1;
                lower = Some(DMatrix::from_fn(n, n_left, |j, i| {
                    -flux_left.d_minus * value_at_right::<T>(i) * value_at_left::<T>(j)
                }));
            }
            if cell + 1 < self.mesh.num_cells() {
                let n_right = self.degrees.degree(cell + 1) + 1;
                upper = Some(DMatrix::from_fn(n, n_right, |j, i| {
                    flux_right.d_plus * value_at_left::<T>(i) * value_at_right::<T>(j)
                }));
            }
        }

        CellBlock {
            residual,
            diagonal,
            lower,
            upper,
        }
    }

    fn assemble(&mut self, with_jacobian: bool) {
        let n_cells = self.mesh.num_cells();
        let blocks: Vec<CellBlock<T>> = (0..n_cells)
            .into_par_iter()
            .map(|cell| self.assemble_cell(cell, with_jacobian))
            .collect();

        let n_dofs = self.degrees.num_dofs();
        let mut residual = DVector::zeros(n_dofs);
        for (cell, block) in blocks.iter().enumerate() {
            residual
                .rows_range_mut(self.cell_dofs(cell))
                .copy_from(&block.residual);
        }
        self.residual = residual;

        if with_jacobian {
            let mut coo = CooMatrix::new(n_dofs, n_dofs);
            let mut push_block = |row_offset: usize, col_offset: usize, block: &DMatrix<T>| {
                for j in 0..block.nrows() {
                    for i in 0..block.ncols() {
                        coo.push(row_offset + j, col_offset + i, block[(j, i)]);
                    }
                }
            };
            for (cell, block) in blocks.iter().enumerate() {
                let row_offset = self.offsets[cell];
                push_block(row_offset, row_offset, &block.diagonal);
                if let Some(lower) = &block.lower {
                    push_block(row_offset, self.offsets[cell - 1], lower);
                }
                if let Some(upper) = &block.upper {
                    push_block(row_offset, self.offsets[cell + 1], upper);
                }
            }
            self.jacobian = CsrMatrix::from(&coo);
        }

        debug!(
            "Assembled DG residual{} with {} dofs on {} cells, residual norm {}",
            if with_jacobian { " and Jacobian" } else { "" },
            n_dofs,
            n_cells,
            self.residual.norm()
        );
    }

    /// L2 projection of `f` onto the current space.
    pub fn project(&mut self, f: impl Fn(T) -> T) {
        for cell in 0..self.mesh.num_cells() {
            let n = self.degrees.degree(cell) + 1;
            let (weights, points) = gauss::<T>(2 * n + self.settings.overintegration);
            let mut phi = vec![T::zero(); n];
            let mut coefficients = DVector::zeros(n);
            for (&w, &xi) in weights.iter().zip(&points) {
                populate_legendre(&mut phi, xi);
                let f_x = f(self.mesh.to_physical(cell, xi));
                for i in 0..n {
                    coefficients[i] += w * f_x * phi[i];
                }
            }
            // Modes are orthogonal with norm 2 / (2i + 1)
            for i in 0..n {
                coefficients[i] *= real_from_usize::<T>(2 * i + 1) / real(2.0);
            }
            let dofs = self.cell_dofs(cell);
            self.solution.rows_range_mut(dofs).copy_from(&coefficients);
        }
    }

    /// Value of the solution at the physical point `x`, or `None` outside the domain.
    pub fn evaluate_at(&self, x: T) -> Option<T> {
        let cell = self.mesh.find_cell(x)?;
        Some(evaluate_modes(self.cell_solution(cell), self.mesh.to_reference(cell, x)))
    }

    /// `num_points` equispaced sample coordinates in `cell`, including its end points.
    pub fn sample_points(&self, cell: usize, num_points: usize) -> Vec<T> {
        let num_points = num_points.max(2);
        let denominator = real_from_usize::<T>(num_points - 1);
        (0..num_points)
            .map(|i| {
                let xi = -T::one() + real::<T>(2.0) * real_from_usize::<T>(i) / denominator;
                self.mesh.to_physical(cell, xi)
            })
            .collect()
    }

    /// Samples `(x, u_h(x))` at `num_points` equispaced points in `cell`.
    pub fn sample_cell(&self, cell: usize, num_points: usize) -> Vec<(T, T)> {
        self.sample_field(self.solution.as_slice(), cell, num_points)
    }

    fn sample_field(&self, field: &[T], cell: usize, num_points: usize) -> Vec<(T, T)> {
        let coefficients = DVectorView::from_slice(&field[self.cell_dofs(cell)], self.degrees.degree(cell) + 1);
        self.sample_points(cell, num_points)
            .into_iter()
            .map(|x| (x, evaluate_modes(coefficients, self.mesh.to_reference(cell, x))))
            .collect()
    }

    /// Jacobi-preconditioned GMRES on `operator`. The transpose shares the diagonal of
    /// `matrix`, so the preconditioner serves both.
    fn solve_iteratively<A: LinearOperator<T>>(
        &self,
        operator: A,
        matrix: &CsrMatrix<T>,
        rhs: &DVector<T>,
    ) -> Result<DVector<T>, Box<dyn Error + Send + Sync>> {
        let (restart, max_iterations, tolerance) = match self.settings.linear_solver {
            LinearSolverParam::Gmres {
                restart,
                max_iterations,
                tolerance,
            } => (restart, max_iterations, tolerance),
            LinearSolverParam::Direct => return Err(Box::from("Iterative solve requested with a direct solver")),
        };
        let mut x = DVector::zeros(rhs.len());
        let output = Gmres::new()
            .with_operator(operator)
            .with_preconditioner(JacobiPreconditioner::from_csr(matrix))
            .with_stopping_criterion(RelativeResidualCriterion::new(real::<T>(tolerance)))
            .with_restart(restart)
            .with_max_iter(max_iterations)
            .solve_with_guess(rhs, &mut x)?;
        debug!("GMRES converged in {} iterations", output.num_iterations);
        Ok(x)
    }

    /// Solves `R(u) = 0` with Newton's method, starting from the current solution.
    ///
    /// On success the solution is updated and the residual is assembled at it.
    pub fn solve_steady_state(&mut self, parameters: &NewtonParam) -> Result<NewtonOutput<T>, NewtonError> {
        let settings = NewtonSettings {
            max_iterations: Some(parameters.max_iterations),
            tolerance: real(parameters.tolerance),
        };
        let n_dofs = self.n_dofs();
        let mut x = self.solution.clone();
        let mut f = DVector::zeros(n_dofs);
        let mut dx = DVector::zeros(n_dofs);

        let problem = SteadyStateProblem { dg: &mut *self };
        let output = if parameters.line_search {
            newton_line_search(
                problem,
                &mut x,
                &mut f,
                &mut dx,
                settings,
                &mut BacktrackingLineSearch::default(),
            )?
        } else {
            newton(problem, &mut x, &mut f, &mut dx, settings)?
        };

        self.solution = x;
        self.assemble(false);
        Ok(output)
    }
}

fn evaluate_modes<T: Real>(coefficients: DVectorView<T>, xi: T) -> T {
    let mut phi = vec![T::zero(); coefficients.len()];
    populate_legendre(&mut phi, xi);
    phi.iter()
        .zip(coefficients.iter())
        .fold(T::zero(), |acc, (phi_i, c)| acc + *phi_i * *c)
}

impl<T, P, S> Discretization<T> for DgDiscretization<T, P, S>
where
    T: Real,
    P: Physics<T>,
    S: ManufacturedSolution<T>,
{
    fn n_dofs(&self) -> usize {
        self.solution.len()
    }

    fn n_cells(&self) -> usize {
        self.mesh.num_cells()
    }

    fn cell_dofs(&self, cell: usize) -> Range<usize> {
        self.offsets[cell]..self.offsets[cell + 1]
    }

    fn max_degree(&self) -> usize {
        self.settings.max_degree
    }

    fn degree_distribution(&self) -> &DegreeDistribution {
        &self.degrees
    }

    fn solution(&self) -> &DVector<T> {
        &self.solution
    }

    fn solution_mut(&mut self) -> &mut DVector<T> {
        &mut self.solution
    }

    fn reallocate(&mut self, degrees: &DegreeDistribution) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.set_degrees(degrees)?;
        Ok(())
    }

    fn transfer_to(&mut self, degrees: &DegreeDistribution) -> Result<(), Box<dyn Error + Send + Sync>> {
        let old_solution = std::mem::replace(&mut self.solution, DVector::zeros(0));
        let old_offsets = self.offsets.clone();
        if let Err(err) = self.set_degrees(degrees) {
            self.solution = old_solution;
            return Err(Box::new(err));
        }

        // Orthogonal modes: the L2 projection keeps the shared modes and drops or zero-pads the rest
        for cell in 0..self.mesh.num_cells() {
            let old = old_offsets[cell]..old_offsets[cell + 1];
            let new = self.cell_dofs(cell);
            let shared = old.len().min(new.len());
            self.solution
                .rows_mut(new.start, shared)
                .copy_from(&old_solution.rows(old.start, shared));
        }
        Ok(())
    }

    fn assemble_residual(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.assemble(false);
        Ok(())
    }

    fn assemble_residual_and_jacobian(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.assemble(true);
        Ok(())
    }

    fn residual(&self) -> &DVector<T> {
        &self.residual
    }

    fn system_matrix(&self) -> &CsrMatrix<T> {
        &self.jacobian
    }

    fn solve_linear_system(&self, matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> Result<DVector<T>, Box<dyn Error + Send + Sync>> {
        match self.settings.linear_solver {
            LinearSolverParam::Direct => Ok(lu_solve(matrix, rhs)?),
            LinearSolverParam::Gmres { .. } => self.solve_iteratively(matrix, matrix, rhs),
        }
    }

    fn solve_transposed_linear_system(
        &self,
        matrix: &CsrMatrix<T>,
        rhs: &DVector<T>,
    ) -> Result<DVector<T>, Box<dyn Error + Send + Sync>> {
        match self.settings.linear_solver {
            LinearSolverParam::Direct => Ok(lu_solve_transpose(matrix, rhs)?),
            LinearSolverParam::Gmres { .. } => self.solve_iteratively(TransposedCsr(matrix), matrix, rhs),
        }
    }

    fn output_results_vtk(&self, cycle: usize, fields: &[OutputField<'_, T>]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let output = &self.settings.output;
        let num_samples = output.samples_per_cell.max(1) + 1;
        let n_cells = self.n_cells();

        let cell_samples: Vec<Vec<T>> = (0..n_cells)
            .map(|cell| self.sample_points(cell, num_samples))
            .collect();
        let sample_dof_field = |values: &[T]| -> Vec<T> {
            (0..n_cells)
                .flat_map(|cell| self.sample_field(values, cell, num_samples))
                .map(|(_, u)| u)
                .collect()
        };

        let exact = cell_samples
            .iter()
            .flatten()
            .map(|x| self.manufactured_solution.value(*x))
            .collect::<Vec<_>>();
        let mut builder = DgDataSetBuilder::from_cell_samples(&cell_samples)
            .with_title(format!("{} cycle {}", output.prefix, cycle))
            .with_point_scalars("solution", sample_dof_field(self.solution.as_slice()))
            .with_point_scalars("exact_solution", exact)
            .with_cell_scalars("degree", self.degrees.iter().map(real_from_usize::<T>))
            .with_cell_scalars("cell_index", (0..n_cells).map(real_from_usize::<T>));

        for field in fields {
            builder = match *field {
                OutputField::DofVector { name, values } => {
                    if values.len() != self.n_dofs() {
                        return Err(Box::new(DgError::DimensionMismatch {
                            expected: self.n_dofs(),
                            actual: values.len(),
                        }));
                    }
                    builder.with_point_scalars(name, sample_dof_field(values.as_slice()))
                }
                OutputField::CellScalars { name, values } => {
                    if values.len() != n_cells {
                        return Err(Box::new(DgError::DimensionMismatch {
                            expected: n_cells,
                            actual: values.len(),
                        }));
                    }
                    builder.with_cell_scalars(name, values.iter().copied())
                }
            };
        }

        let path = output
            .directory
            .join(format!("{}-{:04}.vtk", output.prefix, cycle));
        builder.try_export(&path)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl<T, P, S> VolumeQuadrature<T> for DgDiscretization<T, P, S>
where
    T: Real,
    P: Physics<T>,
    S: ManufacturedSolution<T>,
{
    fn cell_quadrature(&self, cell: usize) -> CellQuadrature<T> {
        let n = self.degrees.degree(cell) + 1;
        let (weights, points) = &self.rules[n - 1];
        let half_h = self.mesh.cell_size(cell) / real(2.0);
        let mut phi = vec![T::zero(); n];
        let mut basis = DMatrix::zeros(points.len(), n);
        for (q, &xi) in points.iter().enumerate() {
            populate_legendre(&mut phi, xi);
            basis.row_mut(q).copy_from_slice(&phi);
        }
        CellQuadrature {
            points: points
                .iter()
                .map(|&xi| self.mesh.to_physical(cell, xi))
                .collect(),
            weights: weights.iter().map(|&w| w * half_h).collect(),
            basis,
        }
    }
}

/// Adapter exposing the DG residual to Newton's method.
struct SteadyStateProblem<'a, T: Real, P, S> {
    dg: &'a mut DgDiscretization<T, P, S>,
}

impl<'a, T, P, S> VectorFunction<T> for SteadyStateProblem<'a, T, P, S>
where
    T: Real,
    P: Physics<T>,
    S: ManufacturedSolution<T>,
{
    fn dimension(&self) -> usize {
        self.dg.n_dofs()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.dg.solution.copy_from(x);
        self.dg.assemble(false);
        f.copy_from(&self.dg.residual);
        Ok(())
    }
}

impl<'a, T, P, S> DifferentiableVectorFunction<T> for SteadyStateProblem<'a, T, P, S>
where
    T: Real,
    P: Physics<T>,
    S: ManufacturedSolution<T>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.dg.solution.copy_from(x);
        self.dg.assemble(true);
        let solution = self
            .dg
            .solve_linear_system(&self.dg.jacobian, &rhs.clone_owned())?;
        sol.copy_from(&solution);
        Ok(())
    }
}
