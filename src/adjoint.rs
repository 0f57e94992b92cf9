//! Discrete adjoint and dual-weighted-residual error estimation.
//!
//! For a steady discretization $R(u) = 0$ and a functional $\mathcal{J}(u)$, the discrete
//! adjoint $\psi$ solves
//!
//! $$ \left(\frac{\partial R}{\partial u}\right)^T \psi = -\left(\frac{\partial \mathcal{J}}{\partial u}\right)^T. $$
//!
//! Solving the adjoint on a p-enriched ("fine") space and weighting the fine residual of the
//! prolongated coarse solution with it gives the cell-wise indicator
//! $\eta_K = \sum_{i \in K} R_i \psi_i$, whose sum estimates $\mathcal{J}(u_h) - \mathcal{J}(u_H)$.
use crate::discretization::{Discretization, OutputField};
use crate::functional::Functional;
use crate::transfer::{CoarseSnapshot, DegreeDistribution};
use hpdwr_sparse::operator::{LinearOperator, TransposedCsr};
use hpdwr_traits::Real;
use log::{debug, info, log_enabled, Level};
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use std::error::Error;
use std::fmt;

/// Which degree distribution is loaded into the discretization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AdjointState {
    Coarse,
    Fine,
}

impl fmt::Display for AdjointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjointState::Coarse => write!(f, "coarse"),
            AdjointState::Fine => write!(f, "fine"),
        }
    }
}

#[derive(Debug)]
pub enum AdjointError {
    /// The requested transition does not start from the current state.
    InvalidTransition { from: AdjointState, to: AdjointState },
    /// Enriching `cell` would raise its degree to `degree`, above the supported maximum.
    DegreeOverflow { cell: usize, degree: usize, max_degree: usize },
    /// The fine adjoint has not been computed since construction or the last reinit.
    FineAdjointUnavailable,
    /// The dual-weighted residual has not been computed from the current fine adjoint.
    DwrUnavailable,
    /// A vector does not match the number of dofs it is combined with.
    DimensionMismatch { expected: usize, actual: usize },
    /// The adjoint linear system could not be solved.
    LinearSolve(Box<dyn Error + Send + Sync>),
    /// The discretization failed during transfer, assembly or export.
    Discretization(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for AdjointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjointError::InvalidTransition { from, to } => {
                write!(f, "Cannot transition to the {} state from the {} state", to, from)
            }
            AdjointError::DegreeOverflow {
                cell,
                degree,
                max_degree,
            } => write!(
                f,
                "Enriched degree {} of cell {} exceeds the maximum supported degree {}",
                degree, cell, max_degree
            ),
            AdjointError::FineAdjointUnavailable => {
                write!(f, "The fine grid adjoint must be computed before the dual-weighted residual")
            }
            AdjointError::DwrUnavailable => write!(f, "The dual-weighted residual has not been computed"),
            AdjointError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected length {}, got {}", expected, actual)
            }
            AdjointError::LinearSolve(err) => write!(f, "Failed to solve adjoint system: {}", err),
            AdjointError::Discretization(err) => write!(f, "Discretization failure: {}", err),
        }
    }
}

impl Error for AdjointError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AdjointError::LinearSolve(err) | AdjointError::Discretization(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Whether a stored field reflects the current discretization.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FieldStatus {
    Stale,
    Current,
}

/// Adjoint engine bound to a live discretization, functional and physics.
///
/// The engine starts in the [`AdjointState::Coarse`] state with a snapshot of the loaded
/// solution and degree distribution. Adjoint computations switch the discretization between
/// the coarse distribution and its uniform p-enrichment as needed. After changing the
/// discretization through [`Adjoint::discretization_mut`], call [`Adjoint::reinit`].
#[allow(non_snake_case)]
pub struct Adjoint<'a, T, D, F, P>
where
    T: Real,
    D: ?Sized,
    F: ?Sized,
    P: ?Sized,
{
    discretization: &'a mut D,
    functional: &'a F,
    physics: &'a P,
    state: AdjointState,
    coarse: CoarseSnapshot<T>,
    dIdw_coarse: DVector<T>,
    dIdw_fine: DVector<T>,
    adjoint_coarse: DVector<T>,
    adjoint_fine: DVector<T>,
    dual_weighted_residual_fine: DVector<T>,
    fine_adjoint_status: FieldStatus,
    dwr_status: FieldStatus,
}

#[allow(non_snake_case)]
impl<'a, T, D, F, P> Adjoint<'a, T, D, F, P>
where
    T: Real,
    D: Discretization<T> + ?Sized,
    F: Functional<T, D, P> + ?Sized,
    P: ?Sized,
{
    /// Binds the engine to the given collaborators, treating the loaded state as coarse.
    pub fn new(discretization: &'a mut D, functional: &'a F, physics: &'a P) -> Self {
        let coarse = CoarseSnapshot::capture(&*discretization);
        let mut adjoint = Self {
            discretization,
            functional,
            physics,
            state: AdjointState::Coarse,
            coarse,
            dIdw_coarse: DVector::zeros(0),
            dIdw_fine: DVector::zeros(0),
            adjoint_coarse: DVector::zeros(0),
            adjoint_fine: DVector::zeros(0),
            dual_weighted_residual_fine: DVector::zeros(0),
            fine_adjoint_status: FieldStatus::Stale,
            dwr_status: FieldStatus::Stale,
        };
        adjoint.resize_fields();
        adjoint
    }

    /// Re-snapshots the loaded solution and degree distribution as the coarse state and
    /// invalidates all adjoint fields.
    pub fn reinit(&mut self) {
        self.coarse = CoarseSnapshot::capture(&*self.discretization);
        self.state = AdjointState::Coarse;
        self.fine_adjoint_status = FieldStatus::Stale;
        self.dwr_status = FieldStatus::Stale;
        self.resize_fields();
        debug!("Adjoint reinitialized with {} coarse dofs", self.coarse.solution.len());
    }

    fn resize_fields(&mut self) {
        let n_coarse = self.coarse.solution.len();
        // The fine size is only known once the enrichment is validated
        let n_fine = self
            .coarse
            .degrees
            .enriched(self.discretization.max_degree())
            .map(|fine| fine.num_dofs())
            .unwrap_or(0);
        let n_cells = self.coarse.degrees.num_cells();
        self.dIdw_coarse = DVector::zeros(n_coarse);
        self.adjoint_coarse = DVector::zeros(n_coarse);
        self.dIdw_fine = DVector::zeros(n_fine);
        self.adjoint_fine = DVector::zeros(n_fine);
        self.dual_weighted_residual_fine = DVector::zeros(n_cells);
    }

    pub fn state(&self) -> AdjointState {
        self.state
    }

    pub fn discretization(&self) -> &D {
        &*self.discretization
    }

    /// Mutable access to the discretization. Follow any change with [`Adjoint::reinit`].
    pub fn discretization_mut(&mut self) -> &mut D {
        &mut *self.discretization
    }

    pub fn functional(&self) -> &F {
        self.functional
    }

    pub fn physics(&self) -> &P {
        self.physics
    }

    pub fn solution_coarse(&self) -> &DVector<T> {
        &self.coarse.solution
    }

    pub fn coarse_fe_index(&self) -> &DegreeDistribution {
        &self.coarse.degrees
    }

    pub fn dIdw_coarse(&self) -> &DVector<T> {
        &self.dIdw_coarse
    }

    pub fn dIdw_fine(&self) -> &DVector<T> {
        &self.dIdw_fine
    }

    pub fn adjoint_coarse(&self) -> &DVector<T> {
        &self.adjoint_coarse
    }

    pub fn adjoint_fine(&self) -> &DVector<T> {
        &self.adjoint_fine
    }

    pub fn dual_weighted_residual_fine(&self) -> &DVector<T> {
        &self.dual_weighted_residual_fine
    }

    /// Switches to the p-enriched distribution, prolongating the coarse solution captured at
    /// construction or the last [`Adjoint::reinit`].
    ///
    /// Changes made to the loaded solution since then are discarded. Nothing is modified if the
    /// enrichment would exceed the maximum degree.
    pub fn coarse_to_fine(&mut self) -> Result<(), AdjointError> {
        if self.state != AdjointState::Coarse {
            return Err(AdjointError::InvalidTransition {
                from: self.state,
                to: AdjointState::Fine,
            });
        }
        let n_dofs = self.discretization.n_dofs();
        self.coarse.prolongate(&mut *self.discretization)?;
        self.state = AdjointState::Fine;
        info!(
            "Switched to fine state: {} -> {} dofs",
            n_dofs,
            self.discretization.n_dofs()
        );
        Ok(())
    }

    /// Switches back to the coarse distribution, restoring the coarse solution snapshot.
    pub fn fine_to_coarse(&mut self) -> Result<(), AdjointError> {
        if self.state != AdjointState::Fine {
            return Err(AdjointError::InvalidTransition {
                from: self.state,
                to: AdjointState::Coarse,
            });
        }
        let n_fine = self.discretization.n_dofs();
        self.coarse.restore(&mut *self.discretization)?;
        self.state = AdjointState::Coarse;
        info!(
            "Switched to coarse state: {} -> {} dofs",
            n_fine,
            self.discretization.n_dofs()
        );
        Ok(())
    }

    /// Switches to `target` unless it is already the current state.
    pub fn convert_to_state(&mut self, target: AdjointState) -> Result<(), AdjointError> {
        match (self.state, target) {
            (AdjointState::Coarse, AdjointState::Fine) => self.coarse_to_fine(),
            (AdjointState::Fine, AdjointState::Coarse) => self.fine_to_coarse(),
            _ => Ok(()),
        }
    }

    /// Computes the adjoint on the p-enriched space, at the prolongated coarse solution.
    pub fn fine_grid_adjoint(&mut self) -> Result<&DVector<T>, AdjointError> {
        self.convert_to_state(AdjointState::Fine)?;
        let (dIdw, adjoint) = self.solve_adjoint()?;
        self.dIdw_fine = dIdw;
        self.adjoint_fine = adjoint;
        self.fine_adjoint_status = FieldStatus::Current;
        self.dwr_status = FieldStatus::Stale;
        Ok(&self.adjoint_fine)
    }

    /// Computes the adjoint on the coarse space.
    pub fn coarse_grid_adjoint(&mut self) -> Result<&DVector<T>, AdjointError> {
        self.convert_to_state(AdjointState::Coarse)?;
        let (dIdw, adjoint) = self.solve_adjoint()?;
        self.dIdw_coarse = dIdw;
        self.adjoint_coarse = adjoint;
        Ok(&self.adjoint_coarse)
    }

    /// Assembles and solves the adjoint system in the current state.
    ///
    /// Returns `(dIdw, adjoint)` without storing anything.
    fn solve_adjoint(&mut self) -> Result<(DVector<T>, DVector<T>), AdjointError> {
        self.discretization
            .assemble_residual_and_jacobian()
            .map_err(AdjointError::Discretization)?;

        let n_dofs = self.discretization.n_dofs();
        let dIdw = self
            .functional
            .evaluate_dIdw(&*self.discretization, self.physics);
        check_length(n_dofs, dIdw.len())?;

        let jacobian = self.discretization.system_matrix();
        let rhs = -&dIdw;
        let adjoint = self
            .discretization
            .solve_transposed_linear_system(jacobian, &rhs)
            .map_err(AdjointError::LinearSolve)?;
        check_length(n_dofs, adjoint.len())?;

        if log_enabled!(Level::Debug) {
            // |J^T psi + dIdw|
            let mut residual = dIdw.clone();
            let mut product = DVector::zeros(n_dofs);
            TransposedCsr(jacobian)
                .apply(DVectorViewMut::from(&mut product), DVectorView::from(&adjoint))
                .map_err(AdjointError::LinearSolve)?;
            residual += product;
            debug!(
                "Solved {} adjoint with {} dofs, adjoint equation residual norm {}",
                self.state,
                n_dofs,
                residual.norm()
            );
        }

        Ok((dIdw, adjoint))
    }

    /// Computes the cell-wise indicator $\eta_K = \sum_{i \in K} R_i \psi_i$ from the fine
    /// residual at the prolongated coarse solution and the fine adjoint.
    ///
    /// Requires [`Adjoint::fine_grid_adjoint`] since construction or the last reinit.
    pub fn dual_weighted_residual(&mut self) -> Result<&DVector<T>, AdjointError> {
        if self.fine_adjoint_status != FieldStatus::Current {
            return Err(AdjointError::FineAdjointUnavailable);
        }
        self.convert_to_state(AdjointState::Fine)?;
        self.discretization
            .assemble_residual()
            .map_err(AdjointError::Discretization)?;

        let residual = self.discretization.residual();
        check_length(self.adjoint_fine.len(), residual.len())?;

        let n_cells = self.discretization.n_cells();
        let indicator = DVector::from_iterator(
            n_cells,
            (0..n_cells).map(|cell| {
                let dofs = self.discretization.cell_dofs(cell);
                residual
                    .rows_range(dofs.clone())
                    .dot(&self.adjoint_fine.rows_range(dofs))
            }),
        );

        self.dual_weighted_residual_fine = indicator;
        self.dwr_status = FieldStatus::Current;
        info!(
            "Dual-weighted residual over {} cells, total {}",
            n_cells,
            self.dual_weighted_residual_fine.sum()
        );
        Ok(&self.dual_weighted_residual_fine)
    }

    /// Signed sum of the dual-weighted residual, an estimate of $\mathcal{J}(u_h) - \mathcal{J}(u_H)$.
    pub fn dwr_error_estimate(&self) -> Result<T, AdjointError> {
        match self.dwr_status {
            FieldStatus::Current => Ok(self.dual_weighted_residual_fine.sum()),
            FieldStatus::Stale => Err(AdjointError::DwrUnavailable),
        }
    }

    /// Exports the loaded solution with the functional derivative and adjoint of the current
    /// state, and the dual-weighted residual when it is available.
    pub fn output_results_vtk(&self, cycle: usize) -> Result<(), AdjointError> {
        let n_dofs = self.discretization.n_dofs();
        let (dIdw, adjoint) = match self.state {
            AdjointState::Coarse => (&self.dIdw_coarse, &self.adjoint_coarse),
            AdjointState::Fine => (&self.dIdw_fine, &self.adjoint_fine),
        };

        let mut fields = Vec::with_capacity(3);
        if dIdw.len() == n_dofs && adjoint.len() == n_dofs {
            fields.push(OutputField::DofVector {
                name: "dIdw",
                values: dIdw,
            });
            fields.push(OutputField::DofVector {
                name: "psi",
                values: adjoint,
            });
        } else {
            debug!("Skipping adjoint fields in output, sizes do not match the {} state", self.state);
        }
        if self.state == AdjointState::Fine && self.dwr_status == FieldStatus::Current {
            fields.push(OutputField::CellScalars {
                name: "DWR",
                values: &self.dual_weighted_residual_fine,
            });
        }

        self.discretization
            .output_results_vtk(cycle, &fields)
            .map_err(AdjointError::Discretization)
    }
}

fn check_length(expected: usize, actual: usize) -> Result<(), AdjointError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AdjointError::DimensionMismatch { expected, actual })
    }
}
