//! Moving solution state between a coarse degree distribution and its p-enrichment.
use crate::adjoint::AdjointError;
use crate::discretization::Discretization;
use hpdwr_traits::Real;
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Polynomial degree of every cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DegreeDistribution {
    degrees: Vec<usize>,
}

impl DegreeDistribution {
    pub fn new(degrees: Vec<usize>) -> Self {
        Self { degrees }
    }

    pub fn uniform(num_cells: usize, degree: usize) -> Self {
        Self::new(vec![degree; num_cells])
    }

    pub fn num_cells(&self) -> usize {
        self.degrees.len()
    }

    pub fn degree(&self, cell: usize) -> usize {
        self.degrees[cell]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.degrees
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.degrees.iter().copied()
    }

    pub fn max_degree(&self) -> Option<usize> {
        self.iter().max()
    }

    /// Number of modal dofs, `sum_K (p_K + 1)`.
    pub fn num_dofs(&self) -> usize {
        self.iter().map(|p| p + 1).sum()
    }

    /// The distribution with every degree raised by one.
    ///
    /// Fails with [`AdjointError::DegreeOverflow`] for the first cell whose enriched degree
    /// would exceed `max_degree`.
    pub fn enriched(&self, max_degree: usize) -> Result<Self, AdjointError> {
        if let Some((cell, degree)) = self
            .iter()
            .map(|p| p + 1)
            .enumerate()
            .find(|(_, p)| *p > max_degree)
        {
            return Err(AdjointError::DegreeOverflow {
                cell,
                degree,
                max_degree,
            });
        }
        Ok(Self::new(self.iter().map(|p| p + 1).collect()))
    }
}

impl From<Vec<usize>> for DegreeDistribution {
    fn from(degrees: Vec<usize>) -> Self {
        Self::new(degrees)
    }
}

/// Snapshot of the coarse state, from which the coarse discretization is restored.
#[derive(Debug, Clone, PartialEq)]
pub struct CoarseSnapshot<T: Real> {
    pub solution: DVector<T>,
    pub degrees: DegreeDistribution,
}

impl<T: Real> CoarseSnapshot<T> {
    pub fn capture<D: Discretization<T> + ?Sized>(discretization: &D) -> Self {
        Self {
            solution: discretization.solution().clone(),
            degrees: discretization.degree_distribution().clone(),
        }
    }

    /// Loads the snapshot solution into the discretization, which must hold the snapshot
    /// distribution, and prolongates it onto the enriched distribution.
    ///
    /// The enriched distribution is validated before the discretization is touched.
    pub fn prolongate<D: Discretization<T> + ?Sized>(&self, discretization: &mut D) -> Result<(), AdjointError> {
        let fine = self.degrees.enriched(discretization.max_degree())?;
        if discretization.degree_distribution() != &self.degrees || discretization.n_dofs() != self.solution.len() {
            return Err(AdjointError::DimensionMismatch {
                expected: self.solution.len(),
                actual: discretization.n_dofs(),
            });
        }
        discretization.solution_mut().copy_from(&self.solution);
        discretization
            .transfer_to(&fine)
            .map_err(AdjointError::Discretization)?;
        debug!(
            "Prolongated solution from {} to {} dofs",
            self.solution.len(),
            discretization.n_dofs()
        );
        Ok(())
    }

    /// Reallocates the discretization for the snapshot distribution and restores the
    /// snapshot solution verbatim.
    pub fn restore<D: Discretization<T> + ?Sized>(&self, discretization: &mut D) -> Result<(), AdjointError> {
        discretization
            .reallocate(&self.degrees)
            .map_err(AdjointError::Discretization)?;
        let n_dofs = discretization.n_dofs();
        if n_dofs != self.solution.len() {
            return Err(AdjointError::DimensionMismatch {
                expected: self.solution.len(),
                actual: n_dofs,
            });
        }
        discretization.solution_mut().copy_from(&self.solution);
        debug!("Restored coarse solution with {} dofs", n_dofs);
        Ok(())
    }
}
