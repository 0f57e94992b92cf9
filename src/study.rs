//! Adjoint-driven p-refinement studies on manufactured solutions.
use crate::adjoint::{Adjoint, AdjointState};
use crate::dg::{DgDiscretization, DgSettings};
use crate::discretization::Discretization;
use crate::error::{estimate_L2_error, exact_functional_value};
use crate::functional::{Functional, VolumeFunctional};
use crate::mesh::Mesh1d;
use crate::parameters::AllParameters;
use crate::physics::ManufacturedSolution;
use crate::refinement::p_refine_enrichable;
use crate::transfer::DegreeDistribution;
use eyre::{eyre, WrapErr};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::{create_dir_all, File};
use std::path::Path;

/// Results of one refinement cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct CycleRecord {
    pub cycle: usize,
    pub cells: usize,
    pub dofs: usize,
    pub degrees: Vec<usize>,
    pub newton_iterations: usize,
    /// $\mathcal{J}(u_H)$
    pub functional: f64,
    /// $\mathcal{J}(u) - \mathcal{J}(u_H)$
    pub error: f64,
    /// Sum of the dual-weighted residual.
    pub estimate: f64,
    /// `estimate / error`, absent when the error vanishes.
    pub effectivity: Option<f64>,
    pub L2_error: f64,
    pub indicator: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub parameters: AllParameters,
    pub exact_functional: f64,
    pub cycles: Vec<CycleRecord>,
}

impl StudySummary {
    pub fn write_json(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            create_dir_all(parent).wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = File::create(path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(&mut file, self).wrap_err("Failed to write study summary")?;
        Ok(())
    }
}

/// Keeps the source chain of errors boxed by a discretization.
fn report(err: Box<dyn Error + Send + Sync>) -> eyre::Report {
    eyre!(err)
}

pub struct GridRefinementStudy;

impl GridRefinementStudy {
    /// Runs `refinement_steps + 1` cycles of solve, adjoint, estimate and p-refinement.
    pub fn run(parameters: &AllParameters) -> eyre::Result<StudySummary> {
        parameters.validate().wrap_err("Invalid study parameters")?;

        let grid = &parameters.grid;
        let mesh = if grid.grading_ratio == 1.0 {
            Mesh1d::uniform(grid.left, grid.right, grid.num_cells)
        } else {
            Mesh1d::graded(grid.left, grid.right, grid.num_cells, grid.grading_ratio)
        }
        .wrap_err("Failed to build study mesh")?;

        let disc = &parameters.discretization;
        let settings = DgSettings {
            max_degree: disc.max_degree,
            overintegration: disc.overintegration,
            linear_solver: parameters.linear_solver.clone(),
            output: parameters.output.clone(),
        };
        let physics = parameters.physics;
        let manufactured = parameters.manufactured_solution.clone();
        let functional = VolumeFunctional::new(parameters.functional);

        let exact_functional = exact_functional_value(functional.integrand(), &manufactured, &mesh);
        info!("Exact functional value: {}", exact_functional);

        let degrees = DegreeDistribution::uniform(mesh.num_cells(), disc.initial_degree);
        let mut dg = DgDiscretization::new(mesh, degrees, physics, manufactured.clone(), settings)
            .wrap_err("Failed to set up discretization")?;
        dg.project(|x| manufactured.value(x));

        let mut adjoint = Adjoint::new(&mut dg, &functional, &physics);
        let strategy = &parameters.grid_refinement.strategy;
        let num_cycles = parameters.grid_refinement.refinement_steps + 1;
        let mut cycles = Vec::with_capacity(num_cycles);

        for cycle in 0..num_cycles {
            let newton = adjoint
                .discretization_mut()
                .solve_steady_state(&parameters.newton)
                .wrap_err_with(|| format!("Steady state solve failed in cycle {}", cycle))?;
            adjoint.reinit();

            let dg = adjoint.discretization();
            let functional_value = functional.evaluate(dg, &physics);
            let l2_error = estimate_L2_error(dg, &manufactured);
            let cells = dg.n_cells();
            let dofs = dg.n_dofs();
            let degrees = dg.degree_distribution().clone();

            adjoint
                .fine_grid_adjoint()
                .wrap_err_with(|| format!("Fine grid adjoint failed in cycle {}", cycle))?;
            let indicator: Vec<f64> = adjoint.dual_weighted_residual()?.iter().copied().collect();
            let estimate = adjoint.dwr_error_estimate()?;
            if parameters.output.write_vtk {
                adjoint.output_results_vtk(cycle)?;
            }
            adjoint.convert_to_state(AdjointState::Coarse)?;

            let error = exact_functional - functional_value;
            let effectivity = if error != 0.0 { Some(estimate / error) } else { None };
            info!(
                "Cycle {}: {} cells, {} dofs, functional error {:e}, estimate {:e}, L2 error {:e}",
                cycle, cells, dofs, error, estimate, l2_error
            );

            if cycle + 1 < num_cycles {
                let marked = strategy.mark(&indicator);
                let refined = p_refine_enrichable(&degrees, &marked, disc.max_degree);
                adjoint
                    .discretization_mut()
                    .transfer_to(&refined)
                    .map_err(report)
                    .wrap_err_with(|| format!("Failed to transfer to refined degrees after cycle {}", cycle))?;
            }

            cycles.push(CycleRecord {
                cycle,
                cells,
                dofs,
                degrees: degrees.as_slice().to_vec(),
                newton_iterations: newton.iterations,
                functional: functional_value,
                error,
                estimate,
                effectivity,
                L2_error: l2_error,
                indicator,
            });
        }

        let summary = StudySummary {
            parameters: parameters.clone(),
            exact_functional,
            cycles,
        };
        if let Some(path) = &parameters.output.summary_file {
            summary.write_json(path)?;
        }
        Ok(summary)
    }
}
