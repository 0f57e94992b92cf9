//! Run-time parameters for grid refinement studies, read from JSON.
//!
//! Every field has a default, so a parameter file only needs to list what differs:
//!
//! ```json
//! {
//!     "grid": { "num_cells": 16 },
//!     "physics": { "type": "burgers" },
//!     "functional": { "type": "norm_lp", "p": 2.0 },
//!     "grid_refinement": { "refinement_steps": 4, "strategy": { "type": "fixed_fraction", "fraction": 0.25 } }
//! }
//! ```
use crate::functional::FunctionalKind;
use crate::physics::{ManufacturedSolutionKind, PhysicsKind};
use crate::refinement::RefinementStrategy;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridParam {
    pub left: f64,
    pub right: f64,
    pub num_cells: usize,
    /// Ratio of consecutive cell sizes. `1.0` gives a uniform grid.
    pub grading_ratio: f64,
}

impl Default for GridParam {
    fn default() -> Self {
        Self {
            left: 0.0,
            right: 1.0,
            num_cells: 8,
            grading_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscretizationParam {
    pub initial_degree: usize,
    pub max_degree: usize,
    /// Extra quadrature points per cell beyond `p + 1`.
    pub overintegration: usize,
}

impl Default for DiscretizationParam {
    fn default() -> Self {
        Self {
            initial_degree: 1,
            max_degree: 8,
            overintegration: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridRefinementParam {
    pub refinement_steps: usize,
    pub strategy: RefinementStrategy,
}

impl Default for GridRefinementParam {
    fn default() -> Self {
        Self {
            refinement_steps: 3,
            strategy: RefinementStrategy::FixedFraction { fraction: 0.3 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewtonParam {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub line_search: bool,
}

impl Default for NewtonParam {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-12,
            line_search: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinearSolverParam {
    /// Dense LU factorization.
    Direct,
    /// Restarted GMRES with a Jacobi preconditioner.
    Gmres {
        restart: usize,
        max_iterations: usize,
        tolerance: f64,
    },
}

impl Default for LinearSolverParam {
    fn default() -> Self {
        LinearSolverParam::Direct
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputParam {
    pub write_vtk: bool,
    pub directory: PathBuf,
    pub prefix: String,
    /// Sample points per cell in VTK output.
    pub samples_per_cell: usize,
    /// Where to write the JSON study summary, if anywhere.
    pub summary_file: Option<PathBuf>,
}

impl Default for OutputParam {
    fn default() -> Self {
        Self {
            write_vtk: false,
            directory: PathBuf::from("output"),
            prefix: "solution".to_string(),
            samples_per_cell: 4,
            summary_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllParameters {
    pub grid: GridParam,
    pub discretization: DiscretizationParam,
    pub physics: PhysicsKind,
    pub manufactured_solution: ManufacturedSolutionKind,
    pub functional: FunctionalKind,
    pub grid_refinement: GridRefinementParam,
    pub newton: NewtonParam,
    pub linear_solver: LinearSolverParam,
    pub output: OutputParam,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterError {
    NoCells,
    EmptyDomain { left: f64, right: f64 },
    InvalidGradingRatio(f64),
    DegreeAboveMaximum { degree: usize, max_degree: usize },
    InvalidFraction(f64),
    InvalidLpExponent(f64),
    InvalidWidth(f64),
    InvalidTolerance(f64),
    ZeroRestart,
    ZeroSamples,
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::NoCells => write!(f, "The grid must have at least one cell"),
            ParameterError::EmptyDomain { left, right } => {
                write!(f, "Domain [{}, {}] is empty", left, right)
            }
            ParameterError::InvalidGradingRatio(ratio) => {
                write!(f, "Grading ratio {} must be positive and finite", ratio)
            }
            ParameterError::DegreeAboveMaximum { degree, max_degree } => {
                write!(
                    f,
                    "Initial degree {} must be below the maximum degree {} so that it can be enriched",
                    degree, max_degree
                )
            }
            ParameterError::InvalidFraction(fraction) => {
                write!(f, "Refinement fraction {} is not in [0, 1]", fraction)
            }
            ParameterError::InvalidLpExponent(p) => write!(f, "Lp exponent {} must be at least 1", p),
            ParameterError::InvalidWidth(width) => write!(f, "Weight width {} must be positive", width),
            ParameterError::InvalidTolerance(tol) => write!(f, "Tolerance {} must be positive", tol),
            ParameterError::ZeroRestart => write!(f, "GMRES restart length must be positive"),
            ParameterError::ZeroSamples => write!(f, "At least one output sample per cell is required"),
        }
    }
}

impl Error for ParameterError {}

impl AllParameters {
    /// Parses and validates parameters from a JSON string.
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        let parameters: Self = serde_json::from_str(json).wrap_err("Failed to parse parameters")?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// Parses and validates parameters from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&json).wrap_err_with(|| format!("Invalid parameter file {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        let grid = &self.grid;
        if grid.num_cells == 0 {
            return Err(ParameterError::NoCells);
        }
        if !(grid.right > grid.left) {
            return Err(ParameterError::EmptyDomain {
                left: grid.left,
                right: grid.right,
            });
        }
        if !(grid.grading_ratio > 0.0) || !grid.grading_ratio.is_finite() {
            return Err(ParameterError::InvalidGradingRatio(grid.grading_ratio));
        }

        let disc = &self.discretization;
        if disc.initial_degree >= disc.max_degree {
            return Err(ParameterError::DegreeAboveMaximum {
                degree: disc.initial_degree,
                max_degree: disc.max_degree,
            });
        }

        if let RefinementStrategy::FixedFraction { fraction } = self.grid_refinement.strategy {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ParameterError::InvalidFraction(fraction));
            }
        }

        match self.functional {
            FunctionalKind::NormLp { p } if !(p >= 1.0) => return Err(ParameterError::InvalidLpExponent(p)),
            FunctionalKind::WeightedIntegral { width, .. } if !(width > 0.0) => {
                return Err(ParameterError::InvalidWidth(width))
            }
            _ => {}
        }

        if !(self.newton.tolerance > 0.0) {
            return Err(ParameterError::InvalidTolerance(self.newton.tolerance));
        }
        if let LinearSolverParam::Gmres { restart, tolerance, .. } = self.linear_solver {
            if restart == 0 {
                return Err(ParameterError::ZeroRestart);
            }
            if !(tolerance > 0.0) {
                return Err(ParameterError::InvalidTolerance(tolerance));
            }
        }

        if self.output.samples_per_cell == 0 {
            return Err(ParameterError::ZeroSamples);
        }
        Ok(())
    }
}
