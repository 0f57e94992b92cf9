//! Linear operators and linear solvers for the (generally non-symmetric) systems arising from
//! discontinuous Galerkin residual linearizations and their adjoints.

pub mod direct;
pub mod gmres;
pub mod operator;

pub use nalgebra_sparse::{CooMatrix, CsrMatrix};
