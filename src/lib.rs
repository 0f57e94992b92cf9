//! Discrete adjoint and dual-weighted-residual error estimation for hp-adaptive
//! discontinuous Galerkin discretizations.
//!
//! The core is [`adjoint::Adjoint`], which drives any [`discretization::Discretization`]
//! between a coarse degree distribution and its p-enrichment, solves the adjoint problem of a
//! [`functional::Functional`] on either space and localizes the functional error into a
//! cell-wise indicator. The remaining modules provide a reference one-dimensional modal DG
//! discretization and the tooling to run adaptive studies with it.
pub mod adjoint;
pub mod basis;
pub mod dg;
pub mod discretization;
pub mod error;
pub mod functional;
pub mod io;
pub mod mesh;
pub mod parameters;
pub mod physics;
pub mod quadrature;
pub mod refinement;
pub mod study;
pub mod transfer;

pub mod optimize {
    pub use hpdwr_optimize::*;
}

pub mod sparse {
    pub use hpdwr_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate vtkio;

pub use hpdwr_traits::Real;
