//! Scalar quantities of interest and their exact derivatives with respect to the discrete
//! solution.
use crate::discretization::VolumeQuadrature;
use hpdwr_traits::{real, Real};
use nalgebra::DVector;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// A functional $\mathcal{J}(u_h)$ evaluated at the discretization's current solution.
#[allow(non_snake_case)]
pub trait Functional<T: Real, D: ?Sized, P: ?Sized> {
    fn evaluate(&self, discretization: &D, physics: &P) -> T;

    /// The gradient $\partial \mathcal{J} / \partial u$, one entry per dof.
    fn evaluate_dIdw(&self, discretization: &D, physics: &P) -> DVector<T>;
}

/// Pointwise integrand `g(x, u)` of a volume functional.
pub trait FunctionalIntegrand<T: Real> {
    fn value(&self, x: T, u: T) -> T;

    /// `dg/du`
    fn derivative(&self, x: T, u: T) -> T;
}

/// $\int u \, dx$
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct SolutionIntegral;

impl<T: Real> FunctionalIntegrand<T> for SolutionIntegral {
    fn value(&self, _x: T, u: T) -> T {
        u
    }

    fn derivative(&self, _x: T, _u: T) -> T {
        T::one()
    }
}

/// $\int \exp(-((x - c) / w)^2) u \, dx$, a smooth localized average.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WeightedIntegral<T> {
    pub center: T,
    pub width: T,
}

impl<T: Real> WeightedIntegral<T> {
    fn weight(&self, x: T) -> T {
        let s = (x - self.center) / self.width;
        (-s * s).exp()
    }
}

impl<T: Real> FunctionalIntegrand<T> for WeightedIntegral<T> {
    fn value(&self, x: T, u: T) -> T {
        self.weight(x) * u
    }

    fn derivative(&self, x: T, _u: T) -> T {
        self.weight(x)
    }
}

/// $\int |u|^p \, dx$ for `p >= 1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NormLp<T> {
    pub p: T,
}

impl<T: Real> FunctionalIntegrand<T> for NormLp<T> {
    fn value(&self, _x: T, u: T) -> T {
        u.abs().powf(self.p)
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn derivative(&self, _x: T, u: T) -> T {
        if u == 0.0 {
            // Zero for p > 1, and the subgradient 0 at the kink of |u|
            0.0
        } else {
            self.p * u.abs().powf(self.p - 1.0) * u.signum()
        }
    }
}

/// Functional integrand selected at run time from parameters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunctionalKind {
    SolutionIntegral,
    WeightedIntegral { center: f64, width: f64 },
    NormLp { p: f64 },
}

impl Default for FunctionalKind {
    fn default() -> Self {
        FunctionalKind::WeightedIntegral {
            center: 0.5,
            width: 0.1,
        }
    }
}

impl<T: Real> FunctionalIntegrand<T> for FunctionalKind {
    fn value(&self, x: T, u: T) -> T {
        match *self {
            FunctionalKind::SolutionIntegral => SolutionIntegral.value(x, u),
            FunctionalKind::WeightedIntegral { center, width } => WeightedIntegral {
                center: real(center),
                width: real(width),
            }
            .value(x, u),
            FunctionalKind::NormLp { p } => NormLp { p: real(p) }.value(x, u),
        }
    }

    fn derivative(&self, x: T, u: T) -> T {
        match *self {
            FunctionalKind::SolutionIntegral => SolutionIntegral.derivative(x, u),
            FunctionalKind::WeightedIntegral { center, width } => WeightedIntegral {
                center: real(center),
                width: real(width),
            }
            .derivative(x, u),
            FunctionalKind::NormLp { p } => NormLp { p: real(p) }.derivative(x, u),
        }
    }
}

/// $\mathcal{J}(u_h) = \int_\Omega g(x, u_h) \, dx$, integrated with the discretization's
/// cell quadrature.
///
/// The derivative is exact for the quadrature-discrete functional.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeFunctional<I> {
    integrand: I,
}

impl<I> VolumeFunctional<I> {
    pub fn new(integrand: I) -> Self {
        Self { integrand }
    }

    pub fn integrand(&self) -> &I {
        &self.integrand
    }
}

#[allow(non_snake_case)]
impl<T, D, P, I> Functional<T, D, P> for VolumeFunctional<I>
where
    T: Real,
    D: VolumeQuadrature<T> + ?Sized,
    P: ?Sized,
    I: FunctionalIntegrand<T>,
{
    fn evaluate(&self, discretization: &D, _physics: &P) -> T {
        let solution = discretization.solution();
        (0..discretization.n_cells()).fold(T::zero(), |total, cell| {
            let quadrature = discretization.cell_quadrature(cell);
            let u_cell = solution.rows_range(discretization.cell_dofs(cell));
            let u_q = &quadrature.basis * u_cell;
            quadrature
                .weights
                .iter()
                .zip(&quadrature.points)
                .zip(u_q.iter())
                .fold(total, |acc, ((w, x), u)| acc + *w * self.integrand.value(*x, *u))
        })
    }

    fn evaluate_dIdw(&self, discretization: &D, _physics: &P) -> DVector<T> {
        let solution = discretization.solution();
        let mut dIdw = DVector::zeros(discretization.n_dofs());
        for cell in 0..discretization.n_cells() {
            let dofs = discretization.cell_dofs(cell);
            let quadrature = discretization.cell_quadrature(cell);
            let u_q = &quadrature.basis * solution.rows_range(dofs.clone());

            // dJ/du_i = sum_q w_q g'(x_q, u_q) phi_i(x_q)
            let dg = DVector::from_iterator(
                u_q.len(),
                quadrature
                    .weights
                    .iter()
                    .zip(&quadrature.points)
                    .zip(u_q.iter())
                    .map(|((w, x), u)| *w * self.integrand.derivative(*x, *u)),
            );
            dIdw.rows_range_mut(dofs)
                .gemv_tr(T::one(), &quadrature.basis, &dg, T::zero());
        }
        dIdw
    }
}
