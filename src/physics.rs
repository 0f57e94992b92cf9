//! Scalar conservation laws `dF(u)/dx = s(x)` and manufactured solutions.
use hpdwr_traits::{real, Real};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Value of a numerical flux together with its partial derivatives with respect to the
/// left (`u_minus`) and right (`u_plus`) traces.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NumericalFlux<T> {
    pub value: T,
    pub d_minus: T,
    pub d_plus: T,
}

/// A differentiable scalar flux with a consistent, differentiable numerical flux.
pub trait Physics<T: Real>: Send + Sync {
    fn flux(&self, u: T) -> T;

    fn flux_derivative(&self, u: T) -> T;

    /// Flux across an interface with trace `u_minus` on the left and `u_plus` on the right.
    fn numerical_flux(&self, u_minus: T, u_plus: T) -> NumericalFlux<T>;

    fn max_wave_speed(&self, u: T) -> T {
        self.flux_derivative(u).abs()
    }
}

impl<T: Real, P: Physics<T> + ?Sized> Physics<T> for &P {
    fn flux(&self, u: T) -> T {
        P::flux(self, u)
    }

    fn flux_derivative(&self, u: T) -> T {
        P::flux_derivative(self, u)
    }

    fn numerical_flux(&self, u_minus: T, u_plus: T) -> NumericalFlux<T> {
        P::numerical_flux(self, u_minus, u_plus)
    }

    fn max_wave_speed(&self, u: T) -> T {
        P::max_wave_speed(self, u)
    }
}

/// `F(u) = a u` with the upwind flux.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LinearAdvection<T> {
    pub velocity: T,
}

impl<T: Real> Physics<T> for LinearAdvection<T> {
    fn flux(&self, u: T) -> T {
        self.velocity * u
    }

    fn flux_derivative(&self, _u: T) -> T {
        self.velocity
    }

    fn numerical_flux(&self, u_minus: T, u_plus: T) -> NumericalFlux<T> {
        let a = self.velocity;
        if a >= T::zero() {
            NumericalFlux {
                value: a * u_minus,
                d_minus: a,
                d_plus: T::zero(),
            }
        } else {
            NumericalFlux {
                value: a * u_plus,
                d_minus: T::zero(),
                d_plus: a,
            }
        }
    }
}

/// Inviscid Burgers, `F(u) = u^2 / 2`, with the Engquist-Osher flux
/// `max(u-, 0)^2 / 2 + min(u+, 0)^2 / 2`.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Burgers;

impl<T: Real> Physics<T> for Burgers {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn flux(&self, u: T) -> T {
        0.5 * u * u
    }

    fn flux_derivative(&self, u: T) -> T {
        u
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn numerical_flux(&self, u_minus: T, u_plus: T) -> NumericalFlux<T> {
        let left = u_minus.max(0.0);
        let right = u_plus.min(0.0);
        NumericalFlux {
            value: 0.5 * (left * left + right * right),
            d_minus: left,
            d_plus: right,
        }
    }
}

/// Physics selected at run time from parameters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhysicsKind {
    LinearAdvection { velocity: f64 },
    Burgers,
}

impl Default for PhysicsKind {
    fn default() -> Self {
        PhysicsKind::LinearAdvection { velocity: 1.0 }
    }
}

impl<T: Real> Physics<T> for PhysicsKind {
    fn flux(&self, u: T) -> T {
        match *self {
            PhysicsKind::LinearAdvection { velocity } => LinearAdvection { velocity: real(velocity) }.flux(u),
            PhysicsKind::Burgers => Burgers.flux(u),
        }
    }

    fn flux_derivative(&self, u: T) -> T {
        match *self {
            PhysicsKind::LinearAdvection { velocity } => real(velocity),
            PhysicsKind::Burgers => Physics::<T>::flux_derivative(&Burgers, u),
        }
    }

    fn numerical_flux(&self, u_minus: T, u_plus: T) -> NumericalFlux<T> {
        match *self {
            PhysicsKind::LinearAdvection { velocity } => LinearAdvection { velocity: real(velocity) }
                .numerical_flux(u_minus, u_plus),
            PhysicsKind::Burgers => Burgers.numerical_flux(u_minus, u_plus),
        }
    }
}

/// A smooth function used to manufacture a steady solution.
pub trait ManufacturedSolution<T: Real>: Send + Sync {
    fn value(&self, x: T) -> T;

    fn derivative(&self, x: T) -> T;
}

impl<T: Real, M: ManufacturedSolution<T> + ?Sized> ManufacturedSolution<T> for &M {
    fn value(&self, x: T) -> T {
        M::value(self, x)
    }

    fn derivative(&self, x: T) -> T {
        M::derivative(self, x)
    }
}

/// The source `s(x) = F'(u(x)) u'(x)` for which `u` solves `dF(u)/dx = s`.
pub fn source_term<T, P, M>(physics: &P, solution: &M, x: T) -> T
where
    T: Real,
    P: Physics<T> + ?Sized,
    M: ManufacturedSolution<T> + ?Sized,
{
    physics.flux_derivative(solution.value(x)) * solution.derivative(x)
}

/// `u(x) = c_0 + c_1 x + c_2 x^2 + ...`
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialSolution<T> {
    pub coefficients: Vec<T>,
}

impl<T: Real> ManufacturedSolution<T> for PolynomialSolution<T> {
    fn value(&self, x: T) -> T {
        // Horner
        self.coefficients
            .iter()
            .rev()
            .fold(T::zero(), |acc, c| acc * x + *c)
    }

    fn derivative(&self, x: T) -> T {
        let mut acc = T::zero();
        for (k, c) in self.coefficients.iter().enumerate().skip(1).rev() {
            acc = acc * x + *c * T::from_usize(k).unwrap_or_else(T::zero);
        }
        acc
    }
}

/// `u(x) = offset + amplitude * sin(frequency * x)`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SineSolution<T> {
    pub offset: T,
    pub amplitude: T,
    pub frequency: T,
}

impl<T: Real> ManufacturedSolution<T> for SineSolution<T> {
    fn value(&self, x: T) -> T {
        self.offset + self.amplitude * (self.frequency * x).sin()
    }

    fn derivative(&self, x: T) -> T {
        self.amplitude * self.frequency * (self.frequency * x).cos()
    }
}

/// `u(x) = offset + amplitude * exp(rate * x)`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ExponentialSolution<T> {
    pub offset: T,
    pub amplitude: T,
    pub rate: T,
}

impl<T: Real> ManufacturedSolution<T> for ExponentialSolution<T> {
    fn value(&self, x: T) -> T {
        self.offset + self.amplitude * (self.rate * x).exp()
    }

    fn derivative(&self, x: T) -> T {
        self.amplitude * self.rate * (self.rate * x).exp()
    }
}

/// Manufactured solution selected at run time from parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManufacturedSolutionKind {
    Polynomial { coefficients: Vec<f64> },
    Sine { offset: f64, amplitude: f64, frequency: f64 },
    Exponential { offset: f64, amplitude: f64, rate: f64 },
}

impl Default for ManufacturedSolutionKind {
    fn default() -> Self {
        ManufacturedSolutionKind::Sine {
            offset: 1.0,
            amplitude: 0.5,
            frequency: std::f64::consts::PI,
        }
    }
}

impl<T: Real> ManufacturedSolution<T> for ManufacturedSolutionKind {
    fn value(&self, x: T) -> T {
        match self {
            Self::Polynomial { coefficients } => polynomial(coefficients).value(x),
            &Self::Sine {
                offset,
                amplitude,
                frequency,
            } => SineSolution {
                offset: real::<T>(offset),
                amplitude: real(amplitude),
                frequency: real(frequency),
            }
            .value(x),
            &Self::Exponential { offset, amplitude, rate } => ExponentialSolution {
                offset: real::<T>(offset),
                amplitude: real(amplitude),
                rate: real(rate),
            }
            .value(x),
        }
    }

    fn derivative(&self, x: T) -> T {
        match self {
            Self::Polynomial { coefficients } => polynomial(coefficients).derivative(x),
            &Self::Sine {
                offset,
                amplitude,
                frequency,
            } => SineSolution {
                offset: real::<T>(offset),
                amplitude: real(amplitude),
                frequency: real(frequency),
            }
            .derivative(x),
            &Self::Exponential { offset, amplitude, rate } => ExponentialSolution {
                offset: real::<T>(offset),
                amplitude: real(amplitude),
                rate: real(rate),
            }
            .derivative(x),
        }
    }
}

fn polynomial<T: Real>(coefficients: &[f64]) -> PolynomialSolution<T> {
    PolynomialSolution {
        coefficients: coefficients.iter().map(|c| real(*c)).collect(),
    }
}
