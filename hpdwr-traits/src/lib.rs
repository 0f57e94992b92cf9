use nalgebra::RealField;

pub use nalgebra;

/// Real scalar type used throughout `hpdwr`.
///
/// Degrees of freedom, residuals, adjoints and indicators are all stored as `Real` values.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Converts an `f64` constant to the scalar type `T`.
///
/// # Panics
///
/// Panics if the value cannot be represented in `T`.
#[inline]
pub fn real<T: Real>(value: f64) -> T {
    T::from_f64(value).expect("f64 constant must be representable in T")
}

/// Converts an integer count, such as a polynomial degree, to the scalar type `T`.
#[inline]
pub fn real_from_usize<T: Real>(value: usize) -> T {
    T::from_usize(value).expect("usize value must be representable in T")
}
