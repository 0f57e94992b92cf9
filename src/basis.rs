//! Modal Legendre basis on the reference interval `[-1, 1]`.
//!
//! The basis is hierarchical: the modes of degree `p` are the first `p + 1` modes of any
//! higher degree, and modes are mutually orthogonal with
//! $\int_{-1}^1 P_m P_n \, d\xi = \frac{2}{2n + 1} \delta_{mn}$.
use hpdwr_traits::{real_from_usize, Real};

/// Fills `values[n] = P_n(xi)` for `n = 0..values.len()`.
pub fn populate_legendre<T: Real>(values: &mut [T], xi: T) {
    let num_modes = values.len();
    if num_modes > 0 {
        values[0] = T::one();
    }
    if num_modes > 1 {
        values[1] = xi;
    }
    for n in 2..num_modes {
        let m = real_from_usize::<T>(n);
        let two_m_minus_one = m + m - T::one();
        values[n] = (two_m_minus_one * xi * values[n - 1] - (m - T::one()) * values[n - 2]) / m;
    }
}

/// Fills values and derivatives of `P_n` at `xi`, valid on the closed interval.
///
/// Derivatives use `P'_n = P'_{n-2} + (2n - 1) P_{n-1}`, which holds at the end points too.
///
/// # Panics
///
/// Panics if the two buffers differ in length.
pub fn populate_legendre_with_derivatives<T: Real>(values: &mut [T], derivatives: &mut [T], xi: T) {
    assert_eq!(values.len(), derivatives.len(), "Buffers must have equal length");
    populate_legendre(values, xi);
    let num_modes = values.len();
    if num_modes > 0 {
        derivatives[0] = T::zero();
    }
    if num_modes > 1 {
        derivatives[1] = T::one();
    }
    for n in 2..num_modes {
        let two_n_minus_one = real_from_usize::<T>(2 * n - 1);
        derivatives[n] = derivatives[n - 2] + two_n_minus_one * values[n - 1];
    }
}

/// `P_n(1)`.
pub fn value_at_right<T: Real>(_n: usize) -> T {
    T::one()
}

/// `P_n(-1)`.
pub fn value_at_left<T: Real>(n: usize) -> T {
    if n % 2 == 0 {
        T::one()
    } else {
        -T::one()
    }
}

/// $\int_{-1}^1 P_n^2 \, d\xi$.
pub fn mode_norm_squared<T: Real>(n: usize) -> T {
    real_from_usize::<T>(2) / real_from_usize::<T>(2 * n + 1)
}

/// Evaluates the expansion $\sum_n c_n P_n(\xi)$.
pub fn evaluate_expansion<T: Real>(coefficients: &[T], xi: T) -> T {
    let mut values = vec![T::zero(); coefficients.len()];
    populate_legendre(&mut values, xi);
    values
        .iter()
        .zip(coefficients)
        .fold(T::zero(), |acc, (p, c)| acc + *p * *c)
}
