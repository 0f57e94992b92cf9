//! Gauss-Legendre quadrature on the reference interval `[-1, 1]`.
use hpdwr_traits::{real, real_from_usize, Real};
use numeric_literals::replace_float_literals;

/// A quadrature rule stored as `(weights, points)`.
pub type Rule<T> = (Vec<T>, Vec<T>);

/// Evaluates `(P_n(x), P_{n-1}(x))` with the three-term recurrence
/// `m P_m(x) = (2m - 1) x P_{m-1}(x) - (m - 1) P_{m-2}(x)`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn legendre_pair<T: Real>(n: usize, x: T) -> (T, T) {
    let mut p1 = 1.0;
    let mut p2 = 0.0;
    for m in 1..=n {
        let m = real_from_usize::<T>(m);
        let p3 = p2;
        p2 = p1;
        p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
    }
    (p1, p2)
}

/// Value and derivative of `P_n` at an interior point `x` of `(-1, 1)`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn legendre_value_and_derivative<T: Real>(n: usize, x: T) -> (T, T) {
    let (p1, p2) = legendre_pair(n, x);
    let n = real_from_usize::<T>(n);
    (p1, n * (x * p1 - p2) / (x * x - 1.0))
}

/// Asymptotic approximation of the `i`-th largest root of `P_n`.
fn initial_root_guess(i: usize, n: usize) -> f64 {
    (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos()
}

/// Gauss quadrature with `num_points` points on `[-1, 1]`.
///
/// The rule integrates polynomials of degree up to `2 num_points - 1` exactly. Points are
/// returned in descending order.
///
/// # Panics
///
/// Panics if zero points are requested.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn gauss<T: Real>(num_points: usize) -> Rule<T> {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let m = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    let tolerance = 4.0 * T::default_epsilon();

    // Roots in the upper half, the rest follow by symmetry
    for i in 0..m {
        let mut x: T = real(initial_root_guess(i, n));

        // Newton converges in a handful of iterations from the asymptotic guess
        for _ in 0..100 {
            let (p, dp_x) = legendre_value_and_derivative(n, x);
            let dx = -p / dp_x;
            x += dx;
            if dx.abs() <= tolerance {
                break;
            }
        }

        let (_, dp) = legendre_value_and_derivative(n, x);
        points.push(x);
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
    }

    for i in m..n {
        let mirror = n - i - 1;
        points.push(-points[mirror]);
        weights.push(weights[mirror]);
    }

    // The center point of odd rules is exactly zero
    if n % 2 == 1 {
        points[m - 1] = T::zero();
    }

    debug_assert_eq!(points.len(), n);
    (weights, points)
}

/// Gauss quadrature mapped to the physical interval `[a, b]`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn gauss_on_interval<T: Real>(num_points: usize, a: T, b: T) -> Rule<T> {
    let (weights, points) = gauss::<T>(num_points);
    let half_length = 0.5 * (b - a);
    let center = 0.5 * (a + b);
    (
        weights.into_iter().map(|w| w * half_length).collect(),
        points.into_iter().map(|xi| center + half_length * xi).collect(),
    )
}
