use hpdwr::basis::*;
use hpdwr::quadrature::gauss;
use matrixcompare::assert_scalar_eq;

#[test]
fn legendre_values_match_closed_form() {
    let mut values = [0.0; 5];
    for &x in &[-1.0f64, -0.7, 0.0, 0.25, 1.0] {
        populate_legendre(&mut values, x);
        let expected = [
            1.0,
            x,
            0.5 * (3.0 * x * x - 1.0),
            0.5 * (5.0 * x * x * x - 3.0 * x),
            (35.0 * x.powi(4) - 30.0 * x * x + 3.0) / 8.0,
        ];
        for (v, e) in values.iter().zip(&expected) {
            assert_scalar_eq!(*v, *e, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn legendre_derivatives_match_finite_differences_including_end_points() {
    let n = 7;
    let mut values = vec![0.0; n];
    let mut derivatives = vec![0.0; n];
    let mut plus = vec![0.0; n];
    let mut minus = vec![0.0; n];
    let h = 1e-6;
    for &x in &[-1.0, -0.3, 0.6, 1.0] {
        populate_legendre_with_derivatives(&mut values, &mut derivatives, x);
        populate_legendre(&mut plus, x + h);
        populate_legendre(&mut minus, x - h);
        for i in 0..n {
            let fd = (plus[i] - minus[i]) / (2.0 * h);
            assert_scalar_eq!(derivatives[i], fd, comp = abs, tol = 1e-6);
        }
    }
    // P_n'(1) = n (n + 1) / 2
    populate_legendre_with_derivatives(&mut values, &mut derivatives, 1.0);
    assert_scalar_eq!(derivatives[4], 10.0, comp = abs, tol = 1e-13);
}

#[test]
fn end_point_values() {
    let mut values = [0.0; 6];
    populate_legendre(&mut values, 1.0);
    for (n, v) in values.iter().enumerate() {
        assert_eq!(*v, value_at_right::<f64>(n));
    }
    populate_legendre(&mut values, -1.0);
    for (n, v) in values.iter().enumerate() {
        assert_scalar_eq!(*v, value_at_left::<f64>(n), comp = abs, tol = 1e-15);
    }
}

#[test]
fn modes_are_orthogonal() {
    let n = 6;
    let (weights, points) = gauss::<f64>(n + 1);
    let mut values = vec![0.0; n];
    let mut gram = vec![vec![0.0; n]; n];
    for (w, x) in weights.iter().zip(&points) {
        populate_legendre(&mut values, *x);
        for i in 0..n {
            for j in 0..n {
                gram[i][j] += w * values[i] * values[j];
            }
        }
    }
    for i in 0..n {
        for j in 0..n {
            let expected = if i == j { mode_norm_squared::<f64>(i) } else { 0.0 };
            assert_scalar_eq!(gram[i][j], expected, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn expansion_evaluation() {
    // 2 P_0 - P_1 + 3 P_2 at x = 0.5
    let value = evaluate_expansion(&[2.0, -1.0, 3.0], 0.5);
    assert_scalar_eq!(value, 2.0 - 0.5 + 3.0 * 0.5 * (0.75 - 1.0), comp = abs, tol = 1e-15);
}
