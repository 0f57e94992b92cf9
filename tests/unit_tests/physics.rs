use hpdwr::physics::*;
use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;

fn check_flux_derivatives<P: Physics<f64>>(physics: &P, u_minus: f64, u_plus: f64) {
    let h = 1e-6;
    let flux = physics.numerical_flux(u_minus, u_plus);
    let d_minus =
        (physics.numerical_flux(u_minus + h, u_plus).value - physics.numerical_flux(u_minus - h, u_plus).value) / (2.0 * h);
    let d_plus =
        (physics.numerical_flux(u_minus, u_plus + h).value - physics.numerical_flux(u_minus, u_plus - h).value) / (2.0 * h);
    assert_scalar_eq!(flux.d_minus, d_minus, comp = abs, tol = 1e-6);
    assert_scalar_eq!(flux.d_plus, d_plus, comp = abs, tol = 1e-6);
}

#[test]
fn linear_advection_upwinds() {
    let right = LinearAdvection { velocity: 2.0 };
    let flux = right.numerical_flux(1.0, 5.0);
    assert_eq!(
        flux,
        NumericalFlux {
            value: 2.0,
            d_minus: 2.0,
            d_plus: 0.0
        }
    );

    let left = LinearAdvection { velocity: -1.0 };
    assert_eq!(left.numerical_flux(1.0, 5.0).value, -5.0);
    assert_eq!(left.max_wave_speed(3.0), 1.0);
}

#[test]
fn burgers_flux() {
    assert_eq!(Physics::<f64>::flux(&Burgers, 3.0), 4.5);
    assert_eq!(Physics::<f64>::flux_derivative(&Burgers, -2.0), -2.0);
    // Transonic rarefaction gives zero flux
    assert_eq!(Burgers.numerical_flux(-1.0, 1.0).value, 0.0);
    // Upwind for positive and negative states
    assert_eq!(Burgers.numerical_flux(2.0, 3.0).value, 2.0);
    assert_eq!(Burgers.numerical_flux(-2.0, -3.0).value, 4.5);
}

#[test]
fn physics_kind_matches_concrete_physics() {
    let kind = PhysicsKind::LinearAdvection { velocity: 0.5 };
    let concrete = LinearAdvection { velocity: 0.5 };
    assert_eq!(
        Physics::<f64>::numerical_flux(&kind, 1.0, 2.0),
        concrete.numerical_flux(1.0, 2.0)
    );
    assert_eq!(
        Physics::<f64>::numerical_flux(&PhysicsKind::Burgers, 1.5, -0.5),
        Burgers.numerical_flux(1.5, -0.5)
    );
}

#[test]
fn manufactured_solutions_have_consistent_derivatives() {
    let solutions: Vec<ManufacturedSolutionKind> = vec![
        ManufacturedSolutionKind::Polynomial {
            coefficients: vec![1.0, -2.0, 0.5, 3.0],
        },
        ManufacturedSolutionKind::default(),
        ManufacturedSolutionKind::Exponential {
            offset: 1.0,
            amplitude: 2.0,
            rate: -3.0,
        },
    ];
    let h = 1e-6;
    for solution in &solutions {
        for &x in &[0.0, 0.3, 0.9] {
            let fd = (solution.value(x + h) - solution.value(x - h)) / (2.0 * h);
            let derivative: f64 = solution.derivative(x);
            assert_scalar_eq!(derivative, fd, comp = abs, tol = 1e-6);
        }
    }

    let polynomial = PolynomialSolution {
        coefficients: vec![1.0, -2.0, 0.5, 3.0],
    };
    assert_eq!(polynomial.value(2.0), 1.0 - 4.0 + 2.0 + 24.0);
    assert_eq!(polynomial.derivative(2.0), -2.0 + 2.0 + 36.0);
}

#[test]
fn source_term_is_chain_rule() {
    let solution = SineSolution {
        offset: 1.0,
        amplitude: 0.5,
        frequency: 2.0,
    };
    let x = 0.4;
    let expected = solution.value(x) * solution.derivative(x);
    assert_scalar_eq!(source_term(&Burgers, &solution, x), expected, comp = abs, tol = 1e-15);
    let advection = LinearAdvection { velocity: 3.0 };
    assert_scalar_eq!(
        source_term(&advection, &solution, x),
        3.0 * solution.derivative(x),
        comp = abs,
        tol = 1e-15
    );
}

proptest! {
    #[test]
    fn numerical_fluxes_are_consistent(u in -10.0..10.0f64, velocity in -3.0..3.0f64) {
        let advection = LinearAdvection { velocity };
        prop_assert!((advection.numerical_flux(u, u).value - advection.flux(u)).abs() <= 1e-12);
        let burgers_flux = Burgers.numerical_flux(u, u).value;
        prop_assert!((burgers_flux - Physics::<f64>::flux(&Burgers, u)).abs() <= 1e-12 * (1.0 + u * u));
    }

    #[test]
    fn burgers_flux_derivatives_match_finite_differences(
        u_minus in prop_oneof![-5.0..-0.01f64, 0.01..5.0f64],
        u_plus in prop_oneof![-5.0..-0.01f64, 0.01..5.0f64],
    ) {
        check_flux_derivatives(&Burgers, u_minus, u_plus);
        check_flux_derivatives(&LinearAdvection { velocity: -0.7 }, u_minus, u_plus);
    }
}
