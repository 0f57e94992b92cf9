use crate::{
    advection_dg, advection_dg_with_settings, quadratic_solution, sine_solution, solve_steady, CountingDiscretization,
};
use hpdwr::adjoint::{Adjoint, AdjointError, AdjointState};
use hpdwr::dg::DgSettings;
use hpdwr::discretization::Discretization;
use hpdwr::functional::{Functional, VolumeFunctional, WeightedIntegral};
use hpdwr::parameters::{LinearSolverParam, OutputParam};
use hpdwr::physics::{LinearAdvection, ManufacturedSolution};
use hpdwr::transfer::DegreeDistribution;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DVector;
use nalgebra_sparse::convert::serial::convert_csr_dense;
use proptest::prelude::*;

const PHYSICS: LinearAdvection<f64> = LinearAdvection { velocity: 1.0 };

fn weighted() -> VolumeFunctional<WeightedIntegral<f64>> {
    VolumeFunctional::new(WeightedIntegral { center: 0.5, width: 0.2 })
}

#[test]
fn new_engine_starts_coarse_with_zeroed_fields() {
    let mut dg = advection_dg(vec![1, 2, 1], sine_solution());
    let u = sine_solution();
    dg.project(|x| u.value(x));
    let solution = dg.solution().clone();
    let functional = weighted();

    let adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);
    assert_eq!(adjoint.state(), AdjointState::Coarse);
    assert_eq!(adjoint.solution_coarse(), &solution);
    assert_eq!(adjoint.coarse_fe_index().as_slice(), &[1, 2, 1]);
    assert_eq!(adjoint.dIdw_coarse(), &DVector::zeros(7));
    assert_eq!(adjoint.adjoint_coarse(), &DVector::zeros(7));
    assert_eq!(adjoint.dIdw_fine(), &DVector::zeros(10));
    assert_eq!(adjoint.adjoint_fine(), &DVector::zeros(10));
    assert_eq!(adjoint.dual_weighted_residual_fine(), &DVector::zeros(3));
    assert!(matches!(adjoint.dwr_error_estimate(), Err(AdjointError::DwrUnavailable)));
}

#[test]
fn transitions_must_start_from_the_current_state() {
    let mut dg = advection_dg(vec![1, 1], sine_solution());
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);

    assert!(matches!(
        adjoint.fine_to_coarse(),
        Err(AdjointError::InvalidTransition {
            from: AdjointState::Coarse,
            to: AdjointState::Coarse
        })
    ));
    adjoint.coarse_to_fine().unwrap();
    assert_eq!(adjoint.state(), AdjointState::Fine);
    assert!(matches!(
        adjoint.coarse_to_fine(),
        Err(AdjointError::InvalidTransition {
            from: AdjointState::Fine,
            to: AdjointState::Fine
        })
    ));
    assert_eq!(adjoint.discretization().n_dofs(), 6);

    // Converting to the current state does nothing
    adjoint.convert_to_state(AdjointState::Fine).unwrap();
    assert_eq!(adjoint.discretization().n_dofs(), 6);
    adjoint.convert_to_state(AdjointState::Coarse).unwrap();
    adjoint.convert_to_state(AdjointState::Coarse).unwrap();
    assert_eq!(adjoint.state(), AdjointState::Coarse);
    assert_eq!(adjoint.discretization().n_dofs(), 4);
}

#[test]
fn repeated_conversion_to_fine_leaves_the_fine_solution_unchanged() {
    let dg = advection_dg(vec![1, 2, 1], sine_solution());
    let mut counting = CountingDiscretization::new(dg);
    counting.inner.project(|x| sine_solution().value(x));
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut counting, &functional, &PHYSICS);

    adjoint.convert_to_state(AdjointState::Fine).unwrap();
    let fine_solution = adjoint.discretization().solution().clone();
    assert_eq!(fine_solution.len(), 10);
    adjoint.convert_to_state(AdjointState::Fine).unwrap();

    assert_eq!(adjoint.state(), AdjointState::Fine);
    assert_eq!(adjoint.discretization().solution(), &fine_solution);
    assert_eq!(adjoint.discretization().transfers, 1);
    assert_eq!(adjoint.discretization().reallocations, 0);
}

#[test]
fn coarse_fine_round_trip_restores_solution_exactly() {
    let mut dg = advection_dg(vec![0, 1, 3, 2], sine_solution());
    let u = sine_solution();
    dg.project(|x| u.value(x) + x.powi(5));
    let solution = dg.solution().clone();
    let functional = weighted();

    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);
    adjoint.coarse_to_fine().unwrap();
    assert_eq!(adjoint.discretization().degree_distribution().as_slice(), &[1, 2, 4, 3]);
    assert_eq!(adjoint.discretization().n_dofs(), solution.len() + 4);
    adjoint.fine_to_coarse().unwrap();

    assert_eq!(adjoint.discretization().solution(), &solution);
    assert_eq!(adjoint.discretization().degree_distribution().as_slice(), &[0, 1, 3, 2]);
}

#[test]
fn fine_solution_is_the_prolongated_coarse_solution() {
    let mut dg = advection_dg(vec![1, 2], sine_solution());
    let u = sine_solution();
    dg.project(|x| u.value(x));
    let samples: Vec<f64> = [0.1, 0.4, 0.6, 0.9]
        .iter()
        .map(|x| dg.evaluate_at(*x).unwrap())
        .collect();
    let functional = weighted();

    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);
    adjoint.coarse_to_fine().unwrap();
    for (x, expected) in [0.1, 0.4, 0.6, 0.9].iter().zip(&samples) {
        let value = adjoint.discretization().evaluate_at(*x).unwrap();
        assert_scalar_eq!(value, *expected, comp = abs, tol = 1e-14);
    }
}

#[test]
fn coarse_to_fine_prolongates_the_reinit_snapshot() {
    let mut dg = advection_dg(vec![1; 4], sine_solution());
    solve_steady(&mut dg);
    let solution = dg.solution().clone();
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);

    adjoint.fine_grid_adjoint().unwrap();
    adjoint.dual_weighted_residual().unwrap();
    let estimate = adjoint.dwr_error_estimate().unwrap();
    adjoint.fine_to_coarse().unwrap();

    // Without reinit, the fine adjoint still belongs to the snapshot solution
    adjoint.discretization_mut().solution_mut().scale_mut(2.0);
    let indicator_sum = adjoint.dual_weighted_residual().unwrap().sum();
    assert_eq!(adjoint.solution_coarse(), &solution);
    assert_eq!(indicator_sum, estimate);
    assert_eq!(adjoint.dwr_error_estimate().unwrap(), estimate);

    adjoint.fine_to_coarse().unwrap();
    assert_eq!(adjoint.discretization().solution(), &solution);
}

#[test]
fn enrichment_overflow_leaves_everything_untouched() {
    let settings = DgSettings {
        max_degree: 2,
        ..DgSettings::default()
    };
    let mut dg = advection_dg_with_settings(vec![1, 2, 1], sine_solution(), settings);
    dg.solution_mut().fill(0.25);
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);
    assert_eq!(adjoint.adjoint_fine().len(), 0);

    for result in [adjoint.coarse_to_fine(), adjoint.fine_grid_adjoint().map(|_| ())] {
        match result {
            Err(AdjointError::DegreeOverflow {
                cell,
                degree,
                max_degree,
            }) => assert_eq!((cell, degree, max_degree), (1, 3, 2)),
            other => panic!("Unexpected result {:?}", other),
        }
    }
    assert_eq!(adjoint.state(), AdjointState::Coarse);
    assert_eq!(adjoint.discretization().degree_distribution().as_slice(), &[1, 2, 1]);
    assert_eq!(adjoint.discretization().solution(), &DVector::repeat(7, 0.25));

    // The coarse adjoint needs no enrichment
    adjoint.coarse_grid_adjoint().unwrap();
}

#[test]
fn dual_weighted_residual_requires_fine_adjoint() {
    let mut dg = advection_dg(vec![1, 1, 1], sine_solution());
    solve_steady(&mut dg);
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);

    assert!(matches!(
        adjoint.dual_weighted_residual(),
        Err(AdjointError::FineAdjointUnavailable)
    ));
    adjoint.coarse_grid_adjoint().unwrap();
    assert!(matches!(
        adjoint.dual_weighted_residual(),
        Err(AdjointError::FineAdjointUnavailable)
    ));
    assert!(matches!(adjoint.dwr_error_estimate(), Err(AdjointError::DwrUnavailable)));

    adjoint.fine_grid_adjoint().unwrap();
    assert!(matches!(adjoint.dwr_error_estimate(), Err(AdjointError::DwrUnavailable)));
    adjoint.dual_weighted_residual().unwrap();
    assert!(adjoint.dwr_error_estimate().is_ok());

    // Recomputing the fine adjoint invalidates the indicator until it is recomputed
    adjoint.fine_grid_adjoint().unwrap();
    assert!(matches!(adjoint.dwr_error_estimate(), Err(AdjointError::DwrUnavailable)));
}

#[test]
fn reinit_snapshots_new_coarse_state() {
    let mut dg = advection_dg(vec![1, 1, 1], sine_solution());
    solve_steady(&mut dg);
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);
    adjoint.fine_grid_adjoint().unwrap();
    adjoint.dual_weighted_residual().unwrap();
    adjoint.convert_to_state(AdjointState::Coarse).unwrap();

    adjoint
        .discretization_mut()
        .transfer_to(&DegreeDistribution::new(vec![2, 1, 2]))
        .unwrap();
    adjoint.reinit();

    assert_eq!(adjoint.state(), AdjointState::Coarse);
    assert_eq!(adjoint.coarse_fe_index().as_slice(), &[2, 1, 2]);
    assert_eq!(adjoint.solution_coarse(), adjoint.discretization().solution());
    assert_eq!(adjoint.adjoint_coarse().len(), 8);
    assert_eq!(adjoint.adjoint_fine(), &DVector::zeros(11));
    assert!(matches!(adjoint.dwr_error_estimate(), Err(AdjointError::DwrUnavailable)));
    assert!(matches!(
        adjoint.dual_weighted_residual(),
        Err(AdjointError::FineAdjointUnavailable)
    ));
}

#[test]
#[allow(non_snake_case)]
fn adjoints_satisfy_the_adjoint_equation() {
    let mut dg = advection_dg(vec![1, 2, 3, 1], sine_solution());
    solve_steady(&mut dg);
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);

    for state in [AdjointState::Fine, AdjointState::Coarse] {
        let psi = match state {
            AdjointState::Fine => adjoint.fine_grid_adjoint().unwrap().clone(),
            AdjointState::Coarse => adjoint.coarse_grid_adjoint().unwrap().clone(),
        };
        assert_eq!(adjoint.state(), state);
        let dIdw = match state {
            AdjointState::Fine => adjoint.dIdw_fine().clone(),
            AdjointState::Coarse => adjoint.dIdw_coarse().clone(),
        };
        let dg = adjoint.discretization();
        assert_eq!(psi.len(), dg.n_dofs());
        assert_matrix_eq!(dIdw.clone(), functional.evaluate_dIdw(dg, &PHYSICS), comp = abs, tol = 1e-15);

        let jacobian = convert_csr_dense(dg.system_matrix());
        let residual = jacobian.transpose() * &psi + &dIdw;
        assert!(residual.norm() < 1e-12, "adjoint residual {}", residual.norm());
    }
    assert_eq!(adjoint.adjoint_fine().len(), 15);
    assert_eq!(adjoint.adjoint_coarse().len(), 11);
}

#[test]
fn dual_weighted_residual_vanishes_for_exactly_represented_solution() {
    let mut dg = advection_dg(vec![2; 4], quadratic_solution());
    solve_steady(&mut dg);
    let functional = weighted();
    let value = functional.evaluate(&dg, &PHYSICS);
    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);

    adjoint.fine_grid_adjoint().unwrap();
    let indicator = adjoint.dual_weighted_residual().unwrap();
    assert_eq!(indicator.len(), 4);
    let estimate = adjoint.dwr_error_estimate().unwrap();
    assert!(estimate.abs() < 1e-10 * value.abs(), "estimate {}", estimate);
}

#[test]
fn dual_weighted_residual_represents_the_fine_functional_error() {
    let functional = weighted();

    let mut fine_dg = advection_dg(vec![2; 4], sine_solution());
    solve_steady(&mut fine_dg);
    let fine_value = functional.evaluate(&fine_dg, &PHYSICS);

    let mut dg = advection_dg(vec![1; 4], sine_solution());
    solve_steady(&mut dg);

    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);
    adjoint.fine_grid_adjoint().unwrap();
    // Functional of the prolongated coarse solution, on the fine space
    let prolongated_value = functional.evaluate(adjoint.discretization(), &PHYSICS);
    let indicator_sum = adjoint.dual_weighted_residual().unwrap().sum();
    let estimate = adjoint.dwr_error_estimate().unwrap();

    let error = fine_value - prolongated_value;
    assert_eq!(estimate, indicator_sum);
    assert!(error.abs() > 1e-6, "error {}", error);
    assert_scalar_eq!(estimate, error, comp = abs, tol = 1e-11);
}

#[test]
fn state_transfers_happen_only_when_needed() {
    let dg = advection_dg(vec![1, 2, 1], sine_solution());
    let mut counting = CountingDiscretization::new(dg);
    counting.inner.project(|x| sine_solution().value(x));
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut counting, &functional, &PHYSICS);

    adjoint.coarse_grid_adjoint().unwrap();
    assert_eq!(adjoint.discretization().reallocations, 0);
    assert_eq!(adjoint.discretization().transfers, 0);

    adjoint.fine_grid_adjoint().unwrap();
    adjoint.dual_weighted_residual().unwrap();
    assert_eq!(adjoint.discretization().reallocations, 0);
    assert_eq!(adjoint.discretization().transfers, 1);

    adjoint.coarse_grid_adjoint().unwrap();
    assert_eq!(adjoint.discretization().reallocations, 1);
    assert_eq!(adjoint.discretization().transfers, 1);

    adjoint.fine_grid_adjoint().unwrap();
    adjoint.fine_grid_adjoint().unwrap();
    assert_eq!(adjoint.discretization().transfers, 2);
}

#[test]
fn failed_linear_solve_keeps_previous_adjoint() {
    let mut dg = advection_dg(vec![1, 1, 1], sine_solution());
    solve_steady(&mut dg);
    let mut counting = CountingDiscretization::new(dg);
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut counting, &functional, &PHYSICS);

    let psi = adjoint.coarse_grid_adjoint().unwrap().clone();
    adjoint.discretization_mut().fail_linear_solves = true;

    let err = adjoint.coarse_grid_adjoint().unwrap_err();
    assert!(matches!(err, AdjointError::LinearSolve(_)));
    assert_eq!(adjoint.adjoint_coarse(), &psi);
    let report = eyre::Report::new(err).wrap_err("Coarse adjoint failed");
    let messages: Vec<String> = report.chain().map(|cause| cause.to_string()).collect();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2], "linear solver failure requested by test");

    assert!(matches!(adjoint.fine_grid_adjoint(), Err(AdjointError::LinearSolve(_))));
    assert!(matches!(
        adjoint.dual_weighted_residual(),
        Err(AdjointError::FineAdjointUnavailable)
    ));

    adjoint.discretization_mut().fail_linear_solves = false;
    adjoint.fine_grid_adjoint().unwrap();
    adjoint.dual_weighted_residual().unwrap();
}

#[test]
fn iterative_and_direct_adjoints_agree() {
    let gmres = DgSettings {
        linear_solver: LinearSolverParam::Gmres {
            restart: 40,
            max_iterations: 400,
            tolerance: 1e-13,
        },
        ..DgSettings::default()
    };
    let degrees = vec![1, 2, 2, 1, 3];
    let mut direct_dg = advection_dg(degrees.clone(), sine_solution());
    let mut gmres_dg = advection_dg_with_settings(degrees, sine_solution(), gmres);
    solve_steady(&mut direct_dg);
    gmres_dg.solution_mut().copy_from(direct_dg.solution());
    let functional = weighted();

    let mut direct = Adjoint::new(&mut direct_dg, &functional, &PHYSICS);
    let mut iterative = Adjoint::new(&mut gmres_dg, &functional, &PHYSICS);
    let psi_direct = direct.fine_grid_adjoint().unwrap().clone();
    let psi_iterative = iterative.fine_grid_adjoint().unwrap().clone();
    assert_matrix_eq!(psi_direct, psi_iterative, comp = abs, tol = 1e-8);
}

#[test]
fn output_includes_adjoint_fields() {
    let dir = tempfile::tempdir().unwrap();
    let settings = DgSettings {
        output: OutputParam {
            write_vtk: true,
            directory: dir.path().to_path_buf(),
            prefix: "adjoint".to_string(),
            ..OutputParam::default()
        },
        ..DgSettings::default()
    };
    let mut dg = advection_dg_with_settings(vec![1, 1], sine_solution(), settings);
    solve_steady(&mut dg);
    let functional = weighted();
    let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);

    adjoint.fine_grid_adjoint().unwrap();
    adjoint.dual_weighted_residual().unwrap();
    adjoint.output_results_vtk(3).unwrap();
    let fine_file = std::fs::read(dir.path().join("adjoint-0003.vtk")).unwrap();
    let fine_file = String::from_utf8_lossy(&fine_file);
    assert!(fine_file.contains("psi"));
    assert!(fine_file.contains("DWR"));

    adjoint.convert_to_state(AdjointState::Coarse).unwrap();
    adjoint.output_results_vtk(4).unwrap();
    let coarse_file = std::fs::read(dir.path().join("adjoint-0004.vtk")).unwrap();
    let coarse_file = String::from_utf8_lossy(&coarse_file);
    assert!(coarse_file.contains("solution"));
    assert!(!coarse_file.contains("DWR"));
}

fn degrees_and_coefficients() -> impl Strategy<Value = (Vec<usize>, Vec<f64>)> {
    prop::collection::vec(0usize..=3, 1..6).prop_flat_map(|degrees| {
        let n_dofs: usize = degrees.iter().map(|p| p + 1).sum();
        (Just(degrees), prop::collection::vec(-10.0..10.0f64, n_dofs))
    })
}

proptest! {
    #[test]
    fn round_trip_is_bitwise_exact((degrees, coefficients) in degrees_and_coefficients()) {
        let mut dg = advection_dg(degrees.clone(), sine_solution());
        dg.solution_mut().copy_from_slice(&coefficients);
        let functional = weighted();
        let mut adjoint = Adjoint::new(&mut dg, &functional, &PHYSICS);

        adjoint.convert_to_state(AdjointState::Fine).unwrap();
        adjoint.convert_to_state(AdjointState::Coarse).unwrap();
        prop_assert_eq!(adjoint.discretization().solution().as_slice(), coefficients.as_slice());
        prop_assert_eq!(adjoint.discretization().degree_distribution().as_slice(), degrees.as_slice());
    }
}
