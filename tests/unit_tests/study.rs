use hpdwr::functional::FunctionalKind;
use hpdwr::parameters::AllParameters;
use hpdwr::refinement::RefinementStrategy;
use hpdwr::study::{CycleRecord, GridRefinementStudy, StudySummary};

fn small_study() -> AllParameters {
    let mut parameters = AllParameters::default();
    parameters.grid.num_cells = 4;
    parameters.discretization.initial_degree = 1;
    parameters.discretization.max_degree = 4;
    parameters.grid_refinement.refinement_steps = 2;
    parameters.grid_refinement.strategy = RefinementStrategy::Uniform;
    parameters.functional = FunctionalKind::WeightedIntegral {
        center: 0.5,
        width: 0.3,
    };
    parameters
}

#[test]
fn uniform_p_refinement_study_reduces_functional_error() {
    let summary = GridRefinementStudy::run(&small_study()).unwrap();
    assert_eq!(summary.cycles.len(), 3);
    for (cycle, record) in summary.cycles.iter().enumerate() {
        assert_eq!(record.cycle, cycle);
        assert_eq!(record.cells, 4);
        assert_eq!(record.degrees, vec![cycle + 1; 4]);
        assert_eq!(record.dofs, 4 * (cycle + 2));
        assert_eq!(record.indicator.len(), 4);
        assert!(record.estimate.is_finite());
        assert!((record.indicator.iter().sum::<f64>() - record.estimate).abs() < 1e-14);
    }
    let errors: Vec<f64> = summary.cycles.iter().map(|c| c.error.abs()).collect();
    assert!(errors[1] < errors[0] && errors[2] < errors[1], "errors: {:?}", errors);
    let l2_errors: Vec<f64> = summary.cycles.iter().map(|c| c.L2_error).collect();
    assert!(l2_errors[2] < l2_errors[0]);
    // Linear problem and functional: the estimate is close to the true error once resolved
    let last = summary.cycles.last().unwrap();
    assert!(last.error.abs() > 1e-10, "error {}", last.error);
    assert!(
        (last.estimate - last.error).abs() < 0.5 * last.error.abs(),
        "estimate {} error {}",
        last.estimate,
        last.error
    );
}

#[test]
fn fixed_fraction_study_refines_selected_cells() {
    let mut parameters = small_study();
    parameters.grid_refinement.strategy = RefinementStrategy::FixedFraction { fraction: 0.25 };
    parameters.grid_refinement.refinement_steps = 1;
    let summary = GridRefinementStudy::run(&parameters).unwrap();
    assert_eq!(summary.cycles.len(), 2);
    let total_degree: usize = summary.cycles[1].degrees.iter().sum();
    assert_eq!(total_degree, 4 + 1);
}

#[test]
fn study_writes_summary_and_vtk_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut parameters = small_study();
    parameters.grid_refinement.refinement_steps = 1;
    parameters.output.write_vtk = true;
    parameters.output.directory = dir.path().join("vtk");
    let summary_path = dir.path().join("summary.json");
    parameters.output.summary_file = Some(summary_path.clone());

    let summary = GridRefinementStudy::run(&parameters).unwrap();
    assert!(dir.path().join("vtk/solution-0000.vtk").exists());
    assert!(dir.path().join("vtk/solution-0001.vtk").exists());

    let written: StudySummary = serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(written, summary);
}

#[test]
fn summary_json_preserves_floats_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/summary.json");
    let summary = StudySummary {
        parameters: AllParameters::default(),
        exact_functional: 0.1 + 0.2,
        cycles: vec![CycleRecord {
            cycle: 0,
            cells: 2,
            dofs: 4,
            degrees: vec![1, 1],
            newton_iterations: 2,
            functional: 1.0 / 3.0,
            error: -1.8664469969564832e-10,
            estimate: -1.866446996956483e-10,
            effectivity: Some(-1.8664469969564832e-10 / -1.866446996956483e-10),
            L2_error: std::f64::consts::PI * 1e-7,
            indicator: vec![2.0f64.sqrt() * 1e-12, -7.0e-11 / 3.0],
        }],
    };
    summary.write_json(&path).unwrap();
    let written: StudySummary = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, summary);
}

#[test]
fn invalid_parameters_are_reported() {
    let mut parameters = small_study();
    parameters.discretization.initial_degree = 4;
    assert!(GridRefinementStudy::run(&parameters).is_err());
}
