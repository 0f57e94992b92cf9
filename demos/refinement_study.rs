//! Adjoint-based p-refinement study on a manufactured steady solution.
//!
//! Solves the steady problem, estimates the functional error with the dual-weighted residual
//! of a p-enriched adjoint, refines the cells with the largest indicators and repeats.
//!
//! ```text
//! cargo run --release --example refinement_study -- demos/refinement_study.json
//! ```
use clap::Parser;
use hpdwr::parameters::AllParameters;
use hpdwr::study::GridRefinementStudy;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version)]
struct Args {
    /// JSON parameter file. Defaults are used when omitted.
    #[arg(value_name = "FILE")]
    parameters: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace.
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,

    /// Write VTK output for every cycle.
    #[arg(long)]
    vtk: bool,
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    TermLogger::init(args.log_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    let mut parameters = match &args.parameters {
        Some(path) => AllParameters::from_json_file(path)?,
        None => AllParameters::default(),
    };
    parameters.output.write_vtk |= args.vtk;

    let summary = GridRefinementStudy::run(&parameters)?;

    println!("Exact functional: {:.12e}", summary.exact_functional);
    println!(
        "{:>5} {:>6} {:>14} {:>14} {:>12} {:>14}",
        "cycle", "dofs", "error", "estimate", "effectivity", "L2 error"
    );
    for record in &summary.cycles {
        let effectivity = record
            .effectivity
            .map(|e| format!("{:.4}", e))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5} {:>6} {:>14.6e} {:>14.6e} {:>12} {:>14.6e}",
            record.cycle, record.dofs, record.error, record.estimate, effectivity, record.L2_error
        );
    }
    Ok(())
}
