// SPDX-License-Identifier: AGPL-3.0-only

//! Ground-state accuracy of a ridge cluster-expansion fit.
//!
//! Reads a record file (JSON array, one object per configuration), fits
//! ECI by ridge regression with leave-one-out selection of the strength,
//! and scores the fit's lower hull against the calculated one.
//!
//! With `--eci-basis=basis.json --eci-output=eci.json` the fitted ECI are
//! written into a copy of the cluster basis. With `--eci-set=samples.json`
//! (a JSON array of ECI vectors) every sample is checked for configurations
//! it would push below the reference hull.
//!
//! Usage:
//!   ground_state_accuracy --data=configs.json [--config=analysis.json]
//!                         [--output=report.json] [--lower-hull-tolerance=1e-14]
//!                         [--ridge-alphas=1e-6,1e-4,1e-2] [--energy-field=...]
//!                         [--eci-basis=basis.json --eci-output=eci.json]
//!                         [--eci-set=samples.json]
//!
//! Set `RUST_LOG=clexhull=debug` for hull and cross-validation detail.

use clexhull::config::{cli_value, AnalysisConfig};
use clexhull::data::ClexDataset;
use clexhull::hull_distance::proposed_ground_states;
use clexhull::pipeline::{analyze, GroundStateReport};
use clexhull::predictor::{load_eci_set, RidgeCv, RidgeFit};
use clexhull::{ClexHullError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!("usage: ground_state_accuracy --data=FILE [--config=FILE] [--output=FILE]");
    println!("       [--lower-hull-tolerance=F] [--hull-distance-tolerance=F]");
    println!("       [--ridge-alphas=A,B,...] [--comp-field=S] [--corr-field=S]");
    println!("       [--energy-field=S] [--name-field=S]");
    println!("       [--eci-basis=FILE --eci-output=FILE] [--eci-set=FILE]");
}

fn run(args: &[String]) -> Result<()> {
    let data_path = cli_value(args, "--data")
        .ok_or_else(|| ClexHullError::Config("--data=FILE is required".to_string()))?;
    let mut config = match cli_value(args, "--config") {
        Some(p) => AnalysisConfig::from_path(Path::new(p))?,
        None => AnalysisConfig::default(),
    };
    config.apply_cli_overrides(args)?;
    let eci_export = match (cli_value(args, "--eci-basis"), cli_value(args, "--eci-output")) {
        (Some(basis), Some(out)) => Some((basis, out)),
        (None, None) => None,
        _ => {
            return Err(ClexHullError::Config(
                "--eci-basis and --eci-output must be given together".to_string(),
            ))
        }
    };

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Ground-State Accuracy: ridge cluster expansion             ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let t0 = Instant::now();
    let dataset = ClexDataset::load(Path::new(data_path), &config.fields)?;
    println!(
        "  Loaded {} configurations ({} composition axes, {} correlations) from {data_path}",
        dataset.len(),
        dataset.n_axes(),
        dataset.corr.cols()
    );

    let calc = dataset.calculated();
    let fit = RidgeCv::fit(&calc.corr, &calc.formation_energy, &config.ridge_alphas)?;
    print_fit(&fit);

    let report = analyze(&dataset, &fit.model, &config)?;
    print_report(&report);

    if let Some(samples) = cli_value(args, "--eci-set") {
        let eci_set = load_eci_set(Path::new(samples))?;
        let counts = proposed_ground_states(&dataset, &eci_set, config.hull_distance_tolerance)?;
        print_proposals(&dataset, &counts, eci_set.len());
    }
    println!("  Total time: {:.2}s", t0.elapsed().as_secs_f64());

    if let Some(out) = cli_value(args, "--output") {
        report.save_report(Path::new(out))?;
        println!("  Report written to {out}");
    }
    if let Some((basis, out)) = eci_export {
        fit.model.write_basis_json(Path::new(basis), Path::new(out))?;
        println!("  ECI written into {out}");
    }
    Ok(())
}

fn print_proposals(dataset: &ClexDataset, counts: &BTreeMap<usize, usize>, n_samples: usize) {
    println!();
    println!("═══ Proposed ground states ({n_samples} ECI samples) ═══");
    if counts.is_empty() {
        println!("  no sample breaks the reference hull");
        return;
    }
    println!("  {:>6}  {:<20} {:>8} {:>10}", "index", "name", "count", "fraction");
    for (&index, &count) in counts {
        println!(
            "  {:>6}  {:<20} {:>8} {:>10.4}",
            index,
            dataset.names[index],
            count,
            count as f64 / n_samples as f64
        );
    }
}

fn print_fit(fit: &RidgeFit) {
    println!();
    println!("═══ Ridge LOO-CV ═══");
    for &(alpha, rmse) in &fit.grid {
        let mark = if alpha.to_bits() == fit.alpha.to_bits() { "←" } else { " " };
        println!("  α = {alpha:9.2e}   LOO-RMSE = {rmse:12.6e} {mark}");
    }
    println!("  selected α = {:.2e}, {} ECI", fit.alpha, fit.model.eci.len());
}

fn print_report(report: &GroundStateReport) {
    println!();
    println!("═══ Ground states ═══");
    println!("  reference: {:?}", report.reference_ground_states);
    println!("  predicted: {:?}", report.predicted_ground_states);
    if !report.missed_ground_states.is_empty() {
        println!("  missed:    {:?}", report.missed_ground_states);
    }
    if !report.spurious_ground_states.is_empty() {
        println!("  spurious:  {:?}", report.spurious_ground_states);
    }
    println!();
    println!("  {:>6}  {:<20} {:>10} {:>12}  ", "index", "name", "x", "window");
    for w in &report.windows {
        let flag = if w.recovered { "✓" } else { "✗" };
        println!(
            "  {:>6}  {:<20} {:>10.4} {:>12.6}  {flag}",
            w.index, w.name, w.composition, w.window
        );
    }
    if !report.below_hull.is_empty() {
        println!();
        println!("  {} configurations below the predicted reference hull:", report.below_hull.len());
        for b in &report.below_hull {
            let tag = if b.calculated { "" } else { " (uncalculated)" };
            println!("    {:>6}  {:<20} {:+.6}{tag}", b.index, b.name, b.distance);
        }
    }
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Ground-state accuracy: {:8.4}                             ║", report.score);
    println!("║  RMSE (calculated):     {:12.6e}                         ║", report.rmse);
    println!(
        "║  Configurations:        {:6} ({:6} calculated)              ║",
        report.n_configs, report.n_calculated
    );
    println!("╚══════════════════════════════════════════════════════════════╝");
}
