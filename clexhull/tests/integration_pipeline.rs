// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: record file → ridge fit → ground-state report.

use clexhull::config::AnalysisConfig;
use clexhull::data::{ClexDataset, FieldNames};
use clexhull::hull_distance::proposed_ground_states;
use clexhull::linalg::Matrix;
use clexhull::pipeline::analyze;
use clexhull::predictor::{load_eci_set, EciModel, EnergyPredictor, RidgeCv};
use clexhull::ClexHullError;
use serde_json::json;
use std::io::Write;

/// Binary system with corr = [1, x, x², x³]; the energies follow a cubic
/// so the basis can represent them exactly.
fn write_binary_system(dir: &std::path::Path) -> std::path::PathBuf {
    let xs = [0.0, 0.125, 0.25, 0.375, 0.5, 0.625, 0.75, 0.875, 1.0];
    let mut records = Vec::new();
    for (i, &x) in xs.iter().enumerate() {
        let e = -x * (1.0 - x) * (1.0 + 0.5 * x);
        // x = 0.375 is uncalculated, in the old-style `{}` form
        let energy = if i == 3 { json!({}) } else { json!(e) };
        records.push(json!({
            "name": format!("SCEL{i}/0"),
            "comp": [[x]],
            "corr": [[1.0, x, x * x, x * x * x]],
            "formation_energy": energy,
        }));
    }
    let path = dir.join("configs.json");
    let mut f = std::fs::File::create(&path).expect("create");
    write!(f, "{}", serde_json::to_string_pretty(&records).expect("json")).expect("write");
    path
}

#[test]
fn ridge_fit_of_exact_basis_recovers_every_ground_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_binary_system(dir.path());
    let config = AnalysisConfig::default();
    let dataset = ClexDataset::load(&path, &config.fields).expect("load");
    assert_eq!(dataset.len(), 9);

    let calc = dataset.calculated();
    assert_eq!(calc.original_index.len(), 8);
    let fit = RidgeCv::fit(&calc.corr, &calc.formation_energy, &config.ridge_alphas).expect("fit");
    let report = analyze(&dataset, &fit.model, &config).expect("analysis");

    // the cubic is convex on [0, 1], so every calculated point is a ground state
    assert_eq!(report.reference_ground_states, vec![0, 1, 2, 4, 5, 6, 7, 8]);
    assert_eq!(report.predicted_ground_states, report.reference_ground_states);
    assert!((report.score - 1.0).abs() < 1e-12);
    assert!(report.rmse < 1e-4);
    // the uncalculated configuration sits below the chord of its neighbors
    assert!(report.below_hull.iter().any(|b| b.index == 3 && !b.calculated));

    let out = dir.path().join("out").join("report.json");
    report.save_report(&out).expect("save");
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).expect("read")).expect("parse");
    assert_eq!(saved["n_calculated"], json!(8));
    assert_eq!(saved["windows"].as_array().map(Vec::len), Some(6));
}

#[test]
fn single_well_predictor_misses_ground_states() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_binary_system(dir.path());
    let dataset = ClexDataset::load(&path, &FieldNames::default()).expect("load");

    // a single deep well at x = 0.75 hides every other interior ground state;
    // the score stays 1 because nothing it predicts is spurious
    let well = |corr: &Matrix| -> Vec<f64> {
        (0..corr.rows())
            .map(|i| {
                let x = corr.get(i, 1);
                if (x - 0.75).abs() < 1e-12 { -1.0 } else { 0.0 }
            })
            .collect()
    };
    let report = analyze(&dataset, &well, &AnalysisConfig::default()).expect("analysis");
    assert_eq!(report.predicted_ground_states, vec![0, 6, 8]);
    assert!((report.score - 1.0).abs() < 1e-12);
    assert_eq!(report.missed_ground_states, vec![1, 2, 4, 5, 7]);
}

#[test]
fn eci_samples_propose_missing_ground_states() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_binary_system(dir.path());
    let dataset = ClexDataset::load(&path, &FieldNames::default()).expect("load");

    // exact ECI: the uncalculated x = 0.375 is below the hull of the rest
    let exact = EciModel {
        eci: vec![0.0, -1.0, 0.5, 0.5],
    };
    let check = exact.predict(&dataset.corr).expect("predict");
    assert!((check[8]).abs() < 1e-12);

    let counts = proposed_ground_states(&dataset, &[exact.clone(), exact], 1e-9).expect("proposals");
    assert_eq!(counts.get(&3), Some(&2));
    assert_eq!(counts.len(), 1);
}

#[test]
fn eci_samples_from_file_count_proposals_per_sample() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_binary_system(dir.path());
    let dataset = ClexDataset::load(&path, &FieldNames::default()).expect("load");

    // the flat sample predicts every configuration on the hull
    let samples = dir.path().join("eci_samples.json");
    std::fs::write(&samples, "[[0.0, -1.0, 0.5, 0.5], [0.0, 0.0, 0.0, 0.0]]").expect("write");
    let eci_set = load_eci_set(&samples).expect("eci set");
    let counts = proposed_ground_states(&dataset, &eci_set, 1e-9).expect("proposals");
    assert_eq!(counts.into_iter().collect::<Vec<_>>(), vec![(3, 1)]);
}

#[test]
fn fitted_eci_export_into_basis_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_binary_system(dir.path());
    let config = AnalysisConfig::default();
    let dataset = ClexDataset::load(&path, &config.fields).expect("load");
    let calc = dataset.calculated();
    let fit = RidgeCv::fit(&calc.corr, &calc.formation_energy, &config.ridge_alphas).expect("fit");

    let basis = dir.path().join("basis.json");
    let orbits: Vec<serde_json::Value> = (0..4)
        .map(|k| json!({"prototype": {"size": k}, "cluster_functions": {}}))
        .collect();
    std::fs::write(&basis, json!({"orbits": orbits}).to_string()).expect("write basis");
    let out = dir.path().join("eci.json");
    fit.model.write_basis_json(&basis, &out).expect("export");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).expect("read")).expect("parse");
    for (k, &eci) in fit.model.eci.iter().enumerate() {
        assert_eq!(written["orbits"][k]["cluster_functions"]["eci"], json!(eci));
        assert_eq!(written["orbits"][k]["prototype"]["size"], json!(k));
    }
}

#[test]
fn ternary_data_is_rejected_by_the_metric() {
    let dataset = ClexDataset {
        names: (0..4).map(|i| format!("t{i}")).collect(),
        comp: Matrix::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.3, 0.3],
        ])
        .expect("matrix"),
        corr: Matrix::from_rows(&[vec![1.0], vec![1.0], vec![1.0], vec![1.0]]).expect("matrix"),
        formation_energy: vec![Some(0.0), Some(0.0), Some(0.0), Some(-1.0)],
    };
    let truth = |_: &Matrix| vec![0.0, 0.0, 0.0, -1.0];
    assert!(matches!(
        analyze(&dataset, &truth, &AnalysisConfig::default()),
        Err(ClexHullError::UnsupportedDimension { expected: 1, got: 2 })
    ));
}
