// SPDX-License-Identifier: AGPL-3.0-only

//! Known-answer validation of the hull, window, and accuracy stack.
//!
//! Every expected value below is derived by hand from the input points.
//! Exit code 0 if all checks pass, 1 otherwise.

use clexhull::data::{regroup, ClexDataset, FieldNames, RawRecord};
use clexhull::hull::{lower_hull, ConvexHull};
use clexhull::hull_distance::hull_distance;
use clexhull::linalg::Matrix;
use clexhull::metric::{evaluate, ground_state_accuracy, reference_ground_states};
use clexhull::predictor::{EnergyPredictor, RidgeCv, DEFAULT_RIDGE_ALPHAS};
use clexhull::tolerances::EXACT_F64;
use clexhull::validation::ValidationHarness;
use clexhull::windows::stability_windows;
use clexhull::ClexHullError;
use serde_json::json;

const GRID: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Ground-state accuracy validation                           ║");
    println!("║  hull → lower hull → windows → weighted accuracy            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");

    let mut harness = ValidationHarness::new("ground_state");
    let comp = Matrix::column_vector(&GRID);

    println!("\n═══ Lower hull ═══");
    check_lower_hull(&mut harness, &comp);

    println!("═══ Stability windows ═══");
    check_windows(&mut harness);

    println!("═══ Accuracy metric ═══");
    check_metric(&mut harness, &comp);

    println!("═══ Regrouping ═══");
    check_regroup(&mut harness);

    println!("═══ Hull distance and ridge fit ═══");
    check_fit(&mut harness);

    harness.finish();
}

fn check_lower_hull(h: &mut ValidationHarness, comp: &Matrix) {
    let n = 9;
    let xs: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
    let ys: Vec<f64> = xs.iter().map(|x| (x - 0.5).powi(2)).collect();
    match ConvexHull::from_composition_energy(&Matrix::column_vector(&xs), &ys)
        .and_then(|hull| lower_hull(&hull))
    {
        Ok(lower) => {
            h.check_indices("parabola: all points on lower hull", lower.vertices(), &(0..n).collect::<Vec<_>>());
            h.check_abs("parabola: N-1 lower facets", lower.facets().len() as f64, (n - 1) as f64, 0.0);
        }
        Err(e) => h.check_bool(&format!("parabola hull built ({e})"), false),
    }

    let above_chord = [0.0, -0.5, -1.5, -0.5, 0.0];
    match reference_ground_states(comp, &above_chord) {
        Ok(gs) => h.check_indices("chord: vertices {0,2,4}", &gs, &[0, 2, 4]),
        Err(e) => h.check_bool(&format!("chord hull built ({e})"), false),
    }

    let collinear = ConvexHull::from_composition_energy(
        &Matrix::column_vector(&[0.0, 0.5, 1.0]),
        &[0.0, 1.0, 2.0],
    );
    h.check_err("collinear points rejected", &collinear, |e| {
        matches!(e, ClexHullError::DegenerateGeometry(_))
    });
}

fn check_windows(h: &mut ValidationHarness) {
    match stability_windows(&[0, 1, 2, 3, 4], &GRID, &[0.0, -1.0, -1.5, -1.0, 0.0]) {
        Ok(w) => {
            h.check_abs("window x=0.25", w.windows[0], 2.0, EXACT_F64);
            h.check_abs("window x=0.5", w.windows[1], 4.0, EXACT_F64);
            h.check_abs("window x=0.75", w.windows[2], 2.0, EXACT_F64);
        }
        Err(e) => h.check_bool(&format!("windows computed ({e})"), false),
    }
    let dup = stability_windows(&[0, 1, 2], &[0.0, 0.5, 0.5], &[0.0, -1.0, -0.5]);
    h.check_err("duplicate composition rejected", &dup, |e| {
        matches!(e, ClexHullError::DuplicateComposition { .. })
    });
}

fn check_metric(h: &mut ValidationHarness, comp: &Matrix) {
    let reference = [0.0, -0.5, -1.5, -0.5, 0.0];
    let truth = [0, 2, 4];
    match ground_state_accuracy(comp, &reference, &truth) {
        Ok(s) => h.check_abs("identical prediction", s, 1.0, EXACT_F64),
        Err(e) => h.check_bool(&format!("identical prediction scored ({e})"), false),
    }
    let displaced = [0.0, -0.5, -0.4, -0.5, 0.0];
    match ground_state_accuracy(comp, &displaced, &truth) {
        Ok(s) => {
            h.check_upper("displaced minimum drops score", s, 1.0 - 1e-6);
            h.check_lower("score bounded below", s, 0.0);
        }
        Err(e) => h.check_bool(&format!("displaced prediction scored ({e})"), false),
    }
    let convex = [0.0, -1.0, -1.5, -1.0, 0.0];
    match evaluate(comp, &convex, &truth.into_iter().collect()) {
        Ok(r) => {
            h.check_abs("convex: half the window recovered", r.score, 0.5, EXACT_F64);
            h.check_indices("convex: spurious {1,3}", &r.spurious, &[1, 3]);
        }
        Err(e) => h.check_bool(&format!("convex prediction scored ({e})"), false),
    }
    let two_vertex = ground_state_accuracy(
        &Matrix::column_vector(&[0.0, 1.0, 0.5]),
        &[0.0, 0.0, 1.0],
        &[0, 1],
    );
    h.check_err("two-vertex hull is degenerate", &two_vertex, |e| {
        matches!(e, ClexHullError::DegenerateMetric(_))
    });
}

fn check_regroup(h: &mut ValidationHarness) {
    let rows = [json!([0.5]), json!(0.5), json!([[0.5]])];
    for (label, comp) in ["rank 1", "scalar", "rank 2"].iter().zip(rows) {
        let records: Vec<RawRecord> = (0..3)
            .filter_map(|i| {
                json!({"name": format!("c{i}"), "comp": comp.clone(), "corr": [1.0, 0.5], "formation_energy": 0.0})
                    .as_object()
                    .cloned()
            })
            .collect();
        let fields = FieldNames::default();
        let typed = regroup(&records, &fields).and_then(|cols| ClexDataset::from_columns(&cols, &fields));
        match typed {
            Ok(ds) => h.check_bool(
                &format!("comp {label} → (n, 1)"),
                ds.comp.rows() == 3 && ds.comp.cols() == 1,
            ),
            Err(e) => h.check_bool(&format!("comp {label} regrouped ({e})"), false),
        }
    }
    let ragged: Vec<RawRecord> = [json!({"comp": [0.0]}), json!({"comp": [0.0], "corr": [1.0]})]
        .iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
    h.check_err("inconsistent keys rejected", &regroup(&ragged, &FieldNames::default()), |e| {
        matches!(e, ClexHullError::InconsistentKeys { .. })
    });
}

fn check_fit(h: &mut ValidationHarness) {
    let hull_c = Matrix::column_vector(&[0.0, 0.5, 1.0]);
    let test_c = Matrix::column_vector(&[0.25, 0.75]);
    match hull_distance(&hull_c, &[0.0, -1.0, 0.0], &test_c, &[-0.7, 0.1]) {
        Ok(d) => {
            h.check_abs("below hull by 0.2", d[0].unwrap_or(f64::NAN), -0.2, EXACT_F64);
            h.check_abs("above hull by 0.6", d[1].unwrap_or(f64::NAN), 0.6, EXACT_F64);
        }
        Err(e) => h.check_bool(&format!("hull distance computed ({e})"), false),
    }

    let rows: Vec<Vec<f64>> = GRID.iter().map(|&x| vec![1.0, x, x * x]).collect();
    let energy: Vec<f64> = GRID.iter().map(|&x| -4.0 * x * (1.0 - x)).collect();
    let fitted = Matrix::from_rows(&rows).and_then(|corr| {
        let fit = RidgeCv::fit(&corr, &energy, &DEFAULT_RIDGE_ALPHAS)?;
        let predicted = fit.model.predict(&corr)?;
        ground_state_accuracy(&Matrix::column_vector(&GRID), &predicted, &[0, 1, 2, 3, 4])
    });
    match fitted {
        Ok(s) => h.check_abs("ridge fit of exact quadratic scores 1", s, 1.0, 1e-9),
        Err(e) => h.check_bool(&format!("ridge fit scored ({e})"), false),
    }
}
