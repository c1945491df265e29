mod common;

use common::synthetic::cubic_cell;
use still_merge::geometry::predict_reflections;
use still_merge::refine::{partial_dev, refine_against};
use still_merge::reflist::RefList;
use still_merge::{Crystal, Observation, SymOpList};

const LAMBDA: f64 = 1.3e-10;
const DIV: f64 = 0.5e-3;
const BW: f64 = 0.01;
const PROFILE_RADIUS: f64 = 4e6;
const MAX_RES: f64 = 1.0 / (2.0 * 4e-10);

/// A crystal whose observations are noise-free partials of a constant
/// reference intensity, plus that reference list.
fn noise_free_crystal(i_full: f64) -> (Crystal, RefList) {
    let cell = cubic_cell(50.0);
    let predictions =
        predict_reflections(&cell, LAMBDA, DIV, BW, PROFILE_RADIUS, MAX_RES, 0.05);
    assert!(
        predictions.len() > 50,
        "expected a healthy number of predictions, got {}",
        predictions.len()
    );

    let mut crystal = Crystal::new(cell, LAMBDA, DIV, BW, PROFILE_RADIUS);
    let reference = RefList::new();
    for pred in &predictions {
        let intensity = pred.partiality * i_full;
        crystal.observations.push(Observation {
            hkl: pred.hkl,
            asu: pred.hkl,
            intensity,
            sigma: 1e-6_f64.max(intensity * 1e-4),
            partiality: pred.partiality,
            lorentz: pred.lorentz,
            resolution: pred.resolution,
            r_low: pred.r_low,
            r_high: pred.r_high,
            clamp_low: pred.clamp_low,
            clamp_high: pred.clamp_high,
            redundancy: 1,
        });
        reference.find_or_add(pred.hkl).lock().i_full = i_full;
    }
    (crystal, reference)
}

#[test]
fn refinement_recovers_perturbed_basis() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut crystal, reference) = noise_free_crystal(1000.0);
    let sym = SymOpList::from_name("1").unwrap();
    let astar_true = crystal.cell.astar();

    // The stream handed us a cell 0.5% off along a*.
    crystal
        .cell
        .set_reciprocal(astar_true * 1.005, crystal.cell.bstar(), crystal.cell.cstar());
    crystal.update_partialities(&sym);

    let initial_dev = partial_dev(&crystal, &reference, 0.05);
    assert!(
        initial_dev > 0.0,
        "perturbation must produce a partiality mismatch"
    );

    let outcome = refine_against(&mut crystal, &reference, &sym, 0.05, 0.01, 10);

    assert!(crystal.is_usable(), "refinement must not flag a clean crystal");
    assert!(
        outcome.converged,
        "max shift must drop below threshold within 10 cycles, last = {:.3e}",
        outcome.final_shift
    );
    assert!(
        outcome.final_dev < initial_dev,
        "residual must decrease: {} -> {}",
        initial_dev,
        outcome.final_dev
    );
    let recovered = crystal.cell.astar();
    let rel_err = (recovered - astar_true).norm() / astar_true.norm();
    assert!(
        rel_err < 2e-3,
        "a* must move back toward the truth, relative error {rel_err:.2e}"
    );
}

#[test]
fn refinement_reduces_residual_each_iteration() {
    let (mut crystal, reference) = noise_free_crystal(1000.0);
    let sym = SymOpList::from_name("1").unwrap();
    crystal.cell.set_reciprocal(
        crystal.cell.astar() * 1.005,
        crystal.cell.bstar(),
        crystal.cell.cstar(),
    );
    crystal.update_partialities(&sym);

    let mut devs = vec![partial_dev(&crystal, &reference, 0.05)];
    for _ in 0..6 {
        let outcome = refine_against(&mut crystal, &reference, &sym, 0.05, 0.0, 1);
        devs.push(outcome.final_dev);
        if !crystal.is_usable() {
            panic!("refinement flagged a clean crystal");
        }
    }
    for pair in devs.windows(2) {
        assert!(
            pair[1] <= pair[0] * 1.05 + devs[0] * 1e-12,
            "residual must not increase: {} -> {}",
            pair[0],
            pair[1]
        );
    }
    assert!(
        devs.last().unwrap() < &(devs[0] * 0.01),
        "six noise-free iterations should cut the residual by 100x: {devs:?}"
    );
}

#[test]
fn unperturbed_crystal_converges_immediately() {
    let (mut crystal, reference) = noise_free_crystal(500.0);
    let sym = SymOpList::from_name("1").unwrap();
    crystal.update_partialities(&sym);

    let outcome = refine_against(&mut crystal, &reference, &sym, 0.05, 0.01, 10);
    assert!(outcome.converged);
    assert!(
        outcome.cycles <= 2,
        "a perfect model needs no refinement, took {} cycles",
        outcome.cycles
    );
}
