//! Gauss-Newton refinement of one crystal against the reference list.

use super::gradients::gradients_for;
use super::params::{apply_shift, ParamSnapshot, RefineParam, NUM_PARAMS};
use super::workspace::RefineWorkspace;
use crate::crystal::{Crystal, CrystalFlag};
use crate::reflist::RefList;
use crate::symmetry::SymOpList;
use log::debug;

/// Observations dimmer than this many sigma carry no refinement signal.
const MIN_SNR_REFINE: f64 = 5.0;

/// What one crystal's refinement did.
#[derive(Clone, Copy, Debug, Default)]
pub struct RefineOutcome {
    pub cycles: u32,
    pub converged: bool,
    pub initial_dev: f64,
    pub final_dev: f64,
    pub final_shift: f64,
}

/// Sum of squared residuals (I_obs - p G I_full)^2 over the scalable
/// observations with a merged reference value.
pub(crate) fn mean_partial_dev(
    cr: &Crystal,
    reference: &RefList,
    min_partiality: f64,
) -> f64 {
    let mut dev = 0.0;
    for obs in &cr.observations {
        if obs.partiality < min_partiality {
            continue;
        }
        if obs.intensity.abs() < MIN_SNR_REFINE * obs.sigma {
            continue;
        }
        let Some(entry) = reference.lookup(obs.asu) else {
            continue;
        };
        if !entry.i_full.is_finite() {
            continue;
        }
        let i_pred = obs.partiality * cr.scale * entry.i_full;
        dev += (obs.intensity - i_pred).powi(2);
    }
    dev
}

/// One Gauss-Newton step. Returns the largest applied shift, or `None`
/// when the solve failed or produced a non-finite shift.
fn pr_iterate(
    cr: &mut Crystal,
    reference: &RefList,
    ws: &mut RefineWorkspace,
    min_partiality: f64,
) -> Option<f64> {
    ws.reset();
    let mut n_used = 0usize;

    for i in 0..cr.observations.len() {
        let obs = cr.observations[i];
        if obs.partiality < min_partiality {
            continue;
        }
        if obs.intensity.abs() < MIN_SNR_REFINE * obs.sigma {
            continue;
        }
        let Some(entry) = reference.lookup(obs.asu) else {
            continue;
        };
        let i_full = cr.scale * entry.i_full;
        if !i_full.is_finite() {
            continue;
        }
        let delta_i = obs.intensity - obs.partiality * i_full;

        gradients_for(cr, &obs, &mut ws.gradients);

        for k in 0..NUM_PARAMS {
            let gk = ws.gradients[k];
            for g in 0..NUM_PARAMS {
                ws.m[(g, k)] += ws.gradients[g] * gk * i_full * i_full;
            }
            ws.v[k] += delta_i * i_full * gk;
        }
        n_used += 1;
    }

    if n_used < 2 {
        return None;
    }

    // Pin excluded or data-free parameters so the system stays regular.
    for param in RefineParam::ALL {
        let i = param.index();
        if !param.is_refined() || ws.m[(i, i)] <= 0.0 {
            for j in 0..NUM_PARAMS {
                ws.m[(i, j)] = 0.0;
                ws.m[(j, i)] = 0.0;
            }
            ws.m[(i, i)] = 1.0;
            ws.v[i] = 0.0;
        }
    }

    // The cell columns and the div/radius columns live on wildly
    // different scales; equilibrate before the Householder solve.
    let mut d = [0.0f64; NUM_PARAMS];
    for (i, di) in d.iter_mut().enumerate() {
        *di = 1.0 / ws.m[(i, i)].sqrt();
    }
    let mut m_eq = ws.m.clone();
    let mut v_eq = ws.v.clone();
    for i in 0..NUM_PARAMS {
        for j in 0..NUM_PARAMS {
            m_eq[(i, j)] *= d[i] * d[j];
        }
        v_eq[i] *= d[i];
    }

    let solved = m_eq.qr().solve(&v_eq)?;

    let mut max_shift = 0.0f64;
    for param in RefineParam::ALL {
        if !param.is_refined() {
            continue;
        }
        let i = param.index();
        let shift = solved[i] * d[i];
        if !shift.is_finite() {
            return None;
        }
        apply_shift(cr, param, shift);
        max_shift = max_shift.max(shift.abs());
    }
    Some(max_shift)
}

/// Refine the model parameters of one crystal. On solver failure the
/// parameters are reverted and the crystal is flagged for this cycle.
pub(crate) fn refine_crystal(
    cr: &mut Crystal,
    reference: &RefList,
    sym: &SymOpList,
    ws: &mut RefineWorkspace,
    min_partiality: f64,
    shift_convergence: f64,
    max_cycles: u32,
) -> RefineOutcome {
    let mut outcome = RefineOutcome::default();
    if !cr.is_usable() {
        return outcome;
    }

    let snapshot = ParamSnapshot::capture(cr);
    outcome.initial_dev = mean_partial_dev(cr, reference, min_partiality);
    outcome.final_dev = outcome.initial_dev;

    for cycle in 0..max_cycles {
        let Some(max_shift) = pr_iterate(cr, reference, ws, min_partiality) else {
            snapshot.restore(cr);
            cr.update_partialities(sym);
            cr.flag = CrystalFlag::RejectedScaling;
            return outcome;
        };

        cr.update_partialities(sym);
        let dev = mean_partial_dev(cr, reference, min_partiality);
        debug!(
            "pr cycle {cycle}: max shift = {max_shift:.3e}, dev = {dev:.3e}"
        );

        outcome.cycles = cycle + 1;
        outcome.final_dev = dev;
        outcome.final_shift = max_shift;
        if max_shift < shift_convergence {
            outcome.converged = true;
            break;
        }
    }

    if !cr.cell.is_finite()
        || !cr.divergence.is_finite()
        || !cr.profile_radius.is_finite()
        || cr.profile_radius <= 0.0
    {
        snapshot.restore(cr);
        cr.update_partialities(sym);
        cr.flag = CrystalFlag::RejectedScaling;
    }
    outcome
}
