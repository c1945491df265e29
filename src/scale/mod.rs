//! Per-crystal scaling against the reference list.
//!
//! Each usable crystal gets a Wilson-style joint fit of its scale factor G
//! and temperature factor B: y = ln(I / (p L I_ref)) regressed against
//! s^2 gives intercept ln G and slope -2B. The fit is convex and cheap,
//! so it runs once per crystal per scaling cycle.

mod fit;

use crate::crystal::{Crystal, CrystalFlag};
use crate::pipeline::ScaleBounds;
use crate::reflist::RefList;
use fit::WeightedLineFit;
use log::debug;

/// Observations dimmer than this many sigma are left out of the fit.
const MIN_SNR_SCALE: f64 = 5.0;

/// Fit G and B for one crystal. Flags the crystal when fewer than two
/// usable observations match the reference or the fit degenerates.
pub(crate) fn scale_crystal(cr: &mut Crystal, reference: &RefList, min_partiality: f64) {
    if !cr.is_usable() {
        return;
    }

    let mut fit = WeightedLineFit::default();
    for obs in &cr.observations {
        if obs.partiality < min_partiality {
            continue;
        }
        if obs.intensity.abs() < MIN_SNR_SCALE * obs.sigma {
            continue;
        }
        // A scalable observation without a merged reference value cannot
        // contribute; this is the expected case for sparse references.
        let Some(entry) = reference.lookup(obs.asu) else {
            continue;
        };
        let i_ref = entry.i_full;
        let corr = obs.partiality * obs.lorentz;
        let i_obs = obs.intensity / corr;
        if !(i_ref > 0.0) || !(i_obs > 0.0) || !i_ref.is_finite() || !i_obs.is_finite() {
            continue;
        }
        fit.add(
            obs.resolution * obs.resolution,
            (i_obs / i_ref).ln(),
            1.0,
        );
    }

    if fit.len() < 2 {
        cr.flag = CrystalFlag::RejectedScaling;
        return;
    }

    let Some((c0, c1)) = fit.solve() else {
        cr.flag = CrystalFlag::RejectedScaling;
        return;
    };

    cr.scale = c0.exp();
    cr.b_factor = -c1 / 2.0;
    debug!(
        "scaled crystal: n={} G={:.4} B={:.3e} m^2",
        fit.len(),
        cr.scale,
        cr.b_factor
    );
}

/// Flag crystals whose fitted scale or temperature factor is out of
/// bounds or non-finite.
pub(crate) fn reject_outliers(crystals: &mut [Crystal], bounds: &ScaleBounds) {
    for cr in crystals.iter_mut() {
        if cr.flag == CrystalFlag::RejectedPermanently {
            continue;
        }
        let g = cr.scale;
        let b = cr.b_factor;
        let bad = !g.is_finite()
            || g <= 0.0
            || g > bounds.g_max
            || !b.is_finite()
            || b.abs() > bounds.b_max;
        if bad {
            debug!("rejecting crystal: G={g:.4} B={b:.3e}");
            cr.flag = CrystalFlag::RejectedScaling;
        }
    }
}

/// Divide every scale factor by the arithmetic mean over non-flagged
/// crystals, so that mean G = 1. Returns the normalisation constant.
pub(crate) fn normalise_scales(crystals: &mut [Crystal]) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for cr in crystals.iter() {
        if cr.is_usable() {
            total += cr.scale;
            n += 1;
        }
    }
    if n == 0 || !(total > 0.0) {
        return 1.0;
    }
    let norm = total / n as f64;
    for cr in crystals.iter_mut() {
        cr.scale /= norm;
    }
    norm
}

/// Mean |change in G| over non-flagged crystals since `old_scales`.
pub(crate) fn mean_scale_change(crystals: &[Crystal], old_scales: &[f64]) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for (cr, &old) in crystals.iter().zip(old_scales) {
        if cr.is_usable() {
            total += (cr.scale - old).abs();
            n += 1;
        }
    }
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}
