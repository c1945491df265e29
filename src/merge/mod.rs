//! Merging of scaled partial observations into full reflections.
//!
//! The reference list is rebuilt from scratch on every merge: workers
//! accumulate per-crystal contributions under the per-entry locks, then a
//! single exclusive pass turns the accumulators into intensities. The ESD
//! pass reuses the same scratch fields for the squared deviations.

use crate::crystal::Crystal;
use crate::reflist::RefList;

/// Fully corrected intensity of one observation: the estimate of the
/// full reflection this partial implies.
#[inline]
fn scaled_intensity(cr: &Crystal, intensity: f64, partiality: f64, lorentz: f64, s: f64) -> f64 {
    intensity * (2.0 * cr.b_factor * s * s).exp() / (cr.scale * partiality * lorentz)
}

/// Accumulate one crystal's observations into the shared list.
pub(crate) fn merge_crystal(cr: &Crystal, full: &RefList, min_partiality: f64) {
    if !cr.is_usable() {
        return;
    }
    for obs in &cr.observations {
        if obs.partiality < min_partiality {
            continue;
        }
        let i_scaled = scaled_intensity(
            cr,
            obs.intensity,
            obs.partiality,
            obs.lorentz,
            obs.resolution,
        );
        if !i_scaled.is_finite() {
            continue;
        }
        let entry = full.find_or_add(obs.asu);
        let mut e = entry.lock();
        e.temp1 += i_scaled;
        e.temp2 += 1.0;
        e.redundancy += 1;
    }
}

/// Turn the accumulated numerators into intensities.
pub(crate) fn finalise_intensities(full: &mut RefList) {
    full.for_each_mut(|_, e| {
        if e.temp2 > 0.0 {
            e.i_full = e.temp1 / e.temp2;
        }
    });
}

/// Accumulate one crystal's squared deviations from the merged values.
/// Runs after [`finalise_intensities`] with the scratch zeroed.
pub(crate) fn esd_crystal(cr: &Crystal, full: &RefList, min_partiality: f64) {
    if !cr.is_usable() {
        return;
    }
    for obs in &cr.observations {
        if obs.partiality < min_partiality {
            continue;
        }
        let Some(entry) = full.find(obs.asu) else {
            continue;
        };
        let i_scaled = scaled_intensity(
            cr,
            obs.intensity,
            obs.partiality,
            obs.lorentz,
            obs.resolution,
        );
        if !i_scaled.is_finite() {
            continue;
        }
        let mut e = entry.lock();
        e.temp1 += (i_scaled - e.i_full).powi(2);
    }
}

/// Convert accumulated deviations into ESDs and apply the redundancy
/// floor: entries measured fewer than `min_redundancy` times stay in the
/// list but are marked suppressed.
pub(crate) fn finalise_esds(full: &mut RefList, min_redundancy: u32) {
    full.for_each_mut(|_, e| {
        if e.redundancy > 0 {
            e.esd = e.temp1.sqrt() / e.redundancy as f64;
        }
        e.suppressed = e.redundancy < min_redundancy;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellParameters, Centering, UnitCell};
    use crate::crystal::Observation;
    use crate::types::Hkl;

    fn crystal_with(observations: Vec<Observation>) -> Crystal {
        let cell = UnitCell::from_parameters(
            CellParameters {
                a: 50e-10,
                b: 50e-10,
                c: 50e-10,
                alpha: std::f64::consts::FRAC_PI_2,
                beta: std::f64::consts::FRAC_PI_2,
                gamma: std::f64::consts::FRAC_PI_2,
            },
            Centering::P,
        )
        .unwrap();
        let mut cr = Crystal::new(cell, 1.3e-10, 1e-3, 0.01, 4e6);
        cr.observations = observations;
        cr
    }

    fn obs(hkl: Hkl, intensity: f64, partiality: f64) -> Observation {
        Observation {
            hkl,
            asu: hkl,
            intensity,
            sigma: 1.0,
            partiality,
            lorentz: 1.0,
            resolution: 1e9,
            r_low: 0.0,
            r_high: 0.0,
            clamp_low: false,
            clamp_high: false,
            redundancy: 1,
        }
    }

    #[test]
    fn identical_unit_observations_merge_exactly() {
        let hkl = Hkl::new(1, 0, 0);
        let crystals = vec![
            crystal_with(vec![obs(hkl, 42.0, 1.0)]),
            crystal_with(vec![obs(hkl, 42.0, 1.0)]),
            crystal_with(vec![obs(hkl, 42.0, 1.0)]),
        ];
        let mut full = RefList::new();
        for cr in &crystals {
            merge_crystal(cr, &full, 0.05);
        }
        finalise_intensities(&mut full);
        full.clear_scratch();
        for cr in &crystals {
            esd_crystal(cr, &full, 0.05);
        }
        finalise_esds(&mut full, 2);

        let e = full.lookup(hkl).unwrap();
        assert_eq!(e.i_full, 42.0);
        assert_eq!(e.redundancy, 3);
        assert_eq!(e.esd, 0.0);
        assert!(!e.suppressed);
    }

    #[test]
    fn partiality_correction_restores_full_intensity() {
        let hkl = Hkl::new(2, 0, 0);
        let crystals = vec![
            crystal_with(vec![obs(hkl, 50.0, 0.5)]),
            crystal_with(vec![obs(hkl, 50.0, 0.5)]),
        ];
        let mut full = RefList::new();
        for cr in &crystals {
            merge_crystal(cr, &full, 0.05);
        }
        finalise_intensities(&mut full);
        let e = full.lookup(hkl).unwrap();
        assert_eq!(e.i_full, 100.0);
        assert_eq!(e.redundancy, 2);
    }

    #[test]
    fn low_redundancy_entries_are_suppressed_but_kept() {
        let hkl = Hkl::new(0, 0, 3);
        let crystals = vec![crystal_with(vec![obs(hkl, 10.0, 1.0)])];
        let mut full = RefList::new();
        for cr in &crystals {
            merge_crystal(cr, &full, 0.05);
        }
        finalise_intensities(&mut full);
        full.clear_scratch();
        for cr in &crystals {
            esd_crystal(cr, &full, 0.05);
        }
        finalise_esds(&mut full, 2);
        let e = full.lookup(hkl).unwrap();
        assert!(e.suppressed);
        assert_eq!(e.redundancy, 1);
        assert_eq!(e.i_full, 10.0);
    }

    #[test]
    fn flagged_crystal_does_not_contribute() {
        let hkl = Hkl::new(1, 1, 0);
        let mut bad = crystal_with(vec![obs(hkl, 1e9, 1.0)]);
        bad.flag = crate::crystal::CrystalFlag::RejectedScaling;
        let good = crystal_with(vec![obs(hkl, 5.0, 1.0)]);
        let mut full = RefList::new();
        merge_crystal(&bad, &full, 0.05);
        merge_crystal(&good, &full, 0.05);
        finalise_intensities(&mut full);
        let e = full.lookup(hkl).unwrap();
        assert_eq!(e.redundancy, 1);
        assert_eq!(e.i_full, 5.0);
    }
}
