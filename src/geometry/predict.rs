//! Full-sphere reflection prediction.
//!
//! Scans the index box implied by the resolution cutoff and keeps every
//! reflection whose Ewald-sphere traversal overlaps the exposure.

use super::partiality;
use crate::cell::UnitCell;
use crate::symmetry;
use crate::types::Hkl;

/// One predicted reflection of a crystal, before intensities are known.
#[derive(Clone, Copy, Debug)]
pub struct Prediction {
    pub hkl: Hkl,
    pub partiality: f64,
    pub lorentz: f64,
    pub resolution: f64,
    pub r_low: f64,
    pub r_high: f64,
    pub clamp_low: bool,
    pub clamp_high: bool,
}

/// Predict all reflections of `cell` excited by a still exposure.
///
/// `max_resolution` is the s = 1/(2d) cutoff in inverse metres.
/// Systematic absences of the cell's centering are skipped. Reflections
/// with partiality below `min_partiality` are dropped.
pub fn predict_reflections(
    cell: &UnitCell,
    lambda: f64,
    divergence: f64,
    bandwidth: f64,
    profile_radius: f64,
    max_resolution: f64,
    min_partiality: f64,
) -> Vec<Prediction> {
    let (av, bv, cv) = cell.direct_basis();
    let qmax = 2.0 * max_resolution;
    let hmax = (qmax * av.norm()).ceil() as i32;
    let kmax = (qmax * bv.norm()).ceil() as i32;
    let lmax = (qmax * cv.norm()).ceil() as i32;

    let mut out = Vec::new();
    for h in -hmax..=hmax {
        for k in -kmax..=kmax {
            for l in -lmax..=lmax {
                let hkl = Hkl::new(h, k, l);
                if hkl.is_origin() {
                    continue;
                }
                if symmetry::forbidden(hkl, cell.centering()) {
                    continue;
                }
                let q = cell.reciprocal(hkl);
                let s = 0.5 * q.norm();
                if s > max_resolution {
                    continue;
                }
                let Some(est) =
                    partiality::estimate(&q, lambda, divergence, bandwidth, profile_radius)
                else {
                    continue;
                };
                if est.partiality < min_partiality {
                    continue;
                }
                out.push(Prediction {
                    hkl,
                    partiality: est.partiality,
                    // Still exposures: no rotation sweep, so no angular
                    // velocity correction.
                    lorentz: 1.0,
                    resolution: s,
                    r_low: est.r_low,
                    r_high: est.r_high,
                    clamp_low: est.clamp_low,
                    clamp_high: est.clamp_high,
                });
            }
        }
    }
    out
}
