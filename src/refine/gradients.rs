//! Partiality gradients with respect to the model parameters.
//!
//! Each observation's partiality depends on its two excitation errors,
//! which in turn depend on the reciprocal basis, the beam divergence and
//! the profile radius. The chain is evaluated around the scattering
//! angles (tt, azi) of the reflection: tt against the beam axis at the
//! Ewald-sphere centre, azi in the detector plane.
//!
//! Sign conventions: the partiality is p = f(q_high) - f(q_low), so the
//! two excitation-error endpoints enter with opposite signs. An endpoint
//! whose excitation error is clamped at the profile radius contributes
//! nothing (the penetration gradient vanishes there anyway).

use super::params::{RefineParam, NUM_PARAMS};
use crate::crystal::{Crystal, Observation};
use crate::geometry::{partiality_gradient, partiality_rgradient};

/// Fill `out` with dp/d(theta_k) for every parameter.
pub(crate) fn gradients_for(cr: &Crystal, obs: &Observation, out: &mut [f64; NUM_PARAMS]) {
    let q = cr.cell.reciprocal(obs.hkl);
    let kw = 1.0 / cr.lambda;
    let pr = cr.profile_radius;

    // Direction from the (mean) Ewald-sphere centre to the reflection.
    let ex = q.x;
    let ey = q.y;
    let ez = q.z + kw;
    let dist = (ex * ex + ey * ey + ez * ez).sqrt();
    let tt = (ez / dist).clamp(-1.0, 1.0).acos();
    let azi = ey.atan2(ex);

    let (sin_tt, cos_tt) = tt.sin_cos();
    let (sin_azi, cos_azi) = azi.sin_cos();
    let ux = sin_tt * cos_azi;
    let uy = sin_tt * sin_azi;
    let uz = cos_tt;

    let pg_low = if obs.clamp_low {
        0.0
    } else {
        partiality_gradient(obs.r_low, pr)
    };
    let pg_high = if obs.clamp_high {
        0.0
    } else {
        partiality_gradient(obs.r_high, pr)
    };
    // dp/dr for a displacement that moves both excitation errors together.
    let g_r = pg_high - pg_low;

    let h = obs.hkl.h as f64;
    let k = obs.hkl.k as f64;
    let l = obs.hkl.l as f64;

    // Moving a basis component displaces the reflection along one axis;
    // the excitation errors change by minus the projection on the sphere
    // normal.
    let gx = -ux * g_r;
    let gy = -uy * g_r;
    let gz = -uz * g_r;

    // Divergence tilts the two sphere centres in opposite transverse
    // directions.
    let (sin_d, cos_d) = (cr.divergence / 2.0).sin_cos();
    let k_low = kw / (1.0 + cr.bandwidth / 2.0);
    let k_high = kw / (1.0 - cr.bandwidth / 2.0);
    let dr_low_ddiv = 0.5 * k_low * (cos_d * ux + sin_d * uz);
    let dr_high_ddiv = 0.5 * k_high * (-cos_d * ux + sin_d * uz);
    let g_div = -pg_low * dr_low_ddiv + pg_high * dr_high_ddiv;

    // Profile radius moves the penetration depth q itself.
    let g_rad =
        partiality_rgradient(obs.r_high, pr) - partiality_rgradient(obs.r_low, pr);

    for param in RefineParam::ALL {
        use RefineParam::*;
        out[param.index()] = match param {
            Asx => h * gx,
            Asy => h * gy,
            Asz => h * gz,
            Bsx => k * gx,
            Bsy => k * gy,
            Bsz => k * gz,
            Csx => l * gx,
            Csy => l * gy,
            Csz => l * gz,
            Div => g_div,
            Bw => 0.0,
            R => g_rad,
        };
    }
}
