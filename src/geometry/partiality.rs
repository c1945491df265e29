//! Excitation errors and the sphere-penetration partiality model.
//!
//! A still exposure sweeps every reciprocal-lattice point between two
//! Ewald spheres: the bandwidth sets their radii and the beam divergence
//! tilts their centres. A reflection is modelled as a sphere of the
//! profile radius; the partiality is the volume fraction swept between
//! the two excitation errors.

use nalgebra::Vector3;

/// Fraction of a unit sphere behind a plane at normalised depth `q`.
///
/// `q = 0` means untouched, `q = 1` fully passed. Cubic smoothstep:
/// p(q) = 3q^2 - 2q^3.
#[inline]
pub fn penetration(q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    3.0 * q * q - 2.0 * q * q * q
}

/// dp/dq of [`penetration`]; zero at both endpoints.
#[inline]
pub fn penetration_gradient(q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    6.0 * (q - q * q)
}

/// dp/dr at excitation error `r` for a profile radius `pr`.
#[inline]
pub fn partiality_gradient(r: f64, pr: f64) -> f64 {
    let q = (r + pr) / (2.0 * pr);
    penetration_gradient(q) / (2.0 * pr)
}

/// dp/d(pr): the depth variable q moves when the profile radius itself
/// changes, since q = (r + pr)/(2 pr).
#[inline]
pub fn partiality_rgradient(r: f64, pr: f64) -> f64 {
    let q = (r + pr) / (2.0 * pr);
    penetration_gradient(q) * (-r / (2.0 * pr * pr))
}

/// Excitation-error pair and partiality of one reflection.
#[derive(Clone, Copy, Debug)]
pub struct PartialityEstimate {
    /// Excitation error against the long-wavelength (sweep start) sphere.
    pub r_low: f64,
    /// Excitation error against the short-wavelength (sweep end) sphere.
    pub r_high: f64,
    pub partiality: f64,
    /// True when `r_low` had to be clamped to the profile radius.
    pub clamp_low: bool,
    /// True when `r_high` had to be clamped to the profile radius.
    pub clamp_high: bool,
}

fn excitation_error(k: f64, tilt_sign: f64, del: f64, tl: f64, zl: f64) -> f64 {
    // Sphere centre sits at radius k from the origin, tilted off the beam
    // axis by the divergence half-angle.
    let cet = tilt_sign * del.sin() * k;
    let cez = -del.cos() * k;
    k - ((tl - cet).powi(2) + (zl - cez).powi(2)).sqrt()
}

/// Estimate the partiality of a reflection at reciprocal position `q`.
///
/// Returns `None` when the reflection's profile sphere never crosses
/// either Ewald sphere, i.e. the reflection is not excited at all.
pub fn estimate(
    q: &Vector3<f64>,
    lambda: f64,
    divergence: f64,
    bandwidth: f64,
    profile_radius: f64,
) -> Option<PartialityEstimate> {
    let tl = q.x.hypot(q.y);
    let zl = q.z;

    let k_low = 1.0 / (lambda * (1.0 + bandwidth / 2.0));
    let k_high = 1.0 / (lambda * (1.0 - bandwidth / 2.0));
    let del = divergence / 2.0;

    let mut r_low = excitation_error(k_low, 1.0, del, tl, zl);
    let mut r_high = excitation_error(k_high, -1.0, del, tl, zl);
    let pr = profile_radius;

    if r_low.signum() == r_high.signum() && r_low.abs() > pr && r_high.abs() > pr {
        return None;
    }

    let mut clamp_low = false;
    let mut clamp_high = false;
    if r_low.abs() > pr {
        r_low = pr.copysign(r_low);
        clamp_low = true;
    }
    if r_high.abs() > pr {
        r_high = pr.copysign(r_high);
        clamp_high = true;
    }

    let q_low = (r_low + pr) / (2.0 * pr);
    let q_high = (r_high + pr) / (2.0 * pr);
    let partiality = (penetration(q_high) - penetration(q_low)).clamp(0.0, 1.0);

    Some(PartialityEstimate {
        r_low,
        r_high,
        partiality,
        clamp_low,
        clamp_high,
    })
}
