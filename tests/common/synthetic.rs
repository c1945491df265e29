//! Shared builders for hand-constructed crystals and observations.

use still_merge::{CellParameters, Centering, Crystal, Hkl, Observation, UnitCell};

pub fn cubic_cell(a_angstrom: f64) -> UnitCell {
    UnitCell::from_parameters(
        CellParameters {
            a: a_angstrom * 1e-10,
            b: a_angstrom * 1e-10,
            c: a_angstrom * 1e-10,
            alpha: std::f64::consts::FRAC_PI_2,
            beta: std::f64::consts::FRAC_PI_2,
            gamma: std::f64::consts::FRAC_PI_2,
        },
        Centering::P,
    )
    .expect("cubic cell parameters are valid")
}

pub fn crystal_with(observations: Vec<Observation>) -> Crystal {
    let mut cr = Crystal::new(cubic_cell(50.0), 1.3e-10, 0.5e-3, 0.01, 4e6);
    cr.observations = observations;
    cr
}

pub fn observation(hkl: Hkl, intensity: f64, sigma: f64, partiality: f64) -> Observation {
    Observation {
        hkl,
        asu: hkl,
        intensity,
        sigma,
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

/// Observation with a resolution, for fits that need an abscissa spread.
pub fn observation_at(
    hkl: Hkl,
    intensity: f64,
    sigma: f64,
    partiality: f64,
    resolution: f64,
) -> Observation {
    Observation {
        resolution,
        ..observation(hkl, intensity, sigma, partiality)
    }
}
