//! Reusable per-worker scratch for the normal equations.

use super::params::NUM_PARAMS;
use nalgebra::{DMatrix, DVector};

/// One normal-equation system, allocated once per worker and reused
/// across iterations and crystals.
pub(crate) struct RefineWorkspace {
    pub(crate) m: DMatrix<f64>,
    pub(crate) v: DVector<f64>,
    pub(crate) gradients: [f64; NUM_PARAMS],
}

impl RefineWorkspace {
    pub(crate) fn new() -> Self {
        Self {
            m: DMatrix::zeros(NUM_PARAMS, NUM_PARAMS),
            v: DVector::zeros(NUM_PARAMS),
            gradients: [0.0; NUM_PARAMS],
        }
    }

    pub(crate) fn reset(&mut self) {
        self.m.fill(0.0);
        self.v.fill(0.0);
    }
}
