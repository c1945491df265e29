//! The refineable parameter enumeration.
//!
//! Indices are stable: the normal-equation system is always 12x12 and a
//! parameter that is not refined keeps its row and column (pinned to a
//! unit diagonal) so the bookkeeping never shifts.

use crate::crystal::Crystal;
use nalgebra::Vector3;

/// Per-crystal model parameters, in normal-equation order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefineParam {
    Asx,
    Asy,
    Asz,
    Bsx,
    Bsy,
    Bsz,
    Csx,
    Csy,
    Csz,
    Div,
    Bw,
    R,
}

pub const NUM_PARAMS: usize = 12;

impl RefineParam {
    pub const ALL: [RefineParam; NUM_PARAMS] = [
        RefineParam::Asx,
        RefineParam::Asy,
        RefineParam::Asz,
        RefineParam::Bsx,
        RefineParam::Bsy,
        RefineParam::Bsz,
        RefineParam::Csx,
        RefineParam::Csy,
        RefineParam::Csz,
        RefineParam::Div,
        RefineParam::Bw,
        RefineParam::R,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The bandwidth stays at its nominal value; everything else moves.
    #[inline]
    pub fn is_refined(self) -> bool {
        !matches!(self, RefineParam::Bw)
    }
}

/// Snapshot of everything post-refinement may touch, for revert on failure.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParamSnapshot {
    astar: Vector3<f64>,
    bstar: Vector3<f64>,
    cstar: Vector3<f64>,
    divergence: f64,
    bandwidth: f64,
    profile_radius: f64,
}

impl ParamSnapshot {
    pub(crate) fn capture(cr: &Crystal) -> Self {
        Self {
            astar: cr.cell.astar(),
            bstar: cr.cell.bstar(),
            cstar: cr.cell.cstar(),
            divergence: cr.divergence,
            bandwidth: cr.bandwidth,
            profile_radius: cr.profile_radius,
        }
    }

    pub(crate) fn restore(&self, cr: &mut Crystal) {
        cr.cell.set_reciprocal(self.astar, self.bstar, self.cstar);
        cr.divergence = self.divergence;
        cr.bandwidth = self.bandwidth;
        cr.profile_radius = self.profile_radius;
    }
}

/// Apply one parameter shift to the crystal model.
pub(crate) fn apply_shift(cr: &mut Crystal, param: RefineParam, shift: f64) {
    use RefineParam::*;
    match param {
        Div => cr.divergence += shift,
        Bw => cr.bandwidth += shift,
        R => cr.profile_radius += shift,
        _ => {
            let mut a = cr.cell.astar();
            let mut b = cr.cell.bstar();
            let mut c = cr.cell.cstar();
            match param {
                Asx => a.x += shift,
                Asy => a.y += shift,
                Asz => a.z += shift,
                Bsx => b.x += shift,
                Bsy => b.y += shift,
                Bsz => b.z += shift,
                Csx => c.x += shift,
                Csy => c.y += shift,
                Csz => c.z += shift,
                _ => unreachable!(),
            }
            cr.cell.set_reciprocal(a, b, c);
        }
    }
}
