use serde::Serialize;
use std::fmt;

/// Signed Miller index triple.
///
/// Used both for raw (as-predicted) indices and for asymmetric-unit
/// representatives; which one a given `Hkl` holds is determined by context.
/// `(0,0,0)` never denotes a reflection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct Hkl {
    pub h: i32,
    pub k: i32,
    pub l: i32,
}

impl Hkl {
    pub const fn new(h: i32, k: i32, l: i32) -> Self {
        Self { h, k, l }
    }

    #[inline]
    pub fn is_origin(&self) -> bool {
        self.h == 0 && self.k == 0 && self.l == 0
    }
}

impl fmt::Display for Hkl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.h, self.k, self.l)
    }
}

/// One record of the merged output list.
#[derive(Clone, Debug, Serialize)]
pub struct MergedReflection {
    pub hkl: Hkl,
    /// Best estimate of the full-reflection intensity.
    pub i_full: f64,
    /// Standard deviation of `i_full` from the observation spread.
    pub sigma: f64,
    /// Number of partial observations that contributed.
    pub redundancy: u32,
    /// True when the redundancy fell below the configured minimum. The
    /// record is kept so downstream tools can see what was measured.
    pub suppressed: bool,
}
