//! Point-group symmetry engine.
//!
//! Builds the operator list for a Hermann-Mauguin point-group identifier
//! and provides asymmetric-unit folding, equivalent generation and
//! systematic-absence classification. Folding is a pure function of the
//! input indices: the representative is the lexicographically greatest
//! triple in the orbit, so two calls (or two threads) always agree.

mod groups;
mod ops;

pub use ops::IntMatrix;

use crate::cell::Centering;
use crate::error::{EngineError, Result};
use crate::types::Hkl;

/// An ordered list of point-group operators. Immutable after construction.
#[derive(Clone, Debug)]
pub struct SymOpList {
    name: String,
    ops: Vec<IntMatrix>,
}

impl SymOpList {
    /// Build the full operator list for a point-group identifier such as
    /// `"1"`, `"mmm"`, `"4/mmm"` or `"6/mmm"`.
    pub fn from_name(name: &str) -> Result<Self> {
        let gens = groups::generators(name)?;
        let mut ops = vec![IntMatrix::identity()];

        // Close the generator set under composition.
        loop {
            let mut grew = false;
            let snapshot = ops.clone();
            for a in &snapshot {
                for g in &gens {
                    let c = a.compose(g);
                    if !ops.contains(&c) {
                        ops.push(c);
                        grew = true;
                    }
                }
            }
            if !grew {
                break;
            }
            if ops.len() > groups::MAX_GROUP_ORDER {
                return Err(EngineError::UnknownPointGroup(name.to_string()));
            }
        }

        Ok(Self {
            name: name.to_string(),
            ops,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of operators, including the identity.
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Fold indices into the asymmetric unit.
    ///
    /// Applies every operator and keeps the lexicographically greatest
    /// image. Idempotent: folding a representative returns itself.
    pub fn to_asu(&self, hkl: Hkl) -> Hkl {
        let mut best = hkl;
        for op in &self.ops {
            let cand = op.apply(hkl);
            if cand > best {
                best = cand;
            }
        }
        best
    }

    /// All distinct symmetry-equivalent triples of `hkl`, in operator
    /// order with duplicates removed.
    pub fn equivalents(&self, hkl: Hkl) -> Vec<Hkl> {
        let mut out: Vec<Hkl> = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let cand = op.apply(hkl);
            if !out.contains(&cand) {
                out.push(cand);
            }
        }
        out
    }
}

/// Report whether `hkl` is systematically absent for the given lattice
/// centering.
pub fn forbidden(hkl: Hkl, centering: Centering) -> bool {
    let Hkl { h, k, l } = hkl;
    match centering {
        Centering::P => false,
        Centering::A => (k + l).rem_euclid(2) != 0,
        Centering::B => (h + l).rem_euclid(2) != 0,
        Centering::C => (h + k).rem_euclid(2) != 0,
        Centering::I => (h + k + l).rem_euclid(2) != 0,
        Centering::F => {
            let (ph, pk, pl) = (h.rem_euclid(2), k.rem_euclid(2), l.rem_euclid(2));
            !(ph == pk && pk == pl)
        }
        Centering::R => (-h + k + l).rem_euclid(3) != 0,
        Centering::H => (h - k).rem_euclid(3) != 0,
    }
}
