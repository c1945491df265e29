//! Unit-cell representation and reciprocal-space geometry.
//!
//! A [`UnitCell`] stores the reciprocal basis (a*, b*, c*) in inverse
//! metres; the direct cell is derived on demand. Cell transformations go
//! through exact rational matrices so that repeated transforms (and their
//! inverses) compose without drift.

use crate::error::{EngineError, Result};
use crate::rational::RationalMatrix;
use crate::types::Hkl;
use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Lattice centering letter.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Centering {
    P,
    A,
    B,
    C,
    I,
    F,
    R,
    H,
}

impl Centering {
    pub fn from_char(c: char) -> Result<Self> {
        Ok(match c.to_ascii_uppercase() {
            'P' => Self::P,
            'A' => Self::A,
            'B' => Self::B,
            'C' => Self::C,
            'I' => Self::I,
            'F' => Self::F,
            'R' => Self::R,
            'H' => Self::H,
            other => {
                return Err(EngineError::InvalidCell {
                    detail: format!("unknown centering '{other}'"),
                })
            }
        })
    }

    /// Exact transform taking the centered direct basis to a primitive one.
    fn primitive_transform(self) -> RationalMatrix {
        match self {
            Self::P => RationalMatrix::identity(),
            Self::A => RationalMatrix::from_fractions([
                [(1, 1), (0, 1), (0, 1)],
                [(0, 1), (1, 2), (1, 2)],
                [(0, 1), (-1, 2), (1, 2)],
            ]),
            Self::B => RationalMatrix::from_fractions([
                [(1, 2), (0, 1), (1, 2)],
                [(0, 1), (1, 1), (0, 1)],
                [(-1, 2), (0, 1), (1, 2)],
            ]),
            Self::C => RationalMatrix::from_fractions([
                [(1, 2), (1, 2), (0, 1)],
                [(-1, 2), (1, 2), (0, 1)],
                [(0, 1), (0, 1), (1, 1)],
            ]),
            Self::I => RationalMatrix::from_fractions([
                [(-1, 2), (1, 2), (1, 2)],
                [(1, 2), (-1, 2), (1, 2)],
                [(1, 2), (1, 2), (-1, 2)],
            ]),
            Self::F => RationalMatrix::from_fractions([
                [(0, 1), (1, 2), (1, 2)],
                [(1, 2), (0, 1), (1, 2)],
                [(1, 2), (1, 2), (0, 1)],
            ]),
            Self::R => RationalMatrix::from_fractions([
                [(2, 3), (1, 3), (1, 3)],
                [(-1, 3), (1, 3), (1, 3)],
                [(-1, 3), (-2, 3), (1, 3)],
            ]),
            Self::H => RationalMatrix::from_fractions([
                [(2, 3), (1, 3), (0, 1)],
                [(-1, 3), (1, 3), (0, 1)],
                [(0, 1), (0, 1), (1, 1)],
            ]),
        }
    }
}

/// Real-space cell parameters, lengths in metres and angles in radians.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CellParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// A unit cell held as its reciprocal basis.
#[derive(Clone, Debug)]
pub struct UnitCell {
    astar: Vector3<f64>,
    bstar: Vector3<f64>,
    cstar: Vector3<f64>,
    centering: Centering,
}

impl UnitCell {
    /// Build from the six cell parameters (metres, radians) and centering.
    pub fn from_parameters(p: CellParameters, centering: Centering) -> Result<Self> {
        if !(p.a > 0.0 && p.b > 0.0 && p.c > 0.0) {
            return Err(EngineError::InvalidCell {
                detail: "axis lengths must be positive".into(),
            });
        }
        for ang in [p.alpha, p.beta, p.gamma] {
            if !(ang > 0.0 && ang < std::f64::consts::PI) {
                return Err(EngineError::InvalidCell {
                    detail: "angles must lie in (0, pi)".into(),
                });
            }
        }

        let (sin_g, cos_g) = p.gamma.sin_cos();
        let cos_a = p.alpha.cos();
        let cos_b = p.beta.cos();

        let av = Vector3::new(p.a, 0.0, 0.0);
        let bv = Vector3::new(p.b * cos_g, p.b * sin_g, 0.0);
        let cx = p.c * cos_b;
        let cy = p.c * (cos_a - cos_b * cos_g) / sin_g;
        let cz_sq = p.c * p.c - cx * cx - cy * cy;
        if cz_sq <= 0.0 {
            return Err(EngineError::InvalidCell {
                detail: "angles do not close a cell of positive volume".into(),
            });
        }
        let cv = Vector3::new(cx, cy, cz_sq.sqrt());

        Self::from_direct(av, bv, cv, centering)
    }

    /// Build from a Cartesian direct basis.
    pub fn from_direct(
        a: Vector3<f64>,
        b: Vector3<f64>,
        c: Vector3<f64>,
        centering: Centering,
    ) -> Result<Self> {
        let m = Matrix3::from_columns(&[a, b, c]);
        let inv = m.try_inverse().ok_or_else(|| EngineError::InvalidCell {
            detail: "direct basis is singular".into(),
        })?;
        // Rows of the inverse are the reciprocal vectors.
        Ok(Self {
            astar: inv.row(0).transpose(),
            bstar: inv.row(1).transpose(),
            cstar: inv.row(2).transpose(),
            centering,
        })
    }

    /// Build directly from reciprocal basis vectors (inverse metres).
    pub fn from_reciprocal(
        astar: Vector3<f64>,
        bstar: Vector3<f64>,
        cstar: Vector3<f64>,
        centering: Centering,
    ) -> Result<Self> {
        let cell = Self {
            astar,
            bstar,
            cstar,
            centering,
        };
        if !cell.is_finite() || cell.reciprocal_volume().abs() < f64::MIN_POSITIVE {
            return Err(EngineError::InvalidCell {
                detail: "reciprocal basis is singular or non-finite".into(),
            });
        }
        Ok(cell)
    }

    pub fn centering(&self) -> Centering {
        self.centering
    }

    pub fn astar(&self) -> Vector3<f64> {
        self.astar
    }

    pub fn bstar(&self) -> Vector3<f64> {
        self.bstar
    }

    pub fn cstar(&self) -> Vector3<f64> {
        self.cstar
    }

    pub fn set_reciprocal(&mut self, astar: Vector3<f64>, bstar: Vector3<f64>, cstar: Vector3<f64>) {
        self.astar = astar;
        self.bstar = bstar;
        self.cstar = cstar;
    }

    pub fn is_finite(&self) -> bool {
        self.astar.iter().all(|v| v.is_finite())
            && self.bstar.iter().all(|v| v.is_finite())
            && self.cstar.iter().all(|v| v.is_finite())
    }

    fn reciprocal_volume(&self) -> f64 {
        self.astar.dot(&self.bstar.cross(&self.cstar))
    }

    /// Cartesian direct basis (a, b, c), derived from the reciprocal one.
    pub fn direct_basis(&self) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let r = Matrix3::from_rows(&[
            self.astar.transpose(),
            self.bstar.transpose(),
            self.cstar.transpose(),
        ]);
        // r is invertible for any cell this type can hold.
        let m = r.try_inverse().unwrap_or_else(Matrix3::zeros);
        (
            m.column(0).into_owned(),
            m.column(1).into_owned(),
            m.column(2).into_owned(),
        )
    }

    /// The six real-space cell parameters.
    pub fn parameters(&self) -> CellParameters {
        let (a, b, c) = self.direct_basis();
        let (la, lb, lc) = (a.norm(), b.norm(), c.norm());
        CellParameters {
            a: la,
            b: lb,
            c: lc,
            alpha: (b.dot(&c) / (lb * lc)).clamp(-1.0, 1.0).acos(),
            beta: (a.dot(&c) / (la * lc)).clamp(-1.0, 1.0).acos(),
            gamma: (a.dot(&b) / (la * lb)).clamp(-1.0, 1.0).acos(),
        }
    }

    /// Reciprocal-space position of a reflection, in inverse metres.
    #[inline]
    pub fn reciprocal(&self, hkl: Hkl) -> Vector3<f64> {
        self.astar * hkl.h as f64 + self.bstar * hkl.k as f64 + self.cstar * hkl.l as f64
    }

    /// Resolution s = 1/(2d) of a reflection, in inverse metres.
    #[inline]
    pub fn resolution(&self, hkl: Hkl) -> f64 {
        0.5 * self.reciprocal(hkl).norm()
    }

    /// Apply an exact basis transformation: each new direct vector is the
    /// rational combination of the old ones given by a row of `m`.
    pub fn transform(&self, m: &RationalMatrix) -> Result<Self> {
        if m.det()?.is_zero() {
            return Err(EngineError::SingularSystem);
        }
        let (a, b, c) = self.direct_basis();
        let t = m.as_f64();
        let na = a * t[0][0] + b * t[0][1] + c * t[0][2];
        let nb = a * t[1][0] + b * t[1][1] + c * t[1][2];
        let nc = a * t[2][0] + b * t[2][1] + c * t[2][2];
        Self::from_direct(na, nb, nc, self.centering)
    }

    /// Undo [`UnitCell::transform`]: applies the exact inverse of `m`.
    pub fn transform_inverse(&self, m: &RationalMatrix) -> Result<Self> {
        self.transform(&m.invert()?)
    }

    /// Convert a centered cell to the corresponding primitive cell.
    ///
    /// Returns the primitive cell (centering `P`) together with the exact
    /// matrix that was applied, so the caller can map indices back.
    pub fn uncenter(&self) -> Result<(Self, RationalMatrix)> {
        let m = self.centering.primitive_transform();
        let mut prim = self.transform(&m)?;
        prim.centering = Centering::P;
        Ok((prim, m))
    }

    /// The cell with every basis vector rotated by `q`.
    pub fn rotated(&self, q: &UnitQuaternion<f64>) -> Self {
        Self {
            astar: q * self.astar,
            bstar: q * self.bstar,
            cstar: q * self.cstar,
            centering: self.centering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orthorhombic() -> UnitCell {
        UnitCell::from_parameters(
            CellParameters {
                a: 40e-10,
                b: 50e-10,
                c: 60e-10,
                alpha: std::f64::consts::FRAC_PI_2,
                beta: std::f64::consts::FRAC_PI_2,
                gamma: std::f64::consts::FRAC_PI_2,
            },
            Centering::P,
        )
        .unwrap()
    }

    #[test]
    fn reciprocal_of_orthorhombic_axes() {
        let cell = orthorhombic();
        let q = cell.reciprocal(Hkl::new(1, 0, 0));
        assert!((q.norm() - 1.0 / 40e-10).abs() / q.norm() < 1e-12);
        let q = cell.reciprocal(Hkl::new(0, 0, 2));
        assert!((q.norm() - 2.0 / 60e-10).abs() / q.norm() < 1e-12);
    }

    #[test]
    fn resolution_is_half_q() {
        let cell = orthorhombic();
        let hkl = Hkl::new(3, -2, 1);
        let q = cell.reciprocal(hkl);
        assert!((cell.resolution(hkl) - 0.5 * q.norm()).abs() < 1e-9);
    }

    #[test]
    fn parameters_round_trip() {
        let p = CellParameters {
            a: 40e-10,
            b: 50e-10,
            c: 60e-10,
            alpha: 1.4,
            beta: 1.7,
            gamma: 1.9,
        };
        let cell = UnitCell::from_parameters(p, Centering::P).unwrap();
        let got = cell.parameters();
        assert!((got.a - p.a).abs() / p.a < 1e-10);
        assert!((got.b - p.b).abs() / p.b < 1e-10);
        assert!((got.c - p.c).abs() / p.c < 1e-10);
        assert!((got.alpha - p.alpha).abs() < 1e-10);
        assert!((got.beta - p.beta).abs() < 1e-10);
        assert!((got.gamma - p.gamma).abs() < 1e-10);
    }

    #[test]
    fn transform_then_inverse_is_identity() {
        let cell = orthorhombic();
        let m = RationalMatrix::from_fractions([
            [(1, 2), (1, 2), (0, 1)],
            [(-1, 2), (1, 2), (0, 1)],
            [(0, 1), (0, 1), (1, 1)],
        ]);
        let back = cell.transform(&m).unwrap().transform_inverse(&m).unwrap();
        let p0 = cell.parameters();
        let p1 = back.parameters();
        assert!((p0.a - p1.a).abs() / p0.a < 1e-9);
        assert!((p0.gamma - p1.gamma).abs() < 1e-9);
    }

    #[test]
    fn uncentering_halves_the_i_cell_volume() {
        let p = CellParameters {
            a: 50e-10,
            b: 50e-10,
            c: 50e-10,
            alpha: std::f64::consts::FRAC_PI_2,
            beta: std::f64::consts::FRAC_PI_2,
            gamma: std::f64::consts::FRAC_PI_2,
        };
        let cell = UnitCell::from_parameters(p, Centering::I).unwrap();
        let (prim, m) = cell.uncenter().unwrap();
        assert_eq!(prim.centering(), Centering::P);
        let ratio = m.det().unwrap().as_f64().abs();
        assert!((ratio - 0.5).abs() < 1e-12);
    }
}
