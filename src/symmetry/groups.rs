//! Point-group generator tables.
//!
//! Each Hermann-Mauguin identifier maps to a small generator set; the full
//! operator list is obtained by closing the set under composition. Trigonal
//! and hexagonal groups are given on hexagonal axes, monoclinic groups use
//! the unique-axis-b setting.

use super::ops::IntMatrix;
use crate::error::{EngineError, Result};

// Rotations and mirrors referenced by the generator table.
const TWO_Z: IntMatrix = IntMatrix::new([[-1, 0, 0], [0, -1, 0], [0, 0, 1]]);
const TWO_Y: IntMatrix = IntMatrix::new([[-1, 0, 0], [0, 1, 0], [0, 0, -1]]);
const TWO_X: IntMatrix = IntMatrix::new([[1, 0, 0], [0, -1, 0], [0, 0, -1]]);
const MIRROR_Z: IntMatrix = IntMatrix::new([[1, 0, 0], [0, 1, 0], [0, 0, -1]]);
const MIRROR_Y: IntMatrix = IntMatrix::new([[1, 0, 0], [0, -1, 0], [0, 0, 1]]);
const MIRROR_X: IntMatrix = IntMatrix::new([[-1, 0, 0], [0, 1, 0], [0, 0, 1]]);
const FOUR_Z: IntMatrix = IntMatrix::new([[0, -1, 0], [1, 0, 0], [0, 0, 1]]);
const FOUR_BAR_Z: IntMatrix = IntMatrix::new([[0, 1, 0], [-1, 0, 0], [0, 0, -1]]);
// Hexagonal-axis three- and six-fold rotations about c.
const THREE_Z: IntMatrix = IntMatrix::new([[0, -1, 0], [1, -1, 0], [0, 0, 1]]);
const SIX_Z: IntMatrix = IntMatrix::new([[0, 1, 0], [-1, 1, 0], [0, 0, 1]]);
// Two-fold along the hexagonal a axis.
const TWO_A_HEX: IntMatrix = IntMatrix::new([[0, 1, 0], [1, 0, 0], [0, 0, -1]]);
// Mirror normal to the hexagonal a axis.
const MIRROR_A_HEX: IntMatrix = IntMatrix::new([[0, -1, 0], [-1, 0, 0], [0, 0, 1]]);
// Body-diagonal three-fold (cubic groups).
const THREE_DIAG: IntMatrix = IntMatrix::new([[0, 0, 1], [1, 0, 0], [0, 1, 0]]);

const INV: IntMatrix = IntMatrix::inversion();

/// Generators for the supported point groups.
pub(super) fn generators(name: &str) -> Result<Vec<IntMatrix>> {
    let gens: &[IntMatrix] = match name {
        "1" => &[],
        "-1" => &[INV],
        "2" => &[TWO_Y],
        "m" => &[MIRROR_Y],
        "2/m" => &[TWO_Y, INV],
        "222" => &[TWO_Z, TWO_Y],
        "mm2" => &[TWO_Z, MIRROR_X],
        "mmm" => &[TWO_Z, TWO_Y, INV],
        "4" => &[FOUR_Z],
        "-4" => &[FOUR_BAR_Z],
        "4/m" => &[FOUR_Z, MIRROR_Z],
        "422" => &[FOUR_Z, TWO_X],
        "4mm" => &[FOUR_Z, MIRROR_X],
        "-42m" => &[FOUR_BAR_Z, TWO_X],
        "4/mmm" => &[FOUR_Z, TWO_X, MIRROR_Z],
        "3" => &[THREE_Z],
        "-3" => &[THREE_Z, INV],
        "32" => &[THREE_Z, TWO_A_HEX],
        "3m" => &[THREE_Z, MIRROR_A_HEX],
        "-3m" => &[THREE_Z, TWO_A_HEX, INV],
        "6" => &[SIX_Z],
        "-6" => &[THREE_Z, MIRROR_Z],
        "6/m" => &[SIX_Z, MIRROR_Z],
        "622" => &[SIX_Z, TWO_A_HEX],
        "6mm" => &[SIX_Z, MIRROR_A_HEX],
        "-6m2" => &[THREE_Z, MIRROR_Z, MIRROR_A_HEX],
        "6/mmm" => &[SIX_Z, TWO_A_HEX, MIRROR_Z],
        "23" => &[TWO_Z, TWO_Y, THREE_DIAG],
        "m-3" => &[TWO_Z, TWO_Y, THREE_DIAG, INV],
        "432" => &[FOUR_Z, THREE_DIAG],
        "-43m" => &[FOUR_BAR_Z, THREE_DIAG],
        "m-3m" => &[FOUR_Z, THREE_DIAG, INV],
        _ => return Err(EngineError::UnknownPointGroup(name.to_string())),
    };
    Ok(gens.to_vec())
}

/// No crystallographic point group has more operators than this.
pub(super) const MAX_GROUP_ORDER: usize = 48;
