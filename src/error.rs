//! Fatal error kinds.
//!
//! Crystal-local numerical failures (a fit with too few observations, a
//! scale factor out of bounds, a singular refinement solve) are *not*
//! errors: they set the per-crystal rejection flag and the batch carries
//! on. Everything in [`EngineError`] aborts the run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A stream chunk carried values the engine cannot work with.
    #[error("malformed stream record: {detail}")]
    BadStream { detail: String },

    /// The point-group identifier is not one the symmetry engine knows.
    #[error("unknown point group '{0}'")]
    UnknownPointGroup(String),

    /// Unit-cell parameters do not describe a valid lattice.
    #[error("invalid unit cell: {detail}")]
    InvalidCell { detail: String },

    /// Exact rational arithmetic overflowed a 64-bit numerator or
    /// denominator. Cell transforms must stay exact, so this aborts.
    #[error("overflow in rational arithmetic: {a} {op} {b}")]
    RationalOverflow {
        a: i64,
        b: i64,
        op: &'static str,
    },

    /// An exact linear system (cell transform) had no unique solution.
    #[error("exact linear system is singular")]
    SingularSystem,

    /// The worker pool could not be constructed.
    #[error("failed to build worker pool: {detail}")]
    Pool { detail: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
