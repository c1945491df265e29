//! Scaling, post-refinement and merging for serial crystallography.
//!
//! Serial crystallography produces tens of thousands of still snapshots,
//! each a partial, randomly oriented sample of one crystal's reciprocal
//! lattice. This crate recovers the full structure-factor intensities:
//! it scales every snapshot onto a common reference, post-refines each
//! snapshot's model (orientation, cell, divergence, profile radius) so
//! that predicted partialities match the observed intensities, and merges
//! the corrected partials into a single reflection list with error
//! estimates.
//!
//! The entry point is [`MergePipeline`]: feed it crystals collected from
//! an indexed stream (see [`stream`]) and it returns the merged list plus
//! a run report.
//!
//! ```no_run
//! use still_merge::{CancelToken, MergeOptions, MergePipeline};
//!
//! # fn demo(mut crystals: Vec<still_merge::Crystal>) -> still_merge::error::Result<()> {
//! let pipeline = MergePipeline::new(MergeOptions {
//!     point_group: "4/mmm".into(),
//!     ..Default::default()
//! })?;
//! let outcome = pipeline.run(&mut crystals, &CancelToken::new())?;
//! println!("{} merged reflections", outcome.reflections.len());
//! # Ok(())
//! # }
//! ```

// Core data model and engine surface.
pub mod cell;
pub mod crystal;
pub mod error;
pub mod pipeline;
pub mod reflist;
pub mod stream;
pub mod types;

// Numerics and geometry; public for tools and tests, internals may move.
pub mod geometry;
pub mod rational;
pub mod refine;
pub mod sim;
pub mod symmetry;

mod merge;
mod scale;

// --- High-level re-exports -------------------------------------------------

pub use crate::cell::{CellParameters, Centering, UnitCell};
pub use crate::crystal::{Crystal, CrystalFlag, Observation};
pub use crate::error::EngineError;
pub use crate::pipeline::{
    CancelToken, MergeOptions, MergeOutcome, MergePipeline, PipelineReport,
};
pub use crate::reflist::{RefEntry, RefList};
pub use crate::symmetry::SymOpList;
pub use crate::types::{Hkl, MergedReflection};

/// Small prelude for quick experiments.
pub mod prelude {
    pub use crate::pipeline::{CancelToken, MergeOptions, MergePipeline};
    pub use crate::types::{Hkl, MergedReflection};
    pub use crate::{Crystal, SymOpList, UnitCell};
}
