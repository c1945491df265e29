//! Ewald-sphere geometry: excitation errors, partialities, prediction.

mod partiality;
mod predict;

pub use partiality::{
    estimate, partiality_gradient, partiality_rgradient, penetration, penetration_gradient,
    PartialityEstimate,
};
pub use predict::{predict_reflections, Prediction};
