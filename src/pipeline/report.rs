//! Run diagnostics assembled by the orchestrator.

use serde::Serialize;

/// What one macrocycle did and how long each phase took.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MacrocycleReport {
    pub index: u32,
    pub scale_cycles: u32,
    pub scale_converged: bool,
    pub mean_scale_change: f64,
    pub n_flagged: usize,
    pub deadline_hit: bool,
    pub scale_ms: f64,
    pub refine_ms: f64,
    pub merge_ms: f64,
}

/// Whole-run summary returned next to the merged reflection list.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineReport {
    pub n_crystals: usize,
    pub n_flagged_final: usize,
    pub n_reflections: usize,
    pub converged: bool,
    pub cancelled: bool,
    pub macrocycles: Vec<MacrocycleReport>,
    pub total_ms: f64,
}
