//! Engine configuration.
//!
//! Every knob has the default the engine was tuned with; configs loaded
//! from JSON only need to name the fields they change.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Acceptance window for the fitted per-crystal corrections.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ScaleBounds {
    /// Scale factors must lie in (0, g_max].
    pub g_max: f64,
    /// |B| above this (square metres) rejects the crystal.
    pub b_max: f64,
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self {
            g_max: 10.0,
            b_max: 40e-20,
        }
    }
}

/// All tunables of the scaling / refinement / merging pipeline.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Point-group identifier used for asymmetric-unit folding.
    pub point_group: String,
    /// Reflections below this partiality are excluded from scaling.
    pub min_partiality_scale: f64,
    /// Reflections below this partiality are excluded from merging.
    pub min_partiality_merge: f64,
    /// Inner scaling-convergence iteration limit per macrocycle.
    pub max_scale_cycles: u32,
    /// Gauss-Newton iteration limit per crystal per macrocycle.
    pub max_pr_cycles: u32,
    /// Outer macrocycle budget.
    pub max_macrocycles: u32,
    /// Mean |change in G| below which scaling has converged.
    pub scale_convergence: f64,
    /// Largest parameter shift below which post-refinement has converged.
    pub pr_shift_convergence: f64,
    /// Merged entries with fewer observations are marked suppressed.
    pub min_redundancy: u32,
    pub scale_bounds: ScaleBounds,
    /// Skip scaling and refinement entirely; merge as-is.
    pub no_scale: bool,
    /// Keep scaling but skip the post-refinement phase.
    pub no_pr: bool,
    /// Worker threads; 0 means one per logical CPU.
    pub workers: usize,
    /// Wall-clock budget per macrocycle, in milliseconds. `None` means
    /// unlimited.
    pub macrocycle_deadline_ms: Option<u64>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            point_group: "1".to_string(),
            min_partiality_scale: 0.05,
            min_partiality_merge: 0.05,
            max_scale_cycles: 10,
            max_pr_cycles: 10,
            max_macrocycles: 3,
            scale_convergence: 0.01,
            pr_shift_convergence: 0.01,
            min_redundancy: 2,
            scale_bounds: ScaleBounds::default(),
            no_scale: false,
            no_pr: false,
            workers: 0,
            macrocycle_deadline_ms: None,
        }
    }
}

impl MergeOptions {
    /// Effective worker count: the configured value, or the number of
    /// logical CPUs when left at 0.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Load options from a JSON file.
pub fn load_options(path: &Path) -> Result<MergeOptions, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let options: MergeOptions = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    Ok(options)
}
