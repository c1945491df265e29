//! The outer macrocycle driver.
//!
//! One macrocycle = scale all crystals against the reference, reject
//! outliers and normalise, post-refine every crystal's model, then
//! re-merge into a fresh reference. The loop runs until the mean change
//! in scale factors drops below the convergence threshold or the
//! macrocycle budget is exhausted; either way the last consistent
//! reference is returned, with ESDs computed at the end.
//!
//! Phases never overlap: the reference table is immutable while the
//! scale and refine phases read it, and rebuilt under its own locks
//! while the merge phase runs. The end of each phase is a barrier, which
//! gives the scale/refine -> merge -> scale/refine ordering its
//! happens-before edges.

mod cancel;
mod exec;
mod options;
mod report;

pub use cancel::CancelToken;
pub use options::{load_options, MergeOptions, ScaleBounds};
pub use report::{MacrocycleReport, PipelineReport};

use crate::crystal::{Crystal, CrystalFlag};
use crate::error::Result;
use crate::merge;
use crate::refine;
use crate::reflist::RefList;
use crate::scale;
use crate::symmetry::SymOpList;
use crate::types::MergedReflection;
use exec::Executor;
use log::{info, warn};
use std::time::{Duration, Instant};

/// Merged reflections plus the run diagnostics.
#[derive(Debug)]
pub struct MergeOutcome {
    pub reflections: Vec<MergedReflection>,
    pub report: PipelineReport,
}

/// The scaling / post-refinement / merging engine.
pub struct MergePipeline {
    options: MergeOptions,
    sym: SymOpList,
}

impl MergePipeline {
    /// Build a pipeline; fails on an unknown point group.
    pub fn new(options: MergeOptions) -> Result<Self> {
        let sym = SymOpList::from_name(&options.point_group)?;
        Ok(Self { options, sym })
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    pub fn symmetry(&self) -> &SymOpList {
        &self.sym
    }

    /// Run the full engine over the crystal set.
    ///
    /// Crystals carrying defective data are flagged permanently and
    /// skipped; everything else is scaled, refined and merged in place.
    pub fn run(&self, crystals: &mut [Crystal], cancel: &CancelToken) -> Result<MergeOutcome> {
        let opts = &self.options;
        let total_start = Instant::now();
        let exec = Executor::build(opts.effective_workers())?;

        let mut report = PipelineReport {
            n_crystals: crystals.len(),
            ..Default::default()
        };

        // Fresh start: unit scales, cleared per-cycle flags, ASU folding
        // for the configured point group.
        for cr in crystals.iter_mut() {
            cr.scale = 1.0;
            cr.b_factor = 0.0;
            cr.reset_scaling_flag();
            if cr.validate().is_err() {
                cr.flag = CrystalFlag::RejectedPermanently;
                continue;
            }
            for obs in &mut cr.observations {
                obs.asu = self.sym.to_asu(obs.hkl);
            }
        }

        let mut full = self.merge_all(crystals, &exec);

        if opts.no_scale {
            self.finish_esds(crystals, &exec, &mut full);
            report.converged = true;
            report.n_flagged_final = count_flagged(crystals);
            report.n_reflections = full.len();
            report.total_ms = ms_since(total_start);
            return Ok(MergeOutcome {
                reflections: full.to_merged(),
                report,
            });
        }

        for macrocycle in 0..opts.max_macrocycles {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let deadline = opts
                .macrocycle_deadline_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms));
            let mut mc = MacrocycleReport {
                index: macrocycle,
                ..Default::default()
            };
            let macro_scales: Vec<f64> = crystals.iter().map(|c| c.scale).collect();

            // Scaling: iterate fit -> reject -> normalise -> re-merge
            // until the scale factors settle.
            let scale_start = Instant::now();
            for _cycle in 0..opts.max_scale_cycles {
                let old_scales: Vec<f64> = crystals.iter().map(|c| c.scale).collect();
                for cr in crystals.iter_mut() {
                    cr.reset_scaling_flag();
                }

                let reference = &full;
                exec.for_each_mut(crystals, |cr| {
                    scale::scale_crystal(cr, reference, opts.min_partiality_scale)
                });
                scale::reject_outliers(crystals, &opts.scale_bounds);
                let norm = scale::normalise_scales(crystals);
                let change = scale::mean_scale_change(crystals, &old_scales);
                info!("scale cycle: norm = {norm:.4}, mean scale change = {change:.5}");

                full = self.merge_all(crystals, &exec);

                mc.scale_cycles += 1;
                mc.mean_scale_change = change;
                if change < opts.scale_convergence {
                    mc.scale_converged = true;
                    break;
                }
                if past(deadline) {
                    mc.deadline_hit = true;
                    break;
                }
            }
            if !mc.scale_converged {
                warn!("scaling did not converge in {} cycles", mc.scale_cycles);
            }
            mc.scale_ms = ms_since(scale_start);

            if cancel.is_cancelled() {
                report.cancelled = true;
                mc.n_flagged = count_flagged(crystals);
                report.macrocycles.push(mc);
                break;
            }
            if mc.deadline_hit || past(deadline) {
                mc.deadline_hit = true;
                warn!("macrocycle {macrocycle} hit its deadline, keeping last reference");
                mc.n_flagged = count_flagged(crystals);
                report.macrocycles.push(mc);
                continue;
            }

            // Post-refinement of every usable crystal's model.
            if !opts.no_pr {
                let refine_start = Instant::now();
                {
                    let reference = &full;
                    let sym = &self.sym;
                    exec.for_each_mut_with(
                        crystals,
                        refine::RefineWorkspace::new,
                        |ws, cr| {
                            refine::refine_crystal(
                                cr,
                                reference,
                                sym,
                                ws,
                                opts.min_partiality_scale,
                                opts.pr_shift_convergence,
                                opts.max_pr_cycles,
                            );
                        },
                    );
                }
                mc.refine_ms = ms_since(refine_start);

                let merge_start = Instant::now();
                full = self.merge_all(crystals, &exec);
                mc.merge_ms = ms_since(merge_start);
            }

            let macro_change = scale::mean_scale_change(crystals, &macro_scales);
            mc.n_flagged = count_flagged(crystals);
            info!(
                "macrocycle {macrocycle}: mean scale change = {macro_change:.5}, {} flagged",
                mc.n_flagged
            );
            report.macrocycles.push(mc);

            if macro_change < opts.scale_convergence {
                report.converged = true;
                break;
            }
        }

        if !report.converged && !report.cancelled {
            warn!(
                "not converged after {} macrocycles, returning current reference",
                report.macrocycles.len()
            );
        }

        self.finish_esds(crystals, &exec, &mut full);

        report.n_flagged_final = count_flagged(crystals);
        report.n_reflections = full.len();
        report.total_ms = ms_since(total_start);
        Ok(MergeOutcome {
            reflections: full.to_merged(),
            report,
        })
    }

    /// Rebuild the reference from scratch with the current scales.
    fn merge_all(&self, crystals: &[Crystal], exec: &Executor) -> RefList {
        let full = RefList::new();
        exec.for_each(crystals, |cr| {
            merge::merge_crystal(cr, &full, self.options.min_partiality_merge)
        });
        let mut full = full;
        merge::finalise_intensities(&mut full);
        full
    }

    fn finish_esds(&self, crystals: &[Crystal], exec: &Executor, full: &mut RefList) {
        full.clear_scratch();
        exec.for_each(crystals, |cr| {
            merge::esd_crystal(cr, full, self.options.min_partiality_merge)
        });
        merge::finalise_esds(full, self.options.min_redundancy);
    }
}

fn count_flagged(crystals: &[Crystal]) -> usize {
    crystals.iter().filter(|c| !c.is_usable()).count()
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() > d)
}

fn ms_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
