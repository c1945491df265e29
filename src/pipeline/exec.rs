//! Worker-pool fan-out over crystals.
//!
//! Each job owns exactly one crystal, so the phase functions mutate their
//! crystal freely; only the reference table is shared, and only the merge
//! phase writes to it (under its per-entry locks). With the `parallel`
//! feature off, or a single worker, everything runs sequentially on the
//! caller's thread.

use crate::crystal::Crystal;
use crate::error::Result;

pub(crate) enum Executor {
    Sequential,
    #[cfg(feature = "parallel")]
    Pool(rayon::ThreadPool),
}

impl Executor {
    pub(crate) fn build(workers: usize) -> Result<Self> {
        if workers > 1 {
            #[cfg(feature = "parallel")]
            {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| crate::error::EngineError::Pool {
                        detail: e.to_string(),
                    })?;
                return Ok(Self::Pool(pool));
            }
        }
        Ok(Self::Sequential)
    }

    /// Run `job` over every crystal, mutating each in place.
    pub(crate) fn for_each_mut<F>(&self, crystals: &mut [Crystal], job: F)
    where
        F: Fn(&mut Crystal) + Sync + Send,
    {
        match self {
            Self::Sequential => {
                for cr in crystals.iter_mut() {
                    job(cr);
                }
            }
            #[cfg(feature = "parallel")]
            Self::Pool(pool) => {
                use rayon::prelude::*;
                pool.install(|| crystals.par_iter_mut().for_each(|cr| job(cr)));
            }
        }
    }

    /// Run `job` over every crystal with a per-worker scratch value.
    pub(crate) fn for_each_mut_with<S, F>(
        &self,
        crystals: &mut [Crystal],
        init: impl Fn() -> S + Sync + Send,
        job: F,
    ) where
        S: Send,
        F: Fn(&mut S, &mut Crystal) + Sync + Send,
    {
        match self {
            Self::Sequential => {
                let mut scratch = init();
                for cr in crystals.iter_mut() {
                    job(&mut scratch, cr);
                }
            }
            #[cfg(feature = "parallel")]
            Self::Pool(pool) => {
                use rayon::prelude::*;
                pool.install(|| {
                    crystals
                        .par_iter_mut()
                        .for_each_init(&init, |scratch, cr| job(scratch, cr))
                });
            }
        }
    }

    /// Run `job` over every crystal read-only (the merge accumulate and
    /// ESD passes; they write through the reference table's locks).
    pub(crate) fn for_each<F>(&self, crystals: &[Crystal], job: F)
    where
        F: Fn(&Crystal) + Sync + Send,
    {
        match self {
            Self::Sequential => {
                for cr in crystals.iter() {
                    job(cr);
                }
            }
            #[cfg(feature = "parallel")]
            Self::Pool(pool) => {
                use rayon::prelude::*;
                pool.install(|| crystals.par_iter().for_each(|cr| job(cr)));
            }
        }
    }
}
