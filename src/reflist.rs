//! The shared reference reflection table.
//!
//! During a merge phase many workers accumulate into the table at once: a
//! map-level read/write lock guards the key set and every entry carries
//! its own mutex. A worker that misses under the read lock retries under
//! the write lock before inserting, so two workers racing on the same new
//! key converge on one entry. Between merges the table is immutable and
//! read without any locking ceremony.

use crate::types::{Hkl, MergedReflection};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Accumulator state for one asymmetric-unit key.
#[derive(Clone, Copy, Debug, Default)]
pub struct RefEntry {
    /// Current best merged full intensity.
    pub i_full: f64,
    /// Standard deviation of `i_full`, filled by the ESD pass.
    pub esd: f64,
    /// Number of contributing observations.
    pub redundancy: u32,
    /// Merge scratch: intensity numerator, then squared-deviation sum.
    pub temp1: f64,
    /// Merge scratch: observation count as a weight denominator.
    pub temp2: f64,
    /// Redundancy fell below the configured minimum.
    pub suppressed: bool,
}

type Shared = Arc<Mutex<RefEntry>>;

/// Keyed store of reference reflections with per-entry locking.
#[derive(Default)]
pub struct RefList {
    map: RwLock<HashMap<Hkl, Shared>>,
}

impl RefList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Look up an entry under the shared read lock.
    pub fn find(&self, hkl: Hkl) -> Option<Shared> {
        self.map.read().get(&hkl).cloned()
    }

    /// Look up or create an entry.
    ///
    /// The fast path runs under the read lock; on a miss the write lock is
    /// taken and the map is checked again, since another worker may have
    /// created the entry in the gap.
    pub fn find_or_add(&self, hkl: Hkl) -> Shared {
        if let Some(entry) = self.find(hkl) {
            return entry;
        }
        let mut map = self.map.write();
        map.entry(hkl).or_default().clone()
    }

    /// Copy of an entry's current state. Only meaningful while no merge
    /// phase is writing.
    pub fn lookup(&self, hkl: Hkl) -> Option<RefEntry> {
        self.find(hkl).map(|e| *e.lock())
    }

    /// Exclusive sweep over all entries; no locks are touched.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&Hkl, &mut RefEntry)) {
        for (hkl, entry) in self.map.get_mut().iter_mut() {
            f(hkl, &mut *entry.lock());
        }
    }

    /// Zero the scratch accumulators of every entry.
    pub fn clear_scratch(&mut self) {
        self.for_each_mut(|_, e| {
            e.temp1 = 0.0;
            e.temp2 = 0.0;
        });
    }

    /// Snapshot the table as an output list, sorted by key.
    pub fn to_merged(&self) -> Vec<MergedReflection> {
        let map = self.map.read();
        let mut out: Vec<MergedReflection> = map
            .iter()
            .map(|(hkl, entry)| {
                let e = *entry.lock();
                MergedReflection {
                    hkl: *hkl,
                    i_full: e.i_full,
                    sigma: e.esd,
                    redundancy: e.redundancy,
                    suppressed: e.suppressed,
                }
            })
            .collect();
        out.sort_by_key(|r| r.hkl);
        out
    }
}
