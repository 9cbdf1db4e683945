//! Verify-on-read memo slots for the dependency graph in [`crate::model`].
//!
//! Every slot remembers the stamp of its direct inputs (configuration-group
//! generations and upstream revisions, all drawn from one monotone clock) and
//! the revision it produced. A read with an unchanged stamp returns the cached
//! value; any difference recomputes and issues a fresh revision.

use std::sync::Arc;
use vid_core::Result;

/// Monotone counter shared by generations and revisions.
#[derive(Debug, Default, Clone)]
pub struct Clock(u64);

impl Clock {
    /// Next value.
    pub fn tick(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

/// One memoized stage.
#[derive(Debug)]
pub struct Memo<T> {
    value: Option<Arc<T>>,
    stamp: Vec<u64>,
    revision: u64,
    computations: u64,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self { value: None, stamp: Vec::new(), revision: 0, computations: 0 }
    }
}

impl<T> Memo<T> {
    /// Cached value and revision if `stamp` matches, otherwise recompute.
    pub fn resolve<F>(&mut self, stamp: Vec<u64>, clock: &mut Clock, compute: F) -> Result<(Arc<T>, u64)>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(v) = &self.value {
            if self.stamp == stamp {
                return Ok((Arc::clone(v), self.revision));
            }
        }
        let v = Arc::new(compute()?);
        self.computations += 1;
        self.value = Some(Arc::clone(&v));
        self.stamp = stamp;
        self.revision = clock.tick();
        Ok((v, self.revision))
    }

    /// How many times the stage was computed.
    pub fn computations(&self) -> u64 {
        self.computations
    }
}
