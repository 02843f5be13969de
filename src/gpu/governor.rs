//! Ceiling on live per-surface GPU resource sets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Default number of surfaces that may hold GPU resources at once.
pub const DEFAULT_MAX_RESOURCE_SETS: usize = 16;

/// Counts live resource sets against a fixed ceiling.
///
/// Each permit releases its slot when dropped, so a surface torn down in any
/// order frees its slot exactly once.
#[derive(Debug)]
pub struct ResourceGovernor {
    live: AtomicUsize,
    max: usize,
}

impl ResourceGovernor {
    pub fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            live: AtomicUsize::new(0),
            max,
        })
    }

    /// Process-wide governor with the default ceiling.
    pub fn global() -> Arc<Self> {
        Self::global_with_max(DEFAULT_MAX_RESOURCE_SETS)
    }

    /// Process-wide governor, created with ceiling `max` by the first caller.
    ///
    /// Later callers share that instance whatever ceiling they ask for.
    pub fn global_with_max(max: usize) -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ResourceGovernor>> = OnceLock::new();
        let governor = GLOBAL.get_or_init(|| ResourceGovernor::new(max));
        if governor.max != max {
            log::warn!(
                "Resource governor already created with ceiling {}, ignoring {}",
                governor.max,
                max
            );
        }
        Arc::clone(governor)
    }

    /// Reserve a slot, or `None` when the ceiling is reached.
    pub fn acquire(self: &Arc<Self>) -> Option<GovernorPermit> {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.max).then_some(live + 1)
            })
            .ok()?;
        Some(GovernorPermit {
            governor: Arc::clone(self),
        })
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    fn release(&self) {
        let _ = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| live.checked_sub(1));
    }
}

/// A reserved resource-set slot.
#[derive(Debug)]
pub struct GovernorPermit {
    governor: Arc<ResourceGovernor>,
}

impl Drop for GovernorPermit {
    fn drop(&mut self) {
        self.governor.release();
    }
}
