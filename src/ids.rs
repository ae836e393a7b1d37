//! Monotonic identity for cost centres and cost-centre stacks.
//!
//! Mirrors the `CC_ID`/`CCS_ID` globals from the original profiler (spec §9),
//! but scoped to a [`crate::ProfilerContext`] instead of process-wide statics.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

/// Allocates strictly increasing, never-zero ids.
///
/// `id`s are only ever compared and printed; they carry no other meaning.
#[derive(Debug, Default)]
pub(crate) struct IdSource(AtomicU32);

impl IdSource {
    pub(crate) const fn new() -> Self {
        // Start at 1: id 0 is reserved (spec §3, "assigned monotonic id (never 0)").
        IdSource(AtomicU32::new(1))
    }

    pub(crate) fn next(&self) -> NonZeroU32 {
        let raw = self.0.fetch_add(1, Ordering::Relaxed);
        NonZeroU32::new(raw).expect("cost-centre/CCS id counter wrapped past u32::MAX")
    }
}

/// Identity of a [`crate::cc::CostCentre`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CcId(pub(crate) NonZeroU32);

impl fmt::Display for CcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a [`crate::ccs::Ccs`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CcsId(pub(crate) NonZeroU32);

impl fmt::Display for CcsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
