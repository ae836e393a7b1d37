//! The per-mutator "current CCS" register (spec §6, external interface:
//! "a trivial setter used by the sampler wrapper").
//!
//! The original keeps this as a field on the Capability/TSO
//! (`cap->r.rCCCS`); here it's a small standalone cell so the host runtime
//! can embed one per scheduler-visible thread without needing to reach back
//! into a `ProfilerContext` to read or write it.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::ccs::{Ccs, CcsHandle};

/// Holds the cost-centre-stack a single mutator is "currently in".
///
/// Reads and writes are `Relaxed`: the CCS tree itself is read through
/// `Acquire` loads of `index_head` wherever a read needs to observe a
/// concurrent `push`, and this cell only ever stores pointers that are
/// already valid for the lifetime of the owning context.
pub struct CurrentCcsSlot {
    ptr: AtomicPtr<Ccs>,
}

impl CurrentCcsSlot {
    pub fn new(initial: CcsHandle<'_>) -> Self {
        CurrentCcsSlot {
            ptr: AtomicPtr::new(initial.ptr.as_ptr()),
        }
    }

    pub fn get<'ctx>(&self) -> CcsHandle<'ctx> {
        let ptr = self.ptr.load(Ordering::Relaxed);
        CcsHandle {
            // SAFETY: only ever stores a pointer handed in through `set`,
            // which itself only ever receives handles minted by the
            // context that owns this slot.
            ptr: unsafe { NonNull::new_unchecked(ptr) },
            _marker: PhantomData,
        }
    }

    pub fn set(&self, new: CcsHandle<'_>) {
        self.ptr.store(new.ptr.as_ptr(), Ordering::Relaxed);
    }
}
