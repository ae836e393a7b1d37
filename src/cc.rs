//! Cost-centre registry (spec §4.2, component B) and the `CostCentre` type
//! (spec §3).

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::ids::{CcId, IdSource};

/// Identifies one of the seven built-in, identity-significant cost centres
/// (spec §3, "Built-in CCs/CCSs").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Main,
    System,
    Gc,
    Overhead,
    DontCare,
    Pinned,
    Idle,
}

impl Builtin {
    pub(crate) const ALL: [Builtin; 7] = [
        Builtin::Main,
        Builtin::System,
        Builtin::Gc,
        Builtin::Overhead,
        Builtin::DontCare,
        Builtin::Pinned,
        Builtin::Idle,
    ];

    /// `(label, module)` exactly as declared by `CC_DECLARE` in the original
    /// source (`rts/Profiling.c`); `srcloc` is always `"<built-in>"`.
    pub(crate) fn label_module(self) -> (&'static str, &'static str) {
        match self {
            Builtin::Main => ("MAIN", "MAIN"),
            Builtin::System => ("SYSTEM", "SYSTEM"),
            Builtin::Gc => ("GC", "GC"),
            Builtin::Overhead => ("OVERHEAD_of", "PROFILING"),
            Builtin::DontCare => ("DONT_CARE", "MAIN"),
            Builtin::Pinned => ("PINNED", "SYSTEM"),
            Builtin::Idle => ("IDLE", "IDLE"),
        }
    }

    /// Whether this built-in is excluded from reports below `ALL` verbosity
    /// (spec §4.5, "Ignore rules"). `MAIN` and `PINNED` are never ignored.
    pub(crate) fn is_ignored_by_default(self) -> bool {
        matches!(
            self,
            Builtin::Overhead | Builtin::DontCare | Builtin::Gc | Builtin::System | Builtin::Idle
        )
    }
}

/// An interned, never-destroyed cost-centre descriptor (spec §3).
#[derive(Debug)]
pub struct CostCentre {
    id: CcId,
    ctx_id: u64,
    label: Box<str>,
    module: Box<str>,
    srcloc: Box<str>,
    is_caf: bool,
    builtin: Option<Builtin>,
    // Populated only by the reporter (`aggregate_cc_costs`); zero at runtime.
    time_ticks: AtomicU64,
    mem_alloc: AtomicU64,
}

impl CostCentre {
    pub fn id(&self) -> CcId {
        self.id
    }

    pub(crate) fn ctx_id(&self) -> u64 {
        self.ctx_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn srcloc(&self) -> &str {
        &self.srcloc
    }

    /// A CAF (Constant Applicative Form) cost centre, per spec §3/§4.4/§4.7.
    pub fn is_caf(&self) -> bool {
        self.is_caf
    }

    pub(crate) fn builtin(&self) -> Option<Builtin> {
        self.builtin
    }

    /// Starts with `"CAF"`, consulted by the exception-trace printer
    /// (spec §4.7, step 3).
    pub(crate) fn label_starts_with_caf(&self) -> bool {
        self.label.starts_with("CAF")
    }

    pub(crate) fn add_costs(&self, ticks: u64, alloc: u64) {
        if ticks != 0 {
            self.time_ticks.fetch_add(ticks, Ordering::Relaxed);
        }
        if alloc != 0 {
            self.mem_alloc.fetch_add(alloc, Ordering::Relaxed);
        }
    }

    pub(crate) fn reset_report_counters(&self) {
        self.time_ticks.store(0, Ordering::Relaxed);
        self.mem_alloc.store(0, Ordering::Relaxed);
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks.load(Ordering::Relaxed)
    }

    pub fn mem_alloc(&self) -> u64 {
        self.mem_alloc.load(Ordering::Relaxed)
    }
}

/// A handle to a [`CostCentre`] owned by some [`crate::ProfilerContext`].
///
/// Valid for as long as that context is alive; the `'ctx` lifetime is a
/// conservative (not strictly necessary, but cheap to enforce) bound tying
/// uses of the handle to the context that created it.
pub struct CcHandle<'ctx> {
    pub(crate) ptr: NonNull<CostCentre>,
    pub(crate) _marker: PhantomData<&'ctx CostCentre>,
}

impl<'ctx> Clone for CcHandle<'ctx> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'ctx> Copy for CcHandle<'ctx> {}

impl<'ctx> PartialEq for CcHandle<'ctx> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}
impl<'ctx> Eq for CcHandle<'ctx> {}

impl<'ctx> std::hash::Hash for CcHandle<'ctx> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
    }
}

impl<'ctx> std::fmt::Debug for CcHandle<'ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CcHandle").field("cc", self.get()).finish()
    }
}

// SAFETY: a `CcHandle` only ever points at a `CostCentre` owned by the
// registry of the `ProfilerContext` that minted it. That `CostCentre` is
// never moved and never freed before the context itself is torn down, and
// all of its fields are accessed through `Sync` types (atomics) or are
// immutable after construction, so sharing the handle across threads is
// sound as long as the context outlives the handle (enforced by `'ctx`).
unsafe impl<'ctx> Send for CcHandle<'ctx> {}
unsafe impl<'ctx> Sync for CcHandle<'ctx> {}

impl<'ctx> CcHandle<'ctx> {
    pub fn get(&self) -> &'ctx CostCentre {
        // SAFETY: see the `Send`/`Sync` justification above.
        unsafe { &*self.ptr.as_ptr() }
    }
}

impl<'ctx> std::ops::Deref for CcHandle<'ctx> {
    type Target = CostCentre;
    fn deref(&self) -> &CostCentre {
        self.get()
    }
}

/// The deduplicated store of registered cost centres (spec §4.2, `CC_LIST`).
///
/// Cost centres are never destroyed before the owning context is torn down,
/// so registration hands out raw, leaked allocations (mirroring the teacher
/// crate's `Box::leak`-based `GcBox` bookkeeping in `gc/src/gc.rs`) and keeps
/// a list purely for bulk teardown and report-time iteration.
pub(crate) struct Registry {
    ids: IdSource,
    all: Mutex<Vec<NonNull<CostCentre>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            ids: IdSource::new(),
            all: Mutex::new(Vec::new()),
        }
    }

    /// Declares a brand-new cost centre. Unlike the C original, there is no
    /// "re-register the same CC" path: callers own exactly one `CcHandle`
    /// per call site and are expected to cache it, so registration and
    /// creation are the same operation here.
    pub(crate) fn declare(
        &self,
        ctx_id: u64,
        label: &str,
        module: &str,
        srcloc: &str,
        is_caf: bool,
        builtin: Option<Builtin>,
    ) -> CcHandle<'_> {
        let cc = Box::new(CostCentre {
            id: CcId(self.ids.next()),
            ctx_id,
            label: label.into(),
            module: module.into(),
            srcloc: srcloc.into(),
            is_caf,
            builtin,
            time_ticks: AtomicU64::new(0),
            mem_alloc: AtomicU64::new(0),
        });
        let ptr = NonNull::from(Box::leak(cc));
        self.all.lock().push(ptr);
        CcHandle {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Registration order, oldest first — `MAIN` is always first since it is
    /// declared before any user cost centre (spec §4.2: "`CC_MAIN` gets
    /// `link = 0`").
    pub(crate) fn all(&self) -> Vec<CcHandle<'_>> {
        self.all
            .lock()
            .iter()
            .map(|&ptr| CcHandle {
                ptr,
                _marker: PhantomData,
            })
            .collect()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for ptr in self.all.get_mut().drain(..) {
            // SAFETY: every pointer in `all` was produced by `Box::leak` in
            // `declare` and is dropped at most once, here, when the owning
            // `ProfilerContext` (and therefore this `Registry`) is dropped.
            unsafe {
                drop(Box::from_raw(ptr.as_ptr()));
            }
        }
    }
}
