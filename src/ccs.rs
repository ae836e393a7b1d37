//! The cost-centre-stack tree node and its memoised child index
//! (spec §3, "CostCentreStack"; spec §4.3, the `index_table`).
//!
//! The child index is a singly linked list of [`IndexEntry`] nodes, headed
//! by an `AtomicPtr`, exactly as in the original `IndexTable` (`next`-linked,
//! built by `addToIndexTable`). Once an entry is linked in it is never
//! mutated or unlinked outside of `prune_ccs_tree` (spec §4.5), which runs
//! single-threaded after mutators have quiesced (spec §5) — so lock-free
//! readers that loaded the head before a concurrent insert simply miss the
//! newest entry and either re-probe under the lock or (on the fast path in
//! `push`) fall through to the slow path.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};

use crate::cc::{CcHandle, CostCentre};
use crate::ids::CcsId;

pub(crate) struct IndexEntry {
    pub(crate) cc: NonNull<CostCentre>,
    pub(crate) ccs: NonNull<Ccs>,
    pub(crate) back_edge: bool,
    next: *mut IndexEntry,
}

pub struct Ccs {
    id: CcsId,
    ctx_id: u64,
    cc: NonNull<CostCentre>,
    prev: Option<NonNull<Ccs>>,
    root: NonNull<Ccs>,
    depth: u32,
    index_head: AtomicPtr<IndexEntry>,
    selected: AtomicBool,
    scc_count: AtomicU64,
    time_ticks: AtomicU64,
    mem_alloc: AtomicU64,
    inherited_ticks: AtomicU64,
    inherited_alloc: AtomicU64,
}

impl Ccs {
    pub(crate) fn new(
        id: CcsId,
        ctx_id: u64,
        cc: NonNull<CostCentre>,
        prev: Option<NonNull<Ccs>>,
        root: NonNull<Ccs>,
        depth: u32,
    ) -> Self {
        Ccs {
            id,
            ctx_id,
            cc,
            prev,
            root,
            depth,
            index_head: AtomicPtr::new(std::ptr::null_mut()),
            selected: AtomicBool::new(false),
            scc_count: AtomicU64::new(0),
            time_ticks: AtomicU64::new(0),
            mem_alloc: AtomicU64::new(0),
            inherited_ticks: AtomicU64::new(0),
            inherited_alloc: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> CcsId {
        self.id
    }

    pub(crate) fn ctx_id(&self) -> u64 {
        self.ctx_id
    }

    /// Fixes up `root` to point at `self` once `self`'s own address is
    /// known (used only when constructing the `MAIN` singleton, whose
    /// `root` is itself — spec §3, "root... null only for the distinguished
    /// empty sentinel").
    ///
    /// # Safety
    /// Must only be called before `self` is reachable from more than one
    /// thread (i.e. during `ProfilerContext` construction).
    pub(crate) unsafe fn patch_root(&self, new_root: NonNull<Ccs>) {
        let self_mut = self as *const Ccs as *mut Ccs;
        (*self_mut).root = new_root;
    }

    /// Re-parents a built-in CCS under `MAIN` (spec §6, `init2`).
    ///
    /// # Safety
    /// Must only be called during `ProfilerContext::init2`, before any
    /// mutator thread has observed this node, matching the original's
    /// single-threaded re-parenting loop.
    pub(crate) unsafe fn patch_prev_and_depth(&self, prev: Option<NonNull<Ccs>>, depth: u32) {
        let self_mut = self as *const Ccs as *mut Ccs;
        (*self_mut).prev = prev;
        (*self_mut).depth = depth;
    }

    pub(crate) fn cc_ptr(&self) -> NonNull<CostCentre> {
        self.cc
    }

    pub fn cc(&self) -> &CostCentre {
        // SAFETY: `cc` points at a `CostCentre` owned by the same
        // `ProfilerContext` as `self`; both live until the context is
        // dropped (see `Registry::drop` / `ProfilerContext::drop`).
        unsafe { self.cc.as_ref() }
    }

    pub(crate) fn prev_ptr(&self) -> Option<NonNull<Ccs>> {
        self.prev
    }

    pub(crate) fn root_ptr(&self) -> NonNull<Ccs> {
        self.root
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn selected(&self) -> bool {
        self.selected.load(Ordering::Relaxed)
    }

    pub(crate) fn set_selected(&self, value: bool) {
        self.selected.store(value, Ordering::Relaxed);
    }

    pub fn scc_count(&self) -> u64 {
        self.scc_count.load(Ordering::Relaxed)
    }

    /// Records one dynamic entry into the annotated region this CCS
    /// represents (spec §3: "number of entries into the annotated region
    /// while this stack was current").
    ///
    /// Distinct from [`Ccs::find_child`]/[`ProfilerContext::push`]: a CCS
    /// node is created once per distinct `(parent, cc)` pair, but the
    /// program may flow through that same annotated region many times
    /// (e.g. a loop) while it stays the current stack — each such flow-
    /// through is one call here, made by the generated code at the `scc`
    /// site itself, not by `push`.
    pub fn bump_scc_count(&self) {
        self.scc_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks.load(Ordering::Relaxed)
    }

    pub fn mem_alloc(&self) -> u64 {
        self.mem_alloc.load(Ordering::Relaxed)
    }

    /// Called by the tick sampler (spec §6, external interface contract:
    /// "a tick sample delivering `(current_ccs, ticks, words_allocated)`").
    pub fn record_sample(&self, ticks: u64, words_allocated: u64) {
        if ticks != 0 {
            self.time_ticks.fetch_add(ticks, Ordering::Relaxed);
        }
        if words_allocated != 0 {
            self.mem_alloc.fetch_add(words_allocated, Ordering::Relaxed);
        }
    }

    pub fn inherited_ticks(&self) -> u64 {
        self.inherited_ticks.load(Ordering::Relaxed)
    }

    pub fn inherited_alloc(&self) -> u64 {
        self.inherited_alloc.load(Ordering::Relaxed)
    }

    pub(crate) fn set_inherited(&self, ticks: u64, alloc: u64) {
        self.inherited_ticks.store(ticks, Ordering::Relaxed);
        self.inherited_alloc.store(alloc, Ordering::Relaxed);
    }

    /// Lock-free probe of the memoisation table (spec §4.3 step 2).
    pub(crate) fn find_child(&self, cc: NonNull<CostCentre>) -> Option<NonNull<Ccs>> {
        let mut entry = self.index_head.load(Ordering::Acquire);
        while let Some(e) = NonNull::new(entry) {
            // SAFETY: every `IndexEntry` reachable from `index_head` was
            // published by `push_entry` and is never freed before the
            // owning context is torn down.
            let e = unsafe { e.as_ref() };
            if e.cc == cc {
                return Some(e.ccs);
            }
            entry = e.next;
        }
        None
    }

    /// Links a new entry onto the head of the index table. Must only be
    /// called while the owning `ProfilerContext`'s tree-wide lock is held
    /// (spec §5, "Publication... must be visible to subsequent lock-free
    /// readers").
    pub(crate) fn push_entry(&self, entry: NonNull<IndexEntry>) {
        let old_head = self.index_head.load(Ordering::Relaxed);
        // SAFETY: `entry` was just allocated by the caller and is not yet
        // reachable from any thread.
        unsafe {
            (*entry.as_ptr()).next = old_head;
        }
        self.index_head.store(entry.as_ptr(), Ordering::Release);
    }

    /// Iterates index-table entries, most recently inserted first — used by
    /// every report-phase traversal (spec §4.5) and by `checkLoop`-style
    /// ancestor scans. Entries are never removed outside of
    /// `prune_ccs_tree`, which rebuilds the list wholesale while
    /// single-threaded (spec §4.5 step 5).
    pub(crate) fn entries(&self) -> IndexEntryIter<'_> {
        IndexEntryIter {
            cur: self.index_head.load(Ordering::Acquire),
            _marker: PhantomData,
        }
    }

    /// Replaces the index table wholesale (used only by `prune_ccs_tree`,
    /// which runs after mutators have quiesced).
    pub(crate) fn retain_entries(&self, keep: impl Fn(&IndexEntry) -> bool) -> Vec<NonNull<IndexEntry>> {
        let mut head = std::ptr::null_mut();
        let mut tail: *mut *mut IndexEntry = &mut head;
        let mut dropped = Vec::new();
        let mut cur = self.index_head.load(Ordering::Relaxed);
        while let Some(e) = NonNull::new(cur) {
            // SAFETY: see `find_child`.
            let next = unsafe { (*e.as_ptr()).next };
            if keep(unsafe { e.as_ref() }) {
                unsafe {
                    (*e.as_ptr()).next = std::ptr::null_mut();
                    *tail = e.as_ptr();
                    tail = &mut (*e.as_ptr()).next;
                }
            } else {
                dropped.push(e);
            }
            cur = next;
        }
        self.index_head.store(head, Ordering::Relaxed);
        dropped
    }
}

pub(crate) struct IndexEntryIter<'a> {
    cur: *mut IndexEntry,
    _marker: PhantomData<&'a IndexEntry>,
}

impl<'a> Iterator for IndexEntryIter<'a> {
    type Item = &'a IndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let e = NonNull::new(self.cur)?;
        // SAFETY: see `Ccs::find_child`.
        let e_ref = unsafe { e.as_ref() };
        self.cur = e_ref.next;
        Some(e_ref)
    }
}

/// A handle to a [`Ccs`] owned by some [`crate::ProfilerContext`].
pub struct CcsHandle<'ctx> {
    pub(crate) ptr: NonNull<Ccs>,
    pub(crate) _marker: PhantomData<&'ctx Ccs>,
}

impl<'ctx> Clone for CcsHandle<'ctx> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'ctx> Copy for CcsHandle<'ctx> {}

impl<'ctx> PartialEq for CcsHandle<'ctx> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}
impl<'ctx> Eq for CcsHandle<'ctx> {}

impl<'ctx> std::hash::Hash for CcsHandle<'ctx> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
    }
}

impl<'ctx> std::fmt::Debug for CcsHandle<'ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CcsHandle")
            .field("id", &self.get().id())
            .field("cc", &self.get().cc().label())
            .finish()
    }
}

// SAFETY: see the identical justification on `CcHandle`.
unsafe impl<'ctx> Send for CcsHandle<'ctx> {}
unsafe impl<'ctx> Sync for CcsHandle<'ctx> {}

impl<'ctx> CcsHandle<'ctx> {
    pub fn get(&self) -> &'ctx Ccs {
        // SAFETY: see `CcHandle::get`.
        unsafe { &*self.ptr.as_ptr() }
    }

    pub fn prev(&self) -> Option<CcsHandle<'ctx>> {
        self.get().prev_ptr().map(|ptr| CcsHandle {
            ptr,
            _marker: PhantomData,
        })
    }

    pub fn root(&self) -> CcsHandle<'ctx> {
        CcsHandle {
            ptr: self.get().root_ptr(),
            _marker: PhantomData,
        }
    }

    pub fn cc_handle(&self) -> CcHandle<'ctx> {
        CcHandle {
            ptr: self.get().cc_ptr(),
            _marker: PhantomData,
        }
    }

    /// Non-back-edge children, in most-recently-created-first order.
    pub(crate) fn children(&self) -> impl Iterator<Item = CcsHandle<'ctx>> {
        self.get().entries().filter(|e| !e.back_edge).map(|e| CcsHandle {
            ptr: e.ccs,
            _marker: PhantomData,
        })
    }
}

impl<'ctx> std::ops::Deref for CcsHandle<'ctx> {
    type Target = Ccs;
    fn deref(&self) -> &Ccs {
        self.get()
    }
}
