//! The memoised `push` operation (spec §4.3, component D).

use std::marker::PhantomData;

use crate::cc::CcHandle;
use crate::ccs::CcsHandle;
use crate::context::ProfilerContext;
use crate::selection::compute_selected;

impl ProfilerContext {
    /// Returns the unique child CCS representing "entering `cc` from
    /// `parent`" (spec §4.3). Idempotent under `(parent, cc)`: repeated
    /// calls with the same pair return the same `CcsHandle` (pointer
    /// identity), matching property 1 in spec §8.
    pub fn push<'ctx>(&'ctx self, parent: CcsHandle<'ctx>, cc: CcHandle<'ctx>) -> CcsHandle<'ctx> {
        debug_assert_eq!(
            parent.ctx_id(),
            self.ctx_id(),
            "CcsHandle passed to push() did not originate from this ProfilerContext"
        );
        debug_assert_eq!(
            cc.get().ctx_id(),
            self.ctx_id(),
            "CcHandle passed to push() did not originate from this ProfilerContext"
        );

        // Step 1: collapse adjacent duplicates.
        if parent.cc_ptr() == cc.ptr {
            return parent;
        }

        // Step 4: the sentinel special case — a CCS with no parent of its
        // own has nothing useful to probe before the lock, so skip straight
        // to the slow path.
        let parent_is_sentinel = parent.prev_ptr().is_none();

        if !parent_is_sentinel {
            // Step 2: lock-free fast path.
            if let Some(found) = parent.find_child(cc.ptr) {
                return CcsHandle {
                    ptr: found,
                    _marker: PhantomData,
                };
            }
        }

        // Steps 3/4: slow path, under the single process-wide lock (spec §5).
        let _guard = self.tree_lock().lock();

        // Step 3a: re-probe — another thread may have inserted while we
        // waited for the lock.
        if let Some(found) = parent.find_child(cc.ptr) {
            return CcsHandle {
                ptr: found,
                _marker: PhantomData,
            };
        }

        // Step 3b: search upward along `prev` for an existing node with the
        // same cost centre — a recursion.
        let mut ancestor = parent.prev();
        while let Some(node) = ancestor {
            if node.cc_ptr() == cc.ptr {
                return self.resolve_recursion(parent, node);
            }
            ancestor = node.prev();
        }

        // Step 3c: genuinely new child.
        let depth = parent.depth() + 1;
        let root = parent.root_ptr();
        let new_ccs = self.alloc_ccs(cc.ptr, Some(parent.ptr), root, depth);
        let selected = compute_selected(&self.config(), cc.get(), parent);
        // SAFETY: `new_ccs` was just allocated and is not yet reachable from
        // any other thread, so this single `set_selected` call races with
        // nothing.
        unsafe { new_ccs.as_ref() }.set_selected(selected);

        let entry = self.alloc_index_entry(cc.ptr, new_ccs, false);
        parent.push_entry(entry);

        CcsHandle {
            ptr: new_ccs,
            _marker: PhantomData,
        }
    }

    /// Spec §4.3 step 3b: the recursion policy, selected at compile time
    /// (spec §9, "the truncate/drop choice should remain a compile-time,
    /// not runtime, flag").
    fn resolve_recursion<'ctx>(
        &'ctx self,
        parent: CcsHandle<'ctx>,
        ancestor: CcsHandle<'ctx>,
    ) -> CcsHandle<'ctx> {
        #[cfg(feature = "recursion-truncate")]
        {
            // The resulting CCS is the ancestor itself; record a back-edge
            // from `parent` to it.
            let entry = self.alloc_index_entry(ancestor.cc_ptr(), ancestor.ptr, true);
            parent.push_entry(entry);
            ancestor
        }
        #[cfg(feature = "recursion-drop")]
        {
            // Collapse to `parent`, recording a back-edge to itself.
            let entry = self.alloc_index_entry(parent.cc_ptr(), parent.ptr, true);
            parent.push_entry(entry);
            parent
        }
    }
}
