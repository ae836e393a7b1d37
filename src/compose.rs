//! Stack composition on closure entry — `enter` (spec §4.4, component E).

use crate::cc::Builtin;
use crate::ccs::CcsHandle;
use crate::context::ProfilerContext;
use crate::current::CurrentCcsSlot;

impl ProfilerContext {
    /// `current ⊕ captured` (spec §4.4): the stack a thread should adopt
    /// when it forces a thunk that was captured while `captured` was
    /// active.
    ///
    /// While the computation runs, `slot` is temporarily pointed at the
    /// built-in `OVERHEAD` CCS, so any tick sampled during composition is
    /// attributed to profiling overhead rather than to `current` or
    /// `captured` (spec §4.4, last paragraph); `slot` is left pointing at
    /// the result when this returns.
    pub fn enter<'ctx>(
        &'ctx self,
        slot: &CurrentCcsSlot,
        current: CcsHandle<'ctx>,
        captured: CcsHandle<'ctx>,
    ) -> CcsHandle<'ctx> {
        slot.set(self.builtin_ccs(Builtin::Overhead));
        let result = self.compose(current, captured);
        slot.set(result);
        result
    }

    fn compose<'ctx>(&'ctx self, current: CcsHandle<'ctx>, captured: CcsHandle<'ctx>) -> CcsHandle<'ctx> {
        if current.ptr == captured.ptr {
            return current;
        }
        if let Some(captured_prev) = captured.prev() {
            if captured_prev.ptr == self.main_ccs().ptr {
                return current;
            }
        }
        if current.root_ptr() != captured.root_ptr() {
            return self.append_spine(current, &spine(captured));
        }

        // Same root: trim the deeper chain to the shallower one's depth,
        // then walk both up in lock-step until the spines meet — the
        // longest common prefix, identified by pointer equality since the
        // tree is memoised (`A ⊕ B = A ++ dropCommonPrefix(A, B)`).
        let mut a = current;
        let mut b = captured;
        while a.depth() > b.depth() {
            a = a.prev().expect("depth > 0 implies a parent exists");
        }
        while b.depth() > a.depth() {
            b = b.prev().expect("depth > 0 implies a parent exists");
        }
        while a.ptr != b.ptr {
            a = a.prev().expect("nodes sharing a root always meet at a common ancestor");
            b = b.prev().expect("nodes sharing a root always meet at a common ancestor");
        }
        let common = a;

        // The non-shared tail of `captured`, oldest-first (innermost last).
        let mut tail = Vec::new();
        let mut node = captured;
        while node.ptr != common.ptr {
            tail.push(node.cc_handle());
            node = node.prev().expect("walked past the common ancestor");
        }
        tail.reverse();

        let mut result = current;
        for cc in tail {
            result = self.push(result, cc);
        }
        result
    }

    /// Pushes every non-CAF cost centre from `captured_spine` (excluding
    /// `captured`'s own root) onto `current`, stopping before the first CAF
    /// encountered (spec §4.4: "pushes every CC from captured's spine
    /// (oldest-first) onto current, stopping before a CAF cost-centre or
    /// MAIN").
    fn append_spine<'ctx>(&'ctx self, current: CcsHandle<'ctx>, captured_spine: &[CcsHandle<'ctx>]) -> CcsHandle<'ctx> {
        let mut result = current;
        for node in captured_spine.iter().skip(1) {
            let cc = node.cc_handle();
            if cc.is_caf() {
                break;
            }
            result = self.push(result, cc);
        }
        result
    }
}

/// The spine of `node`, root-first (index 0 is the tree root — `MAIN` or a
/// CAF root whose own `prev` is `None`).
fn spine<'ctx>(node: CcsHandle<'ctx>) -> Vec<CcsHandle<'ctx>> {
    let mut v = Vec::new();
    let mut cur = Some(node);
    while let Some(n) = cur {
        v.push(n);
        cur = n.prev();
    }
    v.reverse();
    v
}
