//! Stack composition (`enter`) properties and scenarios (spec §8,
//! properties 5-6 and scenarios d-e).

use ccs_profiler::{Builtin, CurrentCcsSlot, ProfilerConfig, ProfilerContext};

fn ctx() -> ProfilerContext {
    ProfilerContext::init(ProfilerConfig::default())
}

fn labels<'ctx>(ctx: &'ctx ProfilerContext, mut ccs: ccs_profiler::CcsHandle<'ctx>) -> Vec<&'ctx str> {
    let main = ctx.main_ccs();
    let mut out = Vec::new();
    while ccs != main {
        out.push(ccs.cc_handle().label());
        match ccs.prev() {
            Some(p) => ccs = p,
            None => break,
        }
    }
    out.reverse();
    out
}

#[test]
fn compose_self_is_absorbing() {
    // Property 5: enter(s, s) == s.
    let ctx = ctx();
    let a = ctx.declare_cost_centre("a", "M", "m.rs:1:1", false);
    let s = ctx.push(ctx.main_ccs(), a);
    let slot = CurrentCcsSlot::new(s);
    let result = ctx.enter(&slot, s, s);
    assert_eq!(result, s);
}

#[test]
fn compose_with_empty_is_absorbing() {
    // Property 5: enter(s, empty) == s, where "empty" is modelled by a
    // captured stack whose prev is MAIN (spec §4.4 fast path).
    let ctx = ctx();
    let a = ctx.declare_cost_centre("a", "M", "m.rs:1:1", false);
    let b = ctx.declare_cost_centre("b", "M", "m.rs:2:1", false);
    let s = ctx.push(ctx.push(ctx.main_ccs(), a), b);
    let root_level = ctx.push(ctx.main_ccs(), a);
    let slot = CurrentCcsSlot::new(s);

    let result = ctx.enter(&slot, s, root_level);
    assert_eq!(result, s, "captured.prev == MAIN must leave current unchanged");
}

#[test]
fn compose_common_prefix() {
    // Scenario (d): current = MAIN,a,b,c; captured = MAIN,a,b,d.
    // Result labels = a,b,c,d.
    let ctx = ctx();
    let a = ctx.declare_cost_centre("a", "M", "m.rs:1:1", false);
    let b = ctx.declare_cost_centre("b", "M", "m.rs:2:1", false);
    let c = ctx.declare_cost_centre("c", "M", "m.rs:3:1", false);
    let d = ctx.declare_cost_centre("d", "M", "m.rs:4:1", false);

    let main = ctx.main_ccs();
    let ab = ctx.push(ctx.push(main, a), b);
    let current = ctx.push(ab, c);
    let captured = ctx.push(ab, d);

    let slot = CurrentCcsSlot::new(current);
    let result = ctx.enter(&slot, current, captured);

    assert_eq!(labels(&ctx, result), vec!["a", "b", "c", "d"]);
    assert_eq!(slot.get(), result, "slot must be left pointing at the composed result");
}

#[test]
fn compose_across_roots_stops_before_caf() {
    // Scenario (e): current = MAIN,a; captured = CAF_root,x,y.
    // Result = MAIN,a,x,y — the CAF root itself is never pushed, only the
    // non-CAF frames built on top of it are.
    //
    // `init2()` is deliberately not called here: before it runs, every
    // built-in CCS is still its own root (spec §6, "init2... re-parents
    // every built-in CCS... after dynamic code load"), giving the `GC`
    // built-in exactly the shape a CAF's self-rooted stack has — a node
    // with no parent of its own, standing in for `CAF_root`.
    let ctx = ctx();
    let a = ctx.declare_cost_centre("a", "M", "m.rs:1:1", false);
    let x = ctx.declare_cost_centre("x", "M", "m.rs:5:1", false);
    let y = ctx.declare_cost_centre("y", "M", "m.rs:6:1", false);

    let main = ctx.main_ccs();
    let current = ctx.push(main, a);

    let caf_root = ctx.builtin_ccs(Builtin::Gc);
    let captured = ctx.push(ctx.push(caf_root, x), y);

    assert_ne!(current.root(), captured.root());

    let slot = CurrentCcsSlot::new(current);
    let result = ctx.enter(&slot, current, captured);

    assert_eq!(labels(&ctx, result), vec!["a", "x", "y"]);
}

#[test]
fn compose_leaves_overhead_transiently_installed() {
    // Spec §4.4 last paragraph: while composing, the slot is pointed at
    // OVERHEAD; this test exercises the call and then checks the final
    // resting state is the composed result, not OVERHEAD.
    let ctx = ctx();
    let a = ctx.declare_cost_centre("a", "M", "m.rs:1:1", false);
    let b = ctx.declare_cost_centre("b", "M", "m.rs:2:1", false);
    let current = ctx.push(ctx.main_ccs(), a);
    let captured = ctx.push(ctx.main_ccs(), b);
    let slot = CurrentCcsSlot::new(current);

    let result = ctx.enter(&slot, current, captured);
    assert_ne!(slot.get(), ctx.builtin_ccs(Builtin::Overhead));
    assert_eq!(slot.get(), result);
}
