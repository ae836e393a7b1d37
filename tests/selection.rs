//! Selection-predicate properties (spec §8 property 7, spec §4.6).

use ccs_profiler::{ProfilerConfig, ProfilerContext, Selectors};

fn ctx_with(selectors: Selectors) -> ProfilerContext {
    let mut config = ProfilerConfig::default();
    config.selectors = selectors;
    ProfilerContext::init(config)
}

#[test]
fn no_selectors_selects_everything() {
    let ctx = ctx_with(Selectors::default());
    let a = ctx.declare_cost_centre("a", "M", "m.rs:1:1", false);
    let s_a = ctx.push(ctx.main_ccs(), a);
    assert!(s_a.selected());
}

#[test]
fn mod_selector_filters_by_own_module() {
    let ctx = ctx_with(Selectors {
        module: Some("Wanted".into()),
        ..Selectors::default()
    });
    let wanted = ctx.declare_cost_centre("f", "Wanted", "m.rs:1:1", false);
    let other = ctx.declare_cost_centre("g", "Other", "m.rs:2:1", false);

    let s_wanted = ctx.push(ctx.main_ccs(), wanted);
    let s_other = ctx.push(ctx.main_ccs(), other);

    assert!(s_wanted.selected());
    assert!(!s_other.selected());
}

#[test]
fn cc_selector_filters_by_own_label() {
    let ctx = ctx_with(Selectors {
        cost_centre: Some("hot*".into()),
        ..Selectors::default()
    });
    let hot = ctx.declare_cost_centre("hot_loop", "M", "m.rs:1:1", false);
    let cold = ctx.declare_cost_centre("cold_loop", "M", "m.rs:2:1", false);

    assert!(ctx.push(ctx.main_ccs(), hot).selected());
    assert!(!ctx.push(ctx.main_ccs(), cold).selected());
}

#[test]
fn ccs_selector_matches_any_ancestor() {
    // Property 7: s.selected == 1 iff some ancestor-or-self's label matches.
    let ctx = ctx_with(Selectors {
        ancestor_cost_centre: Some("marker".into()),
        ..Selectors::default()
    });
    let marker = ctx.declare_cost_centre("marker", "M", "m.rs:1:1", false);
    let child = ctx.declare_cost_centre("child", "M", "m.rs:2:1", false);
    let unrelated = ctx.declare_cost_centre("unrelated", "M", "m.rs:3:1", false);

    let s_marker = ctx.push(ctx.main_ccs(), marker);
    let s_child = ctx.push(s_marker, child);
    let s_unrelated = ctx.push(ctx.main_ccs(), unrelated);

    assert!(s_marker.selected(), "the marker CCS itself must match (ancestor-or-self)");
    assert!(s_child.selected(), "a descendant of the marker must also match");
    assert!(!s_unrelated.selected());
}

#[test]
fn all_three_selectors_must_agree() {
    let ctx = ctx_with(Selectors {
        module: Some("M".into()),
        cost_centre: Some("f*".into()),
        ancestor_cost_centre: Some("f*".into()),
    });
    let matches_all = ctx.declare_cost_centre("foo", "M", "m.rs:1:1", false);
    let wrong_module = ctx.declare_cost_centre("foo", "N", "m.rs:2:1", false);

    assert!(ctx.push(ctx.main_ccs(), matches_all).selected());
    assert!(!ctx.push(ctx.main_ccs(), wrong_module).selected());
}
