//! Reporting pipeline (spec §4.5, component G): aggregate, inherit, prune,
//! and format both the flat per-CC table and the tree-shaped per-CCS table.
//!
//! Runs once, at shutdown, after the sampler has stopped and mutators have
//! quiesced (spec §5) — every phase below assumes single-threaded access to
//! the tree.

use std::io::Write as _;

use crate::cc::{Builtin, CcHandle, CostCentre};
use crate::ccs::CcsHandle;
use crate::config::Verbosity;
use crate::context::ProfilerContext;
use crate::error::ProfilingError;

/// Running totals produced by [`count_ticks`], consumed by every later
/// phase to compute percentages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportTotals {
    pub total_alloc: u64,
    pub total_prof_ticks: u64,
}

/// Header fields for the `.prof` report (spec §6, "Log file format").
/// Timestamp formatting and argv reconstruction are the host's job — this
/// crate only lays the fields out.
pub struct ReportHeader {
    pub timestamp: String,
    pub program: String,
    pub rts_args: String,
    pub prog_args: String,
}

fn is_ignored(cc: &CostCentre, verbosity: Verbosity) -> bool {
    if verbosity.shows_all_flat_rows() {
        return false;
    }
    cc.builtin().map(Builtin::is_ignored_by_default).unwrap_or(false)
}

fn pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Phase 1 (spec §4.5): DFS from MAIN over non-back-edges, summing the
/// counters of every CCS not matched by the ignore predicate.
pub fn count_ticks(ctx: &ProfilerContext) -> ReportTotals {
    let verbosity = ctx.config().verbosity;
    let mut totals = ReportTotals::default();
    let mut stack = vec![ctx.main_ccs()];
    while let Some(node) = stack.pop() {
        if !is_ignored(node.cc(), verbosity) {
            totals.total_alloc = totals.total_alloc.wrapping_add(node.mem_alloc());
            totals.total_prof_ticks = totals.total_prof_ticks.wrapping_add(node.time_ticks());
        }
        stack.extend(node.children());
    }
    totals
}

/// Phase 2 (spec §4.5): DFS from MAIN; every CCS's counters are added into
/// the CC it references.
pub fn aggregate_cc_costs(ctx: &ProfilerContext) {
    for cc in ctx.registered_ccs() {
        cc.get().reset_report_counters();
    }
    let mut stack = vec![ctx.main_ccs()];
    while let Some(node) = stack.pop() {
        node.cc().add_costs(node.time_ticks(), node.mem_alloc());
        stack.extend(node.children());
    }
}

/// One row of the flat, per-CC report (spec §4.5 phase 3).
pub struct FlatRow<'ctx> {
    pub cc: CcHandle<'ctx>,
    pub pct_time: f64,
    pub pct_alloc: f64,
}

/// Phase 3 (spec §4.5): every registered CC whose share exceeds 1% of
/// either total, sorted by descending `%time` — or every non-ignored CC
/// unconditionally under `All`/`Verbose` verbosity.
///
/// The original threads a sorted list through the CC's intrusive `link`
/// field; a plain `Vec` sorted once is the idiomatic replacement for a
/// single-threaded, run-once sort (see DESIGN.md).
pub fn build_flat_report<'ctx>(ctx: &'ctx ProfilerContext, totals: &ReportTotals) -> Vec<FlatRow<'ctx>> {
    let verbosity = ctx.config().verbosity;
    let mut rows: Vec<FlatRow<'ctx>> = ctx
        .registered_ccs()
        .into_iter()
        .filter(|cc| !is_ignored(cc.get(), verbosity))
        .map(|cc| FlatRow {
            pct_time: pct(cc.time_ticks(), totals.total_prof_ticks),
            pct_alloc: pct(cc.mem_alloc(), totals.total_alloc),
            cc,
        })
        .filter(|row| verbosity.shows_all_flat_rows() || row.pct_time > 1.0 || row.pct_alloc > 1.0)
        .collect();
    rows.sort_by(|a, b| b.pct_time.partial_cmp(&a.pct_time).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

/// Phase 4 (spec §4.5): post-order DFS from MAIN; each node's
/// `inherited_*` is its own counters plus those of its non-back-edge
/// children.
pub fn inherit_costs(ctx: &ProfilerContext) -> (u64, u64) {
    fn recurse(node: CcsHandle<'_>) -> (u64, u64) {
        let mut ticks = node.time_ticks();
        let mut alloc = node.mem_alloc();
        for child in node.children() {
            let (ct, ca) = recurse(child);
            ticks = ticks.wrapping_add(ct);
            alloc = alloc.wrapping_add(ca);
        }
        node.set_inherited(ticks, alloc);
        (ticks, alloc)
    }
    recurse(ctx.main_ccs())
}

/// Phase 5 (spec §4.5): depth-first; unlinks any non-back-edge child whose
/// subtree has zero entries, zero ticks, zero allocations, and no
/// surviving grandchildren. A no-op under `All`/`Verbose` (spec §8 property
/// 10).
///
/// Pruned entries are simply unlinked from the live index table, not
/// freed — the arena owns every `Ccs`/`IndexEntry` until the whole context
/// is torn down (spec §9, "arena owns all, drops in bulk").
pub fn prune_ccs_tree(ctx: &ProfilerContext) {
    if ctx.config().verbosity.disables_pruning() {
        return;
    }

    fn recurse(node: CcsHandle<'_>) {
        for child in node.children() {
            recurse(child);
        }
        node.retain_entries(|entry| {
            if entry.back_edge {
                return true;
            }
            // SAFETY: every `ccs` pointer reachable from a live
            // `IndexEntry` is owned by the same `ProfilerContext` as
            // `node` and outlives this single-threaded traversal.
            let child = unsafe { entry.ccs.as_ref() };
            let has_surviving_children = child.entries().any(|e| !e.back_edge);
            !(child.scc_count() == 0
                && child.time_ticks() == 0
                && child.mem_alloc() == 0
                && !has_surviving_children)
        });
    }

    recurse(ctx.main_ccs());
}

/// One row of the tree-shaped, per-CCS report (spec §4.5 phase 6).
pub struct TreeRow<'ctx> {
    pub ccs: CcsHandle<'ctx>,
    pub indent: usize,
    pub pct_time: f64,
    pub pct_alloc: f64,
    pub pct_inherited_time: f64,
    pub pct_inherited_alloc: f64,
}

/// Phase 6 (spec §4.5): depth-first, 1-space indent per level.
pub fn build_tree_report<'ctx>(ctx: &'ctx ProfilerContext, totals: &ReportTotals) -> Vec<TreeRow<'ctx>> {
    let verbosity = ctx.config().verbosity;
    let mut rows = Vec::new();

    fn recurse<'ctx>(
        node: CcsHandle<'ctx>,
        indent: usize,
        totals: &ReportTotals,
        verbosity: Verbosity,
        rows: &mut Vec<TreeRow<'ctx>>,
    ) {
        if !is_ignored(node.cc(), verbosity) {
            rows.push(TreeRow {
                ccs: node,
                indent,
                pct_time: pct(node.time_ticks(), totals.total_prof_ticks),
                pct_alloc: pct(node.mem_alloc(), totals.total_alloc),
                pct_inherited_time: pct(node.inherited_ticks(), totals.total_prof_ticks),
                pct_inherited_alloc: pct(node.inherited_alloc(), totals.total_alloc),
            });
        }
        for child in node.children() {
            recurse(child, indent + 1, totals, verbosity, rows);
        }
    }

    recurse(ctx.main_ccs(), 0, totals, verbosity, &mut rows);
    rows
}

/// Counts codepoints, matching spec §4.5's UTF-8 display-width rule
/// ("characters whose first byte is `<0x80` or `>0xBF` each count as one")
/// — exactly the set of bytes that start a Rust `char`, so this is simply
/// the decoded character count.
fn display_width(s: &str) -> usize {
    s.chars().count()
}

fn pad_to(s: &str, width: usize) -> String {
    let len = display_width(s);
    if len >= width {
        s.to_string()
    } else {
        format!("{s}{}", " ".repeat(width - len))
    }
}

fn format_with_commas(n: u64) -> String {
    let digits = n.to_string();
    let bytes = digits.as_bytes();
    let mut out = String::with_capacity(bytes.len() + bytes.len() / 3);
    for (i, b) in bytes.iter().enumerate() {
        if i != 0 && (bytes.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*b as char);
    }
    out
}

fn format_flat_table(rows: &[FlatRow<'_>], verbosity: Verbosity) -> String {
    let show_raw = verbosity.shows_raw_columns();
    let mut cc_w = display_width("COST CENTRE");
    let mut mod_w = display_width("MODULE");
    for row in rows {
        cc_w = cc_w.max(display_width(row.cc.label()));
        mod_w = mod_w.max(display_width(row.cc.module()));
    }

    let mut out = String::new();
    out.push_str(&pad_to("COST CENTRE", cc_w));
    out.push_str("  ");
    out.push_str(&pad_to("MODULE", mod_w));
    out.push_str("  %time  %alloc");
    if show_raw {
        out.push_str("       ticks        bytes");
    }
    out.push('\n');

    for row in rows {
        let cc = row.cc.get();
        out.push_str(&pad_to(cc.label(), cc_w));
        out.push_str("  ");
        out.push_str(&pad_to(cc.module(), mod_w));
        out.push_str(&format!("  {:>5.1}  {:>6.1}", row.pct_time, row.pct_alloc));
        if show_raw {
            out.push_str(&format!(
                "  {:>10}  {:>11}",
                cc.time_ticks(),
                cc.mem_alloc()
            ));
        }
        out.push('\n');
    }
    out
}

fn format_tree_table(rows: &[TreeRow<'_>], verbosity: Verbosity) -> String {
    let show_raw = verbosity.shows_raw_columns();
    let mut cc_w = display_width("COST CENTRE");
    let mut mod_w = display_width("MODULE");
    for row in rows {
        let indented = row.indent + display_width(row.ccs.cc().label());
        cc_w = cc_w.max(indented);
        mod_w = mod_w.max(display_width(row.ccs.cc().module()));
    }

    let mut out = String::new();
    out.push_str(&pad_to("COST CENTRE", cc_w));
    out.push_str("  ");
    out.push_str(&pad_to("MODULE", mod_w));
    out.push_str("   no.  entries  %time  %alloc  %time  %alloc");
    if show_raw {
        out.push_str("       ticks        bytes");
    }
    out.push('\n');

    for row in rows {
        let label = format!("{}{}", " ".repeat(row.indent), row.ccs.cc().label());
        out.push_str(&pad_to(&label, cc_w));
        out.push_str("  ");
        out.push_str(&pad_to(row.ccs.cc().module(), mod_w));
        out.push_str(&format!(
            "  {:>4}  {:>7}  {:>5.1}  {:>6.1}  {:>5.1}  {:>6.1}",
            row.ccs.id(),
            row.ccs.scc_count(),
            row.pct_time,
            row.pct_alloc,
            row.pct_inherited_time,
            row.pct_inherited_alloc,
        ));
        if show_raw {
            out.push_str(&format!(
                "  {:>10}  {:>11}",
                row.ccs.time_ticks(),
                row.ccs.mem_alloc()
            ));
        }
        out.push('\n');
    }
    out
}

/// Runs all six phases in order and formats the final text report (spec
/// §6, "Log file format"). Writing is skipped entirely under
/// `Verbosity::None`.
pub fn format_report(
    ctx: &ProfilerContext,
    header: &ReportHeader,
    totals: &ReportTotals,
    flat_rows: &[FlatRow<'_>],
    tree_rows: &[TreeRow<'_>],
) -> String {
    let config = ctx.config();
    let n_caps = config.n_capabilities.max(1) as f64;
    let total_secs =
        (totals.total_prof_ticks as f64 / n_caps) * config.tick_interval.as_secs_f64();
    let us = config.tick_interval.as_micros();

    let mut out = String::new();
    out.push_str(&format!(
        "{}  Time and Allocation Profiling Report  (Final)\n",
        header.timestamp
    ));
    out.push_str(&format!(
        "          {} +RTS {} -RTS {}\n\n",
        header.program, header.rts_args, header.prog_args
    ));
    out.push_str(&format!(
        "  total time  = {total_secs:.2} secs   ({} ticks @ {us} us, {} processor{})\n",
        totals.total_prof_ticks,
        config.n_capabilities,
        if config.n_capabilities == 1 { "" } else { "s" },
    ));
    out.push_str(&format!(
        "  total alloc = {} bytes  (excludes profiling overheads)\n\n",
        format_with_commas(totals.total_alloc)
    ));
    out.push_str(&format_flat_table(flat_rows, config.verbosity));
    out.push('\n');
    out.push_str(&format_tree_table(tree_rows, config.verbosity));
    out
}

/// Runs the whole pipeline and writes the result to the `.prof` log file
/// opened by [`ProfilerContext::open_prof_log`] (spec §4.5, §6).
///
/// A missing or unwritable log file is a configuration error (spec §7):
/// logged and swallowed, never a panic.
pub fn report(ctx: &ProfilerContext, header: &ReportHeader) -> Result<(), ProfilingError> {
    if !ctx.config().verbosity.reports_at_all() {
        return Ok(());
    }

    let totals = count_ticks(ctx);
    aggregate_cc_costs(ctx);
    let flat_rows = build_flat_report(ctx, &totals);
    inherit_costs(ctx);
    prune_ccs_tree(ctx);
    let tree_rows = build_tree_report(ctx, &totals);

    let text = format_report(ctx, header, &totals, &flat_rows, &tree_rows);

    match ctx.with_prof_file(|file| file.write_all(text.as_bytes())) {
        Some(Ok(())) => Ok(()),
        Some(Err(source)) => {
            tracing::warn!(error = %source, "failed to write profiling report");
            Ok(())
        }
        None => {
            tracing::warn!("report() called with no open .prof log file");
            Ok(())
        }
    }
}
