//! Exception trace printer (spec §4.7, component H) and `print_ccs`
//! (spec §6).
//!
//! The real evaluation-frame layout belongs to the host runtime (spec §1,
//! "out of scope... closure/frame layout for exception-trace printing");
//! this module is generic over [`FrameChain`] so it never needs to know
//! that layout.

use crate::ccs::CcsHandle;
use crate::context::ProfilerContext;

const MAX_DEPTH: usize = 10;

/// One step of a walk over a thread's evaluation-frame chain.
pub enum Frame<'ctx> {
    /// An update frame, carrying the CCS that was current when the
    /// corresponding thunk was allocated.
    Update(CcsHandle<'ctx>),
    /// Any other frame kind; skipped.
    Other,
    /// A stack-underflow frame; the chain continues into the previous
    /// stack chunk, which the implementation is expected to splice in
    /// transparently.
    StackUnderflow,
    /// A stop frame: the walk terminates here.
    Stop,
}

/// An iterator-like walk over a thread's evaluation-frame chain, supplied
/// by the host runtime.
///
/// The caller must guarantee the frame chain is not concurrently mutated
/// (e.g. by a moving collector) for the duration of the walk — the same
/// informal contract the original leaves undocumented (spec §9, "Open
/// question"); this crate never reads raw frame memory itself; it only
/// consumes whatever [`Frame`]s the host decodes and hands over.
pub trait FrameChain<'ctx> {
    fn next_frame(&mut self) -> Option<Frame<'ctx>>;
}

/// `print_ccs(stream, ccs)` (spec §6): formats a CCS as
/// `<mod.cc, mod.cc, …>` from top down to (but not including) `MAIN`.
pub fn print_ccs<'ctx>(
    out: &mut impl std::fmt::Write,
    ctx: &'ctx ProfilerContext,
    ccs: CcsHandle<'ctx>,
) -> std::fmt::Result {
    let main_ptr = ctx.main_ccs().ptr;
    let mut parts = Vec::new();
    let mut node = Some(ccs);
    while let Some(n) = node {
        if n.ptr == main_ptr {
            break;
        }
        parts.push(format!("{}.{}", n.cc().module(), n.cc().label()));
        node = n.prev();
    }
    write!(out, "<{}>", parts.join(", "))
}

/// The deepest non-`MAIN` ancestor of `ccs` — the "bottom" of the chain
/// `print_ccs` would render (spec §4.7 step 3).
fn bottom_of<'ctx>(ctx: &'ctx ProfilerContext, ccs: CcsHandle<'ctx>) -> CcsHandle<'ctx> {
    let main_ptr = ctx.main_ccs().ptr;
    let mut node = ccs;
    while let Some(parent) = node.prev() {
        if parent.ptr == main_ptr {
            break;
        }
        node = parent;
    }
    node
}

/// `print_exception_trace(ccs, exception, thread)` (spec §4.7).
pub fn print_exception_trace<'ctx>(
    out: &mut impl std::fmt::Write,
    ctx: &'ctx ProfilerContext,
    ccs: CcsHandle<'ctx>,
    exception_type_name: &str,
    frames: &mut impl FrameChain<'ctx>,
) -> std::fmt::Result {
    writeln!(out, "*** Exception '{exception_type_name}'")?;
    print_ccs(out, ctx, ccs)?;
    writeln!(out)?;

    // `is_caf` gates the walk exactly as `fprintCCS_stderr`'s `for (; is_caf
    // && depth < MAX_DEPTH; depth++)` does: it is recomputed after every
    // newly printed CCS from that CCS's own bottom, so the walk halts the
    // moment it reaches a call chain that does not bottom in a CAF, not
    // just once up front.
    let mut is_caf = bottom_of(ctx, ccs).cc().label_starts_with_caf();

    let main_ptr = ctx.main_ccs().ptr;
    let mut prev_ccs = ccs;
    let mut hops = 0usize;
    while is_caf && hops < MAX_DEPTH {
        match frames.next_frame() {
            Some(Frame::Update(frame_ccs)) => {
                hops += 1;
                if frame_ccs.ptr == main_ptr {
                    break;
                }
                if frame_ccs.ptr == prev_ccs.ptr {
                    // Same stack as last time: probably library code with
                    // nothing new accumulated since the last update frame.
                    continue;
                }
                prev_ccs = frame_ccs;
                write!(out, "--> evaluated by: ")?;
                print_ccs(out, ctx, frame_ccs)?;
                writeln!(out)?;
                is_caf = bottom_of(ctx, frame_ccs).cc().label_starts_with_caf();
            }
            Some(Frame::Other) | Some(Frame::StackUnderflow) => {
                hops += 1;
            }
            Some(Frame::Stop) | None => break,
        }
    }
    Ok(())
}
