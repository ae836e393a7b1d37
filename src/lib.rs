//! Cost-centre-stack profiler core.
//!
//! This crate implements the shared parts of a cost-centre-stack (CCS)
//! profiler for a managed-language runtime: a memoised tree of stack nodes
//! built incrementally as mutator threads enter annotated program regions
//! ([`ProfilerContext::push`]), a composition algorithm used when a thunk
//! captured under one stack is forced while a different stack is current
//! ([`ProfilerContext::enter`]), and a shutdown-time reporting pipeline
//! ([`report`]).
//!
//! The design is carried over from the cost-centre-stack profiler embedded
//! in the GHC runtime system (`rts/Profiling.c`), re-expressed with Rust's
//! ownership model in place of a single process-wide C heap: every
//! [`CostCentre`] and [`Ccs`] is owned by exactly one [`ProfilerContext`],
//! which frees them in bulk on drop.

#[cfg(all(feature = "recursion-truncate", feature = "recursion-drop"))]
compile_error!("features \"recursion-truncate\" and \"recursion-drop\" are mutually exclusive");
#[cfg(not(any(feature = "recursion-truncate", feature = "recursion-drop")))]
compile_error!("exactly one of \"recursion-truncate\" or \"recursion-drop\" must be enabled");

mod arena;
mod cc;
mod ccs;
mod compose;
mod config;
mod context;
mod current;
mod error;
mod exception_trace;
mod ids;
mod push;
mod report;
mod selection;

pub use cc::{Builtin, CcHandle, CostCentre};
pub use ccs::{Ccs, CcsHandle};
pub use config::{ProfilerConfig, Selectors, Verbosity};
pub use context::ProfilerContext;
pub use current::CurrentCcsSlot;
pub use error::ProfilingError;
pub use exception_trace::{print_ccs, print_exception_trace, Frame, FrameChain};
pub use ids::{CcId, CcsId};
pub use report::{
    aggregate_cc_costs, build_flat_report, build_tree_report, count_ticks, format_report,
    inherit_costs, prune_ccs_tree, report, FlatRow, ReportHeader, ReportTotals, TreeRow,
};
