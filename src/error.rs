//! Error taxonomy (spec §7).

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProfilingError {
    /// A configuration error: the `.prof`/`.hp` file could not be opened.
    /// Recoverable — per spec §7 the caller logs it and disables the
    /// affected sub-mode, execution continues.
    #[error("failed to open profiling report file {path:?}: {source}")]
    LogFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `§3` tree invariant was violated. These are only ever raised by
    /// internal `debug_assert!`-style checks and should be impossible if
    /// the invariants hold; treat as fatal (spec §7).
    #[error("cost-centre-stack invariant violated: {0}")]
    InvariantViolation(String),
}
