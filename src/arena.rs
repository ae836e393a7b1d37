//! Scoped bump allocator (spec §4.1, component A).
//!
//! All of the profiler's transient strings — log filenames, derived from the
//! program name — are carved out of this arena. The rest of the tree (cost
//! centres and cost-centre-stack nodes) uses its own bulk-leak-and-drop
//! discipline in [`crate::cc`] and [`crate::ccs`]; this arena is deliberately
//! narrow in scope, matching the original's `prof_arena`, which is used the
//! same way (`arenaAlloc(prof_arena, ...)` for `prof_filename`/`hp_filename`
//! in `initProfilingLogFile`).
//!
//! A bump allocator behind a lock rather than thread-local storage because
//! `init()` may run on a different thread than later reporters; the lock is
//! held only for the duration of a single allocation, never across a `push`.

use bumpalo::Bump;
use parking_lot::Mutex;

pub(crate) struct Arena {
    bump: Mutex<Bump>,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Arena {
            bump: Mutex::new(Bump::new()),
        }
    }

    /// Allocates `s` in the arena and hands the copy to `f`, without letting
    /// the reference escape the closure. This keeps every unsafe lifetime
    /// trick out of the arena: the bump allocation and its only use both
    /// happen while the lock is held.
    pub(crate) fn with_str<R>(&self, s: &str, f: impl FnOnce(&str) -> R) -> R {
        let bump = self.bump.lock();
        let copy: &str = bump.alloc_str(s);
        f(copy)
    }

    /// Total bytes currently allocated from this arena (for diagnostics).
    pub(crate) fn allocated_bytes(&self) -> usize {
        self.bump.lock().allocated_bytes()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
