//! [`ProfilerContext`]: owns the cost-centre registry, the CCS tree, the
//! built-in bootstrap table, and the single tree-wide lock (spec §3,
//! "ProfilerContext"; spec §5, "Concurrency model"; spec §6, "init/init2").
//!
//! Mirrors the teacher crate's `Gc`/arena bulk-ownership discipline
//! (`gc/src/gc.rs`): every `CostCentre` and `Ccs` is `Box::leak`ed once and
//! freed in bulk when the owning context is dropped, never individually.

use std::fs::File;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::cc::{Builtin, CcHandle, CostCentre, Registry};
use crate::ccs::{Ccs, CcsHandle, IndexEntry};
use crate::config::ProfilerConfig;
use crate::error::ProfilingError;
use crate::ids::{CcsId, IdSource};
use crate::arena::Arena;

static NEXT_CTX_ID: AtomicU64 = AtomicU64::new(1);

/// The seven built-in cost centres and their CCS nodes (spec §3). Stored as
/// plain `NonNull` arrays, not `CcHandle`/`CcsHandle` tables, so that
/// `ProfilerContext` does not become self-referential; accessor methods
/// synthesize a handle borrowed from `&self` on every call.
struct Builtins {
    cc: [NonNull<CostCentre>; 7],
    ccs: [NonNull<Ccs>; 7],
}

// SAFETY: every pointer is owned by the enclosing `ProfilerContext` and
// freed only in its `Drop` impl; the table is never mutated after `init2`.
unsafe impl Send for Builtins {}
unsafe impl Sync for Builtins {}

struct LogState {
    prof_path: Option<PathBuf>,
    prof_file: Option<File>,
    hp_path: Option<PathBuf>,
    hp_file: Option<File>,
}

/// The profiler's single process-wide (well, single-`ProfilerContext`-wide)
/// piece of mutable state (spec §3: "Exactly one `ProfilerContext` exists
/// per running program").
pub struct ProfilerContext {
    id: u64,
    registry: Registry,
    ids_ccs: IdSource,
    /// Spec §5: "a single process-wide lock... taken only on the slow path
    /// of `push` and for the whole duration of `enter`".
    tree_lock: Mutex<()>,
    all_ccs: Mutex<Vec<NonNull<Ccs>>>,
    all_index_entries: Mutex<Vec<NonNull<IndexEntry>>>,
    builtins: Builtins,
    arena: Arena,
    config: RwLock<ProfilerConfig>,
    log: Mutex<LogState>,
}

// SAFETY: every field is itself `Sync` (the `Registry`'s internal `Mutex`,
// plain atomics, `Builtins` per the justification above, `Arena`'s
// `Mutex<Bump>`), so sharing a `&ProfilerContext` across threads is sound.
unsafe impl Sync for ProfilerContext {}

impl ProfilerContext {
    /// Spec §6, `init()`: allocates the seven built-in CCs/CCSs, each
    /// initially its own root with no parent, exactly as `CC_DECLARE`/
    /// `CCS_DECLARE` leave them before `init2` runs.
    pub fn init(config: ProfilerConfig) -> Self {
        let id = NEXT_CTX_ID.fetch_add(1, Ordering::Relaxed);
        let registry = Registry::new();
        let ids_ccs = IdSource::new();
        let mut all_ccs = Vec::with_capacity(Builtin::ALL.len());
        let mut cc_ptrs = Vec::with_capacity(Builtin::ALL.len());
        let mut ccs_ptrs = Vec::with_capacity(Builtin::ALL.len());

        for which in Builtin::ALL {
            let (label, module) = which.label_module();
            let cc_ptr = registry
                .declare(id, label, module, "<built-in>", false, Some(which))
                .ptr;

            let ccs_id = CcsId(ids_ccs.next());
            // `root` is a placeholder until `patch_root` below; never
            // observed in between since construction is single-threaded.
            let ccs_box = Box::new(Ccs::new(ccs_id, id, cc_ptr, None, NonNull::dangling(), 0));
            let ccs_ptr = NonNull::from(Box::leak(ccs_box));
            // SAFETY: `ccs_ptr` was just created and is not yet reachable
            // from any other thread.
            unsafe { ccs_ptr.as_ref().patch_root(ccs_ptr) };

            all_ccs.push(ccs_ptr);
            cc_ptrs.push(cc_ptr);
            ccs_ptrs.push(ccs_ptr);
        }

        tracing::debug!(ctx_id = id, "profiler context initialized");

        ProfilerContext {
            id,
            registry,
            ids_ccs,
            tree_lock: Mutex::new(()),
            all_ccs: Mutex::new(all_ccs),
            all_index_entries: Mutex::new(Vec::new()),
            builtins: Builtins {
                cc: cc_ptrs.try_into().unwrap_or_else(|_| {
                    unreachable!("Builtin::ALL has exactly 7 elements")
                }),
                ccs: ccs_ptrs.try_into().unwrap_or_else(|_| {
                    unreachable!("Builtin::ALL has exactly 7 elements")
                }),
            },
            arena: Arena::new(),
            config: RwLock::new(config),
            log: Mutex::new(LogState {
                prof_path: None,
                prof_file: None,
                hp_path: None,
                hp_file: None,
            }),
        }
    }

    /// Spec §6, `init2()`: re-parents every built-in CCS except `MAIN` under
    /// `MAIN`, so that the flat and tree reports always show a single
    /// connected tree. Run once, after dynamic code loading completes.
    pub fn init2(&self) {
        let main_idx = Builtin::ALL
            .iter()
            .position(|b| *b == Builtin::Main)
            .expect("Builtin::Main is always present");
        let main_ccs = self.builtins.ccs[main_idx];

        let _guard = self.tree_lock.lock();
        for (i, which) in Builtin::ALL.iter().enumerate() {
            if *which == Builtin::Main {
                continue;
            }
            let ccs_ptr = self.builtins.ccs[i];
            let cc_ptr = self.builtins.cc[i];
            // SAFETY: `init2` runs once, single-threaded, before the
            // context is shared with mutator threads. `root` is
            // deliberately left untouched, matching the original's
            // `actualPush_(...)` followed by an explicit `ccs->root = ccs`
            // override in `initProfiling2`.
            unsafe {
                ccs_ptr.as_ref().patch_prev_and_depth(Some(main_ccs), 1);
            }
            let entry = self.alloc_index_entry(cc_ptr, ccs_ptr, false);
            // SAFETY: `main_ccs` outlives this call; the tree lock is held.
            unsafe { main_ccs.as_ref().push_entry(entry) };
        }
        tracing::debug!(ctx_id = self.id, "built-in cost centres re-parented under MAIN");
    }

    /// Spec §6, `free()`: explicit, named teardown, matching the original's
    /// `freeProfiling()`. Equivalent to dropping the context, spelled out so
    /// callers porting from the C API have a direct analogue.
    pub fn free(self) {
        drop(self);
    }

    pub(crate) fn ctx_id(&self) -> u64 {
        self.id
    }

    pub(crate) fn tree_lock(&self) -> &Mutex<()> {
        &self.tree_lock
    }

    pub(crate) fn arena(&self) -> &Arena {
        &self.arena
    }

    pub(crate) fn alloc_ccs(
        &self,
        cc: NonNull<CostCentre>,
        prev: Option<NonNull<Ccs>>,
        root: NonNull<Ccs>,
        depth: u32,
    ) -> NonNull<Ccs> {
        let id = CcsId(self.ids_ccs.next());
        let ccs = Box::new(Ccs::new(id, self.id, cc, prev, root, depth));
        let ptr = NonNull::from(Box::leak(ccs));
        self.all_ccs.lock().push(ptr);
        ptr
    }

    pub(crate) fn alloc_index_entry(
        &self,
        cc: NonNull<CostCentre>,
        ccs: NonNull<Ccs>,
        back_edge: bool,
    ) -> NonNull<IndexEntry> {
        let entry = Box::new(IndexEntry {
            cc,
            ccs,
            back_edge,
            next: std::ptr::null_mut(),
        });
        let ptr = NonNull::from(Box::leak(entry));
        self.all_index_entries.lock().push(ptr);
        ptr
    }

    /// Declares a brand-new, non-built-in cost centre (spec §4.2).
    pub fn declare_cost_centre(
        &self,
        label: &str,
        module: &str,
        srcloc: &str,
        is_caf: bool,
    ) -> CcHandle<'_> {
        self.registry.declare(self.id, label, module, srcloc, is_caf, None)
    }

    pub(crate) fn registered_ccs(&self) -> Vec<CcHandle<'_>> {
        self.registry.all()
    }

    pub fn builtin_cc(&self, which: Builtin) -> CcHandle<'_> {
        let idx = Builtin::ALL.iter().position(|b| *b == which).unwrap();
        CcHandle {
            ptr: self.builtins.cc[idx],
            _marker: PhantomData,
        }
    }

    pub fn builtin_ccs(&self, which: Builtin) -> CcsHandle<'_> {
        let idx = Builtin::ALL.iter().position(|b| *b == which).unwrap();
        CcsHandle {
            ptr: self.builtins.ccs[idx],
            _marker: PhantomData,
        }
    }

    /// The root of the cost-centre-stack tree (spec §3: "`CCS_MAIN` is the
    /// root of the tree").
    pub fn main_ccs(&self) -> CcsHandle<'_> {
        self.builtin_ccs(Builtin::Main)
    }

    pub fn config(&self) -> ProfilerConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, new: ProfilerConfig) {
        *self.config.write() = new;
    }

    /// Opens the `.prof` report file (spec §6, "Configuration"). Failure is
    /// recoverable: callers should log the error and continue with
    /// profiling disabled rather than abort the program (spec §7).
    pub fn open_prof_log(&self, program_name: &str) -> Result<(), ProfilingError> {
        let stem = strip_exe_suffix(program_name);
        let path = self.arena.with_str(&format!("{stem}.prof"), PathBuf::from);
        let file = File::create(&path).map_err(|source| ProfilingError::LogFileOpen {
            path: path.clone(),
            source,
        })?;
        let mut log = self.log.lock();
        log.prof_path = Some(path);
        log.prof_file = Some(file);
        Ok(())
    }

    pub fn open_hp_log(&self, program_name: &str) -> Result<(), ProfilingError> {
        let stem = strip_exe_suffix(program_name);
        let path = self.arena.with_str(&format!("{stem}.hp"), PathBuf::from);
        let file = File::create(&path).map_err(|source| ProfilingError::LogFileOpen {
            path: path.clone(),
            source,
        })?;
        let mut log = self.log.lock();
        log.hp_path = Some(path);
        log.hp_file = Some(file);
        Ok(())
    }

    pub(crate) fn with_prof_file<R>(&self, f: impl FnOnce(&mut File) -> R) -> Option<R> {
        let mut log = self.log.lock();
        log.prof_file.as_mut().map(f)
    }

    pub(crate) fn with_hp_file<R>(&self, f: impl FnOnce(&mut File) -> R) -> Option<R> {
        let mut log = self.log.lock();
        log.hp_file.as_mut().map(f)
    }
}

/// Spec §6, "Log file format": "On Windows the `.exe` suffix is stripped
/// from `<program>` before composing filenames." Applied unconditionally
/// rather than gated on `cfg(windows)` — a program name ending in `.exe`
/// handed in on a non-Windows host (e.g. a cross-built binary name) should
/// strip the same way, and the original only special-cases the suffix
/// text, not the host.
fn strip_exe_suffix(program_name: &str) -> &str {
    program_name.strip_suffix(".exe").unwrap_or(program_name)
}

#[cfg(test)]
mod tests {
    use super::strip_exe_suffix;

    #[test]
    fn strips_exe_suffix() {
        assert_eq!(strip_exe_suffix("myprog.exe"), "myprog");
        assert_eq!(strip_exe_suffix("myprog"), "myprog");
        assert_eq!(strip_exe_suffix("my.exe.exe"), "my.exe");
    }
}

impl Drop for ProfilerContext {
    fn drop(&mut self) {
        for ptr in self.all_index_entries.get_mut().drain(..) {
            // SAFETY: every pointer was produced by `alloc_index_entry` and
            // is dropped at most once, here.
            unsafe {
                drop(Box::from_raw(ptr.as_ptr()));
            }
        }
        for ptr in self.all_ccs.get_mut().drain(..) {
            // SAFETY: every pointer was produced by `alloc_ccs`/`init` and
            // is dropped at most once, here, after all index entries (which
            // may reference `Ccs` nodes) have already been freed.
            unsafe {
                drop(Box::from_raw(ptr.as_ptr()));
            }
        }
        // `registry`'s own `Drop` frees the `CostCentre`s, including the
        // built-ins, which were registered through it in `init`.
    }
}
