// Incremental garbage collector, modeled on Lua 5.1's lgc.c
//
// Tri-color mark & sweep driven by allocation debt:
// - Objects are created with the current white
// - Propagate: gray objects are traversed one at a time and turned black
// - Atomic: roots are re-marked, gray-again objects re-traversed, weak tables
//   cleared and unreachable finalizable objects separated; then the white flips
// - Sweep: objects still carrying the old white are freed, survivors recolored
// - Finalize: separated objects get their finalizer called, once
//
// GC States:
// - Pause: between cycles
// - Propagate: marking objects (interruptible)
// - Atomic: finishes marking (never interrupted)
// - SweepStrings / SweepObjects / SweepFinObj: sweeping each list (interruptible)
// - Finalize: calling finalizers
//
// Tri-color invariant: black objects never point to white objects, except
// tables, which may point to white objects through the gray-again list

mod barrier;
mod finalizer;
mod gc_error;
mod gc_header;
mod gc_id;
mod gc_object;
mod gc_option;
mod mark;
mod mutator;
mod object_allocator;
mod object_pool;
mod roots;
mod string_interner;
mod sweep;
mod weak;

use ahash::RandomState;
use std::collections::{HashMap, VecDeque};

pub use finalizer::Finalizer;
pub use gc_error::{GcError, GcResult};
pub use gc_header::*;
pub use gc_id::*;
pub use gc_object::*;
pub use gc_option::GcOption;
pub use object_pool::ObjectPool;
pub use roots::RootEnumerator;
pub use weak::WeakMode;

use string_interner::StringInterner;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bytes of allocation "paid" by one automatic step (GCSTEPSIZE in lgc.h)
pub const GCSTEPSIZE: usize = 1024;
/// Objects swept per step
pub const GCSWEEPMAX: usize = 40;
/// Work charged per swept object
pub const GCSWEEPCOST: isize = 10;
/// Work charged per finalizer call
pub const GCFINALIZECOST: isize = 100;

/// GC state machine
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GcState {
    Pause = 0,
    Propagate = 1,
    Atomic = 2,
    SweepStrings = 3,
    SweepObjects = 4,
    SweepFinObj = 5,
    Finalize = 6,
}

impl GcState {
    /// Check if in sweep phase
    pub fn is_sweep_phase(self) -> bool {
        matches!(
            self,
            GcState::SweepStrings | GcState::SweepObjects | GcState::SweepFinObj
        )
    }

    /// Check if must keep invariant (black cannot point to white)
    pub fn keep_invariant(self) -> bool {
        matches!(self, GcState::Propagate | GcState::Atomic)
    }
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GcStats {
    pub collection_count: usize,
    pub full_collections: usize,
    pub emergency_collections: usize,
    pub objects_collected: usize,
    pub bytes_allocated: usize,
    pub bytes_freed: usize,
    pub finalizers_run: usize,
    pub finalizer_errors: usize,
    pub weak_entries_cleared: usize,
}

/// `collectgarbage` style control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcCommand {
    /// Full collection cycle
    Collect,
    Stop,
    Restart,
    /// Heap size in KiB
    Count,
    /// Heap size in bytes
    CountBytes,
    /// Perform collection work worth the given KiB of allocation
    Step(usize),
    SetPause(usize),
    SetStepMul(usize),
    IsRunning,
}

/// Garbage Collector
///
/// Owns every collectable object of one heap together with the mutator
/// state the collector needs as roots. Nothing here is shared between
/// threads; callers serialize access through `&mut GC`.
pub struct GC {
    pub(crate) pool: ObjectPool,
    pub(crate) strings: StringInterner,

    // === Object lists ===
    /// Interned strings
    pub(crate) all_strings: Vec<GcId>,
    /// Every other object without a pending finalizer
    pub(crate) all_objects: Vec<GcId>,
    /// Objects with a finalizer that has not run yet
    pub(crate) finobj: Vec<GcId>,
    /// Unreachable objects waiting for their finalizer
    pub(crate) tobefnz: VecDeque<GcId>,
    pub(crate) finalizers: HashMap<GcId, Finalizer, RandomState>,

    // === Gray lists (for marking) ===
    /// Regular gray objects waiting to be visited
    pub(crate) gray: Vec<GcId>,
    /// Objects to be revisited at atomic phase
    pub(crate) grayagain: Vec<GcId>,
    /// Weak tables seen during this cycle
    pub(crate) weak: Vec<GcId>,
    /// Scratch buffer for outgoing references
    trace_buf: Vec<GcId>,

    // === Sweep state ===
    /// Position in the list being swept
    pub(crate) sweep_index: usize,

    // === GC state ===
    pub(crate) gc_state: GcState,
    /// current white color (0 or 1, flips each cycle)
    pub(crate) current_white: u8,
    /// GC stopped by user
    pub(crate) gc_stopped: bool,
    /// Finalizer running: no steps, no emergency collections
    pub(crate) in_finalizer: bool,

    // === Debt and memory tracking ===
    pub(crate) total_bytes: usize,
    pub(crate) threshold: usize,
    /// How much the collector lags behind the allocator
    pub(crate) gc_debt: usize,
    pub(crate) option: GcOption,

    pub(crate) finalizer_errors: Vec<GcError>,
    pub(crate) stats: GcStats,

    // === Mutator state (roots) ===
    pub(crate) main_thread: GcId,
    pub(crate) registry: GcId,
    pub(crate) type_metatables: [Option<GcId>; GcObjectKind::COUNT],
    pub(crate) pinned: HashMap<GcId, usize, RandomState>,
    pub(crate) root_sources: Vec<Box<dyn RootEnumerator>>,
    /// Objects held by an allocating call while it may trigger a step
    pub(crate) anchors: Vec<GcId>,
    /// The fixed "__mode" string
    pub(crate) tm_mode: GcId,
}

impl GC {
    pub fn new() -> Self {
        Self::with_option(GcOption::default())
    }

    pub fn with_option(option: GcOption) -> Self {
        let mut gc = GC {
            pool: ObjectPool::new(),
            strings: StringInterner::new(),
            all_strings: Vec::with_capacity(256),
            all_objects: Vec::with_capacity(256),
            finobj: Vec::new(),
            tobefnz: VecDeque::new(),
            finalizers: HashMap::with_hasher(RandomState::new()),
            gray: Vec::with_capacity(128),
            grayagain: Vec::with_capacity(64),
            weak: Vec::new(),
            trace_buf: Vec::with_capacity(64),
            sweep_index: 0,
            gc_state: GcState::Pause,
            current_white: 0,
            gc_stopped: false,
            in_finalizer: false,
            total_bytes: 0,
            threshold: usize::MAX,
            gc_debt: 0,
            option,
            finalizer_errors: Vec::new(),
            stats: GcStats::default(),
            main_thread: GcId::default(),
            registry: GcId::default(),
            type_metatables: [None; GcObjectKind::COUNT],
            pinned: HashMap::with_hasher(RandomState::new()),
            root_sources: Vec::new(),
            anchors: Vec::new(),
            tm_mode: GcId::default(),
        };

        gc.main_thread = gc.link_object(GcObject::empty(GcObjectKind::Thread), None);
        gc.registry = gc.link_object(GcObject::empty(GcObjectKind::Table), None);
        gc.tm_mode = gc.intern_unchecked("__mode");
        gc.fix(gc.tm_mode);

        // like lua_newstate: first cycle starts at 4x the initial heap
        gc.threshold = gc
            .option
            .initial_threshold
            .max(gc.total_bytes.saturating_mul(4));
        gc
    }

    // ============ Accessors ============

    /// Current heap size in bytes
    #[inline]
    pub fn byte_count(&self) -> usize {
        self.total_bytes
    }

    /// Byte count at which the next automatic step runs
    #[inline]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[inline]
    pub fn gc_debt(&self) -> usize {
        self.gc_debt
    }

    #[inline]
    pub fn gc_state(&self) -> GcState {
        self.gc_state
    }

    #[inline]
    pub fn current_white(&self) -> u8 {
        self.current_white
    }

    /// Get current GC statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    pub fn option(&self) -> &GcOption {
        &self.option
    }

    pub fn is_running(&self) -> bool {
        !self.gc_stopped
    }

    pub fn is_alive(&self, id: GcId) -> bool {
        self.pool.is_valid(id)
    }

    pub fn color(&self, id: GcId) -> Option<GcColor> {
        self.pool.header(id).map(GcHeader::color)
    }

    pub fn kind(&self, id: GcId) -> Option<GcObjectKind> {
        self.pool.get(id).map(GcSlot::kind)
    }

    pub fn object(&self, id: GcId) -> Option<&GcObject> {
        self.pool.get(id).map(|s| &s.object)
    }

    /// Number of live objects in the heap
    pub fn object_count(&self) -> usize {
        self.pool.len()
    }

    /// Number of objects waiting for their finalizer
    pub fn pending_finalizers(&self) -> usize {
        self.tobefnz.len()
    }

    // ============ Tunables ============

    /// Set the pause (percent); returns the previous value
    pub fn set_pause(&mut self, pause: usize) -> usize {
        std::mem::replace(&mut self.option.pause, pause)
    }

    /// Set the step multiplier (percent); returns the previous value
    pub fn set_step_multiplier(&mut self, step_mul: usize) -> usize {
        std::mem::replace(&mut self.option.step_mul, step_mul)
    }

    /// Prevent automatic steps. A cycle in progress stays where it is.
    pub fn stop(&mut self) {
        self.gc_stopped = true;
    }

    /// Re-enable automatic steps; the next allocation pays for collection work
    pub fn restart(&mut self) {
        self.gc_stopped = false;
        self.threshold = self.total_bytes;
    }

    // ============ Core GC Implementation ============

    /// Allocation-driven check (luaC_checkGC)
    #[inline]
    pub(crate) fn check_gc(&mut self) {
        if self.total_bytes >= self.threshold && !self.gc_stopped && !self.in_finalizer {
            self.luac_step();
        }
    }

    /// Port of Lua 5.1's luaC_step:
    /// ```c
    /// void luaC_step (lua_State *L) {
    ///   global_State *g = G(L);
    ///   l_mem lim = (GCSTEPSIZE/100) * g->gcstepmul;
    ///   if (lim == 0)
    ///     lim = (MAX_LUMEM-1)/2;  /* no limit */
    ///   g->gcdept += g->totalbytes - g->GCthreshold;
    ///   do {
    ///     lim -= singlestep(L);
    ///     if (g->gcstate == GCSpause)
    ///       break;
    ///   } while (lim > 0);
    ///   if (g->gcstate != GCSpause) {
    ///     if (g->gcdept < GCSTEPSIZE)
    ///       g->GCthreshold = g->totalbytes + GCSTEPSIZE;
    ///     else {
    ///       g->gcdept -= GCSTEPSIZE;
    ///       g->GCthreshold = g->totalbytes;
    ///     }
    ///   }
    ///   else {
    ///     setthreshold(g);
    ///   }
    /// }
    /// ```
    fn luac_step(&mut self) {
        let mut lim = (GCSTEPSIZE / 100).saturating_mul(self.option.step_mul) as isize;
        if lim <= 0 {
            lim = isize::MAX / 2;
        }
        self.gc_debt = self
            .gc_debt
            .saturating_add(self.total_bytes.saturating_sub(self.threshold));

        loop {
            lim -= self.single_step();
            if self.gc_state == GcState::Pause || lim <= 0 {
                break;
            }
        }

        if self.gc_state != GcState::Pause {
            if self.gc_debt < GCSTEPSIZE {
                self.threshold = self.total_bytes.saturating_add(GCSTEPSIZE);
            } else {
                self.gc_debt -= GCSTEPSIZE;
                self.threshold = self.total_bytes;
            }
        } else {
            self.set_threshold();
        }
        log::trace!(
            "gc step: state={:?} total={} threshold={} debt={}",
            self.gc_state,
            self.total_bytes,
            self.threshold,
            self.gc_debt
        );
    }

    /// Run single steps until at least `budget` work units are consumed or
    /// the cycle reaches Pause. Returns the work consumed.
    pub fn step(&mut self, budget: isize) -> isize {
        if self.in_finalizer {
            return 0;
        }
        let mut consumed = 0;
        loop {
            consumed += self.single_step();
            if self.gc_state == GcState::Pause || consumed >= budget {
                break;
            }
        }
        if self.gc_state == GcState::Pause {
            self.set_threshold();
        }
        consumed
    }

    /// Single GC step (singlestep)
    fn single_step(&mut self) -> isize {
        match self.gc_state {
            GcState::Pause => {
                self.restart_collection();
                1
            }
            GcState::Propagate => {
                if self.gray.is_empty() {
                    self.atomic()
                } else {
                    self.propagate_mark()
                }
            }
            GcState::Atomic => self.atomic(),
            GcState::SweepStrings | GcState::SweepObjects | GcState::SweepFinObj => {
                self.sweep_step()
            }
            GcState::Finalize => {
                let work = self.run_pending_finalizers();
                self.gc_state = GcState::Pause;
                self.gc_debt = 0;
                log::debug!(
                    "gc cycle {} finished: {} bytes in use, {} objects",
                    self.stats.collection_count,
                    self.total_bytes,
                    self.pool.len()
                );
                work
            }
        }
    }

    /// Mark root set and reset all gray lists, to start a new collection
    fn restart_collection(&mut self) {
        self.stats.collection_count += 1;
        self.gray.clear();
        self.grayagain.clear();
        self.weak.clear();
        self.sweep_index = 0;
        self.gc_state = GcState::Propagate;
        log::debug!(
            "gc cycle {} started: {} bytes in use",
            self.stats.collection_count,
            self.total_bytes
        );
        self.mark_roots();
    }

    /// Atomic phase: finish marking, clear weak tables, separate
    /// finalizable garbage and flip the white. Never interrupted.
    fn atomic(&mut self) -> isize {
        self.gc_state = GcState::Atomic;
        let mut work = 0;

        // roots may have changed since the cycle started
        self.mark_roots();
        work += self.propagate_all();

        // weak tables visited so far are traversed again
        let weak = std::mem::take(&mut self.weak);
        self.gray.extend(weak);
        work += self.propagate_all();

        // objects blackened and then mutated
        let grayagain = std::mem::take(&mut self.grayagain);
        self.gray.extend(grayagain);
        work += self.propagate_all();

        let weak_count = self.weak.len();
        self.clear_weak_tables(0);

        // finalizable garbage, and everything it references, lives one more cycle
        let separated = self.separate_finalizable();
        self.mark_being_finalized();
        work += self.propagate_all();
        // weak tables reached only from objects being finalized
        self.clear_weak_tables(weak_count);

        #[cfg(debug_assertions)]
        if let Err(e) = self.check_invariant() {
            panic!("{}", e);
        }

        log::debug!(
            "gc atomic: {} weak tables, {} objects to finalize",
            self.weak.len(),
            separated
        );

        self.current_white = GcHeader::otherwhite(self.current_white);
        self.weak.clear();
        self.grayagain.clear();
        self.enter_sweep();
        work.max(1)
    }

    fn enter_sweep(&mut self) {
        self.gc_state = GcState::SweepStrings;
        self.sweep_index = 0;
    }

    /// Recompute the threshold after a cycle (setthreshold)
    fn set_threshold(&mut self) {
        self.threshold = (self.total_bytes / 100).saturating_mul(self.option.pause);
    }

    /// Full collection (luaC_fullgc)
    ///
    /// A mark in progress is abandoned: its lists are dropped and the heap is
    /// swept without a white flip, which recolors objects but frees nothing.
    /// Then whole cycles run until one finishes without calling a finalizer,
    /// so objects whose finalizer ran are reclaimed before returning and a
    /// second call frees nothing. Finalizers that keep creating finalizable
    /// garbage keep the collection going.
    pub fn full_collect(&mut self) {
        if self.in_finalizer {
            return;
        }
        self.stats.full_collections += 1;
        let before = self.total_bytes;

        if matches!(self.gc_state, GcState::Pause | GcState::Propagate) {
            self.gray.clear();
            self.grayagain.clear();
            self.weak.clear();
            self.enter_sweep();
        }
        // finish any pending sweep and finalization
        self.run_until_pause();

        loop {
            let finalized = self.stats.finalizers_run;
            self.run_until_pause();
            if self.stats.finalizers_run == finalized && self.tobefnz.is_empty() {
                break;
            }
        }

        self.set_threshold();
        log::debug!(
            "full gc: {} -> {} bytes, threshold {}",
            before,
            self.total_bytes,
            self.threshold
        );
    }

    /// Run single steps until the state machine is back in Pause
    fn run_until_pause(&mut self) {
        loop {
            self.single_step();
            if self.gc_state == GcState::Pause {
                break;
            }
        }
    }

    /// `collectgarbage` entry point (lua_gc)
    pub fn collect_garbage(&mut self, cmd: GcCommand) -> usize {
        match cmd {
            GcCommand::Collect => {
                self.full_collect();
                0
            }
            GcCommand::Stop => {
                self.stop();
                0
            }
            GcCommand::Restart => {
                self.restart();
                0
            }
            GcCommand::Count => self.total_bytes >> 10,
            GcCommand::CountBytes => self.total_bytes,
            GcCommand::Step(kib) => self.collect_step(kib),
            GcCommand::SetPause(pause) => self.set_pause(pause),
            GcCommand::SetStepMul(step_mul) => self.set_step_multiplier(step_mul),
            GcCommand::IsRunning => usize::from(self.is_running()),
        }
    }

    /// LUA_GCSTEP: pretend `kib` KiB were allocated and pay for them.
    /// Returns 1 if a cycle finished.
    fn collect_step(&mut self, kib: usize) -> usize {
        if self.in_finalizer {
            return 0;
        }
        let bytes = kib.saturating_mul(1024);
        self.threshold = self.total_bytes.saturating_sub(bytes);
        let mut finished = 0;
        while self.threshold <= self.total_bytes {
            self.luac_step();
            if self.gc_state == GcState::Pause {
                finished = 1;
                break;
            }
        }
        finished
    }
}

impl Default for GC {
    fn default() -> Self {
        Self::new()
    }
}
