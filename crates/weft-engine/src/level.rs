//! Level: the evaluator frame, and the cooperative stack the trampoline
//! drives (spec.md §3.5, §4.F).
//!
//! A Level is deliberately a plain struct rather than anything on the Rust
//! call stack — per Design Notes §9 the trampoline is an explicit state
//! machine, and Levels are its only notion of "frame". `push_level`/
//! `drop_level` acquire and release the transient read-only hold on a feed
//! array, matching the teacher's "acquire on entry, release on drop" RAII
//! idiom (`guard.rs`'s `Guard`), specialized here to the feed-array case.

use bitflags::bitflags;
use std::collections::HashMap;

use weft_core::{Cell, CoreResult, Leader, StubArena, StubId};

use crate::binding::Specifier;
use crate::context;
use crate::fulfill::RefineState;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LevelFlags: u16 {
        /// A native currently executing in this Level masks halt signals
        /// for a critical section (spec.md §5).
        const UNINTERRUPTIBLE = 0b0000_0001;
        /// The Level's VarList has been reified (args moved off the chunk
        /// stack into real cell storage).
        const REIFIED         = 0b0000_0010;
        /// A second pass re-walking parameters out of order (spec.md §4.G);
        /// while set, the GC traces the whole arg range, not just up to the
        /// cursor.
        const DOING_PICKUPS   = 0b0000_0100;
        /// The dispatcher asked the spare cell to be the next value
        /// consumed (user-visible EVAL, spec.md §4.G).
        const RE_EVALUATE     = 0b0000_1000;
        /// A deferred infix lookahead is outstanding on this Level.
        const DEFERRED_INFIX  = 0b0001_0000;
        /// A throw is currently unwinding through this Level.
        const THROWN          = 0b0010_0000;
    }
}

/// The evaluator's input: either an array walked by index, or a pending
/// queue of already-evaluated values — the idiomatic replacement for the
/// spec's "C varargs terminated by a sentinel" path (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    Array { array: StubId, index: usize },
    Variadic { pending: Vec<Cell>, index: usize },
}

impl Feed {
    pub fn source_array(&self) -> Option<StubId> {
        match self {
            Feed::Array { array, .. } => Some(*array),
            Feed::Variadic { .. } => None,
        }
    }
}

/// Counted read-only locks, keyed by Stub (spec.md §5: "read-only holds are
/// counted, not boolean, so nested reads compose"). `Leader::HELD` tracks
/// only "count > 0"; the count itself lives here since it's an
/// evaluator-level bookkeeping concern, not a property of the Stub itself.
#[derive(Debug, Default)]
pub struct Holds {
    counts: HashMap<StubId, u32>,
}

impl Holds {
    pub fn new() -> Self {
        Holds::default()
    }

    pub fn acquire(&mut self, arena: &mut StubArena, id: StubId) -> CoreResult<()> {
        let count = self.counts.entry(id).or_insert(0);
        *count += 1;
        if *count == 1 {
            arena.get_mut(id)?.leader_mut().insert(Leader::HELD);
        }
        Ok(())
    }

    pub fn release(&mut self, arena: &mut StubArena, id: StubId) -> CoreResult<()> {
        if let Some(count) = self.counts.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&id);
                arena.get_mut(id)?.leader_mut().remove(Leader::HELD);
            }
        }
        Ok(())
    }

    pub fn count(&self, id: StubId) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Testable property #4 ("hold balance"): no holds should outlive the
    /// level stack they were taken for.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[derive(Debug)]
pub struct Level {
    pub spare: Cell,
    pub flags: LevelFlags,
    pub data_stack_base: usize,
    pub out: Cell,
    pub feed: Feed,
    pub specifier: Specifier,
    /// Cached current value read from the feed, refreshed each step.
    pub current: Option<Cell>,
    /// Cached lookup result for `current`, invalidated whenever `current`
    /// changes (spec.md §3.5 "cached gotten lookup").
    pub gotten: Option<crate::binding::Resolved>,
    /// The action's original (un-adapted) Details identity.
    pub original: Option<StubId>,
    /// The phase currently executing, for composed actions.
    pub phase: Option<StubId>,
    /// Reified argument storage; `None` until reification (spec.md §3.5).
    pub varlist: Option<StubId>,
    pub rootvar: usize,
    pub param_cursor: usize,
    pub arg_cursor: usize,
    pub special_cursor: usize,
    pub refine_state: Option<RefineState>,
    /// The cell index a pending deferred-infix lookahead targets.
    pub deferred_infix_cell: Option<usize>,
    /// A throw unwinding through this Level, set by the trampoline on the
    /// new top Level after popping the one that raised it; `flags` carries
    /// `THROWN` for as long as this is `Some` (spec.md §4.H). The next
    /// dispatch step either catches it (clearing both) or re-raises it.
    pub pending_throw: Option<crate::fail::Thrown>,
    /// Debug-only monotonic tick (spec.md §3.5 "debug builds also carry a
    /// monotonic tick").
    #[cfg(debug_assertions)]
    pub tick: u64,
}

impl Level {
    pub fn new(feed: Feed, specifier: Specifier, data_stack_base: usize) -> Self {
        Level {
            spare: Cell::poisoned(),
            flags: LevelFlags::empty(),
            data_stack_base,
            out: Cell::poisoned(),
            feed,
            specifier,
            current: None,
            gotten: None,
            original: None,
            phase: None,
            varlist: None,
            rootvar: 0,
            param_cursor: 0,
            arg_cursor: 0,
            special_cursor: 0,
            refine_state: None,
            deferred_infix_cell: None,
            pending_throw: None,
            #[cfg(debug_assertions)]
            tick: 0,
        }
    }

    pub fn is_uninterruptible(&self) -> bool {
        self.flags.contains(LevelFlags::UNINTERRUPTIBLE)
    }

    pub fn is_doing_pickups(&self) -> bool {
        self.flags.contains(LevelFlags::DOING_PICKUPS)
    }

    /// Range of arg cells the GC must trace this step (spec.md §3.5: normally
    /// bounded by `arg_cursor`, but the full range during pickups).
    pub fn traced_arg_range(&self) -> std::ops::Range<usize> {
        if self.is_doing_pickups() {
            self.rootvar..self.param_cursor.max(self.arg_cursor)
        } else {
            self.rootvar..self.arg_cursor
        }
    }
}

/// The cooperative stack of Levels the Trampoline owns (spec.md §3.5: "a
/// singly-linked stack rooted at a process-wide top; the bottom level is a
/// sentinel that never executes code").
#[derive(Debug, Default)]
pub struct LevelStack {
    levels: Vec<Level>,
}

impl LevelStack {
    /// A fresh stack, with the sentinel bottom Level already in place.
    pub fn new() -> Self {
        let sentinel = Level::new(
            Feed::Variadic {
                pending: Vec::new(),
                index: 0,
            },
            None,
            0,
        );
        LevelStack { levels: vec![sentinel] }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn top(&self) -> &Level {
        self.levels.last().expect("sentinel level is never popped")
    }

    pub fn top_mut(&mut self) -> &mut Level {
        self.levels.last_mut().expect("sentinel level is never popped")
    }

    pub fn is_at_sentinel(&self) -> bool {
        self.levels.len() == 1
    }

    /// All Levels bottom-to-top, including the sentinel — the GC's root
    /// walk needs every live frame, not just the top (spec.md §4.I).
    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter()
    }

    /// Links a new Level onto the stack and, if its feed is backed by an
    /// array not already read-only, takes a transient hold on it
    /// (spec.md §4.F).
    pub fn push_level(&mut self, level: Level, arena: &mut StubArena, holds: &mut Holds) -> CoreResult<()> {
        if let Some(array) = level.feed.source_array() {
            let leader = arena.get(array)?.leader();
            let already_read_only = leader.contains(Leader::FROZEN)
                || leader.contains(Leader::PROTECTED)
                || leader.contains(Leader::AUTO_LOCKED);
            if !already_read_only {
                holds.acquire(arena, array)?;
            }
        }
        self.levels.push(level);
        Ok(())
    }

    /// Releases the top Level's hold, restores the data-stack base to the
    /// caller, unlinks it, and, if it reified a VarList, marks that VarList
    /// no-longer-running (spec.md §4.F).
    pub fn drop_level(&mut self, arena: &mut StubArena, holds: &mut Holds) -> CoreResult<usize> {
        debug_assert!(!self.is_at_sentinel(), "cannot drop the sentinel level");
        let level = self.levels.pop().expect("checked not at sentinel");
        if let Some(array) = level.feed.source_array() {
            let leader = arena.get(array)?.leader();
            let held_by_us = !(leader.contains(Leader::FROZEN)
                || leader.contains(Leader::PROTECTED)
                || leader.contains(Leader::AUTO_LOCKED));
            if held_by_us {
                holds.release(arena, array)?;
            }
        }
        if let Some(varlist) = level.varlist {
            context::mark_not_running(arena, varlist)?;
        }
        Ok(level.data_stack_base)
    }
}
