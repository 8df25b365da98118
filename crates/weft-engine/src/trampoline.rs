//! The trampoline: the cooperative loop that replaces the source's C
//! longjmp-based recursive evaluator (spec.md §3.5, §4.F, §5).
//!
//! Per Design Notes §9 ("the evaluator as an explicit trampoline"), a Level
//! never calls into another Level's execution through the Rust call stack.
//! Instead `run` drives a single loop: poll signals, step the top Level,
//! and react to whatever `TrampolineStatus` the step reports. A step that
//! wants to recurse (an evaluated word turns out to be an action) pushes a
//! new Level and returns `Ok` immediately; the loop's next iteration picks
//! it up. This bounds native Rust stack depth to the loop itself, not to
//! the dynamically-typed call depth of whatever is being evaluated.

use tracing::{trace, warn};

use weft_core::{Cell, CoreResult, PooledAllocator, StubArena, SymbolTable};

use crate::binding::InternTable;
use crate::fail::{Failure, PropagationState, Thrown};
use crate::gc;
use crate::guard::GuardStack;
use crate::level::{Holds, Level, LevelStack};
use crate::manuals::Manuals;
use crate::signal::{Signals, DEBUG_BREAK, HALT, RECYCLE};

/// What one dispatch step reported back to the trampoline.
#[derive(Debug)]
pub enum TrampolineStatus {
    /// The step produced a value in `Level::out`; the trampoline should
    /// drop the Level (or continue running it, for a multi-step native).
    Ok,
    /// A throw is propagating; the trampoline unwinds Levels until one
    /// catches the label, or it escalates to `EngineError::UncaughtThrow`.
    Throw(Thrown),
    /// A failure terminates the current Level's evaluation outright.
    Fail(Failure),
    /// The step pushed a new Level and wants control back at the next
    /// iteration before doing anything else (spec.md §3.5 "recursion
    /// becomes a new stack frame, not a new native call").
    Yield,
}

/// A single step function a dispatcher/native provides. Implementations
/// live in the as-yet-unwritten builtin layer; the trampoline only needs
/// the shape of the contract.
pub trait Dispatch {
    fn step(&mut self, level: &mut Level, arena: &mut StubArena, pool: &mut PooledAllocator) -> CoreResult<TrampolineStatus>;
}

/// Bundles every piece of mutable state the trampoline threads through a
/// run (spec.md §5: "global mutable state... owned by one struct, not
/// scattered statics"). `Runtime` (in `runtime.rs`) owns one of these.
pub struct Engine<'a> {
    pub arena: &'a mut StubArena,
    pub pool: &'a mut PooledAllocator,
    pub symtab: &'a mut SymbolTable,
    pub levels: &'a mut LevelStack,
    pub holds: &'a mut Holds,
    pub guards: &'a mut GuardStack,
    pub manuals: &'a mut Manuals,
    pub signals: &'a Signals,
    pub propagation: &'a mut PropagationState,
    pub interned_uses: &'a mut InternTable,
}

/// Drives Levels to completion. Returns the final Level's output cell once
/// the stack unwinds back to the sentinel, or an uncaught failure.
///
/// `dispatch` performs one unit of work for the top Level per call; it is
/// injected rather than hardcoded here, since the trampoline's job is pure
/// scheduling (signals, GC, unwind), not evaluation semantics.
pub fn run(engine: &mut Engine<'_>, dispatch: &mut dyn Dispatch) -> Result<Cell, Failure> {
    loop {
        if engine.levels.is_at_sentinel() {
            return Ok(engine.levels.top().out);
        }

        // A critical-section (`UNINTERRUPTIBLE`) native still gets scheduled
        // here; `poll_signals` below is what actually masks halt/recycle for
        // it (spec.md §5) — the mask is the top level's own flag, checked at
        // this poll point, not anything the native has to do itself.
        if let Some(failure) = poll_signals(engine) {
            return Err(unwind_fail(engine, failure));
        }

        let status = {
            let top = engine.levels.top_mut();
            dispatch.step(top, engine.arena, engine.pool)
        };

        match status {
            Ok(TrampolineStatus::Yield) => continue,
            Ok(TrampolineStatus::Ok) => {
                if let Err(err) = drop_top_level(engine) {
                    return Err(Failure::recoverable(err));
                }
            }
            Ok(TrampolineStatus::Throw(thrown)) => {
                if let Err(failure) = unwind_throw(engine, thrown) {
                    return Err(failure);
                }
            }
            Ok(TrampolineStatus::Fail(failure)) => {
                return Err(unwind_fail(engine, failure));
            }
            Err(core_err) => {
                return Err(unwind_fail(engine, Failure::recoverable(core_err)));
            }
        }
    }
}

fn drop_top_level(engine: &mut Engine<'_>) -> CoreResult<()> {
    engine.levels.drop_level(engine.arena, engine.holds)?;
    Ok(())
}

/// Pops the Level that raised `thrown` and hands it to the new top Level
/// as a `pending_throw`, for that Level's next dispatch step to either
/// catch (clearing `pending_throw` and `LevelFlags::THROWN`) or re-raise
/// (returning `TrampolineStatus::Throw` again). Per spec.md §4.H,
/// BREAK/RETURN/QUIT are native-recognized labels each loop construct,
/// function, or top-level checks for on its own Level — that catch policy
/// belongs to the dispatcher, not the trampoline. A throw that unwinds past
/// the sentinel with nobody claiming it escalates to an engine failure.
fn unwind_throw(engine: &mut Engine<'_>, thrown: Thrown) -> Result<(), Failure> {
    trace!(label = ?thrown.label, "unwinding throw");
    if drop_top_level(engine).is_err() {
        return Err(Failure::recoverable(crate::fail::EngineError::UncaughtThrow));
    }
    if engine.levels.is_at_sentinel() {
        return Err(Failure::recoverable(crate::fail::EngineError::UncaughtThrow));
    }
    let parent = engine.levels.top_mut();
    parent.flags.insert(crate::level::LevelFlags::THROWN);
    parent.pending_throw = Some(thrown);
    Ok(())
}

/// Unwinds every Level back to the sentinel on a failure, freeing manuals
/// allocated since each Level's catch point (spec.md §4.H, §4.J, testable
/// property #3). The propagation slot is left clear: `run`'s `Result`
/// already carries the failure back to the caller, so there is nothing
/// left pending to observe.
fn unwind_fail(engine: &mut Engine<'_>, failure: Failure) -> Failure {
    let mark = engine.manuals.mark();
    while !engine.levels.is_at_sentinel() {
        if drop_top_level(engine).is_err() {
            break;
        }
    }
    for id in engine.manuals.unwind_to(mark) {
        let _ = engine.arena.kill(id);
    }
    engine.propagation.clear();
    failure
}

/// Observes and reacts to `engine.signals`. Returns `Some(failure)` only for
/// HALT, and only once the top level reports itself interruptible — per
/// spec.md §5 a halt "triggers unwind to the nearest level that is not
/// uninterruptible", so a critical-section native finishing its step and
/// clearing `UNINTERRUPTIBLE` is exactly what lets the very next poll (the
/// top of the next loop iteration) observe and act on a halt raised earlier.
fn poll_signals(engine: &mut Engine<'_>) -> Option<Failure> {
    let bits = engine.signals.poll();
    if bits == 0 {
        return None;
    }
    if bits & RECYCLE != 0 && !engine.levels.top().is_uninterruptible() {
        gc::collect(
            engine.arena,
            engine.pool,
            engine.symtab,
            engine.levels,
            engine.guards,
            engine.manuals,
            engine.holds,
        );
        engine.signals.clear(RECYCLE);
    }
    if bits & DEBUG_BREAK != 0 {
        warn!("debug-break signal observed; no debugger hook wired up");
        engine.signals.clear(DEBUG_BREAK);
    }
    if bits & HALT != 0 && !engine.levels.top().is_uninterruptible() {
        engine.signals.clear(HALT);
        return Some(Failure::recoverable(crate::fail::EngineError::Halted));
    }
    None
}
