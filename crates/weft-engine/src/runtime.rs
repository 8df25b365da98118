//! `Runtime`: the single encapsulating struct Design Notes §9 calls for
//! ("Global mutable state... encapsulate in a Runtime struct rather than
//! process globals"). Every process-global the distilled spec describes
//! (manuals, guards, pools, symbol table, ballast, tick, level stack,
//! signals) is a field here instead; spec.md §5 makes this safe — the whole
//! runtime is single-threaded and not re-entrant from another thread, so one
//! owned struct per embedding instance is exactly the right shape.
//!
//! The embedding API surface spec.md §6 describes (`init`, `shutdown`,
//! `push_level`, `trampoline`, `last_result`, `request_halt`,
//! `request_debug_break`, `request_gc`) lives here as inherent methods,
//! grounded on the teacher's `scheduler.rs` init/run/shutdown triad but
//! scoped to one runtime instance instead of a process-wide scheduler.

use tracing::info;
use weft_core::{Cell, PooledAllocator, RuntimeConfig, StubArena, SymbolTable};

use crate::binding::InternTable;
use crate::fail::{Failure, PropagationState};
use crate::gc::{self, GcStats};
use crate::guard::GuardStack;
use crate::level::{Feed, Holds, Level, LevelStack};
use crate::manuals::Manuals;
use crate::signal::{Signals, DEBUG_BREAK, HALT, RECYCLE};
use crate::trampoline::{self, Dispatch, Engine};

/// One embeddable instance of the runtime: the allocator, the Stub arena,
/// the symbol table, the level stack, and every piece of evaluator
/// bookkeeping spec.md §5 says must be thread-local/per-instance.
pub struct Runtime {
    pub arena: StubArena,
    pub pool: PooledAllocator,
    pub symtab: SymbolTable,
    pub levels: LevelStack,
    pub holds: Holds,
    pub guards: GuardStack,
    pub manuals: Manuals,
    pub signals: Signals,
    pub propagation: PropagationState,
    pub interned_uses: InternTable,
    last_result: Option<Cell>,
}

impl Runtime {
    /// Brings up a fresh runtime instance from `config`. Embedding needs no
    /// configuration to get a working runtime (`RuntimeConfig::default()`
    /// covers every field).
    pub fn init(config: RuntimeConfig) -> Self {
        info!(ballast = config.ballast_budget, "runtime init");
        Runtime {
            arena: StubArena::new(),
            pool: PooledAllocator::new(config.pool_config()),
            symtab: SymbolTable::new(),
            levels: LevelStack::new(),
            holds: Holds::new(),
            guards: GuardStack::new(),
            manuals: Manuals::new(),
            signals: Signals::new(),
            propagation: PropagationState::new(),
            interned_uses: InternTable::new(),
            last_result: None,
        }
    }

    /// Tears down the runtime. Per spec.md §6 there is no persisted state to
    /// flush; this exists as an explicit lifecycle bookend for an embedding
    /// host, and asserts the invariants that should hold at rest (testable
    /// properties #3, #4).
    pub fn shutdown(self) {
        debug_assert!(self.manuals.is_empty(), "manuals leaked past shutdown");
        debug_assert!(self.holds.is_empty(), "holds leaked past shutdown");
        info!("runtime shutdown");
    }

    /// Pushes a new top Level onto the stack, feeding it either an array or
    /// a variadic pending queue (spec.md §3.5, §6).
    pub fn push_level(&mut self, feed: Feed, specifier: crate::binding::Specifier) -> weft_core::CoreResult<()> {
        let data_stack_base = self.levels.depth();
        let level = Level::new(feed, specifier, data_stack_base);
        self.levels.push_level(level, &mut self.arena, &mut self.holds)
    }

    /// Runs the trampoline until the level stack unwinds to the sentinel,
    /// caching the result for `last_result` (spec.md §6).
    pub fn run(&mut self, dispatch: &mut dyn Dispatch) -> Result<Cell, Failure> {
        let mut engine = Engine {
            arena: &mut self.arena,
            pool: &mut self.pool,
            symtab: &mut self.symtab,
            levels: &mut self.levels,
            holds: &mut self.holds,
            guards: &mut self.guards,
            manuals: &mut self.manuals,
            signals: &self.signals,
            propagation: &mut self.propagation,
            interned_uses: &mut self.interned_uses,
        };
        let result = trampoline::run(&mut engine, dispatch);
        if let Ok(cell) = result {
            self.last_result = Some(cell);
        }
        result
    }

    /// The output of the most recently completed `run`, if any (spec.md §6).
    pub fn last_result(&self) -> Option<Cell> {
        self.last_result
    }

    /// Sets the halt bit; safe to call from a signal handler or another
    /// thread (spec.md §5, §6).
    pub fn request_halt(&self) {
        self.signals.raise(HALT);
    }

    pub fn request_debug_break(&self) {
        self.signals.raise(DEBUG_BREAK);
    }

    /// Requests a recycle (GC) at the next trampoline poll, rather than
    /// collecting synchronously — mirrors the allocator's own
    /// ballast-crossing-zero behavior (spec.md §4.A).
    pub fn request_gc(&self) {
        self.signals.raise(RECYCLE);
    }

    /// Runs a collection synchronously, bypassing the signal poll — useful
    /// for an embedding host driving GC between top-level evaluations rather
    /// than waiting for the next trampoline step.
    pub fn collect_now(&mut self) -> GcStats {
        gc::collect(
            &mut self.arena,
            &mut self.pool,
            &self.symtab,
            &self.levels,
            &self.guards,
            &self.manuals,
            &self.holds,
        )
    }

    pub fn is_halted(&self) -> bool {
        self.signals.is_set(HALT)
    }

    pub fn clear_halt(&self) {
        self.signals.clear(HALT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::CellPayload;

    struct ImmediatelyDone;

    impl Dispatch for ImmediatelyDone {
        fn step(
            &mut self,
            level: &mut Level,
            _arena: &mut StubArena,
            _pool: &mut PooledAllocator,
        ) -> weft_core::CoreResult<trampoline::TrampolineStatus> {
            level.out = Cell::new(CellPayload::Int(42));
            Ok(trampoline::TrampolineStatus::Ok)
        }
    }

    #[test]
    fn init_brings_up_an_empty_runtime() {
        let rt = Runtime::init(RuntimeConfig::default());
        assert!(rt.manuals.is_empty());
        assert!(rt.holds.is_empty());
        assert_eq!(rt.last_result(), None);
    }

    #[test]
    fn run_caches_last_result() {
        let mut rt = Runtime::init(RuntimeConfig::default());
        rt.push_level(
            Feed::Variadic {
                pending: Vec::new(),
                index: 0,
            },
            None,
        )
        .unwrap();
        let mut dispatch = ImmediatelyDone;
        let result = rt.run(&mut dispatch).unwrap();
        assert_eq!(result.payload, CellPayload::Int(42));
        assert_eq!(rt.last_result().unwrap().payload, CellPayload::Int(42));
    }

    #[test]
    fn request_halt_sets_signal_until_cleared() {
        let rt = Runtime::init(RuntimeConfig::default());
        assert!(!rt.is_halted());
        rt.request_halt();
        assert!(rt.is_halted());
        rt.clear_halt();
        assert!(!rt.is_halted());
    }

    #[test]
    fn shutdown_does_not_panic_on_a_clean_runtime() {
        let rt = Runtime::init(RuntimeConfig::default());
        rt.shutdown();
    }
}
