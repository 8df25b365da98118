//! Failure propagation and throws (spec.md §4.H, §7).
//!
//! Grounded on the teacher's `error.rs`: instead of FFI functions reporting
//! errors through `thread_local!` state that callers poll and clear, the
//! same take/clear shape is kept but owned by `Runtime` (Design Notes §9:
//! "encapsulate in a Runtime struct rather than process globals" — this
//! runtime is single-threaded per spec.md §5, so a `thread_local!` buys
//! nothing a struct field doesn't already give us).
//!
//! A throw is a first-class value (BREAK, RETURN, QUIT, or a user label)
//! bubbling through the evaluator until caught; an uncaught throw escalates
//! to a failure (spec.md §4.H). Divergent panics skip this machinery
//! entirely and use Rust's own panic/`catch_unwind`.

use thiserror::Error;

use weft_core::{AccessViolation, Cell, CoreError, StubId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("unbound word {symbol:?}")]
    Unbound { symbol: StubId },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("access violation: {0}")]
    AccessViolation(#[from] AccessViolation),

    #[error("uncaught throw")]
    UncaughtThrow,

    #[error("halted")]
    Halted,

    #[error("{0}")]
    Custom(String),
}

/// A label a throw unwinds to, or past, until a matching catch claims it
/// (spec.md §4.H: BREAK, RETURN, QUIT are built-in labels; anything else is
/// a user-named catch target keyed by a Symbol).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowLabel {
    Break,
    Return,
    Quit(i32),
    Named(StubId),
}

/// A throw in flight: a label plus the value it carries.
#[derive(Debug, Clone, Copy)]
pub struct Thrown {
    pub label: ThrowLabel,
    pub value: Cell,
}

/// A failure: an `EngineError` plus whether it is divergent (unrecoverable,
/// must unwind past every catch to the top — spec.md §4.H, §7).
#[derive(Debug)]
pub struct Failure {
    pub error: EngineError,
    pub divergent: bool,
}

impl Failure {
    pub fn recoverable(error: impl Into<EngineError>) -> Self {
        Failure {
            error: error.into(),
            divergent: false,
        }
    }

    pub fn divergent(error: impl Into<EngineError>) -> Self {
        Failure {
            error: error.into(),
            divergent: true,
        }
    }
}

/// The two-state propagation record spec.md §4.H calls for: a current
/// failure slot and a divergence flag, tested and cleared at Result-typed
/// boundaries.
#[derive(Debug, Default)]
pub struct PropagationState {
    current: Option<Failure>,
}

impl PropagationState {
    pub fn new() -> Self {
        PropagationState::default()
    }

    /// Records a failure, replacing (never stacking on top of) any prior
    /// one still pending — a failure must be observed or re-surfaced before
    /// the next one lands (spec.md §7 "never silently dropped").
    pub fn set(&mut self, failure: Failure) {
        self.current = Some(failure);
    }

    /// Takes (and clears) the pending failure, if any.
    pub fn take(&mut self) -> Option<Failure> {
        self.current.take()
    }

    pub fn is_pending(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_divergent(&self) -> bool {
        matches!(&self.current, Some(f) if f.divergent)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
