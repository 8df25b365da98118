//! Argument fulfillment: the six refine-mode sentinels, pickups, deferred
//! infix, and re-evaluation (spec.md §4.G).
//!
//! Per Design Notes §9 ("refine sentinels as an enum"), the teacher's
//! pointer-identity trick (comparing an arg cell's address against a set of
//! well-known singletons to learn its refine mode) becomes a plain Rust
//! enum. Everything else in this module is state-machine bookkeeping that
//! walks a Details' parameter list alongside a Level's argument cursor.

use std::collections::HashSet;

use weft_core::{Cell, CellPayload, StubId};

use crate::level::{Level, LevelFlags};

/// The six refine-mode sentinels (spec.md §4.G). Truthiness of the
/// sentinel encodes whether type-checking applies to the slot; identity
/// encodes behavior (how the evaluator fills it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineState {
    /// Not supplied by this invocation at all; do not evaluate or
    /// type-check it.
    Skip,
    /// A refinement not requested by the callsite; its arg slots are
    /// filled without evaluating callsite expressions.
    Unused,
    /// A refinement whose first argument evaluated to none; still consumes
    /// callsite expressions but forbids them from producing a value.
    Revoked,
    /// A refinement currently active and still revokable by its own first
    /// argument.
    Active,
    /// An ordinary (non-refinement) argument; type-checking applies.
    Ordinary,
    /// The first argument of an infix/lookback op, evaluated before the op
    /// itself is dispatched.
    LookbackFirst,
}

impl RefineState {
    pub fn requires_type_check(self) -> bool {
        matches!(self, RefineState::Active | RefineState::Ordinary | RefineState::LookbackFirst)
    }

    /// An `Active` refinement becomes `Revoked` once its first argument
    /// evaluates to none; every other state is unaffected.
    pub fn revoke_if_blank(self, first_arg_is_blank: bool) -> RefineState {
        if self == RefineState::Active && first_arg_is_blank {
            RefineState::Revoked
        } else {
            self
        }
    }
}

/// One parameter declaration, classified from its raw cell. Convention:
/// a `SetWord` cell in a Details' `params` Flex is a refinement header
/// (`/name`); a plain `Word` cell is an ordinary argument belonging to
/// whichever refinement header preceded it (or to the unconditional
/// prefix if none has).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamDecl {
    RefinementHeader { symbol: StubId },
    Arg { symbol: StubId },
}

fn classify(cell: &Cell) -> Option<ParamDecl> {
    match cell.payload {
        CellPayload::SetWord(w) => Some(ParamDecl::RefinementHeader { symbol: w.symbol }),
        CellPayload::Word(w) => Some(ParamDecl::Arg { symbol: w.symbol }),
        _ => None,
    }
}

/// Computes the per-slot `RefineState` plan for one call, given the
/// Details' raw parameter cells and the set of refinement symbols the
/// callsite path requested (spec.md §4.G).
pub fn plan_refine_states(params: &[Cell], requested: &HashSet<StubId>) -> Vec<RefineState> {
    let mut plan = Vec::with_capacity(params.len());
    let mut current_arm = RefineState::Ordinary;
    for cell in params {
        match classify(cell) {
            Some(ParamDecl::RefinementHeader { symbol }) => {
                current_arm = if requested.contains(&symbol) {
                    RefineState::Active
                } else {
                    RefineState::Unused
                };
                plan.push(current_arm);
            }
            Some(ParamDecl::Arg { .. }) => {
                plan.push(current_arm);
            }
            None => plan.push(RefineState::Skip),
        }
    }
    plan
}

/// Applies revocation: the first `Arg` slot following an `Active`
/// refinement header, if it evaluates to blank, flips that refinement's
/// whole arm (header + remaining args already planned as `Active`) to
/// `Revoked` (spec.md §4.G). Subsequent args in the arm still consume
/// callsite expressions but must reject a produced value — callers check
/// `RefineState::requires_type_check` to enforce that.
pub fn revoke_arm(plan: &mut [RefineState], header_index: usize, first_arg_is_blank: bool) {
    if plan.get(header_index) != Some(&RefineState::Active) || !first_arg_is_blank {
        return;
    }
    for state in plan[header_index..].iter_mut() {
        match state {
            RefineState::Active => *state = RefineState::Revoked,
            _ => break,
        }
    }
}

/// Pickups: when a path invocation supplies refinements out of parameter
/// order, the evaluator re-walks the parameter list a second time flagged
/// `doing_pickups`. While set, `Level::traced_arg_range` widens to the
/// whole arg range (spec.md §4.G, §4.I).
pub fn begin_pickups(level: &mut Level) {
    level.flags.insert(LevelFlags::DOING_PICKUPS);
    level.param_cursor = level.rootvar;
}

pub fn end_pickups(level: &mut Level) {
    level.flags.remove(LevelFlags::DOING_PICKUPS);
}

/// Defers an infix lookahead: a normal-class left argument claims the
/// upcoming infix op as its own tail rather than letting the enclosing
/// call bind it to a partial argument (spec.md §4.G, S2).
pub fn defer_infix(level: &mut Level, arg_cell_index: usize) {
    level.flags.insert(LevelFlags::DEFERRED_INFIX);
    level.deferred_infix_cell = Some(arg_cell_index);
}

/// Clears a pending deferral, returning the cell index it targeted — the
/// evaluator re-enters with a post-switch flag to retroactively apply the
/// infix against that cell.
pub fn take_deferred_infix(level: &mut Level) -> Option<usize> {
    level.flags.remove(LevelFlags::DEFERRED_INFIX);
    level.deferred_infix_cell.take()
}

/// Requests that `level.spare` be the next value the feed yields — how
/// user-visible EVAL is implemented without building a synthetic array
/// (spec.md §4.G).
pub fn request_reevaluate(level: &mut Level, value: Cell) {
    level.flags.insert(LevelFlags::RE_EVALUATE);
    level.spare = value;
}

pub fn take_reevaluate(level: &mut Level) -> Option<Cell> {
    if level.flags.contains(LevelFlags::RE_EVALUATE) {
        level.flags.remove(LevelFlags::RE_EVALUATE);
        Some(std::mem::replace(&mut level.spare, Cell::poisoned()))
    } else {
        None
    }
}
