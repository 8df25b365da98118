//! Cell: the value-sized record (spec.md §3.2).
//!
//! Grounded on the teacher's `StackValue`/`Value` pairing: a cheap,
//! `#[repr(C)]`-friendly discriminant (here, `CellPayload`'s own tag) plus a
//! fixed small number of payload words. Unlike the teacher's `Value`, which
//! enumerates the *business* value set of a scripting language, `CellPayload`
//! enumerates exactly the domain spec.md §3.2/§3.3 describes: a value that
//! may or may not carry a Stub reference, plus a binding.
//!
//! `first_is_node` is cached in `CellFlags` rather than re-derived from the
//! payload on every check, per spec.md §3.2's "a Cell whose first-is-node
//! flag is set guarantees payload.first is a Stub pointer" — the flag and
//! the payload are asserted to agree in debug builds (testable property #1).

use bitflags::bitflags;

use crate::stub::StubId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        /// `payload` carries a Stub reference the GC must trace.
        const FIRST_IS_NODE = 0b0000_0001;
        /// Immutable cell; mutating operations must fail.
        const CONST         = 0b0000_0010;
        /// This cell is a throw label/value in flight.
        const THROW_SIGNAL  = 0b0000_0100;
        /// Transient evaluator scratch marker; must be clear before a value
        /// becomes user-visible (spec.md §3.2).
        const STALE         = 0b0000_1000;
    }
}

/// A reference to an element inside a Flex-backed series (Block/Group/Path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRef {
    pub stub: StubId,
    pub index: u32,
}

/// A bound word: the interned symbol plus an optional cached resolution
/// index, invalidated whenever the binding chain it was cached against is
/// rebuilt (spec.md §4.E "cached (chain-position, resolution) pairs").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordPayload {
    pub symbol: StubId,
    pub cached_index: Option<u32>,
}

/// Where a Cell's binding terminates or passes through.
///
/// `Relative` cells live inside a Details body and are only meaningful
/// relative to a matching Level (spec.md §3.2); they must be `specify`-ed
/// (rebound to a concrete VarList/chain) before they can leave the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Bound relative to an action's body; needs a Level to resolve.
    Relative(StubId),
    /// Bound to a concrete chain head (a Use, a Let, or a terminal VarList).
    Specified(StubId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellPayload {
    Blank,
    /// Evaluator-only "no value produced" marker; never user-constructible.
    Void,
    Logic(bool),
    Int(i64),
    Decimal(f64),
    Word(WordPayload),
    SetWord(WordPayload),
    GetWord(WordPayload),
    StringRef(StubId),
    BinaryRef(StubId),
    Block(SeriesRef),
    Group(SeriesRef),
    Path(SeriesRef),
    Object(StubId),
    Action(StubId),
}

impl CellPayload {
    /// Whether this payload variant carries a traceable Stub reference.
    pub const fn carries_node(&self) -> bool {
        matches!(
            self,
            CellPayload::Word(_)
                | CellPayload::SetWord(_)
                | CellPayload::GetWord(_)
                | CellPayload::StringRef(_)
                | CellPayload::BinaryRef(_)
                | CellPayload::Block(_)
                | CellPayload::Group(_)
                | CellPayload::Path(_)
                | CellPayload::Object(_)
                | CellPayload::Action(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub flags: CellFlags,
    pub payload: CellPayload,
    pub binding: Option<Binding>,
}

impl Cell {
    pub fn new(payload: CellPayload) -> Self {
        let mut flags = CellFlags::empty();
        if payload.carries_node() {
            flags.insert(CellFlags::FIRST_IS_NODE);
        }
        Cell {
            flags,
            payload,
            binding: None,
        }
    }

    pub fn blank() -> Self {
        Cell::new(CellPayload::Blank)
    }

    /// Evaluator scratch value: stale until something overwrites it.
    pub fn poisoned() -> Self {
        let mut cell = Cell::new(CellPayload::Void);
        cell.flags.insert(CellFlags::STALE);
        cell
    }

    pub fn is_stale(&self) -> bool {
        self.flags.contains(CellFlags::STALE)
    }

    pub fn clear_stale(&mut self) {
        self.flags.remove(CellFlags::STALE);
    }

    pub fn is_const(&self) -> bool {
        self.flags.contains(CellFlags::CONST)
    }

    pub fn set_const(&mut self, value: bool) {
        self.flags.set(CellFlags::CONST, value);
    }

    /// A relative cell must be specified before it is visible outside the
    /// Level whose Details it is relative to (spec.md §3.2).
    pub fn is_relative(&self) -> bool {
        matches!(self.binding, Some(Binding::Relative(_)))
    }

    /// Rebind a relative cell to a concrete context, as the evaluator does
    /// when returning a value derived from a function body.
    pub fn specify(&mut self, target: StubId) {
        self.binding = Some(Binding::Specified(target));
    }

    /// Debug-only consistency check between the cached flag and the payload
    /// it was derived from (testable property #1: flavor/slot consistency
    /// generalizes to cell/payload consistency).
    pub fn debug_assert_consistent(&self) {
        debug_assert_eq!(
            self.flags.contains(CellFlags::FIRST_IS_NODE),
            self.payload.carries_node(),
            "FIRST_IS_NODE flag disagrees with payload {:?}",
            self.payload
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_is_small_and_copy() {
        // Cell has no owned heap data of its own; everything beyond two
        // machine words routes through a StubId, keeping Cell Copy and cheap
        // to move the way the teacher's StackValue is.
        fn assert_copy<T: Copy>() {}
        assert_copy::<Cell>();
        assert!(std::mem::size_of::<Cell>() <= 24);
    }

    #[test]
    fn blank_has_no_node() {
        let c = Cell::blank();
        assert!(!c.flags.contains(CellFlags::FIRST_IS_NODE));
        c.debug_assert_consistent();
    }

    #[test]
    fn word_payload_carries_node() {
        let c = Cell::new(CellPayload::Word(WordPayload {
            symbol: StubId::from_raw(3),
            cached_index: None,
        }));
        assert!(c.flags.contains(CellFlags::FIRST_IS_NODE));
        c.debug_assert_consistent();
    }

    #[test]
    fn poisoned_cell_is_stale_until_cleared() {
        let mut c = Cell::poisoned();
        assert!(c.is_stale());
        c.clear_stale();
        assert!(!c.is_stale());
    }

    #[test]
    fn specify_converts_relative_to_specified() {
        let mut c = Cell::new(CellPayload::Word(WordPayload {
            symbol: StubId::from_raw(1),
            cached_index: None,
        }));
        c.binding = Some(Binding::Relative(StubId::from_raw(9)));
        assert!(c.is_relative());
        c.specify(StubId::from_raw(42));
        assert!(!c.is_relative());
        assert_eq!(c.binding, Some(Binding::Specified(StubId::from_raw(42))));
    }
}
