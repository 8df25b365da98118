//! The manuals stack: unmanaged Stubs awaiting `manage()` or failure-time
//! cleanup (spec.md §4.B, §4.J).
//!
//! A freshly made Stub is unmanaged by default and lives here until either
//! `manage()` flips it over to GC ownership, or a failure unwinds back to a
//! `ManualsMark` checkpoint and frees everything pushed since — the "a
//! failure frees all manuals allocated since the catch point" contract from
//! spec.md §4.J, and testable property #3 ("manuals balance").

use weft_core::StubId;

/// A checkpoint into the manuals stack, taken at a catch point. Unwinding
/// back to it frees every Stub pushed after it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualsMark(usize);

#[derive(Debug, Default)]
pub struct Manuals {
    stack: Vec<StubId>,
}

impl Manuals {
    pub fn new() -> Self {
        Manuals::default()
    }

    pub fn push(&mut self, id: StubId) {
        self.stack.push(id);
    }

    /// Flips `id` over to GC management: removes it from the manuals stack.
    /// Per spec.md §4.J, the typical case is near the top, so search from
    /// there; worst case is O(n).
    pub fn manage(&mut self, id: StubId) {
        if let Some(pos) = self.stack.iter().rposition(|&s| s == id) {
            self.stack.remove(pos);
        }
    }

    pub fn mark(&self) -> ManualsMark {
        ManualsMark(self.stack.len())
    }

    /// Returns (and removes from the stack) every Stub pushed since `mark`,
    /// in push order, for the caller to kill — the failure-unwind contract.
    pub fn unwind_to(&mut self, mark: ManualsMark) -> Vec<StubId> {
        debug_assert!(mark.0 <= self.stack.len(), "manuals mark from a later, shrunk stack");
        self.stack.split_off(mark.0)
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn contains(&self, id: StubId) -> bool {
        self.stack.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = StubId> + '_ {
        self.stack.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::StubId as Id;

    #[test]
    fn manage_removes_from_stack() {
        let mut manuals = Manuals::new();
        let id = Id::from_raw(1);
        manuals.push(id);
        assert!(manuals.contains(id));
        manuals.manage(id);
        assert!(!manuals.contains(id));
    }

    #[test]
    fn unwind_to_mark_frees_everything_pushed_after() {
        let mut manuals = Manuals::new();
        manuals.push(Id::from_raw(1));
        let mark = manuals.mark();
        manuals.push(Id::from_raw(2));
        manuals.push(Id::from_raw(3));
        let freed = manuals.unwind_to(mark);
        assert_eq!(freed, vec![Id::from_raw(2), Id::from_raw(3)]);
        assert_eq!(manuals.len(), 1);
    }

    #[test]
    fn balance_holds_when_nothing_pushed_between_marks() {
        let mut manuals = Manuals::new();
        manuals.push(Id::from_raw(1));
        let mark = manuals.mark();
        assert!(manuals.unwind_to(mark).is_empty());
        assert_eq!(manuals.len(), 1);
    }
}
