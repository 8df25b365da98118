//! The guard stack: transient GC protection for a Stub across a call that
//! might trigger a collection (spec.md §4.J).
//!
//! Grounded on the teacher's `SpawnRegistryGuard` in `quotations.rs`: an
//! RAII type that registers on construction and, unless explicitly disarmed,
//! undoes the registration on `Drop`. Here the guard never disarms itself —
//! every push is popped on drop, LIFO — but the shape (construct-to-register,
//! `Drop`-to-release) is the same idiomatic-Rust replacement for the spec's
//! manual `push_guard`/`drop_guard` pair.

use weft_core::StubId;

#[derive(Debug, Default)]
pub struct GuardStack {
    stack: Vec<StubId>,
}

impl GuardStack {
    pub fn new() -> Self {
        GuardStack::default()
    }

    fn push(&mut self, id: StubId) {
        self.stack.push(id);
    }

    /// Pops the top of the guard stack, asserting it matches `id` — guards
    /// must be released LIFO (spec.md §4.J).
    fn pop_matching(&mut self, id: StubId) {
        let top = self.stack.pop();
        debug_assert_eq!(top, Some(id), "guard stack released out of LIFO order");
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

/// RAII handle for one guarded Stub. Protects `id` from GC for as long as
/// this value is alive; releasing happens automatically on drop, so a
/// native cannot forget to unguard on an early return or a `?`.
pub struct Guard<'a> {
    stack: &'a mut GuardStack,
    id: StubId,
}

impl<'a> Guard<'a> {
    pub fn new(stack: &'a mut GuardStack, id: StubId) -> Self {
        stack.push(id);
        Guard { stack, id }
    }

    pub fn id(&self) -> StubId {
        self.id
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.stack.pop_matching(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::StubId as Id;

    #[test]
    fn guard_pushes_on_construction_and_pops_on_drop() {
        let mut stack = GuardStack::new();
        let id = Id::from_raw(1);
        {
            let guard = Guard::new(&mut stack, id);
            assert!(guard.stack_contains());
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn nested_guards_release_lifo() {
        let mut stack = GuardStack::new();
        let a = Id::from_raw(1);
        let b = Id::from_raw(2);
        {
            let _ga = Guard::new(&mut stack, a);
            {
                let _gb = Guard::new(&mut stack, b);
                assert_eq!(stack.len(), 2);
            }
            assert_eq!(stack.len(), 1);
            assert!(stack.contains(a));
        }
        assert!(stack.is_empty());
    }

    impl Guard<'_> {
        fn stack_contains(&self) -> bool {
            self.stack.contains(self.id)
        }
    }
}
