//! Symbol interning table (spec.md §6, §8 testable property #7 / S6).
//!
//! Canonical UTF-8 bytes map to one Symbol Stub; case-variant spellings hang
//! off the canonical entry's synonym chain. Symbols are always managed and
//! always const (spec.md §3.3).

use std::collections::HashMap;

use crate::leader::Leader;
use crate::stub::{Stub, StubArena, StubId, SymbolStub};

#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Canonical (case-folded) spelling -> the first-interned Symbol id.
    canonical: HashMap<String, StubId>,
}

fn case_fold(s: &str) -> String {
    s.to_lowercase()
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Interns `text`. If a case-insensitively-equal symbol already exists,
    /// `text` is hung on its synonym chain (unless byte-identical, in which
    /// case the existing id is returned) per spec.md S6.
    pub fn intern(&mut self, text: &str, arena: &mut StubArena) -> StubId {
        let canonical_key = case_fold(text);

        if let Some(&head) = self.canonical.get(&canonical_key) {
            // Walk the synonym chain looking for a byte-identical spelling.
            let mut cursor = Some(head);
            let mut tail = head;
            while let Some(id) = cursor {
                let sym = arena.get(id).unwrap().as_symbol().unwrap();
                if &*sym.bytes == text {
                    return id;
                }
                tail = id;
                cursor = sym.synonym_next;
            }
            // New spelling of an existing canonical word: append to chain.
            let new_id = arena.make_stub(Stub::Symbol(SymbolStub {
                leader: Leader::NODE | Leader::MANAGED | Leader::FROZEN,
                bytes: text.into(),
                synonym_next: None,
            }));
            let tail_stub = arena.get_mut(tail).unwrap();
            if let Stub::Symbol(s) = tail_stub {
                s.synonym_next = Some(new_id);
            }
            return new_id;
        }

        let new_id = arena.make_stub(Stub::Symbol(SymbolStub {
            leader: Leader::NODE | Leader::MANAGED | Leader::FROZEN,
            bytes: text.into(),
            synonym_next: None,
        }));
        self.canonical.insert(canonical_key, new_id);
        new_id
    }

    /// Looks up an existing interned symbol without creating one.
    pub fn lookup(&self, text: &str, arena: &StubArena) -> Option<StubId> {
        let canonical_key = case_fold(text);
        let head = *self.canonical.get(&canonical_key)?;
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            let sym = arena.get(id).ok()?.as_symbol().ok()?;
            if &*sym.bytes == text {
                return Some(id);
            }
            cursor = sym.synonym_next;
        }
        None
    }

    /// Canonical-entry ids only; synonym chains are reached by following
    /// each entry's `synonym_next` (the GC's root-marking walk does this
    /// naturally when it traces a live Symbol Stub).
    pub fn canonical_ids(&self) -> impl Iterator<Item = StubId> + '_ {
        self.canonical.values().copied()
    }

    /// Are `a` and `b` synonyms of the same canonical word (case-fold
    /// equal), regardless of spelling?
    pub fn are_synonyms(&self, a: StubId, b: StubId, arena: &StubArena) -> bool {
        if a == b {
            return true;
        }
        let Ok(sa) = arena.get(a).and_then(|s| s.as_symbol()) else {
            return false;
        };
        let Ok(sb) = arena.get(b).and_then(|s| s.as_symbol()) else {
            return false;
        };
        case_fold(&sa.bytes) == case_fold(&sb.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_bytes_twice_returns_same_id() {
        let mut arena = StubArena::new();
        let mut table = SymbolTable::new();
        let a = table.intern("hello", &mut arena);
        let b = table.intern("hello", &mut arena);
        assert_eq!(a, b);
    }

    #[test]
    fn case_variants_are_synonyms_but_pointer_distinct() {
        let mut arena = StubArena::new();
        let mut table = SymbolTable::new();
        let lower = table.intern("hello", &mut arena);
        let upper = table.intern("HELLO", &mut arena);
        assert_ne!(lower, upper);
        assert!(table.are_synonyms(lower, upper, &arena));
    }

    #[test]
    fn symbols_are_managed_and_const() {
        let mut arena = StubArena::new();
        let mut table = SymbolTable::new();
        let id = table.intern("x", &mut arena);
        let leader = arena.get(id).unwrap().leader();
        assert!(leader.contains(Leader::MANAGED));
        assert!(leader.contains(Leader::FROZEN));
    }

    #[test]
    fn lookup_without_intern_does_not_create() {
        let arena = StubArena::new();
        let table = SymbolTable::new();
        assert!(table.lookup("missing", &arena).is_none());
    }
}
