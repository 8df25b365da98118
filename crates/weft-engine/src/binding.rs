//! The virtual binding chain: Use/Let/Patch construction and lookup
//! (spec.md §3.4, §4.E).
//!
//! Per Design Notes §9 ("virtual binding as an immutable linked list"), each
//! Use/Let node is heap-allocated once and shared, deduplicated through a
//! small intern table keyed on `(parent, target, mode)`. A chain is a
//! singly-linked list of patches terminating in either a VarList Stub or
//! nullptr (`None`); walking it is the one lookup algorithm every Word
//! resolution goes through.

use std::collections::HashMap;

use weft_core::{PatchKind, PatchStub, PatchTarget, Stub, StubArena, StubId, SymbolTable};

use crate::context;

/// A binding chain head: `None` is the nullptr terminal (no binding at
/// all); `Some` is either a patch or a terminal VarList Stub.
pub type Specifier = Option<StubId>;

/// Where a resolved Word's value actually lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// Resolved through a Let: the value lives directly in the patch's cell.
    Let(StubId),
    /// Resolved through a Use or the terminal context: `context[index]`.
    Context { context: StubId, index: usize },
}

/// Intern key for Use-node dedup (Design Notes §9): same parent, same
/// target, same restriction mode never needs a second patch Stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct UseKey {
    parent: Option<StubId>,
    target: StubId,
    is_module: bool,
    set_words_only: bool,
}

#[derive(Debug, Default)]
pub struct InternTable {
    uses: HashMap<UseKey, StubId>,
}

impl InternTable {
    pub fn new() -> Self {
        InternTable::default()
    }
}

/// Constructs (or reuses) a Use patch wrapping `parent` with the bindings in
/// `defs` (a VarList or Module), per spec.md §4.E.
///
/// - If `defs` has no keys, `parent` is returned unchanged (no patch is
///   created for an empty binding set).
/// - If `parent` is already a Use over the same `(target, mode)`, the chain
///   is returned unchanged rather than double-wrapped.
/// - Otherwise a new Use is interned under `(parent, target, mode)` so
///   repeated binds of the same defs over the same parent share one Stub.
pub fn make_use(
    arena: &mut StubArena,
    defs: StubId,
    parent: Specifier,
    set_words_only: bool,
    is_module: bool,
    intern: &mut InternTable,
) -> weft_core::CoreResult<Specifier> {
    let captured_len = context::var_count(arena, defs)? as u32;
    if captured_len == 0 {
        return Ok(parent);
    }

    if let Some(p) = parent {
        if let Ok(patch) = arena.get(p)?.as_patch() {
            if let PatchKind::Use {
                target,
                set_words_only: existing_mode,
                ..
            } = &patch.kind
            {
                let same_target = match target {
                    PatchTarget::VarList(id) | PatchTarget::Module(id) => *id == defs,
                };
                if same_target && *existing_mode == set_words_only {
                    return Ok(parent);
                }
            }
        }
    }

    let key = UseKey {
        parent,
        target: defs,
        is_module,
        set_words_only,
    };
    if let Some(&existing) = intern.uses.get(&key) {
        return Ok(Some(existing));
    }

    let target = if is_module {
        PatchTarget::Module(defs)
    } else {
        PatchTarget::VarList(defs)
    };
    let id = arena.make_stub(Stub::Use(PatchStub {
        leader: weft_core::Leader::NODE | weft_core::Leader::MANAGED,
        kind: PatchKind::Use {
            target,
            captured_len,
            set_words_only,
        },
        cell: weft_core::Cell::blank(),
        next: parent,
        meta: None,
    }));
    intern.uses.insert(key, id);
    Ok(Some(id))
}

/// Constructs a Let binding exactly one symbol to `value`, chained in front
/// of `parent`. Lets are not deduplicated (each carries its own mutable
/// value slot, so sharing one would alias unrelated bindings).
pub fn make_let(arena: &mut StubArena, symbol: StubId, value: weft_core::Cell, parent: Specifier) -> Specifier {
    let id = arena.make_stub(Stub::Let(PatchStub {
        leader: weft_core::Leader::NODE | weft_core::Leader::MANAGED,
        kind: PatchKind::Let { symbol },
        cell: value,
        next: parent,
        meta: None,
    }));
    Some(id)
}

/// Walks the chain looking up `word`, per spec.md §4.E's two-step algorithm:
/// patch-by-patch (earlier shadows later), then a final lookup in the
/// terminal context. Returns `Ok(None)` for "unbound" rather than erroring —
/// callers that need `CoreError::Unbound` wrap this at the call site.
pub fn lookup(
    arena: &StubArena,
    symtab: &SymbolTable,
    specifier: Specifier,
    word: StubId,
    is_set_word: bool,
) -> weft_core::CoreResult<Option<Resolved>> {
    let mut cursor = specifier;
    loop {
        let Some(id) = cursor else {
            return Ok(None);
        };
        let stub = arena.get(id)?;
        match stub {
            Stub::Let(patch) => {
                let PatchKind::Let { symbol } = &patch.kind else {
                    unreachable!("Stub::Let always carries PatchKind::Let")
                };
                if *symbol == word || symtab.are_synonyms(*symbol, word, arena) {
                    return Ok(Some(Resolved::Let(id)));
                }
                cursor = patch.next;
            }
            Stub::Use(patch) => {
                let PatchKind::Use {
                    target,
                    captured_len,
                    set_words_only,
                } = &patch.kind
                else {
                    unreachable!("Stub::Use always carries PatchKind::Use")
                };
                if *set_words_only && !is_set_word {
                    cursor = patch.next;
                    continue;
                }
                let context_id = match target {
                    PatchTarget::VarList(id) | PatchTarget::Module(id) => *id,
                };
                if let Some(index) = context::lookup(arena, context_id, word, symtab)? {
                    if index < *captured_len as usize {
                        return Ok(Some(Resolved::Context {
                            context: context_id,
                            index,
                        }));
                    }
                }
                cursor = patch.next;
            }
            Stub::VarList(_) => {
                return Ok(context::lookup(arena, id, word, symtab)?.map(|index| Resolved::Context {
                    context: id,
                    index,
                }));
            }
            other => {
                return Err(weft_core::CoreError::FlavorMismatch {
                    stub: id,
                    expected: weft_core::Flavor::Use,
                    actual: other.flavor(),
                });
            }
        }
    }
}
