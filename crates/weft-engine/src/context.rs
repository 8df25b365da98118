//! Context (VarList) and Action (Details) semantic operations (spec.md §4.D).
//!
//! The *shape* of these two arrays (archetype in slot 0, parallel keys/vars,
//! dispatcher + private slots) lives in `weft_core::stub` as plain data;
//! this module is the semantic layer on top — lookup, growth, and phase
//! re-entry — which is why it lives in `weft-engine` rather than
//! `weft-core` (spec.md's component table puts Context/Action one layer
//! above the leaf node heap).

use weft_core::{
    Cell, CoreError, CoreResult, DetailsStub, Flavor, Flex, PooledAllocator, Stub, StubArena, StubId, SymbolTable,
    VarListStub,
};

/// Slot 0 of a VarList: the archetype Cell, an `Object`/`Action` value
/// referring back to the VarList itself (spec.md §4.D).
pub fn archetype<'a>(arena: &'a StubArena, id: StubId) -> CoreResult<&'a Cell> {
    let vl = arena.get(id)?.as_varlist()?;
    vl.cells
        .get(0)
        .ok_or(CoreError::TypeMismatch {
            expected: "archetype at slot 0",
            found: "empty VarList",
        })
}

/// Number of key/var pairs, i.e. everything past the archetype.
pub fn var_count(arena: &StubArena, id: StubId) -> CoreResult<usize> {
    let vl = arena.get(id)?.as_varlist()?;
    Ok(vl.keys.len())
}

pub fn key_at(arena: &StubArena, id: StubId, index: usize) -> CoreResult<StubId> {
    let vl = arena.get(id)?.as_varlist()?;
    vl.keys.get(index).copied().ok_or(CoreError::TypeMismatch {
        expected: "key index in range",
        found: "out of range",
    })
}

pub fn get_var<'a>(arena: &'a StubArena, id: StubId, var_index: usize) -> CoreResult<&'a Cell> {
    let vl = arena.get(id)?.as_varlist()?;
    vl.cells.get(var_index + 1).ok_or(CoreError::TypeMismatch {
        expected: "var index in range",
        found: "out of range",
    })
}

pub fn set_var(arena: &mut StubArena, id: StubId, var_index: usize, value: Cell) -> CoreResult<()> {
    if let Some(violation) = arena.get(id)?.leader().access_violation() {
        return Err(violation.into());
    }
    let vl = arena.get_mut(id)?.as_varlist_mut()?;
    let slot = vl.cells.get_mut(var_index + 1).ok_or(CoreError::TypeMismatch {
        expected: "var index in range",
        found: "out of range",
    })?;
    *slot = value;
    Ok(())
}

/// Looks up `symbol` in the context, honoring the two lookup disciplines
/// spec.md §4.D distinguishes: linear scan for ordinary objects, hash
/// side-table for Modules. Returns the var index (0-based, i.e. already
/// offset past the archetype) on success.
///
/// For Modules, the hash table is last-write-wins: only the most recently
/// inserted binding for a given key is reachable this way, matching the
/// resolved Open Question ("ordering is never preserved for Modules").
pub fn lookup(arena: &StubArena, id: StubId, symbol: StubId, symtab: &SymbolTable) -> CoreResult<Option<usize>> {
    let vl = arena.get(id)?.as_varlist()?;
    if let Some(hash_index) = &vl.hash_index {
        return Ok(hash_index.get(&symbol).map(|&idx| idx as usize));
    }
    for (i, &key) in vl.keys.iter().enumerate() {
        if key == symbol || symtab.are_synonyms(key, symbol, arena) {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// Appends a new key/var pair. For a Module (one whose `hash_index` is
/// `Some`), the hash table is updated to point at the new slot even if the
/// key already existed at an earlier index — the earlier physical slot is
/// left in place (unreachable via lookup), per spec.md §4.D's "latest
/// binding wins" semantics.
pub fn append_var(
    arena: &mut StubArena,
    id: StubId,
    key: StubId,
    value: Cell,
    pool: &mut PooledAllocator,
) -> CoreResult<usize> {
    if let Some(violation) = arena.get(id)?.leader().access_violation() {
        return Err(violation.into());
    }
    let vl = arena.get_mut(id)?.as_varlist_mut()?;
    let new_index = vl.keys.len();
    vl.cells.push(value, pool)?;
    vl.keys.push(key);
    if let Some(hash_index) = &mut vl.hash_index {
        hash_index.insert(key, new_index as u32);
    }
    Ok(new_index)
}

/// Marks `id` as a Module by installing an (initially-empty) hash
/// side-table, re-indexing any keys already present.
pub fn make_module(arena: &mut StubArena, id: StubId) -> CoreResult<()> {
    let vl = arena.get_mut(id)?.as_varlist_mut()?;
    let mut hash_index = std::collections::HashMap::with_capacity(vl.keys.len());
    for (i, &key) in vl.keys.iter().enumerate() {
        hash_index.insert(key, i as u32);
    }
    vl.hash_index = Some(hash_index);
    Ok(())
}

pub fn phase(arena: &StubArena, id: StubId) -> CoreResult<Option<StubId>> {
    Ok(arena.get(id)?.as_varlist()?.phase)
}

/// Re-enters the same VarList under a different Details phase — how
/// adaptations/specializations/hijacks compose without duplicating the
/// argument storage (spec.md §4.D).
pub fn set_phase(arena: &mut StubArena, id: StubId, phase: Option<StubId>) -> CoreResult<()> {
    arena.get_mut(id)?.as_varlist_mut()?.phase = phase;
    Ok(())
}

pub fn dispatcher(arena: &StubArena, id: StubId) -> CoreResult<weft_core::DispatcherId> {
    Ok(arena.get(id)?.as_details()?.dispatcher)
}

pub fn param_count(arena: &StubArena, id: StubId) -> CoreResult<usize> {
    Ok(arena.get(id)?.as_details()?.params.used())
}

pub fn private_slot<'a>(arena: &'a StubArena, id: StubId, index: usize) -> CoreResult<&'a Cell> {
    let details = arena.get(id)?.as_details()?;
    details.private.get(index).ok_or(CoreError::TypeMismatch {
        expected: "private slot in range",
        found: "out of range",
    })
}

/// Builds a fresh, empty VarList whose archetype refers back to itself.
/// `managed` mirrors spec.md §4.B: callers get to choose whether the new
/// Stub lands on the manuals stack or is born already GC-owned.
pub fn new_varlist(arena: &mut StubArena, managed: bool) -> StubId {
    let mut leader = weft_core::Leader::NODE;
    if managed {
        leader.insert(weft_core::Leader::MANAGED);
    }
    let id = arena.make_stub(Stub::VarList(VarListStub {
        leader,
        cells: Flex::new_inline_one(Cell::blank()),
        keys: Vec::new(),
        phase: None,
        hash_index: None,
    }));
    // The archetype is an Object cell pointing back at the VarList's own id
    // so holders of a value alone can recover the context (spec.md §4.D).
    let _ = set_archetype(arena, id);
    id
}

fn set_archetype(arena: &mut StubArena, id: StubId) -> CoreResult<()> {
    let vl = arena.get_mut(id)?.as_varlist_mut()?;
    if let Some(slot) = vl.cells.get_mut(0) {
        *slot = Cell::new(weft_core::CellPayload::Object(id));
    }
    Ok(())
}

pub fn new_details(
    arena: &mut StubArena,
    dispatcher: weft_core::DispatcherId,
    params: Flex<Cell>,
    private: Vec<Cell>,
    managed: bool,
) -> StubId {
    let mut leader = weft_core::Leader::NODE;
    if managed {
        leader.insert(weft_core::Leader::MANAGED);
    }
    arena.make_stub(Stub::Details(DetailsStub {
        leader,
        params,
        dispatcher,
        private,
    }))
}

pub fn flavor_of(arena: &StubArena, id: StubId) -> CoreResult<Flavor> {
    Ok(arena.get(id)?.flavor())
}

/// Marks a reified VarList as the live frame of an executing Level
/// (spec.md §4.F). Cleared by `mark_not_running` on `drop_level`.
pub fn mark_running(arena: &mut StubArena, id: StubId) -> CoreResult<()> {
    arena.get_mut(id)?.leader_mut().insert(weft_core::Leader::RUNNING);
    Ok(())
}

pub fn mark_not_running(arena: &mut StubArena, id: StubId) -> CoreResult<()> {
    arena.get_mut(id)?.leader_mut().remove(weft_core::Leader::RUNNING);
    Ok(())
}

pub fn is_running(arena: &StubArena, id: StubId) -> CoreResult<bool> {
    Ok(arena.get(id)?.leader().contains(weft_core::Leader::RUNNING))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{CellPayload, PoolConfig};

    fn make_symbol(arena: &mut StubArena, symtab: &mut SymbolTable, text: &str) -> StubId {
        symtab.intern(text, arena)
    }

    #[test]
    fn linear_scan_finds_existing_key() {
        let mut arena = StubArena::new();
        let mut symtab = SymbolTable::new();
        let mut pool = PooledAllocator::new(PoolConfig::default());
        let id = new_varlist(&mut arena, true);
        let a = make_symbol(&mut arena, &mut symtab, "a");
        let b = make_symbol(&mut arena, &mut symtab, "b");
        append_var(&mut arena, id, a, Cell::new(CellPayload::Int(1)), &mut pool).unwrap();
        append_var(&mut arena, id, b, Cell::new(CellPayload::Int(2)), &mut pool).unwrap();

        assert_eq!(lookup(&arena, id, b, &symtab).unwrap(), Some(1));
        assert_eq!(get_var(&arena, id, 1).unwrap().payload, CellPayload::Int(2));
    }

    #[test]
    fn set_var_on_a_frozen_context_is_an_access_violation() {
        let mut arena = StubArena::new();
        let mut symtab = SymbolTable::new();
        let mut pool = PooledAllocator::new(PoolConfig::default());
        let id = new_varlist(&mut arena, true);
        let a = make_symbol(&mut arena, &mut symtab, "a");
        append_var(&mut arena, id, a, Cell::new(CellPayload::Int(1)), &mut pool).unwrap();

        arena.get_mut(id).unwrap().leader_mut().insert(weft_core::Leader::FROZEN);

        let err = set_var(&mut arena, id, 0, Cell::new(CellPayload::Int(2))).unwrap_err();
        assert!(matches!(err, CoreError::AccessViolation(weft_core::AccessViolation::Frozen)));
        // Contents are untouched (testable property #6).
        assert_eq!(get_var(&arena, id, 0).unwrap().payload, CellPayload::Int(1));

        let err = append_var(&mut arena, id, a, Cell::new(CellPayload::Int(3)), &mut pool).unwrap_err();
        assert!(matches!(err, CoreError::AccessViolation(weft_core::AccessViolation::Frozen)));
    }

    #[test]
    fn module_hash_latest_wins_on_shadow() {
        let mut arena = StubArena::new();
        let mut symtab = SymbolTable::new();
        let mut pool = PooledAllocator::new(PoolConfig::default());
        let id = new_varlist(&mut arena, true);
        make_module(&mut arena, id).unwrap();

        let key = make_symbol(&mut arena, &mut symtab, "x");
        append_var(&mut arena, id, key, Cell::new(CellPayload::Int(1)), &mut pool).unwrap();
        append_var(&mut arena, id, key, Cell::new(CellPayload::Int(2)), &mut pool).unwrap();

        let found = lookup(&arena, id, key, &symtab).unwrap().unwrap();
        assert_eq!(get_var(&arena, id, found).unwrap().payload, CellPayload::Int(2));
        // The earlier binding still physically exists but is unreachable.
        assert_eq!(var_count(&arena, id).unwrap(), 2);
    }

    #[test]
    fn archetype_refers_back_to_its_own_varlist() {
        let mut arena = StubArena::new();
        let id = new_varlist(&mut arena, true);
        match archetype(&arena, id).unwrap().payload {
            CellPayload::Object(archetype_id) => assert_eq!(archetype_id, id),
            other => panic!("expected Object archetype, got {other:?}"),
        }
    }

    #[test]
    fn set_phase_round_trips() {
        let mut arena = StubArena::new();
        let id = new_varlist(&mut arena, true);
        assert_eq!(phase(&arena, id).unwrap(), None);
        let phase_id = StubId::from_raw(99);
        set_phase(&mut arena, id, Some(phase_id)).unwrap();
        assert_eq!(phase(&arena, id).unwrap(), Some(phase_id));
    }
}
