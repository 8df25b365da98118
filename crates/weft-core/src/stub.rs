//! Stub: the 8-word heap node primitive (spec.md §3.1, §4.B).
//!
//! Per Design Notes §9 ("Arena + indices for the heap"), Stubs are addressed
//! by a 32-bit handle (`StubId`) into a single arena rather than by raw
//! pointer. This removes the need for pointer-corruption sentinels and lets
//! the "inaccessible" state be represented directly instead of simulated by
//! poisoning a freed pointer.

use std::collections::HashMap;

use crate::cell::Cell;
use crate::error::{CoreError, CoreResult};
use crate::flex::Flex;
use crate::leader::{Flavor, Leader};
use crate::pool::PooledAllocator;

/// Arena handle. `0` is never issued, so `Option<StubId>` niches for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StubId(u32);

impl StubId {
    pub fn from_raw(raw: u32) -> Self {
        StubId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark {
    pub byte_offset: u32,
    pub codepoint_index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryStub {
    pub leader: Leader,
    pub buf: Flex<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringStub {
    pub leader: Leader,
    pub buf: Flex<u8>,
    /// Cached codepoint count, maintained atomically with `buf`'s byte count
    /// from the caller's perspective (spec.md §4.C).
    pub codepoint_len: u32,
    /// Byte-offset -> codepoint-index fast-lookup entries.
    pub bookmarks: Vec<Bookmark>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolStub {
    pub leader: Leader,
    pub bytes: Box<str>,
    /// Head of the synonym (case-variant) chain; symbols are always managed
    /// and always const (spec.md §3.3).
    pub synonym_next: Option<StubId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayStub {
    pub leader: Leader,
    pub cells: Flex<Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarListStub {
    pub leader: Leader,
    /// Slot 0 is the archetype; slots 1.. are vars, parallel to `keys`.
    pub cells: Flex<Cell>,
    /// Symbol ids parallel to `cells[1..]`.
    pub keys: Vec<StubId>,
    /// Current phase (Details) this VarList's archetype is re-entering
    /// under, for composed actions (spec.md §4.D).
    pub phase: Option<StubId>,
    /// Present only for Modules: hash side-table, last-write-wins, no
    /// ordering preserved (spec.md §4.D, Open Question #2).
    pub hash_index: Option<HashMap<StubId, u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct DetailsStub {
    pub leader: Leader,
    pub params: Flex<Cell>,
    pub dispatcher: DispatcherId,
    pub private: Vec<Cell>,
}

/// What a Use patches over: either a VarList or a Module (spec.md §4.E
/// distinguishes ordinary VarList linear scan from Module hash lookup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget {
    VarList(StubId),
    Module(StubId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchKind {
    /// A Use: either a Word bound into `target` (captured at the context's
    /// then-current length) or a direct Module reference.
    Use {
        target: PatchTarget,
        /// Size of the target context captured at creation time, so cached
        /// lookups stay valid across later growth (spec.md §4.E rationale).
        captured_len: u32,
        /// Restricts resolution to set-words only.
        set_words_only: bool,
    },
    /// A Let: exactly one binding.
    Let { symbol: StubId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchStub {
    pub leader: Leader,
    pub kind: PatchKind,
    /// The single bound cell.
    pub cell: Cell,
    /// The next chain element: either another patch, or a terminal
    /// VarList. `None` means the chain terminates at nullptr (no binding
    /// below this patch at all).
    pub next: Option<StubId>,
    /// Meta context, kept distinct from `next` per Open Question #3.
    pub meta: Option<StubId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stub {
    Binary(BinaryStub),
    Utf8String(StringStub),
    Symbol(SymbolStub),
    Array(ArrayStub),
    VarList(VarListStub),
    Details(DetailsStub),
    Use(PatchStub),
    Let(PatchStub),
}

impl Stub {
    pub fn flavor(&self) -> Flavor {
        match self {
            Stub::Binary(_) => Flavor::Binary,
            Stub::Utf8String(_) => Flavor::Utf8String,
            Stub::Symbol(_) => Flavor::Symbol,
            Stub::Array(_) => Flavor::Array,
            Stub::VarList(_) => Flavor::VarList,
            Stub::Details(_) => Flavor::Details,
            Stub::Use(_) => Flavor::Use,
            Stub::Let(_) => Flavor::Let,
        }
    }

    pub fn leader(&self) -> Leader {
        match self {
            Stub::Binary(s) => s.leader,
            Stub::Utf8String(s) => s.leader,
            Stub::Symbol(s) => s.leader,
            Stub::Array(s) => s.leader,
            Stub::VarList(s) => s.leader,
            Stub::Details(s) => s.leader,
            Stub::Use(s) => s.leader,
            Stub::Let(s) => s.leader,
        }
    }

    pub fn leader_mut(&mut self) -> &mut Leader {
        match self {
            Stub::Binary(s) => &mut s.leader,
            Stub::Utf8String(s) => &mut s.leader,
            Stub::Symbol(s) => &mut s.leader,
            Stub::Array(s) => &mut s.leader,
            Stub::VarList(s) => &mut s.leader,
            Stub::Details(s) => &mut s.leader,
            Stub::Use(s) => &mut s.leader,
            Stub::Let(s) => &mut s.leader,
        }
    }

    pub fn as_array(&self) -> CoreResult<&ArrayStub> {
        match self {
            Stub::Array(s) => Ok(s),
            other => Err(flavor_mismatch(Flavor::Array, other.flavor())),
        }
    }

    pub fn as_array_mut(&mut self) -> CoreResult<&mut ArrayStub> {
        let flavor = self.flavor();
        match self {
            Stub::Array(s) => Ok(s),
            _ => Err(flavor_mismatch(Flavor::Array, flavor)),
        }
    }

    pub fn as_varlist(&self) -> CoreResult<&VarListStub> {
        match self {
            Stub::VarList(s) => Ok(s),
            other => Err(flavor_mismatch(Flavor::VarList, other.flavor())),
        }
    }

    pub fn as_varlist_mut(&mut self) -> CoreResult<&mut VarListStub> {
        let flavor = self.flavor();
        match self {
            Stub::VarList(s) => Ok(s),
            _ => Err(flavor_mismatch(Flavor::VarList, flavor)),
        }
    }

    pub fn as_details(&self) -> CoreResult<&DetailsStub> {
        match self {
            Stub::Details(s) => Ok(s),
            other => Err(flavor_mismatch(Flavor::Details, other.flavor())),
        }
    }

    pub fn as_symbol(&self) -> CoreResult<&SymbolStub> {
        match self {
            Stub::Symbol(s) => Ok(s),
            other => Err(flavor_mismatch(Flavor::Symbol, other.flavor())),
        }
    }

    pub fn as_patch(&self) -> CoreResult<&PatchStub> {
        match self {
            Stub::Use(s) | Stub::Let(s) => Ok(s),
            other => Err(flavor_mismatch(Flavor::Use, other.flavor())),
        }
    }

    pub fn as_patch_mut(&mut self) -> CoreResult<&mut PatchStub> {
        let flavor = self.flavor();
        match self {
            Stub::Use(s) | Stub::Let(s) => Ok(s),
            _ => Err(flavor_mismatch(Flavor::Use, flavor)),
        }
    }

    pub fn as_string(&self) -> CoreResult<&StringStub> {
        match self {
            Stub::Utf8String(s) => Ok(s),
            other => Err(flavor_mismatch(Flavor::Utf8String, other.flavor())),
        }
    }

    pub fn as_binary(&self) -> CoreResult<&BinaryStub> {
        match self {
            Stub::Binary(s) => Ok(s),
            other => Err(flavor_mismatch(Flavor::Binary, other.flavor())),
        }
    }
}

/// `Stub::as_*` accessors don't carry their own id, so the error carries a
/// placeholder; callers that have the id (the arena, the GC) report it
/// themselves via `CoreError::FlavorMismatch` constructed directly.
fn flavor_mismatch(expected: Flavor, actual: Flavor) -> CoreError {
    CoreError::FlavorMismatch {
        stub: StubId(0),
        expected,
        actual,
    }
}

/// What an arena slot currently holds.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Free,
    Live(Stub),
    /// `decay`ed: identity and leader retained, content gone (spec.md §4.B).
    /// Keeping `Leader` (rather than discarding it) lets the GC still see
    /// the managed bit and any held count on a decayed Stub it traces.
    Inaccessible(Leader),
}

/// The single arena all Stubs live in, indexed by `StubId`.
#[derive(Debug, Default)]
pub struct StubArena {
    slots: Vec<Slot>,
    free_ids: Vec<u32>,
}

impl StubArena {
    pub fn new() -> Self {
        StubArena {
            slots: Vec::new(),
            free_ids: Vec::new(),
        }
    }

    /// Allocates a new Stub. Per spec.md §4.B, the caller decides managed
    /// vs. manual at this layer only by choosing the leader bit; pushing
    /// unmanaged stubs onto the manuals stack is the engine's job (manuals
    /// is an evaluator-level concept, spec.md §4.J, component J).
    pub fn make_stub(&mut self, stub: Stub) -> StubId {
        if let Some(raw) = self.free_ids.pop() {
            self.slots[raw as usize] = Slot::Live(stub);
            StubId(raw)
        } else {
            let raw = self.slots.len() as u32;
            self.slots.push(Slot::Live(stub));
            StubId(raw)
        }
    }

    pub fn get(&self, id: StubId) -> CoreResult<&Stub> {
        match self.slots.get(id.0 as usize) {
            Some(Slot::Live(s)) => Ok(s),
            _ => Err(CoreError::Inaccessible(id)),
        }
    }

    pub fn get_mut(&mut self, id: StubId) -> CoreResult<&mut Stub> {
        match self.slots.get_mut(id.0 as usize) {
            Some(Slot::Live(s)) => Ok(s),
            _ => Err(CoreError::Inaccessible(id)),
        }
    }

    pub fn is_live(&self, id: StubId) -> bool {
        matches!(self.slots.get(id.0 as usize), Some(Slot::Live(_)))
    }

    pub fn is_inaccessible(&self, id: StubId) -> bool {
        matches!(self.slots.get(id.0 as usize), Some(Slot::Inaccessible(_)))
    }

    /// The leader of a Live or Inaccessible slot, for callers (the GC, the
    /// hold tracker) that need the header regardless of content state.
    pub fn leader_of(&self, id: StubId) -> CoreResult<Leader> {
        match self.slots.get(id.0 as usize) {
            Some(Slot::Live(s)) => Ok(s.leader()),
            Some(Slot::Inaccessible(l)) => Ok(*l),
            _ => Err(CoreError::Inaccessible(id)),
        }
    }

    /// Clears user content (releasing any buffers back to `pool`), marks
    /// the slot inaccessible, but keeps the id occupied and its leader
    /// intact so existing references test `is_inaccessible` rather than
    /// aliasing a freed or reused slot (spec.md §4.B).
    pub fn decay(&mut self, id: StubId, pool: &mut crate::pool::PooledAllocator) -> CoreResult<()> {
        let idx = id.0 as usize;
        match self.slots.get_mut(idx) {
            Some(slot @ Slot::Live(_)) => {
                let Slot::Live(stub) = std::mem::replace(slot, Slot::Free) else {
                    unreachable!()
                };
                let mut leader = stub.leader();
                leader.insert(Leader::INACCESSIBLE);
                release_buffers(stub, pool);
                self.slots[idx] = Slot::Inaccessible(leader);
                Ok(())
            }
            _ => Err(CoreError::Inaccessible(id)),
        }
    }

    /// Releases a Stub's identity back to the free list. Per spec.md §4.B,
    /// killing a managed Stub outside GC is forbidden — that check is the
    /// GC's responsibility (it is the only caller that may kill a managed
    /// stub); this method only enforces that the slot exists.
    pub fn kill(&mut self, id: StubId) -> CoreResult<Stub> {
        match self.slots.get_mut(id.0 as usize) {
            Some(slot @ Slot::Live(_)) => {
                let Slot::Live(stub) = std::mem::replace(slot, Slot::Free) else {
                    unreachable!()
                };
                self.free_ids.push(id.0);
                Ok(stub)
            }
            Some(slot @ Slot::Inaccessible(_)) => {
                *slot = Slot::Free;
                self.free_ids.push(id.0);
                Err(CoreError::Inaccessible(id))
            }
            _ => Err(CoreError::Inaccessible(id)),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = StubId> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| match s {
            Slot::Live(_) => Some(StubId(i as u32)),
            _ => None,
        })
    }

    /// All occupied ids, live or decayed-but-identity-retained — the set
    /// the GC's sweep phase must consider (spec.md §4.I: an inaccessible
    /// Stub "still traces its identity").
    pub fn occupied_ids(&self) -> impl Iterator<Item = StubId> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| match s {
            Slot::Live(_) | Slot::Inaccessible(_) => Some(StubId(i as u32)),
            Slot::Free => None,
        })
    }
}

/// Convenience constructors for the common empty/singular shapes
/// (spec.md §4.C: "an empty array is an inline poisoned cell; a one-element
/// array is an inline ordinary cell").
pub fn new_array(cells: Flex<Cell>, managed: bool) -> ArrayStub {
    let mut leader = Leader::NODE;
    if managed {
        leader.insert(Leader::MANAGED);
    }
    ArrayStub { leader, cells }
}

pub fn new_binary(buf: Flex<u8>, managed: bool) -> BinaryStub {
    let mut leader = Leader::NODE;
    if managed {
        leader.insert(Leader::MANAGED);
    }
    BinaryStub { leader, buf }
}

pub fn release_buffers(stub: Stub, pool: &mut PooledAllocator) {
    match stub {
        Stub::Binary(s) => s.buf.release(pool),
        Stub::Utf8String(s) => s.buf.release(pool),
        Stub::Array(s) => s.cells.release(pool),
        Stub::VarList(s) => s.cells.release(pool),
        Stub::Details(s) => s.params.release(pool),
        Stub::Symbol(_) | Stub::Use(_) | Stub::Let(_) => {}
    }
}
