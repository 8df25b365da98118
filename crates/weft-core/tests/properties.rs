//! Cross-cutting properties from spec.md §8 that span more than one
//! `weft-core` module, exercised as crate-level integration tests (unit
//! tests beside each module cover everything local to that module).

use weft_core::{
    stub, BinaryStub, Cell, CellPayload, Flavor, Flex, Leader, PoolConfig, PooledAllocator, Stub, StubArena, StringStub,
    SymbolTable,
};

/// Testable property #1: accessing a slot not declared for a Stub's flavor
/// is a detectable defect, not silently-wrong data — `Stub::as_*` returns
/// `Err(FlavorMismatch)` rather than reinterpreting bytes.
#[test]
fn flavor_mismatch_is_a_typed_error_not_silent_reinterpretation() {
    let mut arena = StubArena::new();
    let id = arena.make_stub(Stub::Binary(stub::new_binary(Flex::new_inline_empty(), true)));

    let stub = arena.get(id).unwrap();
    assert!(stub.as_array().is_err());
    assert!(stub.as_varlist().is_err());
    assert!(stub.as_symbol().is_err());
    assert!(stub.as_binary().is_ok());
}

/// Testable property #7 / scenario S6: interning the same word under two
/// different cases resolves to synonymous (not identical, unless
/// byte-identical) Symbol stubs sharing one synonym chain.
#[test]
fn case_variant_interning_shares_a_synonym_chain() {
    let mut arena = StubArena::new();
    let mut symtab = SymbolTable::new();

    let lower = symtab.intern("hello", &mut arena);
    let upper = symtab.intern("HELLO", &mut arena);
    let mixed = symtab.intern("Hello", &mut arena);
    let again = symtab.intern("hello", &mut arena);

    assert_ne!(lower, upper);
    assert_ne!(lower, mixed);
    assert_eq!(lower, again, "byte-identical spelling interns to the same id");

    assert!(symtab.are_synonyms(lower, upper, &arena));
    assert!(symtab.are_synonyms(upper, mixed, &arena));

    for id in [lower, upper, mixed] {
        let sym = arena.get(id).unwrap().as_symbol().unwrap();
        assert!(sym.leader.contains(Leader::FROZEN));
        assert!(sym.leader.contains(Leader::MANAGED));
    }
}

/// Testable property #8: Binary that is valid UTF-8, aliased as a String and
/// then aliased back to Binary, is byte-identical. Binary and String share
/// the same `Flex<u8>` backing discipline (spec.md §4.C); "aliasing" is
/// re-wrapping the same bytes under the other flavor's Stub, not a copy.
#[test]
fn utf8_binary_round_trips_through_string_byte_identical() {
    let mut pool = PooledAllocator::new(PoolConfig::default());
    let mut arena = StubArena::new();

    let original: &[u8] = "caf\u{e9}".as_bytes();
    let mut buf: Flex<u8> = Flex::new_dynamic(original.len().max(1), 1, &mut pool).unwrap();
    for &byte in original {
        buf.push(byte, &mut pool).unwrap();
    }
    let binary_id = arena.make_stub(Stub::Binary(stub::new_binary(buf, true)));

    // Alias as a String: same bytes, recomputed codepoint length.
    let bytes_copy = arena.get(binary_id).unwrap().as_binary().unwrap().buf.as_slice().to_vec();
    let text = std::str::from_utf8(&bytes_copy).expect("constructed from valid UTF-8");
    let codepoint_len = text.chars().count() as u32;

    let mut string_buf: Flex<u8> = Flex::new_dynamic(bytes_copy.len().max(1), 1, &mut pool).unwrap();
    for &byte in &bytes_copy {
        string_buf.push(byte, &mut pool).unwrap();
    }
    let string_id = arena.make_stub(Stub::Utf8String(StringStub {
        leader: Leader::NODE | Leader::MANAGED,
        buf: string_buf,
        codepoint_len,
        bookmarks: Vec::new(),
    }));

    let string_stub = arena.get(string_id).unwrap().as_string().unwrap();
    assert_eq!(string_stub.buf.as_slice(), original);
    assert_eq!(string_stub.codepoint_len, 4);

    // Alias back to Binary: still byte-identical.
    let back_bytes = string_stub.buf.as_slice().to_vec();
    let mut back_buf: Flex<u8> = Flex::new_dynamic(back_bytes.len().max(1), 1, &mut pool).unwrap();
    for &byte in &back_bytes {
        back_buf.push(byte, &mut pool).unwrap();
    }
    let round_tripped_id = arena.make_stub(Stub::Binary(stub::new_binary(back_buf, true)));
    assert_eq!(
        arena.get(round_tripped_id).unwrap().as_binary().unwrap().buf.as_slice(),
        original
    );
}

/// Testable property #6: once a Flex-backed Stub is frozen, the leader's
/// `access_violation` reports `Frozen` for any would-be mutator to check,
/// and existing content is unreachable for mutation through the Stub API
/// (`as_*_mut` still type-checks, but callers that gate on
/// `Leader::access_violation` — e.g. `weft-engine::context::set_var` — never
/// reach it).
#[test]
fn frozen_leader_surfaces_an_access_violation_reason() {
    let id_leader = Leader::NODE | Leader::MANAGED | Leader::FROZEN;
    assert_eq!(id_leader.access_violation(), Some(weft_core::AccessViolation::Frozen));

    let unlocked = Leader::NODE | Leader::MANAGED;
    assert_eq!(unlocked.access_violation(), None);

    // Held takes priority over frozen when both are set (spec.md §5
    // "surfacing the most informative error").
    let both = id_leader | Leader::HELD;
    assert_eq!(both.access_violation(), Some(weft_core::AccessViolation::Held));
}

/// Sanity check that a Binary's Flex survives a growth past its initial
/// inline/dynamic capacity without losing earlier content — the same
/// "index survives expansion" discipline scenario S5 exercises for Arrays,
/// confirmed here for the byte-oriented Flex instantiation.
#[test]
fn binary_flex_preserves_content_across_growth() {
    let mut pool = PooledAllocator::new(PoolConfig::default());
    let mut buf: Flex<u8> = Flex::new_dynamic(2, 1, &mut pool).unwrap();
    buf.push(b'a', &mut pool).unwrap();
    buf.push(b'b', &mut pool).unwrap();
    for i in 0..32u8 {
        buf.push(i, &mut pool).unwrap();
    }
    assert_eq!(buf.get(0).copied(), Some(b'a'));
    assert_eq!(buf.get(1).copied(), Some(b'b'));
    assert_eq!(buf.used(), 34);
}

/// `Cell` must stay within the size ceiling spec.md §4.C calls for
/// regardless of which payload variant is live, confirmed here (rather than
/// only in `cell.rs`'s own unit test) because it's a cross-module contract:
/// `weft-engine::level::Level` embeds several Cells directly.
#[test]
fn cell_does_not_exceed_its_size_budget() {
    assert!(std::mem::size_of::<Cell>() <= 24);
    let _ = CellPayload::Int(0);
    let _ = Flavor::Binary;
    let _: Option<BinaryStub> = None;
}
