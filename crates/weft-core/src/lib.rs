//! weft-core: the heterogeneous node heap.
//!
//! Owns the pooled allocator, the Stub arena, the Cell representation, the
//! Flex dynamic-content discipline, and the symbol table — spec.md
//! components A through D. Nothing here knows about an evaluator; Context,
//! Action, virtual binding, Level, the trampoline, and the GC live one layer
//! up in `weft-engine`, which depends on this crate.

pub mod cell;
pub mod config;
pub mod error;
pub mod flex;
pub mod leader;
pub mod pool;
pub mod stub;
pub mod symbol;

pub use cell::{Binding, Cell, CellFlags, CellPayload, SeriesRef, WordPayload};
pub use config::RuntimeConfig;
pub use error::{AccessViolation, CoreError, CoreResult};
pub use flex::Flex;
pub use leader::{Color, Flavor, Leader};
pub use pool::{PoolConfig, PoolStats, PooledAllocator};
pub use stub::{
    ArrayStub, BinaryStub, DetailsStub, DispatcherId, PatchKind, PatchStub, PatchTarget, Stub,
    StubArena, StubId, StringStub, SymbolStub, VarListStub,
};
pub use symbol::SymbolTable;
