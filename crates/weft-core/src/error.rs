//! Error kinds raised by the allocator, Stub, and Flex layers.
//!
//! These are the "infallible-excluded" failures from the taxonomy: pure
//! accessors and simple state updates never return `Result`, but anything
//! that allocates, re-flavors, or mutates a read-only Flex does.

use thiserror::Error;

use crate::leader::Flavor;
use crate::stub::StubId;

/// Relative priority among read-only reasons, most informative first.
///
/// `auto-locked > held > frozen-shallow > protected`, matching spec.md §5
/// ("surfacing the most informative error").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessViolation {
    #[error("auto-locked")]
    AutoLocked,
    #[error("held")]
    Held,
    #[error("frozen")]
    Frozen,
    #[error("protected")]
    Protected,
    #[error("inaccessible")]
    Inaccessible,
}

impl AccessViolation {
    fn priority(self) -> u8 {
        match self {
            AccessViolation::AutoLocked => 0,
            AccessViolation::Held => 1,
            AccessViolation::Frozen => 2,
            AccessViolation::Protected => 3,
            AccessViolation::Inaccessible => 4,
        }
    }

    /// Picks the most informative of two simultaneously-true reasons.
    pub fn most_informative(self, other: AccessViolation) -> AccessViolation {
        if self.priority() <= other.priority() { self } else { other }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("out of memory: requested {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("access violation: {0}")]
    AccessViolation(#[from] AccessViolation),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("flavor mismatch on stub {stub:?}: slot requires {expected:?}, stub is {actual:?}")]
    FlavorMismatch {
        stub: StubId,
        expected: Flavor,
        actual: Flavor,
    },

    #[error("stub {0:?} is inaccessible")]
    Inaccessible(StubId),

    #[error("unbound word {symbol:?}")]
    Unbound { symbol: StubId },
}

pub type CoreResult<T> = Result<T, CoreError>;
