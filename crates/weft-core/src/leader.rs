//! Leader flags and the Flavor tag.
//!
//! The teacher's `Value`/`StackValue` pair tags a value with a cheap
//! discriminant and keeps the per-variant payload out of the hot header; the
//! same trick applies one level up here. `Leader` is the cold, uniform part
//! of every Stub (reachability/color bookkeeping); `Flavor` is the tag that
//! tells a caller which of Stub's variant fields are legal to touch.

use bitflags::bitflags;

bitflags! {
    /// Flag bits common to every live Stub, independent of flavor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Leader: u16 {
        /// Distinguishes a real Stub from free/raw memory at a byte-level probe.
        const NODE         = 0b0000_0000_0001;
        /// GC-owned (vs. manually-owned, tracked on the manuals stack).
        const MANAGED      = 0b0000_0000_0010;
        /// Contents freed but identity retained (spec.md §3.1, §4.B `decay`).
        const INACCESSIBLE = 0b0000_0000_0100;
        /// GC mark: gray (on the work list, not yet fully scanned).
        const MARK_GRAY    = 0b0000_0000_1000;
        /// GC mark: black (scanned, reachable). Absence of both GRAY and
        /// BLACK means white (candidate for sweep).
        const MARK_BLACK   = 0b0000_0001_0000;
        /// Read-only because the evaluator currently holds (is reading) it.
        const HELD         = 0b0000_0010_0000;
        /// Read-only because a native explicitly protected it.
        const PROTECTED    = 0b0000_0100_0000;
        /// Read-only because it was frozen (permanently, shallow).
        const FROZEN       = 0b0000_1000_0000;
        /// Read-only because the runtime auto-locked it (e.g. a Map key set).
        const AUTO_LOCKED  = 0b0001_0000_0000;
        /// VarList-specific: currently the live frame of an executing Level
        /// (spec.md §4.F "drop_level... marks the VarList as no-longer-running").
        const RUNNING      = 0b0010_0000_0000;
    }
}

/// Tri-color GC state, re-derived from the two mark bits in `Leader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Gray,
    Black,
}

impl Leader {
    pub fn color(self) -> Color {
        if self.contains(Leader::MARK_BLACK) {
            Color::Black
        } else if self.contains(Leader::MARK_GRAY) {
            Color::Gray
        } else {
            Color::White
        }
    }

    pub fn set_color(&mut self, color: Color) {
        self.remove(Leader::MARK_GRAY | Leader::MARK_BLACK);
        match color {
            Color::White => {}
            Color::Gray => self.insert(Leader::MARK_GRAY),
            Color::Black => self.insert(Leader::MARK_BLACK),
        }
    }

    /// The most informative read-only reason currently set, if any.
    pub fn access_violation(self) -> Option<crate::error::AccessViolation> {
        use crate::error::AccessViolation::*;
        // Priority order matches AccessViolation::most_informative.
        if self.contains(Leader::AUTO_LOCKED) {
            Some(AutoLocked)
        } else if self.contains(Leader::HELD) {
            Some(Held)
        } else if self.contains(Leader::FROZEN) {
            Some(Frozen)
        } else if self.contains(Leader::PROTECTED) {
            Some(Protected)
        } else {
            None
        }
    }
}

/// One-byte-wide tag selecting a Stub's slot interpretation.
///
/// Accessing a field not declared legal for a Stub's flavor is a defect
/// (spec.md §3.1, testable property #1); `weft_core::stub` enforces this by
/// matching on the flavor-carrying enum variant, so an illegal access simply
/// fails to compile or type-checks against the wrong variant — the Rust-native
/// replacement for a debug-only runtime assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Binary,
    Utf8String,
    Symbol,
    Array,
    VarList,
    Details,
    Use,
    Let,
}

impl Flavor {
    /// Byte width of one dynamic-buffer element for this flavor.
    pub const fn element_width(self) -> usize {
        match self {
            Flavor::Binary | Flavor::Utf8String | Flavor::Symbol => 1,
            Flavor::Array | Flavor::VarList | Flavor::Details => std::mem::size_of::<crate::cell::Cell>(),
            Flavor::Use | Flavor::Let => std::mem::size_of::<crate::cell::Cell>(),
        }
    }

    /// Whether this flavor's dynamic content is an array of Cells (as
    /// opposed to raw bytes) — the GC must scan element-wise as Cells.
    pub const fn is_array_flavor(self) -> bool {
        matches!(self, Flavor::Array | Flavor::VarList | Flavor::Details)
    }

    pub const fn is_series_flavor(self) -> bool {
        matches!(
            self,
            Flavor::Binary | Flavor::Utf8String | Flavor::Symbol | Flavor::Array | Flavor::VarList | Flavor::Details
        )
    }

    pub const fn is_patch_flavor(self) -> bool {
        matches!(self, Flavor::Use | Flavor::Let)
    }
}
