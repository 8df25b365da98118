//! Signal bits: halt / recycle / debug-break (spec.md §4.F, §6).
//!
//! Grounded on the teacher's `signal.rs`: a real Unix signal handler may only
//! perform async-signal-safe operations, so it does nothing but an atomic
//! store. All actual work happens later, at an explicit poll point. Design
//! Notes §9 asks for this as "an atomic bitset... a relaxed atomic OR is
//! sufficient given single-threaded consumer" — one `AtomicU8` replaces the
//! teacher's per-signal `AtomicBool` array, since we only have three bits
//! that matter to the trampoline.

use std::sync::atomic::{AtomicU8, Ordering};

pub const HALT: u8 = 0b001;
pub const RECYCLE: u8 = 0b010;
pub const DEBUG_BREAK: u8 = 0b100;

#[derive(Debug, Default)]
pub struct Signals {
    bits: AtomicU8,
}

impl Signals {
    pub fn new() -> Self {
        Signals::default()
    }

    /// Safe to call from a signal handler or another thread: a single
    /// atomic OR, nothing else (spec.md §6).
    pub fn raise(&self, bit: u8) {
        self.bits.fetch_or(bit, Ordering::Relaxed);
    }

    /// The trampoline's poll: reads the whole word non-atomically relative
    /// to any single bit (a plain load is enough for our single-threaded
    /// consumer; spec.md §6 only requires the *setter* side to be atomic).
    pub fn poll(&self) -> u8 {
        self.bits.load(Ordering::Relaxed)
    }

    pub fn is_set(&self, bit: u8) -> bool {
        self.poll() & bit != 0
    }

    pub fn clear(&self, bit: u8) {
        self.bits.fetch_and(!bit, Ordering::Relaxed);
    }

    pub fn clear_all(&self) {
        self.bits.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_and_clear_round_trip() {
        let signals = Signals::new();
        assert!(!signals.is_set(HALT));
        signals.raise(HALT);
        assert!(signals.is_set(HALT));
        signals.clear(HALT);
        assert!(!signals.is_set(HALT));
    }

    #[test]
    fn bits_are_independent() {
        let signals = Signals::new();
        signals.raise(RECYCLE);
        assert!(signals.is_set(RECYCLE));
        assert!(!signals.is_set(HALT));
        assert!(!signals.is_set(DEBUG_BREAK));
    }

    #[test]
    fn raising_twice_is_idempotent() {
        let signals = Signals::new();
        signals.raise(HALT);
        signals.raise(HALT);
        assert_eq!(signals.poll(), HALT);
    }
}
