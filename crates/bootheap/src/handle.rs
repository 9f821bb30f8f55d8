//! Payload pointers.
//!
//! A [`Ptr`] is the capability handed to clients by a successful allocation:
//! the byte offset of a payload within the arena. It carries no lifetime and
//! no ownership of the block metadata. Every use goes back through the
//! heap's address validator, so a stale or forged `Ptr` is rejected rather
//! than trusted.

use std::fmt;

/// Offset of an allocated payload within the arena.
///
/// Offset 0 is never a valid payload (the first header lives there), so
/// `Ptr::NULL` plays the role of the null pointer for callers that need
/// one, e.g. when bridging to C-style interfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct Ptr(pub(crate) u32);

impl Ptr {
    /// The null payload pointer. Never returned by an allocation.
    pub const NULL: Ptr = Ptr(0);

    /// Build a pointer from a raw arena offset.
    ///
    /// Nothing is checked here; the heap validates the offset whenever the
    /// pointer is used.
    pub const fn from_raw(offset: u32) -> Self {
        Self(offset)
    }

    /// The raw arena offset.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is [`Ptr::NULL`].
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ptr({:#06x})", self.0)
    }
}
