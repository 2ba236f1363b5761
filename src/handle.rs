//! Opaque native handles.
//!
//! A [`Handle`] is the only thing the native engine ever gives us: an address
//! with no ownership or type information attached. Everything this crate does
//! is reconstructing identity, classification, and lifetime on top of it.

use std::fmt;

/// An opaque reference to a native object (context, module, value, type, or
/// metadata node).
///
/// Two handles are equal iff their addresses are equal. A handle never owns
/// memory; it is purely a lookup key into the caches kept by
/// [`Context`](crate::Context).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    /// The null handle, used by the engine to signal "absent".
    pub const NULL: Handle = Handle(0);

    /// Wrap a raw native address.
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Handle(raw)
    }

    /// The raw native address.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Whether this is the null handle.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        assert_eq!(Handle::from_raw(0x10), Handle::from_raw(0x10));
        assert_ne!(Handle::from_raw(0x10), Handle::from_raw(0x18));
    }

    #[test]
    fn null_detection() {
        assert!(Handle::NULL.is_null());
        assert!(!Handle::from_raw(1).is_null());
    }
}
