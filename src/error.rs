//! Error type for the binding layer.

use std::fmt;

use crate::handle::Handle;

/// Errors surfaced by the identity and lifetime layer.
///
/// Lifetime bugs get distinct variants (`ContextDisposed`, `ModuleDisposed`,
/// `ModuleTransferred`) so callers can tell a stale reference from a
/// misclassified one. Engine-reported failures carry the native message
/// verbatim; nothing is retried internally.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum BindError {
    /// A handle's live discriminant does not match the requested wrapper
    /// class. Never silently coerced; distinct from a null/absent handle,
    /// which resolves to `Ok(None)`.
    WrongKind {
        expected: &'static str,
        actual: String,
    },
    /// Operation on a context that has been disposed, or on a wrapper or
    /// module whose owning context has been disposed.
    ContextDisposed,
    /// Operation on a module that was explicitly disposed while its context
    /// is still alive.
    ModuleDisposed,
    /// Operation on a module whose contents were absorbed by a link; its
    /// handle was invalidated when ownership transferred.
    ModuleTransferred,
    /// A cache insert found an existing entry for a handle that should be
    /// new. Internal invariant violation; the existing entry is kept.
    DuplicateRegistration { handle: Handle },
    /// `link` across different contexts. No state was mutated; clone into a
    /// common context first.
    CrossContextLink,
    /// A module handle the context never registered. Module creation must go
    /// through module construction, so an unknown handle is a caller bug.
    UnknownModule { handle: Handle },
    /// Failure reported by the native engine (link, parse, verify). The
    /// engine's message is preserved verbatim.
    Native(String),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongKind { expected, actual } => {
                write!(f, "expected a {expected} handle but found {actual}")
            }
            Self::ContextDisposed => {
                write!(f, "use of a context that has already been disposed")
            }
            Self::ModuleDisposed => {
                write!(f, "use of a module that has already been disposed")
            }
            Self::ModuleTransferred => {
                write!(f, "use of a module whose ownership was transferred by a link")
            }
            Self::DuplicateRegistration { handle } => {
                write!(f, "handle {handle} is already registered")
            }
            Self::CrossContextLink => {
                write!(
                    f,
                    "linking modules from different contexts is not allowed; clone first"
                )
            }
            Self::UnknownModule { handle } => {
                write!(f, "module handle {handle} is not registered in this context")
            }
            Self::Native(msg) => write!(f, "native engine error: {msg}"),
        }
    }
}

impl std::error::Error for BindError {}
