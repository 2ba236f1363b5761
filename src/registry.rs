//! The context registry.
//!
//! Maps a native context handle to exactly one [`Context`] object, so two code
//! paths resolving "the context behind handle H" always observe the same
//! object. The registry is an explicit value passed through the API, never a
//! hidden static: tests create isolated registries, and dropping a registry
//! tears down whatever its contexts still own.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::context::{Context, ContextInner};
use crate::engine::NativeEngine;
use crate::handle::Handle;

pub(crate) struct RegistryInner {
    pub(crate) engine: Rc<dyn NativeEngine>,
    pub(crate) contexts: RefCell<FxHashMap<Handle, Rc<ContextInner>>>,
}

impl RegistryInner {
    /// Evict a context entry. Called exactly once, during context disposal.
    pub(crate) fn remove(&self, handle: Handle) {
        // Bind the removed entry so its drop runs after the borrow is
        // released; the entry may hold the last strong reference.
        let removed = self.contexts.borrow_mut().remove(&handle);
        drop(removed);
    }
}

/// Registry of live contexts for one engine.
///
/// Cloning is cheap and clones observe the same registry. The registry is
/// deliberately not `Send`: one context belongs to one thread, and separate
/// threads use separate registries over separate engine instances.
#[derive(Clone)]
pub struct Registry {
    pub(crate) inner: Rc<RegistryInner>,
}

impl Registry {
    /// Create a registry over an engine.
    #[must_use]
    pub fn new(engine: Rc<dyn NativeEngine>) -> Self {
        Registry {
            inner: Rc::new(RegistryInner {
                engine,
                contexts: RefCell::new(FxHashMap::default()),
            }),
        }
    }

    /// Create a fresh context owned by this registry.
    ///
    /// The returned context owns the native context handle and releases it on
    /// disposal (or when the last reference to it goes away).
    #[must_use]
    pub fn create_context(&self) -> Context {
        let handle = self.inner.engine.create_context();
        debug_assert!(!handle.is_null(), "engine returned a null context");
        debug!(context = %handle, "created context");
        let inner = ContextInner::new(handle, true, &self.inner);
        self.inner
            .contexts
            .borrow_mut()
            .insert(handle, inner.clone());
        Context { inner }
    }

    /// Resolve the single canonical [`Context`] for a native context handle.
    ///
    /// Returns the cached context if one exists; otherwise constructs a
    /// non-owning wrapper around the handle and caches it. A non-owning
    /// context never releases the native context on disposal.
    ///
    /// # Panics
    ///
    /// Panics on a null handle: asking for "the context behind null" is a
    /// programmer error, not a recoverable condition.
    #[must_use]
    pub fn get_or_create(&self, handle: Handle) -> Context {
        assert!(
            !handle.is_null(),
            "cannot resolve a context from a null handle"
        );
        let cached = self.inner.contexts.borrow().get(&handle).cloned();
        if let Some(inner) = cached {
            return Context { inner };
        }
        debug!(context = %handle, "wrapping foreign context");
        let inner = ContextInner::new(handle, false, &self.inner);
        self.inner
            .contexts
            .borrow_mut()
            .insert(handle, inner.clone());
        Context { inner }
    }

    /// Look up a context without creating one.
    #[must_use]
    pub fn context_for(&self, handle: Handle) -> Option<Context> {
        let cached = self.inner.contexts.borrow().get(&handle).cloned();
        cached.map(|inner| Context { inner })
    }

    /// Number of live contexts currently registered.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.inner.contexts.borrow().len()
    }

    /// The engine this registry wraps.
    #[must_use]
    pub fn engine(&self) -> Rc<dyn NativeEngine> {
        Rc::clone(&self.inner.engine)
    }
}
