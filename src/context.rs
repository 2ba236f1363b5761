//! Context lifetime and the per-context caches.
//!
//! A [`Context`] is the lifetime root of the object graph: every module,
//! value, type, and metadata wrapper belongs to exactly one context, and
//! disposing the context invalidates them all at once. The context keeps two
//! caches: the module map (weak references, so a dropped module does not
//! linger) and the wrapper cache consulted by the factory in `factory.rs`.
//!
//! Disposal is idempotent and ordered: ancillary objects first, then modules,
//! then the native context itself when we own it.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::debug_info::DebugConfig;
use crate::engine::NativeEngine;
use crate::error::BindError;
use crate::factory::CachedWrapper;
use crate::handle::Handle;
use crate::module::{Detach, Module, ModuleInner};
use crate::registry::RegistryInner;

pub(crate) struct ContextInner {
    pub(crate) handle: Handle,
    /// Whether disposal releases the native context. False for contexts the
    /// registry merely wrapped around a foreign handle.
    pub(crate) owned: bool,
    pub(crate) disposed: Cell<bool>,
    pub(crate) engine: Rc<dyn NativeEngine>,
    pub(crate) registry: Weak<RegistryInner>,
    pub(crate) modules: RefCell<FxHashMap<Handle, Weak<ModuleInner>>>,
    pub(crate) wrappers: RefCell<FxHashMap<Handle, CachedWrapper>>,
}

impl ContextInner {
    pub(crate) fn new(handle: Handle, owned: bool, registry: &Rc<RegistryInner>) -> Rc<Self> {
        Rc::new(ContextInner {
            handle,
            owned,
            disposed: Cell::new(false),
            engine: Rc::clone(&registry.engine),
            registry: Rc::downgrade(registry),
            modules: RefCell::new(FxHashMap::default()),
            wrappers: RefCell::new(FxHashMap::default()),
        })
    }

    pub(crate) fn ensure_alive(&self) -> Result<(), BindError> {
        if self.disposed.get() {
            Err(BindError::ContextDisposed)
        } else {
            Ok(())
        }
    }

    /// Register a freshly created module. Rejects a handle that is already
    /// registered; the existing entry stays untouched.
    pub(crate) fn add_module(&self, module: &Rc<ModuleInner>) -> Result<(), BindError> {
        let handle = module.handle();
        let mut modules = self.modules.borrow_mut();
        if modules.contains_key(&handle) {
            return Err(BindError::DuplicateRegistration { handle });
        }
        modules.insert(handle, Rc::downgrade(module));
        Ok(())
    }

    pub(crate) fn remove_module(&self, handle: Handle) {
        self.modules.borrow_mut().remove(&handle);
    }

    /// Tear down the context. Safe to call any number of times; only the
    /// first call does work.
    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        debug!(context = %self.handle, owned = self.owned, "disposing context");
        // Detach modules before the native context goes away. Detaching also
        // releases each module's debug-info builder and layout, which must
        // not outlive the module they reference.
        let modules: Vec<Weak<ModuleInner>> = self
            .modules
            .borrow_mut()
            .drain()
            .map(|(_, module)| module)
            .collect();
        for weak in modules {
            if let Some(module) = weak.upgrade() {
                let handle = module.detach(Detach::ContextDisposed);
                if !handle.is_null() {
                    self.engine.dispose_module(handle);
                }
            }
        }
        self.wrappers.borrow_mut().clear();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.handle);
        }
        if self.owned {
            self.engine.dispose_context(self.handle);
        }
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A native context: the lifetime root for modules, values, types, and
/// metadata.
///
/// Clones observe the same context; equality is identity. All wrapper
/// resolution goes through [`Context::resolve`] and friends so that a handle
/// maps to exactly one wrapper object for the context's whole lifetime.
#[derive(Clone)]
pub struct Context {
    pub(crate) inner: Rc<ContextInner>,
}

impl Context {
    /// The native context handle.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.inner.handle
    }

    /// Whether this context has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Create a module inside this context. The context keeps ultimate
    /// ownership: disposing the context disposes the module.
    pub fn create_module(&self, name: &str) -> Result<Module, BindError> {
        Module::create_with(self, name, false)
    }

    /// Create a module and attach a debug-info compile unit to it in one
    /// step.
    pub fn create_module_with_compile_unit(
        &self,
        name: &str,
        config: &DebugConfig,
    ) -> Result<Module, BindError> {
        let module = self.create_module(name)?;
        module.create_compile_unit(config)?;
        Ok(module)
    }

    /// Look up a live module of this context by handle.
    pub fn module_for(&self, handle: Handle) -> Result<Module, BindError> {
        self.inner.ensure_alive()?;
        let weak = self.inner.modules.borrow().get(&handle).cloned();
        match weak.and_then(|w| w.upgrade()) {
            Some(inner) => Ok(Module::from_inner(inner)),
            None => Err(BindError::UnknownModule { handle }),
        }
    }

    /// Number of live modules registered in this context.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.inner.modules.borrow().len()
    }

    /// Number of wrapper objects currently cached.
    #[must_use]
    pub fn cached_wrapper_count(&self) -> usize {
        self.inner.wrappers.borrow().len()
    }

    /// Dispose the context and everything it still owns. Idempotent; live
    /// wrappers and modules degrade to [`BindError::ContextDisposed`].
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Whether two context values refer to the same underlying context.
    #[must_use]
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Context {}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("handle", &self.inner.handle)
            .field("owned", &self.inner.owned)
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}
