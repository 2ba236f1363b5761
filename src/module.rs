//! Module lifetime: creation, disposal, linking, and cross-context cloning.
//!
//! A module is always registered with its owning context. It can lose its
//! native handle three ways, each leaving a distinct mark so later use fails
//! with the right error: explicit disposal, ownership transfer through a
//! link, or disposal of the owning context.
//!
//! Modules created through [`Module::new`] own their context exclusively
//! (created and disposed together); modules created through
//! [`Context::create_module`] share an explicit context.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::context::{Context, ContextInner};
use crate::debug_info::{DebugConfig, DebugInfoBuilder};
use crate::error::BindError;
use crate::handle::Handle;
use crate::layout::DataLayout;
use crate::metadata::DICompileUnit;
use crate::registry::Registry;
use crate::values::{Function, GlobalVariable, Value};

/// Why a module no longer has a native handle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Detach {
    Disposed,
    Transferred,
    ContextDisposed,
}

pub(crate) struct ModuleInner {
    handle: Cell<Handle>,
    detached: Cell<Option<Detach>>,
    /// True for implicit-context modules: disposing the module disposes the
    /// context, and nothing else may live in it.
    owns_context: bool,
    pub(crate) context: Rc<ContextInner>,
    layout: RefCell<Option<DataLayout>>,
    di_builder: RefCell<Option<DebugInfoBuilder>>,
    compile_unit: RefCell<Option<DICompileUnit>>,
}

impl ModuleInner {
    pub(crate) fn handle(&self) -> Handle {
        self.handle.get()
    }

    /// The current handle, or the reason it is gone.
    pub(crate) fn ensure_attached(&self) -> Result<Handle, BindError> {
        match self.detached.get() {
            Some(Detach::Disposed) => Err(BindError::ModuleDisposed),
            Some(Detach::Transferred) => Err(BindError::ModuleTransferred),
            Some(Detach::ContextDisposed) => Err(BindError::ContextDisposed),
            None => {
                self.context.ensure_alive()?;
                Ok(self.handle.get())
            }
        }
    }

    /// Release objects that reference the native module and must not outlive
    /// it: the debug-info builder and the installed layout.
    fn release_ancillaries(&self) {
        if let Some(di) = self.di_builder.borrow_mut().take() {
            di.dispose_now();
        }
        self.compile_unit.borrow_mut().take();
        self.layout.borrow_mut().take();
    }

    /// Mark the module detached and surrender its handle. Returns the old
    /// handle, or null if the module was already detached. The caller decides
    /// whether the native module still needs disposal; a transferred module's
    /// handle was consumed by the engine.
    pub(crate) fn detach(&self, reason: Detach) -> Handle {
        if self.detached.get().is_some() {
            return Handle::NULL;
        }
        self.detached.set(Some(reason));
        self.release_ancillaries();
        self.handle.replace(Handle::NULL)
    }

    fn dispose_impl(&self) {
        if self.detached.get().is_some() {
            return;
        }
        let handle = self.detach(Detach::Disposed);
        debug!(module = %handle, owns_context = self.owns_context, "disposing module");
        self.context.remove_module(handle);
        self.context.engine.dispose_module(handle);
        if self.owns_context {
            // Implicit-context module: nothing else lives in the context, so
            // it goes down with the module.
            self.context.dispose();
        }
    }
}

impl Drop for ModuleInner {
    fn drop(&mut self) {
        self.dispose_impl();
    }
}

/// A native module.
///
/// Clones observe the same module; equality is identity. A module that has
/// been disposed, absorbed by a link, or orphaned by context disposal rejects
/// every operation with the matching [`BindError`] variant.
#[derive(Clone)]
pub struct Module {
    pub(crate) inner: Rc<ModuleInner>,
}

impl Module {
    /// Create an unnamed module with its own private context.
    pub fn new(registry: &Registry) -> Result<Module, BindError> {
        Module::with_name(registry, "")
    }

    /// Create a named module with its own private context.
    ///
    /// The module owns the context exclusively: disposing the module disposes
    /// the context, and nothing in the registry observes either afterwards.
    pub fn with_name(registry: &Registry, name: &str) -> Result<Module, BindError> {
        let context = registry.create_context();
        match Module::create_with(&context, name, true) {
            Ok(module) => Ok(module),
            Err(err) => {
                context.dispose();
                Err(err)
            }
        }
    }

    /// Create a named module with a private context and a debug-info compile
    /// unit already attached.
    pub fn with_compile_unit(
        registry: &Registry,
        name: &str,
        config: &DebugConfig,
    ) -> Result<Module, BindError> {
        let module = Module::with_name(registry, name)?;
        module.create_compile_unit(config)?;
        Ok(module)
    }

    pub(crate) fn create_with(
        context: &Context,
        name: &str,
        owns_context: bool,
    ) -> Result<Module, BindError> {
        context.inner.ensure_alive()?;
        let handle = context.inner.engine.create_module(context.inner.handle, name);
        debug!(module = %handle, context = %context.inner.handle, name, "created module");
        Module::from_parts(Rc::clone(&context.inner), handle, owns_context)
    }

    /// Wrap a native module handle and register it with `context`. On a
    /// duplicate registration the existing entry is left in place and the
    /// handle is not touched; it still belongs to the existing module.
    pub(crate) fn from_parts(
        context: Rc<ContextInner>,
        handle: Handle,
        owns_context: bool,
    ) -> Result<Module, BindError> {
        let inner = Rc::new(ModuleInner {
            handle: Cell::new(handle),
            detached: Cell::new(None),
            owns_context,
            context,
            layout: RefCell::new(None),
            di_builder: RefCell::new(None),
            compile_unit: RefCell::new(None),
        });
        match inner.context.add_module(&inner) {
            Ok(()) => Ok(Module { inner }),
            Err(err) => {
                inner.detach(Detach::Disposed);
                Err(err)
            }
        }
    }

    pub(crate) fn from_inner(inner: Rc<ModuleInner>) -> Module {
        Module { inner }
    }

    /// The native module handle, if the module is still attached.
    pub fn handle(&self) -> Result<Handle, BindError> {
        self.inner.ensure_attached()
    }

    /// Whether the module still has its native handle.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.ensure_attached().is_ok()
    }

    /// Whether the module can no longer be used, for any reason: explicit
    /// disposal, link transfer, or disposal of its context.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.is_attached()
    }

    /// The owning context.
    #[must_use]
    pub fn context(&self) -> Context {
        Context {
            inner: Rc::clone(&self.inner.context),
        }
    }

    /// The module's name.
    pub fn name(&self) -> Result<String, BindError> {
        let handle = self.inner.ensure_attached()?;
        Ok(self.inner.context.engine.module_name(handle))
    }

    /// Dispose the module. Idempotent. An implicit-context module takes its
    /// context down with it.
    pub fn dispose(&self) {
        self.inner.dispose_impl();
    }

    /// Whether two module values refer to the same underlying module.
    #[must_use]
    pub fn ptr_eq(&self, other: &Module) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -- Linking and cloning --

    /// Merge `other` into this module.
    ///
    /// Both modules must live in the same context; a cross-context link is
    /// rejected up front with [`BindError::CrossContextLink`] and mutates
    /// nothing. The engine consumes the source module even when the link
    /// itself fails, so `other` is marked transferred in both outcomes and
    /// every later use of it fails with [`BindError::ModuleTransferred`].
    pub fn link(&self, other: &Module) -> Result<(), BindError> {
        let dest = self.inner.ensure_attached()?;
        let src = other.inner.ensure_attached()?;
        if !Rc::ptr_eq(&self.inner.context, &other.inner.context) {
            return Err(BindError::CrossContextLink);
        }
        debug!(dest = %dest, src = %src, "linking modules");
        // The builder references the source module; release it before the
        // engine destroys the module.
        other.inner.release_ancillaries();
        let result = self.inner.context.engine.link_modules(dest, src);
        self.inner.context.remove_module(src);
        other.inner.detach(Detach::Transferred);
        result.map_err(BindError::Native)
    }

    /// Clone this module within its own context.
    pub fn clone_module(&self) -> Result<Module, BindError> {
        let handle = self.inner.ensure_attached()?;
        let cloned = self.inner.context.engine.clone_module(handle);
        Module::from_parts(Rc::clone(&self.inner.context), cloned, false)
    }

    /// Clone this module into `target`, which may be a different context.
    ///
    /// A same-context clone is a plain [`Module::clone_module`]. Across
    /// contexts the module is round-tripped through its serialized form so
    /// the copy's values and types belong to `target`. The source module is
    /// untouched either way.
    pub fn clone_into(&self, target: &Context) -> Result<Module, BindError> {
        if Rc::ptr_eq(&self.inner.context, &target.inner) {
            return self.clone_module();
        }
        let handle = self.inner.ensure_attached()?;
        target.inner.ensure_alive()?;
        let engine = &self.inner.context.engine;
        let buffer = engine.write_bitcode(handle);
        let parsed = engine
            .parse_bitcode(target.inner.handle, &buffer)
            .map_err(BindError::Native)?;
        debug_assert_eq!(
            engine.owning_context_of(parsed),
            target.inner.handle,
            "parsed module landed in the wrong context"
        );
        Module::from_parts(Rc::clone(&target.inner), parsed, false)
    }

    /// Verify the module's internal consistency. The engine's diagnostic is
    /// surfaced verbatim on failure.
    pub fn verify(&self) -> Result<(), BindError> {
        let handle = self.inner.ensure_attached()?;
        self.inner
            .context
            .engine
            .verify_module(handle)
            .map_err(BindError::Native)
    }

    /// Serialize the module to an in-memory buffer.
    pub fn write_bitcode(&self) -> Result<Vec<u8>, BindError> {
        let handle = self.inner.ensure_attached()?;
        Ok(self.inner.context.engine.write_bitcode(handle))
    }

    // -- Attributes --

    /// Install a data layout. The module takes ownership; a previously
    /// installed layout is disposed.
    pub fn set_layout(&self, layout: DataLayout) -> Result<(), BindError> {
        let handle = self.inner.ensure_attached()?;
        self.inner
            .context
            .engine
            .set_data_layout(handle, layout.as_str());
        *self.inner.layout.borrow_mut() = Some(layout);
        Ok(())
    }

    /// The module's current data layout string, as the engine reports it.
    pub fn layout_str(&self) -> Result<String, BindError> {
        let handle = self.inner.ensure_attached()?;
        Ok(self.inner.context.engine.data_layout(handle))
    }

    /// Set the target triple.
    pub fn set_target_triple(&self, triple: &str) -> Result<(), BindError> {
        let handle = self.inner.ensure_attached()?;
        self.inner.context.engine.set_target_triple(handle, triple);
        Ok(())
    }

    /// The module's target triple.
    pub fn target_triple(&self) -> Result<String, BindError> {
        let handle = self.inner.ensure_attached()?;
        Ok(self.inner.context.engine.target_triple(handle))
    }

    // -- Content access --

    /// Iterate the module's global variables. Each call starts a fresh walk;
    /// a module that loses its handle mid-iteration yields one error and
    /// stops.
    #[must_use]
    pub fn globals(&self) -> Globals {
        Globals {
            module: self.clone(),
            cursor: Cursor::Start,
        }
    }

    /// Iterate the module's functions. Same restart and error behavior as
    /// [`Module::globals`].
    #[must_use]
    pub fn functions(&self) -> Functions {
        Functions {
            module: self.clone(),
            cursor: Cursor::Start,
        }
    }

    /// Look up a function by name.
    pub fn get_function(&self, name: &str) -> Result<Option<Function>, BindError> {
        let handle = self.inner.ensure_attached()?;
        let found = self.inner.context.engine.named_function(handle, name);
        self.context().resolve(found)
    }

    /// Look up a global variable by name.
    pub fn named_global(&self, name: &str) -> Result<Option<GlobalVariable>, BindError> {
        let handle = self.inner.ensure_attached()?;
        let found = self.inner.context.engine.named_global(handle, name);
        self.context().resolve(found)
    }

    // -- Debug info --

    /// The module's debug-info builder, created on first use. Every later
    /// call returns the same builder.
    pub fn di_builder(&self) -> Result<DebugInfoBuilder, BindError> {
        let handle = self.inner.ensure_attached()?;
        let mut slot = self.inner.di_builder.borrow_mut();
        if let Some(builder) = slot.as_ref() {
            return Ok(builder.clone());
        }
        let builder = DebugInfoBuilder::create(Rc::clone(&self.inner.context.engine), handle);
        *slot = Some(builder.clone());
        Ok(builder)
    }

    /// Create the root compile unit for this module's debug info, creating
    /// the builder if needed. Replaces a previously attached compile unit.
    pub fn create_compile_unit(&self, config: &DebugConfig) -> Result<DICompileUnit, BindError> {
        let builder = self.di_builder()?;
        let handle = builder.create_compile_unit_handle(config)?;
        let unit: DICompileUnit = self.context().resolve_metadata_nonnull(handle)?;
        *self.inner.compile_unit.borrow_mut() = Some(unit.clone());
        Ok(unit)
    }

    /// The compile unit attached to this module, if any.
    #[must_use]
    pub fn compile_unit(&self) -> Option<DICompileUnit> {
        self.inner.compile_unit.borrow().clone()
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Module {}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("handle", &self.inner.handle.get())
            .field("detached", &self.inner.detached.get())
            .field("owns_context", &self.inner.owns_context)
            .finish()
    }
}

enum Cursor {
    Start,
    At(Handle),
    Done,
}

/// Iterator over a module's global variables. Yields errors instead of
/// panicking when the module or context goes away mid-walk, then fuses.
pub struct Globals {
    module: Module,
    cursor: Cursor,
}

impl Iterator for Globals {
    type Item = Result<Value, BindError>;

    fn next(&mut self) -> Option<Self::Item> {
        let module_handle = match self.cursor {
            Cursor::Done => return None,
            _ => match self.module.inner.ensure_attached() {
                Ok(handle) => handle,
                Err(err) => {
                    self.cursor = Cursor::Done;
                    return Some(Err(err));
                }
            },
        };
        let engine = &self.module.inner.context.engine;
        let next = match self.cursor {
            Cursor::Start => engine.first_global(module_handle),
            Cursor::At(current) => engine.next_global(current),
            Cursor::Done => return None,
        };
        if next.is_null() {
            self.cursor = Cursor::Done;
            return None;
        }
        self.cursor = Cursor::At(next);
        Some(self.module.context().resolve_nonnull(next))
    }
}

/// Iterator over a module's functions. Same contract as [`Globals`].
pub struct Functions {
    module: Module,
    cursor: Cursor,
}

impl Iterator for Functions {
    type Item = Result<Function, BindError>;

    fn next(&mut self) -> Option<Self::Item> {
        let module_handle = match self.cursor {
            Cursor::Done => return None,
            _ => match self.module.inner.ensure_attached() {
                Ok(handle) => handle,
                Err(err) => {
                    self.cursor = Cursor::Done;
                    return Some(Err(err));
                }
            },
        };
        let engine = &self.module.inner.context.engine;
        let next = match self.cursor {
            Cursor::Start => engine.first_function(module_handle),
            Cursor::At(current) => engine.next_function(current),
            Cursor::Done => return None,
        };
        if next.is_null() {
            self.cursor = Cursor::Done;
            return None;
        }
        self.cursor = Cursor::At(next);
        Some(self.module.context().resolve_nonnull(next))
    }
}
