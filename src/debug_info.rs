//! Debug-info builder lifetime management.
//!
//! A module creates its builder lazily and at most once (see
//! [`Module::di_builder`](crate::Module::di_builder)). The builder references
//! the native module it was created for, so it is released before the module
//! in every teardown path: explicit module disposal, link transfer, and
//! context disposal all drop the builder first.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::engine::NativeEngine;
use crate::error::BindError;
use crate::handle::Handle;

/// Parameters for the root compile unit of a module's debug info.
#[derive(Clone, Debug)]
pub struct DebugConfig {
    pub source_path: String,
    pub producer: String,
    pub optimized: bool,
    pub runtime_version: u32,
}

impl DebugConfig {
    #[must_use]
    pub fn new(source_path: impl Into<String>, producer: impl Into<String>) -> Self {
        DebugConfig {
            source_path: source_path.into(),
            producer: producer.into(),
            optimized: false,
            runtime_version: 0,
        }
    }

    #[must_use]
    pub fn optimized(mut self, optimized: bool) -> Self {
        self.optimized = optimized;
        self
    }

    #[must_use]
    pub fn runtime_version(mut self, version: u32) -> Self {
        self.runtime_version = version;
        self
    }
}

struct DiInner {
    engine: Rc<dyn NativeEngine>,
    handle: Handle,
    disposed: Cell<bool>,
}

impl DiInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        debug!(builder = %self.handle, "disposing debug-info builder");
        self.engine.dispose_di_builder(self.handle);
    }
}

impl Drop for DiInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A per-module debug-info builder.
///
/// Clones observe the same builder. The builder dies with its module: once
/// the module is disposed, transferred, or its context disposed, every
/// operation fails with [`BindError::ModuleDisposed`].
#[derive(Clone)]
pub struct DebugInfoBuilder {
    inner: Rc<DiInner>,
}

impl DebugInfoBuilder {
    pub(crate) fn create(engine: Rc<dyn NativeEngine>, module: Handle) -> Self {
        let handle = engine.create_di_builder(module);
        debug!(builder = %handle, module = %module, "created debug-info builder");
        DebugInfoBuilder {
            inner: Rc::new(DiInner {
                engine,
                handle,
                disposed: Cell::new(false),
            }),
        }
    }

    fn ensure_alive(&self) -> Result<(), BindError> {
        if self.inner.disposed.get() {
            Err(BindError::ModuleDisposed)
        } else {
            Ok(())
        }
    }

    /// The native builder handle.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.inner.handle
    }

    pub(crate) fn create_compile_unit_handle(
        &self,
        config: &DebugConfig,
    ) -> Result<Handle, BindError> {
        self.ensure_alive()?;
        Ok(self.inner.engine.di_create_compile_unit(
            self.inner.handle,
            &config.source_path,
            &config.producer,
            config.optimized,
            config.runtime_version,
        ))
    }

    /// Resolve temporary debug metadata. Must be called before the module is
    /// emitted.
    pub fn finalize(&self) -> Result<(), BindError> {
        self.ensure_alive()?;
        self.inner.engine.di_finalize(self.inner.handle);
        Ok(())
    }

    /// Release the native builder now instead of waiting for the last clone
    /// to drop. Idempotent.
    pub(crate) fn dispose_now(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for DebugInfoBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugInfoBuilder")
            .field("handle", &self.inner.handle)
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}
