//! The wrapper factory and the per-context wrapper cache.
//!
//! Every typed wrapper in the crate is minted here. The factory classifies a
//! handle exactly once (on first resolution), caches the shared data record,
//! and serves every later request for the same handle from the cache. The
//! cache only grows while the context is alive and is cleared only by
//! context disposal, so wrapper identity is stable for the context's whole
//! lifetime. Link transfer evicts nothing: the transferred module's values
//! move to the destination module in the same context and stay live. Values
//! of a module disposed on its own keep their cache entries too; resolving a
//! handle the engine has freed is a caller contract violation, same as
//! passing one to the engine directly.
//!
//! A typed request that does not match the cached (or freshly classified)
//! class fails with [`BindError::WrongKind`] and leaves the cache untouched.

use std::rc::Rc;

use tracing::trace;

use crate::context::Context;
use crate::error::BindError;
use crate::handle::Handle;
use crate::kind::{classify_metadata, classify_type, classify_value};
use crate::metadata::{MetadataData, MetadataRef};
use crate::types::{TypeData, TypeRef};
use crate::values::{ValueData, ValueRef};

/// A cache entry. The three handle families share one keyspace because the
/// engine guarantees addresses are unique across families within a context.
#[derive(Clone)]
pub(crate) enum CachedWrapper {
    Value(Rc<ValueData>),
    Type(Rc<TypeData>),
    Metadata(Rc<MetadataData>),
}

impl CachedWrapper {
    fn family_name(&self) -> &'static str {
        match self {
            CachedWrapper::Value(data) => data.class.name(),
            CachedWrapper::Type(data) => data.class.name(),
            CachedWrapper::Metadata(data) => data.class.name(),
        }
    }
}

impl Context {
    /// Resolve a value handle to a typed wrapper.
    ///
    /// Returns `Ok(None)` for the null handle. Returns the one canonical
    /// wrapper object for the handle; resolving the same handle twice yields
    /// wrappers that are [`ptr_eq`](ValueRef::ptr_eq). Fails with
    /// [`BindError::WrongKind`] when the value's class is not `T::CLASS` or a
    /// descendant of it; a failed request never populates the cache.
    pub fn resolve<T: ValueRef>(&self, handle: Handle) -> Result<Option<T>, BindError> {
        if handle.is_null() {
            return Ok(None);
        }
        self.inner.ensure_alive()?;
        let cached = self.inner.wrappers.borrow().get(&handle).cloned();
        if let Some(entry) = cached {
            return match entry {
                CachedWrapper::Value(data) => {
                    if data.class.is_a(T::CLASS) {
                        Ok(Some(T::from_data(data)))
                    } else {
                        Err(BindError::WrongKind {
                            expected: T::CLASS.name(),
                            actual: data.class.name().to_string(),
                        })
                    }
                }
                other => Err(BindError::WrongKind {
                    expected: T::CLASS.name(),
                    actual: other.family_name().to_string(),
                }),
            };
        }
        let kind = self.inner.engine.value_discriminant(handle);
        let class = classify_value(kind);
        if !class.is_a(T::CLASS) {
            return Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: class.name().to_string(),
            });
        }
        trace!(handle = %handle, class = class.name(), "caching value wrapper");
        let data = Rc::new(ValueData {
            handle,
            kind,
            class,
            context: Rc::downgrade(&self.inner),
        });
        self.inner
            .wrappers
            .borrow_mut()
            .insert(handle, CachedWrapper::Value(Rc::clone(&data)));
        Ok(Some(T::from_data(data)))
    }

    /// Resolve a type handle to a typed wrapper. Same contract as
    /// [`Context::resolve`].
    pub fn resolve_type<T: TypeRef>(&self, handle: Handle) -> Result<Option<T>, BindError> {
        if handle.is_null() {
            return Ok(None);
        }
        self.inner.ensure_alive()?;
        let cached = self.inner.wrappers.borrow().get(&handle).cloned();
        if let Some(entry) = cached {
            return match entry {
                CachedWrapper::Type(data) => {
                    if data.class.is_a(T::CLASS) {
                        Ok(Some(T::from_data(data)))
                    } else {
                        Err(BindError::WrongKind {
                            expected: T::CLASS.name(),
                            actual: data.class.name().to_string(),
                        })
                    }
                }
                other => Err(BindError::WrongKind {
                    expected: T::CLASS.name(),
                    actual: other.family_name().to_string(),
                }),
            };
        }
        let kind = self.inner.engine.type_discriminant(handle);
        let class = classify_type(kind);
        if !class.is_a(T::CLASS) {
            return Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: class.name().to_string(),
            });
        }
        trace!(handle = %handle, class = class.name(), "caching type wrapper");
        let data = Rc::new(TypeData {
            handle,
            kind,
            class,
            context: Rc::downgrade(&self.inner),
        });
        self.inner
            .wrappers
            .borrow_mut()
            .insert(handle, CachedWrapper::Type(Rc::clone(&data)));
        Ok(Some(T::from_data(data)))
    }

    /// Resolve a metadata handle to a typed wrapper. Same contract as
    /// [`Context::resolve`].
    pub fn resolve_metadata<T: MetadataRef>(&self, handle: Handle) -> Result<Option<T>, BindError> {
        if handle.is_null() {
            return Ok(None);
        }
        self.inner.ensure_alive()?;
        let cached = self.inner.wrappers.borrow().get(&handle).cloned();
        if let Some(entry) = cached {
            return match entry {
                CachedWrapper::Metadata(data) => {
                    if data.class.is_a(T::CLASS) {
                        Ok(Some(T::from_data(data)))
                    } else {
                        Err(BindError::WrongKind {
                            expected: T::CLASS.name(),
                            actual: data.class.name().to_string(),
                        })
                    }
                }
                other => Err(BindError::WrongKind {
                    expected: T::CLASS.name(),
                    actual: other.family_name().to_string(),
                }),
            };
        }
        let kind = self.inner.engine.metadata_discriminant(handle);
        let class = classify_metadata(kind);
        if !class.is_a(T::CLASS) {
            return Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: class.name().to_string(),
            });
        }
        trace!(handle = %handle, class = class.name(), "caching metadata wrapper");
        let data = Rc::new(MetadataData {
            handle,
            kind,
            class,
            context: Rc::downgrade(&self.inner),
        });
        self.inner
            .wrappers
            .borrow_mut()
            .insert(handle, CachedWrapper::Metadata(Rc::clone(&data)));
        Ok(Some(T::from_data(data)))
    }

    /// Resolve a handle the engine promised is non-null.
    pub(crate) fn resolve_nonnull<T: ValueRef>(&self, handle: Handle) -> Result<T, BindError> {
        match self.resolve::<T>(handle)? {
            Some(value) => Ok(value),
            None => Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: "null handle".to_string(),
            }),
        }
    }

    /// Resolve a type handle the engine promised is non-null.
    pub(crate) fn resolve_type_nonnull<T: TypeRef>(&self, handle: Handle) -> Result<T, BindError> {
        match self.resolve_type::<T>(handle)? {
            Some(ty) => Ok(ty),
            None => Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: "null handle".to_string(),
            }),
        }
    }

    /// Resolve a metadata handle the engine promised is non-null.
    pub(crate) fn resolve_metadata_nonnull<T: MetadataRef>(
        &self,
        handle: Handle,
    ) -> Result<T, BindError> {
        match self.resolve_metadata::<T>(handle)? {
            Some(node) => Ok(node),
            None => Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: "null handle".to_string(),
            }),
        }
    }
}
