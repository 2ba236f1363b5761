//! Typed wrappers for the metadata family.

use std::rc::{Rc, Weak};

use crate::context::{Context, ContextInner};
use crate::error::BindError;
use crate::handle::Handle;
use crate::kind::{classify_metadata, MetadataClass, MetadataKind};

pub(crate) struct MetadataData {
    pub(crate) handle: Handle,
    pub(crate) kind: MetadataKind,
    pub(crate) class: MetadataClass,
    pub(crate) context: Weak<ContextInner>,
}

impl MetadataData {
    pub(crate) fn context(&self) -> Result<Context, BindError> {
        let inner = self.context.upgrade().ok_or(BindError::ContextDisposed)?;
        inner.ensure_alive()?;
        Ok(Context { inner })
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Common surface of all metadata wrappers.
pub trait MetadataRef: sealed::Sealed + Sized {
    const CLASS: MetadataClass;

    #[doc(hidden)]
    fn from_data(data: Rc<MetadataData>) -> Self;

    #[doc(hidden)]
    fn data(&self) -> &Rc<MetadataData>;

    fn handle(&self) -> Handle {
        self.data().handle
    }

    fn kind(&self) -> MetadataKind {
        self.data().kind
    }

    fn class(&self) -> MetadataClass {
        self.data().class
    }

    fn context(&self) -> Result<Context, BindError> {
        self.data().context()
    }

    fn as_metadata(&self) -> Metadata {
        Metadata(Rc::clone(self.data()))
    }

    /// Re-view as another metadata wrapper, checking the live discriminant.
    fn recast<T: MetadataRef>(&self) -> Result<T, BindError> {
        let ctx = self.context()?;
        let kind = ctx.inner.engine.metadata_discriminant(self.handle());
        let class = classify_metadata(kind);
        if class.is_a(T::CLASS) {
            Ok(T::from_data(Rc::clone(self.data())))
        } else {
            Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: class.name().to_string(),
            })
        }
    }

    fn ptr_eq<T: MetadataRef>(&self, other: &T) -> bool {
        Rc::ptr_eq(self.data(), other.data())
    }
}

macro_rules! metadata_wrapper {
    ($(#[$meta:meta])* $name:ident => $class:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(pub(crate) Rc<MetadataData>);

        impl sealed::Sealed for $name {}

        impl MetadataRef for $name {
            const CLASS: MetadataClass = MetadataClass::$class;

            fn from_data(data: Rc<MetadataData>) -> Self {
                Self(data)
            }

            fn data(&self) -> &Rc<MetadataData> {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("handle", &self.0.handle)
                    .field("kind", &self.0.kind)
                    .finish()
            }
        }
    };
}

metadata_wrapper! {
    /// The root of the metadata family.
    Metadata => Metadata
}

metadata_wrapper! {
    /// The root compile-unit node of a module's debug info.
    DICompileUnit => CompileUnit
}
