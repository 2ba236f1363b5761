//! Typed wrappers for the type family.
//!
//! Same shape as the value family in `values.rs`, with a much shallower
//! hierarchy: only array types get a dedicated wrapper, everything else is a
//! plain [`Type`].

use std::rc::{Rc, Weak};

use crate::context::{Context, ContextInner};
use crate::error::BindError;
use crate::handle::Handle;
use crate::kind::{classify_type, TypeClass, TypeKind};

pub(crate) struct TypeData {
    pub(crate) handle: Handle,
    pub(crate) kind: TypeKind,
    pub(crate) class: TypeClass,
    pub(crate) context: Weak<ContextInner>,
}

impl TypeData {
    pub(crate) fn context(&self) -> Result<Context, BindError> {
        let inner = self.context.upgrade().ok_or(BindError::ContextDisposed)?;
        inner.ensure_alive()?;
        Ok(Context { inner })
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Common surface of all type wrappers.
pub trait TypeRef: sealed::Sealed + Sized {
    const CLASS: TypeClass;

    #[doc(hidden)]
    fn from_data(data: Rc<TypeData>) -> Self;

    #[doc(hidden)]
    fn data(&self) -> &Rc<TypeData>;

    fn handle(&self) -> Handle {
        self.data().handle
    }

    fn kind(&self) -> TypeKind {
        self.data().kind
    }

    fn class(&self) -> TypeClass {
        self.data().class
    }

    fn context(&self) -> Result<Context, BindError> {
        self.data().context()
    }

    /// View this wrapper as the root class.
    fn as_type(&self) -> Type {
        Type(Rc::clone(self.data()))
    }

    /// Re-view as another type wrapper, checking the live discriminant.
    fn recast<T: TypeRef>(&self) -> Result<T, BindError> {
        let ctx = self.context()?;
        let kind = ctx.inner.engine.type_discriminant(self.handle());
        let class = classify_type(kind);
        if class.is_a(T::CLASS) {
            Ok(T::from_data(Rc::clone(self.data())))
        } else {
            Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: class.name().to_string(),
            })
        }
    }

    fn ptr_eq<T: TypeRef>(&self, other: &T) -> bool {
        Rc::ptr_eq(self.data(), other.data())
    }
}

macro_rules! type_wrapper {
    ($(#[$meta:meta])* $name:ident => $class:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(pub(crate) Rc<TypeData>);

        impl sealed::Sealed for $name {}

        impl TypeRef for $name {
            const CLASS: TypeClass = TypeClass::$class;

            fn from_data(data: Rc<TypeData>) -> Self {
                Self(data)
            }

            fn data(&self) -> &Rc<TypeData> {
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

type_wrapper! {
    /// The root of the type family.
    Type => Type
}

type_wrapper! {
    /// A fixed-length array type.
    ArrayType => Array
}

impl ArrayType {
    /// The array's element type.
    pub fn element_type(&self) -> Result<Type, BindError> {
        let ctx = self.context()?;
        let handle = ctx.inner.engine.element_type(self.handle());
        ctx.resolve_type_nonnull(handle)
    }

    /// Number of elements.
    pub fn len(&self) -> Result<u64, BindError> {
        let ctx = self.context()?;
        Ok(ctx.inner.engine.array_length(self.handle()))
    }

    pub fn is_empty(&self) -> Result<bool, BindError> {
        Ok(self.len()? == 0)
    }
}
