//! Typed wrappers for the value family.
//!
//! One wrapper object exists per (context, handle) pair; the factory in
//! `factory.rs` enforces that, so `ptr_eq` on wrappers is a faithful identity
//! test. Wrappers hold only a weak reference back to their context: a wrapper
//! kept alive past context disposal degrades to
//! [`BindError::ContextDisposed`], it never dangles.
//!
//! The class hierarchy (see [`ValueClass`]) is encoded structurally, not with
//! trait inheritance: every wrapper shares the same [`ValueData`] and differs
//! only in its static class. [`ValueRef::recast`] moves between wrapper types
//! by re-checking the live discriminant.

use std::rc::{Rc, Weak};

use crate::context::{Context, ContextInner};
use crate::error::BindError;
use crate::handle::Handle;
use crate::kind::{classify_value, Opcode, ValueClass, ValueKind};

/// Shared state behind every value wrapper. Created once per handle by the
/// factory, then handed out by reference counting.
pub(crate) struct ValueData {
    pub(crate) handle: Handle,
    pub(crate) kind: ValueKind,
    pub(crate) class: ValueClass,
    pub(crate) context: Weak<ContextInner>,
}

impl ValueData {
    pub(crate) fn context(&self) -> Result<Context, BindError> {
        let inner = self.context.upgrade().ok_or(BindError::ContextDisposed)?;
        inner.ensure_alive()?;
        Ok(Context { inner })
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Common surface of all value wrappers.
///
/// Constructors are not public: wrappers come out of
/// [`Context::resolve`](crate::Context::resolve), already classified.
pub trait ValueRef: sealed::Sealed + Sized {
    /// The static class of this wrapper type.
    const CLASS: ValueClass;

    #[doc(hidden)]
    fn from_data(data: Rc<ValueData>) -> Self;

    #[doc(hidden)]
    fn data(&self) -> &Rc<ValueData>;

    /// The underlying native handle.
    fn handle(&self) -> Handle {
        self.data().handle
    }

    /// The discriminant observed when this wrapper was created.
    fn kind(&self) -> ValueKind {
        self.data().kind
    }

    /// The most specific class of the underlying value. May be a descendant
    /// of [`Self::CLASS`] when the wrapper was obtained as an ancestor view.
    fn class(&self) -> ValueClass {
        self.data().class
    }

    /// The owning context, if it is still alive.
    fn context(&self) -> Result<Context, BindError> {
        self.data().context()
    }

    /// The value's name; empty for unnamed values.
    fn name(&self) -> Result<String, BindError> {
        let ctx = self.context()?;
        Ok(ctx.inner.engine.value_name(self.handle()))
    }

    /// The value's type.
    fn value_type(&self) -> Result<crate::types::Type, BindError> {
        let ctx = self.context()?;
        let ty = ctx.inner.engine.value_type(self.handle());
        ctx.resolve_type_nonnull(ty)
    }

    /// View this wrapper as the root class.
    fn as_value(&self) -> Value {
        Value(Rc::clone(self.data()))
    }

    /// Re-view this value as another wrapper type, checking the live
    /// discriminant against the target class. Bypasses the cache on purpose:
    /// the answer reflects what the engine reports now.
    fn recast<T: ValueRef>(&self) -> Result<T, BindError> {
        let ctx = self.context()?;
        let kind = ctx.inner.engine.value_discriminant(self.handle());
        let class = classify_value(kind);
        if class.is_a(T::CLASS) {
            Ok(T::from_data(Rc::clone(self.data())))
        } else {
            Err(BindError::WrongKind {
                expected: T::CLASS.name(),
                actual: class.name().to_string(),
            })
        }
    }

    /// Identity comparison: true iff both wrappers view the same cached
    /// object. Within one context this coincides with handle equality.
    fn ptr_eq<T: ValueRef>(&self, other: &T) -> bool {
        Rc::ptr_eq(self.data(), other.data())
    }
}

macro_rules! value_wrapper {
    ($(#[$meta:meta])* $name:ident => $class:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(pub(crate) Rc<ValueData>);

        impl sealed::Sealed for $name {}

        impl ValueRef for $name {
            const CLASS: ValueClass = ValueClass::$class;

            fn from_data(data: Rc<ValueData>) -> Self {
                Self(data)
            }

            fn data(&self) -> &Rc<ValueData> {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("handle", &self.0.handle)
                    .field("class", &self.0.class)
                    .finish()
            }
        }
    };
}

value_wrapper! {
    /// The root of the value family. Any value handle resolves to this.
    Value => Value
}

value_wrapper! {
    /// A function parameter.
    Argument => Argument
}

value_wrapper! {
    /// Any instruction. Subclasses exist for terminators, comparisons, and
    /// landing pads; everything else resolves to this class directly.
    Instruction => Instruction
}

value_wrapper! {
    /// An instruction that ends a basic block.
    Terminator => Terminator
}

value_wrapper! {
    /// A `br` instruction, conditional or unconditional.
    Branch => Branch
}

value_wrapper! {
    /// An integer or floating-point comparison.
    Cmp => Cmp
}

value_wrapper! {
    /// A landing pad in an exception-handling function.
    LandingPad => LandingPad
}

value_wrapper! {
    /// Any constant, including kinds without a dedicated wrapper (for
    /// example floating-point constants).
    Constant => Constant
}

value_wrapper! {
    /// A constant integer.
    ConstantInt => ConstantInt
}

value_wrapper! {
    /// A constant struct aggregate.
    ConstantStruct => ConstantStruct
}

value_wrapper! {
    /// A value with linkage: function, global variable, or alias.
    GlobalValue => GlobalValue
}

value_wrapper! {
    /// A function definition or declaration.
    Function => Function
}

value_wrapper! {
    /// A global variable.
    GlobalVariable => GlobalVariable
}

value_wrapper! {
    /// An alias to another global value.
    GlobalAlias => GlobalAlias
}

impl Instruction {
    /// The instruction's opcode.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self.kind() {
            ValueKind::Instruction(op) => op,
            // The factory only classifies instruction discriminants into
            // instruction classes.
            _ => unreachable!("instruction wrapper created from a non-instruction kind"),
        }
    }

    /// Whether this instruction reads or writes memory directly.
    #[must_use]
    pub fn is_memory_access(&self) -> bool {
        self.opcode().is_memory_access()
    }

    /// Number of operands.
    pub fn operand_count(&self) -> Result<u32, BindError> {
        let ctx = self.context()?;
        Ok(ctx.inner.engine.operand_count(self.handle()))
    }

    /// Operand at `index`, or `None` when the index is out of range.
    pub fn operand(&self, index: u32) -> Result<Option<Value>, BindError> {
        let ctx = self.context()?;
        let handle = ctx.inner.engine.operand(self.handle(), index);
        ctx.resolve(handle)
    }
}

impl Branch {
    /// Whether this branch has a condition.
    ///
    /// An unconditional branch has a single operand (the target block); a
    /// conditional branch carries the condition plus two targets.
    pub fn is_conditional(&self) -> Result<bool, BindError> {
        let ctx = self.context()?;
        Ok(ctx.inner.engine.operand_count(self.handle()) == 3)
    }

    /// The branch condition, or `None` for an unconditional branch.
    pub fn condition(&self) -> Result<Option<Value>, BindError> {
        if !self.is_conditional()? {
            return Ok(None);
        }
        let ctx = self.context()?;
        let handle = ctx.inner.engine.operand(self.handle(), 0);
        ctx.resolve(handle)
    }
}

impl GlobalAlias {
    /// The value this alias points at, or `None` when the alias is dangling.
    pub fn aliasee(&self) -> Result<Option<Value>, BindError> {
        let ctx = self.context()?;
        let handle = ctx.inner.engine.aliasee(self.handle());
        ctx.resolve(handle)
    }
}
