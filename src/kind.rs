//! Discriminants and the fixed classification tables.
//!
//! The engine reports a raw discriminant for every handle (value kind,
//! instruction opcode, type kind, or metadata kind). The tables here map each
//! discriminant to exactly one wrapper class; unknown discriminants fall back
//! to the nearest ancestor class instead of failing, so a newer engine can
//! introduce kinds this crate does not special-case yet.
//!
//! Classification runs exactly once, inside the wrapper factory. Wrapper
//! constructors receive the already-classified result and never re-derive it.

/// Instruction opcode as reported by the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum Opcode {
    Ret,
    Br,
    Switch,
    IndirectBr,
    Invoke,
    Unreachable,
    Add,
    Sub,
    Mul,
    Alloca,
    Load,
    Store,
    GetElementPtr,
    ICmp,
    FCmp,
    Phi,
    Call,
    Select,
    LandingPad,
    Resume,
    /// An opcode this crate does not special-case; the raw engine tag is kept
    /// for diagnostics.
    Other(u32),
}

impl Opcode {
    /// Whether this opcode ends a basic block.
    #[must_use]
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Ret
                | Opcode::Br
                | Opcode::Switch
                | Opcode::IndirectBr
                | Opcode::Invoke
                | Opcode::Unreachable
                | Opcode::Resume
        )
    }

    /// Whether this opcode reads or writes memory directly.
    ///
    /// Alignment is only meaningful for these opcodes.
    #[must_use]
    pub fn is_memory_access(self) -> bool {
        matches!(self, Opcode::Alloca | Opcode::Load | Opcode::Store)
    }
}

/// Value discriminant as reported by the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum ValueKind {
    Argument,
    Function,
    GlobalVariable,
    GlobalAlias,
    ConstantInt,
    ConstantFP,
    ConstantStruct,
    Instruction(Opcode),
    /// A kind this crate does not special-case.
    Other(u32),
}

/// Type discriminant as reported by the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum TypeKind {
    Void,
    Integer,
    Float,
    Double,
    Pointer,
    Function,
    Struct,
    Array,
    Vector,
    Label,
    Metadata,
    Other(u32),
}

/// Metadata discriminant as reported by the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum MetadataKind {
    String,
    Node,
    CompileUnit,
    File,
    Subprogram,
    Other(u32),
}

/// Wrapper class for the value family.
///
/// Classes form a tree rooted at [`ValueClass::Value`]; see
/// [`ValueClass::parent`]. A cached wrapper satisfies a typed request when its
/// class is the requested class or a descendant of it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ValueClass {
    Value,
    Argument,
    Instruction,
    Terminator,
    Branch,
    Cmp,
    LandingPad,
    Constant,
    ConstantInt,
    ConstantStruct,
    GlobalValue,
    Function,
    GlobalVariable,
    GlobalAlias,
}

impl ValueClass {
    /// The immediate ancestor class, or `None` for the root.
    #[must_use]
    pub fn parent(self) -> Option<ValueClass> {
        match self {
            ValueClass::Value => None,
            ValueClass::Argument | ValueClass::Instruction | ValueClass::Constant => {
                Some(ValueClass::Value)
            }
            ValueClass::Terminator | ValueClass::Cmp | ValueClass::LandingPad => {
                Some(ValueClass::Instruction)
            }
            ValueClass::Branch => Some(ValueClass::Terminator),
            ValueClass::ConstantInt | ValueClass::ConstantStruct | ValueClass::GlobalValue => {
                Some(ValueClass::Constant)
            }
            ValueClass::Function | ValueClass::GlobalVariable | ValueClass::GlobalAlias => {
                Some(ValueClass::GlobalValue)
            }
        }
    }

    /// Whether this class is `ancestor` or a descendant of it.
    #[must_use]
    pub fn is_a(self, ancestor: ValueClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = class.parent();
        }
        false
    }

    /// Stable name for diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ValueClass::Value => "Value",
            ValueClass::Argument => "Argument",
            ValueClass::Instruction => "Instruction",
            ValueClass::Terminator => "Terminator",
            ValueClass::Branch => "Branch",
            ValueClass::Cmp => "Cmp",
            ValueClass::LandingPad => "LandingPad",
            ValueClass::Constant => "Constant",
            ValueClass::ConstantInt => "ConstantInt",
            ValueClass::ConstantStruct => "ConstantStruct",
            ValueClass::GlobalValue => "GlobalValue",
            ValueClass::Function => "Function",
            ValueClass::GlobalVariable => "GlobalVariable",
            ValueClass::GlobalAlias => "GlobalAlias",
        }
    }
}

/// Wrapper class for the type family.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TypeClass {
    Type,
    Array,
}

impl TypeClass {
    #[must_use]
    pub fn parent(self) -> Option<TypeClass> {
        match self {
            TypeClass::Type => None,
            TypeClass::Array => Some(TypeClass::Type),
        }
    }

    #[must_use]
    pub fn is_a(self, ancestor: TypeClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = class.parent();
        }
        false
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TypeClass::Type => "Type",
            TypeClass::Array => "ArrayType",
        }
    }
}

/// Wrapper class for the metadata family.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MetadataClass {
    Metadata,
    CompileUnit,
}

impl MetadataClass {
    #[must_use]
    pub fn parent(self) -> Option<MetadataClass> {
        match self {
            MetadataClass::Metadata => None,
            MetadataClass::CompileUnit => Some(MetadataClass::Metadata),
        }
    }

    #[must_use]
    pub fn is_a(self, ancestor: MetadataClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = class.parent();
        }
        false
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MetadataClass::Metadata => "Metadata",
            MetadataClass::CompileUnit => "DICompileUnit",
        }
    }
}

/// Map a value discriminant to its most specific wrapper class.
///
/// This is the fixed dispatch table the factory consults once per handle.
/// Kinds without a dedicated wrapper map to the nearest ancestor: `ConstantFP`
/// has no wrapper of its own and lands on [`ValueClass::Constant`]; anything
/// unrecognized lands on [`ValueClass::Value`].
#[must_use]
pub fn classify_value(kind: ValueKind) -> ValueClass {
    match kind {
        ValueKind::Argument => ValueClass::Argument,
        ValueKind::Function => ValueClass::Function,
        ValueKind::GlobalVariable => ValueClass::GlobalVariable,
        ValueKind::GlobalAlias => ValueClass::GlobalAlias,
        ValueKind::ConstantInt => ValueClass::ConstantInt,
        ValueKind::ConstantStruct => ValueClass::ConstantStruct,
        ValueKind::ConstantFP => ValueClass::Constant,
        ValueKind::Instruction(op) => classify_opcode(op),
        ValueKind::Other(_) => ValueClass::Value,
    }
}

/// Map an instruction opcode to its wrapper class.
#[must_use]
pub fn classify_opcode(op: Opcode) -> ValueClass {
    match op {
        Opcode::Br => ValueClass::Branch,
        Opcode::ICmp | Opcode::FCmp => ValueClass::Cmp,
        Opcode::LandingPad => ValueClass::LandingPad,
        op if op.is_terminator() => ValueClass::Terminator,
        _ => ValueClass::Instruction,
    }
}

/// Map a type discriminant to its wrapper class.
#[must_use]
pub fn classify_type(kind: TypeKind) -> TypeClass {
    match kind {
        TypeKind::Array => TypeClass::Array,
        _ => TypeClass::Type,
    }
}

/// Map a metadata discriminant to its wrapper class.
#[must_use]
pub fn classify_metadata(kind: MetadataKind) -> MetadataClass {
    match kind {
        MetadataKind::CompileUnit => MetadataClass::CompileUnit,
        _ => MetadataClass::Metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ancestry() {
        assert!(ValueClass::Branch.is_a(ValueClass::Terminator));
        assert!(ValueClass::Branch.is_a(ValueClass::Instruction));
        assert!(ValueClass::Branch.is_a(ValueClass::Value));
        assert!(!ValueClass::Branch.is_a(ValueClass::Constant));
        assert!(ValueClass::Function.is_a(ValueClass::GlobalValue));
        assert!(ValueClass::Function.is_a(ValueClass::Constant));
        assert!(!ValueClass::Value.is_a(ValueClass::Instruction));
    }

    #[test]
    fn branch_and_cmp_mapping() {
        assert_eq!(classify_opcode(Opcode::Br), ValueClass::Branch);
        assert_eq!(classify_opcode(Opcode::ICmp), ValueClass::Cmp);
        assert_eq!(classify_opcode(Opcode::FCmp), ValueClass::Cmp);
        assert_eq!(classify_opcode(Opcode::LandingPad), ValueClass::LandingPad);
    }

    #[test]
    fn terminators_without_dedicated_wrapper() {
        assert_eq!(classify_opcode(Opcode::Ret), ValueClass::Terminator);
        assert_eq!(classify_opcode(Opcode::Switch), ValueClass::Terminator);
        assert_eq!(classify_opcode(Opcode::Unreachable), ValueClass::Terminator);
    }

    #[test]
    fn unknown_discriminants_fall_back_to_ancestors() {
        assert_eq!(classify_value(ValueKind::Other(999)), ValueClass::Value);
        assert_eq!(
            classify_opcode(Opcode::Other(999)),
            ValueClass::Instruction
        );
        assert_eq!(classify_value(ValueKind::ConstantFP), ValueClass::Constant);
        assert_eq!(classify_type(TypeKind::Other(999)), TypeClass::Type);
        assert_eq!(
            classify_metadata(MetadataKind::Other(999)),
            MetadataClass::Metadata
        );
    }

    #[test]
    fn memory_access_opcodes() {
        assert!(Opcode::Alloca.is_memory_access());
        assert!(Opcode::Load.is_memory_access());
        assert!(Opcode::Store.is_memory_access());
        assert!(!Opcode::Add.is_memory_access());
    }
}
