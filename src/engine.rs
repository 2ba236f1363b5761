//! The native query surface.
//!
//! Everything the binding layer knows about the native object graph flows
//! through [`NativeEngine`]: discriminant queries, owning-context queries, and
//! the small set of accessors needed to construct wrappers and walk module
//! contents. The engine owns the authoritative state; this crate only
//! reconstructs identity and lifetime on top of it.
//!
//! An `llvm-sys`-backed implementation lives behind the `llvm17` feature; the
//! test suite runs against an in-memory double.

use crate::handle::Handle;
use crate::kind::{MetadataKind, TypeKind, ValueKind};

/// Operations the binding layer requires from the wrapped native library.
///
/// All handle arguments must be live handles previously produced by the same
/// engine; passing a freed or foreign handle is a caller bug and engines are
/// free to abort on it. The binding layer guarantees it never does so as long
/// as callers respect the disposal contract.
pub trait NativeEngine {
    // -- Context lifecycle --

    /// Create a fresh top-level context.
    fn create_context(&self) -> Handle;

    /// Release a context and everything still owned by it.
    fn dispose_context(&self, context: Handle);

    // -- Module lifecycle --

    /// Create a named module inside `context`.
    fn create_module(&self, context: Handle, name: &str) -> Handle;

    /// Release a single module, leaving its context and siblings intact.
    fn dispose_module(&self, module: Handle);

    /// The module's name, as recorded at creation or parse time.
    fn module_name(&self, module: Handle) -> String;

    /// The context a module lives in.
    fn owning_context_of(&self, module: Handle) -> Handle;

    /// Clone a module within its own context.
    fn clone_module(&self, module: Handle) -> Handle;

    /// Merge `src` into `dest`. On success `src` is consumed by the engine
    /// and must not be touched again.
    fn link_modules(&self, dest: Handle, src: Handle) -> Result<(), String>;

    /// Verify a module, returning the engine's diagnostic on failure.
    fn verify_module(&self, module: Handle) -> Result<(), String>;

    // -- Serialization (cross-context clone) --

    /// Serialize a module to an in-memory buffer.
    fn write_bitcode(&self, module: Handle) -> Vec<u8>;

    /// Materialize a serialized module inside `context`.
    fn parse_bitcode(&self, context: Handle, buffer: &[u8]) -> Result<Handle, String>;

    // -- Module attributes --

    /// Apply a data layout string to a module.
    fn set_data_layout(&self, module: Handle, layout: &str);

    /// The module's current data layout string.
    fn data_layout(&self, module: Handle) -> String;

    /// Set the target triple.
    fn set_target_triple(&self, module: Handle, triple: &str);

    /// The module's target triple.
    fn target_triple(&self, module: Handle) -> String;

    // -- Content walking --

    /// First global in a module, or null if it has none.
    fn first_global(&self, module: Handle) -> Handle;

    /// Next global after `global`, or null at the end.
    fn next_global(&self, global: Handle) -> Handle;

    /// First function in a module, or null.
    fn first_function(&self, module: Handle) -> Handle;

    /// Next function after `function`, or null.
    fn next_function(&self, function: Handle) -> Handle;

    /// Global variable by name, or null.
    fn named_global(&self, module: Handle, name: &str) -> Handle;

    /// Function by name, or null.
    fn named_function(&self, module: Handle, name: &str) -> Handle;

    // -- Discriminants --

    /// The discriminant of a value handle (instruction handles report their
    /// opcode as part of the kind).
    fn value_discriminant(&self, value: Handle) -> ValueKind;

    /// The discriminant of a type handle.
    fn type_discriminant(&self, ty: Handle) -> TypeKind;

    /// The discriminant of a metadata handle.
    fn metadata_discriminant(&self, metadata: Handle) -> MetadataKind;

    // -- Value accessors --

    /// A value's name; empty for unnamed values.
    fn value_name(&self, value: Handle) -> String;

    /// The type of a value.
    fn value_type(&self, value: Handle) -> Handle;

    /// Number of operands of an instruction or user value.
    fn operand_count(&self, value: Handle) -> u32;

    /// Operand `index` of a value, or null when out of range.
    fn operand(&self, value: Handle, index: u32) -> Handle;

    /// The target of a global alias, or null if it has none.
    fn aliasee(&self, alias: Handle) -> Handle;

    // -- Type accessors --

    /// Element type of an array type.
    fn element_type(&self, ty: Handle) -> Handle;

    /// Element count of an array type.
    fn array_length(&self, ty: Handle) -> u64;

    // -- Data layout objects --

    /// Parse a data layout string into an owned layout object.
    fn create_target_data(&self, layout: &str) -> Handle;

    /// String form of a layout object.
    fn target_data_repr(&self, data: Handle) -> String;

    /// Release a layout object.
    fn dispose_target_data(&self, data: Handle);

    // -- Debug info --

    /// Create a debug-info builder attached to `module`.
    fn create_di_builder(&self, module: Handle) -> Handle;

    /// Release a debug-info builder.
    fn dispose_di_builder(&self, builder: Handle);

    /// Create the root compile unit for a builder.
    fn di_create_compile_unit(
        &self,
        builder: Handle,
        file: &str,
        producer: &str,
        optimized: bool,
        runtime_version: u32,
    ) -> Handle;

    /// Resolve all temporary debug metadata. Must be called before emission.
    fn di_finalize(&self, builder: Handle);
}
