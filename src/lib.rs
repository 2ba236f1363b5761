//! Handle identity and lifetime binding over a native compiler IR library.
//!
//! The native library exposes its object graph as opaque handles: raw
//! addresses with no type or ownership information. This crate rebuilds the
//! three properties safe code needs on top of them:
//!
//! - **Identity**: one wrapper object per (context, handle) pair, so wrapper
//!   pointer equality means native object equality. See [`Context::resolve`].
//! - **Classification**: a handle's discriminant is queried once and mapped
//!   through fixed tables to the most specific wrapper class, with unknown
//!   discriminants falling back to the nearest ancestor. See [`kind`].
//! - **Lifetime**: contexts are the ownership roots; modules, layouts, and
//!   debug-info builders have explicit, idempotent disposal, and anything
//!   that outlives its owner degrades to an error instead of dangling.
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=irbind=debug`: trace context and module lifecycle events.
//! - `RUST_LOG=irbind=trace`: additionally log every wrapper cache insert.
//!
//! # Threading
//!
//! A context and everything under it belongs to one thread. The API encodes
//! this with `Rc` interior state; none of the public types are `Send`.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use irbind::{Module, Registry};
//!
//! let registry = Registry::new(Rc::new(irbind::llvm::LlvmEngine::new()));
//! let module = Module::with_name(&registry, "demo")?;
//! for function in module.functions() {
//!     println!("{}", function?.name()?);
//! }
//! module.dispose();
//! # Ok::<(), irbind::BindError>(())
//! ```

pub mod context;
pub mod debug_info;
pub mod engine;
pub mod error;
pub mod handle;
pub mod kind;
pub mod layout;
pub mod metadata;
pub mod module;
pub mod registry;
pub mod types;
pub mod values;

mod factory;

#[cfg(feature = "llvm17")]
pub mod llvm;

pub use context::Context;
pub use debug_info::{DebugConfig, DebugInfoBuilder};
pub use engine::NativeEngine;
pub use error::BindError;
pub use handle::Handle;
pub use kind::{MetadataKind, Opcode, TypeKind, ValueClass, ValueKind};
pub use layout::DataLayout;
pub use metadata::{DICompileUnit, Metadata, MetadataRef};
pub use module::{Functions, Globals, Module};
pub use registry::Registry;
pub use types::{ArrayType, Type, TypeRef};
pub use values::{
    Argument, Branch, Cmp, Constant, ConstantInt, ConstantStruct, Function, GlobalAlias,
    GlobalValue, GlobalVariable, Instruction, LandingPad, Terminator, Value, ValueRef,
};

#[cfg(test)]
pub(crate) mod tests;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=irbind=debug` or `RUST_LOG=irbind=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
