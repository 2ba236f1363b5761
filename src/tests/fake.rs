//! In-memory engine double for the test suite.
//!
//! Tracks every handle it hands out and panics on any use of a freed or
//! unknown handle, so lifetime bugs in the binding layer fail tests loudly
//! instead of silently reading stale state. Bitcode is a bincode-serialized
//! image of the module, which makes cross-context cloning a real round trip.

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::NativeEngine;
use crate::handle::Handle;
use crate::kind::{MetadataKind, Opcode, TypeKind, ValueKind};

#[derive(Default)]
struct ContextState {
    default_type: Handle,
}

#[derive(Default)]
struct ModuleState {
    context: Handle,
    name: String,
    layout: String,
    triple: String,
    globals: Vec<Handle>,
    functions: Vec<Handle>,
    broken: Option<String>,
}

struct ValueState {
    module: Handle,
    kind: ValueKind,
    name: String,
    ty: Handle,
    operands: Vec<Handle>,
    aliasee: Handle,
}

struct TypeState {
    context: Handle,
    kind: TypeKind,
    element: Handle,
    len: u64,
}

struct MetadataState {
    context: Handle,
    kind: MetadataKind,
}

#[derive(Default)]
struct State {
    next: usize,
    contexts: BTreeMap<Handle, ContextState>,
    modules: BTreeMap<Handle, ModuleState>,
    values: BTreeMap<Handle, ValueState>,
    types: BTreeMap<Handle, TypeState>,
    metadata: BTreeMap<Handle, MetadataState>,
    target_data: BTreeMap<Handle, String>,
    di_builders: BTreeMap<Handle, Handle>,
}

impl State {
    fn alloc(&mut self) -> Handle {
        self.next += 8;
        Handle::from_raw(0x1000 + self.next)
    }

    fn context(&self, handle: Handle) -> &ContextState {
        self.contexts
            .get(&handle)
            .unwrap_or_else(|| panic!("use of unknown or freed context {handle}"))
    }

    fn module(&self, handle: Handle) -> &ModuleState {
        self.modules
            .get(&handle)
            .unwrap_or_else(|| panic!("use of unknown or freed module {handle}"))
    }

    fn module_mut(&mut self, handle: Handle) -> &mut ModuleState {
        self.modules
            .get_mut(&handle)
            .unwrap_or_else(|| panic!("use of unknown or freed module {handle}"))
    }

    fn value(&self, handle: Handle) -> &ValueState {
        self.values
            .get(&handle)
            .unwrap_or_else(|| panic!("use of unknown or freed value {handle}"))
    }

    fn default_type(&mut self, context: Handle) -> Handle {
        let existing = self.context(context).default_type;
        if !existing.is_null() {
            return existing;
        }
        let handle = self.alloc();
        self.types.insert(
            handle,
            TypeState {
                context,
                kind: TypeKind::Integer,
                element: Handle::NULL,
                len: 0,
            },
        );
        self.contexts
            .get_mut(&context)
            .unwrap_or_else(|| panic!("use of unknown or freed context {context}"))
            .default_type = handle;
        handle
    }

    fn new_value(&mut self, module: Handle, kind: ValueKind, name: &str) -> Handle {
        let context = self.module(module).context;
        let ty = self.default_type(context);
        let handle = self.alloc();
        self.values.insert(
            handle,
            ValueState {
                module,
                kind,
                name: name.to_string(),
                ty,
                operands: Vec::new(),
                aliasee: Handle::NULL,
            },
        );
        handle
    }

    fn drop_module_state(&mut self, module: Handle) {
        self.modules
            .remove(&module)
            .unwrap_or_else(|| panic!("double dispose of module {module}"));
        self.values.retain(|_, value| value.module != module);
    }
}

/// The serialized form a module takes in "bitcode".
#[derive(Serialize, Deserialize)]
struct ModuleImage {
    name: String,
    layout: String,
    triple: String,
    globals: Vec<String>,
    functions: Vec<String>,
}

/// Test double for [`NativeEngine`].
#[derive(Default)]
pub struct FakeEngine {
    state: RefCell<State>,
}

impl FakeEngine {
    pub fn new() -> Self {
        FakeEngine::default()
    }

    // -- Test-authoring helpers --

    pub fn add_global(&self, module: Handle, name: &str) -> Handle {
        let mut state = self.state.borrow_mut();
        let handle = state.new_value(module, ValueKind::GlobalVariable, name);
        state.module_mut(module).globals.push(handle);
        handle
    }

    pub fn add_function(&self, module: Handle, name: &str) -> Handle {
        let mut state = self.state.borrow_mut();
        let handle = state.new_value(module, ValueKind::Function, name);
        state.module_mut(module).functions.push(handle);
        handle
    }

    pub fn add_alias(&self, module: Handle, name: &str, aliasee: Handle) -> Handle {
        let mut state = self.state.borrow_mut();
        let handle = state.new_value(module, ValueKind::GlobalAlias, name);
        state.values.get_mut(&handle).expect("just created").aliasee = aliasee;
        state.module_mut(module).globals.push(handle);
        handle
    }

    pub fn add_value(&self, module: Handle, kind: ValueKind, name: &str) -> Handle {
        self.state.borrow_mut().new_value(module, kind, name)
    }

    pub fn add_instruction(&self, module: Handle, op: Opcode, operands: &[Handle]) -> Handle {
        let mut state = self.state.borrow_mut();
        let handle = state.new_value(module, ValueKind::Instruction(op), "");
        state.values.get_mut(&handle).expect("just created").operands = operands.to_vec();
        handle
    }

    pub fn add_type(&self, context: Handle, kind: TypeKind) -> Handle {
        let mut state = self.state.borrow_mut();
        state.context(context);
        let handle = state.alloc();
        state.types.insert(
            handle,
            TypeState {
                context,
                kind,
                element: Handle::NULL,
                len: 0,
            },
        );
        handle
    }

    pub fn add_array_type(&self, context: Handle, element: Handle, len: u64) -> Handle {
        let mut state = self.state.borrow_mut();
        state.context(context);
        let handle = state.alloc();
        state.types.insert(
            handle,
            TypeState {
                context,
                kind: TypeKind::Array,
                element,
                len,
            },
        );
        handle
    }

    pub fn add_metadata(&self, context: Handle, kind: MetadataKind) -> Handle {
        let mut state = self.state.borrow_mut();
        state.context(context);
        let handle = state.alloc();
        state.metadata.insert(handle, MetadataState { context, kind });
        handle
    }

    /// Make `verify_module` fail with `message`.
    pub fn mark_broken(&self, module: Handle, message: &str) {
        self.state.borrow_mut().module_mut(module).broken = Some(message.to_string());
    }

    // -- Inspection --

    pub fn live_contexts(&self) -> usize {
        self.state.borrow().contexts.len()
    }

    pub fn live_modules(&self) -> usize {
        self.state.borrow().modules.len()
    }

    pub fn live_target_data(&self) -> usize {
        self.state.borrow().target_data.len()
    }

    pub fn live_di_builders(&self) -> usize {
        self.state.borrow().di_builders.len()
    }
}

impl NativeEngine for FakeEngine {
    fn create_context(&self) -> Handle {
        let mut state = self.state.borrow_mut();
        let handle = state.alloc();
        state.contexts.insert(handle, ContextState::default());
        handle
    }

    fn dispose_context(&self, context: Handle) {
        let mut state = self.state.borrow_mut();
        state
            .contexts
            .remove(&context)
            .unwrap_or_else(|| panic!("double dispose of context {context}"));
        let orphaned: Vec<Handle> = state
            .modules
            .iter()
            .filter(|(_, module)| module.context == context)
            .map(|(&handle, _)| handle)
            .collect();
        assert!(
            orphaned.is_empty(),
            "context {context} disposed while modules {orphaned:?} were still alive"
        );
        let stale_builders = state
            .di_builders
            .values()
            .any(|&module| !state.modules.contains_key(&module));
        assert!(
            !stale_builders,
            "debug-info builder outlived its module during context disposal"
        );
        state.types.retain(|_, ty| ty.context != context);
        state.metadata.retain(|_, node| node.context != context);
    }

    fn create_module(&self, context: Handle, name: &str) -> Handle {
        let mut state = self.state.borrow_mut();
        state.context(context);
        let handle = state.alloc();
        state.modules.insert(
            handle,
            ModuleState {
                context,
                name: name.to_string(),
                ..ModuleState::default()
            },
        );
        handle
    }

    fn dispose_module(&self, module: Handle) {
        let mut state = self.state.borrow_mut();
        let stale_builders = state.di_builders.values().any(|&owner| owner == module);
        assert!(
            !stale_builders,
            "module {module} disposed while its debug-info builder was still alive"
        );
        state.drop_module_state(module);
    }

    fn module_name(&self, module: Handle) -> String {
        self.state.borrow().module(module).name.clone()
    }

    fn owning_context_of(&self, module: Handle) -> Handle {
        self.state.borrow().module(module).context
    }

    fn clone_module(&self, module: Handle) -> Handle {
        let mut state = self.state.borrow_mut();
        let (context, name, layout, triple, globals, functions) = {
            let source = state.module(module);
            (
                source.context,
                source.name.clone(),
                source.layout.clone(),
                source.triple.clone(),
                source.globals.clone(),
                source.functions.clone(),
            )
        };
        let clone = state.alloc();
        state.modules.insert(
            clone,
            ModuleState {
                context,
                name,
                layout,
                triple,
                ..ModuleState::default()
            },
        );
        for global in globals {
            let (kind, name) = {
                let value = state.value(global);
                (value.kind, value.name.clone())
            };
            let copy = state.new_value(clone, kind, &name);
            state.module_mut(clone).globals.push(copy);
        }
        for function in functions {
            let name = state.value(function).name.clone();
            let copy = state.new_value(clone, ValueKind::Function, &name);
            state.module_mut(clone).functions.push(copy);
        }
        clone
    }

    fn link_modules(&self, dest: Handle, src: Handle) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        assert_eq!(
            state.module(dest).context,
            state.module(src).context,
            "engine asked to link modules from different contexts"
        );
        let collision = state.module(src).functions.iter().find(|&&f| {
            let name = &state.value(f).name;
            state
                .module(dest)
                .functions
                .iter()
                .any(|&existing| &state.value(existing).name == name)
        });
        if let Some(&collision) = collision {
            // The source is consumed even on failure, mirroring the native
            // linker's behavior.
            let name = state.value(collision).name.clone();
            state.drop_module_state(src);
            return Err(format!("symbol multiply defined: {name}"));
        }
        let (globals, functions) = {
            let source = state.module(src);
            (source.globals.clone(), source.functions.clone())
        };
        for &moved in globals.iter().chain(&functions) {
            state
                .values
                .get_mut(&moved)
                .unwrap_or_else(|| panic!("use of unknown or freed value {moved}"))
                .module = dest;
        }
        state.module_mut(dest).globals.extend(globals);
        state.module_mut(dest).functions.extend(functions);
        state.modules.remove(&src);
        Ok(())
    }

    fn verify_module(&self, module: Handle) -> Result<(), String> {
        match &self.state.borrow().module(module).broken {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn write_bitcode(&self, module: Handle) -> Vec<u8> {
        let state = self.state.borrow();
        let source = state.module(module);
        let image = ModuleImage {
            name: source.name.clone(),
            layout: source.layout.clone(),
            triple: source.triple.clone(),
            globals: source
                .globals
                .iter()
                .map(|&g| state.value(g).name.clone())
                .collect(),
            functions: source
                .functions
                .iter()
                .map(|&f| state.value(f).name.clone())
                .collect(),
        };
        bincode::serialize(&image).expect("module image serialization")
    }

    fn parse_bitcode(&self, context: Handle, buffer: &[u8]) -> Result<Handle, String> {
        let image: ModuleImage =
            bincode::deserialize(buffer).map_err(|err| format!("malformed bitcode: {err}"))?;
        let mut state = self.state.borrow_mut();
        state.context(context);
        let handle = state.alloc();
        state.modules.insert(
            handle,
            ModuleState {
                context,
                name: image.name,
                layout: image.layout,
                triple: image.triple,
                ..ModuleState::default()
            },
        );
        for name in image.globals {
            let value = state.new_value(handle, ValueKind::GlobalVariable, &name);
            state.module_mut(handle).globals.push(value);
        }
        for name in image.functions {
            let value = state.new_value(handle, ValueKind::Function, &name);
            state.module_mut(handle).functions.push(value);
        }
        Ok(handle)
    }

    fn set_data_layout(&self, module: Handle, layout: &str) {
        self.state.borrow_mut().module_mut(module).layout = layout.to_string();
    }

    fn data_layout(&self, module: Handle) -> String {
        self.state.borrow().module(module).layout.clone()
    }

    fn set_target_triple(&self, module: Handle, triple: &str) {
        self.state.borrow_mut().module_mut(module).triple = triple.to_string();
    }

    fn target_triple(&self, module: Handle) -> String {
        self.state.borrow().module(module).triple.clone()
    }

    fn first_global(&self, module: Handle) -> Handle {
        self.state
            .borrow()
            .module(module)
            .globals
            .first()
            .copied()
            .unwrap_or(Handle::NULL)
    }

    fn next_global(&self, global: Handle) -> Handle {
        let state = self.state.borrow();
        let module = state.value(global).module;
        let globals = &state.module(module).globals;
        globals
            .iter()
            .position(|&g| g == global)
            .and_then(|index| globals.get(index + 1))
            .copied()
            .unwrap_or(Handle::NULL)
    }

    fn first_function(&self, module: Handle) -> Handle {
        self.state
            .borrow()
            .module(module)
            .functions
            .first()
            .copied()
            .unwrap_or(Handle::NULL)
    }

    fn next_function(&self, function: Handle) -> Handle {
        let state = self.state.borrow();
        let module = state.value(function).module;
        let functions = &state.module(module).functions;
        functions
            .iter()
            .position(|&f| f == function)
            .and_then(|index| functions.get(index + 1))
            .copied()
            .unwrap_or(Handle::NULL)
    }

    fn named_global(&self, module: Handle, name: &str) -> Handle {
        let state = self.state.borrow();
        state
            .module(module)
            .globals
            .iter()
            .find(|&&g| state.value(g).name == name)
            .copied()
            .unwrap_or(Handle::NULL)
    }

    fn named_function(&self, module: Handle, name: &str) -> Handle {
        let state = self.state.borrow();
        state
            .module(module)
            .functions
            .iter()
            .find(|&&f| state.value(f).name == name)
            .copied()
            .unwrap_or(Handle::NULL)
    }

    fn value_discriminant(&self, value: Handle) -> ValueKind {
        self.state.borrow().value(value).kind
    }

    fn type_discriminant(&self, ty: Handle) -> TypeKind {
        self.state
            .borrow()
            .types
            .get(&ty)
            .unwrap_or_else(|| panic!("use of unknown or freed type {ty}"))
            .kind
    }

    fn metadata_discriminant(&self, metadata: Handle) -> MetadataKind {
        self.state
            .borrow()
            .metadata
            .get(&metadata)
            .unwrap_or_else(|| panic!("use of unknown or freed metadata {metadata}"))
            .kind
    }

    fn value_name(&self, value: Handle) -> String {
        self.state.borrow().value(value).name.clone()
    }

    fn value_type(&self, value: Handle) -> Handle {
        self.state.borrow().value(value).ty
    }

    fn operand_count(&self, value: Handle) -> u32 {
        u32::try_from(self.state.borrow().value(value).operands.len()).expect("operand count")
    }

    fn operand(&self, value: Handle, index: u32) -> Handle {
        self.state
            .borrow()
            .value(value)
            .operands
            .get(index as usize)
            .copied()
            .unwrap_or(Handle::NULL)
    }

    fn aliasee(&self, alias: Handle) -> Handle {
        self.state.borrow().value(alias).aliasee
    }

    fn element_type(&self, ty: Handle) -> Handle {
        self.state
            .borrow()
            .types
            .get(&ty)
            .unwrap_or_else(|| panic!("use of unknown or freed type {ty}"))
            .element
    }

    fn array_length(&self, ty: Handle) -> u64 {
        self.state
            .borrow()
            .types
            .get(&ty)
            .unwrap_or_else(|| panic!("use of unknown or freed type {ty}"))
            .len
    }

    fn create_target_data(&self, layout: &str) -> Handle {
        let mut state = self.state.borrow_mut();
        let handle = state.alloc();
        state.target_data.insert(handle, layout.to_string());
        handle
    }

    fn target_data_repr(&self, data: Handle) -> String {
        self.state
            .borrow()
            .target_data
            .get(&data)
            .unwrap_or_else(|| panic!("use of unknown or freed target data {data}"))
            .clone()
    }

    fn dispose_target_data(&self, data: Handle) {
        self.state
            .borrow_mut()
            .target_data
            .remove(&data)
            .unwrap_or_else(|| panic!("double dispose of target data {data}"));
    }

    fn create_di_builder(&self, module: Handle) -> Handle {
        let mut state = self.state.borrow_mut();
        state.module(module);
        let handle = state.alloc();
        state.di_builders.insert(handle, module);
        handle
    }

    fn dispose_di_builder(&self, builder: Handle) {
        self.state
            .borrow_mut()
            .di_builders
            .remove(&builder)
            .unwrap_or_else(|| panic!("double dispose of debug-info builder {builder}"));
    }

    fn di_create_compile_unit(
        &self,
        builder: Handle,
        _file: &str,
        _producer: &str,
        _optimized: bool,
        _runtime_version: u32,
    ) -> Handle {
        let mut state = self.state.borrow_mut();
        let module = *state
            .di_builders
            .get(&builder)
            .unwrap_or_else(|| panic!("use of unknown or freed debug-info builder {builder}"));
        let context = state.module(module).context;
        let handle = state.alloc();
        state
            .metadata
            .insert(handle, MetadataState { context, kind: MetadataKind::CompileUnit });
        handle
    }

    fn di_finalize(&self, builder: Handle) {
        assert!(
            self.state.borrow().di_builders.contains_key(&builder),
            "use of unknown or freed debug-info builder {builder}"
        );
    }
}
