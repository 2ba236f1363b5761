//! `NativeEngine` backed by `llvm-sys` (LLVM 17).
//!
//! Handles are raw LLVM-C pointers reinterpreted as addresses. The safety
//! argument lives one layer up: the identity and lifetime layer never hands
//! this module a freed handle, so every call site assumes a live pointer.

#![allow(unsafe_code)]

use std::ffi::CString;
use std::os::raw::c_char;

use llvm_sys::bit_reader::LLVMParseBitcodeInContext2;
use llvm_sys::bit_writer::LLVMWriteBitcodeToMemoryBuffer;
use llvm_sys::core::{
    LLVMAliasGetAliasee, LLVMCloneModule, LLVMContextCreate, LLVMContextDispose,
    LLVMCreateMemoryBufferWithMemoryRangeCopy, LLVMDisposeMemoryBuffer, LLVMDisposeMessage,
    LLVMDisposeModule, LLVMGetArrayLength2, LLVMGetBufferSize, LLVMGetBufferStart,
    LLVMGetDataLayoutStr, LLVMGetElementType, LLVMGetFirstFunction, LLVMGetFirstGlobal,
    LLVMGetInstructionOpcode, LLVMGetModuleContext, LLVMGetModuleIdentifier, LLVMGetNamedFunction,
    LLVMGetNamedGlobal, LLVMGetNextFunction, LLVMGetNextGlobal, LLVMGetNumOperands,
    LLVMGetOperand, LLVMGetTarget, LLVMGetTypeKind, LLVMGetValueKind, LLVMGetValueName2,
    LLVMModuleCreateWithNameInContext, LLVMSetDataLayout, LLVMSetTarget, LLVMTypeOf,
};
use llvm_sys::debuginfo::{
    LLVMCreateDIBuilder, LLVMDIBuilderCreateCompileUnit, LLVMDIBuilderCreateFile,
    LLVMDIBuilderFinalize, LLVMDWARFEmissionKind, LLVMDWARFSourceLanguage, LLVMDisposeDIBuilder,
    LLVMGetMetadataKind, LLVMMetadataKind,
};
use llvm_sys::linker::LLVMLinkModules2;
use llvm_sys::target::{
    LLVMCopyStringRepOfTargetData, LLVMCreateTargetData, LLVMDisposeTargetData,
};
use llvm_sys::analysis::{LLVMVerifierFailureAction, LLVMVerifyModule};
use llvm_sys::prelude::{
    LLVMContextRef, LLVMDIBuilderRef, LLVMMetadataRef, LLVMModuleRef, LLVMTypeRef, LLVMValueRef,
};
use llvm_sys::LLVMOpcode;
use llvm_sys::LLVMTypeKind as CTypeKind;
use llvm_sys::LLVMValueKind as CValueKind;

use crate::engine::NativeEngine;
use crate::handle::Handle;
use crate::kind::{MetadataKind, Opcode, TypeKind, ValueKind};

/// The real engine. Stateless; all state lives inside LLVM.
#[derive(Default)]
pub struct LlvmEngine;

impl LlvmEngine {
    #[must_use]
    pub fn new() -> Self {
        LlvmEngine
    }
}

fn handle<T>(ptr: *mut T) -> Handle {
    Handle::from_raw(ptr as usize)
}

fn context_ref(handle: Handle) -> LLVMContextRef {
    handle.raw() as LLVMContextRef
}

fn module_ref(handle: Handle) -> LLVMModuleRef {
    handle.raw() as LLVMModuleRef
}

fn value_ref(handle: Handle) -> LLVMValueRef {
    handle.raw() as LLVMValueRef
}

fn type_ref(handle: Handle) -> LLVMTypeRef {
    handle.raw() as LLVMTypeRef
}

fn metadata_ref(handle: Handle) -> LLVMMetadataRef {
    handle.raw() as LLVMMetadataRef
}

fn di_builder_ref(handle: Handle) -> LLVMDIBuilderRef {
    handle.raw() as LLVMDIBuilderRef
}

fn c_string(s: &str) -> CString {
    // Interior NULs cannot round-trip through the C API; truncate at the
    // first one rather than aborting.
    CString::new(s.as_bytes().split(|&b| b == 0).next().unwrap_or_default())
        .unwrap_or_default()
}

/// Copy an (ptr, len) string the API does not hand us ownership of.
unsafe fn borrowed_str(ptr: *const c_char, len: usize) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let bytes = std::slice::from_raw_parts(ptr.cast::<u8>(), len);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Copy and free a message string LLVM allocated for us.
unsafe fn owned_message(ptr: *mut c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let message = std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned();
    LLVMDisposeMessage(ptr);
    message
}

fn map_opcode(op: LLVMOpcode) -> Opcode {
    match op {
        LLVMOpcode::LLVMRet => Opcode::Ret,
        LLVMOpcode::LLVMBr => Opcode::Br,
        LLVMOpcode::LLVMSwitch => Opcode::Switch,
        LLVMOpcode::LLVMIndirectBr => Opcode::IndirectBr,
        LLVMOpcode::LLVMInvoke => Opcode::Invoke,
        LLVMOpcode::LLVMUnreachable => Opcode::Unreachable,
        LLVMOpcode::LLVMAdd => Opcode::Add,
        LLVMOpcode::LLVMSub => Opcode::Sub,
        LLVMOpcode::LLVMMul => Opcode::Mul,
        LLVMOpcode::LLVMAlloca => Opcode::Alloca,
        LLVMOpcode::LLVMLoad => Opcode::Load,
        LLVMOpcode::LLVMStore => Opcode::Store,
        LLVMOpcode::LLVMGetElementPtr => Opcode::GetElementPtr,
        LLVMOpcode::LLVMICmp => Opcode::ICmp,
        LLVMOpcode::LLVMFCmp => Opcode::FCmp,
        LLVMOpcode::LLVMPHI => Opcode::Phi,
        LLVMOpcode::LLVMCall => Opcode::Call,
        LLVMOpcode::LLVMSelect => Opcode::Select,
        LLVMOpcode::LLVMLandingPad => Opcode::LandingPad,
        LLVMOpcode::LLVMResume => Opcode::Resume,
        other => Opcode::Other(other as u32),
    }
}

impl NativeEngine for LlvmEngine {
    fn create_context(&self) -> Handle {
        unsafe { handle(LLVMContextCreate()) }
    }

    fn dispose_context(&self, context: Handle) {
        unsafe { LLVMContextDispose(context_ref(context)) }
    }

    fn create_module(&self, context: Handle, name: &str) -> Handle {
        let name = c_string(name);
        unsafe {
            handle(LLVMModuleCreateWithNameInContext(
                name.as_ptr(),
                context_ref(context),
            ))
        }
    }

    fn dispose_module(&self, module: Handle) {
        unsafe { LLVMDisposeModule(module_ref(module)) }
    }

    fn module_name(&self, module: Handle) -> String {
        unsafe {
            let mut len = 0usize;
            let ptr = LLVMGetModuleIdentifier(module_ref(module), &mut len);
            borrowed_str(ptr, len)
        }
    }

    fn owning_context_of(&self, module: Handle) -> Handle {
        unsafe { handle(LLVMGetModuleContext(module_ref(module))) }
    }

    fn clone_module(&self, module: Handle) -> Handle {
        unsafe { handle(LLVMCloneModule(module_ref(module))) }
    }

    fn link_modules(&self, dest: Handle, src: Handle) -> Result<(), String> {
        let failed = unsafe { LLVMLinkModules2(module_ref(dest), module_ref(src)) };
        if failed != 0 {
            // LLVM reports details through its diagnostic handler; all we
            // observe here is the failure bit.
            Err("module linking failed".to_string())
        } else {
            Ok(())
        }
    }

    fn verify_module(&self, module: Handle) -> Result<(), String> {
        unsafe {
            let mut message: *mut c_char = std::ptr::null_mut();
            let failed = LLVMVerifyModule(
                module_ref(module),
                LLVMVerifierFailureAction::LLVMReturnStatusAction,
                &mut message,
            );
            let message = owned_message(message);
            if failed != 0 {
                Err(message)
            } else {
                Ok(())
            }
        }
    }

    fn write_bitcode(&self, module: Handle) -> Vec<u8> {
        unsafe {
            let buffer = LLVMWriteBitcodeToMemoryBuffer(module_ref(module));
            let start = LLVMGetBufferStart(buffer);
            let size = LLVMGetBufferSize(buffer);
            let bytes = std::slice::from_raw_parts(start.cast::<u8>(), size).to_vec();
            LLVMDisposeMemoryBuffer(buffer);
            bytes
        }
    }

    fn parse_bitcode(&self, context: Handle, buffer: &[u8]) -> Result<Handle, String> {
        unsafe {
            let name = c_string("bitcode");
            let membuf = LLVMCreateMemoryBufferWithMemoryRangeCopy(
                buffer.as_ptr().cast::<c_char>(),
                buffer.len(),
                name.as_ptr(),
            );
            let mut module: LLVMModuleRef = std::ptr::null_mut();
            let failed = LLVMParseBitcodeInContext2(context_ref(context), membuf, &mut module);
            LLVMDisposeMemoryBuffer(membuf);
            if failed != 0 || module.is_null() {
                Err("malformed bitcode buffer".to_string())
            } else {
                Ok(handle(module))
            }
        }
    }

    fn set_data_layout(&self, module: Handle, layout: &str) {
        let layout = c_string(layout);
        unsafe { LLVMSetDataLayout(module_ref(module), layout.as_ptr()) }
    }

    fn data_layout(&self, module: Handle) -> String {
        unsafe {
            let ptr = LLVMGetDataLayoutStr(module_ref(module));
            std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    fn set_target_triple(&self, module: Handle, triple: &str) {
        let triple = c_string(triple);
        unsafe { LLVMSetTarget(module_ref(module), triple.as_ptr()) }
    }

    fn target_triple(&self, module: Handle) -> String {
        unsafe {
            let ptr = LLVMGetTarget(module_ref(module));
            std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    fn first_global(&self, module: Handle) -> Handle {
        unsafe { handle(LLVMGetFirstGlobal(module_ref(module))) }
    }

    fn next_global(&self, global: Handle) -> Handle {
        unsafe { handle(LLVMGetNextGlobal(value_ref(global))) }
    }

    fn first_function(&self, module: Handle) -> Handle {
        unsafe { handle(LLVMGetFirstFunction(module_ref(module))) }
    }

    fn next_function(&self, function: Handle) -> Handle {
        unsafe { handle(LLVMGetNextFunction(value_ref(function))) }
    }

    fn named_global(&self, module: Handle, name: &str) -> Handle {
        let name = c_string(name);
        unsafe { handle(LLVMGetNamedGlobal(module_ref(module), name.as_ptr())) }
    }

    fn named_function(&self, module: Handle, name: &str) -> Handle {
        let name = c_string(name);
        unsafe { handle(LLVMGetNamedFunction(module_ref(module), name.as_ptr())) }
    }

    fn value_discriminant(&self, value: Handle) -> ValueKind {
        let kind = unsafe { LLVMGetValueKind(value_ref(value)) };
        match kind {
            CValueKind::LLVMArgumentValueKind => ValueKind::Argument,
            CValueKind::LLVMFunctionValueKind => ValueKind::Function,
            CValueKind::LLVMGlobalVariableValueKind => ValueKind::GlobalVariable,
            CValueKind::LLVMGlobalAliasValueKind => ValueKind::GlobalAlias,
            CValueKind::LLVMConstantIntValueKind => ValueKind::ConstantInt,
            CValueKind::LLVMConstantFPValueKind => ValueKind::ConstantFP,
            CValueKind::LLVMConstantStructValueKind => ValueKind::ConstantStruct,
            CValueKind::LLVMInstructionValueKind => {
                let op = unsafe { LLVMGetInstructionOpcode(value_ref(value)) };
                ValueKind::Instruction(map_opcode(op))
            }
            other => ValueKind::Other(other as u32),
        }
    }

    fn type_discriminant(&self, ty: Handle) -> TypeKind {
        let kind = unsafe { LLVMGetTypeKind(type_ref(ty)) };
        match kind {
            CTypeKind::LLVMVoidTypeKind => TypeKind::Void,
            CTypeKind::LLVMIntegerTypeKind => TypeKind::Integer,
            CTypeKind::LLVMFloatTypeKind => TypeKind::Float,
            CTypeKind::LLVMDoubleTypeKind => TypeKind::Double,
            CTypeKind::LLVMPointerTypeKind => TypeKind::Pointer,
            CTypeKind::LLVMFunctionTypeKind => TypeKind::Function,
            CTypeKind::LLVMStructTypeKind => TypeKind::Struct,
            CTypeKind::LLVMArrayTypeKind => TypeKind::Array,
            CTypeKind::LLVMVectorTypeKind => TypeKind::Vector,
            CTypeKind::LLVMLabelTypeKind => TypeKind::Label,
            CTypeKind::LLVMMetadataTypeKind => TypeKind::Metadata,
            other => TypeKind::Other(other as u32),
        }
    }

    fn metadata_discriminant(&self, metadata: Handle) -> MetadataKind {
        let kind = unsafe { LLVMGetMetadataKind(metadata_ref(metadata)) };
        match kind {
            LLVMMetadataKind::LLVMMDStringMetadataKind => MetadataKind::String,
            LLVMMetadataKind::LLVMMDTupleMetadataKind => MetadataKind::Node,
            LLVMMetadataKind::LLVMDICompileUnitMetadataKind => MetadataKind::CompileUnit,
            LLVMMetadataKind::LLVMDIFileMetadataKind => MetadataKind::File,
            LLVMMetadataKind::LLVMDISubprogramMetadataKind => MetadataKind::Subprogram,
            other => MetadataKind::Other(other as u32),
        }
    }

    fn value_name(&self, value: Handle) -> String {
        unsafe {
            let mut len = 0usize;
            let ptr = LLVMGetValueName2(value_ref(value), &mut len);
            borrowed_str(ptr, len)
        }
    }

    fn value_type(&self, value: Handle) -> Handle {
        unsafe { handle(LLVMTypeOf(value_ref(value))) }
    }

    fn operand_count(&self, value: Handle) -> u32 {
        let count = unsafe { LLVMGetNumOperands(value_ref(value)) };
        u32::try_from(count).unwrap_or(0)
    }

    fn operand(&self, value: Handle, index: u32) -> Handle {
        if index >= self.operand_count(value) {
            return Handle::NULL;
        }
        unsafe { handle(LLVMGetOperand(value_ref(value), index)) }
    }

    fn aliasee(&self, alias: Handle) -> Handle {
        unsafe { handle(LLVMAliasGetAliasee(value_ref(alias))) }
    }

    fn element_type(&self, ty: Handle) -> Handle {
        unsafe { handle(LLVMGetElementType(type_ref(ty))) }
    }

    fn array_length(&self, ty: Handle) -> u64 {
        unsafe { LLVMGetArrayLength2(type_ref(ty)) }
    }

    fn create_target_data(&self, layout: &str) -> Handle {
        let layout = c_string(layout);
        unsafe { handle(LLVMCreateTargetData(layout.as_ptr())) }
    }

    fn target_data_repr(&self, data: Handle) -> String {
        unsafe {
            let ptr = LLVMCopyStringRepOfTargetData(data.raw() as _);
            owned_message(ptr)
        }
    }

    fn dispose_target_data(&self, data: Handle) {
        unsafe { LLVMDisposeTargetData(data.raw() as _) }
    }

    fn create_di_builder(&self, module: Handle) -> Handle {
        unsafe { handle(LLVMCreateDIBuilder(module_ref(module))) }
    }

    fn dispose_di_builder(&self, builder: Handle) {
        unsafe { LLVMDisposeDIBuilder(di_builder_ref(builder)) }
    }

    fn di_create_compile_unit(
        &self,
        builder: Handle,
        file: &str,
        producer: &str,
        optimized: bool,
        runtime_version: u32,
    ) -> Handle {
        let builder = di_builder_ref(builder);
        unsafe {
            let file_ref = LLVMDIBuilderCreateFile(
                builder,
                file.as_ptr().cast::<c_char>(),
                file.len(),
                std::ptr::null(),
                0,
            );
            handle(LLVMDIBuilderCreateCompileUnit(
                builder,
                LLVMDWARFSourceLanguage::LLVMDWARFSourceLanguageC,
                file_ref,
                producer.as_ptr().cast::<c_char>(),
                producer.len(),
                i32::from(optimized),
                std::ptr::null(),
                0,
                runtime_version,
                std::ptr::null(),
                0,
                LLVMDWARFEmissionKind::LLVMDWARFEmissionKindFull,
                0,
                0,
                0,
                std::ptr::null(),
                0,
                std::ptr::null(),
                0,
            ))
        }
    }

    fn di_finalize(&self, builder: Handle) {
        unsafe { LLVMDIBuilderFinalize(di_builder_ref(builder)) }
    }
}
