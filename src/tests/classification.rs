//! Discriminant classification through the factory, and downcast behavior.

use pretty_assertions::assert_eq;

use super::setup;
use crate::kind::{MetadataKind, TypeKind, ValueKind};
use crate::{
    ArrayType, BindError, Branch, Cmp, Constant, ConstantInt, DICompileUnit, Function,
    GlobalAlias, Instruction, Metadata, MetadataRef, Opcode, Terminator, Type, TypeRef, Value,
    ValueClass, ValueRef,
};

#[test]
fn opcodes_map_to_their_wrapper_classes() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let handle = module.handle().unwrap();

    let br = engine.add_instruction(handle, Opcode::Br, &[]);
    let branch: Branch = ctx.resolve(br).unwrap().unwrap();
    assert_eq!(branch.class(), ValueClass::Branch);

    let icmp = engine.add_instruction(handle, Opcode::ICmp, &[]);
    let cmp: Cmp = ctx.resolve(icmp).unwrap().unwrap();
    assert_eq!(cmp.class(), ValueClass::Cmp);

    let ret = engine.add_instruction(handle, Opcode::Ret, &[]);
    let term: Terminator = ctx.resolve(ret).unwrap().unwrap();
    assert_eq!(term.class(), ValueClass::Terminator);
    assert_eq!(term.recast::<Instruction>().unwrap().opcode(), Opcode::Ret);
}

#[test]
fn branch_resolves_through_every_ancestor() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let br = engine.add_instruction(module.handle().unwrap(), Opcode::Br, &[]);

    let branch: Branch = ctx.resolve(br).unwrap().unwrap();
    let term: Terminator = ctx.resolve(br).unwrap().unwrap();
    let inst: Instruction = ctx.resolve(br).unwrap().unwrap();
    let value: Value = ctx.resolve(br).unwrap().unwrap();
    assert!(branch.ptr_eq(&term));
    assert!(term.ptr_eq(&inst));
    assert!(inst.ptr_eq(&value));
}

#[test]
fn downcast_rejection_does_not_populate_the_cache() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let ret = engine.add_instruction(module.handle().unwrap(), Opcode::Ret, &[]);

    let err = ctx.resolve::<Branch>(ret).unwrap_err();
    assert!(matches!(err, BindError::WrongKind { expected: "Branch", .. }));
    assert_eq!(ctx.cached_wrapper_count(), 0);

    // A correct request afterwards caches normally, and a repeated bad
    // request fails against the cached entry without disturbing it.
    let _inst: Instruction = ctx.resolve(ret).unwrap().unwrap();
    assert_eq!(ctx.cached_wrapper_count(), 1);
    assert!(ctx.resolve::<Branch>(ret).is_err());
    assert_eq!(ctx.cached_wrapper_count(), 1);
}

#[test]
fn unknown_value_kind_falls_back_to_the_root() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let odd = engine.add_value(module.handle().unwrap(), ValueKind::Other(424), "odd");

    let value: Value = ctx.resolve(odd).unwrap().unwrap();
    assert_eq!(value.class(), ValueClass::Value);
    assert!(ctx.resolve::<Constant>(odd).is_err());
}

#[test]
fn constant_fp_lands_on_the_constant_ancestor() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let fp = engine.add_value(module.handle().unwrap(), ValueKind::ConstantFP, "pi");

    let constant: Constant = ctx.resolve(fp).unwrap().unwrap();
    assert_eq!(constant.class(), ValueClass::Constant);
    assert!(ctx.resolve::<ConstantInt>(fp).is_err());
}

#[test]
fn recast_rechecks_the_live_discriminant() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let br = engine.add_instruction(module.handle().unwrap(), Opcode::Br, &[]);

    let value: Value = ctx.resolve(br).unwrap().unwrap();
    let branch = value.recast::<Branch>().unwrap();
    assert!(branch.ptr_eq(&value));
    let err = value.recast::<Cmp>().unwrap_err();
    assert!(matches!(err, BindError::WrongKind { expected: "Cmp", .. }));
}

#[test]
fn branch_conditionality_follows_operand_shape() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let handle = module.handle().unwrap();

    let plain = engine.add_instruction(handle, Opcode::Br, &[engine.add_global(handle, "target")]);
    let plain: Branch = ctx.resolve(plain).unwrap().unwrap();
    assert!(!plain.is_conditional().unwrap());
    assert!(plain.condition().unwrap().is_none());

    let cond_value = engine.add_value(handle, ValueKind::ConstantInt, "flag");
    let t = engine.add_global(handle, "t");
    let f = engine.add_global(handle, "f");
    let cond = engine.add_instruction(handle, Opcode::Br, &[cond_value, f, t]);
    let cond: Branch = ctx.resolve(cond).unwrap().unwrap();
    assert!(cond.is_conditional().unwrap());
    let got = cond.condition().unwrap().unwrap();
    assert!(got.ptr_eq(&ctx.resolve::<Value>(cond_value).unwrap().unwrap()));
}

#[test]
fn memory_access_classification() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let handle = module.handle().unwrap();

    let load = engine.add_instruction(handle, Opcode::Load, &[]);
    let load: Instruction = ctx.resolve(load).unwrap().unwrap();
    assert!(load.is_memory_access());

    let add = engine.add_instruction(handle, Opcode::Add, &[]);
    let add: Instruction = ctx.resolve(add).unwrap().unwrap();
    assert!(!add.is_memory_access());
}

#[test]
fn alias_exposes_its_aliasee() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let handle = module.handle().unwrap();

    let target = engine.add_global(handle, "real");
    let alias = engine.add_alias(handle, "nickname", target);
    let alias: GlobalAlias = ctx.resolve(alias).unwrap().unwrap();
    let aliasee = alias.aliasee().unwrap().unwrap();
    assert_eq!(aliasee.name().unwrap(), "real");
}

#[test]
fn array_types_get_their_own_wrapper() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let element = engine.add_type(ctx.handle(), TypeKind::Double);
    let array = engine.add_array_type(ctx.handle(), element, 16);

    let array: ArrayType = ctx.resolve_type(array).unwrap().unwrap();
    assert_eq!(array.len().unwrap(), 16);
    assert_eq!(array.element_type().unwrap().kind(), TypeKind::Double);

    let plain: Type = ctx.resolve_type(element).unwrap().unwrap();
    assert!(plain.recast::<ArrayType>().is_err());
    assert!(ctx.resolve_type::<ArrayType>(element).is_err());
}

#[test]
fn value_type_resolves_through_the_cache() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    let global = engine.add_global(module.handle().unwrap(), "g");

    let value: Value = ctx.resolve(global).unwrap().unwrap();
    let first = value.value_type().unwrap();
    let second = value.value_type().unwrap();
    assert!(first.ptr_eq(&second));
}

#[test]
fn metadata_classification() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let node = engine.add_metadata(ctx.handle(), MetadataKind::Node);
    let node: Metadata = ctx.resolve_metadata(node).unwrap().unwrap();
    assert!(node.recast::<DICompileUnit>().is_err());
    assert_eq!(node.kind(), MetadataKind::Node);
}

#[test]
fn function_lookup_is_typed() {
    let (engine, registry) = setup();
    let ctx = registry.create_context();
    let module = ctx.create_module("m").unwrap();
    engine.add_function(module.handle().unwrap(), "main");

    let main: Function = module.get_function("main").unwrap().unwrap();
    assert_eq!(main.name().unwrap(), "main");
    assert!(module.get_function("missing").unwrap().is_none());
    assert!(module.named_global("main").unwrap().is_none());
}
