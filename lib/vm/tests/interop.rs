use anyhow::Result;
use pretty_assertions::assert_eq;
use std::sync::Arc;

use bcvm_vm::*;

fn point() -> StructuredType {
    StructuredType::new_struct(
        "point",
        [
            StructMember::new(0, 4, "x", Some(PrimitiveKind::I32.into())),
            StructMember::new(4, 8, "y", Some(PrimitiveKind::I64.into())),
        ],
    )
}

#[test]
fn struct_offsets_map_to_members() -> Result<()> {
    let object = ForeignRef::new(ForeignRecord::new([
        ("x", ForeignValue::Int(1)),
        ("y", ForeignValue::Long(2)),
    ]));
    let ty = point();
    let bridge = ForeignValueBridge::new();

    assert_eq!(bridge.read_at(Some(&ty), &object, 0, PrimitiveKind::I32)?, Value::I32(1));
    assert_eq!(bridge.read_at(Some(&ty), &object, 4, PrimitiveKind::I64)?, Value::I64(2));

    bridge.write_at(Some(&ty), &object, 4, &Value::I64(-9))?;
    assert_eq!(object.read(&MemberId::from("y"))?, ForeignValue::Long(-9));

    let err = bridge
        .read_at(Some(&ty), &object, 12, PrimitiveKind::I64)
        .unwrap_err();
    assert_eq!(
        err,
        AccessError::OffsetOutOfRange {
            offset: 12,
            type_name: "point".into()
        }
    );
    assert!(err.is_recoverable());
    Ok(())
}

#[test]
fn unknown_layouts_use_the_access_width() -> Result<()> {
    let object = ForeignRef::new(ForeignArray::new(vec![ForeignValue::Int(0); 8]));
    let resolver = AddressResolver::new();
    let location = resolver.resolve(None, &object, 12, PrimitiveKind::I32.into())?;
    assert_eq!(location.identifier, MemberId::Index(3));
    assert_eq!(location.base, object);

    let bridge = ForeignValueBridge::new();
    bridge.write(&location, &Value::I32(33))?;
    assert_eq!(bridge.read(&location)?, Value::I32(33));
    Ok(())
}

#[test]
fn array_layouts_bound_check() -> Result<()> {
    let object = ForeignRef::new(ForeignArray::new(vec![ForeignValue::Short(5); 4]));
    let ty = StructuredType::new_array(PrimitiveKind::I16.into(), 4);
    let bridge = ForeignValueBridge::new();
    assert_eq!(bridge.read_at(Some(&ty), &object, 6, PrimitiveKind::I16)?, Value::I16(5));
    assert!(matches!(
        bridge.read_at(Some(&ty), &object, 8, PrimitiveKind::I16),
        Err(AccessError::OffsetOutOfRange { offset: 8, .. })
    ));
    Ok(())
}

#[test]
fn foreign_rejections_are_boundary_faults() {
    let object = ForeignRef::new(ForeignRecord::new([("x", ForeignValue::Int(1))]));
    let bridge = ForeignValueBridge::new();
    let location = AccessLocation {
        base: object,
        identifier: MemberId::from("missing"),
        element_type: None,
    };
    let err = bridge.write(&location, &Value::I32(1)).unwrap_err();
    assert!(matches!(
        err,
        AccessError::InteropBoundaryFault(InteropError::UnknownIdentifier { .. })
    ));
    assert!(!err.is_recoverable());
}

#[test]
fn shared_globals_only_have_index_zero() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let global = context
        .globals_mut()
        .declare("counter", PrimitiveKind::I32.into(), None)?;
    let context = Arc::new(context);
    let shared = context.export_global(global)?;

    shared.write_member(&MemberId::Index(0), ForeignValue::Int(12))?;
    assert_eq!(shared.read_member(&MemberId::Index(0))?, ForeignValue::Int(12));
    assert_eq!(context.globals().read(global)?, Value::I32(12));

    for id in [MemberId::Index(1), MemberId::from("value")] {
        assert!(matches!(
            shared.read_member(&id),
            Err(InteropError::UnknownIdentifier { .. })
        ));
        assert!(matches!(
            shared.write_member(&id, ForeignValue::Int(0)),
            Err(InteropError::UnknownIdentifier { .. })
        ));
    }
    Ok(())
}

#[test]
fn shared_primitive_globals_convert_to_the_declared_kind() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let global = context.globals_mut().declare(
        "wide",
        PrimitiveKind::I64.into(),
        Some(StorageBackend::Native),
    )?;
    let context = Arc::new(context);
    let shared = context.export_global(global)?;

    shared.write_member(&MemberId::Index(0), ForeignValue::Short(-4))?;
    assert_eq!(context.globals().read(global)?, Value::I64(-4));
    shared.write_member(&MemberId::Index(0), ForeignValue::Bool(true))?;
    assert_eq!(context.globals().read(global)?, Value::I64(1));
    assert!(matches!(
        shared.write_member(&MemberId::Index(0), ForeignValue::Null),
        Err(InteropError::UnsupportedType { .. })
    ));
    assert!(matches!(shared.site().state(), CacheState::Specialized(_)));
    Ok(())
}

#[test]
fn shared_pointer_globals_box_primitives() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let global = context.globals_mut().declare("slot", Type::Pointer, None)?;
    let context = Arc::new(context);
    let shared = context.export_global(global)?;

    shared.write_member(&MemberId::Index(0), ForeignValue::Double(2.5))?;
    assert_eq!(
        context.globals().read(global)?,
        Value::Boxed(BoxedPrimitive::new(&Value::Double(2.5))?)
    );
    assert_eq!(shared.read_member(&MemberId::Index(0))?, ForeignValue::Double(2.5));

    let object = ForeignRef::new(ForeignRecord::default());
    shared.write_member(&MemberId::Index(0), ForeignValue::Object(object.clone()))?;
    assert_eq!(
        context.globals().read(global)?,
        Value::Pointer(PointerValue::to_foreign(object.clone()))
    );
    assert_eq!(
        shared.read_member(&MemberId::Index(0))?,
        ForeignValue::Object(object)
    );

    shared.write_member(&MemberId::Index(0), ForeignValue::Null)?;
    assert_eq!(shared.read_member(&MemberId::Index(0))?, ForeignValue::Null);
    Ok(())
}

#[test]
fn structured_globals_cannot_be_shared_values() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let global = context.globals_mut().declare(
        "origin",
        Type::Structured(Arc::new(point())),
        None,
    )?;
    let context = Arc::new(context);
    let shared = context.export_global(global)?;
    assert!(matches!(
        shared.write_member(&MemberId::Index(0), ForeignValue::Int(1)),
        Err(InteropError::UnsupportedType { .. })
    ));
    Ok(())
}

#[test]
fn shared_globals_are_foreign_objects() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let global = context
        .globals_mut()
        .declare("flag", PrimitiveKind::I1.into(), None)?;
    let context = Arc::new(context);
    let shared = ForeignRef::new(context.export_global(global)?);

    // engine code addresses the exported global like any foreign array
    let bridge = ForeignValueBridge::new();
    bridge.write_at(None, &shared, 0, &Value::I1(true))?;
    assert_eq!(context.globals().read(global)?, Value::I1(true));
    assert!(matches!(
        bridge.write_at(None, &shared, 1, &Value::I1(false)),
        Err(AccessError::InteropBoundaryFault(InteropError::UnknownIdentifier { .. }))
    ));
    Ok(())
}

#[test]
fn shared_flags_are_true_for_any_non_zero_number() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let global = context.globals_mut().declare(
        "enabled",
        PrimitiveKind::I1.into(),
        Some(StorageBackend::Native),
    )?;
    let context = Arc::new(context);
    let shared = context.export_global(global)?;

    for value in [ForeignValue::Int(2), ForeignValue::Double(0.5), ForeignValue::Float(2.0)] {
        shared.write_member(&MemberId::Index(0), ForeignValue::Int(0))?;
        assert_eq!(context.globals().read(global)?, Value::I1(false));
        shared.write_member(&MemberId::Index(0), value)?;
        assert_eq!(context.globals().read(global)?, Value::I1(true));
    }
    Ok(())
}
