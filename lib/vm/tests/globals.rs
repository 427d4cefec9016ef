use anyhow::Result;
use pretty_assertions::assert_eq;
use std::sync::Arc;

use bcvm_vm::*;

fn samples() -> Vec<(PrimitiveKind, Vec<Value>)> {
    vec![
        (PrimitiveKind::I1, vec![Value::I1(false), Value::I1(true)]),
        (
            PrimitiveKind::I8,
            vec![Value::I8(0), Value::I8(-1), Value::I8(i8::MIN), Value::I8(i8::MAX)],
        ),
        (
            PrimitiveKind::I16,
            vec![Value::I16(0), Value::I16(-300), Value::I16(i16::MIN), Value::I16(i16::MAX)],
        ),
        (
            PrimitiveKind::I32,
            vec![Value::I32(0), Value::I32(-70_000), Value::I32(i32::MIN), Value::I32(i32::MAX)],
        ),
        (
            PrimitiveKind::I64,
            vec![Value::I64(0), Value::I64(-1), Value::I64(i64::MIN), Value::I64(i64::MAX)],
        ),
        (
            PrimitiveKind::Float,
            vec![
                Value::Float(0.0),
                Value::Float(-1.5),
                Value::Float(f32::MIN),
                Value::Float(f32::MAX),
            ],
        ),
        (
            PrimitiveKind::Double,
            vec![
                Value::Double(0.0),
                Value::Double(-2.25),
                Value::Double(f64::MIN_POSITIVE),
                Value::Double(f64::MAX),
            ],
        ),
    ]
}

#[test]
fn primitive_round_trip_on_both_backends() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    for backend in [StorageBackend::Native, StorageBackend::Managed] {
        for (kind, values) in samples() {
            let global = context.globals_mut().declare(
                &format!("{backend:?}.{kind}"),
                kind.into(),
                Some(backend),
            )?;
            let site = context.new_site();
            for value in values {
                site.write(context.globals(), global, value.clone())?;
                assert_eq!(site.read(context.globals(), global)?, value);
                assert_eq!(context.globals().read(global)?, value);
            }
        }
    }
    Ok(())
}

#[test]
fn pointer_globals_keep_their_representation() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let managed = context
        .globals_mut()
        .declare("managed", Type::Pointer, Some(StorageBackend::Managed))?;
    let native = context
        .globals_mut()
        .declare("native", Type::Pointer, Some(StorageBackend::Native))?;
    let object = context.allocate_object(Value::I32(3));

    context.globals().write(managed, Value::Pointer(object.clone()))?;
    context.globals().write(native, Value::Pointer(object.clone()))?;
    assert_eq!(context.globals().read(managed)?, Value::Pointer(object.clone()));
    // the native slot holds a handle, which is recognized on the way back
    assert_eq!(context.globals().read(native)?, Value::Pointer(object.clone()));
    assert_eq!(context.handles().len(), 1);

    let raw = PointerValue::Native(0x1_0010);
    context.globals().write(native, Value::Pointer(raw.clone()))?;
    assert_eq!(context.globals().read(native)?, Value::Pointer(raw));
    Ok(())
}

#[test]
fn to_native_is_idempotent() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let global = context
        .globals_mut()
        .declare("g", PrimitiveKind::I64.into(), Some(StorageBackend::Managed))?;

    let first = context.globals().address_of(global)?;
    let second = context.globals().address_of(global)?;
    assert_eq!(first, second);
    assert_eq!(
        context.managed_from_handle(first)?,
        context.globals().pointer_to(global)?
    );

    let site = ToNativeSite::new();
    let pointer = context.globals().pointer_to(global)?;
    assert_eq!(site.to_native(&pointer, context.handles())?, first);
    assert_eq!(site.to_native(&pointer.offset_by(4), context.handles())?, first + 4);

    context.release_handle(first)?;
    assert!(context.managed_from_handle(first).is_err());
    let third = context.globals().address_of(global)?;
    assert_eq!(
        context.managed_from_handle(third)?,
        context.globals().pointer_to(global)?
    );
    Ok(())
}

#[test]
fn native_globals_are_zeroed_and_disjoint() -> Result<()> {
    let mut config = EngineConfig::new();
    config.default_backend(StorageBackend::Native);
    let mut context = ExecutionContext::new(&config);
    let a = context.globals_mut().declare("a", PrimitiveKind::I8.into(), None)?;
    let b = context.globals_mut().declare("b", PrimitiveKind::I64.into(), None)?;

    let (Storage::NativeSlot(a_address), Storage::NativeSlot(b_address)) =
        (context.globals().lookup(a)?.clone(), context.globals().lookup(b)?.clone())
    else {
        anyhow::bail!("expected native slots");
    };
    assert!(b_address >= a_address + 8);

    context.globals().write(a, Value::I8(-1))?;
    assert_eq!(context.globals().read(b)?, Value::I64(0));
    Ok(())
}

#[test]
fn exhausted_native_heap_fails_declaration() {
    let mut config = EngineConfig::new();
    config.native_heap_size(16);
    let mut context = ExecutionContext::new(&config);
    let globals = context.globals_mut();
    globals
        .declare("a", Type::Pointer, Some(StorageBackend::Native))
        .unwrap();
    globals
        .declare("b", Type::Pointer, Some(StorageBackend::Native))
        .unwrap();
    assert_eq!(
        globals.declare("c", Type::Pointer, Some(StorageBackend::Native)),
        Err(AccessError::Memory(MemoryError::Exhausted {
            requested: 8,
            available: 0
        }))
    );
}

#[test]
fn offset_pointers_cross_native_slots() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let native = context
        .globals_mut()
        .declare("cursor", Type::Pointer, Some(StorageBackend::Native))?;
    let a = context.allocate_object(Value::I64(1));
    let b = context.allocate_object(Value::I64(2));

    let inside = b.offset_by(8);
    context.globals().write(native, Value::Pointer(inside.clone()))?;
    assert_eq!(context.globals().read(native)?, Value::Pointer(inside));

    context.globals().write(native, Value::Pointer(a.clone()))?;
    for outside in [b.offset_by(-8), b.offset_by(1 << 32)] {
        assert!(matches!(
            context.globals().write(native, Value::Pointer(outside)),
            Err(AccessError::UnsupportedKind(_))
        ));
        // a rejected write leaves the slot untouched
        assert_eq!(context.globals().read(native)?, Value::Pointer(a.clone()));
    }
    Ok(())
}

#[test]
fn structured_globals_are_rejected_on_both_backends() -> Result<()> {
    let mut context = ExecutionContext::new(&EngineConfig::default());
    let ty = Type::Structured(Arc::new(StructuredType::new_array(
        PrimitiveKind::I32.into(),
        4,
    )));
    for backend in [StorageBackend::Native, StorageBackend::Managed] {
        let global = context
            .globals_mut()
            .declare(&format!("{backend:?}.array"), ty.clone(), Some(backend))?;
        let site = context.new_site();
        assert!(matches!(
            context.globals().read(global),
            Err(AccessError::UnsupportedKind(_))
        ));
        assert!(matches!(
            site.read(context.globals(), global),
            Err(AccessError::UnsupportedKind(_))
        ));
        for value in [Value::I32(1), Value::Pointer(PointerValue::NULL)] {
            assert!(matches!(
                context.globals().write(global, value.clone()),
                Err(AccessError::UnsupportedKind(_))
            ));
            assert!(matches!(
                site.write(context.globals(), global, value),
                Err(AccessError::UnsupportedKind(_))
            ));
        }
    }
    Ok(())
}
