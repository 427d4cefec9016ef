//! Conversion between engine values and foreign values.

use crate::foreign::{ForeignRef, ForeignValue};
use crate::pointer::{ManagedTarget, PointerValue};
use crate::resolver::{AccessLocation, AddressResolver};
use crate::value::Value;
use bcvm_types::{AccessError, AccessResult, InteropError, PrimitiveKind, StructuredType};

/// Reads and writes resolved locations of foreign objects.
#[derive(Debug, Default)]
pub struct ForeignValueBridge {
    resolver: AddressResolver,
}

impl ForeignValueBridge {
    /// Create a bridge with its own resolver site.
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolver used by [`Self::read_at`] and [`Self::write_at`].
    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Read the member at `location`.
    ///
    /// With a declared primitive element type the foreign value is converted
    /// to that kind; otherwise it is normalized to its natural engine form.
    pub fn read(&self, location: &AccessLocation) -> AccessResult<Value> {
        let value = location
            .base
            .read(&location.identifier)
            .map_err(fault)?;
        match location.element_type.as_ref().and_then(|ty| ty.primitive()) {
            Some(kind) => foreign_to_primitive(kind, &value),
            None => to_engine(value),
        }
    }

    /// Write `value` to the member at `location`.
    pub fn write(&self, location: &AccessLocation, value: &Value) -> AccessResult<()> {
        let value = to_foreign(value)?;
        location
            .base
            .write(&location.identifier, value)
            .map_err(fault)
    }

    /// Resolve `offset` in `object` and read the value of kind `kind` there.
    pub fn read_at(
        &self,
        ty: Option<&StructuredType>,
        object: &ForeignRef,
        offset: u64,
        kind: PrimitiveKind,
    ) -> AccessResult<Value> {
        let location = self.resolver.resolve(ty, object, offset, kind.into())?;
        self.read(&location)
    }

    /// Resolve `offset` in `object` and write `value` there.
    pub fn write_at(
        &self,
        ty: Option<&StructuredType>,
        object: &ForeignRef,
        offset: u64,
        value: &Value,
    ) -> AccessResult<()> {
        let location = self.resolver.resolve(ty, object, offset, value.kind())?;
        self.write(&location, value)
    }
}

fn fault(err: InteropError) -> AccessError {
    tracing::debug!(%err, "foreign object rejected access");
    AccessError::InteropBoundaryFault(err)
}

/// Normalize a foreign value into its natural engine form.
///
/// Foreign strings have no engine representation.
pub fn to_engine(value: ForeignValue) -> AccessResult<Value> {
    Ok(match value {
        ForeignValue::Null => Value::null(),
        ForeignValue::Bool(b) => Value::I1(b),
        ForeignValue::Byte(i) => Value::I8(i),
        ForeignValue::Short(i) => Value::I16(i),
        ForeignValue::Char(c) => Value::I16(c as i16),
        ForeignValue::Int(i) => Value::I32(i),
        ForeignValue::Long(i) => Value::I64(i),
        ForeignValue::Float(f) => Value::Float(f),
        ForeignValue::Double(f) => Value::Double(f),
        ForeignValue::Object(object) => Value::Pointer(PointerValue::to_foreign(object)),
        ForeignValue::Engine(value) => value,
        ForeignValue::String(_) => {
            return Err(AccessError::UnsupportedKind("foreign string".into()))
        }
    })
}

/// Convert an engine value into the foreign value handed to foreign code.
///
/// Primitives use their natural foreign form, pointers to foreign objects
/// unwrap to the object and the null pointer becomes the foreign null.
/// Everything else crosses as an opaque engine value.
pub fn to_foreign(value: &Value) -> AccessResult<ForeignValue> {
    Ok(match value {
        Value::I1(_)
        | Value::I8(_)
        | Value::I16(_)
        | Value::I32(_)
        | Value::I64(_)
        | Value::Float(_)
        | Value::Double(_) => {
            let (kind, bits) = match (value.primitive_kind(), value.to_bits()) {
                (Some(kind), Some(bits)) => (kind, bits),
                _ => return Err(AccessError::UnsupportedKind(value.kind().to_string())),
            };
            primitive_to_foreign(kind, bits)?
        }
        Value::Pointer(pointer) if pointer.is_null() => ForeignValue::Null,
        Value::Pointer(PointerValue::Managed(pointer)) if pointer.offset() == 0 => {
            match pointer.target() {
                ManagedTarget::Foreign(object) => ForeignValue::Object(object.clone()),
                ManagedTarget::Object(_) => ForeignValue::Engine(value.clone()),
            }
        }
        Value::Pointer(_) | Value::Function(_) | Value::Global(_) => {
            ForeignValue::Engine(value.clone())
        }
        Value::Boxed(boxed) => primitive_to_foreign(boxed.kind(), boxed.bits())?,
    })
}

/// The foreign form of a primitive of `kind` with raw `bits`.
///
/// The table is exhaustive over booleans, 1, 2, 4 and 8 byte integers,
/// floats and doubles.
pub fn primitive_to_foreign(kind: PrimitiveKind, bits: u64) -> AccessResult<ForeignValue> {
    Ok(match kind {
        PrimitiveKind::I1 => ForeignValue::Bool(bits & 1 != 0),
        PrimitiveKind::I8 => ForeignValue::Byte(bits as u8 as i8),
        PrimitiveKind::I16 => ForeignValue::Short(bits as u16 as i16),
        PrimitiveKind::I32 => ForeignValue::Int(bits as u32 as i32),
        PrimitiveKind::I64 => ForeignValue::Long(bits as i64),
        PrimitiveKind::Float => ForeignValue::Float(f32::from_bits(bits as u32)),
        PrimitiveKind::Double => ForeignValue::Double(f64::from_bits(bits)),
        PrimitiveKind::I128 | PrimitiveKind::Half | PrimitiveKind::X86Fp80 => {
            return Err(AccessError::UnsupportedPrimitiveKind(kind))
        }
    })
}

/// Convert a foreign value to a primitive of `kind`.
///
/// Integers are truncated or sign-extended to the target width, booleans
/// become 0 or 1. Any non-zero number converts to a true `i1`. Floating point
/// targets accept any number; integer targets truncate floating point
/// sources toward zero.
pub fn foreign_to_primitive(kind: PrimitiveKind, value: &ForeignValue) -> AccessResult<Value> {
    enum Number {
        Int(i64),
        Float(f64),
    }

    let number = match value {
        ForeignValue::Bool(b) => Number::Int(*b as i64),
        ForeignValue::Byte(i) => Number::Int(i64::from(*i)),
        ForeignValue::Short(i) => Number::Int(i64::from(*i)),
        ForeignValue::Char(c) => Number::Int(i64::from(*c)),
        ForeignValue::Int(i) => Number::Int(i64::from(*i)),
        ForeignValue::Long(i) => Number::Int(*i),
        ForeignValue::Float(f) => Number::Float(f64::from(*f)),
        ForeignValue::Double(f) => Number::Float(*f),
        ForeignValue::Engine(engine) if engine.primitive_kind() == Some(kind) => {
            return Ok(engine.clone())
        }
        ForeignValue::Engine(Value::Boxed(boxed)) if boxed.kind() == kind => {
            return Ok(boxed.unbox())
        }
        ForeignValue::Null
        | ForeignValue::String(_)
        | ForeignValue::Object(_)
        | ForeignValue::Engine(_) => {
            return Err(AccessError::UnsupportedKind(format!(
                "cannot convert {value:?} to {kind}"
            )))
        }
    };

    Ok(match (kind, number) {
        (PrimitiveKind::I1, Number::Int(i)) => Value::I1(i != 0),
        (PrimitiveKind::I1, Number::Float(f)) => Value::I1(f != 0.0),
        (PrimitiveKind::Float, Number::Int(i)) => Value::Float(i as f32),
        (PrimitiveKind::Float, Number::Float(f)) => Value::Float(f as f32),
        (PrimitiveKind::Double, Number::Int(i)) => Value::Double(i as f64),
        (PrimitiveKind::Double, Number::Float(f)) => Value::Double(f),
        (kind, Number::Int(i)) => Value::from_bits(kind, i as u64)?,
        (kind, Number::Float(f)) => Value::from_bits(kind, f as i64 as u64)?,
    })
}
