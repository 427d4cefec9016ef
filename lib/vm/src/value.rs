//! Engine values and their primitive bit encodings.

use crate::function::FunctionDescriptor;
use crate::pointer::PointerValue;
use bcvm_types::{AccessError, AccessResult, GlobalIndex, PrimitiveKind, Type};
use std::fmt;

/// The values the memory core reads and writes.
///
/// This is a closed set: every consumer matches it exhaustively instead of
/// inspecting value classes at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A 1 bit integer.
    I1(bool),
    /// An 8 bit integer.
    I8(i8),
    /// A 16 bit integer.
    I16(i16),
    /// A 32 bit integer.
    I32(i32),
    /// A 64 bit integer.
    I64(i64),
    /// A single precision float.
    Float(f32),
    /// A double precision float.
    Double(f64),
    /// A native or managed pointer.
    Pointer(PointerValue),
    /// A function descriptor.
    Function(FunctionDescriptor),
    /// A reference to another global.
    Global(GlobalIndex),
    /// A primitive stored where a pointer is expected.
    Boxed(BoxedPrimitive),
}

/// The runtime category of a [`Value`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueKind {
    /// One of the primitive kinds.
    Primitive(PrimitiveKind),
    /// A raw native address.
    NativePointer,
    /// A pointer into an engine-managed or foreign object.
    ManagedReference,
    /// A function descriptor.
    Function,
    /// A reference to a global.
    Global,
    /// A boxed primitive.
    Boxed,
}

impl ValueKind {
    /// The element size used when a value of this kind addresses an array of
    /// unknown type: 1 for bytes and booleans, 2 for shorts, 4 for 32 bit
    /// integers and floats, 8 for everything else.
    pub fn element_size(self) -> u64 {
        match self {
            Self::Primitive(PrimitiveKind::I1 | PrimitiveKind::I8) => 1,
            Self::Primitive(PrimitiveKind::I16) => 2,
            Self::Primitive(PrimitiveKind::I32 | PrimitiveKind::Float) => 4,
            _ => 8,
        }
    }
}

impl From<PrimitiveKind> for ValueKind {
    fn from(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{kind}"),
            Self::NativePointer => f.write_str("native pointer"),
            Self::ManagedReference => f.write_str("managed reference"),
            Self::Function => f.write_str("function descriptor"),
            Self::Global => f.write_str("global reference"),
            Self::Boxed => f.write_str("boxed primitive"),
        }
    }
}

/// A primitive kept as raw bits together with its kind.
///
/// Foreign code can store plain numbers into pointer-typed globals; the
/// engine keeps them boxed so the original kind survives a later read.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoxedPrimitive {
    kind: PrimitiveKind,
    bits: u64,
}

impl BoxedPrimitive {
    /// Box a primitive value. Non-primitive values are rejected.
    pub fn new(value: &Value) -> AccessResult<Self> {
        match (value.primitive_kind(), value.to_bits()) {
            (Some(kind), Some(bits)) => Ok(Self { kind, bits }),
            _ => Err(AccessError::UnsupportedKind(format!(
                "cannot box a {}",
                value.kind()
            ))),
        }
    }

    /// The kind of the boxed value.
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// The raw bits of the boxed value.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// Unbox into a primitive value.
    pub fn unbox(&self) -> Value {
        // `new` only accepts supported kinds
        Value::from_bits(self.kind, self.bits).unwrap_or(Value::I64(self.bits as i64))
    }
}

impl Value {
    /// A null native pointer.
    pub fn null() -> Self {
        Self::Pointer(PointerValue::Native(0))
    }

    /// The zero value stored in fresh storage of type `ty`.
    pub fn zero(ty: &Type) -> Self {
        match ty.primitive() {
            Some(kind) => Self::from_bits(kind, 0).unwrap_or_else(|_| Self::null()),
            None => Self::null(),
        }
    }

    /// The runtime category of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::I1(_) => ValueKind::Primitive(PrimitiveKind::I1),
            Self::I8(_) => ValueKind::Primitive(PrimitiveKind::I8),
            Self::I16(_) => ValueKind::Primitive(PrimitiveKind::I16),
            Self::I32(_) => ValueKind::Primitive(PrimitiveKind::I32),
            Self::I64(_) => ValueKind::Primitive(PrimitiveKind::I64),
            Self::Float(_) => ValueKind::Primitive(PrimitiveKind::Float),
            Self::Double(_) => ValueKind::Primitive(PrimitiveKind::Double),
            Self::Pointer(PointerValue::Native(_)) => ValueKind::NativePointer,
            Self::Pointer(PointerValue::Managed(_)) => ValueKind::ManagedReference,
            Self::Function(_) => ValueKind::Function,
            Self::Global(_) => ValueKind::Global,
            Self::Boxed(_) => ValueKind::Boxed,
        }
    }

    /// The primitive kind, for primitive values.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.kind() {
            ValueKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    /// The raw little-endian bit pattern of a primitive value,
    /// zero-extended to 64 bits.
    pub fn to_bits(&self) -> Option<u64> {
        Some(match *self {
            Self::I1(b) => b as u64,
            Self::I8(i) => i as u8 as u64,
            Self::I16(i) => i as u16 as u64,
            Self::I32(i) => i as u32 as u64,
            Self::I64(i) => i as u64,
            Self::Float(f) => f.to_bits() as u64,
            Self::Double(f) => f.to_bits(),
            _ => return None,
        })
    }

    /// Build a primitive value of `kind` from its raw bits.
    ///
    /// Kinds outside the supported set fail with `UnsupportedPrimitiveKind`.
    pub fn from_bits(kind: PrimitiveKind, bits: u64) -> AccessResult<Self> {
        Ok(match kind {
            PrimitiveKind::I1 => Self::I1(bits & 1 != 0),
            PrimitiveKind::I8 => Self::I8(bits as u8 as i8),
            PrimitiveKind::I16 => Self::I16(bits as u16 as i16),
            PrimitiveKind::I32 => Self::I32(bits as u32 as i32),
            PrimitiveKind::I64 => Self::I64(bits as i64),
            PrimitiveKind::Float => Self::Float(f32::from_bits(bits as u32)),
            PrimitiveKind::Double => Self::Double(f64::from_bits(bits)),
            PrimitiveKind::I128 | PrimitiveKind::Half | PrimitiveKind::X86Fp80 => {
                return Err(AccessError::UnsupportedPrimitiveKind(kind))
            }
        })
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl From<$ty> for Value {
                fn from(val: $ty) -> Self {
                    Self::$variant(val)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => I1,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => Float,
    f64 => Double,
}

impl From<PointerValue> for Value {
    fn from(pointer: PointerValue) -> Self {
        Self::Pointer(pointer)
    }
}

impl From<FunctionDescriptor> for Value {
    fn from(function: FunctionDescriptor) -> Self {
        Self::Function(function)
    }
}

impl From<BoxedPrimitive> for Value {
    fn from(boxed: BoxedPrimitive) -> Self {
        Self::Boxed(boxed)
    }
}
