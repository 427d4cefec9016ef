use crate::interop::StructuredType;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

// Type Representations

// Primitive Types

/// The primitive kinds a bitcode value can have.
///
/// Only `I1` through `Double` are accessible through the memory core; the
/// remaining kinds exist so that modules using them can still be described
/// and rejected with a precise error.
#[derive(Copy, Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PrimitiveKind {
    /// A 1 bit integer, used for booleans.
    I1,
    /// An 8 bit integer.
    I8,
    /// A 16 bit integer.
    I16,
    /// A 32 bit integer.
    I32,
    /// A 64 bit integer.
    I64,
    /// A 128 bit integer.
    I128,
    /// IEEE half precision float.
    Half,
    /// IEEE single precision float.
    Float,
    /// IEEE double precision float.
    Double,
    /// x87 80 bit extended precision float.
    X86Fp80,
}

impl PrimitiveKind {
    /// All the kinds the memory core can load, store and bridge.
    pub const SUPPORTED: [Self; 7] = [
        Self::I1,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::Float,
        Self::Double,
    ];

    /// Returns true if this kind belongs to the closed supported set.
    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    /// Returns true for the floating point kinds.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::Half | Self::Float | Self::Double | Self::X86Fp80
        )
    }

    /// Width of the kind in bits.
    pub fn bit_width(self) -> u32 {
        match self {
            Self::I1 => 1,
            Self::I8 => 8,
            Self::I16 | Self::Half => 16,
            Self::I32 | Self::Float => 32,
            Self::I64 | Self::Double => 64,
            Self::X86Fp80 => 80,
            Self::I128 => 128,
        }
    }

    /// Storage size of the kind in bytes. An `I1` occupies a full byte.
    pub fn byte_size(self) -> u64 {
        match self {
            Self::I1 | Self::I8 => 1,
            Self::I16 | Self::Half => 2,
            Self::I32 | Self::Float => 4,
            Self::I64 | Self::Double => 8,
            Self::X86Fp80 => 10,
            Self::I128 => 16,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::I1 => "i1",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::Half => "half",
            Self::Float => "float",
            Self::Double => "double",
            Self::X86Fp80 => "x86_fp80",
        };
        f.write_str(name)
    }
}

/// The declared type of a piece of memory, e.g. the pointee type of a global.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// A primitive scalar.
    Primitive(PrimitiveKind),
    /// A pointer of any pointee type.
    Pointer,
    /// A pointer to a function.
    Function,
    /// A struct or array with a known member layout.
    Structured(Arc<StructuredType>),
}

impl Type {
    /// Size in bytes of a pointer.
    pub const POINTER_SIZE: u64 = 8;

    /// Returns the primitive kind, if this is a primitive type.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Returns the structured descriptor, if this is a structured type.
    pub fn structured(&self) -> Option<&Arc<StructuredType>> {
        match self {
            Self::Structured(ty) => Some(ty),
            _ => None,
        }
    }

    /// Returns true for pointer and function pointer types.
    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer | Self::Function)
    }

    /// Storage size of a value of this type in bytes.
    pub fn byte_size(&self) -> u64 {
        match self {
            Self::Primitive(kind) => kind.byte_size(),
            Self::Pointer | Self::Function => Self::POINTER_SIZE,
            Self::Structured(ty) => ty.size(),
        }
    }
}

impl From<PrimitiveKind> for Type {
    fn from(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{kind}"),
            Self::Pointer => f.write_str("ptr"),
            Self::Function => f.write_str("fn ptr"),
            Self::Structured(ty) => write!(f, "{ty}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_set_is_closed() {
        for kind in PrimitiveKind::SUPPORTED {
            assert!(kind.is_supported(), "{kind} should be supported");
        }
        assert!(!PrimitiveKind::I128.is_supported());
        assert!(!PrimitiveKind::Half.is_supported());
        assert!(!PrimitiveKind::X86Fp80.is_supported());
    }

    #[test]
    fn i1_occupies_a_byte() {
        assert_eq!(PrimitiveKind::I1.bit_width(), 1);
        assert_eq!(PrimitiveKind::I1.byte_size(), 1);
    }

    #[test]
    fn pointer_types_are_word_sized() {
        assert_eq!(Type::Pointer.byte_size(), 8);
        assert_eq!(Type::Function.byte_size(), 8);
        assert_eq!(Type::from(PrimitiveKind::I16).byte_size(), 2);
    }
}
