//! The foreign-object message protocol.
//!
//! Objects that live outside the engine are only reachable through read and
//! write messages addressed by member name or element index. Values crossing
//! that boundary use the generic [`ForeignValue`] representation.

use crate::value::Value;
use bcvm_types::{InteropError, MemberId, PrimitiveKind};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// An object outside the engine, addressed by identifier or index.
pub trait ForeignObject: fmt::Debug + Send + Sync {
    /// Read the member or element `id`.
    fn read_member(&self, id: &MemberId) -> Result<ForeignValue, InteropError>;

    /// Write the member or element `id`.
    fn write_member(&self, id: &MemberId, value: ForeignValue) -> Result<(), InteropError>;
}

/// A shared reference to a foreign object.
///
/// Equality is identity: two references are equal when they point to the
/// same object.
#[derive(Clone)]
pub struct ForeignRef(Arc<dyn ForeignObject>);

impl ForeignRef {
    /// Wrap a foreign object.
    pub fn new(object: impl ForeignObject + 'static) -> Self {
        Self(Arc::new(object))
    }

    /// Wrap an already shared foreign object.
    pub fn from_arc(object: Arc<dyn ForeignObject>) -> Self {
        Self(object)
    }

    /// Send a read message.
    pub fn read(&self, id: &MemberId) -> Result<ForeignValue, InteropError> {
        self.0.read_member(id)
    }

    /// Send a write message.
    pub fn write(&self, id: &MemberId, value: ForeignValue) -> Result<(), InteropError> {
        self.0.write_member(id, value)
    }

    /// Returns true if both references point to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl PartialEq for ForeignRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ForeignRef {}

impl fmt::Debug for ForeignRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A dynamically typed value of the foreign side.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignValue {
    /// The foreign null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed byte.
    Byte(i8),
    /// A signed 16 bit integer.
    Short(i16),
    /// A UTF-16 code unit.
    Char(u16),
    /// A signed 32 bit integer.
    Int(i32),
    /// A signed 64 bit integer.
    Long(i64),
    /// A single precision float.
    Float(f32),
    /// A double precision float.
    Double(f64),
    /// A string.
    String(String),
    /// Another foreign object.
    Object(ForeignRef),
    /// An engine value passed through the foreign side untouched.
    Engine(Value),
}

impl ForeignValue {
    /// The primitive kind this value naturally maps to, if any.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Bool(_) => Some(PrimitiveKind::I1),
            Self::Byte(_) => Some(PrimitiveKind::I8),
            Self::Short(_) | Self::Char(_) => Some(PrimitiveKind::I16),
            Self::Int(_) => Some(PrimitiveKind::I32),
            Self::Long(_) => Some(PrimitiveKind::I64),
            Self::Float(_) => Some(PrimitiveKind::Float),
            Self::Double(_) => Some(PrimitiveKind::Double),
            Self::Null | Self::String(_) | Self::Object(_) | Self::Engine(_) => None,
        }
    }

    /// Returns true if this value is a foreign object.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

/// A foreign record with named members, in declaration order.
#[derive(Debug, Default)]
pub struct ForeignRecord {
    members: Mutex<IndexMap<String, ForeignValue>>,
}

impl ForeignRecord {
    /// Create a record from `(name, value)` pairs.
    pub fn new<K: Into<String>>(members: impl IntoIterator<Item = (K, ForeignValue)>) -> Self {
        Self {
            members: Mutex::new(
                members
                    .into_iter()
                    .map(|(name, value)| (name.into(), value))
                    .collect(),
            ),
        }
    }

    /// Get a copy of the member `name`.
    pub fn get(&self, name: &str) -> Option<ForeignValue> {
        self.members.lock().get(name).cloned()
    }
}

impl ForeignObject for ForeignRecord {
    fn read_member(&self, id: &MemberId) -> Result<ForeignValue, InteropError> {
        match id {
            MemberId::Name(name) => self.get(name).ok_or_else(|| InteropError::UnknownIdentifier {
                identifier: id.clone(),
                reason: "no such member".into(),
            }),
            MemberId::Index(_) => Err(InteropError::UnsupportedMessage {
                message: "READ by index on a record".into(),
            }),
        }
    }

    fn write_member(&self, id: &MemberId, value: ForeignValue) -> Result<(), InteropError> {
        match id {
            MemberId::Name(name) => {
                let mut members = self.members.lock();
                match members.get_mut(name) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(InteropError::UnknownIdentifier {
                        identifier: id.clone(),
                        reason: "records cannot grow new members".into(),
                    }),
                }
            }
            MemberId::Index(_) => Err(InteropError::UnsupportedMessage {
                message: "WRITE by index on a record".into(),
            }),
        }
    }
}

/// A fixed-length foreign array.
///
/// An array created with [`ForeignArray::typed`] rejects writes whose value
/// does not map to its element kind.
#[derive(Debug)]
pub struct ForeignArray {
    elements: Mutex<Vec<ForeignValue>>,
    element_kind: Option<PrimitiveKind>,
}

impl ForeignArray {
    /// Create an untyped array.
    pub fn new(elements: Vec<ForeignValue>) -> Self {
        Self {
            elements: Mutex::new(elements),
            element_kind: None,
        }
    }

    /// Create an array accepting only values of `kind`.
    pub fn typed(kind: PrimitiveKind, elements: Vec<ForeignValue>) -> Self {
        Self {
            elements: Mutex::new(elements),
            element_kind: Some(kind),
        }
    }

    /// Get a copy of the element at `index`.
    pub fn get(&self, index: usize) -> Option<ForeignValue> {
        self.elements.lock().get(index).cloned()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.lock().len()
    }

    /// Returns true if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(id: &MemberId) -> Result<usize, InteropError> {
        match id {
            MemberId::Index(index) => usize::try_from(*index).map_err(|_| InteropError::UnknownIdentifier {
                identifier: id.clone(),
                reason: "index does not fit the host".into(),
            }),
            MemberId::Name(_) => Err(InteropError::UnknownIdentifier {
                identifier: id.clone(),
                reason: "arrays only have indexed elements".into(),
            }),
        }
    }
}

impl ForeignObject for ForeignArray {
    fn read_member(&self, id: &MemberId) -> Result<ForeignValue, InteropError> {
        let index = Self::index(id)?;
        self.get(index).ok_or_else(|| InteropError::UnknownIdentifier {
            identifier: id.clone(),
            reason: "index out of bounds".into(),
        })
    }

    fn write_member(&self, id: &MemberId, value: ForeignValue) -> Result<(), InteropError> {
        let index = Self::index(id)?;
        if let Some(kind) = self.element_kind {
            if value.primitive_kind() != Some(kind) {
                return Err(InteropError::UnsupportedType {
                    identifier: id.clone(),
                    reason: format!("expected a {kind} element, got {value:?}"),
                });
            }
        }
        let mut elements = self.elements.lock();
        match elements.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(InteropError::UnknownIdentifier {
                identifier: id.clone(),
                reason: "index out of bounds".into(),
            }),
        }
    }
}
