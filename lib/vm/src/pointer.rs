//! The dual pointer representation.
//!
//! A pointer either carries a raw native address or designates an object
//! the engine (or a foreign runtime) manages, plus a byte offset into it.
//! Managed pointers are turned into native addresses lazily, only when they
//! have to cross into native memory.

use crate::foreign::ForeignRef;
use crate::handles::HandleTable;
use crate::managed::ManagedObject;
use bcvm_types::{AccessError, AccessResult, ObjectId};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// The object a managed pointer designates.
#[derive(Clone)]
pub enum ManagedTarget {
    /// An engine-managed object.
    Object(Arc<ManagedObject>),
    /// An object of the foreign side.
    Foreign(ForeignRef),
}

impl ManagedTarget {
    /// Returns true if both targets are the same object.
    pub fn same_object(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Foreign(a), Self::Foreign(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for ManagedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(object) => object.fmt(f),
            Self::Foreign(object) => f.debug_tuple("Foreign").field(object).finish(),
        }
    }
}

/// A managed object plus a byte offset into it.
#[derive(Clone, Debug)]
pub struct ManagedPointer {
    target: ManagedTarget,
    offset: i64,
}

impl ManagedPointer {
    /// Point at `offset` bytes into `target`.
    pub fn new(target: ManagedTarget, offset: i64) -> Self {
        Self { target, offset }
    }

    /// The designated object.
    pub fn target(&self) -> &ManagedTarget {
        &self.target
    }

    /// The byte offset into the object.
    pub fn offset(&self) -> i64 {
        self.offset
    }
}

impl PartialEq for ManagedPointer {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.target.same_object(&other.target)
    }
}

/// An address, either native or managed.
///
/// Two pointers are equal when they have the same kind and the same address,
/// or the same object identity and offset. The content of the pointee is
/// never compared.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerValue {
    /// A raw address in the native address space.
    Native(u64),
    /// An engine-managed or foreign object.
    Managed(ManagedPointer),
}

impl PointerValue {
    /// The null pointer.
    pub const NULL: Self = Self::Native(0);

    /// A pointer to the start of an engine-managed object.
    pub fn to_object(object: Arc<ManagedObject>) -> Self {
        Self::Managed(ManagedPointer::new(ManagedTarget::Object(object), 0))
    }

    /// A pointer to the start of a foreign object.
    pub fn to_foreign(object: ForeignRef) -> Self {
        Self::Managed(ManagedPointer::new(ManagedTarget::Foreign(object), 0))
    }

    /// Returns true for the native null address.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Native(0))
    }

    /// Returns true for managed pointers.
    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed(_))
    }

    /// Move the pointer by `delta` bytes.
    pub fn offset_by(&self, delta: i64) -> Self {
        match self {
            Self::Native(address) => Self::Native(address.wrapping_add(delta as u64)),
            Self::Managed(pointer) => Self::Managed(ManagedPointer::new(
                pointer.target.clone(),
                pointer.offset.wrapping_add(delta),
            )),
        }
    }

    /// Force this pointer to a native address.
    ///
    /// Native pointers are returned as-is. Engine-managed objects are
    /// assigned a handle in `handles`; converting the same object again
    /// returns the same address until the handle is released. Foreign
    /// objects have no native representation.
    pub fn to_native(&self, handles: &HandleTable) -> AccessResult<u64> {
        match self {
            Self::Native(address) => Ok(*address),
            Self::Managed(pointer) => match &pointer.target {
                ManagedTarget::Object(object) => {
                    let offset = HandleTable::window_offset(pointer.offset)?;
                    Ok(handles.handle_for(object)? | offset)
                }
                ManagedTarget::Foreign(_) => Err(AccessError::UnsupportedKind(
                    "a foreign object cannot be converted to a native address".into(),
                )),
            },
        }
    }

    /// Turn a native address back into a pointer, recognizing live handles.
    pub fn from_native(address: u64, handles: &HandleTable) -> Self {
        if HandleTable::is_handle(address) {
            if let Ok((object, offset)) = handles.managed_from_handle(address) {
                return Self::Managed(ManagedPointer::new(ManagedTarget::Object(object), offset));
            }
        }
        Self::Native(address)
    }
}

#[derive(Debug)]
enum ToNativeState {
    Uninitialized,
    Specialized {
        object: ObjectId,
        base: u64,
        epoch: u64,
    },
    Generic,
}

/// A per call site cache of the last managed-to-native conversion.
///
/// The site remembers the handle of the first object it converts. Another
/// object sends it to the generic state, where every conversion goes through
/// the handle table. A released handle only refreshes the cached entry.
#[derive(Debug)]
pub struct ToNativeSite {
    state: RwLock<ToNativeState>,
}

impl Default for ToNativeSite {
    fn default() -> Self {
        Self::new()
    }
}

impl ToNativeSite {
    /// Create an uninitialized site.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ToNativeState::Uninitialized),
        }
    }

    /// Returns true once the site has given up caching.
    pub fn is_generic(&self) -> bool {
        matches!(*self.state.read(), ToNativeState::Generic)
    }

    /// Convert `pointer` to a native address.
    pub fn to_native(&self, pointer: &PointerValue, handles: &HandleTable) -> AccessResult<u64> {
        let (object, offset) = match pointer {
            PointerValue::Managed(ManagedPointer {
                target: ManagedTarget::Object(object),
                offset,
            }) => (object, HandleTable::window_offset(*offset)?),
            _ => return pointer.to_native(handles),
        };

        let epoch = handles.epoch();
        if let ToNativeState::Specialized {
            object: cached,
            base,
            epoch: cached_epoch,
        } = *self.state.read()
        {
            if cached == object.id() && cached_epoch == epoch {
                return Ok(base | offset);
            }
        }

        let base = handles.handle_for(object)?;
        let mut state = self.state.write();
        match *state {
            ToNativeState::Uninitialized => {
                *state = ToNativeState::Specialized {
                    object: object.id(),
                    base,
                    epoch,
                };
            }
            ToNativeState::Specialized { object: cached, .. } if cached == object.id() => {
                *state = ToNativeState::Specialized {
                    object: cached,
                    base,
                    epoch,
                };
            }
            ToNativeState::Specialized { .. } => *state = ToNativeState::Generic,
            ToNativeState::Generic => {}
        }
        Ok(base | offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::ForeignArray;
    use crate::value::Value;

    #[test]
    fn equality_is_by_identity() {
        let a = Arc::new(ManagedObject::new(Value::I32(1)));
        let b = Arc::new(ManagedObject::new(Value::I32(1)));
        assert_eq!(
            PointerValue::to_object(Arc::clone(&a)),
            PointerValue::to_object(Arc::clone(&a))
        );
        assert_ne!(PointerValue::to_object(Arc::clone(&a)), PointerValue::to_object(b));
        assert_ne!(
            PointerValue::to_object(Arc::clone(&a)),
            PointerValue::to_object(a).offset_by(4)
        );
        assert_eq!(PointerValue::Native(16), PointerValue::Native(8).offset_by(8));
    }

    #[test]
    fn foreign_targets_have_no_native_address() {
        let handles = HandleTable::new(1);
        let pointer = PointerValue::to_foreign(ForeignRef::new(ForeignArray::new(vec![])));
        assert!(matches!(
            pointer.to_native(&handles),
            Err(AccessError::UnsupportedKind(_))
        ));
    }

    #[test]
    fn from_native_recognizes_handles() {
        let handles = HandleTable::new(1);
        let object = Arc::new(ManagedObject::new(Value::I8(0)));
        let pointer = PointerValue::to_object(object).offset_by(3);
        let address = pointer.to_native(&handles).unwrap();
        assert_eq!(PointerValue::from_native(address, &handles), pointer);
        assert_eq!(
            PointerValue::from_native(0x1_0000, &handles),
            PointerValue::Native(0x1_0000)
        );
    }

    #[test]
    fn site_goes_generic_on_a_second_object() {
        let handles = HandleTable::new(4);
        let site = ToNativeSite::new();
        let a = PointerValue::to_object(Arc::new(ManagedObject::new(Value::I1(true))));
        let b = PointerValue::to_object(Arc::new(ManagedObject::new(Value::I1(false))));

        let first = site.to_native(&a, &handles).unwrap();
        assert_eq!(site.to_native(&a, &handles).unwrap(), first);
        assert!(!site.is_generic());

        let other = site.to_native(&b, &handles).unwrap();
        assert_ne!(other, first);
        assert!(site.is_generic());
        assert_eq!(site.to_native(&a, &handles).unwrap(), first);
    }

    #[test]
    fn site_refreshes_after_release() {
        let handles = HandleTable::new(4);
        let site = ToNativeSite::new();
        let pointer = PointerValue::to_object(Arc::new(ManagedObject::new(Value::I1(true))));

        let first = site.to_native(&pointer, &handles).unwrap();
        handles.release(first).unwrap();
        let second = site.to_native(&pointer, &handles).unwrap();
        assert_ne!(second, first);
        assert!(!site.is_generic());
        assert_eq!(handles.managed_from_handle(second).unwrap().1, 0);
    }

    #[test]
    fn offsets_before_the_object_have_no_native_address() {
        let handles = HandleTable::new(4);
        let site = ToNativeSite::new();
        let pointer = PointerValue::to_object(Arc::new(ManagedObject::new(Value::I64(0))));
        let before = pointer.offset_by(-8);

        for result in [before.to_native(&handles), site.to_native(&before, &handles)] {
            assert!(matches!(result, Err(AccessError::UnsupportedKind(_))));
        }
        assert!(handles.is_empty());

        // moving back inside the object converts again
        let address = site.to_native(&before.offset_by(8), &handles).unwrap();
        assert_eq!(PointerValue::from_native(address, &handles), pointer);
    }
}
