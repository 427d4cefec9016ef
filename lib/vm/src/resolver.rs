//! Turns byte offsets into foreign objects into member accesses.
//!
//! Interpreted code addresses a foreign object like native memory, with a
//! base pointer and a byte offset. The foreign side only understands member
//! names and element indices, so every access is first resolved into an
//! [`AccessLocation`].

use crate::foreign::{ForeignRef, ForeignValue};
use crate::value::ValueKind;
use bcvm_types::{AccessError, AccessResult, MemberId, StructuredType, Type};
use parking_lot::RwLock;

/// One resolved member of a foreign object.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessLocation {
    /// The object holding the member.
    pub base: ForeignRef,
    /// The member name or element index.
    pub identifier: MemberId,
    /// The declared type of the member, when known.
    pub element_type: Option<Type>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeState {
    Uninitialized,
    Specialized { kind: ValueKind, size: u64 },
    Generic,
}

/// Per call site cache of the element size inferred for objects of unknown
/// type.
///
/// The size is derived from the category of the accessed value, not from the
/// target object. A site remembers the first category it sees; a second
/// category turns it generic.
#[derive(Debug)]
pub struct ElementSizeSite {
    state: RwLock<SizeState>,
}

impl Default for ElementSizeSite {
    fn default() -> Self {
        Self {
            state: RwLock::new(SizeState::Uninitialized),
        }
    }
}

impl ElementSizeSite {
    /// The element size for an access of `kind`.
    pub fn element_size(&self, kind: ValueKind) -> u64 {
        match *self.state.read() {
            SizeState::Specialized { kind: cached, size } if cached == kind => return size,
            SizeState::Generic => return kind.element_size(),
            _ => {}
        }
        let size = kind.element_size();
        let mut state = self.state.write();
        *state = match *state {
            SizeState::Uninitialized => SizeState::Specialized { kind, size },
            SizeState::Specialized { kind: cached, .. } if cached == kind => *state,
            SizeState::Specialized { .. } | SizeState::Generic => SizeState::Generic,
        };
        size
    }

    /// Returns true once the site has seen more than one value category.
    pub fn is_generic(&self) -> bool {
        matches!(*self.state.read(), SizeState::Generic)
    }
}

/// Resolves `(type, object, offset)` triples for one call site.
#[derive(Debug, Default)]
pub struct AddressResolver {
    sizes: ElementSizeSite,
}

impl AddressResolver {
    /// Create a resolver with an empty element size cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The element size cache of this site.
    pub fn sizes(&self) -> &ElementSizeSite {
        &self.sizes
    }

    /// Resolve the member of `object` at `offset`.
    ///
    /// With a known `ty` the member whose byte range contains `offset` is
    /// selected; members of structured type are entered by reading them from
    /// the foreign side. Without a type, the object is treated as an array
    /// whose element size is inferred from `access`, the category of the
    /// value being read or written.
    pub fn resolve(
        &self,
        ty: Option<&StructuredType>,
        object: &ForeignRef,
        offset: u64,
        access: ValueKind,
    ) -> AccessResult<AccessLocation> {
        match ty {
            Some(ty) => Self::resolve_known(ty, object, offset),
            None => {
                let size = self.sizes.element_size(access);
                Ok(AccessLocation {
                    base: object.clone(),
                    identifier: MemberId::Index(offset / size),
                    element_type: None,
                })
            }
        }
    }

    fn resolve_known(
        ty: &StructuredType,
        object: &ForeignRef,
        offset: u64,
    ) -> AccessResult<AccessLocation> {
        let member = ty
            .member_at(offset)
            .ok_or_else(|| AccessError::OffsetOutOfRange {
                offset,
                type_name: ty.name().to_owned(),
            })?;

        if let Some(Type::Structured(inner)) = &member.ty {
            let nested = match object.read(&member.identifier)? {
                ForeignValue::Object(nested) => nested,
                other => {
                    return Err(AccessError::UnsupportedKind(format!(
                        "member {} of {ty} is not an object: {other:?}",
                        member.identifier
                    )))
                }
            };
            return Self::resolve_known(inner, &nested, offset - member.offset);
        }

        Ok(AccessLocation {
            base: object.clone(),
            identifier: member.identifier,
            element_type: member.ty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::{ForeignArray, ForeignRecord};
    use bcvm_types::{PrimitiveKind, StructMember};
    use std::sync::Arc;

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
    fn known_types_select_the_containing_member() {
        let resolver = AddressResolver::new();
        let object = ForeignRef::new(ForeignRecord::default());
        let ty = point();
        let location = resolver
            .resolve(Some(&ty), &object, 4, PrimitiveKind::I64.into())
            .unwrap();
        assert_eq!(location.identifier, MemberId::from("y"));
        assert_eq!(location.element_type, Some(PrimitiveKind::I64.into()));
        assert_eq!(
            resolver.resolve(Some(&ty), &object, 12, PrimitiveKind::I64.into()),
            Err(AccessError::OffsetOutOfRange {
                offset: 12,
                type_name: "point".into()
            })
        );
    }

    #[test]
    fn unknown_types_infer_the_element_size() {
        let resolver = AddressResolver::new();
        let object = ForeignRef::new(ForeignArray::new(vec![]));
        let location = resolver
            .resolve(None, &object, 12, PrimitiveKind::I32.into())
            .unwrap();
        assert_eq!(location.identifier, MemberId::Index(3));
        assert!(!resolver.sizes().is_generic());

        let location = resolver
            .resolve(None, &object, 12, PrimitiveKind::I16.into())
            .unwrap();
        assert_eq!(location.identifier, MemberId::Index(6));
        assert!(resolver.sizes().is_generic());
    }

    #[test]
    fn nested_structures_are_entered() {
        let inner = ForeignRef::new(ForeignRecord::new([
            ("x", ForeignValue::Int(1)),
            ("y", ForeignValue::Long(2)),
        ]));
        let outer = ForeignRef::new(ForeignRecord::new([
            ("tag", ForeignValue::Long(0)),
            ("origin", ForeignValue::Object(inner.clone())),
        ]));
        let ty = StructuredType::new_struct(
            "shape",
            [
                StructMember::new(0, 8, "tag", Some(PrimitiveKind::I64.into())),
                StructMember::new(8, 12, "origin", Some(Type::Structured(Arc::new(point())))),
            ],
        );

        let location = AddressResolver::new()
            .resolve(Some(&ty), &outer, 12, PrimitiveKind::I64.into())
            .unwrap();
        assert_eq!(location.base, inner);
        assert_eq!(location.identifier, MemberId::from("y"));
    }
}
