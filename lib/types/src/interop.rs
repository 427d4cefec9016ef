//! Layout descriptors used to address foreign objects through byte offsets.
//!
//! A [`StructuredType`] describes how the bytes of a struct or array map onto
//! the members a foreign object exposes, so that a bitcode load at
//! `base + offset` can be turned into a read of one named member or element.

use crate::types::Type;
use smallvec::SmallVec;
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// How a member of a foreign object is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum MemberId {
    /// A member addressed by name.
    Name(String),
    /// An element addressed by index.
    Index(u64),
}

impl From<&str> for MemberId {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<u64> for MemberId {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "\"{name}\""),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// One `(offset, size, identifier)` entry of a member table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StructMember {
    /// Byte offset of the member from the start of the structure.
    pub offset: u64,
    /// Size of the member in bytes.
    pub size: u64,
    /// How the foreign object exposes this member.
    pub identifier: MemberId,
    /// Declared type of the member, when known.
    pub ty: Option<Type>,
}

impl StructMember {
    /// Create a member entry.
    pub fn new(offset: u64, size: u64, identifier: impl Into<MemberId>, ty: Option<Type>) -> Self {
        Self {
            offset,
            size,
            identifier: identifier.into(),
            ty,
        }
    }

    /// Returns true if `byte_offset` lies in `[offset, offset + size)`.
    pub fn contains(&self, byte_offset: u64) -> bool {
        byte_offset >= self.offset && byte_offset - self.offset < self.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
enum Layout {
    Struct(SmallVec<[StructMember; 8]>),
    Array {
        element_type: Type,
        element_size: u64,
        length: u64,
    },
}

/// A compound type descriptor with a known member layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StructuredType {
    name: String,
    size: u64,
    layout: Layout,
}

impl StructuredType {
    /// Create a struct descriptor. Members are kept ordered by offset.
    pub fn new_struct(name: impl Into<String>, members: impl IntoIterator<Item = StructMember>) -> Self {
        let mut members: SmallVec<[StructMember; 8]> = members.into_iter().collect();
        members.sort_by_key(|member| member.offset);
        let size = members
            .iter()
            .map(|member| member.offset + member.size)
            .max()
            .unwrap_or(0);
        Self {
            name: name.into(),
            size,
            layout: Layout::Struct(members),
        }
    }

    /// Create an array descriptor of `length` elements of `element_type`.
    pub fn new_array(element_type: Type, length: u64) -> Self {
        let element_size = element_type.byte_size();
        Self {
            name: format!("[{length} x {element_type}]"),
            size: element_size.saturating_mul(length),
            layout: Layout::Array {
                element_type,
                element_size,
                length,
            },
        }
    }

    /// The name of the type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns true if this describes an array.
    pub fn is_array(&self) -> bool {
        matches!(self.layout, Layout::Array { .. })
    }

    /// The ordered member table of a struct. Arrays have no materialized
    /// table and return an empty slice.
    pub fn members(&self) -> &[StructMember] {
        match &self.layout {
            Layout::Struct(members) => members,
            Layout::Array { .. } => &[],
        }
    }

    /// Find the member whose byte range contains `byte_offset`.
    ///
    /// For arrays the element is computed from the element size instead of a
    /// table scan.
    pub fn member_at(&self, byte_offset: u64) -> Option<StructMember> {
        match &self.layout {
            Layout::Struct(members) => members
                .iter()
                .find(|member| member.contains(byte_offset))
                .cloned(),
            Layout::Array {
                element_type,
                element_size,
                length,
            } => {
                if *element_size == 0 {
                    return None;
                }
                let index = byte_offset / element_size;
                if index >= *length {
                    return None;
                }
                Some(StructMember {
                    offset: index * element_size,
                    size: *element_size,
                    identifier: MemberId::Index(index),
                    ty: Some(element_type.clone()),
                })
            }
        }
    }
}

impl fmt::Display for StructuredType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}
