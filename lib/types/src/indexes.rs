//! Identifiers handed out by an execution context.
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

macro_rules! index_impl {
    ($name:ident, $prefix:expr) => {
        impl $name {
            /// Create a new index from its raw value.
            #[inline]
            pub const fn from_u32(index: u32) -> Self {
                Self(index)
            }

            /// Return the raw value of this index.
            #[inline]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            /// Return the raw value of this index as a `usize`.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

/// Index of a global variable inside its execution context.
///
/// Indices are interned: two globals compare equal exactly when they are the
/// same global of the same context.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct GlobalIndex(u32);
index_impl!(GlobalIndex, "global#");

/// Index of a function inside its execution context.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct FunctionIndex(u32);
index_impl!(FunctionIndex, "function#");

/// Identity of an engine-managed object.
///
/// Every managed object receives a fresh id on allocation, so ids are never
/// reused within a process.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ObjectId(NonZeroU64);

impl ObjectId {
    /// Allocate a fresh, process-unique object id.
    pub fn fresh() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    /// Return the raw value of this id.
    pub fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}
