//! Declared globals and the storage assigned to them.

use crate::managed::ManagedObject;
use bcvm_types::{GlobalIndex, StorageBackend, Type};
use std::fmt;
use std::sync::Arc;

/// Where the bytes of a global live.
///
/// Exactly one storage is assigned per global, when it is declared, and it
/// never changes afterwards.
#[derive(Clone)]
pub enum Storage {
    /// A zero-initialised slot in native memory.
    NativeSlot(u64),
    /// An engine-managed object holding the value verbatim.
    ManagedSlot(Arc<ManagedObject>),
}

impl Storage {
    /// The backend this storage belongs to.
    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::NativeSlot(_) => StorageBackend::Native,
            Self::ManagedSlot(_) => StorageBackend::Managed,
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NativeSlot(address) => f
                .debug_tuple("NativeSlot")
                .field(&format_args!("{address:#x}"))
                .finish(),
            Self::ManagedSlot(object) => f.debug_tuple("ManagedSlot").field(object).finish(),
        }
    }
}

impl PartialEq for Storage {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NativeSlot(a), Self::NativeSlot(b)) => a == b,
            (Self::ManagedSlot(a), Self::ManagedSlot(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A declared global variable.
#[derive(Debug)]
pub struct GlobalSymbol {
    index: GlobalIndex,
    name: Arc<str>,
    ty: Type,
    storage: Storage,
}

impl GlobalSymbol {
    pub(crate) fn new(index: GlobalIndex, name: Arc<str>, ty: Type, storage: Storage) -> Self {
        Self {
            index,
            name,
            ty,
            storage,
        }
    }

    /// The identity of the global inside its context.
    pub fn index(&self) -> GlobalIndex {
        self.index
    }

    /// The symbol name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared pointee type.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// The storage assigned to the global.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The backend of the storage.
    pub fn backend(&self) -> StorageBackend {
        self.storage.backend()
    }
}
