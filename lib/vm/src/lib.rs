//! Runtime memory and interop support for bcvm.
//!
//! This crate owns the state an interpreted module touches when it accesses
//! memory: the global variable store with its native and managed backends,
//! the dual pointer representation, the per call site inline caches, and
//! the bridge through which foreign code reads and writes engine memory.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]
#![cfg_attr(feature = "cargo-clippy", allow(clippy::new_without_default))]
#![cfg_attr(
    feature = "cargo-clippy",
    warn(
        clippy::mut_mut,
        clippy::nonminimal_bool,
        clippy::map_unwrap_or,
        clippy::print_stdout,
        clippy::unicode_not_nfc,
        clippy::use_self
    )
)]

mod accessor;
mod bridge;
mod context;
mod foreign;
mod function;
mod global;
mod handles;
mod managed;
mod memory;
mod pointer;
mod resolver;
mod shared;
mod store;
mod value;

pub use crate::accessor::{AccessSite, CacheState, Guard};
pub use crate::bridge::{
    foreign_to_primitive, primitive_to_foreign, to_engine, to_foreign, ForeignValueBridge,
};
pub use crate::context::{ExecutionContext, ExportedSymbol};
pub use crate::foreign::{ForeignArray, ForeignObject, ForeignRecord, ForeignRef, ForeignValue};
pub use crate::function::{FunctionDescriptor, FunctionTable};
pub use crate::global::{GlobalSymbol, Storage};
pub use crate::handles::HandleTable;
pub use crate::managed::ManagedObject;
pub use crate::memory::{LinearHeap, NativeMemory};
pub use crate::pointer::{ManagedPointer, ManagedTarget, PointerValue, ToNativeSite};
pub use crate::resolver::{AccessLocation, AddressResolver, ElementSizeSite};
pub use crate::shared::SharedGlobal;
pub use crate::store::GlobalVariableStore;
pub use crate::value::{BoxedPrimitive, Value, ValueKind};

pub use bcvm_types::{
    AccessError, AccessResult, ContextId, EngineConfig, FunctionIndex, GlobalIndex, InteropError,
    MemberId, MemoryError, ObjectId, PrimitiveKind, StorageBackend, StructMember, StructuredType,
    Type,
};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
