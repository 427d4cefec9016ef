//! This are the common types and utility tools shared by the bcvm
//! execution engine crates.
//!
//! This crate provides the type descriptors consumed by the memory core
//! (`PrimitiveKind`, `Type`, `StructuredType`), the identifiers handed out by
//! an execution context, the engine configuration and the error taxonomy.

#![deny(missing_docs, unused_extern_crates)]
#![warn(unused_import_braces)]
#![cfg_attr(
    feature = "cargo-clippy",
    warn(
        clippy::float_arithmetic,
        clippy::mut_mut,
        clippy::nonminimal_bool,
        clippy::map_unwrap_or,
        clippy::print_stdout,
        clippy::unicode_not_nfc,
        clippy::use_self
    )
)]

mod config;
pub mod error;
mod indexes;
mod interop;
mod store_id;
mod types;

pub use crate::config::{EngineConfig, StorageBackend};
pub use crate::error::{AccessError, AccessResult, InteropError, MemoryError};
pub use crate::indexes::{FunctionIndex, GlobalIndex, ObjectId};
pub use crate::interop::{MemberId, StructMember, StructuredType};
pub use crate::store_id::ContextId;
pub use crate::types::{PrimitiveKind, Type};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
