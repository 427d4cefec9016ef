//! The errors that can occur while accessing engine memory.
use crate::indexes::GlobalIndex;
use crate::interop::MemberId;
use crate::types::{PrimitiveKind, Type};
use thiserror::Error;

/// A convenient alias for a `Result` that uses `AccessError` as the error type.
pub type AccessResult<T> = Result<T, AccessError>;

/// Error type describing a rejection by the foreign side of an interop
/// message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum InteropError {
    /// The foreign object does not support this message at all.
    #[error("unsupported message: {message}")]
    UnsupportedMessage {
        /// The message that was sent.
        message: String,
    },

    /// The foreign object has no member with this identifier.
    #[error("unknown identifier {identifier}: {reason}")]
    UnknownIdentifier {
        /// The identifier that was requested.
        identifier: MemberId,
        /// Why the identifier could not be found.
        reason: String,
    },

    /// The foreign object refused the value that was offered to it.
    #[error("unsupported type for {identifier}: {reason}")]
    UnsupportedType {
        /// The identifier that was written.
        identifier: MemberId,
        /// Why the value was refused.
        reason: String,
    },
}

/// Error type describing things that can go wrong when operating on the
/// native linear address space.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MemoryError {
    /// An access touched bytes outside the native heap.
    #[error("native access of {size} bytes at {address:#x} is out of bounds")]
    OutOfBounds {
        /// The address of the access.
        address: u64,
        /// The size of the access in bytes.
        size: u64,
    },

    /// The native heap has no room for an allocation.
    #[error("native heap exhausted: requested {requested} bytes, {available} available")]
    Exhausted {
        /// Bytes requested.
        requested: u64,
        /// Bytes still available.
        available: u64,
    },

    /// Every managed-to-native handle slot is in use.
    #[error("all {capacity} native handles are in use")]
    HandlesExhausted {
        /// The configured handle capacity.
        capacity: usize,
    },
}

/// The error taxonomy of the memory and interop core.
///
/// Deoptimizing a call site is never reported through this type: it is an
/// ordinary state transition of the site.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessError {
    /// A global that does not exist in this context was referenced.
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    /// A global with the same name was already declared.
    #[error("symbol {0} is already declared")]
    DuplicateSymbol(String),

    /// An interop access fell outside the bounds of a known structure.
    #[error("offset {offset} is out of range for {type_name}")]
    OffsetOutOfRange {
        /// The byte offset of the access.
        offset: u64,
        /// The structure that was accessed.
        type_name: String,
    },

    /// A value or type category outside the closed supported set.
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    /// A primitive kind without a foreign representation.
    #[error("unsupported primitive kind: {0}")]
    UnsupportedPrimitiveKind(PrimitiveKind),

    /// A primitive value was stored into a global of a different kind.
    #[error("attempted to store a {found} value into {global} of type {expected}")]
    KindMismatch {
        /// The global that was written.
        global: GlobalIndex,
        /// The declared pointee type of the global.
        expected: Type,
        /// The kind of the offered value.
        found: PrimitiveKind,
    },

    /// The foreign side rejected an access.
    #[error("interop access failed: {0}")]
    InteropBoundaryFault(#[from] InteropError),

    /// A native load or store failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// A native address that is not a live handle was used as one.
    #[error("{0:#x} is not a live managed handle")]
    InvalidHandle(u64),
}

impl AccessError {
    /// Returns true if the fault may be reported back to a foreign caller
    /// instead of aborting the current evaluation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OffsetOutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interop_errors_convert_into_boundary_faults() {
        let err: AccessError = InteropError::UnsupportedMessage {
            message: "WRITE".into(),
        }
        .into();
        assert!(matches!(err, AccessError::InteropBoundaryFault(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn out_of_range_is_recoverable() {
        let err = AccessError::OffsetOutOfRange {
            offset: 12,
            type_name: "point".into(),
        };
        assert!(err.is_recoverable());
    }

    #[test]
    fn unknown_symbol_is_fatal() {
        let err = AccessError::UnknownSymbol("@main".into());
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "unknown symbol @main");
    }
}
