//! Engine-managed objects.

use crate::value::Value;
use bcvm_types::ObjectId;
use parking_lot::Mutex;
use std::fmt;

/// An engine-managed object backing a managed global.
///
/// The object holds exactly one value, stored verbatim: writing a managed
/// reference, a function descriptor or a boxed primitive keeps that exact
/// representation until the next write.
pub struct ManagedObject {
    id: ObjectId,
    // used to synchronize gets/sets
    value: Mutex<Value>,
}

impl ManagedObject {
    /// Allocate a new object holding `initial`.
    pub fn new(initial: Value) -> Self {
        Self {
            id: ObjectId::fresh(),
            value: Mutex::new(initial),
        }
    }

    /// The identity of this object.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Get the current value.
    pub fn get(&self) -> Value {
        self.value.lock().clone()
    }

    /// Replace the current value.
    pub fn set(&self, value: Value) {
        *self.value.lock() = value;
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the value may point back at this object, so only print the identity
        f.debug_tuple("ManagedObject").field(&self.id).finish()
    }
}
