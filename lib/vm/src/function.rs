//! Function descriptors and their lookup table.
//!
//! Call-target resolution itself lives elsewhere; this table only answers
//! "which function is this" by engine index, by name or by the native entry
//! address handed out when a descriptor escapes into native memory.

use bcvm_types::FunctionIndex;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A function as seen by the memory core.
///
/// Two descriptors are equal when they designate the same function index.
#[derive(Clone)]
pub struct FunctionDescriptor {
    index: FunctionIndex,
    name: Arc<str>,
    address: u64,
}

impl FunctionDescriptor {
    /// The engine index of the function.
    pub fn index(&self) -> FunctionIndex {
        self.index
    }

    /// The symbol name of the function, including its `@` sigil.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The native entry address stored when the descriptor is written to
    /// native memory.
    pub fn address(&self) -> u64 {
        self.address
    }
}

impl PartialEq for FunctionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for FunctionDescriptor {}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}

#[derive(Debug, Default)]
struct Inner {
    functions: Vec<FunctionDescriptor>,
    by_name: HashMap<Arc<str>, FunctionIndex>,
}

/// Registry of the functions of one execution context.
#[derive(Debug, Default)]
pub struct FunctionTable {
    // Functions are registered while modules load, possibly while other
    // threads already run code, so registration goes through a lock.
    inner: RwLock<Inner>,
}

impl FunctionTable {
    /// First native entry address handed out to functions.
    pub const ENTRY_BASE: u64 = 0x4000_0000_0000;
    /// Distance between consecutive entry addresses.
    const ENTRY_STRIDE: u64 = 16;

    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function and return its descriptor.
    ///
    /// Registering a name twice returns the existing descriptor.
    pub fn register(&self, name: &str) -> FunctionDescriptor {
        let name = Self::normalize(name);
        let mut inner = self.inner.write();
        if let Some(index) = inner.by_name.get(name.as_str()) {
            return inner.functions[index.index()].clone();
        }
        let index = FunctionIndex::from_u32(inner.functions.len() as u32);
        let name: Arc<str> = Arc::from(name);
        let descriptor = FunctionDescriptor {
            index,
            name: Arc::clone(&name),
            address: Self::ENTRY_BASE + u64::from(index.as_u32()) * Self::ENTRY_STRIDE,
        };
        inner.functions.push(descriptor.clone());
        inner.by_name.insert(name, index);
        tracing::debug!(function = %descriptor.name, %index, "registered function");
        descriptor
    }

    /// Look a function up by index.
    pub fn get(&self, index: FunctionIndex) -> Option<FunctionDescriptor> {
        self.inner.read().functions.get(index.index()).cloned()
    }

    /// Look a function up by name. The `@` sigil is optional.
    pub fn lookup(&self, name: &str) -> Option<FunctionDescriptor> {
        let name = Self::normalize(name);
        let inner = self.inner.read();
        inner
            .by_name
            .get(name.as_str())
            .map(|index| inner.functions[index.index()].clone())
    }

    /// Look a function up by its native entry address.
    pub fn lookup_by_address(&self, address: u64) -> Option<FunctionDescriptor> {
        let offset = address.checked_sub(Self::ENTRY_BASE)?;
        if offset % Self::ENTRY_STRIDE != 0 {
            return None;
        }
        let index = usize::try_from(offset / Self::ENTRY_STRIDE).ok()?;
        self.inner.read().functions.get(index).cloned()
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.inner.read().functions.len()
    }

    /// Returns true if no function is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn normalize(name: &str) -> String {
        if name.starts_with('@') {
            name.to_owned()
        } else {
            format!("@{name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let table = FunctionTable::new();
        let main = table.register("main");
        let again = table.register("@main");
        assert_eq!(main, again);
        assert_eq!(main.name(), "@main");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lookup_by_index_name_and_address() {
        let table = FunctionTable::new();
        let _first = table.register("first");
        let second = table.register("second");

        assert_eq!(table.get(second.index()), Some(second.clone()));
        assert_eq!(table.lookup("@second"), Some(second.clone()));
        assert_eq!(table.lookup_by_address(second.address()), Some(second.clone()));
        assert_eq!(table.lookup_by_address(second.address() + 1), None);
        assert_eq!(table.lookup_by_address(0x10), None);
        assert_eq!(table.lookup("third"), None);
    }
}
