//! The global variable store of an execution context.
//!
//! Globals are declared while a module is loaded, before the context is
//! shared between threads. After that the store is read-only: only the
//! values inside the slots change.

use crate::function::FunctionTable;
use crate::global::{GlobalSymbol, Storage};
use crate::handles::HandleTable;
use crate::managed::ManagedObject;
use crate::memory::NativeMemory;
use crate::pointer::PointerValue;
use crate::value::Value;
use bcvm_types::{
    AccessError, AccessResult, ContextId, GlobalIndex, PrimitiveKind, StorageBackend, Type,
};
use indexmap::IndexMap;
use std::sync::Arc;

/// Maps the globals of one execution context to their storage.
#[derive(Debug)]
pub struct GlobalVariableStore {
    context: ContextId,
    default_backend: StorageBackend,
    memory: Arc<dyn NativeMemory>,
    handles: Arc<HandleTable>,
    functions: Arc<FunctionTable>,
    // the position in the map is the `GlobalIndex`
    symbols: IndexMap<Arc<str>, Arc<GlobalSymbol>>,
}

impl GlobalVariableStore {
    /// Create an empty store whose native slots live in `memory`.
    pub fn new(
        context: ContextId,
        default_backend: StorageBackend,
        memory: Arc<dyn NativeMemory>,
        handles: Arc<HandleTable>,
        functions: Arc<FunctionTable>,
    ) -> Self {
        Self {
            context,
            default_backend,
            memory,
            handles,
            functions,
            symbols: IndexMap::new(),
        }
    }

    /// The context owning this store.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// The handle table used to expose managed slots to native code.
    pub fn handles(&self) -> &Arc<HandleTable> {
        &self.handles
    }

    /// Declare a global of pointee type `ty`.
    ///
    /// Storage is allocated here and never again: native slots are zeroed
    /// and sized from `ty`, managed slots start with the zero value of `ty`.
    /// Without an explicit `backend` the store default is used.
    pub fn declare(
        &mut self,
        name: &str,
        ty: Type,
        backend: Option<StorageBackend>,
    ) -> AccessResult<GlobalIndex> {
        if self.symbols.contains_key(name) {
            return Err(AccessError::DuplicateSymbol(name.to_owned()));
        }
        let index = GlobalIndex::from_u32(self.symbols.len() as u32);
        let storage = match backend.unwrap_or(self.default_backend) {
            StorageBackend::Native => {
                let size = ty.byte_size().max(Type::POINTER_SIZE);
                Storage::NativeSlot(self.memory.allocate(size, 8)?)
            }
            StorageBackend::Managed => {
                Storage::ManagedSlot(Arc::new(ManagedObject::new(Value::zero(&ty))))
            }
        };
        tracing::debug!(global = name, %index, %ty, storage = ?storage, "declared global");

        let name: Arc<str> = Arc::from(name);
        let symbol = GlobalSymbol::new(index, Arc::clone(&name), ty, storage);
        self.symbols.insert(name, Arc::new(symbol));
        Ok(index)
    }

    /// The declared global `index`.
    pub fn symbol(&self, index: GlobalIndex) -> AccessResult<&Arc<GlobalSymbol>> {
        self.symbols
            .get_index(index.index())
            .map(|(_, symbol)| symbol)
            .ok_or_else(|| AccessError::UnknownSymbol(index.to_string()))
    }

    /// The storage of global `index`.
    pub fn lookup(&self, index: GlobalIndex) -> AccessResult<&Storage> {
        self.symbol(index).map(|symbol| symbol.storage())
    }

    /// Find a global by name.
    pub fn lookup_by_name(&self, name: &str) -> Option<GlobalIndex> {
        self.symbols.get(name).map(|symbol| symbol.index())
    }

    /// Number of declared globals.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if no global is declared.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterate over the declared globals in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<GlobalSymbol>> {
        self.symbols.values()
    }

    /// Read the current value of global `index`.
    ///
    /// This is the generic path: the symbol is looked up and the access
    /// dispatched on its declared type on every call.
    pub fn read(&self, index: GlobalIndex) -> AccessResult<Value> {
        let symbol = self.symbol(index)?;
        self.read_symbol(symbol)
    }

    /// Write `value` into global `index`, dispatching on the runtime kind of
    /// the value.
    pub fn write(&self, index: GlobalIndex, value: Value) -> AccessResult<()> {
        let symbol = self.symbol(index)?;
        self.write_symbol(symbol, value)
    }

    /// A pointer to the storage of global `index`.
    pub fn pointer_to(&self, index: GlobalIndex) -> AccessResult<PointerValue> {
        Ok(match self.lookup(index)? {
            Storage::NativeSlot(address) => PointerValue::Native(*address),
            Storage::ManagedSlot(object) => PointerValue::to_object(Arc::clone(object)),
        })
    }

    /// The native address of global `index`. Managed slots are exposed
    /// through a handle.
    pub fn address_of(&self, index: GlobalIndex) -> AccessResult<u64> {
        self.pointer_to(index)?.to_native(&self.handles)
    }

    pub(crate) fn read_symbol(&self, symbol: &GlobalSymbol) -> AccessResult<Value> {
        if let Type::Structured(structured) = symbol.ty() {
            return Err(AccessError::UnsupportedKind(format!(
                "cannot load {structured} as a single value"
            )));
        }
        match symbol.storage() {
            Storage::NativeSlot(address) => self.load_native(*address, symbol.ty()),
            Storage::ManagedSlot(object) => Ok(object.get()),
        }
    }

    pub(crate) fn write_symbol(&self, symbol: &GlobalSymbol, value: Value) -> AccessResult<()> {
        if let Type::Structured(structured) = symbol.ty() {
            return Err(AccessError::UnsupportedKind(format!(
                "cannot store a single value into {structured}"
            )));
        }
        check_primitive(symbol, &value)?;
        match symbol.storage() {
            Storage::NativeSlot(address) => self.store_native(*address, symbol, value),
            Storage::ManagedSlot(object) => {
                object.set(value);
                Ok(())
            }
        }
    }

    /// Load a primitive of `kind` from native memory.
    pub(crate) fn load_primitive(&self, address: u64, kind: PrimitiveKind) -> AccessResult<Value> {
        if !kind.is_supported() {
            return Err(AccessError::UnsupportedPrimitiveKind(kind));
        }
        let bits = self.memory.load(address, kind.byte_size())?;
        Value::from_bits(kind, bits)
    }

    /// Load a pointer from native memory, recognizing managed handles.
    pub(crate) fn load_pointer(&self, address: u64) -> AccessResult<Value> {
        let bits = self.memory.load(address, Type::POINTER_SIZE)?;
        Ok(Value::Pointer(PointerValue::from_native(bits, &self.handles)))
    }

    /// Load a function pointer from native memory.
    pub(crate) fn load_function(&self, address: u64) -> AccessResult<Value> {
        let bits = self.memory.load(address, Type::POINTER_SIZE)?;
        Ok(match self.functions.lookup_by_address(bits) {
            Some(function) => Value::Function(function),
            None => Value::Pointer(PointerValue::from_native(bits, &self.handles)),
        })
    }

    fn load_native(&self, address: u64, ty: &Type) -> AccessResult<Value> {
        match ty {
            Type::Primitive(kind) => self.load_primitive(address, *kind),
            Type::Pointer => self.load_pointer(address),
            Type::Function => self.load_function(address),
            Type::Structured(structured) => Err(AccessError::UnsupportedKind(format!(
                "cannot load {structured} as a single value"
            ))),
        }
    }

    /// Store the native form of `value` into the slot of `symbol`.
    fn store_native(&self, address: u64, symbol: &GlobalSymbol, value: Value) -> AccessResult<()> {
        let (size, bits) = match value {
            Value::I1(_)
            | Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::Float(_)
            | Value::Double(_) => {
                let kind = value
                    .primitive_kind()
                    .ok_or_else(|| AccessError::UnsupportedKind(value.kind().to_string()))?;
                let bits = value
                    .to_bits()
                    .ok_or(AccessError::UnsupportedPrimitiveKind(kind))?;
                (kind.byte_size(), bits)
            }
            Value::Pointer(pointer) => (Type::POINTER_SIZE, pointer.to_native(&self.handles)?),
            Value::Function(function) => (Type::POINTER_SIZE, function.address()),
            Value::Global(global) => (Type::POINTER_SIZE, self.address_of(global)?),
            Value::Boxed(boxed) => {
                let size = match symbol.ty() {
                    Type::Primitive(kind) => kind.byte_size(),
                    _ => Type::POINTER_SIZE,
                };
                (size, boxed.bits())
            }
        };
        self.memory.store(address, size, bits)?;
        Ok(())
    }
}

/// Primitive values (boxed or not) may only be stored into globals of the
/// same primitive kind. Everything else is stored verbatim.
fn check_primitive(symbol: &GlobalSymbol, value: &Value) -> AccessResult<()> {
    let found = match value {
        Value::Boxed(boxed) if symbol.ty().primitive().is_some() => boxed.kind(),
        Value::Boxed(_) => return Ok(()),
        _ => match value.primitive_kind() {
            Some(kind) => kind,
            None => {
                return match symbol.ty() {
                    Type::Primitive(kind) if symbol.backend() == StorageBackend::Native => {
                        Err(AccessError::UnsupportedKind(format!(
                            "cannot store a {} into {} of type {kind}",
                            value.kind(),
                            symbol.index()
                        )))
                    }
                    _ => Ok(()),
                }
            }
        },
    };
    if symbol.ty().primitive() == Some(found) {
        Ok(())
    } else {
        Err(AccessError::KindMismatch {
            global: symbol.index(),
            expected: symbol.ty().clone(),
            found,
        })
    }
}
