//! The per execution context state of the memory core.
//!
//! There is no process wide engine: everything a global access needs is
//! reachable from the [`ExecutionContext`] it runs in, and contexts never
//! share memory, handles or globals.

use crate::accessor::AccessSite;
use crate::bridge::ForeignValueBridge;
use crate::function::{FunctionDescriptor, FunctionTable};
use crate::handles::HandleTable;
use crate::managed::ManagedObject;
use crate::memory::LinearHeap;
use crate::pointer::PointerValue;
use crate::shared::SharedGlobal;
use crate::store::GlobalVariableStore;
use bcvm_types::{AccessResult, ContextId, EngineConfig, GlobalIndex};
use std::sync::Arc;

/// A symbol exported by the loaded modules.
#[derive(Clone, Debug, PartialEq)]
pub enum ExportedSymbol {
    /// A function, found under its `@` name.
    Function(FunctionDescriptor),
    /// A global variable.
    Global(GlobalIndex),
}

/// The memory state of one execution context.
#[derive(Debug)]
pub struct ExecutionContext {
    id: ContextId,
    config: EngineConfig,
    memory: Arc<LinearHeap>,
    handles: Arc<HandleTable>,
    functions: Arc<FunctionTable>,
    globals: GlobalVariableStore,
}

impl ExecutionContext {
    /// Create an empty context configured by `config`.
    pub fn new(config: &EngineConfig) -> Self {
        let id = ContextId::default();
        let memory = Arc::new(LinearHeap::new(config.native_heap_size));
        let handles = Arc::new(HandleTable::new(config.handle_capacity));
        let functions = Arc::new(FunctionTable::new());
        let globals = GlobalVariableStore::new(
            id,
            config.default_backend,
            memory.clone(),
            Arc::clone(&handles),
            Arc::clone(&functions),
        );
        tracing::debug!(context = %id, ?config, "created execution context");
        Self {
            id,
            config: config.clone(),
            memory,
            handles,
            functions,
            globals,
        }
    }

    /// The identity of this context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The configuration this context was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The native heap.
    pub fn memory(&self) -> &Arc<LinearHeap> {
        &self.memory
    }

    /// The managed-to-native handle table.
    pub fn handles(&self) -> &Arc<HandleTable> {
        &self.handles
    }

    /// The function table.
    pub fn functions(&self) -> &Arc<FunctionTable> {
        &self.functions
    }

    /// The global variable store.
    pub fn globals(&self) -> &GlobalVariableStore {
        &self.globals
    }

    /// The global variable store, for declaring globals while the context
    /// is not shared yet.
    pub fn globals_mut(&mut self) -> &mut GlobalVariableStore {
        &mut self.globals
    }

    /// A fresh access site honoring the inline caching setting.
    pub fn new_site(&self) -> AccessSite {
        AccessSite::new(self.config.inline_caching)
    }

    /// A fresh foreign value bridge.
    pub fn new_bridge(&self) -> ForeignValueBridge {
        ForeignValueBridge::new()
    }

    /// Allocate an engine-managed object outside of any global.
    pub fn allocate_object(&self, initial: crate::value::Value) -> PointerValue {
        PointerValue::to_object(Arc::new(ManagedObject::new(initial)))
    }

    /// Force `pointer` to a native address.
    pub fn to_native(&self, pointer: &PointerValue) -> AccessResult<u64> {
        pointer.to_native(&self.handles)
    }

    /// The managed pointer a native handle stands for.
    pub fn managed_from_handle(&self, address: u64) -> AccessResult<PointerValue> {
        let (object, offset) = self.handles.managed_from_handle(address)?;
        Ok(PointerValue::to_object(object).offset_by(offset))
    }

    /// Release the native handle containing `address`.
    pub fn release_handle(&self, address: u64) -> AccessResult<()> {
        self.handles.release(address)
    }

    /// Find an exported symbol by name.
    ///
    /// Functions are looked up under their `@` prefixed name first, then
    /// globals under the plain name.
    pub fn find_exported_symbol(&self, name: &str) -> Option<ExportedSymbol> {
        let name = name.strip_prefix('@').unwrap_or(name);
        if let Some(function) = self.functions.lookup(&format!("@{name}")) {
            return Some(ExportedSymbol::Function(function));
        }
        self.globals.lookup_by_name(name).map(ExportedSymbol::Global)
    }

    /// Expose global `index` to foreign code.
    pub fn export_global(self: &Arc<Self>, index: GlobalIndex) -> AccessResult<SharedGlobal> {
        self.globals.symbol(index)?;
        Ok(SharedGlobal::new(Arc::clone(self), index))
    }
}
