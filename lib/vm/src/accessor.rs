//! Per call site inline caches for global accesses.
//!
//! Every load or store of a global in interpreted code owns an [`AccessSite`].
//! The first access records which global it touched and installs a direct
//! accessor bound to that global's storage and declared type. Later accesses
//! to the same global skip the symbol lookup and the type dispatch. As soon
//! as the site sees another global it falls back to the generic path for
//! good.
//!
//! Specializing is only an optimization: for any sequence of accesses a site
//! returns exactly what [`GlobalVariableStore::read`] and
//! [`GlobalVariableStore::write`] return.

use crate::global::{GlobalSymbol, Storage};
use crate::managed::ManagedObject;
use crate::store::GlobalVariableStore;
use crate::value::Value;
use bcvm_types::{AccessResult, ContextId, GlobalIndex, PrimitiveKind, StorageBackend, Type};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// The identity a specialized site is guarded on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Guard {
    /// The context of the global.
    pub context: ContextId,
    /// The global.
    pub global: GlobalIndex,
    /// The declared type observed on first use.
    pub ty: Type,
    /// The storage backend observed on first use.
    pub backend: StorageBackend,
}

impl Guard {
    fn of(store: &GlobalVariableStore, symbol: &GlobalSymbol) -> Self {
        Self {
            context: store.context(),
            global: symbol.index(),
            ty: symbol.ty().clone(),
            backend: symbol.backend(),
        }
    }

    // Type and backend are fixed at declaration, so the identity of the
    // global decides.
    fn holds(&self, context: ContextId, global: GlobalIndex) -> bool {
        self.context == context && self.global == global
    }
}

/// A read path bound to one storage and one declared type.
#[derive(Debug)]
enum DirectAccessor {
    NativePrimitive { address: u64, kind: PrimitiveKind },
    NativePointer { address: u64 },
    NativeFunction { address: u64 },
    Managed { object: Arc<ManagedObject> },
    // structured or otherwise unloadable slots still go through the store
    Symbol,
}

impl DirectAccessor {
    fn bind(symbol: &GlobalSymbol) -> Self {
        match (symbol.storage(), symbol.ty()) {
            (_, Type::Structured(_)) => Self::Symbol,
            (Storage::ManagedSlot(object), _) => Self::Managed {
                object: Arc::clone(object),
            },
            (Storage::NativeSlot(address), Type::Primitive(kind)) => Self::NativePrimitive {
                address: *address,
                kind: *kind,
            },
            (Storage::NativeSlot(address), Type::Pointer) => Self::NativePointer { address: *address },
            (Storage::NativeSlot(address), Type::Function) => {
                Self::NativeFunction { address: *address }
            }
        }
    }

    fn read(&self, store: &GlobalVariableStore, symbol: &GlobalSymbol) -> AccessResult<Value> {
        match self {
            Self::NativePrimitive { address, kind } => store.load_primitive(*address, *kind),
            Self::NativePointer { address } => store.load_pointer(*address),
            Self::NativeFunction { address } => store.load_function(*address),
            Self::Managed { object } => Ok(object.get()),
            Self::Symbol => store.read_symbol(symbol),
        }
    }
}

#[derive(Debug)]
struct Specialization {
    guard: Guard,
    symbol: Arc<GlobalSymbol>,
    accessor: DirectAccessor,
}

#[derive(Debug)]
enum SiteState {
    Uninitialized,
    Specialized(Arc<Specialization>),
    Generic,
}

/// A snapshot of the state of an [`AccessSite`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// The site has not been executed yet.
    Uninitialized,
    /// The site has a fast path for the guarded global.
    Specialized(Guard),
    /// The site always takes the generic path. This state is terminal.
    Generic,
}

/// The inline cache of one load or store of a global.
///
/// Sites are shared by all threads executing the same code. The state only
/// ever moves forward: `Uninitialized`, then `Specialized`, then `Generic`.
#[derive(Debug)]
pub struct AccessSite {
    state: RwLock<SiteState>,
    specializations: AtomicU32,
}

impl Default for AccessSite {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AccessSite {
    /// Create a site. Without inline caching the site starts generic.
    pub fn new(inline_caching: bool) -> Self {
        let state = if inline_caching {
            SiteState::Uninitialized
        } else {
            SiteState::Generic
        };
        Self {
            state: RwLock::new(state),
            specializations: AtomicU32::new(0),
        }
    }

    /// The current state of the site.
    pub fn state(&self) -> CacheState {
        match &*self.state.read() {
            SiteState::Uninitialized => CacheState::Uninitialized,
            SiteState::Specialized(specialization) => {
                CacheState::Specialized(specialization.guard.clone())
            }
            SiteState::Generic => CacheState::Generic,
        }
    }

    /// How many times a specialization was installed on this site. At most
    /// one, whatever the number of racing threads.
    pub fn specializations(&self) -> u32 {
        self.specializations.load(Ordering::Acquire)
    }

    /// Read global `index` of `store`.
    pub fn read(&self, store: &GlobalVariableStore, index: GlobalIndex) -> AccessResult<Value> {
        match self.specialization(store, index)? {
            Some(specialization) => specialization
                .accessor
                .read(store, &specialization.symbol),
            None => store.read(index),
        }
    }

    /// Write `value` into global `index` of `store`.
    pub fn write(
        &self,
        store: &GlobalVariableStore,
        index: GlobalIndex,
        value: Value,
    ) -> AccessResult<()> {
        match self.specialization(store, index)? {
            Some(specialization) => store.write_symbol(&specialization.symbol, value),
            None => store.write(index, value),
        }
    }

    /// The fast path for `index`, if this site has or can install one.
    fn specialization(
        &self,
        store: &GlobalVariableStore,
        index: GlobalIndex,
    ) -> AccessResult<Option<Arc<Specialization>>> {
        match &*self.state.read() {
            SiteState::Specialized(specialization)
                if specialization.guard.holds(store.context(), index) =>
            {
                return Ok(Some(Arc::clone(specialization)));
            }
            SiteState::Generic => return Ok(None),
            SiteState::Specialized(_) | SiteState::Uninitialized => {}
        }

        let symbol = store.symbol(index)?;
        let mut state = self.state.write();
        // the state may have moved while the lock was released
        match &*state {
            SiteState::Uninitialized => {
                let specialization = Arc::new(Specialization {
                    guard: Guard::of(store, symbol),
                    symbol: Arc::clone(symbol),
                    accessor: DirectAccessor::bind(symbol),
                });
                tracing::debug!(guard = ?specialization.guard, "specialized access site");
                *state = SiteState::Specialized(Arc::clone(&specialization));
                self.specializations.fetch_add(1, Ordering::AcqRel);
                Ok(Some(specialization))
            }
            SiteState::Specialized(specialization)
                if specialization.guard.holds(store.context(), index) =>
            {
                Ok(Some(Arc::clone(specialization)))
            }
            SiteState::Specialized(specialization) => {
                tracing::debug!(
                    cached = %specialization.guard.global,
                    observed = %index,
                    "access site went generic"
                );
                *state = SiteState::Generic;
                Ok(None)
            }
            SiteState::Generic => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionTable;
    use crate::handles::HandleTable;
    use crate::memory::LinearHeap;

    fn store() -> GlobalVariableStore {
        GlobalVariableStore::new(
            ContextId::default(),
            StorageBackend::Native,
            Arc::new(LinearHeap::new(256)),
            Arc::new(HandleTable::new(4)),
            Arc::new(FunctionTable::new()),
        )
    }

    #[test]
    fn first_use_specializes() {
        let mut store = store();
        let global = store.declare("g", PrimitiveKind::I64.into(), None).unwrap();
        let site = AccessSite::new(true);
        assert_eq!(site.state(), CacheState::Uninitialized);

        site.write(&store, global, Value::I64(-1)).unwrap();
        assert_eq!(site.read(&store, global).unwrap(), Value::I64(-1));
        match site.state() {
            CacheState::Specialized(guard) => {
                assert_eq!(guard.global, global);
                assert_eq!(guard.backend, StorageBackend::Native);
                assert_eq!(guard.ty, PrimitiveKind::I64.into());
            }
            state => panic!("unexpected state {state:?}"),
        }
        assert_eq!(site.specializations(), 1);
    }

    #[test]
    fn guard_failure_is_terminal() {
        let mut store = store();
        let a = store.declare("a", PrimitiveKind::I32.into(), None).unwrap();
        let b = store.declare("b", PrimitiveKind::I32.into(), None).unwrap();
        let site = AccessSite::new(true);

        site.read(&store, a).unwrap();
        site.read(&store, b).unwrap();
        assert_eq!(site.state(), CacheState::Generic);
        site.read(&store, a).unwrap();
        assert_eq!(site.state(), CacheState::Generic);
        assert_eq!(site.specializations(), 1);
    }

    #[test]
    fn disabled_caching_starts_generic() {
        let mut store = store();
        let global = store.declare("g", PrimitiveKind::I8.into(), None).unwrap();
        let site = AccessSite::new(false);
        site.write(&store, global, Value::I8(5)).unwrap();
        assert_eq!(site.read(&store, global).unwrap(), Value::I8(5));
        assert_eq!(site.state(), CacheState::Generic);
        assert_eq!(site.specializations(), 0);
    }

    #[test]
    fn failed_lookups_leave_the_site_untouched() {
        let store = store();
        let site = AccessSite::new(true);
        assert!(site.read(&store, GlobalIndex::from_u32(9)).is_err());
        assert_eq!(site.state(), CacheState::Uninitialized);
    }
}
