#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Where the storage of a global lives.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "enable-serde", serde(rename_all = "lowercase"))]
pub enum StorageBackend {
    /// Raw bytes in the native linear address space.
    Native,
    /// An engine-managed object holding the value verbatim.
    Managed,
}

/// Controls how an execution context lays out and accesses memory.
///
/// One configuration is fixed per execution context; there is no process
/// wide default other than [`EngineConfig::new`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "enable-serde", serde(default))]
pub struct EngineConfig {
    /// Call sites speculate on the first observed global and type.
    pub inline_caching: bool,
    /// Backend used for globals declared without an explicit backend.
    pub default_backend: StorageBackend,
    /// Size of the native heap in bytes.
    pub native_heap_size: usize,
    /// Maximum number of live managed-to-native handles.
    pub handle_capacity: usize,
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self {
            inline_caching: true,
            default_backend: StorageBackend::Managed,
            native_heap_size: 1 << 20,
            handle_capacity: 4096,
        }
    }

    /// Configures whether call sites may specialize on observed types.
    ///
    /// When disabled every site starts in its generic state, which is
    /// behaviorally identical but never takes a fast path. Mostly useful to
    /// compare cached and uncached execution.
    ///
    /// This is `true` by default.
    pub fn inline_caching(&mut self, enable: bool) -> &mut Self {
        self.inline_caching = enable;
        self
    }

    /// Configures the backend of globals declared without one.
    ///
    /// This is [`StorageBackend::Managed`] by default.
    pub fn default_backend(&mut self, backend: StorageBackend) -> &mut Self {
        self.default_backend = backend;
        self
    }

    /// Configures the size of the native heap in bytes.
    ///
    /// This is 1 MiB by default.
    pub fn native_heap_size(&mut self, bytes: usize) -> &mut Self {
        self.native_heap_size = bytes;
        self
    }

    /// Configures how many managed objects may be exposed as native handles
    /// at the same time.
    ///
    /// This is 4096 by default.
    pub fn handle_capacity(&mut self, capacity: usize) -> &mut Self {
        self.handle_capacity = capacity;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
