//! Native handles for managed objects.
//!
//! Native code can only hold raw addresses. When a managed object has to
//! cross into native code it is assigned a handle: an address in a reserved
//! region that no native allocation can ever occupy. The mapping is stable
//! until the handle is released, so converting the same object twice yields
//! the same address.

use crate::managed::ManagedObject;
use bcvm_types::{AccessError, AccessResult, MemoryError, ObjectId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tag bit marking an address as a handle.
const HANDLE_TAG: u64 = 1 << 63;
/// Each handle owns a 4 GiB window so pointer offsets can be encoded.
const SLOT_SHIFT: u32 = 32;
const OFFSET_MASK: u64 = (1 << SLOT_SHIFT) - 1;
/// Slots above this would spill into the tag bit.
const MAX_SLOTS: u64 = 1 << (63 - SLOT_SHIFT);

#[derive(Debug, Default)]
struct Inner {
    by_object: HashMap<ObjectId, u64>,
    objects: HashMap<u64, Arc<ManagedObject>>,
    next_slot: u64,
}

/// The managed-to-native handle mapping of one execution context.
#[derive(Debug)]
pub struct HandleTable {
    capacity: usize,
    inner: RwLock<Inner>,
    // bumped on every release so per-site caches can detect stale entries
    epoch: AtomicU64,
}

impl HandleTable {
    /// Create a table allowing `capacity` live handles.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner::default()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Returns true if `address` lies in the handle region.
    pub fn is_handle(address: u64) -> bool {
        address & HANDLE_TAG != 0
    }

    fn slot_address(slot: u64) -> u64 {
        HANDLE_TAG | (slot << SLOT_SHIFT)
    }

    /// The low address bits encoding `offset` bytes into a handle. The
    /// result is or-ed onto the base address of the handle.
    ///
    /// Offsets must stay inside the window of the handle, otherwise the
    /// address would decode as another object.
    pub fn window_offset(offset: i64) -> AccessResult<u64> {
        match u64::try_from(offset) {
            Ok(offset) if offset <= OFFSET_MASK => Ok(offset),
            _ => Err(AccessError::UnsupportedKind(format!(
                "offset {offset} lies outside the native handle window"
            ))),
        }
    }

    /// The base address of the handle for `object`, creating it on first use.
    pub fn handle_for(&self, object: &Arc<ManagedObject>) -> AccessResult<u64> {
        if let Some(slot) = self.inner.read().by_object.get(&object.id()) {
            return Ok(Self::slot_address(*slot));
        }

        let mut inner = self.inner.write();
        // another thread may have won the race between the two locks
        if let Some(slot) = inner.by_object.get(&object.id()) {
            return Ok(Self::slot_address(*slot));
        }
        if inner.objects.len() >= self.capacity {
            return Err(MemoryError::HandlesExhausted {
                capacity: self.capacity,
            }
            .into());
        }
        let slot = inner.next_slot;
        // released slots are not reused so stale addresses never alias
        if slot >= MAX_SLOTS {
            return Err(MemoryError::HandlesExhausted {
                capacity: self.capacity,
            }
            .into());
        }
        inner.next_slot += 1;
        inner.by_object.insert(object.id(), slot);
        inner.objects.insert(slot, Arc::clone(object));
        let address = Self::slot_address(slot);
        tracing::trace!(object = %object.id(), address, "created native handle");
        Ok(address)
    }

    /// Resolve a handle address back to its object and the offset into it.
    pub fn managed_from_handle(&self, address: u64) -> AccessResult<(Arc<ManagedObject>, i64)> {
        if !Self::is_handle(address) {
            return Err(AccessError::InvalidHandle(address));
        }
        let slot = (address & !HANDLE_TAG) >> SLOT_SHIFT;
        let offset = (address & OFFSET_MASK) as i64;
        self.inner
            .read()
            .objects
            .get(&slot)
            .map(|object| (Arc::clone(object), offset))
            .ok_or(AccessError::InvalidHandle(address))
    }

    /// Drop the handle containing `address`.
    ///
    /// A later conversion of the same object creates a fresh handle.
    pub fn release(&self, address: u64) -> AccessResult<()> {
        if !Self::is_handle(address) {
            return Err(AccessError::InvalidHandle(address));
        }
        let slot = (address & !HANDLE_TAG) >> SLOT_SHIFT;
        let mut inner = self.inner.write();
        let object = inner
            .objects
            .remove(&slot)
            .ok_or(AccessError::InvalidHandle(address))?;
        inner.by_object.remove(&object.id());
        self.epoch.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(object = %object.id(), "released native handle");
        Ok(())
    }

    /// Changes every time a handle is released.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    /// Returns true if no handle is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
