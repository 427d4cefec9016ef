//! The native memory primitive set: width-addressed loads and stores in the
//! host linear address space.

use bcvm_types::MemoryError;
use parking_lot::{Mutex, RwLock};
use std::fmt;

/// Width-addressed access to native memory.
///
/// Values travel as little-endian bit patterns zero-extended to 64 bits.
/// A single `load` or `store` is atomic with respect to other accesses of
/// the same memory; nothing larger is.
pub trait NativeMemory: fmt::Debug + Send + Sync {
    /// Load `size` bytes (1, 2, 4 or 8) from `address`.
    fn load(&self, address: u64, size: u64) -> Result<u64, MemoryError>;

    /// Store the low `size` bytes (1, 2, 4 or 8) of `bits` at `address`.
    fn store(&self, address: u64, size: u64, bits: u64) -> Result<(), MemoryError>;

    /// Reserve `size` zeroed bytes aligned to `align` and return their
    /// address. Allocations are never freed.
    fn allocate(&self, size: u64, align: u64) -> Result<u64, MemoryError>;

    /// Returns true if `address` lies inside this memory.
    fn contains(&self, address: u64) -> bool;
}

/// A native heap backed by one contiguous host allocation.
///
/// Address `0` is never part of the heap so a zeroed pointer is always null.
pub struct LinearHeap {
    base: u64,
    bytes: RwLock<Vec<u8>>,
    // offset of the next free byte
    top: Mutex<u64>,
}

impl LinearHeap {
    /// The address of the first byte of every heap.
    pub const BASE: u64 = 0x1_0000;

    /// Create a zeroed heap of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            base: Self::BASE,
            bytes: RwLock::new(vec![0; size]),
            top: Mutex::new(0),
        }
    }

    /// Size of the heap in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.read().len() as u64
    }

    /// Number of bytes handed out by [`NativeMemory::allocate`].
    pub fn used(&self) -> u64 {
        *self.top.lock()
    }

    fn range(&self, address: u64, size: u64, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let out_of_bounds = MemoryError::OutOfBounds { address, size };
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(out_of_bounds);
        }
        let start = address.checked_sub(self.base).ok_or_else(|| out_of_bounds.clone())?;
        let end = start.checked_add(size).ok_or_else(|| out_of_bounds.clone())?;
        if end > len as u64 {
            return Err(out_of_bounds);
        }
        Ok(start as usize..end as usize)
    }
}

impl fmt::Debug for LinearHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearHeap")
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &self.size())
            .field("used", &self.used())
            .finish()
    }
}

impl NativeMemory for LinearHeap {
    fn load(&self, address: u64, size: u64) -> Result<u64, MemoryError> {
        let bytes = self.bytes.read();
        let range = self.range(address, size, bytes.len())?;
        let mut buffer = [0u8; 8];
        buffer[..range.len()].copy_from_slice(&bytes[range]);
        Ok(u64::from_le_bytes(buffer))
    }

    fn store(&self, address: u64, size: u64, bits: u64) -> Result<(), MemoryError> {
        let mut bytes = self.bytes.write();
        let range = self.range(address, size, bytes.len())?;
        let len = range.len();
        bytes[range].copy_from_slice(&bits.to_le_bytes()[..len]);
        Ok(())
    }

    fn allocate(&self, size: u64, align: u64) -> Result<u64, MemoryError> {
        let capacity = self.size();
        let mut top = self.top.lock();
        // clears bits below alignment amount (assumes power of 2)
        debug_assert!(align.count_ones() == 1);
        let start = (*top + align - 1) & !(align - 1);
        let available = capacity.saturating_sub(start);
        if size > available {
            return Err(MemoryError::Exhausted {
                requested: size,
                available: capacity.saturating_sub(*top),
            });
        }
        *top = start + size;
        Ok(self.base + start)
    }

    fn contains(&self, address: u64) -> bool {
        address >= self.base && address - self.base < self.size()
    }
}
