//! Guest linear memory collaborator.
//!
//! The decoder only ever touches guest memory through [`GuestMemory`]:
//! a bounds-checked read primitive, a bounds-checked write primitive for
//! lowering results into caller-provided regions, and the guest-exported
//! allocator seam. Bounds are checked against the memory's current size
//! on every access; nothing is cached across calls, so a memory that
//! grew between calls is seen at its new size.

use super::buffer::align_to;
use super::error::DecodeError;

/// Externally-owned guest linear memory, as seen by the boundary layer.
pub trait GuestMemory {
    /// Current size of the memory in bytes.
    fn size(&self) -> usize;

    /// Read `len` bytes starting at `addr`. The only read primitive the
    /// decoder uses; fails with [`DecodeError::MemoryOutOfBounds`] when
    /// the range exceeds the current size.
    fn read_bytes(&self, addr: u32, len: u32) -> Result<&[u8], DecodeError>;

    /// Write bytes starting at `addr` into an already-allocated region.
    fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), DecodeError>;

    /// Allocate `size` bytes at the given alignment and return the base
    /// address. Allocation is the guest's responsibility (its exported
    /// allocator); the boundary layer never invents memory itself.
    fn alloc(&mut self, size: u32, align: u32) -> Result<u32, DecodeError>;
}

/// Owned linear memory with a bump allocator.
///
/// Stands in for a guest instance's memory in tests and embeddings that
/// marshal values without a live instance. The [`write`](Self::write)
/// harness method grows on demand so fixtures can place values at
/// arbitrary (including deliberately misaligned) offsets; the
/// [`GuestMemory`] implementation is strictly bounds-checked.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct LinearMemory {
    data: Vec<u8>,
}

impl LinearMemory {
    /// Create a new empty linear memory.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create a linear memory from existing bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Create a zero-filled linear memory of the given size.
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Write bytes at a specific offset, growing the memory as needed.
    /// Harness helper for laying out fixture data.
    pub fn write(&mut self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        // The range exists after the resize above.
        if let Some(slice) = self.data.get_mut(start..end) {
            slice.copy_from_slice(bytes);
        }
    }

    /// Get the raw bytes of the linear memory.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the linear memory and return the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Check if the memory is empty (no allocations made).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the length of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl GuestMemory for LinearMemory {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn read_bytes(&self, addr: u32, len: u32) -> Result<&[u8], DecodeError> {
        let start = addr as usize;
        let end = start
            .checked_add(len as usize)
            .ok_or(DecodeError::MemoryOutOfBounds {
                addr,
                len,
                memory_size: self.data.len(),
            })?;
        self.data
            .get(start..end)
            .ok_or(DecodeError::MemoryOutOfBounds {
                addr,
                len,
                memory_size: self.data.len(),
            })
    }

    fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), DecodeError> {
        let start = addr as usize;
        let end = start + bytes.len();
        let memory_size = self.data.len();
        self.data
            .get_mut(start..end)
            .ok_or(DecodeError::MemoryOutOfBounds {
                addr,
                len: bytes.len() as u32,
                memory_size,
            })?
            .copy_from_slice(bytes);
        Ok(())
    }

    fn alloc(&mut self, size: u32, align: u32) -> Result<u32, DecodeError> {
        let aligned = align_to(self.data.len() as u32, align.max(1));
        if aligned as usize > self.data.len() {
            self.data.resize(aligned as usize, 0);
        }
        let ptr = self.data.len() as u32;
        self.data.resize(self.data.len() + size as usize, 0);
        Ok(ptr)
    }
}

// Conversion traits for ergonomic API

impl From<Vec<u8>> for LinearMemory {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&[u8]> for LinearMemory {
    fn from(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }
}

impl From<LinearMemory> for Vec<u8> {
    fn from(memory: LinearMemory) -> Self {
        memory.data
    }
}

impl AsRef<[u8]> for LinearMemory {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
