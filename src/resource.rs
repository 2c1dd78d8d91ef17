//! Resource buffer - owned storage plus a resource heap that can grow
//!
//! Design: The heap reports exhaustion as `OutOfSpace` and changes nothing,
//! so recovery is a retry loop here:
//! 1. Attempt the operation on the current buffer
//! 2. On `OutOfSpace`, ask `HeapConfig` for a larger length
//! 3. Reallocate the buffer and let the heap absorb the new tail as free space
//!
//! Allocation handles and references stay valid across growth because they
//! are offsets from the buffer start.

use crate::atom::HEADER_LENGTH;
use crate::buffer::AlignedBuffer;
use crate::config::HeapConfig;
use crate::error::{HeapError, Result};
use crate::heap::{Allocation, AtomHeap, HeapStats};
use crate::layout::{aligned_size, TrivialLayout};
use crate::reference::VectorRef;
use crate::vector::{grown_capacity, Vector};

/// Owned, growable resource heap
#[derive(Clone)]
pub struct ResourceBuffer {
    buffer: AlignedBuffer,
    config: HeapConfig,
}

impl ResourceBuffer {
    /// Allocate `config.initial_length` bytes formatted as an empty resource heap
    pub fn new(config: HeapConfig) -> Result<Self> {
        config.check().map_err(HeapError::InvalidConfig)?;
        let mut buffer = AlignedBuffer::new(config.initial_length)?;
        AtomHeap::prepare_resource(buffer.as_bytes_mut())?;
        Ok(Self { buffer, config })
    }

    /// Resource heap whose root carries `root`
    pub fn with_root<T: TrivialLayout>(config: HeapConfig, root: &T) -> Result<Self> {
        config.check().map_err(HeapError::InvalidConfig)?;
        let mut buffer = AlignedBuffer::new(config.initial_length)?;
        AtomHeap::prepare_data(buffer.as_bytes_mut(), root)?;
        Ok(Self { buffer, config })
    }

    /// Adopt bytes holding a complete layout (always validated)
    pub fn from_bytes(bytes: &[u8], config: HeapConfig) -> Result<Self> {
        config.check().map_err(HeapError::InvalidConfig)?;
        let mut buffer = AlignedBuffer::from_bytes(bytes)?;
        AtomHeap::open(buffer.as_bytes_mut())?;
        Ok(Self { buffer, config })
    }

    #[inline]
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Heap view over the buffer
    pub fn heap(&mut self) -> Result<AtomHeap<'_>> {
        if self.config.validate_on_open {
            AtomHeap::open(self.buffer.as_bytes_mut())
        } else {
            Ok(AtomHeap::from_prepared(self.buffer.as_bytes_mut()))
        }
    }

    pub fn validate(&self) -> bool {
        crate::atom::validate_layout(self.buffer.as_bytes())
    }

    pub fn stats(&mut self) -> Result<HeapStats> {
        Ok(self.heap()?.stats())
    }

    // ===== Growing operations =====

    /// Reserve `contents_size` bytes, growing the buffer if needed
    pub fn reserve(&mut self, contents_size: u32) -> Result<Allocation> {
        loop {
            let attempt = self.heap()?.reserve(contents_size);
            match attempt {
                Err(error) if error.is_out_of_space() => self.grow_for(contents_size, error)?,
                result => return result,
            }
        }
    }

    /// Resize an allocation, growing the buffer if needed
    pub fn resize(&mut self, allocation: Allocation, contents_size: u32) -> Result<Allocation> {
        loop {
            let attempt = self.heap()?.resize(allocation, contents_size);
            match attempt {
                Err(error) if error.is_out_of_space() => self.grow_for(contents_size, error)?,
                result => return result,
            }
        }
    }

    pub fn free(&mut self, allocation: Allocation) -> Result<u32> {
        self.heap()?.free(allocation)
    }

    /// Ensure the vector stored at `reference_offset` holds `capacity` elements
    pub fn reserve_vector<T: TrivialLayout>(&mut self, reference_offset: u32, capacity: u32) -> Result<()> {
        loop {
            let attempt = self
                .heap()?
                .with_vector_at::<T, _, _>(reference_offset, |vector| vector.reserve(capacity));
            match attempt {
                Err(error) if error.is_out_of_space() => {
                    let size = capacity.saturating_mul(T::SIZE as u32);
                    self.grow_for(size, error)?
                }
                result => return result,
            }
        }
    }

    /// Append `value` to the vector stored at `reference_offset`
    pub fn push<T: TrivialLayout>(&mut self, reference_offset: u32, value: T) -> Result<()> {
        let (len, capacity) = self.vector_size::<T>(reference_offset)?;
        if len == capacity {
            self.reserve_vector::<T>(reference_offset, grown_capacity(len))?;
        }
        self.with_vector_at(reference_offset, |vector| vector.push(value))
    }

    /// Append `values` to the vector stored at `reference_offset`
    pub fn extend<T: TrivialLayout>(&mut self, reference_offset: u32, values: &[T]) -> Result<()> {
        let (len, _) = self.vector_size::<T>(reference_offset)?;
        let count = u32::try_from(values.len()).unwrap_or(u32::MAX);
        self.reserve_vector::<T>(reference_offset, len.saturating_add(count))?;
        self.with_vector_at(reference_offset, |vector| vector.extend_from_slice(values))
    }

    /// Run `edit` on the vector stored at `reference_offset` (no growth)
    pub fn with_vector_at<T, R, F>(&mut self, reference_offset: u32, edit: F) -> Result<R>
    where
        T: TrivialLayout,
        F: FnOnce(&mut Vector<'_, T>) -> Result<R>,
    {
        self.heap()?.with_vector_at(reference_offset, edit)
    }

    /// Elements of `reference` (held outside the buffer)
    pub fn vector_contents<T: TrivialLayout>(&self, reference: &VectorRef<T>) -> Result<Vec<T>> {
        let root = crate::atom::root_cursor(self.buffer.as_bytes())?;
        Ok(root.vector_contents(reference)?.to_vec())
    }

    /// Grow to exactly `new_length` bytes
    pub fn grow(&mut self, new_length: u32) -> Result<()> {
        let old_length = self.buffer.len();
        if new_length <= old_length {
            return Ok(());
        }
        self.buffer.grow(new_length)?;
        AtomHeap::extend(self.buffer.as_bytes_mut(), old_length)?;
        Ok(())
    }

    fn vector_size<T: TrivialLayout>(&mut self, reference_offset: u32) -> Result<(u32, u32)> {
        self.with_vector_at::<T, _, _>(reference_offset, |vector| Ok((vector.len(), vector.capacity())))
    }

    /// Grow for a request of `contents_size` bytes, or hand back `exhausted`
    fn grow_for(&mut self, contents_size: u32, exhausted: HeapError) -> Result<()> {
        let required = aligned_size(contents_size.max(1)).saturating_add(HEADER_LENGTH);
        let Some(new_length) = self.config.next_length(self.buffer.len(), required) else {
            return Err(exhausted);
        };
        self.grow(new_length)
    }
}

impl core::fmt::Debug for ResourceBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceBuffer")
            .field("len", &self.buffer.len())
            .field("config", &self.config)
            .finish()
    }
}
