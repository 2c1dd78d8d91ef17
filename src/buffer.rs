//! Aligned buffer - owned storage for heaps and formatted blobs
//!
//! Design: One zero-filled block from the global allocator with 16-byte
//! alignment, standing in for a device-visible region. Growth reallocates and
//! zero-fills the new tail; contents are addressed only by offset, so moving
//! the base is harmless.

use crate::error::{HeapError, LayoutViolation, Result};
use crate::layout::{is_aligned, ALIGNMENT};
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, realloc, Layout};
use std::ptr::NonNull;

/// Owned, 16-byte aligned, zero-initialized byte storage
pub struct AlignedBuffer {
    start: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the buffer uniquely owns its allocation.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate `length` zeroed bytes (`length` must be a non-zero multiple of 16)
    pub fn new(length: u32) -> Result<Self> {
        let layout = Self::layout_for(length)?;

        // SAFETY: layout has non-zero size.
        let start = unsafe { alloc_zeroed(layout) };
        let start = NonNull::new(start).ok_or(HeapError::OutOfSpace {
            requested: length,
            largest_free: 0,
        })?;

        Ok(Self { start, layout })
    }

    /// Copy existing bytes into a fresh aligned buffer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let length = u32::try_from(bytes.len())
            .map_err(|_| HeapError::LayoutInvalid(LayoutViolation::TooLong))?;
        let mut buffer = Self::new(length)?;
        buffer.as_bytes_mut().copy_from_slice(bytes);
        Ok(buffer)
    }

    fn layout_for(length: u32) -> Result<Layout> {
        if length == 0 {
            return Err(LayoutViolation::TooShort { length, required: ALIGNMENT }.into());
        }
        if !is_aligned(length) {
            return Err(LayoutViolation::MisalignedLength { length }.into());
        }
        Layout::from_size_align(length as usize, ALIGNMENT as usize)
            .map_err(|_| HeapError::LayoutInvalid(LayoutViolation::TooLong))
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.layout.size() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: start points to layout.size() initialized bytes owned by self.
        unsafe { std::slice::from_raw_parts(self.start.as_ptr(), self.layout.size()) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.start.as_ptr(), self.layout.size()) }
    }

    /// Grow to `new_length` bytes, keeping existing contents and zeroing the tail
    pub fn grow(&mut self, new_length: u32) -> Result<()> {
        let old_length = self.layout.size();
        if (new_length as usize) <= old_length {
            return Ok(());
        }
        let new_layout = Self::layout_for(new_length)?;

        // SAFETY: start was allocated with self.layout, new size is non-zero and
        // fits isize (checked by Layout::from_size_align).
        let start = unsafe { realloc(self.start.as_ptr(), self.layout, new_layout.size()) };
        let start = NonNull::new(start).ok_or(HeapError::OutOfSpace {
            requested: new_length,
            largest_free: 0,
        })?;

        self.start = start;
        self.layout = new_layout;
        self.as_bytes_mut()[old_length..].fill(0);

        tracing::debug!(
            event = "buffer_grow",
            old_length = old_length,
            new_length = new_length,
            "Aligned buffer grown"
        );

        Ok(())
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: start was allocated with self.layout.
        unsafe {
            dealloc(self.start.as_ptr(), self.layout);
        }
    }
}

impl Clone for AlignedBuffer {
    fn clone(&self) -> Self {
        // SAFETY: self.layout has non-zero size.
        let start = unsafe { alloc_zeroed(self.layout) };
        let start = NonNull::new(start).unwrap_or_else(|| handle_alloc_error(self.layout));

        let mut copy = Self { start, layout: self.layout };
        copy.as_bytes_mut().copy_from_slice(self.as_bytes());
        copy
    }
}

impl core::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AlignedBuffer").field("len", &self.len()).finish()
    }
}
