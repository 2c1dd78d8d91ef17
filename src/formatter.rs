//! Formatter - one-pass, append-only builder for immutable blobs
//!
//! Design: A bump pointer over a caller-owned buffer. The root object goes
//! first (or wherever `reserve_as_root` puts it); nested arrays follow, each
//! starting on a 16-byte boundary. No atoms are written and nothing is ever
//! freed or resized. Reserved spans are zeroed, so equal inputs produce
//! byte-identical blobs.
//!
//! Typical use:
//! 1. `assign_root` with placeholder references
//! 2. `append` each nested array, collecting the returned `ArrayRef`s
//! 3. `store_root` with the filled-in references
//! 4. `into_resolver` to read the blob back

use crate::error::{HeapError, LayoutViolation, ReferenceFault, Result};
use crate::layout::{aligned_size_of, is_aligned, is_aligned_ptr, store, ElementsMut, TrivialLayout};
use crate::reference::{ArrayRef, RootResolver};
use core::fmt;

/// Append-only writer for a single blob
pub struct Formatter<'b> {
    buffer: &'b mut [u8],
    buffer_length: u32,
    root_offset: u32,
    current_offset: u32,
}

impl<'b> Formatter<'b> {
    /// Builder over an aligned buffer whose length is a multiple of 16
    pub fn new(buffer: &'b mut [u8]) -> Result<Self> {
        if !is_aligned_ptr(buffer) {
            return Err(LayoutViolation::MisalignedBase.into());
        }
        let buffer_length = u32::try_from(buffer.len()).map_err(|_| LayoutViolation::TooLong)?;
        if !is_aligned(buffer_length) {
            return Err(LayoutViolation::MisalignedLength { length: buffer_length }.into());
        }

        Ok(Self { buffer, buffer_length, root_offset: 0, current_offset: 0 })
    }

    #[inline]
    pub fn buffer_length(&self) -> u32 {
        self.buffer_length
    }

    /// Bytes left for further reservations
    #[inline]
    pub fn remain_length(&self) -> u32 {
        self.buffer_length - self.current_offset
    }

    #[inline]
    pub fn current_offset(&self) -> u32 {
        self.current_offset
    }

    #[inline]
    pub fn root_offset(&self) -> u32 {
        self.root_offset
    }

    #[inline]
    pub fn reset_root(&mut self) {
        self.root_offset = 0;
    }

    /// Bytes written so far
    pub fn written(&self) -> &[u8] {
        &self.buffer[..self.current_offset as usize]
    }

    // ===== Root =====

    /// Place the root object at offset 0, restarting the layout after it
    pub fn assign_root<T: TrivialLayout>(&mut self, root: &T) -> Result<()> {
        let length = self.reservation_length::<T>(1)?;
        if length > self.buffer_length {
            return Err(HeapError::OutOfSpace { requested: length, largest_free: self.buffer_length });
        }

        self.buffer[..length as usize].fill(0);
        store(self.buffer, 0, *root);

        self.current_offset = length;
        self.root_offset = 0;
        Ok(())
    }

    /// Rewrite the root object in place (after its references are known)
    pub fn store_root<T: TrivialLayout>(&mut self, root: &T) -> Result<()> {
        let end = self.root_offset as usize + T::SIZE;
        if end > self.current_offset as usize {
            return Err(HeapError::reference(self.root_offset, ReferenceFault::OutOfBounds));
        }
        store(self.buffer, self.root_offset as usize, *root);
        Ok(())
    }

    // ===== Reservation =====

    /// Bump-allocate `count` zeroed elements, returning them with their offset
    pub fn reserve<T: TrivialLayout>(&mut self, count: u32) -> Result<(ElementsMut<'_, T>, u32)> {
        let offset = self.claim::<T>(count)?;
        Ok((self.elements_at(offset, count), offset))
    }

    /// `reserve`, remembering the offset as the blob's root object
    pub fn reserve_as_root<T: TrivialLayout>(&mut self, count: u32) -> Result<(ElementsMut<'_, T>, u32)> {
        let offset = self.claim::<T>(count)?;
        self.root_offset = offset;
        Ok((self.elements_at(offset, count), offset))
    }

    /// Advance the bump pointer past `count` aligned elements, zeroing them
    fn claim<T: TrivialLayout>(&mut self, count: u32) -> Result<u32> {
        let length = self.reservation_length::<T>(count)?;
        let remain = self.remain_length();
        if length > remain {
            tracing::warn!(
                event = "formatter_exhausted",
                requested_bytes = length,
                remain_bytes = remain,
                "Formatter buffer too small"
            );
            return Err(HeapError::OutOfSpace { requested: length, largest_free: remain });
        }

        let offset = self.current_offset;
        self.current_offset += length;
        self.buffer[offset as usize..self.current_offset as usize].fill(0);
        Ok(offset)
    }

    fn elements_at<T: TrivialLayout>(&mut self, offset: u32, count: u32) -> ElementsMut<'_, T> {
        ElementsMut::new(&mut self.buffer[offset as usize..], count)
    }

    // ===== Arrays =====

    /// Copy `values` into the blob and return the reference naming them
    pub fn append<T: TrivialLayout>(&mut self, values: &[T]) -> Result<ArrayRef<T>> {
        let count = self.count_of(values)?;
        let (mut elements, offset) = self.reserve::<T>(count)?;
        elements.copy_from_slice(values);
        Ok(ArrayRef::new(offset, count))
    }

    /// `append`, remembering the array as the blob's root object
    pub fn append_as_root<T: TrivialLayout>(&mut self, values: &[T]) -> Result<ArrayRef<T>> {
        let count = self.count_of(values)?;
        let (mut elements, offset) = self.reserve_as_root::<T>(count)?;
        elements.copy_from_slice(values);
        Ok(ArrayRef::new(offset, count))
    }

    /// Copy an exact-size iterator's items into the blob
    pub fn append_iter<T, I>(&mut self, values: I) -> Result<ArrayRef<T>>
    where
        T: TrivialLayout,
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let values = values.into_iter();
        let count = u32::try_from(values.len()).map_err(|_| self.overflow())?;
        let (mut elements, offset) = self.reserve::<T>(count)?;
        for (index, value) in (0..count).zip(values) {
            elements.set(index, value);
        }
        Ok(ArrayRef::new(offset, count))
    }

    /// Finish building and read the blob back
    pub fn into_resolver(self) -> RootResolver<'b> {
        let buffer: &'b [u8] = self.buffer;
        RootResolver::with_root_offset(buffer, self.root_offset)
    }

    fn reservation_length<T: TrivialLayout>(&self, count: u32) -> Result<u32> {
        aligned_size_of::<T>(count).ok_or_else(|| self.overflow())
    }

    fn count_of<T>(&self, values: &[T]) -> Result<u32> {
        u32::try_from(values.len()).map_err(|_| self.overflow())
    }

    fn overflow(&self) -> HeapError {
        HeapError::OutOfSpace { requested: u32::MAX, largest_free: self.remain_length() }
    }
}

impl fmt::Debug for Formatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field("buffer_length", &self.buffer_length)
            .field("root_offset", &self.root_offset)
            .field("current_offset", &self.current_offset)
            .finish()
    }
}
