//! Layout rules - alignment and plain-data constraints shared by every record
//!
//! Design: Every offset and atom length in a buffer is a multiple of 16 bytes.
//! Records stored in a buffer are plain, pointer-free, fixed-size values, read
//! and written by copy through bounds-checked slices so the same bytes can be
//! interpreted at any base address.

use core::marker::PhantomData;
use core::mem::size_of;
use core::ptr;

/// Alignment of every atom, offset and buffer (always 16 bytes)
pub const ALIGNMENT: u32 = 16;

const ALIGNMENT_MASK: u32 = ALIGNMENT - 1;

/// Check that a size or offset is a multiple of 16
#[inline]
pub const fn is_aligned(size_or_offset: u32) -> bool {
    size_or_offset & ALIGNMENT_MASK == 0
}

/// Check that a byte slice starts on a 16-byte boundary
#[inline]
pub fn is_aligned_ptr(bytes: &[u8]) -> bool {
    bytes.as_ptr() as usize & (ALIGNMENT as usize - 1) == 0
}

/// Round a size up to the next multiple of 16
///
/// Saturates at the largest aligned `u32`; use [`checked_aligned_size`] where
/// the exact result matters.
#[inline]
pub const fn aligned_size(size: u32) -> u32 {
    size.saturating_add(ALIGNMENT_MASK) & !ALIGNMENT_MASK
}

/// Round a size up to the next multiple of 16, `None` on overflow
#[inline]
pub const fn checked_aligned_size(size: u32) -> Option<u32> {
    match size.checked_add(ALIGNMENT_MASK) {
        Some(padded) => Some(padded & !ALIGNMENT_MASK),
        None => None,
    }
}

/// Aligned byte size of `count` consecutive `T`s
#[inline]
pub fn aligned_size_of<T: TrivialLayout>(count: u32) -> Option<u32> {
    let bytes = u32::try_from(T::SIZE).ok()?.checked_mul(count)?;
    checked_aligned_size(bytes)
}

/// Plain-data record that may live inside a buffer
///
/// # Safety
///
/// Implementors must be `Copy`, contain no pointers or references, have no
/// padding bytes, and accept every bit pattern as a valid value. Zero-sized
/// types are rejected at compile time, and `SIZE` must keep its default.
///
/// ```compile_fail
/// use atomheap::{AlignedBuffer, AtomHeap, VectorRef};
///
/// let mut buffer = AlignedBuffer::new(256).unwrap();
/// let mut heap = AtomHeap::prepare_resource(buffer.as_bytes_mut()).unwrap();
/// let mut reference = VectorRef::<[u32; 0]>::null();
/// heap.vector(&mut reference).unwrap().push([]).unwrap();
/// ```
pub unsafe trait TrivialLayout: Copy + 'static {
    /// Size of one element in bytes, never zero
    const SIZE: usize = {
        assert!(size_of::<Self>() != 0, "zero-sized types cannot be stored in a buffer");
        size_of::<Self>()
    };
}

macro_rules! trivial_layout {
    ($($ty:ty),* $(,)?) => {
        $(unsafe impl TrivialLayout for $ty {})*
    };
}

trivial_layout!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

unsafe impl<T: TrivialLayout, const N: usize> TrivialLayout for [T; N] {}

/// Copy a `T` out of `bytes` at `offset`
///
/// # Panics
///
/// Panics if the value does not fit inside `bytes`.
#[inline]
pub fn load<T: TrivialLayout>(bytes: &[u8], offset: usize) -> T {
    let src = &bytes[offset..offset + T::SIZE];
    // SAFETY: `src` spans exactly `T::SIZE` initialized bytes and
    // TrivialLayout admits every bit pattern.
    unsafe { ptr::read_unaligned(src.as_ptr().cast::<T>()) }
}

/// Copy a `T` into `bytes` at `offset`
///
/// # Panics
///
/// Panics if the value does not fit inside `bytes`.
#[inline]
pub fn store<T: TrivialLayout>(bytes: &mut [u8], offset: usize, value: T) {
    let dst = &mut bytes[offset..offset + T::SIZE];
    // SAFETY: `dst` spans exactly `T::SIZE` writable bytes and
    // TrivialLayout has no padding, so every written byte is initialized.
    unsafe { ptr::write_unaligned(dst.as_mut_ptr().cast::<T>(), value) }
}

/// Read-only view of `len` consecutive `T`s inside a buffer
#[derive(Clone, Copy)]
pub struct Elements<'a, T> {
    bytes: &'a [u8],
    len: u32,
    _marker: PhantomData<T>,
}

impl<'a, T: TrivialLayout> Elements<'a, T> {
    /// View over the first `len` elements of `bytes`
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is too short.
    pub fn new(bytes: &'a [u8], len: u32) -> Self {
        let span = T::SIZE * len as usize;
        Self { bytes: &bytes[..span], len, _marker: PhantomData }
    }

    /// Empty view (used for null references)
    pub fn empty() -> Self {
        Self { bytes: &[], len: 0, _marker: PhantomData }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: u32) -> Option<T> {
        (index < self.len).then(|| load(self.bytes, index as usize * T::SIZE))
    }

    pub fn first(&self) -> Option<T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<T> {
        self.len.checked_sub(1).and_then(|index| self.get(index))
    }

    pub fn iter(&self) -> ElementIter<'a, T> {
        ElementIter { bytes: self.bytes, front: 0, back: self.len, _marker: PhantomData }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Raw bytes backing the view
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl<'a, T: TrivialLayout> IntoIterator for Elements<'a, T> {
    type Item = T;
    type IntoIter = ElementIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: TrivialLayout + core::fmt::Debug> core::fmt::Debug for Elements<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Double-ended iterator copying elements out of a view
pub struct ElementIter<'a, T> {
    bytes: &'a [u8],
    front: u32,
    back: u32,
    _marker: PhantomData<T>,
}

impl<T: TrivialLayout> Iterator for ElementIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        let value = load(self.bytes, self.front as usize * T::SIZE);
        self.front += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.back - self.front) as usize;
        (remaining, Some(remaining))
    }
}

impl<T: TrivialLayout> DoubleEndedIterator for ElementIter<'_, T> {
    fn next_back(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(load(self.bytes, self.back as usize * T::SIZE))
    }
}

impl<T: TrivialLayout> ExactSizeIterator for ElementIter<'_, T> {}

/// Writable view of `len` consecutive `T`s inside a buffer
pub struct ElementsMut<'a, T> {
    bytes: &'a mut [u8],
    len: u32,
    _marker: PhantomData<T>,
}

impl<'a, T: TrivialLayout> ElementsMut<'a, T> {
    /// Writable view over the first `len` elements of `bytes`
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is too short.
    pub fn new(bytes: &'a mut [u8], len: u32) -> Self {
        let span = T::SIZE * len as usize;
        Self { bytes: &mut bytes[..span], len, _marker: PhantomData }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: u32) -> Option<T> {
        self.as_elements().get(index)
    }

    /// Overwrite the element at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: u32, value: T) {
        assert!(index < self.len, "index {} out of bounds (len {})", index, self.len);
        store(self.bytes, index as usize * T::SIZE, value);
    }

    /// Swap in a new value, returning the old one (`None` if out of bounds)
    pub fn replace(&mut self, index: u32, value: T) -> Option<T> {
        let old = self.get(index)?;
        self.set(index, value);
        Some(old)
    }

    pub fn fill(&mut self, value: T) {
        for index in 0..self.len {
            self.set(index, value);
        }
    }

    /// Copy `source` into the view
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ.
    pub fn copy_from_slice(&mut self, source: &[T]) {
        assert_eq!(source.len(), self.len as usize, "source length mismatch");
        for (index, value) in source.iter().enumerate() {
            store(self.bytes, index * T::SIZE, *value);
        }
    }

    pub fn as_elements(&self) -> Elements<'_, T> {
        Elements { bytes: self.bytes, len: self.len, _marker: PhantomData }
    }

    pub fn iter(&self) -> ElementIter<'_, T> {
        self.as_elements().iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}
