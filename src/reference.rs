//! References - 8-byte offset handles that replace pointers
//!
//! Design: A reference is `{offset, count}` relative to a base the reader
//! supplies, so the same bytes resolve correctly at any address. Two resolvers
//! exist and callers pick one explicitly:
//! - `AtomCursor` (heap root): validates the allocation header behind a
//!   `VectorRef` before trusting it
//! - `RootResolver` (blob base): plain `base + offset` with bounds checks, used
//!   for formatted blobs and by read-only observers

use crate::atom::{Atom, AtomCursor, AtomTag, HEADER_LENGTH};
use crate::error::{HeapError, ReferenceFault, Result};
use crate::heap::{Allocation, AtomHeap};
use crate::layout::{is_aligned, load, Elements, TrivialLayout};
use core::fmt;
use core::marker::PhantomData;

/// Fixed-count array handle inside an immutable blob
#[repr(C)]
pub struct ArrayRef<T> {
    pub offset: u32,
    pub count: u32,
    _marker: PhantomData<T>,
}

/// Growable array handle inside a resource heap
///
/// `offset` is the payload offset of the backing allocation (0 when null).
/// Capacity is read from the allocation header, never stored here.
#[repr(C)]
pub struct VectorRef<T> {
    pub offset: u32,
    pub count: u32,
    _marker: PhantomData<T>,
}

macro_rules! reference_common {
    ($name:ident) => {
        impl<T> $name<T> {
            #[inline]
            pub const fn new(offset: u32, count: u32) -> Self {
                Self { offset, count, _marker: PhantomData }
            }

            #[inline]
            pub const fn null() -> Self {
                Self::new(0, 0)
            }

            #[inline]
            pub const fn len(&self) -> u32 {
                self.count
            }

            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.count == 0
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> Default for $name<T> {
            fn default() -> Self {
                Self::null()
            }
        }

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.offset == other.offset && self.count == other.count
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("offset", &self.offset)
                    .field("count", &self.count)
                    .finish()
            }
        }

        // SAFETY: two u32 fields, repr(C), no padding.
        unsafe impl<T: TrivialLayout> TrivialLayout for $name<T> {}
    };
}

reference_common!(ArrayRef);
reference_common!(VectorRef);

impl<T> VectorRef<T> {
    /// No backing allocation
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.offset == 0
    }
}

/// Atom offset behind a vector payload offset, after checking the header
pub(crate) fn locate_allocation(bytes: &[u8], offset: u32, count: u32, element_size: usize) -> Result<u32> {
    if !is_aligned(offset) {
        return Err(HeapError::reference(offset, ReferenceFault::Misaligned));
    }
    if offset < 2 * HEADER_LENGTH {
        return Err(HeapError::reference(offset, ReferenceFault::BelowFirstPayload));
    }
    if offset as usize + HEADER_LENGTH as usize > bytes.len() {
        return Err(HeapError::reference(offset, ReferenceFault::OutOfBounds));
    }

    let atom_offset = offset - HEADER_LENGTH;
    let atom = Atom::read(bytes, atom_offset);

    if atom.identifier != AtomTag::Allocation {
        return Err(HeapError::reference(offset, ReferenceFault::NotAllocation));
    }
    if atom_offset as usize + atom.length as usize > bytes.len() {
        return Err(HeapError::reference(offset, ReferenceFault::OutOfBounds));
    }

    let capacity = (atom.contents_size() as usize / element_size) as u32;
    if count > capacity {
        return Err(HeapError::reference(offset, ReferenceFault::TooSmall { capacity, count }));
    }

    Ok(atom_offset)
}

// ===== Heap-keyed resolution =====

impl<'a> AtomCursor<'a> {
    /// Allocation atom backing `vector` (`None` when the reference is null)
    ///
    /// The cursor must sit at the heap root.
    pub fn allocation_header<T: TrivialLayout>(&self, vector: &VectorRef<T>) -> Result<Option<AtomCursor<'a>>> {
        debug_assert!(self.is_root(), "vector references resolve from the heap root");

        if vector.is_null() {
            if vector.count != 0 {
                return Err(HeapError::reference(0, ReferenceFault::NullWithCount { count: vector.count }));
            }
            return Ok(None);
        }

        let atom_offset = locate_allocation(self.bytes(), vector.offset, vector.count, T::SIZE)?;
        Ok(Some(AtomCursor::at(self.bytes(), atom_offset)))
    }

    /// Live elements of `vector`, after validating its allocation header
    pub fn vector_contents<T: TrivialLayout>(&self, vector: &VectorRef<T>) -> Result<Elements<'a, T>> {
        match self.allocation_header(vector)? {
            Some(atom) => Ok(Elements::new(atom.contents(), vector.count)),
            None => Ok(Elements::empty()),
        }
    }
}

impl AtomHeap<'_> {
    /// Allocation backing `vector` (`None` when the reference is null)
    pub fn resolve_vector<T: TrivialLayout>(&self, vector: &VectorRef<T>) -> Result<Option<Allocation>> {
        Ok(self
            .root()
            .allocation_header(vector)?
            .map(|atom| Allocation::at(atom.offset())))
    }

    /// Live elements of `vector`
    pub fn vector_contents<T: TrivialLayout>(&self, vector: &VectorRef<T>) -> Result<Elements<'_, T>> {
        self.root().vector_contents(vector)
    }
}

// ===== Base-keyed resolution =====

/// Resolves references against a blob's base bytes
#[derive(Clone, Copy)]
pub struct RootResolver<'a> {
    base: &'a [u8],
    root_offset: u32,
}

impl<'a> RootResolver<'a> {
    /// Resolver whose root object sits at the start of `base`
    pub fn new(base: &'a [u8]) -> Self {
        Self { base, root_offset: 0 }
    }

    /// Resolver whose root object sits at `root_offset`
    pub fn with_root_offset(base: &'a [u8], root_offset: u32) -> Self {
        Self { base, root_offset }
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.base
    }

    #[inline]
    pub fn root_offset(&self) -> u32 {
        self.root_offset
    }

    /// Copy of the root object
    pub fn root<T: TrivialLayout>(&self) -> Result<T> {
        self.value_at(self.root_offset)
    }

    /// Copy of the `T` at `offset`
    pub fn value_at<T: TrivialLayout>(&self, offset: u32) -> Result<T> {
        self.check_span(offset, T::SIZE)?;
        Ok(load(self.base, offset as usize))
    }

    /// Elements named by an array reference
    pub fn array<T: TrivialLayout>(&self, array: &ArrayRef<T>) -> Result<Elements<'a, T>> {
        if !is_aligned(array.offset) {
            return Err(HeapError::reference(array.offset, ReferenceFault::Misaligned));
        }
        self.elements(array.offset, array.count)
    }

    /// Elements named by a vector reference, without consulting atom headers
    pub fn vector<T: TrivialLayout>(&self, vector: &VectorRef<T>) -> Result<Elements<'a, T>> {
        if vector.is_null() {
            if vector.count != 0 {
                return Err(HeapError::reference(0, ReferenceFault::NullWithCount { count: vector.count }));
            }
            return Ok(Elements::empty());
        }
        if !is_aligned(vector.offset) {
            return Err(HeapError::reference(vector.offset, ReferenceFault::Misaligned));
        }
        self.elements(vector.offset, vector.count)
    }

    fn elements<T: TrivialLayout>(&self, offset: u32, count: u32) -> Result<Elements<'a, T>> {
        let span = T::SIZE
            .checked_mul(count as usize)
            .ok_or(HeapError::reference(offset, ReferenceFault::OutOfBounds))?;
        self.check_span(offset, span)?;
        Ok(Elements::new(&self.base[offset as usize..], count))
    }

    fn check_span(&self, offset: u32, span: usize) -> Result<()> {
        let end = (offset as usize).checked_add(span);
        match end {
            Some(end) if end <= self.base.len() => Ok(()),
            _ => Err(HeapError::reference(offset, ReferenceFault::OutOfBounds)),
        }
    }
}

impl fmt::Debug for RootResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootResolver")
            .field("len", &self.base.len())
            .field("root_offset", &self.root_offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AlignedBuffer;
    use crate::layout::store;
    use core::mem::size_of;

    #[test]
    fn test_reference_layout() {
        assert_eq!(size_of::<ArrayRef<u64>>(), 8);
        assert_eq!(size_of::<VectorRef<[f32; 4]>>(), 8);
        assert_eq!(core::mem::align_of::<VectorRef<u8>>(), 4);

        let vector = VectorRef::<u32>::null();
        assert!(vector.is_null());
        assert!(vector.is_empty());
        assert_eq!(vector, VectorRef::default());
    }

    #[test]
    fn test_cursor_resolves_live_allocation() {
        let mut buffer = AlignedBuffer::new(256).unwrap();
        let mut heap = AtomHeap::prepare_resource(buffer.as_bytes_mut()).unwrap();

        let allocation = heap.reserve(16).unwrap();
        store(heap.contents_mut(allocation).unwrap(), 0, [7u32, 8, 9, 10]);

        let vector = VectorRef::<u32>::new(allocation.contents_offset(), 3);
        let atom = heap.root().allocation_header(&vector).unwrap().unwrap();
        assert_eq!(atom.offset(), allocation.offset());
        assert_eq!(heap.vector_contents(&vector).unwrap().to_vec(), vec![7, 8, 9]);
        assert_eq!(heap.resolve_vector(&vector).unwrap(), Some(allocation));
    }

    #[test]
    fn test_cursor_rejects_bad_vectors() {
        let mut buffer = AlignedBuffer::new(256).unwrap();
        let mut heap = AtomHeap::prepare_resource(buffer.as_bytes_mut()).unwrap();
        let allocation = heap.reserve(16).unwrap();
        let root = heap.root();

        let misaligned = VectorRef::<u32>::new(allocation.contents_offset() + 4, 1);
        assert!(matches!(
            root.allocation_header(&misaligned),
            Err(HeapError::InvalidReference { fault: ReferenceFault::Misaligned, .. })
        ));

        let too_low = VectorRef::<u32>::new(16, 1);
        assert!(matches!(
            root.allocation_header(&too_low),
            Err(HeapError::InvalidReference { fault: ReferenceFault::BelowFirstPayload, .. })
        ));

        let too_many = VectorRef::<u32>::new(allocation.contents_offset(), 5);
        assert!(matches!(
            root.allocation_header(&too_many),
            Err(HeapError::InvalidReference { fault: ReferenceFault::TooSmall { capacity: 4, count: 5 }, .. })
        ));

        // Payload of the free tail is not an allocation
        let stale = VectorRef::<u32>::new(allocation.contents_offset() + 32, 0);
        assert!(matches!(
            root.allocation_header(&stale),
            Err(HeapError::InvalidReference { fault: ReferenceFault::NotAllocation, .. })
        ));

        let null_with_count = VectorRef::<u32>::new(0, 2);
        assert!(matches!(
            root.allocation_header(&null_with_count),
            Err(HeapError::InvalidReference { fault: ReferenceFault::NullWithCount { count: 2 }, .. })
        ));

        assert!(root.allocation_header(&VectorRef::<u32>::null()).unwrap().is_none());
    }

    #[test]
    fn test_root_resolver_bounds() {
        let mut bytes = [0u8; 64];
        store(&mut bytes, 0, ArrayRef::<u16>::new(16, 3));
        store(&mut bytes, 16, [1u16, 2, 3]);

        let resolver = RootResolver::new(&bytes);
        let array: ArrayRef<u16> = resolver.root().unwrap();
        assert_eq!(resolver.array(&array).unwrap().to_vec(), vec![1, 2, 3]);

        let outside = ArrayRef::<u64>::new(48, 4);
        assert!(matches!(
            resolver.array(&outside),
            Err(HeapError::InvalidReference { fault: ReferenceFault::OutOfBounds, .. })
        ));

        let vector = VectorRef::<u16>::new(16, 2);
        assert_eq!(resolver.vector(&vector).unwrap().to_vec(), vec![1, 2]);
        assert!(resolver.vector(&VectorRef::<u16>::null()).unwrap().is_empty());
    }
}
