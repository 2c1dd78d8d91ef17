//! Vector - growable array whose storage is one heap allocation
//!
//! Design: `Vector` is a transient view pairing a reborrowed `AtomHeap` with
//! the `VectorRef` it manages. Every size change goes through the heap's
//! `reserve`/`resize`, so growth may move the payload; the only visible effect
//! is a new `offset` in the reference. Element positions are never assumed
//! stable across a mutating call.
//!
//! Growth policy: `push` on a full vector grows it to the next multiple of 4
//! elements. Inserts reserve exactly the length they need.

use crate::atom::{Atom, HEADER_LENGTH};
use crate::error::{HeapError, ReferenceFault, Result};
use crate::heap::{Allocation, AtomHeap};
use crate::layout::{load, store, ElementIter, Elements, ElementsMut, TrivialLayout};
use crate::reference::VectorRef;
use core::fmt;
use core::ops::{Bound, RangeBounds};

/// Dynamic array over a `VectorRef` inside a resource heap
pub struct Vector<'v, T: TrivialLayout> {
    heap: AtomHeap<'v>,
    reference: &'v mut VectorRef<T>,
}

/// Capacity after growing a full vector of `len` elements
#[inline]
pub(crate) const fn grown_capacity(len: u32) -> u32 {
    len.saturating_add(4) & !3
}

impl<'v, T: TrivialLayout> Vector<'v, T> {
    /// Bind `reference` to `heap`, validating its backing allocation
    pub fn new(heap: AtomHeap<'v>, reference: &'v mut VectorRef<T>) -> Result<Self> {
        heap.resolve_vector(reference)?;
        Ok(Self { heap, reference })
    }

    /// Current reference value (what the owning record will hold)
    #[inline]
    pub fn reference(&self) -> VectorRef<T> {
        *self.reference
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.reference.is_null()
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.reference.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reference.count == 0
    }

    /// Backing allocation (`None` while null)
    pub fn allocation(&self) -> Option<Allocation> {
        if self.is_null() {
            None
        } else {
            Some(Allocation::at(self.reference.offset - HEADER_LENGTH))
        }
    }

    /// Elements the backing allocation can hold
    pub fn capacity(&self) -> u32 {
        match self.allocation() {
            Some(allocation) => Atom::read(self.heap.as_bytes(), allocation.offset()).capacity::<T>(),
            None => 0,
        }
    }

    /// Elements that fit before the next reallocation
    #[inline]
    pub fn available(&self) -> u32 {
        self.capacity() - self.len()
    }

    /// Upper bound on elements for a single allocation in this heap
    pub fn max_size(&self) -> u32 {
        let root_length = self.heap.root().length();
        let usable = self.heap.len().saturating_sub(root_length + 2 * HEADER_LENGTH);
        usable / T::SIZE as u32
    }

    // ===== Element access =====

    pub fn contents(&self) -> Elements<'_, T> {
        if self.is_null() {
            return Elements::empty();
        }
        Elements::new(&self.heap.as_bytes()[self.reference.offset as usize..], self.len())
    }

    pub fn contents_mut(&mut self) -> ElementsMut<'_, T> {
        let (offset, len) = (self.reference.offset as usize, self.len());
        if self.is_null() {
            return ElementsMut::new(&mut [], 0);
        }
        ElementsMut::new(&mut self.heap.bytes_mut()[offset..], len)
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<T> {
        self.contents().get(index)
    }

    /// Overwrite the element at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: u32, value: T) {
        self.contents_mut().set(index, value);
    }

    #[inline]
    pub fn front(&self) -> Option<T> {
        self.contents().first()
    }

    #[inline]
    pub fn back(&self) -> Option<T> {
        self.contents().last()
    }

    /// Front-to-back iterator; `.rev()` walks back-to-front
    pub fn iter(&self) -> ElementIter<'_, T> {
        self.contents().iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.contents().to_vec()
    }

    // ===== Growth =====

    /// Ensure room for `capacity` elements
    ///
    /// No-op when the current capacity suffices; otherwise the allocation is
    /// sized for exactly `capacity` elements (rounded to 16 bytes).
    pub fn reserve(&mut self, capacity: u32) -> Result<()> {
        if capacity <= self.capacity() {
            return Ok(());
        }

        let size = self.byte_length(capacity)?;
        let allocation = match self.allocation() {
            Some(allocation) => self.heap.resize(allocation, size)?,
            None => self.heap.reserve(size)?,
        };
        self.reference.offset = allocation.contents_offset();
        Ok(())
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        let len = self.len();
        if len == self.capacity() {
            self.reserve(grown_capacity(len))?;
        }
        self.write(len, value);
        self.reference.count = len + 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        let last = self.back()?;
        self.reference.count -= 1;
        Some(last)
    }

    /// Append every element of `values`
    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<()> {
        self.insert_slice(self.len(), values)
    }

    // ===== Insertion =====

    /// Insert `value` before `index`, shifting the suffix up
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: u32, value: T) -> Result<()> {
        self.open_gap(index, 1)?;
        self.write(index, value);
        Ok(())
    }

    /// Insert `count` copies of `value` before `index`
    pub fn insert_n(&mut self, index: u32, count: u32, value: T) -> Result<()> {
        self.open_gap(index, count)?;
        for position in index..index + count {
            self.write(position, value);
        }
        Ok(())
    }

    /// Insert a copy of `values` before `index`
    pub fn insert_slice(&mut self, index: u32, values: &[T]) -> Result<()> {
        let count = u32::try_from(values.len()).map_err(|_| self.overflow())?;
        self.open_gap(index, count)?;
        for (position, value) in (index..).zip(values) {
            self.write(position, *value);
        }
        Ok(())
    }

    // ===== Removal =====

    /// Remove and return the element at `index`, shifting the suffix down
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: u32) -> T {
        let len = self.len();
        assert!(index < len, "removal index {} out of bounds (len {})", index, len);
        let value = self.read(index);
        self.erase(index..index + 1);
        value
    }

    /// Remove a range of elements, shifting the suffix down
    ///
    /// # Panics
    ///
    /// Panics if the range is decreasing or extends past `len`.
    pub fn erase<R: RangeBounds<u32>>(&mut self, range: R) {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => end + 1,
            Bound::Excluded(&end) => end,
            Bound::Unbounded => len,
        };
        assert!(start <= end && end <= len, "erase range {}..{} out of bounds (len {})", start, end, len);

        if start == end {
            return;
        }

        let (from, to) = (self.element_offset(end), self.element_offset(start));
        let tail = self.element_offset(len);
        self.heap.bytes_mut().copy_within(from..tail, to);
        self.reference.count = len - (end - start);
    }

    /// Replace the contents with a copy of `values`
    pub fn assign(&mut self, values: &[T]) -> Result<()> {
        let count = u32::try_from(values.len()).map_err(|_| self.overflow())?;
        self.reserve(count)?;
        self.reference.count = count;
        self.contents_mut().copy_from_slice(values);
        Ok(())
    }

    /// Drop every element, keeping the allocation
    #[inline]
    pub fn clear(&mut self) {
        self.reference.count = 0;
    }

    // ===== Release =====

    /// Trim the allocation to `len`, or free it when empty
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        let Some(allocation) = self.allocation() else {
            return Ok(());
        };
        if self.is_empty() {
            return self.release();
        }

        let size = self.byte_length(self.len())?;
        let allocation = self.heap.resize(allocation, size)?;
        self.reference.offset = allocation.contents_offset();
        Ok(())
    }

    /// Return the allocation to the heap; the reference becomes null
    pub fn release(&mut self) -> Result<()> {
        if let Some(allocation) = self.allocation() {
            self.heap.free(allocation)?;
        }
        *self.reference = VectorRef::null();
        Ok(())
    }

    // ===== Internals =====

    #[inline]
    fn element_offset(&self, index: u32) -> usize {
        self.reference.offset as usize + index as usize * T::SIZE
    }

    #[inline]
    fn read(&self, index: u32) -> T {
        load(self.heap.as_bytes(), self.element_offset(index))
    }

    #[inline]
    fn write(&mut self, index: u32, value: T) {
        let offset = self.element_offset(index);
        store(self.heap.bytes_mut(), offset, value);
    }

    fn byte_length(&self, count: u32) -> Result<u32> {
        u32::try_from(T::SIZE)
            .ok()
            .and_then(|size| size.checked_mul(count))
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> HeapError {
        HeapError::OutOfSpace { requested: u32::MAX, largest_free: self.heap.stats().largest_free }
    }

    /// Make room for `count` elements at `index`, growing first if needed
    fn open_gap(&mut self, index: u32, count: u32) -> Result<()> {
        let len = self.len();
        assert!(index <= len, "insertion index {} out of bounds (len {})", index, len);
        if count == 0 {
            return Ok(());
        }

        let required = len.checked_add(count).ok_or_else(|| self.overflow())?;
        self.reserve(required)?;

        let (from, tail) = (self.element_offset(index), self.element_offset(len));
        let to = self.element_offset(index + count);
        self.heap.bytes_mut().copy_within(from..tail, to);
        self.reference.count = required;
        Ok(())
    }
}

impl<T: TrivialLayout + fmt::Debug> fmt::Debug for Vector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> AtomHeap<'a> {
    /// Vector view over a reference held outside the heap
    pub fn vector<'v, T: TrivialLayout>(&'v mut self, reference: &'v mut VectorRef<T>) -> Result<Vector<'v, T>> {
        Vector::new(self.reborrow(), reference)
    }

    /// Run `edit` on the vector whose reference is stored at `reference_offset`
    ///
    /// The reference must sit inside the root payload or a live allocation
    /// other than the vector's own. It is written back even when `edit` fails,
    /// so a relocation that happened before the failure is never lost.
    pub fn with_vector_at<T, R, F>(&mut self, reference_offset: u32, edit: F) -> Result<R>
    where
        T: TrivialLayout,
        F: FnOnce(&mut Vector<'_, T>) -> Result<R>,
    {
        let span = VectorRef::<T>::SIZE as u32;
        if reference_offset as u64 + span as u64 > self.len() as u64 {
            return Err(HeapError::reference(reference_offset, ReferenceFault::OutOfBounds));
        }
        let container = self
            .payload_containing(reference_offset, span)
            .map(|atom| atom.offset())
            .ok_or(HeapError::reference(reference_offset, ReferenceFault::OutsidePayload))?;

        let start = reference_offset as usize;
        let mut reference: VectorRef<T> = load(self.as_bytes(), start);
        if let Some(allocation) = self.resolve_vector(&reference)? {
            if allocation.offset() == container {
                return Err(HeapError::reference(reference_offset, ReferenceFault::InsideOwnStorage));
            }
        }

        let result = {
            let mut vector = Vector::new(self.reborrow(), &mut reference)?;
            edit(&mut vector)
        };
        store(self.bytes_mut(), start, reference);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AlignedBuffer;

    fn resource(length: u32) -> AlignedBuffer {
        let mut buffer = AlignedBuffer::new(length).unwrap();
        AtomHeap::prepare_resource(buffer.as_bytes_mut()).unwrap();
        buffer
    }

    // ===== Growth Tests =====

    #[test]
    fn test_push_grows_in_multiples_of_four() {
        let mut buffer = resource(512);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u32>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        for value in 1..=5 {
            vector.push(value).unwrap();
        }

        assert_eq!(vector.len(), 5);
        assert_eq!(vector.capacity(), 8);
        assert_eq!(vector.available(), 3);
        assert_eq!(vector.to_vec(), vec![1, 2, 3, 4, 5]);
        assert_eq!(reference.count, 5);
        assert!(heap.validate());
    }

    #[test]
    fn test_reserve_below_capacity_is_noop() {
        let mut buffer = resource(512);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u64>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.reserve(10).unwrap();
        vector.assign(&[4, 5, 6]).unwrap();
        let before = (vector.reference(), vector.capacity(), vector.to_vec());

        vector.reserve(5).unwrap();
        vector.reserve(10).unwrap();
        assert_eq!((vector.reference(), vector.capacity(), vector.to_vec()), before);
    }

    #[test]
    fn test_reserve_allocates_exact_request() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<[u8; 12]>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.reserve(3).unwrap();
        // 36 bytes round up to 48
        assert_eq!(vector.capacity(), 4);
        assert!(vector.is_empty());
        assert!(!vector.is_null());
    }

    #[test]
    fn test_growth_relocates_past_neighbour() {
        let mut buffer = resource(512);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u32>::null();

        {
            let mut vector = heap.vector(&mut reference).unwrap();
            vector.extend_from_slice(&[1, 2, 3, 4]).unwrap();
        }
        let first_offset = reference.offset;
        heap.reserve(16).unwrap();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.push(5).unwrap();
        assert_ne!(vector.reference().offset, first_offset);
        assert_eq!(vector.to_vec(), vec![1, 2, 3, 4, 5]);
        drop(vector);
        assert!(heap.validate());
    }

    #[test]
    fn test_max_size_bounds_single_allocation() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u32>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        assert_eq!(vector.max_size(), (256 - 48) / 4);
        vector.reserve(vector.max_size()).unwrap();
        assert!(vector.push(0).is_ok());
        assert!(vector.reserve(vector.max_size() + 4).unwrap_err().is_out_of_space());
    }

    // ===== Editing Tests =====

    #[test]
    fn test_insert_and_remove_shift_suffix() {
        let mut buffer = resource(512);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u16>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.assign(&[10, 20, 30]).unwrap();
        vector.insert(1, 15).unwrap();
        vector.insert(4, 40).unwrap();
        assert_eq!(vector.to_vec(), vec![10, 15, 20, 30, 40]);

        assert_eq!(vector.remove(0), 10);
        assert_eq!(vector.to_vec(), vec![15, 20, 30, 40]);
        assert_eq!(vector.pop(), Some(40));
        assert_eq!(vector.front(), Some(15));
        assert_eq!(vector.back(), Some(30));
    }

    #[test]
    fn test_insert_n_and_slice() {
        let mut buffer = resource(512);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u32>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.assign(&[1, 9]).unwrap();
        vector.insert_n(1, 3, 0).unwrap();
        assert_eq!(vector.to_vec(), vec![1, 0, 0, 0, 9]);

        vector.insert_slice(4, &[7, 8]).unwrap();
        assert_eq!(vector.to_vec(), vec![1, 0, 0, 0, 7, 8, 9]);
        assert!(vector.capacity() >= 7);
    }

    #[test]
    fn test_insert_reserves_exact_length() {
        let mut buffer = resource(512);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u64>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.assign(&[1, 2, 3, 4]).unwrap();
        assert_eq!(vector.capacity(), 4);

        // 5 elements take 40 bytes, rounded to 48
        vector.insert(2, 9).unwrap();
        assert_eq!(vector.capacity(), 6);
        assert_eq!(vector.to_vec(), vec![1, 2, 9, 3, 4]);
    }

    #[test]
    fn test_erase_ranges() {
        let mut buffer = resource(512);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<i32>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.assign(&[0, 1, 2, 3, 4, 5, 6]).unwrap();
        let capacity = vector.capacity();

        vector.erase(1..3);
        assert_eq!(vector.to_vec(), vec![0, 3, 4, 5, 6]);
        vector.erase(3..);
        assert_eq!(vector.to_vec(), vec![0, 3, 4]);
        vector.erase(..=0);
        assert_eq!(vector.to_vec(), vec![3, 4]);
        vector.erase(1..1);
        assert_eq!(vector.to_vec(), vec![3, 4]);
        assert_eq!(vector.capacity(), capacity);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_insert_past_end_panics() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u32>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        let _ = vector.insert(1, 5);
    }

    #[test]
    fn test_set_and_reverse_iteration() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u8>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.assign(&[1, 2, 3]).unwrap();
        vector.set(1, 20);
        assert_eq!(vector.iter().rev().collect::<Vec<_>>(), vec![3, 20, 1]);
        assert_eq!(format!("{:?}", vector), "[1, 20, 3]");
    }

    // ===== Release Tests =====

    #[test]
    fn test_shrink_and_release_return_space() {
        let mut buffer = resource(512);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let initial = heap.stats();
        let mut reference = VectorRef::<u64>::null();

        {
            let mut vector = heap.vector(&mut reference).unwrap();
            vector.reserve(16).unwrap();
            vector.assign(&[1, 2]).unwrap();
            vector.shrink_to_fit().unwrap();
            assert_eq!(vector.capacity(), 2);
            assert_eq!(vector.to_vec(), vec![1, 2]);

            vector.clear();
            vector.shrink_to_fit().unwrap();
            assert!(vector.is_null());
        }

        assert_eq!(reference, VectorRef::null());
        assert_eq!(heap.stats(), initial);
        assert!(heap.validate());
    }

    #[test]
    fn test_release_on_null_is_noop() {
        let mut buffer = resource(128);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u32>::null();

        let mut vector = heap.vector(&mut reference).unwrap();
        vector.release().unwrap();
        vector.shrink_to_fit().unwrap();
        assert!(vector.is_null());
        assert_eq!(vector.capacity(), 0);
        assert!(vector.contents().is_empty());
    }

    // ===== Stored Reference Tests =====

    #[test]
    fn test_with_vector_at_writes_reference_back() {
        let mut buffer = AlignedBuffer::new(512).unwrap();
        let mut heap =
            AtomHeap::prepare_data(buffer.as_bytes_mut(), &VectorRef::<u32>::null()).unwrap();

        let len = heap
            .with_vector_at::<u32, _, _>(HEADER_LENGTH, |vector| {
                vector.extend_from_slice(&[5, 6, 7])?;
                Ok(vector.len())
            })
            .unwrap();
        assert_eq!(len, 3);

        let stored: VectorRef<u32> = heap.root_contents().unwrap();
        assert_eq!(stored.count, 3);
        assert_eq!(heap.vector_contents(&stored).unwrap().to_vec(), vec![5, 6, 7]);
        assert!(heap.validate());
    }

    #[test]
    fn test_with_vector_at_keeps_progress_on_failure() {
        let mut buffer = AlignedBuffer::new(128).unwrap();
        let mut heap =
            AtomHeap::prepare_data(buffer.as_bytes_mut(), &VectorRef::<u32>::null()).unwrap();

        let result = heap.with_vector_at::<u32, (), _>(HEADER_LENGTH, |vector| {
            vector.push(1)?;
            vector.reserve(1000)
        });
        assert!(result.unwrap_err().is_out_of_space());

        let stored: VectorRef<u32> = heap.root_contents().unwrap();
        assert_eq!(heap.vector_contents(&stored).unwrap().to_vec(), vec![1]);
    }

    #[test]
    fn test_rejects_corrupt_reference() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let mut reference = VectorRef::<u32>::new(64, 2);

        assert!(matches!(
            heap.vector(&mut reference),
            Err(HeapError::InvalidReference { fault: ReferenceFault::NotAllocation, .. })
        ));
    }

    #[test]
    fn test_with_vector_at_rejects_free_space() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        heap.reserve(16).unwrap();
        let before = heap.as_bytes().to_vec();

        // Offset 48 is the header of the trailing free atom
        let result = heap.with_vector_at::<u32, _, _>(48, |vector| vector.push(7));
        assert!(matches!(
            result,
            Err(HeapError::InvalidReference { offset: 48, fault: ReferenceFault::OutsidePayload })
        ));
        assert_eq!(heap.as_bytes(), &before[..]);
        assert!(heap.validate());
    }

    #[test]
    fn test_with_vector_at_rejects_reference_straddling_payload_end() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let holder = heap.reserve(16).unwrap();

        let last_word = holder.contents_offset() + 12;
        assert!(matches!(
            heap.with_vector_at::<u32, _, _>(last_word, |vector| vector.push(1)),
            Err(HeapError::InvalidReference { fault: ReferenceFault::OutsidePayload, .. })
        ));
        assert!(heap.validate());
    }

    #[test]
    fn test_with_vector_at_rejects_reference_inside_own_storage() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let allocation = heap.reserve(16).unwrap();
        let payload = allocation.contents_offset();
        store(heap.contents_mut(allocation).unwrap(), 0, VectorRef::<u32>::new(payload, 1));

        assert!(matches!(
            heap.with_vector_at::<u32, _, _>(payload, |vector| vector.push(2)),
            Err(HeapError::InvalidReference { fault: ReferenceFault::InsideOwnStorage, .. })
        ));
        assert!(heap.validate());
    }

    #[test]
    fn test_with_vector_at_inside_allocation_payload() {
        let mut buffer = resource(256);
        let mut heap = AtomHeap::open(buffer.as_bytes_mut()).unwrap();
        let holder = heap.reserve(16).unwrap();
        let reference_offset = holder.contents_offset() + 8;

        heap.with_vector_at::<u16, _, _>(reference_offset, |vector| vector.assign(&[3, 1, 4]))
            .unwrap();

        let stored: VectorRef<u16> = load(heap.as_bytes(), reference_offset as usize);
        assert_eq!(heap.vector_contents(&stored).unwrap().to_vec(), vec![3, 1, 4]);
        assert!(heap.validate());
    }
}
