//! Atom heap - first-fit allocation with splitting and coalescing
//!
//! Design: The heap is a view over a caller-owned buffer holding a valid atom
//! chain. All state lives in the buffer itself:
//! 1. `reserve` scans forward from the root for the first free atom that fits
//!    and divides off the unused tail
//! 2. `resize` shrinks in place, extends into a following free atom, or
//!    relocates and copies
//! 3. `free` coalesces with free neighbours, so no two free atoms touch
//!
//! Exhaustion is reported as `OutOfSpace` and leaves the buffer unchanged.

use crate::atom::{check_layout, Atom, AtomCursor, AtomTag, Atoms, HEADER_LENGTH, MIN_CONTENTS_LENGTH};
use crate::error::{HeapError, LayoutViolation, ReferenceFault, Result};
use crate::layout::{checked_aligned_size, is_aligned, is_aligned_ptr, load, store, TrivialLayout};
use crate::logging;


/// Handle to an allocation atom (byte offset of its header from the root)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation {
    offset: u32,
}

impl Allocation {
    #[inline]
    pub(crate) const fn at(offset: u32) -> Self {
        Self { offset }
    }

    /// Offset of the atom header
    #[inline]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Offset of the first payload byte
    #[inline]
    pub const fn contents_offset(&self) -> u32 {
        self.offset + HEADER_LENGTH
    }
}

/// Heap occupancy snapshot
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub allocations: u32,
    /// Payload bytes held by allocations
    pub allocated_bytes: u32,
    pub free_atoms: u32,
    /// Payload bytes available in free atoms
    pub free_bytes: u32,
    /// Largest single free payload
    pub largest_free: u32,
}

/// Mutable heap over a caller-owned buffer
pub struct AtomHeap<'a> {
    bytes: &'a mut [u8],
}

impl<'a> AtomHeap<'a> {
    /// Format `bytes` as an empty resource heap (root without payload)
    pub fn prepare_resource(bytes: &'a mut [u8]) -> Result<Self> {
        Self::prepare_with_root_size(bytes, 0)
    }

    /// Format `bytes` with `data` as the root payload
    pub fn prepare_data<T: TrivialLayout>(bytes: &'a mut [u8], data: &T) -> Result<Self> {
        let mut heap = Self::prepare_with_root_size(bytes, T::SIZE as u32)?;
        heap.set_root_contents(data)?;
        Ok(heap)
    }

    /// Format `bytes` with a zeroed root payload of `data_contents_size` bytes
    ///
    /// Whatever follows the root becomes a single free atom.
    pub fn prepare_with_root_size(bytes: &'a mut [u8], data_contents_size: u32) -> Result<Self> {
        if !is_aligned_ptr(bytes) {
            return Err(LayoutViolation::MisalignedBase.into());
        }
        let length = u32::try_from(bytes.len()).map_err(|_| LayoutViolation::TooLong)?;
        if !is_aligned(length) {
            return Err(LayoutViolation::MisalignedLength { length }.into());
        }

        let root_contents = checked_aligned_size(data_contents_size).ok_or(LayoutViolation::TooLong)?;
        let required = root_contents
            .checked_add(MIN_CONTENTS_LENGTH)
            .ok_or(LayoutViolation::TooLong)?;
        if length < required {
            return Err(LayoutViolation::TooShort { length, required }.into());
        }

        let root = Atom::new(AtomTag::Data, HEADER_LENGTH + root_contents, 0);
        root.write(bytes, 0);
        bytes[HEADER_LENGTH as usize..root.length as usize].fill(0);

        let end_offset = length - HEADER_LENGTH;
        let last_length = if root.length < end_offset {
            let free = Atom::new(AtomTag::Free, end_offset - root.length, root.length);
            free.write(bytes, root.length);
            free.length
        } else {
            root.length
        };
        Atom::new(AtomTag::End, HEADER_LENGTH, last_length).write(bytes, end_offset);

        logging::log_prepare(length, root.length);

        Ok(Self { bytes })
    }

    /// Adopt a buffer after full validation
    pub fn open(bytes: &'a mut [u8]) -> Result<Self> {
        check_layout(bytes)?;
        Ok(Self { bytes })
    }

    /// Adopt a buffer this crate formatted and has mutated since
    #[inline]
    pub(crate) fn from_prepared(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Adopt a buffer that grew from `old_length` bytes
    ///
    /// The first `old_length` bytes must hold a valid layout. The old end
    /// sentinel plus the new bytes become free space (merged with a trailing
    /// free atom if there is one) and a new sentinel closes the buffer.
    pub fn extend(bytes: &'a mut [u8], old_length: u32) -> Result<Self> {
        let length = u32::try_from(bytes.len()).map_err(|_| LayoutViolation::TooLong)?;
        if !is_aligned(length) {
            return Err(LayoutViolation::MisalignedLength { length }.into());
        }
        if old_length > length {
            return Err(LayoutViolation::TooShort { length, required: old_length }.into());
        }
        check_layout(&bytes[..old_length as usize])?;

        if old_length == length {
            return Ok(Self { bytes });
        }

        let added = length - old_length;
        let old_end = old_length - HEADER_LENGTH;
        let last_offset = old_end - Atom::read(bytes, old_end).previous;
        let mut last = Atom::read(bytes, last_offset);

        let tail_length = if last.identifier == AtomTag::Free {
            last.length += added;
            last.write(bytes, last_offset);
            last.length
        } else {
            Atom::new(AtomTag::Free, added, last.length).write(bytes, old_end);
            added
        };
        Atom::new(AtomTag::End, HEADER_LENGTH, tail_length).write(bytes, length - HEADER_LENGTH);

        logging::log_extend(old_length, length);

        Ok(Self { bytes })
    }

    /// Shorter-lived heap over the same buffer
    #[inline]
    pub fn reborrow(&mut self) -> AtomHeap<'_> {
        AtomHeap { bytes: &mut *self.bytes }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    /// Raw write access for containers that keep their own invariants
    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }

    /// Full invariant walk (never on the allocation paths)
    pub fn validate(&self) -> bool {
        crate::atom::validate_layout(self.bytes)
    }

    // ===== Traversal =====

    #[inline]
    pub fn root(&self) -> AtomCursor<'_> {
        AtomCursor::at(self.bytes, 0)
    }

    #[inline]
    pub fn end(&self) -> AtomCursor<'_> {
        AtomCursor::at(self.bytes, self.end_offset())
    }

    /// Every atom from root through end sentinel
    pub fn atoms(&self) -> Atoms<'_> {
        Atoms::new(self.root(), self.end())
    }

    /// Live allocations in chain order
    pub fn allocations(&self) -> impl Iterator<Item = Allocation> + '_ {
        self.atoms()
            .filter(|atom| atom.tag() == AtomTag::Allocation)
            .map(|atom| Allocation::at(atom.offset()))
    }

    /// Cursor positioned at a live allocation
    pub fn cursor(&self, allocation: Allocation) -> Result<AtomCursor<'_>> {
        self.allocation_header(allocation)?;
        Ok(AtomCursor::at(self.bytes, allocation.offset))
    }

    // ===== Root payload =====

    pub fn root_contents<T: TrivialLayout>(&self) -> Result<T> {
        self.check_root_fits::<T>()?;
        Ok(load(self.bytes, HEADER_LENGTH as usize))
    }

    pub fn set_root_contents<T: TrivialLayout>(&mut self, value: &T) -> Result<()> {
        self.check_root_fits::<T>()?;
        store(self.bytes, HEADER_LENGTH as usize, *value);
        Ok(())
    }

    fn check_root_fits<T: TrivialLayout>(&self) -> Result<()> {
        if (T::SIZE as u32) > self.header(0).contents_size() {
            return Err(HeapError::reference(HEADER_LENGTH, ReferenceFault::OutOfBounds));
        }
        Ok(())
    }

    // ===== Allocation access =====

    /// Checked handle for the allocation atom at `offset`
    pub fn allocation_at(&self, offset: u32) -> Result<Allocation> {
        let allocation = Allocation::at(offset);
        self.allocation_header(allocation)?;
        Ok(allocation)
    }

    pub fn contents_size(&self, allocation: Allocation) -> Result<u32> {
        Ok(self.allocation_header(allocation)?.contents_size())
    }

    pub fn contents(&self, allocation: Allocation) -> Result<&[u8]> {
        let atom = self.allocation_header(allocation)?;
        let start = allocation.contents_offset() as usize;
        Ok(&self.bytes[start..start + atom.contents_size() as usize])
    }

    pub fn contents_mut(&mut self, allocation: Allocation) -> Result<&mut [u8]> {
        let atom = self.allocation_header(allocation)?;
        let start = allocation.contents_offset() as usize;
        Ok(&mut self.bytes[start..start + atom.contents_size() as usize])
    }

    /// Header of a live allocation, rejecting stale or forged handles
    pub(crate) fn allocation_header(&self, allocation: Allocation) -> Result<Atom> {
        let offset = allocation.offset;
        if !is_aligned(offset) {
            return Err(HeapError::reference(offset, ReferenceFault::Misaligned));
        }
        if offset < HEADER_LENGTH {
            return Err(HeapError::reference(offset, ReferenceFault::BelowFirstPayload));
        }
        let end_offset = self.end_offset();
        if offset >= end_offset {
            return Err(HeapError::reference(offset, ReferenceFault::OutOfBounds));
        }

        let atom = self.header(offset);
        if atom.identifier != AtomTag::Allocation {
            return Err(HeapError::reference(offset, ReferenceFault::NotAllocation));
        }
        if atom.length <= HEADER_LENGTH || atom.length > end_offset - offset {
            return Err(HeapError::reference(offset, ReferenceFault::OutOfBounds));
        }
        // Backlink must land on an earlier atom
        if atom.previous < HEADER_LENGTH || offset.checked_sub(atom.previous).is_none() {
            return Err(HeapError::reference(offset, ReferenceFault::OutOfBounds));
        }
        Ok(atom)
    }

    /// Root or allocation whose payload wholly holds `length` bytes at `offset`
    pub(crate) fn payload_containing(&self, offset: u32, length: u32) -> Option<AtomCursor<'_>> {
        let end = offset.checked_add(length)?;
        self.atoms()
            .take_while(|atom| atom.offset() <= offset)
            .filter(|atom| matches!(atom.tag(), AtomTag::Data | AtomTag::Allocation))
            .find(|atom| atom.contents_offset() <= offset && end <= atom.offset() + atom.length())
    }

    // ===== Allocation =====

    /// First-fit reservation of `contents_size` payload bytes
    pub fn reserve(&mut self, contents_size: u32) -> Result<Allocation> {
        let allocation_length = self.allocation_length(contents_size)?;
        self.reserve_new(allocation_length, contents_size)
    }

    /// Change an allocation's payload size, possibly relocating it
    ///
    /// On relocation the old payload is copied to the front of the new one and
    /// the old atom is freed. The returned handle replaces `allocation`.
    pub fn resize(&mut self, allocation: Allocation, contents_size: u32) -> Result<Allocation> {
        let current = self.allocation_header(allocation)?;
        let allocation_length = self.allocation_length(contents_size)?;

        if allocation_length == current.length {
            return Ok(allocation);
        }

        if allocation_length < current.length {
            // Smaller allocation - free the tail
            let tail = self.divide(allocation.offset, allocation_length, AtomTag::Free);
            let after_tail = tail + self.header(tail).length;

            if self.header(after_tail).identifier == AtomTag::Free {
                self.merge_next(tail);
            }

            logging::log_resize("shrink", allocation.offset, current.length, allocation_length);
            return Ok(allocation);
        }

        // Larger allocation - first try to extend into the following free atom
        let extend_length = allocation_length - current.length;
        let next_offset = allocation.offset + current.length;
        let next = self.header(next_offset);

        if next.identifier == AtomTag::Free && extend_length <= next.length {
            if extend_length < next.length {
                self.divide(next_offset, extend_length, AtomTag::Free);
            }
            self.merge_next(allocation.offset);

            logging::log_resize("extend", allocation.offset, current.length, allocation_length);
            return Ok(allocation);
        }

        // TODO: claim a free predecessor before falling back to relocation

        let relocated = self.reserve_new(allocation_length, contents_size)?;

        let source = allocation.contents_offset() as usize;
        let source_end = source + current.contents_size() as usize;
        self.bytes.copy_within(source..source_end, relocated.contents_offset() as usize);

        self.free(allocation)?;

        logging::log_relocation(allocation.offset, relocated.offset, current.contents_size());
        Ok(relocated)
    }

    /// Return an allocation to free space
    ///
    /// Returns the offset of the free atom that now covers it, which is the
    /// preceding atom when the two coalesced.
    pub fn free(&mut self, allocation: Allocation) -> Result<u32> {
        let mut atom = self.allocation_header(allocation)?;

        atom.identifier = AtomTag::Free;
        self.write_header(allocation.offset, atom);

        // First coalesce with the following atom if free
        if self.header(allocation.offset + atom.length).identifier == AtomTag::Free {
            self.merge_next(allocation.offset);
        }

        // Then with the preceding atom if free
        let prev_offset = allocation.offset - atom.previous;
        let survivor = if self.header(prev_offset).identifier == AtomTag::Free {
            self.merge_next(prev_offset);
            prev_offset
        } else {
            allocation.offset
        };

        logging::log_free(allocation.offset, survivor);
        Ok(survivor)
    }

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats::default();
        for atom in self.atoms() {
            let header = atom.atom();
            match header.identifier {
                AtomTag::Allocation => {
                    stats.allocations += 1;
                    stats.allocated_bytes += header.contents_size();
                }
                AtomTag::Free => {
                    stats.free_atoms += 1;
                    stats.free_bytes += header.contents_size();
                    stats.largest_free = stats.largest_free.max(header.contents_size());
                }
                _ => {}
            }
        }
        stats
    }

    // ===== Primitives =====

    #[inline]
    fn end_offset(&self) -> u32 {
        self.len() - HEADER_LENGTH
    }

    #[inline]
    fn header(&self, offset: u32) -> Atom {
        Atom::read(self.bytes, offset)
    }

    #[inline]
    fn write_header(&mut self, offset: u32, atom: Atom) {
        atom.write(self.bytes, offset);
    }

    /// Header plus aligned payload; empty requests still get one block
    fn allocation_length(&self, contents_size: u32) -> Result<u32> {
        checked_aligned_size(contents_size.max(1))
            .and_then(|size| size.checked_add(HEADER_LENGTH))
            .ok_or_else(|| self.out_of_space(contents_size))
    }

    fn out_of_space(&self, requested: u32) -> HeapError {
        let largest_free = self
            .atoms()
            .filter(|atom| atom.is_free())
            .map(|atom| atom.atom().contents_size())
            .max()
            .unwrap_or(0);

        logging::log_out_of_space(requested, largest_free);
        HeapError::OutOfSpace { requested, largest_free }
    }

    fn reserve_new(&mut self, allocation_length: u32, requested: u32) -> Result<Allocation> {
        let found = self
            .atoms()
            .skip(1)
            .find(|atom| atom.is_free() && atom.length() >= allocation_length)
            .map(|atom| atom.offset());

        let Some(offset) = found else {
            return Err(self.out_of_space(requested));
        };

        if allocation_length < self.header(offset).length {
            // Divide the free region, keeping the tail free
            self.divide(offset, allocation_length, AtomTag::Free);
        }

        let mut atom = self.header(offset);
        atom.identifier = AtomTag::Allocation;
        self.write_header(offset, atom);

        logging::log_reserve(offset, allocation_length);
        Ok(Allocation::at(offset))
    }

    /// Split the atom at `offset` after `slice_length` bytes, returning the tail offset
    fn divide(&mut self, offset: u32, slice_length: u32, identifier: AtomTag) -> u32 {
        let mut atom = self.header(offset);
        debug_assert!(is_aligned(slice_length) && slice_length < atom.length);

        // Tail first, fully inside the region being divided
        let tail_offset = offset + slice_length;
        let tail = Atom::new(identifier, atom.length - slice_length, slice_length);
        self.write_header(tail_offset, tail);

        // Link the following atom back to the tail
        let next_offset = tail_offset + tail.length;
        let mut next = self.header(next_offset);
        next.previous = tail.length;
        self.write_header(next_offset, next);

        atom.length = slice_length;
        self.write_header(offset, atom);

        tracing::trace!(event = "divide", offset, slice_length, tail_offset, "Atom divided");
        tail_offset
    }

    /// Absorb the following atom into the atom at `offset`
    fn merge_next(&mut self, offset: u32) {
        let mut atom = self.header(offset);
        let next = self.header(offset + atom.length);
        atom.length += next.length;
        self.write_header(offset, atom);

        let after_offset = offset + atom.length;
        let mut after = self.header(after_offset);
        after.previous = atom.length;
        self.write_header(after_offset, after);

        tracing::trace!(event = "merge", offset, length = atom.length, "Atoms merged");
    }
}

impl core::fmt::Debug for AtomHeap<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.atoms().map(|atom| atom.atom())).finish()
    }
}
